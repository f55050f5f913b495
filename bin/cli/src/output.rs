use anyhow::Result;
use serde::Serialize;

/// Command output is rendered as pretty printed JSON.
pub(crate) fn render_json<T: Serialize + ?Sized>(value: &T) -> Result<Option<String>> {
    Ok(Some(serde_json::to_string_pretty(value)?))
}

use std::sync::Arc;

use anyhow::{anyhow, Result};
use clap::Parser;
use gitlab_client::Client;
use software_catalog::discovery::DiscoveryService;
use software_catalog::remote::GitLabRemote;
use tracing::info;

use crate::config::Settings;
use crate::output::render_json;

#[derive(Parser, Debug)]
#[command(
    about = "Scan the configured GitLab group and local manifests and replace the catalog with the result"
)]
pub(crate) struct DiscoverCommand;

pub(crate) async fn invoke(settings: &Settings) -> Result<Option<String>> {
    let token = settings
        .gitlab
        .token
        .as_deref()
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| anyhow!("GitLab API token is not configured (set GITLAB_API_TOKEN)"))?;

    let client = Client::with_private_token(token)?.with_host(&settings.gitlab.host);
    let store = settings.entity_store();
    info!(
        "discovering entities from {} into {}",
        client.host(),
        store.path().display()
    );

    let service = DiscoveryService::new(
        settings.discovery(),
        Arc::new(GitLabRemote::new(client)),
        store,
    );
    let report = service.run().await?;

    render_json(&report)
}

use anyhow::Result;
use clap::Parser;
use software_catalog::catalog::CatalogService;

use crate::config::Settings;
use crate::output::render_json;

#[derive(Parser, Debug)]
#[command(about = "List catalog entities")]
pub(crate) struct EntitiesCommand {
    #[arg(
        long,
        short,
        default_value = "",
        help = "Only entities whose name or description contains this text"
    )]
    pub search: String,

    #[arg(long, short, default_value = "", help = "Only entities carrying this tag")]
    pub tag: String,
}

pub(crate) fn invoke(cmd: EntitiesCommand, settings: &Settings) -> Result<Option<String>> {
    let catalog = CatalogService::new(settings.entity_store());
    let entities = catalog.entities(&cmd.search, &cmd.tag)?;
    render_json(&entities)
}

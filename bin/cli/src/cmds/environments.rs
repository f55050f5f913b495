use anyhow::Result;
use clap::Parser;
use software_catalog::environments::{EnvironmentService, Pagination, DEFAULT_PAGE_LIMIT};

use crate::config::Settings;
use crate::output::render_json;

#[derive(Parser, Debug)]
#[command(about = "Show deployed component versions grouped by environment")]
pub(crate) struct EnvironmentsCommand {
    #[arg(
        long,
        short,
        default_value = "",
        help = "Only components whose name contains this text"
    )]
    pub search: String,

    #[arg(
        long,
        short,
        default_value_t = 1,
        allow_negative_numbers = true,
        help = "Page of components to show in each environment, starting at 1"
    )]
    pub page: i64,

    #[arg(
        long,
        short,
        default_value_t = DEFAULT_PAGE_LIMIT as i64,
        allow_negative_numbers = true,
        help = "Components per page"
    )]
    pub limit: i64,
}

pub(crate) fn invoke(cmd: EnvironmentsCommand, settings: &Settings) -> Result<Option<String>> {
    let service = EnvironmentService::new(settings.entity_store());
    let environments = service.environments(&cmd.search, Pagination::new(cmd.page, cmd.limit))?;
    render_json(&environments)
}

use anyhow::Result;
use clap::Parser;
use software_catalog::environments::EnvironmentService;

use crate::config::Settings;
use crate::output::render_json;

#[derive(Parser, Debug)]
#[command(about = "List the deployments of a single component across environments")]
pub(crate) struct ComponentEnvironmentsCommand {
    #[arg(help = "Component name")]
    pub name: String,
}

pub(crate) fn invoke(
    cmd: ComponentEnvironmentsCommand,
    settings: &Settings,
) -> Result<Option<String>> {
    let service = EnvironmentService::new(settings.entity_store());
    let deployments = service.component_environments(&cmd.name)?;
    render_json(&deployments)
}

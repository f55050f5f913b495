use clap::Parser;
use tracing::error;

use crate::cmds::{component_environments, discover, entities, environments, Command, Opt};
use crate::config::Settings;

mod cmds;
mod config;
mod output;

#[tokio::main]
async fn main() {
    let opt = Opt::parse();

    let tracing_level = if opt.debug {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    // command output goes to stdout so diagnostics stay on stderr
    tracing_subscriber::fmt::fmt()
        .with_max_level(tracing_level)
        .with_writer(std::io::stderr)
        .init();

    let settings = match Settings::load(opt.config.as_deref()) {
        Ok(settings) => settings,
        Err(e) => {
            error!("invalid configuration: {e}");
            std::process::exit(1);
        }
    };

    let result = match opt.cmd {
        Command::ComponentEnvironments(cmd) => component_environments::invoke(cmd, &settings),
        Command::Discover(_) => discover::invoke(&settings).await,
        Command::Entities(cmd) => entities::invoke(cmd, &settings),
        Command::Environments(cmd) => environments::invoke(cmd, &settings),
    };

    match result {
        Ok(output) => {
            if let Some(output) = output {
                println!("{output}");
            }
        }
        Err(e) => {
            error!("{e:#}");
            std::process::exit(1);
        }
    };
}

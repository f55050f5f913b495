use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::cmds::component_environments::ComponentEnvironmentsCommand;
use crate::cmds::discover::DiscoverCommand;
use crate::cmds::entities::EntitiesCommand;
use crate::cmds::environments::EnvironmentsCommand;

pub mod component_environments;
pub mod discover;
pub mod entities;
pub mod environments;

#[derive(Debug, Parser)]
#[command(name = "software-catalog")]
pub(crate) struct Opt {
    #[arg(
        long,
        help = "Prints a verbose output during the program execution",
        global = true
    )]
    pub(crate) debug: bool,

    #[arg(
        long,
        short,
        help = "Configuration file. Defaults to software-catalog.toml in the current directory.",
        global = true
    )]
    pub(crate) config: Option<PathBuf>,

    #[command(subcommand)]
    pub(crate) cmd: Command,
}

#[remain::sorted]
#[derive(Debug, Subcommand)]
pub(crate) enum Command {
    ComponentEnvironments(ComponentEnvironmentsCommand),
    Discover(DiscoverCommand),
    Entities(EntitiesCommand),
    Environments(EnvironmentsCommand),
}

//! CLI module - argument parsing and command dispatch

pub mod args;
pub mod commands;
pub mod helpers;
pub mod output;

pub use args::{Cli, Commands, GlobalOpts, OutputFormat};

use miette::Result;

/// Run the parsed command line
pub fn run(cli: Cli) -> Result<()> {
    let global = cli.global;
    match cli.command {
        Commands::Init(args) => commands::init::run(args, &global),
        Commands::Draft(cmd) => commands::draft::run(cmd, &global),
        Commands::Point(cmd) => commands::point::run(cmd, &global),
        Commands::Channel(cmd) => commands::channel::run(cmd, &global),
        Commands::Syringe(cmd) => commands::syringe::run(cmd, &global),
        Commands::Compute(args) => commands::compute::run(args, &global),
        Commands::Render(args) => commands::render::run(args, &global),
        Commands::Factor(args) => commands::factor::run(args, &global),
        Commands::Parse(args) => commands::parse::run(args, &global),
        Commands::Validate(args) => commands::validate::run(args, &global),
        Commands::Config(cmd) => commands::config::run(cmd, &global),
        Commands::Completions(args) => commands::completions::run(args),
    }
}

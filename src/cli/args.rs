//! Command-line arguments

use clap::{ArgAction, Parser, Subcommand, ValueEnum};

use crate::cli::commands::{
    channel::ChannelCommands, completions::CompletionsArgs, compute::ComputeArgs,
    config::ConfigCommands, draft::DraftCommands, factor::FactorArgs, init::InitArgs,
    parse::ParseArgs, point::PointCommands, render::RenderArgs, syringe::SyringeCommands,
    validate::ValidateArgs,
};

#[derive(Parser, Debug)]
#[command(
    name = "calcert",
    version,
    about = "Gravimetric calibration results and PDF calibration certificates",
    long_about = "Calcert keeps calibration certificate drafts as YAML files, computes \
                  volumes and statistics from mass readings (ISO 8655) and renders \
                  the certificate as PDF."
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Commands,
}

/// Options shared by every command
#[derive(clap::Args, Debug, Clone)]
pub struct GlobalOpts {
    /// Output format
    #[arg(long, short = 'f', global = true, value_enum, default_value_t = OutputFormat::Auto)]
    pub format: OutputFormat,

    /// More log output (-v info, -vv debug, -vvv trace)
    #[arg(long, short = 'v', global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Print only errors
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Seed for auto-filled readings (reproducible output)
    #[arg(long, global = true)]
    pub seed: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Table for lists, YAML for single drafts
    Auto,
    Yaml,
    Json,
    Tsv,
    Csv,
    /// Boxed table
    Table,
    /// Ids only
    Id,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create a calcert project in the current directory
    Init(InitArgs),

    /// Create, list and edit certificate drafts
    #[command(subcommand)]
    Draft(DraftCommands),

    /// Calibration points and their readings
    #[command(subcommand)]
    Point(PointCommands),

    /// Channels of a multichannel pipette
    #[command(subcommand)]
    Channel(ChannelCommands),

    /// Syringes of a repipetter
    #[command(subcommand)]
    Syringe(SyringeCommands),

    /// Show the computed results of a draft
    Compute(ComputeArgs),

    /// Render a draft as a PDF certificate
    Render(RenderArgs),

    /// Look up the Z correction factor for a temperature
    Factor(FactorArgs),

    /// Parse readings text and report what was kept
    Parse(ParseArgs),

    /// Validate draft files against the schema
    Validate(ValidateArgs),

    /// Show or change configuration
    #[command(subcommand)]
    Config(ConfigCommands),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

//! `calcert config` command - Inspect and update configuration

use clap::Subcommand;
use console::style;
use miette::{IntoDiagnostic, Result};
use std::path::PathBuf;

use crate::cli::helpers;
use crate::cli::{GlobalOpts, OutputFormat};
use crate::core::config::{self, Config};
use crate::core::project::Project;

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Print the effective configuration
    Show,

    /// Print the configuration file locations
    Path,

    /// Print or replace the "Padrões Utilizados" text
    Standards(StandardsArgs),
}

#[derive(clap::Args, Debug)]
pub struct StandardsArgs {
    /// New text; prints the current text when omitted
    pub text: Option<String>,

    /// Read the new text from a file
    #[arg(long, conflicts_with = "text")]
    pub file: Option<PathBuf>,

    /// Write to the global configuration instead of the project one
    #[arg(long)]
    pub global: bool,
}

pub fn run(cmd: ConfigCommands, global: &GlobalOpts) -> Result<()> {
    match cmd {
        ConfigCommands::Show => run_show(global),
        ConfigCommands::Path => run_path(global),
        ConfigCommands::Standards(args) => run_standards(args, global),
    }
}

fn run_show(global: &GlobalOpts) -> Result<()> {
    let config = Config::load();
    match global.format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&config).into_diagnostic()?)
        }
        _ => print!("{}", serde_yml::to_string(&config).into_diagnostic()?),
    }
    Ok(())
}

fn run_path(global: &GlobalOpts) -> Result<()> {
    let global_file = config::global_path();
    let project_file = Project::discover().ok().map(|p| p.config_path());

    if global.format == OutputFormat::Json {
        let value = serde_json::json!({
            "global": global_file.as_ref().map(|p| p.display().to_string()),
            "project": project_file.as_ref().map(|p| p.display().to_string()),
        });
        println!("{}", serde_json::to_string_pretty(&value).into_diagnostic()?);
        return Ok(());
    }

    for (label, path) in [("global", global_file), ("project", project_file)] {
        match path {
            Some(path) => {
                let marker = if path.exists() {
                    style("✓").green()
                } else {
                    style("-").dim()
                };
                println!("{} {:8} {}", marker, label, path.display());
            }
            None => println!("{} {:8} {}", style("-").dim(), label, style("(none)").dim()),
        }
    }
    Ok(())
}

fn run_standards(args: StandardsArgs, global: &GlobalOpts) -> Result<()> {
    let text = match (args.text, &args.file) {
        (Some(text), _) => Some(text),
        (None, Some(file)) => Some(std::fs::read_to_string(file).into_diagnostic()?),
        (None, None) => None,
    };

    let Some(text) = text else {
        print!("{}", Config::load().standards_used);
        println!();
        return Ok(());
    };

    let path = if args.global {
        config::global_path()
            .ok_or_else(|| miette::miette!("No global configuration directory on this system"))?
    } else {
        Project::discover()
            .map_err(|e| miette::miette!("{}", e))?
            .config_path()
    };

    let text = text.trim_end().to_string();
    if text.is_empty() {
        return Err(miette::miette!("Standards text cannot be empty"));
    }

    config::set_value(&path, "standards_used", serde_yml::Value::String(text))
        .map_err(|e| miette::miette!("{}", e))?;
    helpers::success(
        global,
        format!("Updated standards_used in {}", path.display()),
    );
    Ok(())
}

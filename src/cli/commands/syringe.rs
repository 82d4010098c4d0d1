//! `calcert syringe` command - Syringes of repipetters

use clap::Subcommand;
use miette::Result;

use super::point::optional_number;
use crate::cli::helpers::{self, Workspace};
use crate::cli::GlobalOpts;
use crate::entities::draft::DraftAction;
use crate::entities::point::Unit;

#[derive(Subcommand, Debug)]
pub enum SyringeCommands {
    /// Add a syringe with three empty points
    Add(AddArgs),

    /// Remove a syringe and its points
    Rm(RmArgs),

    /// Set the nominal volume of a syringe
    Nominal(NominalArgs),
}

#[derive(clap::Args, Debug)]
pub struct AddArgs {
    /// Draft id, id prefix, @N or file path
    pub draft: String,
}

#[derive(clap::Args, Debug)]
pub struct RmArgs {
    pub draft: String,

    /// Syringe id
    pub syringe: u32,
}

#[derive(clap::Args, Debug)]
pub struct NominalArgs {
    pub draft: String,

    /// Syringe id
    pub syringe: u32,

    /// Volume, or "none" to clear
    pub volume: String,

    /// uL or mL
    #[arg(long, short = 'u')]
    pub unit: Option<Unit>,
}

pub fn run(cmd: SyringeCommands, global: &GlobalOpts) -> Result<()> {
    let ws = Workspace::open()?;
    match cmd {
        SyringeCommands::Add(args) => {
            let transition = ws.apply(&args.draft, DraftAction::AddSyringe, global)?;
            match transition.created {
                Some(id) => helpers::success(global, format!("Added syringe {}", id)),
                None => helpers::success(global, "Added syringe"),
            }
        }
        SyringeCommands::Rm(args) => {
            ws.apply(&args.draft, DraftAction::RemoveSyringe(args.syringe), global)?;
            helpers::success(global, format!("Removed syringe {}", args.syringe));
        }
        SyringeCommands::Nominal(args) => {
            let volume = optional_number(&args.volume)?;
            let transition = ws.apply(
                &args.draft,
                DraftAction::SetSyringeNominal {
                    syringe: args.syringe,
                    volume,
                    unit: args.unit,
                },
                global,
            )?;
            let title = transition
                .draft
                .equipment
                .syringes()
                .and_then(|s| s.iter().find(|s| s.id == args.syringe))
                .map(|s| s.title())
                .unwrap_or_default();
            helpers::success(global, format!("Syringe {} {}", args.syringe, title));
        }
    }
    Ok(())
}

//! `calcert channel` command - Channels of multichannel pipettes

use clap::Subcommand;
use miette::Result;

use crate::cli::helpers::{self, Workspace};
use crate::cli::GlobalOpts;
use crate::entities::draft::DraftAction;

#[derive(Subcommand, Debug)]
pub enum ChannelCommands {
    /// Add a channel with the layout of channel 1
    Add(AddArgs),

    /// Remove a channel and its points
    Rm(RmArgs),
}

#[derive(clap::Args, Debug)]
pub struct AddArgs {
    /// Draft id, id prefix, @N or file path
    pub draft: String,
}

#[derive(clap::Args, Debug)]
pub struct RmArgs {
    pub draft: String,

    /// Channel number
    pub channel: u32,
}

pub fn run(cmd: ChannelCommands, global: &GlobalOpts) -> Result<()> {
    let ws = Workspace::open()?;
    match cmd {
        ChannelCommands::Add(args) => {
            let transition = ws.apply(&args.draft, DraftAction::AddChannel, global)?;
            match transition.created {
                Some(channel) => helpers::success(global, format!("Added channel {}", channel)),
                None => helpers::success(global, "Added channel"),
            }
        }
        ChannelCommands::Rm(args) => {
            ws.apply(&args.draft, DraftAction::RemoveChannel(args.channel), global)?;
            helpers::success(global, format!("Removed channel {}", args.channel));
        }
    }
    Ok(())
}

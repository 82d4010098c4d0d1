//! `calcert init` command - Create a project

use console::style;
use miette::{IntoDiagnostic, Result};

use crate::cli::GlobalOpts;
use crate::core::project::{Project, ProjectError};

#[derive(clap::Args, Debug)]
pub struct InitArgs {
    /// Directory to initialize (defaults to the current directory)
    pub path: Option<std::path::PathBuf>,

    /// Re-create missing parts of an existing project
    #[arg(long)]
    pub force: bool,
}

pub fn run(args: InitArgs, global: &GlobalOpts) -> Result<()> {
    let root = match args.path {
        Some(path) => path,
        None => std::env::current_dir().into_diagnostic()?,
    };
    std::fs::create_dir_all(&root).into_diagnostic()?;

    let result = if args.force {
        Project::init_force(&root)
    } else {
        Project::init(&root)
    };

    let project = match result {
        Ok(project) => project,
        Err(ProjectError::AlreadyExists(path)) => {
            return Err(miette::miette!(
                help = "use --force to restore missing directories",
                "a calcert project already exists at {}",
                path.display()
            ));
        }
        Err(e) => return Err(miette::miette!("{}", e)),
    };

    if !global.quiet {
        println!(
            "{} Initialized calcert project at {}",
            style("✓").green(),
            style(project.root().display()).cyan()
        );
        println!();
        println!("  {}  draft files", style("drafts/").yellow());
        println!("  {}  rendered PDFs", style("certificates/").yellow());
        println!(
            "  {}  letterhead, signature and footer images",
            style("assets/").yellow()
        );
        println!(
            "  {}  project configuration",
            style(".calcert/config.yaml").yellow()
        );
        println!();
        println!("Next: {}", style("calcert draft new").cyan());
    }
    Ok(())
}

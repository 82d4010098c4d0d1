//! `calcert render` command - PDF certificate output

use console::style;
use miette::{IntoDiagnostic, Result};
use std::path::PathBuf;

use crate::cli::helpers::Workspace;
use crate::cli::{GlobalOpts, OutputFormat};
use crate::render::{self, assets, Assets};
use crate::schema::validator::check_draft;

#[derive(clap::Args, Debug)]
pub struct RenderArgs {
    /// Draft id, id prefix, @N or file path
    pub draft: String,

    /// Output directory (default: output.directory or certificates/)
    #[arg(long, short = 'o')]
    pub output: Option<PathBuf>,

    /// Write to a temporary file and open it in the viewer instead
    #[arg(long, short = 'p')]
    pub preview: bool,

    /// File name pattern, overrides output.file_name
    #[arg(long)]
    pub name: Option<String>,

    /// Ignore letterhead, signature and footer images
    #[arg(long)]
    pub no_images: bool,
}

pub fn run(args: RenderArgs, global: &GlobalOpts) -> Result<()> {
    let ws = Workspace::open()?;
    let stored = ws.get(&args.draft)?;
    let draft = &stored.draft;

    let mut config = ws.config.clone();
    if let Some(pattern) = args.name {
        config.output.file_name = pattern;
    }

    let assets = if args.no_images {
        Assets::none()
    } else {
        let roots = assets::search_roots(Some(&ws.project), &config.assets);
        Assets::discover(&roots)
    };

    if !global.quiet {
        for warning in check_draft(draft) {
            eprintln!("{} {}", style("!").yellow(), warning);
        }
    }

    let rendered = render::render(draft, &config, &assets).map_err(|e| miette::miette!("{}", e))?;

    let path = if args.preview {
        rendered
            .preview(&config.viewer())
            .map_err(|e| miette::miette!("{}", e))?
    } else {
        let dir = match (&args.output, &config.output.directory) {
            (Some(dir), _) => dir.clone(),
            (None, Some(dir)) => ws.project.resolve(dir),
            (None, None) => ws.project.certificates_dir(),
        };
        rendered
            .download(&dir)
            .map_err(|e| miette::miette!("{}", e))?
    };

    match global.format {
        OutputFormat::Json => {
            let summary = serde_json::json!({
                "id": draft.id.to_string(),
                "path": path.display().to_string(),
                "pages": rendered.page_count,
                "fingerprint": rendered.fingerprint,
            });
            println!("{}", serde_json::to_string_pretty(&summary).into_diagnostic()?);
        }
        OutputFormat::Id => println!("{}", path.display()),
        _ if global.quiet => {}
        _ => {
            println!(
                "{} Rendered {} ({} page{})",
                style("✓").green(),
                style(path.display()).cyan(),
                rendered.page_count,
                if rendered.page_count == 1 { "" } else { "s" }
            );
            println!(
                "   sha256 {}",
                style(&rendered.fingerprint[..16]).dim()
            );
            for (kind, image) in [
                ("header", &assets.header),
                ("signature", &assets.signature),
                ("footer", &assets.footer),
            ] {
                if image.is_none() {
                    println!("   {} no {} image, using text", style("→").blue(), kind);
                }
            }
        }
    }
    Ok(())
}

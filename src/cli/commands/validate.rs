//! `calcert validate` command - Check draft files against the schema

use console::style;
use miette::Result;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::cli::GlobalOpts;
use crate::core::project::Project;
use crate::core::store::{self, DraftStore, DRAFT_SUFFIX};
use crate::schema::registry::SchemaRegistry;
use crate::schema::validator::{check_draft, Validator};

#[derive(clap::Args, Debug)]
pub struct ValidateArgs {
    /// Files or directories to validate (default: every draft in the project)
    #[arg()]
    pub paths: Vec<PathBuf>,

    /// Strict mode - warnings become errors
    #[arg(long)]
    pub strict: bool,

    /// Continue validation after first error
    #[arg(long)]
    pub keep_going: bool,

    /// Show summary only, don't show individual errors
    #[arg(long)]
    pub summary: bool,
}

#[derive(Default)]
struct ValidationStats {
    files_checked: usize,
    files_passed: usize,
    files_failed: usize,
    total_errors: usize,
    total_warnings: usize,
}

pub fn run(args: ValidateArgs, global: &GlobalOpts) -> Result<()> {
    let files = if args.paths.is_empty() {
        let project = Project::discover().map_err(|e| miette::miette!("{}", e))?;
        DraftStore::open(&project).files()
    } else {
        expand_paths(&args.paths)
    };

    let registry = SchemaRegistry::default();
    let validator = Validator::new(&registry).map_err(|e| miette::miette!("{}", e))?;
    let verbose = !args.summary && !global.quiet;

    let mut stats = ValidationStats::default();

    if verbose {
        println!(
            "{} Validating {} file(s)...\n",
            style("→").blue(),
            files.len()
        );
    }

    for path in &files {
        stats.files_checked += 1;

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) => {
                if verbose {
                    println!("{} {} - {}", style("✗").red(), path.display(), e);
                }
                stats.files_failed += 1;
                stats.total_errors += 1;
                if !args.keep_going {
                    break;
                }
                continue;
            }
        };

        let filename = path.file_name().unwrap_or_default().to_string_lossy();

        if let Err(e) = validator.validate(&content, &filename) {
            stats.files_failed += 1;
            stats.total_errors += e.violation_count();
            if verbose {
                println!(
                    "{} {} - {} error(s)",
                    style("✗").red(),
                    path.display(),
                    e.violation_count()
                );
                let report = miette::Report::new(e);
                println!("{:?}", report);
            }
            if !args.keep_going {
                break;
            }
            continue;
        }

        // Schema-valid files can still disagree with the model (ranges, ids)
        let warnings = match store::load(path) {
            Ok(draft) => check_draft(&draft),
            Err(e) => {
                stats.files_failed += 1;
                stats.total_errors += 1;
                if verbose {
                    println!("{} {} - {}", style("✗").red(), path.display(), e);
                }
                if !args.keep_going {
                    break;
                }
                continue;
            }
        };

        if args.strict && !warnings.is_empty() {
            stats.files_failed += 1;
            stats.total_errors += warnings.len();
            if verbose {
                println!(
                    "{} {} - {} error(s)",
                    style("✗").red(),
                    path.display(),
                    warnings.len()
                );
                for warning in &warnings {
                    println!("    {}", warning);
                }
            }
            if !args.keep_going {
                break;
            }
            continue;
        }

        stats.files_passed += 1;
        stats.total_warnings += warnings.len();
        if verbose {
            println!("{} {}", style("✓").green(), path.display());
            for warning in &warnings {
                println!("    {} {}", style("!").yellow(), warning);
            }
        }
    }

    if !global.quiet {
        print_summary(&stats);
    }

    match stats.files_failed {
        0 => {
            if !global.quiet {
                println!("{} All files passed validation!", style("✓").green().bold());
            }
            Ok(())
        }
        1 => Err(miette::miette!("Validation failed: 1 file has errors")),
        n => Err(miette::miette!("Validation failed: {} files have errors", n)),
    }
}

fn print_summary(stats: &ValidationStats) {
    println!();
    println!("{}", style("─".repeat(60)).dim());
    println!("{}", style("Validation Summary").bold());
    println!("{}", style("─".repeat(60)).dim());
    println!("  Files checked:  {}", style(stats.files_checked).cyan());
    println!("  Files passed:   {}", style(stats.files_passed).green());
    println!("  Files failed:   {}", style(stats.files_failed).red());
    println!("  Total errors:   {}", style(stats.total_errors).red());
    if stats.total_warnings > 0 {
        println!("  Total warnings: {}", style(stats.total_warnings).yellow());
    }
    println!();
}

fn is_draft_file(path: &Path) -> bool {
    path.to_string_lossy().ends_with(DRAFT_SUFFIX)
}

/// Expand paths - directories contribute every draft file below them
fn expand_paths(paths: &[PathBuf]) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for path in paths {
        if path.is_dir() {
            for entry in WalkDir::new(path)
                .into_iter()
                .filter_map(|e| e.ok())
                .filter(|e| e.file_type().is_file())
            {
                if is_draft_file(entry.path()) {
                    files.push(entry.path().to_path_buf());
                }
            }
        } else if path.exists() {
            files.push(path.clone());
        }
    }

    files.sort();
    files
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_paths_filters_drafts() {
        let tmp = tempfile::tempdir().unwrap();
        let nested = tmp.path().join("a");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(nested.join("CAL-1.calcert.yaml"), "").unwrap();
        std::fs::write(nested.join("notes.yaml"), "").unwrap();
        let explicit = tmp.path().join("other.yaml");
        std::fs::write(&explicit, "").unwrap();

        let files = expand_paths(&[tmp.path().to_path_buf(), explicit.clone()]);
        assert_eq!(files.len(), 2);
        assert!(files.contains(&explicit));
        assert!(files.iter().any(|f| is_draft_file(f)));
    }

    #[test]
    fn test_missing_paths_are_skipped() {
        let files = expand_paths(&[PathBuf::from("/definitely/not/here.calcert.yaml")]);
        assert!(files.is_empty());
    }
}

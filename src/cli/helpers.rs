//! Shared helper functions for CLI commands

use chrono::NaiveDate;
use console::style;
use miette::{IntoDiagnostic, Result};
use std::path::Path;

use crate::cli::GlobalOpts;
use crate::core::autofill::Autofill;
use crate::core::project::Project;
use crate::core::store::{self, DraftStore, StoredDraft};
use crate::core::Config;
use crate::entities::draft::{DraftAction, RangeValue, Transition};
use crate::entities::point::Unit;

/// Project, configuration and draft store of the current directory
pub struct Workspace {
    pub project: Project,
    pub config: Config,
    pub store: DraftStore,
}

impl Workspace {
    pub fn open() -> Result<Self> {
        let project = Project::discover().map_err(|e| miette::miette!("{}", e))?;
        let config = Config::load();
        let store = DraftStore::open(&project);
        Ok(Self {
            project,
            config,
            store,
        })
    }

    /// Auto-fill engine; `--seed` wins over the configured seed
    pub fn autofill(&self, global: &GlobalOpts) -> Autofill {
        let mut config = self.config.autofill.clone();
        if global.seed.is_some() {
            config.seed = global.seed;
        }
        Autofill::new(config)
    }

    pub fn get(&self, reference: &str) -> Result<StoredDraft> {
        self.store
            .get(reference)
            .map_err(|e| miette::miette!("{}", e))
    }

    /// Load a draft, apply one action and write the result back
    pub fn apply(
        &self,
        reference: &str,
        action: DraftAction,
        global: &GlobalOpts,
    ) -> Result<Transition> {
        let stored = self.get(reference)?;
        let mut autofill = self.autofill(global);
        let transition = stored
            .draft
            .apply(action, &mut autofill)
            .map_err(|e| miette::miette!("{}", e))?;
        store::write(&stored.path, &transition.draft).map_err(|e| miette::miette!("{}", e))?;
        report(&transition, global);
        Ok(transition)
    }
}

/// Print the auto-fill notice and parse warnings of a transition
pub fn report(transition: &Transition, global: &GlobalOpts) {
    if global.quiet {
        return;
    }
    if let Some(parsed) = &transition.parsed {
        for token in &parsed.rejected {
            eprintln!(
                "{} Ignored '{}' (not a number)",
                style("!").yellow(),
                token
            );
        }
        if parsed.truncated > 0 {
            eprintln!(
                "{} Ignored {} reading(s) beyond the tenth",
                style("!").yellow(),
                parsed.truncated
            );
        }
    }
    if let Some(notice) = &transition.notice {
        println!("{} {}", style("→").blue(), notice);
    }
}

/// Print a success line unless `--quiet`
pub fn success(global: &GlobalOpts, message: impl std::fmt::Display) {
    if !global.quiet {
        println!("{} {}", style("✓").green(), message);
    }
}

/// Open a file in the configured editor
pub fn run_editor(config: &Config, path: &Path) -> Result<()> {
    let editor = config.editor();
    println!("Opening in {}...", style(&editor).yellow());
    let status = std::process::Command::new(&editor)
        .arg(path)
        .status()
        .into_diagnostic()?;
    if !status.success() {
        return Err(miette::miette!("{} exited with {}", editor, status));
    }
    Ok(())
}

/// Parse a decimal that may use a comma ("99,5")
pub fn parse_decimal(value: &str) -> std::result::Result<f64, String> {
    value
        .trim()
        .replace(',', ".")
        .parse::<f64>()
        .map_err(|_| format!("'{}' is not a number", value))
}

/// Parse a date as YYYY-MM-DD or DD/MM/YYYY
pub fn parse_date(value: &str) -> std::result::Result<NaiveDate, String> {
    let value = value.trim();
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(value, "%d/%m/%Y"))
        .map_err(|_| format!("'{}' is not a date (use YYYY-MM-DD or DD/MM/YYYY)", value))
}

/// Parse a range such as "1000", "1000uL" or "10 mL"
pub fn parse_range(value: &str) -> std::result::Result<RangeValue, String> {
    let value = value.trim();
    let split = value
        .find(|c: char| c.is_alphabetic() || c == 'µ' || c == 'μ')
        .unwrap_or(value.len());
    let (number, unit) = value.split_at(split);
    let number = number.trim();
    if number.is_empty() {
        return Err(format!("'{}' has no value", value));
    }
    let unit = if unit.trim().is_empty() {
        Unit::default()
    } else {
        unit.parse::<Unit>()?
    };
    Ok(RangeValue {
        value: number.to_string(),
        unit,
    })
}

/// Truncate a string to max_len characters, adding "..." if truncated
pub fn truncate_str(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_decimal() {
        assert_eq!(parse_decimal("99,5"), Ok(99.5));
        assert_eq!(parse_decimal(" 100 "), Ok(100.0));
        assert!(parse_decimal("abc").is_err());
    }

    #[test]
    fn test_parse_date() {
        let expected = NaiveDate::from_ymd_opt(2025, 5, 20).unwrap();
        assert_eq!(parse_date("2025-05-20"), Ok(expected));
        assert_eq!(parse_date("20/05/2025"), Ok(expected));
        assert!(parse_date("May 20").is_err());
    }

    #[test]
    fn test_parse_range() {
        let range = parse_range("1000uL").unwrap();
        assert_eq!(range.value, "1000");
        assert_eq!(range.unit, Unit::Microliter);
        assert_eq!(parse_range("10 mL").unwrap().unit, Unit::Milliliter);
        assert_eq!(parse_range("2,5").unwrap().value, "2,5");
        assert!(parse_range("mL").is_err());
        assert!(parse_range("10 L").is_err());
    }

    #[test]
    fn test_truncate_str() {
        assert_eq!(truncate_str("hello", 10), "hello");
        assert_eq!(truncate_str("hello world", 8), "hello...");
        assert_eq!(truncate_str("calibração", 10), "calibração");
    }
}

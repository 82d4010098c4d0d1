//! Output formatting utilities

use miette::{IntoDiagnostic, Result};
use serde::Serialize;
use tabled::settings::Style;
use tabled::{Table, Tabled};

use crate::cli::OutputFormat;

/// Determine the effective output format based on context
pub fn effective_format(format: OutputFormat, is_list: bool) -> OutputFormat {
    match format {
        OutputFormat::Auto => {
            if is_list {
                OutputFormat::Table
            } else {
                OutputFormat::Yaml
            }
        }
        other => other,
    }
}

/// Rounded table of `rows`
pub fn table<T: Tabled>(rows: &[T]) -> String {
    Table::new(rows).with(Style::rounded()).to_string()
}

/// Rows as delimited text with a header line
pub fn delimited<T: Serialize>(rows: &[T], delimiter: u8) -> Result<String> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .from_writer(Vec::new());
    for row in rows {
        writer.serialize(row).into_diagnostic()?;
    }
    let bytes = writer.into_inner().into_diagnostic()?;
    String::from_utf8(bytes).into_diagnostic()
}

/// Print rows in a list format (table, CSV, TSV, JSON, YAML)
pub fn print_rows<T: Tabled + Serialize>(rows: &[T], format: OutputFormat) -> Result<()> {
    match effective_format(format, true) {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(rows).into_diagnostic()?);
        }
        OutputFormat::Yaml => {
            print!("{}", serde_yml::to_string(rows).into_diagnostic()?);
        }
        OutputFormat::Csv => print!("{}", delimited(rows, b',')?),
        OutputFormat::Tsv => print!("{}", delimited(rows, b'\t')?),
        _ => println!("{}", table(rows)),
    }
    Ok(())
}

//! `calcert factor` command - Z correction factor lookup

use console::style;
use miette::{IntoDiagnostic, Result};
use serde::Serialize;
use tabled::Tabled;

use crate::cli::helpers::parse_decimal;
use crate::cli::output;
use crate::cli::{GlobalOpts, OutputFormat};
use crate::core::correction;
use crate::core::format;

#[derive(clap::Args, Debug)]
pub struct FactorArgs {
    /// Temperature in °C (prints the whole table when omitted)
    #[arg(value_parser = parse_decimal)]
    pub temperature: Option<f64>,
}

#[derive(Debug, Serialize, Tabled)]
struct FactorRow {
    #[tabled(rename = "TEMPERATURE (°C)")]
    temperature: f64,
    #[tabled(rename = "Z (µL/mg)")]
    factor: f64,
}

pub fn run(args: FactorArgs, global: &GlobalOpts) -> Result<()> {
    let Some(temperature) = args.temperature else {
        let rows: Vec<FactorRow> = correction::table()
            .map(|(temperature, factor)| FactorRow {
                temperature,
                factor,
            })
            .collect();
        return output::print_rows(&rows, global.format);
    };

    let factor = correction::factor_for(temperature);
    let tabulated = correction::is_tabulated(temperature);

    match global.format {
        OutputFormat::Json => {
            let value = serde_json::json!({
                "temperature": temperature,
                "factor": factor,
                "tabulated": tabulated,
            });
            println!("{}", serde_json::to_string_pretty(&value).into_diagnostic()?);
        }
        OutputFormat::Id | OutputFormat::Tsv | OutputFormat::Csv => println!("{}", factor),
        _ => {
            println!(
                "{} °C → Z = {} µL/mg",
                format::volume(temperature),
                style(format::factor(Some(factor))).cyan()
            );
            if !tabulated && !global.quiet {
                eprintln!(
                    "{} {} °C is not in the table (15.0 to 30.0 in 0.5 steps), default factor used",
                    style("!").yellow(),
                    format::volume(temperature)
                );
            }
        }
    }
    Ok(())
}

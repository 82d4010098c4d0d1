//! `calcert parse` command - Try the readings parser

use console::style;
use miette::{IntoDiagnostic, Result};

use crate::cli::helpers::parse_decimal;
use crate::cli::{GlobalOpts, OutputFormat};
use crate::core::correction;
use crate::core::format;
use crate::core::readings::{self, Delimiters};
use crate::core::stats;

#[derive(clap::Args, Debug)]
pub struct ParseArgs {
    /// Readings text, e.g. "99.8, 99.9, abc, 100.1"
    #[arg(required = true, num_args = 1.., allow_negative_numbers = true)]
    pub text: Vec<String>,

    /// Also split on whitespace (as for repipetter syringes)
    #[arg(long, short = 'w')]
    pub whitespace: bool,

    /// Nominal volume, to compute results
    #[arg(long, short = 'n', value_parser = parse_decimal)]
    pub nominal: Option<f64>,

    /// Temperature for the correction factor (°C)
    #[arg(long, short = 't', value_parser = parse_decimal)]
    pub temperature: Option<f64>,
}

pub fn run(args: ParseArgs, global: &GlobalOpts) -> Result<()> {
    let text = args.text.join(", ");
    let delimiters = if args.whitespace {
        Delimiters::CommaOrWhitespace
    } else {
        Delimiters::Comma
    };
    let parsed = readings::parse_with(&text, delimiters);
    let factor = correction::factor_for(
        args.temperature
            .unwrap_or(correction::DEFAULT_TEMPERATURE),
    );
    let statistics = stats::compute(&parsed.slots, args.nominal, factor).map(|s| s.rounded());

    match global.format {
        OutputFormat::Json => {
            let value = serde_json::json!({
                "values": parsed.values(),
                "rejected": parsed.rejected,
                "truncated": parsed.truncated,
                "factor": factor,
                "statistics": statistics,
            });
            println!("{}", serde_json::to_string_pretty(&value).into_diagnostic()?);
        }
        _ => {
            println!(
                "{} {} value(s): {}",
                style("✓").green(),
                parsed.valid_count(),
                readings::to_text(&parsed.slots)
            );
            for token in &parsed.rejected {
                println!("{} rejected '{}'", style("✗").red(), token);
            }
            if parsed.truncated > 0 {
                println!(
                    "{} {} value(s) beyond the tenth dropped",
                    style("!").yellow(),
                    parsed.truncated
                );
            }
            if let Some(s) = statistics {
                println!("{}", style("─".repeat(60)).dim());
                println!("Z            {}", format::factor(Some(factor)));
                println!("mean mass    {} mg", format::number(Some(s.mean_mass)));
                println!("mean volume  {}", format::number(Some(s.mean_volume)));
                println!(
                    "inexatidão   {} ({}%)",
                    format::number(Some(s.accuracy_absolute)),
                    format::number(Some(s.accuracy_percent))
                );
                println!("sd           {}", format::number(Some(s.standard_deviation)));
                println!("cv           {}%", format::number(Some(s.coefficient_of_variation)));
            }
        }
    }
    Ok(())
}

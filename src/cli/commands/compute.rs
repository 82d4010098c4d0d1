//! `calcert compute` command - Computed results of a draft

use console::style;
use miette::{IntoDiagnostic, Result};
use serde::Serialize;
use tabled::Tabled;

use crate::cli::helpers::Workspace;
use crate::cli::output::{self, effective_format};
use crate::cli::{GlobalOpts, OutputFormat};
use crate::core::format;
use crate::entities::draft::CertificateDraft;
use crate::render::layout;

#[derive(clap::Args, Debug)]
pub struct ComputeArgs {
    /// Draft id, id prefix, @N or file path
    pub draft: String,

    /// Include points without readings
    #[arg(long, short = 'a')]
    pub all: bool,
}

/// Results of one point, in certificate order
#[derive(Debug, Clone, Serialize)]
pub struct ResultRow {
    pub group: String,
    pub number: usize,
    pub point: u32,
    pub nominal: Option<f64>,
    pub unit: String,
    pub readings: usize,
    pub mean_mass: Option<f64>,
    pub mean_volume: Option<f64>,
    pub accuracy: Option<f64>,
    pub accuracy_percent: Option<f64>,
    pub standard_deviation: Option<f64>,
    pub cv_percent: Option<f64>,
}

#[derive(Tabled)]
struct ResultCells {
    #[tabled(rename = "GROUP")]
    group: String,
    #[tabled(rename = "#")]
    number: usize,
    #[tabled(rename = "NOMINAL")]
    nominal: String,
    #[tabled(rename = "N")]
    readings: usize,
    #[tabled(rename = "MASS (mg)")]
    mean_mass: String,
    #[tabled(rename = "VOLUME")]
    mean_volume: String,
    #[tabled(rename = "INEXATIDÃO")]
    accuracy: String,
    #[tabled(rename = "%")]
    accuracy_percent: String,
    #[tabled(rename = "SD")]
    standard_deviation: String,
    #[tabled(rename = "CV %")]
    cv_percent: String,
}

impl From<&ResultRow> for ResultCells {
    fn from(row: &ResultRow) -> Self {
        Self {
            group: row.group.clone(),
            number: row.number,
            nominal: row
                .nominal
                .map(|v| format!("{}{}", format::volume(v), row.unit))
                .unwrap_or_else(|| "-".to_string()),
            readings: row.readings,
            mean_mass: format::number(row.mean_mass),
            mean_volume: format::number(row.mean_volume),
            accuracy: format::number(row.accuracy),
            accuracy_percent: format::number(row.accuracy_percent),
            standard_deviation: format::number(row.standard_deviation),
            cv_percent: format::number(row.cv_percent),
        }
    }
}

/// Result rows of a draft, grouped and numbered as on the certificate
pub fn result_rows(draft: &CertificateDraft, include_empty: bool) -> Vec<ResultRow> {
    let mut rows = Vec::new();
    for group in layout::groups(&draft.equipment) {
        let title = group
            .title
            .as_deref()
            .map(|t| t.trim_end_matches(':').to_string())
            .unwrap_or_default();
        for (i, point) in group.points.iter().enumerate() {
            let stats = point.statistics;
            if stats.is_none() && !include_empty {
                continue;
            }
            rows.push(ResultRow {
                group: title.clone(),
                number: i + 1,
                point: point.id,
                nominal: point.nominal_volume,
                unit: point.unit.to_string(),
                readings: point.valid_count(),
                mean_mass: stats.map(|s| s.mean_mass),
                mean_volume: stats.map(|s| s.mean_volume),
                accuracy: stats.map(|s| s.accuracy_absolute),
                accuracy_percent: stats.map(|s| s.accuracy_percent),
                standard_deviation: stats.map(|s| s.standard_deviation),
                cv_percent: stats.map(|s| s.coefficient_of_variation),
            });
        }
    }
    rows
}

pub fn run(args: ComputeArgs, global: &GlobalOpts) -> Result<()> {
    let ws = Workspace::open()?;
    let stored = ws.get(&args.draft)?;
    let draft = &stored.draft;
    let rows = result_rows(draft, args.all);

    match effective_format(global.format, true) {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&rows).into_diagnostic()?);
        }
        OutputFormat::Yaml => print!("{}", serde_yml::to_string(&rows).into_diagnostic()?),
        OutputFormat::Csv => print!("{}", output::delimited(&rows, b',')?),
        OutputFormat::Tsv => print!("{}", output::delimited(&rows, b'\t')?),
        OutputFormat::Id => {
            for row in &rows {
                println!("{}", row.point);
            }
        }
        _ => {
            if !global.quiet {
                println!(
                    "{} {}  {} °C  Z = {} µL/mg",
                    style(draft.id.to_string()).cyan(),
                    draft.equipment,
                    format::volume(draft.environment.temperature),
                    format::factor(Some(draft.correction_factor))
                );
            }
            if rows.is_empty() {
                println!("No points with readings yet.");
            } else {
                let cells: Vec<ResultCells> = rows.iter().map(ResultCells::from).collect();
                println!("{}", output::table(&cells));
            }
        }
    }
    Ok(())
}

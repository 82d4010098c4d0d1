//! `calcert point` command - Calibration points and readings

use clap::Subcommand;
use console::style;
use miette::Result;

use crate::cli::helpers::{self, parse_decimal, Workspace};
use crate::cli::GlobalOpts;
use crate::core::format;
use crate::core::store;
use crate::entities::draft::DraftAction;
use crate::entities::point::{CalibrationPoint, Unit};

#[derive(Subcommand, Debug)]
pub enum PointCommands {
    /// Add a calibration point
    Add(AddArgs),

    /// Remove a calibration point (a whole channel on multichannel pipettes)
    Rm(RmArgs),

    /// Set the nominal volume of a point
    Nominal(NominalArgs),

    /// Set the volume unit of a point
    Unit(UnitArgs),

    /// Set the readings of a point from text ("99.8, 99.9, 100.1")
    Readings(ReadingsArgs),

    /// Set a single reading slot
    Reading(ReadingArgs),
}

#[derive(clap::Args, Debug)]
pub struct AddArgs {
    /// Draft id, id prefix, @N or file path
    pub draft: String,

    /// Syringe to add the point to (repipetters)
    #[arg(long, short = 's')]
    pub syringe: Option<u32>,

    /// Nominal volume of the new point
    #[arg(long, short = 'n', value_parser = parse_decimal)]
    pub nominal: Option<f64>,
}

#[derive(clap::Args, Debug)]
pub struct RmArgs {
    pub draft: String,

    /// Point id
    pub point: u32,
}

#[derive(clap::Args, Debug)]
pub struct NominalArgs {
    pub draft: String,

    /// Point id
    pub point: u32,

    /// Volume, or "none" to clear
    pub volume: String,
}

#[derive(clap::Args, Debug)]
pub struct UnitArgs {
    pub draft: String,

    /// Point id
    pub point: u32,

    /// uL or mL
    pub unit: Unit,
}

#[derive(clap::Args, Debug)]
pub struct ReadingsArgs {
    pub draft: String,

    /// Point id
    pub point: u32,

    /// Mass readings in mg, separated by commas; separate arguments are separate readings
    #[arg(required = true, num_args = 1.., allow_negative_numbers = true)]
    pub text: Vec<String>,
}

#[derive(clap::Args, Debug)]
pub struct ReadingArgs {
    pub draft: String,

    /// Point id
    pub point: u32,

    /// Slot, 1 to 10
    pub slot: usize,

    /// Mass in mg, or "none" to clear
    pub value: String,
}

pub fn run(cmd: PointCommands, global: &GlobalOpts) -> Result<()> {
    match cmd {
        PointCommands::Add(args) => run_add(args, global),
        PointCommands::Rm(args) => run_rm(args, global),
        PointCommands::Nominal(args) => run_nominal(args, global),
        PointCommands::Unit(args) => run_unit(args, global),
        PointCommands::Readings(args) => run_readings(args, global),
        PointCommands::Reading(args) => run_reading(args, global),
    }
}

/// A number, or `None` for "none", "-" and the empty string
pub fn optional_number(value: &str) -> Result<Option<f64>> {
    match value.trim().to_lowercase().as_str() {
        "" | "-" | "none" => Ok(None),
        other => parse_decimal(other)
            .map(Some)
            .map_err(|e| miette::miette!("{}", e)),
    }
}

/// One-line summary of a point's readings and results
pub fn print_point_result(point: &CalibrationPoint) {
    let readings = point.readings_text();
    println!(
        "  {} {}  [{}/10]  {}",
        style(format!("#{}", point.id)).bold(),
        point.nominal_label(),
        point.valid_count(),
        if readings.is_empty() {
            style("no readings".to_string()).dim()
        } else {
            style(readings).dim()
        }
    );
    if let Some(s) = &point.statistics {
        println!(
            "     mean {}{unit}  inexatidão {}{unit} ({}%)  sd {}{unit}  cv {}%",
            format::number(Some(s.mean_volume)),
            format::number(Some(s.accuracy_absolute)),
            format::number(Some(s.accuracy_percent)),
            format::number(Some(s.standard_deviation)),
            format::number(Some(s.coefficient_of_variation)),
            unit = point.unit,
        );
    }
}

fn run_add(args: AddArgs, global: &GlobalOpts) -> Result<()> {
    let ws = Workspace::open()?;
    let stored = ws.get(&args.draft)?;
    let mut autofill = ws.autofill(global);

    let added = stored
        .draft
        .apply(
            DraftAction::AddPoint {
                syringe: args.syringe,
            },
            &mut autofill,
        )
        .map_err(|e| miette::miette!("{}", e))?;
    let id = added.created;
    let mut draft = added.draft;

    if let (Some(point), Some(volume)) = (id, args.nominal) {
        draft = draft
            .apply(
                DraftAction::SetNominal {
                    point,
                    volume: Some(volume),
                },
                &mut autofill,
            )
            .map_err(|e| miette::miette!("{}", e))?
            .draft;
    }

    store::write(&stored.path, &draft).map_err(|e| miette::miette!("{}", e))?;
    match id {
        Some(id) => helpers::success(global, format!("Added point {}", id)),
        None => helpers::success(global, "Added points"),
    }
    Ok(())
}

fn run_rm(args: RmArgs, global: &GlobalOpts) -> Result<()> {
    let ws = Workspace::open()?;
    ws.apply(&args.draft, DraftAction::RemovePoint(args.point), global)?;
    helpers::success(global, format!("Removed point {}", args.point));
    Ok(())
}

fn run_nominal(args: NominalArgs, global: &GlobalOpts) -> Result<()> {
    let ws = Workspace::open()?;
    let volume = optional_number(&args.volume)?;
    let transition = ws.apply(
        &args.draft,
        DraftAction::SetNominal {
            point: args.point,
            volume,
        },
        global,
    )?;
    if !global.quiet {
        if let Some(point) = transition.draft.equipment.find_point(args.point) {
            print_point_result(point);
        }
    }
    Ok(())
}

fn run_unit(args: UnitArgs, global: &GlobalOpts) -> Result<()> {
    let ws = Workspace::open()?;
    ws.apply(
        &args.draft,
        DraftAction::SetUnit {
            point: args.point,
            unit: args.unit,
        },
        global,
    )?;
    helpers::success(global, format!("Point {} now in {}", args.point, args.unit));
    Ok(())
}

fn run_readings(args: ReadingsArgs, global: &GlobalOpts) -> Result<()> {
    let ws = Workspace::open()?;
    let text = args.text.join(", ");
    let transition = ws.apply(
        &args.draft,
        DraftAction::SetReadings {
            point: args.point,
            text,
        },
        global,
    )?;
    if !global.quiet {
        if let Some(point) = transition.draft.equipment.find_point(args.point) {
            print_point_result(point);
        }
    }
    Ok(())
}

fn run_reading(args: ReadingArgs, global: &GlobalOpts) -> Result<()> {
    let ws = Workspace::open()?;
    let value = optional_number(&args.value)?;
    let transition = ws.apply(
        &args.draft,
        DraftAction::SetReading {
            point: args.point,
            slot: args.slot,
            value,
        },
        global,
    )?;
    if !global.quiet {
        if let Some(point) = transition.draft.equipment.find_point(args.point) {
            print_point_result(point);
        }
    }
    Ok(())
}

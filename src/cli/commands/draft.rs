//! `calcert draft` command - Certificate draft management

use chrono::{Local, NaiveDate};
use clap::Subcommand;
use console::style;
use dialoguer::theme::ColorfulTheme;
use dialoguer::{Confirm, Input, Select};
use miette::{IntoDiagnostic, Result};
use serde::Serialize;
use tabled::Tabled;

use crate::cli::helpers::{self, parse_date, parse_decimal, parse_range, Workspace};
use crate::cli::output;
use crate::cli::{GlobalOpts, OutputFormat};
use crate::core::format;
use crate::core::store::{self, StoredDraft};
use crate::entities::draft::{
    CertificateDraft, ChannelCount, DraftAction, DraftDetails, DraftStatus, EquipmentKind,
    InstrumentKind, RangeValue,
};
use crate::entities::point::CalibrationPoint;
use crate::schema::validator::check_draft;

#[derive(Subcommand, Debug)]
pub enum DraftCommands {
    /// Create a new draft
    New(NewArgs),

    /// List drafts
    List(ListArgs),

    /// Show a draft
    Show(ShowArgs),

    /// Edit a draft file in your editor
    Edit(EditArgs),

    /// Delete a draft
    Delete(DeleteArgs),

    /// Change fields of a draft
    Set(SetArgs),

    /// Start the next certificate from a draft (new draft, same client and conditions)
    Reset(ResetArgs),
}

/// Header fields shared by `new` and `set`
#[derive(clap::Args, Debug, Default)]
pub struct DetailArgs {
    /// Certificate number, e.g. 123.45
    #[arg(long)]
    pub number: Option<String>,

    /// Client name
    #[arg(long)]
    pub client: Option<String>,

    #[arg(long)]
    pub street: Option<String>,

    /// Street number
    #[arg(long = "street-number")]
    pub street_number: Option<String>,

    #[arg(long)]
    pub district: Option<String>,

    #[arg(long)]
    pub city: Option<String>,

    /// State (UF)
    #[arg(long)]
    pub state: Option<String>,

    /// Postal code (CEP)
    #[arg(long)]
    pub cep: Option<String>,

    #[arg(long)]
    pub manufacturer: Option<String>,

    #[arg(long)]
    pub model: Option<String>,

    /// Serial number
    #[arg(long)]
    pub serial: Option<String>,

    /// Identification number
    #[arg(long)]
    pub identification: Option<String>,

    /// Capacity, e.g. 1000uL
    #[arg(long, value_parser = parse_range)]
    pub capacity: Option<RangeValue>,

    /// Indication range (defaults to the capacity on the certificate)
    #[arg(long, value_parser = parse_range)]
    pub indication_range: Option<RangeValue>,

    /// Calibrated range (defaults to the capacity on the certificate)
    #[arg(long, value_parser = parse_range)]
    pub calibrated_range: Option<RangeValue>,

    /// Calibration date (YYYY-MM-DD or DD/MM/YYYY)
    #[arg(long, value_parser = parse_date)]
    pub date: Option<NaiveDate>,

    /// Issue date, defaults to the calibration date
    #[arg(long, value_parser = parse_date)]
    pub issue_date: Option<NaiveDate>,

    /// Laboratory temperature (°C)
    #[arg(long, short = 't', value_parser = parse_decimal)]
    pub temperature: Option<f64>,

    /// Relative humidity (%)
    #[arg(long, value_parser = parse_decimal)]
    pub humidity: Option<f64>,
}

impl DetailArgs {
    fn details(&self) -> DraftDetails {
        DraftDetails {
            calibration_date: self.date,
            issue_date: self.issue_date,
            client_name: self.client.clone(),
            street: self.street.clone(),
            number: self.street_number.clone(),
            district: self.district.clone(),
            city: self.city.clone(),
            state: self.state.clone(),
            postal_code: self.cep.clone(),
            manufacturer: self.manufacturer.clone(),
            model: self.model.clone(),
            serial_number: self.serial.clone(),
            identification: self.identification.clone(),
            capacity: self.capacity.clone(),
            indication_range: self.indication_range.clone(),
            calibrated_range: self.calibrated_range.clone(),
            status: None,
        }
    }

    /// Actions for every field given, in a fixed order
    fn actions(&self) -> Vec<DraftAction> {
        let mut actions = Vec::new();
        let details = self.details();
        if !details.is_empty() {
            actions.push(DraftAction::SetDetails(Box::new(details)));
        }
        if let Some(number) = &self.number {
            actions.push(DraftAction::SetCertificateNumber(number.clone()));
        }
        if let Some(t) = self.temperature {
            actions.push(DraftAction::SetTemperature(t));
        }
        if let Some(h) = self.humidity {
            actions.push(DraftAction::SetHumidity(h));
        }
        actions
    }
}

#[derive(clap::Args, Debug)]
pub struct NewArgs {
    /// Equipment type
    #[arg(long, short = 'e', value_enum, default_value_t = EquipmentKind::Micropipette)]
    pub equipment: EquipmentKind,

    /// Channel layout (micropipettes)
    #[arg(long, value_enum)]
    pub instrument: Option<InstrumentKind>,

    /// Channels of a multichannel pipette (8 or 12)
    #[arg(long)]
    pub channels: Option<u8>,

    #[command(flatten)]
    pub details: DetailArgs,

    /// Interactive mode (prompt for fields)
    #[arg(long, short = 'i')]
    pub interactive: bool,

    /// Open in editor after creation
    #[arg(long)]
    pub edit: bool,
}

#[derive(clap::Args, Debug)]
pub struct ListArgs {
    /// Filter by status
    #[arg(long, value_enum)]
    pub status: Option<DraftStatus>,

    /// Search in client, manufacturer, model and serial number
    #[arg(long)]
    pub search: Option<String>,

    /// Show only count
    #[arg(long)]
    pub count: bool,
}

#[derive(clap::Args, Debug)]
pub struct ShowArgs {
    /// Draft id, id prefix, @N or file path
    pub id: String,
}

#[derive(clap::Args, Debug)]
pub struct EditArgs {
    /// Draft id, id prefix, @N or file path
    pub id: String,
}

#[derive(clap::Args, Debug)]
pub struct DeleteArgs {
    /// Draft id, id prefix, @N or file path
    pub id: String,

    /// Do not ask for confirmation
    #[arg(long, short = 'y')]
    pub yes: bool,
}

#[derive(clap::Args, Debug)]
pub struct SetArgs {
    /// Draft id, id prefix, @N or file path
    pub id: String,

    #[command(flatten)]
    pub details: DetailArgs,

    /// Move the temperature by this many degrees (multiples of 0.5)
    #[arg(long, value_parser = parse_decimal, allow_hyphen_values = true)]
    pub step_temperature: Option<f64>,

    /// Switch the equipment type (resets the points)
    #[arg(long, value_enum)]
    pub equipment: Option<EquipmentKind>,

    /// Switch between monochannel and multichannel
    #[arg(long, value_enum)]
    pub instrument: Option<InstrumentKind>,

    /// Channels of a multichannel pipette (8 or 12)
    #[arg(long)]
    pub channels: Option<u8>,

    /// Points per channel of a multichannel pipette (1 to 10)
    #[arg(long)]
    pub points_per_channel: Option<u32>,

    /// Auto-fill of readings
    #[arg(long)]
    pub automation: Option<bool>,

    #[arg(long, value_enum)]
    pub status: Option<DraftStatus>,
}

#[derive(clap::Args, Debug)]
pub struct ResetArgs {
    /// Draft id, id prefix, @N or file path
    pub id: String,
}

pub fn run(cmd: DraftCommands, global: &GlobalOpts) -> Result<()> {
    match cmd {
        DraftCommands::New(args) => run_new(args, global),
        DraftCommands::List(args) => run_list(args, global),
        DraftCommands::Show(args) => run_show(args, global),
        DraftCommands::Edit(args) => run_edit(args, global),
        DraftCommands::Delete(args) => run_delete(args, global),
        DraftCommands::Set(args) => run_set(args, global),
        DraftCommands::Reset(args) => run_reset(args, global),
    }
}

fn channel_count(channels: u8) -> Result<ChannelCount> {
    ChannelCount::try_from(channels).map_err(|e| miette::miette!("{}", e))
}

/// Shape actions in dependency order: equipment, then instrument, then channels
fn shape_actions(
    equipment: Option<EquipmentKind>,
    instrument: Option<InstrumentKind>,
    channels: Option<u8>,
) -> Result<Vec<DraftAction>> {
    let mut actions = Vec::new();
    if let Some(kind) = equipment {
        actions.push(DraftAction::SetEquipment(kind));
    }
    let instrument = match (instrument, channels) {
        (None, Some(_)) => Some(InstrumentKind::Multichannel),
        (instrument, _) => instrument,
    };
    if let Some(kind) = instrument {
        actions.push(DraftAction::SetInstrument(kind));
    }
    if let Some(n) = channels {
        actions.push(DraftAction::SetChannelCount(channel_count(n)?));
    }
    Ok(actions)
}

/// Apply actions one after the other, stopping at the first error
fn apply_all(
    draft: CertificateDraft,
    actions: Vec<DraftAction>,
    ws: &Workspace,
    global: &GlobalOpts,
) -> Result<CertificateDraft> {
    let mut autofill = ws.autofill(global);
    let mut draft = draft;
    for action in actions {
        let transition = draft
            .apply(action, &mut autofill)
            .map_err(|e| miette::miette!("{}", e))?;
        helpers::report(&transition, global);
        draft = transition.draft;
    }
    Ok(draft)
}

fn prompt_text(theme: &ColorfulTheme, prompt: &str) -> Result<Option<String>> {
    let value: String = Input::with_theme(theme)
        .with_prompt(prompt)
        .allow_empty(true)
        .interact_text()
        .into_diagnostic()?;
    let value = value.trim().to_string();
    Ok(if value.is_empty() { None } else { Some(value) })
}

/// Ask for the draft shape and header fields
fn prompt_new(args: &mut NewArgs) -> Result<()> {
    let theme = ColorfulTheme::default();

    let kinds = [
        EquipmentKind::Micropipette,
        EquipmentKind::Burette,
        EquipmentKind::Repipetter,
    ];
    let selected = Select::with_theme(&theme)
        .with_prompt("Equipment")
        .items(&kinds)
        .default(0)
        .interact()
        .into_diagnostic()?;
    args.equipment = kinds[selected];

    if args.equipment == EquipmentKind::Micropipette {
        let layouts = [InstrumentKind::Monochannel, InstrumentKind::Multichannel];
        let selected = Select::with_theme(&theme)
            .with_prompt("Channels")
            .items(&layouts)
            .default(0)
            .interact()
            .into_diagnostic()?;
        args.instrument = Some(layouts[selected]);
        if layouts[selected] == InstrumentKind::Multichannel {
            let counts = [8u8, 12];
            let selected = Select::with_theme(&theme)
                .with_prompt("Channel count")
                .items(&counts)
                .default(0)
                .interact()
                .into_diagnostic()?;
            args.channels = Some(counts[selected]);
        }
    }

    let number: String = Input::with_theme(&theme)
        .with_prompt("Certificate number (e.g. 123.45)")
        .allow_empty(true)
        .validate_with(|input: &String| -> std::result::Result<(), String> {
            if input.trim().is_empty() || format::is_valid_certificate_number(input.trim()) {
                Ok(())
            } else {
                Err("expected digits, a dot and optional digits".to_string())
            }
        })
        .interact_text()
        .into_diagnostic()?;
    if !number.trim().is_empty() {
        args.details.number = Some(number.trim().to_string());
    }

    let details = &mut args.details;
    details.client = prompt_text(&theme, "Client")?;
    details.manufacturer = prompt_text(&theme, "Manufacturer")?;
    details.model = prompt_text(&theme, "Model")?;
    details.serial = prompt_text(&theme, "Serial number")?;
    details.identification = prompt_text(&theme, "Identification")?;
    if args.equipment != EquipmentKind::Repipetter {
        if let Some(capacity) = prompt_text(&theme, "Capacity (e.g. 1000uL)")? {
            details.capacity = Some(parse_range(&capacity).map_err(|e| miette::miette!("{}", e))?);
        }
    }

    let temperature: String = Input::with_theme(&theme)
        .with_prompt("Temperature (°C)")
        .default("20".to_string())
        .validate_with(|input: &String| parse_decimal(input).map(|_| ()))
        .interact_text()
        .into_diagnostic()?;
    details.temperature = parse_decimal(&temperature).ok();
    Ok(())
}

fn run_new(mut args: NewArgs, global: &GlobalOpts) -> Result<()> {
    let ws = Workspace::open()?;

    if args.interactive {
        prompt_new(&mut args)?;
    }

    let date = args
        .details
        .date
        .unwrap_or_else(|| Local::now().date_naive());
    let draft = CertificateDraft::new(ws.config.author(), date);

    let mut actions = shape_actions(Some(args.equipment), args.instrument, args.channels)?;
    actions.extend(args.details.actions());
    let draft = apply_all(draft, actions, &ws, global)?;

    let path = ws.store.save(&draft).map_err(|e| miette::miette!("{}", e))?;
    tracing::info!(id = %draft.id, "created draft");

    match global.format {
        OutputFormat::Id => println!("{}", draft.id),
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&draft).into_diagnostic()?)
        }
        _ if global.quiet => {}
        _ => {
            println!(
                "{} Created draft {}",
                style("✓").green(),
                style(draft.id.to_string()).cyan()
            );
            println!("   {}", style(path.display()).dim());
            println!("   {}", draft.equipment);
        }
    }

    if args.edit {
        helpers::run_editor(&ws.config, &path)?;
        store::load(&path).map_err(|e| miette::miette!("{}", e))?;
    }
    Ok(())
}

#[derive(Debug, Serialize, Tabled)]
struct DraftRow {
    #[tabled(rename = "#")]
    index: String,
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "NUMBER")]
    number: String,
    #[tabled(rename = "EQUIPMENT")]
    equipment: String,
    #[tabled(rename = "SERIAL")]
    serial: String,
    #[tabled(rename = "CLIENT")]
    client: String,
    #[tabled(rename = "DATE")]
    date: String,
    #[tabled(rename = "POINTS")]
    points: String,
    #[tabled(rename = "STATUS")]
    status: String,
}

impl DraftRow {
    fn new(index: usize, stored: &StoredDraft) -> Self {
        let draft = &stored.draft;
        let total = draft.equipment.points().count();
        let measured = draft
            .equipment
            .points()
            .filter(|p| p.statistics.is_some())
            .count();
        Self {
            index: format!("@{}", index),
            id: draft.id.to_string(),
            number: draft.certificate_number.clone(),
            equipment: draft.equipment.to_string(),
            serial: helpers::truncate_str(&draft.serial_number, 16),
            client: helpers::truncate_str(&draft.client.name, 24),
            date: format::date(draft.calibration_date),
            points: format!("{}/{}", measured, total),
            status: draft.status.to_string(),
        }
    }
}

fn matches_search(draft: &CertificateDraft, search: &str) -> bool {
    let needle = search.to_lowercase();
    [
        &draft.client.name,
        &draft.manufacturer,
        &draft.model,
        &draft.serial_number,
        &draft.certificate_number,
    ]
    .iter()
    .any(|field| field.to_lowercase().contains(&needle))
}

fn run_list(args: ListArgs, global: &GlobalOpts) -> Result<()> {
    let ws = Workspace::open()?;

    // Indexes follow the position in the full list so @N stays stable under filters
    let rows: Vec<(usize, StoredDraft)> = ws
        .store
        .list()
        .into_iter()
        .enumerate()
        .map(|(i, stored)| (i + 1, stored))
        .filter(|(_, s)| args.status.map_or(true, |status| s.draft.status == status))
        .filter(|(_, s)| {
            args.search
                .as_deref()
                .map_or(true, |search| matches_search(&s.draft, search))
        })
        .collect();

    if args.count {
        println!("{}", rows.len());
        return Ok(());
    }

    if rows.is_empty() {
        if !global.quiet {
            println!("No drafts found.");
        }
        return Ok(());
    }

    match global.format {
        OutputFormat::Id => {
            for (_, stored) in &rows {
                println!("{}", stored.draft.id);
            }
            Ok(())
        }
        format => {
            let table: Vec<DraftRow> = rows.iter().map(|(i, s)| DraftRow::new(*i, s)).collect();
            output::print_rows(&table, format)
        }
    }
}

fn run_show(args: ShowArgs, global: &GlobalOpts) -> Result<()> {
    let ws = Workspace::open()?;
    let stored = ws.get(&args.id)?;
    let draft = &stored.draft;

    match global.format {
        OutputFormat::Yaml => {
            print!("{}", store::to_yaml(draft).map_err(|e| miette::miette!("{}", e))?);
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(draft).into_diagnostic()?);
        }
        OutputFormat::Id => println!("{}", draft.id),
        _ => print_draft(draft, &stored.path),
    }
    Ok(())
}

fn or_dash(value: &str) -> String {
    if value.trim().is_empty() {
        "-".to_string()
    } else {
        value.to_string()
    }
}

/// Human-readable summary of a draft
fn print_draft(draft: &CertificateDraft, path: &std::path::Path) {
    println!("{}", style("─".repeat(60)).dim());
    println!(
        "{}: {}",
        style("ID").bold(),
        style(draft.id.to_string()).cyan()
    );
    println!(
        "{}: {}",
        style("Certificate").bold(),
        style(or_dash(&draft.certificate_number)).yellow()
    );
    println!("{}: {}", style("Status").bold(), draft.status);
    println!("{}: {}", style("Equipment").bold(), draft.equipment);
    println!("{}: {}", style("File").bold(), style(path.display()).dim());
    println!("{}", style("─".repeat(60)).dim());

    println!("{}: {}", style("Client").bold(), or_dash(&draft.client.name));
    if !draft.client.address.is_empty() {
        println!("{}: {}", style("Address").bold(), draft.client.address);
    }
    println!("{}: {}", style("Manufacturer").bold(), or_dash(&draft.manufacturer));
    println!("{}: {}", style("Model").bold(), or_dash(&draft.model));
    println!("{}: {}", style("Serial").bold(), or_dash(&draft.serial_number));
    println!(
        "{}: {}",
        style("Identification").bold(),
        or_dash(&draft.identification)
    );
    if let Some(ranges) = draft.equipment.ranges() {
        if let Some(capacity) = &ranges.capacity {
            println!("{}: {}", style("Capacity").bold(), capacity);
        }
    }
    println!(
        "{}: {}  (issued {})",
        style("Calibrated").bold(),
        format::date(draft.calibration_date),
        format::date(draft.issue_date())
    );
    println!(
        "{}: {} °C, {} %  (Z = {} µL/mg)",
        style("Conditions").bold(),
        format::volume(draft.environment.temperature),
        format::volume(draft.environment.relative_humidity),
        format::factor(Some(draft.correction_factor))
    );
    println!(
        "{}: {}",
        style("Automation").bold(),
        if draft.automation { "on" } else { "off" }
    );

    println!();
    println!("{}:", style("Points").bold());
    if let Some(syringes) = draft.equipment.syringes() {
        for syringe in syringes {
            println!("  {} #{}", style(syringe.title()).bold(), syringe.id);
            for point in &syringe.points {
                print_point(point, "    ");
            }
        }
    } else {
        for point in draft.equipment.points() {
            print_point(point, "  ");
        }
    }

    let warnings = check_draft(draft);
    if !warnings.is_empty() {
        println!();
        for warning in warnings {
            println!("{} {}", style("!").yellow(), warning);
        }
    }
}

fn print_point(point: &CalibrationPoint, indent: &str) {
    let channel = point
        .channel
        .map(|c| format!(" ch{}", c))
        .unwrap_or_default();
    let nominal = point.nominal_label();
    let stats = match &point.statistics {
        Some(s) => format!(
            "mean {}  acc {}  sd {}",
            format::number(Some(s.mean_volume)),
            format::number(Some(s.accuracy_absolute)),
            format::number(Some(s.standard_deviation))
        ),
        None => style("no readings").dim().to_string(),
    };
    println!(
        "{}#{}{} {:>10}  [{}/10]  {}",
        indent,
        point.id,
        channel,
        if nominal.is_empty() { "-".to_string() } else { nominal },
        point.valid_count(),
        stats
    );
}

fn run_edit(args: EditArgs, global: &GlobalOpts) -> Result<()> {
    let ws = Workspace::open()?;
    let path = ws
        .store
        .resolve(&args.id)
        .map_err(|e| miette::miette!("{}", e))?;

    helpers::run_editor(&ws.config, &path)?;

    // Re-read to restore derived statistics; syntax errors keep the edited file
    match store::load(&path) {
        Ok(draft) => {
            store::write(&path, &draft).map_err(|e| miette::miette!("{}", e))?;
            helpers::success(global, format!("Saved {}", draft.id));
            Ok(())
        }
        Err(store::StoreError::Load { source, .. }) => Err(miette::Report::new(source)),
        Err(e) => Err(miette::miette!("{}", e)),
    }
}

fn run_delete(args: DeleteArgs, global: &GlobalOpts) -> Result<()> {
    let ws = Workspace::open()?;
    let stored = ws.get(&args.id)?;

    if !args.yes {
        let confirmed = Confirm::with_theme(&ColorfulTheme::default())
            .with_prompt(format!(
                "Delete draft {} ({})?",
                stored.draft.id,
                stored.draft.title()
            ))
            .default(false)
            .interact()
            .into_diagnostic()?;
        if !confirmed {
            println!("Cancelled.");
            return Ok(());
        }
    }

    ws.store
        .delete(&stored.path)
        .map_err(|e| miette::miette!("{}", e))?;
    helpers::success(global, format!("Deleted {}", stored.draft.id));
    Ok(())
}

fn run_set(args: SetArgs, global: &GlobalOpts) -> Result<()> {
    let ws = Workspace::open()?;
    let stored = ws.get(&args.id)?;

    let mut actions = shape_actions(args.equipment, args.instrument, args.channels)?;
    if let Some(n) = args.points_per_channel {
        actions.push(DraftAction::SetPointsPerChannel(n));
    }
    actions.extend(args.details.actions());
    if let Some(step) = args.step_temperature {
        actions.push(DraftAction::StepTemperature(step));
    }
    if let Some(automation) = args.automation {
        actions.push(DraftAction::SetAutomation(automation));
    }
    if let Some(status) = args.status {
        actions.push(DraftAction::SetDetails(Box::new(DraftDetails {
            status: Some(status),
            ..DraftDetails::default()
        })));
    }

    if actions.is_empty() {
        return Err(miette::miette!(
            help = "see `calcert draft set --help` for the fields that can be set",
            "nothing to change"
        ));
    }

    let draft = apply_all(stored.draft, actions, &ws, global)?;
    store::write(&stored.path, &draft).map_err(|e| miette::miette!("{}", e))?;
    helpers::success(global, format!("Updated {}", draft.id));
    Ok(())
}

fn run_reset(args: ResetArgs, global: &GlobalOpts) -> Result<()> {
    let ws = Workspace::open()?;
    let stored = ws.get(&args.id)?;
    let draft = apply_all(stored.draft, vec![DraftAction::ResetForNext], &ws, global)?;
    let path = ws.store.save(&draft).map_err(|e| miette::miette!("{}", e))?;

    match global.format {
        OutputFormat::Id => println!("{}", draft.id),
        _ if global.quiet => {}
        _ => {
            println!(
                "{} Created draft {} from {}",
                style("✓").green(),
                style(draft.id.to_string()).cyan(),
                args.id
            );
            println!("   {}", style(path.display()).dim());
        }
    }
    Ok(())
}

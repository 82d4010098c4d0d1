//! Certificate drafts
//!
//! A draft holds everything printed on one calibration certificate. It is
//! never edited in place: [`CertificateDraft::apply`] takes a [`DraftAction`]
//! and returns a new, validated draft with every statistic recomputed.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use thiserror::Error;

use crate::core::autofill::{Autofill, Notice};
use crate::core::correction;
use crate::core::format::{self, Address};
use crate::core::identity::DraftId;
use crate::core::readings::{self, Delimiters, ParsedReadings, READING_SLOTS};
use crate::entities::point::{CalibrationPoint, Syringe, Unit};

/// Upper bound of points per channel on multichannel pipettes
pub const MAX_POINTS_PER_CHANNEL: u32 = 10;

pub const DEFAULT_POINTS_PER_CHANNEL: u32 = 3;

/// Relative humidity of a new draft (%)
pub const DEFAULT_HUMIDITY: f64 = 50.0;

fn default_points_per_channel() -> u32 {
    DEFAULT_POINTS_PER_CHANNEL
}

fn default_factor() -> f64 {
    correction::DEFAULT_FACTOR
}

fn default_true() -> bool {
    true
}

// ============================================================================
// Equipment
// ============================================================================

/// Channel count of a multichannel pipette
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
#[derive(Default)]
pub enum ChannelCount {
    #[default]
    Eight,
    Twelve,
}

impl ChannelCount {
    pub fn get(self) -> u32 {
        match self {
            ChannelCount::Eight => 8,
            ChannelCount::Twelve => 12,
        }
    }
}

impl TryFrom<u8> for ChannelCount {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            8 => Ok(ChannelCount::Eight),
            12 => Ok(ChannelCount::Twelve),
            other => Err(format!("channel count must be 8 or 12, got {}", other)),
        }
    }
}

impl From<ChannelCount> for u8 {
    fn from(value: ChannelCount) -> Self {
        value.get() as u8
    }
}

impl fmt::Display for ChannelCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.get())
    }
}

/// Kind of equipment being calibrated
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum EquipmentKind {
    Micropipette,
    Burette,
    Repipetter,
}

impl fmt::Display for EquipmentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EquipmentKind::Micropipette => write!(f, "micropipette"),
            EquipmentKind::Burette => write!(f, "burette"),
            EquipmentKind::Repipetter => write!(f, "repipetter"),
        }
    }
}

/// Channel layout of a micropipette
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum InstrumentKind {
    Monochannel,
    Multichannel,
}

impl fmt::Display for InstrumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InstrumentKind::Monochannel => write!(f, "monochannel"),
            InstrumentKind::Multichannel => write!(f, "multichannel"),
        }
    }
}

/// A range value as written by the operator ("1000" µL)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RangeValue {
    pub value: String,
    #[serde(default)]
    pub unit: Unit,
}

impl fmt::Display for RangeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.value, self.unit)
    }
}

/// Capacity and ranges of a pipette or burette
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Ranges {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capacity: Option<RangeValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub indication_range: Option<RangeValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub calibrated_range: Option<RangeValue>,
}

impl Ranges {
    /// Indication range, falling back to the capacity
    pub fn indication(&self) -> Option<&RangeValue> {
        self.indication_range.as_ref().or(self.capacity.as_ref())
    }

    /// Calibrated range, falling back to the capacity
    pub fn calibrated(&self) -> Option<&RangeValue> {
        self.calibrated_range.as_ref().or(self.capacity.as_ref())
    }
}

/// Channel layout and points of a micropipette
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Instrument {
    Monochannel {
        points: Vec<CalibrationPoint>,
    },
    Multichannel {
        channel_count: ChannelCount,
        #[serde(default = "default_points_per_channel")]
        points_per_channel: u32,
        points: Vec<CalibrationPoint>,
    },
}

/// Equipment under calibration with its points
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Equipment {
    Micropipette {
        #[serde(default)]
        ranges: Ranges,
        instrument: Instrument,
    },
    Burette {
        #[serde(default)]
        ranges: Ranges,
        points: Vec<CalibrationPoint>,
    },
    Repipetter {
        syringes: Vec<Syringe>,
    },
}

impl Equipment {
    pub fn kind(&self) -> EquipmentKind {
        match self {
            Equipment::Micropipette { .. } => EquipmentKind::Micropipette,
            Equipment::Burette { .. } => EquipmentKind::Burette,
            Equipment::Repipetter { .. } => EquipmentKind::Repipetter,
        }
    }

    /// Burettes and repipetters are always monochannel
    pub fn instrument_kind(&self) -> InstrumentKind {
        match self {
            Equipment::Micropipette {
                instrument: Instrument::Multichannel { .. },
                ..
            } => InstrumentKind::Multichannel,
            _ => InstrumentKind::Monochannel,
        }
    }

    pub fn is_multichannel(&self) -> bool {
        self.instrument_kind() == InstrumentKind::Multichannel
    }

    /// Whether monochannel completion applies (single-channel pipettes, burettes)
    pub fn supports_completion(&self) -> bool {
        matches!(
            self,
            Equipment::Micropipette {
                instrument: Instrument::Monochannel { .. },
                ..
            } | Equipment::Burette { .. }
        )
    }

    pub fn ranges(&self) -> Option<&Ranges> {
        match self {
            Equipment::Micropipette { ranges, .. } | Equipment::Burette { ranges, .. } => {
                Some(ranges)
            }
            Equipment::Repipetter { .. } => None,
        }
    }

    pub fn ranges_mut(&mut self) -> Option<&mut Ranges> {
        match self {
            Equipment::Micropipette { ranges, .. } | Equipment::Burette { ranges, .. } => {
                Some(ranges)
            }
            Equipment::Repipetter { .. } => None,
        }
    }

    /// Points held directly by the equipment (not through syringes)
    pub fn point_list(&self) -> Option<&Vec<CalibrationPoint>> {
        match self {
            Equipment::Micropipette {
                instrument:
                    Instrument::Monochannel { points } | Instrument::Multichannel { points, .. },
                ..
            }
            | Equipment::Burette { points, .. } => Some(points),
            Equipment::Repipetter { .. } => None,
        }
    }

    fn point_list_mut(&mut self) -> Option<&mut Vec<CalibrationPoint>> {
        match self {
            Equipment::Micropipette {
                instrument:
                    Instrument::Monochannel { points } | Instrument::Multichannel { points, .. },
                ..
            }
            | Equipment::Burette { points, .. } => Some(points),
            Equipment::Repipetter { .. } => None,
        }
    }

    pub fn syringes(&self) -> Option<&Vec<Syringe>> {
        match self {
            Equipment::Repipetter { syringes } => Some(syringes),
            _ => None,
        }
    }

    /// Every calibration point, syringe points included
    pub fn points(&self) -> Box<dyn Iterator<Item = &CalibrationPoint> + '_> {
        match self {
            Equipment::Repipetter { syringes } => {
                Box::new(syringes.iter().flat_map(|s| s.points.iter()))
            }
            _ => Box::new(self.point_list().into_iter().flatten()),
        }
    }

    pub fn points_mut(&mut self) -> Box<dyn Iterator<Item = &mut CalibrationPoint> + '_> {
        match self {
            Equipment::Repipetter { syringes } => {
                Box::new(syringes.iter_mut().flat_map(|s| s.points.iter_mut()))
            }
            other => Box::new(other.point_list_mut().into_iter().flatten()),
        }
    }

    pub fn find_point(&self, id: u32) -> Option<&CalibrationPoint> {
        self.points().find(|p| p.id == id)
    }

    fn find_point_mut(&mut self, id: u32) -> Option<&mut CalibrationPoint> {
        self.points_mut().find(|p| p.id == id)
    }

    /// Distinct channel numbers in ascending order
    pub fn channels(&self) -> Vec<u32> {
        self.points()
            .filter_map(|p| p.channel)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// "INSTRUMENTO" field of the certificate
    pub fn certificate_label(&self) -> &'static str {
        match self {
            Equipment::Repipetter { .. } => "REPIPETADOR",
            Equipment::Burette { .. } => "BURETA",
            Equipment::Micropipette {
                instrument: Instrument::Monochannel { .. },
                ..
            } => "MICROPIPETA MONOCANAL",
            Equipment::Micropipette {
                instrument: Instrument::Multichannel { .. },
                ..
            } => "MICROPIPETA MULTICANAL",
        }
    }
}

impl fmt::Display for Equipment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Equipment::Micropipette { instrument, .. } => match instrument {
                Instrument::Monochannel { .. } => write!(f, "micropipette (monochannel)"),
                Instrument::Multichannel { channel_count, .. } => {
                    write!(f, "micropipette ({} channels)", channel_count)
                }
            },
            Equipment::Burette { .. } => write!(f, "burette"),
            Equipment::Repipetter { .. } => write!(f, "repipetter"),
        }
    }
}

// ============================================================================
// Draft
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
#[derive(Default)]
pub enum DraftStatus {
    #[default]
    Draft,
    Issued,
}

impl fmt::Display for DraftStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DraftStatus::Draft => write!(f, "draft"),
            DraftStatus::Issued => write!(f, "issued"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Client {
    pub name: String,
    #[serde(skip_serializing_if = "Address::is_empty")]
    pub address: Address,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Environment {
    /// Laboratory temperature (°C), in 0.5 steps
    pub temperature: f64,
    /// Relative humidity (%)
    pub relative_humidity: f64,
}

impl Default for Environment {
    fn default() -> Self {
        Self {
            temperature: correction::DEFAULT_TEMPERATURE,
            relative_humidity: DEFAULT_HUMIDITY,
        }
    }
}

/// A calibration certificate in preparation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CertificateDraft {
    pub id: DraftId,

    /// "<series>.<sequence>", printed as "CAL – <number>"
    #[serde(default)]
    pub certificate_number: String,

    pub calibration_date: NaiveDate,

    /// Defaults to the calibration date
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issue_date: Option<NaiveDate>,

    #[serde(default)]
    pub client: Client,

    #[serde(default)]
    pub manufacturer: String,

    #[serde(default)]
    pub model: String,

    #[serde(default)]
    pub serial_number: String,

    #[serde(default)]
    pub identification: String,

    pub equipment: Equipment,

    #[serde(default)]
    pub environment: Environment,

    /// Derived from the temperature
    #[serde(default = "default_factor")]
    pub correction_factor: f64,

    /// Enables completion and propagation of readings
    #[serde(default = "default_true")]
    pub automation: bool,

    #[serde(default)]
    pub status: DraftStatus,

    pub author: String,
    pub created: DateTime<Utc>,

    /// Next free point / syringe id
    #[serde(default)]
    pub next_id: u32,
}

/// Metadata patch; `None` leaves a field unchanged
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DraftDetails {
    pub calibration_date: Option<NaiveDate>,
    pub issue_date: Option<NaiveDate>,
    pub client_name: Option<String>,
    pub street: Option<String>,
    pub number: Option<String>,
    pub district: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub postal_code: Option<String>,
    pub manufacturer: Option<String>,
    pub model: Option<String>,
    pub serial_number: Option<String>,
    pub identification: Option<String>,
    pub capacity: Option<RangeValue>,
    pub indication_range: Option<RangeValue>,
    pub calibrated_range: Option<RangeValue>,
    pub status: Option<DraftStatus>,
}

impl DraftDetails {
    pub fn is_empty(&self) -> bool {
        *self == DraftDetails::default()
    }
}

/// State transitions of a draft
#[derive(Debug, Clone, PartialEq)]
pub enum DraftAction {
    SetTemperature(f64),
    /// Move the temperature by ±0.5 steps, refused outside the table
    StepTemperature(f64),
    SetHumidity(f64),
    SetEquipment(EquipmentKind),
    SetInstrument(InstrumentKind),
    SetChannelCount(ChannelCount),
    SetPointsPerChannel(u32),
    AddPoint { syringe: Option<u32> },
    RemovePoint(u32),
    AddChannel,
    RemoveChannel(u32),
    AddSyringe,
    RemoveSyringe(u32),
    SetSyringeNominal {
        syringe: u32,
        volume: Option<f64>,
        unit: Option<Unit>,
    },
    SetNominal { point: u32, volume: Option<f64> },
    SetUnit { point: u32, unit: Unit },
    /// Free-text readings, parsed and possibly auto-filled
    SetReadings { point: u32, text: String },
    /// One reading slot, 1-based
    SetReading {
        point: u32,
        slot: usize,
        value: Option<f64>,
    },
    SetAutomation(bool),
    SetCertificateNumber(String),
    SetDetails(Box<DraftDetails>),
    /// Start the next certificate from this one
    ResetForNext,
}

#[derive(Debug, Error, PartialEq)]
pub enum DraftError {
    #[error("at least one calibration point is required")]
    LastPoint,

    #[error("at least one channel is required")]
    LastChannel,

    #[error("at least one syringe is required")]
    LastSyringe,

    #[error("no calibration point with id {0}")]
    PointNotFound(u32),

    #[error("no syringe with id {0}")]
    SyringeNotFound(u32),

    #[error("no channel {0}")]
    ChannelNotFound(u32),

    #[error("all {0} channels are already present")]
    ChannelsFull(u32),

    #[error("invalid certificate number '{0}' (expected digits, a dot and optional digits, e.g. 123.45)")]
    InvalidCertificateNumber(String),

    #[error("points per channel must be between 1 and 10, got {0}")]
    PointsPerChannelOutOfRange(u32),

    #[error("temperature {0} °C is outside the 15.0 to 30.0 °C table")]
    TemperatureOutOfRange(f64),

    #[error("relative humidity must be between 0 and 100 %, got {0}")]
    InvalidHumidity(f64),

    #[error("{what} must be a finite, non-negative number")]
    InvalidNumber { what: &'static str },

    #[error("reading slot {0} does not exist (slots are 1 to 10)")]
    SlotOutOfRange(usize),

    #[error("{action} does not apply to a {equipment}")]
    NotApplicable {
        action: &'static str,
        equipment: String,
    },

    #[error("this repipetter has several syringes, choose one")]
    SyringeRequired,
}

/// Outcome of a successful transition
#[derive(Debug, Clone)]
pub struct Transition {
    pub draft: CertificateDraft,

    /// Set when auto-fill changed readings
    pub notice: Option<Notice>,

    /// Parse report of free-text readings
    pub parsed: Option<ParsedReadings>,

    /// Id of a point, channel or syringe created by the action
    pub created: Option<u32>,
}

impl CertificateDraft {
    /// New micropipette draft with one empty monochannel point
    pub fn new(author: impl Into<String>, calibration_date: NaiveDate) -> Self {
        let mut draft = Self {
            id: DraftId::new(),
            certificate_number: String::new(),
            calibration_date,
            issue_date: None,
            client: Client::default(),
            manufacturer: String::new(),
            model: String::new(),
            serial_number: String::new(),
            identification: String::new(),
            equipment: Equipment::Micropipette {
                ranges: Ranges::default(),
                instrument: Instrument::Monochannel { points: Vec::new() },
            },
            environment: Environment::default(),
            correction_factor: correction::DEFAULT_FACTOR,
            automation: true,
            status: DraftStatus::Draft,
            author: author.into(),
            created: Utc::now(),
            next_id: 1,
        };
        let id = draft.allocate_id();
        if let Some(points) = draft.equipment.point_list_mut() {
            points.push(CalibrationPoint::new(id));
        }
        draft.normalize();
        draft
    }

    /// Issue date printed on the certificate
    pub fn issue_date(&self) -> NaiveDate {
        self.issue_date.unwrap_or(self.calibration_date)
    }

    /// Short description for listings
    pub fn title(&self) -> String {
        let parts: Vec<&str> = [
            self.manufacturer.as_str(),
            self.model.as_str(),
            self.serial_number.as_str(),
        ]
        .into_iter()
        .filter(|s| !s.is_empty())
        .collect();
        if parts.is_empty() {
            self.equipment.to_string()
        } else {
            parts.join(" ")
        }
    }

    fn allocate_id(&mut self) -> u32 {
        let id = self.next_id.max(1);
        self.next_id = id + 1;
        id
    }

    /// Restore derived fields and invariants after loading or editing
    ///
    /// Quantizes the temperature, derives the correction factor, repairs the
    /// id allocator and recomputes every point.
    pub fn normalize(&mut self) {
        let quantized = correction::quantize_temperature(self.environment.temperature);
        if quantized != self.environment.temperature {
            tracing::debug!(
                from = self.environment.temperature,
                to = quantized,
                "temperature snapped to table step"
            );
            self.environment.temperature = quantized;
        }
        self.correction_factor = correction::factor_for(self.environment.temperature);

        let max_point = self.equipment.points().map(|p| p.id).max().unwrap_or(0);
        let max_syringe = self
            .equipment
            .syringes()
            .and_then(|s| s.iter().map(|s| s.id).max())
            .unwrap_or(0);
        self.next_id = self.next_id.max(max_point.max(max_syringe) + 1);

        self.recompute();
    }

    /// Recompute the statistics of every point
    pub fn recompute(&mut self) {
        let factor = self.correction_factor;
        for point in self.equipment.points_mut() {
            point.recompute(factor);
        }
    }

    /// Apply an action, returning the new draft
    ///
    /// `self` is left untouched; on error nothing changes.
    pub fn apply(
        &self,
        action: DraftAction,
        autofill: &mut Autofill,
    ) -> Result<Transition, DraftError> {
        let mut next = self.clone();
        let mut notice = None;
        let mut parsed = None;
        let mut created = None;

        match action {
            DraftAction::SetTemperature(t) => {
                let quantized = correction::quantize_temperature(t);
                if !correction::is_tabulated(quantized) {
                    tracing::warn!(
                        temperature = quantized,
                        factor = correction::DEFAULT_FACTOR,
                        "temperature outside the correction table, using the default factor"
                    );
                }
                next.environment.temperature = quantized;
            }
            DraftAction::StepTemperature(increment) => {
                let current = next.environment.temperature;
                next.environment.temperature = correction::step_temperature(current, increment)
                    .ok_or(DraftError::TemperatureOutOfRange(current + increment))?;
            }
            DraftAction::SetHumidity(h) => {
                if !h.is_finite() || !(0.0..=100.0).contains(&h) {
                    return Err(DraftError::InvalidHumidity(h));
                }
                next.environment.relative_humidity = h;
            }
            DraftAction::SetEquipment(kind) => next.set_equipment(kind),
            DraftAction::SetInstrument(kind) => next.set_instrument(kind)?,
            DraftAction::SetChannelCount(count) => {
                let channels: Vec<u32> = (1..=count.get()).collect();
                let ppc = next.multichannel_layout("set channel count")?.1;
                next.reshape_channels(&channels, ppc);
                next.set_channel_count(count);
            }
            DraftAction::SetPointsPerChannel(n) => {
                if !(1..=MAX_POINTS_PER_CHANNEL).contains(&n) {
                    return Err(DraftError::PointsPerChannelOutOfRange(n));
                }
                next.multichannel_layout("set points per channel")?;
                let channels = next.equipment.channels();
                next.reshape_channels(&channels, n);
            }
            DraftAction::AddPoint { syringe } => {
                created = Some(next.add_point(syringe)?);
            }
            DraftAction::RemovePoint(id) => next.remove_point(id)?,
            DraftAction::AddChannel => {
                let (count, ppc) = next.multichannel_layout("add channel")?;
                let mut channels = next.equipment.channels();
                let new_channel = (1..=count.get())
                    .find(|c| !channels.contains(c))
                    .ok_or(DraftError::ChannelsFull(count.get()))?;
                channels.push(new_channel);
                channels.sort_unstable();
                next.reshape_channels(&channels, ppc);
                created = Some(new_channel);
            }
            DraftAction::RemoveChannel(channel) => next.remove_channel(channel)?,
            DraftAction::AddSyringe => {
                let id = next.allocate_id();
                let mut next_id = next.next_id;
                let syringe = Syringe::new(id, &mut next_id);
                next.next_id = next_id;
                match &mut next.equipment {
                    Equipment::Repipetter { syringes } => syringes.push(syringe),
                    other => {
                        return Err(DraftError::NotApplicable {
                            action: "add syringe",
                            equipment: other.to_string(),
                        })
                    }
                }
                created = Some(id);
            }
            DraftAction::RemoveSyringe(id) => {
                let syringes = next.syringes_mut("remove syringe")?;
                if !syringes.iter().any(|s| s.id == id) {
                    return Err(DraftError::SyringeNotFound(id));
                }
                if syringes.len() <= 1 {
                    return Err(DraftError::LastSyringe);
                }
                syringes.retain(|s| s.id != id);
            }
            DraftAction::SetSyringeNominal {
                syringe,
                volume,
                unit,
            } => {
                check_volume(volume)?;
                let syringes = next.syringes_mut("set syringe volume")?;
                let target = syringes
                    .iter_mut()
                    .find(|s| s.id == syringe)
                    .ok_or(DraftError::SyringeNotFound(syringe))?;
                target.nominal_volume = volume;
                if let Some(unit) = unit {
                    target.unit = unit;
                }
            }
            DraftAction::SetNominal { point, volume } => {
                check_volume(volume)?;
                next.point_mut(point)?.nominal_volume = volume;
                for sibling in next.channel_siblings_mut(point) {
                    sibling.nominal_volume = volume;
                }
            }
            DraftAction::SetUnit { point, unit } => {
                next.point_mut(point)?.unit = unit;
                for sibling in next.channel_siblings_mut(point) {
                    sibling.unit = unit;
                }
            }
            DraftAction::SetReadings { point, text } => {
                let (report, generated) = next.set_readings(point, &text, autofill)?;
                notice = generated;
                parsed = Some(report);
            }
            DraftAction::SetReading { point, slot, value } => {
                if slot == 0 || slot > READING_SLOTS {
                    return Err(DraftError::SlotOutOfRange(slot));
                }
                if value.is_some_and(|v| !v.is_finite()) {
                    return Err(DraftError::InvalidNumber { what: "reading" });
                }
                next.point_mut(point)?.readings[slot - 1] = value;
            }
            DraftAction::SetAutomation(enabled) => next.automation = enabled,
            DraftAction::SetCertificateNumber(number) => {
                let number = number.trim().to_string();
                if !format::is_valid_certificate_number(&number) {
                    return Err(DraftError::InvalidCertificateNumber(number));
                }
                next.certificate_number = number;
            }
            DraftAction::SetDetails(details) => next.set_details(*details)?,
            DraftAction::ResetForNext => next = self.next_certificate(),
        }

        next.normalize();
        Ok(Transition {
            draft: next,
            notice,
            parsed,
            created,
        })
    }

    // ------------------------------------------------------------------------
    // Transition helpers
    // ------------------------------------------------------------------------

    fn point_mut(&mut self, id: u32) -> Result<&mut CalibrationPoint, DraftError> {
        self.equipment
            .find_point_mut(id)
            .ok_or(DraftError::PointNotFound(id))
    }

    fn syringes_mut(&mut self, action: &'static str) -> Result<&mut Vec<Syringe>, DraftError> {
        match &mut self.equipment {
            Equipment::Repipetter { syringes } => Ok(syringes),
            other => Err(DraftError::NotApplicable {
                action,
                equipment: other.to_string(),
            }),
        }
    }

    /// Channel count and points per channel, or an error off multichannel
    fn multichannel_layout(
        &self,
        action: &'static str,
    ) -> Result<(ChannelCount, u32), DraftError> {
        match &self.equipment {
            Equipment::Micropipette {
                instrument:
                    Instrument::Multichannel {
                        channel_count,
                        points_per_channel,
                        ..
                    },
                ..
            } => Ok((*channel_count, *points_per_channel)),
            other => Err(DraftError::NotApplicable {
                action,
                equipment: other.to_string(),
            }),
        }
    }

    fn set_channel_count(&mut self, count: ChannelCount) {
        if let Equipment::Micropipette {
            instrument: Instrument::Multichannel { channel_count, .. },
            ..
        } = &mut self.equipment
        {
            *channel_count = count;
        }
    }

    /// Make the multichannel grid exactly `channels × 1..=ppc`
    ///
    /// Existing points inside the grid keep their data; missing cells get
    /// empty points and cells outside are dropped.
    fn reshape_channels(&mut self, channels: &[u32], ppc: u32) {
        let mut next_id = self.next_id.max(1);
        if let Equipment::Micropipette {
            instrument:
                Instrument::Multichannel {
                    points,
                    points_per_channel,
                    ..
                },
            ..
        } = &mut self.equipment
        {
            points.retain(|p| {
                p.channel.is_some_and(|c| channels.contains(&c))
                    && p.position.is_some_and(|pos| pos >= 1 && pos <= ppc)
            });
            for &channel in channels {
                for position in 1..=ppc {
                    let exists = points
                        .iter()
                        .any(|p| p.channel == Some(channel) && p.position == Some(position));
                    if !exists {
                        // New cells inherit the nominal volume of channel 1
                        let template = points
                            .iter()
                            .find(|p| p.channel == Some(1) && p.position == Some(position))
                            .map(|p| (p.nominal_volume, p.unit));
                        let mut point =
                            CalibrationPoint::new(next_id).in_channel(channel, position);
                        if let Some((volume, unit)) = template {
                            point.nominal_volume = volume;
                            point.unit = unit;
                        }
                        points.push(point);
                        next_id += 1;
                    }
                }
            }
            points.sort_by_key(|p| (p.channel, p.position));
            *points_per_channel = ppc;
        }
        self.next_id = next_id;
    }

    fn set_equipment(&mut self, kind: EquipmentKind) {
        if self.equipment.kind() == kind {
            return;
        }
        let ranges = self.equipment.ranges().cloned().unwrap_or_default();
        self.equipment = match kind {
            EquipmentKind::Micropipette => {
                let point = CalibrationPoint::new(self.allocate_id());
                Equipment::Micropipette {
                    ranges,
                    instrument: Instrument::Monochannel {
                        points: vec![point],
                    },
                }
            }
            EquipmentKind::Burette => {
                let point = CalibrationPoint::new(self.allocate_id());
                Equipment::Burette {
                    ranges,
                    points: vec![point],
                }
            }
            EquipmentKind::Repipetter => {
                let id = self.allocate_id();
                let mut next_id = self.next_id;
                let syringe = Syringe::new(id, &mut next_id);
                self.next_id = next_id;
                Equipment::Repipetter {
                    syringes: vec![syringe],
                }
            }
        };
    }

    fn set_instrument(&mut self, kind: InstrumentKind) -> Result<(), DraftError> {
        if !matches!(self.equipment, Equipment::Micropipette { .. }) {
            return Err(DraftError::NotApplicable {
                action: "set instrument type",
                equipment: self.equipment.to_string(),
            });
        }
        if self.equipment.instrument_kind() == kind {
            return Ok(());
        }
        let ranges = self.equipment.ranges().cloned().unwrap_or_default();
        match kind {
            InstrumentKind::Monochannel => {
                let point = CalibrationPoint::new(self.allocate_id());
                self.equipment = Equipment::Micropipette {
                    ranges,
                    instrument: Instrument::Monochannel {
                        points: vec![point],
                    },
                };
            }
            InstrumentKind::Multichannel => {
                let count = ChannelCount::default();
                self.equipment = Equipment::Micropipette {
                    ranges,
                    instrument: Instrument::Multichannel {
                        channel_count: count,
                        points_per_channel: DEFAULT_POINTS_PER_CHANNEL,
                        points: Vec::new(),
                    },
                };
                let channels: Vec<u32> = (1..=count.get()).collect();
                self.reshape_channels(&channels, DEFAULT_POINTS_PER_CHANNEL);
            }
        }
        Ok(())
    }

    fn add_point(&mut self, syringe: Option<u32>) -> Result<u32, DraftError> {
        if let Ok((_, ppc)) = self.multichannel_layout("add point") {
            // One more position on every channel
            let n = ppc + 1;
            if n > MAX_POINTS_PER_CHANNEL {
                return Err(DraftError::PointsPerChannelOutOfRange(n));
            }
            let channels = self.equipment.channels();
            self.reshape_channels(&channels, n);
            // The new row is addressed through its lowest channel
            let lead = channels.first().copied();
            return self
                .equipment
                .points()
                .find(|p| p.channel == lead && p.position == Some(n))
                .map(|p| p.id)
                .ok_or(DraftError::LastChannel);
        }

        let id = self.allocate_id();
        match &mut self.equipment {
            Equipment::Repipetter { syringes } => {
                let target = match syringe {
                    Some(sid) => syringes
                        .iter_mut()
                        .find(|s| s.id == sid)
                        .ok_or(DraftError::SyringeNotFound(sid))?,
                    None if syringes.len() == 1 => &mut syringes[0],
                    None => return Err(DraftError::SyringeRequired),
                };
                let position = target.points.len() as u32 + 1;
                target
                    .points
                    .push(CalibrationPoint::new(id).at_position(position));
            }
            other => {
                if let Some(points) = other.point_list_mut() {
                    points.push(CalibrationPoint::new(id));
                }
            }
        }
        Ok(id)
    }

    fn remove_point(&mut self, id: u32) -> Result<(), DraftError> {
        let point = self
            .equipment
            .find_point(id)
            .ok_or(DraftError::PointNotFound(id))?;

        // On multichannel pipettes a point stands for its whole channel
        if self.equipment.is_multichannel() {
            let channel = point.channel.ok_or(DraftError::PointNotFound(id))?;
            return self.remove_channel(channel);
        }

        match &mut self.equipment {
            Equipment::Repipetter { syringes } => {
                for syringe in syringes.iter_mut() {
                    if syringe.points.iter().any(|p| p.id == id) {
                        if syringe.points.len() <= 1 {
                            return Err(DraftError::LastPoint);
                        }
                        syringe.points.retain(|p| p.id != id);
                        for (i, p) in syringe.points.iter_mut().enumerate() {
                            p.position = Some(i as u32 + 1);
                        }
                        break;
                    }
                }
            }
            other => {
                if let Some(points) = other.point_list_mut() {
                    if points.len() <= 1 {
                        return Err(DraftError::LastPoint);
                    }
                    points.retain(|p| p.id != id);
                }
            }
        }
        Ok(())
    }

    fn remove_channel(&mut self, channel: u32) -> Result<(), DraftError> {
        self.multichannel_layout("remove channel")?;
        let channels = self.equipment.channels();
        if !channels.contains(&channel) {
            return Err(DraftError::ChannelNotFound(channel));
        }
        if channels.len() <= 1 {
            return Err(DraftError::LastChannel);
        }
        if let Some(points) = self.equipment.point_list_mut() {
            points.retain(|p| p.channel != Some(channel));
        }
        Ok(())
    }

    /// Points at the same position on other channels when `id` is on channel 1
    fn channel_siblings_mut(&mut self, id: u32) -> Vec<&mut CalibrationPoint> {
        if !self.equipment.is_multichannel() {
            return Vec::new();
        }
        let position = match self.equipment.find_point(id) {
            Some(p) if p.channel == Some(1) => p.position,
            _ => return Vec::new(),
        };
        self.equipment
            .points_mut()
            .filter(|p| p.id != id && p.channel != Some(1) && p.position == position)
            .collect()
    }

    fn set_readings(
        &mut self,
        id: u32,
        text: &str,
        autofill: &mut Autofill,
    ) -> Result<(ParsedReadings, Option<Notice>), DraftError> {
        let on_syringe = matches!(self.equipment, Equipment::Repipetter { .. });
        let delimiters = if on_syringe {
            Delimiters::CommaOrWhitespace
        } else {
            Delimiters::Comma
        };
        let parsed = readings::parse_with(text, delimiters);
        if !parsed.is_lossless() {
            tracing::warn!(
                point = id,
                rejected = ?parsed.rejected,
                truncated = parsed.truncated,
                "some readings were not kept"
            );
        }

        let automated = self.automation && autofill.is_enabled();
        let mut slots = parsed.slots;
        let mut notice = None;

        if automated
            && self.equipment.supports_completion()
            && autofill.wants_completion(text, &parsed)
        {
            let originals = parsed.values();
            let generated = autofill.complete(&originals);
            for (slot, value) in slots.iter_mut().skip(originals.len()).zip(&generated) {
                *slot = Some(*value);
            }
            tracing::info!(point = id, generated = generated.len(), "completed readings");
            notice = Some(Notice::completion(generated.len()));
        }

        self.point_mut(id)?.readings = slots;

        if automated && parsed.valid_count() > 0 {
            let master: Vec<&str> = readings::tokens(text, Delimiters::Comma)
                .filter(|t| readings::parse_value(t).is_some())
                .take(READING_SLOTS)
                .collect();
            let siblings = self.channel_siblings_mut(id);
            let filled = siblings.len();
            for sibling in siblings {
                let mut values = readings::EMPTY_READINGS;
                for (slot, token) in values.iter_mut().zip(&master) {
                    *slot = autofill.near_value(token);
                }
                sibling.readings = values;
            }
            if filled > 0 {
                tracing::info!(point = id, channels = filled, "propagated readings");
                notice = Some(Notice::propagation(filled));
            }
        }

        Ok((parsed, notice))
    }

    fn set_details(&mut self, details: DraftDetails) -> Result<(), DraftError> {
        let DraftDetails {
            calibration_date,
            issue_date,
            client_name,
            street,
            number,
            district,
            city,
            state,
            postal_code,
            manufacturer,
            model,
            serial_number,
            identification,
            capacity,
            indication_range,
            calibrated_range,
            status,
        } = details;

        let touches_ranges =
            capacity.is_some() || indication_range.is_some() || calibrated_range.is_some();
        if touches_ranges {
            let equipment = self.equipment.to_string();
            let ranges = self
                .equipment
                .ranges_mut()
                .ok_or(DraftError::NotApplicable {
                    action: "set ranges",
                    equipment,
                })?;
            if capacity.is_some() {
                ranges.capacity = capacity;
            }
            if indication_range.is_some() {
                ranges.indication_range = indication_range;
            }
            if calibrated_range.is_some() {
                ranges.calibrated_range = calibrated_range;
            }
        }

        fn set(field: &mut String, value: Option<String>) {
            if let Some(value) = value {
                *field = value.trim().to_string();
            }
        }

        if let Some(date) = calibration_date {
            self.calibration_date = date;
        }
        if issue_date.is_some() {
            self.issue_date = issue_date;
        }
        set(&mut self.client.name, client_name);
        set(&mut self.client.address.street, street);
        set(&mut self.client.address.number, number);
        set(&mut self.client.address.district, district);
        set(&mut self.client.address.city, city);
        set(&mut self.client.address.state, state);
        set(&mut self.client.address.postal_code, postal_code);
        set(&mut self.manufacturer, manufacturer);
        set(&mut self.model, model);
        set(&mut self.serial_number, serial_number);
        set(&mut self.identification, identification);
        if let Some(status) = status {
            self.status = status;
        }
        Ok(())
    }

    /// Fresh draft for the next certificate of the same session
    ///
    /// Keeps the certificate number up to the dot, the calibration date, the
    /// environment, the client and the author.
    fn next_certificate(&self) -> CertificateDraft {
        let mut draft = CertificateDraft::new(self.author.clone(), self.calibration_date);
        draft.certificate_number = format::certificate_prefix(&self.certificate_number);
        draft.environment = self.environment;
        draft.client = self.client.clone();
        draft.automation = self.automation;
        draft
    }
}

fn check_volume(volume: Option<f64>) -> Result<(), DraftError> {
    match volume {
        Some(v) if !v.is_finite() || v < 0.0 => Err(DraftError::InvalidNumber {
            what: "nominal volume",
        }),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 2).unwrap()
    }

    fn draft() -> CertificateDraft {
        CertificateDraft::new("tester", date())
    }

    fn engine() -> Autofill {
        Autofill::seeded(1234)
    }

    fn apply(draft: &CertificateDraft, action: DraftAction) -> CertificateDraft {
        draft.apply(action, &mut engine()).unwrap().draft
    }

    fn first_point(draft: &CertificateDraft) -> u32 {
        draft.equipment.points().next().unwrap().id
    }

    #[test]
    fn test_new_draft_has_one_point() {
        let d = draft();
        assert_eq!(d.equipment.points().count(), 1);
        assert_eq!(d.environment.temperature, 20.0);
        assert_eq!(d.correction_factor, 1.0029);
        assert!(d.automation);
        assert!(d.id.to_string().starts_with("CAL-"));
    }

    #[test]
    fn test_apply_does_not_mutate_input() {
        let d = draft();
        let before = d.clone();
        let _ = d.apply(DraftAction::SetTemperature(26.0), &mut engine()).unwrap();
        assert_eq!(d, before);
    }

    #[test]
    fn test_temperature_updates_factor_and_statistics() {
        let d = draft();
        let p = first_point(&d);
        let d = apply(&d, DraftAction::SetNominal { point: p, volume: Some(100.0) });
        let d = apply(
            &d,
            DraftAction::SetReadings { point: p, text: "99.4, 99.5".into() },
        );
        let before = d.equipment.find_point(p).unwrap().statistics.unwrap();
        assert_eq!(before.mean_volume, 99.74);

        let d = apply(&d, DraftAction::SetTemperature(26.0));
        assert_eq!(d.correction_factor, 1.0043);
        let stats = d.equipment.find_point(p).unwrap().statistics.unwrap();
        assert_eq!(stats.mean_volume, 99.88);
        assert_eq!(stats.accuracy_absolute, -0.12);
        assert_eq!(stats.standard_deviation, 0.07);
    }

    #[test]
    fn test_temperature_is_quantized() {
        let d = apply(&draft(), DraftAction::SetTemperature(22.3));
        assert_eq!(d.environment.temperature, 22.5);
        assert_eq!(d.correction_factor, 1.0034);
    }

    #[test]
    fn test_temperature_outside_table_is_not_clamped() {
        let d = apply(&draft(), DraftAction::SetTemperature(40.0));
        assert_eq!(d.environment.temperature, 40.0);
        assert_eq!(d.correction_factor, correction::DEFAULT_FACTOR);

        let d = apply(&draft(), DraftAction::SetTemperature(12.3));
        assert_eq!(d.environment.temperature, 12.5);
        assert_eq!(d.correction_factor, correction::DEFAULT_FACTOR);
    }

    #[test]
    fn test_step_temperature_bounds() {
        let d = apply(&draft(), DraftAction::SetTemperature(30.0));
        let err = d
            .apply(DraftAction::StepTemperature(0.5), &mut engine())
            .unwrap_err();
        assert!(matches!(err, DraftError::TemperatureOutOfRange(_)));

        let d = apply(&d, DraftAction::StepTemperature(-0.5));
        assert_eq!(d.environment.temperature, 29.5);
    }

    #[test]
    fn test_humidity_validation() {
        let d = draft();
        assert!(d.apply(DraftAction::SetHumidity(101.0), &mut engine()).is_err());
        let d = apply(&d, DraftAction::SetHumidity(61.5));
        assert_eq!(d.environment.relative_humidity, 61.5);
    }

    #[test]
    fn test_cannot_remove_last_point() {
        let d = draft();
        let p = first_point(&d);
        let err = d.apply(DraftAction::RemovePoint(p), &mut engine()).unwrap_err();
        assert_eq!(err, DraftError::LastPoint);
    }

    #[test]
    fn test_add_and_remove_point() {
        let d = draft();
        let t = d
            .apply(DraftAction::AddPoint { syringe: None }, &mut engine())
            .unwrap();
        let new_id = t.created.unwrap();
        assert_eq!(t.draft.equipment.points().count(), 2);

        let d = apply(&t.draft, DraftAction::RemovePoint(new_id));
        assert_eq!(d.equipment.points().count(), 1);

        let err = d.apply(DraftAction::RemovePoint(999), &mut engine()).unwrap_err();
        assert_eq!(err, DraftError::PointNotFound(999));
    }

    #[test]
    fn test_switch_to_multichannel_builds_grid() {
        let d = apply(&draft(), DraftAction::SetInstrument(InstrumentKind::Multichannel));
        assert!(d.equipment.is_multichannel());
        assert_eq!(d.equipment.points().count(), 24);
        assert_eq!(d.equipment.channels(), (1..=8).collect::<Vec<_>>());

        let d = apply(&d, DraftAction::SetChannelCount(ChannelCount::Twelve));
        assert_eq!(d.equipment.points().count(), 36);

        let d = apply(&d, DraftAction::SetPointsPerChannel(1));
        assert_eq!(d.equipment.points().count(), 12);

        let err = d
            .apply(DraftAction::SetPointsPerChannel(11), &mut engine())
            .unwrap_err();
        assert_eq!(err, DraftError::PointsPerChannelOutOfRange(11));
    }

    #[test]
    fn test_point_ids_stay_unique() {
        let d = apply(&draft(), DraftAction::SetInstrument(InstrumentKind::Multichannel));
        let d = apply(&d, DraftAction::SetPointsPerChannel(4));
        let d = apply(&d, DraftAction::RemoveChannel(3));
        let d = apply(&d, DraftAction::AddChannel);
        let ids: BTreeSet<u32> = d.equipment.points().map(|p| p.id).collect();
        assert_eq!(ids.len(), d.equipment.points().count());
        assert!(ids.iter().all(|id| *id < d.next_id));
    }

    #[test]
    fn test_add_channel_only_restores_missing_ones() {
        let d = apply(&draft(), DraftAction::SetInstrument(InstrumentKind::Multichannel));
        let err = d.apply(DraftAction::AddChannel, &mut engine()).unwrap_err();
        assert_eq!(err, DraftError::ChannelsFull(8));

        let d = apply(&d, DraftAction::RemoveChannel(5));
        let d = apply(&d, DraftAction::RemoveChannel(2));
        let added = d.apply(DraftAction::AddChannel, &mut engine()).unwrap();
        assert_eq!(added.created, Some(2));
        assert_eq!(added.draft.equipment.channels(), vec![1, 2, 3, 4, 6, 7, 8]);
        assert!(added.draft.equipment.points().all(|p| p.channel <= Some(8)));
    }

    #[test]
    fn test_add_point_on_multichannel_returns_point_id() {
        let d = apply(&draft(), DraftAction::SetInstrument(InstrumentKind::Multichannel));
        let added = d
            .apply(DraftAction::AddPoint { syringe: None }, &mut engine())
            .unwrap();
        let id = added.created.unwrap();
        let point = added.draft.equipment.find_point(id).unwrap();
        assert_eq!(point.channel, Some(1));
        assert_eq!(point.position, Some(4));

        // Nominal set through the returned id reaches the whole new row only
        let d = apply(
            &added.draft,
            DraftAction::SetNominal {
                point: id,
                volume: Some(50.0),
            },
        );
        for p in d.equipment.points() {
            if p.position == Some(4) {
                assert_eq!(p.nominal_volume, Some(50.0));
            } else {
                assert_ne!(p.nominal_volume, Some(50.0));
            }
        }
    }

    #[test]
    fn test_cannot_remove_last_channel() {
        let mut d = apply(&draft(), DraftAction::SetInstrument(InstrumentKind::Multichannel));
        for channel in 2..=8 {
            d = apply(&d, DraftAction::RemoveChannel(channel));
        }
        assert_eq!(d.equipment.channels(), vec![1]);
        let err = d.apply(DraftAction::RemoveChannel(1), &mut engine()).unwrap_err();
        assert_eq!(err, DraftError::LastChannel);

        // Removing a point of the last channel is the same request
        let p = first_point(&d);
        let err = d.apply(DraftAction::RemovePoint(p), &mut engine()).unwrap_err();
        assert_eq!(err, DraftError::LastChannel);
    }

    #[test]
    fn test_channel_actions_need_multichannel() {
        let err = draft()
            .apply(DraftAction::AddChannel, &mut engine())
            .unwrap_err();
        assert!(matches!(err, DraftError::NotApplicable { .. }));
    }

    #[test]
    fn test_repipetter_syringes() {
        let d = apply(&draft(), DraftAction::SetEquipment(EquipmentKind::Repipetter));
        let syringes = d.equipment.syringes().unwrap();
        assert_eq!(syringes.len(), 1);
        assert_eq!(syringes[0].points.len(), 3);
        let only = syringes[0].id;

        let err = d.apply(DraftAction::RemoveSyringe(only), &mut engine()).unwrap_err();
        assert_eq!(err, DraftError::LastSyringe);

        let t = d.apply(DraftAction::AddSyringe, &mut engine()).unwrap();
        let second = t.created.unwrap();
        assert_eq!(t.draft.equipment.syringes().unwrap().len(), 2);

        let d = apply(&t.draft, DraftAction::RemoveSyringe(only));
        assert_eq!(d.equipment.syringes().unwrap()[0].id, second);
    }

    #[test]
    fn test_syringe_point_needs_syringe_choice() {
        let d = apply(&draft(), DraftAction::SetEquipment(EquipmentKind::Repipetter));
        let d = apply(&d, DraftAction::AddSyringe);
        let err = d
            .apply(DraftAction::AddPoint { syringe: None }, &mut engine())
            .unwrap_err();
        assert_eq!(err, DraftError::SyringeRequired);
    }

    #[test]
    fn test_syringe_readings_accept_whitespace() {
        let d = apply(&draft(), DraftAction::SetEquipment(EquipmentKind::Repipetter));
        let p = first_point(&d);
        let t = d
            .apply(
                DraftAction::SetReadings { point: p, text: "499.1 499.3\n499.2".into() },
                &mut engine(),
            )
            .unwrap();
        assert_eq!(t.draft.equipment.find_point(p).unwrap().valid_count(), 3);
    }

    #[test]
    fn test_monochannel_completion() {
        let d = draft();
        let p = first_point(&d);
        let t = d
            .apply(
                DraftAction::SetReadings {
                    point: p,
                    text: "99.41, 99.52, 99.47, 99.50, 99.44,".into(),
                },
                &mut engine(),
            )
            .unwrap();
        let point = t.draft.equipment.find_point(p).unwrap();
        assert_eq!(point.valid_count(), 10);
        assert_eq!(point.readings[0], Some(99.41));
        assert!(t.notice.is_some());
    }

    #[test]
    fn test_completion_respects_automation_flag() {
        let d = apply(&draft(), DraftAction::SetAutomation(false));
        let p = first_point(&d);
        let t = d
            .apply(
                DraftAction::SetReadings { point: p, text: "1, 2, 3, 4, 5,".into() },
                &mut engine(),
            )
            .unwrap();
        assert_eq!(t.draft.equipment.find_point(p).unwrap().valid_count(), 5);
        assert!(t.notice.is_none());
    }

    #[test]
    fn test_multichannel_propagation() {
        let d = apply(&draft(), DraftAction::SetInstrument(InstrumentKind::Multichannel));
        let master = d
            .equipment
            .points()
            .find(|p| p.channel == Some(1) && p.position == Some(2))
            .unwrap()
            .id;
        let d = apply(&d, DraftAction::SetNominal { point: master, volume: Some(50.0) });
        let t = d
            .apply(
                DraftAction::SetReadings { point: master, text: "50.1, 50.2, 49.9".into() },
                &mut engine(),
            )
            .unwrap();
        assert!(t.notice.is_some());

        for p in t.draft.equipment.points() {
            if p.position == Some(2) {
                assert_eq!(p.nominal_volume, Some(50.0));
                assert_eq!(p.valid_count(), 3);
                for value in p.readings.iter().flatten() {
                    assert!((value - 50.0).abs() < 0.5);
                }
                assert!(p.statistics.is_some());
            } else {
                assert_eq!(p.valid_count(), 0);
            }
        }
    }

    #[test]
    fn test_propagation_is_deterministic_with_seed() {
        let d = apply(&draft(), DraftAction::SetInstrument(InstrumentKind::Multichannel));
        let master = first_point(&d);
        let action = DraftAction::SetReadings { point: master, text: "10.0, 10.1".into() };
        let a = d.apply(action.clone(), &mut Autofill::seeded(5)).unwrap().draft;
        let b = d.apply(action, &mut Autofill::seeded(5)).unwrap().draft;
        assert_eq!(a.equipment, b.equipment);
    }

    #[test]
    fn test_set_single_reading() {
        let d = draft();
        let p = first_point(&d);
        let d = apply(&d, DraftAction::SetReading { point: p, slot: 10, value: Some(1.5) });
        assert_eq!(d.equipment.find_point(p).unwrap().readings[9], Some(1.5));
        let err = d
            .apply(DraftAction::SetReading { point: p, slot: 11, value: None }, &mut engine())
            .unwrap_err();
        assert_eq!(err, DraftError::SlotOutOfRange(11));
    }

    #[test]
    fn test_certificate_number_validation() {
        let d = apply(&draft(), DraftAction::SetCertificateNumber("123.45".into()));
        assert_eq!(d.certificate_number, "123.45");
        let err = d
            .apply(DraftAction::SetCertificateNumber("12-3".into()), &mut engine())
            .unwrap_err();
        assert!(matches!(err, DraftError::InvalidCertificateNumber(_)));
    }

    #[test]
    fn test_reset_for_next() {
        let d = apply(&draft(), DraftAction::SetCertificateNumber("123.45".into()));
        let d = apply(&d, DraftAction::SetTemperature(24.0));
        let d = apply(&d, DraftAction::SetEquipment(EquipmentKind::Burette));
        let details = DraftDetails {
            client_name: Some("Hospital Central".into()),
            serial_number: Some("SN-1".into()),
            ..DraftDetails::default()
        };
        let d = apply(&d, DraftAction::SetDetails(Box::new(details)));

        let next = apply(&d, DraftAction::ResetForNext);
        assert_ne!(next.id, d.id);
        assert_eq!(next.certificate_number, "123.");
        assert_eq!(next.calibration_date, d.calibration_date);
        assert_eq!(next.environment.temperature, 24.0);
        assert_eq!(next.correction_factor, 1.0038);
        assert_eq!(next.client.name, "Hospital Central");
        assert_eq!(next.serial_number, "");
        assert_eq!(next.equipment.kind(), EquipmentKind::Micropipette);
    }

    #[test]
    fn test_ranges_not_on_repipetter() {
        let d = apply(&draft(), DraftAction::SetEquipment(EquipmentKind::Repipetter));
        let details = DraftDetails {
            capacity: Some(RangeValue { value: "1000".into(), unit: Unit::Microliter }),
            ..DraftDetails::default()
        };
        let err = d
            .apply(DraftAction::SetDetails(Box::new(details)), &mut engine())
            .unwrap_err();
        assert!(matches!(err, DraftError::NotApplicable { .. }));
    }

    #[test]
    fn test_ranges_fall_back_to_capacity() {
        let ranges = Ranges {
            capacity: Some(RangeValue { value: "1000".into(), unit: Unit::Microliter }),
            indication_range: None,
            calibrated_range: Some(RangeValue { value: "100-1000".into(), unit: Unit::Microliter }),
        };
        assert_eq!(ranges.indication().unwrap().to_string(), "1000µL");
        assert_eq!(ranges.calibrated().unwrap().to_string(), "100-1000µL");
    }

    #[test]
    fn test_yaml_roundtrip_preserves_draft() {
        let d = apply(&draft(), DraftAction::SetInstrument(InstrumentKind::Multichannel));
        let p = first_point(&d);
        let d = apply(&d, DraftAction::SetNominal { point: p, volume: Some(10.0) });
        let d = apply(&d, DraftAction::SetReadings { point: p, text: "9.9, 10.0".into() });

        let yaml = serde_yml::to_string(&d).unwrap();
        assert!(yaml.contains("type: micropipette"));
        assert!(yaml.contains("kind: multichannel"));
        assert!(yaml.contains("channel_count: 8"));
        let mut back: CertificateDraft = serde_yml::from_str(&yaml).unwrap();
        back.normalize();
        assert_eq!(back.equipment, d.equipment);
        assert_eq!(back.next_id, d.next_id);
    }

    #[test]
    fn test_invalid_channel_count_rejected_on_load() {
        let result: Result<ChannelCount, _> = serde_yml::from_str("6");
        assert!(result.is_err());
    }
}

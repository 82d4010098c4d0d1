//! Calibration points and repipetter syringes

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::core::format;
use crate::core::readings::{self, serde_slots, Readings, EMPTY_READINGS};
use crate::core::stats::{self, PointStatistics};

/// Volume unit of a nominal volume or range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[derive(Default)]
pub enum Unit {
    #[default]
    #[serde(rename = "µL", alias = "uL", alias = "ul")]
    Microliter,
    #[serde(rename = "mL", alias = "ml")]
    Milliliter,
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Unit::Microliter => write!(f, "µL"),
            Unit::Milliliter => write!(f, "mL"),
        }
    }
}

impl FromStr for Unit {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "µL" | "uL" | "ul" | "UL" | "μL" => Ok(Unit::Microliter),
            "mL" | "ml" | "ML" => Ok(Unit::Milliliter),
            other => Err(format!("unknown unit '{}', use uL or mL", other)),
        }
    }
}

fn empty_readings() -> Readings {
    EMPTY_READINGS
}

/// One nominal volume with up to ten mass readings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationPoint {
    /// Unique within the draft
    pub id: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nominal_volume: Option<f64>,

    #[serde(default)]
    pub unit: Unit,

    /// Channel number on multichannel pipettes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<u32>,

    /// 1-based order within a channel or syringe
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<u32>,

    /// Mass readings (mg)
    #[serde(with = "serde_slots", default = "empty_readings")]
    pub readings: Readings,

    /// Derived; rewritten on every change
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub statistics: Option<PointStatistics>,
}

impl CalibrationPoint {
    pub fn new(id: u32) -> Self {
        Self {
            id,
            nominal_volume: None,
            unit: Unit::default(),
            channel: None,
            position: None,
            readings: EMPTY_READINGS,
            statistics: None,
        }
    }

    pub fn in_channel(mut self, channel: u32, position: u32) -> Self {
        self.channel = Some(channel);
        self.position = Some(position);
        self
    }

    pub fn at_position(mut self, position: u32) -> Self {
        self.position = Some(position);
        self
    }

    /// Recompute the statistics with the given correction factor
    pub fn recompute(&mut self, correction_factor: f64) {
        self.statistics = stats::compute(&self.readings, self.nominal_volume, correction_factor)
            .map(|s| s.rounded());
    }

    pub fn valid_count(&self) -> usize {
        readings::valid_count(&self.readings)
    }

    /// Readings as comma-separated text
    pub fn readings_text(&self) -> String {
        readings::to_text(&self.readings)
    }

    /// Nominal volume followed by the unit ("100µL"), empty when unknown
    pub fn nominal_label(&self) -> String {
        match self.nominal_volume {
            Some(v) => format!("{}{}", format::volume(v), self.unit),
            None => String::new(),
        }
    }

    /// Sort key by nominal volume; unknown volumes sort as zero
    pub fn sort_key(&self) -> f64 {
        self.nominal_volume.filter(|v| v.is_finite()).unwrap_or(0.0)
    }
}

/// Number of points created with a new syringe
pub const SYRINGE_POINTS: u32 = 3;

/// Calibration unit of a repipetter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Syringe {
    pub id: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nominal_volume: Option<f64>,

    #[serde(default)]
    pub unit: Unit,

    #[serde(default)]
    pub points: Vec<CalibrationPoint>,
}

impl Syringe {
    /// New syringe with `SYRINGE_POINTS` empty points; ids are drawn from `next_id`
    pub fn new(id: u32, next_id: &mut u32) -> Self {
        let points = (1..=SYRINGE_POINTS)
            .map(|position| {
                let point = CalibrationPoint::new(*next_id).at_position(position);
                *next_id += 1;
                point
            })
            .collect();
        Self {
            id,
            nominal_volume: None,
            unit: Unit::default(),
            points,
        }
    }

    /// Group title on the certificate ("Seringa de 500µL:")
    pub fn title(&self) -> String {
        match self.nominal_volume {
            Some(v) => format!("Seringa de {}{}:", format::volume(v), self.unit),
            None => "Seringa:".to_string(),
        }
    }

    pub fn sort_key(&self) -> f64 {
        self.nominal_volume.filter(|v| v.is_finite()).unwrap_or(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::readings::parse;

    #[test]
    fn test_unit_parsing_and_display() {
        assert_eq!("uL".parse::<Unit>().unwrap(), Unit::Microliter);
        assert_eq!("µL".parse::<Unit>().unwrap(), Unit::Microliter);
        assert_eq!("ml".parse::<Unit>().unwrap(), Unit::Milliliter);
        assert!("L".parse::<Unit>().is_err());
        assert_eq!(Unit::Microliter.to_string(), "µL");
    }

    #[test]
    fn test_unit_serde_aliases() {
        let unit: Unit = serde_yml::from_str("uL").unwrap();
        assert_eq!(unit, Unit::Microliter);
        let unit: Unit = serde_yml::from_str("mL").unwrap();
        assert_eq!(unit, Unit::Milliliter);
    }

    #[test]
    fn test_recompute() {
        let mut point = CalibrationPoint::new(1);
        point.recompute(1.0043);
        assert!(point.statistics.is_none());

        point.nominal_volume = Some(100.0);
        point.readings = parse("99.4, 99.5").slots;
        point.recompute(1.0043);
        let stats = point.statistics.unwrap();
        assert_eq!(stats.mean_volume, 99.88);
        assert_eq!(stats.reading_count, 2);
    }

    #[test]
    fn test_nominal_label() {
        let mut point = CalibrationPoint::new(1);
        assert_eq!(point.nominal_label(), "");
        point.nominal_volume = Some(100.0);
        assert_eq!(point.nominal_label(), "100µL");
    }

    #[test]
    fn test_new_syringe_allocates_point_ids() {
        let mut next_id = 10;
        let syringe = Syringe::new(1, &mut next_id);
        assert_eq!(syringe.points.len(), 3);
        assert_eq!(
            syringe.points.iter().map(|p| p.id).collect::<Vec<_>>(),
            vec![10, 11, 12]
        );
        assert_eq!(next_id, 13);
        assert_eq!(syringe.points[2].position, Some(3));
    }

    #[test]
    fn test_syringe_title() {
        let mut next_id = 1;
        let mut syringe = Syringe::new(1, &mut next_id);
        syringe.nominal_volume = Some(500.0);
        assert_eq!(syringe.title(), "Seringa de 500µL:");
        syringe.unit = Unit::Milliliter;
        syringe.nominal_volume = Some(2.5);
        assert_eq!(syringe.title(), "Seringa de 2,5mL:");
    }
}

//! Table geometry and grouping of calibration points
//!
//! Points are printed in rows of up to three blocks. Each block takes three
//! columns (label, colon, value) and blocks are separated by a narrow blank
//! column, so a row has 3, 7 or 11 columns.

use crate::core::format;
use crate::core::readings::READING_SLOTS;
use crate::entities::draft::Equipment;
use crate::entities::point::CalibrationPoint;

/// Blocks per table row
pub const POINTS_PER_ROW: usize = 3;

/// Column widths (pt) and font size of a row table
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TablePreset {
    pub widths: &'static [f32],
    pub font_size: u8,
}

impl TablePreset {
    pub fn total_width(&self) -> f32 {
        self.widths.iter().sum()
    }

    /// Column weights for a table laid out at [`Self::total_width`]
    pub fn weights(&self) -> Vec<usize> {
        self.widths.iter().map(|w| w.round() as usize).collect()
    }

    /// Number of point blocks the preset holds
    pub fn capacity(&self) -> usize {
        self.widths.len().div_ceil(4)
    }
}

pub const ONE_POINT: TablePreset = TablePreset {
    widths: &[110.0, 8.0, 60.0],
    font_size: 10,
};

pub const TWO_POINTS: TablePreset = TablePreset {
    widths: &[100.0, 6.0, 60.0, 15.0, 100.0, 6.0, 60.0],
    font_size: 9,
};

pub const THREE_POINTS: TablePreset = TablePreset {
    widths: &[85.0, 5.0, 50.0, 12.0, 85.0, 5.0, 50.0, 12.0, 85.0, 5.0, 50.0],
    font_size: 8,
};

/// Preset for a row holding `points` blocks (clamped to 1..=3)
pub fn preset(points: usize) -> &'static TablePreset {
    match points {
        0 | 1 => &ONE_POINT,
        2 => &TWO_POINTS,
        _ => &THREE_POINTS,
    }
}

/// Column boundaries that carry a vertical rule
///
/// Boundary `i` is the left edge of column `i`; the last one is the right
/// edge of the table. Rules sit at the outer edges and on both sides of each
/// separator column.
pub fn vertical_rules(points: usize) -> Vec<usize> {
    let points = points.clamp(1, POINTS_PER_ROW);
    let mut rules = vec![0];
    for block in 1..points {
        let separator = block * 4 - 1;
        rules.push(separator);
        rules.push(separator + 1);
    }
    rules.push(points * 4 - 1);
    rules
}

/// Points printed under one title
#[derive(Debug, Clone)]
pub struct PointGroup<'a> {
    /// "Canal 2:", "Seringa de 500µL:" or none for single-channel pipettes
    pub title: Option<String>,
    pub points: Vec<&'a CalibrationPoint>,
    /// Multichannel rows always use the three-point preset
    pub fixed_width: bool,
}

fn by_nominal(points: &mut [&CalibrationPoint]) {
    points.sort_by(|a, b| a.sort_key().total_cmp(&b.sort_key()));
}

/// Group the points of an equipment in print order
///
/// Repipetters: one group per syringe, by nominal volume. Multichannel
/// pipettes: one group per channel, in channel order. Otherwise a single
/// untitled group. Points inside a group are sorted by nominal volume.
pub fn groups(equipment: &Equipment) -> Vec<PointGroup<'_>> {
    match equipment {
        Equipment::Repipetter { syringes } => {
            let mut syringes: Vec<_> = syringes.iter().collect();
            syringes.sort_by(|a, b| a.sort_key().total_cmp(&b.sort_key()));
            syringes
                .into_iter()
                .map(|syringe| {
                    let mut points: Vec<_> = syringe.points.iter().collect();
                    by_nominal(&mut points);
                    PointGroup {
                        title: Some(syringe.title()),
                        points,
                        fixed_width: false,
                    }
                })
                .collect()
        }
        _ if equipment.is_multichannel() => equipment
            .channels()
            .into_iter()
            .map(|channel| {
                let mut points: Vec<_> = equipment
                    .points()
                    .filter(|p| p.channel == Some(channel))
                    .collect();
                by_nominal(&mut points);
                PointGroup {
                    title: Some(format!("Canal {}:", channel)),
                    points,
                    fixed_width: true,
                }
            })
            .collect(),
        _ => {
            let mut points: Vec<_> = equipment.points().collect();
            by_nominal(&mut points);
            vec![PointGroup {
                title: None,
                points,
                fixed_width: false,
            }]
        }
    }
}

/// One row table: up to three point blocks
#[derive(Debug, Clone)]
pub struct TableRow<'a> {
    /// 1-based number of the first block within its group
    pub first_number: usize,
    /// Empty slots are printed blank (fixed-width rows only)
    pub slots: Vec<Option<&'a CalibrationPoint>>,
    pub preset: &'static TablePreset,
}

impl TableRow<'_> {
    /// Text of every cell, line by line
    pub fn cells(&self) -> Vec<Vec<String>> {
        let blocks: Vec<Vec<BlockLine>> = self
            .slots
            .iter()
            .enumerate()
            .map(|(i, slot)| match slot {
                Some(point) => point_block(point, self.first_number + i),
                None => vec![BlockLine::blank(); BLOCK_LINES],
            })
            .collect();

        (0..BLOCK_LINES)
            .map(|line| {
                let mut cells = Vec::with_capacity(self.preset.widths.len());
                for (i, block) in blocks.iter().enumerate() {
                    if i > 0 {
                        cells.push(String::new());
                    }
                    let l = &block[line];
                    cells.push(l.label.clone());
                    cells.push(if l.label.is_empty() { String::new() } else { ":".to_string() });
                    cells.push(l.value.clone());
                }
                cells
            })
            .collect()
    }

    pub fn vertical_rules(&self) -> Vec<usize> {
        vertical_rules(self.slots.len())
    }
}

/// Split a group into row tables
pub fn rows<'a>(group: &PointGroup<'a>) -> Vec<TableRow<'a>> {
    group
        .points
        .chunks(POINTS_PER_ROW)
        .enumerate()
        .map(|(i, chunk)| {
            let mut slots: Vec<Option<&CalibrationPoint>> =
                chunk.iter().map(|p| Some(*p)).collect();
            if group.fixed_width {
                slots.resize(POINTS_PER_ROW, None);
            }
            TableRow {
                first_number: i * POINTS_PER_ROW + 1,
                preset: preset(slots.len()),
                slots,
            }
        })
        .collect()
}

/// Lines of a point block
pub const BLOCK_LINES: usize = 7;

/// One "label : value" line of a point block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockLine {
    pub label: String,
    pub value: String,
    /// The heading line is printed in bold
    pub heading: bool,
}

impl BlockLine {
    fn new(label: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            value: value.into(),
            heading: false,
        }
    }

    fn blank() -> Self {
        Self::new("", "")
    }
}

/// The seven lines printed for one point
pub fn point_block(point: &CalibrationPoint, number: usize) -> Vec<BlockLine> {
    let unit = point.unit;
    let stats = point.statistics;
    let with_unit = |value: Option<f64>| format!("{}{}", format::number(value), unit);
    let percent = |value: Option<f64>| format!("{}%", format::number(value));

    vec![
        BlockLine {
            heading: true,
            ..BlockLine::new(format!("Ponto {} de medição", number), point.nominal_label())
        },
        BlockLine::new("Número de medições", READING_SLOTS.to_string()),
        BlockLine::new("Média", with_unit(stats.map(|s| s.mean_volume))),
        BlockLine::new(
            "Inexatidão / ISO8655",
            with_unit(stats.map(|s| s.accuracy_absolute)),
        ),
        BlockLine::new("Inexatidão (%)", percent(stats.map(|s| s.accuracy_percent))),
        BlockLine::new(
            "Incerteza / ISO8655",
            with_unit(stats.map(|s| s.standard_deviation)),
        ),
        BlockLine::new("CV (%)", percent(stats.map(|s| s.coefficient_of_variation))),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::readings::parse;
    use crate::entities::point::Syringe;

    fn point(id: u32, nominal: f64) -> CalibrationPoint {
        let mut p = CalibrationPoint::new(id);
        p.nominal_volume = Some(nominal);
        p
    }

    #[test]
    fn test_presets() {
        assert_eq!(preset(1).widths.len(), 3);
        assert_eq!(preset(1).font_size, 10);
        assert_eq!(preset(2).widths.len(), 7);
        assert_eq!(preset(2).font_size, 9);
        assert_eq!(preset(3).widths.len(), 11);
        assert_eq!(preset(3).font_size, 8);
        assert_eq!(preset(3).capacity(), 3);
        assert_eq!(ONE_POINT.total_width(), 178.0);
        assert_eq!(TWO_POINTS.weights(), vec![100, 6, 60, 15, 100, 6, 60]);
    }

    #[test]
    fn test_vertical_rules() {
        assert_eq!(vertical_rules(1), vec![0, 3]);
        assert_eq!(vertical_rules(2), vec![0, 3, 4, 7]);
        assert_eq!(vertical_rules(3), vec![0, 3, 4, 7, 8, 11]);
    }

    #[test]
    fn test_monochannel_group_sorted() {
        let equipment = Equipment::Burette {
            ranges: Default::default(),
            points: vec![point(1, 500.0), point(2, 100.0), point(3, 250.0)],
        };
        let groups = groups(&equipment);
        assert_eq!(groups.len(), 1);
        assert!(groups[0].title.is_none());
        let volumes: Vec<f64> = groups[0]
            .points
            .iter()
            .filter_map(|p| p.nominal_volume)
            .collect();
        assert_eq!(volumes, vec![100.0, 250.0, 500.0]);
    }

    #[test]
    fn test_repipetter_groups_by_syringe_volume() {
        let mut next = 10;
        let mut big = Syringe::new(1, &mut next);
        big.nominal_volume = Some(5.0);
        big.unit = crate::entities::point::Unit::Milliliter;
        let mut small = Syringe::new(2, &mut next);
        small.nominal_volume = Some(0.5);
        let equipment = Equipment::Repipetter {
            syringes: vec![big, small],
        };
        let groups = groups(&equipment);
        assert_eq!(groups[0].title.as_deref(), Some("Seringa de 0,5µL:"));
        assert_eq!(groups[1].title.as_deref(), Some("Seringa de 5mL:"));
    }

    #[test]
    fn test_rows_split_and_number() {
        let points: Vec<CalibrationPoint> =
            (1..=4).map(|i| point(i, i as f64 * 10.0)).collect();
        let group = PointGroup {
            title: None,
            points: points.iter().collect(),
            fixed_width: false,
        };
        let rows = rows(&group);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].slots.len(), 3);
        assert_eq!(rows[1].slots.len(), 1);
        assert_eq!(rows[1].first_number, 4);
        assert_eq!(rows[1].preset, &ONE_POINT);
        assert_eq!(rows[1].cells()[0][0], "Ponto 4 de medição");
    }

    #[test]
    fn test_fixed_width_rows_pad_blank_slots() {
        let points = vec![point(1, 10.0)];
        let group = PointGroup {
            title: Some("Canal 1:".into()),
            points: points.iter().collect(),
            fixed_width: true,
        };
        let rows = rows(&group);
        assert_eq!(rows[0].preset, &THREE_POINTS);
        assert_eq!(rows[0].vertical_rules(), vec![0, 3, 4, 7, 8, 11]);
        let cells = rows[0].cells();
        assert_eq!(cells.len(), BLOCK_LINES);
        assert_eq!(cells[0].len(), 11);
        assert!(cells[0][4].is_empty());
    }

    #[test]
    fn test_point_block_values() {
        let mut p = point(1, 100.0);
        p.readings = parse("99.4, 99.5").slots;
        p.recompute(1.0043);
        let block = point_block(&p, 1);
        assert_eq!(block.len(), BLOCK_LINES);
        assert_eq!(block[0].value, "100µL");
        assert!(block[0].heading);
        assert_eq!(block[1].value, "10");
        assert_eq!(block[2].value, "99,88µL");
        assert_eq!(block[3].value, "-0,12µL");
        assert_eq!(block[4].value, "-0,12%");
        assert_eq!(block[5].value, "0,07µL");
        assert_eq!(block[6].value, "0,07%");
    }

    #[test]
    fn test_point_block_without_statistics() {
        let block = point_block(&CalibrationPoint::new(1), 2);
        assert_eq!(block[0].label, "Ponto 2 de medição");
        assert_eq!(block[0].value, "");
        assert_eq!(block[2].value, "0,00µL");
        assert_eq!(block[6].value, "0,00%");
    }
}

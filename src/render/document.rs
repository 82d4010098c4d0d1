//! Certificate content as a flat list of blocks
//!
//! [`compose`] decides what goes on the certificate and in which order; the
//! PDF backend ([`super::pdf`]) turns every block into typeset elements. Page
//! geometry (margins, letterhead, stripe, footer) is described here too so
//! that it can be checked without rendering.

use chrono::NaiveDate;

use super::assets::{AssetKind, Assets};
use super::layout::{self, TableRow};
use super::RenderError;
use crate::core::config::Laboratory;
use crate::core::format::{self, MISSING_ADDRESS};
use crate::entities::draft::{CertificateDraft, Equipment, RangeValue};

/// Width of the letterhead image (pt)
pub const HEADER_WIDTH: f32 = 515.0;
pub const SIGNATURE_WIDTH: f32 = 150.0;
pub const SIGNATURE_RULE: f32 = 220.0;
pub const STRIPE_WIDTH: f32 = 20.0;
/// #D8E9A8
pub const STRIPE_COLOR: (u8, u8, u8) = (216, 233, 168);

pub const SUBTITLE: &str = "LABORATÓRIO DE CALIBRAÇÃO E ENSAIO";
pub const ISO_REFERENCE: &str = "ISO8655";

/// Page margins in points; they grow when header or footer images are present
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Margins {
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
    pub left: f32,
}

impl Margins {
    pub fn for_assets(assets: &Assets) -> Self {
        Self {
            top: if assets.header.is_some() { 140.0 } else { 80.0 },
            right: 40.0,
            bottom: if assets.footer.is_some() { 140.0 } else { 100.0 },
            left: 40.0,
        }
    }
}

/// One line of text with its weight and size
#[derive(Debug, Clone, PartialEq)]
pub struct Line {
    pub text: String,
    pub bold: bool,
    pub size: u8,
}

impl Line {
    fn bold(text: impl Into<String>, size: u8) -> Self {
        Self {
            text: text.into(),
            bold: true,
            size,
        }
    }

    fn regular(text: impl Into<String>, size: u8) -> Self {
        Self {
            text: text.into(),
            bold: false,
            size,
        }
    }
}

/// A row table of point blocks, printed on a single page
#[derive(Debug, Clone, PartialEq)]
pub struct PointTable {
    /// Group title printed above the first row of a group
    pub title: Option<String>,
    /// Column widths (pt)
    pub widths: &'static [f32],
    pub weights: Vec<usize>,
    pub font_size: u8,
    /// Column boundaries that carry a vertical rule
    pub rules: Vec<usize>,
    /// Cell text, line by line; the first line is bold
    pub cells: Vec<Vec<String>>,
}

impl PointTable {
    fn new(title: Option<String>, row: &TableRow<'_>) -> Self {
        Self {
            title,
            widths: row.preset.widths,
            weights: row.preset.weights(),
            font_size: row.preset.font_size,
            rules: row.vertical_rules(),
            cells: row.cells(),
        }
    }

    /// Table width (pt)
    pub fn width(&self) -> f32 {
        self.widths.iter().sum()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Block {
    /// Centred text, wrapped
    Centered(Line),
    /// Flush-left text, wrapped
    Text(Line),
    /// Bold label followed by a regular value, 11 pt
    Field { label: String, value: String },
    Table(PointTable),
    /// Optional signature image, a rule, then the signatory lines
    Signature { image: bool, name: Line, role: Line },
    /// Vertical gap (pt)
    Space(f32),
}

impl Block {
    fn lines(&self) -> Vec<String> {
        match self {
            Block::Centered(line) | Block::Text(line) => vec![line.text.clone()],
            Block::Field { label, value } => vec![format!("{}: {}", label, value)],
            Block::Table(table) => table
                .title
                .iter()
                .cloned()
                .chain(
                    table
                        .cells
                        .iter()
                        .flatten()
                        .filter(|cell| !cell.is_empty())
                        .cloned(),
                )
                .collect(),
            Block::Signature { name, role, .. } => vec![name.text.clone(), role.text.clone()],
            Block::Space(_) => Vec::new(),
        }
    }
}

/// What sits at the top of every page
#[derive(Debug, Clone, PartialEq)]
pub enum Letterhead {
    Image,
    /// Laboratory name, tax id and contact, centred
    Text(Vec<Line>),
}

/// A composed certificate, ready to be typeset
#[derive(Debug, Clone)]
pub struct Document {
    pub title: String,
    pub issue_date: NaiveDate,
    pub margins: Margins,
    pub letterhead: Letterhead,
    pub footer: bool,
    pub blocks: Vec<Block>,
}

impl Document {
    /// Whether the certificate draws the given image
    pub fn uses(&self, kind: AssetKind) -> bool {
        match kind {
            AssetKind::Header => self.letterhead == Letterhead::Image,
            AssetKind::Footer => self.footer,
            AssetKind::Signature => self
                .blocks
                .iter()
                .any(|block| matches!(block, Block::Signature { image: true, .. })),
        }
    }

    /// All text of the certificate, one run per line
    pub fn plain_text(&self) -> String {
        let mut out = String::new();
        if let Letterhead::Text(lines) = &self.letterhead {
            for line in lines {
                out.push_str(&line.text);
                out.push('\n');
            }
        }
        for block in &self.blocks {
            for line in block.lines() {
                out.push_str(&line);
                out.push('\n');
            }
        }
        out
    }
}

/// Uppercased text, "N/A" when blank
fn upper_or_na(value: &str) -> String {
    let value = value.trim();
    if value.is_empty() {
        "N/A".to_string()
    } else {
        value.to_uppercase()
    }
}

/// Title line with the certificate number, "XXXX" when unset
pub fn certificate_title(lab: &Laboratory, number: &str) -> String {
    let number = if number.trim().is_empty() {
        "XXXX"
    } else {
        number.trim()
    };
    format!(
        "CERTIFICADO DE CALIBRAÇÃO - {} - Nº CAL – {}",
        lab.short_name, number
    )
}

fn check_points(equipment: &Equipment) -> Result<(), RenderError> {
    if let Equipment::Repipetter { syringes } = equipment {
        if syringes.is_empty() {
            return Err(RenderError::NoSyringes);
        }
    }
    if equipment.points().next().is_none() {
        return Err(RenderError::NoCalibrationPoints);
    }
    Ok(())
}

fn letterhead(lab: &Laboratory, assets: &Assets) -> Letterhead {
    if assets.header.is_some() {
        return Letterhead::Image;
    }
    let lines = [
        Line::bold(lab.name.trim(), 16),
        Line::regular(lab.tax_id.trim(), 11),
        Line::regular(lab.contact.trim(), 11),
    ];
    Letterhead::Text(lines.into_iter().filter(|l| !l.text.is_empty()).collect())
}

/// Lay out a certificate
pub fn compose(
    draft: &CertificateDraft,
    lab: &Laboratory,
    standards: &str,
    assets: &Assets,
) -> Result<Document, RenderError> {
    check_points(&draft.equipment)?;

    let title = certificate_title(lab, &draft.certificate_number);
    let mut blocks = vec![
        Block::Centered(Line::bold(title.clone(), 14)),
        Block::Space(5.0),
        Block::Centered(Line::bold(SUBTITLE, 12)),
        Block::Space(25.0),
    ];

    let field = |label: &str, value: String| Block::Field {
        label: label.to_string(),
        value,
    };
    let address = if draft.client.address.is_empty() {
        MISSING_ADDRESS.to_string()
    } else {
        draft.client.address.format_line()
    };
    blocks.push(field("CLIENTE", upper_or_na(&draft.client.name)));
    blocks.push(field("ENDEREÇO", address.to_uppercase()));
    blocks.push(field(
        "INSTRUMENTO",
        draft.equipment.certificate_label().to_string(),
    ));
    if let Some(ranges) = draft.equipment.ranges() {
        let show = |r: Option<&RangeValue>| r.map_or_else(|| "N/A".to_string(), |r| r.to_string());
        blocks.push(field("FAIXA DE INDICAÇÃO", show(ranges.indication())));
        blocks.push(field("FAIXA CALIBRADA", show(ranges.calibrated())));
    }
    blocks.push(field("FABRICANTE", upper_or_na(&draft.manufacturer)));
    blocks.push(field("Nº DE IDENTIFICAÇÃO", upper_or_na(&draft.identification)));
    blocks.push(field("Nº DE SÉRIE", upper_or_na(&draft.serial_number)));
    blocks.push(field("MODELO", upper_or_na(&draft.model)));
    blocks.push(field(
        "DATA DE CALIBRAÇÃO",
        format::date(draft.calibration_date),
    ));
    blocks.push(field(
        "DATA DA EMISSÃO DO CERTIFICADO",
        format::date(draft.issue_date()),
    ));
    blocks.push(Block::Space(15.0));

    blocks.push(Block::Text(Line::bold("Tabela de Valores Obtidos:", 12)));
    blocks.push(Block::Space(10.0));

    for (i, group) in layout::groups(&draft.equipment).iter().enumerate() {
        if group.title.is_some() && i > 0 {
            blocks.push(Block::Space(20.0));
        }
        for (j, row) in layout::rows(group).iter().enumerate() {
            // The group title travels with its first row
            let title = if j == 0 { group.title.clone() } else { None };
            blocks.push(Block::Table(PointTable::new(title, row)));
            blocks.push(Block::Space(15.0));
        }
    }

    blocks.push(Block::Space(5.0));
    blocks.push(Block::Text(Line::bold("Padrões Utilizados:", 12)));
    blocks.push(Block::Space(8.0));
    for paragraph in standards.lines().filter(|l| !l.trim().is_empty()) {
        blocks.push(Block::Text(Line::regular(paragraph.trim(), 11)));
    }
    blocks.push(Block::Space(15.0));

    blocks.push(Block::Text(Line::bold("Parâmetros:", 12)));
    blocks.push(Block::Space(8.0));
    let environment = &draft.environment;
    for line in [
        format!(
            "Temperatura: {} ºC",
            format::volume(environment.temperature)
        ),
        format!(
            "Umidade Relativa do Ar: {}%",
            format::volume(environment.relative_humidity)
        ),
        format!(
            "Valor Z de correção: {} µL/mg",
            format::factor(Some(draft.correction_factor))
        ),
        format!("Prova de acordo: {}", ISO_REFERENCE),
    ] {
        blocks.push(Block::Text(Line::regular(line, 11)));
    }
    blocks.push(Block::Space(30.0));

    blocks.push(Block::Signature {
        image: assets.signature.is_some(),
        name: Line::bold(lab.signatory_name.clone(), 12),
        role: Line::regular(lab.signatory_role.clone(), 10),
    });

    tracing::debug!(id = %draft.id, blocks = blocks.len(), "composed certificate");
    Ok(Document {
        title,
        issue_date: draft.issue_date(),
        margins: Margins::for_assets(assets),
        letterhead: letterhead(lab, assets),
        footer: assets.footer.is_some(),
        blocks,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::autofill::Autofill;
    use crate::entities::draft::{DraftAction, EquipmentKind, InstrumentKind};
    use crate::render::assets::{tests::png, Image};
    use chrono::NaiveDate;
    use std::path::Path;

    fn draft() -> CertificateDraft {
        let mut d = CertificateDraft::new("t", NaiveDate::from_ymd_opt(2025, 5, 20).unwrap());
        d.serial_number = "abc123".into();
        d.client.name = "Laboratório Central".into();
        d
    }

    fn apply(d: &CertificateDraft, action: DraftAction) -> CertificateDraft {
        let mut autofill = Autofill::seeded(7);
        d.apply(action, &mut autofill).unwrap().draft
    }

    fn tables(doc: &Document) -> Vec<&PointTable> {
        doc.blocks
            .iter()
            .filter_map(|b| match b {
                Block::Table(t) => Some(t),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_title_placeholder() {
        let lab = Laboratory::default();
        assert!(certificate_title(&lab, "").ends_with("Nº CAL – XXXX"));
        assert!(certificate_title(&lab, "12.3").ends_with("Nº CAL – 12.3"));
    }

    #[test]
    fn test_compose_text_fallbacks() {
        let lab = Laboratory {
            name: "ACME Metrologia".into(),
            ..Default::default()
        };
        let doc = compose(&draft(), &lab, "Balança X", &Assets::none()).unwrap();
        let text = doc.plain_text();
        assert!(text.contains("ACME Metrologia"));
        assert!(text.contains("LABORATÓRIO CENTRAL"));
        assert!(text.contains(MISSING_ADDRESS.to_uppercase().as_str()));
        assert!(text.contains("MICROPIPETA MONOCANAL"));
        assert!(text.contains("ABC123"));
        assert!(text.contains("20/05/2025"));
        assert!(text.contains("Balança X"));
        assert!(text.contains("Valor Z de correção: 1,0029 µL/mg"));
        assert!(text.contains("Ponto 1 de medição"));
        assert!(!doc.uses(AssetKind::Header));
        assert!(!doc.uses(AssetKind::Signature));
    }

    #[test]
    fn test_images_replace_text_letterhead() {
        let image = Image::from_bytes(&png(40, 10), Path::new("x.png")).unwrap();
        let assets = Assets {
            header: Some(image.clone()),
            signature: Some(image),
            footer: None,
        };
        let doc = compose(&draft(), &Laboratory::default(), "", &assets).unwrap();
        assert_eq!(doc.letterhead, Letterhead::Image);
        assert!(doc.uses(AssetKind::Header));
        assert!(doc.uses(AssetKind::Signature));
        assert!(!doc.uses(AssetKind::Footer));
        assert_eq!(doc.margins.top, 140.0);
        assert_eq!(doc.margins.bottom, 100.0);
    }

    #[test]
    fn test_margins_follow_assets() {
        let none = Margins::for_assets(&Assets::none());
        assert_eq!((none.top, none.bottom), (80.0, 100.0));
    }

    #[test]
    fn test_repipetter_without_syringes_fails() {
        let mut d = apply(&draft(), DraftAction::SetEquipment(EquipmentKind::Repipetter));
        d.equipment = Equipment::Repipetter { syringes: vec![] };
        let result = compose(&d, &Laboratory::default(), "", &Assets::none());
        assert!(matches!(result, Err(RenderError::NoSyringes)));
    }

    #[test]
    fn test_burette_without_points_fails() {
        let mut d = draft();
        d.equipment = Equipment::Burette {
            ranges: Default::default(),
            points: vec![],
        };
        let result = compose(&d, &Laboratory::default(), "", &Assets::none());
        assert!(matches!(result, Err(RenderError::NoCalibrationPoints)));
    }

    #[test]
    fn test_repipetter_skips_ranges() {
        let d = apply(&draft(), DraftAction::SetEquipment(EquipmentKind::Repipetter));
        let doc = compose(&d, &Laboratory::default(), "", &Assets::none()).unwrap();
        let text = doc.plain_text();
        assert!(text.contains("REPIPETADOR"));
        assert!(!text.contains("FAIXA CALIBRADA"));
        assert!(text.contains("Seringa"));
    }

    #[test]
    fn test_tables_follow_presets() {
        let mut d = draft();
        for _ in 0..3 {
            d = apply(&d, DraftAction::AddPoint { syringe: None });
        }
        let doc = compose(&d, &Laboratory::default(), "", &Assets::none()).unwrap();
        let tables = tables(&doc);
        // Four points: a full row of three, then one
        assert_eq!(tables.len(), 2);
        assert_eq!(tables[0].font_size, 8);
        assert_eq!(tables[0].rules, vec![0, 3, 4, 7, 8, 11]);
        assert_eq!(tables[0].cells.len(), layout::BLOCK_LINES);
        assert_eq!(tables[1].width(), 178.0);
        assert_eq!(tables[1].weights, vec![110, 8, 60]);
    }

    #[test]
    fn test_group_title_only_on_first_row() {
        let d = apply(&draft(), DraftAction::SetInstrument(InstrumentKind::Multichannel));
        let d = apply(&d, DraftAction::SetPointsPerChannel(4));
        let doc = compose(&d, &Laboratory::default(), "", &Assets::none()).unwrap();
        let tables = tables(&doc);
        // Eight channels, two rows each
        assert_eq!(tables.len(), 16);
        assert_eq!(tables[0].title.as_deref(), Some("Canal 1:"));
        assert_eq!(tables[1].title, None);
        assert_eq!(tables[2].title.as_deref(), Some("Canal 2:"));
        assert!(tables.iter().all(|t| t.widths.len() == 11));
    }
}

//! PDF typesetting with genpdfi
//!
//! Blocks of a [`Document`] become genpdfi elements on A4 pages set in the
//! bundled DejaVu Sans. The writer stamps a random document id and the
//! current time, so the file is post-processed with lopdf: the id becomes a
//! SHA-256 of the page content streams and both dates become the issue date.

use genpdfi::elements::{LinearLayout, Paragraph, TableLayout};
use genpdfi::fonts::{FontData, FontFamily};
use genpdfi::{Alignment, Element, Mm, PaperSize};
use lopdf::{Object, StringFormat};
use sha2::{Digest, Sha256};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;

use super::assets::{AssetKind, Assets, Image};
use super::document::{self, Block, Document, Line, PointTable, SIGNATURE_RULE, SIGNATURE_WIDTH};
use super::elements::{
    self, line_style, paragraph, pt, CertificatePage, FixedWidth, Gap, KeepTogether, Rule,
    RuleDecorator, CELL_PADDING, ROW_PADDING,
};
use super::RenderError;
use crate::core::config::Config;
use crate::entities::draft::CertificateDraft;
use crate::schema::template::TemplateGenerator;

const REGULAR: &[u8] = include_bytes!(concat!(env!("CARGO_MANIFEST_DIR"), "/fonts/DejaVuSans.ttf"));
const BOLD: &[u8] = include_bytes!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/fonts/DejaVuSans-Bold.ttf"
));

const BODY_SIZE: u8 = 11;
const LINE_SPACING: f32 = 1.25;
/// Space between a table title and the table (pt)
const TITLE_GAP: f32 = 10.0;

/// A rendered certificate ready to be written or opened
#[derive(Debug, Clone)]
pub struct RenderedCertificate {
    pub bytes: Vec<u8>,
    pub file_name: String,
    pub page_count: usize,
    /// Hex SHA-256 of the page contents
    pub fingerprint: String,
}

impl RenderedCertificate {
    /// Write the PDF into `dir`, creating it if needed
    pub fn download(&self, dir: &Path) -> Result<PathBuf, RenderError> {
        fs::create_dir_all(dir)?;
        let path = dir.join(&self.file_name);
        fs::write(&path, &self.bytes)?;
        tracing::info!(path = %path.display(), pages = self.page_count, "wrote certificate");
        Ok(path)
    }

    /// Write the PDF to a fresh temporary file and open it with `viewer`
    pub fn preview(&self, viewer: &str) -> Result<PathBuf, RenderError> {
        let path = self.write_temporary()?;
        Command::new(viewer).arg(&path).spawn()?;
        tracing::debug!(viewer, path = %path.display(), "opened preview");
        Ok(path)
    }

    /// The file outlives the process so the viewer can still read it
    fn write_temporary(&self) -> Result<PathBuf, RenderError> {
        let prefix = format!("{}-", self.file_name.trim_end_matches(".pdf"));
        let mut file = tempfile::Builder::new()
            .prefix(&prefix)
            .suffix(".pdf")
            .tempfile()?;
        file.write_all(&self.bytes)?;
        let (_, path) = file.keep().map_err(|e| e.error)?;
        Ok(path)
    }
}

/// Compose and typeset a certificate
pub fn render(
    draft: &CertificateDraft,
    config: &Config,
    assets: &Assets,
) -> Result<RenderedCertificate, RenderError> {
    let document = document::compose(
        draft,
        &config.laboratory,
        &config.standards_used,
        assets,
    )?;
    let file_name = TemplateGenerator::file_name(&config.output.file_name, draft)?;
    let typeset = typeset(&document, assets)?;
    let finished = finish(&typeset, &document)?;
    Ok(RenderedCertificate {
        bytes: finished.bytes,
        file_name,
        page_count: finished.page_count,
        fingerprint: finished.fingerprint,
    })
}

fn fonts() -> Result<FontFamily<FontData>, genpdfi::error::Error> {
    let regular = Arc::new(REGULAR.to_vec());
    let bold = Arc::new(BOLD.to_vec());
    Ok(FontFamily {
        regular: FontData::new_shared(regular.clone(), None)?,
        bold: FontData::new_shared(bold.clone(), None)?,
        italic: FontData::new_shared(regular, None)?,
        bold_italic: FontData::new_shared(bold, None)?,
    })
}

/// Lay a composed document out on pages; returns the raw PDF
pub fn typeset(document: &Document, assets: &Assets) -> Result<Vec<u8>, RenderError> {
    let mut pdf = genpdfi::Document::new(fonts()?);
    pdf.set_title(document.title.clone());
    pdf.set_paper_size(PaperSize::A4);
    pdf.set_font_size(BODY_SIZE);
    pdf.set_line_spacing(LINE_SPACING);
    pdf.set_minimal_conformance();

    let header = assets
        .header
        .clone()
        .filter(|_| document.uses(AssetKind::Header));
    let footer = assets
        .footer
        .clone()
        .filter(|_| document.uses(AssetKind::Footer));
    pdf.set_page_decorator(CertificatePage::new(
        document.margins,
        document.letterhead.clone(),
        header,
        footer,
    ));

    let page_height: Mm = Mm::from(297)
        - pt(document.margins.top)
        - pt(document.margins.bottom);
    for block in &document.blocks {
        pdf.push(element(block, assets.signature.as_ref(), page_height)?);
    }

    let mut bytes = Vec::new();
    pdf.render(&mut bytes)?;
    Ok(bytes)
}

fn element(
    block: &Block,
    signature: Option<&Image>,
    page_height: Mm,
) -> Result<Box<dyn Element>, RenderError> {
    let element: Box<dyn Element> = match block {
        Block::Centered(line) => Box::new(paragraph(line).aligned(Alignment::Center)),
        Block::Text(line) => Box::new(paragraph(line)),
        Block::Field { label, value } => Box::new(
            Paragraph::default()
                .styled_string(
                    format!("{}: ", label),
                    genpdfi::style::Style::new().bold().with_font_size(BODY_SIZE),
                )
                .styled_string(
                    value.clone(),
                    genpdfi::style::Style::new().with_font_size(BODY_SIZE),
                ),
        ),
        Block::Table(table) => Box::new(point_table(table, page_height)?),
        Block::Signature { image, name, role } => {
            let image = if *image { signature } else { None };
            Box::new(signature_block(image, name, role, page_height)?)
        }
        Block::Space(height) => Box::new(Gap(pt(*height))),
    };
    Ok(element)
}

/// Height (mm) of the text of one cell wrapped to `width`
fn cell_height(
    context: &genpdfi::Context,
    style: genpdfi::style::Style,
    text: &str,
    width: f32,
) -> f32 {
    let line = f32::from(style.line_height(&context.font_cache));
    if text.is_empty() {
        return 0.0;
    }
    let needed = f32::from(style.str_width(&context.font_cache, text));
    let lines = if width > 0.0 {
        (needed / width).ceil().max(1.0)
    } else {
        1.0
    };
    lines * line
}

fn point_table(table: &PointTable, page_height: Mm) -> Result<impl Element, RenderError> {
    let mut layout = TableLayout::new(table.weights.clone());
    layout.set_cell_decorator(RuleDecorator::new(table.rules.clone()));
    for (i, line) in table.cells.iter().enumerate() {
        let style = cell_style(table.font_size, i);
        let row: Vec<Box<dyn Element>> = line
            .iter()
            .map(|cell| {
                let paragraph = if cell.is_empty() {
                    Paragraph::default()
                } else {
                    Paragraph::default().styled_string(cell.clone(), style)
                };
                Box::new(paragraph) as Box<dyn Element>
            })
            .collect();
        layout.push_row(row)?;
    }

    let width = pt(table.width());
    let mut content = LinearLayout::vertical();
    if let Some(title) = &table.title {
        content.push(paragraph(&Line {
            text: title.clone(),
            bold: true,
            size: 10,
        }));
        content.push(Gap(pt(TITLE_GAP)));
    }
    content.push(FixedWidth::new(layout, width));

    let title = table.title.clone();
    let cells = table.cells.clone();
    let weights = table.weights.clone();
    let font_size = table.font_size;
    Ok(KeepTogether::new(
        content,
        page_height,
        move |context, style, available| {
            let table_width = f32::from(if width < available { width } else { available });
            let total: usize = weights.iter().sum::<usize>().max(1);
            let mut height = 0.0;
            if let Some(title) = &title {
                let style = style.and(line_style(&Line {
                    text: title.clone(),
                    bold: true,
                    size: 10,
                }));
                height += cell_height(context, style, title, table_width) + f32::from(pt(TITLE_GAP));
            }
            for (i, line) in cells.iter().enumerate() {
                let style = style.and(cell_style(font_size, i));
                let row = line
                    .iter()
                    .zip(&weights)
                    .map(|(cell, weight)| {
                        let column = table_width * *weight as f32 / total as f32
                            - 2.0 * f32::from(pt(CELL_PADDING));
                        cell_height(context, style, cell, column)
                    })
                    .fold(0.0, f32::max);
                height += row + f32::from(pt(ROW_PADDING));
            }
            Mm::from(height + f32::from(pt(ROW_PADDING)))
        },
    ))
}

/// The first line of a point block is its heading
fn cell_style(font_size: u8, line: usize) -> genpdfi::style::Style {
    let style = genpdfi::style::Style::new().with_font_size(font_size);
    if line == 0 {
        style.bold()
    } else {
        style
    }
}

fn signature_block(
    image: Option<&Image>,
    name: &Line,
    role: &Line,
    page_height: Mm,
) -> Result<impl Element, RenderError> {
    let mut content = LinearLayout::vertical();
    let mut image_height = 0.0;
    if let Some(image) = image {
        content.push(
            elements::scaled(image, SIGNATURE_WIDTH)?.with_alignment(Alignment::Center),
        );
        content.push(Gap(pt(2.0)));
        content.push(Rule(pt(SIGNATURE_RULE)));
        content.push(Gap(pt(4.0)));
        image_height = image.height_for(SIGNATURE_WIDTH) + 6.5;
    }
    content.push(paragraph(name).aligned(Alignment::Center));
    content.push(paragraph(role).aligned(Alignment::Center));

    let lines = [line_style(name), line_style(role)];
    Ok(KeepTogether::new(
        content,
        page_height,
        move |context, style, _| {
            let text: f32 = lines
                .iter()
                .map(|line| f32::from(style.and(*line).line_height(&context.font_cache)))
                .sum();
            pt(image_height) + Mm::from(text)
        },
    ))
}

struct Finished {
    bytes: Vec<u8>,
    fingerprint: String,
    page_count: usize,
}

/// Replace the random document id and the wall-clock dates
fn finish(bytes: &[u8], document: &Document) -> Result<Finished, RenderError> {
    let mut pdf = lopdf::Document::load_mem(bytes)?;
    let pages = pdf.get_pages();

    let mut hasher = Sha256::new();
    for page_id in pages.values() {
        hasher.update(pdf.get_page_content(*page_id)?);
    }
    let digest = hasher.finalize();
    let fingerprint: String = digest.iter().map(|b| format!("{:02x}", b)).collect();

    let stamp = format!("D:{}000000", document.issue_date.format("%Y%m%d"));
    let info = pdf.trailer.get(b"Info").and_then(Object::as_reference)?;
    let info = pdf.get_dictionary_mut(info)?;
    info.set("CreationDate", Object::string_literal(stamp.clone()));
    info.set("ModDate", Object::string_literal(stamp));
    info.set(
        "Producer",
        Object::string_literal(concat!("calcert ", env!("CARGO_PKG_VERSION"))),
    );

    let id = Object::String(digest[..16].to_vec(), StringFormat::Hexadecimal);
    pdf.trailer.set("ID", Object::Array(vec![id.clone(), id]));

    let mut out = Vec::new();
    pdf.save_to(&mut out)?;
    tracing::debug!(
        pages = pages.len(),
        size = out.len(),
        fingerprint = %fingerprint,
        "serialized PDF"
    );
    Ok(Finished {
        bytes: out,
        fingerprint,
        page_count: pages.len(),
    })
}

//! Typeset pieces built on genpdfi
//!
//! [`CertificatePage`] draws what repeats on every page; the other elements
//! cover the parts of a certificate genpdfi has no element for.

use genpdfi::elements::{self, CellDecorator, Paragraph};
use genpdfi::error::Error;
use genpdfi::render::Area;
use genpdfi::style::{Color, LineStyle, Style};
use genpdfi::{Alignment, Context, Element, Mm, PageDecorator, Position};
use genpdfi::{RenderResult, Scale, Size};

use super::assets::Image;
use super::document::{Letterhead, Line, Margins, HEADER_WIDTH, STRIPE_COLOR, STRIPE_WIDTH};

/// Horizontal cell padding (pt)
pub const CELL_PADDING: f32 = 2.0;
/// Space above each table row (pt)
pub const ROW_PADDING: f32 = 1.5;
const RULE_THICKNESS: f32 = 0.5;

/// Points to millimetres
pub fn pt(value: f32) -> Mm {
    Mm::from(value * 25.4 / 72.0)
}

/// Text style of a line
pub fn line_style(line: &Line) -> Style {
    let style = Style::new().with_font_size(line.size);
    if line.bold {
        style.bold()
    } else {
        style
    }
}

pub fn paragraph(line: &Line) -> Paragraph {
    Paragraph::default().styled_string(line.text.clone(), line_style(line))
}

fn rule_style() -> LineStyle {
    LineStyle::new().with_thickness(pt(RULE_THICKNESS))
}

/// An image scaled to `width` (pt)
pub fn scaled(image: &Image, width: f32) -> Result<elements::Image, Error> {
    // Unscaled images are placed at 300 dpi
    let natural = image.width().max(1) as f32 * 72.0 / 300.0;
    let factor = width / natural;
    Ok(elements::Image::from_dynamic_image(image.data.clone())?
        .with_scale(Scale::new(factor, factor)))
}

/// Width and height (pt) of an image fitted into a box
fn fit(image: &Image, max_width: f32, max_height: f32) -> (f32, f32) {
    let height = image.height_for(max_width);
    if height <= max_height || height <= 0.0 {
        (max_width, height)
    } else {
        (max_width * max_height / height, max_height)
    }
}

/// Letterhead, side stripe and footer of every certificate page
pub struct CertificatePage {
    margins: Margins,
    letterhead: Letterhead,
    header: Option<Image>,
    footer: Option<Image>,
    pages: usize,
}

impl CertificatePage {
    pub fn new(
        margins: Margins,
        letterhead: Letterhead,
        header: Option<Image>,
        footer: Option<Image>,
    ) -> Self {
        Self {
            margins,
            letterhead,
            header,
            footer,
            pages: 0,
        }
    }

    fn stripe(&self, area: &Area<'_>) {
        let page = area.size();
        let x = pt(STRIPE_WIDTH / 2.0);
        let (r, g, b) = STRIPE_COLOR;
        area.draw_line(
            vec![
                Position::new(x, pt(self.margins.top)),
                Position::new(x, page.height - pt(self.margins.bottom)),
            ],
            LineStyle::new()
                .with_thickness(pt(STRIPE_WIDTH))
                .with_color(Color::Rgb(r, g, b)),
        );
    }

    fn letterhead(&self, context: &Context, area: &Area<'_>, style: Style) -> Result<(), Error> {
        if let Some(header) = &self.header {
            let (width, _) = fit(header, HEADER_WIDTH, self.margins.top - 30.0);
            let mut slot = area.clone();
            slot.add_offset(Position::new(0, pt(20.0)));
            scaled(header, width)?
                .with_alignment(Alignment::Center)
                .render(context, slot, style)?;
            return Ok(());
        }
        if let Letterhead::Text(lines) = &self.letterhead {
            let mut slot = area.clone();
            slot.add_offset(Position::new(0, pt(30.0)));
            for line in lines {
                let result = paragraph(line)
                    .aligned(Alignment::Center)
                    .render(context, slot.clone(), style)?;
                slot.add_offset(Position::new(0, result.size.height));
            }
        }
        Ok(())
    }

    fn footer(&self, context: &Context, area: &Area<'_>, style: Style) -> Result<(), Error> {
        let Some(footer) = &self.footer else {
            return Ok(());
        };
        let page = area.size();
        let page_width = f32::from(page.width) * 72.0 / 25.4;
        let (width, height) = fit(footer, page_width, self.margins.bottom);
        let mut slot = area.clone();
        slot.add_offset(Position::new(0, page.height - pt(height)));
        scaled(footer, width)?
            .with_alignment(Alignment::Center)
            .render(context, slot, style)?;
        Ok(())
    }
}

impl PageDecorator for CertificatePage {
    fn decorate_page<'a>(
        &mut self,
        context: &Context,
        mut area: Area<'a>,
        style: Style,
    ) -> Result<Area<'a>, Error> {
        self.pages += 1;
        self.stripe(&area);
        self.letterhead(context, &area, style)?;
        self.footer(context, &area, style)?;
        tracing::trace!(page = self.pages, "decorated page");

        area.add_margins(genpdfi::Margins::trbl(
            pt(self.margins.top),
            pt(self.margins.right),
            pt(self.margins.bottom),
            pt(self.margins.left),
        ));
        Ok(area)
    }
}

/// Cell borders of a point table: an outer frame around each point block
pub struct RuleDecorator {
    rules: Vec<usize>,
    rows: usize,
}

impl RuleDecorator {
    /// `rules` lists the column boundaries that carry a vertical rule
    pub fn new(rules: Vec<usize>) -> Self {
        Self { rules, rows: 0 }
    }

    /// Gap columns between blocks are ruled on both sides
    fn is_gap(&self, column: usize) -> bool {
        column > 0 && self.rules.contains(&column) && self.rules.contains(&(column + 1))
    }
}

impl CellDecorator for RuleDecorator {
    fn set_table_size(&mut self, _num_columns: usize, num_rows: usize) {
        self.rows = num_rows;
    }

    fn prepare_cell<'p>(&self, _column: usize, _row: usize, mut area: Area<'p>) -> Area<'p> {
        area.add_margins(genpdfi::Margins::trbl(
            pt(ROW_PADDING),
            pt(CELL_PADDING),
            0,
            pt(CELL_PADDING),
        ));
        area
    }

    fn decorate_cell(
        &mut self,
        column: usize,
        row: usize,
        has_more: bool,
        area: Area<'_>,
        row_height: Mm,
    ) -> Mm {
        let last = has_more || row + 1 == self.rows;
        let mut height = row_height + pt(ROW_PADDING);
        if last {
            height = height + pt(ROW_PADDING);
        }
        let width = area.size().width;

        if !self.is_gap(column) {
            if row == 0 {
                area.draw_line(
                    vec![Position::new(0, 0), Position::new(width, 0)],
                    rule_style(),
                );
            }
            if last {
                area.draw_line(
                    vec![Position::new(0, height), Position::new(width, height)],
                    rule_style(),
                );
            }
        }
        if self.rules.contains(&column) {
            area.draw_line(
                vec![Position::new(0, 0), Position::new(0, height)],
                rule_style(),
            );
        }
        if self.rules.contains(&(column + 1)) {
            area.draw_line(
                vec![Position::new(width, 0), Position::new(width, height)],
                rule_style(),
            );
        }
        height
    }
}

/// Defers its content to the next page once when the estimated height does
/// not fit the remaining space
pub struct KeepTogether<E: Element> {
    inner: E,
    estimate: Box<dyn Fn(&Context, Style, Mm) -> Mm>,
    /// Usable height of an empty page
    page_height: Mm,
    started: bool,
}

impl<E: Element> KeepTogether<E> {
    pub fn new(
        inner: E,
        page_height: Mm,
        estimate: impl Fn(&Context, Style, Mm) -> Mm + 'static,
    ) -> Self {
        Self {
            inner,
            estimate: Box::new(estimate),
            page_height,
            started: false,
        }
    }
}

impl<E: Element> Element for KeepTogether<E> {
    fn render(
        &mut self,
        context: &Context,
        area: Area<'_>,
        style: Style,
    ) -> Result<RenderResult, Error> {
        if !self.started {
            self.started = true;
            let available = area.size();
            let needed = (self.estimate)(context, style, available.width);
            if needed > available.height && needed <= self.page_height {
                tracing::trace!(needed = f32::from(needed), "moved block to the next page");
                return Ok(RenderResult {
                    size: Size::new(1, 0),
                    has_more: true,
                });
            }
        }
        self.inner.render(context, area, style)
    }
}

/// Caps the width of its content
pub struct FixedWidth<E: Element> {
    inner: E,
    width: Mm,
}

impl<E: Element> FixedWidth<E> {
    pub fn new(inner: E, width: Mm) -> Self {
        Self { inner, width }
    }
}

impl<E: Element> Element for FixedWidth<E> {
    fn render(
        &mut self,
        context: &Context,
        mut area: Area<'_>,
        style: Style,
    ) -> Result<RenderResult, Error> {
        if self.width < area.size().width {
            area.set_width(self.width);
        }
        self.inner.render(context, area, style)
    }
}

/// Vertical space
pub struct Gap(pub Mm);

impl Element for Gap {
    fn render(
        &mut self,
        _context: &Context,
        area: Area<'_>,
        _style: Style,
    ) -> Result<RenderResult, Error> {
        let height = if self.0 < area.size().height {
            self.0
        } else {
            area.size().height
        };
        Ok(RenderResult {
            size: Size::new(0, height),
            has_more: false,
        })
    }
}

/// A centred horizontal rule
pub struct Rule(pub Mm);

impl Element for Rule {
    fn render(
        &mut self,
        _context: &Context,
        area: Area<'_>,
        _style: Style,
    ) -> Result<RenderResult, Error> {
        let width = area.size().width;
        let length = if self.0 < width { self.0 } else { width };
        let start = (width - length) / 2.0;
        area.draw_line(
            vec![Position::new(start, 0), Position::new(start + length, 0)],
            rule_style(),
        );
        Ok(RenderResult {
            size: Size::new(width, pt(RULE_THICKNESS)),
            has_more: false,
        })
    }
}

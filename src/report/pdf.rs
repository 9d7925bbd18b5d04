//! PDF pagination and drawing.
//!
//! Layout is computed as a pure pass over the laid-out lines first, then
//! drawn with printpdf. Page geometry is fixed: 600x800 pt pages, 50 pt
//! margins, content starting 100 pt below the top edge to leave room for
//! the running header.

use std::io::Cursor;

use printpdf::{
    BuiltinFont, Image, ImageTransform, IndirectFontRef, Mm, PdfDocument, PdfDocumentReference,
    PdfLayerReference, Pt,
};

use crate::error::{Error, Result};
use crate::report::measure::{self, Face};
use crate::report::text::LayoutLine;

pub const PAGE_WIDTH: f64 = 600.0;
pub const PAGE_HEIGHT: f64 = 800.0;
pub const MARGIN: f64 = 50.0;
/// Top of the content area, below the running header.
pub const CONTENT_TOP: f64 = PAGE_HEIGHT - 100.0;

const BODY_SIZE: f64 = 12.0;
const LINE_SPACING: f64 = 14.0;
const HEADER_SIZE: f64 = 14.0;
const FOOTER_SIZE: f64 = 10.0;
const HEADER_TEXT: &str = "Business Opportunities Report";
const HEADER_Y: f64 = 780.0;
const FOOTER_Y: f64 = 20.0;

const CHART_DRAW_WIDTH: f64 = 400.0;
const CHART_DRAW_HEIGHT: f64 = 200.0;
const CHART_X: f64 = 75.0;

/// One positioned text run. `y` is the baseline in PDF coordinates
/// (origin bottom-left).
#[derive(Debug, Clone, PartialEq)]
pub struct TextPlacement {
    pub page: usize,
    pub y: f64,
    pub text: String,
    pub face: Face,
}

/// One positioned image. `y` is the bottom edge of the image box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImagePlacement {
    pub page: usize,
    pub y: f64,
}

/// Complete layout for a document: every placement plus the number of
/// pages it spans. Pages are numbered from 1.
#[derive(Debug, Clone, Default)]
pub struct Layout {
    pub texts: Vec<TextPlacement>,
    pub images: Vec<ImagePlacement>,
    pub page_count: usize,
}

/// Compute the full document layout: wrapped text lines first, then
/// `image_count` chart boxes. A new page starts whenever the next line
/// or image would cross the bottom margin; blank lines advance the
/// cursor by half a line without ever forcing a break.
pub fn plan_layout(lines: &[LayoutLine], image_count: usize) -> Layout {
    let mut layout = Layout {
        page_count: 1,
        ..Default::default()
    };
    let mut y = CONTENT_TOP;

    for line in lines {
        if line.is_blank() {
            y -= LINE_SPACING * 0.5;
            continue;
        }
        let face = if line.heading { Face::Bold } else { Face::Regular };
        for wrapped in measure::wrap_text(&line.text, face, BODY_SIZE, PAGE_WIDTH - 2.0 * MARGIN) {
            if y - LINE_SPACING < MARGIN {
                layout.page_count += 1;
                y = CONTENT_TOP;
            }
            layout.texts.push(TextPlacement {
                page: layout.page_count,
                y,
                text: wrapped,
                face,
            });
            y -= LINE_SPACING;
        }
    }

    for _ in 0..image_count {
        if y - CHART_DRAW_HEIGHT < MARGIN {
            layout.page_count += 1;
            y = CONTENT_TOP;
        }
        layout.images.push(ImagePlacement {
            page: layout.page_count,
            y: y - CHART_DRAW_HEIGHT,
        });
        y -= CHART_DRAW_HEIGHT;
    }

    layout
}

struct DocumentWriter {
    doc: PdfDocumentReference,
    bold: IndirectFontRef,
    regular: IndirectFontRef,
    layers: Vec<PdfLayerReference>,
}

fn pt(value: f64) -> Mm {
    Mm::from(Pt(value as f32))
}

impl DocumentWriter {
    fn new(page_count: usize) -> Result<Self> {
        let (doc, first_page, first_layer) =
            PdfDocument::new(HEADER_TEXT, pt(PAGE_WIDTH), pt(PAGE_HEIGHT), "content");
        let bold = doc
            .add_builtin_font(BuiltinFont::HelveticaBold)
            .map_err(|e| Error::Render(format!("font embedding failed: {e}")))?;
        let regular = doc
            .add_builtin_font(BuiltinFont::Helvetica)
            .map_err(|e| Error::Render(format!("font embedding failed: {e}")))?;

        let mut layers = vec![doc.get_page(first_page).get_layer(first_layer)];
        for _ in 1..page_count {
            let (page, layer) = doc.add_page(pt(PAGE_WIDTH), pt(PAGE_HEIGHT), "content");
            layers.push(doc.get_page(page).get_layer(layer));
        }

        let writer = Self {
            doc,
            bold,
            regular,
            layers,
        };
        for (index, layer) in writer.layers.iter().enumerate() {
            writer.stamp_header_footer(layer, index + 1);
        }
        Ok(writer)
    }

    fn stamp_header_footer(&self, layer: &PdfLayerReference, page_number: usize) {
        layer.use_text(HEADER_TEXT, HEADER_SIZE as f32, pt(MARGIN), pt(HEADER_Y), &self.bold);

        let footer = format!("Page {page_number}");
        let footer_width = measure::text_width(&footer, Face::Regular, FOOTER_SIZE);
        layer.use_text(
            footer,
            FOOTER_SIZE as f32,
            pt((PAGE_WIDTH - footer_width) / 2.0),
            pt(FOOTER_Y),
            &self.regular,
        );
    }

    fn draw_text(&self, placement: &TextPlacement) {
        let font = match placement.face {
            Face::Bold => &self.bold,
            Face::Regular => &self.regular,
        };
        self.layers[placement.page - 1].use_text(
            placement.text.clone(),
            BODY_SIZE as f32,
            pt(MARGIN),
            pt(placement.y),
            font,
        );
    }

    fn draw_image(&self, placement: &ImagePlacement, png: &[u8]) -> Result<()> {
        let decoded = printpdf::image_crate::load_from_memory(png)
            .map_err(|e| Error::Render(format!("chart PNG decoding failed: {e}")))?;
        let width_px = decoded.width() as f64;
        let height_px = decoded.height() as f64;
        let chart = Image::from_dynamic_image(&decoded);

        // At 72 dpi one pixel is one point, so scale maps pixel size
        // directly onto the target box.
        chart.add_to_layer(
            self.layers[placement.page - 1].clone(),
            ImageTransform {
                translate_x: Some(pt(CHART_X)),
                translate_y: Some(pt(placement.y)),
                scale_x: Some((CHART_DRAW_WIDTH / width_px) as f32),
                scale_y: Some((CHART_DRAW_HEIGHT / height_px) as f32),
                dpi: Some(72.0),
                ..Default::default()
            },
        );
        Ok(())
    }

    fn finish(self) -> Result<Vec<u8>> {
        let mut bytes = Vec::new();
        self.doc
            .save(&mut std::io::BufWriter::new(Cursor::new(&mut bytes)))
            .map_err(|e| Error::Render(format!("PDF serialization failed: {e}")))?;
        Ok(bytes)
    }
}

/// Draw a computed layout plus chart PNGs into a finished document.
pub fn draw(layout: &Layout, charts: &[Vec<u8>]) -> Result<Vec<u8>> {
    let writer = DocumentWriter::new(layout.page_count)?;
    for placement in &layout.texts {
        writer.draw_text(placement);
    }
    for (placement, png) in layout.images.iter().zip(charts) {
        writer.draw_image(placement, png)?;
    }
    writer.finish()
}

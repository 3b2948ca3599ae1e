//! PDF capabilities: reading page text and pixels, and writing simple text pages.
//!
//! The default backends use `lopdf`. Rendering pages to pixels needs a real
//! rasterizer, which is only available through the `pdfium` feature.

use image::DynamicImage;
use lopdf::content::{Content, Operation};
use lopdf::{Document, Object, Stream, dictionary};

use crate::error::ConvertError;

/// A4 portrait in millimetres.
pub const PAGE_WIDTH_MM: f32 = 210.0;
pub const PAGE_HEIGHT_MM: f32 = 297.0;

/// Body font size used for generated PDFs.
pub const FONT_SIZE_PT: f32 = 16.0;

const PT_PER_MM: f32 = 72.0 / 25.4;

/// Opens PDF bytes for inspection.
pub trait PdfReader: Send + Sync {
    fn open<'a>(&'a self, data: &'a [u8]) -> Result<Box<dyn PdfDocument + 'a>, ConvertError>;
}

/// An opened PDF. Page indices are 0-based.
pub trait PdfDocument {
    fn page_count(&self) -> usize;

    /// The page's text items joined by single spaces.
    fn page_text(&self, index: usize) -> Result<String, ConvertError>;

    /// Rasterize a page at `scale` × its natural size (72 dpi).
    fn render_page(&self, index: usize, scale: f32) -> Result<DynamicImage, ConvertError>;
}

/// One line of text positioned from the top-left corner of the page.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedLine {
    pub x_mm: f32,
    pub y_mm: f32,
    pub text: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageLayout {
    pub lines: Vec<PlacedLine>,
}

/// Produces PDF bytes from positioned text.
pub trait PdfWriter: Send + Sync {
    /// Wrap text into lines no wider than `max_width_mm` at the writer's font size.
    fn split_text_to_size(&self, text: &str, max_width_mm: f32) -> Vec<String>;

    fn write(&self, pages: &[PageLayout]) -> Result<Vec<u8>, ConvertError>;
}

// ---- Reading ----

/// Text-only reader backed by `lopdf`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LopdfReader;

struct LopdfDocument {
    document: Document,
    page_numbers: Vec<u32>,
}

impl PdfReader for LopdfReader {
    fn open<'a>(&'a self, data: &'a [u8]) -> Result<Box<dyn PdfDocument + 'a>, ConvertError> {
        let document = Document::load_mem(data)?;
        let page_numbers: Vec<u32> = document.get_pages().keys().copied().collect();
        tracing::debug!(pages = page_numbers.len(), "opened PDF with lopdf");
        Ok(Box::new(LopdfDocument {
            document,
            page_numbers,
        }))
    }
}

impl PdfDocument for LopdfDocument {
    fn page_count(&self) -> usize {
        self.page_numbers.len()
    }

    fn page_text(&self, index: usize) -> Result<String, ConvertError> {
        let page = self.page_numbers.get(index).copied().ok_or_else(|| {
            ConvertError::MalformedDocument {
                reason: format!("page index {index} out of range"),
            }
        })?;
        let text = self.document.extract_text(&[page])?;
        Ok(text
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .collect::<Vec<_>>()
            .join(" "))
    }

    fn render_page(&self, _index: usize, _scale: f32) -> Result<DynamicImage, ConvertError> {
        Err(ConvertError::CapabilityUnavailable {
            capability: "PDF page rendering",
            reason: "built without the `pdfium` feature".to_string(),
        })
    }
}

// ---- Writing ----

/// Helvetica advance widths (1/1000 em) for printable ASCII, from the AFM.
const HELVETICA_WIDTHS: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278, // ' '../
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556, // 0..?
    1015, 667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778, // @..O
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469, 556, // P.._
    333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556, // `..o
    556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584, // p..~
];

const DEFAULT_GLYPH_WIDTH: u16 = 556;

fn glyph_width(c: char) -> u16 {
    match c as u32 {
        cp @ 32..=126 => HELVETICA_WIDTHS[(cp - 32) as usize],
        _ => DEFAULT_GLYPH_WIDTH,
    }
}

/// Rendered width of `text` in millimetres at `font_size_pt`.
pub fn text_width_mm(text: &str, font_size_pt: f32) -> f32 {
    let units: u32 = text.chars().map(|c| u32::from(glyph_width(c))).sum();
    units as f32 / 1000.0 * font_size_pt / PT_PER_MM
}

/// Greedy word wrap.
///
/// Explicit newlines are kept as line boundaries (empty lines included).
/// Words wider than the line are broken between characters.
pub fn wrap_text(text: &str, font_size_pt: f32, max_width_mm: f32) -> Vec<String> {
    let fits = |s: &str| text_width_mm(s, font_size_pt) <= max_width_mm;
    let mut lines = Vec::new();

    for paragraph in text.split('\n') {
        let paragraph = paragraph.strip_suffix('\r').unwrap_or(paragraph);
        let mut line = String::new();

        for (i, word) in paragraph.split(' ').enumerate() {
            if i > 0 {
                let candidate = format!("{line} {word}");
                if fits(&candidate) {
                    line = candidate;
                    continue;
                }
                lines.push(std::mem::take(&mut line));
            }
            if fits(word) {
                line = word.to_string();
                continue;
            }
            for c in word.chars() {
                line.push(c);
                if !fits(&line) && line.chars().count() > 1 {
                    line.pop();
                    lines.push(std::mem::replace(&mut line, c.to_string()));
                }
            }
        }
        lines.push(line);
    }
    lines
}

/// Encode text for a WinAnsi-encoded standard font.
///
/// Characters outside Latin-1 become `?`; control characters become spaces.
fn encode_win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| match c as u32 {
            0..=0x1F | 0x7F => b' ',
            cp @ 0x20..=0xFF => cp as u8,
            _ => b'?',
        })
        .collect()
}

/// Writes A4 pages of Helvetica text with `lopdf`.
#[derive(Debug, Clone, Copy)]
pub struct LopdfWriter {
    pub font_size_pt: f32,
}

impl Default for LopdfWriter {
    fn default() -> Self {
        Self {
            font_size_pt: FONT_SIZE_PT,
        }
    }
}

impl PdfWriter for LopdfWriter {
    fn split_text_to_size(&self, text: &str, max_width_mm: f32) -> Vec<String> {
        wrap_text(text, self.font_size_pt, max_width_mm)
    }

    fn write(&self, pages: &[PageLayout]) -> Result<Vec<u8>, ConvertError> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
            "Encoding" => "WinAnsiEncoding",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });

        let blank = [PageLayout::default()];
        let pages = if pages.is_empty() { &blank[..] } else { pages };
        let font_size = self.font_size_pt.round() as i64;
        let page_width_pt = (PAGE_WIDTH_MM * PT_PER_MM).round() as i64;
        let page_height_pt = (PAGE_HEIGHT_MM * PT_PER_MM).round() as i64;

        let mut kids: Vec<Object> = Vec::with_capacity(pages.len());
        for page in pages {
            let mut operations = Vec::with_capacity(page.lines.len() * 5);
            for line in &page.lines {
                let x = (line.x_mm * PT_PER_MM).round() as i64;
                let y = page_height_pt - (line.y_mm * PT_PER_MM).round() as i64;
                operations.push(Operation::new("BT", vec![]));
                operations.push(Operation::new("Tf", vec!["F1".into(), font_size.into()]));
                operations.push(Operation::new("Td", vec![x.into(), y.into()]));
                operations.push(Operation::new(
                    "Tj",
                    vec![Object::string_literal(encode_win_ansi(&line.text))],
                ));
                operations.push(Operation::new("ET", vec![]));
            }
            let content = Content { operations };
            let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode()?));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
                "Resources" => resources_id,
            });
            kids.push(page_id.into());
        }

        let page_count = kids.len() as i64;
        let pages_dict = dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => page_count,
            "MediaBox" => vec![0.into(), 0.into(), page_width_pt.into(), page_height_pt.into()],
        };
        doc.objects.insert(pages_id, Object::Dictionary(pages_dict));

        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut buffer = Vec::new();
        doc.save_to(&mut buffer)?;
        tracing::debug!(pages = page_count, bytes = buffer.len(), "wrote PDF");
        Ok(buffer)
    }
}

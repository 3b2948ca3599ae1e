use std::fmt;
use std::sync::Arc;

use crate::converter::image::encode_surface;
use crate::converter::pdf::{
    LopdfReader, LopdfWriter, PageLayout, PdfReader, PdfWriter, PlacedLine,
};
use crate::converter::spreadsheet::{CalamineCodec, SpreadsheetCodec};
use crate::converter::word::{DocxExtractor, WordExtractor};
use crate::converter::{ConversionResult, ConversionWarning, WarningCode};
use crate::detection::{SourceKind, classify};
use crate::error::ConvertError;
use crate::format::{DocumentFormat, ImageFormat, MSWORD_MIME};
use crate::markup::escape_html;
use crate::source::SourceFile;

/// Left margin and first baseline of generated PDF text, in millimetres.
pub const MARGIN_MM: f32 = 10.0;
/// Width available to a wrapped line.
pub const TEXT_WIDTH_MM: f32 = 180.0;
/// Vertical advance between lines.
pub const LINE_PITCH_MM: f32 = 7.0;
/// A line is moved to a new page once the cursor passes this depth.
pub const PAGE_BREAK_MM: f32 = 280.0;

/// Scale factor for rasterizing the first page of a PDF.
const RENDER_SCALE: f32 = 2.0;
/// Encoder quality for rasterized PDF pages.
const RENDER_QUALITY: f32 = 0.9;

const WORD_HTML_HEAD: &str = "<html xmlns:o='urn:schemas-microsoft-com:office:office' \
xmlns:w='urn:schemas-microsoft-com:office:word' xmlns='http://www.w3.org/TR/REC-html40'>\
<head><meta charset='utf-8'><title>Export HTML to Word Document with JavaScript</title></head><body>";
const WORD_HTML_TAIL: &str = "</body></html>";

/// Office and PDF conversions over pluggable backends.
///
/// `Default` wires calamine for workbooks, the built-in OOXML reader for
/// Word files and lopdf for PDFs. With the `pdfium` feature the PDF reader
/// is pdfium when the library can be loaded.
#[derive(Clone)]
pub struct DocumentCodec {
    spreadsheet: Arc<dyn SpreadsheetCodec>,
    word: Arc<dyn WordExtractor>,
    pdf_reader: Arc<dyn PdfReader>,
    pdf_writer: Arc<dyn PdfWriter>,
}

impl Default for DocumentCodec {
    fn default() -> Self {
        Self {
            spreadsheet: Arc::new(CalamineCodec),
            word: Arc::new(DocxExtractor::default()),
            pdf_reader: default_pdf_reader(),
            pdf_writer: Arc::new(LopdfWriter::default()),
        }
    }
}

#[cfg(feature = "pdfium")]
fn default_pdf_reader() -> Arc<dyn PdfReader> {
    match crate::converter::pdfium::PdfiumReader::new() {
        Ok(reader) => Arc::new(reader),
        Err(e) => {
            tracing::debug!(error = %e, "pdfium unavailable; falling back to lopdf");
            Arc::new(LopdfReader)
        }
    }
}

#[cfg(not(feature = "pdfium"))]
fn default_pdf_reader() -> Arc<dyn PdfReader> {
    Arc::new(LopdfReader)
}

impl fmt::Debug for DocumentCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocumentCodec").finish_non_exhaustive()
    }
}

impl DocumentCodec {
    pub fn with_spreadsheet(mut self, codec: impl SpreadsheetCodec + 'static) -> Self {
        self.spreadsheet = Arc::new(codec);
        self
    }

    pub fn with_word_extractor(mut self, extractor: impl WordExtractor + 'static) -> Self {
        self.word = Arc::new(extractor);
        self
    }

    pub fn with_pdf_reader(mut self, reader: impl PdfReader + 'static) -> Self {
        self.pdf_reader = Arc::new(reader);
        self
    }

    pub fn with_pdf_writer(mut self, writer: impl PdfWriter + 'static) -> Self {
        self.pdf_writer = Arc::new(writer);
        self
    }

    /// Convert a workbook, Word document or PDF into `target`.
    ///
    /// The source kind comes from the file extension. Pairs outside the
    /// supported matrix fail with `Cannot convert <source> to <target>`.
    pub fn convert(
        &self,
        source: &SourceFile,
        target: DocumentFormat,
    ) -> Result<ConversionResult, ConvertError> {
        let kind = classify(&source.name);
        tracing::debug!(source = %source.name, kind = kind.label(), target = %target, "document conversion");
        match kind {
            SourceKind::Spreadsheet => self.convert_spreadsheet(&source.data, target),
            SourceKind::Word => self.convert_word(&source.data, target),
            SourceKind::Pdf => self.convert_pdf(&source.data, target),
            _ => Err(ConvertError::UnsupportedFormat {
                extension: source.extension().unwrap_or_default(),
            }),
        }
    }

    fn convert_spreadsheet(
        &self,
        data: &[u8],
        target: DocumentFormat,
    ) -> Result<ConversionResult, ConvertError> {
        if !matches!(
            target,
            DocumentFormat::Csv | DocumentFormat::Json | DocumentFormat::Html
        ) {
            return Err(ConvertError::unsupported(SourceKind::Spreadsheet.label(), target));
        }

        let sheet = self.spreadsheet.first_sheet(data)?;
        let output = match target {
            DocumentFormat::Csv => sheet.to_csv()?,
            DocumentFormat::Json => sheet.to_json()?,
            _ => sheet.to_html(),
        };
        Ok(ConversionResult::new(output.into_bytes(), target.mime_type())
            .with_warnings(sheet.warnings))
    }

    fn convert_word(
        &self,
        data: &[u8],
        target: DocumentFormat,
    ) -> Result<ConversionResult, ConvertError> {
        match target {
            DocumentFormat::Html => {
                let html = self.word.to_html(data)?;
                Ok(ConversionResult::new(html.text.into_bytes(), target.mime_type())
                    .with_warnings(html.warnings))
            }
            DocumentFormat::Txt => {
                let raw = self.word.extract_raw_text(data)?;
                Ok(ConversionResult::new(raw.text.into_bytes(), target.mime_type())
                    .with_warnings(raw.warnings))
            }
            DocumentFormat::Pdf => {
                let raw = self.word.extract_raw_text(data)?;
                let lines = self.pdf_writer.split_text_to_size(&raw.text, TEXT_WIDTH_MM);
                let pages = layout_pages(lines);
                tracing::debug!(pages = pages.len(), "laid out word text for PDF");
                let bytes = self.pdf_writer.write(&pages)?;
                Ok(ConversionResult::new(bytes, target.mime_type()).with_warnings(raw.warnings))
            }
            other => Err(ConvertError::unsupported(SourceKind::Word.label(), other)),
        }
    }

    fn convert_pdf(
        &self,
        data: &[u8],
        target: DocumentFormat,
    ) -> Result<ConversionResult, ConvertError> {
        let raster = match target {
            DocumentFormat::Jpg => Some(ImageFormat::Jpg),
            DocumentFormat::Png => Some(ImageFormat::Png),
            DocumentFormat::Txt | DocumentFormat::Docx => None,
            other => return Err(ConvertError::unsupported(SourceKind::Pdf.label(), other)),
        };

        let document = self.pdf_reader.open(data)?;

        if let Some(format) = raster {
            if document.page_count() == 0 {
                return Err(ConvertError::MalformedDocument {
                    reason: "PDF has no pages".to_string(),
                });
            }
            let page = document.render_page(0, RENDER_SCALE)?;
            let (bytes, warnings) = encode_surface(&page, format, RENDER_QUALITY)?;
            return Ok(ConversionResult::new(bytes, format.mime_type()).with_warnings(warnings));
        }

        let mut page_texts = Vec::with_capacity(document.page_count());
        for index in 0..document.page_count() {
            page_texts.push(document.page_text(index)?);
        }

        if target == DocumentFormat::Txt {
            let text: String = page_texts
                .iter()
                .enumerate()
                .map(|(i, text)| format!("--- Page {} ---\n{text}\n\n", i + 1))
                .collect();
            return Ok(ConversionResult::new(text.into_bytes(), target.mime_type()));
        }

        let mut html = String::from('\u{FEFF}');
        html.push_str(WORD_HTML_HEAD);
        for text in &page_texts {
            html.push_str("<p>");
            html.push_str(&escape_html(text));
            html.push_str("</p><hr/>");
        }
        html.push_str(WORD_HTML_TAIL);

        let warning = ConversionWarning::new(
            WarningCode::FormatSubstituted,
            "docx output is Word-compatible HTML, not an OOXML package",
        );
        Ok(ConversionResult::new(html.into_bytes(), MSWORD_MIME).with_warnings(vec![warning]))
    }
}

/// Place wrapped lines top-down on A4 pages.
///
/// The first line sits at 10 mm; each line advances 7 mm, and a line whose
/// position would pass 280 mm starts a new page instead.
pub fn layout_pages(lines: Vec<String>) -> Vec<PageLayout> {
    let mut pages = vec![PageLayout::default()];
    let mut y = MARGIN_MM;
    for text in lines {
        if y > PAGE_BREAK_MM {
            pages.push(PageLayout::default());
            y = MARGIN_MM;
        }
        if let Some(page) = pages.last_mut() {
            page.lines.push(PlacedLine {
                x_mm: MARGIN_MM,
                y_mm: y,
                text,
            });
        }
        y += LINE_PITCH_MM;
    }
    pages
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::converter::pdf::PdfDocument;
    use crate::converter::spreadsheet::{Cell, Worksheet};
    use crate::converter::word::ExtractedText;
    use image::{DynamicImage, Rgba, RgbaImage};
    use std::sync::Mutex;

    struct FakeSheet;

    impl SpreadsheetCodec for FakeSheet {
        fn first_sheet(&self, _data: &[u8]) -> Result<Worksheet, ConvertError> {
            Ok(Worksheet {
                name: "People".to_string(),
                rows: vec![
                    vec![Cell::Text("name".into()), Cell::Text("age".into())],
                    vec![Cell::Text("Ann".into()), Cell::Number(41.0)],
                ],
                warnings: Vec::new(),
            })
        }
    }

    struct FakeWord(&'static str);

    impl WordExtractor for FakeWord {
        fn to_html(&self, _data: &[u8]) -> Result<ExtractedText, ConvertError> {
            Ok(ExtractedText {
                text: format!("<p>{}</p>", self.0),
                warnings: Vec::new(),
            })
        }

        fn extract_raw_text(&self, _data: &[u8]) -> Result<ExtractedText, ConvertError> {
            Ok(ExtractedText {
                text: self.0.to_string(),
                warnings: Vec::new(),
            })
        }
    }

    struct FakePdf {
        pages: Vec<&'static str>,
    }

    struct FakePdfDocument<'a> {
        pages: &'a [&'static str],
    }

    impl PdfReader for FakePdf {
        fn open<'a>(&'a self, _data: &'a [u8]) -> Result<Box<dyn PdfDocument + 'a>, ConvertError> {
            Ok(Box::new(FakePdfDocument { pages: &self.pages }))
        }
    }

    impl PdfDocument for FakePdfDocument<'_> {
        fn page_count(&self) -> usize {
            self.pages.len()
        }

        fn page_text(&self, index: usize) -> Result<String, ConvertError> {
            Ok(self.pages[index].to_string())
        }

        fn render_page(&self, _index: usize, scale: f32) -> Result<DynamicImage, ConvertError> {
            let side = (10.0 * scale) as u32;
            Ok(DynamicImage::ImageRgba8(RgbaImage::from_pixel(
                side,
                side,
                Rgba([0, 0, 255, 255]),
            )))
        }
    }

    #[derive(Clone, Default)]
    struct RecordingWriter {
        pages: Arc<Mutex<Vec<PageLayout>>>,
    }

    impl PdfWriter for RecordingWriter {
        fn split_text_to_size(&self, text: &str, _max_width_mm: f32) -> Vec<String> {
            text.split('\n').map(str::to_string).collect()
        }

        fn write(&self, pages: &[PageLayout]) -> Result<Vec<u8>, ConvertError> {
            *self.pages.lock().unwrap() = pages.to_vec();
            Ok(b"%PDF-fake".to_vec())
        }
    }

    fn fake_codec() -> DocumentCodec {
        DocumentCodec::default()
            .with_spreadsheet(FakeSheet)
            .with_word_extractor(FakeWord("Hello\nWorld"))
            .with_pdf_reader(FakePdf {
                pages: vec!["first page", "a < b"],
            })
    }

    fn file(name: &str) -> SourceFile {
        SourceFile::new(name, b"ignored".to_vec())
    }

    #[test]
    fn test_layout_pages_breaks_after_39_lines() {
        let lines: Vec<String> = (0..40).map(|i| format!("line {i}")).collect();
        let pages = layout_pages(lines);
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[0].lines.len(), 39);
        assert_eq!(pages[0].lines[0].y_mm, 10.0);
        assert_eq!(pages[0].lines[38].y_mm, 276.0);
        assert_eq!(pages[1].lines[0].y_mm, 10.0);
        assert_eq!(pages[1].lines[0].text, "line 39");
    }

    #[test]
    fn test_layout_pages_empty() {
        let pages = layout_pages(Vec::new());
        assert_eq!(pages.len(), 1);
        assert!(pages[0].lines.is_empty());
    }

    #[test]
    fn test_excel_targets() {
        let codec = fake_codec();
        let csv = codec.convert(&file("b.xlsx"), DocumentFormat::Csv).unwrap();
        assert_eq!(csv.text(), "name,age\nAnn,41");
        assert_eq!(csv.mime_type, "text/csv");

        let json = codec.convert(&file("b.xls"), DocumentFormat::Json).unwrap();
        assert_eq!(json.mime_type, "application/json");
        assert!(json.text().contains("\"age\": 41"));

        let html = codec.convert(&file("b.xlsx"), DocumentFormat::Html).unwrap();
        assert_eq!(html.mime_type, "text/html");
        assert!(html.text().contains("<td>Ann</td>"));
    }

    #[test]
    fn test_excel_to_pdf_rejected() {
        let err = fake_codec()
            .convert(&file("b.xlsx"), DocumentFormat::Pdf)
            .unwrap_err();
        assert_eq!(err.to_string(), "Cannot convert Excel to pdf");
    }

    #[test]
    fn test_word_targets() {
        let codec = fake_codec();
        let html = codec.convert(&file("w.docx"), DocumentFormat::Html).unwrap();
        assert_eq!(html.text(), "<p>Hello\nWorld</p>");
        assert_eq!(html.mime_type, "text/html");

        let txt = codec.convert(&file("w.docx"), DocumentFormat::Txt).unwrap();
        assert_eq!(txt.text(), "Hello\nWorld");
        assert_eq!(txt.mime_type, "text/plain");

        let err = codec.convert(&file("w.docx"), DocumentFormat::Csv).unwrap_err();
        assert_eq!(err.to_string(), "Cannot convert Word to csv");
    }

    #[test]
    fn test_word_to_pdf_lays_out_lines() {
        let writer = RecordingWriter::default();
        let codec = fake_codec().with_pdf_writer(writer.clone());
        let result = codec.convert(&file("w.docx"), DocumentFormat::Pdf).unwrap();
        assert_eq!(result.mime_type, "application/pdf");
        assert_eq!(result.bytes, b"%PDF-fake");

        let pages = writer.pages.lock().unwrap().clone();
        assert_eq!(pages.len(), 1);
        assert_eq!(
            pages[0].lines,
            vec![
                PlacedLine {
                    x_mm: 10.0,
                    y_mm: 10.0,
                    text: "Hello".to_string()
                },
                PlacedLine {
                    x_mm: 10.0,
                    y_mm: 17.0,
                    text: "World".to_string()
                },
            ]
        );
    }

    #[test]
    fn test_pdf_to_txt_marks_pages() {
        let result = fake_codec()
            .convert(&file("p.pdf"), DocumentFormat::Txt)
            .unwrap();
        assert_eq!(
            result.text(),
            "--- Page 1 ---\nfirst page\n\n--- Page 2 ---\na < b\n\n"
        );
    }

    #[test]
    fn test_pdf_to_docx_is_word_html() {
        let result = fake_codec()
            .convert(&file("p.pdf"), DocumentFormat::Docx)
            .unwrap();
        assert_eq!(result.mime_type, "application/msword");
        let text = result.text();
        assert!(text.starts_with('\u{FEFF}'));
        assert!(text.contains("xmlns:w='urn:schemas-microsoft-com:office:word'"));
        assert!(text.contains("<p>first page</p><hr/><p>a &lt; b</p><hr/></body></html>"));
        assert_eq!(result.warnings[0].code, WarningCode::FormatSubstituted);
    }

    #[test]
    fn test_pdf_to_png_renders_first_page_at_double_scale() {
        let result = fake_codec()
            .convert(&file("p.pdf"), DocumentFormat::Png)
            .unwrap();
        assert_eq!(result.mime_type, "image/png");
        let image = image::load_from_memory(&result.bytes).unwrap();
        assert_eq!((image.width(), image.height()), (20, 20));
    }

    #[test]
    fn test_pdf_to_jpg() {
        let result = fake_codec()
            .convert(&file("p.pdf"), DocumentFormat::Jpg)
            .unwrap();
        assert_eq!(result.mime_type, "image/jpeg");
        assert_eq!(&result.bytes[..2], &[0xFF, 0xD8]);
    }

    #[test]
    fn test_pdf_raster_with_no_pages() {
        let codec = fake_codec().with_pdf_reader(FakePdf { pages: Vec::new() });
        let err = codec.convert(&file("p.pdf"), DocumentFormat::Png).unwrap_err();
        assert!(matches!(err, ConvertError::MalformedDocument { .. }));
    }

    #[test]
    fn test_pdf_unsupported_target() {
        let err = fake_codec()
            .convert(&file("p.pdf"), DocumentFormat::Xlsx)
            .unwrap_err();
        assert_eq!(err.to_string(), "Cannot convert PDF to xlsx");
    }

    #[test]
    fn test_unknown_source() {
        let err = fake_codec()
            .convert(&file("slides.pptx"), DocumentFormat::Pdf)
            .unwrap_err();
        assert_eq!(err.to_string(), "Unsupported source format: pptx");
    }

    #[test]
    fn test_default_lopdf_reader_cannot_rasterize() {
        let bytes = LopdfWriter::default()
            .write(&layout_pages(vec!["x".to_string()]))
            .unwrap();
        let source = SourceFile::new("p.pdf", bytes);
        let result = DocumentCodec::default()
            .with_pdf_reader(LopdfReader)
            .convert(&source, DocumentFormat::Png);
        assert!(matches!(
            result,
            Err(ConvertError::CapabilityUnavailable { .. })
        ));
    }
}

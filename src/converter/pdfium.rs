//! Rasterizing PDF reader backed by the pdfium shared library.

use image::DynamicImage;
use pdfium_render::prelude::{PdfRenderConfig, Pdfium, PdfiumError};

use crate::converter::pdf::{PdfDocument, PdfReader};
use crate::error::ConvertError;

fn pdfium_error(context: &str, e: PdfiumError) -> ConvertError {
    ConvertError::MalformedDocument {
        reason: format!("{context}: {e:?}"),
    }
}

/// Full [`PdfReader`] with text extraction and page rendering.
pub struct PdfiumReader {
    pdfium: Pdfium,
}

impl PdfiumReader {
    /// Bind to a pdfium library next to the executable, falling back to the system one.
    pub fn new() -> Result<Self, ConvertError> {
        let bindings = Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
            .or_else(|_| Pdfium::bind_to_system_library())
            .map_err(|e| ConvertError::CapabilityUnavailable {
                capability: "pdfium",
                reason: format!("{e:?}"),
            })?;
        Ok(Self {
            pdfium: Pdfium::new(bindings),
        })
    }
}

impl std::fmt::Debug for PdfiumReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PdfiumReader").finish_non_exhaustive()
    }
}

struct PdfiumDocument<'a> {
    document: pdfium_render::prelude::PdfDocument<'a>,
}

impl PdfReader for PdfiumReader {
    fn open<'a>(&'a self, data: &'a [u8]) -> Result<Box<dyn PdfDocument + 'a>, ConvertError> {
        let document = self
            .pdfium
            .load_pdf_from_byte_slice(data, None)
            .map_err(|e| pdfium_error("failed to open PDF", e))?;
        tracing::debug!(pages = document.pages().len(), "opened PDF with pdfium");
        Ok(Box::new(PdfiumDocument { document }))
    }
}

impl PdfiumDocument<'_> {
    fn page(&self, index: usize) -> Result<pdfium_render::prelude::PdfPage<'_>, ConvertError> {
        let index = u16::try_from(index).map_err(|_| ConvertError::MalformedDocument {
            reason: format!("page index {index} out of range"),
        })?;
        self.document
            .pages()
            .get(index)
            .map_err(|e| pdfium_error("failed to load page", e))
    }
}

impl PdfDocument for PdfiumDocument<'_> {
    fn page_count(&self) -> usize {
        usize::from(self.document.pages().len())
    }

    fn page_text(&self, index: usize) -> Result<String, ConvertError> {
        let page = self.page(index)?;
        let text = page
            .text()
            .map_err(|e| pdfium_error("failed to read page text", e))?
            .all();
        Ok(text
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .collect::<Vec<_>>()
            .join(" "))
    }

    fn render_page(&self, index: usize, scale: f32) -> Result<DynamicImage, ConvertError> {
        let page = self.page(index)?;
        let config = PdfRenderConfig::new().scale_page_by_factor(scale);
        let bitmap = page
            .render_with_config(&config)
            .map_err(|e| pdfium_error("failed to render page", e))?;
        let image = bitmap.as_image();
        tracing::debug!(
            page = index + 1,
            width = image.width(),
            height = image.height(),
            "rendered PDF page"
        );
        Ok(image)
    }
}

pub mod csv_codec;
pub mod data;
pub mod document;
pub mod image;
pub mod pdf;
#[cfg(feature = "pdfium")]
pub mod pdfium;
pub mod spreadsheet;
pub mod word;

pub use document::DocumentCodec;

/// Default lossy quality, matching the canvas encoder's default.
pub const DEFAULT_QUALITY: f32 = 0.92;

/// Largest input accepted by `convert`, in bytes.
pub const DEFAULT_MAX_INPUT_BYTES: usize = 50 * 1024 * 1024;

/// Categories for recoverable conversion warnings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WarningCode {
    SkippedElement,
    UnsupportedFeature,
    FormatSubstituted,
    MalformedSegment,
}

/// A recoverable issue encountered during conversion.
#[derive(Debug, Clone)]
pub struct ConversionWarning {
    pub code: WarningCode,
    pub message: String,
    pub location: Option<String>,
}

impl ConversionWarning {
    pub(crate) fn new(code: WarningCode, message: impl Into<String>) -> Self {
        let message = message.into();
        tracing::debug!(code = ?code, "{message}");
        Self {
            code,
            message,
            location: None,
        }
    }

    pub(crate) fn at(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }
}

/// Options controlling conversion behavior.
#[derive(Debug, Clone)]
pub struct ConversionOptions {
    /// Lossy encoder quality in `0.0..=1.0`. Out-of-range values use the default.
    pub quality: f32,
    /// Inputs larger than this are rejected before decoding.
    pub max_input_bytes: usize,
    /// External codec collaborators used for office and PDF payloads.
    pub document: DocumentCodec,
}

impl Default for ConversionOptions {
    fn default() -> Self {
        Self {
            quality: 0.9,
            max_input_bytes: DEFAULT_MAX_INPUT_BYTES,
            document: DocumentCodec::default(),
        }
    }
}

/// The converted payload and its MIME type.
#[derive(Debug, Clone, Default)]
pub struct ConversionResult {
    /// Encoded output bytes.
    pub bytes: Vec<u8>,
    /// MIME type the output is tagged with.
    pub mime_type: &'static str,
    /// Recoverable issues encountered during conversion.
    pub warnings: Vec<ConversionWarning>,
}

impl ConversionResult {
    pub(crate) fn new(bytes: Vec<u8>, mime_type: &'static str) -> Self {
        Self {
            bytes,
            mime_type,
            warnings: Vec::new(),
        }
    }

    pub(crate) fn with_warnings(mut self, warnings: Vec<ConversionWarning>) -> Self {
        self.warnings = warnings;
        self
    }

    /// The payload decoded as UTF-8 text (lossy).
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.bytes).into_owned()
    }
}

/// Decode text input, honouring a byte-order mark.
///
/// Without a BOM, valid UTF-8 is used as-is; anything else is decoded as
/// Windows-1252 and reported with a warning.
pub(crate) fn decode_text(data: &[u8]) -> (String, Option<ConversionWarning>) {
    if let Some((encoding, bom_len)) = encoding_rs::Encoding::for_bom(data) {
        let (text, _) = encoding.decode_without_bom_handling(&data[bom_len..]);
        let warning = (encoding != encoding_rs::UTF_8).then(|| {
            ConversionWarning::new(
                WarningCode::UnsupportedFeature,
                format!("input is {}-encoded", encoding.name()),
            )
        });
        return (text.into_owned(), warning);
    }

    match std::str::from_utf8(data) {
        Ok(text) => (text.to_string(), None),
        Err(_) => {
            let (text, _, _) = encoding_rs::WINDOWS_1252.decode(data);
            let warning = ConversionWarning::new(
                WarningCode::UnsupportedFeature,
                "input is not valid UTF-8; decoded as windows-1252",
            );
            (text.into_owned(), Some(warning))
        }
    }
}

/// Errors that can occur during file conversion.
#[derive(Debug, thiserror::Error)]
pub enum ConvertError {
    #[error("Unsupported source format: {extension}")]
    UnsupportedFormat { extension: String },

    #[error("Cannot convert {source_kind} to {target}")]
    UnsupportedConversion {
        source_kind: &'static str,
        target: String,
    },

    #[error("Invalid JSON file")]
    InvalidJson,

    #[error("Cannot convert non-array JSON object to CSV directly.")]
    NonArrayToCsv,

    #[error("Failed to load image: {reason}")]
    ImageDecode { reason: String },

    #[error("Conversion failed: {reason}")]
    ImageEncode { reason: String },

    #[error("Could not get drawing surface: {reason}")]
    SurfaceUnavailable { reason: String },

    #[error("input is {size} bytes, exceeds limit of {limit} bytes")]
    InputTooLarge { size: usize, limit: usize },

    #[error("{reason}")]
    InvalidSource { reason: String },

    #[error("{capability} is not available: {reason}")]
    CapabilityUnavailable {
        capability: &'static str,
        reason: String,
    },

    #[error("failed to read ZIP archive")]
    ZipError(#[from] zip::result::ZipError),

    #[error("failed to parse XML")]
    XmlError(#[from] quick_xml::Error),

    #[error("failed to read spreadsheet")]
    SpreadsheetError(#[from] calamine::Error),

    #[error("failed to read PDF")]
    PdfError(#[from] lopdf::Error),

    #[error("failed to write CSV")]
    CsvError(#[from] csv::Error),

    #[error("failed to serialize JSON")]
    JsonError(#[from] serde_json::Error),

    #[error("I/O error")]
    Io(#[from] std::io::Error),

    #[error("malformed document: {reason}")]
    MalformedDocument { reason: String },
}

impl ConvertError {
    /// Build the `Cannot convert <source> to <target>` error for an unsupported pair.
    pub(crate) fn unsupported(source_kind: &'static str, target: impl ToString) -> Self {
        Self::UnsupportedConversion {
            source_kind,
            target: target.to_string(),
        }
    }
}

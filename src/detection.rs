use crate::error::ConvertError;
use crate::format::{Category, DataFormat, DocumentFormat, ImageFormat, Target, mime_for_token};
use crate::source::SourceFile;

/// Source formats recognised from a file name's extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Json,
    Csv,
    Txt,
    /// `xlsx` or `xls`.
    Spreadsheet,
    /// `docx`.
    Word,
    Pdf,
    Image,
    Unknown,
}

impl SourceKind {
    /// Name used in `Cannot convert <source> to <target>` messages.
    pub fn label(self) -> &'static str {
        match self {
            SourceKind::Json => "JSON",
            SourceKind::Csv => "CSV",
            SourceKind::Txt => "TXT",
            SourceKind::Spreadsheet => "Excel",
            SourceKind::Word => "Word",
            SourceKind::Pdf => "PDF",
            SourceKind::Image => "Image",
            SourceKind::Unknown => "unknown",
        }
    }
}

/// Extract the lower-cased extension of a file name.
///
/// Returns `None` when the name has no `.` or ends with one.
pub fn extension_of(name: &str) -> Option<String> {
    let (_, ext) = name.rsplit_once('.')?;
    if ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

/// Classify a file name into a source kind by extension alone.
pub fn classify(name: &str) -> SourceKind {
    let Some(ext) = extension_of(name) else {
        return SourceKind::Unknown;
    };
    match ext.as_str() {
        "json" => SourceKind::Json,
        "csv" => SourceKind::Csv,
        "txt" => SourceKind::Txt,
        "xlsx" | "xls" => SourceKind::Spreadsheet,
        "docx" => SourceKind::Word,
        "pdf" => SourceKind::Pdf,
        "png" | "jpg" | "jpeg" | "gif" | "webp" | "bmp" | "ico" | "tiff" | "tif" => {
            SourceKind::Image
        }
        _ => SourceKind::Unknown,
    }
}

/// Infer the conversion category a file belongs to.
pub fn category_for_name(name: &str) -> Option<Category> {
    match classify(name) {
        SourceKind::Image => Some(Category::Image),
        SourceKind::Json | SourceKind::Csv | SourceKind::Txt => Some(Category::Data),
        SourceKind::Spreadsheet | SourceKind::Word | SourceKind::Pdf => Some(Category::Document),
        SourceKind::Unknown => None,
    }
}

/// Best-effort content type for a file name, from the MIME table.
pub fn content_type_for_name(name: &str) -> Option<&'static str> {
    let ext = extension_of(name)?;
    match ext.as_str() {
        "tif" | "tiff" => Some("image/tiff"),
        "xls" => Some("application/vnd.ms-excel"),
        other => mime_for_token(other),
    }
}

/// Check that a file is acceptable input for the given category.
pub fn validate_source(
    category: Category,
    file: &SourceFile,
    max_bytes: usize,
) -> Result<(), ConvertError> {
    if file.data.len() > max_bytes {
        return Err(ConvertError::InputTooLarge {
            size: file.data.len(),
            limit: max_bytes,
        });
    }

    let ext = file.extension().unwrap_or_default();
    let reason = match category {
        Category::Image => {
            let is_image_type = file
                .content_type
                .as_deref()
                .is_some_and(|t| t.starts_with("image/"));
            (!is_image_type && ext != "ico").then_some("Please upload a valid image file.")
        }
        Category::Data => (!matches!(ext.as_str(), "json" | "csv" | "txt"))
            .then_some("Please upload a .json, .csv, or .txt file."),
        Category::Document => (!matches!(ext.as_str(), "pdf" | "docx" | "xlsx" | "xls"))
            .then_some("Supported formats: PDF, Word (DOCX), Excel (XLSX)."),
    };

    match reason {
        Some(reason) => Err(ConvertError::InvalidSource {
            reason: reason.to_string(),
        }),
        None => Ok(()),
    }
}

/// Targets offered for a source file within a category.
pub fn available_targets(category: Category, name: &str) -> Vec<Target> {
    let ext = extension_of(name).unwrap_or_default();
    match category {
        Category::Image => ImageFormat::ALL
            .iter()
            .filter(|f| f.as_str() != ext)
            .map(|f| Target::Image(*f))
            .collect(),
        Category::Data => DataFormat::ALL
            .iter()
            .filter(|f| f.as_str() != ext)
            .map(|f| Target::Data(*f))
            .collect(),
        Category::Document => {
            use DocumentFormat::*;
            let formats: &[DocumentFormat] = match classify(name) {
                SourceKind::Spreadsheet => &[Csv, Json, Html],
                SourceKind::Word => &[Pdf, Txt, Html],
                SourceKind::Pdf => &[Txt, Docx, Jpg, Png],
                _ => &[],
            };
            formats.iter().map(|f| Target::Document(*f)).collect()
        }
    }
}

/// The target preselected for a freshly chosen file.
pub fn default_target(category: Category, name: &str) -> Option<Target> {
    match category {
        Category::Image => Some(Target::Image(ImageFormat::Png)),
        Category::Data => Some(Target::Data(DataFormat::Json)),
        Category::Document => match classify(name) {
            SourceKind::Spreadsheet => Some(Target::Document(DocumentFormat::Csv)),
            SourceKind::Word => Some(Target::Document(DocumentFormat::Pdf)),
            SourceKind::Pdf => Some(Target::Document(DocumentFormat::Txt)),
            _ => None,
        },
    }
}

/// Derive the download name for a converted file.
///
/// A PDF converted to "docx" is named `.doc`, since its payload is
/// Word-compatible HTML rather than an OOXML package.
pub fn output_file_name(source_name: &str, target: Target) -> String {
    let base = source_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(source_name);
    let stem = match base.rfind('.') {
        Some(pos) => &base[..pos],
        None => base,
    };
    let stem = if stem.trim().is_empty() {
        "converted"
    } else {
        stem
    };

    let ext = match target {
        Target::Document(DocumentFormat::Docx) if classify(source_name) == SourceKind::Pdf => {
            "doc"
        }
        other => other.as_str(),
    };
    format!("{stem}.{ext}")
}

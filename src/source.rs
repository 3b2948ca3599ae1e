use std::path::Path;

use crate::error::ConvertError;

/// An in-memory file handed to the converter.
///
/// The file name's extension is the authoritative format signal; the
/// declared content type is only consulted when validating image uploads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub name: String,
    pub content_type: Option<String>,
    pub data: Vec<u8>,
}

impl SourceFile {
    pub fn new(name: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            content_type: None,
            data: data.into(),
        }
    }

    /// Attach a declared content type (e.g. `image/png`).
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Read a file from disk, using its file name as the format signal.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConvertError> {
        let path = path.as_ref();
        let data = std::fs::read(path)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let content_type = crate::detection::content_type_for_name(&name).map(str::to_string);
        Ok(Self {
            name,
            content_type,
            data,
        })
    }

    /// Lower-cased extension of the file name, if it has one.
    pub fn extension(&self) -> Option<String> {
        crate::detection::extension_of(&self.name)
    }
}

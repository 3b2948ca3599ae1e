use std::io::{Read, Seek};

use zip::ZipArchive;

use crate::error::ConvertError;

/// Reject OOXML containers whose entries would inflate past `budget` bytes.
///
/// Sizes come from the central directory, so nothing is decompressed here.
pub(crate) fn validate_zip_budget<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    budget: usize,
) -> Result<(), ConvertError> {
    let total = (0..archive.len())
        .filter_map(|i| archive.by_index_raw(i).ok().map(|entry| entry.size()))
        .fold(0u64, u64::saturating_add);
    if total <= budget as u64 {
        return Ok(());
    }
    tracing::warn!(total, budget, "ZIP container exceeds uncompressed budget");
    Err(ConvertError::InputTooLarge {
        size: usize::try_from(total).unwrap_or(usize::MAX),
        limit: budget,
    })
}

/// Read a UTF-8 text entry from a ZIP archive, returning None if not found.
pub(crate) fn read_zip_text<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    path: &str,
) -> Result<Option<String>, ConvertError> {
    let mut file = match archive.by_name(path) {
        Ok(f) => f,
        Err(zip::result::ZipError::FileNotFound) => return Ok(None),
        Err(e) => return Err(ConvertError::ZipError(e)),
    };
    let mut buf = String::new();
    file.read_to_string(&mut buf)?;
    Ok(Some(buf))
}

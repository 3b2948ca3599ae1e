//! In-process file format conversion.
//!
//! Three families are supported: raster images (re-encoded through a drawing
//! surface), tabular data (JSON, CSV and plain text through a JSON
//! intermediate) and office documents (workbooks, Word files and PDFs through
//! pluggable backends). Each conversion takes a [`SourceFile`] and a
//! [`Target`] and yields the encoded bytes plus the output MIME type.

pub mod converter;
pub mod detection;
pub mod error;
pub mod format;
pub mod markup;
pub mod source;
pub(crate) mod zip_utils;

pub use converter::csv_codec::{TabularRecord, parse_csv, to_csv};
pub use converter::data::convert_data;
pub use converter::image::convert_image;
pub use converter::{
    ConversionOptions, ConversionResult, ConversionWarning, DocumentCodec, WarningCode,
};
pub use error::ConvertError;
pub use format::{Category, DataFormat, DocumentFormat, ImageFormat, Target};
pub use source::SourceFile;

use std::path::Path;

/// Convert a file into `target`.
///
/// Inputs larger than `options.max_input_bytes` are rejected before any
/// decoding. The source format is taken from the file name's extension.
pub fn convert(
    source: &SourceFile,
    target: Target,
    options: &ConversionOptions,
) -> Result<ConversionResult, ConvertError> {
    if source.data.len() > options.max_input_bytes {
        return Err(ConvertError::InputTooLarge {
            size: source.data.len(),
            limit: options.max_input_bytes,
        });
    }

    tracing::debug!(
        source = %source.name,
        bytes = source.data.len(),
        category = target.category().as_str(),
        target = %target,
        "converting"
    );

    match target {
        Target::Image(format) => convert_image(source, format, options.quality),
        Target::Data(format) => convert_data(source, format),
        Target::Document(format) => options.document.convert(source, format),
    }
}

/// Read a file from disk and convert it into `target`.
pub fn convert_file(
    path: impl AsRef<Path>,
    target: Target,
    options: &ConversionOptions,
) -> Result<ConversionResult, ConvertError> {
    let source = SourceFile::from_path(path)?;
    convert(&source, target, options)
}

/// Run [`convert`] on tokio's blocking pool.
#[cfg(feature = "async")]
pub async fn convert_async(
    source: SourceFile,
    target: Target,
    options: ConversionOptions,
) -> Result<ConversionResult, ConvertError> {
    tokio::task::spawn_blocking(move || convert(&source, target, &options))
        .await
        .map_err(|e| ConvertError::Io(std::io::Error::other(e)))?
}

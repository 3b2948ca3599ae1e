//! Raster re-encoding: decode, composite onto a surface, encode.

use std::io::Cursor;

use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::codecs::webp::WebPEncoder;
use image::{
    DynamicImage, ExtendedColorType, ImageDecoder, ImageEncoder, ImageFormat as RasterFormat,
    ImageReader, RgbImage, Rgba, RgbaImage, imageops, metadata::Orientation,
};

use crate::converter::{ConversionResult, ConversionWarning, DEFAULT_QUALITY, WarningCode};
use crate::error::ConvertError;
use crate::format::ImageFormat;
use crate::source::SourceFile;

/// Clamp a caller quality into `0.0..=1.0`, falling back to the default.
pub fn effective_quality(quality: f32) -> f32 {
    if quality.is_finite() && (0.0..=1.0).contains(&quality) {
        quality
    } else {
        DEFAULT_QUALITY
    }
}

fn jpeg_quality(quality: f32) -> u8 {
    (effective_quality(quality) * 100.0).round().clamp(1.0, 100.0) as u8
}

fn decode_failed(err: image::ImageError) -> ConvertError {
    ConvertError::ImageDecode {
        reason: err.to_string(),
    }
}

/// Decode any supported raster format, sniffing the container from its bytes.
///
/// An EXIF orientation tag is applied, so the pixels come out upright.
pub fn decode_image(bytes: &[u8]) -> Result<DynamicImage, ConvertError> {
    let reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| ConvertError::ImageDecode {
            reason: e.to_string(),
        })?;
    if reader.format().is_none() {
        return Err(ConvertError::ImageDecode {
            reason: "unrecognized image data".to_string(),
        });
    }
    let mut decoder = reader.into_decoder().map_err(decode_failed)?;
    let orientation = decoder
        .orientation()
        .unwrap_or(Orientation::NoTransforms);
    let mut image = DynamicImage::from_decoder(decoder).map_err(decode_failed)?;
    if orientation != Orientation::NoTransforms {
        tracing::debug!(?orientation, "applying EXIF orientation");
        image.apply_orientation(orientation);
    }
    Ok(image)
}

/// Draw the image onto an opaque white surface.
fn flatten_on_white(image: &DynamicImage) -> RgbImage {
    let mut surface = RgbaImage::from_pixel(image.width(), image.height(), Rgba([255; 4]));
    imageops::overlay(&mut surface, &image.to_rgba8(), 0, 0);
    DynamicImage::ImageRgba8(surface).to_rgb8()
}

fn encode_failed(format: ImageFormat, err: image::ImageError) -> ConvertError {
    ConvertError::ImageEncode {
        reason: format!("failed to encode {format}: {err}"),
    }
}

/// Encode a decoded surface into the target format.
///
/// Opaque targets (`jpg`, `bmp`) are composited onto white so transparent
/// pixels do not turn black. `quality` only affects `jpg`; WebP is written
/// losslessly. `ico` is written as PNG bytes and reported with a warning.
pub(crate) fn encode_surface(
    image: &DynamicImage,
    format: ImageFormat,
    quality: f32,
) -> Result<(Vec<u8>, Vec<ConversionWarning>), ConvertError> {
    let (width, height) = (image.width(), image.height());
    if width == 0 || height == 0 {
        return Err(ConvertError::SurfaceUnavailable {
            reason: format!("image has no pixels ({width}x{height})"),
        });
    }

    let surface = if format.is_opaque() {
        DynamicImage::ImageRgb8(flatten_on_white(image))
    } else {
        DynamicImage::ImageRgba8(image.to_rgba8())
    };
    let color: ExtendedColorType = surface.color().into();

    let mut buffer = Vec::new();
    let mut warnings = Vec::new();

    match format {
        ImageFormat::Jpg => JpegEncoder::new_with_quality(&mut buffer, jpeg_quality(quality))
            .write_image(surface.as_bytes(), width, height, color),
        ImageFormat::Png | ImageFormat::Ico => {
            PngEncoder::new(&mut buffer).write_image(surface.as_bytes(), width, height, color)
        }
        ImageFormat::Webp => WebPEncoder::new_lossless(&mut buffer)
            .write_image(surface.as_bytes(), width, height, color),
        ImageFormat::Gif => surface.write_to(&mut Cursor::new(&mut buffer), RasterFormat::Gif),
        ImageFormat::Bmp => surface.write_to(&mut Cursor::new(&mut buffer), RasterFormat::Bmp),
    }
    .map_err(|e| encode_failed(format, e))?;

    if format == ImageFormat::Ico {
        warnings.push(ConversionWarning::new(
            WarningCode::FormatSubstituted,
            "ico output is PNG-encoded",
        ));
    }

    Ok((buffer, warnings))
}

/// Re-encode an image file into `format`.
pub fn convert_image(
    source: &SourceFile,
    format: ImageFormat,
    quality: f32,
) -> Result<ConversionResult, ConvertError> {
    let decoded = decode_image(&source.data)?;
    tracing::debug!(
        source = %source.name,
        width = decoded.width(),
        height = decoded.height(),
        target = %format,
        "re-encoding image"
    );
    let (bytes, warnings) = encode_surface(&decoded, format, quality)?;
    Ok(ConversionResult::new(bytes, format.mime_type()).with_warnings(warnings))
}

#![allow(dead_code)]

use std::io::{Cursor, Write};

use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

/// Cell value for test XLSX generation.
pub enum TestCell {
    Str(&'static str),
    Num(f64),
    Bool(bool),
    Empty,
}

const CONTENT_TYPES_NS: &str = "http://schemas.openxmlformats.org/package/2006/content-types";
const PKG_RELS_NS: &str = "http://schemas.openxmlformats.org/package/2006/relationships";
const OFFICE_DOC_REL: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument";
const XML_DECL: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#;

fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Zip the given `(path, content)` parts in order.
pub fn zip_parts<S: AsRef<str>>(parts: &[(S, String)]) -> Vec<u8> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let opts = SimpleFileOptions::default();
    for (name, content) in parts {
        zip.start_file(name.as_ref(), opts).unwrap();
        zip.write_all(content.as_bytes()).unwrap();
    }
    zip.finish().unwrap().into_inner()
}

fn package_rels(target: &str) -> String {
    format!(
        r#"{XML_DECL}<Relationships xmlns="{PKG_RELS_NS}"><Relationship Id="rId1" Type="{OFFICE_DOC_REL}" Target="{target}"/></Relationships>"#
    )
}

fn worksheet_xml(rows: &[&[TestCell]]) -> String {
    let mut xml = format!(
        r#"{XML_DECL}<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData>"#
    );
    for (ri, row) in rows.iter().enumerate() {
        let r = ri + 1;
        xml.push_str(&format!(r#"<row r="{r}">"#));
        for (ci, cell) in row.iter().enumerate() {
            let at = format!("{}{r}", (b'A' + ci as u8) as char);
            match cell {
                TestCell::Str(s) => xml.push_str(&format!(
                    r#"<c r="{at}" t="inlineStr"><is><t>{}</t></is></c>"#,
                    escape_xml(s)
                )),
                TestCell::Num(n) => xml.push_str(&format!(r#"<c r="{at}"><v>{n}</v></c>"#)),
                TestCell::Bool(b) => {
                    xml.push_str(&format!(r#"<c r="{at}" t="b"><v>{}</v></c>"#, u8::from(*b)))
                }
                TestCell::Empty => {}
            }
        }
        xml.push_str("</row>");
    }
    xml.push_str("</sheetData></worksheet>");
    xml
}

/// Build a minimal XLSX workbook in memory, one worksheet per entry.
pub fn build_xlsx(sheets: &[(&str, &[&[TestCell]])]) -> Vec<u8> {
    let numbered = || (1..=sheets.len()).zip(sheets.iter());

    let overrides: String = numbered()
        .map(|(n, _)| {
            format!(
                r#"<Override PartName="/xl/worksheets/sheet{n}.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/>"#
            )
        })
        .collect();
    let content_types = format!(
        r#"{XML_DECL}<Types xmlns="{CONTENT_TYPES_NS}"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/>{overrides}</Types>"#
    );

    let sheet_entries: String = numbered()
        .map(|(n, (name, _))| {
            format!(
                r#"<sheet name="{}" sheetId="{n}" r:id="rId{n}"/>"#,
                escape_xml(name)
            )
        })
        .collect();
    let workbook = format!(
        r#"{XML_DECL}<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><sheets>{sheet_entries}</sheets></workbook>"#
    );

    let sheet_rels: String = numbered()
        .map(|(n, _)| {
            format!(
                r#"<Relationship Id="rId{n}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet{n}.xml"/>"#
            )
        })
        .collect();
    let workbook_rels =
        format!(r#"{XML_DECL}<Relationships xmlns="{PKG_RELS_NS}">{sheet_rels}</Relationships>"#);

    let mut parts = vec![
        ("[Content_Types].xml".to_string(), content_types),
        ("_rels/.rels".to_string(), package_rels("xl/workbook.xml")),
        ("xl/workbook.xml".to_string(), workbook),
        ("xl/_rels/workbook.xml.rels".to_string(), workbook_rels),
    ];
    for (n, (_, rows)) in numbered() {
        parts.push((format!("xl/worksheets/sheet{n}.xml"), worksheet_xml(rows)));
    }
    zip_parts(&parts)
}

/// Build a minimal DOCX whose body is the given WordprocessingML fragment.
pub fn build_docx(body: &str) -> Vec<u8> {
    build_docx_with_parts(body, &[])
}

/// Build a DOCX with extra parts (styles, numbering, relationships).
pub fn build_docx_with_parts(body: &str, extra: &[(&str, &str)]) -> Vec<u8> {
    let content_types = format!(
        r#"{XML_DECL}<Types xmlns="{CONTENT_TYPES_NS}"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/></Types>"#
    );
    let document = format!(
        r#"{XML_DECL}<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><w:body>{body}</w:body></w:document>"#
    );

    let mut parts = vec![
        ("[Content_Types].xml", content_types),
        ("_rels/.rels", package_rels("word/document.xml")),
        ("word/document.xml", document),
    ];
    parts.extend(extra.iter().map(|(name, xml)| (*name, xml.to_string())));
    zip_parts(&parts)
}

/// A 4x3 RGBA image: red, green and blue in the top-left corner, the rest transparent.
pub fn sample_image() -> DynamicImage {
    DynamicImage::ImageRgba8(RgbaImage::from_fn(4, 3, |x, y| match (x, y) {
        (0, 0) => Rgba([255, 0, 0, 255]),
        (1, 0) => Rgba([0, 255, 0, 255]),
        (0, 1) => Rgba([0, 0, 255, 255]),
        _ => Rgba([0, 0, 0, 0]),
    }))
}

/// Encode [`sample_image`] in the given container.
pub fn image_bytes(format: ImageFormat) -> Vec<u8> {
    let image = match format {
        ImageFormat::Jpeg | ImageFormat::Bmp => DynamicImage::ImageRgb8(sample_image().to_rgb8()),
        _ => sample_image(),
    };
    let mut buf = Cursor::new(Vec::new());
    image.write_to(&mut buf, format).unwrap();
    buf.into_inner()
}

pub fn png_bytes() -> Vec<u8> {
    image_bytes(ImageFormat::Png)
}

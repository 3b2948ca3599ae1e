mod common;

use common::{TestCell, build_docx, build_docx_with_parts, build_xlsx};
use fileshift::converter::pdf::{LopdfReader, PdfReader};
use fileshift::detection::{available_targets, default_target, output_file_name};
use fileshift::{
    Category, ConversionOptions, ConversionResult, ConvertError, DocumentFormat, SourceFile,
    Target, WarningCode, convert,
};
use serde_json::{Value, json};

fn run(source: &SourceFile, target: DocumentFormat) -> Result<ConversionResult, ConvertError> {
    convert(source, Target::Document(target), &ConversionOptions::default())
}

fn people_xlsx() -> SourceFile {
    let data = build_xlsx(&[
        (
            "People",
            &[
                &[TestCell::Str("Name"), TestCell::Str("Age"), TestCell::Str("Member")],
                &[TestCell::Str("Alice"), TestCell::Num(30.0), TestCell::Bool(true)],
                &[TestCell::Str("Smith, Bob"), TestCell::Num(2.5), TestCell::Empty],
            ],
        ),
        ("Other", &[&[TestCell::Str("ignored")]]),
    ]);
    SourceFile::new("people.xlsx", data)
}

fn para(text: &str) -> String {
    format!("<w:p><w:r><w:t xml:space=\"preserve\">{text}</w:t></w:r></w:p>")
}

// ---- Excel ----

#[test]
fn test_xlsx_to_csv_reads_first_sheet() {
    let result = run(&people_xlsx(), DocumentFormat::Csv).unwrap();
    assert_eq!(result.mime_type, "text/csv");
    assert_eq!(
        result.text(),
        "Name,Age,Member\nAlice,30,TRUE\n\"Smith, Bob\",2.5,"
    );
    assert!(!result.text().contains("ignored"));
}

#[test]
fn test_xlsx_to_json_keeps_types() {
    let result = run(&people_xlsx(), DocumentFormat::Json).unwrap();
    assert_eq!(result.mime_type, "application/json");
    let value: Value = serde_json::from_str(&result.text()).unwrap();
    assert_eq!(
        value,
        json!([
            {"Name": "Alice", "Age": 30, "Member": true},
            {"Name": "Smith, Bob", "Age": 2.5}
        ])
    );
}

#[test]
fn test_xlsx_to_html_table() {
    let result = run(&people_xlsx(), DocumentFormat::Html).unwrap();
    assert_eq!(result.mime_type, "text/html");
    let html = result.text();
    assert!(html.starts_with("<html><head><meta charset=\"utf-8\"/><title>People</title>"));
    assert!(html.contains("<tr><td>Name</td><td>Age</td><td>Member</td></tr>"));
    assert!(html.contains("<td>Smith, Bob</td><td>2.5</td><td></td>"));
}

#[test]
fn test_xlsx_header_keys_for_blank_and_duplicate_headers() {
    let data = build_xlsx(&[(
        "Sheet1",
        &[
            &[TestCell::Str("id"), TestCell::Empty, TestCell::Str("id")],
            &[TestCell::Num(1.0), TestCell::Str("x"), TestCell::Num(2.0)],
        ],
    )]);
    let result = run(&SourceFile::new("dupes.xlsx", data), DocumentFormat::Json).unwrap();
    let value: Value = serde_json::from_str(&result.text()).unwrap();
    assert_eq!(value, json!([{"id": 1, "__EMPTY": "x", "id_1": 2}]));
}

#[test]
fn test_xlsx_to_pdf_is_rejected() {
    let err = run(&people_xlsx(), DocumentFormat::Pdf).unwrap_err();
    assert_eq!(err.to_string(), "Cannot convert Excel to pdf");
}

#[test]
fn test_corrupt_xlsx() {
    let source = SourceFile::new("broken.xlsx", b"not a workbook".to_vec());
    assert!(run(&source, DocumentFormat::Csv).is_err());
}

// ---- Word ----

#[test]
fn test_docx_to_html() {
    let body = format!(
        r#"<w:p><w:pPr><w:pStyle w:val="Heading1"/></w:pPr><w:r><w:t>Title</w:t></w:r></w:p>{}<w:p><w:r><w:rPr><w:b/></w:rPr><w:t>Bold</w:t></w:r></w:p>"#,
        para("Body &amp; soul")
    );
    let source = SourceFile::new("report.docx", build_docx(&body));
    let result = run(&source, DocumentFormat::Html).unwrap();
    assert_eq!(result.mime_type, "text/html");
    assert_eq!(
        result.text(),
        "<h1>Title</h1><p>Body &amp; soul</p><p><strong>Bold</strong></p>"
    );
}

#[test]
fn test_docx_heading_from_styles_part() {
    let styles = r#"<w:styles xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:style w:type="paragraph" w:styleId="Kop2"><w:name w:val="heading 2"/></w:style></w:styles>"#;
    let body = r#"<w:p><w:pPr><w:pStyle w:val="Kop2"/></w:pPr><w:r><w:t>Sectie</w:t></w:r></w:p>"#;
    let source = SourceFile::new(
        "nl.docx",
        build_docx_with_parts(body, &[("word/styles.xml", styles)]),
    );
    assert_eq!(run(&source, DocumentFormat::Html).unwrap().text(), "<h2>Sectie</h2>");
}

#[test]
fn test_docx_to_txt() {
    let body = format!("{}{}", para("First line"), para("Second line"));
    let source = SourceFile::new("notes.docx", build_docx(&body));
    let result = run(&source, DocumentFormat::Txt).unwrap();
    assert_eq!(result.mime_type, "text/plain");
    assert_eq!(result.text(), "First line\n\nSecond line\n\n");
}

#[test]
fn test_docx_to_pdf_round_trips_text() {
    let body = format!("{}{}", para("Hello"), para("World"));
    let source = SourceFile::new("greeting.docx", build_docx(&body));
    let pdf = run(&source, DocumentFormat::Pdf).unwrap();
    assert_eq!(pdf.mime_type, "application/pdf");
    assert!(pdf.bytes.starts_with(b"%PDF-"));

    let back = run(&SourceFile::new("greeting.pdf", pdf.bytes), DocumentFormat::Txt).unwrap();
    let text = back.text();
    assert!(text.starts_with("--- Page 1 ---\n"));
    assert!(text.contains("Hello"));
    assert!(text.contains("World"));
}

#[test]
fn test_docx_to_pdf_paginates_long_text() {
    let body: String = (1..=60).map(|i| para(&format!("Paragraph {i}"))).collect();
    let source = SourceFile::new("long.docx", build_docx(&body));
    let pdf = run(&source, DocumentFormat::Pdf).unwrap();

    // 60 paragraphs, each followed by a blank line, plus the trailing empty line: 121 lines.
    let doc = LopdfReader.open(&pdf.bytes).unwrap();
    assert_eq!(doc.page_count(), 4);
    assert!(doc.page_text(3).unwrap().contains("Paragraph 60"));
}

#[test]
fn test_docx_missing_document_part() {
    use std::io::{Cursor, Write};
    let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
    zip.start_file("word/other.xml", zip::write::SimpleFileOptions::default())
        .unwrap();
    zip.write_all(b"<x/>").unwrap();
    let data = zip.finish().unwrap().into_inner();

    let err = run(&SourceFile::new("empty.docx", data), DocumentFormat::Txt).unwrap_err();
    assert!(matches!(err, ConvertError::MalformedDocument { .. }));
}

#[test]
fn test_docx_to_csv_is_rejected() {
    let source = SourceFile::new("notes.docx", build_docx(&para("x")));
    let err = run(&source, DocumentFormat::Csv).unwrap_err();
    assert_eq!(err.to_string(), "Cannot convert Word to csv");
}

// ---- PDF ----

fn pdf_from_docx(paragraphs: &[&str]) -> SourceFile {
    let body: String = paragraphs.iter().map(|p| para(p)).collect();
    let docx = SourceFile::new("src.docx", build_docx(&body));
    let pdf = run(&docx, DocumentFormat::Pdf).unwrap();
    SourceFile::new("src.pdf", pdf.bytes)
}

#[test]
fn test_pdf_to_docx_is_word_html() {
    let source = pdf_from_docx(&["Fish &amp; Chips"]);
    let result = run(&source, DocumentFormat::Docx).unwrap();
    assert_eq!(result.mime_type, "application/msword");
    let text = result.text();
    assert!(text.starts_with('\u{FEFF}'));
    assert!(text.contains("xmlns:w='urn:schemas-microsoft-com:office:word'"));
    assert!(text.contains("Fish &amp; Chips"));
    assert!(text.contains("</p><hr/>"));
    assert!(text.ends_with("</body></html>"));
    assert_eq!(result.warnings.len(), 1);
    assert_eq!(result.warnings[0].code, WarningCode::FormatSubstituted);
    assert_eq!(
        output_file_name("src.pdf", Target::Document(DocumentFormat::Docx)),
        "src.doc"
    );
}

#[cfg(not(feature = "pdfium"))]
#[test]
fn test_pdf_to_png_needs_rasterizer() {
    let source = pdf_from_docx(&["page"]);
    let err = run(&source, DocumentFormat::Png).unwrap_err();
    assert!(matches!(err, ConvertError::CapabilityUnavailable { .. }));
}

#[test]
fn test_pdf_to_html_is_rejected() {
    let source = pdf_from_docx(&["page"]);
    let err = run(&source, DocumentFormat::Html).unwrap_err();
    assert_eq!(err.to_string(), "Cannot convert PDF to html");
}

#[test]
fn test_corrupt_pdf() {
    let source = SourceFile::new("broken.pdf", b"%PDF-1.4 nothing here".to_vec());
    assert!(run(&source, DocumentFormat::Txt).is_err());
}

// ---- Routing ----

#[test]
fn test_unknown_document_source() {
    let source = SourceFile::new("slides.pptx", b"PK\x03\x04".to_vec());
    let err = run(&source, DocumentFormat::Pdf).unwrap_err();
    assert!(matches!(err, ConvertError::UnsupportedFormat { .. }));
}

#[test]
fn test_document_targets_and_defaults() {
    let targets = |name| available_targets(Category::Document, name);
    let doc = |f| Target::Document(f);

    assert_eq!(
        targets("a.xlsx"),
        vec![doc(DocumentFormat::Csv), doc(DocumentFormat::Json), doc(DocumentFormat::Html)]
    );
    assert_eq!(
        targets("a.docx"),
        vec![doc(DocumentFormat::Pdf), doc(DocumentFormat::Txt), doc(DocumentFormat::Html)]
    );
    assert_eq!(
        targets("a.pdf"),
        vec![
            doc(DocumentFormat::Txt),
            doc(DocumentFormat::Docx),
            doc(DocumentFormat::Jpg),
            doc(DocumentFormat::Png)
        ]
    );
    assert!(targets("a.pptx").is_empty());

    assert_eq!(
        default_target(Category::Document, "a.xls"),
        Some(doc(DocumentFormat::Csv))
    );
    assert_eq!(
        default_target(Category::Document, "a.docx"),
        Some(doc(DocumentFormat::Pdf))
    );
    assert_eq!(
        default_target(Category::Document, "a.pdf"),
        Some(doc(DocumentFormat::Txt))
    );
}

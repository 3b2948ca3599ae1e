use std::borrow::Cow;
use std::collections::HashMap;
use std::io::Cursor;

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use zip::ZipArchive;

use crate::converter::{ConversionWarning, WarningCode};
use crate::error::ConvertError;
use crate::markup::{escape_html, wrap_formatting};
use crate::zip_utils::{read_zip_text, validate_zip_budget};

/// Uncompressed size budget for a DOCX container.
pub const DEFAULT_ZIP_BUDGET: usize = 256 * 1024 * 1024;

/// Text produced by a [`WordExtractor`], with any recoverable issues.
#[derive(Debug, Clone, Default)]
pub struct ExtractedText {
    pub text: String,
    pub warnings: Vec<ConversionWarning>,
}

/// Turns a Word document into HTML or plain text.
pub trait WordExtractor: Send + Sync {
    /// Semantic HTML fragment: headings, paragraphs, lists, tables, links.
    fn to_html(&self, data: &[u8]) -> Result<ExtractedText, ConvertError>;

    /// Plain text with every paragraph followed by a blank line.
    fn extract_raw_text(&self, data: &[u8]) -> Result<ExtractedText, ConvertError>;
}

#[derive(Debug, Clone, PartialEq)]
enum ParagraphKind {
    Normal,
    Heading(u8),
    ListItem { ordered: bool, level: u8 },
}

/// A run of text sharing formatting and link target.
#[derive(Debug, Clone, PartialEq)]
struct Run {
    text: String,
    bold: bool,
    italic: bool,
    href: Option<String>,
}

#[derive(Debug, Clone)]
struct Paragraph {
    kind: ParagraphKind,
    runs: Vec<Run>,
}

impl Paragraph {
    fn text(&self) -> String {
        self.runs.iter().map(|r| r.text.as_str()).collect()
    }

    fn push_text(&mut self, text: &str, bold: bool, italic: bool, href: Option<&String>) {
        if let Some(last) = self.runs.last_mut()
            && last.bold == bold
            && last.italic == italic
            && last.href.as_ref() == href
        {
            last.text.push_str(text);
            return;
        }
        self.runs.push(Run {
            text: text.to_string(),
            bold,
            italic,
            href: href.cloned(),
        });
    }
}

/// Table cells hold paragraphs; nested tables are flattened into their cell.
type TableRows = Vec<Vec<Vec<Paragraph>>>;

#[derive(Debug, Clone)]
enum Block {
    Paragraph(Paragraph),
    Table(TableRows),
}

// ---- Attribute helpers ----

/// Unescaped value of the first attribute whose local name is `name`.
fn attr(e: &BytesStart, name: &str) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.local_name().as_ref() == name.as_bytes())
        .map(|a| {
            a.unescape_value()
                .map(Cow::into_owned)
                .unwrap_or_else(|_| String::from_utf8_lossy(&a.value).into_owned())
        })
}

/// A toggle property (`<w:b/>`, `<w:i/>`) is on unless `w:val` says `0`/`false`.
fn is_toggle_on(e: &BytesStart) -> bool {
    match attr(e, "val") {
        Some(v) => !(v == "0" || v.eq_ignore_ascii_case("false")),
        None => true,
    }
}

// ---- Package parts ----

/// Heading level from a style ID like `Heading1`.
fn heading_level_from_id(style_id: &str) -> Option<u8> {
    let lower = style_id.to_ascii_lowercase();
    lower
        .strip_prefix("heading")?
        .parse::<u8>()
        .ok()
        .filter(|l| (1..=9).contains(l))
}

/// Heading level from a style name like `heading 1`.
fn heading_level_from_name(name: &str) -> Option<u8> {
    let lower = name.trim().to_ascii_lowercase();
    lower
        .strip_prefix("heading")?
        .trim()
        .parse::<u8>()
        .ok()
        .filter(|l| (1..=9).contains(l))
}

/// Map style IDs to heading levels using both the ID and the display name.
fn parse_styles(xml: &str) -> HashMap<String, u8> {
    let mut styles = HashMap::new();
    let mut reader = Reader::from_str(xml);
    let mut current: Option<(String, Option<u8>)> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) => match e.local_name().as_ref() {
                b"style" => {
                    current = attr(e, "styleId").map(|id| {
                        let level = heading_level_from_id(&id);
                        (id, level)
                    });
                }
                b"name" => {
                    if let Some((_, level)) = current.as_mut()
                        && let Some(found) = attr(e, "val").and_then(|v| heading_level_from_name(&v))
                    {
                        *level = Some(found);
                    }
                }
                _ => {}
            },
            Ok(Event::End(ref e)) if e.local_name().as_ref() == b"style" => {
                if let Some((id, Some(level))) = current.take() {
                    styles.insert(id, level);
                }
            }
            Ok(Event::Eof) | Err(_) => break,
            _ => {}
        }
    }
    styles
}

/// Map relationship IDs to their targets.
fn parse_relationships(xml: &str) -> HashMap<String, String> {
    let mut rels = HashMap::new();
    let mut reader = Reader::from_str(xml);
    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e))
                if e.local_name().as_ref() == b"Relationship" =>
            {
                if let (Some(id), Some(target)) = (attr(e, "Id"), attr(e, "Target")) {
                    rels.insert(id, target);
                }
            }
            Ok(Event::Eof) | Err(_) => break,
            _ => {}
        }
    }
    rels
}

fn is_ordered_format(fmt: &str) -> bool {
    matches!(
        fmt,
        "decimal" | "upperRoman" | "lowerRoman" | "upperLetter" | "lowerLetter" | "decimalZero"
    )
}

/// Resolve `(numId, ilvl)` to whether the list level is ordered.
///
/// numbering.xml maps `numId → abstractNumId → lvl/numFmt`.
fn parse_numbering(xml: &str) -> HashMap<(String, u8), bool> {
    let mut reader = Reader::from_str(xml);
    let mut abstract_levels: HashMap<String, Vec<(u8, bool)>> = HashMap::new();
    let mut num_to_abstract: HashMap<String, String> = HashMap::new();

    let mut abstract_id: Option<String> = None;
    let mut level: Option<u8> = None;
    let mut num_id: Option<String> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) => match e.local_name().as_ref() {
                b"abstractNum" => abstract_id = attr(e, "abstractNumId"),
                b"lvl" if abstract_id.is_some() => {
                    level = attr(e, "ilvl").and_then(|v| v.parse().ok());
                }
                b"numFmt" => {
                    if let (Some(id), Some(lvl), Some(fmt)) =
                        (&abstract_id, level, attr(e, "val"))
                    {
                        abstract_levels
                            .entry(id.clone())
                            .or_default()
                            .push((lvl, is_ordered_format(&fmt)));
                    }
                }
                b"num" => num_id = attr(e, "numId"),
                b"abstractNumId" => {
                    if let (Some(num), Some(abs)) = (&num_id, attr(e, "val")) {
                        num_to_abstract.insert(num.clone(), abs);
                    }
                }
                _ => {}
            },
            Ok(Event::End(ref e)) => match e.local_name().as_ref() {
                b"abstractNum" => abstract_id = None,
                b"lvl" => level = None,
                b"num" => num_id = None,
                _ => {}
            },
            Ok(Event::Eof) | Err(_) => break,
            _ => {}
        }
    }

    let mut result = HashMap::new();
    for (num, abs) in num_to_abstract {
        if let Some(levels) = abstract_levels.get(&abs) {
            for &(lvl, ordered) in levels {
                result.insert((num.clone(), lvl), ordered);
            }
        }
    }
    result
}

fn resolve_paragraph_kind(style_val: &str, styles: &HashMap<String, u8>) -> ParagraphKind {
    heading_level_from_id(style_val)
        .or_else(|| styles.get(style_val).copied())
        .map_or(ParagraphKind::Normal, |level| {
            ParagraphKind::Heading(level.clamp(1, 6))
        })
}

// ---- document.xml ----

#[derive(Default)]
struct TableBuilder {
    rows: TableRows,
    row: Vec<Vec<Paragraph>>,
    cell: Vec<Paragraph>,
}

/// Outer paragraph state parked while a text box's own paragraphs are read.
struct SuspendedParagraph {
    paragraph: Paragraph,
    num_id: Option<String>,
    ilvl: Option<u8>,
    in_run: bool,
    in_run_properties: bool,
    bold: bool,
    italic: bool,
    hyperlink: Option<Option<String>>,
}

struct DocumentParser<'a> {
    styles: &'a HashMap<String, u8>,
    relationships: &'a HashMap<String, String>,
    numbering: &'a HashMap<(String, u8), bool>,

    blocks: Vec<Block>,
    warnings: Vec<ConversionWarning>,

    in_body: bool,
    table_depth: usize,
    table: TableBuilder,

    paragraph: Option<Paragraph>,
    num_id: Option<String>,
    ilvl: Option<u8>,
    in_para_properties: bool,
    in_num_pr: bool,

    in_run: bool,
    in_run_properties: bool,
    in_text: bool,
    bold: bool,
    italic: bool,
    /// `Some` while inside `<w:hyperlink>`; the inner value is the resolved target.
    hyperlink: Option<Option<String>>,

    /// Paragraphs interrupted by a nested `<w:p>` (text boxes), innermost last.
    suspended: Vec<SuspendedParagraph>,
    /// Text-box paragraphs, emitted after the paragraph that anchors them.
    anchored: Vec<Paragraph>,
    /// Depth inside `<mc:Choice>`; only the `<mc:Fallback>` branch is read.
    choice_depth: usize,
}

impl<'a> DocumentParser<'a> {
    fn new(
        styles: &'a HashMap<String, u8>,
        relationships: &'a HashMap<String, String>,
        numbering: &'a HashMap<(String, u8), bool>,
    ) -> Self {
        Self {
            styles,
            relationships,
            numbering,
            blocks: Vec::new(),
            warnings: Vec::new(),
            in_body: false,
            table_depth: 0,
            table: TableBuilder::default(),
            paragraph: None,
            num_id: None,
            ilvl: None,
            in_para_properties: false,
            in_num_pr: false,
            in_run: false,
            in_run_properties: false,
            in_text: false,
            bold: false,
            italic: false,
            hyperlink: None,
            suspended: Vec::new(),
            anchored: Vec::new(),
            choice_depth: 0,
        }
    }

    fn push_text(&mut self, text: &str) {
        if let Some(paragraph) = self.paragraph.as_mut() {
            let href = self.hyperlink.as_ref().and_then(Option::as_ref);
            paragraph.push_text(text, self.bold, self.italic, href);
        }
    }

    fn start_hyperlink(&mut self, e: &BytesStart) {
        let target = if let Some(rid) = attr(e, "id") {
            match self.relationships.get(&rid) {
                Some(target) => Some(target.clone()),
                None => {
                    self.warnings.push(
                        ConversionWarning::new(
                            WarningCode::SkippedElement,
                            format!("hyperlink relationship '{rid}' not found in rels"),
                        )
                        .at(rid),
                    );
                    None
                }
            }
        } else {
            attr(e, "anchor").map(|anchor| format!("#{anchor}"))
        };
        self.hyperlink = Some(target);
    }

    fn start_paragraph(&mut self) {
        if let Some(outer) = self.paragraph.take() {
            self.suspended.push(SuspendedParagraph {
                paragraph: outer,
                num_id: self.num_id.take(),
                ilvl: self.ilvl.take(),
                in_run: std::mem::take(&mut self.in_run),
                in_run_properties: std::mem::take(&mut self.in_run_properties),
                bold: std::mem::take(&mut self.bold),
                italic: std::mem::take(&mut self.italic),
                hyperlink: self.hyperlink.take(),
            });
        }
        self.paragraph = Some(Paragraph {
            kind: ParagraphKind::Normal,
            runs: Vec::new(),
        });
        self.num_id = None;
        self.ilvl = None;
    }

    fn finish_paragraph(&mut self) {
        let Some(mut paragraph) = self.paragraph.take() else {
            return;
        };
        if let (Some(num_id), Some(level)) = (self.num_id.take(), self.ilvl.take()) {
            let ordered = self
                .numbering
                .get(&(num_id, level))
                .copied()
                .unwrap_or(false);
            paragraph.kind = ParagraphKind::ListItem { ordered, level };
        }

        let Some(outer) = self.suspended.pop() else {
            let mut finished = vec![paragraph];
            finished.append(&mut self.anchored);
            for paragraph in finished {
                if self.table_depth > 0 {
                    self.table.cell.push(paragraph);
                } else {
                    self.blocks.push(Block::Paragraph(paragraph));
                }
            }
            return;
        };
        self.anchored.push(paragraph);
        self.paragraph = Some(outer.paragraph);
        self.num_id = outer.num_id;
        self.ilvl = outer.ilvl;
        self.in_run = outer.in_run;
        self.in_run_properties = outer.in_run_properties;
        self.in_text = false;
        self.bold = outer.bold;
        self.italic = outer.italic;
        self.hyperlink = outer.hyperlink;
    }

    fn start(&mut self, e: &BytesStart, empty: bool) {
        match e.local_name().as_ref() {
            b"body" => self.in_body = true,
            b"tbl" if self.in_body => {
                self.table_depth += 1;
                if self.table_depth == 1 {
                    self.table = TableBuilder::default();
                }
            }
            b"tr" if self.table_depth == 1 => self.table.row.clear(),
            b"tc" if self.table_depth == 1 => self.table.cell.clear(),
            b"p" if self.in_body => {
                self.start_paragraph();
                if empty {
                    self.finish_paragraph();
                }
            }
            b"pPr" if self.paragraph.is_some() => self.in_para_properties = !empty,
            b"pStyle" if self.in_para_properties => {
                if let (Some(style), Some(paragraph)) = (attr(e, "val"), self.paragraph.as_mut()) {
                    paragraph.kind = resolve_paragraph_kind(&style, self.styles);
                }
            }
            b"numPr" if self.in_para_properties => self.in_num_pr = !empty,
            b"ilvl" if self.in_num_pr => self.ilvl = attr(e, "val").and_then(|v| v.parse().ok()),
            b"numId" if self.in_num_pr => {
                // numId 0 removes numbering
                self.num_id = attr(e, "val").filter(|v| v != "0");
            }
            b"hyperlink" if self.paragraph.is_some() && !empty => self.start_hyperlink(e),
            b"r" if self.paragraph.is_some() => {
                self.in_run = !empty;
                self.bold = false;
                self.italic = false;
            }
            b"rPr" if self.in_run => self.in_run_properties = !empty,
            b"b" if self.in_run_properties => self.bold = is_toggle_on(e),
            b"i" if self.in_run_properties => self.italic = is_toggle_on(e),
            b"t" if self.in_run => self.in_text = !empty,
            b"tab" if self.in_run && !self.in_run_properties => self.push_text("\t"),
            b"br" | b"cr" if self.in_run => self.push_text("\n"),
            _ => {}
        }
    }

    fn end(&mut self, local: &[u8]) {
        match local {
            b"body" => self.in_body = false,
            b"tbl" if self.table_depth > 0 => {
                self.table_depth -= 1;
                if self.table_depth == 0 {
                    let rows = std::mem::take(&mut self.table.rows);
                    self.blocks.push(Block::Table(rows));
                }
            }
            b"tr" if self.table_depth == 1 => {
                let row = std::mem::take(&mut self.table.row);
                self.table.rows.push(row);
            }
            b"tc" if self.table_depth == 1 => {
                let cell = std::mem::take(&mut self.table.cell);
                self.table.row.push(cell);
            }
            b"p" => self.finish_paragraph(),
            b"pPr" => self.in_para_properties = false,
            b"numPr" => self.in_num_pr = false,
            b"hyperlink" => self.hyperlink = None,
            b"rPr" => self.in_run_properties = false,
            b"r" => {
                self.in_run = false;
                self.in_text = false;
                self.bold = false;
                self.italic = false;
            }
            b"t" => self.in_text = false,
            _ => {}
        }
    }

    fn parse(mut self, xml: &str) -> Result<(Vec<Block>, Vec<ConversionWarning>), ConvertError> {
        let mut reader = Reader::from_str(xml);
        loop {
            let event = reader.read_event()?;
            if self.choice_depth > 0 {
                match event {
                    Event::Start(ref e) if e.local_name().as_ref() == b"Choice" => {
                        self.choice_depth += 1
                    }
                    Event::End(ref e) if e.local_name().as_ref() == b"Choice" => {
                        self.choice_depth -= 1
                    }
                    Event::Eof => break,
                    _ => {}
                }
                continue;
            }
            match event {
                Event::Start(ref e) if e.local_name().as_ref() == b"Choice" => {
                    self.choice_depth = 1
                }
                Event::Start(ref e) => self.start(e, false),
                Event::Empty(ref e) => self.start(e, true),
                Event::Text(ref e) if self.in_text => {
                    let text = e.unescape()?;
                    self.push_text(&text);
                }
                Event::End(ref e) => self.end(e.local_name().as_ref()),
                Event::Eof => break,
                _ => {}
            }
        }
        Ok((self.blocks, self.warnings))
    }
}

// ---- Rendering ----

fn render_runs(runs: &[Run], out: &mut String) {
    let mut open_href: Option<&String> = None;
    for run in runs {
        if run.href.as_ref() != open_href {
            if open_href.is_some() {
                out.push_str("</a>");
            }
            if let Some(href) = &run.href {
                out.push_str(&format!("<a href=\"{}\">", escape_html(href)));
            }
            open_href = run.href.as_ref();
        }
        let escaped = escape_html(&run.text).replace('\n', "<br />");
        if run.text.trim().is_empty() {
            out.push_str(&escaped);
        } else {
            out.push_str(&wrap_formatting(&escaped, run.bold, run.italic));
        }
    }
    if open_href.is_some() {
        out.push_str("</a>");
    }
}

struct ListFrame {
    ordered: bool,
    item_open: bool,
}

#[derive(Default)]
struct HtmlWriter {
    out: String,
    lists: Vec<ListFrame>,
}

impl HtmlWriter {
    fn close_list(&mut self) {
        if let Some(frame) = self.lists.pop() {
            if frame.item_open {
                self.out.push_str("</li>");
            }
            self.out
                .push_str(if frame.ordered { "</ol>" } else { "</ul>" });
        }
    }

    fn close_all_lists(&mut self) {
        while !self.lists.is_empty() {
            self.close_list();
        }
    }

    fn open_item(&mut self, ordered: bool, level: u8) {
        let depth = usize::from(level) + 1;
        while self.lists.len() > depth {
            self.close_list();
        }
        if self.lists.len() == depth && self.lists.last().is_some_and(|f| f.ordered != ordered) {
            self.close_list();
        }
        while self.lists.len() < depth {
            if let Some(parent) = self.lists.last_mut()
                && !parent.item_open
            {
                self.out.push_str("<li>");
                parent.item_open = true;
            }
            self.out.push_str(if ordered { "<ol>" } else { "<ul>" });
            self.lists.push(ListFrame {
                ordered,
                item_open: false,
            });
        }
        if let Some(frame) = self.lists.last_mut() {
            if frame.item_open {
                self.out.push_str("</li>");
            }
            self.out.push_str("<li>");
            frame.item_open = true;
        }
    }

    fn paragraph(&mut self, paragraph: &Paragraph) {
        if paragraph.text().trim().is_empty() {
            return;
        }
        match paragraph.kind {
            ParagraphKind::ListItem { ordered, level } => {
                self.open_item(ordered, level);
                render_runs(&paragraph.runs, &mut self.out);
            }
            ParagraphKind::Heading(level) => {
                self.close_all_lists();
                self.out.push_str(&format!("<h{level}>"));
                render_runs(&paragraph.runs, &mut self.out);
                self.out.push_str(&format!("</h{level}>"));
            }
            ParagraphKind::Normal => {
                self.close_all_lists();
                self.out.push_str("<p>");
                render_runs(&paragraph.runs, &mut self.out);
                self.out.push_str("</p>");
            }
        }
    }

    fn table(&mut self, rows: &TableRows) {
        self.close_all_lists();
        self.out.push_str("<table>");
        for row in rows {
            self.out.push_str("<tr>");
            for cell in row {
                self.out.push_str("<td>");
                let mut inner = HtmlWriter::default();
                for paragraph in cell {
                    inner.paragraph(paragraph);
                }
                self.out.push_str(&inner.finish());
                self.out.push_str("</td>");
            }
            self.out.push_str("</tr>");
        }
        self.out.push_str("</table>");
    }

    fn finish(mut self) -> String {
        self.close_all_lists();
        self.out
    }
}

fn render_html(blocks: &[Block]) -> String {
    let mut writer = HtmlWriter::default();
    for block in blocks {
        match block {
            Block::Paragraph(p) => writer.paragraph(p),
            Block::Table(rows) => writer.table(rows),
        }
    }
    writer.finish()
}

fn render_raw_text(blocks: &[Block]) -> String {
    let mut out = String::new();
    let mut emit = |p: &Paragraph| {
        out.push_str(&p.text());
        out.push_str("\n\n");
    };
    for block in blocks {
        match block {
            Block::Paragraph(p) => emit(p),
            Block::Table(rows) => rows.iter().flatten().flatten().for_each(&mut emit),
        }
    }
    out
}

// ---- Extractor ----

/// Reads `.docx` packages with `zip` and `quick-xml`.
#[derive(Debug, Clone, Copy)]
pub struct DocxExtractor {
    /// Largest total uncompressed size accepted for the container.
    pub max_uncompressed_bytes: usize,
}

impl Default for DocxExtractor {
    fn default() -> Self {
        Self {
            max_uncompressed_bytes: DEFAULT_ZIP_BUDGET,
        }
    }
}

impl DocxExtractor {
    fn load(&self, data: &[u8]) -> Result<(Vec<Block>, Vec<ConversionWarning>), ConvertError> {
        let mut archive = ZipArchive::new(Cursor::new(data))?;
        validate_zip_budget(&mut archive, self.max_uncompressed_bytes)?;

        let styles = read_zip_text(&mut archive, "word/styles.xml")?
            .map(|xml| parse_styles(&xml))
            .unwrap_or_default();
        let relationships = read_zip_text(&mut archive, "word/_rels/document.xml.rels")?
            .map(|xml| parse_relationships(&xml))
            .unwrap_or_default();
        let numbering = read_zip_text(&mut archive, "word/numbering.xml")?
            .map(|xml| parse_numbering(&xml))
            .unwrap_or_default();
        let document = read_zip_text(&mut archive, "word/document.xml")?.ok_or_else(|| {
            ConvertError::MalformedDocument {
                reason: "missing word/document.xml".to_string(),
            }
        })?;

        let (blocks, warnings) =
            DocumentParser::new(&styles, &relationships, &numbering).parse(&document)?;
        tracing::debug!(blocks = blocks.len(), "parsed word document");
        Ok((blocks, warnings))
    }
}

impl WordExtractor for DocxExtractor {
    fn to_html(&self, data: &[u8]) -> Result<ExtractedText, ConvertError> {
        let (blocks, warnings) = self.load(data)?;
        Ok(ExtractedText {
            text: render_html(&blocks),
            warnings,
        })
    }

    fn extract_raw_text(&self, data: &[u8]) -> Result<ExtractedText, ConvertError> {
        let (blocks, warnings) = self.load(data)?;
        Ok(ExtractedText {
            text: render_raw_text(&blocks),
            warnings,
        })
    }
}

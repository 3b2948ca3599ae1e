/// Escape text for inclusion in HTML element content or a quoted attribute.
pub fn escape_html(content: &str) -> String {
    let mut out = String::with_capacity(content.len());
    for c in content.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Build an HTML `<table>` from rows of cell text.
///
/// Rows shorter than the widest row are padded with empty cells.
/// Cell content is escaped via `escape_html`.
pub fn build_table(rows: &[Vec<String>]) -> String {
    let col_count = rows.iter().map(Vec::len).max().unwrap_or(0);
    let mut out = String::from("<table>");
    for row in rows {
        out.push_str("<tr>");
        for i in 0..col_count {
            out.push_str("<td>");
            if let Some(cell) = row.get(i) {
                out.push_str(&escape_html(cell));
            }
            out.push_str("</td>");
        }
        out.push_str("</tr>");
    }
    out.push_str("</table>");
    out
}

/// Wrap a body fragment in a minimal UTF-8 HTML page.
pub fn html_page(title: &str, body: &str) -> String {
    format!(
        "<html><head><meta charset=\"utf-8\"/><title>{}</title></head><body>{}</body></html>",
        escape_html(title),
        body
    )
}

/// Wrap inline HTML with `<strong>`/`<em>` markers.
///
/// Returns the text unchanged if neither bold nor italic.
/// Returns empty string if the input text (after trimming) is empty.
pub fn wrap_formatting(html: &str, bold: bool, italic: bool) -> String {
    if !bold && !italic {
        return html.to_string();
    }
    if html.trim().is_empty() {
        return String::new();
    }
    let inner = if italic {
        format!("<em>{html}</em>")
    } else {
        html.to_string()
    };
    if bold {
        format!("<strong>{inner}</strong>")
    } else {
        inner
    }
}

//! HTML text, title and link extraction

use scraper::{Html, Selector};
use std::collections::HashSet;
use url::Url;

/// Extract the document title, if any
pub fn extract_title(content: &str) -> Option<String> {
    let document = Html::parse_document(content);
    let selector = Selector::parse("title").ok()?;
    let title = document
        .select(&selector)
        .next()?
        .text()
        .collect::<String>()
        .trim()
        .to_string();
    if title.is_empty() {
        None
    } else {
        Some(title)
    }
}

/// Extract plain text from HTML markup
pub fn extract_text(content: &str) -> String {
    let text =
        html2text::from_read(content.as_bytes(), 80).unwrap_or_else(|_| content.to_string());
    normalize_whitespace(&text)
}

/// Extract the set of absolute anchor targets, resolving relative hrefs
/// against `base_url`
pub fn extract_links(content: &str, base_url: &str) -> HashSet<String> {
    let mut links = HashSet::new();
    let base = match Url::parse(base_url) {
        Ok(u) => u,
        Err(_) => return links,
    };
    let document = Html::parse_document(content);
    let selector = match Selector::parse("a[href]") {
        Ok(s) => s,
        Err(_) => return links,
    };
    for elem in document.select(&selector) {
        if let Some(href) = elem.value().attr("href") {
            if href.is_empty() {
                continue;
            }
            if let Ok(resolved) = base.join(href) {
                links.insert(resolved.to_string());
            }
        }
    }
    links
}

/// Collapse runs of whitespace and blank lines
pub fn normalize_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut prev_blank = true;
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            if !prev_blank {
                out.push('\n');
            }
            prev_blank = true;
        } else {
            out.push_str(line);
            out.push(' ');
            prev_blank = false;
        }
    }
    out.trim().to_string()
}

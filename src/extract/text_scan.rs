//! Free-text pattern search over page paragraphs.
//!
//! Last-resort strategy for the sales/funded fields: one JS pass over
//! visible `<p>` nodes matched against the known phrasings, plus a
//! static scan over the serialized DOM (scraper) for sessions where
//! script evaluation isn't available.

use regex::Regex;
use scraper::{ElementRef, Html, Selector};

/// Phrasings that identify a sales/funded paragraph, in match priority.
const PATTERNS: [&str; 4] = [
    r"(?i)\d+\s+of\s+\d+\s+sold",
    r"(?i)\d+,?\d*\s+sold",
    r"(?i)\d+%\s+Funded",
    r"(?i)^Sold\s+Out$",
];

const FUNDED_PATTERN: &str = r"(?i)\d+%\s+Funded";

/// Script returning the first visible paragraph matching any phrasing.
pub fn scan_script() -> &'static str {
    r#"(() => {
        const patterns = [
            /\d+\s+of\s+\d+\s+sold/i,
            /\d+,?\d*\s+sold/i,
            /\d+%\s+Funded/i,
            /^Sold\s+Out$/i
        ];
        for (const p of document.querySelectorAll('p')) {
            const visible = !!(p.offsetWidth || p.offsetHeight || p.getClientRects().length);
            if (!visible) continue;
            const text = (p.innerText || '').trim();
            for (const pattern of patterns) {
                if (pattern.test(text)) return text;
            }
        }
        return null;
    })()"#
}

/// Script returning the first visible `selector` match whose text contains
/// `needle`. Covers the probes CSS alone can't express.
pub fn contains_script(selector: &str, needle: &str) -> String {
    format!(
        r#"(() => {{
        const needle = {needle};
        for (const el of document.querySelectorAll({selector})) {{
            const visible = !!(el.offsetWidth || el.offsetHeight || el.getClientRects().length);
            if (!visible) continue;
            const text = (el.innerText || '').trim();
            if (text && text.includes(needle)) return text;
        }}
        return null;
    }})()"#,
        selector = js_string(selector),
        needle = js_string(needle),
    )
}

fn js_string(s: &str) -> String {
    serde_json::to_string(s).unwrap_or_else(|_| "\"\"".to_string())
}

/// Static equivalent of [`scan_script`] over fetched page source. No
/// visibility gate — the serialized DOM doesn't carry layout.
pub fn scan_html(html: &str) -> Option<String> {
    let patterns: Vec<Regex> = PATTERNS
        .iter()
        .filter_map(|p| Regex::new(p).ok())
        .collect();
    let doc = Html::parse_document(html);
    let selector = Selector::parse("p").ok()?;
    for element in doc.select(&selector) {
        let text = element_text(&element);
        if !text.is_empty() && patterns.iter().any(|re| re.is_match(&text)) {
            return Some(text);
        }
    }
    None
}

/// Static equivalent of [`contains_script`].
pub fn find_containing(html: &str, selector: &str, needle: &str) -> Option<String> {
    let doc = Html::parse_document(html);
    let sel = Selector::parse(selector).ok()?;
    for element in doc.select(&sel) {
        let text = element_text(&element);
        if !text.is_empty() && text.contains(needle) {
            return Some(text);
        }
    }
    None
}

/// A scanned paragraph carrying `N% Funded` belongs to the funded field,
/// anything else to the sales field.
pub fn is_funded_text(text: &str) -> bool {
    Regex::new(FUNDED_PATTERN)
        .map(|re| re.is_match(text))
        .unwrap_or(false)
}

fn element_text(element: &ElementRef<'_>) -> String {
    element
        .text()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

//! Amount parsing, label lookup and URL helpers shared by the extractors.

use crate::error::{Result, ScanError};
use regex::Regex;
use rust_decimal::Decimal;
use std::str::FromStr;
use std::sync::LazyLock;
use url::Url;

/// Characters scanned on each side of a match when looking for a label.
pub const DEFAULT_LABEL_WINDOW: usize = 240;

/// Attributes consulted for a label, highest priority first.
pub const DEFAULT_LABEL_ATTRIBUTES: [&str; 4] = ["id", "name", "aria-label", "class"];

static DEFAULT_LABELS: LazyLock<LabelHeuristics> = LazyLock::new(LabelHeuristics::default);

/// Parse a locale-formatted amount such as `1,234.56` or `1.234,56`.
///
/// Whichever of `,` and `.` appears last is the decimal separator. Every
/// other non-digit character is dropped as grouping noise.
pub fn parse_amount(text: &str) -> Result<Decimal> {
    let text = text.trim();

    let decimal_sep = match (text.rfind(','), text.rfind('.')) {
        (Some(comma), Some(dot)) if comma > dot => ',',
        (Some(_), None) => ',',
        _ => '.',
    };

    let mut normalized = String::with_capacity(text.len());
    for ch in text.chars() {
        if ch.is_ascii_digit() {
            normalized.push(ch);
        } else if ch == decimal_sep {
            normalized.push('.');
        }
    }

    if !normalized.chars().any(|c| c.is_ascii_digit()) {
        return Err(ScanError::ParseError(format!("no digits in '{}'", text)));
    }
    if normalized.matches('.').count() > 1 {
        return Err(ScanError::ParseError(format!(
            "more than one decimal separator in '{}'",
            text
        )));
    }

    // Decimal::from_str wants digits on both sides of the point
    if normalized.starts_with('.') {
        normalized.insert(0, '0');
    }
    if normalized.ends_with('.') {
        normalized.pop();
    }

    Decimal::from_str(&normalized)
        .map_err(|e| ScanError::ParseError(format!("'{}': {}", text, e)))
}

/// Look for a human label (id, name, aria-label or class) near `index`.
pub fn find_nearby_label(html: &str, index: usize) -> Option<String> {
    DEFAULT_LABELS.find(html, index)
}

/// Tunable label lookup: window width and attribute priority.
#[derive(Debug, Clone)]
pub struct LabelHeuristics {
    window: usize,
    patterns: Vec<Regex>,
}

impl LabelHeuristics {
    pub fn new(window: usize, attributes: &[&str]) -> Self {
        let patterns = attributes
            .iter()
            .map(|attr| {
                let pattern = format!(
                    r#"(?i)\b{}\s*=\s*["'](?P<v>[^"']+)["']"#,
                    regex::escape(attr)
                );
                Regex::new(&pattern).expect("escaped attribute pattern is valid")
            })
            .collect();

        Self { window, patterns }
    }

    pub fn window(&self) -> usize {
        self.window
    }

    pub fn find(&self, html: &str, index: usize) -> Option<String> {
        let slice = window_around(html, index, self.window);

        self.patterns.iter().find_map(|pattern| {
            pattern
                .captures(slice)
                .and_then(|caps| caps.name("v"))
                .map(|v| v.as_str().trim())
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        })
    }
}

impl Default for LabelHeuristics {
    fn default() -> Self {
        Self::new(DEFAULT_LABEL_WINDOW, &DEFAULT_LABEL_ATTRIBUTES)
    }
}

/// Slice of `html` spanning `width` characters each side of `index`.
fn window_around(html: &str, index: usize, width: usize) -> &str {
    let mut index = index.min(html.len());
    while !html.is_char_boundary(index) {
        index -= 1;
    }

    let start = html[..index]
        .char_indices()
        .rev()
        .take(width)
        .last()
        .map_or(index, |(i, _)| i);
    let end = html[index..]
        .char_indices()
        .nth(width)
        .map_or(html.len(), |(i, _)| index + i);

    &html[start..end]
}

/// Currency symbol contained in `token`, or an empty string.
pub fn infer_currency_symbol(token: &str) -> &'static str {
    if token.contains('$') {
        "$"
    } else if token.contains('€') {
        "€"
    } else if token.contains('£') {
        "£"
    } else {
        ""
    }
}

fn has_http_prefix(input: &str) -> bool {
    let lower = input
        .get(..8)
        .unwrap_or(input)
        .to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

/// Turn `input` into an absolute URL.
///
/// Input already carrying an `http(s)://` prefix is parsed as is. Without
/// a base, a bare host such as `example.com` is given an `https://` prefix.
/// With a base, prefix-less input is a reference relative to that base, and
/// the prefixed parse is only the fallback.
pub fn make_absolute(input: &str, base: Option<&Url>) -> Result<Url> {
    let input = input.trim();
    if input.is_empty() {
        return Err(ScanError::InvalidUrl("empty URL".to_string()));
    }

    if has_http_prefix(input) {
        return Url::parse(input)
            .or_else(|e| match base {
                Some(base) => base.join(input),
                None => Err(e),
            })
            .map_err(|e| ScanError::InvalidUrl(format!("{}: {}", input, e)));
    }

    if let Some(base) = base
        && let Ok(resolved) = base.join(input)
    {
        return Ok(resolved);
    }

    Url::parse(&format!("https://{}", input))
        .map_err(|e| ScanError::InvalidUrl(format!("{}: {}", input, e)))
}

/// Case-insensitive exact host comparison. Subdomains do not match.
pub fn hosts_equal(url: &Url, host: &str) -> bool {
    url.host_str()
        .is_some_and(|h| h.eq_ignore_ascii_case(host))
}

//! Declarative per-field parsing.
//!
//! Every strategy extracts fields through `Field` tables: an ordered list
//! of fallback selectors, an optional attribute, and a default-on-miss
//! value. A missing field degrades to its default instead of aborting the
//! unit; adding a source means adding tables, not new control flow.

use scraper::{ElementRef, Html, Selector};

/// One field's extraction rules.
#[derive(Debug, Clone, Copy)]
pub struct Field {
    /// Ordered fallback selectors; the first that matches wins.
    pub selectors: &'static [&'static str],
    /// Read this attribute instead of the text content.
    pub attr: Option<&'static str>,
    /// Value used when no selector matches. `None` means the field is
    /// genuinely optional.
    pub default: Option<&'static str>,
}

impl Field {
    /// Extract from an element scope, applying the default on miss.
    pub fn extract(&self, scope: &ElementRef) -> Option<String> {
        for raw in self.selectors {
            let Ok(selector) = Selector::parse(raw) else {
                continue;
            };
            if let Some(el) = scope.select(&selector).next() {
                let value = match self.attr {
                    Some(attr) => el.value().attr(attr).map(|v| v.to_string()),
                    None => Some(collapse_whitespace(&el.text().collect::<String>())),
                };
                match value {
                    Some(v) if !v.is_empty() => return Some(v),
                    _ => {}
                }
            }
        }
        self.default.map(|d| d.to_string())
    }

    /// Extract every match of the first selector that matches anything.
    pub fn extract_all(&self, scope: &ElementRef) -> Vec<String> {
        for raw in self.selectors {
            let Ok(selector) = Selector::parse(raw) else {
                continue;
            };
            let values: Vec<String> = scope
                .select(&selector)
                .map(|el| match self.attr {
                    Some(attr) => el.value().attr(attr).unwrap_or_default().to_string(),
                    None => collapse_whitespace(&el.text().collect::<String>()),
                })
                .filter(|v| !v.is_empty())
                .collect();
            if !values.is_empty() {
                return values;
            }
        }
        Vec::new()
    }
}

/// Select the unit containers for a document: the first selector candidate
/// with at least one match wins.
pub fn select_containers<'a>(
    document: &'a Html,
    selectors: &[&str],
) -> Vec<ElementRef<'a>> {
    for raw in selectors {
        let Ok(selector) = Selector::parse(raw) else {
            continue;
        };
        let matches: Vec<ElementRef> = document.select(&selector).collect();
        if !matches.is_empty() {
            return matches;
        }
    }
    Vec::new()
}

/// Parse loose human-formatted counts: "1.2k" -> 1200, "3 comments" -> 3,
/// "•" or missing digits -> 0.
pub fn parse_count(raw: &str) -> i64 {
    let trimmed = raw.trim().to_lowercase();

    let (multiplier, digits) = if let Some(stripped) = trimmed.strip_suffix('k') {
        (1_000.0, stripped.to_string())
    } else if let Some(stripped) = trimmed.strip_suffix('m') {
        (1_000_000.0, stripped.to_string())
    } else {
        (1.0, trimmed)
    };

    let numeric: String = digits
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();

    numeric
        .parse::<f64>()
        .map(|n| (n * multiplier) as i64)
        .unwrap_or(0)
}

/// Collapse runs of whitespace into single spaces and trim.
pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Resolve a path to a full URL, handling both absolute and relative paths.
pub fn resolve_url(base_url: &str, path: &str) -> String {
    if path.starts_with("http://") || path.starts_with("https://") {
        path.to_string()
    } else {
        match url::Url::parse(base_url).and_then(|base| base.join(path)) {
            Ok(joined) => joined.to_string(),
            Err(_) => format!("{}{}", base_url.trim_end_matches('/'), path),
        }
    }
}

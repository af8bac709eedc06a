//! Discovery feed extraction.
//!
//! One rendered page is swept for three link shapes (videos, profiles,
//! categories). The same item routinely appears in more than one rail, so
//! results are de-duplicated on `(kind, name)` with the first occurrence
//! kept.

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use scraper::Html;
use tracing::warn;

use crate::browser::PageSession;
use crate::error::ExtractError;
use crate::models::{DiscoveryItem, DiscoveryKind, JobParameters, JobType, SourceUnit};
use crate::progress::ProgressSink;

use super::fields::{collapse_whitespace, resolve_url, select_containers};
use super::navigate::{resolve_context, SuccessPredicate};
use super::{ExtractOptions, Extraction, ExtractionStrategy};

const DEFAULT_CANDIDATES: &[&str] = &[
    "https://www.tiktok.com/discover",
    "https://www.tiktok.com/explore",
];

const PREDICATE: SuccessPredicate = SuccessPredicate {
    markers: &[
        "a[href*='/video/']",
        "a[href^='/@']",
        "a[href*='/tag/']",
        "[data-e2e='recommend-list-item-container']",
    ],
    title_keyword: "tiktok",
};

/// Link shapes swept from the rendered page, in extraction order.
const SWEEPS: &[(DiscoveryKind, &[&str])] = &[
    (
        DiscoveryKind::Video,
        &["a[href*='/video/']", "div[data-e2e='recommend-list-item-container'] a"],
    ),
    (DiscoveryKind::Profile, &["a[href^='/@']", "a[href*='tiktok.com/@']"]),
    (DiscoveryKind::Category, &["a[href*='/tag/']", "a[href*='/discover/']"]),
];

pub struct DiscoveryStrategy {
    options: ExtractOptions,
}

impl DiscoveryStrategy {
    pub fn new(options: ExtractOptions) -> Self {
        Self { options }
    }

    fn candidates(parameters: &JobParameters) -> Vec<String> {
        match &parameters.url {
            Some(url) => vec![url.clone()],
            None => DEFAULT_CANDIDATES.iter().map(|s| s.to_string()).collect(),
        }
    }
}

#[async_trait]
impl ExtractionStrategy for DiscoveryStrategy {
    fn job_type(&self) -> JobType {
        JobType::Discovery
    }

    fn source(&self) -> &'static str {
        "discovery"
    }

    async fn execute(
        &self,
        session: &dyn PageSession,
        parameters: &JobParameters,
        progress: &dyn ProgressSink,
    ) -> Result<Extraction, ExtractError> {
        let candidates = Self::candidates(parameters);
        let attempt_timeout = Duration::from_secs(self.options.nav_timeout_secs);

        let context = resolve_context(session, &candidates, &PREDICATE, attempt_timeout).await?;
        progress.report(50);

        let items = parse_primary(&context.html, &context.url, parameters.max_items);
        let (items, degraded) = if items.is_empty() {
            // Predicate passed on the title alone; sweep found nothing.
            warn!("Discovery sweeps matched nothing, trying coarse anchors");
            let coarse = parse_fallback(&context.html, &context.url, parameters.max_items);
            if coarse.is_empty() {
                return Err(ExtractError::Batch(
                    "discovery sweeps matched no items".into(),
                ));
            }
            (coarse, true)
        } else {
            (items, false)
        };

        progress.report(75);

        Ok(Extraction {
            units: items.into_iter().map(SourceUnit::Discovery).collect(),
            context_url: context.url,
            degraded,
        })
    }
}

/// Sweep the page for each link shape, de-duplicating on `(kind, name)`.
fn parse_primary(html: &str, base_url: &str, max_items: usize) -> Vec<DiscoveryItem> {
    let document = Html::parse_document(html);
    let mut seen: HashSet<(DiscoveryKind, String)> = HashSet::new();
    let mut items = Vec::new();

    for (kind, selectors) in SWEEPS {
        for el in select_containers(&document, selectors) {
            if items.len() >= max_items {
                return items;
            }

            let href = el.value().attr("href").unwrap_or_default();
            if href.is_empty() {
                continue;
            }

            let text = collapse_whitespace(&el.text().collect::<String>());
            let name = if text.is_empty() {
                name_from_href(href)
            } else {
                text.clone()
            };
            if name.is_empty() {
                continue;
            }

            let item = DiscoveryItem {
                kind: *kind,
                name,
                url: resolve_url(base_url, href),
                text: if text.is_empty() { None } else { Some(text) },
                scraped_at: Utc::now(),
            };

            if seen.insert(item.dedup_key()) {
                items.push(item);
            }
        }
    }

    items
}

/// Coarse parse: every anchor with visible text becomes a category item.
fn parse_fallback(html: &str, base_url: &str, max_items: usize) -> Vec<DiscoveryItem> {
    let document = Html::parse_document(html);
    let mut seen: HashSet<(DiscoveryKind, String)> = HashSet::new();

    select_containers(&document, &["a[href]"])
        .into_iter()
        .filter_map(|el| {
            let name = collapse_whitespace(&el.text().collect::<String>());
            if name.is_empty() {
                return None;
            }
            let item = DiscoveryItem {
                kind: DiscoveryKind::Category,
                name,
                url: resolve_url(base_url, el.value().attr("href").unwrap_or_default()),
                text: None,
                scraped_at: Utc::now(),
            };
            seen.insert(item.dedup_key()).then_some(item)
        })
        .take(max_items)
        .collect()
}

/// Derive a display name from the last meaningful path segment.
fn name_from_href(href: &str) -> String {
    href.trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or_default()
        .trim_start_matches('@')
        .replace(['-', '_'], " ")
}

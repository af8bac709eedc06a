//! Quote listing extraction.
//!
//! Paginates across an incrementing page index up to the job's page bound,
//! stopping early when a page yields nothing. The plain-HTTP mirror is
//! tried before the canonical TLS host because it serves the older,
//! scraper-friendlier markup.

use std::time::Duration;

use async_trait::async_trait;
use scraper::Html;
use tracing::{debug, warn};

use crate::browser::PageSession;
use crate::error::ExtractError;
use crate::models::{JobParameters, JobType, Quote, SourceUnit};
use crate::progress::ProgressSink;

use super::fields::{select_containers, Field};
use super::navigate::{resolve_context, SuccessPredicate};
use super::{ExtractOptions, Extraction, ExtractionStrategy};

const DEFAULT_MIRRORS: &[&str] = &["http://quotes.toscrape.com", "https://quotes.toscrape.com"];

const PREDICATE: SuccessPredicate = SuccessPredicate {
    markers: &["div.quote", "div.col-md-8"],
    title_keyword: "quotes",
};

const QUOTE_CONTAINERS: &[&str] = &["div.quote", ".quote"];

/// Wrapper that is present even on an empty trailing page; its absence
/// means the markup shape changed wholesale.
const PAGE_SKELETON: &[&str] = &["div.col-md-8", "div.quotes", "#quotesContainer"];

const TEXT: Field = Field {
    selectors: &["span.text", ".text"],
    attr: None,
    default: None,
};

const AUTHOR: Field = Field {
    selectors: &["small.author", ".author"],
    attr: None,
    default: Some("Unknown"),
};

const TAGS: Field = Field {
    selectors: &["div.tags a.tag", "a.tag"],
    attr: None,
    default: None,
};

pub struct QuotesStrategy {
    options: ExtractOptions,
}

impl QuotesStrategy {
    pub fn new(options: ExtractOptions) -> Self {
        Self { options }
    }

    fn bases(parameters: &JobParameters) -> Vec<String> {
        match &parameters.url {
            Some(url) => vec![url.trim_end_matches('/').to_string()],
            None => DEFAULT_MIRRORS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

#[async_trait]
impl ExtractionStrategy for QuotesStrategy {
    fn job_type(&self) -> JobType {
        JobType::Quotes
    }

    fn source(&self) -> &'static str {
        "quotes"
    }

    async fn execute(
        &self,
        session: &dyn PageSession,
        parameters: &JobParameters,
        progress: &dyn ProgressSink,
    ) -> Result<Extraction, ExtractError> {
        let bases = Self::bases(parameters);
        let attempt_timeout = Duration::from_secs(self.options.nav_timeout_secs);
        let max_pages = parameters.max_pages.max(1);

        let mut units: Vec<SourceUnit> = Vec::new();
        let mut context_url = String::new();
        let mut degraded = false;

        for page in 1..=max_pages {
            let candidates: Vec<String> = bases
                .iter()
                .map(|base| format!("{base}/page/{page}/"))
                .collect();

            let context =
                resolve_context(session, &candidates, &PREDICATE, attempt_timeout).await?;
            if page == 1 {
                context_url = context.url.clone();
                progress.report(30);
            }

            let quotes = match parse_primary(&context.html, parameters.max_items) {
                Ok(quotes) => quotes,
                Err(primary_err) => {
                    warn!("Primary quote extraction failed: {}", primary_err);
                    let coarse = parse_fallback(&context.html, parameters.max_items);
                    if coarse.is_empty() {
                        return Err(primary_err);
                    }
                    degraded = true;
                    coarse
                }
            };

            if quotes.is_empty() {
                // An empty page means the listing ran out, not an error.
                debug!("Page {} yielded no quotes, stopping pagination", page);
                break;
            }

            units.extend(quotes.into_iter().map(SourceUnit::Quotes));

            if page < max_pages {
                tokio::time::sleep(Duration::from_millis(self.options.page_delay_ms)).await;
            }
        }

        progress.report(75);
        Ok(Extraction {
            units,
            context_url,
            degraded,
        })
    }
}

/// Structural parse bounded to `max_items` quotes.
///
/// A unit missing its text is skipped and the batch continues; a page
/// missing the listing skeleton entirely is a batch-level failure.
fn parse_primary(html: &str, max_items: usize) -> Result<Vec<Quote>, ExtractError> {
    let document = Html::parse_document(html);
    let containers = select_containers(&document, QUOTE_CONTAINERS);

    if containers.is_empty() {
        if select_containers(&document, PAGE_SKELETON).is_empty() {
            return Err(ExtractError::Batch(
                "quote containers missing from page structure".into(),
            ));
        }
        return Ok(Vec::new());
    }

    let mut quotes = Vec::new();
    for container in containers {
        if quotes.len() >= max_items {
            break;
        }
        let Some(text) = TEXT.extract(&container) else {
            warn!("Skipping quote with no text");
            continue;
        };
        let author = AUTHOR.extract(&container).unwrap_or_else(|| "Unknown".into());
        quotes.push(Quote {
            text: strip_surrounding_quotes(&text),
            author,
            tags: TAGS.extract_all(&container),
        });
    }

    Ok(quotes)
}

/// Coarse parse: bare quotation elements, attribution unknown.
fn parse_fallback(html: &str, max_items: usize) -> Vec<Quote> {
    let document = Html::parse_document(html);

    select_containers(&document, &["blockquote", "q"])
        .into_iter()
        .take(max_items)
        .filter_map(|el| {
            let text = el.text().collect::<String>();
            let text = strip_surrounding_quotes(text.trim());
            if text.is_empty() {
                None
            } else {
                Some(Quote {
                    text,
                    author: "Unknown".into(),
                    tags: Vec::new(),
                })
            }
        })
        .collect()
}

fn strip_surrounding_quotes(text: &str) -> String {
    text.trim()
        .trim_matches(|c| c == '\u{201c}' || c == '\u{201d}' || c == '"')
        .to_string()
}

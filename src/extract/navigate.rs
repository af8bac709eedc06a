//! Candidate ladder navigation.
//!
//! Target sites serve different markup to different client fingerprints and
//! fail non-deterministically, so a single fixed URL is too brittle. Each
//! strategy supplies an ordered list of candidate URLs for the same logical
//! target (scraper-friendlier mirror first) and a success predicate; the
//! first candidate whose rendered page satisfies the predicate wins.

use std::time::Duration;

use scraper::{Html, Selector};
use tracing::{debug, warn};

use crate::browser::PageSession;
use crate::error::ExtractError;

/// Confirms a loaded page actually contains expected content structure:
/// a short-circuit OR over structural markers, or the page title carrying
/// an expected keyword.
#[derive(Debug, Clone, Copy)]
pub struct SuccessPredicate {
    /// CSS selectors; any single match passes.
    pub markers: &'static [&'static str],
    /// Case-insensitive substring of `<title>`.
    pub title_keyword: &'static str,
}

impl SuccessPredicate {
    pub fn matches(&self, document: &Html) -> bool {
        for marker in self.markers {
            if let Ok(selector) = Selector::parse(marker) {
                if document.select(&selector).next().is_some() {
                    return true;
                }
            }
        }

        if let Ok(title) = Selector::parse("title") {
            if let Some(el) = document.select(&title).next() {
                let text = el.text().collect::<String>().to_lowercase();
                if text.contains(&self.title_keyword.to_lowercase()) {
                    return true;
                }
            }
        }

        false
    }
}

/// A candidate that passed its success predicate.
#[derive(Debug, Clone)]
pub struct ResolvedContext {
    /// Candidate URL that was requested.
    pub url: String,
    /// URL after redirects.
    pub final_url: String,
    /// Captured rendered markup.
    pub html: String,
}

/// Walk the candidate ladder until one page passes the predicate.
///
/// Every attempt is individually time-bounded; a timeout or fetch error
/// advances the ladder. Candidates after the first success are never
/// attempted. When the ladder is exhausted the last underlying error is
/// carried in the returned `NavigationExhausted`.
pub async fn resolve_context(
    session: &dyn PageSession,
    candidates: &[String],
    predicate: &SuccessPredicate,
    attempt_timeout: Duration,
) -> Result<ResolvedContext, ExtractError> {
    let mut last_error = String::from("no candidate URLs configured");
    let mut attempts = 0;

    for candidate in candidates {
        attempts += 1;
        debug!("Trying candidate {}/{}: {}", attempts, candidates.len(), candidate);

        let page = match tokio::time::timeout(attempt_timeout, session.fetch(candidate)).await {
            Err(_) => {
                warn!("Candidate timed out: {}", candidate);
                last_error = format!("{candidate}: navigation attempt timed out");
                continue;
            }
            Ok(Err(e)) => {
                warn!("Candidate failed: {}: {}", candidate, e);
                last_error = format!("{candidate}: {e}");
                continue;
            }
            Ok(Ok(page)) => page,
        };

        let passed = {
            let document = Html::parse_document(&page.html);
            predicate.matches(&document)
        };

        if passed {
            debug!("Candidate resolved: {}", candidate);
            return Ok(ResolvedContext {
                url: candidate.clone(),
                final_url: page.final_url,
                html: page.html,
            });
        }

        last_error = format!("{candidate}: success predicate not satisfied");
    }

    Err(ExtractError::NavigationExhausted {
        attempts,
        last_error,
    })
}

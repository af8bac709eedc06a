//! Discussion board post extraction.
//!
//! The legacy listing host is tried before the canonical one: it serves
//! server-rendered markup with stable class names, while the canonical
//! host serves a script-heavy shell that frequently changes. When even the
//! legacy selectors match nothing, a coarse titles-only fallback keeps the
//! job from failing outright.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use scraper::Html;
use tracing::warn;

use crate::browser::PageSession;
use crate::error::ExtractError;
use crate::models::{DiscussionPost, JobParameters, JobType, PostType, SourceUnit};
use crate::progress::ProgressSink;

use super::fields::{parse_count, resolve_url, select_containers, Field};
use super::navigate::{resolve_context, SuccessPredicate};
use super::{ExtractOptions, Extraction, ExtractionStrategy};

const DEFAULT_CANDIDATES: &[&str] = &[
    "https://old.reddit.com/r/popular/",
    "https://www.reddit.com/r/popular/",
];

const PREDICATE: SuccessPredicate = SuccessPredicate {
    markers: &["#siteTable", "div.thing", "shreddit-post"],
    title_keyword: "reddit",
};

const POST_CONTAINERS: &[&str] = &["#siteTable div.thing", "div.thing"];

const TITLE: Field = Field {
    selectors: &["a.title", "p.title a"],
    attr: None,
    default: None,
};

const TITLE_HREF: Field = Field {
    selectors: &["a.title", "p.title a"],
    attr: Some("href"),
    default: None,
};

const AUTHOR: Field = Field {
    selectors: &["a.author"],
    attr: None,
    default: Some("[deleted]"),
};

const SUBREDDIT: Field = Field {
    selectors: &["a.subreddit"],
    attr: None,
    default: None,
};

const SCORE: Field = Field {
    selectors: &["div.score.unvoted", "div.score"],
    attr: None,
    default: Some("0"),
};

const COMMENTS: Field = Field {
    selectors: &["a.comments"],
    attr: None,
    default: Some("0"),
};

const CREATED: Field = Field {
    selectors: &["time"],
    attr: Some("datetime"),
    default: None,
};

const SELF_TEXT: Field = Field {
    selectors: &["div.usertext-body", ".md"],
    attr: None,
    default: None,
};

const FALLBACK_TITLES: &[&str] = &["a.title", "p.title a", "h3", "h2"];

pub struct DiscussionStrategy {
    options: ExtractOptions,
}

impl DiscussionStrategy {
    pub fn new(options: ExtractOptions) -> Self {
        Self { options }
    }

    /// Candidate ladder for one logical listing target. A canonical-host
    /// URL gains a legacy-host variant ahead of it; anything else is used
    /// as-is.
    fn candidates(parameters: &JobParameters) -> Vec<String> {
        match &parameters.url {
            Some(url) if url.contains("www.reddit.com") => {
                vec![url.replace("www.reddit.com", "old.reddit.com"), url.clone()]
            }
            Some(url) if url.contains("old.reddit.com") => {
                vec![url.clone(), url.replace("old.reddit.com", "www.reddit.com")]
            }
            Some(url) => vec![url.clone()],
            None => DEFAULT_CANDIDATES.iter().map(|s| s.to_string()).collect(),
        }
    }
}

#[async_trait]
impl ExtractionStrategy for DiscussionStrategy {
    fn job_type(&self) -> JobType {
        JobType::Discussion
    }

    fn source(&self) -> &'static str {
        "discussion"
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
        progress.report(40);

        let (posts, degraded) = match parse_primary(&context.html, &context.url, parameters.max_items)
        {
            Ok(posts) => (posts, false),
            Err(primary_err) => {
                warn!("Primary post extraction failed: {}", primary_err);
                let coarse = parse_fallback(&context.html, &context.url, parameters.max_items);
                if coarse.is_empty() {
                    return Err(primary_err);
                }
                (coarse, true)
            }
        };

        progress.report(if degraded { 80 } else { 75 });

        Ok(Extraction {
            units: posts.into_iter().map(SourceUnit::Discussion).collect(),
            context_url: context.url,
            degraded,
        })
    }
}

/// Structural parse of listing rows, bounded to `max_items`.
///
/// Zero matching containers is a batch-level failure (the host served a
/// markup shape we do not know); a malformed row is skipped and the batch
/// continues.
fn parse_primary(
    html: &str,
    base_url: &str,
    max_items: usize,
) -> Result<Vec<DiscussionPost>, ExtractError> {
    let document = Html::parse_document(html);
    let containers = select_containers(&document, POST_CONTAINERS);

    if containers.is_empty() {
        return Err(ExtractError::Batch(
            "post containers matched no elements".into(),
        ));
    }

    let mut posts = Vec::new();
    for (index, container) in containers.into_iter().enumerate() {
        if posts.len() >= max_items {
            break;
        }

        let Some(title) = TITLE.extract(&container) else {
            warn!("Skipping post row {} with no title", index);
            continue;
        };

        let id = container
            .value()
            .attr("data-fullname")
            .map(|v| v.to_string())
            .unwrap_or_else(|| format!("row-{index}"));

        let subreddit = container
            .value()
            .attr("data-subreddit")
            .map(|v| v.to_string())
            .or_else(|| {
                SUBREDDIT
                    .extract(&container)
                    .map(|s| s.trim_start_matches("r/").to_string())
            })
            .unwrap_or_else(|| "unknown".into());

        let permalink = container
            .value()
            .attr("data-permalink")
            .map(|v| v.to_string())
            .or_else(|| TITLE_HREF.extract(&container));
        let url = permalink
            .as_deref()
            .map(|p| resolve_url(base_url, p))
            .unwrap_or_else(|| base_url.to_string());

        // External target, when the row links off-site.
        let link_url = container
            .value()
            .attr("data-url")
            .map(|v| v.to_string())
            .or_else(|| TITLE_HREF.extract(&container))
            .filter(|href| href.starts_with("http") && !href.contains("/comments/"));

        let created_at = CREATED
            .extract(&container)
            .and_then(|raw| DateTime::parse_from_rfc3339(&raw).ok())
            .map(|dt| dt.with_timezone(&Utc));

        posts.push(DiscussionPost {
            id,
            title,
            author: AUTHOR.extract(&container).unwrap_or_else(|| "[deleted]".into()),
            subreddit,
            upvotes: SCORE.extract(&container).map(|s| parse_count(&s)).unwrap_or(0),
            comments: COMMENTS
                .extract(&container)
                .map(|s| parse_count(&s))
                .unwrap_or(0),
            created_at,
            url,
            post_type: PostType::classify(link_url.as_deref()),
            content: SELF_TEXT.extract(&container),
            link_url,
        });
    }

    Ok(posts)
}

/// Coarse parse: whatever post titles the page still exposes, with
/// synthesized identifiers and zeroed numeric fields.
fn parse_fallback(html: &str, base_url: &str, max_items: usize) -> Vec<DiscussionPost> {
    let document = Html::parse_document(html);

    select_containers(&document, FALLBACK_TITLES)
        .into_iter()
        .take(max_items)
        .enumerate()
        .filter_map(|(index, el)| {
            let title = el.text().collect::<String>().trim().to_string();
            if title.is_empty() {
                return None;
            }
            Some(DiscussionPost {
                id: format!("fallback-{index}"),
                title,
                author: "[unknown]".into(),
                subreddit: "unknown".into(),
                upvotes: 0,
                comments: 0,
                created_at: None,
                url: base_url.to_string(),
                post_type: PostType::Text,
                content: None,
                link_url: None,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn listing_page() -> String {
        r##"<html><head><title>reddit: the front page</title></head><body>
        <div id="siteTable">
            <div class="thing" data-fullname="t3_abc" data-subreddit="rust" data-permalink="/r/rust/comments/abc/first/" data-url="https://blog.example/post">
                <p class="title"><a class="title" href="https://blog.example/post">Borrow checker tricks</a></p>
                <a class="author">alice</a>
                <div class="score unvoted">1.2k</div>
                <a class="comments">342 comments</a>
                <time datetime="2026-02-11T08:30:00+00:00">5h</time>
            </div>
            <div class="thing" data-fullname="t3_def" data-subreddit="rust" data-permalink="/r/rust/comments/def/second/">
                <p class="title"><a class="title" href="/r/rust/comments/def/second/">Self post here</a></p>
                <a class="author">bob</a>
                <div class="score unvoted">•</div>
                <a class="comments">comment</a>
                <div class="usertext-body">Body of the self post.</div>
            </div>
        </div>
        </body></html>"##
            .to_string()
    }

    #[test]
    fn test_parse_primary_full_rows() {
        let posts = parse_primary(&listing_page(), "https://old.reddit.com/r/rust/", 25).unwrap();
        assert_eq!(posts.len(), 2);

        let first = &posts[0];
        assert_eq!(first.id, "t3_abc");
        assert_eq!(first.title, "Borrow checker tricks");
        assert_eq!(first.author, "alice");
        assert_eq!(first.subreddit, "rust");
        assert_eq!(first.upvotes, 1200);
        assert_eq!(first.comments, 342);
        assert_eq!(first.post_type, PostType::Link);
        assert!(first.created_at.is_some());
        assert!(first.url.ends_with("/r/rust/comments/abc/first/"));

        let second = &posts[1];
        assert_eq!(second.post_type, PostType::Text);
        assert_eq!(second.upvotes, 0);
        assert_eq!(second.content.as_deref(), Some("Body of the self post."));
    }

    #[test]
    fn test_zero_containers_is_batch_error() {
        let html = "<html><body><main>app shell</main></body></html>";
        assert!(matches!(
            parse_primary(html, "https://www.reddit.com/", 25),
            Err(ExtractError::Batch(_))
        ));
    }

    #[test]
    fn test_row_without_title_is_skipped() {
        let html = r#"<html><body><div id="siteTable">
            <div class="thing" data-fullname="t3_x"><a class="author">ghost</a></div>
            <div class="thing" data-fullname="t3_y"><a class="title" href="/r/a/comments/y/ok/">Survivor</a></div>
        </div></body></html>"#;
        let posts = parse_primary(html, "https://old.reddit.com/", 25).unwrap();
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].title, "Survivor");
    }

    #[test]
    fn test_fallback_returns_titles_only() {
        let html = r#"<html><body>
            <h3>Title one</h3>
            <h3>Title two</h3>
            <h3>Title three</h3>
        </body></html>"#;
        let posts = parse_fallback(html, "https://www.reddit.com/r/rust/", 25);
        assert_eq!(posts.len(), 3);
        assert_eq!(posts[0].id, "fallback-0");
        assert_eq!(posts[0].upvotes, 0);
        assert_eq!(posts[1].title, "Title two");
    }

    #[test]
    fn test_candidates_put_legacy_host_first() {
        let params = JobParameters {
            url: Some("https://www.reddit.com/r/rust/".into()),
            ..Default::default()
        };
        let candidates = DiscussionStrategy::candidates(&params);
        assert_eq!(candidates[0], "https://old.reddit.com/r/rust/");
        assert_eq!(candidates[1], "https://www.reddit.com/r/rust/");
    }

    #[test]
    fn test_max_items_bound() {
        let posts = parse_primary(&listing_page(), "https://old.reddit.com/", 1).unwrap();
        assert_eq!(posts.len(), 1);
    }
}

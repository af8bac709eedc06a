//! Source-specific extracted units, prior to normalization.
//!
//! Each strategy owns one unit shape and converts it to the common
//! `ExtractedRecord` at the normalization boundary. The union is tagged by
//! `source`, so loosely-shaped payloads are validated per-tag before storage.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::record::ExtractedRecord;

/// A unit failed validation at the normalization boundary.
#[derive(Debug, Error)]
#[error("invalid unit: {0}")]
pub struct InvalidUnit(pub String);

/// A single quotation with attribution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Quote {
    pub text: String,
    pub author: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Rendering style of a discussion post.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PostType {
    Text,
    Link,
    Image,
    Video,
}

impl PostType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Link => "link",
            Self::Image => "image",
            Self::Video => "video",
        }
    }

    /// Classify a post from its target URL. Self-posts have no external
    /// link; media links are recognized by extension or host.
    pub fn classify(link_url: Option<&str>) -> Self {
        let Some(url) = link_url else {
            return Self::Text;
        };
        let lower = url.to_lowercase();
        if lower.ends_with(".jpg")
            || lower.ends_with(".jpeg")
            || lower.ends_with(".png")
            || lower.ends_with(".gif")
        {
            Self::Image
        } else if lower.contains("v.redd.it")
            || lower.contains("youtube.com")
            || lower.contains("youtu.be")
            || lower.ends_with(".mp4")
        {
            Self::Video
        } else {
            Self::Link
        }
    }
}

/// One discussion board post.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscussionPost {
    /// Site-assigned post identifier. Fallback extraction synthesizes one.
    pub id: String,
    pub title: String,
    pub author: String,
    pub subreddit: String,
    pub upvotes: i64,
    pub comments: i64,
    pub created_at: Option<DateTime<Utc>>,
    pub url: String,
    pub post_type: PostType,
    /// Self-post body, when present.
    #[serde(default)]
    pub content: Option<String>,
    /// External target for link posts.
    #[serde(default)]
    pub link_url: Option<String>,
}

/// Kind of a discovery item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscoveryKind {
    Video,
    Profile,
    Category,
}

impl DiscoveryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Video => "video",
            Self::Profile => "profile",
            Self::Category => "category",
        }
    }
}

/// One item surfaced from a discovery sweep.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryItem {
    pub kind: DiscoveryKind,
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub text: Option<String>,
    pub scraped_at: DateTime<Utc>,
}

impl DiscoveryItem {
    /// De-duplication key: first occurrence of a `(kind, name)` pair wins.
    pub fn dedup_key(&self) -> (DiscoveryKind, String) {
        (self.kind, self.name.clone())
    }
}

/// Tagged union over all source unit shapes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum SourceUnit {
    Quotes(Quote),
    Discussion(DiscussionPost),
    Discovery(DiscoveryItem),
}

impl SourceUnit {
    /// Source tag, matching the producing strategy.
    pub fn source(&self) -> &'static str {
        match self {
            Self::Quotes(_) => "quotes",
            Self::Discussion(_) => "discussion",
            Self::Discovery(_) => "discovery",
        }
    }

    /// Sub-type label used for result summary counts.
    pub fn sub_type(&self) -> &'static str {
        match self {
            Self::Quotes(_) => "quote",
            Self::Discussion(post) => post.post_type.as_str(),
            Self::Discovery(item) => item.kind.as_str(),
        }
    }

    /// Short label for a representative item in summaries.
    pub fn label(&self) -> String {
        match self {
            Self::Quotes(q) => q.author.clone(),
            Self::Discussion(p) => p.title.clone(),
            Self::Discovery(i) => i.name.clone(),
        }
    }

    /// Score used to pick the representative "top" item. Only discussion
    /// posts carry a meaningful ranking signal.
    pub fn score(&self) -> i64 {
        match self {
            Self::Discussion(post) => post.upvotes,
            _ => 0,
        }
    }

    /// Validate and convert to the common persisted shape.
    pub fn normalize(&self, source_url: &str) -> Result<ExtractedRecord, InvalidUnit> {
        let raw_payload = serde_json::to_string(self)
            .map_err(|e| InvalidUnit(format!("unserializable payload: {e}")))?;

        match self {
            Self::Quotes(quote) => {
                if quote.text.trim().is_empty() {
                    return Err(InvalidUnit("quote with empty text".into()));
                }
                Ok(ExtractedRecord::new(
                    self.source(),
                    source_url,
                    Some(quote.author.clone()),
                    format!("\"{}\"\n- {}", quote.text.trim(), quote.author),
                    raw_payload,
                    serde_json::json!({
                        "author": quote.author,
                        "tags": quote.tags,
                    }),
                ))
            }
            Self::Discussion(post) => {
                if post.title.trim().is_empty() {
                    return Err(InvalidUnit("post with empty title".into()));
                }
                let body = match &post.content {
                    Some(content) if !content.trim().is_empty() => {
                        format!("{}\n\n{}", post.title, content.trim())
                    }
                    _ => post.title.clone(),
                };
                Ok(ExtractedRecord::new(
                    self.source(),
                    source_url,
                    Some(post.title.clone()),
                    body,
                    raw_payload,
                    serde_json::json!({
                        "post_id": post.id,
                        "author": post.author,
                        "subreddit": post.subreddit,
                        "upvotes": post.upvotes,
                        "comments": post.comments,
                        "post_type": post.post_type.as_str(),
                        "link_url": post.link_url,
                    }),
                ))
            }
            Self::Discovery(item) => {
                if item.name.trim().is_empty() {
                    return Err(InvalidUnit("discovery item with empty name".into()));
                }
                Ok(ExtractedRecord::new(
                    self.source(),
                    source_url,
                    Some(item.name.clone()),
                    item.text.clone().unwrap_or_else(|| item.name.clone()),
                    raw_payload,
                    serde_json::json!({
                        "kind": item.kind.as_str(),
                        "url": item.url,
                    }),
                ))
            }
        }
    }
}

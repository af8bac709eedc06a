//! Source-specific extraction strategies.
//!
//! A strategy encapsulates navigation (candidate URL ladder + success
//! predicate), primary structural parsing, and a coarse fallback parse for
//! when the primary selectors no longer match the markup a target serves.
//! Parsing is pure: strategies fetch rendered HTML through the session and
//! parse the captured string, so tests run against canned documents.

mod discovery;
mod discussion;
mod fields;
mod navigate;
mod quotes;

pub use discovery::DiscoveryStrategy;
pub use discussion::DiscussionStrategy;
pub use fields::{parse_count, Field};
pub use navigate::{resolve_context, ResolvedContext, SuccessPredicate};
pub use quotes::QuotesStrategy;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::browser::PageSession;
use crate::error::ExtractError;
use crate::models::{JobParameters, JobType, SourceUnit};
use crate::progress::ProgressSink;

/// Timing knobs shared by all strategies.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractOptions {
    /// Per-candidate navigation bound. Exceeding it fails that candidate
    /// and advances the ladder, not the job.
    #[serde(default = "default_nav_timeout")]
    pub nav_timeout_secs: u64,

    /// Polite delay between page requests for paginated sources.
    #[serde(default = "default_page_delay")]
    pub page_delay_ms: u64,
}

fn default_nav_timeout() -> u64 {
    30
}

fn default_page_delay() -> u64 {
    1000
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            nav_timeout_secs: default_nav_timeout(),
            page_delay_ms: default_page_delay(),
        }
    }
}

/// Output of one strategy run.
#[derive(Debug)]
pub struct Extraction {
    pub units: Vec<SourceUnit>,
    /// The resolved context URL, recorded on every persisted record.
    pub context_url: String,
    /// True when the degraded fallback extractor produced the units.
    pub degraded: bool,
}

/// Navigation + parsing logic for one source.
#[async_trait]
pub trait ExtractionStrategy: Send + Sync {
    /// The job type this strategy is registered under.
    fn job_type(&self) -> JobType;

    /// Source tag stamped on normalized records.
    fn source(&self) -> &'static str;

    /// Run the full navigate/extract flow against a live session.
    ///
    /// Milestone reporting: strategies report context-resolution (30-50)
    /// and extraction-done (75-80); the orchestrator owns the rest.
    async fn execute(
        &self,
        session: &dyn PageSession,
        parameters: &JobParameters,
        progress: &dyn ProgressSink,
    ) -> Result<Extraction, ExtractError>;
}

/// Routes job types to registered strategies.
pub struct StrategyRegistry {
    strategies: HashMap<JobType, Arc<dyn ExtractionStrategy>>,
}

impl StrategyRegistry {
    pub fn new() -> Self {
        Self {
            strategies: HashMap::new(),
        }
    }

    /// Registry with all built-in strategies.
    pub fn with_defaults(options: ExtractOptions) -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(QuotesStrategy::new(options.clone())));
        registry.register(Arc::new(DiscussionStrategy::new(options.clone())));
        registry.register(Arc::new(DiscoveryStrategy::new(options)));
        registry
    }

    pub fn register(&mut self, strategy: Arc<dyn ExtractionStrategy>) {
        self.strategies.insert(strategy.job_type(), strategy);
    }

    pub fn get(&self, job_type: JobType) -> Option<Arc<dyn ExtractionStrategy>> {
        self.strategies.get(&job_type).cloned()
    }

    pub fn contains(&self, job_type: JobType) -> bool {
        self.strategies.contains_key(&job_type)
    }
}

impl Default for StrategyRegistry {
    fn default() -> Self {
        Self::with_defaults(ExtractOptions::default())
    }
}

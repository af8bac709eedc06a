//! Data models for Gleaner.

mod job;
mod record;
mod units;

pub use job::{Job, JobParameters, JobStatus, JobType, JobUpdate, ResultSummary};
pub use record::ExtractedRecord;
pub use units::{
    DiscoveryItem, DiscoveryKind, DiscussionPost, InvalidUnit, PostType, Quote, SourceUnit,
};

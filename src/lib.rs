//! Gleaner - browser-driven content extraction service.
//!
//! Callers enqueue typed extraction jobs; a concurrency-limited worker
//! pool executes each against a live browser session through a
//! source-specific strategy, and normalized records plus job lifecycle
//! rows are persisted for querying.

pub mod browser;
pub mod cli;
pub mod config;
pub mod error;
pub mod extract;
pub mod models;
pub mod progress;
pub mod queue;
pub mod schema;
pub mod server;
pub mod store;
pub mod worker;

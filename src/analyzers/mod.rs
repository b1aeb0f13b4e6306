//! Extraction tasks.
//!
//! Each task is a capability-typed analyzer run by the two-stage harness.
//! A task failure is its own problem: it is caught, logged, and never
//! aborts sibling tasks or the scan.

pub mod ai_content;
pub mod contact;
pub mod harness;
pub mod policy_links;
pub mod products;

pub use harness::{run_stage, StageReport};

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::crawler::PageContent;
use crate::fetch::{FetchError, HttpClient};
use crate::models::{DataPoint, DataPointKey};
use crate::repository::{DataPointRepository, SignalLogRepository};

/// Why one extraction task failed.
#[derive(Debug, Error)]
pub enum TaskError {
    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),
    #[error("no content available: {0}")]
    NoContent(String),
    #[error("deadline exceeded after {0:?}")]
    DeadlineExceeded(Duration),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Everything an analyzer may consult.
///
/// Shared read-only across concurrently running tasks within a stage.
pub struct TaskContext {
    pub scan_id: String,
    pub domain_id: String,
    /// Target URL for this run.
    pub url: String,
    pub hostname: String,
    /// Whether the domain is authorized for deep crawling.
    pub authorized: bool,
    /// Pages produced by the discovery crawl; empty when unauthorized or
    /// when nothing was reachable.
    pub pages: Arc<BTreeMap<String, PageContent>>,
    /// Client for targeted fetches (bound to this scan's fetch log).
    pub client: HttpClient,
    pub data_points: DataPointRepository,
    pub signals: SignalLogRepository,
}

impl TaskContext {
    /// Crawled pages whose URL path contains any of the given markers.
    pub fn pages_matching(&self, markers: &[&str]) -> Vec<&PageContent> {
        self.pages
            .values()
            .filter(|p| {
                let url = p.url.to_lowercase();
                markers.iter().any(|m| url.contains(m))
            })
            .collect()
    }
}

/// One extraction task.
///
/// `run` returns the data points to persist for this task; most tasks
/// produce exactly one. Returning an error writes nothing for this key.
#[async_trait]
pub trait Analyzer: Send + Sync {
    /// Primary result key this task produces.
    fn key(&self) -> DataPointKey;

    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Deadline for this task, if it has one. The harness races the task
    /// against it and abandons the task on expiry.
    fn deadline(&self) -> Option<Duration> {
        None
    }

    async fn run(&self, ctx: &TaskContext) -> Result<Vec<DataPoint>, TaskError>;
}

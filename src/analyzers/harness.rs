//! Stage runner for extraction tasks.
//!
//! Runs a roster of analyzers concurrently and waits for all of them to
//! settle - success is not required, settling is. Results are persisted
//! before the stage returns, which is what lets the orchestrator guarantee
//! that a later stage reads an earlier stage's rows.

use std::sync::Arc;

use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::models::DataPointKey;
use crate::repository::DbError;

use super::{Analyzer, TaskContext, TaskError};

/// What happened to each task in a stage.
#[derive(Debug, Default)]
pub struct StageReport {
    /// Tasks that produced and persisted at least one data point.
    pub completed: Vec<(&'static str, DataPointKey)>,
    /// Tasks that failed, with the caught error. Failures here are
    /// non-fatal; the scan continues without their data points.
    pub failed: Vec<(&'static str, String)>,
}

impl StageReport {
    pub fn completed_key(&self, key: DataPointKey) -> bool {
        self.completed.iter().any(|(_, k)| *k == key)
    }
}

/// Run one stage of analyzers to settlement and persist their results.
///
/// Task errors (including deadline expiry) are caught per task and reported,
/// never raised. The only error this function returns is a persistence
/// failure, which is an orchestration-level fault.
pub async fn run_stage(
    ctx: Arc<TaskContext>,
    tasks: Vec<Arc<dyn Analyzer>>,
) -> Result<StageReport, DbError> {
    let mut join_set = JoinSet::new();

    for task in tasks {
        let ctx = ctx.clone();
        join_set.spawn(async move {
            let name = task.name();
            let key = task.key();
            let result = match task.deadline() {
                Some(deadline) => {
                    match tokio::time::timeout(deadline, task.run(&ctx)).await {
                        Ok(result) => result,
                        // Abandon in place: the task future is dropped and
                        // its eventual result discarded.
                        Err(_) => Err(TaskError::DeadlineExceeded(deadline)),
                    }
                }
                None => task.run(&ctx).await,
            };
            (name, key, result)
        });
    }

    let mut report = StageReport::default();

    while let Some(joined) = join_set.join_next().await {
        let (name, key, result) = match joined {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, "extraction task panicked");
                report.failed.push(("task", e.to_string()));
                continue;
            }
        };

        match result {
            Ok(points) => {
                for point in &points {
                    ctx.data_points
                        .record(&ctx.domain_id, &ctx.scan_id, point)
                        .await?;
                }
                debug!(task = name, points = points.len(), "task completed");
                report.completed.push((name, key));
            }
            Err(e) => {
                warn!(task = name, error = %e, "extraction task failed");
                report.failed.push((name, e.to_string()));
            }
        }
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::BTreeMap;
    use std::time::Duration;

    use async_trait::async_trait;
    use serde_json::json;

    use crate::models::{DataPoint, Domain, Scan};
    use crate::repository::{
        migrations::run_migrations, DataPointRepository, DbPool, DomainRepository, ScanRepository,
        SignalLogRepository,
    };

    struct OkTask(DataPointKey);

    #[async_trait]
    impl Analyzer for OkTask {
        fn key(&self) -> DataPointKey {
            self.0
        }
        fn name(&self) -> &'static str {
            "ok-task"
        }
        async fn run(&self, _ctx: &TaskContext) -> Result<Vec<DataPoint>, TaskError> {
            Ok(vec![DataPoint::new(self.0, "ok", json!({"ok": true}))])
        }
    }

    struct FailingTask;

    #[async_trait]
    impl Analyzer for FailingTask {
        fn key(&self) -> DataPointKey {
            DataPointKey::ContactDetails
        }
        fn name(&self) -> &'static str {
            "failing-task"
        }
        async fn run(&self, _ctx: &TaskContext) -> Result<Vec<DataPoint>, TaskError> {
            Err(TaskError::NoContent("nothing here".to_string()))
        }
    }

    struct SlowTask;

    #[async_trait]
    impl Analyzer for SlowTask {
        fn key(&self) -> DataPointKey {
            DataPointKey::DomainRiskAssessment
        }
        fn name(&self) -> &'static str {
            "slow-task"
        }
        fn deadline(&self) -> Option<Duration> {
            Some(Duration::from_millis(50))
        }
        async fn run(&self, _ctx: &TaskContext) -> Result<Vec<DataPoint>, TaskError> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(vec![DataPoint::new(
                DataPointKey::DomainRiskAssessment,
                "never",
                json!({}),
            )])
        }
    }

    async fn test_context() -> (Arc<TaskContext>, tempfile::TempDir) {
        let dir = tempfile::tempdir().expect("tempdir");
        let db_path = dir.path().join("test.db");
        let url = db_path.display().to_string();
        run_migrations(&url).await.expect("migrations");
        let pool = DbPool::from_url(&url);

        let domain = Domain::new("example.com");
        DomainRepository::new(pool.clone())
            .upsert(&domain)
            .await
            .expect("domain");
        let scan = Scan::new(&domain.id, "https://example.com/");
        ScanRepository::new(pool.clone())
            .create(&scan)
            .await
            .expect("scan");

        let ctx = TaskContext {
            scan_id: scan.id,
            domain_id: domain.id,
            url: "https://example.com/".to_string(),
            hostname: "example.com".to_string(),
            authorized: true,
            pages: Arc::new(BTreeMap::new()),
            client: crate::fetch::HttpClient::new(Duration::from_secs(5)).expect("client"),
            data_points: DataPointRepository::new(pool.clone()),
            signals: SignalLogRepository::new(pool),
        };
        (Arc::new(ctx), dir)
    }

    #[tokio::test]
    async fn failures_do_not_abort_siblings() {
        let (ctx, _dir) = test_context().await;

        let report = run_stage(
            ctx.clone(),
            vec![
                Arc::new(FailingTask) as Arc<dyn Analyzer>,
                Arc::new(OkTask(DataPointKey::HomepageSkusSummary)),
                Arc::new(OkTask(DataPointKey::PolicyLinks)),
            ],
        )
        .await
        .expect("stage");

        assert_eq!(report.completed.len(), 2);
        assert_eq!(report.failed.len(), 1);
        assert!(report.completed_key(DataPointKey::HomepageSkusSummary));
        assert!(report.completed_key(DataPointKey::PolicyLinks));

        // The sibling results were persisted; the failed task wrote nothing.
        let points = ctx
            .data_points
            .list_for_scan(&ctx.scan_id)
            .await
            .expect("list");
        assert_eq!(points.len(), 2);
        assert!(points
            .iter()
            .all(|p| p.key != DataPointKey::ContactDetails));
    }

    #[tokio::test]
    async fn deadline_abandons_task_without_failing_stage() {
        let (ctx, _dir) = test_context().await;

        let report = run_stage(
            ctx.clone(),
            vec![
                Arc::new(SlowTask) as Arc<dyn Analyzer>,
                Arc::new(OkTask(DataPointKey::AiGeneratedLikelihood)),
            ],
        )
        .await
        .expect("stage");

        assert!(report.completed_key(DataPointKey::AiGeneratedLikelihood));
        assert_eq!(report.failed.len(), 1);
        assert!(report.failed[0].1.contains("deadline exceeded"));

        let points = ctx
            .data_points
            .list_for_scan(&ctx.scan_id)
            .await
            .expect("list");
        assert!(points
            .iter()
            .all(|p| p.key != DataPointKey::DomainRiskAssessment));
    }
}

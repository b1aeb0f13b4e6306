//! Scan orchestration.
//!
//! Owns the scan lifecycle state machine and the ordering guarantees:
//! the scan row exists before any network I/O, robots/sitemap discovery
//! precedes crawling, Stage A persistence precedes Stage B, and the
//! terminal transition happens after all persistence for the scan.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::{error, info, warn};

use crate::analyzers::{
    ai_content::AiContentAnalyzer, contact::ContactAnalyzer, policy_links::PolicyLinksAnalyzer,
    products::ProductsAnalyzer, run_stage, Analyzer, TaskContext,
};
use crate::config::Settings;
use crate::crawler::Crawler;
use crate::fetch::{FetchError, HttpClient};
use crate::intel::RiskIntelAnalyzer;
use crate::models::{normalize_hostname, Domain, FetchSource, Scan};
use crate::repository::{
    AuthorizationRepository, DataPointRepository, DbError, DbPool, DomainRepository,
    FetchLogRepository, ScanRepository, SignalLogRepository,
};

/// Orchestration-level failure. The only error category that flips a scan
/// to `failed`; task- and fetch-level problems are absorbed below.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("database error: {0}")]
    Db(#[from] DbError),
    #[error("invalid target: {0}")]
    InvalidTarget(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("scan {0} is not in a runnable state")]
    InvalidState(String),
    #[error("fetch client: {0}")]
    Fetch(#[from] FetchError),
}

/// The scan orchestrator.
#[derive(Clone)]
pub struct ScanService {
    pool: DbPool,
    settings: Settings,
    domains: DomainRepository,
    scans: ScanRepository,
    authorizations: AuthorizationRepository,
    fetch_log: FetchLogRepository,
    data_points: DataPointRepository,
    signals: SignalLogRepository,
}

impl ScanService {
    pub fn new(pool: DbPool, settings: Settings) -> Self {
        Self {
            domains: DomainRepository::new(pool.clone()),
            scans: ScanRepository::new(pool.clone()),
            authorizations: AuthorizationRepository::new(pool.clone()),
            fetch_log: FetchLogRepository::new(pool.clone()),
            data_points: DataPointRepository::new(pool.clone()),
            signals: SignalLogRepository::new(pool.clone()),
            pool,
            settings,
        }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    /// Create the domain and scan rows for a target URL.
    ///
    /// No network I/O happens here; the returned scan id can be run inline
    /// with [`execute`](Self::execute) or detached with
    /// [`spawn`](Self::spawn).
    pub async fn start_scan(&self, target_url: &str) -> Result<String, ScanError> {
        let hostname = normalize_hostname(target_url)
            .ok_or_else(|| ScanError::InvalidTarget(target_url.to_string()))?;

        let domain = self.domains.upsert(&Domain::new(&hostname)).await?;
        let scan = Scan::new(&domain.id, target_url);
        self.scans.create(&scan).await?;

        info!(scan_id = %scan.id, %hostname, "scan created");
        Ok(scan.id)
    }

    /// Create a new scan row for a previously scanned domain.
    ///
    /// Accepts a hostname or a domain id. The previous run's target URL is
    /// reused when available.
    pub async fn rescan(&self, domain_ref: &str) -> Result<String, ScanError> {
        let domain = match self.domains.get(domain_ref).await? {
            Some(d) => Some(d),
            None => {
                let hostname = normalize_hostname(domain_ref)
                    .ok_or_else(|| ScanError::InvalidTarget(domain_ref.to_string()))?;
                self.domains.get_by_hostname(&hostname).await?
            }
        };
        let domain =
            domain.ok_or_else(|| ScanError::NotFound(format!("domain {domain_ref}")))?;

        let url = self
            .scans
            .list_for_domain(&domain.id)
            .await?
            .first()
            .map(|s| s.url.clone())
            .unwrap_or_else(|| format!("https://{}/", domain.hostname));

        self.start_scan(&url).await
    }

    /// Run a scan to its terminal state, never returning an error.
    ///
    /// The failure-recording write is itself guarded; even a persistence
    /// outage during failure handling only logs.
    pub async fn execute(&self, scan_id: &str) {
        if let Err(e) = self.run(scan_id).await {
            error!(scan_id, error = %e, "scan failed");
            match self.scans.mark_failed(scan_id, &e.to_string()).await {
                Ok(true) => {}
                Ok(false) => warn!(scan_id, "scan already terminal, failure not recorded"),
                Err(write_err) => {
                    error!(scan_id, error = %write_err, "could not record scan failure")
                }
            }
        }
    }

    /// Detach a scan run from the caller (fire-and-forget).
    ///
    /// The spawned task owns everything it needs; nothing borrowed from the
    /// triggering caller outlives this call. Failures inside are written
    /// back through the normal failure transition, never surfaced here.
    pub fn spawn(&self, scan_id: String) -> tokio::task::JoinHandle<()> {
        let service = self.clone();
        tokio::spawn(async move {
            service.execute(&scan_id).await;
        })
    }

    /// The orchestration path proper. Errors from here flip the scan to
    /// `failed` in [`execute`](Self::execute).
    async fn run(&self, scan_id: &str) -> Result<(), ScanError> {
        let scan = self
            .scans
            .get(scan_id)
            .await?
            .ok_or_else(|| ScanError::NotFound(format!("scan {scan_id}")))?;
        let domain = self
            .domains
            .get(&scan.domain_id)
            .await?
            .ok_or_else(|| ScanError::NotFound(format!("domain {}", scan.domain_id)))?;

        if !self.scans.mark_processing(scan_id).await? {
            return Err(ScanError::InvalidState(scan_id.to_string()));
        }

        let client = HttpClient::with_user_agent(
            Duration::from_secs(self.settings.fetch.timeout_secs),
            self.settings.fetch.user_agent.as_deref(),
        )?
        .with_fetch_log(self.fetch_log.clone(), scan_id);

        // Reachability probe, with http fallback for https-only failures.
        let probe = self.probe_target(&client, &scan.url).await;
        let (mut is_active, mut status_code) = match &probe {
            Some(page) => (page.is_success(), Some(page.status.as_u16())),
            None => (false, None),
        };

        // Authorization decides crawl depth. Absence is a policy outcome,
        // not a fault.
        let policy = self.authorizations.resolve(&domain.hostname).await?;
        let authorized = policy.is_some();

        let pages = match policy {
            Some(policy) => {
                info!(hostname = %domain.hostname, max_pages = policy.max_pages_per_scan, "authorized, crawling");
                match Crawler::new(
                    client.clone(),
                    self.settings.crawl.browser.clone(),
                    policy,
                    &scan.url,
                ) {
                    Ok(crawler) => match crawler.crawl().await {
                        Ok(outcome) => outcome.pages,
                        Err(e) => {
                            // Discovery could not start: fall back to
                            // single-page extraction rather than failing.
                            warn!(error = %e, "discovery failed, falling back to single-page extraction");
                            BTreeMap::new()
                        }
                    },
                    Err(e) => {
                        warn!(error = %e, "crawler setup failed, falling back to single-page extraction");
                        BTreeMap::new()
                    }
                }
            }
            None => {
                info!(hostname = %domain.hostname, "not authorized for deep crawl, single-page extraction only");
                BTreeMap::new()
            }
        };

        // A dead probe can be outvoted by a later successful crawl fetch.
        if !is_active {
            if let Some((source, code)) = self.best_recovery_fetch(scan_id).await? {
                info!(source = source.as_str(), "marking domain active from crawl evidence");
                is_active = true;
                status_code = code;
            }
        }
        self.domains
            .set_reachability(&domain.id, is_active, status_code)
            .await?;
        self.scans
            .set_reachability(scan_id, is_active, status_code)
            .await?;

        let ctx = Arc::new(TaskContext {
            scan_id: scan_id.to_string(),
            domain_id: domain.id.clone(),
            url: scan.url.clone(),
            hostname: domain.hostname.clone(),
            authorized,
            pages: Arc::new(pages),
            client,
            data_points: self.data_points.clone(),
            signals: self.signals.clone(),
        });

        // Stage A settles and persists before Stage B starts; risk
        // intelligence reads Stage A's rows.
        let stage_a = run_stage(ctx.clone(), self.stage_a_roster(authorized)).await?;
        info!(
            completed = stage_a.completed.len(),
            failed = stage_a.failed.len(),
            "stage A settled"
        );

        let stage_b = run_stage(ctx.clone(), self.stage_b_roster()).await?;
        info!(
            completed = stage_b.completed.len(),
            failed = stage_b.failed.len(),
            "stage B settled"
        );

        if !self.scans.mark_completed(scan_id).await? {
            return Err(ScanError::InvalidState(scan_id.to_string()));
        }
        info!(scan_id, "scan completed");
        Ok(())
    }

    /// Stage A: best-effort parallel extraction over crawled content.
    /// Multi-page tasks only run for authorized domains.
    fn stage_a_roster(&self, authorized: bool) -> Vec<Arc<dyn Analyzer>> {
        let mut roster: Vec<Arc<dyn Analyzer>> = vec![Arc::new(ContactAnalyzer)];
        if authorized {
            roster.push(Arc::new(ProductsAnalyzer));
            roster.push(Arc::new(PolicyLinksAnalyzer));
        }
        roster
    }

    /// Stage B: homepage AI-likelihood plus deadline-raced risk intel.
    fn stage_b_roster(&self) -> Vec<Arc<dyn Analyzer>> {
        vec![
            Arc::new(AiContentAnalyzer) as Arc<dyn Analyzer>,
            Arc::new(RiskIntelAnalyzer::new(self.settings.intel.to_config())),
        ]
    }

    /// Probe the target URL, trying plain http when an https fetch fails
    /// at the transport level.
    async fn probe_target(
        &self,
        client: &HttpClient,
        url: &str,
    ) -> Option<crate::fetch::PageFetch> {
        match client.fetch(url, FetchSource::Homepage).await {
            Ok(page) => Some(page),
            Err(e) => {
                warn!(url, error = %e, "reachability probe failed");
                let fallback = url.replacen("https://", "http://", 1);
                if fallback != url {
                    client.fetch(&fallback, FetchSource::Homepage).await.ok()
                } else {
                    None
                }
            }
        }
    }

    /// Find the strongest successful fetch recorded for this scan.
    ///
    /// Source precedence is the explicit list on
    /// [`FetchSource::recovery_priority`], strongest first: homepage,
    /// contact-page, common-path, sitemap, link, robots, browser-fallback.
    async fn best_recovery_fetch(
        &self,
        scan_id: &str,
    ) -> Result<Option<(FetchSource, Option<u16>)>, ScanError> {
        let entries = self.fetch_log.list_for_scan(scan_id).await?;
        Ok(entries
            .iter()
            .filter(|e| e.succeeded())
            .min_by_key(|e| e.source.recovery_priority())
            .map(|e| (e.source, e.status_code)))
    }
}

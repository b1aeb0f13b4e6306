//! End-to-end pipeline tests.
//!
//! Drives real scans against a minimal local HTTP site, exercising the
//! lifecycle, crawl budget/robots handling, both extraction stages, and
//! the persistence invariants.

use std::collections::HashSet;
use std::path::PathBuf;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use siteintel::config::Settings;
use siteintel::models::{AuthorizedDomain, DataPointKey, FetchSource, ScanStatus};
use siteintel::repository::{
    migrations::run_migrations, AuthorizationRepository, DataPointRepository, DbPool,
    DomainRepository, FetchLogRepository, ScanRepository,
};
use siteintel::services::ScanService;

/// Serve a small e-commerce-ish site on an ephemeral local port.
async fn serve_site() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    let port = addr.port();

    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                break;
            };
            tokio::spawn(async move {
                // Read until the end of the request headers.
                let mut raw = Vec::new();
                let mut chunk = vec![0u8; 2048];
                loop {
                    match socket.read(&mut chunk).await {
                        Ok(0) | Err(_) => break,
                        Ok(n) => {
                            raw.extend_from_slice(&chunk[..n]);
                            if raw.windows(4).any(|w| w == b"\r\n\r\n") || raw.len() > 65536 {
                                break;
                            }
                        }
                    }
                }
                let request = String::from_utf8_lossy(&raw).to_string();
                let path = request
                    .split_whitespace()
                    .nth(1)
                    .unwrap_or("/")
                    .to_string();

                let (status, content_type, body) = route(&path, port);
                let response = format!(
                    "HTTP/1.1 {status}\r\nContent-Type: {content_type}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    format!("http://127.0.0.1:{port}/")
}

fn route(path: &str, port: u16) -> (&'static str, &'static str, String) {
    match path {
        "/" => (
            "200 OK",
            "text/html",
            r#"<html><body>
              <h1>Widget Shop</h1>
              <p>We are a family shop selling widgets since 1998. Every widget is
              tested by hand before it ships. Questions are always welcome.</p>
              <ul class="product-grid">
                <li class="product"><h3 class="title">Blue Widget</h3><span>$19.99</span></li>
                <li class="product"><h3 class="title">Red Widget</h3><span>$24.50</span></li>
              </ul>
              <a href="/contact">Contact</a>
              <a href="/privacy-policy">Privacy Policy</a>
              <a href="/terms">Terms</a>
            </body></html>"#
                .to_string(),
        ),
        "/robots.txt" => (
            "200 OK",
            "text/plain",
            format!(
                "User-agent: *\nDisallow: /blocked/\nSitemap: http://127.0.0.1:{port}/sitemap.xml\n"
            ),
        ),
        "/sitemap.xml" => (
            "200 OK",
            "application/xml",
            format!(
                r#"<?xml version="1.0"?>
<urlset>
  <url><loc>http://127.0.0.1:{port}/</loc></url>
  <url><loc>http://127.0.0.1:{port}/contact</loc></url>
  <url><loc>http://127.0.0.1:{port}/privacy-policy</loc></url>
  <url><loc>http://127.0.0.1:{port}/blocked/secret</loc></url>
</urlset>"#
            ),
        ),
        "/contact" => (
            "200 OK",
            "text/html",
            r#"<html><body>
              <h1>Contact us</h1>
              <a href="mailto:hello@widgetshop.test">hello@widgetshop.test</a>
              <a href="tel:+1-555-010-0199">Call us</a>
              <address>12 Market Lane, Springfield</address>
            </body></html>"#
                .to_string(),
        ),
        "/privacy-policy" => (
            "200 OK",
            "text/html",
            "<html><body><h1>Privacy Policy</h1><p>We keep your data private.</p></body></html>"
                .to_string(),
        ),
        "/terms" => (
            "200 OK",
            "text/html",
            "<html><body><h1>Terms of Service</h1><p>Be nice.</p></body></html>".to_string(),
        ),
        "/blocked/secret" => (
            "200 OK",
            "text/html",
            "<html><body>robots should keep crawlers out of here</body></html>".to_string(),
        ),
        _ => ("404 Not Found", "text/html", "<html>not found</html>".to_string()),
    }
}

struct TestEnv {
    service: ScanService,
    pool: DbPool,
    _dir: tempfile::TempDir,
}

async fn test_env(intel_deadline_secs: u64) -> TestEnv {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut settings = Settings::load(Some(PathBuf::from(dir.path())));
    settings.fetch.timeout_secs = 5;
    settings.intel.deadline_secs = intel_deadline_secs;
    settings.intel.request_timeout_secs = 2;
    // Nothing local answers RDAP; point it somewhere that refuses fast.
    settings.intel.rdap_endpoint = "http://127.0.0.1:9".to_string();

    let url = settings.database_url();
    run_migrations(&url).await.expect("migrations");
    let pool = DbPool::from_url(&url);

    TestEnv {
        service: ScanService::new(pool.clone(), settings),
        pool,
        _dir: dir,
    }
}

async fn authorize(pool: &DbPool, hostname: &str, max_pages: u32) {
    let mut auth = AuthorizedDomain::new(hostname);
    auth.max_pages_per_scan = max_pages;
    auth.crawl_delay_ms = 0;
    AuthorizationRepository::new(pool.clone())
        .add(&auth)
        .await
        .expect("authorize");
}

fn keys_of(points: &[siteintel::models::DataPoint]) -> HashSet<DataPointKey> {
    points.iter().map(|p| p.key).collect()
}

#[tokio::test]
async fn authorized_scan_runs_the_full_pipeline() {
    let base = serve_site().await;
    let env = test_env(30).await;
    authorize(&env.pool, "127.0.0.1", 25).await;

    let scan_id = env.service.start_scan(&base).await.expect("start");
    env.service.execute(&scan_id).await;

    let scan = ScanRepository::new(env.pool.clone())
        .get(&scan_id)
        .await
        .expect("get scan")
        .expect("scan exists");
    assert_eq!(scan.status, ScanStatus::Completed);
    assert!(scan.error.is_none());
    assert!(scan.is_active);
    assert_eq!(scan.status_code, Some(200));

    // One data point per key, all six keys.
    let points = DataPointRepository::new(env.pool.clone())
        .list_for_scan(&scan_id)
        .await
        .expect("points");
    let keys = keys_of(&points);
    for key in [
        DataPointKey::ContactDetails,
        DataPointKey::HomepageSkusSummary,
        DataPointKey::PolicyLinks,
        DataPointKey::AiGeneratedLikelihood,
        DataPointKey::DomainRiskAssessment,
        DataPointKey::DomainIntelSignals,
    ] {
        assert!(keys.contains(&key), "missing {key:?}");
    }

    let contact = points
        .iter()
        .find(|p| p.key == DataPointKey::ContactDetails)
        .expect("contact point");
    let emails = contact.payload["emails"].as_array().expect("emails");
    assert!(emails
        .iter()
        .any(|e| e.as_str() == Some("hello@widgetshop.test")));

    let products = points
        .iter()
        .find(|p| p.key == DataPointKey::HomepageSkusSummary)
        .expect("products point");
    assert!(products.payload["sku_count"].as_u64().unwrap_or(0) >= 2);

    let policies = points
        .iter()
        .find(|p| p.key == DataPointKey::PolicyLinks)
        .expect("policy point");
    assert!(policies.payload["privacy"].is_string());
    assert!(policies.payload["terms"].is_string());

    // Fetch log: bounded, and the robots-disallowed URL was skipped
    // without being fetched.
    let log = FetchLogRepository::new(env.pool.clone())
        .list_for_scan(&scan_id)
        .await
        .expect("log");
    assert!(!log.is_empty());
    assert!(log.len() <= 40, "fetch log had {} rows", log.len());

    let blocked: Vec<_> = log
        .iter()
        .filter(|e| e.url.contains("/blocked/secret"))
        .collect();
    assert!(!blocked.is_empty(), "blocked URL never considered");
    assert!(blocked.iter().all(|e| !e.robots_allowed));
    assert!(blocked.iter().all(|e| e.status_code.is_none()));
}

#[tokio::test]
async fn unauthorized_scan_stays_single_page() {
    let base = serve_site().await;
    let env = test_env(30).await;
    // No authorize() call: the domain is not in the allow list.

    let scan_id = env.service.start_scan(&base).await.expect("start");
    env.service.execute(&scan_id).await;

    let scan = ScanRepository::new(env.pool.clone())
        .get(&scan_id)
        .await
        .expect("get scan")
        .expect("scan exists");
    assert_eq!(scan.status, ScanStatus::Completed);

    let points = DataPointRepository::new(env.pool.clone())
        .list_for_scan(&scan_id)
        .await
        .expect("points");
    let keys = keys_of(&points);
    assert!(keys.contains(&DataPointKey::ContactDetails));
    assert!(!keys.contains(&DataPointKey::HomepageSkusSummary));
    assert!(!keys.contains(&DataPointKey::PolicyLinks));

    // The crawler never ran: no robots, sitemap, common-path, or link
    // fetches, only direct single-page fetches.
    let log = FetchLogRepository::new(env.pool.clone())
        .list_for_scan(&scan_id)
        .await
        .expect("log");
    assert!(log.iter().all(|e| matches!(
        e.source,
        FetchSource::Homepage | FetchSource::ContactPage
    )));
}

#[tokio::test]
async fn risk_intel_timeout_is_a_gap_not_a_failure() {
    let base = serve_site().await;
    let env = test_env(0).await; // deadline expires immediately
    authorize(&env.pool, "127.0.0.1", 10).await;

    let scan_id = env.service.start_scan(&base).await.expect("start");
    env.service.execute(&scan_id).await;

    let scan = ScanRepository::new(env.pool.clone())
        .get(&scan_id)
        .await
        .expect("get scan")
        .expect("scan exists");
    assert_eq!(scan.status, ScanStatus::Completed);

    let points = DataPointRepository::new(env.pool.clone())
        .list_for_scan(&scan_id)
        .await
        .expect("points");
    let keys = keys_of(&points);
    assert!(!keys.contains(&DataPointKey::DomainRiskAssessment));
    // The sibling Stage B task still ran.
    assert!(keys.contains(&DataPointKey::AiGeneratedLikelihood));
}

#[tokio::test]
async fn rescan_accumulates_history_and_upserts_latest() {
    let base = serve_site().await;
    let env = test_env(30).await;

    let first = env.service.start_scan(&base).await.expect("first");
    env.service.execute(&first).await;

    let domain = DomainRepository::new(env.pool.clone())
        .get_by_hostname("127.0.0.1")
        .await
        .expect("domain lookup")
        .expect("domain exists");

    let second = env.service.rescan(&domain.id).await.expect("rescan");
    env.service.execute(&second).await;
    assert_ne!(first, second);

    let scans = ScanRepository::new(env.pool.clone())
        .list_for_domain(&domain.id)
        .await
        .expect("scans");
    assert_eq!(scans.len(), 2);
    assert!(scans.iter().all(|s| s.status == ScanStatus::Completed));

    // Scan-scoped rows accumulate per run...
    let repo = DataPointRepository::new(env.pool.clone());
    let first_points = repo.list_for_scan(&first).await.expect("first points");
    let second_points = repo.list_for_scan(&second).await.expect("second points");
    assert!(!first_points.is_empty());
    assert!(!second_points.is_empty());

    // ...while domain-scoped rows stay unique per key.
    let latest = repo.list_for_domain(&domain.id).await.expect("latest");
    let mut seen = HashSet::new();
    for point in &latest {
        assert!(seen.insert(point.key), "duplicate latest row for {:?}", point.key);
    }
}

#[tokio::test]
async fn unreachable_target_still_reaches_terminal_state() {
    let env = test_env(10).await;

    // Port 1 refuses connections immediately.
    let scan_id = env
        .service
        .start_scan("http://127.0.0.1:1/")
        .await
        .expect("start");
    env.service.execute(&scan_id).await;

    let scan = ScanRepository::new(env.pool.clone())
        .get(&scan_id)
        .await
        .expect("get scan")
        .expect("scan exists");
    // Partial data beats no data: unreachable is not an orchestration
    // fault, so the scan completes with nothing extracted.
    assert_eq!(scan.status, ScanStatus::Completed);
    assert!(!scan.is_active);
}

#[tokio::test]
async fn lifecycle_transitions_never_skip_or_reverse() {
    let env = test_env(30).await;

    let domain = siteintel::models::Domain::new("lifecycle.test");
    DomainRepository::new(env.pool.clone())
        .upsert(&domain)
        .await
        .expect("domain");
    let scan = siteintel::models::Scan::new(&domain.id, "https://lifecycle.test/");
    let repo = ScanRepository::new(env.pool.clone());
    repo.create(&scan).await.expect("create");

    // completed cannot be reached from pending.
    assert!(!repo.mark_completed(&scan.id).await.expect("call"));
    assert!(repo.mark_processing(&scan.id).await.expect("call"));
    // processing is not re-enterable.
    assert!(!repo.mark_processing(&scan.id).await.expect("call"));
    assert!(repo.mark_completed(&scan.id).await.expect("call"));
    // terminal states are sealed.
    assert!(!repo.mark_failed(&scan.id, "too late").await.expect("call"));

    let stored = repo.get(&scan.id).await.expect("get").expect("exists");
    assert_eq!(stored.status, ScanStatus::Completed);
    assert!(stored.error.is_none());
}

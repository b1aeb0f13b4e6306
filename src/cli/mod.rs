//! CLI trigger interface.
//!
//! Thin wrappers over the scan service: URL-shape validation and output
//! formatting live here, orchestration does not.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};

use crate::config::Settings;
use crate::models::AuthorizedDomain;
use crate::repository::{migrations::run_migrations, AuthorizationRepository, DbPool};
use crate::services::ScanService;

#[derive(Parser)]
#[command(name = "siteintel")]
#[command(about = "Website risk and intelligence scanning system")]
#[command(version)]
pub struct Cli {
    /// Data directory
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the data directory and database
    Init,

    /// Scan a target URL
    Scan {
        /// Target URL (e.g. https://example.com)
        url: String,
        /// Return immediately; the scan runs in the background
        #[arg(long)]
        detach: bool,
    },

    /// Re-run a scan for a known domain
    Rescan {
        /// Hostname or domain id
        domain: String,
        /// Return immediately; the scan runs in the background
        #[arg(long)]
        detach: bool,
    },

    /// Show the status of a scan
    Status {
        /// Scan id
        scan_id: String,
    },

    /// Manage authorized domains
    Authorize {
        #[command(subcommand)]
        command: AuthorizeCommands,
    },
}

#[derive(Subcommand)]
enum AuthorizeCommands {
    /// Authorize a hostname for deep crawling
    Add {
        hostname: String,
        /// Cover subdomains of this hostname too
        #[arg(long)]
        allow_subdomains: bool,
        /// Ignore robots.txt rules (not recommended)
        #[arg(long)]
        ignore_robots: bool,
        /// Page budget per scan
        #[arg(long, default_value = "25")]
        max_pages: u32,
        /// Delay between crawler fetches, milliseconds
        #[arg(long, default_value = "500")]
        crawl_delay_ms: u64,
    },
    /// List authorized hostnames
    List,
    /// Remove an authorization entry
    Remove { hostname: String },
}

/// Entry point called from main.
pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let settings = Settings::load(cli.data_dir.clone());
    settings
        .ensure_data_dir()
        .with_context(|| format!("creating data dir {}", settings.data_dir.display()))?;

    let database_url = settings.database_url();
    run_migrations(&database_url)
        .await
        .context("running database migrations")?;
    let pool = DbPool::from_url(&database_url);

    match cli.command {
        Commands::Init => {
            println!("Initialized data directory at {}", settings.data_dir.display());
        }

        Commands::Scan { url, detach } => {
            validate_url(&url)?;
            let service = ScanService::new(pool, settings);
            let scan_id = service.start_scan(&url).await?;
            println!("{scan_id}");
            if detach {
                // Scan id is already printed; keep the runtime alive until
                // the detached run reaches a terminal state, quietly.
                let _ = service.spawn(scan_id).await;
            } else {
                service.execute(&scan_id).await;
                print_status(&service, &scan_id).await?;
            }
        }

        Commands::Rescan { domain, detach } => {
            let service = ScanService::new(pool, settings);
            let scan_id = service.rescan(&domain).await?;
            println!("{scan_id}");
            if detach {
                let _ = service.spawn(scan_id).await;
            } else {
                service.execute(&scan_id).await;
                print_status(&service, &scan_id).await?;
            }
        }

        Commands::Status { scan_id } => {
            let service = ScanService::new(pool, settings);
            print_status(&service, &scan_id).await?;
        }

        Commands::Authorize { command } => {
            let repo = AuthorizationRepository::new(pool);
            match command {
                AuthorizeCommands::Add {
                    hostname,
                    allow_subdomains,
                    ignore_robots,
                    max_pages,
                    crawl_delay_ms,
                } => {
                    let hostname = crate::models::normalize_hostname(&hostname)
                        .ok_or_else(|| anyhow::anyhow!("invalid hostname: {hostname}"))?;
                    let mut auth = AuthorizedDomain::new(&hostname);
                    auth.allow_subdomains = allow_subdomains;
                    auth.respect_robots = !ignore_robots;
                    auth.max_pages_per_scan = max_pages;
                    auth.crawl_delay_ms = crawl_delay_ms;
                    repo.add(&auth).await?;
                    println!("authorized {hostname}");
                }
                AuthorizeCommands::List => {
                    for auth in repo.list().await? {
                        println!(
                            "{}\tsubdomains={}\trobots={}\tmax_pages={}\tdelay={}ms",
                            auth.hostname,
                            auth.allow_subdomains,
                            auth.respect_robots,
                            auth.max_pages_per_scan,
                            auth.crawl_delay_ms
                        );
                    }
                }
                AuthorizeCommands::Remove { hostname } => {
                    if repo.remove(&hostname).await? {
                        println!("removed {hostname}");
                    } else {
                        println!("no entry for {hostname}");
                    }
                }
            }
        }
    }

    Ok(())
}

/// URL-shape validation belongs to the trigger layer, not the core.
fn validate_url(url: &str) -> anyhow::Result<()> {
    let parsed = url::Url::parse(url).with_context(|| format!("invalid url: {url}"))?;
    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        anyhow::bail!("unsupported scheme: {}", parsed.scheme());
    }
    if parsed.host_str().is_none() {
        anyhow::bail!("url has no host: {url}");
    }
    Ok(())
}

async fn print_status(service: &ScanService, scan_id: &str) -> anyhow::Result<()> {
    let repo = crate::repository::ScanRepository::new(service.pool().clone());
    let scan = repo
        .get(scan_id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("no scan {scan_id}"))?;

    println!("scan:    {}", scan.id);
    println!("url:     {}", scan.url);
    println!("status:  {}", scan.status.as_str());
    if let Some(error) = &scan.error {
        println!("error:   {error}");
    }
    println!(
        "active:  {} (status code {})",
        scan.is_active,
        scan.status_code
            .map(|c| c.to_string())
            .unwrap_or_else(|| "-".to_string())
    );
    Ok(())
}

//! Fetch clients: plain HTTP plus an optional headless-browser fallback.

mod browser;
mod http_client;
mod user_agent;

pub use browser::{BrowserConfig, BrowserFetcher, BrowserPage};
pub use http_client::{FetchError, HttpClient, PageFetch};
pub use user_agent::{resolve_user_agent, DEFAULT_USER_AGENT, IMPERSONATE_USER_AGENTS};

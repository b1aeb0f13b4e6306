//! Data models for siteintel.

mod authorization;
mod data_point;
mod domain;
mod fetch_log;
mod scan;
mod signal;

pub use authorization::AuthorizedDomain;
pub use data_point::{DataPoint, DataPointKey};
pub use domain::{normalize_hostname, Domain};
pub use fetch_log::{FetchLogEntry, FetchSource};
pub use scan::{Scan, ScanStatus};
pub use signal::{Severity, Signal};

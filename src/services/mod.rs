//! Service layer for scan orchestration.
//!
//! Domain logic separated from the CLI so other trigger interfaces can
//! reuse it.

pub mod scan;

pub use scan::{ScanError, ScanService};

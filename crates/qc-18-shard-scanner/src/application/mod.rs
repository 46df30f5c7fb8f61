//! # Application Layer
//!
//! Service orchestrating range scans.

pub mod service;

pub use service::ShardScanService;

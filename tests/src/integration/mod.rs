//! # Integration Flows
//!
//! Scans driven through `ShardScanApi` against in-memory chains, including
//! multi-backend failover and cancellation from a separate task.

pub mod flows;

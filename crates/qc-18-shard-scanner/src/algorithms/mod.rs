//! # Algorithms Module
//!
//! Core scanning algorithms: ancestor gap filling, per-master planning,
//! transaction paging and iteration retry.

pub mod gap_filler;
pub mod master_walker;
pub mod paginator;
pub mod retry;

pub use gap_filler::AncestorGapFiller;
pub use master_walker::MasterChainWalker;
pub use paginator::TransactionPaginator;
pub use retry::{backoff_delay, retry_iteration, should_retry, Retried};

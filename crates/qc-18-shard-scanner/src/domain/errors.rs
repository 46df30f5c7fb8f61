//! # Domain Errors
//!
//! Error types for the Shard Scanner.
//!
//! Every provider failure is surfaced to the orchestrator unchanged; the
//! orchestrator decides between retrying the master iteration and aborting.

use thiserror::Error;

/// Hash type alias (32-byte block/transaction hash)
pub type Hash = [u8; 32];

/// Shard scanner error types.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ScanError {
    /// Requested block does not exist (or is out of the provider's range).
    #[error("Block not found: ({workchain},{shard:016x},{seqno})")]
    BlockNotFound {
        /// Workchain id
        workchain: i32,
        /// Shard bitmask
        shard: u64,
        /// Sequence number
        seqno: u32,
    },

    /// Provider returned data that violates the chain contract.
    #[error("Malformed block data: {0}")]
    MalformedBlock(String),

    /// Parent links of a shard block could not be resolved.
    #[error("Parent resolution failed for {block}: {reason}")]
    ParentResolution {
        /// Block whose parents were requested
        block: String,
        /// Provider reason
        reason: String,
    },

    /// Transaction page request failed mid-sequence.
    #[error("Pagination failed for {block}: {reason}")]
    Pagination {
        /// Block being enumerated
        block: String,
        /// Provider reason
        reason: String,
    },

    /// A single transaction could not be resolved.
    #[error("Transaction resolution failed in {block} at lt {lt}: {reason}")]
    TransactionResolution {
        /// Block containing the transaction
        block: String,
        /// Logical time of the transaction
        lt: u64,
        /// Provider reason
        reason: String,
    },

    /// Backend is unreachable (connection refused/reset).
    #[error("Backend unavailable: {0}")]
    Unavailable(String),

    /// Provider call timed out.
    #[error("Provider timeout: {0}")]
    Timeout(String),

    /// Scan was cancelled by the caller.
    #[error("Scan cancelled")]
    Cancelled,

    /// Seqno range is inverted.
    #[error("Invalid seqno range: {start}..{end}")]
    InvalidRange {
        /// Range start (inclusive)
        start: u32,
        /// Range end (exclusive)
        end: u32,
    },

    /// Ancestor walk visited more blocks than allowed for one shard head.
    #[error("Ancestor walk exceeded {limit} blocks from {head}")]
    WalkLimitExceeded {
        /// Shard head the walk started from
        head: String,
        /// Configured limit
        limit: usize,
    },

    /// Sticky session has no backend to bind to.
    #[error("No provider backends configured")]
    NoBackends,

    /// Invalid configuration value.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Retry budget spent on a retryable error.
    #[error("Gave up on master {seqno} after {attempts} attempts: {last}")]
    RetriesExhausted {
        /// Master seqno being scanned
        seqno: u32,
        /// Number of attempts made
        attempts: u32,
        /// Last error observed
        last: Box<ScanError>,
    },
}

impl ScanError {
    /// Connectivity and timeout failures are worth replaying; everything
    /// else is a protocol-level problem.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::Timeout(_))
    }

    /// Is this a cancellation rather than a failure?
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

//! # Adapters Layer (Hexagonal Architecture)
//!
//! Implementations of the `BlockDataProvider` outbound port.

mod in_memory;
mod sticky;

pub use in_memory::{
    CallStats, ChainBuilder, ChainFixture, InMemoryChain, MasterEntry, ShardBlockEntry,
};
pub use sticky::StickyProvider;

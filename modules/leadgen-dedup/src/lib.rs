//! Seen-entity cache and lead merge engine.
//!
//! Both components sit in front of a durable store they reach only through
//! the traits in [`traits`]. The fast cache is an accelerator: every answer it
//! gives must also be derivable from the durable store.

pub mod error;
pub mod fast_cache;
pub mod merge;
pub mod seen;
#[cfg(any(test, feature = "test-support"))]
pub mod testing;
pub mod traits;

pub use error::{CacheError, MergeError};
pub use fast_cache::MemoryFastCache;
pub use merge::{absorb_secondary, MergeEngine, MergeReport};
pub use seen::{SeenEntityCache, SeenStats, SweepReport};
pub use traits::{
    DuplicateGroup, EntityCounts, EntityLedger, FastCache, KeyTtl, LeadStore, MergeTx,
    MergeableLead,
};

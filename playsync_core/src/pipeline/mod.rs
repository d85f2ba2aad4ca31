//! The concurrent execution engine (C9 + C10): runs a chosen
//! [`crate::transcoder::TranscodingPath`] for a single item atomically via
//! temp files, and a bounded worker pool that runs many such items
//! concurrently with streaming results and cooperative cancellation.

pub mod pool;
pub mod syncer;

pub use pool::{CancellableThreadPool, PoolItemResult, PoolMessage};
pub use syncer::{Postprocessor, SingleItemSyncer, SyncerError};

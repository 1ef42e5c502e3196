//! # layerstore-shard
//!
//! A durable, string-keyed byte store on the local filesystem.
//!
//! ## Guarantees
//!
//! - Writes are staged in a temp directory and renamed into place, so a read
//!   returns either the previous value, the complete new value, or
//!   [`StoreError::NotFound`], never a partial payload
//! - Keys are spread over shard directories named by their first two
//!   characters to bound per-directory fan-out
//! - Small values are served from an LRU read cache bounded by bytes
//! - Erasing an absent key succeeds

mod cache;
mod error;
mod store;

pub use error::{StoreError, StoreResult};
pub use store::{shard_of, validate_key, ShardStore, ShardStoreConfig, StagedWrite};

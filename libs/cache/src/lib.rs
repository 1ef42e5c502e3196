//! # layerstore-cache
//!
//! Content-addressed fetch-and-cache layer for container image layers.
//!
//! Remote artifacts are fetched over HTTP, deduplicated by SHA-256 and kept
//! on disk so that repeated fetches by name become local cache hits.
//!
//! ## Stores
//!
//! A [`Stores`] bundle holds one shard store per [`StoreKind`]:
//!
//! ```text
//! <base>/
//! ├── remote/     Remote records, keyed by a hash of the name
//! ├── object/     payloads, keyed by SHA-256 of their bytes
//! └── download/   landing entries for fetches in flight
//! ```
//!
//! ## Flow
//!
//! [`Stores::get`] answers "is it cached" without network I/O.
//! [`Fetcher::download`] fetches, hashes, promotes and records a remote;
//! [`Fetcher::resolve`] combines the two. The payload is then read through
//! [`Stores::object_stream`].

pub mod config;
pub mod dump;
pub mod error;
pub mod fetch;
mod lock;
pub mod record;
pub mod remote;
pub mod stores;
pub mod tee;

pub use config::CacheConfig;
pub use dump::{dump, summarize, DumpOptions, StoreSummary};
pub use error::{CacheError, CacheResult};
pub use fetch::{Fetcher, FetcherConfig};
pub use record::{Record, StoreKind};
pub use remote::Remote;
pub use stores::Stores;

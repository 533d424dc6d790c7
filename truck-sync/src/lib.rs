//! # truck-sync
//!
//! Staleness detection, cache-aware fetching, and the extract / pin / clean
//! lifecycle for declared dependencies.
//!
//! Build a [`SyncEngine`] from [`truck_core::Settings`] and call
//! [`SyncEngine::sync`] with the declared dependencies.

pub mod cache;
pub mod clean;
pub mod engine;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod manifest;
pub mod record;

pub use cache::{ArtifactCache, CacheLookup};
pub use clean::{CleanReport, CleanSelector, CleanedTarget};
pub use engine::{DependencyOutcome, SyncEngine, SyncMode, SyncReport, SyncState, TargetStatus};
pub use error::SyncError;
pub use fetch::{FetchOutcome, Fetcher, MemoryTransport, Transport, UreqTransport};
pub use manifest::InstalledManifest;
pub use record::DependencyRecord;

//! Truck hosting: remote spec/binary locations, release packaging, publish.
//!
//! - [`backend`]: [`HostingBackend`] and its object-storage / release-asset
//!   variants
//! - [`registry`]: [`HostingRegistry`], merged spec lookup, active backend
//! - [`release`]: version inference, archive staging, the release flow
//! - [`publish`]: [`Uploader`] boundary and the CLI-backed implementation

pub mod backend;
pub mod error;
pub mod publish;
pub mod registry;
pub mod release;

pub use backend::{backend_for, GithubBackend, HostingBackend, S3Backend};
pub use error::HostingError;
pub use publish::{CommandUploader, Destination, RecordingUploader, Upload, Uploader};
pub use registry::HostingRegistry;
pub use release::{infer_next_version, release_at, stage_archive, Release};

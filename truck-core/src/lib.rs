//! Truck core library: domain types, declaration and author config
//! persistence, runtime settings, errors.
//!
//! - [`types`]: newtypes and the declared-dependency model
//! - [`declarations`]: `truck.json` load / save / `set_version`
//! - [`author`]: `truck-author.json`, target staging configs
//! - [`secrets`]: `~/.truckrc` credentials
//! - [`json_file`]: JSON read and atomic write shared by every config file
//! - [`settings`]: explicit runtime configuration and path layout
//! - [`error`]: [`ConfigError`]

pub mod author;
pub mod declarations;
pub mod error;
pub mod json_file;
pub mod secrets;
pub mod settings;
pub mod types;

pub use author::{AuthorConfig, BackendConfig, GithubConfig, HostingConfig, S3Config};
pub use error::ConfigError;
pub use secrets::Secrets;
pub use settings::Settings;
pub use types::{parse_spec, DependencyDeclaration, Provenance, Spec, TargetName};

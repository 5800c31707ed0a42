//! Gantry core library — domain types, project layout, remote key scheme,
//! configuration loading, errors.
//!
//! Public API surface:
//! - [`types`] — component name newtype and [`ComponentKind`]
//! - [`layout`] — on-disk project layout and component discovery
//! - [`keys`] — deterministic remote object keys
//! - [`config`] — [`GantryConfig`] resolution (file, `.env`, environment)
//! - [`error`] — [`ConfigError`]

pub mod config;
pub mod error;
pub mod keys;
pub mod layout;
pub mod types;

pub use config::{GantryConfig, RemoteTarget};
pub use error::ConfigError;
pub use types::{ComponentKind, ComponentName};

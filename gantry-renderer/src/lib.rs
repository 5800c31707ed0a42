//! # gantry-renderer
//!
//! Turns job configuration into deployment documents and renders the
//! scaffolding of new components.
//!
//! - [`overrides`] — expand a base `job_config` plus override fragments into
//!   one fully-resolved document per deployment target.
//! - [`engine`] — Tera templates for `gantry new job|module`.
//!
//! ## Usage
//!
//! ```rust
//! use gantry_renderer::overrides::{expand, ComputedFields};
//! use serde_json::json;
//!
//! let base = json!({"Name": "etl", "Command": {}, "DefaultArguments": {"--a": "1"}});
//! let computed = ComputedFields {
//!     script_location: "s3://bucket/etl/main.py".to_string(),
//!     ..ComputedFields::default()
//! };
//! let docs = expand(&base, &[], &computed).unwrap();
//! assert_eq!(docs.len(), 1);
//! ```

pub mod context;
pub mod engine;
pub mod error;
pub mod overrides;

pub use context::ScaffoldContext;
pub use engine::{ScaffoldRenderer, TemplateEngine};
pub use error::RenderError;
pub use overrides::{expand, merge_override, ComputedFields};

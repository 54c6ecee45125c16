//! Declarative CI pipeline generation for a static-site publishing platform.
//!
//! Pipewright turns site records into complete, validated pipeline documents
//! for a Concourse-style coordination server, and drives the server's API to
//! install and trigger them. Generation is pure and deterministic; the same
//! target and settings always serialize to the same bytes. All network I/O
//! lives behind [`client::PipelineApiClient`] and the
//! [`publish::BuildCoordinator`] seam.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use pipewright::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings: PipelineSettings = serde_json::from_str(&config_json)?;
//!     settings.validate()?;
//!
//!     let target = PipelineTarget::new("physics-101", "phys101")
//!         .with_url_path("courses/physics-101")
//!         .with_branch("release")
//!         .with_buckets("site-web", "site-offline", "site-artifacts");
//!
//!     let client = PipelineApiClient::from_settings(&settings);
//!     let driver = PublishDriver::new(client, settings);
//!     let status = driver.publish_site(&target).await?;
//!     println!("publish status: {status}");
//!     Ok(())
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, missing_docs, rust_2018_idioms)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod builder;
pub mod client;
pub mod definition;
pub mod errors;
pub mod gating;
pub mod mass_build;
pub mod publish;
pub mod settings;
pub mod target;

/// The most commonly used types, importable in one line.
pub mod prelude {
    pub use crate::builder::SitePipelineBuilder;
    pub use crate::client::{PipelineApiClient, PipelineVersion, PublishStatus};
    pub use crate::definition::PipelineDefinition;
    pub use crate::errors::{ApiError, PipewrightError};
    pub use crate::mass_build::{MassBuildBuilder, MassBuildConfig};
    pub use crate::publish::{BuildCoordinator, PublishDriver};
    pub use crate::settings::PipelineSettings;
    pub use crate::target::{BuildVariant, PipelineTarget, PublishChannel};
}

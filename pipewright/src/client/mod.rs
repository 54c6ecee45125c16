//! HTTP client for the pipeline coordination API.
//!
//! [`PipelineApiClient`] speaks the Concourse-compatible REST surface:
//! token auth, versioned config upserts, build triggering, and build-status
//! queries. [`with_retry`] and [`RetryConfig`] implement the shared retry
//! policy; [`Transient`] classifies which failures are worth retrying.

mod api;
mod retry;
mod status;

pub use api::{PipelineApiClient, PipelineVersion, CONFIG_VERSION_HEADER};
pub use retry::{with_retry, BackoffStrategy, JitterStrategy, RetryConfig, Transient};
pub use status::{resolve_status, BuildInfo, JobInfo, PublishStatus};

//! Pipeline generation for a single site.
//!
//! The builder is pure: a deterministic function from a [`crate::target::PipelineTarget`]
//! and validated settings to a [`crate::definition::PipelineDefinition`], with
//! no I/O. Values that vary per site instance are emitted as `((site:key))`
//! placeholders backed by a var source, so one generated template serves many
//! instances via instance variables.

mod resources;
mod site;
mod steps;
mod vars;

#[cfg(test)]
mod integration_tests;

pub use resources::{
    asset_manifest, chat_alert, http_resource_type, keyval_resource_type,
    notification_resource_type, publisher_webhook, s3_iam_resource_type, site_content,
    site_projects, site_themes, HTTP_RESOURCE_TYPE, KEYVAL_RESOURCE_TYPE,
    NOTIFICATION_RESOURCE_TYPE, S3_IAM_RESOURCE_TYPE,
};
pub use site::{
    offline_site_tasks, online_site_tasks, SitePipelineBuilder, SitePipelineConfig,
};
pub use steps::{
    build_offline_step, build_online_step, filter_asset_artifacts_step, publisher_status_step,
    purge_cdn_step, site_content_fetch_step, site_content_get_step, shared_get_steps,
    static_resources_step, upload_offline_step, upload_online_step, with_failure_alert,
};
pub use vars::{hugo_arg_string, instance_vars_query, SiteVars};

/// The asset-manifest resource and input artifact name.
pub const ASSET_MANIFEST: &str = "asset-manifest";
/// Output artifact holding hashed assets filtered out of the manifest.
pub const ASSET_ARTIFACTS: &str = "asset-artifacts";
/// The site-content git resource and artifact name.
pub const SITE_CONTENT: &str = "site-content";
/// The site-themes git resource and artifact name.
pub const SITE_THEMES: &str = "site-themes";
/// The site-projects (build configuration) git resource and artifact name.
pub const SITE_PROJECTS: &str = "site-projects";
/// The publisher webhook resource name.
pub const PUBLISHER_WEBHOOK: &str = "publisher-webhook";
/// The chat notification resource name.
pub const CHAT_ALERT: &str = "chat-alert";
/// Artifact name for synced per-site static resources.
pub const STATIC_RESOURCES: &str = "static-resources";
/// Gate resource sequencing the offline job after the online job.
pub const OFFLINE_BUILD_GATE: &str = "offline-build-gate";
/// The online build job name.
pub const ONLINE_SITE_JOB: &str = "online-site-job";
/// The offline build job name.
pub const OFFLINE_SITE_JOB: &str = "offline-site-job";
/// Task name for the online site build.
pub const BUILD_ONLINE_SITE: &str = "build-online-site";
/// Task name for the online build upload.
pub const UPLOAD_ONLINE_BUILD: &str = "upload-online-build";
/// Task name for the manifest asset filter.
pub const FILTER_ASSET_ARTIFACTS: &str = "filter-asset-artifacts";
/// Task name (and output artifact) for the offline site build.
pub const BUILD_OFFLINE_SITE: &str = "build-offline-site";
/// Task name for the offline build upload.
pub const UPLOAD_OFFLINE_BUILD: &str = "upload-offline-build";
/// Task name for the CDN cache purge.
pub const CLEAR_CDN_CACHE: &str = "clear-cdn-cache";

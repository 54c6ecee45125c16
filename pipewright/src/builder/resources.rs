//! Resource and resource-type constructors shared by the pipeline builders.

use super::{ASSET_MANIFEST, CHAT_ALERT, PUBLISHER_WEBHOOK, SITE_CONTENT, SITE_PROJECTS, SITE_THEMES};
use crate::definition::{Resource, ResourceType};

/// HTTP poller/pusher resource kind, used for webhook callbacks.
pub const HTTP_RESOURCE_TYPE: &str = "http-resource";
/// Key-value resource kind backing gate resources.
pub const KEYVAL_RESOURCE_TYPE: &str = "keyval";
/// S3 resource kind authenticating via instance IAM roles.
pub const S3_IAM_RESOURCE_TYPE: &str = "s3-resource-iam";
/// Chat notification resource kind.
pub const NOTIFICATION_RESOURCE_TYPE: &str = "slack-notification";

/// Declares the HTTP resource type.
#[must_use]
pub fn http_resource_type() -> ResourceType {
    ResourceType::registry_image(HTTP_RESOURCE_TYPE, "jgriff/http-resource")
        .with_source_entry("tag", "latest")
}

/// Declares the key-value resource type gates are built on.
#[must_use]
pub fn keyval_resource_type() -> ResourceType {
    ResourceType::registry_image(KEYVAL_RESOURCE_TYPE, "ghcr.io/cludden/concourse-keyval-resource")
        .with_source_entry("tag", "latest")
}

/// Declares the IAM-authenticated S3 resource type.
#[must_use]
pub fn s3_iam_resource_type() -> ResourceType {
    ResourceType::registry_image(S3_IAM_RESOURCE_TYPE, "governmentpaas/s3-resource")
        .with_source_entry("tag", "latest")
}

/// Declares the chat notification resource type.
#[must_use]
pub fn notification_resource_type() -> ResourceType {
    ResourceType::registry_image(
        NOTIFICATION_RESOURCE_TYPE,
        "cfcommunity/slack-notification-resource",
    )
    .with_source_entry("tag", "latest")
}

/// The versioned asset manifest produced by the theme build.
#[must_use]
pub fn asset_manifest(artifacts_bucket: &str, themes_branch: &str) -> Resource {
    Resource::new(ASSET_MANIFEST, S3_IAM_RESOURCE_TYPE)
        .with_icon("language-javascript")
        .with_source_entry("bucket", artifacts_bucket)
        .with_source_entry(
            "versioned_file",
            format!("site-themes/{themes_branch}/webpack.json"),
        )
}

/// The per-site content repo on the git host.
#[must_use]
pub fn site_content(
    git_domain: &str,
    git_organization: &str,
    short_id: &str,
    branch: &str,
) -> Resource {
    Resource::new(SITE_CONTENT, "git")
        .with_icon("git")
        .with_source_entry(
            "uri",
            format!("https://{git_domain}/{git_organization}/{short_id}.git"),
        )
        .with_source_entry("branch", branch)
}

/// The shared themes repo.
#[must_use]
pub fn site_themes(uri: &str, branch: &str) -> Resource {
    Resource::new(SITE_THEMES, "git")
        .with_icon("theme-light-dark")
        .with_source_entry("uri", uri)
        .with_source_entry("branch", branch)
}

/// The build-configuration (projects) repo.
#[must_use]
pub fn site_projects(uri: &str, branch: &str) -> Resource {
    Resource::new(SITE_PROJECTS, "git")
        .with_icon("git")
        .with_source_entry("uri", uri)
        .with_source_entry("branch", branch)
}

/// The publishing platform's status webhook for one site.
#[must_use]
pub fn publisher_webhook(publisher_url: &str, site_name: &str, api_token: &str) -> Resource {
    Resource::new(PUBLISHER_WEBHOOK, HTTP_RESOURCE_TYPE)
        .with_icon("webhook")
        .with_source_entry(
            "url",
            format!("{publisher_url}/api/websites/{site_name}/pipeline_status/"),
        )
        .with_source_entry("method", "POST")
        .with_source_entry("out_only", true)
        .with_source_entry(
            "headers",
            serde_json::json!({
                "Content-Type": "application/json",
                "Authorization": format!("Bearer {api_token}"),
            }),
        )
}

/// The chat alert channel; the webhook URL resolves from cluster credentials.
#[must_use]
pub fn chat_alert() -> Resource {
    Resource::new(CHAT_ALERT, NOTIFICATION_RESOURCE_TYPE)
        .with_icon("slack")
        .with_source_entry("url", "((slack-url))")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_asset_manifest_versioned_file_tracks_branch() {
        let resource = asset_manifest("site-artifacts", "main");
        assert_eq!(resource.kind, S3_IAM_RESOURCE_TYPE);
        assert_eq!(
            resource.source.get("versioned_file"),
            Some(&serde_json::json!("site-themes/main/webpack.json"))
        );
    }

    #[test]
    fn test_site_content_uri() {
        let resource = site_content("github.example.edu", "published-sites", "phys101", "release");
        assert_eq!(
            resource.source.get("uri"),
            Some(&serde_json::json!(
                "https://github.example.edu/published-sites/phys101.git"
            ))
        );
        assert_eq!(resource.source.get("branch"), Some(&serde_json::json!("release")));
    }

    #[test]
    fn test_publisher_webhook_is_out_only() {
        let resource = publisher_webhook("https://studio.example.edu", "((site:site_name))", "t0k3n");
        assert_eq!(resource.source.get("out_only"), Some(&serde_json::json!(true)));
        assert_eq!(
            resource.source.get("url"),
            Some(&serde_json::json!(
                "https://studio.example.edu/api/websites/((site:site_name))/pipeline_status/"
            ))
        );
        let headers = resource.source.get("headers").unwrap();
        assert_eq!(headers["Authorization"], "Bearer t0k3n");
    }
}

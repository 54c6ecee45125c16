//! Deployment settings for pipeline generation.
//!
//! All required keys are checked once, eagerly, by [`PipelineSettings::validate`]
//! before any pipeline is generated or any network call is made. Downstream
//! code never re-checks presence.

use crate::errors::SettingsError;
use crate::target::PublishChannel;
use serde::{Deserialize, Serialize};

/// Environment names recognized as production deployments.
pub const PRODUCTION_ENVIRONMENTS: &[&str] = &["production", "prod"];

/// The environment name treated as a local development deployment.
pub const DEV_ENVIRONMENT: &str = "dev";

/// Overrides applied when running against local object storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DevSettings {
    /// Explicit S3 endpoint URL for the local storage service.
    pub endpoint_url: String,
    /// Storage access key injected into task params.
    pub access_key_id: String,
    /// Storage secret key injected into task params.
    pub secret_access_key: String,
}

/// Validated configuration for pipeline generation and the API client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSettings {
    /// Base URL of the CI coordination API.
    pub api_url: String,
    /// Team namespace on the coordination server.
    #[serde(default = "default_team")]
    pub api_team: String,
    /// Username for the coordination API.
    pub api_username: String,
    /// Password for the coordination API.
    pub api_password: String,
    /// Base URL of the publishing platform, used for webhook callbacks.
    pub publisher_url: String,
    /// Bearer token the generated webhook steps authenticate with.
    #[serde(default)]
    pub api_token: String,
    /// Bucket holding per-site static resources.
    pub storage_bucket: String,
    /// Base URL builds fetch published JSON from.
    pub static_api_url: String,
    /// Name of the root site, which owns the destination prefix.
    pub root_site_name: String,
    /// Branch that feeds draft builds.
    #[serde(default = "default_preview_branch")]
    pub preview_branch: String,
    /// Branch that feeds live builds.
    #[serde(default = "default_release_branch")]
    pub release_branch: String,
    /// Domain of the git host serving site-content repos.
    pub git_domain: String,
    /// Organization on the git host holding site-content repos.
    pub git_organization: String,
    /// URL of the site-themes repo.
    pub themes_url: String,
    /// Branch of the site-themes repo.
    #[serde(default = "default_repo_branch")]
    pub themes_branch: String,
    /// URL of the site-projects (build configuration) repo.
    pub projects_url: String,
    /// Branch of the site-projects repo.
    #[serde(default = "default_repo_branch")]
    pub projects_branch: String,
    /// Deployment environment name.
    #[serde(default = "default_env_name")]
    pub env_name: String,
    /// Domain emitted into site maps by the build tool.
    #[serde(default)]
    pub sitemap_domain: String,
    /// Whether CDN purges drop soft-purge semantics.
    #[serde(default = "default_hard_purge")]
    pub hard_purge: bool,
    /// Local-storage overrides, present only in dev deployments.
    #[serde(default)]
    pub dev: Option<DevSettings>,
}

fn default_team() -> String {
    "main".to_string()
}

fn default_preview_branch() -> String {
    "preview".to_string()
}

fn default_release_branch() -> String {
    "release".to_string()
}

fn default_repo_branch() -> String {
    "main".to_string()
}

fn default_env_name() -> String {
    "production".to_string()
}

const fn default_hard_purge() -> bool {
    true
}

impl PipelineSettings {
    /// Checks all required keys and URL-valued settings.
    ///
    /// # Errors
    ///
    /// Returns the first missing key or unparseable URL found.
    pub fn validate(&self) -> Result<(), SettingsError> {
        let required = [
            ("api_url", &self.api_url),
            ("api_username", &self.api_username),
            ("api_password", &self.api_password),
            ("publisher_url", &self.publisher_url),
            ("storage_bucket", &self.storage_bucket),
            ("static_api_url", &self.static_api_url),
            ("root_site_name", &self.root_site_name),
            ("git_domain", &self.git_domain),
            ("git_organization", &self.git_organization),
            ("themes_url", &self.themes_url),
            ("projects_url", &self.projects_url),
        ];
        for (key, value) in required {
            if value.trim().is_empty() {
                return Err(SettingsError::MissingKey {
                    key: key.to_string(),
                });
            }
        }

        let urls = [
            ("api_url", &self.api_url),
            ("publisher_url", &self.publisher_url),
            ("static_api_url", &self.static_api_url),
            ("themes_url", &self.themes_url),
            ("projects_url", &self.projects_url),
        ];
        for (key, value) in urls {
            if reqwest::Url::parse(value).is_err() {
                return Err(SettingsError::InvalidUrl {
                    key: key.to_string(),
                    value: (*value).clone(),
                });
            }
        }
        Ok(())
    }

    /// Whether this deployment is a recognized production environment.
    #[must_use]
    pub fn is_production(&self) -> bool {
        PRODUCTION_ENVIRONMENTS.contains(&self.env_name.as_str())
    }

    /// Whether this deployment runs against local development storage.
    #[must_use]
    pub fn is_dev(&self) -> bool {
        self.env_name == DEV_ENVIRONMENT
    }

    /// The `--endpoint-url` suffix for storage CLI commands, empty outside dev.
    #[must_use]
    pub fn cli_endpoint_url(&self) -> String {
        self.dev
            .as_ref()
            .filter(|_| self.is_dev())
            .map(|dev| format!(" --endpoint-url {}", dev.endpoint_url))
            .unwrap_or_default()
    }

    /// The publish channel a source branch feeds.
    #[must_use]
    pub fn channel_for_branch(&self, branch: &str) -> PublishChannel {
        if branch == self.preview_branch {
            PublishChannel::Draft
        } else {
            PublishChannel::Live
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::{DevSettings, PipelineSettings};

    /// Settings populated enough to pass validation, for use across tests.
    pub(crate) fn settings() -> PipelineSettings {
        PipelineSettings {
            api_url: "https://ci.example.edu".to_string(),
            api_team: "sites".to_string(),
            api_username: "pipeline-bot".to_string(),
            api_password: "secret".to_string(),
            publisher_url: "https://studio.example.edu".to_string(),
            api_token: "token-123".to_string(),
            storage_bucket: "site-storage".to_string(),
            static_api_url: "https://www.example.edu".to_string(),
            root_site_name: "home-page".to_string(),
            preview_branch: "preview".to_string(),
            release_branch: "release".to_string(),
            git_domain: "github.example.edu".to_string(),
            git_organization: "published-sites".to_string(),
            themes_url: "https://github.example.edu/ui/site-themes.git".to_string(),
            themes_branch: "main".to_string(),
            projects_url: "https://github.example.edu/ui/site-projects.git".to_string(),
            projects_branch: "main".to_string(),
            env_name: "production".to_string(),
            sitemap_domain: "www.example.edu".to_string(),
            hard_purge: true,
            dev: None,
        }
    }

    /// Settings for a dev deployment with local storage overrides.
    pub(crate) fn dev_settings() -> PipelineSettings {
        let mut settings = settings();
        settings.env_name = "dev".to_string();
        settings.dev = Some(DevSettings {
            endpoint_url: "http://localstack:4566".to_string(),
            access_key_id: "minio-access".to_string(),
            secret_access_key: "minio-secret".to_string(),
        });
        settings
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::{dev_settings, settings};
    use super::*;

    #[test]
    fn test_validate_ok() {
        assert!(settings().validate().is_ok());
    }

    #[test]
    fn test_validate_missing_key() {
        let mut s = settings();
        s.api_password = String::new();
        let err = s.validate().unwrap_err();
        assert!(matches!(err, SettingsError::MissingKey { key } if key == "api_password"));
    }

    #[test]
    fn test_validate_invalid_url() {
        let mut s = settings();
        s.themes_url = "not a url".to_string();
        let err = s.validate().unwrap_err();
        assert!(matches!(err, SettingsError::InvalidUrl { key, .. } if key == "themes_url"));
    }

    #[test]
    fn test_environment_predicates() {
        assert!(settings().is_production());
        assert!(!settings().is_dev());

        let dev = dev_settings();
        assert!(dev.is_dev());
        assert!(!dev.is_production());
    }

    #[test]
    fn test_cli_endpoint_url() {
        assert_eq!(settings().cli_endpoint_url(), "");
        assert_eq!(
            dev_settings().cli_endpoint_url(),
            " --endpoint-url http://localstack:4566"
        );
    }

    #[test]
    fn test_channel_for_branch() {
        let s = settings();
        assert_eq!(s.channel_for_branch("preview"), PublishChannel::Draft);
        assert_eq!(s.channel_for_branch("release"), PublishChannel::Live);
        assert_eq!(s.channel_for_branch("feature-x"), PublishChannel::Live);
    }
}

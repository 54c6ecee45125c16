//! Build targets and variant enums.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The build variant of a site: served online output or downloadable archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildVariant {
    /// The searchable, served site.
    Online,
    /// The downloadable offline archive.
    Offline,
}

impl BuildVariant {
    /// Returns the variant as a lowercase string.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Online => "online",
            Self::Offline => "offline",
        }
    }
}

impl fmt::Display for BuildVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The publish channel a pipeline builds for.
///
/// Draft pipelines build from the preview branch into the preview buckets;
/// live pipelines build from the release branch into the publish buckets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PublishChannel {
    /// Preview builds, visible to editors only.
    Draft,
    /// Published builds, served to the public.
    Live,
}

impl PublishChannel {
    /// Returns the channel as a lowercase string.
    ///
    /// This string doubles as the pipeline name on the coordination server.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Live => "live",
        }
    }
}

impl fmt::Display for PublishChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One buildable site: identity, source branch, and destination storage.
///
/// Targets are immutable once constructed; they are created from external
/// site records and consumed only by the pipeline builders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineTarget {
    /// The site name, unique across the platform.
    pub name: String,
    /// Short identifier used for repo names and archive filenames.
    pub short_id: String,
    /// The URL path the site is served under.
    pub url_path: String,
    /// The object-storage prefix holding the site's static resources.
    pub s3_path: String,
    /// The source branch to build from.
    pub branch: String,
    /// Whether this is the root site owning the destination prefix.
    pub is_root_site: bool,
    /// Destination bucket for the served site.
    pub web_bucket: String,
    /// Destination bucket for the offline archive.
    pub offline_bucket: String,
    /// Versioned bucket holding the asset manifest.
    pub artifacts_bucket: String,
    /// Directory in the site-projects repo holding this site's build config.
    pub project: String,
    /// Build-tool argument overrides, e.g. `"--verbose --minify"`.
    pub hugo_arg_overrides: Option<String>,
}

impl PipelineTarget {
    /// Creates a new target with empty paths and buckets.
    #[must_use]
    pub fn new(name: impl Into<String>, short_id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            short_id: short_id.into(),
            url_path: String::new(),
            s3_path: String::new(),
            branch: String::new(),
            is_root_site: false,
            web_bucket: String::new(),
            offline_bucket: String::new(),
            artifacts_bucket: String::new(),
            project: "site".to_string(),
            hugo_arg_overrides: None,
        }
    }

    /// Sets the URL path.
    #[must_use]
    pub fn with_url_path(mut self, path: impl Into<String>) -> Self {
        self.url_path = path.into();
        self
    }

    /// Sets the storage prefix.
    #[must_use]
    pub fn with_s3_path(mut self, path: impl Into<String>) -> Self {
        self.s3_path = path.into();
        self
    }

    /// Sets the source branch.
    #[must_use]
    pub fn with_branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = branch.into();
        self
    }

    /// Marks the target as the root site.
    #[must_use]
    pub const fn root_site(mut self) -> Self {
        self.is_root_site = true;
        self
    }

    /// Sets the destination buckets.
    #[must_use]
    pub fn with_buckets(
        mut self,
        web: impl Into<String>,
        offline: impl Into<String>,
        artifacts: impl Into<String>,
    ) -> Self {
        self.web_bucket = web.into();
        self.offline_bucket = offline.into();
        self.artifacts_bucket = artifacts.into();
        self
    }

    /// Sets the build-configuration directory in the site-projects repo.
    #[must_use]
    pub fn with_project(mut self, project: impl Into<String>) -> Self {
        self.project = project.into();
        self
    }

    /// Sets build-tool argument overrides.
    #[must_use]
    pub fn with_hugo_arg_overrides(mut self, overrides: impl Into<String>) -> Self {
        self.hugo_arg_overrides = Some(overrides.into());
        self
    }
}

//! Publish status vocabulary and build-status resolution.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The status of a site's latest publish, as reported to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PublishStatus {
    /// No build has ever been scheduled for the pipeline.
    NotStarted,
    /// A build is scheduled but not yet running.
    Pending,
    /// A build is currently running.
    Started,
    /// The most recent build succeeded.
    Succeeded,
    /// The most recent build failed.
    Failed,
    /// The most recent build errored before completing.
    Errored,
    /// The most recent build was aborted.
    Aborted,
}

impl PublishStatus {
    /// Whether the status is terminal for the current build.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Succeeded | Self::Failed | Self::Errored | Self::Aborted
        )
    }
}

impl fmt::Display for PublishStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::NotStarted => "not-started",
            Self::Pending => "pending",
            Self::Started => "started",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Errored => "errored",
            Self::Aborted => "aborted",
        };
        f.write_str(s)
    }
}

/// Summary of one build as reported by the coordination server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct BuildInfo {
    /// Server-assigned build id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    /// Reported status, absent while the server has not assigned one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<PublishStatus>,
}

/// Job information from the coordination server's job endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct JobInfo {
    /// The queued build that has not finished yet, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_build: Option<BuildInfo>,
    /// The most recently finished build, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_build: Option<BuildInfo>,
}

/// Resolves job information into a publish status.
///
/// A pending next build takes priority over any finished build; otherwise the
/// finished build's reported status is returned, defaulting to
/// [`PublishStatus::NotStarted`] when the server omits it or no job
/// information exists at all.
#[must_use]
pub fn resolve_status(job_info: Option<&JobInfo>) -> PublishStatus {
    let Some(info) = job_info else {
        return PublishStatus::NotStarted;
    };

    if info
        .next_build
        .as_ref()
        .is_some_and(|build| build.status == Some(PublishStatus::Pending))
    {
        return PublishStatus::Pending;
    }

    info.finished_build
        .as_ref()
        .and_then(|build| build.status)
        .unwrap_or(PublishStatus::NotStarted)
}

//! The publish driver: build a definition, push it, kick off a build.

use crate::builder::{SitePipelineBuilder, ONLINE_SITE_JOB};
use crate::client::{PipelineApiClient, PipelineVersion, PublishStatus};
use crate::definition::PipelineDefinition;
use crate::errors::{ApiError, PipewrightError};
use crate::settings::PipelineSettings;
use crate::target::PipelineTarget;
use async_trait::async_trait;

/// The coordination-server operations the publish driver depends on.
///
/// [`PipelineApiClient`] is the production implementation; tests substitute
/// a mock.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BuildCoordinator: Send + Sync {
    /// Fetches a pipeline's config and version token.
    async fn fetch_config(
        &self,
        pipeline: &str,
        site: &str,
    ) -> Result<(PipelineDefinition, Option<PipelineVersion>), ApiError>;

    /// Creates or replaces a pipeline's config.
    async fn upsert_config<'a>(
        &self,
        pipeline: &str,
        site: &str,
        definition: &PipelineDefinition,
        version: Option<&'a PipelineVersion>,
    ) -> Result<(), ApiError>;

    /// Unpauses the pipeline.
    async fn unpause(&self, pipeline: &str, site: &str) -> Result<(), ApiError>;

    /// Triggers a new build of the named job.
    async fn trigger_build(&self, pipeline: &str, site: &str, job: &str) -> Result<(), ApiError>;

    /// Reports the status of the named job's latest build.
    async fn latest_status(
        &self,
        pipeline: &str,
        site: &str,
        job: &str,
    ) -> Result<PublishStatus, ApiError>;
}

#[async_trait]
impl BuildCoordinator for PipelineApiClient {
    async fn fetch_config(
        &self,
        pipeline: &str,
        site: &str,
    ) -> Result<(PipelineDefinition, Option<PipelineVersion>), ApiError> {
        Self::fetch_config(self, pipeline, site).await
    }

    async fn upsert_config<'a>(
        &self,
        pipeline: &str,
        site: &str,
        definition: &PipelineDefinition,
        version: Option<&'a PipelineVersion>,
    ) -> Result<(), ApiError> {
        Self::upsert_config(self, pipeline, site, definition, version).await
    }

    async fn unpause(&self, pipeline: &str, site: &str) -> Result<(), ApiError> {
        Self::unpause(self, pipeline, site).await
    }

    async fn trigger_build(&self, pipeline: &str, site: &str, job: &str) -> Result<(), ApiError> {
        Self::trigger_build(self, pipeline, site, job).await
    }

    async fn latest_status(
        &self,
        pipeline: &str,
        site: &str,
        job: &str,
    ) -> Result<PublishStatus, ApiError> {
        Self::latest_status(self, pipeline, site, job).await
    }
}

/// The outcome of publishing one site in a mass operation.
#[derive(Debug)]
pub struct SitePublishOutcome {
    /// The site name.
    pub site: String,
    /// The publish status, or the failure that aborted this site's update.
    pub result: Result<PublishStatus, PipewrightError>,
}

/// Coordinates generate, upsert, unpause, trigger, and status for sites.
#[derive(Debug)]
pub struct PublishDriver<C> {
    coordinator: C,
    settings: PipelineSettings,
}

impl<C: BuildCoordinator> PublishDriver<C> {
    /// Creates a driver over a coordinator and validated settings.
    #[must_use]
    pub fn new(coordinator: C, settings: PipelineSettings) -> Self {
        Self {
            coordinator,
            settings,
        }
    }

    /// Publishes one site: generates its pipeline, pushes the config, and
    /// triggers the online job.
    ///
    /// The version token is read immediately before the update; a pipeline
    /// that does not exist yet is created by upserting without a token.
    ///
    /// # Errors
    ///
    /// Returns generation failures, API failures after retries, or a version
    /// conflict the caller must resolve by re-invoking the publish.
    pub async fn publish_site(
        &self,
        target: &PipelineTarget,
    ) -> Result<PublishStatus, PipewrightError> {
        let channel = self.settings.channel_for_branch(&target.branch);
        let pipeline = channel.as_str();
        let definition = SitePipelineBuilder::build(target, channel, &self.settings)?;

        let version = match self.coordinator.fetch_config(pipeline, &target.name).await {
            Ok((_, version)) => version,
            Err(ApiError::NotFound { .. }) => None,
            Err(e) => return Err(e.into()),
        };
        self.coordinator
            .upsert_config(pipeline, &target.name, &definition, version.as_ref())
            .await?;
        self.coordinator.unpause(pipeline, &target.name).await?;
        self.coordinator
            .trigger_build(pipeline, &target.name, ONLINE_SITE_JOB)
            .await?;

        let status = self
            .coordinator
            .latest_status(pipeline, &target.name, ONLINE_SITE_JOB)
            .await?;
        tracing::info!(site = %target.name, pipeline, %status, "publish triggered");
        Ok(status)
    }

    /// Publishes many sites, isolating failures per site.
    ///
    /// One site's invalid configuration or failed update never blocks the
    /// others; each outcome is reported individually.
    pub async fn publish_all(&self, targets: &[PipelineTarget]) -> Vec<SitePublishOutcome> {
        let mut outcomes = Vec::with_capacity(targets.len());
        for target in targets {
            let result = self.publish_site(target).await;
            if let Err(e) = &result {
                tracing::warn!(site = %target.name, error = %e, "site publish failed");
            }
            outcomes.push(SitePublishOutcome {
                site: target.name.clone(),
                result,
            });
        }
        outcomes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::test_support::settings;
    use mockall::predicate::eq;

    fn target() -> PipelineTarget {
        PipelineTarget::new("physics-101", "phys101")
            .with_url_path("courses/physics-101")
            .with_branch("release")
            .with_buckets("site-web", "site-offline", "site-artifacts")
    }

    #[tokio::test]
    async fn test_publish_creates_missing_pipeline() {
        let mut coordinator = MockBuildCoordinator::new();
        coordinator
            .expect_fetch_config()
            .with(eq("live"), eq("physics-101"))
            .times(1)
            .returning(|_, _| {
                Err(ApiError::NotFound {
                    path: "/api/v1/teams/sites/pipelines/live/config".to_string(),
                })
            });
        coordinator
            .expect_upsert_config()
            .withf(|pipeline, site, definition, version| {
                pipeline == "live"
                    && site == "physics-101"
                    && definition.jobs.len() == 2
                    && version.is_none()
            })
            .times(1)
            .returning(|_, _, _, _| Ok(()));
        coordinator
            .expect_unpause()
            .with(eq("live"), eq("physics-101"))
            .times(1)
            .returning(|_, _| Ok(()));
        coordinator
            .expect_trigger_build()
            .with(eq("live"), eq("physics-101"), eq(ONLINE_SITE_JOB))
            .times(1)
            .returning(|_, _, _| Ok(()));
        coordinator
            .expect_latest_status()
            .times(1)
            .returning(|_, _, _| Ok(PublishStatus::Pending));

        let driver = PublishDriver::new(coordinator, settings());
        let status = driver.publish_site(&target()).await.unwrap();
        assert_eq!(status, PublishStatus::Pending);
    }

    #[tokio::test]
    async fn test_publish_echoes_version_token() {
        let mut coordinator = MockBuildCoordinator::new();
        coordinator
            .expect_fetch_config()
            .times(1)
            .returning(|_, _| {
                Ok((PipelineDefinition::default(), Some(PipelineVersion::new("42"))))
            });
        coordinator
            .expect_upsert_config()
            .withf(|_, _, _, version| version.map(PipelineVersion::as_str) == Some("42"))
            .times(1)
            .returning(|_, _, _, _| Ok(()));
        coordinator.expect_unpause().returning(|_, _| Ok(()));
        coordinator.expect_trigger_build().returning(|_, _, _| Ok(()));
        coordinator
            .expect_latest_status()
            .returning(|_, _, _| Ok(PublishStatus::Started));

        let driver = PublishDriver::new(coordinator, settings());
        let status = driver.publish_site(&target()).await.unwrap();
        assert_eq!(status, PublishStatus::Started);
    }

    #[tokio::test]
    async fn test_preview_branch_publishes_draft_pipeline() {
        let mut coordinator = MockBuildCoordinator::new();
        coordinator
            .expect_fetch_config()
            .withf(|pipeline, _| pipeline == "draft")
            .times(1)
            .returning(|_, _| {
                Err(ApiError::NotFound {
                    path: "/config".to_string(),
                })
            });
        coordinator
            .expect_upsert_config()
            .withf(|pipeline, _, _, _| pipeline == "draft")
            .returning(|_, _, _, _| Ok(()));
        coordinator.expect_unpause().returning(|_, _| Ok(()));
        coordinator.expect_trigger_build().returning(|_, _, _| Ok(()));
        coordinator
            .expect_latest_status()
            .returning(|_, _, _| Ok(PublishStatus::Pending));

        let driver = PublishDriver::new(coordinator, settings());
        driver
            .publish_site(&target().with_branch("preview"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_publish_all_isolates_failures() {
        let mut coordinator = MockBuildCoordinator::new();
        coordinator
            .expect_fetch_config()
            .returning(|_, _| {
                Err(ApiError::NotFound {
                    path: "/config".to_string(),
                })
            });
        coordinator
            .expect_upsert_config()
            .returning(|_, site, _, _| {
                if site == "site-1" {
                    Err(ApiError::Client {
                        status: 400,
                        path: "/config".to_string(),
                    })
                } else {
                    Ok(())
                }
            });
        coordinator.expect_unpause().returning(|_, _| Ok(()));
        coordinator.expect_trigger_build().returning(|_, _, _| Ok(()));
        coordinator
            .expect_latest_status()
            .returning(|_, _, _| Ok(PublishStatus::Pending));

        let targets = vec![
            PipelineTarget::new("site-1", "s1")
                .with_url_path("courses/site-1")
                .with_branch("release"),
            PipelineTarget::new("site-2", "s2")
                .with_url_path("courses/site-2")
                .with_branch("release"),
        ];
        let driver = PublishDriver::new(coordinator, settings());
        let outcomes = driver.publish_all(&targets).await;

        assert_eq!(outcomes.len(), 2);
        assert_eq!(outcomes[0].site, "site-1");
        assert!(outcomes[0].result.is_err());
        assert!(outcomes[1].result.is_ok());
    }
}

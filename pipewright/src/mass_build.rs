//! Mass-build pipeline assembly: batching, gating, and across fan-out.
//!
//! Targets are partitioned into fixed-size batches. Each batch becomes one
//! job whose sites are expanded into a single across fan-out step bounded by
//! `max_in_flight`; batch partitioning only bounds the gating graph's width.
//! A failing site does not block its batch siblings, but a failing batch job
//! keeps the next batch's gate get from succeeding, halting later batches.

use crate::builder::{
    asset_manifest, chat_alert, filter_asset_artifacts_step, http_resource_type,
    keyval_resource_type, notification_resource_type, offline_site_tasks, online_site_tasks,
    publisher_webhook, s3_iam_resource_type, site_content_fetch_step, site_projects, site_themes,
    SitePipelineConfig, SiteVars, ASSET_MANIFEST, SITE_PROJECTS, SITE_THEMES,
};
use crate::definition::{AcrossVar, DoStep, GetStep, Job, PipelineDefinition, Step};
use crate::errors::{PipelineValidationError, PipewrightError};
use crate::gating;
use crate::settings::PipelineSettings;
use crate::target::{BuildVariant, PipelineTarget, PublishChannel};

/// Base name for batch jobs; job i is `mass-build-sites-batch-i`.
pub const MASS_BUILD_JOB: &str = "mass-build-sites";
/// Base name for inter-batch gates; the gate after batch i is `batch-gate-i`.
pub const BATCH_GATE: &str = "batch-gate";

/// Knobs for a mass build.
#[derive(Debug, Clone)]
pub struct MassBuildConfig {
    /// Maximum targets per batch job.
    pub batch_size: usize,
    /// Bound on concurrently building sites within a batch.
    pub max_in_flight: u32,
    /// Which build variant the fan-out runs for each site.
    pub variant: BuildVariant,
    /// Versioned bucket holding the asset manifest.
    pub artifacts_bucket: String,
    /// Web bucket hashed assets are filtered from for offline builds.
    pub web_bucket: String,
}

impl MassBuildConfig {
    /// Creates a mass-build configuration.
    #[must_use]
    pub fn new(batch_size: usize, max_in_flight: u32, variant: BuildVariant) -> Self {
        Self {
            batch_size,
            max_in_flight,
            variant,
            artifacts_bucket: String::new(),
            web_bucket: String::new(),
        }
    }

    /// Sets the artifact and web buckets batch-level steps read from.
    #[must_use]
    pub fn with_buckets(
        mut self,
        artifacts: impl Into<String>,
        web: impl Into<String>,
    ) -> Self {
        self.artifacts_bucket = artifacts.into();
        self.web_bucket = web.into();
        self
    }
}

/// Builds the multi-job mass-build pipeline.
#[derive(Debug)]
pub struct MassBuildBuilder;

impl MassBuildBuilder {
    /// Assembles and validates the mass-build pipeline for the given targets.
    ///
    /// Targets are batched in input order so identical inputs always produce
    /// an identical graph.
    ///
    /// # Errors
    ///
    /// Returns a validation error for an empty batch size, an encoding
    /// failure from instance addressing, or the first violated structural
    /// invariant of the assembled graph.
    pub fn build(
        targets: &[PipelineTarget],
        channel: PublishChannel,
        settings: &PipelineSettings,
        config: &MassBuildConfig,
    ) -> Result<PipelineDefinition, PipewrightError> {
        if config.batch_size == 0 {
            return Err(PipelineValidationError::new("batch size must be at least 1").into());
        }

        let vars = SiteVars::across("site");
        let pipeline_name = channel.as_str();

        let resource_types = vec![
            http_resource_type(),
            keyval_resource_type(),
            notification_resource_type(),
            s3_iam_resource_type(),
        ];
        let mut resources = vec![
            asset_manifest(&config.artifacts_bucket, &settings.themes_branch),
            site_themes(&settings.themes_url, &settings.themes_branch),
            site_projects(&settings.projects_url, &settings.projects_branch),
            publisher_webhook(&settings.publisher_url, MASS_BUILD_JOB, &settings.api_token),
            chat_alert(),
        ];

        let mut site_tasks = vec![site_content_fetch_step(&vars, settings)];
        site_tasks.extend(match config.variant {
            BuildVariant::Online => online_site_tasks(&vars, settings, pipeline_name),
            BuildVariant::Offline => offline_site_tasks(&vars, settings, pipeline_name),
        });

        let mut jobs = Vec::new();
        for (index, batch) in targets.chunks(config.batch_size).enumerate() {
            let mut values = Vec::with_capacity(batch.len());
            for target in batch {
                let site_config =
                    SitePipelineConfig::new(target, channel, settings, SiteVars::across("site"))?;
                values.push(serde_json::Value::Object(
                    site_config.values.into_iter().collect(),
                ));
            }

            let mut plan = vec![
                Self::batch_get(ASSET_MANIFEST),
                Self::batch_get(SITE_THEMES),
                Self::batch_get(SITE_PROJECTS),
            ];
            if config.variant == BuildVariant::Offline {
                plan.push(filter_asset_artifacts_step(&config.web_bucket, settings));
            }
            plan.push(
                DoStep::new(site_tasks.clone())
                    .with_across(AcrossVar {
                        var: "site".to_string(),
                        values,
                        max_in_flight: Some(config.max_in_flight),
                    })
                    .into(),
            );
            jobs.push(Job::new(
                format!("{MASS_BUILD_JOB}-batch-{}", index + 1),
                plan,
            ));
        }

        // Gate each batch on its predecessor's success.
        for index in 1..jobs.len() {
            let gate_name = format!("{BATCH_GATE}-{index}");
            let (upstream, downstream) = jobs.split_at_mut(index);
            resources.push(gating::gate(
                &mut upstream[index - 1],
                &mut downstream[0],
                &gate_name,
            ));
        }

        let pipeline = PipelineDefinition {
            var_sources: Vec::new(),
            resource_types,
            resources,
            jobs,
        };
        pipeline.validate()?;
        tracing::debug!(
            targets = targets.len(),
            batches = pipeline.jobs.len(),
            variant = %config.variant,
            "generated mass build pipeline"
        );
        Ok(pipeline)
    }

    fn batch_get(resource: &str) -> Step {
        Step::from(GetStep::new(resource))
            .with_timeout("5m")
            .with_attempts(3)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::test_support::settings;
    use pretty_assertions::assert_eq;

    fn targets(count: usize) -> Vec<PipelineTarget> {
        (1..=count)
            .map(|i| {
                PipelineTarget::new(format!("site-{i}"), format!("s{i}"))
                    .with_url_path(format!("courses/site-{i}"))
                    .with_branch("release")
                    .with_buckets("site-web", "site-offline", "site-artifacts")
            })
            .collect()
    }

    fn mass_config(variant: BuildVariant) -> MassBuildConfig {
        MassBuildConfig::new(3, 2, variant).with_buckets("site-artifacts", "site-web")
    }

    #[test]
    fn test_seven_targets_batch_into_three_jobs_and_two_gates() {
        let pipeline = MassBuildBuilder::build(
            &targets(7),
            PublishChannel::Live,
            &settings(),
            &mass_config(BuildVariant::Online),
        )
        .unwrap();

        assert_eq!(pipeline.jobs.len(), 3);
        let gates: Vec<&str> = pipeline
            .resources
            .iter()
            .filter(|r| r.name.starts_with(BATCH_GATE))
            .map(|r| r.name.as_str())
            .collect();
        assert_eq!(gates, vec!["batch-gate-1", "batch-gate-2"]);

        // Batch 3 is gated on batch 2's job through batch-gate-2.
        let Step::Get(gate_get) = &pipeline.jobs[2].plan[0] else {
            panic!("batch job must open with the gate get");
        };
        assert_eq!(gate_get.get, "batch-gate-2");
        assert!(gate_get.trigger);
        assert_eq!(gate_get.passed, vec!["mass-build-sites-batch-2".to_string()]);

        let Step::Put(gate_put) = pipeline.jobs[1].plan.last().unwrap() else {
            panic!("non-final batch job must close with a gate put");
        };
        assert_eq!(gate_put.put, "batch-gate-2");
    }

    #[test]
    fn test_batch_sizes_preserve_input_order() {
        let pipeline = MassBuildBuilder::build(
            &targets(7),
            PublishChannel::Live,
            &settings(),
            &mass_config(BuildVariant::Online),
        )
        .unwrap();

        let batch_values: Vec<Vec<String>> = pipeline
            .jobs
            .iter()
            .map(|job| {
                let across = job
                    .plan
                    .iter()
                    .find_map(|step| match step {
                        Step::Do(d) if !d.attrs.across.is_empty() => Some(&d.attrs.across[0]),
                        _ => None,
                    })
                    .expect("each batch job carries one across fan-out");
                across
                    .values
                    .iter()
                    .map(|v| v["site_name"].as_str().unwrap_or_default().to_string())
                    .collect()
            })
            .collect();

        assert_eq!(batch_values[0], vec!["site-1", "site-2", "site-3"]);
        assert_eq!(batch_values[1], vec!["site-4", "site-5", "site-6"]);
        assert_eq!(batch_values[2], vec!["site-7"]);
    }

    #[test]
    fn test_across_bounded_by_max_in_flight() {
        let pipeline = MassBuildBuilder::build(
            &targets(4),
            PublishChannel::Live,
            &settings(),
            &mass_config(BuildVariant::Online),
        )
        .unwrap();

        for job in &pipeline.jobs {
            let across = job
                .plan
                .iter()
                .find_map(|step| match step {
                    Step::Do(d) if !d.attrs.across.is_empty() => Some(&d.attrs.across[0]),
                    _ => None,
                })
                .unwrap();
            assert_eq!(across.var, "site");
            assert_eq!(across.max_in_flight, Some(2));
        }
    }

    #[test]
    fn test_offline_variant_adds_filter_step() {
        let offline = MassBuildBuilder::build(
            &targets(2),
            PublishChannel::Live,
            &settings(),
            &mass_config(BuildVariant::Offline),
        )
        .unwrap();
        let has_filter = offline.jobs[0].plan.iter().any(
            |step| matches!(step, Step::Task(t) if t.task == crate::builder::FILTER_ASSET_ARTIFACTS),
        );
        assert!(has_filter);

        let online = MassBuildBuilder::build(
            &targets(2),
            PublishChannel::Live,
            &settings(),
            &mass_config(BuildVariant::Online),
        )
        .unwrap();
        let has_filter = online.jobs[0].plan.iter().any(
            |step| matches!(step, Step::Task(t) if t.task == crate::builder::FILTER_ASSET_ARTIFACTS),
        );
        assert!(!has_filter);
    }

    #[test]
    fn test_single_batch_declares_no_gates() {
        let pipeline = MassBuildBuilder::build(
            &targets(3),
            PublishChannel::Live,
            &settings(),
            &mass_config(BuildVariant::Online),
        )
        .unwrap();
        assert_eq!(pipeline.jobs.len(), 1);
        assert!(!pipeline.resources.iter().any(|r| r.name.starts_with(BATCH_GATE)));
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        let config = MassBuildConfig::new(0, 2, BuildVariant::Online)
            .with_buckets("site-artifacts", "site-web");
        let err = MassBuildBuilder::build(&targets(1), PublishChannel::Live, &settings(), &config)
            .unwrap_err();
        assert!(matches!(err, PipewrightError::Validation(_)));
    }
}

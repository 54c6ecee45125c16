//! Single-site pipeline assembly.

use super::resources::{
    asset_manifest, chat_alert, http_resource_type, keyval_resource_type,
    notification_resource_type, publisher_webhook, s3_iam_resource_type, site_content,
    site_projects, site_themes,
};
use super::steps::{
    build_offline_step, build_online_step, filter_asset_artifacts_step, publisher_status_step,
    purge_cdn_step, site_content_get_step, shared_get_steps, static_resources_step,
    upload_offline_step, upload_online_step,
};
use super::vars::{hugo_arg_string, instance_vars_query, SiteVars};
use super::{OFFLINE_BUILD_GATE, OFFLINE_SITE_JOB, ONLINE_SITE_JOB, SITE_PROJECTS, SITE_THEMES};
use crate::definition::{Job, PipelineDefinition, Step, VarSource};
use crate::errors::PipewrightError;
use crate::gating;
use crate::settings::PipelineSettings;
use crate::target::{PipelineTarget, PublishChannel};
use serde_json::Value;
use std::collections::BTreeMap;

/// Derived per-site configuration: placeholders plus the values backing them.
///
/// All path, flag, and argument-string derivations happen here, once, at
/// construction; the step constructors only ever see placeholders.
#[derive(Debug, Clone)]
pub struct SitePipelineConfig {
    /// Placeholders the generated steps reference.
    pub vars: SiteVars,
    /// The per-site values resolved into the placeholders.
    pub values: BTreeMap<String, Value>,
    /// The literal pipeline name on the coordination server.
    pub pipeline_name: String,
    /// Whether the target is the root site.
    pub is_root_site: bool,
}

impl SitePipelineConfig {
    /// Computes the per-site derivations for one target.
    ///
    /// # Errors
    ///
    /// Returns [`PipewrightError::Encoding`] when the instance-variables
    /// query string cannot be encoded, or [`PipewrightError::Validation`]
    /// when the target's argument overrides are malformed.
    pub fn new(
        target: &PipelineTarget,
        channel: PublishChannel,
        settings: &PipelineSettings,
        vars: SiteVars,
    ) -> Result<Self, PipewrightError> {
        let is_root_site = target.is_root_site || target.name == settings.root_site_name;

        // The root site owns the whole destination prefix: it syncs into the
        // bucket root and must never delete other sites' files.
        let (base_url, static_resources_subdirectory, delete_flag) = if is_root_site {
            (
                String::new(),
                format!("/{}/", target.url_path),
                String::new(),
            )
        } else {
            (target.url_path.clone(), "/".to_string(), " --delete".to_string())
        };

        let noindex = if target.branch == settings.preview_branch || !settings.is_production() {
            "true"
        } else {
            "false"
        };

        let pipeline_name = channel.as_str().to_string();
        let instance_vars = instance_vars_query(&target.name)?;

        let mut base_args = BTreeMap::new();
        base_args.insert(
            "--themesDir".to_string(),
            format!("../{SITE_THEMES}/"),
        );
        let mut online_args = base_args.clone();
        online_args.insert(
            "--config".to_string(),
            format!("../{SITE_PROJECTS}/{}/config.yaml", target.project),
        );
        online_args.insert("--baseURL".to_string(), format!("/{base_url}"));
        online_args.insert("--destination".to_string(), "output-online".to_string());
        let mut offline_args = base_args;
        offline_args.insert(
            "--config".to_string(),
            format!("../{SITE_PROJECTS}/{}/config-offline.yaml", target.project),
        );
        offline_args.insert("--baseURL".to_string(), "/".to_string());
        offline_args.insert("--destination".to_string(), "output-offline".to_string());

        let overrides = target.hugo_arg_overrides.as_deref();
        let hugo_args_online = hugo_arg_string(&online_args, overrides)?;
        let hugo_args_offline = hugo_arg_string(&offline_args, overrides)?;

        let mut values = BTreeMap::new();
        let mut set = |key: &str, value: &str| {
            values.insert(key.to_string(), Value::String(value.to_string()));
        };
        set("is_root_website", if is_root_site { "true" } else { "" });
        set("short_id", &target.short_id);
        set("site_name", &target.name);
        set("s3_path", &target.s3_path);
        set("url_path", &target.url_path);
        set("base_url", &base_url);
        set("static_resources_subdirectory", &static_resources_subdirectory);
        set("delete_flag", &delete_flag);
        set("noindex", noindex);
        set("pipeline_name", &pipeline_name);
        set("instance_vars", &instance_vars);
        set("static_api_url", &settings.static_api_url);
        set("storage_bucket", &settings.storage_bucket);
        set("artifacts_bucket", &target.artifacts_bucket);
        set("web_bucket", &target.web_bucket);
        set("offline_bucket", &target.offline_bucket);
        set("site_content_branch", &target.branch);
        set("themes_branch", &settings.themes_branch);
        set("projects_url", &settings.projects_url);
        set("projects_branch", &settings.projects_branch);
        set("hugo_args_online", &hugo_args_online);
        set("hugo_args_offline", &hugo_args_offline);

        Ok(Self {
            vars,
            values,
            pipeline_name,
            is_root_site,
        })
    }
}

/// The task sequence building and publishing the served site.
#[must_use]
pub fn online_site_tasks(
    vars: &SiteVars,
    settings: &PipelineSettings,
    pipeline_name: &str,
) -> Vec<Step> {
    let mut tasks = vec![
        static_resources_step(vars, settings),
        build_online_step(vars, settings),
        upload_online_step(vars, settings)
            .on_success(publisher_status_step(vars, "succeeded")),
    ];
    if !settings.is_dev() {
        tasks.push(
            purge_cdn_step(vars, settings, pipeline_name)
                .on_success(publisher_status_step(vars, "succeeded")),
        );
    }
    tasks
}

/// The task sequence building and publishing the offline archive.
#[must_use]
pub fn offline_site_tasks(
    vars: &SiteVars,
    settings: &PipelineSettings,
    pipeline_name: &str,
) -> Vec<Step> {
    let mut tasks = vec![
        static_resources_step(vars, settings),
        build_offline_step(vars, settings),
        upload_offline_step(vars, settings)
            .on_success(publisher_status_step(vars, "succeeded")),
    ];
    if !settings.is_dev() {
        tasks.push(
            purge_cdn_step(vars, settings, pipeline_name)
                .on_success(publisher_status_step(vars, "succeeded")),
        );
    }
    tasks
}

/// Builds the two-job pipeline for a single site.
#[derive(Debug)]
pub struct SitePipelineBuilder;

impl SitePipelineBuilder {
    /// Assembles and validates the full pipeline for one target.
    ///
    /// The online job always runs first; the offline job is gated on its
    /// success through the offline build gate. Per-site values travel in a
    /// `site` var source so the serialized template is identical across
    /// instances apart from that one block.
    ///
    /// # Errors
    ///
    /// Returns encoding failures from instance addressing or the first
    /// violated structural invariant of the assembled graph.
    pub fn build(
        target: &PipelineTarget,
        channel: PublishChannel,
        settings: &PipelineSettings,
    ) -> Result<PipelineDefinition, PipewrightError> {
        let config = SitePipelineConfig::new(target, channel, settings, SiteVars::source("site"))?;
        let vars = &config.vars;

        let resource_types = vec![
            http_resource_type(),
            keyval_resource_type(),
            notification_resource_type(),
            s3_iam_resource_type(),
        ];
        let mut resources = vec![
            asset_manifest(&vars.artifacts_bucket, &vars.themes_branch),
            site_content(
                &settings.git_domain,
                &settings.git_organization,
                &vars.short_id,
                &vars.site_content_branch,
            ),
            site_themes(&settings.themes_url, &vars.themes_branch),
            site_projects(&vars.projects_url, &vars.projects_branch),
            publisher_webhook(&settings.publisher_url, &vars.site_name, &settings.api_token),
            chat_alert(),
        ];

        let mut online_job = Self::online_job(&config, settings);
        let mut offline_job = Self::offline_job(&config, settings);
        resources.push(gating::gate(&mut online_job, &mut offline_job, OFFLINE_BUILD_GATE));

        let pipeline = PipelineDefinition {
            var_sources: vec![VarSource::dummy("site", config.values.clone())],
            resource_types,
            resources,
            jobs: vec![online_job, offline_job],
        };
        pipeline.validate()?;
        tracing::debug!(site = %target.name, pipeline = %config.pipeline_name, "generated site pipeline");
        Ok(pipeline)
    }

    fn online_job(config: &SitePipelineConfig, settings: &PipelineSettings) -> Job {
        let vars = &config.vars;
        let mut plan = vec![publisher_status_step(vars, "started")];
        plan.extend(shared_get_steps(vars, None));
        plan.push(site_content_get_step(vars, None));
        plan.extend(online_site_tasks(vars, settings, &config.pipeline_name));
        Job::new(ONLINE_SITE_JOB, plan).serial()
    }

    fn offline_job(config: &SitePipelineConfig, settings: &PipelineSettings) -> Job {
        let vars = &config.vars;
        let mut plan = shared_get_steps(vars, Some(ONLINE_SITE_JOB));
        plan.push(site_content_get_step(vars, Some(ONLINE_SITE_JOB)));
        plan.push(filter_asset_artifacts_step(&vars.web_bucket, settings));
        plan.extend(offline_site_tasks(vars, settings, &config.pipeline_name));
        Job::new(OFFLINE_SITE_JOB, plan).serial()
    }
}

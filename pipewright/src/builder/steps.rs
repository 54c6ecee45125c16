//! Step constructors for the generated build jobs.
//!
//! Every constructor takes all of its conditioning inputs (placeholders,
//! settings, environment) up front and returns a fully formed step; nothing
//! mutates a step after construction. Externally visible steps are wrapped
//! with [`with_failure_alert`] so a failure anywhere in a plan is reported to
//! the publisher webhook and the chat channel without ever cascading into a
//! second failure.

use super::vars::SiteVars;
use super::{
    ASSET_ARTIFACTS, ASSET_MANIFEST, BUILD_OFFLINE_SITE, BUILD_ONLINE_SITE, CHAT_ALERT,
    CLEAR_CDN_CACHE, FILTER_ASSET_ARTIFACTS, PUBLISHER_WEBHOOK, SITE_CONTENT, SITE_PROJECTS,
    SITE_THEMES, STATIC_RESOURCES, UPLOAD_OFFLINE_BUILD, UPLOAD_ONLINE_BUILD,
};
use crate::definition::{
    Command, DoStep, GetStep, ImageResource, PutStep, Step, TaskConfig, TaskInput, TaskOutput,
    TaskStep, TryStep,
};
use crate::settings::PipelineSettings;

fn publisher_image() -> ImageResource {
    ImageResource::registry("mitodl/site-publisher", "latest")
}

fn aws_cli_image() -> ImageResource {
    ImageResource::registry("amazon/aws-cli", "latest")
}

fn curl_image() -> ImageResource {
    ImageResource::registry("curlimages/curl", "latest")
}

fn input(name: &str) -> TaskInput {
    TaskInput { name: name.to_string() }
}

fn output(name: &str) -> TaskOutput {
    TaskOutput { name: name.to_string() }
}

/// Injects local-storage credentials into a task in dev deployments.
fn with_storage_credentials(task: TaskStep, settings: &PipelineSettings) -> TaskStep {
    match settings.dev.as_ref().filter(|_| settings.is_dev()) {
        Some(dev) => task
            .with_param("AWS_ACCESS_KEY_ID", dev.access_key_id.as_str())
            .with_param("AWS_SECRET_ACCESS_KEY", dev.secret_access_key.as_str()),
        None => task,
    }
}

fn publisher_status_put(pipeline_name: &str, status: &str) -> Step {
    PutStep::new(PUBLISHER_WEBHOOK)
        .with_param(
            "text",
            serde_json::json!({ "version": pipeline_name, "status": status }).to_string(),
        )
        .without_inputs()
        .into()
}

/// A best-effort put reporting a publish status to the publisher webhook.
#[must_use]
pub fn publisher_status_step(vars: &SiteVars, status: &str) -> Step {
    TryStep::new(publisher_status_put(&vars.pipeline_name, status)).into()
}

fn chat_alert_put(description: &str, vars: &SiteVars) -> Step {
    PutStep::new(CHAT_ALERT)
        .with_param(
            "text",
            format!(
                "{description} failed for site {} in the {} pipeline ({})",
                vars.short_id, vars.pipeline_name, vars.instance_vars
            ),
        )
        .without_inputs()
        .into()
}

/// Attaches the uniform failure-notification hook to a step.
///
/// On failure the step reports "failed" to the publisher webhook and posts a
/// chat alert naming the step, site, pipeline, and instance. Both run inside
/// a try so a notification failure never fails the step itself.
#[must_use]
pub fn with_failure_alert(step: Step, description: &str, vars: &SiteVars) -> Step {
    let notifications = DoStep::new(vec![
        publisher_status_put(&vars.pipeline_name, "failed"),
        chat_alert_put(description, vars),
    ]);
    step.on_failure(TryStep::new(notifications.into()).into())
}

fn hardened_get(resource: &str, vars: &SiteVars, passed: Option<&str>) -> Step {
    let mut get = GetStep::new(resource);
    if let Some(upstream) = passed {
        get = get.with_passed([upstream]);
    }
    let step = Step::from(get).with_timeout("5m").with_attempts(3);
    with_failure_alert(step, &format!("{resource} fetch"), vars)
}

/// The get steps every build job opens with: manifest, themes, and projects.
///
/// When `passed` names an upstream job the gets are constrained to versions
/// that job has succeeded with.
#[must_use]
pub fn shared_get_steps(vars: &SiteVars, passed: Option<&str>) -> Vec<Step> {
    [ASSET_MANIFEST, SITE_THEMES, SITE_PROJECTS]
        .iter()
        .map(|resource| hardened_get(resource, vars, passed))
        .collect()
}

/// The get step for the per-site content repo resource.
#[must_use]
pub fn site_content_get_step(vars: &SiteVars, passed: Option<&str>) -> Step {
    hardened_get(SITE_CONTENT, vars, passed)
}

/// A task cloning the site-content repo, for plans where the repo varies per
/// fan-out instance and cannot be a declared resource.
#[must_use]
pub fn site_content_fetch_step(vars: &SiteVars, settings: &PipelineSettings) -> Step {
    let script = format!(
        "git clone -b {branch} https://{domain}/{org}/{short_id}.git ./{SITE_CONTENT}",
        branch = vars.site_content_branch,
        domain = settings.git_domain,
        org = settings.git_organization,
        short_id = vars.short_id,
    );
    let task = TaskStep::new(
        SITE_CONTENT,
        TaskConfig {
            platform: "linux".to_string(),
            image_resource: publisher_image(),
            inputs: vec![],
            outputs: vec![output(SITE_CONTENT)],
            run: Command::shell(script),
        },
    );
    let step = Step::from(task).with_timeout("5m").with_attempts(3);
    with_failure_alert(step, "site content clone", vars)
}

/// Syncs the site's static resources from storage into a build artifact.
#[must_use]
pub fn static_resources_step(vars: &SiteVars, settings: &PipelineSettings) -> Step {
    let script = format!(
        "aws s3{endpoint} sync s3://{bucket}/{path} ./{STATIC_RESOURCES}",
        endpoint = settings.cli_endpoint_url(),
        bucket = vars.storage_bucket,
        path = vars.s3_path,
    );
    let task = TaskStep::new(
        STATIC_RESOURCES,
        TaskConfig {
            platform: "linux".to_string(),
            image_resource: aws_cli_image(),
            inputs: vec![],
            outputs: vec![output(STATIC_RESOURCES)],
            run: Command::shell(script),
        },
    );
    let task = with_storage_credentials(task, settings);
    let step = Step::from(task).with_timeout("40m").with_attempts(3);
    with_failure_alert(step, "static resources sync", vars)
}

/// Copies hashed assets named by the manifest out of the web bucket, for
/// bundling into offline archives.
#[must_use]
pub fn filter_asset_artifacts_step(web_bucket: &str, settings: &PipelineSettings) -> Step {
    let script = format!(
        "jq 'recurse | select(type==\"string\")' ./{ASSET_MANIFEST}/webpack.json | tr -d '\"' | xargs -I {{}} aws s3{endpoint} cp s3://{web_bucket}{{}} ./{ASSET_ARTIFACTS}/{{}} --exclude '*.js.map'",
        endpoint = settings.cli_endpoint_url(),
    );
    let task = TaskStep::new(
        FILTER_ASSET_ARTIFACTS,
        TaskConfig {
            platform: "linux".to_string(),
            image_resource: publisher_image(),
            inputs: vec![input(ASSET_MANIFEST)],
            outputs: vec![output(ASSET_ARTIFACTS)],
            run: Command::shell(script),
        },
    );
    let task = with_storage_credentials(task, settings);
    Step::from(task).with_timeout("10m").with_attempts(3)
}

fn build_params(task: TaskStep, vars: &SiteVars, settings: &PipelineSettings) -> TaskStep {
    let task = task
        .with_param("API_BEARER_TOKEN", settings.api_token.as_str())
        .with_param("PUBLISHER_BASE_URL", settings.publisher_url.as_str())
        .with_param("STATIC_API_BASE_URL", vars.static_api_url.as_str())
        .with_param("SITEMAP_DOMAIN", settings.sitemap_domain.as_str())
        .with_param("NOINDEX", vars.noindex.as_str());
    with_storage_credentials(task, settings)
}

/// Builds the served (online) site with the build tool.
#[must_use]
pub fn build_online_step(vars: &SiteVars, settings: &PipelineSettings) -> Step {
    let script = format!(
        "cp ../{ASSET_MANIFEST}/webpack.json ../{SITE_THEMES}/base-theme/data\n\
         hugo {args}\n\
         cp -r -n ../{STATIC_RESOURCES}/. ./output-online{subdir}\n\
         rm -rf ./output-online{subdir}*.mp4\n",
        args = vars.hugo_args_online,
        subdir = vars.static_resources_subdirectory,
    );
    let task = TaskStep::new(
        BUILD_ONLINE_SITE,
        TaskConfig {
            platform: "linux".to_string(),
            image_resource: publisher_image(),
            inputs: vec![
                input(SITE_THEMES),
                input(SITE_PROJECTS),
                input(SITE_CONTENT),
                input(STATIC_RESOURCES),
                input(ASSET_MANIFEST),
            ],
            outputs: vec![output(SITE_CONTENT), output(SITE_THEMES)],
            run: Command::shell(script).in_dir(SITE_CONTENT),
        },
    );
    let task = build_params(task, vars, settings);
    let step = Step::from(task).with_timeout("20m").with_attempts(3);
    with_failure_alert(step, "online site build", vars)
}

/// Syncs the online build output to the web bucket.
///
/// The root site owns the destination prefix and syncs broadly without
/// deleting; non-root sites sync with deletion of stray files and exclude
/// their own archive filenames to avoid overwriting offline artifacts.
#[must_use]
pub fn upload_online_step(vars: &SiteVars, settings: &PipelineSettings) -> Step {
    let script = format!(
        "if [ \"$IS_ROOT_WEBSITE\" = \"true\" ] ; then\n\
         aws s3{endpoint} sync {SITE_CONTENT}/output-online s3://{web}/{base} --metadata site-id={name}{delete}\n\
         else\n\
         aws s3{endpoint} sync {SITE_CONTENT}/output-online s3://{web}/{base} --exclude '{short_id}.zip' --exclude '{short_id}-video.zip' --metadata site-id={name}{delete}\n\
         fi\n",
        endpoint = settings.cli_endpoint_url(),
        web = vars.web_bucket,
        base = vars.base_url,
        name = vars.site_name,
        delete = vars.delete_flag,
        short_id = vars.short_id,
    );
    let task = TaskStep::new(
        UPLOAD_ONLINE_BUILD,
        TaskConfig {
            platform: "linux".to_string(),
            image_resource: aws_cli_image(),
            inputs: vec![input(SITE_CONTENT)],
            outputs: vec![],
            run: Command::shell(script),
        },
    )
    .with_param("IS_ROOT_WEBSITE", vars.is_root_website.as_str());
    let task = with_storage_credentials(task, settings);
    let step = Step::from(task).with_timeout("40m");
    with_failure_alert(step, "online build upload", vars)
}

/// Builds the offline site and zips it into downloadable archives.
///
/// Non-root sites produce a full archive plus a separate `-video` archive
/// built without video files; the root site's output is synced as-is.
#[must_use]
pub fn build_offline_step(vars: &SiteVars, settings: &PipelineSettings) -> Step {
    let script = format!(
        "cp ../{ASSET_MANIFEST}/webpack.json ../{SITE_THEMES}/base-theme/data\n\
         mkdir -p ./content/static_resources\n\
         mkdir -p ./static/static_resources\n\
         mkdir -p ./static/static_shared\n\
         mkdir -p ../videos\n\
         cp -r ../{STATIC_RESOURCES}/. ./content/static_resources\n\
         HTML_COUNT=\"$(ls -1 ./content/static_resources/*.html 2>/dev/null | wc -l)\"\n\
         if [ \"$HTML_COUNT\" != 0 ] ; then\n\
         mv ./content/static_resources/*.html ./static/static_resources\n\
         fi\n\
         MP4_COUNT=\"$(ls -1 ./content/static_resources/*.mp4 2>/dev/null | wc -l)\"\n\
         if [ \"$MP4_COUNT\" != 0 ] ; then\n\
         mv ./content/static_resources/*.mp4 ../videos\n\
         fi\n\
         touch ./content/static_resources/_index.md\n\
         cp -r ../{ASSET_ARTIFACTS}/static_shared/. ./static/static_shared/\n\
         hugo {args}\n\
         if [ \"$IS_ROOT_WEBSITE\" != \"true\" ] ; then\n\
         cd output-offline\n\
         zip -r ../../{BUILD_OFFLINE_SITE}/{short_id}.zip ./\n\
         rm -rf ./*\n\
         cd ..\n\
         if [ \"$MP4_COUNT\" != 0 ] ; then\n\
         mv ../videos/* ./content/static_resources\n\
         fi\n\
         hugo {args}\n\
         cd output-offline\n\
         zip -r ../../{BUILD_OFFLINE_SITE}/{short_id}-video.zip ./\n\
         fi\n",
        args = vars.hugo_args_offline,
        short_id = vars.short_id,
    );
    let task = TaskStep::new(
        BUILD_OFFLINE_SITE,
        TaskConfig {
            platform: "linux".to_string(),
            image_resource: publisher_image(),
            inputs: vec![
                input(SITE_THEMES),
                input(SITE_PROJECTS),
                input(SITE_CONTENT),
                input(STATIC_RESOURCES),
                input(ASSET_MANIFEST),
                input(ASSET_ARTIFACTS),
            ],
            outputs: vec![
                output(SITE_CONTENT),
                output(SITE_THEMES),
                output(BUILD_OFFLINE_SITE),
            ],
            run: Command::shell(script).in_dir(SITE_CONTENT),
        },
    )
    .with_param("IS_ROOT_WEBSITE", vars.is_root_website.as_str());
    let task = build_params(task, vars, settings);
    let step = Step::from(task).with_timeout("20m").with_attempts(3);
    with_failure_alert(step, "offline site build", vars)
}

/// Syncs the offline build output and, for non-root sites, publishes the
/// archives into the web bucket with explicit include filters.
#[must_use]
pub fn upload_offline_step(vars: &SiteVars, settings: &PipelineSettings) -> Step {
    let script = format!(
        "aws s3{endpoint} sync {SITE_CONTENT}/output-offline/ s3://{offline}/{base} --metadata site-id={name}{delete}\n\
         if [ \"$IS_ROOT_WEBSITE\" != \"true\" ] ; then\n\
         aws s3{endpoint} sync {BUILD_OFFLINE_SITE}/ s3://{web}/{base} --exclude '*' --include '{short_id}.zip' --include '{short_id}-video.zip' --metadata site-id={name}\n\
         fi\n",
        endpoint = settings.cli_endpoint_url(),
        offline = vars.offline_bucket,
        web = vars.web_bucket,
        base = vars.base_url,
        name = vars.site_name,
        delete = vars.delete_flag,
        short_id = vars.short_id,
    );
    let task = TaskStep::new(
        UPLOAD_OFFLINE_BUILD,
        TaskConfig {
            platform: "linux".to_string(),
            image_resource: aws_cli_image(),
            inputs: vec![
                input(SITE_CONTENT),
                input(BUILD_OFFLINE_SITE),
                input(SITE_PROJECTS),
            ],
            outputs: vec![],
            run: Command::shell(script),
        },
    )
    .with_param("IS_ROOT_WEBSITE", vars.is_root_website.as_str());
    let task = with_storage_credentials(task, settings);
    let step = Step::from(task).with_timeout("40m");
    with_failure_alert(step, "offline build upload", vars)
}

/// Purges the site's pages from the CDN after a successful upload.
///
/// The CDN credentials resolve from cluster-level vars named after the
/// pipeline, so the literal pipeline name is required here rather than a
/// placeholder.
#[must_use]
pub fn purge_cdn_step(
    vars: &SiteVars,
    settings: &PipelineSettings,
    pipeline_name: &str,
) -> Step {
    let soft_purge = if settings.hard_purge {
        ""
    } else {
        " -H 'Fastly-Soft-Purge: 1'"
    };
    let script = format!(
        "curl -f -X POST -H \"Fastly-Key: ((fastly_{pipeline_name}.api_token))\"{soft_purge} https://api.fastly.com/service/((fastly_{pipeline_name}.service_id))/purge/{site}",
        site = vars.site_name,
    );
    let task = TaskStep::new(
        CLEAR_CDN_CACHE,
        TaskConfig {
            platform: "linux".to_string(),
            image_resource: curl_image(),
            inputs: vec![],
            outputs: vec![],
            run: Command::shell(script),
        },
    );
    let step = Step::from(task).with_timeout("5m").with_attempts(3);
    with_failure_alert(step, "cdn cache purge", vars)
}

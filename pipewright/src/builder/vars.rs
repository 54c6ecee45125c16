//! Template placeholders, argument-string assembly, and instance addressing.

use crate::errors::{PipelineValidationError, PipewrightError};
use std::collections::BTreeMap;

/// The `((namespace.key))` placeholders a generated pipeline references.
///
/// The same key set is addressed through two namespaces: `site:` when the
/// values come from the pipeline's var source, and `.:site.` when they come
/// from an across fan-out variable in a mass build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteVars {
    /// `"true"` for the root site, empty otherwise (shell-testable).
    pub is_root_website: String,
    /// Short identifier used for repo names and archive filenames.
    pub short_id: String,
    /// The site name.
    pub site_name: String,
    /// Storage prefix holding the site's static resources.
    pub s3_path: String,
    /// The URL path the site is served under.
    pub url_path: String,
    /// Destination prefix within the web bucket.
    pub base_url: String,
    /// Subdirectory static resources are copied into after a build.
    pub static_resources_subdirectory: String,
    /// `" --delete"` for non-root sites, empty for the root site.
    pub delete_flag: String,
    /// `"true"` when search engines must not index the build.
    pub noindex: String,
    /// The pipeline name (publish channel) on the coordination server.
    pub pipeline_name: String,
    /// Query string addressing this pipeline instance.
    pub instance_vars: String,
    /// Base URL builds fetch published JSON from.
    pub static_api_url: String,
    /// Bucket holding per-site static resources.
    pub storage_bucket: String,
    /// Versioned bucket holding the asset manifest.
    pub artifacts_bucket: String,
    /// Destination bucket for the served site.
    pub web_bucket: String,
    /// Destination bucket for the offline archive.
    pub offline_bucket: String,
    /// Branch of the site-content repo to build from.
    pub site_content_branch: String,
    /// Branch of the site-themes repo.
    pub themes_branch: String,
    /// URL of the site-projects repo.
    pub projects_url: String,
    /// Branch of the site-projects repo.
    pub projects_branch: String,
    /// Fully assembled build-tool arguments for the online variant.
    pub hugo_args_online: String,
    /// Fully assembled build-tool arguments for the offline variant.
    pub hugo_args_offline: String,
}

impl SiteVars {
    /// Placeholders resolved from the var source of the given name.
    #[must_use]
    pub fn source(var_source: &str) -> Self {
        Self::for_prefix(&format!("{var_source}:"))
    }

    /// Placeholders resolved from an across fan-out variable.
    #[must_use]
    pub fn across(var: &str) -> Self {
        Self::for_prefix(&format!(".:{var}."))
    }

    fn for_prefix(prefix: &str) -> Self {
        let var = |key: &str| format!("(({prefix}{key}))");
        Self {
            is_root_website: var("is_root_website"),
            short_id: var("short_id"),
            site_name: var("site_name"),
            s3_path: var("s3_path"),
            url_path: var("url_path"),
            base_url: var("base_url"),
            static_resources_subdirectory: var("static_resources_subdirectory"),
            delete_flag: var("delete_flag"),
            noindex: var("noindex"),
            pipeline_name: var("pipeline_name"),
            instance_vars: var("instance_vars"),
            static_api_url: var("static_api_url"),
            storage_bucket: var("storage_bucket"),
            artifacts_bucket: var("artifacts_bucket"),
            web_bucket: var("web_bucket"),
            offline_bucket: var("offline_bucket"),
            site_content_branch: var("site_content_branch"),
            themes_branch: var("themes_branch"),
            projects_url: var("projects_url"),
            projects_branch: var("projects_branch"),
            hugo_args_online: var("hugo_args_online"),
            hugo_args_offline: var("hugo_args_offline"),
        }
    }
}

/// Assembles a build-tool argument string from base arguments and overrides.
///
/// Override keys replace base keys of the same name exactly once. Keys are
/// emitted in sorted order so identical inputs always produce byte-identical
/// strings, which keeps serialized configs diffable.
///
/// # Errors
///
/// Returns [`PipewrightError::Validation`] when the override string does not
/// begin with a `--` flag.
pub fn hugo_arg_string(
    base: &BTreeMap<String, String>,
    overrides: Option<&str>,
) -> Result<String, PipewrightError> {
    let mut merged = base.clone();
    if let Some(overrides) = overrides {
        for (key, value) in parse_arg_overrides(overrides)? {
            merged.insert(key, value);
        }
    }
    Ok(merged
        .iter()
        .map(|(key, value)| {
            if value.is_empty() {
                key.clone()
            } else {
                format!("{key} {value}")
            }
        })
        .collect::<Vec<_>>()
        .join(" "))
}

/// Splits an override string like `"--baseURL / --verbose"` into key/value
/// pairs. Tokens starting with `--` open a new key; other tokens extend the
/// current key's value. A value before any flag has nothing to attach to and
/// is rejected rather than dropped.
fn parse_arg_overrides(overrides: &str) -> Result<Vec<(String, String)>, PipewrightError> {
    let mut args: Vec<(String, String)> = Vec::new();
    for token in overrides.split_whitespace() {
        if token.starts_with("--") {
            args.push((token.to_string(), String::new()));
        } else if let Some((_, value)) = args.last_mut() {
            if value.is_empty() {
                value.push_str(token);
            } else {
                value.push(' ');
                value.push_str(token);
            }
        } else {
            return Err(PipelineValidationError::new(format!(
                "argument overrides must begin with a '--' flag: '{overrides}'"
            ))
            .into());
        }
    }
    Ok(args)
}

/// The query string addressing one pipeline instance, e.g.
/// `?vars=%7B%22site%22%3A%22physics-101%22%7D`.
///
/// # Errors
///
/// Returns [`PipewrightError::Encoding`] when the site name cannot be encoded.
pub fn instance_vars_query(site: &str) -> Result<String, PipewrightError> {
    let vars = serde_json::json!({ "site": site }).to_string();
    let url = reqwest::Url::parse_with_params("https://instance.invalid/", &[("vars", vars)])
        .map_err(|e| PipewrightError::Encoding(format!("instance vars for '{site}': {e}")))?;
    Ok(format!("?{}", url.query().unwrap_or_default()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn base_args() -> BTreeMap<String, String> {
        let mut base = BTreeMap::new();
        base.insert("--themesDir".to_string(), "../site-themes/".to_string());
        base.insert("--baseURL".to_string(), "/courses/physics".to_string());
        base.insert("--destination".to_string(), "output-online".to_string());
        base
    }

    #[test]
    fn test_namespace_prefixes() {
        let source = SiteVars::source("site");
        assert_eq!(source.short_id, "((site:short_id))");

        let across = SiteVars::across("site");
        assert_eq!(across.short_id, "((.:site.short_id))");
    }

    #[test]
    fn test_arg_string_deterministic() {
        let base = base_args();
        let first = hugo_arg_string(&base, None).unwrap();
        let second = hugo_arg_string(&base, None).unwrap();
        assert_eq!(first, second);
        assert_eq!(
            first,
            "--baseURL /courses/physics --destination output-online --themesDir ../site-themes/"
        );
    }

    #[test]
    fn test_arg_string_override_replaces_once() {
        let merged = hugo_arg_string(&base_args(), Some("--baseURL /")).unwrap();
        assert_eq!(merged.matches("--baseURL").count(), 1);
        assert!(merged.contains("--baseURL /"));
        assert!(!merged.contains("/courses/physics"));
    }

    #[test]
    fn test_arg_string_override_adds_flag() {
        let merged = hugo_arg_string(&base_args(), Some("--verbose")).unwrap();
        assert!(merged.ends_with("--verbose"));
    }

    #[test]
    fn test_arg_string_rejects_value_before_flag() {
        let err = hugo_arg_string(&base_args(), Some("quickly --minify")).unwrap_err();
        assert!(matches!(err, PipewrightError::Validation(_)));
    }

    #[test]
    fn test_instance_vars_query_encoding() {
        let query = instance_vars_query("physics-101").unwrap();
        assert_eq!(query, "?vars=%7B%22site%22%3A%22physics-101%22%7D");
    }
}

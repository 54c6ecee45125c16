//! End-to-end checks over fully assembled, serialized pipelines.

use super::{SitePipelineBuilder, OFFLINE_SITE_JOB, ONLINE_SITE_JOB};
use crate::definition::PipelineDefinition;
use crate::settings::test_support::settings;
use crate::target::{PipelineTarget, PublishChannel};
use pretty_assertions::assert_eq;
use std::collections::BTreeSet;

fn preview_target() -> PipelineTarget {
    PipelineTarget::new("data-science-essentials", "abc123")
        .with_url_path("courses/data-science-essentials")
        .with_s3_path("courses/data-science-essentials")
        .with_branch("preview")
        .with_buckets("site-web-draft", "site-offline-draft", "site-artifacts")
}

#[test]
fn test_preview_build_in_rc_environment() {
    let mut s = settings();
    s.env_name = "rc".to_string();

    let pipeline =
        SitePipelineBuilder::build(&preview_target(), PublishChannel::Draft, &s).unwrap();
    let vars = &pipeline.var_sources[0].config.vars;

    assert_eq!(vars["base_url"], serde_json::json!("courses/data-science-essentials"));
    assert_eq!(vars["delete_flag"], serde_json::json!(" --delete"));
    assert_eq!(vars["noindex"], serde_json::json!("true"));
    assert_eq!(vars["pipeline_name"], serde_json::json!("draft"));
    assert_eq!(vars["site_content_branch"], serde_json::json!("preview"));
}

#[test]
fn test_identical_inputs_serialize_identically() {
    let first =
        SitePipelineBuilder::build(&preview_target(), PublishChannel::Draft, &settings()).unwrap();
    let second =
        SitePipelineBuilder::build(&preview_target(), PublishChannel::Draft, &settings()).unwrap();

    let first_bytes = serde_json::to_vec(&first).unwrap();
    let second_bytes = serde_json::to_vec(&second).unwrap();
    assert_eq!(first_bytes, second_bytes);
}

#[test]
fn test_serialized_pipeline_round_trips() {
    let pipeline =
        SitePipelineBuilder::build(&preview_target(), PublishChannel::Live, &settings()).unwrap();
    let json = serde_json::to_string(&pipeline).unwrap();
    let decoded: PipelineDefinition = serde_json::from_str(&json).unwrap();
    assert_eq!(decoded, pipeline);
}

#[test]
fn test_serialized_shape_matches_coordination_schema() {
    let pipeline =
        SitePipelineBuilder::build(&preview_target(), PublishChannel::Live, &settings()).unwrap();
    let json = serde_json::to_value(&pipeline).unwrap();

    assert!(json["var_sources"].is_array());
    assert!(json["resource_types"].is_array());
    assert!(json["resources"].is_array());
    assert_eq!(json["jobs"].as_array().unwrap().len(), 2);

    // Steps are distinguished by their key, not a tag field.
    let online = &json["jobs"][0];
    assert_eq!(online["name"], ONLINE_SITE_JOB);
    let first = &online["plan"][0];
    assert!(first.get("try").is_some());
    assert!(first.get("type").is_none());

    // Step attributes serialize inline alongside the step key.
    let hardened_get = &online["plan"][1];
    assert!(hardened_get.get("get").is_some());
    assert_eq!(hardened_get["timeout"], serde_json::json!("5m"));
    assert_eq!(hardened_get["attempts"], serde_json::json!(3));
}

#[test]
fn test_every_placeholder_is_backed_by_the_var_source() {
    let pipeline =
        SitePipelineBuilder::build(&preview_target(), PublishChannel::Live, &settings()).unwrap();
    let json = serde_json::to_string(&pipeline).unwrap();
    let vars = &pipeline.var_sources[0].config.vars;

    let mut referenced = BTreeSet::new();
    for (start, _) in json.match_indices("((site:") {
        let rest = &json[start + "((site:".len()..];
        let end = rest.find("))").unwrap();
        referenced.insert(rest[..end].to_string());
    }

    assert!(!referenced.is_empty());
    for key in &referenced {
        assert!(vars.contains_key(key), "placeholder '{key}' has no backing value");
    }
}

#[test]
fn test_offline_job_inputs_gated_on_online_job() {
    let pipeline =
        SitePipelineBuilder::build(&preview_target(), PublishChannel::Live, &settings()).unwrap();
    let offline = &pipeline.jobs[1];
    assert_eq!(offline.name, OFFLINE_SITE_JOB);

    let mut gated = 0;
    for step in &offline.plan {
        if let crate::definition::Step::Get(get) = step {
            if get.get != super::OFFLINE_BUILD_GATE {
                assert_eq!(get.passed, vec![ONLINE_SITE_JOB.to_string()], "{}", get.get);
                gated += 1;
            }
        }
    }
    // asset-manifest, site-themes, site-projects, site-content
    assert_eq!(gated, 4);
}

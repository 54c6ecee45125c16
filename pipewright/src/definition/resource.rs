//! Resources and resource types.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Resource kinds built into the CI system that need no declaration.
pub const BUILTIN_RESOURCE_KINDS: &[&str] = &["git", "s3", "time", "registry-image"];

/// A declared pluggable resource kind.
///
/// Every non-builtin kind used by a [`Resource`] must be declared exactly
/// once per pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceType {
    /// The kind name resources refer to.
    pub name: String,
    /// The implementation kind, normally `registry-image`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Source parameters for the implementation.
    #[serde(skip_serializing_if = "BTreeMap::is_empty", default)]
    pub source: BTreeMap<String, Value>,
}

impl ResourceType {
    /// Declares a resource type backed by a container image.
    #[must_use]
    pub fn registry_image(name: impl Into<String>, repository: impl Into<String>) -> Self {
        let mut source = BTreeMap::new();
        source.insert("repository".to_string(), Value::String(repository.into()));
        Self {
            name: name.into(),
            kind: "registry-image".to_string(),
            source,
        }
    }

    /// Adds a source parameter.
    #[must_use]
    pub fn with_source_entry(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.source.insert(key.into(), value.into());
        self
    }
}

/// A named external dependency or artifact a step can get or put.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    /// The resource name, unique within a pipeline.
    pub name: String,
    /// The resource kind, builtin or declared via a [`ResourceType`].
    #[serde(rename = "type")]
    pub kind: String,
    /// Source parameters.
    #[serde(skip_serializing_if = "BTreeMap::is_empty", default)]
    pub source: BTreeMap<String, Value>,
    /// Display icon.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    /// Version-check interval policy, e.g. `"never"` for gates.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub check_every: Option<String>,
}

impl Resource {
    /// Creates a resource of the given kind with an empty source.
    #[must_use]
    pub fn new(name: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: kind.into(),
            source: BTreeMap::new(),
            icon: None,
            check_every: None,
        }
    }

    /// Adds a source parameter.
    #[must_use]
    pub fn with_source_entry(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.source.insert(key.into(), value.into());
        self
    }

    /// Sets the display icon.
    #[must_use]
    pub fn with_icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = Some(icon.into());
        self
    }

    /// Disables periodic version checks; the resource only moves when put.
    #[must_use]
    pub fn check_never(mut self) -> Self {
        self.check_every = Some("never".to_string());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_image_type() {
        let rt = ResourceType::registry_image("keyval", "ghcr.io/cludden/concourse-keyval-resource")
            .with_source_entry("tag", "latest");

        assert_eq!(rt.kind, "registry-image");
        assert_eq!(
            rt.source.get("repository"),
            Some(&Value::String(
                "ghcr.io/cludden/concourse-keyval-resource".to_string()
            ))
        );
    }

    #[test]
    fn test_resource_serialization_shape() {
        let gate = Resource::new("offline-build-gate", "keyval")
            .with_icon("gate")
            .check_never();

        let json = serde_json::to_value(&gate).unwrap();
        assert_eq!(json["type"], "keyval");
        assert_eq!(json["check_every"], "never");
        // Empty source must not be emitted at all.
        assert!(json.get("source").is_none());
    }
}

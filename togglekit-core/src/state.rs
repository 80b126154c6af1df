// Copyright 2025 Togglekit Contributors (https://github.com/togglekit)
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Export/import document formats.
//!
//! Two generations exist. The current format (version 4) keeps variants on
//! per-environment rows under `featureEnvironments`; the legacy format
//! (version 3 and earlier) kept one global variant list on each feature.
//! [`StateDocument`] decides which one a document is while deserializing,
//! so callers never branch on raw JSON.
//!
//! Detection goes by shape first and only falls back to the declared
//! version marker when the shape says nothing: a hand-edited document with
//! a stale version field still parses as what it actually is.

use chrono::{DateTime, Utc};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use crate::environment::{Environment, FeatureEnvironment};
use crate::feature::Feature;
use crate::project::Project;
use crate::tag::{FeatureTag, Tag};

/// Format version written by every export.
pub const CURRENT_FORMAT_VERSION: u32 = 4;

/// Last format version that kept variants on the feature itself.
pub const LEGACY_FORMAT_VERSION: u32 = 3;

/// Current-format state document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportedState {
    pub version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exported_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub projects: Vec<Project>,
    #[serde(default)]
    pub environments: Vec<Environment>,
    #[serde(default)]
    pub features: Vec<Feature>,
    #[serde(default)]
    pub feature_environments: Vec<FeatureEnvironment>,
    #[serde(default)]
    pub tags: Vec<Tag>,
    #[serde(default)]
    pub feature_tags: Vec<FeatureTag>,
}

/// Connection row in a legacy document: which environment a feature was
/// wired to and whether it was on. Legacy rows never carry variants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureLink {
    pub feature_name: String,
    pub environment: String,
    #[serde(default)]
    pub enabled: bool,
}

/// Legacy-format state document. Each feature's [`Feature::variants`]
/// holds the single global list that migration fans out to every
/// environment the feature is connected to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyState {
    #[serde(default = "legacy_version")]
    pub version: u32,
    #[serde(default)]
    pub projects: Vec<Project>,
    #[serde(default)]
    pub environments: Vec<Environment>,
    #[serde(default)]
    pub features: Vec<Feature>,
    #[serde(default)]
    pub feature_environments: Vec<FeatureLink>,
    #[serde(default)]
    pub tags: Vec<Tag>,
    #[serde(default)]
    pub feature_tags: Vec<FeatureTag>,
}

fn legacy_version() -> u32 {
    LEGACY_FORMAT_VERSION
}

/// A parsed state document of either generation.
#[derive(Debug, Clone, PartialEq)]
pub enum StateDocument {
    Legacy(LegacyState),
    Current(ExportedState),
}

impl StateDocument {
    /// Version marker the document declares (or the default its shape
    /// implies).
    pub fn version(&self) -> u32 {
        match self {
            StateDocument::Legacy(doc) => doc.version,
            StateDocument::Current(doc) => doc.version,
        }
    }

    pub fn is_legacy(&self) -> bool {
        matches!(self, StateDocument::Legacy(_))
    }
}

/// Shape detection, strongest signal first:
/// 1. any `featureEnvironments` row carrying a `variants` key -> current;
/// 2. any feature carrying a `variants` key -> legacy;
/// 3. otherwise the declared version marker decides.
fn is_current_shape(document: &Value) -> bool {
    let row_variants = document
        .get("featureEnvironments")
        .and_then(Value::as_array)
        .map(|rows| rows.iter().any(|row| row.get("variants").is_some()))
        .unwrap_or(false);
    if row_variants {
        return true;
    }

    let feature_variants = document
        .get("features")
        .and_then(Value::as_array)
        .map(|features| features.iter().any(|feature| feature.get("variants").is_some()))
        .unwrap_or(false);
    if feature_variants {
        return false;
    }

    document
        .get("version")
        .and_then(Value::as_u64)
        .map(|version| version >= u64::from(CURRENT_FORMAT_VERSION))
        .unwrap_or(false)
}

impl<'de> Deserialize<'de> for StateDocument {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let document = Value::deserialize(deserializer)?;
        if is_current_shape(&document) {
            serde_json::from_value(document)
                .map(StateDocument::Current)
                .map_err(D::Error::custom)
        } else {
            serde_json::from_value(document)
                .map(StateDocument::Legacy)
                .map_err(D::Error::custom)
        }
    }
}

impl Serialize for StateDocument {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            StateDocument::Legacy(document) => document.serialize(serializer),
            StateDocument::Current(document) => document.serialize(serializer),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_feature_level_variants_read_as_legacy() {
        let raw = json!({
            "version": 3,
            "features": [
                {"name": "beta", "variants": [{"name": "on", "weight": 1000}]}
            ],
            "featureEnvironments": [
                {"featureName": "beta", "environment": "development", "enabled": true}
            ]
        });
        let document: StateDocument = serde_json::from_value(raw).unwrap();
        assert!(document.is_legacy());
        assert_eq!(document.version(), 3);
        match document {
            StateDocument::Legacy(doc) => {
                let variants = doc.features[0].variants.as_deref().unwrap();
                assert_eq!(variants[0].name, "on");
                assert_eq!(doc.feature_environments.len(), 1);
            }
            StateDocument::Current(_) => unreachable!(),
        }
    }

    #[test]
    fn test_row_level_variants_win_over_a_stale_version_marker() {
        let raw = json!({
            "version": 3,
            "features": [{"name": "beta"}],
            "featureEnvironments": [
                {
                    "featureName": "beta",
                    "environment": "development",
                    "enabled": true,
                    "variants": []
                }
            ]
        });
        let document: StateDocument = serde_json::from_value(raw).unwrap();
        assert!(!document.is_legacy());
    }

    #[test]
    fn test_shapeless_document_falls_back_to_the_version_marker() {
        let current = json!({"version": 4, "features": [{"name": "beta"}]});
        let document: StateDocument = serde_json::from_value(current).unwrap();
        assert!(!document.is_legacy());

        let legacy = json!({"version": 3, "features": [{"name": "beta"}]});
        let document: StateDocument = serde_json::from_value(legacy).unwrap();
        assert!(document.is_legacy());
    }

    #[test]
    fn test_missing_version_defaults_to_legacy() {
        let raw = json!({"features": [{"name": "beta"}]});
        let document: StateDocument = serde_json::from_value(raw).unwrap();
        assert!(document.is_legacy());
        assert_eq!(document.version(), LEGACY_FORMAT_VERSION);
    }

    #[test]
    fn test_unknown_sections_are_ignored() {
        // Real-world legacy exports carry sections this tool does not track.
        let raw = json!({
            "version": 3,
            "features": [{"name": "beta", "variants": []}],
            "featureStrategies": [{"id": "f3a4", "featureName": "beta"}],
            "segments": []
        });
        let document: StateDocument = serde_json::from_value(raw).unwrap();
        assert!(document.is_legacy());
    }

    #[test]
    fn test_current_document_round_trips() {
        let raw = json!({
            "version": 4,
            "features": [{"name": "beta", "type": "experiment"}],
            "featureEnvironments": [
                {
                    "featureName": "beta",
                    "environment": "production",
                    "enabled": true,
                    "variants": [{"name": "on", "weight": 1000, "weightType": "variable"}]
                }
            ]
        });
        let document: StateDocument = serde_json::from_value(raw).unwrap();
        let rendered = serde_json::to_string(&document).unwrap();
        let reparsed: StateDocument = serde_json::from_str(&rendered).unwrap();
        assert_eq!(document, reparsed);
    }
}

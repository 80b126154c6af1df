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

//! Feature toggle model and listing filters.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::variant::Variant;

/// Lifecycle category of a feature toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FeatureType {
    #[default]
    Release,
    Experiment,
    Operational,
    KillSwitch,
    Permission,
}

impl FeatureType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FeatureType::Release => "release",
            FeatureType::Experiment => "experiment",
            FeatureType::Operational => "operational",
            FeatureType::KillSwitch => "kill-switch",
            FeatureType::Permission => "permission",
        }
    }
}

/// A feature toggle.
///
/// Enablement, strategies, and variants live on per-environment rows; the
/// feature itself carries identity and lifecycle metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Feature {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "type", default)]
    pub feature_type: FeatureType,
    #[serde(default = "default_project")]
    pub project: String,
    /// Flagged when the toggle has outlived its expected lifetime.
    #[serde(default)]
    pub stale: bool,
    /// Whether SDKs emit impression events when evaluating this feature.
    #[serde(default)]
    pub impression_data: bool,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_seen_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archived_at: Option<DateTime<Utc>>,
    /// Whole-feature variant list. Only the legacy document format and the
    /// legacy save path populate this; per-environment rows are the source
    /// of truth everywhere else.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variants: Option<Vec<Variant>>,
}

fn default_project() -> String {
    "default".to_string()
}

impl Feature {
    /// A fresh, unarchived release toggle in the given project.
    pub fn new(name: impl Into<String>, project: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            feature_type: FeatureType::default(),
            project: project.into(),
            stale: false,
            impression_data: false,
            created_at: Utc::now(),
            last_seen_at: None,
            archived_at: None,
            variants: None,
        }
    }

    /// Archived features are hidden from listings and are the only ones
    /// eligible for hard deletion.
    pub fn is_archived(&self) -> bool {
        self.archived_at.is_some()
    }
}

/// Filter for feature listings and exports.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureQuery {
    /// Match archived instead of active features.
    #[serde(default)]
    pub archived: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stale: Option<bool>,
}

impl FeatureQuery {
    pub fn matches(&self, feature: &Feature) -> bool {
        if feature.is_archived() != self.archived {
            return false;
        }
        if let Some(project) = &self.project {
            if &feature.project != project {
                return false;
            }
        }
        if let Some(stale) = self.stale {
            if feature.stale != stale {
                return false;
            }
        }
        true
    }
}

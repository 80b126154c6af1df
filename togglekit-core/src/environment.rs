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

//! Environments and per-environment feature rows.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::variant::Variant;

/// Composite key addressing one feature's row in one environment.
pub type FeatureEnvironmentKey = (String, String);

/// Deployment environment known to the platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Environment {
    pub name: String,
    #[serde(rename = "type", default)]
    pub environment_type: EnvironmentType,
    /// Position in environment listings; lower sorts first.
    #[serde(default = "default_sort_order")]
    pub sort_order: i32,
}

fn default_sort_order() -> i32 {
    9999
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnvironmentType {
    #[default]
    Development,
    Test,
    Preproduction,
    Production,
}

impl Environment {
    pub fn new(name: impl Into<String>, environment_type: EnvironmentType) -> Self {
        Self {
            name: name.into(),
            environment_type,
            sort_order: default_sort_order(),
        }
    }
}

/// Activation strategy attached to a feature in one environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Strategy {
    pub name: String,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub parameters: HashMap<String, String>,
}

/// A feature's state within a single environment: enablement, strategies,
/// and the variant list that splits its traffic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureEnvironment {
    pub feature_name: String,
    pub environment: String,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub strategies: Vec<Strategy>,
    /// Per-environment variant list in canonical order. Serialized even
    /// when empty: its presence is what marks an exported document as the
    /// current format.
    #[serde(default)]
    pub variants: Vec<Variant>,
}

impl FeatureEnvironment {
    pub fn new(feature_name: impl Into<String>, environment: impl Into<String>) -> Self {
        Self {
            feature_name: feature_name.into(),
            environment: environment.into(),
            enabled: false,
            strategies: Vec::new(),
            variants: Vec::new(),
        }
    }

    pub fn key(&self) -> FeatureEnvironmentKey {
        (self.feature_name.clone(), self.environment.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_variants_stay_on_the_wire() {
        let row = FeatureEnvironment::new("checkout", "production");
        let json = serde_json::to_value(&row).unwrap();
        assert!(json["variants"].as_array().unwrap().is_empty());
        // Strategies are the opposite: omitted when empty.
        assert!(json.get("strategies").is_none());
    }

    #[test]
    fn test_environment_defaults() {
        let environment: Environment =
            serde_json::from_str(r#"{"name":"production","type":"production"}"#).unwrap();
        assert_eq!(environment.environment_type, EnvironmentType::Production);
        assert_eq!(environment.sort_order, 9999);
    }

    #[test]
    fn test_row_key_is_feature_then_environment() {
        let row = FeatureEnvironment::new("checkout", "production");
        assert_eq!(
            row.key(),
            ("checkout".to_string(), "production".to_string())
        );
    }
}

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

//! Tags and their attachments to features.

use serde::{Deserialize, Serialize};

/// A (type, value) label. Ordering is lexicographic on both fields so tag
/// listings and exports are deterministic.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tag {
    #[serde(rename = "type")]
    pub tag_type: String,
    pub value: String,
}

impl Tag {
    pub fn new(tag_type: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            tag_type: tag_type.into(),
            value: value.into(),
        }
    }
}

/// Attachment of a tag to a feature.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureTag {
    pub feature_name: String,
    pub tag_type: String,
    pub tag_value: String,
}

impl FeatureTag {
    pub fn new(feature_name: impl Into<String>, tag: &Tag) -> Self {
        Self {
            feature_name: feature_name.into(),
            tag_type: tag.tag_type.clone(),
            tag_value: tag.value.clone(),
        }
    }
}

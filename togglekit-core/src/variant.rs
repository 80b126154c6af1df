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

//! Variant model and list-level validation.
//!
//! A variant splits a feature's traffic into named buckets. Weights are
//! permille values and every persisted list sums to exactly
//! [`TOTAL_VARIANT_WEIGHT`]; how the sum is reached is the job of
//! [`crate::weights`].

use std::collections::HashSet;

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{Result, TogglekitError};

/// Sum every non-empty variant list must reach, in permille.
pub const TOTAL_VARIANT_WEIGHT: u16 = 1000;

/// How a variant's weight participates in redistribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WeightType {
    /// The weight is pinned and never rewritten.
    Fix,
    /// The weight is recomputed from whatever budget the fixed entries
    /// leave over.
    #[default]
    Variable,
}

impl WeightType {
    pub fn as_str(&self) -> &'static str {
        match self {
            WeightType::Fix => "fix",
            WeightType::Variable => "variable",
        }
    }

    /// Parses the document spelling. Older exports leave the field empty,
    /// which reads as variable.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "fix" => Some(WeightType::Fix),
            "variable" | "" => Some(WeightType::Variable),
            _ => None,
        }
    }
}

impl<'de> Deserialize<'de> for WeightType {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        WeightType::parse(&raw)
            .ok_or_else(|| serde::de::Error::unknown_variant(&raw, &["fix", "variable"]))
    }
}

/// Typed payload delivered to SDKs alongside the variant name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariantPayload {
    #[serde(rename = "type")]
    pub payload_type: PayloadType,
    pub value: String,
}

/// Encoding hint for [`VariantPayload::value`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PayloadType {
    String,
    Json,
    Csv,
}

/// Forces this variant for contexts where the named field matches one of
/// the listed values, bypassing the weighted roll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Override {
    pub context_name: String,
    pub values: Vec<String>,
}

/// One traffic bucket of a feature within a single environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Variant {
    pub name: String,
    /// Permille share of traffic, 0..=1000.
    pub weight: u16,
    #[serde(default)]
    pub weight_type: WeightType,
    /// Context field used to assign clients to buckets consistently.
    #[serde(default = "default_stickiness")]
    pub stickiness: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<VariantPayload>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub overrides: Vec<Override>,
}

fn default_stickiness() -> String {
    "default".to_string()
}

impl Variant {
    /// A variable-weight variant with default stickiness and no payload.
    pub fn new(name: impl Into<String>, weight: u16) -> Self {
        Self {
            name: name.into(),
            weight,
            weight_type: WeightType::Variable,
            stickiness: default_stickiness(),
            payload: None,
            overrides: Vec::new(),
        }
    }

    /// Same as [`Variant::new`] but with the weight pinned.
    pub fn fixed(name: impl Into<String>, weight: u16) -> Self {
        let mut variant = Self::new(name, weight);
        variant.weight_type = WeightType::Fix;
        variant
    }
}

/// Sorts a list into canonical order: ascending by name, byte-wise.
///
/// Every persisted or exported list is kept in this order so diffs, reads,
/// and round-trips are reproducible.
pub fn canonical_sort(variants: &mut [Variant]) {
    variants.sort_by(|a, b| a.name.cmp(&b.name));
}

/// Checks a list against the persistence rules: unique names, weights within
/// bounds, and a total of exactly [`TOTAL_VARIANT_WEIGHT`]. Empty lists are
/// valid and exempt from the total.
pub fn validate(variants: &[Variant]) -> Result<()> {
    let mut seen = HashSet::with_capacity(variants.len());
    for variant in variants {
        if !seen.insert(variant.name.as_str()) {
            return Err(TogglekitError::InvalidVariants(format!(
                "duplicate variant name \"{}\"",
                variant.name
            )));
        }
        if variant.weight > TOTAL_VARIANT_WEIGHT {
            return Err(TogglekitError::InvalidVariants(format!(
                "variant \"{}\" has weight {}, allowed range is 0..={}",
                variant.name, variant.weight, TOTAL_VARIANT_WEIGHT
            )));
        }
    }
    if !variants.is_empty() {
        let total: u32 = variants.iter().map(|v| u32::from(v.weight)).sum();
        if total != u32::from(TOTAL_VARIANT_WEIGHT) {
            return Err(TogglekitError::InvalidVariants(format!(
                "variant weights sum to {total}, expected {TOTAL_VARIANT_WEIGHT}"
            )));
        }
    }
    Ok(())
}

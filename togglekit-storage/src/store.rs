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

//! Store traits.
//!
//! Services depend on these traits, never on a concrete backend, so any
//! engine that can satisfy the contracts (relational, document, in-memory)
//! can sit underneath. All traits are object-safe and `Send + Sync`.

use serde::{Deserialize, Serialize};
use togglekit_core::{
    Environment, Feature, FeatureEnvironment, FeatureQuery, FeatureTag, Project, Result, Tag,
    Variant,
};

/// One persisted (feature, environment) variant row.
///
/// Empty lists are never persisted, so every row carries at least one
/// variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentVariants {
    pub feature_name: String,
    pub environment: String,
    pub variants: Vec<Variant>,
}

/// Feature lifecycle plus the variant read/write paths.
#[async_trait::async_trait]
pub trait FeatureStore: Send + Sync {
    /// Insert a new feature under `project`. Fails with `Conflict` when a
    /// feature of the same name already exists.
    async fn create(&self, project: &str, feature: Feature) -> Result<Feature>;

    /// Overwrite an existing feature's definition. The stored `createdAt`,
    /// `lastSeenAt`, and archive marker are preserved; everything else is
    /// taken from the submitted feature. Fails with `NotFound` when the
    /// feature does not exist.
    async fn update(&self, project: &str, feature: Feature) -> Result<Feature>;

    async fn get(&self, name: &str) -> Result<Feature>;

    /// List features matching `query`, sorted by name.
    async fn get_all(&self, query: &FeatureQuery) -> Result<Vec<Feature>>;

    async fn exists(&self, name: &str) -> Result<bool>;

    /// Soft-delete: stamp `archivedAt` and hide the feature from default
    /// listings.
    async fn archive(&self, name: &str) -> Result<Feature>;

    /// Clear the archive marker, making the feature active again.
    async fn revive(&self, name: &str) -> Result<Feature>;

    /// Hard-delete an archived feature. Fails with `PreconditionFailed`
    /// when the feature was never archived. Cascades its environment rows,
    /// variant rows, and feature tags, the way a relational delete would.
    async fn delete(&self, name: &str) -> Result<()>;

    /// Drop every feature and everything hanging off one.
    async fn delete_all(&self) -> Result<()>;

    /// Bulk last-seen heartbeat. Best-effort with skip-locked semantics:
    /// rows currently held by another writer are skipped rather than waited
    /// on, and unknown names are logged and ignored. Never fails the
    /// caller.
    async fn set_last_seen(&self, names: &[String]);

    /// Legacy single-list view: the first environment-variant row in key
    /// order, or an empty list when no environment carries variants. Fails
    /// with `NotFound` when the feature itself does not exist.
    async fn get_variants(&self, name: &str) -> Result<Vec<Variant>>;

    /// Variants for one (feature, environment) pair. A missing row reads as
    /// an empty list.
    async fn get_variants_for_env(&self, name: &str, environment: &str) -> Result<Vec<Variant>>;

    /// Legacy whole-feature write: persist the same variant list, sorted
    /// canonically but otherwise untouched, on every environment the
    /// feature is connected to. Returns the feature with the list attached.
    /// Fails with `NotFound` when the feature does not exist in `project`.
    async fn save_variants(
        &self,
        project: &str,
        name: &str,
        variants: Vec<Variant>,
    ) -> Result<Feature>;

    /// Upsert the variant list for one (feature, environment) pair and
    /// return it in canonical order. An empty list clears the row.
    async fn save_variants_on_env(
        &self,
        name: &str,
        environment: &str,
        variants: Vec<Variant>,
    ) -> Result<Vec<Variant>>;

    /// Every persisted variant row, in composite key order.
    async fn get_all_variants(&self) -> Result<Vec<EnvironmentVariants>>;
}

/// Per-environment activation rows.
#[async_trait::async_trait]
pub trait FeatureEnvironmentStore: Send + Sync {
    /// Connect a feature to an environment. Insert-if-absent: an existing
    /// row keeps its enablement and strategies.
    async fn add_environment_to_feature(
        &self,
        feature_name: &str,
        environment: &str,
        enabled: bool,
    ) -> Result<()>;

    /// Import-path upsert of a full row, variants included.
    async fn add_feature_environment(&self, row: FeatureEnvironment) -> Result<()>;

    async fn feature_has_environment(&self, feature_name: &str, environment: &str)
        -> Result<bool>;

    /// All rows for one feature, variants attached, in environment order.
    async fn get_environments_for_feature(
        &self,
        feature_name: &str,
    ) -> Result<Vec<FeatureEnvironment>>;

    /// Every row, variants attached, in composite key order.
    async fn get_all(&self) -> Result<Vec<FeatureEnvironment>>;

    /// Flip enablement for one row. Returns the number of rows that
    /// actually changed (0 when the row is absent or already in the
    /// requested state).
    async fn set_environment_enabled_status(
        &self,
        environment: &str,
        feature_name: &str,
        enabled: bool,
    ) -> Result<usize>;

    /// Disconnect a feature from an environment, dropping the variant row
    /// with it.
    async fn remove_environment_for_feature(
        &self,
        feature_name: &str,
        environment: &str,
    ) -> Result<()>;

    async fn delete_all(&self) -> Result<()>;
}

/// Environment definitions.
#[async_trait::async_trait]
pub trait EnvironmentStore: Send + Sync {
    /// Fails with `Conflict` when the environment already exists.
    async fn create(&self, environment: Environment) -> Result<Environment>;

    async fn upsert(&self, environment: Environment) -> Result<Environment>;

    async fn exists(&self, name: &str) -> Result<bool>;

    /// All environments, sorted by `sortOrder` then name.
    async fn get_all(&self) -> Result<Vec<Environment>>;

    async fn delete_all(&self) -> Result<()>;
}

/// Project definitions.
#[async_trait::async_trait]
pub trait ProjectStore: Send + Sync {
    /// Fails with `Conflict` when the project id already exists.
    async fn create(&self, project: Project) -> Result<Project>;

    async fn upsert(&self, project: Project) -> Result<Project>;

    async fn exists(&self, id: &str) -> Result<bool>;

    /// All projects, sorted by id.
    async fn get_all(&self) -> Result<Vec<Project>>;

    async fn delete_all(&self) -> Result<()>;
}

/// Tag definitions and feature-tag links.
#[async_trait::async_trait]
pub trait TagStore: Send + Sync {
    /// Fails with `Conflict` when the tag already exists.
    async fn create(&self, tag: Tag) -> Result<Tag>;

    async fn upsert(&self, tag: Tag) -> Result<Tag>;

    async fn exists(&self, tag: &Tag) -> Result<bool>;

    async fn get_all(&self) -> Result<Vec<Tag>>;

    /// Attach a tag to a feature. Upsert; the tag itself need not be
    /// predeclared.
    async fn tag_feature(&self, feature_tag: FeatureTag) -> Result<FeatureTag>;

    async fn get_all_feature_tags(&self) -> Result<Vec<FeatureTag>>;

    /// Drop every tag link for one feature. The tags themselves survive.
    async fn remove_tags_for_feature(&self, feature_name: &str) -> Result<()>;

    /// Drop all tags and all feature-tag links.
    async fn delete_all(&self) -> Result<()>;
}

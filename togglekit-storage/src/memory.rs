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

//! In-memory store implementation.
//!
//! One [`MemoryState`] backs five store views, the way one database backs
//! the stores of a server deployment. Features live in a [`DashMap`] whose
//! values are per-row [`Mutex`]es so the last-seen heartbeat can probe rows
//! with `try_lock` and skip contended ones instead of waiting. Everything
//! keyed or listed deterministically lives in a `RwLock<BTreeMap>`.
//!
//! Lock discipline: no method holds guards on two tables at once. Reads
//! that need rows plus variants collect the rows first, release the guard,
//! then attach variants under the second lock.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use tracing::{debug, warn};

use togglekit_core::{
    canonical_sort, Environment, Feature, FeatureEnvironment, FeatureEnvironmentKey, FeatureQuery,
    FeatureTag, Project, Result, Tag, TogglekitError, Variant,
};

use crate::store::{
    EnvironmentStore, EnvironmentVariants, FeatureEnvironmentStore, FeatureStore, ProjectStore,
    TagStore,
};

/// Shared backing state for every in-memory store view.
#[derive(Default)]
pub struct MemoryState {
    features: DashMap<String, Mutex<Feature>>,
    /// Activation rows. Variants are held in `environment_variants`, so
    /// rows in this table always carry an empty list.
    feature_environments: RwLock<BTreeMap<FeatureEnvironmentKey, FeatureEnvironment>>,
    /// Variant rows. An empty list is never stored; clearing a list removes
    /// the row.
    environment_variants: RwLock<BTreeMap<FeatureEnvironmentKey, Vec<Variant>>>,
    environments: RwLock<BTreeMap<String, Environment>>,
    projects: RwLock<BTreeMap<String, Project>>,
    tags: RwLock<BTreeSet<Tag>>,
    feature_tags: RwLock<BTreeSet<FeatureTag>>,
}

impl MemoryState {
    fn attach_variants(&self, mut rows: Vec<FeatureEnvironment>) -> Vec<FeatureEnvironment> {
        let table = self.environment_variants.read();
        for row in &mut rows {
            row.variants = table.get(&row.key()).cloned().unwrap_or_default();
        }
        rows
    }

    fn drop_feature_rows(&self, name: &str) {
        self.feature_environments.write().retain(|key, _| key.0 != name);
        self.environment_variants.write().retain(|key, _| key.0 != name);
        self.feature_tags.write().retain(|link| link.feature_name != name);
    }
}

/// All five store views over one shared state.
pub struct MemoryStores {
    pub features: Arc<MemoryFeatureStore>,
    pub feature_environments: Arc<MemoryFeatureEnvironmentStore>,
    pub environments: Arc<MemoryEnvironmentStore>,
    pub projects: Arc<MemoryProjectStore>,
    pub tags: Arc<MemoryTagStore>,
}

impl MemoryStores {
    pub fn new() -> Self {
        let state = Arc::new(MemoryState::default());
        Self {
            features: Arc::new(MemoryFeatureStore::new(state.clone())),
            feature_environments: Arc::new(MemoryFeatureEnvironmentStore::new(state.clone())),
            environments: Arc::new(MemoryEnvironmentStore::new(state.clone())),
            projects: Arc::new(MemoryProjectStore::new(state.clone())),
            tags: Arc::new(MemoryTagStore::new(state)),
        }
    }
}

impl Default for MemoryStores {
    fn default() -> Self {
        Self::new()
    }
}

pub struct MemoryFeatureStore {
    state: Arc<MemoryState>,
}

impl MemoryFeatureStore {
    pub fn new(state: Arc<MemoryState>) -> Self {
        Self { state }
    }
}

#[async_trait::async_trait]
impl FeatureStore for MemoryFeatureStore {
    async fn create(&self, project: &str, mut feature: Feature) -> Result<Feature> {
        feature.project = project.to_string();
        match self.state.features.entry(feature.name.clone()) {
            Entry::Occupied(_) => Err(TogglekitError::Conflict(format!(
                "feature {:?} already exists",
                feature.name
            ))),
            Entry::Vacant(slot) => {
                slot.insert(Mutex::new(feature.clone()));
                Ok(feature)
            }
        }
    }

    async fn update(&self, project: &str, mut feature: Feature) -> Result<Feature> {
        let row = self
            .state
            .features
            .get(&feature.name)
            .ok_or_else(|| TogglekitError::NotFound(format!("feature {:?}", feature.name)))?;
        let mut stored = row.lock();
        feature.project = project.to_string();
        feature.created_at = stored.created_at;
        feature.last_seen_at = stored.last_seen_at;
        feature.archived_at = stored.archived_at;
        *stored = feature.clone();
        Ok(feature)
    }

    async fn get(&self, name: &str) -> Result<Feature> {
        self.state
            .features
            .get(name)
            .map(|row| row.lock().clone())
            .ok_or_else(|| TogglekitError::NotFound(format!("feature {:?}", name)))
    }

    async fn get_all(&self, query: &FeatureQuery) -> Result<Vec<Feature>> {
        let mut features: Vec<Feature> = self
            .state
            .features
            .iter()
            .map(|row| row.value().lock().clone())
            .filter(|feature| query.matches(feature))
            .collect();
        features.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(features)
    }

    async fn exists(&self, name: &str) -> Result<bool> {
        Ok(self.state.features.contains_key(name))
    }

    async fn archive(&self, name: &str) -> Result<Feature> {
        let row = self
            .state
            .features
            .get(name)
            .ok_or_else(|| TogglekitError::NotFound(format!("feature {:?}", name)))?;
        let mut feature = row.lock();
        feature.archived_at = Some(Utc::now());
        Ok(feature.clone())
    }

    async fn revive(&self, name: &str) -> Result<Feature> {
        let row = self
            .state
            .features
            .get(name)
            .ok_or_else(|| TogglekitError::NotFound(format!("feature {:?}", name)))?;
        let mut feature = row.lock();
        feature.archived_at = None;
        Ok(feature.clone())
    }

    async fn delete(&self, name: &str) -> Result<()> {
        // The map guard must drop before `remove` touches the same shard.
        {
            let row = self
                .state
                .features
                .get(name)
                .ok_or_else(|| TogglekitError::NotFound(format!("feature {:?}", name)))?;
            if !row.lock().is_archived() {
                return Err(TogglekitError::PreconditionFailed(format!(
                    "feature {:?} must be archived before deletion",
                    name
                )));
            }
        }
        self.state.features.remove(name);
        self.state.drop_feature_rows(name);
        Ok(())
    }

    async fn delete_all(&self) -> Result<()> {
        self.state.features.clear();
        self.state.feature_environments.write().clear();
        self.state.environment_variants.write().clear();
        self.state.feature_tags.write().clear();
        Ok(())
    }

    async fn set_last_seen(&self, names: &[String]) {
        let now = Utc::now();
        for name in names {
            match self.state.features.get(name) {
                Some(row) => match row.try_lock() {
                    Some(mut feature) => feature.last_seen_at = Some(now),
                    None => {
                        debug!(feature = %name, "feature row is locked, skipping last-seen update")
                    }
                },
                None => warn!(feature = %name, "last-seen update for unknown feature"),
            }
        }
    }

    async fn get_variants(&self, name: &str) -> Result<Vec<Variant>> {
        if !self.state.features.contains_key(name) {
            return Err(TogglekitError::NotFound(format!("feature {:?}", name)));
        }
        let table = self.state.environment_variants.read();
        let variants = table
            .range((name.to_string(), String::new())..)
            .take_while(|(key, _)| key.0 == name)
            .map(|(_, list)| list.clone())
            .next()
            .unwrap_or_default();
        Ok(variants)
    }

    async fn get_variants_for_env(&self, name: &str, environment: &str) -> Result<Vec<Variant>> {
        let key = (name.to_string(), environment.to_string());
        Ok(self
            .state
            .environment_variants
            .read()
            .get(&key)
            .cloned()
            .unwrap_or_default())
    }

    async fn save_variants(
        &self,
        project: &str,
        name: &str,
        variants: Vec<Variant>,
    ) -> Result<Feature> {
        let mut feature = self.get(name).await?;
        if feature.project != project {
            return Err(TogglekitError::NotFound(format!(
                "feature {:?} in project {:?}",
                name, project
            )));
        }

        let mut list = variants;
        canonical_sort(&mut list);

        let environments: Vec<String> = {
            let table = self.state.feature_environments.read();
            table
                .range((name.to_string(), String::new())..)
                .take_while(|(key, _)| key.0 == name)
                .map(|(key, _)| key.1.clone())
                .collect()
        };
        {
            let mut table = self.state.environment_variants.write();
            for environment in environments {
                let key = (name.to_string(), environment);
                if list.is_empty() {
                    table.remove(&key);
                } else {
                    table.insert(key, list.clone());
                }
            }
        }

        feature.variants = Some(list);
        Ok(feature)
    }

    async fn save_variants_on_env(
        &self,
        name: &str,
        environment: &str,
        variants: Vec<Variant>,
    ) -> Result<Vec<Variant>> {
        let mut list = variants;
        canonical_sort(&mut list);
        let key = (name.to_string(), environment.to_string());
        let mut table = self.state.environment_variants.write();
        if list.is_empty() {
            table.remove(&key);
        } else {
            table.insert(key, list.clone());
        }
        Ok(list)
    }

    async fn get_all_variants(&self) -> Result<Vec<EnvironmentVariants>> {
        Ok(self
            .state
            .environment_variants
            .read()
            .iter()
            .map(|((feature_name, environment), variants)| EnvironmentVariants {
                feature_name: feature_name.clone(),
                environment: environment.clone(),
                variants: variants.clone(),
            })
            .collect())
    }
}

pub struct MemoryFeatureEnvironmentStore {
    state: Arc<MemoryState>,
}

impl MemoryFeatureEnvironmentStore {
    pub fn new(state: Arc<MemoryState>) -> Self {
        Self { state }
    }
}

#[async_trait::async_trait]
impl FeatureEnvironmentStore for MemoryFeatureEnvironmentStore {
    async fn add_environment_to_feature(
        &self,
        feature_name: &str,
        environment: &str,
        enabled: bool,
    ) -> Result<()> {
        let key = (feature_name.to_string(), environment.to_string());
        let mut table = self.state.feature_environments.write();
        table.entry(key).or_insert_with(|| {
            let mut row = FeatureEnvironment::new(feature_name, environment);
            row.enabled = enabled;
            row
        });
        Ok(())
    }

    async fn add_feature_environment(&self, mut row: FeatureEnvironment) -> Result<()> {
        let mut variants = std::mem::take(&mut row.variants);
        canonical_sort(&mut variants);
        let key = row.key();
        {
            let mut table = self.state.feature_environments.write();
            table.insert(key.clone(), row);
        }
        {
            let mut table = self.state.environment_variants.write();
            if variants.is_empty() {
                table.remove(&key);
            } else {
                table.insert(key, variants);
            }
        }
        Ok(())
    }

    async fn feature_has_environment(
        &self,
        feature_name: &str,
        environment: &str,
    ) -> Result<bool> {
        let key = (feature_name.to_string(), environment.to_string());
        Ok(self.state.feature_environments.read().contains_key(&key))
    }

    async fn get_environments_for_feature(
        &self,
        feature_name: &str,
    ) -> Result<Vec<FeatureEnvironment>> {
        let rows: Vec<FeatureEnvironment> = {
            let table = self.state.feature_environments.read();
            table
                .range((feature_name.to_string(), String::new())..)
                .take_while(|(key, _)| key.0 == feature_name)
                .map(|(_, row)| row.clone())
                .collect()
        };
        Ok(self.state.attach_variants(rows))
    }

    async fn get_all(&self) -> Result<Vec<FeatureEnvironment>> {
        let rows: Vec<FeatureEnvironment> = {
            let table = self.state.feature_environments.read();
            table.values().cloned().collect()
        };
        Ok(self.state.attach_variants(rows))
    }

    async fn set_environment_enabled_status(
        &self,
        environment: &str,
        feature_name: &str,
        enabled: bool,
    ) -> Result<usize> {
        let key = (feature_name.to_string(), environment.to_string());
        let mut table = self.state.feature_environments.write();
        match table.get_mut(&key) {
            Some(row) if row.enabled != enabled => {
                row.enabled = enabled;
                Ok(1)
            }
            _ => Ok(0),
        }
    }

    async fn remove_environment_for_feature(
        &self,
        feature_name: &str,
        environment: &str,
    ) -> Result<()> {
        let key = (feature_name.to_string(), environment.to_string());
        self.state.feature_environments.write().remove(&key);
        self.state.environment_variants.write().remove(&key);
        Ok(())
    }

    async fn delete_all(&self) -> Result<()> {
        self.state.feature_environments.write().clear();
        self.state.environment_variants.write().clear();
        Ok(())
    }
}

pub struct MemoryEnvironmentStore {
    state: Arc<MemoryState>,
}

impl MemoryEnvironmentStore {
    pub fn new(state: Arc<MemoryState>) -> Self {
        Self { state }
    }
}

#[async_trait::async_trait]
impl EnvironmentStore for MemoryEnvironmentStore {
    async fn create(&self, environment: Environment) -> Result<Environment> {
        let mut table = self.state.environments.write();
        if table.contains_key(&environment.name) {
            return Err(TogglekitError::Conflict(format!(
                "environment {:?} already exists",
                environment.name
            )));
        }
        table.insert(environment.name.clone(), environment.clone());
        Ok(environment)
    }

    async fn upsert(&self, environment: Environment) -> Result<Environment> {
        self.state
            .environments
            .write()
            .insert(environment.name.clone(), environment.clone());
        Ok(environment)
    }

    async fn exists(&self, name: &str) -> Result<bool> {
        Ok(self.state.environments.read().contains_key(name))
    }

    async fn get_all(&self) -> Result<Vec<Environment>> {
        let mut environments: Vec<Environment> =
            self.state.environments.read().values().cloned().collect();
        environments
            .sort_by(|a, b| a.sort_order.cmp(&b.sort_order).then_with(|| a.name.cmp(&b.name)));
        Ok(environments)
    }

    async fn delete_all(&self) -> Result<()> {
        self.state.environments.write().clear();
        Ok(())
    }
}

pub struct MemoryProjectStore {
    state: Arc<MemoryState>,
}

impl MemoryProjectStore {
    pub fn new(state: Arc<MemoryState>) -> Self {
        Self { state }
    }
}

#[async_trait::async_trait]
impl ProjectStore for MemoryProjectStore {
    async fn create(&self, project: Project) -> Result<Project> {
        let mut table = self.state.projects.write();
        if table.contains_key(&project.id) {
            return Err(TogglekitError::Conflict(format!(
                "project {:?} already exists",
                project.id
            )));
        }
        table.insert(project.id.clone(), project.clone());
        Ok(project)
    }

    async fn upsert(&self, project: Project) -> Result<Project> {
        self.state
            .projects
            .write()
            .insert(project.id.clone(), project.clone());
        Ok(project)
    }

    async fn exists(&self, id: &str) -> Result<bool> {
        Ok(self.state.projects.read().contains_key(id))
    }

    async fn get_all(&self) -> Result<Vec<Project>> {
        Ok(self.state.projects.read().values().cloned().collect())
    }

    async fn delete_all(&self) -> Result<()> {
        self.state.projects.write().clear();
        Ok(())
    }
}

pub struct MemoryTagStore {
    state: Arc<MemoryState>,
}

impl MemoryTagStore {
    pub fn new(state: Arc<MemoryState>) -> Self {
        Self { state }
    }
}

#[async_trait::async_trait]
impl TagStore for MemoryTagStore {
    async fn create(&self, tag: Tag) -> Result<Tag> {
        let mut table = self.state.tags.write();
        if table.contains(&tag) {
            return Err(TogglekitError::Conflict(format!(
                "tag {}:{} already exists",
                tag.tag_type, tag.value
            )));
        }
        table.insert(tag.clone());
        Ok(tag)
    }

    async fn upsert(&self, tag: Tag) -> Result<Tag> {
        self.state.tags.write().insert(tag.clone());
        Ok(tag)
    }

    async fn exists(&self, tag: &Tag) -> Result<bool> {
        Ok(self.state.tags.read().contains(tag))
    }

    async fn get_all(&self) -> Result<Vec<Tag>> {
        Ok(self.state.tags.read().iter().cloned().collect())
    }

    async fn tag_feature(&self, feature_tag: FeatureTag) -> Result<FeatureTag> {
        self.state.feature_tags.write().insert(feature_tag.clone());
        Ok(feature_tag)
    }

    async fn get_all_feature_tags(&self) -> Result<Vec<FeatureTag>> {
        Ok(self.state.feature_tags.read().iter().cloned().collect())
    }

    async fn remove_tags_for_feature(&self, feature_name: &str) -> Result<()> {
        self.state
            .feature_tags
            .write()
            .retain(|link| link.feature_name != feature_name);
        Ok(())
    }

    async fn delete_all(&self) -> Result<()> {
        self.state.tags.write().clear();
        self.state.feature_tags.write().clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use togglekit_core::Variant;

    fn variant(name: &str, weight: u16) -> Variant {
        Variant::new(name, weight)
    }

    #[tokio::test]
    async fn test_create_rejects_duplicate_names() {
        let stores = MemoryStores::new();
        stores
            .features
            .create("default", Feature::new("checkout", "default"))
            .await
            .unwrap();

        let err = stores
            .features
            .create("default", Feature::new("checkout", "default"))
            .await
            .unwrap_err();
        assert!(matches!(err, TogglekitError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_update_preserves_lifecycle_fields() {
        let stores = MemoryStores::new();
        let created = stores
            .features
            .create("default", Feature::new("checkout", "default"))
            .await
            .unwrap();

        let mut submitted = Feature::new("checkout", "default");
        submitted.description = "new checkout flow".to_string();
        submitted.stale = true;
        let updated = stores.features.update("default", submitted).await.unwrap();

        assert_eq!(updated.description, "new checkout flow");
        assert!(updated.stale);
        assert_eq!(updated.created_at, created.created_at);
    }

    #[tokio::test]
    async fn test_update_unknown_feature_fails() {
        let stores = MemoryStores::new();
        let err = stores
            .features
            .update("default", Feature::new("ghost", "default"))
            .await
            .unwrap_err();
        assert!(matches!(err, TogglekitError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_delete_requires_archive_and_cascades() {
        let stores = MemoryStores::new();
        stores
            .features
            .create("default", Feature::new("checkout", "default"))
            .await
            .unwrap();
        stores
            .feature_environments
            .add_environment_to_feature("checkout", "development", true)
            .await
            .unwrap();
        stores
            .features
            .save_variants_on_env("checkout", "development", vec![variant("on", 1000)])
            .await
            .unwrap();
        stores
            .tags
            .tag_feature(FeatureTag::new("checkout", &Tag::new("team", "payments")))
            .await
            .unwrap();

        let err = stores.features.delete("checkout").await.unwrap_err();
        assert!(matches!(err, TogglekitError::PreconditionFailed(_)));

        stores.features.archive("checkout").await.unwrap();
        stores.features.delete("checkout").await.unwrap();

        assert!(!stores.features.exists("checkout").await.unwrap());
        assert!(!stores
            .feature_environments
            .feature_has_environment("checkout", "development")
            .await
            .unwrap());
        assert!(stores.features.get_all_variants().await.unwrap().is_empty());
        assert!(stores.tags.get_all_feature_tags().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_default_listing_hides_archived_features() {
        let stores = MemoryStores::new();
        stores
            .features
            .create("default", Feature::new("active", "default"))
            .await
            .unwrap();
        stores
            .features
            .create("default", Feature::new("retired", "default"))
            .await
            .unwrap();
        stores.features.archive("retired").await.unwrap();

        let active = stores
            .features
            .get_all(&FeatureQuery::default())
            .await
            .unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].name, "active");

        let archived_query = FeatureQuery {
            archived: true,
            ..FeatureQuery::default()
        };
        let archived = stores.features.get_all(&archived_query).await.unwrap();
        assert_eq!(archived.len(), 1);
        assert_eq!(archived[0].name, "retired");

        stores.features.revive("retired").await.unwrap();
        let active = stores
            .features
            .get_all(&FeatureQuery::default())
            .await
            .unwrap();
        assert_eq!(active.len(), 2);
    }

    #[tokio::test]
    async fn test_save_variants_on_env_sorts_and_clears() {
        let stores = MemoryStores::new();
        let saved = stores
            .features
            .save_variants_on_env(
                "checkout",
                "development",
                vec![variant("red", 500), variant("blue", 500)],
            )
            .await
            .unwrap();
        assert_eq!(saved[0].name, "blue");
        assert_eq!(saved[1].name, "red");

        let read = stores
            .features
            .get_variants_for_env("checkout", "development")
            .await
            .unwrap();
        assert_eq!(read, saved);

        stores
            .features
            .save_variants_on_env("checkout", "development", vec![])
            .await
            .unwrap();
        assert!(stores.features.get_all_variants().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_save_variants_fans_out_to_connected_environments() {
        let stores = MemoryStores::new();
        stores
            .features
            .create("default", Feature::new("checkout", "default"))
            .await
            .unwrap();
        stores
            .feature_environments
            .add_environment_to_feature("checkout", "development", true)
            .await
            .unwrap();
        stores
            .feature_environments
            .add_environment_to_feature("checkout", "production", false)
            .await
            .unwrap();

        let feature = stores
            .features
            .save_variants("default", "checkout", vec![variant("on", 1000)])
            .await
            .unwrap();
        assert_eq!(feature.variants.as_deref().unwrap().len(), 1);

        for environment in ["development", "production"] {
            let list = stores
                .features
                .get_variants_for_env("checkout", environment)
                .await
                .unwrap();
            assert_eq!(list.len(), 1);
            assert_eq!(list[0].name, "on");
        }
        assert_eq!(stores.features.get_all_variants().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_save_variants_checks_the_project() {
        let stores = MemoryStores::new();
        stores
            .features
            .create("payments", Feature::new("checkout", "payments"))
            .await
            .unwrap();
        let err = stores
            .features
            .save_variants("web", "checkout", vec![variant("on", 1000)])
            .await
            .unwrap_err();
        assert!(matches!(err, TogglekitError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_get_variants_reads_first_row_in_key_order() {
        let stores = MemoryStores::new();
        stores
            .features
            .create("default", Feature::new("checkout", "default"))
            .await
            .unwrap();
        stores
            .features
            .save_variants_on_env("checkout", "production", vec![variant("prod", 1000)])
            .await
            .unwrap();
        stores
            .features
            .save_variants_on_env("checkout", "development", vec![variant("dev", 1000)])
            .await
            .unwrap();

        let list = stores.features.get_variants("checkout").await.unwrap();
        assert_eq!(list[0].name, "dev");
    }

    #[tokio::test]
    async fn test_get_variants_requires_the_feature() {
        let stores = MemoryStores::new();
        let err = stores.features.get_variants("ghost").await.unwrap_err();
        assert!(matches!(err, TogglekitError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_set_last_seen_skips_locked_rows() {
        let stores = MemoryStores::new();
        stores
            .features
            .create("default", Feature::new("a", "default"))
            .await
            .unwrap();
        stores
            .features
            .create("default", Feature::new("b", "default"))
            .await
            .unwrap();

        let names = vec!["a".to_string(), "b".to_string(), "ghost".to_string()];
        {
            let row = stores.features.state.features.get("b").unwrap();
            let _held = row.try_lock().unwrap();
            stores.features.set_last_seen(&names).await;
        }

        let a = stores.features.get("a").await.unwrap();
        let b = stores.features.get("b").await.unwrap();
        assert!(a.last_seen_at.is_some());
        assert!(b.last_seen_at.is_none());

        // Uncontended retry reaches the previously skipped row.
        stores.features.set_last_seen(&names).await;
        let b = stores.features.get("b").await.unwrap();
        assert!(b.last_seen_at.is_some());
    }

    #[tokio::test]
    async fn test_concurrent_last_seen_updates_complete() {
        let stores = MemoryStores::new();
        for name in ["a", "b", "c"] {
            stores
                .features
                .create("default", Feature::new(name, "default"))
                .await
                .unwrap();
        }

        let left = stores.features.clone();
        let right = stores.features.clone();
        let first = tokio::spawn(async move {
            left.set_last_seen(&["a".to_string(), "b".to_string()]).await;
        });
        let second = tokio::spawn(async move {
            right.set_last_seen(&["b".to_string(), "c".to_string()]).await;
        });
        first.await.unwrap();
        second.await.unwrap();

        // A contended row may have been skipped; one more pass settles it.
        stores
            .features
            .set_last_seen(&["a".to_string(), "b".to_string(), "c".to_string()])
            .await;
        for name in ["a", "b", "c"] {
            assert!(stores.features.get(name).await.unwrap().last_seen_at.is_some());
        }
    }

    #[tokio::test]
    async fn test_add_environment_to_feature_keeps_existing_rows() {
        let stores = MemoryStores::new();
        stores
            .feature_environments
            .add_environment_to_feature("checkout", "development", true)
            .await
            .unwrap();
        stores
            .feature_environments
            .add_environment_to_feature("checkout", "development", false)
            .await
            .unwrap();

        let rows = stores
            .feature_environments
            .get_environments_for_feature("checkout")
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert!(rows[0].enabled);
    }

    #[tokio::test]
    async fn test_enabled_status_reports_changed_rows() {
        let stores = MemoryStores::new();
        stores
            .feature_environments
            .add_environment_to_feature("checkout", "development", false)
            .await
            .unwrap();

        let changed = stores
            .feature_environments
            .set_environment_enabled_status("development", "checkout", true)
            .await
            .unwrap();
        assert_eq!(changed, 1);

        let unchanged = stores
            .feature_environments
            .set_environment_enabled_status("development", "checkout", true)
            .await
            .unwrap();
        assert_eq!(unchanged, 0);

        let missing = stores
            .feature_environments
            .set_environment_enabled_status("production", "checkout", true)
            .await
            .unwrap();
        assert_eq!(missing, 0);
    }

    #[tokio::test]
    async fn test_disconnecting_drops_the_variant_row() {
        let stores = MemoryStores::new();
        stores
            .feature_environments
            .add_environment_to_feature("checkout", "development", true)
            .await
            .unwrap();
        stores
            .features
            .save_variants_on_env("checkout", "development", vec![variant("on", 1000)])
            .await
            .unwrap();

        stores
            .feature_environments
            .remove_environment_for_feature("checkout", "development")
            .await
            .unwrap();
        assert!(stores.features.get_all_variants().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_environments_list_by_sort_order_then_name() {
        let stores = MemoryStores::new();
        let mut production = Environment::new(
            "production",
            togglekit_core::EnvironmentType::Production,
        );
        production.sort_order = 1;
        let development = Environment::new(
            "development",
            togglekit_core::EnvironmentType::Development,
        );
        stores.environments.upsert(development).await.unwrap();
        stores.environments.upsert(production).await.unwrap();

        let listed = stores.environments.get_all().await.unwrap();
        assert_eq!(listed[0].name, "production");
        assert_eq!(listed[1].name, "development");
    }

    #[tokio::test]
    async fn test_tag_links_deduplicate_and_detach() {
        let stores = MemoryStores::new();
        let tag = Tag::new("team", "payments");
        stores.tags.upsert(tag.clone()).await.unwrap();
        stores
            .tags
            .tag_feature(FeatureTag::new("checkout", &tag))
            .await
            .unwrap();
        stores
            .tags
            .tag_feature(FeatureTag::new("checkout", &tag))
            .await
            .unwrap();
        assert_eq!(stores.tags.get_all_feature_tags().await.unwrap().len(), 1);

        stores.tags.remove_tags_for_feature("checkout").await.unwrap();
        assert!(stores.tags.get_all_feature_tags().await.unwrap().is_empty());
        assert_eq!(stores.tags.get_all().await.unwrap().len(), 1);
    }
}

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

//! State export and import.
//!
//! Export always produces the current document shape: per-environment rows
//! with their variants attached, all collections in deterministic order so
//! exports are byte-reproducible. Import accepts either generation; legacy
//! documents are migrated by fanning each feature's single global variant
//! list out to every environment the feature is connected to. Migration
//! copies weights verbatim and never redistributes them. Environment rows
//! naming a feature unknown to the store are skipped with a warning rather
//! than imported as orphans.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use togglekit_core::{
    ExportedState, Feature, FeatureEnvironment, FeatureQuery, FeatureTag, LegacyState, Project,
    Result, StateDocument, Tag, Variant, CURRENT_FORMAT_VERSION,
};
use togglekit_storage::{
    EnvironmentStore, FeatureEnvironmentStore, FeatureStore, ProjectStore, TagStore,
};

use crate::events::{Event, EventBus};

/// Import behavior flags. Orthogonal: a drop-then-merge import is legal,
/// and dropping always wins over keeping for the cleared sections.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImportOptions {
    /// Merge mode: entities already in the store are left untouched.
    /// Default is replace, where imported entities overwrite stored ones.
    pub keep_existing: bool,
    /// Clear each store section before importing, but only for sections
    /// the document actually carries.
    pub drop_before_import: bool,
}

/// Counts of what an import wrote.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub projects: usize,
    pub environments: usize,
    pub features: usize,
    pub feature_environments: usize,
    /// (feature, environment) pairs that received a non-empty variant
    /// list.
    pub variant_rows: usize,
    pub tags: usize,
}

/// Export/import over the full store set.
pub struct StateService<F, V, E, P, T>
where
    F: FeatureStore + ?Sized,
    V: FeatureEnvironmentStore + ?Sized,
    E: EnvironmentStore + ?Sized,
    P: ProjectStore + ?Sized,
    T: TagStore + ?Sized,
{
    features: Arc<F>,
    feature_environments: Arc<V>,
    environments: Arc<E>,
    projects: Arc<P>,
    tags: Arc<T>,
    events: EventBus,
}

impl<F, V, E, P, T> StateService<F, V, E, P, T>
where
    F: FeatureStore + ?Sized,
    V: FeatureEnvironmentStore + ?Sized,
    E: EnvironmentStore + ?Sized,
    P: ProjectStore + ?Sized,
    T: TagStore + ?Sized,
{
    pub fn new(
        features: Arc<F>,
        feature_environments: Arc<V>,
        environments: Arc<E>,
        projects: Arc<P>,
        tags: Arc<T>,
        events: EventBus,
    ) -> Self {
        Self {
            features,
            feature_environments,
            environments,
            projects,
            tags,
            events,
        }
    }

    /// Produce a current-format document. `query` filters the feature list
    /// the same way plain listings do; rows and tag links are restricted to
    /// the exported features, while projects, environments, and tag
    /// definitions always export in full.
    pub async fn export(&self, query: &FeatureQuery) -> Result<ExportedState> {
        let features = self.features.get_all(query).await?;
        let names: BTreeSet<String> = features.iter().map(|f| f.name.clone()).collect();

        let feature_environments: Vec<FeatureEnvironment> = self
            .feature_environments
            .get_all()
            .await?
            .into_iter()
            .filter(|row| names.contains(&row.feature_name))
            .collect();
        let feature_tags: Vec<FeatureTag> = self
            .tags
            .get_all_feature_tags()
            .await?
            .into_iter()
            .filter(|link| names.contains(&link.feature_name))
            .collect();

        let document = ExportedState {
            version: CURRENT_FORMAT_VERSION,
            exported_at: Some(Utc::now()),
            projects: self.projects.get_all().await?,
            environments: self.environments.get_all().await?,
            features,
            feature_environments,
            tags: self.tags.get_all().await?,
            feature_tags,
        };
        info!(
            features = document.features.len(),
            rows = document.feature_environments.len(),
            "exported state"
        );
        Ok(document)
    }

    pub async fn import(
        &self,
        document: StateDocument,
        options: ImportOptions,
    ) -> Result<ImportSummary> {
        let summary = match document {
            StateDocument::Current(doc) => self.import_current(doc, options).await?,
            StateDocument::Legacy(doc) => self.import_legacy(doc, options).await?,
        };
        info!(
            features = summary.features,
            rows = summary.feature_environments,
            variant_rows = summary.variant_rows,
            "imported state"
        );
        self.events.publish(Event::StateImported { summary });
        Ok(summary)
    }

    async fn import_current(
        &self,
        doc: ExportedState,
        options: ImportOptions,
    ) -> Result<ImportSummary> {
        let mut summary = ImportSummary::default();

        if options.drop_before_import {
            if !doc.projects.is_empty() {
                self.projects.delete_all().await?;
            }
            if !doc.environments.is_empty() {
                self.environments.delete_all().await?;
            }
            if !doc.features.is_empty() {
                self.features.delete_all().await?;
            }
            if !doc.feature_environments.is_empty() {
                self.feature_environments.delete_all().await?;
            }
            if !doc.tags.is_empty() || !doc.feature_tags.is_empty() {
                self.tags.delete_all().await?;
            }
        }

        summary.projects = self.import_projects(doc.projects, options).await?;
        summary.environments = self.import_environments(doc.environments, options).await?;
        summary.features = self.import_features(doc.features, options).await?;

        for row in doc.feature_environments {
            if !self.features.exists(&row.feature_name).await? {
                warn!(
                    feature = %row.feature_name,
                    environment = %row.environment,
                    "skipping environment row for unknown feature"
                );
                continue;
            }
            if options.keep_existing
                && self
                    .feature_environments
                    .feature_has_environment(&row.feature_name, &row.environment)
                    .await?
            {
                continue;
            }
            if !row.variants.is_empty() {
                summary.variant_rows += 1;
            }
            self.feature_environments.add_feature_environment(row).await?;
            summary.feature_environments += 1;
        }

        summary.tags = self.import_tags(doc.tags, doc.feature_tags, options).await?;
        Ok(summary)
    }

    async fn import_legacy(
        &self,
        doc: LegacyState,
        options: ImportOptions,
    ) -> Result<ImportSummary> {
        let mut summary = ImportSummary::default();

        if options.drop_before_import {
            if !doc.projects.is_empty() {
                self.projects.delete_all().await?;
            }
            if !doc.environments.is_empty() {
                self.environments.delete_all().await?;
            }
            if !doc.features.is_empty() {
                self.features.delete_all().await?;
            }
            if !doc.feature_environments.is_empty() {
                self.feature_environments.delete_all().await?;
            }
            if !doc.tags.is_empty() || !doc.feature_tags.is_empty() {
                self.tags.delete_all().await?;
            }
        }

        summary.projects = self.import_projects(doc.projects, options).await?;
        summary.environments = self.import_environments(doc.environments, options).await?;

        // Peel the global lists off before the features are stored; rows
        // own variants from here on.
        let mut global_variants: Vec<(String, Vec<Variant>)> = Vec::new();
        let mut features = doc.features;
        for feature in &mut features {
            if let Some(variants) = feature.variants.take() {
                if !variants.is_empty() {
                    global_variants.push((feature.name.clone(), variants));
                }
            }
        }
        summary.features = self.import_features(features, options).await?;

        for link in doc.feature_environments {
            if !self.features.exists(&link.feature_name).await? {
                warn!(
                    feature = %link.feature_name,
                    environment = %link.environment,
                    "skipping environment link for unknown feature"
                );
                continue;
            }
            if options.keep_existing
                && self
                    .feature_environments
                    .feature_has_environment(&link.feature_name, &link.environment)
                    .await?
            {
                continue;
            }
            let mut row = FeatureEnvironment::new(&link.feature_name, &link.environment);
            row.enabled = link.enabled;
            self.feature_environments.add_feature_environment(row).await?;
            summary.feature_environments += 1;
        }

        // Migration: the single global list lands on every connected
        // environment. Weights are copied verbatim; migration never
        // redistributes.
        for (feature_name, variants) in global_variants {
            let rows = self
                .feature_environments
                .get_environments_for_feature(&feature_name)
                .await?;
            for row in rows {
                if options.keep_existing && !row.variants.is_empty() {
                    continue;
                }
                self.features
                    .save_variants_on_env(&feature_name, &row.environment, variants.clone())
                    .await?;
                summary.variant_rows += 1;
            }
        }

        summary.tags = self.import_tags(doc.tags, doc.feature_tags, options).await?;
        Ok(summary)
    }

    async fn import_projects(
        &self,
        projects: Vec<Project>,
        options: ImportOptions,
    ) -> Result<usize> {
        let mut imported = 0;
        for project in projects {
            if options.keep_existing && self.projects.exists(&project.id).await? {
                continue;
            }
            self.projects.upsert(project).await?;
            imported += 1;
        }
        Ok(imported)
    }

    async fn import_environments(
        &self,
        environments: Vec<togglekit_core::Environment>,
        options: ImportOptions,
    ) -> Result<usize> {
        let mut imported = 0;
        for environment in environments {
            if options.keep_existing && self.environments.exists(&environment.name).await? {
                continue;
            }
            self.environments.upsert(environment).await?;
            imported += 1;
        }
        Ok(imported)
    }

    async fn import_features(
        &self,
        features: Vec<Feature>,
        options: ImportOptions,
    ) -> Result<usize> {
        let mut imported = 0;
        for mut feature in features {
            // Rows own variants; the feature-level field is a legacy
            // attachment and never stored.
            feature.variants = None;
            let project = feature.project.clone();
            if self.features.exists(&feature.name).await? {
                if options.keep_existing {
                    continue;
                }
                let archived = feature.is_archived();
                let updated = self.features.update(&project, feature).await?;
                // Replace mode honors the document's archive marker, which
                // `update` itself leaves untouched.
                if archived != updated.is_archived() {
                    if archived {
                        self.features.archive(&updated.name).await?;
                    } else {
                        self.features.revive(&updated.name).await?;
                    }
                }
            } else {
                self.features.create(&project, feature).await?;
            }
            imported += 1;
        }
        Ok(imported)
    }

    async fn import_tags(
        &self,
        tags: Vec<Tag>,
        links: Vec<FeatureTag>,
        options: ImportOptions,
    ) -> Result<usize> {
        let mut imported = 0;
        for tag in tags {
            if options.keep_existing && self.tags.exists(&tag).await? {
                continue;
            }
            self.tags.upsert(tag).await?;
            imported += 1;
        }
        for link in links {
            self.tags.tag_feature(link).await?;
        }
        Ok(imported)
    }
}

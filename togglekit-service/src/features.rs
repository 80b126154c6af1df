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

//! Feature lifecycle and variant write path.

use std::sync::Arc;

use tracing::{debug, info};

use togglekit_core::{
    apply, diff, normalize, validate, Feature, FeatureEnvironment, FeatureQuery, PatchOp, Result,
    TogglekitError, Variant,
};
use togglekit_storage::{FeatureEnvironmentStore, FeatureStore};

use crate::events::{Event, EventBus};

/// Feature operations for the API layer. Generic over the store traits so
/// any backend slots in.
pub struct FeatureService<F, E>
where
    F: FeatureStore + ?Sized,
    E: FeatureEnvironmentStore + ?Sized,
{
    features: Arc<F>,
    feature_environments: Arc<E>,
    events: EventBus,
}

impl<F, E> FeatureService<F, E>
where
    F: FeatureStore + ?Sized,
    E: FeatureEnvironmentStore + ?Sized,
{
    pub fn new(features: Arc<F>, feature_environments: Arc<E>, events: EventBus) -> Self {
        Self {
            features,
            feature_environments,
            events,
        }
    }

    pub async fn create_feature(&self, project: &str, feature: Feature) -> Result<Feature> {
        let created = self.features.create(project, feature).await?;
        info!(feature = %created.name, project = %project, "created feature");
        self.events.publish(Event::FeatureCreated {
            feature: created.clone(),
        });
        Ok(created)
    }

    pub async fn update_feature(&self, project: &str, feature: Feature) -> Result<Feature> {
        let updated = self.features.update(project, feature).await?;
        info!(feature = %updated.name, project = %project, "updated feature");
        self.events.publish(Event::FeatureUpdated {
            feature: updated.clone(),
        });
        Ok(updated)
    }

    pub async fn get_feature(&self, name: &str) -> Result<Feature> {
        self.features.get(name).await
    }

    pub async fn get_features(&self, query: &FeatureQuery) -> Result<Vec<Feature>> {
        self.features.get_all(query).await
    }

    pub async fn archive_feature(&self, name: &str) -> Result<Feature> {
        let feature = self.features.archive(name).await?;
        info!(feature = %name, "archived feature");
        self.events.publish(Event::FeatureArchived {
            name: name.to_string(),
        });
        Ok(feature)
    }

    pub async fn revive_feature(&self, name: &str) -> Result<Feature> {
        let feature = self.features.revive(name).await?;
        info!(feature = %name, "revived feature");
        self.events.publish(Event::FeatureRevived {
            name: name.to_string(),
        });
        Ok(feature)
    }

    /// Hard-delete. The store enforces the archive-first precondition.
    pub async fn delete_feature(&self, name: &str) -> Result<()> {
        self.features.delete(name).await?;
        info!(feature = %name, "deleted feature");
        self.events.publish(Event::FeatureDeleted {
            name: name.to_string(),
        });
        Ok(())
    }

    /// Best-effort heartbeat passthrough; never fails.
    pub async fn mark_seen(&self, names: &[String]) {
        self.features.set_last_seen(names).await;
    }

    pub async fn connect_environment(
        &self,
        feature_name: &str,
        environment: &str,
        enabled: bool,
    ) -> Result<()> {
        if !self.features.exists(feature_name).await? {
            return Err(TogglekitError::NotFound(format!(
                "feature {:?}",
                feature_name
            )));
        }
        self.feature_environments
            .add_environment_to_feature(feature_name, environment, enabled)
            .await?;
        info!(feature = %feature_name, environment = %environment, "connected environment");
        self.events.publish(Event::EnvironmentConnected {
            feature_name: feature_name.to_string(),
            environment: environment.to_string(),
        });
        Ok(())
    }

    pub async fn disconnect_environment(
        &self,
        feature_name: &str,
        environment: &str,
    ) -> Result<()> {
        self.feature_environments
            .remove_environment_for_feature(feature_name, environment)
            .await?;
        info!(feature = %feature_name, environment = %environment, "disconnected environment");
        self.events.publish(Event::EnvironmentDisconnected {
            feature_name: feature_name.to_string(),
            environment: environment.to_string(),
        });
        Ok(())
    }

    /// Flip enablement for one (feature, environment) row. A flip to the
    /// current state changes nothing and publishes nothing.
    pub async fn set_environment_enabled(
        &self,
        feature_name: &str,
        environment: &str,
        enabled: bool,
    ) -> Result<usize> {
        let changed = self
            .feature_environments
            .set_environment_enabled_status(environment, feature_name, enabled)
            .await?;
        if changed > 0 {
            info!(feature = %feature_name, environment = %environment, enabled, "toggled environment");
            self.events.publish(Event::EnvironmentToggled {
                feature_name: feature_name.to_string(),
                environment: environment.to_string(),
                enabled,
            });
        }
        Ok(changed)
    }

    pub async fn get_environments(&self, feature_name: &str) -> Result<Vec<FeatureEnvironment>> {
        self.feature_environments
            .get_environments_for_feature(feature_name)
            .await
    }

    /// Legacy single-list view across environments.
    pub async fn get_variants(&self, feature_name: &str) -> Result<Vec<Variant>> {
        self.features.get_variants(feature_name).await
    }

    pub async fn get_variants_for_env(
        &self,
        feature_name: &str,
        environment: &str,
    ) -> Result<Vec<Variant>> {
        self.features
            .get_variants_for_env(feature_name, environment)
            .await
    }

    /// Replace the variant list for one environment.
    ///
    /// The submitted list is redistributed and diffed against the stored
    /// one; an empty patch short-circuits without persisting or publishing.
    /// Otherwise the patched list is validated, persisted, and announced
    /// with the patch attached.
    pub async fn update_variants_for_env(
        &self,
        feature_name: &str,
        environment: &str,
        new_variants: Vec<Variant>,
    ) -> Result<Vec<Variant>> {
        if !self.features.exists(feature_name).await? {
            return Err(TogglekitError::NotFound(format!(
                "feature {:?}",
                feature_name
            )));
        }

        let current = self
            .features
            .get_variants_for_env(feature_name, environment)
            .await?;
        let patch = diff(&current, &new_variants)?;
        if patch.is_empty() {
            debug!(feature = %feature_name, environment = %environment, "variant update is a no-op");
            return Ok(current);
        }

        let next = apply(&current, &patch)?;
        validate(&next)?;
        let saved = self
            .features
            .save_variants_on_env(feature_name, environment, next)
            .await?;
        info!(
            feature = %feature_name,
            environment = %environment,
            ops = patch.len(),
            "updated variants"
        );
        self.events.publish(Event::VariantsUpdated {
            feature_name: feature_name.to_string(),
            environment: environment.to_string(),
            patch,
        });
        Ok(saved)
    }

    /// Apply caller-supplied patch operations to the stored list, then run
    /// the same redistribute/diff/persist flow as a full update.
    pub async fn patch_variants_for_env(
        &self,
        feature_name: &str,
        environment: &str,
        patch: &[PatchOp],
    ) -> Result<Vec<Variant>> {
        if !self.features.exists(feature_name).await? {
            return Err(TogglekitError::NotFound(format!(
                "feature {:?}",
                feature_name
            )));
        }
        let current = self
            .features
            .get_variants_for_env(feature_name, environment)
            .await?;
        let next = apply(&current, patch)?;
        self.update_variants_for_env(feature_name, environment, next)
            .await
    }

    /// Legacy whole-feature write: one list for every connected
    /// environment. The list is redistributed and validated before the
    /// store fans it out.
    pub async fn save_variants(
        &self,
        project: &str,
        feature_name: &str,
        variants: Vec<Variant>,
    ) -> Result<Feature> {
        let normalized = normalize(&variants)?;
        validate(&normalized)?;
        let feature = self
            .features
            .save_variants(project, feature_name, normalized)
            .await?;
        info!(feature = %feature_name, "saved feature variants");
        self.events.publish(Event::FeatureVariantsSaved {
            feature_name: feature_name.to_string(),
            variants: feature.variants.clone().unwrap_or_default(),
        });
        Ok(feature)
    }
}

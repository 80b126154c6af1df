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

//! Integration tests for the variant write path.

use serde_json::json;

use togglekit_core::{Feature, PatchOp, TogglekitError, Variant};
use togglekit_service::{Event, EventBus, FeatureService};
use togglekit_storage::{
    FeatureStore, MemoryFeatureEnvironmentStore, MemoryFeatureStore, MemoryStores,
};

type MemoryFeatureService = FeatureService<MemoryFeatureStore, MemoryFeatureEnvironmentStore>;

fn feature_service(stores: &MemoryStores, events: EventBus) -> MemoryFeatureService {
    FeatureService::new(
        stores.features.clone(),
        stores.feature_environments.clone(),
        events,
    )
}

async fn seeded_service(stores: &MemoryStores, events: EventBus) -> MemoryFeatureService {
    let service = feature_service(stores, events);
    service
        .create_feature("default", Feature::new("checkout", "default"))
        .await
        .unwrap();
    service
}

/// Variable weights are recalculated; the remainder lands on the earliest
/// variants in canonical order.
#[tokio::test]
async fn test_update_redistributes_variable_weights() {
    let stores = MemoryStores::new();
    let service = seeded_service(&stores, EventBus::default()).await;

    let saved = service
        .update_variants_for_env(
            "checkout",
            "development",
            vec![
                Variant::new("red", 0),
                Variant::new("green", 0),
                Variant::new("blue", 0),
            ],
        )
        .await
        .unwrap();

    let names: Vec<&str> = saved.iter().map(|v| v.name.as_str()).collect();
    let weights: Vec<u16> = saved.iter().map(|v| v.weight).collect();
    assert_eq!(names, vec!["blue", "green", "red"]);
    assert_eq!(weights, vec![334, 333, 333]);
}

/// Resubmitting the stored list, in any order, diffs empty: nothing is
/// persisted and nothing is published.
#[tokio::test]
async fn test_resubmission_in_any_order_is_a_noop() {
    let stores = MemoryStores::new();
    let events = EventBus::default();
    let service = seeded_service(&stores, events.clone()).await;

    let saved = service
        .update_variants_for_env(
            "checkout",
            "development",
            vec![
                Variant::new("red", 0),
                Variant::new("green", 0),
                Variant::new("blue", 0),
            ],
        )
        .await
        .unwrap();

    let mut reversed = saved.clone();
    reversed.reverse();

    let mut rx = events.subscribe();
    let unchanged = service
        .update_variants_for_env("checkout", "development", reversed)
        .await
        .unwrap();
    assert_eq!(unchanged, saved);
    assert!(rx.try_recv().is_err());
}

/// A real change publishes exactly one event carrying the applied patch.
#[tokio::test]
async fn test_update_publishes_the_patch() {
    let stores = MemoryStores::new();
    let events = EventBus::default();
    let service = seeded_service(&stores, events.clone()).await;

    let mut rx = events.subscribe();
    service
        .update_variants_for_env(
            "checkout",
            "development",
            vec![Variant::new("on", 0)],
        )
        .await
        .unwrap();

    match rx.try_recv().unwrap() {
        Event::VariantsUpdated {
            feature_name,
            environment,
            patch,
        } => {
            assert_eq!(feature_name, "checkout");
            assert_eq!(environment, "development");
            assert!(!patch.is_empty());
        }
        other => panic!("unexpected event: {other:?}"),
    }
    assert!(rx.try_recv().is_err());
}

/// Duplicate names are rejected and the message names the offender.
#[tokio::test]
async fn test_duplicate_names_fail_validation() {
    let stores = MemoryStores::new();
    let service = seeded_service(&stores, EventBus::default()).await;

    let err = service
        .update_variants_for_env(
            "checkout",
            "development",
            vec![Variant::new("red", 0), Variant::new("red", 0)],
        )
        .await
        .unwrap_err();
    match err {
        TogglekitError::InvalidVariants(message) => assert!(message.contains("red")),
        other => panic!("unexpected error: {other}"),
    }
}

/// Fixed weights beyond the total cannot be reconciled.
#[tokio::test]
async fn test_fixed_overshoot_is_a_constraint_violation() {
    let stores = MemoryStores::new();
    let service = seeded_service(&stores, EventBus::default()).await;

    let err = service
        .update_variants_for_env(
            "checkout",
            "development",
            vec![Variant::fixed("red", 800), Variant::fixed("blue", 400)],
        )
        .await
        .unwrap_err();
    assert!(matches!(err, TogglekitError::ConstraintViolation(_)));
}

/// Structured patch payloads add and remove entries; the result is
/// redistributed like any other update.
#[tokio::test]
async fn test_patch_ops_add_and_remove_variants() {
    let stores = MemoryStores::new();
    let service = seeded_service(&stores, EventBus::default()).await;
    service
        .update_variants_for_env(
            "checkout",
            "development",
            vec![
                Variant::new("red", 0),
                Variant::new("green", 0),
                Variant::new("blue", 0),
            ],
        )
        .await
        .unwrap();

    let added = service
        .patch_variants_for_env(
            "checkout",
            "development",
            &[PatchOp::Add {
                path: "/-".to_string(),
                value: json!({"name": "yellow", "weight": 0}),
            }],
        )
        .await
        .unwrap();
    assert_eq!(added.len(), 4);
    assert!(added.iter().all(|v| v.weight == 250));

    let removed = service
        .patch_variants_for_env(
            "checkout",
            "development",
            &[PatchOp::Remove {
                path: "/0".to_string(),
            }],
        )
        .await
        .unwrap();
    let names: Vec<&str> = removed.iter().map(|v| v.name.as_str()).collect();
    let weights: Vec<u16> = removed.iter().map(|v| v.weight).collect();
    assert_eq!(names, vec!["green", "red", "yellow"]);
    assert_eq!(weights, vec![334, 333, 333]);
}

#[tokio::test]
async fn test_unknown_feature_is_not_found() {
    let stores = MemoryStores::new();
    let service = feature_service(&stores, EventBus::default());

    let err = service
        .update_variants_for_env("ghost", "development", vec![Variant::new("on", 0)])
        .await
        .unwrap_err();
    assert!(matches!(err, TogglekitError::NotFound(_)));
}

/// Deletion is gated on archiving; both steps publish events.
#[tokio::test]
async fn test_lifecycle_archive_then_delete() {
    let stores = MemoryStores::new();
    let events = EventBus::default();
    let service = seeded_service(&stores, events.clone()).await;

    let err = service.delete_feature("checkout").await.unwrap_err();
    assert!(matches!(err, TogglekitError::PreconditionFailed(_)));

    let mut rx = events.subscribe();
    service.archive_feature("checkout").await.unwrap();
    service.delete_feature("checkout").await.unwrap();
    assert!(!stores.features.exists("checkout").await.unwrap());

    assert!(matches!(
        rx.try_recv().unwrap(),
        Event::FeatureArchived { .. }
    ));
    assert!(matches!(
        rx.try_recv().unwrap(),
        Event::FeatureDeleted { .. }
    ));
}

/// The legacy whole-feature path normalizes once and fans out to every
/// connected environment.
#[tokio::test]
async fn test_legacy_save_fans_out_and_normalizes() {
    let stores = MemoryStores::new();
    let service = seeded_service(&stores, EventBus::default()).await;
    service
        .connect_environment("checkout", "development", true)
        .await
        .unwrap();
    service
        .connect_environment("checkout", "production", false)
        .await
        .unwrap();

    let feature = service
        .save_variants(
            "default",
            "checkout",
            vec![Variant::new("a", 0), Variant::new("b", 0)],
        )
        .await
        .unwrap();
    let attached = feature.variants.as_deref().unwrap();
    assert_eq!(attached.len(), 2);
    assert!(attached.iter().all(|v| v.weight == 500));

    for environment in ["development", "production"] {
        let list = service
            .get_variants_for_env("checkout", environment)
            .await
            .unwrap();
        assert_eq!(list, attached.to_vec());
    }
}

/// Heartbeats pass through and stamp the feature.
#[tokio::test]
async fn test_mark_seen_updates_heartbeat() {
    let stores = MemoryStores::new();
    let service = seeded_service(&stores, EventBus::default()).await;

    service.mark_seen(&["checkout".to_string()]).await;
    let feature = service.get_feature("checkout").await.unwrap();
    assert!(feature.last_seen_at.is_some());
}

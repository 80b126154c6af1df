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

//! Typed event stream.
//!
//! Every state-changing service operation publishes one event; no-ops
//! (an empty variant patch, an enablement flip to the current state)
//! publish nothing. Delivery is fire-and-forget over a tokio broadcast
//! channel, so a slow or absent subscriber never blocks a write.

use tokio::sync::broadcast;

use togglekit_core::{Feature, Variant, VariantPatch};

use crate::state::ImportSummary;

/// Buffered events per subscriber before the oldest are dropped.
pub const DEFAULT_EVENT_CAPACITY: usize = 1024;

#[derive(Debug, Clone)]
pub enum Event {
    FeatureCreated {
        feature: Feature,
    },
    FeatureUpdated {
        feature: Feature,
    },
    FeatureArchived {
        name: String,
    },
    FeatureRevived {
        name: String,
    },
    FeatureDeleted {
        name: String,
    },
    EnvironmentConnected {
        feature_name: String,
        environment: String,
    },
    EnvironmentDisconnected {
        feature_name: String,
        environment: String,
    },
    EnvironmentToggled {
        feature_name: String,
        environment: String,
        enabled: bool,
    },
    /// A per-environment variant list changed; carries the applied patch.
    VariantsUpdated {
        feature_name: String,
        environment: String,
        patch: VariantPatch,
    },
    /// The legacy whole-feature variant path wrote a list.
    FeatureVariantsSaved {
        feature_name: String,
        variants: Vec<Variant>,
    },
    StateImported {
        summary: ImportSummary,
    },
}

/// Cloneable handle to the broadcast stream.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<Event>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }

    /// Publish to all current subscribers. Zero subscribers is not an
    /// error.
    pub fn publish(&self, event: Event) {
        let _ = self.tx.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}

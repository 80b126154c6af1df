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

//! Service layer for togglekit.
//!
//! [`features`] holds the feature lifecycle and the variant write path
//! (redistribute, diff, validate, persist); [`state`] holds export/import
//! with legacy-format migration. Both are generic over the store traits and
//! publish typed events on a broadcast [`events::EventBus`] for whatever
//! API or UI layer sits on top.

pub mod events;
pub mod features;
pub mod state;

pub use events::{Event, EventBus};
pub use features::FeatureService;
pub use state::{ImportOptions, ImportSummary, StateService};

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

//! Togglekit Core
//!
//! Fundamental data structures for feature toggles: features, environments,
//! variants, weight distribution, structural patches, and the state document
//! formats used for export and import.

pub mod environment;
pub mod error;
pub mod feature;
pub mod patch;
pub mod project;
pub mod state;
pub mod tag;
pub mod variant;
pub mod weights;

pub use environment::{
    Environment, EnvironmentType, FeatureEnvironment, FeatureEnvironmentKey, Strategy,
};
pub use error::{Result, TogglekitError};
pub use feature::{Feature, FeatureQuery, FeatureType};
pub use patch::{apply, diff, PatchOp, VariantPatch};
pub use project::Project;
pub use state::{
    ExportedState, FeatureLink, LegacyState, StateDocument, CURRENT_FORMAT_VERSION,
    LEGACY_FORMAT_VERSION,
};
pub use tag::{FeatureTag, Tag};
pub use variant::{
    canonical_sort, validate, Override, PayloadType, Variant, VariantPayload, WeightType,
    TOTAL_VARIANT_WEIGHT,
};
pub use weights::{distribute, normalize};

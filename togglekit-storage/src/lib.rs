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

//! Store abstraction for togglekit.
//!
//! [`store`] defines the async traits the services write through; [`memory`]
//! provides the shared-state in-memory implementation used by tests and the
//! CLI. Every store is a view over one piece of shared state, the way
//! multiple stores in a server deployment are views over one database.

pub mod memory;
pub mod store;

pub use memory::{
    MemoryEnvironmentStore, MemoryFeatureEnvironmentStore, MemoryFeatureStore, MemoryProjectStore,
    MemoryStores, MemoryTagStore,
};
pub use store::{
    EnvironmentStore, EnvironmentVariants, FeatureEnvironmentStore, FeatureStore, ProjectStore,
    TagStore,
};

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

//! Error and result types shared across the workspace.

use thiserror::Error;

/// Result alias used by every togglekit crate.
pub type Result<T> = std::result::Result<T, TogglekitError>;

/// Errors produced by the core engines, stores, and services.
///
/// Messages always name the offending entity so callers can surface them
/// directly.
#[derive(Debug, Error)]
pub enum TogglekitError {
    /// A referenced feature, project, or environment does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// An entity with the same identity already exists.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// A lifecycle guard rejected the operation, e.g. deleting a feature
    /// that was never archived.
    #[error("Precondition failed: {0}")]
    PreconditionFailed(String),

    /// A variant list broke a validation rule.
    #[error("Invalid variants: {0}")]
    InvalidVariants(String),

    /// Weight redistribution cannot reach the requested total.
    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    /// A patch operation cannot be applied to the current list.
    #[error("Invalid patch: {0}")]
    InvalidPatch(String),

    /// An underlying store failed.
    #[error("Storage error: {0}")]
    Storage(String),
}

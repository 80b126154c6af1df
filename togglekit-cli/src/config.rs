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

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use togglekit_core::FeatureQuery;

/// Togglekit CLI Configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct CliConfig {
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub export: ExportConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OutputConfig {
    /// Pretty-print emitted documents
    #[serde(default = "default_pretty")]
    pub pretty: bool,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ExportConfig {
    /// Export archived features instead of active ones
    #[serde(default)]
    pub archived: bool,

    /// Restrict exports to a single project
    pub project: Option<String>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            pretty: default_pretty(),
        }
    }
}

// Default values
fn default_pretty() -> bool {
    true
}

impl CliConfig {
    /// Load configuration from TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load configuration from environment variables
    ///
    /// Supported environment variables:
    /// - TOGGLEKIT_PRETTY: Pretty-print emitted documents (default: true)
    /// - TOGGLEKIT_EXPORT_ARCHIVED: Export archived features (default: false)
    /// - TOGGLEKIT_EXPORT_PROJECT: Restrict exports to a single project
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(pretty) = std::env::var("TOGGLEKIT_PRETTY") {
            config.output.pretty = pretty.parse().unwrap_or(true);
        }

        if let Ok(archived) = std::env::var("TOGGLEKIT_EXPORT_ARCHIVED") {
            config.export.archived = archived.parse().unwrap_or(false);
        }

        if let Ok(project) = std::env::var("TOGGLEKIT_EXPORT_PROJECT") {
            config.export.project = Some(project);
        }

        config
    }

    /// Load configuration with priority: file > env > defaults
    pub fn load(config_file: Option<PathBuf>) -> Result<Self> {
        let mut config = if let Some(path) = config_file {
            if path.exists() {
                tracing::info!("Loading configuration from file: {:?}", path);
                Self::from_file(&path)?
            } else {
                tracing::warn!("Config file not found: {:?}, using defaults", path);
                Self::default()
            }
        } else {
            Self::default()
        };

        // Override with environment variables
        config = Self::merge_with_env(config);

        Ok(config)
    }

    /// Merge config with environment variables (env takes priority)
    fn merge_with_env(mut config: Self) -> Self {
        let env_config = Self::from_env();

        // Only override if env var was explicitly set
        if std::env::var("TOGGLEKIT_PRETTY").is_ok() {
            config.output.pretty = env_config.output.pretty;
        }
        if std::env::var("TOGGLEKIT_EXPORT_ARCHIVED").is_ok() {
            config.export.archived = env_config.export.archived;
        }
        if std::env::var("TOGGLEKIT_EXPORT_PROJECT").is_ok() {
            config.export.project = env_config.export.project;
        }

        config
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if let Some(project) = &self.export.project {
            if project.trim().is_empty() {
                anyhow::bail!("Export project filter is empty");
            }
        }

        Ok(())
    }

    /// Feature query matching the configured export filters
    pub fn export_query(&self) -> FeatureQuery {
        FeatureQuery {
            archived: self.export.archived,
            project: self.export.project.clone(),
            stale: None,
        }
    }
}

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

//! Togglekit CLI
//!
//! Command-line interface for feature toggle state documents: inspect a
//! document, migrate legacy exports to the current format, and merge two
//! documents into one.

mod config;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{warn, Level};

use togglekit_core::{validate, ExportedState, StateDocument};
use togglekit_service::{EventBus, ImportOptions, StateService};
use togglekit_storage::{
    MemoryEnvironmentStore, MemoryFeatureEnvironmentStore, MemoryFeatureStore, MemoryProjectStore,
    MemoryStores, MemoryTagStore,
};

use config::CliConfig;

#[derive(Parser)]
#[command(name = "togglekit")]
#[command(about = "Togglekit - feature toggle state tooling", long_about = None)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Verbose mode
    #[arg(short, long)]
    verbose: bool,

    /// Output as JSON (machine-readable)
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Report a document's format generation, section sizes, and problems
    Inspect {
        /// Path to the state document (JSON)
        file: PathBuf,
    },

    /// Rewrite a legacy document in the current export format
    Migrate {
        /// Path to the state document (JSON)
        file: PathBuf,

        /// Output path (defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Import a base document, layer an overlay on top, and export the result
    Merge {
        /// Path to the base state document
        base: PathBuf,

        /// Path to the overlay state document
        overlay: PathBuf,

        /// Output path (defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Keep base entries where the overlay collides with them
        #[arg(long)]
        keep_existing: bool,
    },
}

type MemoryStateService = StateService<
    MemoryFeatureStore,
    MemoryFeatureEnvironmentStore,
    MemoryEnvironmentStore,
    MemoryProjectStore,
    MemoryTagStore,
>;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging. Documents go to stdout, so logs stay on stderr.
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    let config = CliConfig::load(cli.config)?;
    config.validate()?;

    match cli.command {
        Commands::Inspect { file } => inspect(&file, cli.json),
        Commands::Migrate { file, output } => {
            migrate(&file, output.as_deref(), &config, cli.json).await
        }
        Commands::Merge {
            base,
            overlay,
            output,
            keep_existing,
        } => {
            merge(
                &base,
                &overlay,
                output.as_deref(),
                keep_existing,
                &config,
                cli.json,
            )
            .await
        }
    }
}

/// Shape and health report for a state document.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DocumentSummary {
    legacy: bool,
    version: u32,
    projects: usize,
    environments: usize,
    features: usize,
    feature_environments: usize,
    tags: usize,
    problems: Vec<String>,
}

fn summarize(document: &StateDocument) -> DocumentSummary {
    match document {
        StateDocument::Legacy(doc) => {
            let mut problems = Vec::new();
            let names: HashSet<&str> = doc.features.iter().map(|f| f.name.as_str()).collect();
            for feature in &doc.features {
                if let Some(variants) = &feature.variants {
                    if let Err(err) = validate(variants) {
                        problems.push(format!("feature {:?}: {}", feature.name, err));
                    }
                }
            }
            for link in &doc.feature_environments {
                if !names.contains(link.feature_name.as_str()) {
                    problems.push(format!(
                        "environment link references unknown feature {:?}",
                        link.feature_name
                    ));
                }
            }
            DocumentSummary {
                legacy: true,
                version: doc.version,
                projects: doc.projects.len(),
                environments: doc.environments.len(),
                features: doc.features.len(),
                feature_environments: doc.feature_environments.len(),
                tags: doc.tags.len(),
                problems,
            }
        }
        StateDocument::Current(doc) => {
            let mut problems = Vec::new();
            let names: HashSet<&str> = doc.features.iter().map(|f| f.name.as_str()).collect();
            for row in &doc.feature_environments {
                if let Err(err) = validate(&row.variants) {
                    problems.push(format!(
                        "feature {:?} in {:?}: {}",
                        row.feature_name, row.environment, err
                    ));
                }
                if !names.contains(row.feature_name.as_str()) {
                    problems.push(format!(
                        "environment row references unknown feature {:?}",
                        row.feature_name
                    ));
                }
            }
            DocumentSummary {
                legacy: false,
                version: doc.version,
                projects: doc.projects.len(),
                environments: doc.environments.len(),
                features: doc.features.len(),
                feature_environments: doc.feature_environments.len(),
                tags: doc.tags.len(),
                problems,
            }
        }
    }
}

fn inspect(file: &Path, json_output: bool) -> Result<()> {
    let document = load_document(file)?;
    let summary = summarize(&document);

    if json_output {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        let generation = if summary.legacy { "legacy" } else { "current" };
        println!(
            "{} ({} format, version {})",
            file.display(),
            generation,
            summary.version
        );
        println!("  Projects:             {}", summary.projects);
        println!("  Environments:         {}", summary.environments);
        println!("  Features:             {}", summary.features);
        println!("  Feature environments: {}", summary.feature_environments);
        println!("  Tags:                 {}", summary.tags);
        if summary.problems.is_empty() {
            println!("✓ No problems found");
        } else {
            println!("✗ {} problems:", summary.problems.len());
            for problem in &summary.problems {
                println!("  - {}", problem);
            }
        }
    }

    if !summary.problems.is_empty() {
        std::process::exit(1);
    }

    Ok(())
}

async fn migrate(
    file: &Path,
    output: Option<&Path>,
    config: &CliConfig,
    json_output: bool,
) -> Result<()> {
    let document = load_document(file)?;
    if !document.is_legacy() {
        warn!("{} is already in the current format", file.display());
    }

    let service = state_service(&MemoryStores::new());
    let summary = service
        .import(
            document,
            ImportOptions {
                keep_existing: false,
                drop_before_import: true,
            },
        )
        .await?;
    let state = service.export(&config.export_query()).await?;

    emit(&render(&state, config.output.pretty)?, output)?;

    if let Some(path) = output {
        if json_output {
            println!(
                "{}",
                serde_json::json!({
                    "output": path.display().to_string(),
                    "features": summary.features,
                    "featureEnvironments": summary.feature_environments,
                    "variantRows": summary.variant_rows,
                })
            );
        } else {
            println!("✓ Migrated {} to {}", file.display(), path.display());
            println!(
                "  Features: {}, environment rows: {}, variant lists: {}",
                summary.features, summary.feature_environments, summary.variant_rows
            );
        }
    }

    Ok(())
}

async fn merge(
    base: &Path,
    overlay: &Path,
    output: Option<&Path>,
    keep_existing: bool,
    config: &CliConfig,
    json_output: bool,
) -> Result<()> {
    let base_doc = load_document(base)?;
    let overlay_doc = load_document(overlay)?;

    let service = state_service(&MemoryStores::new());
    service
        .import(
            base_doc,
            ImportOptions {
                keep_existing: false,
                drop_before_import: true,
            },
        )
        .await?;
    let summary = service
        .import(
            overlay_doc,
            ImportOptions {
                keep_existing,
                drop_before_import: false,
            },
        )
        .await?;
    let state = service.export(&config.export_query()).await?;

    emit(&render(&state, config.output.pretty)?, output)?;

    if let Some(path) = output {
        if json_output {
            println!(
                "{}",
                serde_json::json!({
                    "output": path.display().to_string(),
                    "overlayFeatures": summary.features,
                    "overlayRows": summary.feature_environments,
                })
            );
        } else {
            println!(
                "✓ Merged {} over {} to {}",
                overlay.display(),
                base.display(),
                path.display()
            );
        }
    }

    Ok(())
}

fn state_service(stores: &MemoryStores) -> MemoryStateService {
    StateService::new(
        stores.features.clone(),
        stores.feature_environments.clone(),
        stores.environments.clone(),
        stores.projects.clone(),
        stores.tags.clone(),
        EventBus::default(),
    )
}

fn load_document(path: &Path) -> Result<StateDocument> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("Invalid state document: {}", path.display()))
}

fn render(state: &ExportedState, pretty: bool) -> Result<String> {
    let rendered = if pretty {
        serde_json::to_string_pretty(state)?
    } else {
        serde_json::to_string(state)?
    };
    Ok(rendered)
}

fn emit(rendered: &str, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => std::fs::write(path, format!("{}\n", rendered))
            .with_context(|| format!("Failed to write {}", path.display()))?,
        None => println!("{}", rendered),
    }
    Ok(())
}

// /////////////////////////////////////////////////////////////////////////////
// Pipeline Scheduler RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Scheduler Configuration
//!
//! TOML-backed configuration for a scheduling run, layered with environment
//! overrides (prefix `PIPELINE_SCHEDULER`, `__` as section separator). The
//! file carries four sections:
//!
//! - `[run]`: deadline, budget, input volumes, scalability cap, worker
//!   threads, output naming
//! - `[inputs]`: paths of the resource catalog and metrics CSV files
//! - `[corpus]`: optional source-sample synthesis rule for corpora whose
//!   metrics do not include the data source itself
//! - `[pipeline]`: the steps with their kinds, the connections, the typed
//!   dependencies, forced deployments and schedulability overrides
//!
//! `build_pipeline` materializes and validates the domain [`Pipeline`];
//! malformed definitions (unknown step names, cycles, connection rule
//! violations) fail fast with a configuration error.

use config::{Config, Environment, File};
use pipeline_scheduler_domain::{
    DependencyKind, NetworkGraph, Pipeline, PipelineStep, SchedulerError, StepKind,
};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::application::services::ForcedDeployment;

/// Run parameters of one scheduling invocation.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub deadline_seconds: f64,
    pub budget_usd: f64,
    /// One scheduling run is performed per input volume
    pub input_volumes_mb: Vec<f64>,
    /// At most this many concurrent instances per scalable step; 1 disables
    /// scaling, absent leaves it unbounded
    pub maximum_scalability: Option<u32>,
    pub worker_threads: usize,
    pub output_directory: PathBuf,
    pub output_prefix: String,
}

impl Default for RunConfig {
    fn default() -> Self {
        RunConfig {
            deadline_seconds: 1000.0,
            budget_usd: 100.0,
            input_volumes_mb: Vec::new(),
            maximum_scalability: None,
            worker_threads: crate::application::services::DEFAULT_WORKER_THREADS,
            output_directory: PathBuf::from("."),
            output_prefix: "schedule".to_string(),
        }
    }
}

/// Input file locations.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct InputFilesConfig {
    pub resources: PathBuf,
    pub step_metrics: PathBuf,
    pub step_performance_metrics: PathBuf,
    pub deployment_metrics: PathBuf,
}

impl Default for InputFilesConfig {
    fn default() -> Self {
        InputFilesConfig {
            resources: PathBuf::from("resources.csv"),
            step_metrics: PathBuf::from("step_metrics.csv"),
            step_performance_metrics: PathBuf::from("step_performance_metrics.csv"),
            deployment_metrics: PathBuf::from("deployment_metrics.csv"),
        }
    }
}

/// Synthesizes a data-source sample whenever the reference step appears in a
/// dry run, carrying that step's input volume as the pipeline input volume.
/// Used for corpora whose metrics never measure the source itself.
#[derive(Debug, Clone, Deserialize)]
pub struct SourceSynthesisConfig {
    pub reference_step: String,
    pub source_step: String,
    pub source_resource: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CorpusConfig {
    pub source_synthesis: Option<SourceSynthesisConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StepConfig {
    pub name: String,
    pub kind: StepKind,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConnectionConfig {
    pub source: String,
    pub target: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DependencyConfig {
    pub kind: DependencyKind,
    pub dependent: String,
    pub prerequisite: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ForcedDeploymentConfig {
    pub step: String,
    pub resource: String,
}

/// The pipeline definition.
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    pub steps: Vec<StepConfig>,
    #[serde(default)]
    pub connections: Vec<ConnectionConfig>,
    #[serde(default)]
    pub dependencies: Vec<DependencyConfig>,
    #[serde(default)]
    pub forced_deployments: Vec<ForcedDeploymentConfig>,
    /// Resources excluded from general scheduling (forced deployments may
    /// still use them)
    #[serde(default)]
    pub unschedulable_resources: Vec<String>,
}

/// Complete configuration of the scheduler binary.
#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default)]
    pub run: RunConfig,
    #[serde(default)]
    pub inputs: InputFilesConfig,
    #[serde(default)]
    pub corpus: CorpusConfig,
    pub pipeline: PipelineConfig,
}

impl SchedulerConfig {
    /// Loads the configuration from a TOML file, then applies environment
    /// overrides.
    pub fn load(path: &Path) -> Result<Self, SchedulerError> {
        let settings = Config::builder()
            .add_source(File::from(path))
            .add_source(Environment::with_prefix("PIPELINE_SCHEDULER").separator("__"))
            .build()
            .map_err(|error| SchedulerError::invalid_config(error.to_string()))?;
        settings
            .try_deserialize()
            .map_err(|error| SchedulerError::invalid_config(error.to_string()))
    }

    /// Materializes the domain pipeline from the definition.
    pub fn build_pipeline(&self) -> Result<Pipeline, SchedulerError> {
        let mut pipeline = Pipeline::new();
        for connection in &self.pipeline.connections {
            pipeline.add_connection(
                self.step_named(&connection.source)?,
                self.step_named(&connection.target)?,
            )?;
        }
        for dependency in &self.pipeline.dependencies {
            pipeline.add_dependency(
                dependency.kind,
                self.step_named(&dependency.dependent)?,
                self.step_named(&dependency.prerequisite)?,
            )?;
        }
        Ok(pipeline)
    }

    /// Resolves the configured forced deployments against the loaded
    /// catalog.
    pub fn resolve_forced_deployments(
        &self,
        network_graph: &NetworkGraph,
    ) -> Result<Vec<ForcedDeployment>, SchedulerError> {
        self.pipeline
            .forced_deployments
            .iter()
            .map(|forced| {
                let step = self.step_named(&forced.step)?;
                let resource = network_graph
                    .find_resource_by_name(&forced.resource)
                    .ok_or_else(|| {
                        SchedulerError::ResourceNotFound(format!(
                            "forced deployment of '{}' names unknown resource '{}'",
                            forced.step, forced.resource
                        ))
                    })?;
                Ok(ForcedDeployment::new(step, resource))
            })
            .collect()
    }

    fn step_named(&self, name: &str) -> Result<PipelineStep, SchedulerError> {
        self.pipeline
            .steps
            .iter()
            .find(|step| step.name == name)
            .map(|step| PipelineStep::new(&step.name, step.kind))
            .ok_or_else(|| {
                SchedulerError::StepNotFound(format!(
                    "'{name}' is not declared in [[pipeline.steps]]"
                ))
            })
    }
}

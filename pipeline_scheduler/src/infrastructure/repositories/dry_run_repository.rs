// /////////////////////////////////////////////////////////////////////////////
// Pipeline Scheduler RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Dry-Run Corpus Repository
//!
//! Assembles the dry-run corpus from three CSV tables:
//!
//! - **step metrics**: per dry run and step, the measured input/output
//!   counts and volumes (bytes) and the transmission/processing durations
//!   (milliseconds)
//! - **step performance metrics**: per dry run and step, average CPU, peak
//!   CPU and peak memory
//! - **deployment metrics**: per (step, resource), the average instance
//!   start time in seconds, used as the provisioning time of every sample
//!
//! Bytes are converted to MB and milliseconds to seconds on load. Rows
//! naming steps or resources the pipeline and catalog do not know are
//! skipped with a warning. An optional source-synthesis rule records a
//! zero-cost data-source sample carrying the pipeline input volume whenever
//! the configured reference step appears in a run, for corpora whose metrics
//! never measure the source itself.

use pipeline_scheduler_domain::{
    DryRun, NetworkGraph, Pipeline, SchedulerError, StepDryRunResult, StepExecutionTimeline,
};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use tracing::warn;

use crate::infrastructure::config::SourceSynthesisConfig;

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

#[derive(Debug, Deserialize)]
struct StepMetricsRow {
    #[serde(rename = "DRY_RUN_ID")]
    dry_run_id: u32,
    #[serde(rename = "STEP_NAME")]
    step_name: String,
    #[serde(rename = "RESOURCE_NAME")]
    resource_name: String,
    #[serde(rename = "NUM_INPUTS")]
    num_inputs: u32,
    #[serde(rename = "INPUT_DATA_VOLUME")]
    input_data_volume_bytes: f64,
    #[serde(rename = "NUM_OUTPUTS")]
    num_outputs: u32,
    #[serde(rename = "OUTPUT_DATA_VOLUME")]
    output_data_volume_bytes: f64,
    #[serde(rename = "DATA_TRANSMISSION_TIME")]
    data_transmission_time_ms: f64,
    #[serde(rename = "STEP_PROCESSING_TIME")]
    step_processing_time_ms: f64,
}

#[derive(Debug, Deserialize)]
struct PerformanceMetricsRow {
    #[serde(rename = "DRY_RUN_ID")]
    dry_run_id: u32,
    #[serde(rename = "STEP_NAME")]
    step_name: String,
    #[serde(rename = "RESOURCE_NAME")]
    resource_name: String,
    #[serde(rename = "AVG_CPU")]
    avg_cpu: Option<f64>,
    #[serde(rename = "MAX_CPU")]
    max_cpu: Option<f64>,
    #[serde(rename = "MAX_MEM")]
    max_memory: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct DeploymentMetricsRow {
    step_name: String,
    node_name: String,
    average_instance_start_time_seconds: f64,
}

fn csv_error(path: &Path, error: impl std::fmt::Display) -> SchedulerError {
    SchedulerError::CsvError(format!("{}: {error}", path.display()))
}

fn read_rows<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<Vec<T>, SchedulerError> {
    let mut reader = csv::Reader::from_path(path).map_err(|error| csv_error(path, error))?;
    reader
        .deserialize()
        .map(|record| record.map_err(|error| csv_error(path, error)))
        .collect()
}

/// Provisioning time per lowercased (step, resource) pair.
fn read_deployment_metrics(path: &Path) -> Result<HashMap<(String, String), f64>, SchedulerError> {
    let rows: Vec<DeploymentMetricsRow> = read_rows(path)?;
    Ok(rows
        .into_iter()
        .map(|row| {
            (
                (row.step_name.to_lowercase(), row.node_name.to_lowercase()),
                row.average_instance_start_time_seconds,
            )
        })
        .collect())
}

/// Loads the corpus. Samples are grouped by dry-run id in ascending order.
pub fn load_dry_runs(
    step_metrics_path: &Path,
    performance_metrics_path: &Path,
    deployment_metrics_path: &Path,
    pipeline: &Pipeline,
    network_graph: &NetworkGraph,
    source_synthesis: Option<&SourceSynthesisConfig>,
) -> Result<Vec<DryRun>, SchedulerError> {
    let step_rows: Vec<StepMetricsRow> = read_rows(step_metrics_path)?;
    let performance_rows: Vec<PerformanceMetricsRow> = read_rows(performance_metrics_path)?;
    let deployment_metrics = read_deployment_metrics(deployment_metrics_path)?;

    let mut samples_by_run: BTreeMap<u32, Vec<StepDryRunResult>> = BTreeMap::new();

    for row in step_rows {
        let Some(step) = pipeline.find_step_by_name(&row.step_name) else {
            warn!(step = %row.step_name, "step metrics row skipped: unknown step");
            continue;
        };
        let Some(resource) = network_graph.find_resource_by_name(&row.resource_name) else {
            warn!(
                resource = %row.resource_name,
                "step metrics row skipped: unknown resource"
            );
            continue;
        };

        let provisioning = deployment_metrics
            .get(&(
                row.step_name.to_lowercase(),
                row.resource_name.to_lowercase(),
            ))
            .copied()
            .unwrap_or(0.0);
        let timeline = StepExecutionTimeline::batch(
            provisioning,
            row.data_transmission_time_ms / 1000.0,
            row.step_processing_time_ms / 1000.0,
        )?;

        let samples = samples_by_run.entry(row.dry_run_id).or_default();

        if let Some(synthesis) = source_synthesis {
            if row.step_name == synthesis.reference_step {
                match (
                    pipeline.find_step_by_name(&synthesis.source_step),
                    network_graph.find_resource_by_name(&synthesis.source_resource),
                ) {
                    (Some(source_step), Some(source_resource)) => {
                        let volume_mb = row.input_data_volume_bytes / BYTES_PER_MB;
                        samples.push(StepDryRunResult {
                            step: source_step.clone(),
                            resource: source_resource,
                            num_inputs: 0,
                            input_data_volume_mb: volume_mb,
                            avg_cpu_percentage: 0.0,
                            max_cpu_percentage: 0.0,
                            max_memory_usage_mb: 0.0,
                            timeline: StepExecutionTimeline::source(1.0)?,
                            num_outputs: 0,
                            avg_output_size_mb: 0.0,
                            pipeline_input_volume_mb: volume_mb,
                        });
                    }
                    _ => warn!(
                        step = %synthesis.source_step,
                        resource = %synthesis.source_resource,
                        "source synthesis skipped: unknown step or resource"
                    ),
                }
            }
        }

        samples.push(StepDryRunResult {
            step: step.clone(),
            resource,
            num_inputs: row.num_inputs,
            input_data_volume_mb: row.input_data_volume_bytes / BYTES_PER_MB,
            avg_cpu_percentage: 0.0,
            max_cpu_percentage: 0.0,
            max_memory_usage_mb: 0.0,
            timeline,
            num_outputs: row.num_outputs,
            avg_output_size_mb: row.output_data_volume_bytes / BYTES_PER_MB,
            pipeline_input_volume_mb: 0.0,
        });
    }

    // Attach the performance measurements to their samples
    for row in performance_rows {
        let Some(samples) = samples_by_run.get_mut(&row.dry_run_id) else {
            continue;
        };
        for sample in samples.iter_mut() {
            if sample.step.name() == row.step_name && sample.resource.name() == row.resource_name {
                sample.avg_cpu_percentage = row.avg_cpu.unwrap_or(0.0);
                sample.max_cpu_percentage = row.max_cpu.unwrap_or(0.0);
                sample.max_memory_usage_mb = row.max_memory.unwrap_or(0.0);
            }
        }
    }

    Ok(samples_by_run
        .into_values()
        .map(|samples| {
            let mut dry_run = DryRun::new();
            for sample in samples {
                dry_run.add_step_dry_run(sample);
            }
            dry_run
        })
        .collect())
}

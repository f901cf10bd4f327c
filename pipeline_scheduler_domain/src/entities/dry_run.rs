// /////////////////////////////////////////////////////////////////////////////
// Pipeline Scheduler RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Dry-Run Corpus
//!
//! A dry run is one recorded end-to-end execution of the pipeline. It
//! groups per-step measurements ([`StepDryRunResult`]) taken under the same
//! total pipeline input volume; that shared volume is the regression feature
//! every estimator fits against.
//!
//! The corpus is read-only during scheduling. Samples are attached once
//! while loading and never mutated afterwards.

use crate::entities::computing_resource::ComputingResource;
use crate::entities::pipeline_step::{PipelineStep, StepKind};
use crate::value_objects::step_execution_timeline::StepExecutionTimeline;
use std::sync::Arc;

/// One measured execution of a step on a resource.
#[derive(Debug, Clone, PartialEq)]
pub struct StepDryRunResult {
    pub step: PipelineStep,
    pub resource: Arc<ComputingResource>,
    pub num_inputs: u32,
    /// Input data volume of the step in MB
    pub input_data_volume_mb: f64,
    pub avg_cpu_percentage: f64,
    pub max_cpu_percentage: f64,
    /// Peak memory in MB
    pub max_memory_usage_mb: f64,
    pub timeline: StepExecutionTimeline,
    pub num_outputs: u32,
    /// Average size of one produced output in MB
    pub avg_output_size_mb: f64,
    /// The pipeline's total input volume when the sample was taken, in MB
    pub pipeline_input_volume_mb: f64,
}

/// Per-step measurements collected under one end-to-end pipeline run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DryRun {
    step_dry_runs: Vec<StepDryRunResult>,
    pipeline_input_volume_mb: f64,
}

impl DryRun {
    /// Creates an empty dry run. The pipeline input volume is derived from
    /// the data-source samples as they are added.
    pub fn new() -> Self {
        DryRun::default()
    }

    /// Creates a dry run with an explicitly known pipeline input volume.
    pub fn with_input_volume(pipeline_input_volume_mb: f64) -> Self {
        DryRun {
            step_dry_runs: Vec::new(),
            pipeline_input_volume_mb,
        }
    }

    /// Adds a sample and propagates the (re-derived) pipeline input volume
    /// to every sample of the run.
    pub fn add_step_dry_run(&mut self, result: StepDryRunResult) {
        self.step_dry_runs.push(result);
        self.pipeline_input_volume_mb = self.derive_pipeline_input_volume();
        let volume = self.pipeline_input_volume_mb;
        for sample in &mut self.step_dry_runs {
            sample.pipeline_input_volume_mb = volume;
        }
    }

    /// The samples of this run
    pub fn step_dry_runs(&self) -> &[StepDryRunResult] {
        &self.step_dry_runs
    }

    /// The total pipeline input volume shared by the samples, in MB
    pub fn pipeline_input_volume_mb(&self) -> f64 {
        self.pipeline_input_volume_mb
    }

    /// An explicitly set volume wins; otherwise the sum of the data-source
    /// samples' input volumes.
    fn derive_pipeline_input_volume(&self) -> f64 {
        if self.pipeline_input_volume_mb > 0.0 {
            return self.pipeline_input_volume_mb;
        }
        self.step_dry_runs
            .iter()
            .filter(|sample| sample.step.kind() == StepKind::DataSource)
            .map(|sample| sample.input_data_volume_mb)
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(step: PipelineStep, volume: f64) -> StepDryRunResult {
        StepDryRunResult {
            step,
            resource: Arc::new(ComputingResource::new_free("node", 4, 2.4, 8.0)),
            num_inputs: 1,
            input_data_volume_mb: volume,
            avg_cpu_percentage: 10.0,
            max_cpu_percentage: 20.0,
            max_memory_usage_mb: 256.0,
            timeline: StepExecutionTimeline::batch(1.0, 0.0, 2.0).unwrap(),
            num_outputs: 1,
            avg_output_size_mb: volume,
            pipeline_input_volume_mb: 0.0,
        }
    }

    #[test]
    fn test_volume_derived_from_data_source_samples() {
        let mut dry_run = DryRun::new();
        dry_run.add_step_dry_run(sample(PipelineStep::data_source("source"), 100.0));
        dry_run.add_step_dry_run(sample(PipelineStep::batch("a"), 80.0));

        assert_eq!(dry_run.pipeline_input_volume_mb(), 100.0);
        // Every sample carries the shared volume
        assert!(dry_run
            .step_dry_runs()
            .iter()
            .all(|s| s.pipeline_input_volume_mb == 100.0));
    }

    #[test]
    fn test_explicit_volume_wins() {
        let mut dry_run = DryRun::with_input_volume(250.0);
        dry_run.add_step_dry_run(sample(PipelineStep::data_source("source"), 100.0));
        assert_eq!(dry_run.pipeline_input_volume_mb(), 250.0);
        assert_eq!(dry_run.step_dry_runs()[0].pipeline_input_volume_mb, 250.0);
    }
}

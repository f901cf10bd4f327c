// /////////////////////////////////////////////////////////////////////////////
// Pipeline Scheduler RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Shared builders and invariant checks for the integration tests.

#![allow(dead_code)]

use pipeline_scheduler_domain::{
    ComputingResource, DryRun, PipelineStep, PriceModel, StepDryRunResult, StepExecutionTimeline,
    Timeline,
};
use std::sync::Arc;

/// Linear calibration of one step: every quantity is derived from the
/// pipeline input volume so two samples pin the regressions exactly.
pub struct StepCalibration {
    pub step: PipelineStep,
    pub processing_seconds_per_mb: f64,
    pub provisioning_seconds: f64,
    pub inputs_per_mb: f64,
    pub outputs_per_mb: f64,
    pub cpu_percent: f64,
    pub memory_mb: f64,
}

impl StepCalibration {
    pub fn new(step: PipelineStep) -> Self {
        StepCalibration {
            step,
            processing_seconds_per_mb: 0.0,
            provisioning_seconds: 0.0,
            inputs_per_mb: 0.0,
            outputs_per_mb: 0.0,
            cpu_percent: 0.0,
            memory_mb: 0.0,
        }
    }

    pub fn processing_per_mb(mut self, seconds: f64) -> Self {
        self.processing_seconds_per_mb = seconds;
        self
    }

    pub fn inputs_per_mb(mut self, inputs: f64) -> Self {
        self.inputs_per_mb = inputs;
        self
    }

    pub fn outputs_per_mb(mut self, outputs: f64) -> Self {
        self.outputs_per_mb = outputs;
        self
    }

    pub fn reserving(mut self, cpu_percent: f64, memory_mb: f64) -> Self {
        self.cpu_percent = cpu_percent;
        self.memory_mb = memory_mb;
        self
    }

    fn sample(&self, resource: &Arc<ComputingResource>, volume_mb: f64) -> StepDryRunResult {
        let num_inputs = ((self.inputs_per_mb * volume_mb).round() as u32).max(1);
        let num_outputs = ((self.outputs_per_mb * volume_mb).round() as u32).max(1);
        let processing = self.processing_seconds_per_mb * volume_mb;
        let timeline = match self.step.kind() {
            pipeline_scheduler_domain::StepKind::DataSource => {
                StepExecutionTimeline::source(self.provisioning_seconds).unwrap()
            }
            _ => StepExecutionTimeline::batch(self.provisioning_seconds, 0.0, processing).unwrap(),
        };
        StepDryRunResult {
            step: self.step.clone(),
            resource: resource.clone(),
            num_inputs,
            input_data_volume_mb: if self.step.kind()
                == pipeline_scheduler_domain::StepKind::DataSource
            {
                volume_mb
            } else {
                0.0
            },
            avg_cpu_percentage: self.cpu_percent,
            max_cpu_percentage: self.cpu_percent,
            max_memory_usage_mb: self.memory_mb,
            timeline,
            num_outputs,
            avg_output_size_mb: 1.0,
            pipeline_input_volume_mb: volume_mb,
        }
    }
}

/// Builds a corpus of one dry run per volume, each measuring every
/// (calibration, resource) pair.
pub fn calibrated_corpus(
    volumes_mb: &[f64],
    measurements: &[(&StepCalibration, &[Arc<ComputingResource>])],
) -> Vec<DryRun> {
    volumes_mb
        .iter()
        .map(|&volume| {
            let mut dry_run = DryRun::with_input_volume(volume);
            for (calibration, resources) in measurements {
                for resource in resources.iter() {
                    dry_run.add_step_dry_run(calibration.sample(resource, volume));
                }
            }
            dry_run
        })
        .collect()
}

/// The score the candidate engine minimizes, recomputed independently.
pub fn score_of(
    timeline: &Timeline,
    deadline_seconds: f64,
    budget_usd: f64,
    pricing: &dyn PriceModel,
) -> f64 {
    timeline.total_time() / deadline_seconds
        + (timeline.resource_cost() + timeline.data_transmission_cost(pricing)) / budget_usd
}

/// Capacity invariant: at every event boundary, the reservations active on
/// each resource fit within its CPU and memory capacity.
pub fn assert_capacity_invariant(timeline: &Timeline) {
    let boundaries: Vec<f64> = timeline
        .events()
        .iter()
        .flat_map(|event| [event.position(), event.end_position() - 1e-9])
        .collect();
    for &instant in &boundaries {
        if instant < 0.0 {
            continue;
        }
        let mut by_resource: std::collections::HashMap<&str, (f64, f64, f64, f64)> =
            std::collections::HashMap::new();
        for event in timeline.events() {
            if event.is_active_at(instant) {
                let resource = event.resource();
                let entry = by_resource.entry(resource.name()).or_insert((
                    0.0,
                    0.0,
                    resource.cpu_capacity_percent(),
                    resource.memory_capacity_mib(),
                ));
                entry.0 += event.reservation().reserved_cpu();
                entry.1 += event.reservation().reserved_memory();
            }
        }
        for (name, (cpu, memory, cpu_capacity, memory_capacity)) in by_resource {
            assert!(
                cpu <= cpu_capacity + 1e-6,
                "CPU over-reserved on {name} at t={instant}: {cpu} > {cpu_capacity}"
            );
            assert!(
                memory <= memory_capacity + 1e-6,
                "memory over-reserved on {name} at t={instant}: {memory} > {memory_capacity}"
            );
        }
    }
}

/// Non-negativity invariant: positions and durations never go below zero.
pub fn assert_non_negative_invariant(timeline: &Timeline) {
    for event in timeline.events() {
        assert!(event.position() >= 0.0, "negative position");
        assert!(
            event.end_position() >= event.position(),
            "negative duration"
        );
    }
}

/// Events are sorted by (position, step name).
pub fn assert_deterministic_order(timeline: &Timeline) {
    let events = timeline.events();
    for pair in events.windows(2) {
        let ordering = pair[0]
            .position()
            .total_cmp(&pair[1].position())
            .then_with(|| pair[0].step_name().cmp(pair[1].step_name()));
        assert!(
            ordering != std::cmp::Ordering::Greater,
            "events out of order"
        );
    }
}

/// Unordered equality over timeline sets.
pub fn timelines_equal_unordered(left: &[Timeline], right: &[Timeline]) -> bool {
    left.len() == right.len()
        && left.iter().all(|timeline| right.contains(timeline))
        && right.iter().all(|timeline| left.contains(timeline))
}

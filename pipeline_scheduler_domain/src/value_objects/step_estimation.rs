// /////////////////////////////////////////////////////////////////////////////
// Pipeline Scheduler RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Estimation Value Objects
//!
//! Typed results of the estimators: the predicted execution timeline of a
//! step on a resource (optionally in the context of the previous step's
//! resource) and the predicted hardware reservation it needs. Both are plain
//! values with structural equality; the scheduler deduplicates and caches
//! them under composite keys.

use crate::entities::computing_resource::ComputingResource;
use crate::entities::pipeline_step::PipelineStep;
use crate::value_objects::step_execution_timeline::StepExecutionTimeline;
use std::sync::Arc;

/// The estimated execution timeline of a step on a resource at a given
/// pipeline input volume.
#[derive(Debug, Clone)]
pub struct StepTimelineEstimation {
    input_volume_mb: f64,
    step: PipelineStep,
    resource: Arc<ComputingResource>,
    timeline: StepExecutionTimeline,
    previous_resource: Option<Arc<ComputingResource>>,
}

impl StepTimelineEstimation {
    /// Creates an estimation without previous-resource context.
    pub fn new(
        input_volume_mb: f64,
        step: PipelineStep,
        resource: Arc<ComputingResource>,
        timeline: StepExecutionTimeline,
    ) -> Self {
        StepTimelineEstimation {
            input_volume_mb,
            step,
            resource,
            timeline,
            previous_resource: None,
        }
    }

    /// Attaches the resource the previous step was placed on.
    pub fn with_previous_resource(mut self, previous: Arc<ComputingResource>) -> Self {
        self.previous_resource = Some(previous);
        self
    }

    /// The pipeline input volume the estimation was made for, in MB
    pub fn input_volume_mb(&self) -> f64 {
        self.input_volume_mb
    }

    /// The estimated step
    pub fn step(&self) -> &PipelineStep {
        &self.step
    }

    /// The resource the step would run on
    pub fn resource(&self) -> &Arc<ComputingResource> {
        &self.resource
    }

    /// The estimated execution timeline
    pub fn timeline(&self) -> &StepExecutionTimeline {
        &self.timeline
    }

    /// The previous step's resource, when the estimation is context-aware
    pub fn previous_resource(&self) -> Option<&Arc<ComputingResource>> {
        self.previous_resource.as_ref()
    }

    /// A copy whose consumer timeline covers only a replica's share of the
    /// input stream.
    pub fn with_input_partition(&self, inputs: u32) -> Self {
        StepTimelineEstimation {
            input_volume_mb: self.input_volume_mb,
            step: self.step.clone(),
            resource: self.resource.clone(),
            timeline: self.timeline.with_input_partition(inputs),
            previous_resource: self.previous_resource.clone(),
        }
    }
}

impl PartialEq for StepTimelineEstimation {
    fn eq(&self, other: &Self) -> bool {
        self.input_volume_mb == other.input_volume_mb
            && self.step == other.step
            && self.resource.name() == other.resource.name()
            && self.timeline == other.timeline
            && self.previous_resource.as_ref().map(|r| r.name())
                == other.previous_resource.as_ref().map(|r| r.name())
    }
}

/// The estimated CPU and memory reservation of a step on a resource.
#[derive(Debug, Clone)]
pub struct StepHardwareRequirementsEstimation {
    input_volume_mb: f64,
    step: PipelineStep,
    resource: Arc<ComputingResource>,
    /// Reserved CPU in percent (100 per fully used core)
    cpu_reservation: f64,
    /// Reserved memory in MB
    memory_reservation: f64,
}

impl StepHardwareRequirementsEstimation {
    pub fn new(
        input_volume_mb: f64,
        step: PipelineStep,
        resource: Arc<ComputingResource>,
        cpu_reservation: f64,
        memory_reservation: f64,
    ) -> Self {
        StepHardwareRequirementsEstimation {
            input_volume_mb,
            step,
            resource,
            cpu_reservation,
            memory_reservation,
        }
    }

    pub fn input_volume_mb(&self) -> f64 {
        self.input_volume_mb
    }

    pub fn step(&self) -> &PipelineStep {
        &self.step
    }

    pub fn resource(&self) -> &Arc<ComputingResource> {
        &self.resource
    }

    pub fn cpu_reservation(&self) -> f64 {
        self.cpu_reservation
    }

    pub fn memory_reservation(&self) -> f64 {
        self.memory_reservation
    }
}

impl PartialEq for StepHardwareRequirementsEstimation {
    fn eq(&self, other: &Self) -> bool {
        self.input_volume_mb == other.input_volume_mb
            && self.step == other.step
            && self.resource.name() == other.resource.name()
            && self.cpu_reservation == other.cpu_reservation
            && self.memory_reservation == other.memory_reservation
    }
}

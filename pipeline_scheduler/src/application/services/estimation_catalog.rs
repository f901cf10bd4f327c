// /////////////////////////////////////////////////////////////////////////////
// Pipeline Scheduler RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Estimation Catalog
//!
//! Dense lookup of the precomputed estimations. Timeline estimations are
//! keyed by the (step, current resource, previous resource) triple, hardware
//! estimations by (step, resource). The catalog is built once at scheduler
//! construction and read concurrently by the search workers.

use pipeline_scheduler_domain::{
    ComputingResource, StepHardwareRequirementsEstimation, StepTimelineEstimation,
};
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Default)]
pub struct EstimationCatalog {
    timelines: HashMap<(String, String, String), StepTimelineEstimation>,
    hardware: HashMap<(String, String), StepHardwareRequirementsEstimation>,
}

impl EstimationCatalog {
    pub fn new() -> Self {
        EstimationCatalog::default()
    }

    /// Number of timeline estimations in the catalog
    pub fn timeline_count(&self) -> usize {
        self.timelines.len()
    }

    /// Stores a context-aware timeline estimation. The previous-resource
    /// component of the key falls back to the current resource for
    /// context-free estimations.
    pub fn insert_timeline(&mut self, estimation: StepTimelineEstimation) {
        let previous = estimation
            .previous_resource()
            .map(|resource| resource.name().to_string())
            .unwrap_or_else(|| estimation.resource().name().to_string());
        let key = (
            estimation.step().name().to_string(),
            estimation.resource().name().to_string(),
            previous,
        );
        self.timelines.insert(key, estimation);
    }

    /// Stores a hardware-requirements estimation.
    pub fn insert_hardware(&mut self, estimation: StepHardwareRequirementsEstimation) {
        let key = (
            estimation.step().name().to_string(),
            estimation.resource().name().to_string(),
        );
        self.hardware.insert(key, estimation);
    }

    /// The timeline estimation of a step on a resource in the context of a
    /// previous resource.
    pub fn timeline_for(
        &self,
        step: &str,
        resource: &str,
        previous_resource: &str,
    ) -> Option<&StepTimelineEstimation> {
        self.timelines.get(&(
            step.to_string(),
            resource.to_string(),
            previous_resource.to_string(),
        ))
    }

    /// The hardware estimation of a step on a resource.
    pub fn hardware_for(
        &self,
        step: &str,
        resource: &str,
    ) -> Option<&StepHardwareRequirementsEstimation> {
        self.hardware.get(&(step.to_string(), resource.to_string()))
    }

    /// Any timeline estimation of the step, resolved deterministically (the
    /// smallest (resource, previous) key wins). Used where only the
    /// volume-derived counts matter, not the placement.
    pub fn any_timeline_for_step(&self, step: &str) -> Option<&StepTimelineEstimation> {
        self.timelines
            .iter()
            .filter(|((step_name, _, _), _)| step_name.as_str() == step)
            .min_by(|((_, r1, p1), _), ((_, r2, p2), _)| (r1, p1).cmp(&(r2, p2)))
            .map(|(_, estimation)| estimation)
    }

    /// The resource on which the step's producer pace is slowest, used as a
    /// conservative stand-in while the producer is unscheduled. Ties resolve
    /// to the smaller resource name.
    pub fn worst_performing_resource_for(&self, step: &str) -> Option<Arc<ComputingResource>> {
        let mut worst: Option<(f64, Arc<ComputingResource>)> = None;
        for ((step_name, _, _), estimation) in &self.timelines {
            if step_name.as_str() != step {
                continue;
            }
            let Some(pace) = estimation.timeline().average_time_to_produce_output() else {
                continue;
            };
            let replace = match &worst {
                None => true,
                Some((worst_pace, worst_resource)) => {
                    pace > *worst_pace
                        || (pace == *worst_pace
                            && estimation.resource().name() < worst_resource.name())
                }
            };
            if replace {
                worst = Some((pace, estimation.resource().clone()));
            }
        }
        worst.map(|(_, resource)| resource)
    }
}

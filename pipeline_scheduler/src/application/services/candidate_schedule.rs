// /////////////////////////////////////////////////////////////////////////////
// Pipeline Scheduler RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Candidate-Schedule Engine
//!
//! The per-level search: grow the best partial timelines of the previous
//! level by every permutation of the level's ready steps crossed with every
//! assignment of eligible resources, optionally replicating steps that feed
//! a streaming consumer, and keep the minimum-score results.
//!
//! ## Search structure
//!
//! Within one level the engine iterates: pick the *ready* steps (those whose
//! prerequisites are not also waiting in the level), enumerate placement
//! plans, evaluate them on the worker pool, promote the minimum-score
//! timelines to seeds for the next round, and repeat until the level is
//! drained.
//!
//! ## Pruning
//!
//! Three defenses against the combinatorial space:
//!
//! - after every event insertion the partial score is compared against the
//!   best completed score of the round (a stale snapshot at worst delays a
//!   prune, it never prunes a candidate that should survive);
//! - a scaled placement is additionally compared against the same placement
//!   without scaling, so replication must pay for itself;
//! - the `maximum_scalability` parameter bounds the admitted replica counts
//!   (at most one instance disables scaling entirely).
//!
//! Workers never mutate shared state besides the mutex-guarded best set;
//! every plan works on its own copy of the seed timeline and all catalog
//! lookups are read-only.

use parking_lot::Mutex;
use pipeline_scheduler_domain::{
    ComputingResource, NetworkGraph, Pipeline, PipelineStep, PriceModel, ResourceReservation,
    SchedulingEvent, StepExecutionTimeline, StepTimelineEstimation, Timeline,
};
use rayon::prelude::*;
use std::sync::Arc;
use tracing::debug;

use crate::application::services::estimation_catalog::EstimationCatalog;

/// A (step, resource) mandate honored regardless of optimization.
#[derive(Debug, Clone)]
pub struct ForcedDeployment {
    step: PipelineStep,
    resource: Arc<ComputingResource>,
}

impl ForcedDeployment {
    pub fn new(step: PipelineStep, resource: Arc<ComputingResource>) -> Self {
        ForcedDeployment { step, resource }
    }

    pub fn step(&self) -> &PipelineStep {
        &self.step
    }

    pub fn resource(&self) -> &Arc<ComputingResource> {
        &self.resource
    }
}

/// Replication of one scalable step within a plan.
#[derive(Debug, Clone)]
struct ScalingSpec {
    step: PipelineStep,
    amount: u32,
    total_inputs: u32,
}

/// One placement task: a seed timeline plus an ordered sequence of
/// (step, resource) placements, optionally with a scaling spec.
#[derive(Debug, Clone)]
struct Plan {
    seed: Timeline,
    steps: Vec<PipelineStep>,
    resources: Vec<Arc<ComputingResource>>,
    scaling: Option<ScalingSpec>,
}

#[derive(Debug)]
struct BestTimelines {
    score: f64,
    timelines: Vec<Timeline>,
}

impl BestTimelines {
    fn reset(&mut self) {
        self.score = f64::INFINITY;
        self.timelines.clear();
    }
}

/// The per-level enumeration and pruning engine.
pub struct CandidateSchedule<'a> {
    level: Vec<PipelineStep>,
    pipeline: &'a Pipeline,
    network_graph: &'a NetworkGraph,
    deadline_seconds: f64,
    budget_usd: f64,
    catalog: &'a EstimationCatalog,
    forced_deployments: &'a [ForcedDeployment],
    maximum_scalability: Option<u32>,
    pricing: &'a dyn PriceModel,
    best: Mutex<BestTimelines>,
}

impl<'a> CandidateSchedule<'a> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        level: Vec<PipelineStep>,
        pipeline: &'a Pipeline,
        network_graph: &'a NetworkGraph,
        deadline_seconds: f64,
        budget_usd: f64,
        catalog: &'a EstimationCatalog,
        forced_deployments: &'a [ForcedDeployment],
        maximum_scalability: Option<u32>,
        pricing: &'a dyn PriceModel,
    ) -> Self {
        CandidateSchedule {
            level,
            pipeline,
            network_graph,
            deadline_seconds,
            budget_usd,
            catalog,
            forced_deployments,
            maximum_scalability,
            pricing,
            best: Mutex::new(BestTimelines {
                score: f64::INFINITY,
                timelines: Vec::new(),
            }),
        }
    }

    /// The normalized score of a timeline: time fraction against the
    /// deadline plus cost fraction against the budget. Lower is better.
    pub fn score(&self, timeline: &Timeline) -> f64 {
        let time_fraction = timeline.total_time() / self.deadline_seconds;
        let cost = timeline.resource_cost() + timeline.data_transmission_cost(self.pricing);
        time_fraction + cost / self.budget_usd
    }

    /// Drains the level and returns the minimum-score timelines, seeded with
    /// the previous level's best results.
    pub fn get_best_timelines(
        &self,
        initial_candidates: Vec<Timeline>,
        pool: &rayon::ThreadPool,
    ) -> Vec<Timeline> {
        let mut candidates = if initial_candidates.is_empty() {
            vec![Timeline::new()]
        } else {
            initial_candidates
        };
        let mut remaining = self.level.clone();

        while !remaining.is_empty() {
            let eligible = self.network_graph.eligible_computing_resources();
            if eligible.is_empty() {
                debug!("no eligible resources, abandoning level");
                return Vec::new();
            }
            let ready = self.steps_with_prerequisites_ready(&remaining);
            if ready.is_empty() {
                debug!("level steps blocked on prerequisites outside the level");
                return Vec::new();
            }

            let plans = self.enumerate_plans(&candidates, &ready, &eligible);
            debug!(
                ready = ready.len(),
                seeds = candidates.len(),
                plans = plans.len(),
                "evaluating placement plans"
            );

            self.best.lock().reset();
            pool.install(|| {
                plans.into_par_iter().for_each(|plan| {
                    if let Some(timeline) = self.evaluate_plan(plan) {
                        self.record_candidate(timeline);
                    }
                });
            });

            let round_best = self.best.lock().timelines.clone();
            if round_best.is_empty() {
                return Vec::new();
            }
            candidates = round_best;
            remaining.retain(|step| !ready.iter().any(|r| r.same_as(step)));
        }

        candidates
    }

    /// Steps of the remaining set whose prerequisites are not also waiting
    /// in the remaining set. Those can be placed in any order now.
    fn steps_with_prerequisites_ready(&self, remaining: &[PipelineStep]) -> Vec<PipelineStep> {
        remaining
            .iter()
            .filter(|step| {
                !self.pipeline.dependencies().iter().any(|dep| {
                    dep.dependent().same_as(step)
                        && remaining.iter().any(|other| dep.prerequisite().same_as(other))
                })
            })
            .cloned()
            .collect()
    }

    /// Seeds × permutations × resource assignments, forced deployments
    /// applied, plus the scaling variants of every scalable step.
    fn enumerate_plans(
        &self,
        seeds: &[Timeline],
        ready: &[PipelineStep],
        eligible: &[Arc<ComputingResource>],
    ) -> Vec<Plan> {
        let mut plans = Vec::new();
        for seed in seeds {
            for permutation in permutations(ready) {
                for assignment in CartesianPower::new(eligible, permutation.len()) {
                    let mut resources = assignment;
                    for (index, step) in permutation.iter().enumerate() {
                        if let Some(forced) = self
                            .forced_deployments
                            .iter()
                            .find(|forced| forced.step().same_as(step))
                        {
                            resources[index] = forced.resource().clone();
                        }
                    }

                    plans.push(Plan {
                        seed: seed.clone(),
                        steps: permutation.clone(),
                        resources: resources.clone(),
                        scaling: None,
                    });

                    for (index, step) in permutation
                        .iter()
                        .enumerate()
                        .filter(|(_, step)| self.pipeline.is_step_scalable(step))
                    {
                        self.push_scaling_plans(
                            &mut plans,
                            seed,
                            &permutation,
                            &resources,
                            step,
                            index,
                            eligible,
                        );
                    }
                }
            }
        }
        plans
    }

    /// The scaling variants of one scalable step within a plan: replica
    /// counts from two up to the useful maximum, crossed with every resource
    /// assignment for the extra replicas.
    #[allow(clippy::too_many_arguments)]
    fn push_scaling_plans(
        &self,
        plans: &mut Vec<Plan>,
        seed: &Timeline,
        permutation: &[PipelineStep],
        resources: &[Arc<ComputingResource>],
        step: &PipelineStep,
        step_index: usize,
        eligible: &[Arc<ComputingResource>],
    ) {
        if let Some(cap) = self.maximum_scalability {
            if cap <= 1 {
                return;
            }
        }
        let Some(total_inputs) = self
            .catalog
            .any_timeline_for_step(step.name())
            .and_then(|estimation| estimation.timeline().number_of_transmitted_inputs())
        else {
            return;
        };
        let max_scale = self.max_scale_for(seed, step, &resources[step_index]);

        for amount in 2..max_scale {
            if let Some(cap) = self.maximum_scalability {
                if amount > cap {
                    break;
                }
            }
            for extra in CartesianPower::new(eligible, (amount - 1) as usize) {
                let mut steps = permutation.to_vec();
                let mut scaled_resources = resources.to_vec();
                steps.extend(std::iter::repeat(step.clone()).take((amount - 1) as usize));
                scaled_resources.extend(extra);
                plans.push(Plan {
                    seed: seed.clone(),
                    steps,
                    resources: scaled_resources,
                    scaling: Some(ScalingSpec {
                        step: step.clone(),
                        amount,
                        total_inputs,
                    }),
                });
            }
        }
    }

    /// The maximum useful replication of a scalable step: how many replicas
    /// the stream keeps busy, given the per-output pace, bounded by the
    /// producer's output count.
    fn max_scale_for(
        &self,
        seed: &Timeline,
        step: &PipelineStep,
        resource: &Arc<ComputingResource>,
    ) -> u32 {
        let Some(producer) = self.pipeline.async_prerequisite_of(step) else {
            return 1;
        };
        // The producer's placement decides the transmission context; when it
        // is not scheduled yet, assume its worst-performing resource
        let Some(producer_resource) = seed
            .scheduled_resource_of_step(&producer)
            .or_else(|| self.catalog.worst_performing_resource_for(producer.name()))
        else {
            return 1;
        };
        let Some(estimation) =
            self.catalog
                .timeline_for(step.name(), resource.name(), producer_resource.name())
        else {
            return 1;
        };

        let stream_time = estimation.timeline().step_processing_time()
            + estimation.timeline().data_transmission_time();
        let Some(per_output) = estimation.timeline().average_data_processing_time() else {
            return 1;
        };
        if per_output <= 0.0 {
            return 1;
        }
        let mut scale = (stream_time / per_output).ceil() as u32;

        let producer_outputs = seed
            .events_of_step(&producer)
            .last()
            .and_then(|event| event.estimation().timeline().number_of_produced_outputs())
            .or_else(|| {
                self.catalog
                    .any_timeline_for_step(producer.name())
                    .and_then(|estimation| estimation.timeline().number_of_produced_outputs())
            });
        if let Some(outputs) = producer_outputs {
            scale = scale.min(outputs);
        }
        scale
    }

    /// Schedules a plan step by step onto a copy of its seed timeline.
    /// Returns `None` when a placement has no estimation (infeasible) or the
    /// partial score is pruned.
    fn evaluate_plan(&self, plan: Plan) -> Option<Timeline> {
        let mut timeline = plan.seed;
        let mut remaining_inputs = plan
            .scaling
            .as_ref()
            .map(|scaling| scaling.total_inputs)
            .unwrap_or(0);
        let mut remaining_instances = plan
            .scaling
            .as_ref()
            .map(|scaling| scaling.amount)
            .unwrap_or(0);
        let mut unscaled_baseline: Option<f64> = None;

        for (step, resource) in plan.steps.iter().zip(plan.resources.iter()) {
            let hardware = self.catalog.hardware_for(step.name(), resource.name())?;
            let reservation = ResourceReservation::new(
                resource.clone(),
                hardware.cpu_reservation(),
                hardware.memory_reservation(),
            );
            let is_scaled_instance = plan
                .scaling
                .as_ref()
                .is_some_and(|scaling| scaling.step.same_as(step));

            let prerequisites = self.pipeline.steps_with_incoming_dependency(step);
            let mut baseline_estimation: Option<StepTimelineEstimation> = None;
            let (estimation, optimal_start) = if prerequisites.is_empty() {
                // Roots have no transmission context; the identity lookup
                // carries zero transmission time
                let estimation = self
                    .catalog
                    .timeline_for(step.name(), resource.name(), resource.name())?
                    .clone();
                (estimation, 0.0)
            } else {
                let pacing = timeline.step_with_latest_finish(&prerequisites)?;
                let previous_resource = timeline.scheduled_resource_of_step(&pacing)?;
                let mut estimation = self
                    .catalog
                    .timeline_for(step.name(), resource.name(), previous_resource.name())?
                    .clone();

                let mut sync_position = timeline.step_synchronization_position(&pacing, 1);
                if is_scaled_instance {
                    // The k-th replica starts once the producer emitted k
                    // outputs, and takes its share of the input stream
                    let scale_level = timeline.events_of_step(step).len() as u32 + 1;
                    sync_position = timeline.step_synchronization_position(&pacing, scale_level);
                    baseline_estimation = Some(estimation.clone());
                    if matches!(estimation.timeline(), StepExecutionTimeline::Consumer { .. }) {
                        let inputs = if remaining_instances == 0 {
                            remaining_inputs
                        } else {
                            let share = remaining_inputs.div_ceil(remaining_instances);
                            remaining_instances -= 1;
                            share
                        };
                        estimation = estimation.with_input_partition(inputs);
                        remaining_inputs = remaining_inputs.saturating_sub(inputs);
                    }
                }

                let start =
                    sync_position - estimation.timeline().provisioning_and_deployment_time();
                (estimation, start)
            };

            let duration = estimation.timeline().total_time();
            let position = timeline.earliest_available_position(
                optimal_start,
                duration,
                resource,
                reservation.reserved_memory(),
                reservation.reserved_cpu(),
            );
            let event = SchedulingEvent::new(position, reservation.clone(), estimation);
            timeline.add_event(event.clone());

            let score = self.score(&timeline);
            if score > self.best.lock().score {
                return None;
            }

            if is_scaled_instance {
                if unscaled_baseline.is_none() {
                    if let Some(baseline) = baseline_estimation {
                        // Swap in the unscaled estimation, score, swap back:
                        // replication must beat this to survive
                        let baseline_event =
                            SchedulingEvent::new(position, reservation, baseline);
                        timeline.replace_event(&event, baseline_event.clone());
                        unscaled_baseline = Some(self.score(&timeline));
                        timeline.replace_event(&baseline_event, event.clone());
                    }
                }
                if let Some(baseline) = unscaled_baseline {
                    if score > baseline {
                        return None;
                    }
                }
            }
        }

        Some(timeline)
    }

    /// Folds a completed timeline into the shared best set. Ties keep every
    /// distinct timeline.
    fn record_candidate(&self, timeline: Timeline) {
        let score = self.score(&timeline);
        let mut best = self.best.lock();
        if score < best.score {
            best.score = score;
            best.timelines = vec![timeline];
        } else if score == best.score && !best.timelines.contains(&timeline) {
            best.timelines.push(timeline);
        }
    }
}

/// All orderings of the given steps.
fn permutations(items: &[PipelineStep]) -> Vec<Vec<PipelineStep>> {
    if items.len() <= 1 {
        return vec![items.to_vec()];
    }
    let mut result = Vec::new();
    for (index, item) in items.iter().enumerate() {
        let mut rest = items.to_vec();
        rest.remove(index);
        for mut tail in permutations(&rest) {
            tail.insert(0, item.clone());
            result.push(tail);
        }
    }
    result
}

/// Iterator over the n-fold Cartesian power of a resource slice.
struct CartesianPower<'a> {
    items: &'a [Arc<ComputingResource>],
    indices: Vec<usize>,
    done: bool,
}

impl<'a> CartesianPower<'a> {
    fn new(items: &'a [Arc<ComputingResource>], n: usize) -> Self {
        CartesianPower {
            items,
            indices: vec![0; n],
            done: items.is_empty() && n > 0,
        }
    }
}

impl Iterator for CartesianPower<'_> {
    type Item = Vec<Arc<ComputingResource>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let current = self
            .indices
            .iter()
            .map(|&index| self.items[index].clone())
            .collect();
        // Odometer increment, most significant digit last
        let mut position = self.indices.len();
        loop {
            if position == 0 {
                self.done = true;
                break;
            }
            position -= 1;
            self.indices[position] += 1;
            if self.indices[position] < self.items.len() {
                break;
            }
            self.indices[position] = 0;
        }
        Some(current)
    }
}

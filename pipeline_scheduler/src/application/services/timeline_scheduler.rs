// /////////////////////////////////////////////////////////////////////////////
// Pipeline Scheduler RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Timeline Scheduler Façade
//!
//! The entry point of the scheduling core. Construction precomputes a
//! context-aware timeline estimation and a hardware estimation for every
//! (step, resource, previous resource) triple over the whole catalog;
//! placements without usable dry-run samples or without network connectivity
//! are skipped. [`TimelineScheduler::schedule`] then decomposes the pipeline
//! into levels and drives one [`CandidateSchedule`] per level, seeding each
//! with the best timelines of the previous one.
//!
//! Estimations are computed over *all* catalog resources, including
//! non-schedulable ones: forced deployments may pin steps onto nodes the
//! general search is not allowed to use.
//!
//! The call runs single-threaded from the caller's perspective; internally
//! the per-level plan evaluation fans out over a dedicated worker pool
//! (default 12 threads).

use pipeline_scheduler_domain::{
    DryRun, NetworkGraph, Pipeline, PriceModel, SchedulerError,
    StepHardwareRequirementsEstimator, Timeline, ZonalTransferPricing,
};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

use crate::application::services::candidate_schedule::{CandidateSchedule, ForcedDeployment};
use crate::application::services::estimation_catalog::EstimationCatalog;
use pipeline_scheduler_domain::ContextAwareStepTimelineEstimator;

/// Default size of the plan-evaluation worker pool.
pub const DEFAULT_WORKER_THREADS: usize = 12;

/// Cost- and deadline-aware placement scheduler over a pipeline, a resource
/// pool and a dry-run corpus.
pub struct TimelineScheduler {
    pipeline: Pipeline,
    network_graph: NetworkGraph,
    deadline_seconds: f64,
    budget_usd: f64,
    input_volume_mb: f64,
    forced_deployments: Vec<ForcedDeployment>,
    maximum_scalability: Option<u32>,
    worker_threads: usize,
    pricing: Arc<dyn PriceModel>,
    catalog: EstimationCatalog,
}

impl TimelineScheduler {
    /// Builds the scheduler and precomputes the estimation catalog at the
    /// target input volume.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        pipeline: Pipeline,
        network_graph: NetworkGraph,
        dry_runs: &[DryRun],
        deadline_seconds: f64,
        budget_usd: f64,
        input_volume_mb: f64,
        forced_deployments: Vec<ForcedDeployment>,
        maximum_scalability: Option<u32>,
    ) -> Self {
        let catalog =
            Self::build_estimation_catalog(&pipeline, &network_graph, dry_runs, input_volume_mb);
        TimelineScheduler {
            pipeline,
            network_graph,
            deadline_seconds,
            budget_usd,
            input_volume_mb,
            forced_deployments,
            maximum_scalability,
            worker_threads: DEFAULT_WORKER_THREADS,
            pricing: Arc::new(ZonalTransferPricing::default()),
            catalog,
        }
    }

    /// Overrides the worker-pool size.
    pub fn with_worker_threads(mut self, worker_threads: usize) -> Self {
        self.worker_threads = worker_threads.max(1);
        self
    }

    /// Swaps the transfer price model.
    pub fn with_pricing(mut self, pricing: Arc<dyn PriceModel>) -> Self {
        self.pricing = pricing;
        self
    }

    /// Changes the scalability cap between runs; the estimation catalog is
    /// reused.
    pub fn set_maximum_scalability(&mut self, maximum_scalability: Option<u32>) {
        self.maximum_scalability = maximum_scalability;
    }

    /// The target pipeline input volume in MB
    pub fn input_volume_mb(&self) -> f64 {
        self.input_volume_mb
    }

    fn build_estimation_catalog(
        pipeline: &Pipeline,
        network_graph: &NetworkGraph,
        dry_runs: &[DryRun],
        input_volume_mb: f64,
    ) -> EstimationCatalog {
        let mut catalog = EstimationCatalog::new();
        let hardware_estimator = StepHardwareRequirementsEstimator::new(dry_runs);
        let resources = network_graph.all_computing_resources();

        for step in pipeline.steps() {
            for current in resources {
                for previous in resources {
                    let estimator = ContextAwareStepTimelineEstimator::new(
                        dry_runs,
                        current.clone(),
                        previous.clone(),
                        network_graph,
                    );
                    match estimator.estimate_timeline(step, input_volume_mb) {
                        Some(estimation) => catalog.insert_timeline(estimation),
                        None => {
                            debug!(
                                step = step.name(),
                                resource = current.name(),
                                previous = previous.name(),
                                "placement skipped: no estimation"
                            );
                            continue;
                        }
                    }
                }
                if let Some(hardware) = hardware_estimator.estimate_hardware_requirements(
                    step,
                    current,
                    input_volume_mb,
                ) {
                    catalog.insert_hardware(hardware);
                }
            }
        }
        info!(
            estimations = catalog.timeline_count(),
            "estimation catalog built"
        );
        catalog
    }

    /// Runs the level-by-level search and returns the minimum-score
    /// timelines, deduplicated. The list may be empty when no feasible
    /// placement exists; callers are expected to check.
    pub fn schedule(&self) -> Result<Vec<Timeline>, SchedulerError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.worker_threads)
            .build()
            .map_err(|error| SchedulerError::internal_error(error.to_string()))?;

        let levels = self.pipeline.split_into_levels();
        let started = Instant::now();
        let mut candidates: Vec<Timeline> = Vec::new();

        for (index, level) in levels.into_iter().enumerate() {
            let step_count = level.len();
            let schedule = CandidateSchedule::new(
                level,
                &self.pipeline,
                &self.network_graph,
                self.deadline_seconds,
                self.budget_usd,
                &self.catalog,
                &self.forced_deployments,
                self.maximum_scalability,
                self.pricing.as_ref(),
            );
            candidates = schedule.get_best_timelines(candidates, &pool);
            info!(
                level = index,
                steps = step_count,
                candidates = candidates.len(),
                "level scheduled"
            );
            if candidates.is_empty() {
                break;
            }
        }

        info!(
            elapsed_seconds = started.elapsed().as_secs_f64(),
            "scheduling complete"
        );

        let mut unique: Vec<Timeline> = Vec::new();
        for timeline in candidates {
            if !unique.contains(&timeline) {
                unique.push(timeline);
            }
        }
        Ok(unique)
    }
}

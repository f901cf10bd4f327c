// /////////////////////////////////////////////////////////////////////////////
// Pipeline Scheduler RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Performance Estimators
//!
//! The estimators turn the dry-run corpus into per-placement predictions at
//! the target pipeline input volume:
//!
//! - [`StepTimelineEstimator`]: provisioning, transmission and processing
//!   time plus input/output counts, shaped into the step-variant-specific
//!   [`StepExecutionTimeline`]
//! - [`ContextAwareStepTimelineEstimator`]: replaces the regressed
//!   transmission time with the volume-over-bandwidth time between the
//!   previous step's resource and the current one
//! - [`StepHardwareRequirementsEstimator`]: peak CPU and memory reservations
//!
//! Every fit only consults the samples matching (step, resource) and with a
//! positive pipeline input volume. A target with no usable samples yields no
//! estimation and the placement is skipped; the same holds when the network
//! graph has no edge between the previous and current resource.

use crate::entities::computing_resource::ComputingResource;
use crate::entities::dry_run::{DryRun, StepDryRunResult};
use crate::entities::network_graph::NetworkGraph;
use crate::entities::pipeline_step::{PipelineStep, StepKind};
use crate::services::regression::{nnls, weighted_linear_fit, RandomForestRegressor};
use crate::value_objects::step_estimation::{
    StepHardwareRequirementsEstimation, StepTimelineEstimation,
};
use crate::value_objects::step_execution_timeline::StepExecutionTimeline;
use ndarray::{Array1, Array2};
use std::sync::Arc;

/// Fits `y = a·x + b` with non-negative coefficients over the given
/// samples. `None` when there is nothing to fit.
fn nnls_line_fit(xs: &[f64], ys: &[f64]) -> Option<(f64, f64)> {
    if xs.is_empty() {
        return None;
    }
    let design = Array2::from_shape_fn((xs.len(), 2), |(row, col)| {
        if col == 0 {
            xs[row]
        } else {
            1.0
        }
    });
    let targets = Array1::from_vec(ys.to_vec());
    let coefficients = nnls(&design, &targets);
    Some((coefficients[0], coefficients[1]))
}

/// Estimates step execution timelines from dry-run measurements.
pub struct StepTimelineEstimator<'a> {
    dry_runs: &'a [DryRun],
}

impl<'a> StepTimelineEstimator<'a> {
    pub fn new(dry_runs: &'a [DryRun]) -> Self {
        StepTimelineEstimator { dry_runs }
    }

    /// The corpus samples matching (step, resource).
    pub fn matching_results(
        &self,
        step: &PipelineStep,
        resource: &ComputingResource,
    ) -> Vec<&'a StepDryRunResult> {
        self.dry_runs
            .iter()
            .flat_map(|dry_run| dry_run.step_dry_runs())
            .filter(|result| {
                result.step.same_as(step) && result.resource.name() == resource.name()
            })
            .collect()
    }

    /// Pairs (pipeline input volume, target) over the samples with a
    /// positive pipeline input volume.
    fn training_pairs<F>(results: &[&StepDryRunResult], target: F) -> (Vec<f64>, Vec<f64>)
    where
        F: Fn(&StepDryRunResult) -> f64,
    {
        let mut xs = Vec::new();
        let mut ys = Vec::new();
        for result in results {
            if result.pipeline_input_volume_mb > 0.0 {
                xs.push(result.pipeline_input_volume_mb);
                ys.push(target(result));
            }
        }
        (xs, ys)
    }

    /// NNLS estimate of the step's own input volume at the given pipeline
    /// input volume, clipped at zero.
    pub fn estimate_input_volume(
        &self,
        results: &[&StepDryRunResult],
        pipeline_input_volume: f64,
    ) -> f64 {
        let (xs, ys) = Self::training_pairs(results, |r| r.input_data_volume_mb);
        match nnls_line_fit(&xs, &ys) {
            Some((slope, intercept)) => (slope * pipeline_input_volume + intercept).max(0.0),
            None => 0.0,
        }
    }

    /// NNLS estimate of the step's input count, rounded up, at least 1.
    pub fn estimate_number_of_inputs(
        &self,
        results: &[&StepDryRunResult],
        pipeline_input_volume: f64,
    ) -> u32 {
        let (xs, ys) = Self::training_pairs(results, |r| f64::from(r.num_inputs));
        match nnls_line_fit(&xs, &ys) {
            Some((slope, intercept)) => {
                let estimate = (slope * pipeline_input_volume + intercept).ceil();
                (estimate.max(1.0)) as u32
            }
            None => 0,
        }
    }

    /// NNLS estimate of the step's output count, rounded up, at least 1.
    pub fn estimate_number_of_outputs(
        &self,
        results: &[&StepDryRunResult],
        pipeline_input_volume: f64,
    ) -> u32 {
        let (xs, ys) = Self::training_pairs(results, |r| f64::from(r.num_outputs));
        match nnls_line_fit(&xs, &ys) {
            Some((slope, intercept)) => {
                let estimate = (slope * pipeline_input_volume + intercept).ceil();
                (estimate.max(1.0)) as u32
            }
            None => 0,
        }
    }

    /// NNLS estimate of the provisioning and deployment time.
    ///
    /// The input-volume column is centered and scaled before the fit to
    /// improve conditioning; the query volume is normalized symmetrically.
    pub fn estimate_provisioning_and_deployment_time(
        &self,
        results: &[&StepDryRunResult],
        pipeline_input_volume: f64,
    ) -> f64 {
        let (xs, ys) =
            Self::training_pairs(results, |r| r.timeline.provisioning_and_deployment_time());
        if xs.is_empty() {
            return 0.0;
        }
        let mean = xs.iter().sum::<f64>() / xs.len() as f64;
        let variance = xs.iter().map(|x| (x - mean) * (x - mean)).sum::<f64>() / xs.len() as f64;
        let std = variance.sqrt();
        let scale = if std < 1e-12 { 1.0 } else { std };

        let normalized: Vec<f64> = xs.iter().map(|x| (x - mean) / scale).collect();
        match nnls_line_fit(&normalized, &ys) {
            Some((slope, intercept)) => {
                let query = (pipeline_input_volume - mean) / scale;
                (slope * query + intercept).max(0.0)
            }
            None => 0.0,
        }
    }

    /// Weighted linear estimate of the data-transmission time, each sample
    /// weighted by its pipeline input volume.
    pub fn estimate_data_transmission_time(
        &self,
        results: &[&StepDryRunResult],
        pipeline_input_volume: f64,
    ) -> f64 {
        let (xs, ys) = Self::training_pairs(results, |r| r.timeline.data_transmission_time());
        if xs.is_empty() {
            return 0.0;
        }
        let weights = xs.clone();
        let model = weighted_linear_fit(&xs, &ys, &weights);
        model.predict(pipeline_input_volume).max(0.0)
    }

    /// NNLS estimate of the step processing time.
    pub fn estimate_step_processing_time(
        &self,
        results: &[&StepDryRunResult],
        pipeline_input_volume: f64,
    ) -> f64 {
        let (xs, ys) = Self::training_pairs(results, |r| r.timeline.step_processing_time());
        match nnls_line_fit(&xs, &ys) {
            Some((slope, intercept)) => (slope * pipeline_input_volume + intercept).max(0.0),
            None => 0.0,
        }
    }

    /// Estimates the execution timeline of `step` on `resource` at the given
    /// pipeline input volume, using the context-free transmission fit.
    /// `None` when no sample matches.
    pub fn estimate_timeline(
        &self,
        step: &PipelineStep,
        resource: &Arc<ComputingResource>,
        pipeline_input_volume: f64,
    ) -> Option<StepTimelineEstimation> {
        let results = self.matching_results(step, resource);
        if results.is_empty() {
            return None;
        }
        let transmission = self.estimate_data_transmission_time(&results, pipeline_input_volume);
        let timeline =
            self.assemble_timeline(step, &results, pipeline_input_volume, transmission)?;
        Some(StepTimelineEstimation::new(
            pipeline_input_volume,
            step.clone(),
            resource.clone(),
            timeline,
        ))
    }

    /// Shapes the scalar fits into the step-variant-specific timeline.
    fn assemble_timeline(
        &self,
        step: &PipelineStep,
        results: &[&StepDryRunResult],
        pipeline_input_volume: f64,
        transmission_time: f64,
    ) -> Option<StepExecutionTimeline> {
        let provisioning =
            self.estimate_provisioning_and_deployment_time(results, pipeline_input_volume);
        let processing = self.estimate_step_processing_time(results, pipeline_input_volume);

        let number_of_inputs = match step.kind() {
            StepKind::Consumer | StepKind::DataSink => {
                self.estimate_number_of_inputs(results, pipeline_input_volume)
            }
            _ => 1,
        };
        let number_of_outputs = match step.kind() {
            StepKind::Producer | StepKind::Consumer => {
                self.estimate_number_of_outputs(results, pipeline_input_volume)
            }
            _ => 1,
        };

        match step.kind() {
            StepKind::Batch => {
                StepExecutionTimeline::batch(provisioning, transmission_time, processing).ok()
            }
            StepKind::Producer => StepExecutionTimeline::producer(
                provisioning,
                transmission_time,
                processing / f64::from(number_of_outputs.max(1)),
                number_of_outputs,
            )
            .ok(),
            StepKind::Consumer => StepExecutionTimeline::consumer(
                provisioning,
                transmission_time,
                number_of_inputs,
                processing / f64::from(number_of_inputs.max(1)),
                number_of_outputs,
            )
            .ok(),
            StepKind::DataSink => {
                StepExecutionTimeline::sink(provisioning, transmission_time, number_of_inputs).ok()
            }
            StepKind::DataSource => StepExecutionTimeline::source(provisioning).ok(),
        }
    }
}

/// Estimates timelines in the context of the previous step's placement: the
/// transmission time follows from the link bandwidth rather than from a
/// regression over measured transmissions.
pub struct ContextAwareStepTimelineEstimator<'a> {
    base: StepTimelineEstimator<'a>,
    current_resource: Arc<ComputingResource>,
    previous_resource: Arc<ComputingResource>,
    network_graph: &'a NetworkGraph,
}

impl<'a> ContextAwareStepTimelineEstimator<'a> {
    pub fn new(
        dry_runs: &'a [DryRun],
        current_resource: Arc<ComputingResource>,
        previous_resource: Arc<ComputingResource>,
        network_graph: &'a NetworkGraph,
    ) -> Self {
        ContextAwareStepTimelineEstimator {
            base: StepTimelineEstimator::new(dry_runs),
            current_resource,
            previous_resource,
            network_graph,
        }
    }

    /// Estimates the timeline of `step` on the current resource given the
    /// previous step runs on the previous resource.
    ///
    /// Returns `None` when no sample matches or when the two resources are
    /// not connected in the network graph (the placement is infeasible).
    pub fn estimate_timeline(
        &self,
        step: &PipelineStep,
        pipeline_input_volume: f64,
    ) -> Option<StepTimelineEstimation> {
        let results = self.base.matching_results(step, &self.current_resource);
        if results.is_empty() {
            return None;
        }

        let bandwidth_mbps = self
            .network_graph
            .bandwidth_between(&self.previous_resource, &self.current_resource)?;
        let transmission_time = if bandwidth_mbps == 0.0 {
            // Same resource: the data never leaves the node
            0.0
        } else {
            let step_input_volume_mb = self
                .base
                .estimate_input_volume(&results, pipeline_input_volume);
            step_input_volume_mb / (bandwidth_mbps / 8.0)
        };

        let timeline = self.base.assemble_timeline(
            step,
            &results,
            pipeline_input_volume,
            transmission_time,
        )?;
        Some(
            StepTimelineEstimation::new(
                pipeline_input_volume,
                step.clone(),
                self.current_resource.clone(),
                timeline,
            )
            .with_previous_resource(self.previous_resource.clone()),
        )
    }
}

/// Estimates the CPU and memory a step needs on a resource, from
/// random-forest fits against the pipeline input volume.
pub struct StepHardwareRequirementsEstimator<'a> {
    dry_runs: &'a [DryRun],
}

impl<'a> StepHardwareRequirementsEstimator<'a> {
    pub fn new(dry_runs: &'a [DryRun]) -> Self {
        StepHardwareRequirementsEstimator { dry_runs }
    }

    fn training_pairs<F>(
        &self,
        step: &PipelineStep,
        resource: &ComputingResource,
        target: F,
    ) -> (Vec<f64>, Vec<f64>)
    where
        F: Fn(&StepDryRunResult) -> f64,
    {
        let mut xs = Vec::new();
        let mut ys = Vec::new();
        for result in self
            .dry_runs
            .iter()
            .flat_map(|dry_run| dry_run.step_dry_runs())
        {
            if result.step.same_as(step)
                && result.resource.name() == resource.name()
                && result.pipeline_input_volume_mb > 0.0
            {
                xs.push(result.pipeline_input_volume_mb);
                ys.push(target(result));
            }
        }
        (xs, ys)
    }

    /// Forest estimate of the peak memory in MB, clipped at zero.
    pub fn estimate_memory_requirements(
        &self,
        step: &PipelineStep,
        resource: &ComputingResource,
        pipeline_input_volume: f64,
    ) -> Option<f64> {
        let (xs, ys) = self.training_pairs(step, resource, |r| r.max_memory_usage_mb);
        let forest = RandomForestRegressor::fit(&xs, &ys)?;
        Some(forest.predict(pipeline_input_volume).max(0.0))
    }

    /// Forest estimate of the CPU reservation in percent, fitted against the
    /// midpoint of average and peak CPU, clipped at zero.
    pub fn estimate_cpu_requirements(
        &self,
        step: &PipelineStep,
        resource: &ComputingResource,
        pipeline_input_volume: f64,
    ) -> Option<f64> {
        let (xs, ys) = self.training_pairs(step, resource, |r| {
            (r.avg_cpu_percentage + r.max_cpu_percentage) / 2.0
        });
        let forest = RandomForestRegressor::fit(&xs, &ys)?;
        Some(forest.predict(pipeline_input_volume).max(0.0))
    }

    /// Both reservations bundled; `None` when either target has no usable
    /// samples.
    pub fn estimate_hardware_requirements(
        &self,
        step: &PipelineStep,
        resource: &Arc<ComputingResource>,
        pipeline_input_volume: f64,
    ) -> Option<StepHardwareRequirementsEstimation> {
        let memory = self.estimate_memory_requirements(step, resource, pipeline_input_volume)?;
        let cpu = self.estimate_cpu_requirements(step, resource, pipeline_input_volume)?;
        Some(StepHardwareRequirementsEstimation::new(
            pipeline_input_volume,
            step.clone(),
            resource.clone(),
            cpu,
            memory,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resource(name: &str) -> Arc<ComputingResource> {
        Arc::new(ComputingResource::new_free(name, 4, 2.4, 8.0))
    }

    /// A corpus in which every per-step quantity grows linearly with the
    /// pipeline input volume.
    fn linear_corpus(step: &PipelineStep, node: &Arc<ComputingResource>) -> Vec<DryRun> {
        [100.0_f64, 200.0, 400.0]
            .iter()
            .map(|&volume| {
                let mut dry_run = DryRun::with_input_volume(volume);
                dry_run.add_step_dry_run(StepDryRunResult {
                    step: step.clone(),
                    resource: node.clone(),
                    num_inputs: (volume / 10.0) as u32,
                    input_data_volume_mb: volume / 2.0,
                    avg_cpu_percentage: 20.0,
                    max_cpu_percentage: 30.0,
                    max_memory_usage_mb: 512.0,
                    timeline: StepExecutionTimeline::batch(2.0, volume / 100.0, volume / 10.0)
                        .unwrap(),
                    num_outputs: (volume / 20.0) as u32,
                    avg_output_size_mb: 1.0,
                    pipeline_input_volume_mb: volume,
                });
                dry_run
            })
            .collect()
    }

    #[test]
    fn test_linear_corpus_recovered() {
        let step = PipelineStep::batch("a");
        let node = resource("n1");
        let corpus = linear_corpus(&step, &node);
        let estimator = StepTimelineEstimator::new(&corpus);
        let results = estimator.matching_results(&step, &node);

        assert!((estimator.estimate_input_volume(&results, 300.0) - 150.0).abs() < 1e-6);
        assert!((estimator.estimate_step_processing_time(&results, 300.0) - 30.0).abs() < 1e-6);
        assert!(
            (estimator.estimate_provisioning_and_deployment_time(&results, 300.0) - 2.0).abs()
                < 1e-6
        );
        assert!((estimator.estimate_data_transmission_time(&results, 300.0) - 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_missing_samples_yield_no_estimation() {
        let step = PipelineStep::batch("a");
        let other = PipelineStep::batch("unmeasured");
        let node = resource("n1");
        let corpus = linear_corpus(&step, &node);
        let estimator = StepTimelineEstimator::new(&corpus);

        assert!(estimator.estimate_timeline(&other, &node, 300.0).is_none());
        assert!(estimator
            .estimate_timeline(&step, &resource("n2"), 300.0)
            .is_none());
    }

    #[test]
    fn test_context_aware_same_resource_has_no_transmission() {
        let step = PipelineStep::batch("a");
        let node = resource("n1");
        let corpus = linear_corpus(&step, &node);
        let mut graph = NetworkGraph::new();
        graph.add_node(node.clone());

        let estimator =
            ContextAwareStepTimelineEstimator::new(&corpus, node.clone(), node.clone(), &graph);
        let estimation = estimator.estimate_timeline(&step, 300.0).unwrap();
        assert_eq!(estimation.timeline().data_transmission_time(), 0.0);
        assert_eq!(estimation.previous_resource().unwrap().name(), "n1");
    }

    #[test]
    fn test_context_aware_divides_volume_by_bandwidth() {
        let step = PipelineStep::batch("a");
        let current = resource("n1");
        let previous = resource("n0");
        let corpus = linear_corpus(&step, &current);
        let mut graph = NetworkGraph::new();
        graph.add_node(current.clone());
        graph.add_node(previous.clone());
        graph.add_edge(&previous, &current, 800.0);

        let estimator = ContextAwareStepTimelineEstimator::new(
            &corpus,
            current.clone(),
            previous.clone(),
            &graph,
        );
        let estimation = estimator.estimate_timeline(&step, 300.0).unwrap();
        // 150 MB over 100 MB/s
        assert!((estimation.timeline().data_transmission_time() - 1.5).abs() < 1e-6);
    }

    #[test]
    fn test_context_aware_missing_edge_fails_placement() {
        let step = PipelineStep::batch("a");
        let current = resource("n1");
        let previous = resource("n0");
        let corpus = linear_corpus(&step, &current);
        let mut graph = NetworkGraph::new();
        graph.add_node(current.clone());
        graph.add_node(previous.clone());

        let estimator = ContextAwareStepTimelineEstimator::new(
            &corpus,
            current.clone(),
            previous.clone(),
            &graph,
        );
        assert!(estimator.estimate_timeline(&step, 300.0).is_none());
    }

    #[test]
    fn test_hardware_requirements_from_constant_corpus() {
        let step = PipelineStep::batch("a");
        let node = resource("n1");
        let corpus = linear_corpus(&step, &node);
        let estimator = StepHardwareRequirementsEstimator::new(&corpus);

        let estimation = estimator
            .estimate_hardware_requirements(&step, &node, 300.0)
            .unwrap();
        // Constant targets are recovered exactly: (20 + 30) / 2 and 512
        assert_eq!(estimation.cpu_reservation(), 25.0);
        assert_eq!(estimation.memory_reservation(), 512.0);

        let unmeasured = PipelineStep::batch("unmeasured");
        assert!(estimator
            .estimate_hardware_requirements(&unmeasured, &node, 300.0)
            .is_none());
    }

    #[test]
    fn test_producer_and_consumer_shapes() {
        let producer = PipelineStep::producer("slicer");
        let node = resource("n1");
        let mut corpus = Vec::new();
        for &volume in &[100.0_f64, 200.0] {
            let mut dry_run = DryRun::with_input_volume(volume);
            dry_run.add_step_dry_run(StepDryRunResult {
                step: producer.clone(),
                resource: node.clone(),
                num_inputs: 1,
                input_data_volume_mb: volume,
                avg_cpu_percentage: 10.0,
                max_cpu_percentage: 10.0,
                max_memory_usage_mb: 128.0,
                // 2 s per output at every volume
                timeline: StepExecutionTimeline::batch(1.0, 0.0, volume / 10.0 * 2.0).unwrap(),
                num_outputs: (volume / 10.0) as u32,
                avg_output_size_mb: 10.0,
                pipeline_input_volume_mb: volume,
            });
            corpus.push(dry_run);
        }

        let estimator = StepTimelineEstimator::new(&corpus);
        let estimation = estimator.estimate_timeline(&producer, &node, 100.0).unwrap();
        match estimation.timeline() {
            StepExecutionTimeline::Producer {
                average_time_to_produce_output,
                number_of_produced_outputs,
                ..
            } => {
                assert_eq!(*number_of_produced_outputs, 10);
                assert!((average_time_to_produce_output - 2.0).abs() < 1e-6);
            }
            other => panic!("expected a producer timeline, got {other:?}"),
        }
    }
}

// /////////////////////////////////////////////////////////////////////////////
// Pipeline Scheduler RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! End-to-end scheduling scenarios over synthetic, exactly-calibrated
//! dry-run corpora: linear pipelines, parallel branches, streaming
//! producer/consumer scaling, forced deployments, tight budgets, and the
//! cross-cutting determinism and monotonicity properties.

mod common;

use common::{
    assert_capacity_invariant, assert_deterministic_order, assert_non_negative_invariant,
    calibrated_corpus, score_of, timelines_equal_unordered, StepCalibration,
};
use pipeline_scheduler::application::services::{ForcedDeployment, TimelineScheduler};
use pipeline_scheduler_domain::{
    ComputingResource, DependencyKind, DryRun, NetworkGraph, Pipeline, PipelineStep, Timeline,
    ZonalTransferPricing,
};
use std::sync::Arc;

fn meshed_graph(resources: &[Arc<ComputingResource>]) -> NetworkGraph {
    let mut graph = NetworkGraph::new();
    for resource in resources {
        for existing in graph.all_computing_resources().to_vec() {
            graph.add_edge(resource, &existing, 1000.0);
            graph.add_edge(&existing, resource, 1000.0);
        }
        graph.add_node(resource.clone());
    }
    graph
}

/// E1: `source -> stage-a -> stage-b -> sink` on a single resource.
struct LinearScenario {
    pipeline: Pipeline,
    graph: NetworkGraph,
    corpus: Vec<DryRun>,
}

fn linear_scenario() -> LinearScenario {
    let source = PipelineStep::data_source("source");
    let stage_a = PipelineStep::batch("stage-a");
    let stage_b = PipelineStep::batch("stage-b");
    let sink = PipelineStep::data_sink("sink");

    let mut pipeline = Pipeline::new();
    pipeline.add_connection(source.clone(), stage_a.clone()).unwrap();
    pipeline.add_connection(stage_a.clone(), stage_b.clone()).unwrap();
    pipeline.add_connection(stage_b.clone(), sink.clone()).unwrap();

    // 4 CPUs, 8 GiB, billed 0.36 USD per started hour
    let node = Arc::new(ComputingResource::new_on_demand(
        "node", 4, 2.5, 8.0, "eu-west-1a", 0.36,
    ));
    let graph = meshed_graph(&[node.clone()]);

    let source_cal = StepCalibration::new(source);
    // At 100 MB: stage-a runs 10 s, stage-b 5 s, both 25% CPU and 2 GiB
    let a_cal = StepCalibration::new(stage_a)
        .processing_per_mb(0.1)
        .reserving(25.0, 2048.0);
    let b_cal = StepCalibration::new(stage_b)
        .processing_per_mb(0.05)
        .reserving(25.0, 2048.0);
    let sink_cal = StepCalibration::new(sink);

    let nodes = [node];
    let corpus = calibrated_corpus(
        &[50.0, 100.0],
        &[
            (&source_cal, &nodes),
            (&a_cal, &nodes),
            (&b_cal, &nodes),
            (&sink_cal, &nodes),
        ],
    );

    LinearScenario {
        pipeline,
        graph,
        corpus,
    }
}

fn assert_common_invariants(timelines: &[Timeline]) {
    assert!(!timelines.is_empty(), "expected at least one timeline");
    for timeline in timelines {
        assert_capacity_invariant(timeline);
        assert_non_negative_invariant(timeline);
        assert_deterministic_order(timeline);
    }
}

#[test]
fn test_e1_linear_batch_pipeline_on_one_resource() {
    let scenario = linear_scenario();
    let scheduler = TimelineScheduler::new(
        scenario.pipeline,
        scenario.graph,
        &scenario.corpus,
        100.0,
        10.0,
        100.0,
        Vec::new(),
        None,
    )
    .with_worker_threads(4);

    let timelines = scheduler.schedule().unwrap();
    assert_common_invariants(&timelines);
    assert_eq!(timelines.len(), 1);

    let timeline = &timelines[0];
    assert_eq!(timeline.events().len(), 4);

    let span_of = |name: &str| -> (f64, f64) {
        let event = timeline
            .events()
            .iter()
            .find(|event| event.step_name() == name)
            .unwrap_or_else(|| panic!("missing event for {name}"));
        (event.position(), event.end_position())
    };
    let close = |(start, end): (f64, f64), expected_start: f64, expected_end: f64| {
        (start - expected_start).abs() < 1e-6 && (end - expected_end).abs() < 1e-6
    };
    assert!(close(span_of("source"), 0.0, 0.0));
    assert!(close(span_of("stage-a"), 0.0, 10.0));
    assert!(close(span_of("stage-b"), 10.0, 15.0));
    assert!(close(span_of("sink"), 15.0, 15.0));
    assert!((timeline.total_time() - 15.0).abs() < 1e-6);

    // 0.15 time fraction plus one billed hour (0.36 of a 10 USD budget)
    let score = score_of(timeline, 100.0, 10.0, &ZonalTransferPricing::default());
    assert!(score > 0.15 && score < 0.2, "unexpected score {score}");

    // Dependency ordering: every synchronous prerequisite finishes before
    // its dependent starts
    let end_of = |name: &str| {
        timeline
            .events()
            .iter()
            .find(|event| event.step_name() == name)
            .unwrap()
            .end_position()
    };
    let start_of = |name: &str| {
        timeline
            .events()
            .iter()
            .find(|event| event.step_name() == name)
            .unwrap()
            .position()
    };
    assert!(end_of("source") <= start_of("stage-a"));
    assert!(end_of("stage-a") <= start_of("stage-b"));
    assert!(end_of("stage-b") <= start_of("sink"));
}

/// E2: two independent branches spread over two identical resources.
fn parallel_scenario(
    rate_per_hour: f64,
) -> (Pipeline, NetworkGraph, Vec<DryRun>) {
    let source = PipelineStep::data_source("source");
    let left = PipelineStep::batch("branch-left");
    let right = PipelineStep::batch("branch-right");

    let mut pipeline = Pipeline::new();
    pipeline.add_connection(source.clone(), left.clone()).unwrap();
    pipeline.add_connection(source.clone(), right.clone()).unwrap();

    let make_node = |name: &str, zone: &str| -> Arc<ComputingResource> {
        if rate_per_hour > 0.0 {
            Arc::new(ComputingResource::new_on_demand(
                name,
                4,
                2.5,
                8.0,
                zone,
                rate_per_hour,
            ))
        } else {
            Arc::new(ComputingResource::new_free(name, 4, 2.5, 8.0))
        }
    };
    let node_a = make_node("node-a", "eu-west-1a");
    let node_b = make_node("node-b", "eu-west-1a");
    let graph = meshed_graph(&[node_a.clone(), node_b.clone()]);

    let source_cal = StepCalibration::new(source);
    // Each branch needs 3 of the 4 cores, so one node cannot run both at once
    let left_cal = StepCalibration::new(left)
        .processing_per_mb(0.1)
        .reserving(300.0, 2048.0);
    let right_cal = StepCalibration::new(right)
        .processing_per_mb(0.1)
        .reserving(300.0, 2048.0);

    let source_nodes = [node_a.clone()];
    let both_nodes = [node_a, node_b];
    let corpus = calibrated_corpus(
        &[50.0, 100.0],
        &[
            (&source_cal, &source_nodes),
            (&left_cal, &both_nodes),
            (&right_cal, &both_nodes),
        ],
    );
    (pipeline, graph, corpus)
}

#[test]
fn test_e2_parallel_branches_use_both_resources() {
    let (pipeline, graph, corpus) = parallel_scenario(0.0);
    let scheduler = TimelineScheduler::new(
        pipeline, graph, &corpus, 100.0, 10.0, 100.0, Vec::new(), None,
    )
    .with_worker_threads(4);

    let timelines = scheduler.schedule().unwrap();
    assert_common_invariants(&timelines);

    for timeline in &timelines {
        let branch_events: Vec<_> = timeline
            .events()
            .iter()
            .filter(|event| event.step_name().starts_with("branch-"))
            .collect();
        assert_eq!(branch_events.len(), 2);
        // Both branches start immediately, on different resources
        assert!(branch_events.iter().all(|event| event.position().abs() < 1e-9));
        assert_ne!(
            branch_events[0].resource().name(),
            branch_events[1].resource().name()
        );
        // Total time is the longest branch, not the sum
        assert!((timeline.total_time() - 10.0).abs() < 1e-6);
    }
}

/// E3: async producer/consumer with replication of the consumer.
#[test]
fn test_e3_async_consumer_scales_to_drain_the_stream() {
    let source = PipelineStep::data_source("source");
    let slicer = PipelineStep::producer("slicer");
    let prepare = PipelineStep::consumer("prepare");

    let mut pipeline = Pipeline::new();
    pipeline.add_connection(source.clone(), slicer.clone()).unwrap();
    pipeline.add_connection(slicer.clone(), prepare.clone()).unwrap();
    pipeline
        .add_dependency(DependencyKind::Asynchronous, prepare.clone(), slicer.clone())
        .unwrap();

    let node = Arc::new(ComputingResource::new_free("node", 8, 2.5, 16.0));
    let graph = meshed_graph(&[node.clone()]);

    let source_cal = StepCalibration::new(source);
    // At 100 MB the slicer emits 10 outputs in 5 s (0.5 s per slice)
    let slicer_cal = StepCalibration::new(slicer)
        .processing_per_mb(0.05)
        .outputs_per_mb(0.1)
        .reserving(25.0, 1024.0);
    // The consumer needs 3 s per input, 30 s unscaled
    let prepare_cal = StepCalibration::new(prepare)
        .processing_per_mb(0.3)
        .inputs_per_mb(0.1)
        .outputs_per_mb(0.1)
        .reserving(25.0, 1024.0);

    let nodes = [node];
    let corpus = calibrated_corpus(
        &[50.0, 100.0],
        &[
            (&source_cal, &nodes),
            (&slicer_cal, &nodes),
            (&prepare_cal, &nodes),
        ],
    );

    let scheduler = TimelineScheduler::new(
        pipeline,
        graph,
        &corpus,
        100.0,
        10.0,
        100.0,
        Vec::new(),
        Some(6),
    )
    .with_worker_threads(4);

    let timelines = scheduler.schedule().unwrap();
    assert_common_invariants(&timelines);

    for timeline in &timelines {
        let prepare_events: Vec<_> = timeline
            .events()
            .iter()
            .filter(|event| event.step_name() == "prepare")
            .collect();
        // The cap admits six concurrent instances and six is optimal here
        assert_eq!(prepare_events.len(), 6);

        // The replicas partition the ten inputs with ceiling division
        let shares: Vec<u32> = prepare_events
            .iter()
            .filter_map(|event| {
                event
                    .estimation()
                    .timeline()
                    .number_of_transmitted_inputs()
            })
            .collect();
        assert_eq!(shares.iter().sum::<u32>(), 10);
        assert!(shares.iter().all(|&share| share == 1 || share == 2));

        // Instance k starts only after the producer emitted k outputs
        let slicer_event = timeline
            .events()
            .iter()
            .find(|event| event.step_name() == "slicer")
            .unwrap();
        let pace = slicer_event
            .estimation()
            .timeline()
            .average_time_to_produce_output()
            .unwrap();
        let mut starts: Vec<f64> = prepare_events.iter().map(|e| e.position()).collect();
        starts.sort_by(f64::total_cmp);
        for (index, &start) in starts.iter().enumerate() {
            let emitted = (index + 1) as f64;
            assert!(
                start + 1e-9 >= slicer_event.position() + emitted * pace,
                "replica {index} started before its input existed"
            );
        }

        // Streaming beats the 30 s unscaled consumer by a wide margin
        assert!(timeline.total_time() < 10.0);
    }
}

/// E4: a forced deployment pins the source onto a non-schedulable node.
#[test]
fn test_e4_forced_deployment_onto_disabled_resource() {
    let source = PipelineStep::data_source("source");
    let stage = PipelineStep::batch("stage");

    let mut pipeline = Pipeline::new();
    pipeline.add_connection(source.clone(), stage.clone()).unwrap();

    let mut fog = ComputingResource::new_free("fog1", 4, 1.5, 4.0);
    fog.disable_scheduling();
    let fog = Arc::new(fog);
    let worker = Arc::new(ComputingResource::new_free("worker", 4, 2.5, 8.0));
    let graph = meshed_graph(&[fog.clone(), worker.clone()]);

    let source_cal = StepCalibration::new(source.clone());
    let stage_cal = StepCalibration::new(stage)
        .processing_per_mb(0.1)
        .reserving(25.0, 1024.0);

    let fog_nodes = [fog.clone()];
    let worker_nodes = [worker];
    let corpus = calibrated_corpus(
        &[50.0, 100.0],
        &[(&source_cal, &fog_nodes), (&stage_cal, &worker_nodes)],
    );

    let scheduler = TimelineScheduler::new(
        pipeline,
        graph,
        &corpus,
        100.0,
        10.0,
        100.0,
        vec![ForcedDeployment::new(source, fog.clone())],
        None,
    )
    .with_worker_threads(4);

    let timelines = scheduler.schedule().unwrap();
    assert_common_invariants(&timelines);

    for timeline in &timelines {
        for event in timeline.events() {
            if event.step_name() == "source" {
                // The mandate overrides the schedulability flag
                assert_eq!(event.resource().name(), "fog1");
            } else {
                // Nothing else may use the disabled node
                assert_ne!(event.resource().name(), "fog1");
                assert!(event.resource().is_schedulable());
            }
        }
    }
}

/// E5: a budget below the achievable cost still yields schedules; the score
/// above 2 signals infeasibility to the caller.
#[test]
fn test_e5_budget_is_scoring_not_filtering() {
    let (pipeline, graph, corpus) = parallel_scenario(0.107);
    let budget = 0.0001;
    let scheduler = TimelineScheduler::new(
        pipeline, graph, &corpus, 100.0, budget, 100.0, Vec::new(), None,
    )
    .with_worker_threads(4);

    let timelines = scheduler.schedule().unwrap();
    assert_common_invariants(&timelines);
    for timeline in &timelines {
        let score = score_of(timeline, 100.0, budget, &ZonalTransferPricing::default());
        assert!(score > 2.0, "tight budget must push the score above 2");
    }
}

/// E6: closing a dependency cycle fails fast and leaves the pipeline
/// untouched.
#[test]
fn test_e6_cycle_rejection_is_fatal_and_non_mutating() {
    let scenario = linear_scenario();
    let mut pipeline = scenario.pipeline;
    let before = pipeline.clone();

    let stage_a = pipeline.find_step_by_name("stage-a").unwrap().clone();
    let stage_b = pipeline.find_step_by_name("stage-b").unwrap().clone();
    let result = pipeline.add_dependency(DependencyKind::Synchronous, stage_a, stage_b);

    assert!(result.is_err());
    assert_eq!(pipeline, before);
}

#[test]
fn test_idempotent_scheduling_runs() {
    let scenario = linear_scenario();
    let scheduler = TimelineScheduler::new(
        scenario.pipeline.clone(),
        scenario.graph.clone(),
        &scenario.corpus,
        100.0,
        10.0,
        100.0,
        Vec::new(),
        None,
    )
    .with_worker_threads(4);

    let first = scheduler.schedule().unwrap();
    let second = scheduler.schedule().unwrap();
    assert!(
        timelines_equal_unordered(&first, &second),
        "identical inputs must produce identical timeline sets"
    );

    // A freshly built scheduler reproduces the same result as well
    let rebuilt = TimelineScheduler::new(
        scenario.pipeline,
        scenario.graph,
        &scenario.corpus,
        100.0,
        10.0,
        100.0,
        Vec::new(),
        None,
    )
    .with_worker_threads(4);
    let third = rebuilt.schedule().unwrap();
    assert!(timelines_equal_unordered(&first, &third));
}

#[test]
fn test_minimum_score_monotone_in_budget_and_deadline() {
    let scenario = linear_scenario();
    let pricing = ZonalTransferPricing::default();

    let min_score = |deadline: f64, budget: f64| -> f64 {
        let scheduler = TimelineScheduler::new(
            scenario.pipeline.clone(),
            scenario.graph.clone(),
            &scenario.corpus,
            deadline,
            budget,
            100.0,
            Vec::new(),
            None,
        )
        .with_worker_threads(4);
        scheduler
            .schedule()
            .unwrap()
            .iter()
            .map(|timeline| score_of(timeline, deadline, budget, &pricing))
            .fold(f64::INFINITY, f64::min)
    };

    let baseline = min_score(100.0, 10.0);
    assert!(min_score(100.0, 100.0) <= baseline);
    assert!(min_score(1000.0, 10.0) <= baseline);
}

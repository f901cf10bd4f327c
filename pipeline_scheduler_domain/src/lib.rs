// /////////////////////////////////////////////////////////////////////////////
// Pipeline Scheduler RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Pipeline Scheduler Domain
//!
//! Pure business logic of the cost- and deadline-aware placement scheduler:
//! the pipeline model, the resource model, the dry-run corpus, the
//! performance estimators, and the timeline data structure. The crate is
//! free of I/O, logging and async so every piece can be exercised and
//! reasoned about in isolation; the application crate layers CSV loading,
//! configuration, the search engine and the CLI on top.
//!
//! ## Module Structure
//!
//! - [`entities`]: pipeline, steps, resources, network graph, dry runs and
//!   timelines
//! - [`value_objects`]: execution-timeline variants, estimations and
//!   reservations
//! - [`services`]: regression primitives and the performance estimators
//! - [`error`]: the [`SchedulerError`] taxonomy
//!
//! ## Core Concepts
//!
//! A **pipeline** is a DAG of typed steps joined by data-transmission
//! connections and typed dependencies. Asynchronous dependencies express
//! streaming: the dependent consumes the prerequisite's outputs while it
//! still runs, which both co-places the two steps in one execution level and
//! makes the dependent *scalable* into concurrent replicas.
//!
//! A **dry run** records how each step behaved on a concrete resource under
//! a known total pipeline input volume. The estimators regress over those
//! samples to predict timing and hardware needs at the target volume.
//!
//! A **timeline** is one candidate schedule: events binding steps to start
//! positions and capacity reservations on resources, with availability,
//! synchronization and cost queries used by the search.

pub mod entities;
pub mod error;
pub mod services;
pub mod value_objects;

pub use error::SchedulerError;

pub use entities::{
    price_for_reserved_seconds, BillingModel, ComputingResource, DataTransmissionConnection,
    DependencyKind, DryRun, NetworkGraph, Pipeline, PipelineStep, PipelineStepDependency,
    PriceModel, SchedulingEvent, StepDryRunResult, StepKind, Timeline, ZonalTransferPricing,
};
pub use services::{
    ContextAwareStepTimelineEstimator, StepHardwareRequirementsEstimator, StepTimelineEstimator,
};
pub use value_objects::{
    ResourceReservation, StepExecutionTimeline, StepHardwareRequirementsEstimation,
    StepTimelineEstimation,
};

// /////////////////////////////////////////////////////////////////////////////
// Pipeline Scheduler RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Domain entities: objects with identity that the scheduler reasons about.
//!
//! - [`Pipeline`]: the DAG of steps, connections and typed dependencies
//! - [`PipelineStep`]: one node of the DAG, identified by name
//! - [`ComputingResource`]: one node of the resource pool, identified by name
//! - [`NetworkGraph`]: bandwidth-weighted connectivity between resources
//! - [`DryRun`]: measurements from one recorded pipeline execution
//! - [`Timeline`]: the ordered scheduling events of one candidate schedule

pub mod computing_resource;
pub mod dry_run;
pub mod network_graph;
pub mod pipeline;
pub mod pipeline_step;
pub mod timeline;

pub use computing_resource::{
    price_for_reserved_seconds, BillingModel, ComputingResource, PriceModel, ZonalTransferPricing,
};
pub use dry_run::{DryRun, StepDryRunResult};
pub use network_graph::NetworkGraph;
pub use pipeline::{
    DataTransmissionConnection, DependencyKind, Pipeline, PipelineStepDependency,
};
pub use pipeline_step::{PipelineStep, StepKind};
pub use timeline::{SchedulingEvent, Timeline};

// /////////////////////////////////////////////////////////////////////////////
// Pipeline Scheduler RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Pipeline Step Entity
//!
//! A pipeline step is one node of the data-processing DAG. Steps form a
//! closed variant set, modeled as a tagged enum rather than a class
//! hierarchy so the estimation and timeline-insertion sites can switch on
//! the kind exhaustively.
//!
//! ## Variants
//!
//! - `DataSource`: produces outputs; no inputs; no processing cost
//! - `DataSink`: consumes inputs; no outputs
//! - `Batch`: single input batch processed into a single output batch
//! - `Producer`: single input producing many outputs incrementally
//! - `Consumer`: many inputs from an upstream producer, many outputs
//!
//! Step identity is the name, unique within a pipeline. Two step values with
//! the same name refer to the same step even across copies of a pipeline.

use serde::{Deserialize, Serialize};

/// The closed set of step variants a pipeline can contain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    DataSource,
    DataSink,
    Batch,
    Producer,
    Consumer,
}

impl StepKind {
    /// Returns true for the data-processing variants (batch, producer,
    /// consumer). Sources and sinks only move data.
    pub fn is_data_processing(&self) -> bool {
        matches!(self, StepKind::Batch | StepKind::Producer | StepKind::Consumer)
    }
}

/// One step of a data-processing pipeline, identified by name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PipelineStep {
    name: String,
    kind: StepKind,
}

impl PipelineStep {
    /// Creates a step with an explicit kind.
    pub fn new(name: impl Into<String>, kind: StepKind) -> Self {
        PipelineStep { name: name.into(), kind }
    }

    /// Creates a data source step
    pub fn data_source(name: impl Into<String>) -> Self {
        Self::new(name, StepKind::DataSource)
    }

    /// Creates a data sink step
    pub fn data_sink(name: impl Into<String>) -> Self {
        Self::new(name, StepKind::DataSink)
    }

    /// Creates a batch processing step
    pub fn batch(name: impl Into<String>) -> Self {
        Self::new(name, StepKind::Batch)
    }

    /// Creates a producer step
    pub fn producer(name: impl Into<String>) -> Self {
        Self::new(name, StepKind::Producer)
    }

    /// Creates a consumer step
    pub fn consumer(name: impl Into<String>) -> Self {
        Self::new(name, StepKind::Consumer)
    }

    /// The step name (identity within a pipeline)
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The step variant
    pub fn kind(&self) -> StepKind {
        self.kind
    }

    /// Checks whether this step and another refer to the same pipeline step.
    ///
    /// Use when comparing against copies of the same step instance.
    pub fn same_as(&self, other: &PipelineStep) -> bool {
        self.name == other.name
    }

    /// Returns true for batch, producer and consumer steps
    pub fn is_data_processing(&self) -> bool {
        self.kind.is_data_processing()
    }
}

impl std::fmt::Display for PipelineStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({:?})", self.name, self.kind)
    }
}

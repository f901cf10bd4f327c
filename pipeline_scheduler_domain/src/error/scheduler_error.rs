// /////////////////////////////////////////////////////////////////////////////
// Pipeline Scheduler RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Domain Error System
//!
//! This module provides the error system for the pipeline scheduler domain.
//! Failures are categorized so callers can distinguish fatal model invariant
//! violations (cycles, malformed connections, negative durations) from
//! recoverable, placement-local estimation gaps.
//!
//! ## Error Categories
//!
//! - **Configuration**: malformed or missing configuration settings
//! - **Model invariants**: cycle creation, invalid connections, negative time
//!   fields. These are programmer errors and surface immediately.
//! - **Estimation gaps**: no dry-run samples for a (step, resource) pair, or
//!   missing bandwidth between two resources. Recoverable and local: the
//!   affected placement is dropped from the candidate set.
//! - **Infrastructure**: I/O and CSV decoding failures raised by the
//!   application layer while loading catalogs and corpora.
//!
//! Nothing is retried; failures are data-dependent, not transient.

use thiserror::Error;

/// Domain-specific errors for the pipeline placement scheduler.
///
/// Each variant carries a descriptive message. Variants are grouped by
/// category for systematic handling; see [`SchedulerError::category`].
#[derive(Error, Debug, Clone)]
pub enum SchedulerError {
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Invalid connection: {0}")]
    InvalidConnection(String),

    #[error("Dependency cycle: {0}")]
    DependencyCycle(String),

    #[error("Invalid timeline: {0}")]
    InvalidTimeline(String),

    #[error("Step not found: {0}")]
    StepNotFound(String),

    #[error("Resource not found: {0}")]
    ResourceNotFound(String),

    #[error("Estimation failed: {0}")]
    EstimationFailed(String),

    #[error("Missing bandwidth: {0}")]
    MissingBandwidth(String),

    #[error("IO error: {0}")]
    IoError(String),

    #[error("CSV error: {0}")]
    CsvError(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl SchedulerError {
    /// Creates a new configuration error
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfiguration(msg.into())
    }

    /// Creates a new connection error
    pub fn invalid_connection(msg: impl Into<String>) -> Self {
        Self::InvalidConnection(msg.into())
    }

    /// Creates a new dependency-cycle error
    pub fn dependency_cycle(msg: impl Into<String>) -> Self {
        Self::DependencyCycle(msg.into())
    }

    /// Creates a new invalid-timeline error
    pub fn invalid_timeline(msg: impl Into<String>) -> Self {
        Self::InvalidTimeline(msg.into())
    }

    /// Creates a new estimation-failure error
    pub fn estimation_failed(msg: impl Into<String>) -> Self {
        Self::EstimationFailed(msg.into())
    }

    /// Creates a new internal error
    pub fn internal_error(msg: impl Into<String>) -> Self {
        Self::InternalError(msg.into())
    }

    /// Checks if the error is recoverable.
    ///
    /// Estimation gaps and missing bandwidth only invalidate a single
    /// candidate placement; the search continues without it.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            SchedulerError::EstimationFailed(_) | SchedulerError::MissingBandwidth(_)
        )
    }

    /// Gets the error category
    pub fn category(&self) -> &'static str {
        match self {
            SchedulerError::InvalidConfiguration(_) => "configuration",
            SchedulerError::InvalidConnection(_) => "model",
            SchedulerError::DependencyCycle(_) => "model",
            SchedulerError::InvalidTimeline(_) => "model",
            SchedulerError::StepNotFound(_) => "model",
            SchedulerError::ResourceNotFound(_) => "model",
            SchedulerError::EstimationFailed(_) => "estimation",
            SchedulerError::MissingBandwidth(_) => "estimation",
            SchedulerError::IoError(_) => "io",
            SchedulerError::CsvError(_) => "io",
            SchedulerError::InternalError(_) => "internal",
        }
    }
}

impl From<std::io::Error> for SchedulerError {
    fn from(err: std::io::Error) -> Self {
        SchedulerError::IoError(err.to_string())
    }
}

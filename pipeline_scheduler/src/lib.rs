// /////////////////////////////////////////////////////////////////////////////
// Pipeline Scheduler RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Pipeline Scheduler
//!
//! Application crate of the cost- and deadline-aware placement scheduler.
//! It layers the candidate-schedule search engine, CSV catalogs, TOML
//! configuration and the CLI on top of the pure domain crate.
//!
//! ## Layers
//!
//! - [`application`]: the per-level search engine
//!   ([`application::services::CandidateSchedule`]) and the scheduler façade
//!   ([`application::services::TimelineScheduler`])
//! - [`infrastructure`]: configuration, logging bootstrap, and the
//!   CSV-backed repositories for resources, dry runs and emitted timelines
//! - [`presentation`]: textual timeline rendering for the CLI

pub mod application;
pub mod infrastructure;
pub mod presentation;

pub use application::services::{
    CandidateSchedule, EstimationCatalog, ForcedDeployment, TimelineScheduler,
};

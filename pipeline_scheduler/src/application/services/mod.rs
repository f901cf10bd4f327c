// /////////////////////////////////////////////////////////////////////////////
// Pipeline Scheduler RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Application services.

pub mod candidate_schedule;
pub mod estimation_catalog;
pub mod timeline_scheduler;

pub use candidate_schedule::{CandidateSchedule, ForcedDeployment};
pub use estimation_catalog::EstimationCatalog;
pub use timeline_scheduler::{TimelineScheduler, DEFAULT_WORKER_THREADS};

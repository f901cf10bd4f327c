// /////////////////////////////////////////////////////////////////////////////
// Pipeline Scheduler RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! CSV-backed repositories for the resource catalog, the dry-run corpus and
//! the emitted timelines.

pub mod dry_run_repository;
pub mod resource_catalog;
pub mod timeline_csv;

pub use dry_run_repository::load_dry_runs;
pub use resource_catalog::{load_resource_catalog, ResourceCatalog};
pub use timeline_csv::{read_timeline_csv, timeline_csv_file_name, write_timeline_csv};

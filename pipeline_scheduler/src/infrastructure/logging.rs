// /////////////////////////////////////////////////////////////////////////////
// Pipeline Scheduler RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Structured logging bootstrap. The level defaults to `info` (`debug` with
//! `--verbose`) and can be overridden through the
//! `PIPELINE_SCHEDULER_LOG_LEVEL` environment variable using the usual
//! `tracing` filter syntax.

use tracing_subscriber::EnvFilter;

const LOG_LEVEL_ENV: &str = "PIPELINE_SCHEDULER_LOG_LEVEL";

/// Installs the global subscriber. Call once, early in `main`.
pub fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_env(LOG_LEVEL_ENV)
        .unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

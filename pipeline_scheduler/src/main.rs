// /////////////////////////////////////////////////////////////////////////////
// Pipeline Scheduler RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Pipeline Scheduler CLI
//!
//! Command-line entry point. Loads the TOML configuration, the resource
//! catalog and the dry-run corpus, then runs the placement scheduler once
//! per configured input volume and writes each resulting timeline to a CSV
//! file following the naming convention
//! `timeline_<prefix>_<timestamp>_deadline<d>_budget<b>_input<v>MB_maxscalability<k>.csv`.
//!
//! ## Usage
//!
//! ```bash
//! # Schedule with the defaults from scheduler.toml
//! pipeline_scheduler schedule --config scheduler.toml
//!
//! # Render each produced timeline to the terminal as well
//! pipeline_scheduler schedule --config scheduler.toml --display-timelines 1
//!
//! # Override the deadline for one run
//! PIPELINE_SCHEDULER_RUN__DEADLINE_SECONDS=600 \
//!     pipeline_scheduler schedule --config scheduler.toml
//! ```
//!
//! Configuration errors (missing files, malformed CSV, invalid pipeline
//! definitions) terminate with a non-zero exit code and a clear message; an
//! empty schedule is reported but is not an error.

use anyhow::{Context, Result};
use chrono::Local;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{info, warn};

use pipeline_scheduler::application::services::TimelineScheduler;
use pipeline_scheduler::infrastructure::config::SchedulerConfig;
use pipeline_scheduler::infrastructure::logging::init_logging;
use pipeline_scheduler::infrastructure::repositories::{
    load_dry_runs, load_resource_catalog, timeline_csv_file_name, write_timeline_csv,
};
use pipeline_scheduler::presentation::render_timeline;
use pipeline_scheduler_domain::ZonalTransferPricing;

#[derive(Parser)]
#[command(name = "pipeline_scheduler")]
#[command(about = "Cost- and deadline-aware placement scheduler for data-processing pipelines")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute placement schedules for the configured pipeline
    Schedule {
        /// Configuration file path
        #[arg(short, long, default_value = "scheduler.toml")]
        config: PathBuf,

        /// Set to 1 to render each produced timeline to the terminal
        #[arg(long, default_value_t = 0)]
        display_timelines: u8,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Schedule {
            config,
            display_timelines,
        } => run_schedule(&config, display_timelines == 1),
    }
}

fn run_schedule(config_path: &PathBuf, display_timelines: bool) -> Result<()> {
    let config = SchedulerConfig::load(config_path)
        .with_context(|| format!("loading configuration from {}", config_path.display()))?;
    let pipeline = config
        .build_pipeline()
        .context("building the pipeline definition")?;

    let catalog = load_resource_catalog(
        &config.inputs.resources,
        &config.pipeline.unschedulable_resources,
    )
    .context("loading the resource catalog")?;
    info!(resources = catalog.resources.len(), "resource catalog loaded");

    let dry_runs = load_dry_runs(
        &config.inputs.step_metrics,
        &config.inputs.step_performance_metrics,
        &config.inputs.deployment_metrics,
        &pipeline,
        &catalog.network_graph,
        config.corpus.source_synthesis.as_ref(),
    )
    .context("loading the dry-run corpus")?;
    info!(dry_runs = dry_runs.len(), "dry-run corpus loaded");

    let forced_deployments = config
        .resolve_forced_deployments(&catalog.network_graph)
        .context("resolving forced deployments")?;

    let pricing = ZonalTransferPricing::default();
    let run = &config.run;

    for &input_volume_mb in &run.input_volumes_mb {
        let scheduler = TimelineScheduler::new(
            pipeline.clone(),
            catalog.network_graph.clone(),
            &dry_runs,
            run.deadline_seconds,
            run.budget_usd,
            input_volume_mb,
            forced_deployments.clone(),
            run.maximum_scalability,
        )
        .with_worker_threads(run.worker_threads);

        let timelines = scheduler
            .schedule()
            .with_context(|| format!("scheduling at input volume {input_volume_mb} MB"))?;
        if timelines.is_empty() {
            warn!(
                input_volume_mb,
                "no feasible schedule found, nothing written"
            );
            continue;
        }

        for timeline in &timelines {
            let file_name = timeline_csv_file_name(
                &run.output_prefix,
                Local::now(),
                run.deadline_seconds,
                run.budget_usd,
                input_volume_mb,
                run.maximum_scalability,
            );
            let path = run.output_directory.join(file_name);
            write_timeline_csv(timeline, &path)
                .with_context(|| format!("writing {}", path.display()))?;
            info!(path = %path.display(), events = timeline.events().len(), "timeline written");

            if display_timelines {
                println!("{}", render_timeline(timeline, &pricing));
            }
        }
    }

    Ok(())
}

// /////////////////////////////////////////////////////////////////////////////
// Pipeline Scheduler RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Timeline CSV Repository
//!
//! Serializes schedule timelines to CSV (one row per event, header
//! required) and rebuilds them for re-scoring. The rebuilt timeline carries
//! the positions, reservations, resource references and span durations; the
//! per-phase split and the transmission context are not part of the format.
//!
//! File naming convention:
//! `timeline_<prefix>_<timestamp>_deadline<d>_budget<b>_input<v>MB_maxscalability<k>.csv`

use chrono::{DateTime, Local};
use pipeline_scheduler_domain::{
    NetworkGraph, PipelineStep, ResourceReservation, SchedulerError, SchedulingEvent,
    StepExecutionTimeline, StepTimelineEstimation, Timeline,
};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Serialize, Deserialize)]
struct TimelineRow {
    #[serde(rename = "Step Name")]
    step_name: String,
    #[serde(rename = "Start Position")]
    start_position: f64,
    #[serde(rename = "End Position")]
    end_position: f64,
    #[serde(rename = "Resource Name")]
    resource_name: String,
    #[serde(rename = "Reserved CPU")]
    reserved_cpu: f64,
    #[serde(rename = "Reserved Memory")]
    reserved_memory: f64,
}

fn csv_error(path: &Path, error: impl std::fmt::Display) -> SchedulerError {
    SchedulerError::CsvError(format!("{}: {error}", path.display()))
}

/// Renders a number without a trailing `.0` for whole values, matching the
/// naming convention of the emitted files.
fn format_quantity(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}

/// The file name for a timeline produced under the given run parameters.
pub fn timeline_csv_file_name(
    prefix: &str,
    timestamp: DateTime<Local>,
    deadline_seconds: f64,
    budget_usd: f64,
    input_volume_mb: f64,
    maximum_scalability: Option<u32>,
) -> String {
    let scalability = maximum_scalability
        .map(|value| value.to_string())
        .unwrap_or_else(|| "unbounded".to_string());
    format!(
        "timeline_{prefix}_{}_deadline{}_budget{}_input{}MB_maxscalability{scalability}.csv",
        timestamp.format("%Y%m%d_%H%M%S"),
        format_quantity(deadline_seconds),
        format_quantity(budget_usd),
        format_quantity(input_volume_mb),
    )
}

/// Writes one row per event, with header.
pub fn write_timeline_csv(timeline: &Timeline, path: &Path) -> Result<(), SchedulerError> {
    let mut writer = csv::Writer::from_path(path).map_err(|error| csv_error(path, error))?;
    for event in timeline.events() {
        writer
            .serialize(TimelineRow {
                step_name: event.step_name().to_string(),
                start_position: event.position(),
                end_position: event.end_position(),
                resource_name: event.resource().name().to_string(),
                reserved_cpu: event.reservation().reserved_cpu(),
                reserved_memory: event.reservation().reserved_memory(),
            })
            .map_err(|error| csv_error(path, error))?;
    }
    writer.flush().map_err(|error| csv_error(path, error))?;
    Ok(())
}

/// Rebuilds a timeline from a CSV file, resolving resource references
/// against the loaded catalog. Each row becomes an event whose span covers
/// the serialized positions.
pub fn read_timeline_csv(
    path: &Path,
    network_graph: &NetworkGraph,
) -> Result<Timeline, SchedulerError> {
    let mut reader = csv::Reader::from_path(path).map_err(|error| csv_error(path, error))?;
    let mut timeline = Timeline::new();
    for record in reader.deserialize() {
        let row: TimelineRow = record.map_err(|error| csv_error(path, error))?;
        let resource = network_graph
            .find_resource_by_name(&row.resource_name)
            .ok_or_else(|| {
                SchedulerError::ResourceNotFound(format!(
                    "timeline references unknown resource '{}'",
                    row.resource_name
                ))
            })?;
        let span = StepExecutionTimeline::batch(
            0.0,
            0.0,
            (row.end_position - row.start_position).max(0.0),
        )?;
        let estimation = StepTimelineEstimation::new(
            0.0,
            PipelineStep::batch(&row.step_name),
            resource.clone(),
            span,
        );
        timeline.add_event(SchedulingEvent::new(
            row.start_position,
            ResourceReservation::new(resource, row.reserved_cpu, row.reserved_memory),
            estimation,
        ));
    }
    Ok(timeline)
}

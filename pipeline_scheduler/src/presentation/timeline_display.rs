// /////////////////////////////////////////////////////////////////////////////
// Pipeline Scheduler RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Timeline Display
//!
//! Textual Gantt rendering of a schedule timeline for the
//! `--display-timelines` flag. One bar per event, split into the
//! provisioning (`#`), transmission (`>`) and processing (`=`) phases, with
//! a totals footer. The scheduling core never depends on this module.

use pipeline_scheduler_domain::{PriceModel, Timeline};
use std::fmt::Write;

const BAR_WIDTH: usize = 60;

/// Renders a timeline as a multi-line string.
pub fn render_timeline(timeline: &Timeline, pricing: &dyn PriceModel) -> String {
    let total_time = timeline.total_time();
    let scale = if total_time > 0.0 {
        BAR_WIDTH as f64 / total_time
    } else {
        0.0
    };

    let name_width = timeline
        .events()
        .iter()
        .map(|event| event.step_name().len())
        .max()
        .unwrap_or(4)
        .max(4);

    let mut output = String::new();
    for event in timeline.events() {
        let estimation = event.estimation().timeline();
        let offset = (event.position() * scale).round() as usize;
        let provisioning =
            (estimation.provisioning_and_deployment_time() * scale).round() as usize;
        let transmission = (estimation.data_transmission_time() * scale).round() as usize;
        let processing = (estimation.step_processing_time() * scale).round() as usize;

        let mut bar = String::new();
        bar.push_str(&" ".repeat(offset.min(BAR_WIDTH)));
        bar.push_str(&"#".repeat(provisioning));
        bar.push_str(&">".repeat(transmission));
        bar.push_str(&"=".repeat(processing.max(
            // Keep zero-length events visible
            usize::from(provisioning + transmission == 0),
        )));

        let _ = writeln!(
            output,
            "{:<name_width$} {:<12} [{:>9.2} - {:>9.2}] cpu {:>6.1}% mem {:>8.1} MB  {}",
            event.step_name(),
            event.resource().name(),
            event.position(),
            event.end_position(),
            event.reservation().reserved_cpu(),
            event.reservation().reserved_memory(),
            bar,
        );
    }

    let resource_cost = timeline.resource_cost();
    let transmission_cost = timeline.data_transmission_cost(pricing);
    let _ = writeln!(
        output,
        "total time: {total_time:.2} s, resource cost: {resource_cost:.4} USD, transmission cost: {transmission_cost:.4} USD"
    );
    output
}

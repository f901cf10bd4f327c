// /////////////////////////////////////////////////////////////////////////////
// Pipeline Scheduler RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Timeline Entity
//!
//! A timeline is an ordered list of scheduling events, each binding a
//! pipeline step to a start position (seconds from t = 0), a resource
//! reservation, and the step's estimated execution timeline.
//!
//! ## Invariants
//!
//! - Events are kept sorted by (position, step name); the order is stable
//!   and deterministic.
//! - Positions never go negative: inserting an event at a negative position
//!   shifts the whole timeline right instead.
//! - At any instant, the reservations active on one resource fit within its
//!   CPU (num_cpus × 100 percent) and memory (RAM × 1024 MiB) capacity;
//!   [`Timeline::earliest_available_position`] is the query the scheduler
//!   uses to maintain this.
//!
//! ## Cost queries
//!
//! All cost computations are pure: reservation cost rounds each resource's
//! cumulative reserved seconds up to full hours, and transmission cost prices
//! every event with a previous resource through a [`PriceModel`]. No catalog
//! state is mutated, so worker threads can score copies concurrently.

use crate::entities::computing_resource::{ComputingResource, PriceModel};
use crate::entities::pipeline_step::{PipelineStep, StepKind};
use crate::value_objects::resource_reservation::ResourceReservation;
use crate::value_objects::step_estimation::StepTimelineEstimation;
use std::collections::BTreeMap;
use std::sync::Arc;

/// One placement decision: a step starts at `position` on the reserved
/// resource with the estimated timeline.
#[derive(Debug, Clone, PartialEq)]
pub struct SchedulingEvent {
    position: f64,
    reservation: ResourceReservation,
    estimation: StepTimelineEstimation,
}

impl SchedulingEvent {
    pub fn new(
        position: f64,
        reservation: ResourceReservation,
        estimation: StepTimelineEstimation,
    ) -> Self {
        SchedulingEvent {
            position,
            reservation,
            estimation,
        }
    }

    /// Start position in seconds from t = 0
    pub fn position(&self) -> f64 {
        self.position
    }

    /// End position: start plus the estimated total time
    pub fn end_position(&self) -> f64 {
        self.position + self.estimation.timeline().total_time()
    }

    pub fn reservation(&self) -> &ResourceReservation {
        &self.reservation
    }

    pub fn estimation(&self) -> &StepTimelineEstimation {
        &self.estimation
    }

    /// The scheduled step's name
    pub fn step_name(&self) -> &str {
        self.estimation.step().name()
    }

    /// The resource the event reserves
    pub fn resource(&self) -> &Arc<ComputingResource> {
        self.reservation.resource()
    }

    /// True when the event overlaps the half-open window [start, end)
    pub fn is_active_within(&self, start: f64, end: f64) -> bool {
        self.position < end && self.end_position() > start
    }

    /// True when the event is running at the given instant
    pub fn is_active_at(&self, position: f64) -> bool {
        self.position <= position && position < self.end_position()
    }
}

/// Ordered set of scheduling events with availability, synchronization and
/// cost queries.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Timeline {
    events: Vec<SchedulingEvent>,
}

impl Timeline {
    /// Creates an empty timeline
    pub fn new() -> Self {
        Timeline::default()
    }

    /// The events, sorted by (position, step name)
    pub fn events(&self) -> &[SchedulingEvent] {
        &self.events
    }

    /// Inserts an event, shifting the whole timeline right when the position
    /// is negative so that t never goes below zero, then restores the sort
    /// order.
    pub fn add_event(&mut self, event: SchedulingEvent) {
        let position = event.position;
        self.events.push(event);
        if position < 0.0 {
            self.shift(-position);
        }
        self.sort_events();
    }

    /// Removes the first event equal to the given one.
    pub fn remove_event(&mut self, event: &SchedulingEvent) {
        if let Some(index) = self.events.iter().position(|e| e == event) {
            self.events.remove(index);
            self.sort_events();
        }
    }

    /// Replaces an existing event with another, keeping the sort order.
    pub fn replace_event(&mut self, old: &SchedulingEvent, new: SchedulingEvent) {
        if let Some(index) = self.events.iter().position(|e| e == old) {
            self.events[index] = new;
            self.sort_events();
        }
    }

    /// Shifts every event by the given amount of seconds.
    pub fn shift(&mut self, amount: f64) {
        for event in &mut self.events {
            event.position += amount;
        }
    }

    fn sort_events(&mut self) {
        self.events.sort_by(|a, b| {
            a.position
                .total_cmp(&b.position)
                .then_with(|| a.step_name().cmp(b.step_name()))
        });
    }

    /// The earliest position at or after `position` where `resource` has
    /// enough free CPU and memory for the whole `[start, start + duration)`
    /// window.
    ///
    /// Candidate start times are the requested position plus the boundaries
    /// of the events active in the window; the first candidate whose window
    /// fits is returned. When no candidate fits, the last one is returned:
    /// it lies after every active event ends, where the resource is free
    /// (the timeline may then exceed the deadline; scoring reflects that and
    /// callers validate).
    pub fn earliest_available_position(
        &self,
        position: f64,
        duration: f64,
        resource: &ComputingResource,
        required_memory_reservation: f64,
        required_cpu_reservation: f64,
    ) -> f64 {
        let resource_events: Vec<&SchedulingEvent> = self
            .events
            .iter()
            .filter(|event| event.resource().name() == resource.name())
            .collect();
        if resource_events.is_empty() {
            return position;
        }

        // Candidate starts: the requested position, the starts of events
        // conflicting with the probe window, and every event end after the
        // position. Keeping all later ends guarantees the scan terminates on
        // a genuinely free slot: nothing is active past the latest end.
        let mut candidates: Vec<f64> = vec![position];
        for event in &resource_events {
            let event_end = event.end_position();
            if position < event.position
                && event.position < position + duration
                && !candidates.iter().any(|c| *c == event.position)
            {
                candidates.push(event.position);
            }
            if position < event_end && !candidates.iter().any(|c| *c == event_end) {
                candidates.push(event_end);
            }
        }
        candidates.sort_by(f64::total_cmp);

        if candidates.len() == 1 {
            return position;
        }

        let available_memory = resource.memory_capacity_mib();
        let available_cpu = resource.cpu_capacity_percent();
        for &candidate in &candidates {
            let mut reserved_memory = 0.0;
            let mut reserved_cpu = 0.0;
            for event in &resource_events {
                if event.is_active_within(candidate, candidate + duration) {
                    reserved_memory += event.reservation.reserved_memory();
                    reserved_cpu += event.reservation.reserved_cpu();
                }
            }
            if available_memory - reserved_memory < required_memory_reservation
                || available_cpu - reserved_cpu < required_cpu_reservation
            {
                continue;
            }
            return candidate;
        }

        // Past the last boundary the resource is always free
        candidates.last().copied().unwrap_or(position)
    }

    /// The resource the step was (last) scheduled on.
    pub fn scheduled_resource_of_step(&self, step: &PipelineStep) -> Option<Arc<ComputingResource>> {
        self.events
            .iter()
            .filter(|event| event.estimation.step().same_as(step))
            .last()
            .map(|event| event.resource().clone())
    }

    /// The latest finish position among the step's events, or 0 when the
    /// step is not scheduled.
    pub fn step_end_position(&self, step: &PipelineStep) -> f64 {
        self.events
            .iter()
            .filter(|event| event.estimation.step().same_as(step))
            .map(|event| event.end_position())
            .fold(0.0, f64::max)
    }

    /// The instant at which a downstream step may start consuming from
    /// `step`.
    ///
    /// A producer synchronizes per emitted output: the k-th consumer
    /// instance may start once the producer has emitted k outputs, at
    /// `position + provisioning + transmission + k × avg_time_per_output`.
    /// Every other kind synchronizes at its finish position.
    pub fn step_synchronization_position(&self, step: &PipelineStep, scale_level: u32) -> f64 {
        if step.kind() != StepKind::Producer {
            return self.step_end_position(step);
        }
        self.events
            .iter()
            .filter(|event| event.estimation.step().same_as(step))
            .filter_map(|event| {
                let timeline = event.estimation.timeline();
                timeline.average_time_to_produce_output().map(|avg| {
                    event.position
                        + timeline.provisioning_and_deployment_time()
                        + timeline.data_transmission_time()
                        + f64::from(scale_level) * avg
                })
            })
            .fold(0.0, f64::max)
    }

    /// The step with the latest finish among the given ones; ties resolve
    /// to the greater step name so the choice is deterministic.
    pub fn step_with_latest_finish(&self, steps: &[PipelineStep]) -> Option<PipelineStep> {
        let mut latest: Option<(f64, PipelineStep)> = None;
        for event in &self.events {
            if !steps.iter().any(|step| event.estimation.step().same_as(step)) {
                continue;
            }
            let finish = event.end_position();
            let replace = match &latest {
                None => true,
                Some((best_finish, best_step)) => {
                    finish > *best_finish
                        || (finish == *best_finish
                            && event.step_name() >= best_step.name())
                }
            };
            if replace {
                latest = Some((finish, event.estimation.step().clone()));
            }
        }
        latest.map(|(_, step)| step)
    }

    /// All events of the given step, in timeline order.
    pub fn events_of_step(&self, step: &PipelineStep) -> Vec<&SchedulingEvent> {
        self.events
            .iter()
            .filter(|event| event.estimation.step().same_as(step))
            .collect()
    }

    /// All events reserving the given resource.
    pub fn events_of_resource(&self, resource: &ComputingResource) -> Vec<&SchedulingEvent> {
        self.events
            .iter()
            .filter(|event| event.resource().name() == resource.name())
            .collect()
    }

    /// The finish position of the latest-ending event.
    pub fn total_time(&self) -> f64 {
        self.events
            .iter()
            .map(|event| event.end_position())
            .fold(0.0, f64::max)
    }

    /// The reservation cost of the timeline: per resource, the cumulative
    /// reserved seconds rounded up to full hours at the on-demand rate.
    /// Resources are visited in name order so the summation is
    /// deterministic.
    pub fn resource_cost(&self) -> f64 {
        let mut reserved_seconds: BTreeMap<&str, (&Arc<ComputingResource>, f64)> = BTreeMap::new();
        for event in &self.events {
            let entry = reserved_seconds
                .entry(event.resource().name())
                .or_insert((event.resource(), 0.0));
            entry.1 += event.estimation.timeline().total_time();
        }
        reserved_seconds
            .values()
            .map(|(resource, seconds)| resource.price_for_reservation(*seconds))
            .sum()
    }

    /// The data-transmission cost of the timeline: every event that received
    /// its input from a previous resource is charged egress out of that
    /// resource's zone and ingress into its own, on the estimation's input
    /// volume. Only on-demand-billed endpoints charge.
    pub fn data_transmission_cost(&self, pricing: &dyn PriceModel) -> f64 {
        let mut total = 0.0;
        for event in &self.events {
            let estimation = &event.estimation;
            let Some(previous) = estimation.previous_resource() else {
                continue;
            };
            let current = estimation.resource();
            let gigabytes = estimation.input_volume_mb() / 1024.0;
            let price = pricing.price_to_transmit(
                previous.availability_zone(),
                current.availability_zone(),
                gigabytes,
            );
            if previous.is_on_demand() {
                total += price;
            }
            if current.is_on_demand() {
                total += price;
            }
        }
        total
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::computing_resource::ZonalTransferPricing;
    use crate::value_objects::step_execution_timeline::StepExecutionTimeline;

    fn resource() -> Arc<ComputingResource> {
        // 4 CPUs = 400 percent, 8 GiB = 8192 MiB
        Arc::new(ComputingResource::new_free("node", 4, 2.4, 8.0))
    }

    fn batch_event(
        name: &str,
        position: f64,
        duration: f64,
        cpu: f64,
        memory: f64,
        resource: &Arc<ComputingResource>,
    ) -> SchedulingEvent {
        let timeline = StepExecutionTimeline::batch(0.0, 0.0, duration).unwrap();
        let estimation = StepTimelineEstimation::new(
            100.0,
            PipelineStep::batch(name),
            resource.clone(),
            timeline,
        );
        SchedulingEvent::new(
            position,
            ResourceReservation::new(resource.clone(), cpu, memory),
            estimation,
        )
    }

    #[test]
    fn test_events_sorted_by_position_then_name() {
        let node = resource();
        let mut timeline = Timeline::new();
        timeline.add_event(batch_event("b", 5.0, 1.0, 10.0, 100.0, &node));
        timeline.add_event(batch_event("a", 5.0, 1.0, 10.0, 100.0, &node));
        timeline.add_event(batch_event("c", 1.0, 1.0, 10.0, 100.0, &node));

        let names: Vec<&str> = timeline.events().iter().map(|e| e.step_name()).collect();
        assert_eq!(names, vec!["c", "a", "b"]);
    }

    #[test]
    fn test_negative_insert_shifts_timeline() {
        let node = resource();
        let mut timeline = Timeline::new();
        timeline.add_event(batch_event("a", 3.0, 1.0, 10.0, 100.0, &node));
        timeline.add_event(batch_event("early", -2.0, 1.0, 10.0, 100.0, &node));

        assert_eq!(timeline.events()[0].position(), 0.0);
        assert_eq!(timeline.events()[0].step_name(), "early");
        assert_eq!(timeline.events()[1].position(), 5.0);
    }

    #[test]
    fn test_remove_and_replace_keep_order() {
        let node = resource();
        let mut timeline = Timeline::new();
        timeline.add_event(batch_event("a", 0.0, 2.0, 10.0, 100.0, &node));
        let original = batch_event("b", 5.0, 2.0, 10.0, 100.0, &node);
        timeline.add_event(original.clone());

        let replacement = batch_event("b", 1.0, 2.0, 10.0, 100.0, &node);
        timeline.replace_event(&original, replacement.clone());
        let names: Vec<&str> = timeline.events().iter().map(|e| e.step_name()).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(timeline.events()[1].position(), 1.0);

        timeline.remove_event(&replacement);
        assert_eq!(timeline.events().len(), 1);
    }

    #[test]
    fn test_earliest_position_on_empty_resource() {
        let node = resource();
        let timeline = Timeline::new();
        assert_eq!(
            timeline.earliest_available_position(7.5, 10.0, &node, 100.0, 10.0),
            7.5
        );
    }

    #[test]
    fn test_earliest_position_fits_beside_existing_event() {
        let node = resource();
        let mut timeline = Timeline::new();
        // Occupies half the CPU in [0, 10)
        timeline.add_event(batch_event("busy", 0.0, 10.0, 200.0, 1000.0, &node));

        // A small request fits immediately
        assert_eq!(
            timeline.earliest_available_position(0.0, 5.0, &node, 1000.0, 100.0),
            0.0
        );
        // A request needing more CPU than remains waits for the event end
        assert_eq!(
            timeline.earliest_available_position(0.0, 5.0, &node, 1000.0, 300.0),
            10.0
        );
    }

    #[test]
    fn test_earliest_position_falls_back_to_tail() {
        let node = resource();
        let mut timeline = Timeline::new();
        timeline.add_event(batch_event("one", 0.0, 4.0, 400.0, 8192.0, &node));
        timeline.add_event(batch_event("two", 4.0, 4.0, 400.0, 8192.0, &node));

        // Nothing fits while either event runs; the tail is always free
        let position = timeline.earliest_available_position(0.0, 2.0, &node, 1.0, 1.0);
        assert_eq!(position, 8.0);
    }

    #[test]
    fn test_producer_synchronization_position() {
        let node = resource();
        let timeline_estimation = StepExecutionTimeline::producer(1.0, 2.0, 2.0, 10).unwrap();
        let producer = PipelineStep::producer("slicer");
        let estimation = StepTimelineEstimation::new(
            100.0,
            producer.clone(),
            node.clone(),
            timeline_estimation,
        );
        let mut timeline = Timeline::new();
        timeline.add_event(SchedulingEvent::new(
            5.0,
            ResourceReservation::new(node.clone(), 10.0, 100.0),
            estimation,
        ));

        // k-th instance starts after k per-output slices
        assert_eq!(timeline.step_synchronization_position(&producer, 1), 10.0);
        assert_eq!(timeline.step_synchronization_position(&producer, 3), 14.0);
        // Non-producers synchronize at their finish position
        let batch = PipelineStep::batch("other");
        assert_eq!(timeline.step_synchronization_position(&batch, 1), 0.0);
    }

    #[test]
    fn test_latest_finish_breaks_ties_by_name() {
        let node = resource();
        let mut timeline = Timeline::new();
        timeline.add_event(batch_event("a", 0.0, 5.0, 10.0, 100.0, &node));
        timeline.add_event(batch_event("b", 0.0, 5.0, 10.0, 100.0, &node));

        let steps = vec![PipelineStep::batch("a"), PipelineStep::batch("b")];
        let latest = timeline.step_with_latest_finish(&steps).unwrap();
        assert_eq!(latest.name(), "b");
    }

    #[test]
    fn test_resource_cost_rounds_reserved_hours() {
        let cloud = Arc::new(ComputingResource::new_on_demand(
            "m5", 4, 2.5, 8.0, "eu-west-1a", 0.2,
        ));
        let mut timeline = Timeline::new();
        timeline.add_event(batch_event("a", 0.0, 1800.0, 10.0, 100.0, &cloud));
        timeline.add_event(batch_event("b", 1800.0, 1801.0, 10.0, 100.0, &cloud));

        // 3601 reserved seconds round up to 2 hours
        assert!((timeline.resource_cost() - 0.4).abs() < 1e-12);
    }

    #[test]
    fn test_transmission_cost_charges_both_billed_endpoints() {
        let src = Arc::new(ComputingResource::new_on_demand(
            "src", 4, 2.5, 8.0, "eu-west-1a", 0.2,
        ));
        let dst = Arc::new(ComputingResource::new_on_demand(
            "dst", 4, 2.5, 8.0, "eu-west-1b", 0.2,
        ));
        let timeline_estimation = StepExecutionTimeline::batch(0.0, 1.0, 2.0).unwrap();
        let estimation = StepTimelineEstimation::new(
            1024.0,
            PipelineStep::batch("a"),
            dst.clone(),
            timeline_estimation,
        )
        .with_previous_resource(src.clone());
        let mut timeline = Timeline::new();
        timeline.add_event(SchedulingEvent::new(
            0.0,
            ResourceReservation::new(dst.clone(), 10.0, 100.0),
            estimation,
        ));

        // 1 GB across zones of one region: 0.02 charged at each endpoint
        let pricing = ZonalTransferPricing::default();
        assert!((timeline.data_transmission_cost(&pricing) - 0.04).abs() < 1e-12);
    }

    #[test]
    fn test_total_time_is_latest_finish() {
        let node = resource();
        let mut timeline = Timeline::new();
        timeline.add_event(batch_event("a", 0.0, 10.0, 10.0, 100.0, &node));
        timeline.add_event(batch_event("b", 2.0, 3.0, 10.0, 100.0, &node));
        assert_eq!(timeline.total_time(), 10.0);
    }
}

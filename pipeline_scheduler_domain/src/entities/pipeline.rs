// /////////////////////////////////////////////////////////////////////////////
// Pipeline Scheduler RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Pipeline Entity
//!
//! The `Pipeline` entity is the DAG of data-processing steps the scheduler
//! places onto computing resources. It holds three collections:
//!
//! - **Steps**: the nodes, unique by name (see
//!   [`PipelineStep`](crate::entities::PipelineStep))
//! - **Connections**: directed data-transmission edges between steps
//! - **Dependencies**: directed, typed ordering constraints
//!   (prerequisite → dependent)
//!
//! ## Business Rules
//!
//! - The dependency graph is acyclic; every `add_dependency` call checks the
//!   candidate edge and rejects it without mutating the pipeline.
//! - A `DataSource` may only be the source of a connection, a `DataSink`
//!   only the target, and at least one endpoint must be data-processing.
//! - Adding a connection implicitly adds a synchronous dependency in the
//!   same direction.
//! - At most one dependency exists per ordered (prerequisite, dependent)
//!   pair; adding another replaces it.
//!
//! ## Level Decomposition
//!
//! [`Pipeline::split_into_levels`] partitions the steps into execution
//! levels with a modified breadth-first traversal: asynchronous dependencies
//! are intra-level (producer and its streaming consumer run concurrently)
//! while synchronous and simultaneous dependencies are inter-level barriers.
//! The decomposition is the single source of parallelism structure used by
//! the scheduler.

use crate::entities::pipeline_step::{PipelineStep, StepKind};
use crate::SchedulerError;
use serde::{Deserialize, Serialize};
use std::collections::{HashSet, VecDeque};

/// The ordering semantics of a dependency between two steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DependencyKind {
    /// The dependent starts only after the prerequisite finished.
    Synchronous,
    /// The dependent streams from the prerequisite while it runs.
    Asynchronous,
    /// The dependent is co-scheduled with the prerequisite.
    Simultaneous,
}

/// A directed data-transmission edge between two pipeline steps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataTransmissionConnection {
    source: PipelineStep,
    target: PipelineStep,
}

impl DataTransmissionConnection {
    /// The step emitting the data
    pub fn source(&self) -> &PipelineStep {
        &self.source
    }

    /// The step receiving the data
    pub fn target(&self) -> &PipelineStep {
        &self.target
    }
}

/// A typed ordering constraint directed from prerequisite to dependent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineStepDependency {
    kind: DependencyKind,
    dependent: PipelineStep,
    prerequisite: PipelineStep,
}

impl PipelineStepDependency {
    /// The dependency semantics
    pub fn kind(&self) -> DependencyKind {
        self.kind
    }

    /// The step constrained by this dependency
    pub fn dependent(&self) -> &PipelineStep {
        &self.dependent
    }

    /// The step that must make progress first
    pub fn prerequisite(&self) -> &PipelineStep {
        &self.prerequisite
    }
}

/// A data-processing pipeline: steps, transmission connections and typed
/// dependencies.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Pipeline {
    steps: Vec<PipelineStep>,
    connections: Vec<DataTransmissionConnection>,
    dependencies: Vec<PipelineStepDependency>,
}

impl Pipeline {
    /// Creates an empty pipeline
    pub fn new() -> Self {
        Pipeline::default()
    }

    /// All registered steps, in registration order
    pub fn steps(&self) -> &[PipelineStep] {
        &self.steps
    }

    /// All data-transmission connections
    pub fn connections(&self) -> &[DataTransmissionConnection] {
        &self.connections
    }

    /// All dependencies
    pub fn dependencies(&self) -> &[PipelineStepDependency] {
        &self.dependencies
    }

    /// Looks up a step by name
    pub fn find_step_by_name(&self, name: &str) -> Option<&PipelineStep> {
        self.steps.iter().find(|step| step.name() == name)
    }

    /// Adds a data-transmission connection and the implied synchronous
    /// dependency from source to target.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::InvalidConnection`] when the endpoint
    /// variants violate the connection rules, and
    /// [`SchedulerError::DependencyCycle`] when the implied dependency would
    /// close a cycle. The pipeline is unchanged on failure.
    pub fn add_connection(
        &mut self,
        source: PipelineStep,
        target: PipelineStep,
    ) -> Result<(), SchedulerError> {
        if target.kind() == StepKind::DataSource {
            return Err(SchedulerError::invalid_connection(format!(
                "a data source cannot be the target of a connection: {}",
                target.name()
            )));
        }
        if source.kind() == StepKind::DataSink {
            return Err(SchedulerError::invalid_connection(format!(
                "a data sink cannot be the source of a connection: {}",
                source.name()
            )));
        }
        if !source.is_data_processing() && !target.is_data_processing() {
            return Err(SchedulerError::invalid_connection(format!(
                "at least one endpoint of {} -> {} must be a data-processing step",
                source.name(),
                target.name()
            )));
        }

        // Reject the implied dependency before mutating anything
        if self.would_create_cycle(&target, &source) {
            return Err(SchedulerError::dependency_cycle(format!(
                "connection {} -> {} would close a dependency cycle",
                source.name(),
                target.name()
            )));
        }

        self.register_step(&source)?;
        self.register_step(&target)?;
        self.connections.push(DataTransmissionConnection {
            source: source.clone(),
            target: target.clone(),
        });
        self.insert_dependency(DependencyKind::Synchronous, target, source);
        Ok(())
    }

    /// Adds a dependency between two steps, replacing any existing
    /// dependency between the same ordered pair.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::DependencyCycle`] when the edge would close
    /// a cycle in the dependency graph. The pipeline is unchanged on
    /// failure.
    pub fn add_dependency(
        &mut self,
        kind: DependencyKind,
        dependent: PipelineStep,
        prerequisite: PipelineStep,
    ) -> Result<(), SchedulerError> {
        if self.would_create_cycle(&dependent, &prerequisite) {
            return Err(SchedulerError::dependency_cycle(format!(
                "dependency {} -> {} would close a cycle in the dependency graph",
                prerequisite.name(),
                dependent.name()
            )));
        }
        self.register_step(&dependent)?;
        self.register_step(&prerequisite)?;
        self.insert_dependency(kind, dependent, prerequisite);
        Ok(())
    }

    /// Steps that the given step depends on (its prerequisites).
    pub fn steps_with_incoming_dependency(&self, target: &PipelineStep) -> Vec<PipelineStep> {
        self.dependencies
            .iter()
            .filter(|dep| dep.dependent.same_as(target))
            .map(|dep| dep.prerequisite.clone())
            .collect()
    }

    /// Steps with a data-transmission connection into the given step.
    pub fn steps_with_incoming_transmission(&self, target: &PipelineStep) -> Vec<PipelineStep> {
        self.connections
            .iter()
            .filter(|conn| conn.target.same_as(target))
            .map(|conn| conn.source.clone())
            .collect()
    }

    /// A step is scalable when it depends asynchronously on a producer: its
    /// instances can then be replicated to drain the producer's output
    /// stream concurrently.
    pub fn is_step_scalable(&self, step: &PipelineStep) -> bool {
        self.dependencies
            .iter()
            .any(|dep| dep.kind == DependencyKind::Asynchronous && dep.dependent.same_as(step))
    }

    /// The producer a scalable step streams from, when one exists.
    pub fn async_prerequisite_of(&self, step: &PipelineStep) -> Option<PipelineStep> {
        self.dependencies
            .iter()
            .find(|dep| dep.kind == DependencyKind::Asynchronous && dep.dependent.same_as(step))
            .map(|dep| dep.prerequisite.clone())
    }

    /// Splits the pipeline into execution levels.
    ///
    /// A modified breadth-first traversal over the dependency graph:
    ///
    /// 1. Steps without incoming dependencies seed level 0.
    /// 2. When a step is placed, any step depending on it asynchronously is
    ///    pulled into the same level, together with that step's own
    ///    unplaced prerequisites (a streaming consumer is co-placed with
    ///    everything it needs).
    /// 3. Synchronous and simultaneous dependents go to the next level.
    /// 4. Empty levels are discarded.
    ///
    /// The returned levels are in execution order.
    pub fn split_into_levels(&self) -> Vec<Vec<PipelineStep>> {
        let mut levels: Vec<Vec<PipelineStep>> = Vec::new();
        let mut visited: HashSet<String> = HashSet::new();
        let mut queue: VecDeque<(PipelineStep, usize)> = VecDeque::new();

        // Seed with the steps that depend on nothing
        for step in &self.steps {
            let has_incoming = self
                .dependencies
                .iter()
                .any(|dep| dep.dependent.same_as(step));
            if !has_incoming {
                queue.push_back((step.clone(), 0));
            }
        }

        while let Some((current, level)) = queue.pop_front() {
            if level == levels.len() {
                levels.push(Vec::new());
            }

            if !visited.contains(current.name()) {
                visited.insert(current.name().to_string());
                push_unique(&mut levels[level], current.clone());

                // Streaming consumers run in the same level as their producer
                let async_dependents: Vec<PipelineStep> = self
                    .dependencies
                    .iter()
                    .filter(|dep| {
                        dep.kind == DependencyKind::Asynchronous && dep.prerequisite.same_as(&current)
                    })
                    .map(|dep| dep.dependent.clone())
                    .collect();
                for dependent in async_dependents {
                    visited.insert(dependent.name().to_string());
                    push_unique(&mut levels[level], dependent.clone());
                    self.pull_in_prerequisites(&dependent, level, &mut levels, &mut visited, &mut queue);
                }
            }

            // Barrier dependencies advance to the next level
            for dep in &self.dependencies {
                if dep.kind != DependencyKind::Asynchronous
                    && dep.prerequisite.same_as(&current)
                    && !visited.contains(dep.dependent.name())
                {
                    queue.push_back((dep.dependent.clone(), level + 1));
                }
            }
        }

        levels.retain(|level| !level.is_empty());
        levels
    }

    /// Recursively co-places the unvisited prerequisites of an
    /// asynchronously pulled-in step, and queues its own dependents for the
    /// next level.
    fn pull_in_prerequisites(
        &self,
        step: &PipelineStep,
        level: usize,
        levels: &mut [Vec<PipelineStep>],
        visited: &mut HashSet<String>,
        queue: &mut VecDeque<(PipelineStep, usize)>,
    ) {
        for dep in &self.dependencies {
            if dep.dependent.same_as(step) && !visited.contains(dep.prerequisite.name()) {
                let prerequisite = dep.prerequisite.clone();
                visited.insert(prerequisite.name().to_string());
                push_unique(&mut levels[level], prerequisite.clone());
                self.pull_in_prerequisites(&prerequisite, level, levels, visited, queue);
            } else if !visited.contains(dep.dependent.name())
                && levels[level].iter().any(|s| s.same_as(&dep.prerequisite))
            {
                queue.push_back((dep.dependent.clone(), level + 1));
            }
        }
    }

    /// Walks upstream from `prerequisite` through the existing dependency
    /// edges; reaching `dependent` means the new edge would close a cycle.
    fn would_create_cycle(&self, dependent: &PipelineStep, prerequisite: &PipelineStep) -> bool {
        if dependent.same_as(prerequisite) {
            return true;
        }
        let mut stack: Vec<&PipelineStep> = vec![prerequisite];
        let mut seen: HashSet<&str> = HashSet::new();
        while let Some(step) = stack.pop() {
            if step.same_as(dependent) {
                return true;
            }
            if !seen.insert(step.name()) {
                continue;
            }
            for dep in &self.dependencies {
                if dep.dependent.same_as(step) {
                    stack.push(&dep.prerequisite);
                }
            }
        }
        false
    }

    fn register_step(&mut self, step: &PipelineStep) -> Result<(), SchedulerError> {
        match self.find_step_by_name(step.name()) {
            Some(existing) if existing.kind() != step.kind() => {
                Err(SchedulerError::invalid_config(format!(
                    "step name '{}' already registered with a different kind",
                    step.name()
                )))
            }
            Some(_) => Ok(()),
            None => {
                self.steps.push(step.clone());
                Ok(())
            }
        }
    }

    /// Replacement policy: at most one dependency per ordered pair.
    fn insert_dependency(
        &mut self,
        kind: DependencyKind,
        dependent: PipelineStep,
        prerequisite: PipelineStep,
    ) {
        self.dependencies.retain(|dep| {
            !(dep.dependent.same_as(&dependent) && dep.prerequisite.same_as(&prerequisite))
        });
        self.dependencies.push(PipelineStepDependency {
            kind,
            dependent,
            prerequisite,
        });
    }
}

fn push_unique(level: &mut Vec<PipelineStep>, step: PipelineStep) {
    if !level.iter().any(|s| s.same_as(&step)) {
        level.push(step);
    }
}

// /////////////////////////////////////////////////////////////////////////////
// Pipeline Scheduler RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Step Execution Timeline Value Object
//!
//! The execution timeline of a single step: provisioning-and-deployment
//! time, data-transmission time, and a variant-specific form of processing
//! time, all in seconds. The variants mirror the step kinds:
//!
//! - `Source`: only provisioning
//! - `Sink`: provisioning plus per-input transmission
//! - `Batch`: a single processing duration
//! - `Producer`: average time per produced output times the output count
//! - `Consumer`: per-input transmission plus per-output processing
//!
//! All durations are validated non-negative at construction. The
//! `time_to_first_result` query distinguishes streaming kinds (one
//! per-output slice after provisioning and transmission) from batch kinds
//! (equal to the total time); it is what lets a downstream consumer start
//! before its producer finished.

use crate::SchedulerError;
use serde::{Deserialize, Serialize};

/// Variant-shaped execution timing of one pipeline step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StepExecutionTimeline {
    Source {
        provisioning_and_deployment_time: f64,
    },
    Sink {
        provisioning_and_deployment_time: f64,
        data_transmission_time: f64,
        number_of_transmitted_inputs: u32,
    },
    Batch {
        provisioning_and_deployment_time: f64,
        data_transmission_time: f64,
        step_processing_time: f64,
    },
    Producer {
        provisioning_and_deployment_time: f64,
        data_transmission_time: f64,
        average_time_to_produce_output: f64,
        number_of_produced_outputs: u32,
    },
    Consumer {
        provisioning_and_deployment_time: f64,
        average_data_transmission_time: f64,
        number_of_transmitted_inputs: u32,
        average_data_processing_time: f64,
        number_of_produced_outputs: u32,
    },
}

fn require_non_negative(value: f64, what: &str) -> Result<f64, SchedulerError> {
    if value < 0.0 {
        return Err(SchedulerError::invalid_timeline(format!(
            "{what} must be non-negative, got {value}"
        )));
    }
    Ok(value)
}

impl StepExecutionTimeline {
    /// A source timeline: provisioning only.
    pub fn source(provisioning_and_deployment_time: f64) -> Result<Self, SchedulerError> {
        Ok(StepExecutionTimeline::Source {
            provisioning_and_deployment_time: require_non_negative(
                provisioning_and_deployment_time,
                "provisioning and deployment time",
            )?,
        })
    }

    /// A sink timeline: provisioning plus transmission per input.
    pub fn sink(
        provisioning_and_deployment_time: f64,
        data_transmission_time: f64,
        number_of_transmitted_inputs: u32,
    ) -> Result<Self, SchedulerError> {
        Ok(StepExecutionTimeline::Sink {
            provisioning_and_deployment_time: require_non_negative(
                provisioning_and_deployment_time,
                "provisioning and deployment time",
            )?,
            data_transmission_time: require_non_negative(
                data_transmission_time,
                "data transmission time",
            )?,
            number_of_transmitted_inputs,
        })
    }

    /// A batch timeline: one processing duration.
    pub fn batch(
        provisioning_and_deployment_time: f64,
        data_transmission_time: f64,
        step_processing_time: f64,
    ) -> Result<Self, SchedulerError> {
        Ok(StepExecutionTimeline::Batch {
            provisioning_and_deployment_time: require_non_negative(
                provisioning_and_deployment_time,
                "provisioning and deployment time",
            )?,
            data_transmission_time: require_non_negative(
                data_transmission_time,
                "data transmission time",
            )?,
            step_processing_time: require_non_negative(
                step_processing_time,
                "step processing time",
            )?,
        })
    }

    /// A producer timeline: outputs emitted incrementally.
    pub fn producer(
        provisioning_and_deployment_time: f64,
        data_transmission_time: f64,
        average_time_to_produce_output: f64,
        number_of_produced_outputs: u32,
    ) -> Result<Self, SchedulerError> {
        Ok(StepExecutionTimeline::Producer {
            provisioning_and_deployment_time: require_non_negative(
                provisioning_and_deployment_time,
                "provisioning and deployment time",
            )?,
            data_transmission_time: require_non_negative(
                data_transmission_time,
                "data transmission time",
            )?,
            average_time_to_produce_output: require_non_negative(
                average_time_to_produce_output,
                "average time to produce output",
            )?,
            number_of_produced_outputs,
        })
    }

    /// A consumer timeline: per-input transmission, per-output processing.
    pub fn consumer(
        provisioning_and_deployment_time: f64,
        average_data_transmission_time: f64,
        number_of_transmitted_inputs: u32,
        average_data_processing_time: f64,
        number_of_produced_outputs: u32,
    ) -> Result<Self, SchedulerError> {
        Ok(StepExecutionTimeline::Consumer {
            provisioning_and_deployment_time: require_non_negative(
                provisioning_and_deployment_time,
                "provisioning and deployment time",
            )?,
            average_data_transmission_time: require_non_negative(
                average_data_transmission_time,
                "average data transmission time",
            )?,
            number_of_transmitted_inputs,
            average_data_processing_time: require_non_negative(
                average_data_processing_time,
                "average data processing time",
            )?,
            number_of_produced_outputs,
        })
    }

    /// Time to provision and deploy the step on its resource
    pub fn provisioning_and_deployment_time(&self) -> f64 {
        match *self {
            StepExecutionTimeline::Source {
                provisioning_and_deployment_time,
            }
            | StepExecutionTimeline::Sink {
                provisioning_and_deployment_time,
                ..
            }
            | StepExecutionTimeline::Batch {
                provisioning_and_deployment_time,
                ..
            }
            | StepExecutionTimeline::Producer {
                provisioning_and_deployment_time,
                ..
            }
            | StepExecutionTimeline::Consumer {
                provisioning_and_deployment_time,
                ..
            } => provisioning_and_deployment_time,
        }
    }

    /// Total time spent receiving input data
    pub fn data_transmission_time(&self) -> f64 {
        match *self {
            StepExecutionTimeline::Source { .. } => 0.0,
            StepExecutionTimeline::Sink {
                data_transmission_time,
                number_of_transmitted_inputs,
                ..
            } => data_transmission_time * f64::from(number_of_transmitted_inputs),
            StepExecutionTimeline::Batch {
                data_transmission_time,
                ..
            }
            | StepExecutionTimeline::Producer {
                data_transmission_time,
                ..
            } => data_transmission_time,
            StepExecutionTimeline::Consumer {
                average_data_transmission_time,
                number_of_transmitted_inputs,
                ..
            } => average_data_transmission_time * f64::from(number_of_transmitted_inputs),
        }
    }

    /// Total time spent processing
    pub fn step_processing_time(&self) -> f64 {
        match *self {
            StepExecutionTimeline::Source { .. } | StepExecutionTimeline::Sink { .. } => 0.0,
            StepExecutionTimeline::Batch {
                step_processing_time,
                ..
            } => step_processing_time,
            StepExecutionTimeline::Producer {
                average_time_to_produce_output,
                number_of_produced_outputs,
                ..
            } => average_time_to_produce_output * f64::from(number_of_produced_outputs),
            StepExecutionTimeline::Consumer {
                average_data_processing_time,
                number_of_produced_outputs,
                ..
            } => average_data_processing_time * f64::from(number_of_produced_outputs),
        }
    }

    /// Provisioning plus transmission plus processing
    pub fn total_time(&self) -> f64 {
        self.provisioning_and_deployment_time()
            + self.data_transmission_time()
            + self.step_processing_time()
    }

    /// The instant (relative to the step start) at which the first result is
    /// available. Streaming kinds emit after one per-output slice; batch
    /// kinds only at the end.
    pub fn time_to_first_result(&self) -> f64 {
        match *self {
            StepExecutionTimeline::Producer {
                provisioning_and_deployment_time,
                data_transmission_time,
                average_time_to_produce_output,
                ..
            } => {
                provisioning_and_deployment_time
                    + data_transmission_time
                    + average_time_to_produce_output
            }
            StepExecutionTimeline::Consumer {
                provisioning_and_deployment_time,
                average_data_transmission_time,
                average_data_processing_time,
                ..
            } => {
                provisioning_and_deployment_time
                    + average_data_transmission_time
                    + average_data_processing_time
            }
            _ => self.total_time(),
        }
    }

    /// The per-output pace of a producer, when this is a producer timeline
    pub fn average_time_to_produce_output(&self) -> Option<f64> {
        match *self {
            StepExecutionTimeline::Producer {
                average_time_to_produce_output,
                ..
            } => Some(average_time_to_produce_output),
            _ => None,
        }
    }

    /// The per-output processing pace of a consumer
    pub fn average_data_processing_time(&self) -> Option<f64> {
        match *self {
            StepExecutionTimeline::Consumer {
                average_data_processing_time,
                ..
            } => Some(average_data_processing_time),
            _ => None,
        }
    }

    /// Number of inputs transmitted into the step, for the kinds that count
    /// them
    pub fn number_of_transmitted_inputs(&self) -> Option<u32> {
        match *self {
            StepExecutionTimeline::Sink {
                number_of_transmitted_inputs,
                ..
            }
            | StepExecutionTimeline::Consumer {
                number_of_transmitted_inputs,
                ..
            } => Some(number_of_transmitted_inputs),
            _ => None,
        }
    }

    /// Number of outputs the step produces, for the kinds that count them
    pub fn number_of_produced_outputs(&self) -> Option<u32> {
        match *self {
            StepExecutionTimeline::Producer {
                number_of_produced_outputs,
                ..
            }
            | StepExecutionTimeline::Consumer {
                number_of_produced_outputs,
                ..
            } => Some(number_of_produced_outputs),
            _ => None,
        }
    }

    /// A copy of a consumer timeline re-partitioned to a replica's share of
    /// the input stream. Non-consumer timelines are returned unchanged.
    pub fn with_input_partition(&self, inputs: u32) -> Self {
        match *self {
            StepExecutionTimeline::Consumer {
                provisioning_and_deployment_time,
                average_data_transmission_time,
                average_data_processing_time,
                ..
            } => StepExecutionTimeline::Consumer {
                provisioning_and_deployment_time,
                average_data_transmission_time,
                number_of_transmitted_inputs: inputs,
                average_data_processing_time,
                number_of_produced_outputs: inputs,
            },
            ref other => other.clone(),
        }
    }
}

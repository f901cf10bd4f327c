// /////////////////////////////////////////////////////////////////////////////
// Pipeline Scheduler RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Computing Resource Entity
//!
//! A computing resource is one node of the heterogeneous pool the scheduler
//! places steps onto: a cloud instance billed by the hour or a free edge
//! node. Identity is the resource name.
//!
//! ## Pricing
//!
//! Two pricing concerns are modeled separately:
//!
//! - **Reservation cost**: [`BillingModel::OnDemand`] resources bill
//!   reserved seconds rounded up to full hours. The computation is a pure
//!   function of the rate and the reserved duration; no catalog state is
//!   touched while costing a timeline, so workers can price concurrently
//!   over shared resource handles.
//! - **Transfer cost**: the [`PriceModel`] capability prices moving data
//!   between availability zones. The default [`ZonalTransferPricing`] follows
//!   the usual cloud structure: free within a zone, a reduced intra-region
//!   rate across zones of one region, the egress rate across regions, free
//!   ingress from the internet.

use serde::{Deserialize, Serialize};

/// How a resource bills reserved time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum BillingModel {
    /// No reservation cost (edge and fog nodes)
    Free,
    /// Billed per started hour of reservation
    OnDemand { hourly_rate_usd: f64 },
}

/// Total price for reserving an on-demand resource, rounding the reserved
/// seconds up to full hours.
pub fn price_for_reserved_seconds(hourly_rate_usd: f64, seconds: f64) -> f64 {
    if seconds <= 0.0 {
        return 0.0;
    }
    (seconds / 3600.0).ceil() * hourly_rate_usd
}

/// One schedulable node of the resource pool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComputingResource {
    name: String,
    num_cpus: u32,
    cpu_frequency_ghz: f64,
    ram_capacity_gib: f64,
    availability_zone: Option<String>,
    is_schedulable: bool,
    billing: BillingModel,
}

impl ComputingResource {
    /// Creates a free (fog/edge) resource without an availability zone.
    pub fn new_free(
        name: impl Into<String>,
        num_cpus: u32,
        cpu_frequency_ghz: f64,
        ram_capacity_gib: f64,
    ) -> Self {
        ComputingResource {
            name: name.into(),
            num_cpus,
            cpu_frequency_ghz,
            ram_capacity_gib,
            availability_zone: None,
            is_schedulable: true,
            billing: BillingModel::Free,
        }
    }

    /// Creates an on-demand cloud instance located in an availability zone.
    pub fn new_on_demand(
        name: impl Into<String>,
        num_cpus: u32,
        cpu_frequency_ghz: f64,
        ram_capacity_gib: f64,
        availability_zone: impl Into<String>,
        hourly_rate_usd: f64,
    ) -> Self {
        ComputingResource {
            name: name.into(),
            num_cpus,
            cpu_frequency_ghz,
            ram_capacity_gib,
            availability_zone: Some(availability_zone.into()),
            is_schedulable: true,
            billing: BillingModel::OnDemand { hourly_rate_usd },
        }
    }

    /// The resource name (identity within the catalog)
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of CPU cores
    pub fn num_cpus(&self) -> u32 {
        self.num_cpus
    }

    /// CPU frequency in GHz
    pub fn cpu_frequency_ghz(&self) -> f64 {
        self.cpu_frequency_ghz
    }

    /// RAM capacity in GiB
    pub fn ram_capacity_gib(&self) -> f64 {
        self.ram_capacity_gib
    }

    /// The availability zone, when the resource lives in a cloud region
    pub fn availability_zone(&self) -> Option<&str> {
        self.availability_zone.as_deref()
    }

    /// Whether the general scheduler may place steps here. Forced
    /// deployments ignore this flag.
    pub fn is_schedulable(&self) -> bool {
        self.is_schedulable
    }

    /// Excludes the resource from general scheduling. Must be called before
    /// the resource is shared into the network graph.
    pub fn disable_scheduling(&mut self) {
        self.is_schedulable = false;
    }

    /// The billing model
    pub fn billing(&self) -> BillingModel {
        self.billing
    }

    /// True for hour-billed resources
    pub fn is_on_demand(&self) -> bool {
        matches!(self.billing, BillingModel::OnDemand { .. })
    }

    /// Total CPU capacity expressed in percent (100 per core)
    pub fn cpu_capacity_percent(&self) -> f64 {
        f64::from(self.num_cpus) * 100.0
    }

    /// Total memory capacity in MiB
    pub fn memory_capacity_mib(&self) -> f64 {
        self.ram_capacity_gib * 1024.0
    }

    /// Price for reserving this resource for the given duration.
    pub fn price_for_reservation(&self, seconds: f64) -> f64 {
        match self.billing {
            BillingModel::Free => 0.0,
            BillingModel::OnDemand { hourly_rate_usd } => {
                price_for_reserved_seconds(hourly_rate_usd, seconds)
            }
        }
    }
}

/// Capability for pricing data transfers between availability zones.
pub trait PriceModel: Send + Sync {
    /// Price in USD for moving `gigabytes` from `source_zone` to
    /// `destination_zone`. `None` stands for "outside any zone" (the
    /// internet, or an unzoned edge node).
    fn price_to_transmit(
        &self,
        source_zone: Option<&str>,
        destination_zone: Option<&str>,
        gigabytes: f64,
    ) -> f64;
}

/// Zone-structured transfer pricing with an egress and an intra-region rate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ZonalTransferPricing {
    pub egress_per_gb_usd: f64,
    pub intra_region_per_gb_usd: f64,
}

impl Default for ZonalTransferPricing {
    fn default() -> Self {
        ZonalTransferPricing {
            egress_per_gb_usd: 0.09,
            intra_region_per_gb_usd: 0.02,
        }
    }
}

/// The region of an availability zone: the zone name minus its trailing
/// letter suffix ("eu-west-1a" belongs to region "eu-west-1").
fn region_of(zone: &str) -> &str {
    zone.trim_end_matches(|c: char| c.is_ascii_alphabetic())
}

impl PriceModel for ZonalTransferPricing {
    fn price_to_transmit(
        &self,
        source_zone: Option<&str>,
        destination_zone: Option<&str>,
        gigabytes: f64,
    ) -> f64 {
        match (source_zone, destination_zone) {
            // Ingress from outside any zone is free
            (None, _) => 0.0,
            // Leaving the provider entirely bills the egress rate
            (Some(_), None) => self.egress_per_gb_usd * gigabytes,
            (Some(src), Some(dst)) => {
                if src == dst {
                    0.0
                } else if region_of(src) == region_of(dst) {
                    self.intra_region_per_gb_usd * gigabytes
                } else {
                    self.egress_per_gb_usd * gigabytes
                }
            }
        }
    }
}

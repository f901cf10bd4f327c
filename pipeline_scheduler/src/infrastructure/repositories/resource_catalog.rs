// /////////////////////////////////////////////////////////////////////////////
// Pipeline Scheduler RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Resource Catalog Repository
//!
//! Loads the resource table (one row per node type) and builds the network
//! graph. Rows with node type `EC2` become on-demand cloud instances, every
//! other node type a free resource. All loaded nodes are connected
//! bidirectionally: 1000 Mbps between nodes of the same class, 50 Mbps
//! across classes.
//!
//! Expected columns: `Instance type, Name, Memory capacity (GiB), Number of
//! CPUs, CPU frequency (GHz), Number of nodes, Node type, AZ, On-demand
//! hourly rate (USD)`. A `Number of nodes` above one expands into suffixed
//! resource names (`name-2`, `name-3`, ...) so name identity stays unique.

use pipeline_scheduler_domain::{ComputingResource, NetworkGraph, SchedulerError};
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;

/// Link bandwidth between nodes of the same class (EC2 to EC2, fog to fog)
pub const SAME_CLASS_BANDWIDTH_MBPS: f64 = 1000.0;
/// Link bandwidth across classes (EC2 to fog)
pub const CROSS_CLASS_BANDWIDTH_MBPS: f64 = 50.0;

#[derive(Debug, Deserialize)]
struct ResourceRow {
    #[serde(rename = "Name")]
    name: String,
    #[serde(rename = "Memory capacity (GiB)")]
    memory_capacity_gib: f64,
    #[serde(rename = "Number of CPUs")]
    num_cpus: u32,
    #[serde(rename = "CPU frequency (GHz)")]
    cpu_frequency_ghz: f64,
    #[serde(rename = "Number of nodes")]
    num_nodes: u32,
    #[serde(rename = "Node type")]
    node_type: String,
    #[serde(rename = "AZ")]
    availability_zone: String,
    #[serde(rename = "On-demand hourly rate (USD)")]
    hourly_rate_usd: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NodeClass {
    Cloud,
    Fog,
}

/// The loaded catalog: every resource plus the bandwidth graph over them.
#[derive(Debug, Clone)]
pub struct ResourceCatalog {
    pub network_graph: NetworkGraph,
    pub resources: Vec<Arc<ComputingResource>>,
}

/// Loads the resource CSV and meshes the nodes. Names listed in
/// `unschedulable` are excluded from general scheduling before they become
/// shared handles.
pub fn load_resource_catalog(
    path: &Path,
    unschedulable: &[String],
) -> Result<ResourceCatalog, SchedulerError> {
    let mut reader = csv::Reader::from_path(path)
        .map_err(|error| SchedulerError::CsvError(format!("{}: {error}", path.display())))?;

    let mut network_graph = NetworkGraph::new();
    let mut resources: Vec<Arc<ComputingResource>> = Vec::new();
    let mut classes: Vec<(Arc<ComputingResource>, NodeClass)> = Vec::new();

    for record in reader.deserialize() {
        let row: ResourceRow = record
            .map_err(|error| SchedulerError::CsvError(format!("{}: {error}", path.display())))?;
        let class = if row.node_type == "EC2" {
            NodeClass::Cloud
        } else {
            NodeClass::Fog
        };

        for node_index in 0..row.num_nodes.max(1) {
            let name = if row.num_nodes > 1 {
                format!("{}-{}", row.name, node_index + 1)
            } else {
                row.name.clone()
            };
            let mut resource = match class {
                NodeClass::Cloud => ComputingResource::new_on_demand(
                    &name,
                    row.num_cpus,
                    row.cpu_frequency_ghz,
                    row.memory_capacity_gib,
                    &row.availability_zone,
                    row.hourly_rate_usd,
                ),
                NodeClass::Fog => ComputingResource::new_free(
                    &name,
                    row.num_cpus,
                    row.cpu_frequency_ghz,
                    row.memory_capacity_gib,
                ),
            };
            if unschedulable.iter().any(|excluded| excluded == &name) {
                resource.disable_scheduling();
            }
            let resource = Arc::new(resource);

            for (existing, existing_class) in &classes {
                let mbps = if *existing_class == class {
                    SAME_CLASS_BANDWIDTH_MBPS
                } else {
                    CROSS_CLASS_BANDWIDTH_MBPS
                };
                network_graph.add_edge(&resource, existing, mbps);
                network_graph.add_edge(existing, &resource, mbps);
            }

            network_graph.add_node(resource.clone());
            classes.push((resource.clone(), class));
            resources.push(resource);
        }
    }

    Ok(ResourceCatalog {
        network_graph,
        resources,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const CATALOG: &str = "\
Instance type,Name,Memory capacity (GiB),Number of CPUs,CPU frequency (GHz),Number of nodes,Node type,AZ,On-demand hourly rate (USD)
m5.large,cloud1,8,2,2.5,1,EC2,eu-west-1a,0.107
m5.large,cloud2,8,2,2.5,1,EC2,eu-west-1b,0.107
raspberry,fog1,4,4,1.5,1,Fog,,0
";

    fn write_catalog(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_catalog_is_fully_meshed_with_class_bandwidths() {
        let file = write_catalog(CATALOG);
        let catalog = load_resource_catalog(file.path(), &[]).unwrap();
        assert_eq!(catalog.resources.len(), 3);

        let cloud1 = catalog.network_graph.find_resource_by_name("cloud1").unwrap();
        let cloud2 = catalog.network_graph.find_resource_by_name("cloud2").unwrap();
        let fog1 = catalog.network_graph.find_resource_by_name("fog1").unwrap();

        assert_eq!(
            catalog.network_graph.bandwidth_between(&cloud1, &cloud2),
            Some(SAME_CLASS_BANDWIDTH_MBPS)
        );
        assert_eq!(
            catalog.network_graph.bandwidth_between(&cloud2, &fog1),
            Some(CROSS_CLASS_BANDWIDTH_MBPS)
        );
        assert_eq!(
            catalog.network_graph.bandwidth_between(&fog1, &cloud1),
            Some(CROSS_CLASS_BANDWIDTH_MBPS)
        );
        assert!(cloud1.is_on_demand());
        assert!(!fog1.is_on_demand());
        assert_eq!(cloud1.availability_zone(), Some("eu-west-1a"));
    }

    #[test]
    fn test_unschedulable_names_are_disabled() {
        let file = write_catalog(CATALOG);
        let catalog =
            load_resource_catalog(file.path(), &["fog1".to_string()]).unwrap();
        let fog1 = catalog.network_graph.find_resource_by_name("fog1").unwrap();
        assert!(!fog1.is_schedulable());
        assert_eq!(
            catalog.network_graph.eligible_computing_resources().len(),
            2
        );
    }

    #[test]
    fn test_multi_node_rows_expand_with_suffixes() {
        let multi = CATALOG.replace(
            "raspberry,fog1,4,4,1.5,1,Fog,,0",
            "raspberry,fog,4,4,1.5,3,Fog,,0",
        );
        let file = write_catalog(&multi);
        let catalog = load_resource_catalog(file.path(), &[]).unwrap();
        assert_eq!(catalog.resources.len(), 5);
        assert!(catalog.network_graph.find_resource_by_name("fog-1").is_some());
        assert!(catalog.network_graph.find_resource_by_name("fog-3").is_some());
    }
}

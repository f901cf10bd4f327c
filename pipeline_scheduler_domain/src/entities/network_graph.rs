// /////////////////////////////////////////////////////////////////////////////
// Pipeline Scheduler RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Network Graph
//!
//! The weighted network graph connects the computing resources of the pool.
//! Nodes are shared resource handles; directed edges carry the link
//! bandwidth in Mbps.
//!
//! Two cases must never be conflated: a resource always reaches itself (the
//! identity edge reports a bandwidth of zero, meaning "no transfer needed"),
//! while a missing edge between two distinct resources means the pair is not
//! connected at all and a placement across it is infeasible. The query
//! therefore returns `Some(0.0)` for the former and `None` for the latter.

use crate::entities::computing_resource::ComputingResource;
use std::collections::HashMap;
use std::sync::Arc;

/// Directed bandwidth graph over the resource catalog.
#[derive(Debug, Clone, Default)]
pub struct NetworkGraph {
    nodes: Vec<Arc<ComputingResource>>,
    /// (source name, destination name) -> bandwidth in Mbps
    edges: HashMap<(String, String), f64>,
}

impl NetworkGraph {
    /// Creates an empty graph
    pub fn new() -> Self {
        NetworkGraph::default()
    }

    /// Adds a resource node. Nodes are shared read-only handles; configure
    /// schedulability before adding.
    pub fn add_node(&mut self, resource: Arc<ComputingResource>) {
        if !self.nodes.iter().any(|n| n.name() == resource.name()) {
            self.nodes.push(resource);
        }
    }

    /// Adds a directed edge with the given bandwidth in Mbps.
    pub fn add_edge(&mut self, from: &ComputingResource, to: &ComputingResource, mbps: f64) {
        self.edges
            .insert((from.name().to_string(), to.name().to_string()), mbps);
    }

    /// The bandwidth between two resources in Mbps.
    ///
    /// Returns `Some(0.0)` when both are the same resource (no transfer
    /// needed) and `None` when no edge connects the pair.
    pub fn bandwidth_between(
        &self,
        from: &ComputingResource,
        to: &ComputingResource,
    ) -> Option<f64> {
        if from.name() == to.name() {
            return Some(0.0);
        }
        self.edges
            .get(&(from.name().to_string(), to.name().to_string()))
            .copied()
    }

    /// All resources in the catalog, schedulable or not.
    pub fn all_computing_resources(&self) -> &[Arc<ComputingResource>] {
        &self.nodes
    }

    /// The resources the general scheduler may place steps onto.
    pub fn eligible_computing_resources(&self) -> Vec<Arc<ComputingResource>> {
        self.nodes
            .iter()
            .filter(|node| node.is_schedulable())
            .cloned()
            .collect()
    }

    /// Looks up a resource by name
    pub fn find_resource_by_name(&self, name: &str) -> Option<Arc<ComputingResource>> {
        self.nodes.iter().find(|node| node.name() == name).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(name: &str) -> Arc<ComputingResource> {
        Arc::new(ComputingResource::new_free(name, 4, 2.4, 8.0))
    }

    #[test]
    fn test_identity_edge_is_zero_bandwidth() {
        let mut graph = NetworkGraph::new();
        let a = node("a");
        graph.add_node(a.clone());
        assert_eq!(graph.bandwidth_between(&a, &a), Some(0.0));
    }

    #[test]
    fn test_missing_edge_means_no_connectivity() {
        let mut graph = NetworkGraph::new();
        let a = node("a");
        let b = node("b");
        graph.add_node(a.clone());
        graph.add_node(b.clone());
        assert_eq!(graph.bandwidth_between(&a, &b), None);

        graph.add_edge(&a, &b, 1000.0);
        assert_eq!(graph.bandwidth_between(&a, &b), Some(1000.0));
        // Edges are directed
        assert_eq!(graph.bandwidth_between(&b, &a), None);
    }

    #[test]
    fn test_eligible_resources_exclude_disabled_nodes() {
        let mut graph = NetworkGraph::new();
        let mut fog = ComputingResource::new_free("fog1", 4, 2.4, 8.0);
        fog.disable_scheduling();
        graph.add_node(Arc::new(fog));
        graph.add_node(node("worker"));

        assert_eq!(graph.all_computing_resources().len(), 2);
        let eligible = graph.eligible_computing_resources();
        assert_eq!(eligible.len(), 1);
        assert_eq!(eligible[0].name(), "worker");
    }
}

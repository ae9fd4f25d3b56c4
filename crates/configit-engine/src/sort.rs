//! Ordering of a dependency graph into waves.

use configit_core::Coordinate;
use petgraph::Direction;
use petgraph::graph::NodeIndex;
use std::collections::HashMap;

use crate::error::GraphError;
use crate::graph::DependencyGraph;

/// Coordinates that do not depend on each other, sorted by coordinate.
pub type Wave = Vec<Coordinate>;

/// Order the graph into waves with Kahn's algorithm, one wave per round.
///
/// Every prerequisite lands in an earlier wave than its dependents. Within a
/// wave coordinates are sorted by their string form, so identical input
/// always yields identical output.
pub fn sort_waves(graph: &DependencyGraph) -> Result<Vec<Wave>, GraphError> {
    let g = &graph.graph;
    let mut in_degree: HashMap<NodeIndex, usize> = g
        .node_indices()
        .map(|node| (node, g.neighbors_directed(node, Direction::Incoming).count()))
        .collect();

    let mut current: Vec<NodeIndex> = g
        .node_indices()
        .filter(|node| in_degree[node] == 0)
        .collect();
    let mut waves = Vec::new();
    let mut placed = 0;

    while !current.is_empty() {
        current.sort_by(|a, b| g[*a].cmp(&g[*b]));

        let mut next = Vec::new();
        for &node in &current {
            for dependent in g.neighbors_directed(node, Direction::Outgoing) {
                if let Some(degree) = in_degree.get_mut(&dependent) {
                    *degree -= 1;
                    if *degree == 0 {
                        next.push(dependent);
                    }
                }
            }
        }

        placed += current.len();
        waves.push(current.iter().map(|node| g[*node].clone()).collect());
        current = next;
    }

    if placed < g.node_count() {
        let mut remaining: Vec<Coordinate> = in_degree
            .iter()
            .filter(|(_, degree)| **degree > 0)
            .map(|(node, _)| g[*node].clone())
            .collect();
        remaining.sort();
        return Err(GraphError::Unsortable { remaining });
    }

    Ok(waves)
}

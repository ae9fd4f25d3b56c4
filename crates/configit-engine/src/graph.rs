//! Dependency graph of one environment's configs.
//!
//! An edge `A -> B` means A must be applied before B because B references A.

use configit_core::{Config, Coordinate};
use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::error::GraphError;

/// Color states for cycle detection using DFS.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Color {
    /// Node has not been visited.
    White,
    /// Node is on the current DFS path.
    Gray,
    /// Node and everything reachable from it has been visited.
    Black,
}

/// Dependency graph built from one environment's configs.
///
/// Owns the configs it was built from so the executor can look them up by
/// coordinate.
#[derive(Debug)]
pub struct DependencyGraph {
    pub(crate) graph: DiGraph<Coordinate, ()>,
    node_map: HashMap<Coordinate, NodeIndex>,
    configs: BTreeMap<Coordinate, Config>,
}

impl DependencyGraph {
    /// Build the graph, collecting every structural error.
    ///
    /// Fails on duplicate coordinates, self references, references to
    /// coordinates that are not part of `configs`, and cycles.
    pub fn build(configs: impl IntoIterator<Item = Config>) -> Result<Self, Vec<GraphError>> {
        let mut errors = Vec::new();
        let mut by_coordinate = BTreeMap::new();

        for config in configs {
            let coordinate = config.coordinate.clone();
            if by_coordinate.insert(coordinate.clone(), config).is_some() {
                errors.push(GraphError::DuplicateCoordinate { coordinate });
            }
        }

        let mut graph = DiGraph::new();
        let mut node_map = HashMap::new();
        // Sorted insertion keeps node indices, and therefore traversal order,
        // reproducible.
        for coordinate in by_coordinate.keys() {
            let index = graph.add_node(coordinate.clone());
            node_map.insert(coordinate.clone(), index);
        }

        for (coordinate, config) in &by_coordinate {
            let targets: BTreeSet<Coordinate> = config
                .references()
                .into_iter()
                .map(|reference| reference.coordinate)
                .collect();

            for target in targets {
                if &target == coordinate {
                    errors.push(GraphError::SelfReference {
                        coordinate: coordinate.clone(),
                    });
                    continue;
                }
                match node_map.get(&target) {
                    Some(&from) => {
                        let to = node_map[coordinate];
                        graph.update_edge(from, to, ());
                    }
                    None => errors.push(GraphError::UndefinedReference {
                        referrer: coordinate.clone(),
                        target,
                    }),
                }
            }
        }

        let dependency_graph = Self {
            graph,
            node_map,
            configs: by_coordinate,
        };

        if let Some(cycle) = dependency_graph.find_cycle() {
            errors.push(GraphError::Cycle { cycle });
        }

        if errors.is_empty() {
            Ok(dependency_graph)
        } else {
            Err(errors)
        }
    }

    /// Find a cycle using DFS with colors.
    ///
    /// Returns the coordinates on the cycle in edge order, with the first
    /// coordinate repeated at the end.
    pub fn find_cycle(&self) -> Option<Vec<Coordinate>> {
        let mut colors: HashMap<NodeIndex, Color> = self
            .graph
            .node_indices()
            .map(|node| (node, Color::White))
            .collect();
        let mut path = Vec::new();

        for node in self.graph.node_indices() {
            if colors[&node] == Color::White {
                if let Some(cycle) = self.dfs_visit(node, &mut colors, &mut path) {
                    return Some(cycle);
                }
            }
        }
        None
    }

    fn dfs_visit(
        &self,
        node: NodeIndex,
        colors: &mut HashMap<NodeIndex, Color>,
        path: &mut Vec<NodeIndex>,
    ) -> Option<Vec<Coordinate>> {
        colors.insert(node, Color::Gray);
        path.push(node);

        for neighbor in self.sorted_neighbors(node, Direction::Outgoing) {
            match colors[&neighbor] {
                Color::Gray => {
                    let start = path.iter().position(|n| *n == neighbor).unwrap_or(0);
                    let mut cycle: Vec<Coordinate> = path[start..]
                        .iter()
                        .map(|n| self.graph[*n].clone())
                        .collect();
                    cycle.push(self.graph[neighbor].clone());
                    return Some(cycle);
                }
                Color::White => {
                    if let Some(cycle) = self.dfs_visit(neighbor, colors, path) {
                        return Some(cycle);
                    }
                }
                Color::Black => {}
            }
        }

        path.pop();
        colors.insert(node, Color::Black);
        None
    }

    fn sorted_neighbors(&self, node: NodeIndex, direction: Direction) -> Vec<NodeIndex> {
        let mut neighbors: Vec<NodeIndex> =
            self.graph.neighbors_directed(node, direction).collect();
        neighbors.sort_by(|a, b| self.graph[*a].cmp(&self.graph[*b]));
        neighbors
    }

    pub fn config(&self, coordinate: &Coordinate) -> Option<&Config> {
        self.configs.get(coordinate)
    }

    /// All configs, ordered by coordinate.
    pub fn configs(&self) -> impl Iterator<Item = &Config> {
        self.configs.values()
    }

    /// Coordinates that must be applied before `coordinate`.
    pub fn dependencies(&self, coordinate: &Coordinate) -> Vec<Coordinate> {
        self.neighbors(coordinate, Direction::Incoming)
    }

    /// Coordinates that reference `coordinate`.
    pub fn dependents(&self, coordinate: &Coordinate) -> Vec<Coordinate> {
        self.neighbors(coordinate, Direction::Outgoing)
    }

    fn neighbors(&self, coordinate: &Coordinate, direction: Direction) -> Vec<Coordinate> {
        self.node_map
            .get(coordinate)
            .map(|&node| {
                self.sorted_neighbors(node, direction)
                    .into_iter()
                    .map(|n| self.graph[n].clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Every edge as `(prerequisite, dependent)`.
    pub fn edges(&self) -> Vec<(Coordinate, Coordinate)> {
        let mut edges: Vec<_> = self
            .graph
            .edge_indices()
            .filter_map(|edge| self.graph.edge_endpoints(edge))
            .map(|(from, to)| (self.graph[from].clone(), self.graph[to].clone()))
            .collect();
        edges.sort();
        edges
    }

    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }
}

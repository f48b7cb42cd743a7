//! Weighted graph routing over string-keyed nodes.
//!
//! Edges are bidirectional unless added with [`Network::add_directed_edge`].
//! Costs are arbitrary non-negative weights for Dijkstra and A*; Bellman-Ford
//! also accepts negative costs on directed edges. A bidirectional edge with a
//! negative cost is itself a negative cycle.
//!
//! # Examples
//!
//! ```
//! use geoscope::analysis::network::Network;
//! use geoscope::Position;
//!
//! # fn main() -> geoscope::Result<()> {
//! let mut net = Network::new();
//! net.add_node("A", Position::new(0.0, 0.0));
//! net.add_node("B", Position::new(1.0, 0.0));
//! net.add_node("C", Position::new(2.0, 0.0));
//! net.add_edge("ab", "A", "B", 1.0)?;
//! net.add_edge("bc", "B", "C", 1.0)?;
//!
//! let route = net.dijkstra("A", "C")?.expect("connected");
//! assert_eq!(route.path, vec!["A", "B", "C"]);
//! assert_eq!(route.total_cost, 2.0);
//! # Ok(())
//! # }
//! ```

use super::proximity::{DistanceMetric, distance_between};
use crate::error::{GeoscopeError, Result};
use crate::geometry::create_point;
use crate::transform::overlay::convex_hull;
use geoscope_types::{Geometry, Position};
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::cmp::Ordering;
use std::collections::BinaryHeap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkNode {
    pub id: String,
    pub position: Position,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub id: String,
    pub from: String,
    pub to: String,
    pub cost: f64,
    /// Shape of the edge from `from` to `to`; straight when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geometry: Option<Vec<Position>>,
    pub bidirectional: bool,
}

/// A path through the network.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    /// Node ids from start to end.
    pub path: Vec<String>,
    /// Edge ids in traversal order.
    pub edges: Vec<String>,
    pub total_cost: f64,
    /// Length of the route geometry under the network's metric.
    pub total_distance: f64,
    /// `LineString` along the edges, or a `Point` for a zero-length route.
    pub geometry: Geometry,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceArea {
    /// Reached nodes and their cost from the origin, cheapest first.
    pub nodes: Vec<(String, f64)>,
    /// Convex hull of the reached nodes; `None` when they are collinear.
    pub hull: Option<Geometry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tour {
    /// Stops in visiting order (the start repeated at the end for round trips).
    pub order: Vec<String>,
    pub legs: Vec<Route>,
    pub total_cost: f64,
}

/// Heap entry ordered so that `BinaryHeap` pops the lowest priority first.
#[derive(Debug, PartialEq)]
struct State<'a> {
    priority: f64,
    cost: f64,
    node: &'a str,
}

impl Eq for State<'_> {}

impl Ord for State<'_> {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .priority
            .partial_cmp(&self.priority)
            .unwrap_or(Ordering::Equal)
            .then_with(|| other.node.cmp(self.node))
    }
}

impl PartialOrd for State<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Predecessor links: node -> (previous node, edge id).
type Predecessors<'a> = FxHashMap<&'a str, (&'a str, &'a str)>;

#[derive(Debug, Clone, Default)]
pub struct Network {
    nodes: FxHashMap<String, NetworkNode>,
    edges: FxHashMap<String, Edge>,
    adjacency: FxHashMap<String, SmallVec<[String; 4]>>,
    metric: DistanceMetric,
}

impl Network {
    /// Empty network measuring distances in planar units.
    pub fn new() -> Self {
        Self::with_metric(DistanceMetric::Euclidean)
    }

    /// Empty network whose distances and heuristics use `metric`.
    pub fn with_metric(metric: DistanceMetric) -> Self {
        Self {
            metric,
            ..Default::default()
        }
    }

    pub fn metric(&self) -> DistanceMetric {
        self.metric
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn node(&self, id: &str) -> Option<&NetworkNode> {
        self.nodes.get(id)
    }

    pub fn edge(&self, id: &str) -> Option<&Edge> {
        self.edges.get(id)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &NetworkNode> {
        self.nodes.values()
    }

    pub fn edges(&self) -> impl Iterator<Item = &Edge> {
        self.edges.values()
    }

    /// Add or move a node. Existing edges keep their connections.
    pub fn add_node(&mut self, id: impl Into<String>, position: Position) {
        let id = id.into();
        self.adjacency.entry(id.clone()).or_default();
        self.nodes.insert(id.clone(), NetworkNode { id, position });
    }

    /// Remove a node and every edge touching it. Returns the node if present.
    pub fn remove_node(&mut self, id: &str) -> Option<NetworkNode> {
        let node = self.nodes.remove(id)?;
        if let Some(incident) = self.adjacency.remove(id) {
            for edge_id in incident {
                self.remove_edge(&edge_id);
            }
        }
        Some(node)
    }

    /// Add a bidirectional edge.
    pub fn add_edge(
        &mut self,
        id: impl Into<String>,
        from: &str,
        to: &str,
        cost: f64,
    ) -> Result<()> {
        self.insert_edge(id.into(), from, to, cost, None, true)
    }

    /// Add a one-way edge from `from` to `to`.
    pub fn add_directed_edge(
        &mut self,
        id: impl Into<String>,
        from: &str,
        to: &str,
        cost: f64,
    ) -> Result<()> {
        self.insert_edge(id.into(), from, to, cost, None, false)
    }

    /// Add a bidirectional edge with an explicit shape running from `from`
    /// to `to`.
    pub fn add_edge_with_geometry(
        &mut self,
        id: impl Into<String>,
        from: &str,
        to: &str,
        cost: f64,
        geometry: Vec<Position>,
    ) -> Result<()> {
        self.insert_edge(id.into(), from, to, cost, Some(geometry), true)
    }

    fn insert_edge(
        &mut self,
        id: String,
        from: &str,
        to: &str,
        cost: f64,
        geometry: Option<Vec<Position>>,
        bidirectional: bool,
    ) -> Result<()> {
        for endpoint in [from, to] {
            if !self.nodes.contains_key(endpoint) {
                return Err(GeoscopeError::Topology(format!(
                    "Edge '{}' references unknown node '{}'",
                    id, endpoint
                )));
            }
        }
        if cost.is_nan() || cost.is_infinite() {
            return Err(GeoscopeError::InvalidInput(format!(
                "Edge '{}' has non-finite cost {}",
                id, cost
            )));
        }
        self.remove_edge(&id);

        self.adjacency.entry(from.to_string()).or_default().push(id.clone());
        if to != from {
            self.adjacency.entry(to.to_string()).or_default().push(id.clone());
        }
        self.edges.insert(
            id.clone(),
            Edge {
                id,
                from: from.to_string(),
                to: to.to_string(),
                cost,
                geometry,
                bidirectional,
            },
        );
        Ok(())
    }

    pub fn remove_edge(&mut self, id: &str) -> Option<Edge> {
        let edge = self.edges.remove(id)?;
        for endpoint in [&edge.from, &edge.to] {
            if let Some(list) = self.adjacency.get_mut(endpoint) {
                list.retain(|e| e != id);
            }
        }
        Some(edge)
    }

    /// Node closest to `position` under the network metric.
    pub fn nearest_node(&self, position: &Position) -> Option<&NetworkNode> {
        self.nodes
            .values()
            .map(|n| (n, distance_between(position, &n.position, self.metric)))
            .min_by(|a, b| {
                a.1.partial_cmp(&b.1)
                    .unwrap_or(Ordering::Equal)
                    .then_with(|| a.0.id.cmp(&b.0.id))
            })
            .map(|(n, _)| n)
    }

    /// Traversable edges leaving `node`, paired with the node they reach.
    fn outgoing<'a>(&'a self, node: &str) -> impl Iterator<Item = (&'a Edge, &'a str)> + 'a {
        let node = node.to_string();
        self.adjacency
            .get(node.as_str())
            .into_iter()
            .flatten()
            .filter_map(|id| self.edges.get(id))
            .filter_map(move |edge| {
                if edge.from == node {
                    Some((edge, edge.to.as_str()))
                } else if edge.bidirectional && edge.to == node {
                    Some((edge, edge.from.as_str()))
                } else {
                    None
                }
            })
    }

    fn require_node(&self, id: &str) -> Result<&NetworkNode> {
        self.nodes
            .get(id)
            .ok_or_else(|| GeoscopeError::InvalidInput(format!("Unknown node '{}'", id)))
    }

    fn reject_negative_costs(&self, algorithm: &str) -> Result<()> {
        match self.edges.values().find(|e| e.cost < 0.0) {
            Some(edge) => Err(GeoscopeError::Topology(format!(
                "{} cannot route over negative cost {} on edge '{}'",
                algorithm, edge.cost, edge.id
            ))),
            None => Ok(()),
        }
    }

    /// Best-first search from `start`. With a `target` it stops when the
    /// target is settled; with `max_cost` it never expands past that cost.
    fn search<'a, H>(
        &'a self,
        start: &'a str,
        target: Option<&str>,
        max_cost: f64,
        heuristic: H,
    ) -> (FxHashMap<&'a str, f64>, Predecessors<'a>)
    where
        H: Fn(&str) -> f64,
    {
        let mut best: FxHashMap<&'a str, f64> = FxHashMap::default();
        let mut prev: Predecessors<'a> = FxHashMap::default();
        let mut settled: FxHashSet<&'a str> = FxHashSet::default();
        let mut heap = BinaryHeap::new();

        best.insert(start, 0.0);
        heap.push(State {
            priority: heuristic(start),
            cost: 0.0,
            node: start,
        });

        while let Some(State { cost, node, .. }) = heap.pop() {
            if !settled.insert(node) {
                continue;
            }
            if target == Some(node) {
                break;
            }
            for (edge, next) in self.outgoing(node) {
                let next_cost = cost + edge.cost;
                if next_cost > max_cost || settled.contains(next) {
                    continue;
                }
                if best.get(next).is_none_or(|&c| next_cost < c) {
                    best.insert(next, next_cost);
                    prev.insert(next, (node, edge.id.as_str()));
                    heap.push(State {
                        priority: next_cost + heuristic(next),
                        cost: next_cost,
                        node: next,
                    });
                }
            }
        }
        (best, prev)
    }

    /// Walk predecessor links back from `end`.
    fn unwind<'a>(prev: &Predecessors<'a>, start: &'a str, end: &'a str) -> Option<Vec<(&'a str, &'a str)>> {
        let mut steps = Vec::new();
        let mut current = end;
        while current != start {
            let &(before, edge) = prev.get(current)?;
            steps.push((before, edge));
            current = before;
        }
        steps.reverse();
        Some(steps)
    }

    /// Build a route from a start node and the edges taken from it.
    fn build_route(&self, start: &str, edge_ids: &[&str]) -> Route {
        let mut path = vec![start.to_string()];
        let mut positions: Vec<Position> = Vec::new();
        let mut total_cost = 0.0;
        let mut current = start.to_string();

        if let Some(node) = self.nodes.get(start) {
            positions.push(node.position);
        }
        for id in edge_ids {
            let Some(edge) = self.edges.get(*id) else {
                continue;
            };
            let forward = edge.from == current;
            let next = if forward { &edge.to } else { &edge.from };
            let mut shape = match &edge.geometry {
                Some(g) => g.clone(),
                None => [&edge.from, &edge.to]
                    .iter()
                    .filter_map(|n| self.nodes.get(n.as_str()).map(|n| n.position))
                    .collect(),
            };
            if !forward {
                shape.reverse();
            }
            for p in shape {
                if positions.last().is_none_or(|last| !last.equals_2d(&p)) {
                    positions.push(p);
                }
            }
            total_cost += edge.cost;
            path.push(next.clone());
            current = next.clone();
        }

        let total_distance = positions
            .windows(2)
            .map(|w| distance_between(&w[0], &w[1], self.metric))
            .sum();
        let geometry = if positions.len() >= 2 {
            Geometry::LineString(positions)
        } else {
            let at = positions
                .first()
                .copied()
                .unwrap_or(Position::new(0.0, 0.0));
            create_point(at)
        };
        Route {
            path,
            edges: edge_ids.iter().map(|e| e.to_string()).collect(),
            total_cost,
            total_distance,
            geometry,
        }
    }

    fn route_from_search(&self, prev: &Predecessors<'_>, start: &str, end: &str) -> Option<Route> {
        let (start, end) = (self.nodes.get_key_value(start)?.0, self.nodes.get_key_value(end)?.0);
        let steps = Self::unwind(prev, start.as_str(), end.as_str())?;
        let edge_ids: Vec<&str> = steps.iter().map(|(_, e)| *e).collect();
        Some(self.build_route(start, &edge_ids))
    }

    /// Cheapest route by Dijkstra's algorithm. `Ok(None)` when unreachable.
    pub fn dijkstra(&self, from: &str, to: &str) -> Result<Option<Route>> {
        let start = self.require_node(from)?.id.as_str();
        self.require_node(to)?;
        self.reject_negative_costs("Dijkstra")?;
        let (_, prev) = self.search(start, Some(to), f64::INFINITY, |_| 0.0);
        Ok(self.route_from_search(&prev, from, to))
    }

    /// A* with a straight-line heuristic under the network metric.
    ///
    /// The heuristic is scaled by the smallest cost-per-distance ratio over
    /// all edges, so it never overestimates and the route is optimal.
    pub fn astar(&self, from: &str, to: &str) -> Result<Option<Route>> {
        let start = self.require_node(from)?.id.as_str();
        let goal = self.require_node(to)?.position;
        self.reject_negative_costs("A*")?;

        let scale = self
            .edges
            .values()
            .filter_map(|e| {
                let a = self.nodes.get(&e.from)?.position;
                let b = self.nodes.get(&e.to)?.position;
                let d = distance_between(&a, &b, self.metric);
                (d > 0.0).then(|| e.cost / d)
            })
            .fold(f64::INFINITY, f64::min);
        let scale = if scale.is_finite() { scale.max(0.0) } else { 0.0 };

        let heuristic = |node: &str| {
            self.nodes
                .get(node)
                .map_or(0.0, |n| scale * distance_between(&n.position, &goal, self.metric))
        };
        let (_, prev) = self.search(start, Some(to), f64::INFINITY, heuristic);
        Ok(self.route_from_search(&prev, from, to))
    }

    /// Bellman-Ford shortest path; accepts negative costs and fails with a
    /// topology error when a negative cycle is reachable from `from`.
    pub fn bellman_ford(&self, from: &str, to: &str) -> Result<Option<Route>> {
        let start = self.require_node(from)?.id.as_str();
        self.require_node(to)?;

        let mut dist: FxHashMap<&str, f64> = FxHashMap::default();
        let mut prev: Predecessors<'_> = FxHashMap::default();
        dist.insert(start, 0.0);

        let arcs: Vec<(&str, &str, &Edge)> = self
            .edges
            .values()
            .flat_map(|e| {
                let forward = Some((e.from.as_str(), e.to.as_str(), e));
                let backward = e.bidirectional.then_some((e.to.as_str(), e.from.as_str(), e));
                forward.into_iter().chain(backward)
            })
            .collect();

        for round in 0..=self.nodes.len() {
            let mut changed = false;
            for &(u, v, edge) in &arcs {
                let Some(&du) = dist.get(u) else {
                    continue;
                };
                let candidate = du + edge.cost;
                if dist.get(v).is_none_or(|&dv| candidate < dv) {
                    if round == self.nodes.len() {
                        return Err(GeoscopeError::Topology(format!(
                            "Negative cycle reachable from '{}' through edge '{}'",
                            from, edge.id
                        )));
                    }
                    dist.insert(v, candidate);
                    prev.insert(v, (u, edge.id.as_str()));
                    changed = true;
                }
            }
            if !changed {
                break;
            }
        }
        Ok(self.route_from_search(&prev, from, to))
    }

    /// Nodes reachable from `from` within `max_cost`.
    pub fn service_area(&self, from: &str, max_cost: f64) -> Result<ServiceArea> {
        let start = self.require_node(from)?.id.as_str();
        if max_cost.is_nan() || max_cost < 0.0 {
            return Err(GeoscopeError::InvalidInput(format!(
                "Service area cost limit must be non-negative, got {}",
                max_cost
            )));
        }
        self.reject_negative_costs("Service area")?;

        let (best, _) = self.search(start, None, max_cost, |_| 0.0);
        let mut nodes: Vec<(String, f64)> = best
            .into_iter()
            .map(|(id, cost)| (id.to_string(), cost))
            .collect();
        nodes.sort_by(|a, b| {
            a.1.partial_cmp(&b.1)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        let positions: Vec<Position> = nodes
            .iter()
            .filter_map(|(id, _)| self.nodes.get(id).map(|n| n.position))
            .collect();
        let hull = convex_hull(&positions).map(|ring| Geometry::Polygon(vec![ring]));
        Ok(ServiceArea { nodes, hull })
    }

    /// Every simple path from `from` to `to` using at most `max_edges`
    /// edges, cheapest first.
    pub fn all_paths(&self, from: &str, to: &str, max_edges: usize) -> Result<Vec<Route>> {
        let start = self.require_node(from)?.id.as_str();
        self.require_node(to)?;

        let mut routes = Vec::new();
        if from == to {
            routes.push(self.build_route(start, &[]));
            return Ok(routes);
        }

        // Each frame: node, edges taken so far, nodes visited so far.
        let mut stack: Vec<(&str, Vec<&str>, Vec<&str>)> = vec![(start, Vec::new(), vec![start])];
        while let Some((node, taken, visited)) = stack.pop() {
            if node == to {
                routes.push(self.build_route(start, &taken));
                continue;
            }
            if taken.len() >= max_edges {
                continue;
            }
            for (edge, next) in self.outgoing(node) {
                if visited.contains(&next) {
                    continue;
                }
                let mut taken = taken.clone();
                taken.push(edge.id.as_str());
                let mut visited = visited.clone();
                visited.push(next);
                stack.push((next, taken, visited));
            }
        }

        routes.sort_by(|a, b| {
            a.total_cost
                .partial_cmp(&b.total_cost)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.edges.cmp(&b.edges))
        });
        Ok(routes)
    }

    /// Nearest-neighbour tour over shortest-path costs, starting at the
    /// first stop. `Ok(None)` when some stop cannot be reached.
    pub fn tsp(&self, stops: &[&str], return_to_start: bool) -> Result<Option<Tour>> {
        for stop in stops {
            self.require_node(stop)?;
        }
        let Some(&first) = stops.first() else {
            return Err(GeoscopeError::InvalidInput(
                "Tour needs at least one stop".to_string(),
            ));
        };
        self.reject_negative_costs("Tour")?;

        let mut legs: Vec<Route> = Vec::new();
        let mut order = vec![first.to_string()];
        let mut remaining: Vec<&str> = stops[1..].to_vec();
        let mut current = first;

        while !remaining.is_empty() {
            let mut best: Option<(usize, Route)> = None;
            for (idx, stop) in remaining.iter().enumerate() {
                if let Some(route) = self.dijkstra(current, stop)?
                    && best.as_ref().is_none_or(|(_, b)| route.total_cost < b.total_cost)
                {
                    best = Some((idx, route));
                }
            }
            let Some((idx, route)) = best else {
                return Ok(None);
            };
            current = remaining.remove(idx);
            order.push(current.to_string());
            legs.push(route);
        }

        if return_to_start && stops.len() > 1 {
            let Some(back) = self.dijkstra(current, first)? else {
                return Ok(None);
            };
            order.push(first.to_string());
            legs.push(back);
        }

        let total_cost = legs.iter().map(|l| l.total_cost).sum();
        Ok(Some(Tour {
            order,
            legs,
            total_cost,
        }))
    }
}

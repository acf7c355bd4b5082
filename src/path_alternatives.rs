use std::collections::{HashMap, HashSet};

use super::error::{PathChoiceError, Result};
use super::path_network::{ActiveMode, ActiveNetwork, EdgeIdx, NetworkEdge, NetworkNode,
                          NetworkTraversal, NodeId, PathNetwork};
use super::path_search::CostFunction;


/// Path sizes may exceed 1 by this much from rounding before they are treated as invalid.
const PATH_SIZE_TOLERANCE: f64 = 1e-9;


/// A sequence of edges from an origin node to a destination node.  Two paths are equal if they
/// start at the same node and use the same edges in the same order.
#[derive(Clone, Debug)]
pub struct Path {
    nodes: Vec<NodeId>,
    edges: Vec<EdgeIdx>,
    cost: f64,
    length: f64,
}

impl PartialEq for Path {
    fn eq(&self, other: &Self) -> bool {
        return self.nodes[0] == other.nodes[0] && self.edges == other.edges;
    }
}

impl Path {
    /// The zero-length path that stays at `node`.
    pub fn empty(node: NodeId) -> Path {
        return Path {nodes: vec![node], edges: vec![], cost: 0.0, length: 0.0};
    }

    /// Builds a path from consecutive edges, checking that each movement between them is
    /// allowed and totalling its cost under `cost_function`.
    pub fn from_edges<N, E, T, C>(network: &PathNetwork<N, E, T>, origin: NodeId,
                                  edges: Vec<EdgeIdx>, cost_function: &C) -> Result<Path>
        where N: NetworkNode, E: NetworkEdge, T: NetworkTraversal, C: CostFunction<E, T> {
        let mut nodes = vec![origin];
        let mut cost = 0.0;
        let mut length = 0.0;
        let destination = edges.last().map(|idx| network.edge(*idx).to_node()).unwrap_or(origin);
        let invalid = |reason: String| PathChoiceError::InvalidPath {origin, destination, reason};

        let mut prev_idx: Option<EdgeIdx> = None;
        for edge_idx in &edges {
            let edge = network.edge(*edge_idx);
            let cur_node = nodes[nodes.len() - 1];
            if edge.from_node() != cur_node {
                return Err(invalid(format!("edge ({}, {}) does not start at node {}",
                                           edge.from_node(), edge.to_node(), cur_node)));
            }
            if let Some(prev_idx) = prev_idx {
                let traversal = network.allowed_traversal(prev_idx, *edge_idx).ok_or_else(|| {
                    invalid(format!("movement through node {} is not allowed", cur_node))
                })?;
                cost += cost_function.traversal_cost(traversal);
            }
            cost += cost_function.edge_cost(edge);
            length += edge.length();
            nodes.push(edge.to_node());
            prev_idx = Some(*edge_idx);
        }
        if !cost.is_finite() || !length.is_finite() {
            return Err(invalid(format!("cost {} or length {} is not finite", cost, length)));
        }
        return Ok(Path {nodes, edges, cost, length});
    }

    pub fn nodes(&self) -> &[NodeId] {
        return &self.nodes;
    }

    pub fn edges(&self) -> &[EdgeIdx] {
        return &self.edges;
    }

    pub fn origin(&self) -> NodeId {
        return self.nodes[0];
    }

    pub fn destination(&self) -> NodeId {
        return self.nodes[self.nodes.len() - 1];
    }

    /// Total generalized cost, including traversal costs.
    pub fn cost(&self) -> f64 {
        return self.cost;
    }

    pub fn length(&self) -> f64 {
        return self.length;
    }

    pub fn is_empty(&self) -> bool {
        return self.edges.is_empty();
    }
}


/// The distinct paths generated for one OD pair.
#[derive(Clone, Debug)]
pub struct PathAlternativeList {
    origin: NodeId,
    destination: NodeId,
    max_size: usize,
    paths: Vec<Path>,
    sample_sufficient: bool,
}

impl PathAlternativeList {
    pub fn new(origin: NodeId, destination: NodeId, max_size: usize) -> PathAlternativeList {
        return PathAlternativeList {origin, destination, max_size, paths: vec![],
                                    sample_sufficient: true};
    }

    /// False when sampling stopped before the paths covered enough distinct network.
    pub fn is_sample_sufficient(&self) -> bool {
        return self.sample_sufficient;
    }

    pub fn set_sample_sufficient(&mut self, sufficient: bool) {
        self.sample_sufficient = sufficient;
    }

    /// Adds the path unless the list is full or already holds an identical path.
    pub fn try_add(&mut self, path: Path) -> bool {
        if self.paths.len() >= self.max_size || self.paths.contains(&path) {
            return false;
        }
        self.paths.push(path);
        return true;
    }

    /// Stable, so equal-cost paths keep the order they were found in.
    pub fn sort_by_cost(&mut self) {
        self.paths.sort_by(|aa, bb| aa.cost.partial_cmp(&bb.cost)
                                       .unwrap_or(std::cmp::Ordering::Equal));
    }

    pub fn origin(&self) -> NodeId {
        return self.origin;
    }

    pub fn destination(&self) -> NodeId {
        return self.destination;
    }

    pub fn paths(&self) -> &[Path] {
        return &self.paths;
    }

    pub fn len(&self) -> usize {
        return self.paths.len();
    }

    pub fn is_empty(&self) -> bool {
        return self.paths.is_empty();
    }

    fn invalid(&self, reason: String) -> PathChoiceError {
        return PathChoiceError::InvalidPath {
            origin: self.origin,
            destination: self.destination,
            reason,
        };
    }

    /// The share of each path's length that it does not share with the other paths, with each
    /// edge's length divided evenly among the paths using it.
    pub fn path_sizes<N, E, T>(&self, network: &PathNetwork<N, E, T>) -> Result<Vec<f64>>
        where N: NetworkNode, E: NetworkEdge, T: NetworkTraversal {
        let mut overlap_counts: HashMap<EdgeIdx, usize> = HashMap::new();
        for path in &self.paths {
            let unique_edges: HashSet<&EdgeIdx> = path.edges.iter().collect();
            for edge_idx in unique_edges {
                *overlap_counts.entry(*edge_idx).or_insert(0) += 1;
            }
        }

        let mut sizes = Vec::with_capacity(self.paths.len());
        for (ii, path) in self.paths.iter().enumerate() {
            if path.is_empty() {
                sizes.push(1.0);
                continue;
            }
            if !(path.length > 0.0) {
                return Err(self.invalid(format!("alternative {} has zero length", ii)));
            }
            let mut size = 0.0;
            for edge_idx in &path.edges {
                let edge_length = network.edge(*edge_idx).length();
                size += (edge_length / path.length) / overlap_counts[edge_idx] as f64;
            }
            if !(size > 0.0) || size > 1.0 + PATH_SIZE_TOLERANCE {
                return Err(self.invalid(format!("alternative {} has path size {}", ii, size)));
            }
            sizes.push(size.min(1.0));
        }
        return Ok(sizes);
    }

    /// Roughly the number of independent paths in the list.
    pub fn path_size_total<N, E, T>(&self, network: &PathNetwork<N, E, T>) -> Result<f64>
        where N: NetworkNode, E: NetworkEdge, T: NetworkTraversal {
        return Ok(self.path_sizes(network)?.iter().sum());
    }
}


/// Aggregate attributes of one path on an active-transport network.  Counts are stored as
/// floats so that every attribute can enter a utility function directly.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct PathAttributes {
    pub distance: f64,
    pub generalized_cost: f64,
    pub gain: f64,
    pub turns: f64,
    pub signals: f64,
    pub unsig_left_from_major: f64,
    pub unsig_left_from_minor: f64,
    pub unsig_cross_major: f64,
    pub unsig_cross_minor: f64,
    pub dist_class_1: f64,
    pub dist_class_2: f64,
    pub dist_class_3: f64,
    pub dist_art_no_lane: f64,
    pub dist_cycle_track: f64,
    pub dist_bike_blvd: f64,
    pub path_size: f64,
}

impl PathAttributes {
    pub fn for_path(network: &ActiveNetwork, path: &Path, mode: ActiveMode, path_size: f64)
                    -> Result<PathAttributes> {
        let mut attrs = PathAttributes {path_size, ..Default::default()};
        let mut prev_edge: Option<EdgeIdx> = None;
        for edge_idx in path.edges() {
            let edge = network.edge(*edge_idx);
            attrs.distance += edge.distance;
            attrs.generalized_cost += mode.edge_cost(edge);
            attrs.gain += edge.gain;
            match edge.bike_class {
                1 => attrs.dist_class_1 += edge.distance,
                2 => attrs.dist_class_2 += edge.distance,
                3 => attrs.dist_class_3 += edge.distance,
                _ => (),
            }
            if edge.is_arterial_without_lane() {
                attrs.dist_art_no_lane += edge.distance;
            }
            if edge.cycle_track {
                attrs.dist_cycle_track += edge.distance;
            }
            if edge.bike_blvd {
                attrs.dist_bike_blvd += edge.distance;
            }

            if let Some(prev_idx) = prev_edge {
                let traversal = network.allowed_traversal(prev_idx, *edge_idx).ok_or_else(|| {
                    PathChoiceError::InvalidPath {
                        origin: path.origin(),
                        destination: path.destination(),
                        reason: format!("movement through node {} is not allowed", edge.from),
                    }
                })?;
                attrs.generalized_cost += mode.traversal_cost(traversal);
                if traversal.turn_type.is_turn() {
                    attrs.turns += 1.0;
                }
                if traversal.signalized {
                    attrs.signals += 1.0;
                }
                attrs.unsig_left_from_major += traversal.unsig_left_from_major as u8 as f64;
                attrs.unsig_left_from_minor += traversal.unsig_left_from_minor as u8 as f64;
                attrs.unsig_cross_major += traversal.unsig_cross_major as u8 as f64;
                attrs.unsig_cross_minor += traversal.unsig_cross_minor as u8 as f64;
            }
            prev_edge = Some(*edge_idx);
        }

        attrs.check_finite(path)?;
        return Ok(attrs);
    }

    fn check_finite(&self, path: &Path) -> Result<()> {
        let values = [
            self.distance, self.generalized_cost, self.gain, self.turns, self.signals,
            self.dist_class_1, self.dist_class_2, self.dist_class_3, self.dist_art_no_lane,
            self.dist_cycle_track, self.dist_bike_blvd, self.path_size,
        ];
        if values.iter().all(|vv| vv.is_finite()) {
            return Ok(());
        }
        return Err(PathChoiceError::InvalidPath {
            origin: path.origin(),
            destination: path.destination(),
            reason: format!("non-finite attributes {:?}", self),
        });
    }
}

/// Attributes of every path in the list, including each one's path size.
pub fn list_attributes(network: &ActiveNetwork, alternatives: &PathAlternativeList,
                       mode: ActiveMode) -> Result<Vec<PathAttributes>> {
    let sizes = alternatives.path_sizes(network)?;
    let mut all_attrs = Vec::with_capacity(sizes.len());
    for (path, size) in alternatives.paths().iter().zip(sizes) {
        all_attrs.push(PathAttributes::for_path(network, path, mode, size)?);
    }
    return Ok(all_attrs);
}


#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use super::super::path_network::{ActiveEdge, ActiveNode, ActiveTraversal, TurnType};
    use super::super::test_utils::{diamond_network, NODE_A, NODE_B, NODE_C, NODE_D};

    fn path_via(network: &ActiveNetwork, nodes: &[NodeId]) -> Path {
        let edges = nodes.windows(2)
            .map(|ww| network.edge_idx(ww[0], ww[1]).unwrap())
            .collect();
        return Path::from_edges(network, nodes[0], edges, &ActiveMode::Bike).unwrap();
    }

    /// A -> B -> D with a shortcut B -> C -> D sharing the first edge.
    fn overlapping_network() -> ActiveNetwork {
        let nodes = vec![
            ActiveNode::new(1, 0., 0.), ActiveNode::new(2, 2., 0.), ActiveNode::new(3, 3., 1.),
            ActiveNode::new(4, 4., 0.),
        ];
        let mut shared = ActiveEdge::new(1, 2, 2.0);
        shared.bike_class = 1;
        shared.gain = 3.0;
        let mut arterial = ActiveEdge::new(2, 4, 2.0);
        arterial.functional_class = 2;
        let mut cycle_track = ActiveEdge::new(2, 3, 1.0);
        cycle_track.cycle_track = true;
        cycle_track.bike_class = 2;
        let edges = vec![shared, arterial, cycle_track, ActiveEdge::new(3, 4, 1.0)];
        let mut signal_left = ActiveTraversal::new(1, 2, 3, TurnType::Left, 0.5);
        signal_left.signalized = true;
        let mut right = ActiveTraversal::new(2, 3, 4, TurnType::Right, 0.25);
        right.unsig_cross_minor = true;
        let traversals = vec![
            ActiveTraversal::new(1, 2, 4, TurnType::None, 0.0),
            signal_left,
            right,
        ];
        return ActiveNetwork::new(nodes, edges, traversals).unwrap();
    }

    #[test]
    fn test_path_from_edges() {
        let network = diamond_network(false);
        let path = path_via(&network, &[NODE_A, NODE_B, NODE_D]);
        assert_eq!(path.nodes(), &[NODE_A, NODE_B, NODE_D]);
        assert_eq!(path.origin(), NODE_A);
        assert_eq!(path.destination(), NODE_D);
        assert_relative_eq!(path.cost(), 2.0);
        assert_relative_eq!(path.length(), 2.0);

        // edges that don't connect
        let ab = network.edge_idx(NODE_A, NODE_B).unwrap();
        let cd = network.edge_idx(NODE_C, NODE_D).unwrap();
        assert!(matches!(Path::from_edges(&network, NODE_A, vec![ab, cd], &ActiveMode::Bike),
                         Err(PathChoiceError::InvalidPath { .. })));
        // a prohibited movement
        let network = diamond_network(true);
        let bd = network.edge_idx(NODE_B, NODE_D).unwrap();
        assert!(Path::from_edges(&network, NODE_A, vec![ab, bd], &ActiveMode::Bike).is_err());
    }

    #[test]
    fn test_dedup_and_capacity() {
        let network = diamond_network(false);
        let mut alternatives = PathAlternativeList::new(NODE_A, NODE_D, 2);
        assert!(alternatives.try_add(path_via(&network, &[NODE_A, NODE_B, NODE_D])));
        assert!(!alternatives.try_add(path_via(&network, &[NODE_A, NODE_B, NODE_D])));
        assert!(alternatives.try_add(path_via(&network, &[NODE_A, NODE_C, NODE_D])));
        assert_eq!(alternatives.len(), 2);

        let mut full = PathAlternativeList::new(NODE_A, NODE_D, 1);
        assert!(full.try_add(path_via(&network, &[NODE_A, NODE_C, NODE_D])));
        assert!(!full.try_add(path_via(&network, &[NODE_A, NODE_B, NODE_D])));
    }

    #[test]
    fn test_disjoint_path_sizes() {
        let network = diamond_network(false);
        let mut alternatives = PathAlternativeList::new(NODE_A, NODE_D, 4);
        alternatives.try_add(path_via(&network, &[NODE_A, NODE_B, NODE_D]));
        let sizes = alternatives.path_sizes(&network).unwrap();
        assert_eq!(sizes, vec![1.0]);
        alternatives.try_add(path_via(&network, &[NODE_A, NODE_C, NODE_D]));
        let sizes = alternatives.path_sizes(&network).unwrap();
        assert_relative_eq!(sizes[0], 1.0);
        assert_relative_eq!(sizes[1], 1.0);
    }

    #[test]
    fn test_overlapping_path_sizes() {
        let network = overlapping_network();
        let mut alternatives = PathAlternativeList::new(1, 4, 4);
        alternatives.try_add(path_via(&network, &[1, 2, 4]));
        alternatives.try_add(path_via(&network, &[1, 2, 3, 4]));
        let sizes = alternatives.path_sizes(&network).unwrap();
        // each path spends half its length on the shared edge
        assert_relative_eq!(sizes[0], 0.5 * 0.5 + 0.5);
        assert_relative_eq!(sizes[1], 0.5 * 0.5 + 0.5);
        for size in sizes {
            assert!(size > 0.0 && size <= 1.0);
        }
        assert_relative_eq!(alternatives.path_size_total(&network).unwrap(), 1.5);
        assert!(alternatives.is_sample_sufficient());
    }

    #[test]
    fn test_zero_length_path_rejected() {
        let nodes = vec![ActiveNode::new(1, 0., 0.), ActiveNode::new(2, 0., 0.)];
        let network = ActiveNetwork::new(nodes, vec![ActiveEdge::new(1, 2, 0.0)], vec![])
            .unwrap();
        let mut alternatives = PathAlternativeList::new(1, 2, 2);
        alternatives.try_add(path_via(&network, &[1, 2]));
        assert!(matches!(alternatives.path_sizes(&network),
                         Err(PathChoiceError::InvalidPath { .. })));
    }

    #[test]
    fn test_sort_by_cost() {
        let network = overlapping_network();
        let mut alternatives = PathAlternativeList::new(1, 4, 4);
        alternatives.try_add(path_via(&network, &[1, 2, 3, 4]));
        alternatives.try_add(path_via(&network, &[1, 2, 4]));
        alternatives.sort_by_cost();
        assert_eq!(alternatives.paths()[0].nodes(), &[1, 2, 4]);
        assert_relative_eq!(alternatives.paths()[1].cost(), 4.75);
    }

    #[test]
    fn test_path_attributes() {
        let network = overlapping_network();
        let mut alternatives = PathAlternativeList::new(1, 4, 4);
        alternatives.try_add(path_via(&network, &[1, 2, 4]));
        alternatives.try_add(path_via(&network, &[1, 2, 3, 4]));
        let attrs = list_attributes(&network, &alternatives, ActiveMode::Bike).unwrap();

        let direct = &attrs[0];
        assert_relative_eq!(direct.distance, 4.0);
        assert_relative_eq!(direct.generalized_cost, 4.0);
        assert_relative_eq!(direct.gain, 3.0);
        assert_relative_eq!(direct.dist_class_1, 2.0);
        assert_relative_eq!(direct.dist_art_no_lane, 2.0);
        assert_relative_eq!(direct.turns, 0.0);
        assert_relative_eq!(direct.path_size, 0.75);

        let detour = &attrs[1];
        assert_relative_eq!(detour.distance, 4.0);
        assert_relative_eq!(detour.generalized_cost, 4.75);
        assert_relative_eq!(detour.turns, 2.0);
        assert_relative_eq!(detour.signals, 1.0);
        assert_relative_eq!(detour.unsig_cross_minor, 1.0);
        assert_relative_eq!(detour.dist_class_2, 1.0);
        assert_relative_eq!(detour.dist_cycle_track, 1.0);
        assert_relative_eq!(detour.dist_art_no_lane, 0.0);

        // walkers skip the turn penalties
        let attrs = list_attributes(&network, &alternatives, ActiveMode::Walk).unwrap();
        assert_relative_eq!(attrs[1].generalized_cost, 4.0);
    }
}

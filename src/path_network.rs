// this file defines a struct to represent a network of streets, bike paths, and footpaths for an
// area, with the turning movements allowed between them.  It's a wrapper around a petgraph graph.
use std::collections::HashMap;
use std::collections::HashSet;
use std::fmt;

use petgraph::Direction;
use petgraph::algo::kosaraju_scc;
use petgraph::graphmap::DiGraphMap;

use super::error::{PathChoiceError, Result};
use super::geometry::Point2d;


pub type NodeId = u32;
/// Position of an edge in the network's edge list.  Stable for the lifetime of the network.
pub type EdgeIdx = usize;

pub trait NetworkNode {
    fn id(&self) -> NodeId;
    fn position(&self) -> &Point2d;
    /// The zone this node represents in the given zone system, if any.
    fn zone(&self, zone_field: &str) -> Option<u32>;
    fn is_centroid(&self) -> bool;
}

pub trait NetworkEdge {
    fn from_node(&self) -> NodeId;
    fn to_node(&self) -> NodeId;
    fn length(&self) -> f64;
    /// Search costs must be finite and nonnegative.
    fn has_valid_costs(&self) -> bool {
        return is_valid_cost(self.length());
    }
}

pub trait NetworkTraversal {
    fn from_node(&self) -> NodeId;
    fn thru_node(&self) -> NodeId;
    fn to_node(&self) -> NodeId;
    fn turn_type(&self) -> TurnType;
    fn cost(&self) -> f64;
    fn is_prohibited(&self) -> bool;
    fn has_valid_costs(&self) -> bool {
        return is_valid_cost(self.cost());
    }
    /// A traversal for a movement that no input record permits.
    fn no_connection(from: NodeId, thru: NodeId, to: NodeId) -> Self where Self: Sized;
}

pub fn is_valid_cost(cost: f64) -> bool {
    return cost.is_finite() && cost >= 0.0;
}


#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum TurnType {
    #[default]
    None,
    Left,
    Right,
    Reversal,
    NoConnection,
}

impl TurnType {
    pub fn is_turn(&self) -> bool {
        match self {
            TurnType::Left | TurnType::Right | TurnType::Reversal => true,
            _ => false,
        }
    }

    /// Parses either a numeric turn code (0 = none, 1 = left, 2 = right, 3 = reversal,
    /// 4 = no connection) or the turn name.
    pub fn parse(value: &str) -> Result<TurnType> {
        let turn_type = match value.trim().to_lowercase().as_str() {
            "0" | "none" | "thru" | "through" => TurnType::None,
            "1" | "left" => TurnType::Left,
            "2" | "right" => TurnType::Right,
            "3" | "reversal" | "u-turn" => TurnType::Reversal,
            "4" | "no_connection" | "noconnection" => TurnType::NoConnection,
            _ => return Err(PathChoiceError::Parse {
                field: String::from("turn_type"),
                value: String::from(value),
            }),
        };
        return Ok(turn_type);
    }
}

impl fmt::Display for TurnType {
    fn fmt(&self, ff: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            TurnType::None => "none",
            TurnType::Left => "left",
            TurnType::Right => "right",
            TurnType::Reversal => "reversal",
            TurnType::NoConnection => "no_connection",
        };
        write!(ff, "{}", name)
    }
}


#[derive(Clone, Debug, PartialEq)]
pub struct ActiveNode {
    pub id: NodeId,
    pub position: Point2d,
    pub zones: HashMap<String, u32>,
    pub signalized: bool,
}

impl ActiveNode {
    pub fn new(id: NodeId, x_coord: f64, y_coord: f64) -> ActiveNode {
        return ActiveNode {
            id,
            position: Point2d::new(x_coord, y_coord),
            zones: HashMap::new(),
            signalized: false,
        };
    }

    pub fn with_zone(mut self, zone_field: &str, zone: u32) -> ActiveNode {
        self.zones.insert(String::from(zone_field), zone);
        return self;
    }
}

impl NetworkNode for ActiveNode {
    fn id(&self) -> NodeId {
        return self.id;
    }

    fn position(&self) -> &Point2d {
        return &self.position;
    }

    fn zone(&self, zone_field: &str) -> Option<u32> {
        // zero is the "no zone" code in the network files
        return self.zones.get(zone_field).copied().filter(|zz| *zz > 0);
    }

    fn is_centroid(&self) -> bool {
        return self.zones.values().any(|zz| *zz > 0);
    }
}


#[derive(Clone, Debug, PartialEq, Default)]
pub struct ActiveEdge {
    pub from: NodeId,
    pub to: NodeId,
    pub distance: f64,
    pub gain: f64,
    pub bike_cost: f64,
    pub walk_cost: f64,
    pub bike_class: u8,
    pub lanes: u8,
    pub functional_class: u8,
    pub centroid_connector: bool,
    pub cycle_track: bool,
    pub bike_blvd: bool,
    pub autos_permitted: bool,
}

impl ActiveEdge {
    /// An edge whose bike and walk costs both equal its distance.
    pub fn new(from: NodeId, to: NodeId, distance: f64) -> ActiveEdge {
        return ActiveEdge {
            from,
            to,
            distance,
            bike_cost: distance,
            walk_cost: distance,
            ..Default::default()
        };
    }

    /// Arterials (functional classes 1 to 3) without a marked bike lane.
    pub fn is_arterial_without_lane(&self) -> bool {
        return self.functional_class > 0 && self.functional_class <= 3 && self.bike_class != 2;
    }
}

impl NetworkEdge for ActiveEdge {
    fn from_node(&self) -> NodeId {
        return self.from;
    }

    fn to_node(&self) -> NodeId {
        return self.to;
    }

    fn length(&self) -> f64 {
        return self.distance;
    }

    fn has_valid_costs(&self) -> bool {
        return is_valid_cost(self.distance) && is_valid_cost(self.bike_cost) &&
            is_valid_cost(self.walk_cost);
    }
}


#[derive(Clone, Debug, PartialEq, Default)]
pub struct ActiveTraversal {
    pub from: NodeId,
    pub thru: NodeId,
    pub to: NodeId,
    pub turn_type: TurnType,
    pub cost: f64,
    /// What pedestrians pay for passing through a zone centroid.  Cyclists pay `cost` instead.
    pub centroid_cost: f64,
    pub thru_centroid: bool,
    pub signalized: bool,
    pub unsig_left_from_major: bool,
    pub unsig_left_from_minor: bool,
    pub unsig_cross_major: bool,
    pub unsig_cross_minor: bool,
    pub prohibited: bool,
}

impl ActiveTraversal {
    pub fn new(from: NodeId, thru: NodeId, to: NodeId, turn_type: TurnType, cost: f64)
               -> ActiveTraversal {
        return ActiveTraversal {from, thru, to, turn_type, cost, ..Default::default()};
    }
}

impl NetworkTraversal for ActiveTraversal {
    fn from_node(&self) -> NodeId {
        return self.from;
    }

    fn thru_node(&self) -> NodeId {
        return self.thru;
    }

    fn to_node(&self) -> NodeId {
        return self.to;
    }

    fn turn_type(&self) -> TurnType {
        return self.turn_type;
    }

    fn cost(&self) -> f64 {
        return self.cost;
    }

    fn is_prohibited(&self) -> bool {
        return self.prohibited || self.turn_type == TurnType::NoConnection;
    }

    fn has_valid_costs(&self) -> bool {
        return is_valid_cost(self.cost) && is_valid_cost(self.centroid_cost);
    }

    fn no_connection(from: NodeId, thru: NodeId, to: NodeId) -> ActiveTraversal {
        let mut traversal = ActiveTraversal::new(from, thru, to, TurnType::NoConnection, 0.0);
        traversal.prohibited = true;
        return traversal;
    }
}


/// The travel mode whose generalized costs drive path search.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ActiveMode {
    Bike,
    Walk,
}

impl ActiveMode {
    pub fn parse(value: &str) -> Result<ActiveMode> {
        match value.trim().to_lowercase().as_str() {
            "bike" | "bicycle" => Ok(ActiveMode::Bike),
            "walk" | "pedestrian" => Ok(ActiveMode::Walk),
            _ => Err(PathChoiceError::Parse {
                field: String::from("mode"),
                value: String::from(value),
            }),
        }
    }

    pub fn edge_cost(&self, edge: &ActiveEdge) -> f64 {
        match self {
            ActiveMode::Bike => edge.bike_cost,
            ActiveMode::Walk => edge.walk_cost,
        }
    }

    /// Pedestrians pay no turn or signal penalties, only the centroid-through part of the cost.
    pub fn traversal_cost(&self, traversal: &ActiveTraversal) -> f64 {
        match self {
            ActiveMode::Bike => traversal.cost,
            ActiveMode::Walk => traversal.centroid_cost,
        }
    }
}


pub type ActiveNetwork = PathNetwork<ActiveNode, ActiveEdge, ActiveTraversal>;

/// An immutable, indexed network of nodes, directed edges, and the turning movements between
/// consecutive edges.  Safe to share across threads once built.
pub struct PathNetwork<N, E, T> {
    nodes: Vec<N>,
    node_idxs_by_id: HashMap<NodeId, usize>,
    edges: Vec<E>,
    // edge weights are indices into `edges`
    graph: DiGraphMap<NodeId, EdgeIdx>,
    traversals: Vec<T>,
    traversal_idxs: HashMap<(NodeId, NodeId, NodeId), usize>,
}

impl<N, E, T> PathNetwork<N, E, T>
    where N: NetworkNode, E: NetworkEdge, T: NetworkTraversal {
    /// Builds the network in one pass.  Every pair of consecutive edges with no matching
    /// traversal record gets a prohibited traversal, so disallowed turns are represented rather
    /// than missing.
    pub fn new(nodes: Vec<N>, edges: Vec<E>, traversals: Vec<T>) -> Result<PathNetwork<N, E, T>> {
        let mut graph = DiGraphMap::new();
        let mut node_idxs_by_id = HashMap::new();
        for (ii, node) in nodes.iter().enumerate() {
            if node_idxs_by_id.insert(node.id(), ii).is_some() {
                return Err(PathChoiceError::InvalidNetwork(
                    format!("node {} is defined more than once", node.id())));
            }
            graph.add_node(node.id());
        }

        let mut kept_edges = vec![];
        for edge in edges {
            let (from_id, to_id) = (edge.from_node(), edge.to_node());
            if from_id == to_id {
                // ignore self-connections
                log::info!("skipping self-connected edge at node {}", from_id);
                continue;
            }
            for node_id in &[from_id, to_id] {
                if !node_idxs_by_id.contains_key(node_id) {
                    return Err(PathChoiceError::not_found("node", node_id));
                }
            }
            if graph.contains_edge(from_id, to_id) {
                return Err(PathChoiceError::InvalidNetwork(
                    format!("edge ({}, {}) is defined more than once", from_id, to_id)));
            }
            if !edge.has_valid_costs() {
                return Err(PathChoiceError::InvalidNetwork(
                    format!("edge ({}, {}) has a negative or non-finite length or cost",
                            from_id, to_id)));
            }
            graph.add_edge(from_id, to_id, kept_edges.len());
            kept_edges.push(edge);
        }

        let mut network = PathNetwork {
            nodes,
            node_idxs_by_id,
            edges: kept_edges,
            graph,
            traversals: vec![],
            traversal_idxs: HashMap::new(),
        };

        for traversal in traversals {
            let key = (traversal.from_node(), traversal.thru_node(), traversal.to_node());
            network.get_edge(key.0, key.1)?;
            network.get_edge(key.1, key.2)?;
            if network.traversal_idxs.contains_key(&key) {
                return Err(PathChoiceError::InvalidNetwork(
                    format!("traversal {:?} is defined more than once", key)));
            }
            if !traversal.has_valid_costs() {
                return Err(PathChoiceError::InvalidNetwork(
                    format!("traversal {:?} has a negative or non-finite cost", key)));
            }
            network.traversal_idxs.insert(key, network.traversals.len());
            network.traversals.push(traversal);
        }
        network.complete_traversals();
        network.log_components();

        log::info!("built network with {} nodes, {} edges, and {} traversals",
                   network.node_count(), network.edge_count(), network.traversal_count());
        return Ok(network);
    }

    fn complete_traversals(&mut self) {
        let mut missing = vec![];
        for edge in &self.edges {
            let (from_id, thru_id) = (edge.from_node(), edge.to_node());
            for to_id in self.successors(thru_id) {
                let key = (from_id, thru_id, to_id);
                if !self.traversal_idxs.contains_key(&key) {
                    missing.push(key);
                }
            }
        }
        if missing.len() > 0 {
            log::debug!("{} movements have no traversal record and are prohibited",
                        missing.len());
        }
        for key in missing {
            self.traversal_idxs.insert(key, self.traversals.len());
            self.traversals.push(T::no_connection(key.0, key.1, key.2));
        }
    }

    fn log_components(&self) {
        let comps = self.connected_components();
        if comps.len() > 1 {
            log::warn!("there are {} strongly connected components", comps.len());
            for comp in comps.iter().filter(|cc| cc.len() < 10) {
                log::debug!("small component has nodes: {:?}", comp);
            }
        }
    }

    pub fn get_node(&self, id: NodeId) -> Result<&N> {
        match self.node_idxs_by_id.get(&id) {
            Some(idx) => Ok(&self.nodes[*idx]),
            None => Err(PathChoiceError::not_found("node", id)),
        }
    }

    pub fn contains_node(&self, id: NodeId) -> bool {
        return self.node_idxs_by_id.contains_key(&id);
    }

    pub fn get_edge(&self, from: NodeId, to: NodeId) -> Result<&E> {
        match self.edge_idx(from, to) {
            Some(idx) => Ok(&self.edges[idx]),
            None => Err(PathChoiceError::not_found("edge", format!("({}, {})", from, to))),
        }
    }

    pub fn edge_idx(&self, from: NodeId, to: NodeId) -> Option<EdgeIdx> {
        return self.graph.edge_weight(from, to).copied();
    }

    pub fn edge(&self, idx: EdgeIdx) -> &E {
        return &self.edges[idx];
    }

    pub fn get_traversal(&self, from: NodeId, thru: NodeId, to: NodeId) -> Result<&T> {
        match self.traversal(from, thru, to) {
            Some(traversal) => Ok(traversal),
            None => Err(PathChoiceError::not_found(
                "traversal", format!("({}, {}, {})", from, thru, to))),
        }
    }

    pub fn traversal(&self, from: NodeId, thru: NodeId, to: NodeId) -> Option<&T> {
        return self.traversal_idxs.get(&(from, thru, to)).map(|idx| &self.traversals[*idx]);
    }

    /// The traversal between two edges, if the movement exists and is not prohibited.
    pub fn allowed_traversal(&self, from_edge: EdgeIdx, to_edge: EdgeIdx) -> Option<&T> {
        let from_edge = &self.edges[from_edge];
        let to_edge = &self.edges[to_edge];
        if from_edge.to_node() != to_edge.from_node() {
            return None;
        }
        return self.traversal(from_edge.from_node(), from_edge.to_node(), to_edge.to_node())
            .filter(|tt| !tt.is_prohibited());
    }

    /// Unknown nodes have no successors.
    pub fn successors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        return self.graph.neighbors_directed(id, Direction::Outgoing);
    }

    pub fn predecessors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        return self.graph.neighbors_directed(id, Direction::Incoming);
    }

    pub fn outgoing_edges(&self, id: NodeId) -> impl Iterator<Item = EdgeIdx> + '_ {
        return self.graph.edges(id).map(|(_, _, idx)| *idx);
    }

    pub fn incoming_edges(&self, id: NodeId) -> impl Iterator<Item = EdgeIdx> + '_ {
        return self.predecessors(id)
            .filter_map(move |pred| self.graph.edge_weight(pred, id).copied());
    }

    pub fn nodes(&self) -> impl Iterator<Item = &N> {
        return self.nodes.iter();
    }

    pub fn edges(&self) -> impl Iterator<Item = &E> {
        return self.edges.iter();
    }

    pub fn traversals(&self) -> impl Iterator<Item = &T> {
        return self.traversals.iter();
    }

    pub fn node_count(&self) -> usize {
        return self.nodes.len();
    }

    pub fn edge_count(&self) -> usize {
        return self.edges.len();
    }

    pub fn traversal_count(&self) -> usize {
        return self.traversals.len();
    }

    pub fn connected_components(&self) -> Vec<Vec<NodeId>> {
        return kosaraju_scc(&self.graph);
    }

    /// Nodes that represent a zone in the given zone system, as (zone, node id) pairs.
    pub fn zone_nodes(&self, zone_field: &str) -> Vec<(u32, NodeId)> {
        let mut seen = HashSet::new();
        let mut zone_nodes = vec![];
        for node in &self.nodes {
            if let Some(zone) = node.zone(zone_field) {
                if seen.insert(zone) {
                    zone_nodes.push((zone, node.id()));
                } else {
                    log::warn!("zone {} has more than one node; keeping the first", zone);
                }
            }
        }
        zone_nodes.sort();
        return zone_nodes;
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use super::super::test_utils::{diamond_network, NODE_A, NODE_B, NODE_C, NODE_D, NODE_E};

    #[test]
    fn test_lookups() {
        let network = diamond_network(false);
        assert_eq!(network.node_count(), 5);
        assert_eq!(network.edge_count(), 4);
        assert_eq!(network.get_node(NODE_A).unwrap().id, NODE_A);
        assert_eq!(network.get_edge(NODE_A, NODE_B).unwrap().distance, 1.0);
        let traversal = network.get_traversal(NODE_A, NODE_B, NODE_D).unwrap();
        assert_eq!(traversal.turn_type, TurnType::None);
        assert!(!traversal.is_prohibited());

        match network.get_node(99) {
            Err(PathChoiceError::NotFound { entity, .. }) => assert_eq!(entity, "node"),
            _ => panic!("expected a missing node"),
        }
        assert!(network.get_edge(NODE_B, NODE_A).is_err());
        assert!(network.get_traversal(NODE_A, NODE_C, NODE_B).is_err());
    }

    #[test]
    fn test_adjacency_consistency() {
        let network = diamond_network(false);
        for node in network.nodes() {
            for succ in network.successors(node.id) {
                assert!(network.get_edge(node.id, succ).is_ok());
                let preds: Vec<NodeId> = network.predecessors(succ).collect();
                assert_eq!(preds.iter().filter(|pp| **pp == node.id).count(), 1);
            }
        }
        for edge in network.edges() {
            let succs: Vec<NodeId> = network.successors(edge.from).collect();
            assert_eq!(succs.iter().filter(|ss| **ss == edge.to).count(), 1);
        }
        let succs: Vec<NodeId> = network.successors(NODE_A).collect();
        assert_eq!(succs, vec![NODE_B, NODE_C]);
        assert_eq!(network.successors(NODE_E).count(), 0);
        assert_eq!(network.incoming_edges(NODE_D).count(), 2);
        assert_eq!(network.outgoing_edges(NODE_D).count(), 0);
    }

    #[test]
    fn test_traversal_consistency() {
        let network = diamond_network(true);
        for traversal in network.traversals() {
            assert!(network.get_edge(traversal.from, traversal.thru).is_ok());
            assert!(network.get_edge(traversal.thru, traversal.to).is_ok());
        }
        for edge in network.edges() {
            for next in network.successors(edge.to) {
                assert!(network.get_traversal(edge.from, edge.to, next).is_ok());
            }
        }
        // the missing record is represented as a prohibited movement
        let traversal = network.get_traversal(NODE_A, NODE_B, NODE_D).unwrap();
        assert!(traversal.is_prohibited());
        assert_eq!(traversal.turn_type, TurnType::NoConnection);
        let ab = network.edge_idx(NODE_A, NODE_B).unwrap();
        let bd = network.edge_idx(NODE_B, NODE_D).unwrap();
        assert!(network.allowed_traversal(ab, bd).is_none());
        let ac = network.edge_idx(NODE_A, NODE_C).unwrap();
        let cd = network.edge_idx(NODE_C, NODE_D).unwrap();
        assert!(network.allowed_traversal(ac, cd).is_some());
        assert!(network.allowed_traversal(ab, cd).is_none());
    }

    #[test]
    fn test_construction_errors() {
        let nodes = vec![ActiveNode::new(1, 0., 0.), ActiveNode::new(2, 1., 0.)];
        let edges = vec![ActiveEdge::new(1, 3, 1.0)];
        match ActiveNetwork::new(nodes.clone(), edges, vec![]) {
            Err(PathChoiceError::NotFound { entity, id }) => {
                assert_eq!(entity, "node");
                assert_eq!(id, "3");
            }
            _ => panic!("expected a missing node"),
        }

        let edges = vec![ActiveEdge::new(1, 2, 1.0), ActiveEdge::new(1, 2, 2.0)];
        assert!(matches!(ActiveNetwork::new(nodes.clone(), edges, vec![]),
                         Err(PathChoiceError::InvalidNetwork(_))));

        let edges = vec![ActiveEdge::new(1, 2, 1.0), ActiveEdge::new(2, 1, 1.0)];
        let traversals = vec![ActiveTraversal::new(2, 1, 3, TurnType::None, 0.0)];
        assert!(matches!(ActiveNetwork::new(nodes.clone(), edges, traversals),
                         Err(PathChoiceError::NotFound { entity: "edge", .. })));

        let duplicate_nodes = vec![ActiveNode::new(1, 0., 0.), ActiveNode::new(1, 1., 0.)];
        assert!(ActiveNetwork::new(duplicate_nodes, vec![], vec![]).is_err());
    }

    #[test]
    fn test_invalid_costs_rejected() {
        let nodes = vec![ActiveNode::new(1, 0., 0.), ActiveNode::new(2, 1., 0.),
                         ActiveNode::new(3, 0., 1.)];
        let mut negative = ActiveEdge::new(3, 2, 1.0);
        negative.bike_cost = -5.0;
        let edges = vec![ActiveEdge::new(1, 2, 1.0), ActiveEdge::new(1, 3, 2.0), negative];
        match ActiveNetwork::new(nodes.clone(), edges, vec![]) {
            Err(PathChoiceError::InvalidNetwork(msg)) => assert!(msg.contains("(3, 2)")),
            _ => panic!("expected a negative edge cost to be rejected"),
        }

        let mut unbounded = ActiveEdge::new(3, 2, 1.0);
        unbounded.walk_cost = f64::NAN;
        let edges = vec![ActiveEdge::new(1, 3, 2.0), unbounded];
        assert!(matches!(ActiveNetwork::new(nodes.clone(), edges, vec![]),
                         Err(PathChoiceError::InvalidNetwork(_))));

        let edges = vec![ActiveEdge::new(1, 3, 2.0), ActiveEdge::new(3, 2, 1.0)];
        let traversals = vec![ActiveTraversal::new(1, 3, 2, TurnType::Left, -1.0)];
        assert!(matches!(ActiveNetwork::new(nodes.clone(), edges.clone(), traversals),
                         Err(PathChoiceError::InvalidNetwork(_))));
        let traversals = vec![ActiveTraversal::new(1, 3, 2, TurnType::Left, f64::INFINITY)];
        assert!(matches!(ActiveNetwork::new(nodes, edges, traversals),
                         Err(PathChoiceError::InvalidNetwork(_))));
    }

    #[test]
    fn test_self_loops_skipped() {
        let nodes = vec![ActiveNode::new(1, 0., 0.), ActiveNode::new(2, 1., 0.)];
        let edges = vec![ActiveEdge::new(1, 1, 0.0), ActiveEdge::new(1, 2, 1.0)];
        let network = ActiveNetwork::new(nodes, edges, vec![]).unwrap();
        assert_eq!(network.edge_count(), 1);
        assert_eq!(network.edge_idx(1, 2), Some(0));
    }

    #[test]
    fn test_zone_nodes() {
        let network = diamond_network(false);
        let zones = network.zone_nodes("taz");
        assert_eq!(zones, vec![(1, NODE_A), (2, NODE_D), (3, NODE_E)]);
        assert!(network.get_node(NODE_A).unwrap().is_centroid());
        assert!(!network.get_node(NODE_B).unwrap().is_centroid());
        assert_eq!(network.zone_nodes("mgra").len(), 0);
    }

    #[test]
    fn test_mode_costs() {
        let mut edge = ActiveEdge::new(1, 2, 3.0);
        edge.bike_cost = 4.0;
        edge.walk_cost = 6.0;
        assert_eq!(ActiveMode::Bike.edge_cost(&edge), 4.0);
        assert_eq!(ActiveMode::Walk.edge_cost(&edge), 6.0);

        let mut traversal = ActiveTraversal::new(1, 2, 3, TurnType::Left, 2.5);
        assert_eq!(ActiveMode::Bike.traversal_cost(&traversal), 2.5);
        assert_eq!(ActiveMode::Walk.traversal_cost(&traversal), 0.0);
        traversal.thru_centroid = true;
        traversal.cost = 1001.5;
        traversal.centroid_cost = 999.0;
        assert_eq!(ActiveMode::Bike.traversal_cost(&traversal), 1001.5);
        assert_eq!(ActiveMode::Walk.traversal_cost(&traversal), 999.0);

        assert_eq!(ActiveMode::parse("Walk").unwrap(), ActiveMode::Walk);
        assert!(ActiveMode::parse("drive").is_err());
    }

    #[test]
    fn test_turn_type_parsing() {
        assert_eq!(TurnType::parse("1").unwrap(), TurnType::Left);
        assert_eq!(TurnType::parse("Right").unwrap(), TurnType::Right);
        assert_eq!(TurnType::parse("3").unwrap(), TurnType::Reversal);
        assert!(TurnType::parse("sideways").is_err());
        assert!(TurnType::Reversal.is_turn());
        assert!(!TurnType::None.is_turn());
        assert!(!TurnType::NoConnection.is_turn());
    }
}

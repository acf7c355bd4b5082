//! Builds active-transport networks from node, edge, and traversal CSV files.
use std::collections::HashMap;
use std::f64::consts::PI;
use std::fs::File;
use std::path::Path;

use super::error::{PathChoiceError, Result};
use super::geometry::turn_angle;
use super::path_network::{ActiveEdge, ActiveNetwork, ActiveNode, ActiveTraversal, NetworkNode,
                          NodeId, TurnType};


// A convenience type for parsing csv data
pub(crate) type Row = HashMap<String, String>;

/// Movements whose heading changes by less than this are treated as going straight.
const TURN_ANGLE_TOLERANCE: f64 = PI / 6.0;
const MAJOR_ARTERIAL_MAX_CLASS: u8 = 3;
const MINOR_ARTERIAL_CLASS: u8 = 4;


#[derive(Clone, Debug, PartialEq)]
pub struct TraversalCostParameters {
    pub left_penalty: f64,
    pub right_penalty: f64,
    pub reversal_penalty: f64,
    /// Added for every movement through a signal except right turns.
    pub signal_penalty: f64,
    pub centroid_thru_penalty: f64,
    pub prohibit_reversals: bool,
}

impl Default for TraversalCostParameters {
    fn default() -> TraversalCostParameters {
        return TraversalCostParameters {
            left_penalty: 0.0,
            right_penalty: 0.0,
            reversal_penalty: 0.0,
            signal_penalty: 0.0,
            centroid_thru_penalty: 999.0,
            prohibit_reversals: true,
        };
    }
}

impl TraversalCostParameters {
    pub fn traversal_cost(&self, traversal: &ActiveTraversal) -> f64 {
        let mut cost = match traversal.turn_type {
            TurnType::Left => self.left_penalty,
            TurnType::Right => self.right_penalty,
            TurnType::Reversal => self.reversal_penalty,
            _ => 0.0,
        };
        if traversal.signalized && traversal.turn_type != TurnType::Right {
            cost += self.signal_penalty;
        }
        if traversal.thru_centroid {
            cost += self.centroid_thru_penalty;
        }
        return cost;
    }
}


/// One row of a traversal file.  Missing turn types and costs are derived from the network.
#[derive(Clone, Debug, PartialEq)]
pub struct TraversalRecord {
    pub start: NodeId,
    pub thru: NodeId,
    pub end: NodeId,
    pub turn_type: Option<TurnType>,
    pub cost: Option<f64>,
    pub prohibited: bool,
}

impl TraversalRecord {
    pub fn new(start: NodeId, thru: NodeId, end: NodeId) -> TraversalRecord {
        return TraversalRecord {start, thru, end, turn_type: None, cost: None, prohibited: false};
    }
}


pub struct NetworkFiles<'a> {
    pub node_file: &'a Path,
    pub edge_file: &'a Path,
    pub traversal_file: Option<&'a Path>,
    pub zone_fields: &'a [String],
}

pub fn load_network(files: &NetworkFiles, params: &TraversalCostParameters)
                    -> Result<ActiveNetwork> {
    let nodes = read_nodes(files.node_file, files.zone_fields)?;
    let edges = read_edges(files.edge_file, &nodes)?;
    let records = match files.traversal_file {
        Some(path) => Some(read_traversals(path)?),
        None => None,
    };
    return build_active_network(nodes, edges, records, params);
}

pub fn read_nodes(path: &Path, zone_fields: &[String]) -> Result<Vec<ActiveNode>> {
    let file = File::open(path)?;
    let mut reader = csv::Reader::from_reader(file);
    let mut nodes = vec![];
    for result in reader.deserialize() {
        let row: Row = result?;
        let id = required(parse_u32(&row, "id")?, "id")?;
        let x_coord = required(parse_f64(&row, "x")?, "x")?;
        let y_coord = required(parse_f64(&row, "y")?, "y")?;
        let mut node = ActiveNode::new(id, x_coord, y_coord);
        for zone_field in zone_fields {
            if let Some(zone) = parse_u32(&row, zone_field)? {
                if zone > 0 {
                    node = node.with_zone(zone_field, zone);
                }
            }
        }
        node.signalized = parse_flag(&row, "signalized")?;
        nodes.push(node);
    }
    log::info!("read {} nodes from {}", nodes.len(), path.display());
    return Ok(nodes);
}

/// Edge distances left blank fall back to the straight-line distance between the end nodes.
pub fn read_edges(path: &Path, nodes: &[ActiveNode]) -> Result<Vec<ActiveEdge>> {
    let positions: HashMap<NodeId, &ActiveNode> = nodes.iter().map(|nn| (nn.id, nn)).collect();
    let file = File::open(path)?;
    let mut reader = csv::Reader::from_reader(file);
    let mut edges = vec![];
    for result in reader.deserialize() {
        let row: Row = result?;
        let from = required(parse_u32(&row, "from")?, "from")?;
        let to = required(parse_u32(&row, "to")?, "to")?;
        let distance = match parse_f64(&row, "distance")? {
            Some(distance) => distance,
            None => {
                let from_node = positions.get(&from)
                    .ok_or_else(|| PathChoiceError::not_found("node", from))?;
                let to_node = positions.get(&to)
                    .ok_or_else(|| PathChoiceError::not_found("node", to))?;
                from_node.position.euclidean_distance(&to_node.position)
            }
        };
        let mut edge = ActiveEdge::new(from, to, distance);
        edge.gain = parse_f64(&row, "gain")?.unwrap_or(0.0);
        edge.bike_cost = parse_f64(&row, "bike_cost")?.unwrap_or(distance);
        edge.walk_cost = parse_f64(&row, "walk_cost")?.unwrap_or(distance);
        edge.bike_class = parse_u8(&row, "bike_class")?.unwrap_or(0);
        edge.lanes = parse_u8(&row, "lanes")?.unwrap_or(0);
        edge.functional_class = parse_u8(&row, "functional_class")?.unwrap_or(0);
        edge.centroid_connector = parse_flag(&row, "centroid_connector")?;
        edge.cycle_track = parse_flag(&row, "cycle_track")?;
        edge.bike_blvd = parse_flag(&row, "bike_blvd")?;
        edge.autos_permitted = parse_flag(&row, "autos_permitted")?;
        edges.push(edge);
    }
    log::info!("read {} edges from {}", edges.len(), path.display());
    return Ok(edges);
}

pub fn read_traversals(path: &Path) -> Result<Vec<TraversalRecord>> {
    let file = File::open(path)?;
    let mut reader = csv::Reader::from_reader(file);
    let mut records = vec![];
    for result in reader.deserialize() {
        let row: Row = result?;
        let mut record = TraversalRecord::new(
            required(parse_u32(&row, "start")?, "start")?,
            required(parse_u32(&row, "thru")?, "thru")?,
            required(parse_u32(&row, "end")?, "end")?,
        );
        record.turn_type = match get_value(&row, "turn_type") {
            Some(value) => Some(TurnType::parse(value)?),
            None => None,
        };
        record.cost = parse_f64(&row, "cost")?;
        record.prohibited = parse_flag(&row, "prohibited")?;
        records.push(record);
    }
    log::info!("read {} traversals from {}", records.len(), path.display());
    return Ok(records);
}

/// Assembles the network.  Without traversal records, every pair of consecutive edges gets a
/// derived traversal; with them, only the listed movements are allowed.
pub fn build_active_network(nodes: Vec<ActiveNode>, edges: Vec<ActiveEdge>,
                            records: Option<Vec<TraversalRecord>>,
                            params: &TraversalCostParameters) -> Result<ActiveNetwork> {
    // a network with every movement, used to look up neighbours while deriving attributes
    let skeleton = ActiveNetwork::new(nodes.clone(), edges.clone(), vec![])?;
    let records = match records {
        Some(records) => records,
        None => skeleton.traversals()
            .map(|tt| TraversalRecord::new(tt.from, tt.thru, tt.to))
            .collect(),
    };

    let mut traversals = Vec::with_capacity(records.len());
    for record in &records {
        traversals.push(derive_traversal(&skeleton, record, params)?);
    }
    return ActiveNetwork::new(nodes, edges, traversals);
}

fn derive_traversal(network: &ActiveNetwork, record: &TraversalRecord,
                    params: &TraversalCostParameters) -> Result<ActiveTraversal> {
    let thru_node = network.get_node(record.thru)?;
    let from_edge = network.get_edge(record.start, record.thru)?;
    network.get_edge(record.thru, record.end)?;

    let turn_type = match record.turn_type {
        Some(turn_type) => turn_type,
        None => classify_turn(network, record.start, record.thru, record.end)?,
    };
    let mut traversal = ActiveTraversal::new(record.start, record.thru, record.end, turn_type,
                                             0.0);
    traversal.thru_centroid = thru_node.is_centroid();
    traversal.signalized = thru_node.signalized;

    if !traversal.signalized && !traversal.thru_centroid {
        if turn_type == TurnType::Left {
            traversal.unsig_left_from_major = is_major(from_edge.functional_class);
            traversal.unsig_left_from_minor = from_edge.functional_class == MINOR_ARTERIAL_CLASS;
        } else if turn_type == TurnType::None {
            // the busiest cross street at the junction
            let mut cross_classes = vec![];
            for leg in network.successors(record.thru) {
                if leg == record.start || leg == record.end {
                    continue;
                }
                let leg_edge = network.get_edge(record.thru, leg)?;
                if leg_edge.autos_permitted {
                    cross_classes.push(leg_edge.functional_class);
                }
            }
            traversal.unsig_cross_major = cross_classes.iter().any(|cc| is_major(*cc));
            traversal.unsig_cross_minor = !traversal.unsig_cross_major &&
                cross_classes.iter().any(|cc| *cc == MINOR_ARTERIAL_CLASS);
        }
    }

    traversal.prohibited = record.prohibited || turn_type == TurnType::NoConnection ||
        (turn_type == TurnType::Reversal && params.prohibit_reversals);
    if traversal.thru_centroid {
        traversal.centroid_cost = params.centroid_thru_penalty;
    }
    traversal.cost = match record.cost {
        Some(cost) => cost,
        None => params.traversal_cost(&traversal),
    };
    return Ok(traversal);
}

fn is_major(functional_class: u8) -> bool {
    return functional_class > 0 && functional_class <= MAJOR_ARTERIAL_MAX_CLASS;
}

/// Classifies the movement start -> thru -> end from the network geometry, counting only the
/// legs at the through node that carry auto traffic.
pub fn classify_turn(network: &ActiveNetwork, start: NodeId, thru: NodeId, end: NodeId)
                     -> Result<TurnType> {
    let start_node = network.get_node(start)?;
    let thru_node = network.get_node(thru)?;
    let end_node = network.get_node(end)?;
    if start_node.is_centroid() || thru_node.is_centroid() || end_node.is_centroid() {
        return Ok(TurnType::None);
    }
    if start == end {
        return Ok(TurnType::Reversal);
    }

    let this_angle = turn_angle(&start_node.position, &thru_node.position, &end_node.position);
    if this_angle.abs() > PI - TURN_ANGLE_TOLERANCE {
        return Ok(TurnType::Reversal);
    }

    let mut min_angle = PI;
    let mut max_angle = -PI;
    let mut min_abs_angle = PI;
    let mut leg_count = 1;
    for leg in network.successors(thru) {
        if leg == start || !network.get_edge(thru, leg)?.autos_permitted {
            continue;
        }
        let leg_node = network.get_node(leg)?;
        let angle = turn_angle(&start_node.position, &thru_node.position, &leg_node.position);
        min_angle = min_angle.min(angle);
        max_angle = max_angle.max(angle);
        min_abs_angle = min_abs_angle.min(angle.abs());
        leg_count += 1;
    }

    let turn_type = if leg_count <= 2 {
        TurnType::None
    } else if leg_count == 3 {
        if this_angle <= min_angle && this_angle.abs() > TURN_ANGLE_TOLERANCE {
            TurnType::Right
        } else if this_angle >= max_angle && this_angle.abs() > TURN_ANGLE_TOLERANCE {
            TurnType::Left
        } else {
            TurnType::None
        }
    } else if this_angle.abs() <= min_abs_angle ||
              (this_angle.abs() < TURN_ANGLE_TOLERANCE && this_angle > min_angle &&
               this_angle < max_angle) {
        TurnType::None
    } else if this_angle < 0.0 {
        TurnType::Right
    } else {
        TurnType::Left
    };
    return Ok(turn_type);
}


pub(crate) fn get_value<'a>(row: &'a Row, field: &str) -> Option<&'a str> {
    return row.get(field).map(|vv| vv.trim()).filter(|vv| vv.len() > 0);
}

pub(crate) fn required<TT>(value: Option<TT>, field: &str) -> Result<TT> {
    return value.ok_or_else(|| PathChoiceError::Parse {
        field: String::from(field),
        value: String::new(),
    });
}

pub(crate) fn parse_error(field: &str, value: &str) -> PathChoiceError {
    return PathChoiceError::Parse {field: String::from(field), value: String::from(value)};
}

pub(crate) fn parse_f64(row: &Row, field: &str) -> Result<Option<f64>> {
    match get_value(row, field) {
        Some(value) => match value.parse::<f64>() {
            Ok(parsed) => Ok(Some(parsed)),
            Err(_) => Err(parse_error(field, value)),
        },
        None => Ok(None),
    }
}

/// Accepts integers written as floats ("12.0"), which some network exports produce.
pub(crate) fn parse_u32(row: &Row, field: &str) -> Result<Option<u32>> {
    let value = match get_value(row, field) {
        Some(value) => value,
        None => return Ok(None),
    };
    if let Ok(parsed) = value.parse::<u32>() {
        return Ok(Some(parsed));
    }
    match value.parse::<f64>() {
        Ok(parsed) if parsed >= 0.0 && parsed.fract() == 0.0 && parsed <= u32::MAX as f64 =>
            Ok(Some(parsed as u32)),
        _ => Err(parse_error(field, value)),
    }
}

fn parse_u8(row: &Row, field: &str) -> Result<Option<u8>> {
    match parse_u32(row, field)? {
        Some(parsed) => match u8::try_from(parsed) {
            Ok(small) => Ok(Some(small)),
            Err(_) => Err(parse_error(field, &parsed.to_string())),
        },
        None => Ok(None),
    }
}

pub(crate) fn parse_flag(row: &Row, field: &str) -> Result<bool> {
    let value = match get_value(row, field) {
        Some(value) => value,
        None => return Ok(false),
    };
    match value.to_lowercase().as_str() {
        "true" | "t" | "yes" | "y" => return Ok(true),
        "false" | "f" | "no" | "n" => return Ok(false),
        _ => (),
    }
    match value.parse::<f64>() {
        Ok(parsed) => Ok(parsed != 0.0),
        Err(_) => Err(parse_error(field, value)),
    }
}

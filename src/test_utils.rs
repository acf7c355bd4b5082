use super::network_factory::{build_active_network, TraversalCostParameters};
use super::path_network::{ActiveEdge, ActiveNetwork, ActiveNode, ActiveTraversal, TurnType};


pub const NODE_A: u32 = 1;
pub const NODE_B: u32 = 2;
pub const NODE_C: u32 = 3;
pub const NODE_D: u32 = 4;
pub const NODE_E: u32 = 5;

/// Two unit-length routes from A to D, one via B and one via C, plus an isolated node E.
/// A, D, and E represent zones 1, 2, and 3.  If `prohibit_bd` is set, the movement
/// A -> B -> D has no traversal record.
pub fn diamond_network(prohibit_bd: bool) -> ActiveNetwork {
    let nodes = vec![
        ActiveNode::new(NODE_A, 0., 0.).with_zone("taz", 1),
        ActiveNode::new(NODE_B, 1., 1.),
        ActiveNode::new(NODE_C, 1., -1.),
        ActiveNode::new(NODE_D, 2., 0.).with_zone("taz", 2),
        ActiveNode::new(NODE_E, 5., 5.).with_zone("taz", 3),
    ];
    let edges = vec![
        ActiveEdge::new(NODE_A, NODE_B, 1.0),
        ActiveEdge::new(NODE_B, NODE_D, 1.0),
        ActiveEdge::new(NODE_A, NODE_C, 1.0),
        ActiveEdge::new(NODE_C, NODE_D, 1.0),
    ];
    let mut traversals = vec![ActiveTraversal::new(NODE_A, NODE_C, NODE_D, TurnType::None, 0.0)];
    if !prohibit_bd {
        traversals.push(ActiveTraversal::new(NODE_A, NODE_B, NODE_D, TurnType::None, 0.0));
    }
    return ActiveNetwork::new(nodes, edges, traversals).unwrap();
}

/// A grid of two-way streets with `spacing` between intersections and small turn penalties.
/// Node ids count up from 1 along rows; the four corners represent zones 1 to 4.
pub fn grid_network(num_x: u32, num_y: u32, spacing: f64) -> ActiveNetwork {
    let corners = [1, num_x, num_x * (num_y - 1) + 1, num_x * num_y];
    let mut nodes = vec![];
    for yy in 0..num_y {
        for xx in 0..num_x {
            let id = yy * num_x + xx + 1;
            let mut node = ActiveNode::new(id, xx as f64 * spacing, yy as f64 * spacing);
            if let Some(pos) = corners.iter().position(|cc| *cc == id) {
                node = node.with_zone("taz", pos as u32 + 1);
            }
            nodes.push(node);
        }
    }

    let mut edges = vec![];
    for yy in 0..num_y {
        for xx in 0..num_x {
            let id = yy * num_x + xx + 1;
            let mut neighbours = vec![];
            if xx + 1 < num_x {
                neighbours.push(id + 1);
            }
            if yy + 1 < num_y {
                neighbours.push(id + num_x);
            }
            for nbr in neighbours {
                for (from, to) in &[(id, nbr), (nbr, id)] {
                    let mut edge = ActiveEdge::new(*from, *to, spacing);
                    edge.autos_permitted = true;
                    edge.functional_class = 4;
                    edges.push(edge);
                }
            }
        }
    }

    let params = TraversalCostParameters {
        left_penalty: 0.5,
        right_penalty: 0.25,
        centroid_thru_penalty: 0.0,
        ..Default::default()
    };
    return build_active_network(nodes, edges, None, &params).unwrap();
}

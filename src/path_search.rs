use std::collections::{HashMap, HashSet};
use std::cmp::Ordering;

use priority_queue::PriorityQueue;
use rand::Rng;
use rand::SeedableRng;
use rand_isaac::Isaac64Rng;

use super::error::{PathChoiceError, Result};
use super::path_alternatives::{Path, PathAlternativeList};
use super::path_network::{ActiveEdge, ActiveMode, ActiveNode, ActiveTraversal, EdgeIdx,
                          NetworkEdge, NetworkNode, NetworkTraversal, NodeId, PathNetwork};


/// Maps an edge, and the traversal used to enter it, to nonnegative costs.  The cost of a step
/// onto an edge is the edge's cost plus the cost of the traversal leading into it.
pub trait CostFunction<E, T> {
    fn edge_cost(&self, edge: &E) -> f64;
    fn traversal_cost(&self, traversal: &T) -> f64;
}

impl CostFunction<ActiveEdge, ActiveTraversal> for ActiveMode {
    fn edge_cost(&self, edge: &ActiveEdge) -> f64 {
        return ActiveMode::edge_cost(self, edge);
    }

    fn traversal_cost(&self, traversal: &ActiveTraversal) -> f64 {
        return ActiveMode::traversal_cost(self, traversal);
    }
}

/// Physical distance, with a penalty for passing through zone centroids so that distances
/// between zones are measured on the street network rather than through other zones.
#[derive(Clone, Copy, Debug)]
pub struct DistanceCost {
    pub centroid_thru_penalty: f64,
}

impl CostFunction<ActiveEdge, ActiveTraversal> for DistanceCost {
    fn edge_cost(&self, edge: &ActiveEdge) -> f64 {
        return edge.distance;
    }

    fn traversal_cost(&self, traversal: &ActiveTraversal) -> f64 {
        if traversal.thru_centroid {
            return self.centroid_thru_penalty;
        }
        return 0.0;
    }
}


const ITERATIONS_PER_ALTERNATIVE: usize = 4;
const PATH_SIZE_TOLERANCE: f64 = 0.001;


/// How many searches to run for a pair, by the length of its shortest path.  The band of a pair
/// is the first distance break at or above that length, or the last band past every break.
/// Sampling stops once the alternatives' path sizes add up to the band's target and the band's
/// minimum count of searches has run.  A pair that reaches the maximum count first keeps what it
/// has but is flagged as an insufficient sample.
#[derive(Clone, Debug, PartialEq)]
pub struct SampleSchedule {
    pub distance_breaks: Vec<f64>,
    pub path_sizes: Vec<f64>,
    pub min_counts: Vec<usize>,
    pub max_counts: Vec<usize>,
}

impl SampleSchedule {
    pub fn band(&self, distance: f64) -> usize {
        return self.distance_breaks.iter()
            .position(|brk| *brk >= distance)
            .unwrap_or(self.distance_breaks.len());
    }

    pub fn largest_max_count(&self) -> usize {
        return self.max_counts.iter().copied().max().unwrap_or(0);
    }

    /// Whether sampling is over after `count` searches, and if so whether the sample is
    /// sufficient.
    fn stop(&self, band: usize, count: usize, path_size_total: f64) -> Option<bool> {
        if path_size_total >= self.path_sizes[band] - PATH_SIZE_TOLERANCE &&
            count >= self.min_counts[band] {
            return Some(true);
        }
        if count >= self.max_counts[band] {
            return Some(false);
        }
        return None;
    }

    pub fn validate(&self) -> Result<()> {
        let num_bands = self.distance_breaks.len() + 1;
        let problem = if self.path_sizes.len() != num_bands || self.min_counts.len() != num_bands
            || self.max_counts.len() != num_bands {
            Some(format!("sampling needs {} values per band list, one more than the distance \
                          breaks", num_bands))
        } else if self.distance_breaks.windows(2).any(|ww| !(ww[0] < ww[1])) {
            Some(String::from("sampling distance breaks must be increasing"))
        } else if self.path_sizes.iter().any(|ps| !ps.is_finite() || *ps < 0.0) {
            Some(String::from("sampling path sizes must be finite and nonnegative"))
        } else if self.max_counts.iter().any(|mc| *mc == 0) {
            Some(String::from("sampling max counts must be at least 1"))
        } else if self.min_counts.iter().zip(&self.max_counts).any(|(lo, hi)| lo > hi) {
            Some(String::from("sampling min counts may not exceed the max counts"))
        } else {
            None
        };
        match problem {
            Some(msg) => Err(PathChoiceError::Config(msg)),
            None => Ok(()),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct SearchParameters {
    /// The most alternatives kept for one OD pair.
    pub max_alternatives: usize,
    /// Multiplier applied to the cost of each edge of a found path before searching again.
    pub penalty_factor: f64,
    /// Alternatives costing more than this multiple of the best path are dropped.
    pub max_cost_ratio: f64,
    pub max_iterations: usize,
    pub max_search_cost: f64,
    /// Scale of the random, length-proportional cost added to each edge.  Zero disables it.
    pub random_scale: f64,
    pub random_seed: u64,
    /// Per-search scales that replace `random_scale`.  The last one is used for every later
    /// search.
    pub random_spreads: Vec<f64>,
    /// When set, replaces the fixed `max_alternatives` and `max_iterations` limits.
    pub sampling: Option<SampleSchedule>,
}

impl Default for SearchParameters {
    fn default() -> SearchParameters {
        return SearchParameters {
            max_alternatives: 4,
            penalty_factor: 1.5,
            max_cost_ratio: 2.0,
            max_iterations: 16,
            max_search_cost: f64::INFINITY,
            random_scale: 0.0,
            random_seed: 100,
            random_spreads: vec![],
            sampling: None,
        };
    }
}

impl SearchParameters {
    /// Defaults for a choice set of `max_alternatives`, searching up to four times that many
    /// times.
    pub fn with_alternatives(max_alternatives: usize) -> Result<SearchParameters> {
        let max_iterations = max_alternatives.checked_mul(ITERATIONS_PER_ALTERNATIVE)
            .ok_or_else(|| PathChoiceError::Config(
                format!("max_alternatives {} is too large", max_alternatives)))?;
        return Ok(SearchParameters {
            max_alternatives,
            max_iterations,
            ..SearchParameters::default()
        });
    }

    pub fn validate(&self) -> Result<()> {
        let problem = if self.max_alternatives == 0 {
            Some("max_alternatives must be at least 1")
        } else if !(self.penalty_factor > 1.0) || !self.penalty_factor.is_finite() {
            Some("penalty_factor must be a finite value greater than 1")
        } else if !(self.max_cost_ratio >= 1.0) {
            Some("max_cost_ratio must be at least 1")
        } else if self.max_iterations < self.max_alternatives {
            Some("max_iterations must be at least max_alternatives")
        } else if !(self.max_search_cost > 0.0) {
            Some("max_search_cost must be positive")
        } else if !(self.random_scale >= 0.0) || !self.random_scale.is_finite() {
            Some("random_scale must be a finite nonnegative value")
        } else if self.random_spreads.iter().any(|ss| !(*ss >= 0.0) || !ss.is_finite()) {
            Some("random_spreads must be finite nonnegative values")
        } else {
            None
        };
        if let Some(msg) = problem {
            return Err(PathChoiceError::Config(String::from(msg)));
        }
        if let Some(schedule) = &self.sampling {
            schedule.validate()?;
        }
        return Ok(());
    }

    /// The perturbation scale for the search numbered `iteration`, counting from zero.
    pub fn spread(&self, iteration: usize) -> f64 {
        match self.random_spreads.len() {
            0 => self.random_scale,
            len => self.random_spreads[iteration.min(len - 1)],
        }
    }
}


/// Frontier entry for one edge label.  Ordering is reversed to make the priority queue a
/// min-queue, with ties broken by the ids of the edge's head and then tail nodes.
#[derive(Clone, Debug)]
struct FrontierLabel {
    cost: f64,
    head: NodeId,
    tail: NodeId,
}

impl FrontierLabel {
    fn new<E: NetworkEdge>(cost: f64, edge: &E) -> FrontierLabel {
        return FrontierLabel {cost, head: edge.to_node(), tail: edge.from_node()};
    }
}

impl Ord for FrontierLabel {
    fn cmp(&self, other: &Self) -> Ordering {
        if self.cost < other.cost {
            return Ordering::Greater;
        }
        else if self.cost > other.cost {
            return Ordering::Less;
        }
        else {
            return other.head.cmp(&self.head).then_with(|| other.tail.cmp(&self.tail));
        }
    }
}

// Implementing Ord requires all of the below traits
impl PartialOrd for FrontierLabel {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        return Some(self.cmp(other));
    }
}

impl PartialEq for FrontierLabel {
    fn eq(&self, other: &Self) -> bool {
        return self.cmp(other) == Ordering::Equal;
    }
}

impl Eq for FrontierLabel{}


/// The settled labels of one search.  Labels are edges, so that the edge a path arrived on is
/// known when the cost of the next turn is applied.
struct SearchTree {
    parents: HashMap<EdgeIdx, Option<EdgeIdx>>,
    // the cheapest settled edge reaching each node
    arrivals: HashMap<NodeId, (f64, EdgeIdx)>,
}

impl SearchTree {
    fn path_edges(&self, destination: NodeId) -> Option<Vec<EdgeIdx>> {
        let (_, last_edge) = self.arrivals.get(&destination)?;
        let mut edges = vec![*last_edge];
        let mut cur_edge = *last_edge;
        while let Some(Some(parent)) = self.parents.get(&cur_edge) {
            edges.push(*parent);
            cur_edge = *parent;
        }
        edges.reverse();
        return Some(edges);
    }
}


pub type ActivePathSearch<'a, C> = PathSearch<'a, ActiveNode, ActiveEdge, ActiveTraversal, C>;

pub struct PathSearch<'a, N, E, T, C> {
    network: &'a PathNetwork<N, E, T>,
    cost_function: C,
    params: SearchParameters,
}

impl<'a, N, E, T, C> PathSearch<'a, N, E, T, C>
    where N: NetworkNode, E: NetworkEdge, T: NetworkTraversal, C: CostFunction<E, T> {
    pub fn new(network: &'a PathNetwork<N, E, T>, cost_function: C, params: SearchParameters)
               -> PathSearch<'a, N, E, T, C> {
        return PathSearch {network, cost_function, params};
    }

    pub fn network(&self) -> &'a PathNetwork<N, E, T> {
        return self.network;
    }

    pub fn cost_function(&self) -> &C {
        return &self.cost_function;
    }

    pub fn params(&self) -> &SearchParameters {
        return &self.params;
    }

    /// Label-setting search from `origin` over edges, stopping when `destination` is reached
    /// (if one is given) or when every reachable label costing at most `max_cost` is settled.
    fn search<F>(&self, origin: NodeId, destination: Option<NodeId>, max_cost: f64,
                 mut edge_cost: F) -> SearchTree
        where F: FnMut(EdgeIdx) -> f64 {
        let mut frontier = PriorityQueue::new();
        let mut best_costs: HashMap<EdgeIdx, f64> = HashMap::new();
        let mut parents = HashMap::new();
        let mut settled = HashSet::new();
        let mut arrivals = HashMap::new();

        for edge_idx in self.network.outgoing_edges(origin) {
            let cost = edge_cost(edge_idx);
            if cost <= max_cost {
                best_costs.insert(edge_idx, cost);
                parents.insert(edge_idx, None);
                frontier.push(edge_idx, FrontierLabel::new(cost, self.network.edge(edge_idx)));
            }
        }

        while let Some((edge_idx, label)) = frontier.pop() {
            settled.insert(edge_idx);
            arrivals.entry(label.head).or_insert((label.cost, edge_idx));
            if destination == Some(label.head) {
                break;
            }

            for next_idx in self.network.outgoing_edges(label.head) {
                if settled.contains(&next_idx) {
                    continue;
                }
                let traversal = match self.network.allowed_traversal(edge_idx, next_idx) {
                    Some(traversal) => traversal,
                    // prohibited movement
                    None => continue,
                };
                let cost = label.cost + edge_cost(next_idx) +
                    self.cost_function.traversal_cost(traversal);
                if !(cost <= max_cost) {
                    continue;
                }
                let improved = match best_costs.get(&next_idx) {
                    Some(old_cost) => cost < *old_cost,
                    None => true,
                };
                if improved {
                    best_costs.insert(next_idx, cost);
                    parents.insert(next_idx, Some(edge_idx));
                    // updates the priority if it's already in the queue
                    frontier.push(next_idx,
                                  FrontierLabel::new(cost, self.network.edge(next_idx)));
                }
            }
        }

        return SearchTree {parents, arrivals};
    }

    fn check_endpoints(&self, origin: NodeId, destination: NodeId) -> Result<()> {
        self.network.get_node(origin)?;
        self.network.get_node(destination)?;
        return Ok(());
    }

    /// The least-cost path under the unpenalized cost function.
    pub fn shortest_path(&self, origin: NodeId, destination: NodeId) -> Result<Path> {
        self.check_endpoints(origin, destination)?;
        if origin == destination {
            return Ok(Path::empty(origin));
        }
        let tree = self.search(origin, Some(destination), self.params.max_search_cost, |idx| {
            self.cost_function.edge_cost(self.network.edge(idx))
        });
        match tree.path_edges(destination) {
            Some(edges) => Path::from_edges(self.network, origin, edges, &self.cost_function),
            None => Err(PathChoiceError::DestinationNotFound {origin, destination}),
        }
    }

    /// Generates distinct paths by repeatedly searching and then penalizing the edges of each
    /// path found.  Without a sample schedule this stops at `max_alternatives` paths or
    /// `max_iterations` searches.  Paths are ordered by unpenalized cost.
    pub fn alternatives(&self, origin: NodeId, destination: NodeId)
                        -> Result<PathAlternativeList> {
        self.check_endpoints(origin, destination)?;
        let capacity = match &self.params.sampling {
            Some(schedule) => schedule.largest_max_count(),
            None => self.params.max_alternatives,
        };
        let mut alternatives = PathAlternativeList::new(origin, destination, capacity);
        if origin == destination {
            alternatives.try_add(Path::empty(origin));
            return Ok(alternatives);
        }

        let mut penalties: HashMap<EdgeIdx, f64> = HashMap::new();
        let mut best_cost: Option<f64> = None;
        let mut band: Option<usize> = None;
        let mut iteration = 0;
        loop {
            if self.params.sampling.is_none() &&
                (iteration >= self.params.max_iterations ||
                 alternatives.len() >= self.params.max_alternatives) {
                break;
            }

            let tree = self.perturbed_search(origin, destination, iteration, &penalties);
            let edges = match tree.path_edges(destination) {
                Some(edges) => edges,
                // penalties have pushed every path past the search limit
                None => {
                    if let (Some(schedule), Some(band)) = (&self.params.sampling, band) {
                        let total = alternatives.path_size_total(self.network)?;
                        let reached = total >= schedule.path_sizes[band] - PATH_SIZE_TOLERANCE;
                        alternatives.set_sample_sufficient(reached);
                    }
                    break;
                }
            };
            let path = Path::from_edges(self.network, origin, edges, &self.cost_function)?;
            for edge_idx in path.edges() {
                *penalties.entry(*edge_idx).or_insert(1.0) *= self.params.penalty_factor;
            }

            let best = *best_cost.get_or_insert(path.cost());
            if let (Some(schedule), None) = (&self.params.sampling, band) {
                band = Some(schedule.band(path.length()));
            }
            if path.cost() > best * self.params.max_cost_ratio {
                log::trace!("iteration {} from {} to {}: path cost {} exceeds ceiling",
                            iteration, origin, destination, path.cost());
            } else if !alternatives.try_add(path) {
                log::trace!("iteration {} from {} to {}: repeated path", iteration, origin,
                            destination);
            }
            iteration += 1;

            if let (Some(schedule), Some(band)) = (&self.params.sampling, band) {
                let total = alternatives.path_size_total(self.network)?;
                if let Some(sufficient) = schedule.stop(band, iteration, total) {
                    if !sufficient {
                        log::debug!("insufficient sample from {} to {}: path size {} after {} \
                                     searches", origin, destination, total, iteration);
                    }
                    alternatives.set_sample_sufficient(sufficient);
                    break;
                }
            }
        }

        if alternatives.is_empty() {
            return Err(PathChoiceError::DestinationNotFound {origin, destination});
        }
        alternatives.sort_by_cost();
        return Ok(alternatives);
    }

    /// One search under the penalties so far, with each edge's cost perturbed by this
    /// iteration's spread.
    fn perturbed_search(&self, origin: NodeId, destination: NodeId, iteration: usize,
                        penalties: &HashMap<EdgeIdx, f64>) -> SearchTree {
        let scale = self.params.spread(iteration);
        let mut rng = self.iteration_rng(origin, destination, iteration, scale);
        let mut perturbations: HashMap<EdgeIdx, f64> = HashMap::new();
        return self.search(origin, Some(destination), self.params.max_search_cost, |idx| {
            let edge = self.network.edge(idx);
            let mut cost = self.cost_function.edge_cost(edge);
            if let Some(rng) = rng.as_mut() {
                cost += *perturbations.entry(idx).or_insert_with(|| {
                    edge.length() * scale * rng.gen::<f64>()
                });
            }
            return cost * penalties.get(&idx).copied().unwrap_or(1.0);
        });
    }

    /// Least costs from `origin` to every node reachable within `max_cost`.
    pub fn shortest_costs(&self, origin: NodeId, max_cost: f64) -> Result<HashMap<NodeId, f64>> {
        self.network.get_node(origin)?;
        let tree = self.search(origin, None, max_cost, |idx| {
            self.cost_function.edge_cost(self.network.edge(idx))
        });
        let mut costs: HashMap<NodeId, f64> = tree.arrivals.iter()
            .map(|(node, (cost, _))| (*node, *cost))
            .collect();
        costs.insert(origin, 0.0);
        return Ok(costs);
    }

    fn iteration_rng(&self, origin: NodeId, destination: NodeId, iteration: usize, scale: f64)
                     -> Option<Isaac64Rng> {
        if scale <= 0.0 {
            return None;
        }
        // a distinct, reproducible stream for each OD pair and iteration
        let seed = self.params.random_seed
            .wrapping_mul(6364136223846793005)
            .wrapping_add(((origin as u64) << 32) | destination as u64)
            .wrapping_add((iteration as u64).wrapping_mul(0x9E3779B97F4A7C15));
        return Some(Isaac64Rng::seed_from_u64(seed));
    }
}

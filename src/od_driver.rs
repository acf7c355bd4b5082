// this file runs path choice over every pair of zones in a run and passes the results to a sink.
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc::{sync_channel, SyncSender};
use std::sync::{Arc, Mutex};
use std::thread;

use itertools::Itertools;
use log::Level;
use rayon::prelude::*;

use super::choice_model::{ChoiceSet, MarketSegment, PathChoiceModel};
use super::config::LogsumConfig;
use super::error::{PathChoiceError, Result};
use super::intrazonal::{IntrazonalCalculation, IntrazonalMethod};
use super::path_network::{ActiveMode, ActiveNetwork, NodeId};
use super::path_search::{ActivePathSearch, DistanceCost, PathSearch, SearchParameters};
use super::sinks::{OdResult, PathTraceWriter, ResultSink};


#[derive(Clone, Debug, PartialEq)]
pub struct BatchParameters {
    /// Zero uses one thread per available core.
    pub num_threads: usize,
    /// The most finished origins that may wait for the sink at once.
    pub queue_capacity: usize,
    /// Recorded for pairs with no path, and for intrazonal pairs with nothing to compute from.
    pub sentinel_value: f64,
    pub minutes_per_distance: f64,
    /// If set, only destinations within this network distance of the origin are computed.
    pub max_zone_distance: Option<f64>,
    pub progress_interval: usize,
}

impl Default for BatchParameters {
    fn default() -> BatchParameters {
        return BatchParameters {
            num_threads: 0,
            queue_capacity: 64,
            sentinel_value: -999.0,
            minutes_per_distance: 1.0,
            max_zone_distance: None,
            progress_interval: 100,
        };
    }
}

impl BatchParameters {
    pub fn validate(&self) -> Result<()> {
        if self.queue_capacity == 0 {
            return Err(PathChoiceError::Config(String::from("queue_capacity must be positive")));
        }
        if !(self.minutes_per_distance > 0.0) || !self.minutes_per_distance.is_finite() {
            return Err(PathChoiceError::Config(
                String::from("minutes_per_distance must be a finite positive value")));
        }
        if let Some(max_dist) = self.max_zone_distance {
            if !(max_dist > 0.0) {
                return Err(PathChoiceError::Config(
                    String::from("max_zone_distance must be positive")));
            }
        }
        return Ok(());
    }
}


/// The origin and destination zones of a run, each mapped to the node that represents it.
#[derive(Clone, Debug, PartialEq)]
pub struct OdUniverse {
    origins: BTreeMap<u32, NodeId>,
    destinations: BTreeMap<u32, NodeId>,
}

impl OdUniverse {
    /// Fails if two origin zones, or two destination zones, are represented by the same node.
    pub fn new(origins: BTreeMap<u32, NodeId>, destinations: BTreeMap<u32, NodeId>)
               -> Result<OdUniverse> {
        check_distinct_nodes(&origins, "origin")?;
        check_distinct_nodes(&destinations, "destination")?;
        return Ok(OdUniverse {origins, destinations});
    }

    /// Collects the zones attached to nodes under each zone field, keeping only the listed
    /// zones when a subset is given.
    pub fn from_network(network: &ActiveNetwork, origin_field: &str, destination_field: &str,
                        origin_subset: Option<&[u32]>, destination_subset: Option<&[u32]>)
                        -> Result<OdUniverse> {
        let origins = zone_map(network, origin_field, origin_subset)?;
        let destinations = zone_map(network, destination_field, destination_subset)?;
        log::info!("OD universe has {} origin and {} destination zones", origins.len(),
                   destinations.len());
        return OdUniverse::new(origins, destinations);
    }

    pub fn origins(&self) -> &BTreeMap<u32, NodeId> {
        return &self.origins;
    }

    pub fn destinations(&self) -> &BTreeMap<u32, NodeId> {
        return &self.destinations;
    }

    pub fn origin_zones(&self) -> Vec<u32> {
        return self.origins.keys().copied().collect();
    }

    pub fn destination_zones(&self) -> Vec<u32> {
        return self.destinations.keys().copied().collect();
    }

    pub fn num_pairs(&self) -> usize {
        return self.origins.len() * self.destinations.len();
    }
}

fn check_distinct_nodes(zones: &BTreeMap<u32, NodeId>, side: &str) -> Result<()> {
    let mut node_zones: HashMap<NodeId, u32> = HashMap::with_capacity(zones.len());
    for (zone, node) in zones {
        if let Some(other) = node_zones.insert(*node, *zone) {
            return Err(PathChoiceError::InvalidNetwork(
                format!("{} zones {} and {} share node {}", side, other, zone, node)));
        }
    }
    return Ok(());
}

fn zone_map(network: &ActiveNetwork, zone_field: &str, subset: Option<&[u32]>)
            -> Result<BTreeMap<u32, NodeId>> {
    let all_zones: BTreeMap<u32, NodeId> = network.zone_nodes(zone_field).into_iter().collect();
    let subset = match subset {
        Some(subset) => subset,
        None => return Ok(all_zones),
    };
    let mut zones = BTreeMap::new();
    for zone in subset {
        match all_zones.get(zone) {
            Some(node) => zones.insert(*zone, *node),
            None => return Err(PathChoiceError::not_found("zone", zone)),
        };
    }
    return Ok(zones);
}


/// Stops a running batch from starting any more origins.
#[derive(Clone, Debug, Default)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    pub fn new() -> CancelHandle {
        return CancelHandle::default();
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        return self.0.load(Ordering::SeqCst);
    }
}


#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct BatchSummary {
    pub origins: usize,
    pub pairs: usize,
    pub computed: usize,
    pub intrazonal: usize,
    pub unreachable: usize,
    pub no_alternative: usize,
    pub pruned: usize,
    /// Computed pairs whose sampling hit its maximum count before reaching its target.
    pub insufficient_sample: usize,
    /// Origins that were skipped because the batch was cancelled.
    pub cancelled: usize,
}

impl BatchSummary {
    fn add(&mut self, other: &BatchSummary) {
        self.origins += other.origins;
        self.pairs += other.pairs;
        self.computed += other.computed;
        self.intrazonal += other.intrazonal;
        self.unreachable += other.unreachable;
        self.no_alternative += other.no_alternative;
        self.pruned += other.pruned;
        self.insufficient_sample += other.insufficient_sample;
        self.cancelled += other.cancelled;
    }
}


/// Everything computed for one origin zone.  `index` is the origin's position in zone order.
struct OriginOutput {
    index: usize,
    rows: Vec<OdResult>,
    summary: BatchSummary,
}


pub struct OdDriver<'a> {
    network: &'a ActiveNetwork,
    universe: OdUniverse,
    search_params: SearchParameters,
    model: PathChoiceModel,
    segments: Vec<MarketSegment>,
    params: BatchParameters,
    intrazonal_logsum: Box<dyn IntrazonalCalculation + 'a>,
    intrazonal_time: Box<dyn IntrazonalCalculation + 'a>,
    pruning_cost: DistanceCost,
    trace_origins: HashSet<u32>,
    trace_writer: Option<Mutex<PathTraceWriter>>,
    cancel: CancelHandle,
}

impl<'a> OdDriver<'a> {
    pub fn new(network: &'a ActiveNetwork, universe: OdUniverse, search_params: SearchParameters,
               model: PathChoiceModel, segments: Vec<MarketSegment>, params: BatchParameters)
               -> OdDriver<'a> {
        return OdDriver {
            network,
            universe,
            search_params,
            model,
            segments,
            params,
            intrazonal_logsum: Box::new(IntrazonalMethod::default_logsum()),
            intrazonal_time: Box::new(IntrazonalMethod::default_time()),
            pruning_cost: DistanceCost {centroid_thru_penalty: 999.0},
            trace_origins: HashSet::new(),
            trace_writer: None,
            cancel: CancelHandle::new(),
        };
    }

    pub fn from_config(network: &'a ActiveNetwork, cfg: &LogsumConfig) -> Result<OdDriver<'a>> {
        let universe = OdUniverse::from_network(network, &cfg.origin_zone_field,
                                                &cfg.destination_zone_field,
                                                cfg.origin_zones.as_deref(),
                                                cfg.destination_zones.as_deref())?;
        let model = PathChoiceModel::new(cfg.mode, cfg.utility.clone());
        let driver = OdDriver::new(network, universe, cfg.search.clone(), model,
                                   cfg.segments.clone(), cfg.batch.clone())
            .with_intrazonal(Box::new(cfg.intrazonal_logsum.clone()),
                             Box::new(cfg.intrazonal_time.clone()))
            .with_pruning_cost(DistanceCost {
                centroid_thru_penalty: cfg.traversal_costs.centroid_thru_penalty,
            });
        if cfg.trace_origins.is_empty() {
            return Ok(driver);
        }
        let writer = PathTraceWriter::new(&cfg.trace_dir)?;
        return Ok(driver.with_trace(&cfg.trace_origins, writer));
    }

    pub fn with_intrazonal(mut self, logsum: Box<dyn IntrazonalCalculation + 'a>,
                           time: Box<dyn IntrazonalCalculation + 'a>) -> OdDriver<'a> {
        self.intrazonal_logsum = logsum;
        self.intrazonal_time = time;
        return self;
    }

    pub fn with_pruning_cost(mut self, pruning_cost: DistanceCost) -> OdDriver<'a> {
        self.pruning_cost = pruning_cost;
        return self;
    }

    pub fn with_trace(mut self, origin_zones: &[u32], writer: PathTraceWriter) -> OdDriver<'a> {
        self.trace_origins = origin_zones.iter().copied().collect();
        self.trace_writer = Some(Mutex::new(writer));
        return self;
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        return self.cancel.clone();
    }

    pub fn universe(&self) -> &OdUniverse {
        return &self.universe;
    }

    pub fn segment_names(&self) -> Vec<String> {
        return self.segments.iter().map(|ss| ss.name.clone()).collect();
    }

    /// Computes every OD pair on a pool of worker threads, one origin at a time per worker, and
    /// hands each finished origin's rows to `sink` from a single writer thread, in ascending
    /// origin zone order.  Pairs with no path get sentinel values; any other error stops the
    /// batch.
    pub fn run<S: ResultSink + Send>(&self, sink: &mut S) -> Result<BatchSummary> {
        self.search_params.validate()?;
        self.params.validate()?;
        if self.segments.is_empty() {
            return Err(PathChoiceError::Config(String::from("no market segments")));
        }
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.params.num_threads)
            .build()
            .map_err(|err| PathChoiceError::Batch(err.to_string()))?;
        log::info!("computing {} OD pairs on {} threads", self.universe.num_pairs(),
                   pool.current_num_threads());

        let origins: Vec<(u32, NodeId)> = self.universe.origins.iter()
            .map(|(zone, node)| (*zone, *node))
            .collect();
        let num_done = AtomicUsize::new(0);
        let (sender, receiver) = sync_channel::<OriginOutput>(self.params.queue_capacity);

        let (worker_result, writer_result) = thread::scope(|scope| {
            let writer = scope.spawn(move || -> Result<BatchSummary> {
                let mut summary = BatchSummary::default();
                // origins that finished ahead of an earlier one wait here
                let mut pending: BTreeMap<usize, OriginOutput> = BTreeMap::new();
                let mut next_index = 0;
                for output in receiver {
                    pending.insert(output.index, output);
                    while let Some(output) = pending.remove(&next_index) {
                        sink.write_results(&output.rows)?;
                        summary.add(&output.summary);
                        next_index += 1;
                    }
                }
                sink.finish()?;
                return Ok(summary);
            });

            let worker_result = pool.install(|| origins.par_iter().enumerate().try_for_each_init(
                || (self.model.clone(), sender.clone()),
                |(model, sender): &mut (PathChoiceModel, SyncSender<OriginOutput>),
                 (index, (zone, node))| -> Result<()> {
                    let output = if self.cancel.is_cancelled() {
                        let summary = BatchSummary {cancelled: 1, ..Default::default()};
                        OriginOutput {index, rows: vec![], summary}
                    } else {
                        self.process_origin(model, index, *zone, *node)?
                    };
                    self.log_progress(num_done.fetch_add(1, Ordering::Relaxed) + 1,
                                      origins.len());
                    return sender.send(output).map_err(|_| {
                        PathChoiceError::Batch(String::from("the result writer stopped"))
                    });
                }));
            drop(sender);

            let writer_result = match writer.join() {
                Ok(result) => result,
                Err(_) => Err(PathChoiceError::Batch(String::from("the result writer panicked"))),
            };
            (worker_result, writer_result)
        });

        // a failed writer also makes the workers fail, so report the writer's error first
        let summary = writer_result?;
        worker_result?;
        if let Some(trace_writer) = &self.trace_writer {
            lock_tracer(trace_writer)?.flush()?;
        }

        log::info!("batch finished: {} origins, {} pairs, {} computed, {} intrazonal, \
                    {} unreachable, {} with no alternatives, {} pruned, {} insufficient \
                    samples, {} origins cancelled",
                   summary.origins, summary.pairs, summary.computed, summary.intrazonal,
                   summary.unreachable, summary.no_alternative, summary.pruned,
                   summary.insufficient_sample, summary.cancelled);
        return Ok(summary);
    }

    fn log_progress(&self, num_done: usize, num_origins: usize) {
        let interval = self.params.progress_interval;
        if interval > 0 && num_done % interval == 0 && log::log_enabled!(Level::Info) {
            log::info!("finished {} of {} origins", num_done, num_origins);
        }
    }

    fn process_origin(&self, model: &PathChoiceModel, index: usize, origin_zone: u32,
                      origin_node: NodeId) -> Result<OriginOutput> {
        let traced = self.trace_origins.contains(&origin_zone);
        if traced {
            log::info!("tracing origin zone {} at node {}", origin_zone, origin_node);
        }
        let search = PathSearch::new(self.network, model.mode(), self.search_params.clone());
        let nearby = match self.params.max_zone_distance {
            Some(max_dist) => {
                let dist_search = PathSearch::new(self.network, self.pruning_cost,
                                                  self.search_params.clone());
                Some(dist_search.shortest_costs(origin_node, max_dist)?)
            }
            None => None,
        };

        let sentinel = self.params.sentinel_value;
        let mut summary = BatchSummary {origins: 1, ..Default::default()};
        let mut rows = vec![];
        let mut intrazonal_zone = None;
        for (dest_zone, dest_node) in &self.universe.destinations {
            summary.pairs += 1;
            if *dest_node == origin_node {
                intrazonal_zone = Some(*dest_zone);
                continue;
            }
            if let Some(nearby) = &nearby {
                if !nearby.contains_key(dest_node) {
                    summary.pruned += 1;
                    continue;
                }
            }
            match self.compute_pair(&search, model, (origin_zone, *dest_zone),
                                    (origin_node, *dest_node), traced) {
                Ok((result, sufficient)) => {
                    summary.computed += 1;
                    if !sufficient {
                        summary.insufficient_sample += 1;
                    }
                    rows.push(result);
                }
                Err(err) if err.is_recoverable() => {
                    log::debug!("zones ({}, {}): {}", origin_zone, dest_zone, err);
                    match err {
                        PathChoiceError::NoAlternativeAvailable { .. } =>
                            summary.no_alternative += 1,
                        _ => summary.unreachable += 1,
                    }
                    rows.push(OdResult::sentinel(origin_zone, *dest_zone, self.segments.len(),
                                                 sentinel));
                }
                Err(err) => {
                    log::error!("failed on zones ({}, {})", origin_zone, dest_zone);
                    return Err(err);
                }
            }
        }

        if let Some(dest_zone) = intrazonal_zone {
            let row = self.intrazonal_result(origin_zone, dest_zone, &rows);
            summary.intrazonal += 1;
            rows.push(row);
        }
        return Ok(OriginOutput {index, rows, summary});
    }

    /// The pair's row, and whether its path sample was sufficient.
    fn compute_pair(&self, search: &ActivePathSearch<ActiveMode>, model: &PathChoiceModel,
                    zones: (u32, u32), nodes: (NodeId, NodeId), traced: bool)
                    -> Result<(OdResult, bool)> {
        let alternatives = search.alternatives(nodes.0, nodes.1)?;
        let results = model.evaluate(self.network, &alternatives, &self.segments)?;
        if traced {
            let choice_set = ChoiceSet::from_alternatives(self.network, &alternatives,
                                                          model.mode())?;
            let probs = model.choice_probabilities(&choice_set, &self.segments[0].context)?;
            let nodes = alternatives.paths().iter()
                .map(|pp| pp.nodes().iter().join("-"))
                .join(" | ");
            log::info!("zones ({}, {}): logsums {:?}, paths {}", zones.0, zones.1,
                       results.logsums, nodes);
            if let Some(trace_writer) = &self.trace_writer {
                lock_tracer(trace_writer)?
                    .write_alternatives(zones.0, zones.1, &alternatives, &choice_set, &probs)?;
            }
        }
        let result = OdResult {
            origin_zone: zones.0,
            destination_zone: zones.1,
            logsums: results.logsums,
            distance: results.distance,
        };
        return Ok((result, alternatives.is_sample_sufficient()));
    }

    /// Derives the intrazonal row from the origin's computed rows to other zones.
    fn intrazonal_result(&self, origin_zone: u32, dest_zone: u32, rows: &[OdResult]) -> OdResult {
        let sentinel = self.params.sentinel_value;
        let valid_rows: Vec<&OdResult> = rows.iter()
            .filter(|rr| rr.distance != sentinel)
            .collect();
        let mut logsums = Vec::with_capacity(self.segments.len());
        for seg_idx in 0..self.segments.len() {
            let values: Vec<f64> = valid_rows.iter().map(|rr| rr.logsums[seg_idx]).collect();
            logsums.push(self.intrazonal_logsum.intrazonal_value(origin_zone, &values)
                         .unwrap_or(sentinel));
        }
        let mpd = self.params.minutes_per_distance;
        let times: Vec<f64> = valid_rows.iter().map(|rr| rr.distance * mpd).collect();
        let distance = match self.intrazonal_time.intrazonal_value(origin_zone, &times) {
            Some(time) => time / mpd,
            None => sentinel,
        };
        return OdResult {origin_zone, destination_zone: dest_zone, logsums, distance};
    }
}

fn lock_tracer(tracer: &Mutex<PathTraceWriter>)
               -> Result<std::sync::MutexGuard<PathTraceWriter>> {
    return tracer.lock()
        .map_err(|_| PathChoiceError::Batch(String::from("the trace writer lock is poisoned")));
}

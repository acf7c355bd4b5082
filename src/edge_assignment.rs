//! Loads trips between network nodes onto edges, splitting each trip's demand among its path
//! alternatives by choice probability.
use std::collections::HashMap;
use std::fs::File;
use std::path::Path as FsPath;

use rayon::prelude::*;

use super::choice_model::{ChoiceSet, PathChoiceModel, TravelerContext};
use super::config::LogsumConfig;
use super::error::{PathChoiceError, Result};
use super::network_factory::{parse_error, parse_f64, parse_flag, parse_u32, required, Row};
use super::path_network::{ActiveMode, ActiveNetwork, EdgeIdx, NetworkEdge, NodeId};
use super::path_search::{ActivePathSearch, PathSearch, SearchParameters};
use super::sinks::{EdgeVolume, VolumeSink};


/// Trips of one kind of traveller between two nodes.
#[derive(Clone, Debug, PartialEq)]
pub struct DemandRecord {
    pub origin: NodeId,
    pub destination: NodeId,
    pub demand: f64,
    pub context: TravelerContext,
}

impl DemandRecord {
    pub fn new(origin: NodeId, destination: NodeId, demand: f64) -> DemandRecord {
        return DemandRecord {origin, destination, demand, context: TravelerContext::default()};
    }

    fn check_demand(&self) -> Result<()> {
        if self.demand.is_finite() && self.demand >= 0.0 {
            return Ok(());
        }
        return Err(parse_error("demand", &self.demand.to_string()));
    }
}

/// Reads `origin`, `destination` and `demand` columns, plus optional `female`, `inbound` and
/// `mandatory` flags.
pub fn read_demand(path: &FsPath) -> Result<Vec<DemandRecord>> {
    let file = File::open(path)?;
    let mut reader = csv::Reader::from_reader(file);
    let mut records = vec![];
    for result in reader.deserialize() {
        let row: Row = result?;
        let record = DemandRecord {
            origin: required(parse_u32(&row, "origin")?, "origin")?,
            destination: required(parse_u32(&row, "destination")?, "destination")?,
            demand: required(parse_f64(&row, "demand")?, "demand")?,
            context: TravelerContext {
                female: parse_flag(&row, "female")?,
                inbound: parse_flag(&row, "inbound")?,
                mandatory: parse_flag(&row, "mandatory")?,
            },
        };
        record.check_demand()?;
        records.push(record);
    }
    log::info!("read {} demand records from {}", records.len(), path.display());
    return Ok(records);
}


#[derive(Clone, Debug, PartialEq, Default)]
pub struct AssignmentSummary {
    pub trips: usize,
    pub assigned: usize,
    /// Records with no usable path between their nodes.
    pub unassigned: usize,
    pub total_demand: f64,
    pub assigned_demand: f64,
}

impl AssignmentSummary {
    fn add(&mut self, other: &AssignmentSummary) {
        self.trips += other.trips;
        self.assigned += other.assigned;
        self.unassigned += other.unassigned;
        self.total_demand += other.total_demand;
        self.assigned_demand += other.assigned_demand;
    }
}

type Tally = (HashMap<EdgeIdx, f64>, AssignmentSummary);

fn empty_tally() -> Tally {
    return (HashMap::new(), AssignmentSummary::default());
}


pub struct EdgeAssigner<'a> {
    network: &'a ActiveNetwork,
    search_params: SearchParameters,
    model: PathChoiceModel,
    num_threads: usize,
}

impl<'a> EdgeAssigner<'a> {
    /// `num_threads` of zero uses one thread per available core.
    pub fn new(network: &'a ActiveNetwork, search_params: SearchParameters,
               model: PathChoiceModel, num_threads: usize) -> EdgeAssigner<'a> {
        return EdgeAssigner {network, search_params, model, num_threads};
    }

    pub fn from_config(network: &'a ActiveNetwork, cfg: &LogsumConfig) -> EdgeAssigner<'a> {
        return EdgeAssigner::new(network, cfg.search.clone(), cfg.choice_model(),
                                 cfg.batch.num_threads);
    }

    /// The volume each edge receives from one record.
    pub fn trip_volumes(&self, search: &ActivePathSearch<ActiveMode>, trip: &DemandRecord)
                        -> Result<Vec<(EdgeIdx, f64)>> {
        let alternatives = search.alternatives(trip.origin, trip.destination)?;
        let choice_set = ChoiceSet::from_alternatives(self.network, &alternatives,
                                                      self.model.mode())?;
        let probs = self.model.choice_probabilities(&choice_set, &trip.context)?;
        let mut volumes = vec![];
        for (path, prob) in alternatives.paths().iter().zip(probs) {
            for edge_idx in path.edges() {
                volumes.push((*edge_idx, trip.demand * prob));
            }
        }
        return Ok(volumes);
    }

    /// Assigns every record and writes one volume per network edge, zero for unused edges.
    /// Records with no path are counted as unassigned; any other error stops the assignment.
    pub fn assign<S: VolumeSink>(&self, trips: &[DemandRecord], sink: &mut S)
                                 -> Result<AssignmentSummary> {
        self.search_params.validate()?;
        for trip in trips {
            trip.check_demand()?;
        }
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.num_threads)
            .build()
            .map_err(|err| PathChoiceError::Batch(err.to_string()))?;
        log::info!("assigning {} demand records on {} threads", trips.len(),
                   pool.current_num_threads());

        let (edge_volumes, summary) = pool.install(|| trips.par_iter()
            .try_fold(empty_tally, |(mut volumes, mut summary), trip| -> Result<Tally> {
                let search = PathSearch::new(self.network, self.model.mode(),
                                             self.search_params.clone());
                summary.trips += 1;
                summary.total_demand += trip.demand;
                match self.trip_volumes(&search, trip) {
                    Ok(trip_volumes) => {
                        for (edge_idx, volume) in trip_volumes {
                            *volumes.entry(edge_idx).or_insert(0.0) += volume;
                        }
                        summary.assigned += 1;
                        summary.assigned_demand += trip.demand;
                    }
                    Err(err) if err.is_recoverable() => {
                        log::debug!("trip from {} to {} not assigned: {}", trip.origin,
                                    trip.destination, err);
                        summary.unassigned += 1;
                    }
                    Err(err) => return Err(err),
                }
                return Ok((volumes, summary));
            })
            .try_reduce(empty_tally, |(mut volumes, mut summary), (other_volumes, other)|
                        -> Result<Tally> {
                for (edge_idx, volume) in other_volumes {
                    *volumes.entry(edge_idx).or_insert(0.0) += volume;
                }
                summary.add(&other);
                return Ok((volumes, summary));
            }))?;

        let mut rows: Vec<EdgeVolume> = self.network.edges().enumerate()
            .map(|(idx, edge)| EdgeVolume {
                from: edge.from_node(),
                to: edge.to_node(),
                volume: edge_volumes.get(&idx).copied().unwrap_or(0.0),
            })
            .collect();
        rows.sort_by_key(|ev| (ev.from, ev.to));
        sink.write_volumes(&rows)?;

        log::info!("assigned {} of {} demand records ({} of {} trips), {} unassigned",
                   summary.assigned, summary.trips, summary.assigned_demand,
                   summary.total_demand, summary.unassigned);
        return Ok(summary);
    }
}

// imports of other modules from this crate
mod error;
pub use error::{PathChoiceError, Result};

mod geometry;
pub use geometry::Point2d;

mod path_network;
pub use path_network::{is_valid_cost, ActiveEdge, ActiveMode, ActiveNetwork, ActiveNode,
                       ActiveTraversal, EdgeIdx, NetworkEdge, NetworkNode, NetworkTraversal,
                       NodeId, PathNetwork, TurnType};

mod network_factory;
pub use network_factory::{build_active_network, classify_turn, load_network, read_edges,
                          read_nodes, read_traversals, NetworkFiles, TraversalCostParameters,
                          TraversalRecord};

mod path_search;
pub use path_search::{ActivePathSearch, CostFunction, DistanceCost, PathSearch, SampleSchedule,
                      SearchParameters};

mod path_alternatives;
pub use path_alternatives::{list_attributes, Path, PathAlternativeList, PathAttributes};

mod choice_model;
pub use choice_model::{log_sum_exp, logit_probabilities, ChoiceSet, ContextVariable,
                       MarketSegment, PathChoiceModel, PathVariable, SegmentResults,
                       TravelerContext, UtilityTerm};

mod intrazonal;
pub use intrazonal::{Factorizer, IntrazonalCalculation, IntrazonalMethod, MaxFactorCalculation,
                     MinFactorCalculation};

mod sinks;
pub use sinks::{CsvLogsumWriter, CsvVolumeWriter, EdgeVolume, LogsumMatrix, OdResult,
                PathTraceWriter, ResultSink, VolumeSink};

mod od_driver;
pub use od_driver::{BatchParameters, BatchSummary, CancelHandle, OdDriver, OdUniverse};

mod edge_assignment;
pub use edge_assignment::{read_demand, AssignmentSummary, DemandRecord, EdgeAssigner};

mod config_utils;

mod config;
pub use config::{AssignmentFiles, LogsumConfig};

#[cfg(test)]
mod test_utils;


/// Loads the network named in the config, computes logsums between all of the configured
/// zones, and writes them to the configured output file.
pub fn compute_logsums(cfg: &LogsumConfig) -> Result<BatchSummary> {
    let network = cfg.load_network()?;
    let driver = OdDriver::from_config(&network, cfg)?;
    let mut writer = CsvLogsumWriter::from_path(&cfg.output_file, &cfg.segment_names(),
                                                cfg.batch.minutes_per_distance,
                                                cfg.batch.sentinel_value)?;
    let summary = driver.run(&mut writer)?;
    log::info!("wrote logsums to {}", cfg.output_file.display());
    return Ok(summary);
}

/// Assigns the trips in the configured demand file to network edges and writes the volumes.
pub fn assign_demand(cfg: &LogsumConfig) -> Result<AssignmentSummary> {
    let files = match &cfg.assignment {
        Some(files) => files,
        None => return Err(PathChoiceError::Config(String::from("no assignment is configured"))),
    };
    let network = cfg.load_network()?;
    let trips = read_demand(&files.demand_file)?;
    let mut writer = CsvVolumeWriter::from_path(&files.output_file)?;
    let summary = EdgeAssigner::from_config(&network, cfg).assign(&trips, &mut writer)?;
    log::info!("wrote edge volumes to {}", files.output_file.display());
    return Ok(summary);
}

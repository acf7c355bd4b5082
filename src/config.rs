use std::collections::HashSet;
use std::path::{Path, PathBuf};

use yaml_rust::{Yaml, YamlLoader};

use super::choice_model::{ContextVariable, MarketSegment, PathChoiceModel, PathVariable,
                          TravelerContext, UtilityTerm};
use super::config_utils::{self, get_bool, get_f64, get_opt_f64, get_opt_f64_list,
                          get_opt_list, get_opt_str, get_opt_str_list, get_opt_usize_list,
                          get_opt_zone_list, get_str, get_usize};
use super::error::{PathChoiceError, Result};
use super::intrazonal::{Factorizer, IntrazonalMethod, MaxFactorCalculation,
                        MinFactorCalculation};
use super::network_factory::{load_network, NetworkFiles, TraversalCostParameters};
use super::od_driver::BatchParameters;
use super::path_network::{ActiveMode, ActiveNetwork};
use super::path_search::{SampleSchedule, SearchParameters};


/// Where to read trips from and write edge volumes to.
#[derive(Clone, Debug, PartialEq)]
pub struct AssignmentFiles {
    pub demand_file: PathBuf,
    pub output_file: PathBuf,
}


/// Everything needed to compute logsums for a set of zones, and optionally to assign trips to
/// edges.
#[derive(Clone, Debug)]
pub struct LogsumConfig {
    pub node_file: PathBuf,
    pub edge_file: PathBuf,
    pub traversal_file: Option<PathBuf>,
    pub zone_fields: Vec<String>,
    pub origin_zone_field: String,
    pub destination_zone_field: String,
    pub mode: ActiveMode,
    pub traversal_costs: TraversalCostParameters,
    pub search: SearchParameters,
    pub utility: Vec<UtilityTerm>,
    pub segments: Vec<MarketSegment>,
    pub batch: BatchParameters,
    pub intrazonal_logsum: IntrazonalMethod,
    pub intrazonal_time: IntrazonalMethod,
    pub origin_zones: Option<Vec<u32>>,
    pub destination_zones: Option<Vec<u32>>,
    pub trace_origins: Vec<u32>,
    pub trace_dir: PathBuf,
    pub output_file: PathBuf,
    pub assignment: Option<AssignmentFiles>,
}

impl LogsumConfig {
    pub fn from_path(path: &Path) -> Result<LogsumConfig> {
        let file_contents = std::fs::read_to_string(path)?;
        let base_dir = match path.parent() {
            Some(dir) => dir.to_path_buf(),
            None => PathBuf::from("."),
        };
        return LogsumConfig::from_yaml_str(&file_contents, &base_dir);
    }

    /// Relative file paths in the config are taken relative to `base_dir`.
    pub fn from_yaml_str(yaml_str: &str, base_dir: &Path) -> Result<LogsumConfig> {
        let yaml_cfgs = YamlLoader::load_from_str(yaml_str)?;
        match yaml_cfgs.first() {
            Some(yaml_cfg) => LogsumConfig::from_yaml(yaml_cfg, base_dir),
            None => Err(PathChoiceError::Config(String::from("the config file is empty"))),
        }
    }

    pub fn from_yaml(yaml_cfg: &Yaml, base_dir: &Path) -> Result<LogsumConfig> {
        let to_path = |path_str: &str| config_utils::str_to_absolute_path(path_str, base_dir);

        let zone_fields = get_opt_str_list(yaml_cfg, "zone_fields")?
            .unwrap_or_else(|| vec![String::from("taz")]);
        let origin_zone_field = match get_opt_str(yaml_cfg, "origin_zone_field")? {
            Some(field) => String::from(field),
            None => zone_fields.first().cloned().unwrap_or_default(),
        };
        let destination_zone_field = get_opt_str(yaml_cfg, "destination_zone_field")?
            .map(String::from)
            .unwrap_or_else(|| origin_zone_field.clone());
        for field in [&origin_zone_field, &destination_zone_field] {
            if !zone_fields.contains(field) {
                return Err(PathChoiceError::Config(
                    format!("zone field {:?} is not listed in zone_fields", field)));
            }
        }

        let mode = match get_opt_str(yaml_cfg, "mode")? {
            Some(mode) => ActiveMode::parse(mode)?,
            None => ActiveMode::Bike,
        };
        let utility = match get_opt_list(yaml_cfg, "utility")? {
            Some(terms) => parse_utility(terms)?,
            None => default_utility(mode),
        };
        let segments = match get_opt_list(yaml_cfg, "segments")? {
            Some(segments) => parse_segments(segments)?,
            None => MarketSegment::default_segments(),
        };
        let intrazonal = &yaml_cfg["intrazonal"];

        let cfg = LogsumConfig {
            node_file: to_path(get_str(yaml_cfg, "node_file")?),
            edge_file: to_path(get_str(yaml_cfg, "edge_file")?),
            traversal_file: get_opt_str(yaml_cfg, "traversal_file")?.map(to_path),
            zone_fields,
            origin_zone_field,
            destination_zone_field,
            mode,
            traversal_costs: parse_traversal_costs(yaml_cfg)?,
            search: parse_search(yaml_cfg)?,
            utility,
            segments,
            batch: parse_batch(yaml_cfg)?,
            intrazonal_logsum: parse_intrazonal(&intrazonal["logsum"], "intrazonal.logsum",
                                                IntrazonalMethod::default_logsum())?,
            intrazonal_time: parse_intrazonal(&intrazonal["time"], "intrazonal.time",
                                              IntrazonalMethod::default_time())?,
            origin_zones: get_opt_zone_list(yaml_cfg, "origin_zones")?,
            destination_zones: get_opt_zone_list(yaml_cfg, "destination_zones")?,
            trace_origins: get_opt_zone_list(yaml_cfg, "trace_origins")?.unwrap_or_default(),
            trace_dir: to_path(get_opt_str(yaml_cfg, "trace_dir")?.unwrap_or("trace")),
            output_file: to_path(get_opt_str(yaml_cfg, "output_file")?.unwrap_or("logsums.csv")),
            assignment: parse_assignment(&yaml_cfg["assignment"], &to_path)?,
        };
        cfg.search.validate()?;
        cfg.batch.validate()?;
        return Ok(cfg);
    }

    pub fn load_network(&self) -> Result<ActiveNetwork> {
        let files = NetworkFiles {
            node_file: &self.node_file,
            edge_file: &self.edge_file,
            traversal_file: self.traversal_file.as_deref(),
            zone_fields: &self.zone_fields,
        };
        return load_network(&files, &self.traversal_costs);
    }

    pub fn choice_model(&self) -> PathChoiceModel {
        return PathChoiceModel::new(self.mode, self.utility.clone());
    }

    pub fn segment_names(&self) -> Vec<String> {
        return self.segments.iter().map(|ss| ss.name.clone()).collect();
    }
}

fn default_utility(mode: ActiveMode) -> Vec<UtilityTerm> {
    match mode {
        ActiveMode::Bike => vec![
            UtilityTerm::new(PathVariable::GeneralizedCost, -1.0),
            UtilityTerm::new(PathVariable::LogPathSize, 1.0),
        ],
        ActiveMode::Walk => PathChoiceModel::walk().terms().to_vec(),
    }
}

fn parse_traversal_costs(yaml_cfg: &Yaml) -> Result<TraversalCostParameters> {
    let defaults = TraversalCostParameters::default();
    let turns = &yaml_cfg["turn_penalties"];
    return Ok(TraversalCostParameters {
        left_penalty: get_f64(turns, "left", defaults.left_penalty)?,
        right_penalty: get_f64(turns, "right", defaults.right_penalty)?,
        reversal_penalty: get_f64(turns, "reversal", defaults.reversal_penalty)?,
        signal_penalty: get_f64(yaml_cfg, "signal_penalty", defaults.signal_penalty)?,
        centroid_thru_penalty: get_f64(yaml_cfg, "centroid_thru_penalty",
                                       defaults.centroid_thru_penalty)?,
        prohibit_reversals: get_bool(yaml_cfg, "prohibit_reversals",
                                     defaults.prohibit_reversals)?,
    });
}

fn parse_search(yaml_cfg: &Yaml) -> Result<SearchParameters> {
    let max_alternatives = get_usize(yaml_cfg, "max_alternatives",
                                     SearchParameters::default().max_alternatives)?;
    let defaults = SearchParameters::with_alternatives(max_alternatives)?;
    return Ok(SearchParameters {
        max_alternatives,
        penalty_factor: get_f64(yaml_cfg, "penalty_factor", defaults.penalty_factor)?,
        max_cost_ratio: get_f64(yaml_cfg, "max_cost_ratio", defaults.max_cost_ratio)?,
        max_iterations: get_usize(yaml_cfg, "max_iterations", defaults.max_iterations)?,
        max_search_cost: get_f64(yaml_cfg, "max_search_cost", defaults.max_search_cost)?,
        random_scale: get_f64(yaml_cfg, "random_scale", defaults.random_scale)?,
        random_seed: get_usize(yaml_cfg, "random_seed", defaults.random_seed as usize)? as u64,
        random_spreads: get_opt_f64_list(yaml_cfg, "random_spreads")?.unwrap_or_default(),
        sampling: parse_sampling(&yaml_cfg["sampling"])?,
    });
}

fn parse_sampling(sampling: &Yaml) -> Result<Option<SampleSchedule>> {
    if sampling.is_badvalue() || sampling.is_null() {
        return Ok(None);
    }
    let required = |key: &str| PathChoiceError::Config(format!("sampling.{} is required", key));
    return Ok(Some(SampleSchedule {
        distance_breaks: get_opt_f64_list(sampling, "distance_breaks")?.unwrap_or_default(),
        path_sizes: get_opt_f64_list(sampling, "path_sizes")?
            .ok_or_else(|| required("path_sizes"))?,
        min_counts: get_opt_usize_list(sampling, "min_counts")?
            .ok_or_else(|| required("min_counts"))?,
        max_counts: get_opt_usize_list(sampling, "max_counts")?
            .ok_or_else(|| required("max_counts"))?,
    }));
}

fn parse_assignment<F>(assign_cfg: &Yaml, to_path: &F) -> Result<Option<AssignmentFiles>>
    where F: Fn(&str) -> PathBuf {
    if assign_cfg.is_badvalue() || assign_cfg.is_null() {
        return Ok(None);
    }
    let output_file = get_opt_str(assign_cfg, "output_file")?.unwrap_or("edge_volumes.csv");
    return Ok(Some(AssignmentFiles {
        demand_file: to_path(get_str(assign_cfg, "demand_file")?),
        output_file: to_path(output_file),
    }));
}

fn parse_batch(yaml_cfg: &Yaml) -> Result<BatchParameters> {
    let defaults = BatchParameters::default();
    return Ok(BatchParameters {
        num_threads: get_usize(yaml_cfg, "num_threads", defaults.num_threads)?,
        queue_capacity: get_usize(yaml_cfg, "queue_capacity", defaults.queue_capacity)?,
        sentinel_value: get_f64(yaml_cfg, "sentinel_value", defaults.sentinel_value)?,
        minutes_per_distance: get_f64(yaml_cfg, "minutes_per_distance",
                                      defaults.minutes_per_distance)?,
        max_zone_distance: get_opt_f64(yaml_cfg, "max_zone_distance")?,
        progress_interval: get_usize(yaml_cfg, "progress_interval", defaults.progress_interval)?,
    });
}

fn parse_utility(terms: &[Yaml]) -> Result<Vec<UtilityTerm>> {
    let mut utility = Vec::with_capacity(terms.len());
    for term in terms {
        let variable = PathVariable::parse(get_str(term, "variable")?)?;
        let coefficient = match get_opt_f64(term, "coefficient")? {
            Some(coefficient) => coefficient,
            None => return Err(PathChoiceError::Config(
                format!("utility term {} has no coefficient", variable))),
        };
        let mut term_cfg = UtilityTerm::new(variable, coefficient);
        if let Some(interaction) = get_opt_str(term, "interaction")? {
            term_cfg = term_cfg.with_interaction(ContextVariable::parse(interaction)?);
        }
        utility.push(term_cfg);
    }
    return Ok(utility);
}

fn parse_segments(segments: &[Yaml]) -> Result<Vec<MarketSegment>> {
    if segments.is_empty() {
        return Err(PathChoiceError::Config(String::from("segments must not be empty")));
    }
    let mut names = HashSet::new();
    let mut parsed = Vec::with_capacity(segments.len());
    for segment in segments {
        let name = get_str(segment, "name")?;
        if !names.insert(name) {
            return Err(PathChoiceError::Config(format!("segment {} is listed twice", name)));
        }
        let context = TravelerContext {
            female: get_bool(segment, "female", false)?,
            inbound: get_bool(segment, "inbound", false)?,
            mandatory: get_bool(segment, "mandatory", false)?,
        };
        parsed.push(MarketSegment::new(name, context));
    }
    return Ok(parsed);
}

fn parse_intrazonal(calc_cfg: &Yaml, key: &str, default: IntrazonalMethod)
                    -> Result<IntrazonalMethod> {
    if calc_cfg.is_badvalue() || calc_cfg.is_null() {
        return Ok(default);
    }
    let count = get_usize(calc_cfg, "count", 1)?;
    if count == 0 {
        return Err(PathChoiceError::Config(format!("{}.count must be positive", key)));
    }
    let fcfg = &calc_cfg["factorizer"];
    let factorizer = match get_opt_str(fcfg, "kind")?.unwrap_or("simple") {
        "simple" => Factorizer::Simple {
            factor: get_f64(fcfg, "factor", 1.0)?,
            offset: get_f64(fcfg, "offset", 0.0)?,
        },
        "positive_negative" => Factorizer::PositiveNegative {
            negative_factor: get_f64(fcfg, "negative_factor", 1.0)?,
            negative_offset: get_f64(fcfg, "negative_offset", 0.0)?,
            positive_factor: get_f64(fcfg, "positive_factor", 1.0)?,
            positive_offset: get_f64(fcfg, "positive_offset", 0.0)?,
        },
        other => return Err(PathChoiceError::Config(
            format!("{} has unknown factorizer kind {}", key, other))),
    };
    match get_str(calc_cfg, "method")? {
        "max" => Ok(IntrazonalMethod::Max(MaxFactorCalculation {factorizer, count})),
        "min" => Ok(IntrazonalMethod::Min(MinFactorCalculation {factorizer, count})),
        other => Err(PathChoiceError::Config(format!("{} has unknown method {}", key, other))),
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use approx::assert_relative_eq;
    use tempfile::tempdir;

    const MINIMAL_CFG: &str = "node_file: nodes.csv\nedge_file: /data/edges.csv\n";

    #[test]
    fn test_defaults() {
        let cfg = LogsumConfig::from_yaml_str(MINIMAL_CFG, Path::new("/runs/base")).unwrap();
        assert_eq!(cfg.node_file, PathBuf::from("/runs/base/nodes.csv"));
        assert_eq!(cfg.edge_file, PathBuf::from("/data/edges.csv"));
        assert_eq!(cfg.traversal_file, None);
        assert_eq!(cfg.zone_fields, vec![String::from("taz")]);
        assert_eq!(cfg.origin_zone_field, "taz");
        assert_eq!(cfg.destination_zone_field, "taz");
        assert_eq!(cfg.mode, ActiveMode::Bike);
        assert_eq!(cfg.search, SearchParameters::default());
        assert_eq!(cfg.batch, BatchParameters::default());
        assert_eq!(cfg.traversal_costs, TraversalCostParameters::default());
        assert_eq!(cfg.segment_names(), vec![String::from("logsum")]);
        assert_eq!(cfg.utility.len(), 2);
        assert_eq!(cfg.intrazonal_logsum, IntrazonalMethod::default_logsum());
        assert_eq!(cfg.intrazonal_time, IntrazonalMethod::default_time());
        assert_eq!(cfg.output_file, PathBuf::from("/runs/base/logsums.csv"));
        assert!(cfg.trace_origins.is_empty());
        assert_eq!(cfg.origin_zones, None);
        assert_eq!(cfg.assignment, None);
        assert_eq!(cfg.search.sampling, None);
    }

    #[test]
    fn test_full_config() {
        let text = "
node_file: nodes.csv
edge_file: edges.csv
traversal_file: traversals.csv
zone_fields: [taz, mgra]
origin_zone_field: mgra
mode: walk
turn_penalties: {left: 0.5, right: 0.25}
signal_penalty: 2
prohibit_reversals: false
max_alternatives: 2
penalty_factor: 2
max_cost_ratio: 3.5
random_scale: 0.1
random_seed: 7
utility:
  - {variable: distance, coefficient: -0.5}
  - {variable: gain, coefficient: -1, interaction: female}
segments:
  - {name: male}
  - {name: female, female: true}
num_threads: 2
sentinel_value: -1
max_zone_distance: 5000
origin_zones: [1, 2]
trace_origins: [2]
assignment: {demand_file: trips.csv}
intrazonal:
  logsum: {method: min, count: 2, factorizer: {kind: simple, factor: 0.25}}
  time:
    method: max
    factorizer: {kind: positive_negative, negative_factor: 2, positive_offset: 1}
";
        let cfg = LogsumConfig::from_yaml_str(text, Path::new("/base")).unwrap();
        assert_eq!(cfg.traversal_file, Some(PathBuf::from("/base/traversals.csv")));
        assert_eq!(cfg.origin_zone_field, "mgra");
        assert_eq!(cfg.destination_zone_field, "mgra");
        assert_eq!(cfg.mode, ActiveMode::Walk);
        assert_relative_eq!(cfg.traversal_costs.left_penalty, 0.5);
        assert_relative_eq!(cfg.traversal_costs.signal_penalty, 2.0);
        assert_relative_eq!(cfg.traversal_costs.centroid_thru_penalty, 999.0);
        assert!(!cfg.traversal_costs.prohibit_reversals);
        assert_eq!(cfg.search.max_alternatives, 2);
        assert_eq!(cfg.search.max_iterations, 8);
        assert_relative_eq!(cfg.search.penalty_factor, 2.0);
        assert_relative_eq!(cfg.search.max_cost_ratio, 3.5);
        assert_eq!(cfg.search.random_seed, 7);
        assert_eq!(cfg.utility, vec![
            UtilityTerm::new(PathVariable::Distance, -0.5),
            UtilityTerm::new(PathVariable::Gain, -1.0).with_interaction(ContextVariable::Female),
        ]);
        assert_eq!(cfg.segments[1].context, TravelerContext {female: true, ..Default::default()});
        assert_eq!(cfg.batch.num_threads, 2);
        assert_eq!(cfg.batch.sentinel_value, -1.0);
        assert_eq!(cfg.batch.max_zone_distance, Some(5000.0));
        assert_eq!(cfg.origin_zones, Some(vec![1, 2]));
        assert_eq!(cfg.trace_origins, vec![2]);
        assert_eq!(cfg.trace_dir, PathBuf::from("/base/trace"));
        assert_eq!(cfg.assignment, Some(AssignmentFiles {
            demand_file: PathBuf::from("/base/trips.csv"),
            output_file: PathBuf::from("/base/edge_volumes.csv"),
        }));
        assert_eq!(cfg.intrazonal_logsum, IntrazonalMethod::Min(MinFactorCalculation {
            factorizer: Factorizer::Simple {factor: 0.25, offset: 0.0},
            count: 2,
        }));
        assert_eq!(cfg.intrazonal_time, IntrazonalMethod::Max(MaxFactorCalculation {
            factorizer: Factorizer::PositiveNegative {
                negative_factor: 2.0,
                negative_offset: 0.0,
                positive_factor: 1.0,
                positive_offset: 1.0,
            },
            count: 1,
        }));
    }

    #[test]
    fn test_invalid_configs() {
        let bad_cfgs = [
            "edge_file: edges.csv\n",
            "node_file: n.csv\nedge_file: e.csv\npenalty_factor: 0.9\n",
            "node_file: n.csv\nedge_file: e.csv\nmax_alternatives: 4\nmax_iterations: 2\n",
            "node_file: n.csv\nedge_file: e.csv\nmode: drive\n",
            "node_file: n.csv\nedge_file: e.csv\norigin_zone_field: mgra\n",
            "node_file: n.csv\nedge_file: e.csv\nutility: [{variable: comfort, coefficient: 1}]\n",
            "node_file: n.csv\nedge_file: e.csv\nutility: [{variable: distance}]\n",
            "node_file: n.csv\nedge_file: e.csv\nsegments: [{name: a}, {name: a}]\n",
            "node_file: n.csv\nedge_file: e.csv\nqueue_capacity: 0\n",
            "node_file: n.csv\nedge_file: e.csv\nintrazonal: {logsum: {method: mean}}\n",
            "node_file: [n.csv]\nedge_file: e.csv\n",
            "node_file: n.csv\nedge_file: e.csv\nassignment: {output_file: v.csv}\n",
            "",
        ];
        for text in bad_cfgs.iter() {
            assert!(LogsumConfig::from_yaml_str(text, Path::new("/base")).is_err(), "{}", text);
        }
    }

    #[test]
    fn test_sampling_config() {
        let text = "
node_file: n.csv
edge_file: e.csv
random_spreads: [0, 0.5, 1]
sampling:
  distance_breaks: [1000, 5000]
  path_sizes: [2, 3, 4]
  min_counts: [1, 2, 3]
  max_counts: [10, 20, 30]
";
        let cfg = LogsumConfig::from_yaml_str(text, Path::new("/base")).unwrap();
        assert_eq!(cfg.search.random_spreads, vec![0.0, 0.5, 1.0]);
        assert_relative_eq!(cfg.search.spread(7), 1.0);
        let schedule = cfg.search.sampling.unwrap();
        assert_eq!(schedule.distance_breaks, vec![1000.0, 5000.0]);
        assert_eq!(schedule.max_counts, vec![10, 20, 30]);
        assert_eq!(schedule.band(2000.0), 1);

        let bad_cfgs = [
            "sampling: {distance_breaks: [1000], path_sizes: [2], min_counts: [1], \
             max_counts: [4]}\n",
            "sampling: {distance_breaks: [1000], path_sizes: [2, 2], min_counts: [5, 1], \
             max_counts: [4, 4]}\n",
            "sampling: {path_sizes: [2], max_counts: [4]}\n",
            "random_spreads: [-0.5]\n",
        ];
        for tail in bad_cfgs.iter() {
            let text = format!("node_file: n.csv\nedge_file: e.csv\n{}", tail);
            assert!(LogsumConfig::from_yaml_str(&text, Path::new("/base")).is_err(), "{}", tail);
        }
    }

    #[test]
    fn test_huge_choice_set_rejected() {
        let text = "node_file: n.csv\nedge_file: e.csv\nmax_alternatives: 4611686018427387904\n";
        assert!(matches!(LogsumConfig::from_yaml_str(text, Path::new("/base")),
                         Err(PathChoiceError::Config(_))));
        // an explicit iteration limit still needs a choice set it can fill
        let text = "node_file: n.csv\nedge_file: e.csv\nmax_alternatives: 4611686018427387904\n\
                    max_iterations: 10\n";
        assert!(LogsumConfig::from_yaml_str(text, Path::new("/base")).is_err());
    }

    #[test]
    fn test_from_path() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(&path, MINIMAL_CFG).unwrap();
        let cfg = LogsumConfig::from_path(&path).unwrap();
        assert_eq!(cfg.node_file, dir.path().join("nodes.csv"));
        assert!(matches!(LogsumConfig::from_path(&dir.path().join("absent.yaml")),
                         Err(PathChoiceError::Io(_))));
    }
}

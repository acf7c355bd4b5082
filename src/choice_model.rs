// this file evaluates multinomial logit path choice over the alternatives generated for one OD
// pair, giving choice probabilities and the logsum used as an accessibility measure.
use std::fmt;

use super::error::{PathChoiceError, Result};
use super::path_alternatives::{list_attributes, PathAlternativeList, PathAttributes};
use super::path_network::{ActiveMode, ActiveNetwork, NodeId};


/// Path attributes that can enter a utility function.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PathVariable {
    GeneralizedCost,
    Distance,
    Gain,
    Turns,
    Signals,
    UnsigLeftFromMajor,
    UnsigLeftFromMinor,
    UnsigCrossMajor,
    UnsigCrossMinor,
    DistClass1,
    DistClass2,
    DistClass3,
    DistArtNoLane,
    DistCycleTrack,
    DistBikeBlvd,
    PathSize,
    LogPathSize,
}

const PATH_VARIABLE_NAMES: [(PathVariable, &str); 17] = [
    (PathVariable::GeneralizedCost, "generalized_cost"),
    (PathVariable::Distance, "distance"),
    (PathVariable::Gain, "gain"),
    (PathVariable::Turns, "turns"),
    (PathVariable::Signals, "signals"),
    (PathVariable::UnsigLeftFromMajor, "unsig_left_from_major"),
    (PathVariable::UnsigLeftFromMinor, "unsig_left_from_minor"),
    (PathVariable::UnsigCrossMajor, "unsig_cross_major"),
    (PathVariable::UnsigCrossMinor, "unsig_cross_minor"),
    (PathVariable::DistClass1, "dist_class_1"),
    (PathVariable::DistClass2, "dist_class_2"),
    (PathVariable::DistClass3, "dist_class_3"),
    (PathVariable::DistArtNoLane, "dist_art_no_lane"),
    (PathVariable::DistCycleTrack, "dist_cycle_track"),
    (PathVariable::DistBikeBlvd, "dist_bike_blvd"),
    (PathVariable::PathSize, "path_size"),
    (PathVariable::LogPathSize, "log_path_size"),
];

impl PathVariable {
    pub fn parse(name: &str) -> Result<PathVariable> {
        let name = name.trim().to_lowercase();
        return PATH_VARIABLE_NAMES.iter()
            .find(|(_, nn)| *nn == name)
            .map(|(var, _)| *var)
            .ok_or_else(|| PathChoiceError::Parse {field: String::from("variable"), value: name});
    }

    pub fn value(&self, attrs: &PathAttributes) -> f64 {
        match self {
            PathVariable::GeneralizedCost => attrs.generalized_cost,
            PathVariable::Distance => attrs.distance,
            PathVariable::Gain => attrs.gain,
            PathVariable::Turns => attrs.turns,
            PathVariable::Signals => attrs.signals,
            PathVariable::UnsigLeftFromMajor => attrs.unsig_left_from_major,
            PathVariable::UnsigLeftFromMinor => attrs.unsig_left_from_minor,
            PathVariable::UnsigCrossMajor => attrs.unsig_cross_major,
            PathVariable::UnsigCrossMinor => attrs.unsig_cross_minor,
            PathVariable::DistClass1 => attrs.dist_class_1,
            PathVariable::DistClass2 => attrs.dist_class_2,
            PathVariable::DistClass3 => attrs.dist_class_3,
            PathVariable::DistArtNoLane => attrs.dist_art_no_lane,
            PathVariable::DistCycleTrack => attrs.dist_cycle_track,
            PathVariable::DistBikeBlvd => attrs.dist_bike_blvd,
            PathVariable::PathSize => attrs.path_size,
            PathVariable::LogPathSize => attrs.path_size.ln(),
        }
    }
}

impl fmt::Display for PathVariable {
    fn fmt(&self, ff: &mut fmt::Formatter) -> fmt::Result {
        let name = PATH_VARIABLE_NAMES.iter()
            .find(|(var, _)| var == self)
            .map(|(_, nn)| *nn)
            .unwrap_or("unknown");
        write!(ff, "{}", name)
    }
}


/// Traveler attributes that a utility term can interact with.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ContextVariable {
    Female,
    Inbound,
    Mandatory,
}

impl ContextVariable {
    pub fn parse(name: &str) -> Result<ContextVariable> {
        match name.trim().to_lowercase().as_str() {
            "female" => Ok(ContextVariable::Female),
            "inbound" => Ok(ContextVariable::Inbound),
            "mandatory" => Ok(ContextVariable::Mandatory),
            _ => Err(PathChoiceError::Parse {
                field: String::from("interaction"),
                value: String::from(name),
            }),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct TravelerContext {
    pub female: bool,
    pub inbound: bool,
    pub mandatory: bool,
}

impl TravelerContext {
    pub fn flag(&self, variable: ContextVariable) -> bool {
        match variable {
            ContextVariable::Female => self.female,
            ContextVariable::Inbound => self.inbound,
            ContextVariable::Mandatory => self.mandatory,
        }
    }
}


#[derive(Clone, Debug, PartialEq)]
pub struct UtilityTerm {
    pub variable: PathVariable,
    pub coefficient: f64,
    /// If set, the term only applies to travelers with this attribute.
    pub interaction: Option<ContextVariable>,
}

impl UtilityTerm {
    pub fn new(variable: PathVariable, coefficient: f64) -> UtilityTerm {
        return UtilityTerm {variable, coefficient, interaction: None};
    }

    pub fn with_interaction(mut self, interaction: ContextVariable) -> UtilityTerm {
        self.interaction = Some(interaction);
        return self;
    }

    fn value(&self, attrs: &PathAttributes, context: &TravelerContext) -> f64 {
        if let Some(interaction) = self.interaction {
            if !context.flag(interaction) {
                return 0.0;
            }
        }
        return self.coefficient * self.variable.value(attrs);
    }
}


/// A group of travelers that gets its own logsum column.
#[derive(Clone, Debug, PartialEq)]
pub struct MarketSegment {
    pub name: String,
    pub context: TravelerContext,
}

impl MarketSegment {
    pub fn new(name: &str, context: TravelerContext) -> MarketSegment {
        return MarketSegment {name: String::from(name), context};
    }

    pub fn default_segments() -> Vec<MarketSegment> {
        return vec![MarketSegment::new("logsum", TravelerContext::default())];
    }
}


/// The attributes of every alternative path for one OD pair.
#[derive(Clone, Debug)]
pub struct ChoiceSet {
    pub origin: NodeId,
    pub destination: NodeId,
    pub alternatives: Vec<PathAttributes>,
}

impl ChoiceSet {
    pub fn from_alternatives(network: &ActiveNetwork, alternatives: &PathAlternativeList,
                             mode: ActiveMode) -> Result<ChoiceSet> {
        return Ok(ChoiceSet {
            origin: alternatives.origin(),
            destination: alternatives.destination(),
            alternatives: list_attributes(network, alternatives, mode)?,
        });
    }
}


/// Logsums for each market segment, and the expected path distance for the first segment.
#[derive(Clone, Debug, PartialEq)]
pub struct SegmentResults {
    pub logsums: Vec<f64>,
    pub distance: f64,
}


#[derive(Clone, Debug)]
pub struct PathChoiceModel {
    mode: ActiveMode,
    terms: Vec<UtilityTerm>,
}

impl PathChoiceModel {
    pub fn new(mode: ActiveMode, terms: Vec<UtilityTerm>) -> PathChoiceModel {
        return PathChoiceModel {mode, terms};
    }

    /// The negated least walking cost, used as a walk "logsum" with a single alternative.
    pub fn walk() -> PathChoiceModel {
        return PathChoiceModel::new(ActiveMode::Walk,
                                    vec![UtilityTerm::new(PathVariable::GeneralizedCost, -1.0)]);
    }

    pub fn mode(&self) -> ActiveMode {
        return self.mode;
    }

    pub fn terms(&self) -> &[UtilityTerm] {
        return &self.terms;
    }

    pub fn utility(&self, attrs: &PathAttributes, context: &TravelerContext) -> f64 {
        return self.terms.iter().map(|term| term.value(attrs, context)).sum();
    }

    pub fn utilities(&self, choice_set: &ChoiceSet, context: &TravelerContext)
                     -> Result<Vec<f64>> {
        if choice_set.alternatives.is_empty() {
            return Err(PathChoiceError::NoAlternativeAvailable {
                origin: choice_set.origin,
                destination: choice_set.destination,
            });
        }
        let mut utilities = Vec::with_capacity(choice_set.alternatives.len());
        for (ii, attrs) in choice_set.alternatives.iter().enumerate() {
            let utility = self.utility(attrs, context);
            if !utility.is_finite() {
                return Err(PathChoiceError::InvalidPath {
                    origin: choice_set.origin,
                    destination: choice_set.destination,
                    reason: format!("alternative {} has utility {}", ii, utility),
                });
            }
            utilities.push(utility);
        }
        return Ok(utilities);
    }

    pub fn choice_probabilities(&self, choice_set: &ChoiceSet, context: &TravelerContext)
                                -> Result<Vec<f64>> {
        let utilities = self.utilities(choice_set, context)?;
        return Ok(logit_probabilities(&utilities));
    }

    pub fn logsum(&self, choice_set: &ChoiceSet, context: &TravelerContext) -> Result<f64> {
        let utilities = self.utilities(choice_set, context)?;
        return Ok(log_sum_exp(&utilities));
    }

    /// Computes each segment's logsum over the alternatives.  The distance is the
    /// probability-weighted path distance for the first segment.
    pub fn evaluate(&self, network: &ActiveNetwork, alternatives: &PathAlternativeList,
                    segments: &[MarketSegment]) -> Result<SegmentResults> {
        if alternatives.is_empty() {
            return Err(PathChoiceError::NoAlternativeAvailable {
                origin: alternatives.origin(),
                destination: alternatives.destination(),
            });
        }
        let choice_set = ChoiceSet::from_alternatives(network, alternatives, self.mode)?;
        let mut logsums = Vec::with_capacity(segments.len());
        let mut distance = 0.0;
        for (ii, segment) in segments.iter().enumerate() {
            let utilities = self.utilities(&choice_set, &segment.context)?;
            logsums.push(log_sum_exp(&utilities));
            if ii == 0 {
                let probs = logit_probabilities(&utilities);
                distance = probs.iter().zip(&choice_set.alternatives)
                    .map(|(prob, attrs)| prob * attrs.distance)
                    .sum();
            }
        }
        return Ok(SegmentResults {logsums, distance});
    }
}


/// ln(sum(exp(u))), shifted by the largest utility so large values don't overflow.
pub fn log_sum_exp(utilities: &[f64]) -> f64 {
    if utilities.len() == 1 {
        return utilities[0];
    }
    let max_util = utilities.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let sum: f64 = utilities.iter().map(|uu| (uu - max_util).exp()).sum();
    return max_util + sum.ln();
}

pub fn logit_probabilities(utilities: &[f64]) -> Vec<f64> {
    if utilities.len() == 1 {
        return vec![1.0];
    }
    let max_util = utilities.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let exps: Vec<f64> = utilities.iter().map(|uu| (uu - max_util).exp()).collect();
    let denom: f64 = exps.iter().sum();
    return exps.iter().map(|ee| ee / denom).collect();
}

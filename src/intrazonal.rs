// Values for OD pairs whose origin and destination are the same zone can't come from path search,
// so they're derived from the values from that zone to its neighbours.
use std::cmp::Ordering;


#[derive(Clone, Debug, PartialEq)]
pub enum Factorizer {
    Simple {
        factor: f64,
        offset: f64,
    },
    /// Applies a different linear function to negative and nonnegative values.
    PositiveNegative {
        negative_factor: f64,
        negative_offset: f64,
        positive_factor: f64,
        positive_offset: f64,
    },
}

impl Factorizer {
    pub fn apply(&self, value: f64) -> f64 {
        match self {
            Factorizer::Simple {factor, offset} => value * factor + offset,
            Factorizer::PositiveNegative {negative_factor, negative_offset, positive_factor,
                                          positive_offset} => {
                if value < 0.0 {
                    value * negative_factor + negative_offset
                } else {
                    value * positive_factor + positive_offset
                }
            }
        }
    }
}


/// Computes the value of an intrazonal pair from the zone's values to all other zones.
pub trait IntrazonalCalculation: Send + Sync {
    /// Returns `None` if there are no values to compute from.
    fn intrazonal_value(&self, zone: u32, values: &[f64]) -> Option<f64>;
}

impl<F> IntrazonalCalculation for F where F: Fn(u32, &[f64]) -> f64 + Send + Sync {
    fn intrazonal_value(&self, zone: u32, values: &[f64]) -> Option<f64> {
        if values.is_empty() {
            return None;
        }
        return Some(self(zone, values));
    }
}


fn sum_extreme(values: &[f64], count: usize, largest: bool) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|aa, bb| aa.partial_cmp(bb).unwrap_or(Ordering::Equal));
    if largest {
        sorted.reverse();
    }
    return Some(sorted.iter().take(count).sum());
}

/// Applies the factorizer to the sum of the `count` largest values.
#[derive(Clone, Debug, PartialEq)]
pub struct MaxFactorCalculation {
    pub factorizer: Factorizer,
    pub count: usize,
}

impl IntrazonalCalculation for MaxFactorCalculation {
    fn intrazonal_value(&self, _zone: u32, values: &[f64]) -> Option<f64> {
        return sum_extreme(values, self.count, true).map(|sum| self.factorizer.apply(sum));
    }
}

/// Applies the factorizer to the sum of the `count` smallest values.
#[derive(Clone, Debug, PartialEq)]
pub struct MinFactorCalculation {
    pub factorizer: Factorizer,
    pub count: usize,
}

impl IntrazonalCalculation for MinFactorCalculation {
    fn intrazonal_value(&self, _zone: u32, values: &[f64]) -> Option<f64> {
        return sum_extreme(values, self.count, false).map(|sum| self.factorizer.apply(sum));
    }
}


/// A configured intrazonal calculation.
#[derive(Clone, Debug, PartialEq)]
pub enum IntrazonalMethod {
    Max(MaxFactorCalculation),
    Min(MinFactorCalculation),
}

impl IntrazonalMethod {
    /// Half of the best logsum to a neighbouring zone if it is negative, otherwise double it.
    pub fn default_logsum() -> IntrazonalMethod {
        return IntrazonalMethod::Max(MaxFactorCalculation {
            factorizer: Factorizer::PositiveNegative {
                negative_factor: 0.5,
                negative_offset: 0.0,
                positive_factor: 2.0,
                positive_offset: 0.0,
            },
            count: 1,
        });
    }

    /// Half of the time to the nearest neighbouring zone.
    pub fn default_time() -> IntrazonalMethod {
        return IntrazonalMethod::Min(MinFactorCalculation {
            factorizer: Factorizer::Simple {factor: 0.5, offset: 0.0},
            count: 1,
        });
    }
}

impl IntrazonalCalculation for IntrazonalMethod {
    fn intrazonal_value(&self, zone: u32, values: &[f64]) -> Option<f64> {
        match self {
            IntrazonalMethod::Max(calc) => calc.intrazonal_value(zone, values),
            IntrazonalMethod::Min(calc) => calc.intrazonal_value(zone, values),
        }
    }
}

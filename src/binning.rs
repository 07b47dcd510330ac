use std::fmt;

use num_traits::Float;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

use crate::error::Error;

const INF: &str = "Inf";

/// Upper edge of a bin, possibly open-ended
#[derive(Copy, Clone, PartialEq, PartialOrd, Debug, Deserialize, Serialize)]
#[serde(try_from = "RawEdge", into = "RawEdge")]
pub enum UpperEdge {
    Finite(f64),
    Inf,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(untagged)]
enum RawEdge {
    Number(f64),
    Text(String),
}

impl TryFrom<RawEdge> for UpperEdge {
    type Error = Error;

    fn try_from(edge: RawEdge) -> Result<Self, Self::Error> {
        match edge {
            RawEdge::Number(x) => Ok(Self::Finite(x)),
            RawEdge::Text(s) if s == INF => Ok(Self::Inf),
            RawEdge::Text(s) => Err(Error::BinEdge(s)),
        }
    }
}

impl From<UpperEdge> for RawEdge {
    fn from(edge: UpperEdge) -> Self {
        match edge {
            UpperEdge::Finite(x) => Self::Number(x),
            UpperEdge::Inf => Self::Text(INF.to_owned()),
        }
    }
}

impl From<f64> for UpperEdge {
    fn from(x: f64) -> Self {
        if x == f64::INFINITY {
            Self::Inf
        } else {
            Self::Finite(x)
        }
    }
}

impl std::str::FromStr for UpperEdge {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == INF {
            return Ok(Self::Inf);
        }
        s.parse().map(Self::Finite).map_err(|_| Error::BinEdge(s.to_owned()))
    }
}

impl fmt::Display for UpperEdge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Finite(x) => write!(f, "{x}"),
            Self::Inf => write!(f, "{INF}"),
        }
    }
}

/// Half-open interval `[low, high)`
#[derive(Copy, Clone, PartialEq, PartialOrd, Debug, Deserialize, Serialize)]
#[serde(try_from = "(f64, UpperEdge)", into = "(f64, UpperEdge)")]
pub struct BinRange {
    low: f64,
    high: UpperEdge,
}

impl BinRange {
    pub fn new(low: f64, high: impl Into<UpperEdge>) -> Result<Self, Error> {
        let high = high.into();
        if let UpperEdge::Finite(high) = high {
            if !(low < high) {
                return Err(Error::Config(format!(
                    "empty bin: lower edge {low} is not below upper edge {high}"
                )));
            }
        }
        Ok(Self { low, high })
    }

    pub fn open(low: f64) -> Self {
        Self {
            low,
            high: UpperEdge::Inf,
        }
    }

    pub fn low(&self) -> f64 {
        self.low
    }

    pub fn high(&self) -> UpperEdge {
        self.high
    }

    pub fn contains(&self, x: f64) -> bool {
        x >= self.low
            && match self.high {
                UpperEdge::Finite(high) => x < high,
                UpperEdge::Inf => true,
            }
    }
}

impl TryFrom<(f64, UpperEdge)> for BinRange {
    type Error = Error;

    fn try_from((low, high): (f64, UpperEdge)) -> Result<Self, Self::Error> {
        Self::new(low, high)
    }
}

impl From<BinRange> for (f64, UpperEdge) {
    fn from(bin: BinRange) -> Self {
        (bin.low, bin.high)
    }
}

impl fmt::Display for BinRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}to{}", self.low, self.high)
    }
}

/// Tagger working point: the score band `(low, high]`
///
/// A single number is an inclusive lower threshold with upper bound 1.
#[derive(Copy, Clone, PartialEq, PartialOrd, Debug, Deserialize, Serialize)]
#[serde(try_from = "RawWorkingPoint", into = "RawWorkingPoint")]
pub struct WorkingPoint {
    low: f64,
    high: f64,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(untagged)]
enum RawWorkingPoint {
    Threshold(f64),
    Band(Vec<f64>),
}

impl WorkingPoint {
    pub fn threshold(low: f64) -> Result<Self, Error> {
        Self::band(low, 1.)
    }

    pub fn band(low: f64, high: f64) -> Result<Self, Error> {
        if !(low < high) {
            return Err(Error::WorkingPoint(format!(
                "the lower bound {low} has to be smaller than the upper bound {high}"
            )));
        }
        Ok(Self { low, high })
    }

    pub fn low(&self) -> f64 {
        self.low
    }

    pub fn high(&self) -> f64 {
        self.high
    }

    pub fn contains(&self, score: f64) -> bool {
        self.low < score && score <= self.high
    }
}

impl TryFrom<RawWorkingPoint> for WorkingPoint {
    type Error = Error;

    fn try_from(wp: RawWorkingPoint) -> Result<Self, Self::Error> {
        match wp {
            RawWorkingPoint::Threshold(low) => Self::threshold(low),
            RawWorkingPoint::Band(band) => match band[..] {
                [low, high] => Self::band(low, high),
                _ => Err(Error::WorkingPoint(format!(
                    "expected a number or a pair of numbers, got {band:?}"
                ))),
            },
        }
    }
}

impl From<WorkingPoint> for RawWorkingPoint {
    fn from(wp: WorkingPoint) -> Self {
        Self::Band(vec![wp.low, wp.high])
    }
}

/// Whether a tagger cut keeps the jets inside or outside a working point
#[derive(
    Display,
    EnumString,
    EnumIter,
    Copy,
    Clone,
    Eq,
    PartialEq,
    Ord,
    PartialOrd,
    Hash,
    Debug,
    Deserialize,
    Serialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Region {
    Pass,
    Fail,
}

/// Index of the bin `[edges[i], edges[i + 1])` containing `x`
pub fn find_bin<T: Float>(edges: &[T], x: T) -> Option<usize> {
    if edges.len() < 2 || x.is_nan() || x < edges[0] || x >= edges[edges.len() - 1] {
        return None;
    }
    // first edge above x, minus one
    Some(edges.partition_point(|e| *e <= x) - 1)
}

/// Like [`find_bin`], but values outside the edges go to the first or last bin
pub fn find_bin_clamped<T: Float>(edges: &[T], x: T) -> usize {
    debug_assert!(edges.len() >= 2);
    let nbins = edges.len() - 1;
    if x < edges[0] || x.is_nan() {
        0
    } else if x >= edges[nbins] {
        nbins - 1
    } else {
        edges.partition_point(|e| *e <= x) - 1
    }
}

pub fn is_strictly_increasing<T: Float>(edges: &[T]) -> bool {
    edges.windows(2).all(|w| w[0] < w[1])
}

use std::collections::BTreeMap;
use std::path::Path;

use log::debug;

use crate::error::{Error, Result};
use crate::event::{EventBatch, EventField};

/// Certified luminosity sections ("golden JSON")
///
/// The JSON maps run numbers to lists of inclusive
/// `[first, last]` luminosity section ranges.
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct LumiMask {
    runs: BTreeMap<u64, Vec<[u64; 2]>>,
}

impl LumiMask {
    pub fn load(path: &Path) -> Result<Self> {
        debug!("Reading certified luminosity sections from {path:?}");
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let raw: BTreeMap<String, Vec<[u64; 2]>> = serde_json::from_str(json)?;
        let mut runs = BTreeMap::new();
        for (run, ranges) in raw {
            let run: u64 = run.parse().map_err(|_| {
                Error::Config(format!("invalid run number '{run}'"))
            })?;
            runs.insert(run, ranges);
        }
        Ok(Self { runs })
    }

    pub fn contains(&self, run: u64, lumi: u64) -> bool {
        self.runs
            .get(&run)
            .map(|ranges| ranges.iter().any(|[first, last]| (*first..=*last).contains(&lumi)))
            .unwrap_or(false)
    }

    pub fn mask(&self, events: &EventBatch) -> Result<Vec<bool>> {
        let runs = events.scalar(EventField::Run)?;
        let lumis = events.scalar(EventField::LuminosityBlock)?;
        Ok(runs
            .iter()
            .zip(lumis)
            .map(|(run, lumi)| self.contains(*run as u64, *lumi as u64))
            .collect())
    }
}

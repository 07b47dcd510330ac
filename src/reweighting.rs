use serde::{Deserialize, Serialize};

use crate::binning::{find_bin_clamped, is_strictly_increasing};
use crate::error::{Error, Result};

/// Per-jet weights binned in pt, eta and tau21
///
/// `weights` is stored with tau21 varying fastest. Jets outside the
/// map get the weight of the closest bin.
#[derive(Clone, PartialEq, Debug, Deserialize, Serialize)]
pub struct ReweightMap {
    pub pt: Vec<f64>,
    pub eta: Vec<f64>,
    pub tau21: Vec<f64>,
    pub weights: Vec<f64>,
}

impl ReweightMap {
    pub fn validate(&self) -> Result<()> {
        for (name, edges) in [("pt", &self.pt), ("eta", &self.eta), ("tau21", &self.tau21)] {
            if edges.len() < 2 || !is_strictly_increasing(edges) {
                return Err(Error::Config(format!(
                    "{name} edges have to be at least two increasing numbers"
                )));
            }
        }
        let nbins = (self.pt.len() - 1) * (self.eta.len() - 1) * (self.tau21.len() - 1);
        if self.weights.len() != nbins {
            return Err(Error::Config(format!(
                "expected {nbins} weights, found {}",
                self.weights.len()
            )));
        }
        Ok(())
    }

    pub fn weight(&self, pt: f64, eta: f64, tau21: f64) -> f64 {
        let i = find_bin_clamped(&self.pt, pt);
        let j = find_bin_clamped(&self.eta, eta);
        let k = find_bin_clamped(&self.tau21, tau21);
        let neta = self.eta.len() - 1;
        let ntau = self.tau21.len() - 1;
        self.weights[(i * neta + j) * ntau + k]
    }
}

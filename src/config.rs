//! Layered analysis parameters
//!
//! Parameters are read from the built-in defaults and then from any
//! number of YAML files. Later layers win: mappings are merged key by
//! key, every other value is replaced. The merged tree is deserialised
//! into [`Parameters`] and validated once.
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use lazy_static::lazy_static;
use log::{debug, trace};
use serde::{Deserialize, Serialize};
use serde_yaml::Value;

use crate::binning::{BinRange, WorkingPoint};
use crate::error::{Error, Result};
use crate::event::Tagger;
use crate::reweighting::ReweightMap;
use crate::sample::Era;

const DEFAULTS: &str = include_str!("../params/defaults.yaml");

lazy_static! {
    static ref DEFAULT_LAYER: std::result::Result<Value, String> =
        serde_yaml::from_str(DEFAULTS).map_err(|err| err.to_string());
}

#[derive(Clone, PartialEq, Debug, Deserialize, Serialize)]
pub struct Parameters {
    pub object_preselection: ObjectPreselection,
    #[serde(default)]
    pub event_flags: BTreeMap<Era, Vec<String>>,
    #[serde(default)]
    pub event_flags_data: BTreeMap<Era, Vec<String>>,
    #[serde(default)]
    pub lumi: LumiParameters,
    /// trigger key → era → primary dataset → HLT paths
    #[serde(default)]
    pub triggers: BTreeMap<String, BTreeMap<Era, BTreeMap<String, Vec<String>>>>,
    #[serde(default)]
    pub mutag_calibration: Option<MutagCalibration>,
    /// era → one reweighting map per jet position
    #[serde(default)]
    pub ptetatau21_reweighting: BTreeMap<Era, Vec<ReweightMap>>,
}

#[derive(Clone, PartialEq, Debug, Deserialize, Serialize)]
pub struct ObjectPreselection {
    #[serde(rename = "FatJet")]
    pub fatjet: FatJetPreselection,
    #[serde(rename = "Muon")]
    pub muon: MuonPreselection,
    pub matching: Matching,
}

#[derive(Copy, Clone, PartialEq, Debug, Deserialize, Serialize)]
pub struct FatJetPreselection {
    pub pt: f64,
    pub eta: f64,
    #[serde(rename = "jetId")]
    pub jet_id: u32,
    /// minimum number of matched muons for mu-tagged jets
    pub nmu: u32,
}

#[derive(Copy, Clone, PartialEq, Debug, Deserialize, Serialize)]
pub struct MuonPreselection {
    pub pt: f64,
    pub eta: f64,
    pub iso: f64,
    #[serde(rename = "tightId")]
    pub tight_id: bool,
}

#[derive(Copy, Clone, PartialEq, Debug, Deserialize, Serialize)]
pub struct Matching {
    pub fatjet_dr: f64,
    pub subjet_dr: f64,
}

#[derive(Clone, PartialEq, Eq, Debug, Default, Deserialize, Serialize)]
pub struct LumiParameters {
    #[serde(rename = "goldenJSON", default)]
    pub golden_json: BTreeMap<Era, PathBuf>,
}

#[derive(Clone, PartialEq, Debug, Deserialize, Serialize)]
pub struct MutagCalibration {
    pub taggers: Vec<Tagger>,
    pub pt_binning: BTreeMap<Era, Vec<BinRange>>,
    pub msd_binning: BTreeMap<Era, Vec<BinRange>>,
    /// era → tagger → working point name → working point
    pub wp: BTreeMap<Era, BTreeMap<Tagger, BTreeMap<String, WorkingPoint>>>,
}

impl MutagCalibration {
    pub fn pt_binning(&self, era: Era) -> Result<&[BinRange]> {
        self.pt_binning
            .get(&era)
            .map(|b| b.as_slice())
            .ok_or_else(|| missing_era("mutag_calibration.pt_binning", era))
    }

    pub fn msd_binning(&self, era: Era) -> Result<&[BinRange]> {
        self.msd_binning
            .get(&era)
            .map(|b| b.as_slice())
            .ok_or_else(|| missing_era("mutag_calibration.msd_binning", era))
    }

    pub fn working_points(
        &self,
        era: Era,
        tagger: Tagger,
    ) -> Result<&BTreeMap<String, WorkingPoint>> {
        self.wp
            .get(&era)
            .ok_or_else(|| missing_era("mutag_calibration.wp", era))?
            .get(&tagger)
            .ok_or_else(|| {
                Error::Config(format!(
                    "no working points for tagger {tagger} in era {era}"
                ))
            })
    }

    fn validate(&self) -> Result<()> {
        if self.taggers.is_empty() {
            return Err(Error::Config(
                "mutag_calibration.taggers is empty".to_owned(),
            ));
        }
        for (era, wps) in &self.wp {
            for tagger in &self.taggers {
                if !wps.contains_key(tagger) {
                    return Err(Error::Config(format!(
                        "no working points for tagger {tagger} in era {era}"
                    )));
                }
            }
        }
        for (what, binning) in [("pt", &self.pt_binning), ("msd", &self.msd_binning)] {
            for (era, bins) in binning {
                if bins.is_empty() {
                    return Err(Error::Config(format!(
                        "empty {what} binning for era {era}"
                    )));
                }
            }
        }
        Ok(())
    }
}

fn missing_era(what: &str, era: Era) -> Error {
    Error::Config(format!("{what} has no entry for era {era}"))
}

impl Parameters {
    /// The built-in defaults only
    pub fn defaults() -> Result<Self> {
        Self::from_layers(Vec::new())
    }

    /// Built-in defaults overridden by `files`, in order
    pub fn load_layered<P: AsRef<Path>>(files: &[P]) -> Result<Self> {
        let mut layers = Vec::with_capacity(files.len());
        for file in files {
            let file = file.as_ref();
            debug!("Reading parameters from {file:?}");
            let content = std::fs::read_to_string(file)?;
            layers.push(serde_yaml::from_str(&content)?);
        }
        Self::from_layers(layers)
    }

    /// Built-in defaults overridden by YAML strings, in order
    pub fn from_yaml_layers(layers: &[&str]) -> Result<Self> {
        let layers = layers
            .iter()
            .map(|s| serde_yaml::from_str(s))
            .collect::<std::result::Result<Vec<Value>, _>>()?;
        Self::from_layers(layers)
    }

    fn from_layers(layers: Vec<Value>) -> Result<Self> {
        let mut merged = DEFAULT_LAYER.clone().map_err(|err| {
            Error::Config(format!("built-in defaults: {err}"))
        })?;
        for layer in layers {
            merge(&mut merged, layer);
        }
        trace!("merged parameters: {merged:#?}");
        let params: Self = serde_yaml::from_value(merged)?;
        params.validate()?;
        Ok(params)
    }

    pub fn validate(&self) -> Result<()> {
        let fj = &self.object_preselection.fatjet;
        if !(fj.pt >= 0. && fj.eta > 0.) {
            return Err(Error::Config(format!(
                "invalid FatJet preselection {fj:?}"
            )));
        }
        let mu = &self.object_preselection.muon;
        if !(mu.pt >= 0. && mu.eta > 0. && mu.iso > 0.) {
            return Err(Error::Config(format!(
                "invalid Muon preselection {mu:?}"
            )));
        }
        let m = &self.object_preselection.matching;
        if !(m.fatjet_dr > 0. && m.subjet_dr > 0.) {
            return Err(Error::Config(format!("invalid matching radii {m:?}")));
        }
        if let Some(calib) = &self.mutag_calibration {
            calib.validate()?;
        }
        for (era, maps) in &self.ptetatau21_reweighting {
            for map in maps {
                map.validate().map_err(|err| {
                    Error::Config(format!("reweighting map for {era}: {err}"))
                })?;
            }
        }
        Ok(())
    }

    pub fn mutag_calibration(&self) -> Result<&MutagCalibration> {
        self.mutag_calibration.as_ref().ok_or_else(|| {
            Error::Config("missing mutag_calibration parameters".to_owned())
        })
    }

    /// Event filter flags to require
    pub fn event_flags(&self, era: Era, is_mc: bool) -> Vec<&str> {
        let mut flags = Vec::from_iter(
            self.event_flags.get(&era).into_iter().flatten().map(|s| s.as_str()),
        );
        if !is_mc {
            flags.extend(
                self.event_flags_data
                    .get(&era)
                    .into_iter()
                    .flatten()
                    .map(|s| s.as_str()),
            );
        }
        flags
    }
}

/// Merge `overlay` into `base`, with `overlay` taking precedence
fn merge(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Mapping(base), Value::Mapping(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(&key) {
                    Some(existing) => merge(existing, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}

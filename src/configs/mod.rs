//! The shipped analyses
//!
//! Both analyses share the skim, the preselection, the flavour
//! subsamples and a set of basic fat jet histograms. They differ in
//! the categories and in the workflow processor.
pub mod fatjet_base;
pub mod fit_templates;
pub mod pt_reweighting;

use std::collections::BTreeMap;
use std::f64::consts::PI;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

use crate::config::Parameters;
use crate::cut::Cut;
use crate::cuts;
use crate::error::Result;
use crate::event::{Collection, Field};
use crate::flavor::Flavor;
use crate::histogram::{Axis, Binning, HistConf};
use crate::sample::Era;
use crate::selection::{Selection, StandardSelection};
use crate::workflow::{FatJetBaseProcessor, MutagProcessor, Processor, PtReweightProcessor};

/// Everything needed to run an analysis on event batches
#[derive(Clone, PartialEq, Debug)]
pub struct AnalysisConfig {
    pub parameters: Parameters,
    /// Event-level cuts applied before object preselection
    pub skim: Vec<Cut>,
    /// Event-level cuts applied after object preselection
    pub preselections: Vec<Cut>,
    pub categories: Selection,
    /// sample name → subsample selection, for simulated samples
    pub subsamples: BTreeMap<String, StandardSelection>,
    pub variables: BTreeMap<String, HistConf>,
}

impl AnalysisConfig {
    pub fn validate(&self) -> Result<()> {
        self.parameters.validate()?;
        for conf in self.variables.values() {
            conf.validate()?;
        }
        Ok(())
    }
}

/// Samples of the analyses
pub const SAMPLES: [&str; 5] = [
    "QCD_MuEnriched",
    "VJets",
    "TTto4Q",
    "SingleTop",
    "DATA_BTagMu",
];

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
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AnalysisKind {
    /// Preselected fat jets and muons, no mu-tag requirement
    FatjetBase,
    /// Histograms for pt/eta/tau21 reweighting maps
    PtReweighting,
    /// Reweighted templates in pt, soft-drop mass and tagger categories
    FitTemplates,
}

impl AnalysisKind {
    pub fn processor(self, parameters: Parameters, era: Era) -> Result<Box<dyn Processor>> {
        let processor: Box<dyn Processor> = match self {
            Self::FatjetBase => {
                Box::new(FatJetBaseProcessor::new(fatjet_base::config(parameters)?)?)
            }
            Self::PtReweighting => {
                Box::new(PtReweightProcessor::new(pt_reweighting::config(parameters)?)?)
            }
            Self::FitTemplates => {
                let (config, reweighted) = fit_templates::config(parameters, era)?;
                Box::new(MutagProcessor::new(config, &reweighted)?)
            }
        };
        Ok(processor)
    }
}

/// Event selection before object preselection
pub fn skim() -> Result<Vec<Cut>> {
    Ok(vec![
        cuts::npv_good(1),
        cuts::event_flags(),
        cuts::golden_json(),
        cuts::min_nobj(1, 200., Collection::FatJet),
        cuts::min_nobj_minmsd(1, Some(30.), Collection::FatJet, None)?,
        cuts::min_nobj(1, 3., Collection::Muon),
        cuts::hlt("mutag", None, false),
    ])
}

/// At least one good fat jet
pub fn preselections(parameters: &Parameters) -> Vec<Cut> {
    let pt = parameters.object_preselection.fatjet.pt;
    vec![cuts::min_nobj(1, pt, Collection::FatJetGood)]
}

/// Split of each simulated sample by fat jet flavour
pub fn flavor_subsamples() -> Result<BTreeMap<String, StandardSelection>> {
    let mut res = BTreeMap::new();
    for sample in SAMPLES.iter().filter(|s| !s.starts_with("DATA")) {
        let subsamples = Vec::from_iter(
            Flavor::all().map(|f| (format!("{sample}_{f}"), vec![cuts::flavor(f)])),
        );
        res.insert(sample.to_string(), StandardSelection::new(subsamples)?);
    }
    Ok(res)
}

fn regular(bins: usize, start: f64, stop: f64) -> Binning {
    Binning::Regular { bins, start, stop }
}

fn variable(edges: &[f64]) -> Binning {
    Binning::Variable {
        edges: edges.to_vec(),
    }
}

fn steps(start: u32, stop: u32, step: u32) -> Binning {
    Binning::Variable {
        edges: Vec::from_iter((start..=stop).step_by(step as usize).map(f64::from)),
    }
}

fn hist1d(coll: Collection, name: &str, field: Field, binning: Binning) -> (String, HistConf) {
    let name = format!("{coll}_{name}");
    let conf = HistConf::new(vec![Axis::object(name.clone(), coll, field, binning)]);
    (name, conf)
}

pub(crate) const TAU21_EDGES: [f64; 15] = [
    0., 0.20, 0.25, 0.30, 0.35, 0.40, 0.45, 0.50, 0.55, 0.60, 0.65, 0.70, 0.75, 0.80, 1.,
];

/// Basic kinematic and tagging histograms of a fat jet collection
pub fn fatjet_hists(coll: Collection) -> BTreeMap<String, HistConf> {
    BTreeMap::from_iter([
        hist1d(coll, "pt", Field::Pt, steps(300, 1000, 10)),
        hist1d(coll, "eta", Field::Eta, regular(50, -2.5, 2.5)),
        hist1d(coll, "phi", Field::Phi, regular(64, -PI, PI)),
        hist1d(coll, "mass", Field::Mass, regular(40, 0., 400.)),
        hist1d(coll, "msoftdrop", Field::MSoftdrop, steps(0, 400, 10)),
        hist1d(coll, "tau21", Field::Tau21, variable(&TAU21_EDGES)),
        hist1d(coll, "btag", Field::Btag, regular(40, 0., 1.)),
        hist1d(
            coll,
            "nMuonGoodMatchedToFatJetGood",
            Field::NMuonGoodMatchedToFatJetGood,
            Binning::Int { bins: 5, start: 0., stop: 5. },
        ),
    ])
}

/// The category used by both analyses to select boosted jet pairs
pub(crate) fn two_jet_category() -> Result<(String, Vec<Cut>)> {
    let mreg = crate::binning::BinRange::new(50., 200.)?;
    Ok((
        "leadpt300msd50subleadpt250msd50mreg50to200".to_owned(),
        vec![
            cuts::two_jet_ptmsd(300., 50., 250., 50., None),
            cuts::mregbin(mreg, None),
        ],
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn common_parts() {
        let skim = skim().unwrap();
        let names = Vec::from_iter(skim.iter().map(|c| c.name()));
        assert_eq!(
            names,
            [
                "nPVgood_1",
                "event_flags",
                "golden_json_lumimask",
                "nFatJet_min1_pt200",
                "nFatJet_min1_msd30",
                "nMuon_min1_pt3",
                "HLT_mutag"
            ]
        );
        let params = Parameters::defaults().unwrap();
        assert_eq!(preselections(&params)[0].name(), "nFatJetGood_min1_pt350");

        let subsamples = flavor_subsamples().unwrap();
        assert_eq!(subsamples.len(), 4);
        assert!(!subsamples.contains_key("DATA_BTagMu"));
        use crate::selection::Categorization;
        assert_eq!(
            subsamples["VJets"].categories(),
            ["VJets_l", "VJets_c", "VJets_b", "VJets_cc", "VJets_bb"]
        );
    }

    #[test]
    fn histograms() {
        let hists = fatjet_hists(Collection::FatJetGood);
        for conf in hists.values() {
            conf.validate().unwrap();
        }
        let pt = &hists["FatJetGood_pt"];
        assert_eq!(pt.axes[0].binning.n_bins(), 70);
    }

    #[test]
    fn kinds() {
        use std::str::FromStr;
        assert_eq!(
            AnalysisKind::from_str("fit_templates").unwrap(),
            AnalysisKind::FitTemplates
        );
        assert_eq!(AnalysisKind::PtReweighting.to_string(), "pt_reweighting");
        assert_eq!(
            AnalysisKind::from_str("fatjet_base").unwrap(),
            AnalysisKind::FatjetBase
        );
    }
}

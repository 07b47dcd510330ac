//! Histograms for the pt/eta/tau21 reweighting of simulated fat jets
use std::collections::BTreeMap;

use crate::config::Parameters;
use crate::configs::{
    fatjet_hists, flavor_subsamples, preselections, skim, two_jet_category, AnalysisConfig,
    TAU21_EDGES,
};
use crate::cuts;
use crate::error::Result;
use crate::event::{Collection, Field};
use crate::histogram::{Axis, Binning, HistConf};
use crate::selection::StandardSelection;

pub(crate) const PT_EDGES: [f64; 14] = [
    300., 320., 340., 360., 380., 400., 450., 500., 550., 600., 700., 800., 900., 2500.,
];

pub(crate) const ETA_EDGES: [f64; 19] = [
    -5., -2., -1.75, -1.5, -1.25, -1., -0.75, -0.5, -0.25, 0., 0.25, 0.5, 0.75, 1., 1.25, 1.5,
    1.75, 2., 5.,
];

const TAU21_MAP_EDGES: [f64; 9] = [0., 0.2, 0.3, 0.4, 0.5, 0.6, 0.7, 0.8, 1.];

/// Jet position, pt and eta axes, optionally with a tau21 axis
fn map_axes(coll: Collection, tau21: Option<&[f64]>) -> HistConf {
    let axis = |name: &str, field, binning| Axis::object(format!("{coll}_{name}"), coll, field, binning);
    let mut axes = vec![
        axis("pos", Field::Pos, Binning::Int { bins: 2, start: 0., stop: 2. }),
        axis("pt", Field::Pt, Binning::Variable { edges: PT_EDGES.to_vec() }),
        axis("eta", Field::Eta, Binning::Variable { edges: ETA_EDGES.to_vec() }),
    ];
    if let Some(edges) = tau21 {
        axes.push(axis("tau21", Field::Tau21, Binning::Variable { edges: edges.to_vec() }));
    }
    HistConf::new(axes)
}

pub fn variables() -> BTreeMap<String, HistConf> {
    let coll = Collection::FatJetGood;
    let mut variables = fatjet_hists(coll);
    variables.insert(format!("{coll}_pt_eta"), map_axes(coll, None));
    variables.insert(format!("{coll}_pt_eta_tau21"), map_axes(coll, Some(&TAU21_MAP_EDGES)));
    variables.insert(
        format!("{coll}_pt_eta_tau21_bintau05"),
        map_axes(coll, Some(&TAU21_EDGES)),
    );
    variables
}

pub fn config(parameters: Parameters) -> Result<AnalysisConfig> {
    let categories = StandardSelection::new(vec![
        ("pt300msd30".to_owned(), vec![cuts::ptmsd(300., 30., None)]),
        ("pt300msd80".to_owned(), vec![cuts::ptmsd(300., 80., None)]),
        (
            "pt300msd30to210".to_owned(),
            vec![cuts::ptmsd_window(300., 30., 210., None)],
        ),
        (
            "pt300msd80to170".to_owned(),
            vec![cuts::ptmsd_window(300., 80., 170., None)],
        ),
        two_jet_category()?,
    ])?;
    Ok(AnalysisConfig {
        skim: skim()?,
        preselections: preselections(&parameters),
        categories: categories.into(),
        subsamples: flavor_subsamples()?,
        variables: variables(),
        parameters,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::selection::Categorization;
    use crate::workflow::{PtReweightProcessor, PT_ETA_2D_MAPS, PT_ETA_TAU21_3D_MAPS};

    #[test]
    fn complete() {
        let config = config(Parameters::defaults().unwrap()).unwrap();
        config.validate().unwrap();
        assert_eq!(config.categories.categories().len(), 5);
        for name in PT_ETA_2D_MAPS.iter().chain(&PT_ETA_TAU21_3D_MAPS) {
            assert!(config.variables.contains_key(*name));
        }
        let map = &config.variables["FatJetGood_pt_eta_tau21"];
        assert_eq!(map.axes.len(), 4);
        assert_eq!(map.book().sumw().len(), 2 * 13 * 18 * 8);
        assert!(PtReweightProcessor::new(config).is_ok());
    }

    #[test]
    fn missing_map() {
        let mut config = config(Parameters::defaults().unwrap()).unwrap();
        config.variables.remove("FatJetGood_pt_eta_tau21_bintau05");
        assert!(PtReweightProcessor::new(config).is_err());
    }
}

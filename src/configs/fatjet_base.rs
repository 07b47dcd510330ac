//! Good fat jets and muons without mu-tag requirement
//!
//! Every good fat jet is kept, so this is the place to look at the
//! object preselection and the muon matching before any relabelling.
use crate::config::Parameters;
use crate::configs::{fatjet_hists, flavor_subsamples, preselections, skim, AnalysisConfig};
use crate::cuts;
use crate::error::Result;
use crate::event::Collection;
use crate::selection::StandardSelection;

pub fn config(parameters: Parameters) -> Result<AnalysisConfig> {
    let categories = StandardSelection::new(vec![
        ("inclusive", vec![cuts::passthrough()]),
        ("pt300msd80", vec![cuts::ptmsd(300., 80., None)]),
    ])?;
    let coll = Collection::FatJetGood;
    let mut variables = fatjet_hists(coll);
    // btag is only resolved for mu-tagged jets
    variables.remove(&format!("{coll}_btag"));
    Ok(AnalysisConfig {
        skim: skim()?,
        preselections: preselections(&parameters),
        categories: categories.into(),
        subsamples: flavor_subsamples()?,
        variables,
        parameters,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::selection::Categorization;

    #[test]
    fn histograms_without_btag() {
        let config = config(Parameters::defaults().unwrap()).unwrap();
        config.validate().unwrap();
        assert_eq!(config.categories.categories(), ["inclusive", "pt300msd80"]);
        assert!(config.variables.contains_key("FatJetGood_tau21"));
        assert!(!config.variables.contains_key("FatJetGood_btag"));
    }
}

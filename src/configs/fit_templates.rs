//! Templates for the fit of mu-tagged fat jets
//!
//! Categories are the product of soft-drop mass bins, pt bins and
//! tagger working points, plus a few inclusive regions.
use crate::binning::Region;
use crate::config::Parameters;
use crate::configs::{
    fatjet_hists, flavor_subsamples, preselections, skim, two_jet_category, AnalysisConfig,
};
use crate::cuts;
use crate::error::Result;
use crate::event::Collection;
use crate::sample::Era;
use crate::selection::{CartesianSelection, MultiCut, StandardSelection};

/// Reweighted histograms: all fat jet histograms
fn reweighted(config: &AnalysisConfig) -> Vec<String> {
    Vec::from_iter(
        config
            .variables
            .keys()
            .filter(|name| name.starts_with("FatJetGood_"))
            .filter(|name| !name.ends_with("_1") && !name.ends_with("_2"))
            .cloned(),
    )
}

fn common_categories() -> Result<StandardSelection> {
    StandardSelection::new(vec![
        ("inclusive".to_owned(), vec![cuts::passthrough()]),
        ("pt300msd40".to_owned(), vec![cuts::ptmsd(300., 40., None)]),
        ("pt300msd60".to_owned(), vec![cuts::ptmsd(300., 60., None)]),
        ("pt300msd80".to_owned(), vec![cuts::ptmsd(300., 80., None)]),
        ("pt300msd100".to_owned(), vec![cuts::ptmsd(300., 100., None)]),
        (
            "pt300msd80to170".to_owned(),
            vec![cuts::ptmsd_window(300., 80., 170., None)],
        ),
        two_jet_category()?,
    ])
}

/// Soft-drop mass, pt and tagger axes for the given era
fn multicuts(parameters: &Parameters, era: Era) -> Result<Vec<MultiCut>> {
    let calib = parameters.mutag_calibration()?;

    let msd_bins = calib.msd_binning(era)?;
    let msd = MultiCut::with_names(
        "msd",
        Vec::from_iter(msd_bins.iter().map(|bin| cuts::msdbin(*bin, None))),
        Vec::from_iter(msd_bins.iter().map(|bin| format!("msd-{bin}"))),
    )?;

    let pt_bins = calib.pt_binning(era)?;
    let pt = MultiCut::new(
        "pt",
        Vec::from_iter(pt_bins.iter().map(|bin| cuts::ptbin(*bin, None))),
    );

    let mut tagger_cuts = Vec::new();
    let mut tagger_names = Vec::new();
    for tagger in &calib.taggers {
        for (wp, value) in calib.working_points(era, *tagger)? {
            for region in [Region::Pass, Region::Fail] {
                tagger_cuts.push(cuts::inclusive_wp(*tagger, *value, region));
                tagger_names.push(format!("{tagger}-{wp}-{region}"));
            }
        }
    }
    let tagger = MultiCut::with_names("tagger", tagger_cuts, tagger_names)?;

    Ok(vec![msd, pt, tagger])
}

/// Analysis configuration and the histograms to reweight
pub fn config(parameters: Parameters, era: Era) -> Result<(AnalysisConfig, Vec<String>)> {
    let categories = CartesianSelection::new(multicuts(&parameters, era)?, common_categories()?)?;
    let config = AnalysisConfig {
        skim: skim()?,
        preselections: preselections(&parameters),
        categories: categories.into(),
        subsamples: flavor_subsamples()?,
        variables: fatjet_hists(Collection::FatJetGood),
        parameters,
    };
    let reweighted = reweighted(&config);
    Ok((config, reweighted))
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::error::Error;
    use crate::selection::Categorization;

    const CALIBRATION: &str = include_str!("../../params/mutag_calibration.yaml");

    #[test]
    fn categories() {
        let params = Parameters::from_yaml_layers(&[CALIBRATION]).unwrap();
        let (config, reweighted) = config(params, Era::Run2023PreBPix).unwrap();
        let cats = config.categories.categories();
        // 4 msd bins, 3 pt bins, 3 working points × pass/fail, 7 common
        assert_eq!(cats.len(), 4 * 3 * 6 + 7);
        assert_eq!(
            cats[0],
            "msd-40to80__Pt-300to350__particleNet_XbbVsQCD-L-pass"
        );
        assert_eq!(
            cats[4 * 3 * 6 - 1],
            "msd-170toInf__Pt-450toInf__particleNet_XbbVsQCD-T-fail"
        );
        assert!(cats.contains(&"inclusive"));
        assert!(reweighted.contains(&"FatJetGood_pt".to_owned()));
        assert_eq!(reweighted.len(), config.variables.len());
    }

    #[test]
    fn requires_calibration() {
        let params = Parameters::defaults().unwrap();
        assert!(matches!(
            config(params, Era::Run2024),
            Err(Error::Config(_))
        ));
    }
}

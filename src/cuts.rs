//! Factories for the cuts used by the analyses
//!
//! Each factory binds parameters and a default name into a [`Cut`].
//! The `name` argument overrides the default name.
use crate::binning::{BinRange, Region, WorkingPoint};
use crate::cut::Cut;
use crate::error::{Error, Result};
use crate::event::{Collection, Tagger};
use crate::flavor::Flavor;
use crate::functions::*;

fn name_or(name: Option<&str>, default: impl FnOnce() -> String) -> String {
    name.map(|s| s.to_owned()).unwrap_or_else(default)
}

pub fn passthrough() -> Cut {
    Cut::new("passthrough", Passthrough)
}

pub fn npv_good(min: u32) -> Cut {
    Cut::new(format!("nPVgood_{min}"), NPvGood { min })
}

pub fn event_flags() -> Cut {
    Cut::new("event_flags", EventFlags)
}

pub fn golden_json() -> Cut {
    Cut::new("golden_json_lumimask", GoldenJson)
}

/// Trigger selection
///
/// For simulation the OR of all the triggers under `key` is taken, for
/// data only the triggers of the sample's primary dataset. Passing
/// `primary_datasets` selects their triggers for data and simulation
/// alike, which removes the overlap between primary datasets in data.
pub fn hlt(key: &str, primary_datasets: Option<&[&str]>, invert: bool) -> Cut {
    let mut name = format!("HLT_{key}");
    if let Some(pds) = primary_datasets {
        name += "_";
        name += &pds.join("_");
    }
    if invert {
        name += "_NOT";
    }
    Cut::new(
        name,
        Hlt {
            key: key.to_owned(),
            primary_datasets: primary_datasets
                .map(|pds| pds.iter().map(|s| (*s).to_owned()).collect()),
            invert,
        },
    )
}

/// At least `n` objects in `collection` with `pt >= min_pt`
pub fn min_nobj(n: usize, min_pt: f64, collection: Collection) -> Cut {
    Cut::new(
        format!("n{collection}_min{n}_pt{min_pt}"),
        MinObjects { n, collection, min_pt },
    )
}

/// At least `n` objects in `collection`, optionally above a minimum
/// soft-drop mass
///
/// Only the variant with a soft-drop mass threshold is supported.
pub fn min_nobj_minmsd(
    n: usize,
    min_msd: Option<f64>,
    collection: Collection,
    name: Option<&str>,
) -> Result<Cut> {
    let Some(min_msd) = min_msd else {
        return Err(Error::NotImplemented(format!(
            "minimum number of {collection} without soft-drop mass threshold"
        )));
    };
    let name = name_or(name, || format!("n{collection}_min{n}_msd{min_msd}"));
    Ok(Cut::new(name, MinObjectsMsd { n, collection, min_msd }))
}

pub fn mutag_fatjet_sel(nmu: u32, name: Option<&str>) -> Cut {
    let name = name_or(name, || format!("mutag_fatjet_nmu-{nmu}"));
    Cut::new(name, MutagFatJet { nmu })
}

pub fn mutag_subjet_sel(unique_matching: bool, name: Option<&str>) -> Cut {
    let name = name_or(name, || {
        if unique_matching {
            "mutag_subjet_unique".to_owned()
        } else {
            "mutag_subjet".to_owned()
        }
    });
    Cut::new(
        name,
        MutagSubJet {
            nsubjet: 2,
            nmuons: 2,
            unique_matching,
        },
    )
}

pub fn ptbin(bin: BinRange, name: Option<&str>) -> Cut {
    let name = name_or(name, || format!("Pt-{bin}"));
    Cut::new(name, PtBin { bin })
}

pub fn msd(msd: f64, name: Option<&str>) -> Cut {
    let name = name_or(name, || format!("msd{msd}"));
    Cut::new(name, Msoftdrop { msd })
}

pub fn msdbin(bin: BinRange, name: Option<&str>) -> Cut {
    let name = name_or(name, || format!("msd{bin}"));
    Cut::new(name, MsoftdropBin { bin })
}

pub fn mregbin(bin: BinRange, name: Option<&str>) -> Cut {
    let name = name_or(name, || format!("mreg{bin}"));
    Cut::new(name, MregBin { bin })
}

pub fn ptmsd(pt: f64, msd: f64, name: Option<&str>) -> Cut {
    let name = name_or(name, || format!("pt{pt}msd{msd}"));
    Cut::new(name, PtMsd { pt, msd })
}

pub fn ptmsd_window(pt: f64, msd_min: f64, msd_max: f64, name: Option<&str>) -> Cut {
    let name = name_or(name, || format!("pt{pt}msd{msd_min}to{msd_max}"));
    Cut::new(name, PtMsdWindow { pt, msd_min, msd_max })
}

pub fn ptmsdtau(pt: f64, msd: f64, tau21: f64, name: Option<&str>) -> Cut {
    let name = name_or(name, || format!("msd{msd}tau{tau21}"));
    Cut::new(name, PtMsdTau { pt, msd, tau21 })
}

pub fn two_jet_ptmsd(
    pt_lead: f64,
    msd_lead: f64,
    pt_sublead: f64,
    msd_sublead: f64,
    name: Option<&str>,
) -> Cut {
    let name = name_or(name, || {
        format!("leadpt{pt_lead}msd{msd_lead}subpt{pt_sublead}msd{msd_sublead}")
    });
    Cut::new(
        name,
        TwoJetPtMsd {
            pt_lead,
            msd_lead,
            pt_sublead,
            msd_sublead,
        },
    )
}

/// Working point cut on all fat jets
pub fn inclusive_wp(tagger: Tagger, wp: WorkingPoint, region: Region) -> Cut {
    Cut::new(
        format!("{tagger}_{region}"),
        TaggerWp {
            tagger,
            wp,
            region,
            scope: JetScope::All,
        },
    )
}

/// Working point cut on the leading fat jet
pub fn exclusive_wp(tagger: Tagger, wp: WorkingPoint, region: Region) -> Cut {
    Cut::new(
        format!("{tagger}_{region}"),
        TaggerWp {
            tagger,
            wp,
            region,
            scope: JetScope::Leading,
        },
    )
}

/// Leading fat jet above `wp` for any of `taggers` (pass) or none (fail)
pub fn tagger_passfail(taggers: &[Tagger], wp: f64, region: Region) -> Cut {
    let names = Vec::from_iter(taggers.iter().map(|t| t.to_string()));
    Cut::new(
        format!("{}_{region}", names.join("_")),
        LeadingTaggers {
            taggers: taggers.to_vec(),
            wp,
            region,
        },
    )
}

pub fn flavor(flavor: Flavor) -> Cut {
    Cut::new(flavor.to_string(), FlavorSel { flavor })
}

/// Flavour cut from a label, failing for unknown labels
pub fn flavor_from_label(label: &str) -> Result<Cut> {
    Ok(flavor(Flavor::parse(label)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names() {
        assert_eq!(ptmsd(300., 80., None).name(), "pt300msd80");
        assert_eq!(ptmsd_window(300., 80., 170., None).name(), "pt300msd80to170");
        assert_eq!(ptbin(BinRange::open(450.), None).name(), "Pt-450toInf");
        assert_eq!(
            msdbin(BinRange::new(100., 150.).unwrap(), None).name(),
            "msd100to150"
        );
        assert_eq!(
            two_jet_ptmsd(300., 50., 250., 50., None).name(),
            "leadpt300msd50subpt250msd50"
        );
        assert_eq!(mutag_fatjet_sel(1, None).name(), "mutag_fatjet_nmu-1");
        assert_eq!(mutag_subjet_sel(true, None).name(), "mutag_subjet_unique");
        assert_eq!(ptmsd(300., 80., Some("custom")).name(), "custom");
        assert_eq!(hlt("mutag", None, false).name(), "HLT_mutag");
        assert_eq!(
            hlt("mutag", Some(&["BTagMu", "JetHT"]), true).name(),
            "HLT_mutag_BTagMu_JetHT_NOT"
        );
        assert_eq!(
            inclusive_wp(
                Tagger::ParticleNetXbbVsQcd,
                WorkingPoint::threshold(0.9).unwrap(),
                Region::Fail
            )
            .name(),
            "particleNet_XbbVsQCD_fail"
        );
        assert_eq!(
            tagger_passfail(&[Tagger::GlobalParT3Xbb, Tagger::BtagDdcvbV2], 0.5, Region::Pass)
                .name(),
            "globalParT3_Xbb_btagDDCvBV2_pass"
        );
        assert_eq!(flavor(Flavor::Bb).name(), "bb");
    }

    #[test]
    fn not_implemented() {
        assert!(matches!(
            min_nobj_minmsd(1, None, Collection::FatJet, None),
            Err(Error::NotImplemented(_))
        ));
        let cut = min_nobj_minmsd(1, Some(30.), Collection::FatJet, None).unwrap();
        assert_eq!(cut.name(), "nFatJet_min1_msd30");
    }

    #[test]
    fn unknown_flavor() {
        assert!(matches!(flavor_from_label("x"), Err(Error::UnknownFlavor(_))));
        assert_eq!(flavor_from_label("c").unwrap().name(), "c");
    }

    #[test]
    fn collections() {
        assert_eq!(ptmsd(300., 80., None).collection(), Some(Collection::FatJetGood));
        assert_eq!(two_jet_ptmsd(1., 1., 1., 1., None).collection(), None);
        assert_eq!(npv_good(1).collection(), None);
    }
}

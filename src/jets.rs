//! Object preselection and derived fat jet fields
//!
//! Every function here leaves its input untouched and returns a new
//! collection or batch.
use log::debug;

use crate::config::{FatJetPreselection, Matching, MuonPreselection, Parameters};
use crate::error::{Error, Result};
use crate::event::{Collection, EventBatch, Field, ObjectCollection};
use crate::functions::pt_descending;
use crate::mask::Jagged;
use crate::particle::delta_r;
use crate::sample::Era;

/// Muons passing the kinematic, identification and isolation criteria
pub fn muon_good(events: &EventBatch, sel: &MuonPreselection) -> Result<ObjectCollection> {
    let muons = events.collection(Collection::Muon)?;
    let pt = events.column(Collection::Muon, Field::Pt)?.values();
    let eta = events.column(Collection::Muon, Field::Eta)?.values();
    let iso = events.column(Collection::Muon, Field::PfRelIso04All)?.values();
    let tight = if sel.tight_id {
        Some(events.column(Collection::Muon, Field::TightId)?.values())
    } else {
        None
    };
    let keep = (0..muons.n_objects())
        .map(|n| {
            pt[n] > sel.pt
                && eta[n].abs() < sel.eta
                && iso[n] < sel.iso
                && tight.map(|t| t[n] != 0.).unwrap_or(true)
        })
        .collect();
    muons.filter(&Jagged::new(muons.offsets().to_vec(), keep))
}

/// Fat jets passing the kinematic and identification criteria
pub fn fatjet_good(events: &EventBatch, sel: &FatJetPreselection) -> Result<ObjectCollection> {
    let jets = events.collection(Collection::FatJet)?;
    let pt = events.column(Collection::FatJet, Field::Pt)?.values();
    let eta = events.column(Collection::FatJet, Field::Eta)?.values();
    let jet_id = events.column(Collection::FatJet, Field::JetId)?.values();
    let min_id = sel.jet_id as f64;
    let keep = (0..jets.n_objects())
        .map(|n| pt[n] > sel.pt && eta[n].abs() < sel.eta && jet_id[n] >= min_id)
        .collect();
    jets.filter(&Jagged::new(jets.offsets().to_vec(), keep))
}

/// `tau2 / tau1`, zero if `tau1` vanishes
pub fn with_tau21(jets: ObjectCollection) -> Result<ObjectCollection> {
    let tau1 = column(&jets, Collection::FatJetGood, Field::Tau1)?;
    let tau2 = column(&jets, Collection::FatJetGood, Field::Tau2)?;
    let tau21 = tau1
        .iter()
        .zip(tau2)
        .map(|(t1, t2)| if *t1 == 0. { 0. } else { t2 / t1 })
        .collect();
    Ok(jets.with_field(Field::Tau21, tau21))
}

/// Regressed mass, if the jets carry a mass correction
///
/// NanoAOD v15 provides `globalParT3_massCorrX2p`, applied to the
/// uncorrected soft-drop mass. NanoAOD v12 provides
/// `particleNet_massCorr`, applied to the jet mass.
pub fn with_mass_regression(jets: ObjectCollection) -> Result<ObjectCollection> {
    const COLL: Collection = Collection::FatJetGood;
    let mass_reg: Vec<f64> = if jets.has_field(Field::GlobalParT3MassCorrX2p) {
        let msd = column(&jets, COLL, Field::MSoftdrop)?;
        let corr = column(&jets, COLL, Field::GlobalParT3MassCorrX2p)?;
        let raw = column(&jets, COLL, Field::RawFactor)?;
        (0..jets.n_objects())
            .map(|n| msd[n] * corr[n] * (1. - raw[n]))
            .collect()
    } else if jets.has_field(Field::ParticleNetMassCorr) {
        let mass = column(&jets, COLL, Field::Mass)?;
        let corr = column(&jets, COLL, Field::ParticleNetMassCorr)?;
        mass.iter().zip(corr).map(|(m, c)| m * c).collect()
    } else {
        debug!("No mass regression available");
        return Ok(jets);
    };
    Ok(jets.with_field(Field::MassReg, mass_reg))
}

fn column<'a>(
    coll: &'a ObjectCollection,
    collection: Collection,
    field: Field,
) -> Result<&'a [f64]> {
    coll.column(field)
        .map(|c| c.values())
        .ok_or(Error::MissingColumn { collection, field })
}

/// Number of muons matched to each fat jet and its subjets
///
/// Subjet fields are only attached if the batch has subjets.
pub fn with_muon_matching(
    jets: ObjectCollection,
    muons: &ObjectCollection,
    subjets: Option<&ObjectCollection>,
    matching: &Matching,
) -> Result<ObjectCollection> {
    const FJ: Collection = Collection::FatJetGood;
    const MU: Collection = Collection::MuonGood;
    let jet_eta = column(&jets, FJ, Field::Eta)?;
    let jet_phi = column(&jets, FJ, Field::Phi)?;
    let mu_eta = column(muons, MU, Field::Eta)?;
    let mu_phi = column(muons, MU, Field::Phi)?;

    let mut n_fatjet = Vec::with_capacity(jets.n_objects());
    for ev in 0..jets.n_events() {
        for j in jets.range(ev) {
            let n = muons
                .range(ev)
                .filter(|m| {
                    delta_r(jet_eta[j], jet_phi[j], mu_eta[*m], mu_phi[*m]) < matching.fatjet_dr
                })
                .count();
            n_fatjet.push(n as f64);
        }
    }

    let Some(subjets) = subjets else {
        return Ok(jets.with_field(Field::NMuonGoodMatchedToFatJetGood, n_fatjet));
    };
    const SJ: Collection = Collection::SubJet;
    let idx1 = column(&jets, FJ, Field::SubJetIdx1)?;
    let idx2 = column(&jets, FJ, Field::SubJetIdx2)?;
    let sj_eta = column(subjets, SJ, Field::Eta)?;
    let sj_phi = column(subjets, SJ, Field::Phi)?;

    let mut n_subjet = Vec::with_capacity(jets.n_objects());
    let mut n_matched = Vec::with_capacity(jets.n_objects());
    let mut n_unique = Vec::with_capacity(jets.n_objects());
    for ev in 0..jets.n_events() {
        let sj_range = subjets.range(ev);
        let subjet = |idx: f64| -> Option<usize> {
            if !idx.is_finite() {
                return None;
            }
            let idx = usize::try_from(idx as i64).ok()?;
            (idx < sj_range.len()).then_some(sj_range.start + idx)
        };
        // closest subjet in the event for each muon
        let closest = Vec::from_iter(muons.range(ev).map(|m| {
            sj_range
                .clone()
                .map(|s| (s, delta_r(sj_eta[s], sj_phi[s], mu_eta[m], mu_phi[m])))
                .min_by(|a, b| a.1.total_cmp(&b.1))
        }));
        for j in jets.range(ev) {
            let mut own = Vec::from_iter([idx1[j], idx2[j]].into_iter().filter_map(subjet));
            own.dedup();
            n_subjet.push(own.len() as f64);
            let matched = muons
                .range(ev)
                .filter(|m| {
                    own.iter().any(|s| {
                        delta_r(sj_eta[*s], sj_phi[*s], mu_eta[*m], mu_phi[*m])
                            < matching.subjet_dr
                    })
                })
                .count();
            n_matched.push(matched as f64);
            let unique = closest
                .iter()
                .filter(|c| match c {
                    Some((s, dr)) => own.contains(s) && *dr < matching.subjet_dr,
                    None => false,
                })
                .count();
            n_unique.push(unique as f64);
        }
    }
    Ok(jets
        .with_field(Field::NMuonGoodMatchedToFatJetGood, n_fatjet)
        .with_field(Field::NSubJet, n_subjet)
        .with_field(Field::NMuonGoodMatchedToSubJet, n_matched)
        .with_field(Field::NMuonGoodMatchedUniquelyToSubJet, n_unique))
}

/// Attach `MuonGood` and `FatJetGood` with all derived fields
pub fn apply_object_preselection(
    events: &EventBatch,
    params: &Parameters,
) -> Result<EventBatch> {
    let sel = &params.object_preselection;
    let muons = muon_good(events, &sel.muon)?;
    let subjets = if events.has_collection(Collection::SubJet) {
        Some(events.collection(Collection::SubJet)?)
    } else {
        None
    };
    let jets = fatjet_good(events, &sel.fatjet)?;
    let jets = with_tau21(jets)?;
    let jets = with_muon_matching(jets, &muons, subjets, &sel.matching)?;
    let jets = with_mass_regression(jets)?;
    debug!(
        "Object preselection: {} good fat jets, {} good muons",
        jets.n_objects(),
        muons.n_objects()
    );
    Ok(events
        .clone()
        .with_collection(Collection::MuonGood, muons)
        .with_collection(Collection::FatJetGood, jets))
}

/// The `n` objects with the highest pt in each event, in descending pt
pub fn leading(coll: &ObjectCollection, collection: Collection, n: usize) -> Result<ObjectCollection> {
    let pt = coll
        .column(Field::Pt)
        .ok_or(Error::MissingColumn { collection, field: Field::Pt })?;
    let order = Vec::from_iter(pt.iter_events().map(|pt| {
        let mut idx = Vec::from_iter(0..pt.len());
        idx.sort_by(|a, b| pt_descending(pt[*a], pt[*b]));
        idx.truncate(n);
        idx
    }));
    Ok(coll.take(&order))
}

/// Position of each object in its event, starting from 0
pub fn with_position(coll: ObjectCollection) -> ObjectCollection {
    let pos = coll
        .counts()
        .into_iter()
        .flat_map(|n| (0..n).map(|i| i as f64))
        .collect();
    coll.with_field(Field::Pos, pos)
}

/// The tagger score used as `btag` in the given era
pub fn btag_field(era: Era) -> Field {
    if era.has_global_part3() {
        Field::GlobalParT3Xbb
    } else {
        Field::ParticleNetXbbVsQcd
    }
}

/// Copy the era's tagger score into the `btag` field
pub fn with_btag(coll: ObjectCollection, collection: Collection, era: Era) -> Result<ObjectCollection> {
    let field = btag_field(era);
    let scores = column(&coll, collection, field)?.to_vec();
    Ok(coll.with_field(Field::Btag, scores))
}

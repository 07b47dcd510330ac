//! Cut parameters and their evaluation
//!
//! Object-level cuts return one boolean per object of their
//! collection, event-level cuts one boolean per event.
use std::cmp::Ordering;

use crate::binning::{BinRange, Region, WorkingPoint};
use crate::cut::{Context, Evaluate, RawMask};
use crate::error::{Error, Result};
use crate::event::{Collection, EventBatch, EventField, Field, Tagger};
use crate::flavor::{flavors, Flavor};
use crate::mask::{Jagged, NullableMask};

const FATJETS: Collection = Collection::FatJetGood;

/// Apply `pred` to the given columns of each object in `collection`
fn object_mask<const N: usize, F>(
    events: &EventBatch,
    collection: Collection,
    fields: [Field; N],
    pred: F,
) -> Result<RawMask>
where
    F: Fn([f64; N]) -> bool,
{
    let objects = events.collection(collection)?;
    let mut columns = Vec::with_capacity(N);
    for field in fields {
        columns.push(events.column(collection, field)?.values());
    }
    let content = (0..objects.n_objects())
        .map(|n| pred(std::array::from_fn(|k| columns[k][n])))
        .collect();
    Ok(RawMask::Object(
        collection,
        Jagged::new(objects.offsets().to_vec(), content),
    ))
}

#[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
pub struct Passthrough;

impl Evaluate for Passthrough {
    fn evaluate(&self, events: &EventBatch, _ctx: &Context<'_>) -> Result<RawMask> {
        Ok(vec![true; events.len()].into())
    }
}

/// Minimum number of good primary vertices
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct NPvGood {
    pub min: u32,
}

impl Evaluate for NPvGood {
    fn evaluate(&self, events: &EventBatch, _ctx: &Context<'_>) -> Result<RawMask> {
        let npv = events.scalar(EventField::NPvGood)?;
        let min = self.min as f64;
        Ok(Vec::from_iter(npv.iter().map(|n| *n >= min)).into())
    }
}

/// All configured event filter flags have to be set
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
pub struct EventFlags;

impl Evaluate for EventFlags {
    fn evaluate(&self, events: &EventBatch, ctx: &Context<'_>) -> Result<RawMask> {
        let mut mask = vec![true; events.len()];
        let flags = ctx
            .parameters
            .event_flags(ctx.sample.era, ctx.sample.is_mc);
        for flag in flags {
            let bits = events.flag(flag).ok_or_else(|| {
                Error::InvalidBatch(format!("missing event flag {flag}"))
            })?;
            for (m, bit) in mask.iter_mut().zip(bits) {
                *m &= *bit;
            }
        }
        Ok(mask.into())
    }
}

/// Certified luminosity sections for data, everything for simulation
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
pub struct GoldenJson;

impl Evaluate for GoldenJson {
    fn evaluate(&self, events: &EventBatch, ctx: &Context<'_>) -> Result<RawMask> {
        if ctx.sample.is_mc {
            return Ok(vec![true; events.len()].into());
        }
        let lumi_mask = ctx.lumi_mask.ok_or_else(|| {
            Error::Config(format!("no golden JSON for era {}", ctx.sample.era))
        })?;
        Ok(lumi_mask.mask(events)?.into())
    }
}

/// Trigger selection resolved through the trigger catalogue
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Hlt {
    pub key: String,
    pub primary_datasets: Option<Vec<String>>,
    pub invert: bool,
}

impl Evaluate for Hlt {
    fn evaluate(&self, events: &EventBatch, ctx: &Context<'_>) -> Result<RawMask> {
        let mask = ctx.triggers.trigger_mask(
            events,
            &self.key,
            ctx.sample,
            self.primary_datasets.as_deref(),
            self.invert,
        )?;
        Ok(mask.into())
    }
}

/// At least `n` objects with `pt >= min_pt`
#[derive(Copy, Clone, PartialEq, Debug)]
pub struct MinObjects {
    pub n: usize,
    pub collection: Collection,
    pub min_pt: f64,
}

impl Evaluate for MinObjects {
    fn evaluate(&self, events: &EventBatch, _ctx: &Context<'_>) -> Result<RawMask> {
        let pt = events.column(self.collection, Field::Pt)?;
        let mask: Vec<bool> = pt
            .iter_events()
            .map(|pt| pt.iter().filter(|pt| **pt >= self.min_pt).count() >= self.n)
            .collect();
        Ok(mask.into())
    }
}

/// At least `n` objects with `msoftdrop >= min_msd`
#[derive(Copy, Clone, PartialEq, Debug)]
pub struct MinObjectsMsd {
    pub n: usize,
    pub collection: Collection,
    pub min_msd: f64,
}

impl Evaluate for MinObjectsMsd {
    fn evaluate(&self, events: &EventBatch, _ctx: &Context<'_>) -> Result<RawMask> {
        let msd = events.column(self.collection, Field::MSoftdrop)?;
        let mask: Vec<bool> = msd
            .iter_events()
            .map(|msd| msd.iter().filter(|m| **m >= self.min_msd).count() >= self.n)
            .collect();
        Ok(mask.into())
    }
}

/// Fat jets in a pt bin
#[derive(Copy, Clone, PartialEq, Debug)]
pub struct PtBin {
    pub bin: BinRange,
}

impl Evaluate for PtBin {
    fn evaluate(&self, events: &EventBatch, _ctx: &Context<'_>) -> Result<RawMask> {
        object_mask(events, FATJETS, [Field::Pt], |[pt]| self.bin.contains(pt))
    }

    fn collection(&self) -> Option<Collection> {
        Some(FATJETS)
    }
}

/// Fat jets in a soft-drop mass bin
#[derive(Copy, Clone, PartialEq, Debug)]
pub struct MsoftdropBin {
    pub bin: BinRange,
}

impl Evaluate for MsoftdropBin {
    fn evaluate(&self, events: &EventBatch, _ctx: &Context<'_>) -> Result<RawMask> {
        object_mask(events, FATJETS, [Field::MSoftdrop], |[msd]| {
            self.bin.contains(msd)
        })
    }

    fn collection(&self) -> Option<Collection> {
        Some(FATJETS)
    }
}

/// Fat jets in a regressed mass bin
///
/// The regressed mass has to be attached during object preselection.
#[derive(Copy, Clone, PartialEq, Debug)]
pub struct MregBin {
    pub bin: BinRange,
}

impl Evaluate for MregBin {
    fn evaluate(&self, events: &EventBatch, _ctx: &Context<'_>) -> Result<RawMask> {
        if !events.collection(FATJETS)?.has_field(Field::MassReg) {
            return Err(Error::MissingMassRegression(FATJETS));
        }
        object_mask(events, FATJETS, [Field::MassReg], |[m]| self.bin.contains(m))
    }

    fn collection(&self) -> Option<Collection> {
        Some(FATJETS)
    }
}

/// Fat jets above a soft-drop mass threshold
#[derive(Copy, Clone, PartialEq, Debug)]
pub struct Msoftdrop {
    pub msd: f64,
}

impl Evaluate for Msoftdrop {
    fn evaluate(&self, events: &EventBatch, _ctx: &Context<'_>) -> Result<RawMask> {
        object_mask(events, FATJETS, [Field::MSoftdrop], |[msd]| msd > self.msd)
    }

    fn collection(&self) -> Option<Collection> {
        Some(FATJETS)
    }
}

#[derive(Copy, Clone, PartialEq, Debug)]
pub struct PtMsd {
    pub pt: f64,
    pub msd: f64,
}

impl Evaluate for PtMsd {
    fn evaluate(&self, events: &EventBatch, _ctx: &Context<'_>) -> Result<RawMask> {
        object_mask(events, FATJETS, [Field::Pt, Field::MSoftdrop], |[pt, msd]| {
            pt > self.pt && msd > self.msd
        })
    }

    fn collection(&self) -> Option<Collection> {
        Some(FATJETS)
    }
}

#[derive(Copy, Clone, PartialEq, Debug)]
pub struct PtMsdWindow {
    pub pt: f64,
    pub msd_min: f64,
    pub msd_max: f64,
}

impl Evaluate for PtMsdWindow {
    fn evaluate(&self, events: &EventBatch, _ctx: &Context<'_>) -> Result<RawMask> {
        object_mask(events, FATJETS, [Field::Pt, Field::MSoftdrop], |[pt, msd]| {
            pt > self.pt && msd > self.msd_min && msd < self.msd_max
        })
    }

    fn collection(&self) -> Option<Collection> {
        Some(FATJETS)
    }
}

#[derive(Copy, Clone, PartialEq, Debug)]
pub struct PtMsdTau {
    pub pt: f64,
    pub msd: f64,
    pub tau21: f64,
}

impl Evaluate for PtMsdTau {
    fn evaluate(&self, events: &EventBatch, _ctx: &Context<'_>) -> Result<RawMask> {
        object_mask(
            events,
            FATJETS,
            [Field::Pt, Field::MSoftdrop, Field::Tau21],
            |[pt, msd, tau21]| pt > self.pt && msd > self.msd && tau21 < self.tau21,
        )
    }

    fn collection(&self) -> Option<Collection> {
        Some(FATJETS)
    }
}

/// Separate pt and soft-drop mass thresholds for the leading and
/// subleading fat jet
#[derive(Copy, Clone, PartialEq, Debug)]
pub struct TwoJetPtMsd {
    pub pt_lead: f64,
    pub msd_lead: f64,
    pub pt_sublead: f64,
    pub msd_sublead: f64,
}

impl Evaluate for TwoJetPtMsd {
    fn evaluate(&self, events: &EventBatch, _ctx: &Context<'_>) -> Result<RawMask> {
        let pt = events.column(FATJETS, Field::Pt)?;
        let msd = events.column(FATJETS, Field::MSoftdrop)?;
        let mut lead = Vec::with_capacity(events.len());
        let mut sublead = Vec::with_capacity(events.len());
        let mut has_two_jets = Vec::with_capacity(events.len());
        for (pt, msd) in pt.iter_events().zip(msd.iter_events()) {
            let mut jets = Vec::from_iter(pt.iter().copied().zip(msd.iter().copied()));
            jets.sort_by(|a, b| pt_descending(a.0, b.0));
            has_two_jets.push(jets.len() >= 2);
            let pass = |jet: Option<&(f64, f64)>, pt_min: f64, msd_min: f64| {
                jet.map(|(pt, msd)| *pt > pt_min && *msd > msd_min)
            };
            lead.push(pass(jets.first(), self.pt_lead, self.msd_lead));
            sublead.push(pass(jets.get(1), self.pt_sublead, self.msd_sublead));
        }
        let lead = NullableMask(lead).fill_none(false);
        let sublead = NullableMask(sublead).fill_none(false);
        let mask = has_two_jets
            .into_iter()
            .zip(lead.0)
            .zip(sublead.0)
            .map(|((two, lead), sublead)| lead.zip(sublead).map(|(l, s)| two && l && s))
            .collect::<NullableMask>();
        Ok(mask.into())
    }
}

/// Ordering for sorting by descending pt
pub(crate) fn pt_descending(a: f64, b: f64) -> Ordering {
    b.total_cmp(&a)
}

/// Fat jets with a minimum number of matched muons
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct MutagFatJet {
    pub nmu: u32,
}

impl Evaluate for MutagFatJet {
    fn evaluate(&self, events: &EventBatch, _ctx: &Context<'_>) -> Result<RawMask> {
        let nmu = self.nmu as f64;
        object_mask(
            events,
            FATJETS,
            [Field::NMuonGoodMatchedToFatJetGood],
            |[n]| n >= nmu,
        )
    }

    fn collection(&self) -> Option<Collection> {
        Some(FATJETS)
    }
}

/// Fat jets with enough subjets and enough muons matched to them
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct MutagSubJet {
    pub nsubjet: u32,
    pub nmuons: u32,
    pub unique_matching: bool,
}

impl Evaluate for MutagSubJet {
    fn evaluate(&self, events: &EventBatch, _ctx: &Context<'_>) -> Result<RawMask> {
        let matched = if self.unique_matching {
            Field::NMuonGoodMatchedUniquelyToSubJet
        } else {
            Field::NMuonGoodMatchedToSubJet
        };
        let (nsubjet, nmuons) = (self.nsubjet as f64, self.nmuons as f64);
        object_mask(events, FATJETS, [Field::NSubJet, matched], |[nsj, nmu]| {
            nsj >= nsubjet && nmu >= nmuons
        })
    }

    fn collection(&self) -> Option<Collection> {
        Some(FATJETS)
    }
}

/// Which fat jets a tagger working point cut looks at
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum JetScope {
    /// every fat jet, giving an object mask
    All,
    /// only the first fat jet, giving an event mask
    Leading,
}

/// Tagger score inside (`pass`) or outside (`fail`) a working point
///
/// `fail` is restricted to valid scores in `[0, 1]`.
#[derive(Copy, Clone, PartialEq, Debug)]
pub struct TaggerWp {
    pub tagger: Tagger,
    pub wp: WorkingPoint,
    pub region: Region,
    pub scope: JetScope,
}

impl TaggerWp {
    pub fn selects(&self, score: f64) -> bool {
        match self.region {
            Region::Pass => self.wp.contains(score),
            Region::Fail => !self.wp.contains(score) && (0. ..=1.).contains(&score),
        }
    }
}

impl Evaluate for TaggerWp {
    fn evaluate(&self, events: &EventBatch, _ctx: &Context<'_>) -> Result<RawMask> {
        let field = self.tagger.field();
        match self.scope {
            JetScope::All => object_mask(events, FATJETS, [field], |[score]| self.selects(score)),
            JetScope::Leading => {
                let scores = events.column(FATJETS, field)?;
                let mask = scores
                    .nth(0)
                    .into_iter()
                    .map(|score| score.map(|s| self.selects(s)))
                    .collect::<NullableMask>();
                Ok(mask.fill_none(false).into())
            }
        }
    }

    fn collection(&self) -> Option<Collection> {
        match self.scope {
            JetScope::All => Some(FATJETS),
            JetScope::Leading => None,
        }
    }
}

/// Leading fat jet above threshold for any of several taggers
#[derive(Clone, PartialEq, Debug)]
pub struct LeadingTaggers {
    pub taggers: Vec<Tagger>,
    pub wp: f64,
    pub region: Region,
}

impl Evaluate for LeadingTaggers {
    fn evaluate(&self, events: &EventBatch, _ctx: &Context<'_>) -> Result<RawMask> {
        let mut pass = NullableMask(vec![Some(false); events.len()]);
        for tagger in &self.taggers {
            let scores = events.column(FATJETS, tagger.field())?.nth(0);
            for (p, score) in pass.0.iter_mut().zip(scores) {
                *p = match (*p, score) {
                    (Some(p), Some(s)) => Some(p || s > self.wp),
                    _ => None,
                };
            }
        }
        let mask = match self.region {
            Region::Pass => pass,
            Region::Fail => pass.0.into_iter().map(|p| p.map(|p| !p)).collect(),
        };
        Ok(mask.fill_none(false).into())
    }
}

/// Fat jets of one flavour
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct FlavorSel {
    pub flavor: Flavor,
}

impl Evaluate for FlavorSel {
    fn evaluate(&self, events: &EventBatch, _ctx: &Context<'_>) -> Result<RawMask> {
        let labels = flavors(events, FATJETS)?;
        let content = labels.content().iter().map(|f| *f == self.flavor).collect();
        Ok(RawMask::Object(
            FATJETS,
            Jagged::new(labels.offsets().to_vec(), content),
        ))
    }

    fn collection(&self) -> Option<Collection> {
        Some(FATJETS)
    }
}

use log::trace;

use crate::config::Parameters;
use crate::error::{Error, Result};
use crate::event::{Collection, EventBatch};
use crate::functions::*;
use crate::lumi::LumiMask;
use crate::mask::{Jagged, Mask, NullableMask};
use crate::sample::SampleInfo;
use crate::trigger::TriggerCatalog;

/// Everything a cut may need besides the events themselves
#[derive(Copy, Clone)]
pub struct Context<'a> {
    pub sample: &'a SampleInfo,
    pub parameters: &'a Parameters,
    pub triggers: &'a dyn TriggerCatalog,
    pub lumi_mask: Option<&'a LumiMask>,
}

/// Mask as produced by an evaluator, before null entries are checked
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum RawMask {
    Event(NullableMask),
    Object(Collection, Jagged<bool>),
}

impl From<Vec<bool>> for RawMask {
    fn from(mask: Vec<bool>) -> Self {
        Self::Event(NullableMask(mask.into_iter().map(Some).collect()))
    }
}

impl From<NullableMask> for RawMask {
    fn from(mask: NullableMask) -> Self {
        Self::Event(mask)
    }
}

pub trait Evaluate {
    fn evaluate(&self, events: &EventBatch, ctx: &Context<'_>) -> Result<RawMask>;

    /// The collection an object-level cut acts on
    fn collection(&self) -> Option<Collection> {
        None
    }
}

/// All supported cuts with their parameters
#[derive(Clone, PartialEq, Debug)]
pub enum CutKind {
    Passthrough(Passthrough),
    NPvGood(NPvGood),
    EventFlags(EventFlags),
    GoldenJson(GoldenJson),
    Hlt(Hlt),
    MinObjects(MinObjects),
    MinObjectsMsd(MinObjectsMsd),
    PtBin(PtBin),
    MsoftdropBin(MsoftdropBin),
    MregBin(MregBin),
    Msoftdrop(Msoftdrop),
    PtMsd(PtMsd),
    PtMsdWindow(PtMsdWindow),
    PtMsdTau(PtMsdTau),
    TwoJetPtMsd(TwoJetPtMsd),
    MutagFatJet(MutagFatJet),
    MutagSubJet(MutagSubJet),
    TaggerWp(TaggerWp),
    LeadingTaggers(LeadingTaggers),
    Flavor(FlavorSel),
}

macro_rules! dispatch {
    ($kind:expr, $cut:ident => $body:expr) => {
        match $kind {
            CutKind::Passthrough($cut) => $body,
            CutKind::NPvGood($cut) => $body,
            CutKind::EventFlags($cut) => $body,
            CutKind::GoldenJson($cut) => $body,
            CutKind::Hlt($cut) => $body,
            CutKind::MinObjects($cut) => $body,
            CutKind::MinObjectsMsd($cut) => $body,
            CutKind::PtBin($cut) => $body,
            CutKind::MsoftdropBin($cut) => $body,
            CutKind::MregBin($cut) => $body,
            CutKind::Msoftdrop($cut) => $body,
            CutKind::PtMsd($cut) => $body,
            CutKind::PtMsdWindow($cut) => $body,
            CutKind::PtMsdTau($cut) => $body,
            CutKind::TwoJetPtMsd($cut) => $body,
            CutKind::MutagFatJet($cut) => $body,
            CutKind::MutagSubJet($cut) => $body,
            CutKind::TaggerWp($cut) => $body,
            CutKind::LeadingTaggers($cut) => $body,
            CutKind::Flavor($cut) => $body,
        }
    };
}

impl Evaluate for CutKind {
    fn evaluate(&self, events: &EventBatch, ctx: &Context<'_>) -> Result<RawMask> {
        dispatch!(self, cut => cut.evaluate(events, ctx))
    }

    fn collection(&self) -> Option<Collection> {
        dispatch!(self, cut => cut.collection())
    }
}

macro_rules! impl_from_params {
    ($($variant:ident($params:ty)),* $(,)?) => {
        $(
            impl From<$params> for CutKind {
                fn from(params: $params) -> Self {
                    CutKind::$variant(params)
                }
            }
        )*
    };
}

impl_from_params!(
    Passthrough(Passthrough),
    NPvGood(NPvGood),
    EventFlags(EventFlags),
    GoldenJson(GoldenJson),
    Hlt(Hlt),
    MinObjects(MinObjects),
    MinObjectsMsd(MinObjectsMsd),
    PtBin(PtBin),
    MsoftdropBin(MsoftdropBin),
    MregBin(MregBin),
    Msoftdrop(Msoftdrop),
    PtMsd(PtMsd),
    PtMsdWindow(PtMsdWindow),
    PtMsdTau(PtMsdTau),
    TwoJetPtMsd(TwoJetPtMsd),
    MutagFatJet(MutagFatJet),
    MutagSubJet(MutagSubJet),
    TaggerWp(TaggerWp),
    LeadingTaggers(LeadingTaggers),
    Flavor(FlavorSel),
);

/// A named, parameterised selection
///
/// Cuts are immutable once built and can be shared between threads.
#[derive(Clone, PartialEq, Debug)]
pub struct Cut {
    name: String,
    kind: CutKind,
}

impl Cut {
    pub fn new(name: impl Into<String>, kind: impl Into<CutKind>) -> Self {
        Self {
            name: name.into(),
            kind: kind.into(),
        }
    }

    /// The same cut under a different name
    pub fn with_name(self, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: self.kind,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &CutKind {
        &self.kind
    }

    pub fn collection(&self) -> Option<Collection> {
        self.kind.collection()
    }

    /// Evaluate the cut, rejecting masks with missing entries
    pub fn evaluate(&self, events: &EventBatch, ctx: &Context<'_>) -> Result<Mask> {
        let mask = match self.kind.evaluate(events, ctx)? {
            RawMask::Event(mask) => Mask::Event(mask.into_mask(&self.name)?),
            RawMask::Object(collection, mask) => Mask::Object { collection, mask },
        };
        if mask.n_events() != events.len() {
            return Err(Error::InvalidBatch(format!(
                "mask of cut '{}' has {} entries for {} events",
                self.name,
                mask.n_events(),
                events.len()
            )));
        }
        trace!(
            "cut {}: {} of {} events selected",
            self.name,
            mask.events().iter().filter(|m| **m).count(),
            events.len()
        );
        Ok(mask)
    }
}

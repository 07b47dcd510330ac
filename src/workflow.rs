//! Workflow processors turning event batches into histograms
use std::collections::BTreeMap;

use log::{debug, info};
use rayon::prelude::*;

use crate::configs::AnalysisConfig;
use crate::cut::{Context, Cut};
use crate::cuts::mutag_fatjet_sel;
use crate::error::{Error, Result};
use crate::event::{Collection, EventBatch, Field};
use crate::histogram::Output;
use crate::jets;
use crate::lumi::LumiMask;
use crate::mask::Mask;
use crate::sample::{Era, SampleInfo};
use crate::selection::{Categorization, StandardSelection};
use crate::trigger::{ConfigTriggerCatalog, TriggerCatalog};

const FATJETS: Collection = Collection::FatJetGood;

/// Shared read-only services needed by the cuts
pub struct Resources {
    pub triggers: Box<dyn TriggerCatalog>,
    pub lumi_masks: BTreeMap<Era, LumiMask>,
}

impl Resources {
    /// Trigger catalogue and certified luminosity sections from the parameters
    pub fn from_config(config: &AnalysisConfig) -> Result<Self> {
        let params = &config.parameters;
        let mut lumi_masks = BTreeMap::new();
        for (era, path) in &params.lumi.golden_json {
            lumi_masks.insert(*era, LumiMask::load(path)?);
        }
        Ok(Self {
            triggers: Box::new(ConfigTriggerCatalog::new(params)),
            lumi_masks,
        })
    }
}

/// Events passing all `cuts`
fn event_mask(cuts: &[Cut], events: &EventBatch, ctx: &Context<'_>) -> Result<Vec<bool>> {
    let mut mask = vec![true; events.len()];
    for cut in cuts {
        let pass = cut.evaluate(events, ctx)?.events();
        for (m, p) in mask.iter_mut().zip(pass) {
            *m &= p;
        }
    }
    Ok(mask)
}

fn sum_weights(weights: &[f64], mask: &[bool]) -> f64 {
    weights
        .iter()
        .zip(mask)
        .filter(|(_, m)| **m)
        .map(|(w, _)| w)
        .sum()
}

pub trait Processor: Send + Sync {
    fn config(&self) -> &AnalysisConfig;

    /// Build the good object collections and derived fields
    fn apply_object_preselection(
        &self,
        events: &EventBatch,
        ctx: &Context<'_>,
    ) -> Result<EventBatch>;

    /// Skim, preselect, categorise and fill one batch
    fn process(
        &self,
        events: &EventBatch,
        sample: &SampleInfo,
        resources: &Resources,
    ) -> Result<Output> {
        events.validate()?;
        let config = self.config();
        let ctx = Context {
            sample,
            parameters: &config.parameters,
            triggers: resources.triggers.as_ref(),
            lumi_mask: resources.lumi_masks.get(&sample.era),
        };
        let mut out = Output::default();
        let name = sample.name.as_str();
        out.add_cutflow("initial", name, events.weights().iter().sum());

        let skim = event_mask(&config.skim, events, &ctx)?;
        let events = events.select(&skim);
        out.add_cutflow("skim", name, events.weights().iter().sum());
        debug!("{name}: {} events after skim", events.len());

        let events = self.apply_object_preselection(&events, &ctx)?;
        let presel = event_mask(&config.preselections, &events, &ctx)?;
        let events = events.select(&presel);
        out.add_cutflow("presel", name, events.weights().iter().sum());
        debug!("{name}: {} events after preselection", events.len());

        let weights = events.weights();
        let categories = config.categories.prepare(&events, &ctx)?;
        let subsamples = match config.subsamples.get(name) {
            Some(sel) if sample.is_mc => sel.prepare(&events, &ctx)?.into_vec(),
            _ => vec![(name.to_owned(), Mask::all(events.len()))],
        };
        for (category, cat_mask) in categories.iter() {
            for (subsample, sub_mask) in &subsamples {
                let mask = cat_mask.and(sub_mask)?;
                out.add_cutflow(category, subsample, sum_weights(&weights, &mask.events()));
                for (variable, conf) in &config.variables {
                    let hist = out.histogram_mut(variable, category, subsample, conf);
                    conf.fill(hist, &events, &mask, &weights)?;
                }
            }
        }
        Ok(out)
    }
}

/// Process all batches in parallel and merge the results
pub fn process_batches<P: Processor + ?Sized>(
    processor: &P,
    batches: &[(SampleInfo, EventBatch)],
    resources: &Resources,
) -> Result<Output> {
    info!("Processing {} event batches", batches.len());
    batches
        .par_iter()
        .map(|(sample, events)| processor.process(events, sample, resources))
        .try_reduce(Output::default, Output::merge)
}

/// Good muons and fat jets with muon matching
pub struct FatJetBaseProcessor {
    config: AnalysisConfig,
}

impl FatJetBaseProcessor {
    pub fn new(config: AnalysisConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }
}

impl Processor for FatJetBaseProcessor {
    fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    fn apply_object_preselection(
        &self,
        events: &EventBatch,
        _ctx: &Context<'_>,
    ) -> Result<EventBatch> {
        jets::apply_object_preselection(events, &self.config.parameters)
    }
}

/// Leading and subleading mu-tagged fat jets with position and `btag`
fn mutag_jets(events: &EventBatch, ctx: &Context<'_>) -> Result<EventBatch> {
    let params = ctx.parameters;
    let events = jets::apply_object_preselection(events, params)?;
    let fatjets = jets::leading(events.collection(FATJETS)?, FATJETS, 2)?;
    // position is assigned before mu-tagging
    let fatjets = jets::with_position(fatjets);
    let events = events.with_collection(FATJETS, fatjets);

    const MUTAG: &str = "FatJetGoodNMuon1";
    let nmu = params.object_preselection.fatjet.nmu;
    let mutag = StandardSelection::new(vec![(MUTAG, vec![mutag_fatjet_sel(nmu, None)])])?;
    let masks = mutag.prepare(&events, ctx)?;
    let fatjets = match masks.get(MUTAG) {
        Some(Mask::Object { mask, .. }) => events.collection(FATJETS)?.filter(mask)?,
        _ => {
            return Err(Error::InvalidBatch(
                "mu-tag selection did not produce a fat jet mask".to_owned(),
            ))
        }
    };
    let fatjets = jets::with_btag(fatjets, FATJETS, ctx.sample.era)?;
    Ok(events.with_collection(FATJETS, fatjets))
}

/// Histograms for the derivation of pt/eta/tau21 reweighting maps
pub struct PtReweightProcessor {
    config: AnalysisConfig,
}

/// Histograms the reweighting maps are derived from
pub const PT_ETA_2D_MAPS: [&str; 1] = ["FatJetGood_pt_eta"];
pub const PT_ETA_TAU21_3D_MAPS: [&str; 2] =
    ["FatJetGood_pt_eta_tau21", "FatJetGood_pt_eta_tau21_bintau05"];

impl PtReweightProcessor {
    pub fn new(config: AnalysisConfig) -> Result<Self> {
        config.validate()?;
        for name in PT_ETA_2D_MAPS.iter().chain(&PT_ETA_TAU21_3D_MAPS) {
            if !config.variables.contains_key(*name) {
                return Err(Error::Config(format!(
                    "'{name}' is not present in the histogram keys"
                )));
            }
        }
        Ok(Self { config })
    }
}

impl Processor for PtReweightProcessor {
    fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    fn apply_object_preselection(
        &self,
        events: &EventBatch,
        ctx: &Context<'_>,
    ) -> Result<EventBatch> {
        mutag_jets(events, ctx)
    }
}

/// Mu-tagged fat jet templates, reweighted in pt, eta and tau21
///
/// Simulated jets get a weight from the reweighting map of their
/// position; the weight enters the histograms listed at construction.
pub struct MutagProcessor {
    config: AnalysisConfig,
}

impl MutagProcessor {
    pub fn new(mut config: AnalysisConfig, reweighted: &[String]) -> Result<Self> {
        for name in reweighted {
            let conf = config.variables.get_mut(name).ok_or_else(|| {
                Error::Config(format!("cannot reweight unknown histogram '{name}'"))
            })?;
            conf.object_weight = true;
        }
        config.validate()?;
        Ok(Self { config })
    }

    fn with_weights(&self, events: EventBatch, sample: &SampleInfo) -> Result<EventBatch> {
        let fatjets = events.collection(FATJETS)?;
        let weights = if sample.is_mc {
            let maps = self
                .config
                .parameters
                .ptetatau21_reweighting
                .get(&sample.era)
                .ok_or_else(|| {
                    Error::Config(format!("no reweighting maps for era {}", sample.era))
                })?;
            let col = |field| events.column(FATJETS, field).map(|c| c.values());
            let (pos, pt, eta, tau21) = (
                col(Field::Pos)?,
                col(Field::Pt)?,
                col(Field::Eta)?,
                col(Field::Tau21)?,
            );
            let mut weights = Vec::with_capacity(fatjets.n_objects());
            for n in 0..fatjets.n_objects() {
                let map = maps.get(pos[n] as usize).ok_or_else(|| {
                    Error::Config(format!(
                        "no reweighting map for jet position {} in era {}",
                        pos[n], sample.era
                    ))
                })?;
                weights.push(map.weight(pt[n], eta[n], tau21[n]));
            }
            weights
        } else {
            vec![1.; fatjets.n_objects()]
        };
        let fatjets = fatjets.clone().with_field(Field::Weight, weights);
        Ok(events.with_collection(FATJETS, fatjets))
    }
}

impl Processor for MutagProcessor {
    fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    fn apply_object_preselection(
        &self,
        events: &EventBatch,
        ctx: &Context<'_>,
    ) -> Result<EventBatch> {
        let events = mutag_jets(events, ctx)?;
        self.with_weights(events, ctx.sample)
    }
}

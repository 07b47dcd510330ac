//! Weighted histograms per variable, category and subsample
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::binning::{find_bin, is_strictly_increasing};
use crate::error::{Error, Result};
use crate::event::{Collection, EventBatch, EventField, Field};
use crate::mask::Mask;

#[derive(Clone, PartialEq, Debug, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Binning {
    /// `bins` bins of equal width in `[start, stop)`
    Regular { bins: usize, start: f64, stop: f64 },
    Variable { edges: Vec<f64> },
    /// Integer categories `start, start + 1, ..`, one bin each
    Int { bins: usize, start: f64, stop: f64 },
}

impl Binning {
    pub fn n_bins(&self) -> usize {
        match self {
            Self::Regular { bins, .. } | Self::Int { bins, .. } => *bins,
            Self::Variable { edges } => edges.len().saturating_sub(1),
        }
    }

    pub fn edges(&self) -> Vec<f64> {
        match self {
            Self::Regular { bins, start, stop } | Self::Int { bins, start, stop } => {
                let width = (stop - start) / *bins as f64;
                Vec::from_iter((0..=*bins).map(|n| start + n as f64 * width))
            }
            Self::Variable { edges } => edges.clone(),
        }
    }

    /// Bin index of `x`, `None` if outside
    pub fn index(&self, x: f64) -> Option<usize> {
        match self {
            Self::Regular { bins, start, stop } | Self::Int { bins, start, stop } => {
                if x.is_nan() || x < *start || x >= *stop {
                    return None;
                }
                let n = ((x - start) / (stop - start) * *bins as f64) as usize;
                Some(n.min(bins - 1))
            }
            Self::Variable { edges } => find_bin(edges, x),
        }
    }

    pub fn validate(&self) -> Result<()> {
        let ok = match self {
            Self::Regular { bins, start, stop } | Self::Int { bins, start, stop } => {
                *bins > 0 && start < stop
            }
            Self::Variable { edges } => edges.len() >= 2 && is_strictly_increasing(edges),
        };
        if ok {
            Ok(())
        } else {
            Err(Error::Config(format!("invalid binning {self:?}")))
        }
    }
}

/// Where the values along an axis come from
#[derive(Copy, Clone, PartialEq, Eq, Debug, Deserialize, Serialize)]
#[serde(untagged)]
pub enum Source {
    Object { collection: Collection, field: Field },
    Event { event: EventField },
}

#[derive(Clone, PartialEq, Debug, Deserialize, Serialize)]
pub struct Axis {
    pub name: String,
    #[serde(flatten)]
    pub source: Source,
    pub binning: Binning,
}

impl Axis {
    pub fn object(
        name: impl Into<String>,
        collection: Collection,
        field: Field,
        binning: Binning,
    ) -> Self {
        Self {
            name: name.into(),
            source: Source::Object { collection, field },
            binning,
        }
    }

    pub fn event(name: impl Into<String>, event: EventField, binning: Binning) -> Self {
        Self {
            name: name.into(),
            source: Source::Event { event },
            binning,
        }
    }
}

/// Histogram definition
#[derive(Clone, PartialEq, Debug, Deserialize, Serialize)]
pub struct HistConf {
    pub axes: Vec<Axis>,
    /// Multiply each entry by the `weight` field of its object
    #[serde(default)]
    pub object_weight: bool,
}

impl HistConf {
    pub fn new(axes: Vec<Axis>) -> Self {
        Self {
            axes,
            object_weight: false,
        }
    }

    /// The collection all axes read, `None` for event-level histograms
    pub fn collection(&self) -> Option<Collection> {
        self.axes.iter().find_map(|axis| match axis.source {
            Source::Object { collection, .. } => Some(collection),
            Source::Event { .. } => None,
        })
    }

    pub fn validate(&self) -> Result<()> {
        if self.axes.is_empty() {
            return Err(Error::Config("histogram without axes".to_owned()));
        }
        let collection = self.collection();
        for axis in &self.axes {
            axis.binning.validate()?;
            let same = match axis.source {
                Source::Object { collection: c, .. } => Some(c) == collection,
                Source::Event { .. } => collection.is_none(),
            };
            if !same {
                return Err(Error::Config(format!(
                    "axis {} does not read the same collection as the other axes",
                    axis.name
                )));
            }
        }
        if self.object_weight && collection.is_none() {
            return Err(Error::Config(
                "object weights require a histogram of objects".to_owned(),
            ));
        }
        Ok(())
    }

    pub fn book(&self) -> Histogram {
        let n = self.axes.iter().map(|a| a.binning.n_bins()).product();
        Histogram {
            axes: self.axes.clone(),
            sumw: vec![0.; n],
            sumw2: vec![0.; n],
            overflow: 0.,
        }
    }

    /// Fill the events or objects selected by `mask`
    ///
    /// `weights` holds one weight per event. Object masks on another
    /// collection than the histogram's select whole events.
    pub fn fill(
        &self,
        hist: &mut Histogram,
        events: &EventBatch,
        mask: &Mask,
        weights: &[f64],
    ) -> Result<()> {
        let Some(collection) = self.collection() else {
            let columns = self
                .axes
                .iter()
                .filter_map(|axis| match axis.source {
                    Source::Event { event } => Some(events.scalar(event)),
                    Source::Object { .. } => None,
                })
                .collect::<Result<Vec<_>>>()?;
            for (ev, selected) in mask.events().into_iter().enumerate() {
                if selected {
                    let values = Vec::from_iter(columns.iter().map(|c| c[ev]));
                    hist.fill(&values, weights[ev]);
                }
            }
            return Ok(());
        };

        let coll = events.collection(collection)?;
        let mut columns = Vec::with_capacity(self.axes.len());
        for axis in &self.axes {
            if let Source::Object { field, .. } = axis.source {
                columns.push(events.column(collection, field)?.values());
            }
        }
        let object_weights = if self.object_weight {
            Some(events.column(collection, Field::Weight)?.values())
        } else {
            None
        };
        let selected: Vec<bool> = match mask {
            Mask::Object { collection: c, mask } if *c == collection => mask.content().to_vec(),
            mask => {
                let events_sel = mask.events();
                Vec::from_iter(
                    coll.counts()
                        .into_iter()
                        .zip(events_sel)
                        .flat_map(|(n, sel)| std::iter::repeat(sel).take(n)),
                )
            }
        };
        if selected.len() != coll.n_objects() {
            return Err(Error::InvalidBatch(format!(
                "mask does not match the layout of {collection}"
            )));
        }
        for ev in 0..coll.n_events() {
            for n in coll.range(ev) {
                if !selected[n] {
                    continue;
                }
                let values = Vec::from_iter(columns.iter().map(|c| c[n]));
                let w = weights[ev] * object_weights.map(|w| w[n]).unwrap_or(1.);
                hist.fill(&values, w);
            }
        }
        Ok(())
    }
}

/// Dense N-dimensional histogram, last axis varying fastest
#[derive(Clone, PartialEq, Debug, Deserialize, Serialize)]
pub struct Histogram {
    axes: Vec<Axis>,
    sumw: Vec<f64>,
    sumw2: Vec<f64>,
    /// Sum of weights of entries outside the axes
    overflow: f64,
}

impl Histogram {
    pub fn axes(&self) -> &[Axis] {
        &self.axes
    }

    pub fn sumw(&self) -> &[f64] {
        &self.sumw
    }

    pub fn sumw2(&self) -> &[f64] {
        &self.sumw2
    }

    pub fn overflow(&self) -> f64 {
        self.overflow
    }

    /// Sum of weights of all entries, including overflow
    pub fn total(&self) -> f64 {
        self.sumw.iter().sum::<f64>() + self.overflow
    }

    fn index(&self, values: &[f64]) -> Option<usize> {
        let mut idx = 0;
        for (axis, x) in self.axes.iter().zip(values) {
            idx = idx * axis.binning.n_bins() + axis.binning.index(*x)?;
        }
        Some(idx)
    }

    pub fn fill(&mut self, values: &[f64], weight: f64) {
        debug_assert_eq!(values.len(), self.axes.len());
        match self.index(values) {
            Some(idx) => {
                self.sumw[idx] += weight;
                self.sumw2[idx] += weight * weight;
            }
            None => self.overflow += weight,
        }
    }

    /// Content of the bin with the given per-axis indices
    pub fn bin(&self, indices: &[usize]) -> Option<f64> {
        let mut idx = 0;
        for (axis, n) in self.axes.iter().zip(indices) {
            if *n >= axis.binning.n_bins() {
                return None;
            }
            idx = idx * axis.binning.n_bins() + n;
        }
        self.sumw.get(idx).copied()
    }

    pub fn merge(&mut self, other: &Histogram) -> Result<()> {
        if self.axes != other.axes {
            return Err(Error::Merge("different axes".to_owned()));
        }
        for (a, b) in self.sumw.iter_mut().zip(&other.sumw) {
            *a += b;
        }
        for (a, b) in self.sumw2.iter_mut().zip(&other.sumw2) {
            *a += b;
        }
        self.overflow += other.overflow;
        Ok(())
    }
}

/// variable → category → subsample → histogram
pub type HistogramMap = BTreeMap<String, BTreeMap<String, BTreeMap<String, Histogram>>>;

/// Accumulated result of processing event batches
#[derive(Clone, PartialEq, Debug, Default, Deserialize, Serialize)]
pub struct Output {
    pub histograms: HistogramMap,
    /// step or category → subsample → sum of weights
    pub cutflow: BTreeMap<String, BTreeMap<String, f64>>,
}

impl Output {
    pub fn histogram_mut(
        &mut self,
        variable: &str,
        category: &str,
        subsample: &str,
        conf: &HistConf,
    ) -> &mut Histogram {
        self.histograms
            .entry(variable.to_owned())
            .or_default()
            .entry(category.to_owned())
            .or_default()
            .entry(subsample.to_owned())
            .or_insert_with(|| conf.book())
    }

    pub fn histogram(&self, variable: &str, category: &str, subsample: &str) -> Option<&Histogram> {
        self.histograms.get(variable)?.get(category)?.get(subsample)
    }

    pub fn add_cutflow(&mut self, step: &str, subsample: &str, sumw: f64) {
        *self
            .cutflow
            .entry(step.to_owned())
            .or_default()
            .entry(subsample.to_owned())
            .or_default() += sumw;
    }

    pub fn merge(mut self, other: Self) -> Result<Self> {
        for (var, cats) in other.histograms {
            let entry = self.histograms.entry(var).or_default();
            for (cat, subsamples) in cats {
                let entry = entry.entry(cat).or_default();
                for (subsample, hist) in subsamples {
                    match entry.get_mut(&subsample) {
                        Some(existing) => existing.merge(&hist)?,
                        None => {
                            entry.insert(subsample, hist);
                        }
                    }
                }
            }
        }
        for (step, subsamples) in other.cutflow {
            for (subsample, sumw) in subsamples {
                self.add_cutflow(&step, &subsample, sumw);
            }
        }
        Ok(self)
    }
}

//! Composition of cuts into named categories
use std::collections::BTreeMap;

use log::{debug, trace};

use crate::cut::{Context, Cut};
use crate::error::{Error, Result};
use crate::event::EventBatch;
use crate::mask::Mask;

/// Separator between cut names in cartesian category names
pub const SEPARATOR: &str = "__";

/// A scheme turning an event batch into named category masks
pub trait Categorization: Send + Sync {
    /// Category names, in the order masks are produced
    fn categories(&self) -> Vec<&str>;

    fn prepare(&self, events: &EventBatch, ctx: &Context<'_>) -> Result<CategoryMasks>;
}

/// Masks of all categories for one batch
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct CategoryMasks {
    masks: Vec<(String, Mask)>,
    n_evaluated: usize,
}

impl CategoryMasks {
    pub fn get(&self, category: &str) -> Option<&Mask> {
        self.masks
            .iter()
            .find(|(name, _)| name == category)
            .map(|(_, mask)| mask)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Mask)> + '_ {
        self.masks.iter().map(|(name, mask)| (name.as_str(), mask))
    }

    pub fn into_vec(self) -> Vec<(String, Mask)> {
        self.masks
    }

    pub fn len(&self) -> usize {
        self.masks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.masks.is_empty()
    }

    /// How many distinct cuts were evaluated to build the masks
    pub fn n_cut_evaluations(&self) -> usize {
        self.n_evaluated
    }
}

/// Per-batch cut masks, each cut evaluated once
struct MaskCache<'a> {
    events: &'a EventBatch,
    ctx: &'a Context<'a>,
    masks: BTreeMap<&'a str, Mask>,
}

impl<'a> MaskCache<'a> {
    fn new(events: &'a EventBatch, ctx: &'a Context<'a>) -> Self {
        Self {
            events,
            ctx,
            masks: BTreeMap::new(),
        }
    }

    fn get(&mut self, cut: &'a Cut) -> Result<&Mask> {
        if !self.masks.contains_key(cut.name()) {
            let mask = cut.evaluate(self.events, self.ctx)?;
            self.masks.insert(cut.name(), mask);
        }
        self.masks
            .get(cut.name())
            .ok_or_else(|| Error::InvalidBatch(format!("no mask for cut {}", cut.name())))
    }

    /// AND of all `cuts`, selecting everything if there are none
    fn and<I>(&mut self, cuts: I) -> Result<Mask>
    where
        I: IntoIterator<Item = &'a Cut>,
    {
        let mut res = Mask::all(self.events.len());
        for cut in cuts {
            res = res.and(self.get(cut)?)?;
        }
        Ok(res)
    }
}

/// Reject categories with the same name and cuts that share a name but
/// not their definition
fn check_names<'a>(
    categories: impl IntoIterator<Item = &'a str>,
    cuts: impl IntoIterator<Item = &'a Cut>,
) -> Result<()> {
    let mut seen = BTreeMap::new();
    for name in categories {
        if seen.insert(name, ()).is_some() {
            return Err(Error::Config(format!("duplicate category name '{name}'")));
        }
    }
    let mut known: BTreeMap<&str, &Cut> = BTreeMap::new();
    for cut in cuts {
        match known.get(cut.name()) {
            Some(existing) if *existing != cut => {
                return Err(Error::Config(format!(
                    "cut name '{}' is used for different cuts",
                    cut.name()
                )))
            }
            Some(_) => {}
            None => {
                known.insert(cut.name(), cut);
            }
        }
    }
    Ok(())
}

/// Ordered list of named categories, each the AND of its cuts
#[derive(Clone, PartialEq, Debug, Default)]
pub struct StandardSelection {
    categories: Vec<(String, Vec<Cut>)>,
}

impl StandardSelection {
    pub fn new<S: Into<String>>(categories: Vec<(S, Vec<Cut>)>) -> Result<Self> {
        let categories =
            Vec::from_iter(categories.into_iter().map(|(name, cuts)| (name.into(), cuts)));
        check_names(
            categories.iter().map(|(name, _)| name.as_str()),
            categories.iter().flat_map(|(_, cuts)| cuts),
        )?;
        Ok(Self { categories })
    }

    pub fn cuts(&self, category: &str) -> Option<&[Cut]> {
        self.categories
            .iter()
            .find(|(name, _)| name == category)
            .map(|(_, cuts)| cuts.as_slice())
    }
}

impl Categorization for StandardSelection {
    fn categories(&self) -> Vec<&str> {
        Vec::from_iter(self.categories.iter().map(|(name, _)| name.as_str()))
    }

    fn prepare(&self, events: &EventBatch, ctx: &Context<'_>) -> Result<CategoryMasks> {
        let mut cache = MaskCache::new(events, ctx);
        let mut masks = Vec::with_capacity(self.categories.len());
        for (name, cuts) in &self.categories {
            masks.push((name.clone(), cache.and(cuts)?));
        }
        Ok(CategoryMasks {
            masks,
            n_evaluated: cache.masks.len(),
        })
    }
}

/// One axis of a cartesian selection: mutually exclusive named cuts
#[derive(Clone, PartialEq, Debug)]
pub struct MultiCut {
    name: String,
    cuts: Vec<Cut>,
}

impl MultiCut {
    pub fn new(name: impl Into<String>, cuts: Vec<Cut>) -> Self {
        Self {
            name: name.into(),
            cuts,
        }
    }

    /// Axis with explicit names for its cuts
    ///
    /// The names replace the cut names, also in the category names.
    pub fn with_names<S: Into<String>>(
        name: impl Into<String>,
        cuts: Vec<Cut>,
        cut_names: Vec<S>,
    ) -> Result<Self> {
        let name = name.into();
        if cuts.len() != cut_names.len() {
            return Err(Error::Config(format!(
                "axis {name}: {} cuts, but {} names",
                cuts.len(),
                cut_names.len()
            )));
        }
        let cuts = cuts
            .into_iter()
            .zip(cut_names)
            .map(|(cut, name)| cut.with_name(name))
            .collect();
        Ok(Self { name, cuts })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn cuts(&self) -> &[Cut] {
        &self.cuts
    }

    pub fn len(&self) -> usize {
        self.cuts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cuts.is_empty()
    }
}

/// Cartesian product of several axes, plus common categories
///
/// Category names join one cut name per axis with [`SEPARATOR`], the
/// first axis varying slowest. Common categories follow the cartesian
/// ones and use only their own cuts.
#[derive(Clone, PartialEq, Debug)]
pub struct CartesianSelection {
    multicuts: Vec<MultiCut>,
    common: StandardSelection,
    /// category name and the index of the chosen cut on each axis
    product: Vec<(String, Vec<usize>)>,
}

impl CartesianSelection {
    pub fn new(multicuts: Vec<MultiCut>, common: StandardSelection) -> Result<Self> {
        let mut product: Vec<(String, Vec<usize>)> = vec![(String::new(), Vec::new())];
        for axis in &multicuts {
            if axis.is_empty() {
                return Err(Error::Config(format!("axis {} has no cuts", axis.name())));
            }
            let mut next = Vec::with_capacity(product.len() * axis.len());
            for (name, idx) in &product {
                for (n, cut) in axis.cuts().iter().enumerate() {
                    let name = if idx.is_empty() {
                        cut.name().to_owned()
                    } else {
                        format!("{name}{SEPARATOR}{}", cut.name())
                    };
                    let mut idx = idx.clone();
                    idx.push(n);
                    next.push((name, idx));
                }
            }
            product = next;
        }
        if multicuts.is_empty() {
            product.clear();
        }
        check_names(
            product
                .iter()
                .map(|(name, _)| name.as_str())
                .chain(common.categories()),
            multicuts
                .iter()
                .flat_map(|axis| axis.cuts())
                .chain(common.categories.iter().flat_map(|(_, cuts)| cuts)),
        )?;
        debug!(
            "{} cartesian and {} common categories",
            product.len(),
            common.categories.len()
        );
        Ok(Self {
            multicuts,
            common,
            product,
        })
    }

    pub fn multicuts(&self) -> &[MultiCut] {
        &self.multicuts
    }
}

impl Categorization for CartesianSelection {
    fn categories(&self) -> Vec<&str> {
        let mut res = Vec::from_iter(self.product.iter().map(|(name, _)| name.as_str()));
        res.extend(self.common.categories());
        res
    }

    fn prepare(&self, events: &EventBatch, ctx: &Context<'_>) -> Result<CategoryMasks> {
        let mut cache = MaskCache::new(events, ctx);
        let mut masks = Vec::with_capacity(self.product.len() + self.common.categories.len());
        for (name, idx) in &self.product {
            let cuts = self
                .multicuts
                .iter()
                .zip(idx)
                .map(|(axis, n)| &axis.cuts()[*n]);
            let mask = cache.and(cuts)?;
            trace!("category {name}: {:?}", mask.events());
            masks.push((name.clone(), mask));
        }
        for (name, cuts) in &self.common.categories {
            masks.push((name.clone(), cache.and(cuts)?));
        }
        Ok(CategoryMasks {
            masks,
            n_evaluated: cache.masks.len(),
        })
    }
}

/// Either kind of selection
#[derive(Clone, PartialEq, Debug)]
pub enum Selection {
    Standard(StandardSelection),
    Cartesian(CartesianSelection),
}

impl From<StandardSelection> for Selection {
    fn from(sel: StandardSelection) -> Self {
        Self::Standard(sel)
    }
}

impl From<CartesianSelection> for Selection {
    fn from(sel: CartesianSelection) -> Self {
        Self::Cartesian(sel)
    }
}

impl Categorization for Selection {
    fn categories(&self) -> Vec<&str> {
        match self {
            Self::Standard(sel) => sel.categories(),
            Self::Cartesian(sel) => sel.categories(),
        }
    }

    fn prepare(&self, events: &EventBatch, ctx: &Context<'_>) -> Result<CategoryMasks> {
        match self {
            Self::Standard(sel) => sel.prepare(events, ctx),
            Self::Cartesian(sel) => sel.prepare(events, ctx),
        }
    }
}

use std::collections::BTreeMap;
use std::ops::Range;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

use crate::error::{Error, Result};
use crate::mask::Jagged;

/// Object collections of an event batch
#[derive(
    Display,
    EnumString,
    EnumIter,
    Copy,
    Clone,
    Eq,
    PartialEq,
    Ord,
    PartialOrd,
    Hash,
    Debug,
    Deserialize,
    Serialize,
)]
pub enum Collection {
    FatJet,
    FatJetGood,
    SubJet,
    Muon,
    MuonGood,
}

/// Numeric per-object columns
///
/// Names follow the NanoAOD branch names, so that a wrong name in a
/// configuration file is rejected when the configuration is parsed.
#[derive(
    Display,
    EnumString,
    EnumIter,
    Copy,
    Clone,
    Eq,
    PartialEq,
    Ord,
    PartialOrd,
    Hash,
    Debug,
    Deserialize,
    Serialize,
)]
pub enum Field {
    #[strum(serialize = "pt")]
    #[serde(rename = "pt")]
    Pt,
    #[strum(serialize = "eta")]
    #[serde(rename = "eta")]
    Eta,
    #[strum(serialize = "phi")]
    #[serde(rename = "phi")]
    Phi,
    #[strum(serialize = "mass")]
    #[serde(rename = "mass")]
    Mass,
    #[strum(serialize = "msoftdrop")]
    #[serde(rename = "msoftdrop")]
    MSoftdrop,
    #[strum(serialize = "tau1")]
    #[serde(rename = "tau1")]
    Tau1,
    #[strum(serialize = "tau2")]
    #[serde(rename = "tau2")]
    Tau2,
    #[strum(serialize = "tau21")]
    #[serde(rename = "tau21")]
    Tau21,
    #[strum(serialize = "rawFactor")]
    #[serde(rename = "rawFactor")]
    RawFactor,
    #[strum(serialize = "jetId")]
    #[serde(rename = "jetId")]
    JetId,
    #[strum(serialize = "subJetIdx1")]
    #[serde(rename = "subJetIdx1")]
    SubJetIdx1,
    #[strum(serialize = "subJetIdx2")]
    #[serde(rename = "subJetIdx2")]
    SubJetIdx2,
    #[strum(serialize = "hadronFlavour")]
    #[serde(rename = "hadronFlavour")]
    HadronFlavour,
    #[strum(serialize = "nBHadrons")]
    #[serde(rename = "nBHadrons")]
    NBHadrons,
    #[strum(serialize = "nCHadrons")]
    #[serde(rename = "nCHadrons")]
    NCHadrons,
    #[strum(serialize = "particleNet_massCorr")]
    #[serde(rename = "particleNet_massCorr")]
    ParticleNetMassCorr,
    #[strum(serialize = "globalParT3_massCorrX2p")]
    #[serde(rename = "globalParT3_massCorrX2p")]
    GlobalParT3MassCorrX2p,
    #[strum(serialize = "particleNet_XbbVsQCD")]
    #[serde(rename = "particleNet_XbbVsQCD")]
    ParticleNetXbbVsQcd,
    #[strum(serialize = "particleNet_XccVsQCD")]
    #[serde(rename = "particleNet_XccVsQCD")]
    ParticleNetXccVsQcd,
    #[strum(serialize = "globalParT3_Xbb")]
    #[serde(rename = "globalParT3_Xbb")]
    GlobalParT3Xbb,
    #[strum(serialize = "globalParT3_Xcc")]
    #[serde(rename = "globalParT3_Xcc")]
    GlobalParT3Xcc,
    #[strum(serialize = "btagDDCvBV2")]
    #[serde(rename = "btagDDCvBV2")]
    BtagDdcvbV2,
    #[strum(serialize = "tightId")]
    #[serde(rename = "tightId")]
    TightId,
    #[strum(serialize = "pfRelIso04_all")]
    #[serde(rename = "pfRelIso04_all")]
    PfRelIso04All,

    // derived during object preselection
    #[strum(serialize = "mass_reg")]
    #[serde(rename = "mass_reg")]
    MassReg,
    #[strum(serialize = "btag")]
    #[serde(rename = "btag")]
    Btag,
    #[strum(serialize = "pos")]
    #[serde(rename = "pos")]
    Pos,
    #[strum(serialize = "weight")]
    #[serde(rename = "weight")]
    Weight,
    #[strum(serialize = "nSubJet")]
    #[serde(rename = "nSubJet")]
    NSubJet,
    #[strum(serialize = "nMuonGoodMatchedToFatJetGood")]
    #[serde(rename = "nMuonGoodMatchedToFatJetGood")]
    NMuonGoodMatchedToFatJetGood,
    #[strum(serialize = "nMuonGoodMatchedToSubJet")]
    #[serde(rename = "nMuonGoodMatchedToSubJet")]
    NMuonGoodMatchedToSubJet,
    #[strum(serialize = "nMuonGoodMatchedUniquelyToSubJet")]
    #[serde(rename = "nMuonGoodMatchedUniquelyToSubJet")]
    NMuonGoodMatchedUniquelyToSubJet,
}

/// Jet tagger scores usable in working-point cuts
#[derive(
    Display,
    EnumString,
    EnumIter,
    Copy,
    Clone,
    Eq,
    PartialEq,
    Ord,
    PartialOrd,
    Hash,
    Debug,
    Deserialize,
    Serialize,
)]
pub enum Tagger {
    #[strum(serialize = "particleNet_XbbVsQCD")]
    #[serde(rename = "particleNet_XbbVsQCD")]
    ParticleNetXbbVsQcd,
    #[strum(serialize = "particleNet_XccVsQCD")]
    #[serde(rename = "particleNet_XccVsQCD")]
    ParticleNetXccVsQcd,
    #[strum(serialize = "globalParT3_Xbb")]
    #[serde(rename = "globalParT3_Xbb")]
    GlobalParT3Xbb,
    #[strum(serialize = "globalParT3_Xcc")]
    #[serde(rename = "globalParT3_Xcc")]
    GlobalParT3Xcc,
    #[strum(serialize = "btagDDCvBV2")]
    #[serde(rename = "btagDDCvBV2")]
    BtagDdcvbV2,
    /// Era-dependent score attached during object preselection
    #[strum(serialize = "btag")]
    #[serde(rename = "btag")]
    Btag,
}

impl Tagger {
    pub fn field(self) -> Field {
        use Tagger::*;
        match self {
            ParticleNetXbbVsQcd => Field::ParticleNetXbbVsQcd,
            ParticleNetXccVsQcd => Field::ParticleNetXccVsQcd,
            GlobalParT3Xbb => Field::GlobalParT3Xbb,
            GlobalParT3Xcc => Field::GlobalParT3Xcc,
            BtagDdcvbV2 => Field::BtagDdcvbV2,
            Btag => Field::Btag,
        }
    }
}

/// Per-event scalar columns
#[derive(
    Display,
    EnumString,
    EnumIter,
    Copy,
    Clone,
    Eq,
    PartialEq,
    Ord,
    PartialOrd,
    Hash,
    Debug,
    Deserialize,
    Serialize,
)]
pub enum EventField {
    #[strum(serialize = "PV_npvsGood")]
    #[serde(rename = "PV_npvsGood")]
    NPvGood,
    #[strum(serialize = "run")]
    #[serde(rename = "run")]
    Run,
    #[strum(serialize = "luminosityBlock")]
    #[serde(rename = "luminosityBlock")]
    LuminosityBlock,
    #[strum(serialize = "genWeight")]
    #[serde(rename = "genWeight")]
    GenWeight,
}

/// A jagged collection of objects stored column by column
///
/// `offsets` has one entry more than there are events; the objects of
/// event `i` are `offsets[i]..offsets[i + 1]` in every column.
#[derive(Clone, PartialEq, Debug, Default, Deserialize, Serialize)]
pub struct ObjectCollection {
    offsets: Vec<usize>,
    #[serde(default)]
    columns: BTreeMap<Field, Vec<f64>>,
}

impl ObjectCollection {
    pub fn from_counts(counts: &[usize]) -> Self {
        let mut offsets = Vec::with_capacity(counts.len() + 1);
        offsets.push(0);
        let mut total = 0;
        for n in counts {
            total += n;
            offsets.push(total);
        }
        Self {
            offsets,
            columns: BTreeMap::new(),
        }
    }

    /// Build a collection from one vector of values per event
    pub fn from_nested(field: Field, values: Vec<Vec<f64>>) -> Self {
        let counts = Vec::from_iter(values.iter().map(|v| v.len()));
        Self::from_counts(&counts)
            .with_field(field, values.into_iter().flatten().collect())
    }

    /// Return a collection with an added or replaced column
    ///
    /// The length of `values` is checked by [`ObjectCollection::validate`].
    pub fn with_field(mut self, field: Field, values: Vec<f64>) -> Self {
        self.columns.insert(field, values);
        self
    }

    pub fn with_nested(self, field: Field, values: Vec<Vec<f64>>) -> Self {
        self.with_field(field, values.into_iter().flatten().collect())
    }

    pub fn offsets(&self) -> &[usize] {
        &self.offsets
    }

    pub fn n_events(&self) -> usize {
        self.offsets.len().saturating_sub(1)
    }

    pub fn n_objects(&self) -> usize {
        self.offsets.last().copied().unwrap_or_default()
    }

    pub fn range(&self, event: usize) -> Range<usize> {
        self.offsets[event]..self.offsets[event + 1]
    }

    pub fn counts(&self) -> Vec<usize> {
        Vec::from_iter(self.offsets.windows(2).map(|w| w[1] - w[0]))
    }

    pub fn has_field(&self, field: Field) -> bool {
        self.columns.contains_key(&field)
    }

    pub fn fields(&self) -> impl Iterator<Item = Field> + '_ {
        self.columns.keys().copied()
    }

    pub fn column(&self, field: Field) -> Option<Column<'_>> {
        self.columns.get(&field).map(|values| Column {
            offsets: &self.offsets,
            values,
        })
    }

    /// Keep only the objects selected by `mask`
    pub fn filter(&self, mask: &Jagged<bool>) -> Result<Self> {
        if mask.offsets() != self.offsets.as_slice() {
            return Err(Error::InvalidBatch(
                "object mask does not match collection layout".to_owned(),
            ));
        }
        let selected = Vec::from_iter(
            mask.iter_events()
                .map(|ev| ev.iter().enumerate().filter(|(_, keep)| **keep))
                .map(|ev| Vec::from_iter(ev.map(|(n, _)| n))),
        );
        Ok(self.take(&selected))
    }

    /// Build a new collection from per-event local object indices
    ///
    /// Indices may reorder or drop objects, but must be in range.
    pub fn take(&self, local_indices: &[Vec<usize>]) -> Self {
        debug_assert_eq!(local_indices.len(), self.n_events());
        let counts = Vec::from_iter(local_indices.iter().map(|idx| idx.len()));
        let mut res = Self::from_counts(&counts);
        for (field, values) in &self.columns {
            let mut col = Vec::with_capacity(res.n_objects());
            for (ev, idx) in local_indices.iter().enumerate() {
                let start = self.offsets[ev];
                col.extend(idx.iter().map(|n| values[start + n]));
            }
            res.columns.insert(*field, col);
        }
        res
    }

    pub fn validate(&self, n_events: usize) -> Result<()> {
        if self.offsets.len() != n_events + 1 {
            return Err(Error::InvalidBatch(format!(
                "expected {} offsets, found {}",
                n_events + 1,
                self.offsets.len()
            )));
        }
        if self.offsets[0] != 0 {
            return Err(Error::InvalidBatch(
                "offsets have to start at 0".to_owned(),
            ));
        }
        if self.offsets.windows(2).any(|w| w[1] < w[0]) {
            return Err(Error::InvalidBatch(
                "offsets have to be non-decreasing".to_owned(),
            ));
        }
        let n_objects = self.n_objects();
        for (field, values) in &self.columns {
            if values.len() != n_objects {
                return Err(Error::InvalidBatch(format!(
                    "column {field} has {} entries for {n_objects} objects",
                    values.len()
                )));
            }
            // angular distances need finite directions
            if matches!(field, Field::Eta | Field::Phi) && values.iter().any(|v| !v.is_finite()) {
                return Err(Error::InvalidBatch(format!(
                    "column {field} has non-finite entries"
                )));
            }
        }
        Ok(())
    }
}

/// Borrowed view of one column of an [`ObjectCollection`]
#[derive(Copy, Clone, Debug)]
pub struct Column<'a> {
    offsets: &'a [usize],
    values: &'a [f64],
}

impl<'a> Column<'a> {
    pub fn n_events(&self) -> usize {
        self.offsets.len().saturating_sub(1)
    }

    pub fn values(&self) -> &'a [f64] {
        self.values
    }

    pub fn event(&self, event: usize) -> &'a [f64] {
        &self.values[self.offsets[event]..self.offsets[event + 1]]
    }

    pub fn iter_events(&self) -> impl Iterator<Item = &'a [f64]> + 'a {
        let values = self.values;
        self.offsets.windows(2).map(move |w| &values[w[0]..w[1]])
    }

    /// Element-wise map, keeping the jagged structure
    pub fn map<T, F: FnMut(f64) -> T>(&self, f: F) -> Jagged<T> {
        Jagged::new(
            self.offsets.to_vec(),
            self.values.iter().copied().map(f).collect(),
        )
    }

    /// The `n`th object of each event, `None` if there are fewer objects
    pub fn nth(&self, n: usize) -> Vec<Option<f64>> {
        Vec::from_iter(self.iter_events().map(|ev| ev.get(n).copied()))
    }
}

/// A batch of events in columnar layout
#[derive(Clone, PartialEq, Debug, Default, Deserialize, Serialize)]
pub struct EventBatch {
    len: usize,
    #[serde(default)]
    scalars: BTreeMap<EventField, Vec<f64>>,
    #[serde(default)]
    hlt: BTreeMap<String, Vec<bool>>,
    #[serde(default)]
    flags: BTreeMap<String, Vec<bool>>,
    #[serde(default)]
    collections: BTreeMap<Collection, ObjectCollection>,
}

impl EventBatch {
    pub fn new(len: usize) -> Self {
        Self {
            len,
            ..Default::default()
        }
    }

    pub fn with_scalar(mut self, field: EventField, values: Vec<f64>) -> Self {
        self.scalars.insert(field, values);
        self
    }

    pub fn with_hlt(mut self, path: &str, bits: Vec<bool>) -> Self {
        self.hlt.insert(path.to_owned(), bits);
        self
    }

    pub fn with_flag(mut self, flag: &str, bits: Vec<bool>) -> Self {
        self.flags.insert(flag.to_owned(), bits);
        self
    }

    pub fn with_collection(
        mut self,
        name: Collection,
        collection: ObjectCollection,
    ) -> Self {
        self.collections.insert(name, collection);
        self
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn scalar(&self, field: EventField) -> Result<&[f64]> {
        self.scalars
            .get(&field)
            .map(|v| v.as_slice())
            .ok_or(Error::MissingEventColumn(field))
    }

    pub fn has_scalar(&self, field: EventField) -> bool {
        self.scalars.contains_key(&field)
    }

    pub fn hlt(&self, path: &str) -> Option<&[bool]> {
        self.hlt.get(path).map(|v| v.as_slice())
    }

    pub fn flag(&self, flag: &str) -> Option<&[bool]> {
        self.flags.get(flag).map(|v| v.as_slice())
    }

    pub fn collection(&self, name: Collection) -> Result<&ObjectCollection> {
        self.collections
            .get(&name)
            .ok_or(Error::MissingCollection(name))
    }

    pub fn has_collection(&self, name: Collection) -> bool {
        self.collections.contains_key(&name)
    }

    pub fn column(&self, collection: Collection, field: Field) -> Result<Column<'_>> {
        self.collection(collection)?
            .column(field)
            .ok_or(Error::MissingColumn { collection, field })
    }

    /// Generator weights, or unit weights if the batch has none (data)
    pub fn weights(&self) -> Vec<f64> {
        match self.scalars.get(&EventField::GenWeight) {
            Some(w) => w.clone(),
            None => vec![1.; self.len],
        }
    }

    /// Keep only the events selected by `mask`
    pub fn select(&self, mask: &[bool]) -> Self {
        debug_assert_eq!(mask.len(), self.len);
        let keep = |v: &Vec<bool>| -> Vec<bool> {
            v.iter().zip(mask).filter(|(_, m)| **m).map(|(b, _)| *b).collect()
        };
        let scalars = self
            .scalars
            .iter()
            .map(|(k, v)| {
                let v = v
                    .iter()
                    .zip(mask)
                    .filter(|(_, m)| **m)
                    .map(|(x, _)| *x)
                    .collect();
                (*k, v)
            })
            .collect();
        let hlt = self.hlt.iter().map(|(k, v)| (k.clone(), keep(v))).collect();
        let flags = self.flags.iter().map(|(k, v)| (k.clone(), keep(v))).collect();
        let selected_events =
            Vec::from_iter((0..self.len).filter(|ev| mask[*ev]));
        let collections = self
            .collections
            .iter()
            .map(|(name, coll)| {
                let offsets = coll.offsets();
                let mut counts = Vec::with_capacity(selected_events.len());
                let mut columns = BTreeMap::new();
                for ev in &selected_events {
                    counts.push(offsets[ev + 1] - offsets[*ev]);
                }
                for (field, values) in &coll.columns {
                    let col = Vec::from_iter(
                        selected_events
                            .iter()
                            .flat_map(|ev| &values[coll.range(*ev)])
                            .copied(),
                    );
                    columns.insert(*field, col);
                }
                let mut coll = ObjectCollection::from_counts(&counts);
                coll.columns = columns;
                (*name, coll)
            })
            .collect();
        Self {
            len: selected_events.len(),
            scalars,
            hlt,
            flags,
            collections,
        }
    }

    pub fn validate(&self) -> Result<()> {
        for (field, values) in &self.scalars {
            if values.len() != self.len {
                return Err(Error::InvalidBatch(format!(
                    "event column {field} has {} entries for {} events",
                    values.len(),
                    self.len
                )));
            }
        }
        for (name, bits) in self.hlt.iter().chain(self.flags.iter()) {
            if bits.len() != self.len {
                return Err(Error::InvalidBatch(format!(
                    "{name} has {} entries for {} events",
                    bits.len(),
                    self.len
                )));
            }
        }
        for (name, coll) in &self.collections {
            coll.validate(self.len).map_err(|err| {
                Error::InvalidBatch(format!("collection {name}: {err}"))
            })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn jets() -> ObjectCollection {
        ObjectCollection::from_nested(
            Field::Pt,
            vec![vec![400., 350., 310.], vec![], vec![500.]],
        )
        .with_nested(Field::MSoftdrop, vec![vec![90., 40., 120.], vec![], vec![60.]])
    }

    #[test]
    fn layout() {
        let jets = jets();
        jets.validate(3).unwrap();
        assert_eq!(jets.counts(), vec![3, 0, 1]);
        assert_eq!(jets.n_objects(), 4);
        let pt = jets.column(Field::Pt).unwrap();
        assert_eq!(pt.event(2), &[500.]);
        assert_eq!(pt.nth(1), vec![Some(350.), None, None]);
        assert!(jets.validate(2).is_err());
    }

    #[test]
    fn take_and_filter() {
        let jets = jets();
        let reordered = jets.take(&[vec![2, 0], vec![], vec![]]);
        assert_eq!(reordered.counts(), vec![2, 0, 0]);
        assert_eq!(
            reordered.column(Field::MSoftdrop).unwrap().values(),
            &[120., 90.]
        );

        let heavy = jets.column(Field::MSoftdrop).unwrap().map(|m| m > 50.);
        let filtered = jets.filter(&heavy).unwrap();
        assert_eq!(filtered.column(Field::Pt).unwrap().values(), &[400., 310., 500.]);
    }

    #[test]
    fn select_events() {
        let batch = EventBatch::new(3)
            .with_scalar(EventField::NPvGood, vec![1., 0., 7.])
            .with_flag("goodVertices", vec![true, false, true])
            .with_collection(Collection::FatJet, jets());
        batch.validate().unwrap();
        let sel = batch.select(&[false, true, true]);
        assert_eq!(sel.len(), 2);
        sel.validate().unwrap();
        assert_eq!(sel.scalar(EventField::NPvGood).unwrap(), &[0., 7.]);
        assert_eq!(sel.flag("goodVertices").unwrap(), &[false, true]);
        let pt = sel.column(Collection::FatJet, Field::Pt).unwrap();
        assert_eq!(pt.values(), &[500.]);
        assert_eq!(sel.weights(), vec![1., 1.]);
    }

    #[test]
    fn non_finite_directions() {
        let with_phi = |phi: f64| jets().with_nested(Field::Phi, vec![vec![0., 1., phi], vec![], vec![2.]]);
        with_phi(-3.).validate(3).unwrap();
        for phi in [f64::INFINITY, f64::NEG_INFINITY, f64::NAN] {
            assert!(with_phi(phi).validate(3).is_err());
        }
        let batch = EventBatch::new(3).with_collection(Collection::Muon, with_phi(f64::NAN));
        assert!(matches!(batch.validate(), Err(Error::InvalidBatch(_))));
        // large but finite values are fine
        with_phi(1e300).validate(3).unwrap();
    }

    #[test]
    fn field_names() {
        use std::str::FromStr;
        assert_eq!(Field::from_str("particleNet_XbbVsQCD").unwrap(), Field::ParticleNetXbbVsQcd);
        assert_eq!(Field::MassReg.to_string(), "mass_reg");
        assert!(Field::from_str("particleNet_XbbVsQCd").is_err());
    }
}

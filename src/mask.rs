use crate::error::{Error, Result};
use crate::event::Collection;

/// Variable-length lists of values, one list per event
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct Jagged<T> {
    offsets: Vec<usize>,
    content: Vec<T>,
}

impl<T> Jagged<T> {
    pub fn new(offsets: Vec<usize>, content: Vec<T>) -> Self {
        debug_assert_eq!(offsets.last().copied().unwrap_or_default(), content.len());
        Self { offsets, content }
    }

    pub fn from_nested(nested: Vec<Vec<T>>) -> Self {
        let mut offsets = Vec::with_capacity(nested.len() + 1);
        offsets.push(0);
        let mut content = Vec::new();
        for ev in nested {
            content.extend(ev);
            offsets.push(content.len());
        }
        Self { offsets, content }
    }

    pub fn offsets(&self) -> &[usize] {
        &self.offsets
    }

    pub fn content(&self) -> &[T] {
        &self.content
    }

    pub fn n_events(&self) -> usize {
        self.offsets.len().saturating_sub(1)
    }

    pub fn event(&self, event: usize) -> &[T] {
        &self.content[self.offsets[event]..self.offsets[event + 1]]
    }

    pub fn iter_events(&self) -> impl Iterator<Item = &[T]> + '_ {
        self.offsets.windows(2).map(|w| &self.content[w[0]..w[1]])
    }

    pub fn same_layout<U>(&self, other: &Jagged<U>) -> bool {
        self.offsets == other.offsets
    }
}

impl Jagged<bool> {
    pub fn and(&self, other: &Self) -> Self {
        debug_assert!(self.same_layout(other));
        let content = self
            .content
            .iter()
            .zip(&other.content)
            .map(|(a, b)| *a && *b)
            .collect();
        Self::new(self.offsets.clone(), content)
    }

    /// Broadcast an event mask onto the objects
    pub fn and_events(&self, events: &[bool]) -> Self {
        debug_assert_eq!(events.len(), self.n_events());
        let mut content = self.content.clone();
        for (ev, keep) in events.iter().enumerate() {
            if !keep {
                for c in &mut content[self.offsets[ev]..self.offsets[ev + 1]] {
                    *c = false;
                }
            }
        }
        Self::new(self.offsets.clone(), content)
    }

    pub fn any(&self) -> Vec<bool> {
        Vec::from_iter(self.iter_events().map(|ev| ev.iter().any(|b| *b)))
    }

    pub fn count(&self) -> Vec<usize> {
        Vec::from_iter(self.iter_events().map(|ev| ev.iter().filter(|b| **b).count()))
    }
}

/// Event mask that may contain missing entries
///
/// Missing entries appear when indexing the n-th object of events
/// that have fewer objects. They have to be resolved before the mask
/// leaves a cut.
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct NullableMask(pub Vec<Option<bool>>);

impl NullableMask {
    pub fn fill_none(self, value: bool) -> Self {
        Self(Vec::from_iter(self.0.into_iter().map(|m| Some(m.unwrap_or(value)))))
    }

    pub fn has_none(&self) -> bool {
        self.0.iter().any(|m| m.is_none())
    }

    /// Convert into a plain event mask, failing on any missing entry
    pub fn into_mask(self, cut: &str) -> Result<Vec<bool>> {
        self.0
            .into_iter()
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| Error::NullMask { cut: cut.to_owned() })
    }
}

impl FromIterator<Option<bool>> for NullableMask {
    fn from_iter<I: IntoIterator<Item = Option<bool>>>(iter: I) -> Self {
        Self(Vec::from_iter(iter))
    }
}

/// Result of evaluating a cut or category
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum Mask {
    Event(Vec<bool>),
    Object {
        collection: Collection,
        mask: Jagged<bool>,
    },
}

impl Mask {
    pub fn all(n_events: usize) -> Self {
        Self::Event(vec![true; n_events])
    }

    pub fn n_events(&self) -> usize {
        match self {
            Self::Event(m) => m.len(),
            Self::Object { mask, .. } => mask.n_events(),
        }
    }

    pub fn collection(&self) -> Option<Collection> {
        match self {
            Self::Event(_) => None,
            Self::Object { collection, .. } => Some(*collection),
        }
    }

    /// Logical AND
    ///
    /// An event mask is broadcast onto object masks. Object masks on
    /// different collections cannot be combined.
    pub fn and(&self, other: &Self) -> Result<Self> {
        use Mask::*;
        let res = match (self, other) {
            (Event(a), Event(b)) => {
                Event(a.iter().zip(b).map(|(a, b)| *a && *b).collect())
            }
            (Event(ev), Object { collection, mask })
            | (Object { collection, mask }, Event(ev)) => Object {
                collection: *collection,
                mask: mask.and_events(ev),
            },
            (
                Object { collection: c1, mask: m1 },
                Object { collection: c2, mask: m2 },
            ) => {
                if c1 != c2 {
                    return Err(Error::CollectionMismatch(*c1, *c2));
                }
                if !m1.same_layout(m2) {
                    return Err(Error::InvalidBatch(format!(
                        "object masks on {c1} have different layouts"
                    )));
                }
                Object {
                    collection: *c1,
                    mask: m1.and(m2),
                }
            }
        };
        Ok(res)
    }

    /// Per-event mask: events with at least one selected object
    pub fn events(&self) -> Vec<bool> {
        match self {
            Self::Event(m) => m.clone(),
            Self::Object { mask, .. } => mask.any(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nullable() {
        let m = NullableMask(vec![Some(true), None, Some(false)]);
        assert!(m.has_none());
        assert!(matches!(m.clone().into_mask("test"), Err(Error::NullMask { .. })));
        let m = m.fill_none(false);
        assert!(!m.has_none());
        assert_eq!(m.into_mask("test").unwrap(), vec![true, false, false]);
    }

    #[test]
    fn combine() {
        let obj = Mask::Object {
            collection: Collection::FatJetGood,
            mask: Jagged::from_nested(vec![vec![true, false], vec![], vec![true]]),
        };
        let ev = Mask::Event(vec![true, true, false]);
        let both = obj.and(&ev).unwrap();
        assert_eq!(both.events(), vec![true, false, false]);
        assert_eq!(both.collection(), Some(Collection::FatJetGood));
        assert_eq!(ev.and(&obj).unwrap(), both);

        let muons = Mask::Object {
            collection: Collection::MuonGood,
            mask: Jagged::from_nested(vec![vec![], vec![], vec![]]),
        };
        assert!(matches!(
            obj.and(&muons),
            Err(Error::CollectionMismatch(Collection::FatJetGood, Collection::MuonGood))
        ));
    }

    #[test]
    fn count() {
        let m = Jagged::from_nested(vec![vec![true, true, false], vec![], vec![false]]);
        assert_eq!(m.count(), vec![2, 0, 0]);
        assert_eq!(m.any(), vec![true, false, false]);
    }
}

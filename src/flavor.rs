use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoEnumIterator};

use crate::error::{Error, Result};
use crate::event::{Collection, EventBatch, Field};
use crate::mask::Jagged;
use crate::particle::{hadron_flavour, is_bottom, is_charm};

/// Mutually exclusive jet flavour labels
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
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Flavor {
    L,
    C,
    B,
    Cc,
    Bb,
}

impl Flavor {
    pub fn parse(label: &str) -> Result<Self> {
        label.parse().map_err(|_| Error::UnknownFlavor(label.to_owned()))
    }

    pub fn all() -> impl Iterator<Item = Flavor> {
        Self::iter()
    }

    /// Classify a single jet
    ///
    /// `bb` and `cc` take precedence over the inclusive `b` and `c`
    /// labels.
    pub fn classify(hadron_flavor: f64, n_b_hadrons: f64, n_c_hadrons: f64) -> Self {
        let id = hadron_flavour(hadron_flavor);
        if is_bottom(id) {
            if n_b_hadrons >= 2. {
                Flavor::Bb
            } else {
                Flavor::B
            }
        } else if is_charm(id) {
            if n_b_hadrons == 0. && n_c_hadrons >= 2. {
                Flavor::Cc
            } else {
                Flavor::C
            }
        } else {
            Flavor::L
        }
    }
}

/// Per-jet flavour labels of a collection
pub fn flavors(events: &EventBatch, collection: Collection) -> Result<Jagged<Flavor>> {
    let flav = events.column(collection, Field::HadronFlavour)?;
    let nb = events.column(collection, Field::NBHadrons)?;
    let nc = events.column(collection, Field::NCHadrons)?;
    let content = flav
        .values()
        .iter()
        .zip(nb.values())
        .zip(nc.values())
        .map(|((f, nb), nc)| Flavor::classify(*f, *nb, *nc))
        .collect();
    Ok(Jagged::new(events.collection(collection)?.offsets().to_vec(), content))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels() {
        assert_eq!(Flavor::parse("bb").unwrap(), Flavor::Bb);
        assert_eq!(Flavor::Cc.to_string(), "cc");
        assert!(matches!(Flavor::parse("bc"), Err(Error::UnknownFlavor(_))));
        assert_eq!(Flavor::all().count(), 5);
    }

    #[test]
    fn classify() {
        assert_eq!(Flavor::classify(5., 2., 0.), Flavor::Bb);
        assert_eq!(Flavor::classify(5., 1., 3.), Flavor::B);
        assert_eq!(Flavor::classify(4., 0., 2.), Flavor::Cc);
        assert_eq!(Flavor::classify(4., 1., 2.), Flavor::C);
        assert_eq!(Flavor::classify(4., 0., 1.), Flavor::C);
        assert_eq!(Flavor::classify(0., 0., 0.), Flavor::L);
    }
}

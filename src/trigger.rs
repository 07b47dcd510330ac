use std::collections::BTreeMap;

use log::warn;

use crate::config::Parameters;
use crate::error::{Error, Result};
use crate::event::EventBatch;
use crate::sample::{Era, SampleInfo};

/// Resolves a named trigger selection into an event mask
pub trait TriggerCatalog: Send + Sync {
    /// Combined mask of the triggers configured under `key`
    ///
    /// `primary_datasets`, if given, restricts the triggers to those of
    /// the listed primary datasets, both for data and simulation.
    fn trigger_mask(
        &self,
        events: &EventBatch,
        key: &str,
        sample: &SampleInfo,
        primary_datasets: Option<&[String]>,
        invert: bool,
    ) -> Result<Vec<bool>>;
}

/// Trigger catalogue read from the `triggers` parameters
///
/// For simulation the OR of all triggers under the key is taken, for
/// data only the triggers of the sample's primary dataset.
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct ConfigTriggerCatalog {
    triggers: BTreeMap<String, BTreeMap<Era, BTreeMap<String, Vec<String>>>>,
}

impl ConfigTriggerCatalog {
    pub fn new(params: &Parameters) -> Self {
        Self {
            triggers: params.triggers.clone(),
        }
    }

    pub fn paths(
        &self,
        key: &str,
        sample: &SampleInfo,
        primary_datasets: Option<&[String]>,
    ) -> Result<Vec<&str>> {
        let by_pd = self
            .triggers
            .get(key)
            .ok_or_else(|| Error::Config(format!("unknown trigger key '{key}'")))?
            .get(&sample.era)
            .ok_or_else(|| {
                Error::Config(format!(
                    "no triggers for key '{key}' in era {}",
                    sample.era
                ))
            })?;
        let pds: Vec<&str> = match (primary_datasets, &sample.primary_dataset) {
            (Some(pds), _) => pds.iter().map(|s| s.as_str()).collect(),
            (None, _) if sample.is_mc => by_pd.keys().map(|s| s.as_str()).collect(),
            (None, Some(pd)) => vec![pd.as_str()],
            (None, None) => {
                return Err(Error::Config(format!(
                    "data sample {} has no primary dataset",
                    sample.name
                )))
            }
        };
        let mut paths = Vec::new();
        for pd in pds {
            let pd_paths = by_pd.get(pd).ok_or_else(|| {
                Error::Config(format!(
                    "no triggers for primary dataset {pd} under key '{key}'"
                ))
            })?;
            paths.extend(pd_paths.iter().map(|s| s.as_str()));
        }
        paths.sort_unstable();
        paths.dedup();
        Ok(paths)
    }
}

impl TriggerCatalog for ConfigTriggerCatalog {
    fn trigger_mask(
        &self,
        events: &EventBatch,
        key: &str,
        sample: &SampleInfo,
        primary_datasets: Option<&[String]>,
        invert: bool,
    ) -> Result<Vec<bool>> {
        let mut mask = vec![false; events.len()];
        for path in self.paths(key, sample, primary_datasets)? {
            let Some(bits) = events.hlt(path) else {
                warn!("HLT path {path} not found in events, ignoring it");
                continue;
            };
            for (m, bit) in mask.iter_mut().zip(bits) {
                *m |= *bit;
            }
        }
        if invert {
            for m in &mut mask {
                *m = !*m;
            }
        }
        Ok(mask)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> ConfigTriggerCatalog {
        let params = Parameters::from_yaml_layers(&[r#"
triggers:
  test:
    "2023_preBPix":
      BTagMu: [HLT_A, HLT_B]
      JetHT: [HLT_C]
"#])
        .unwrap();
        ConfigTriggerCatalog::new(&params)
    }

    fn events() -> EventBatch {
        EventBatch::new(4)
            .with_hlt("HLT_A", vec![true, false, false, false])
            .with_hlt("HLT_B", vec![false, true, false, false])
            .with_hlt("HLT_C", vec![false, false, true, false])
    }

    #[test]
    fn mc_takes_all() {
        let mc = SampleInfo::mc("QCD", Era::Run2023PreBPix);
        let mask = catalog().trigger_mask(&events(), "test", &mc, None, false).unwrap();
        assert_eq!(mask, vec![true, true, true, false]);
        let inv = catalog().trigger_mask(&events(), "test", &mc, None, true).unwrap();
        assert_eq!(inv, vec![false, false, false, true]);
    }

    #[test]
    fn data_takes_primary_dataset() {
        let data = SampleInfo::data("DATA_BTagMu", Era::Run2023PreBPix, "BTagMu");
        let mask = catalog().trigger_mask(&events(), "test", &data, None, false).unwrap();
        assert_eq!(mask, vec![true, true, false, false]);

        let pds = vec!["JetHT".to_owned()];
        let mask = catalog()
            .trigger_mask(&events(), "test", &data, Some(&pds), false)
            .unwrap();
        assert_eq!(mask, vec![false, false, true, false]);
    }

    #[test]
    fn missing_path_is_not_fired() {
        let mc = SampleInfo::mc("QCD", Era::Run2023PreBPix);
        let events = EventBatch::new(2).with_hlt("HLT_C", vec![true, false]);
        let mask = catalog().trigger_mask(&events, "test", &mc, None, false).unwrap();
        assert_eq!(mask, vec![true, false]);
    }

    #[test]
    fn unknown() {
        let mc = SampleInfo::mc("QCD", Era::Run2024);
        assert!(catalog().trigger_mask(&events(), "test", &mc, None, false).is_err());
        assert!(catalog().trigger_mask(&events(), "nope", &mc, None, false).is_err());
    }
}

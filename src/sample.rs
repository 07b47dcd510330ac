use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

/// Data-taking periods
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
pub enum Era {
    #[strum(serialize = "2022_preEE")]
    #[serde(rename = "2022_preEE")]
    Run2022PreEE,
    #[strum(serialize = "2022_postEE")]
    #[serde(rename = "2022_postEE")]
    Run2022PostEE,
    #[strum(serialize = "2023_preBPix")]
    #[serde(rename = "2023_preBPix")]
    Run2023PreBPix,
    #[strum(serialize = "2023_postBPix")]
    #[serde(rename = "2023_postBPix")]
    Run2023PostBPix,
    #[strum(serialize = "2024")]
    #[serde(rename = "2024")]
    Run2024,
}

impl Era {
    /// Starting with 2024 the NanoAOD carries GlobalParT v3 taggers
    pub fn has_global_part3(self) -> bool {
        self >= Era::Run2024
    }
}

/// What is known about the sample a batch belongs to
#[derive(Clone, PartialEq, Eq, Debug, Deserialize, Serialize)]
pub struct SampleInfo {
    pub name: String,
    pub era: Era,
    pub is_mc: bool,
    /// Primary dataset of real data, e.g. `BTagMu`
    #[serde(default)]
    pub primary_dataset: Option<String>,
}

impl SampleInfo {
    pub fn mc(name: &str, era: Era) -> Self {
        Self {
            name: name.to_owned(),
            era,
            is_mc: true,
            primary_dataset: None,
        }
    }

    pub fn data(name: &str, era: Era, primary_dataset: &str) -> Self {
        Self {
            name: name.to_owned(),
            era,
            is_mc: false,
            primary_dataset: Some(primary_dataset.to_owned()),
        }
    }
}

//! Mu-tagged fat jet selection for flavour tagging calibration
//!
//! Event batches are skimmed, their fat jets and muons preselected and
//! the surviving events split into categories by cuts on the fat jets.
//! Histograms are filled per category and subsample and merged over
//! batches.
#![warn(clippy::all, rust_2018_idioms)]

pub mod binning;
pub mod config;
pub mod configs;
pub mod cut;
pub mod cuts;
pub mod error;
pub mod event;
pub mod export;
pub mod flavor;
pub mod functions;
pub mod histogram;
pub mod import;
pub mod jets;
pub mod lumi;
pub mod mask;
pub mod particle;
pub mod reweighting;
pub mod sample;
pub mod selection;
pub mod trigger;
pub mod workflow;

pub use crate::cut::{Context, Cut};
pub use crate::error::{Error, Result};
pub use crate::event::{Collection, EventBatch, Field, ObjectCollection};
pub use crate::mask::Mask;

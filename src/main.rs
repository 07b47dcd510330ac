//! Selection and categorisation of mu-tagged fat jets for the
//! calibration of flavour taggers.
//!
//! # How to use
//!
//!     mutag --era 2023_preBPix --sample QCD_MuEnriched -o hists.json BATCHES...
//!
//! Event batches are columnar JSON or YAML files. Parameters are read
//! from the built-in defaults, overridden by every file passed with
//! `--params` in order. Real data is selected by passing the primary
//! dataset:
//!
//!     mutag --analysis fit_templates --params calibration.yaml \
//!         --era 2023_preBPix --sample DATA_BTagMu --primary-dataset BTagMu \
//!         -o data.yaml BATCHES...
//!
//! The log level can also be set with the `MUTAG_LOG` environment
//! variable.
mod opt;

use crate::opt::Opt;

use anyhow::{Context, Result};
use clap::Parser;
use env_logger::Env;
use log::{debug, info};
use mutag::config::Parameters;
use mutag::export::{export, ExportFormat};
use mutag::import::import;
use mutag::sample::SampleInfo;
use mutag::workflow::{process_batches, Resources};

fn main() -> Result<()> {
    let opt = Opt::parse();

    let env = Env::default().filter_or("MUTAG_LOG", opt.verbosity.as_str());
    env_logger::init_from_env(env);

    if let Some(threads) = opt.threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .context("Failed to set up thread pool")?;
    }

    let params = Parameters::load_layered(opt.params.as_slice())
        .context("Failed to load parameters")?;
    let sample = match &opt.primary_dataset {
        Some(pd) => SampleInfo::data(&opt.sample, opt.era, pd),
        None => SampleInfo::mc(&opt.sample, opt.era),
    };
    info!(
        "Running {} on {} sample {} ({})",
        opt.analysis,
        if sample.is_mc { "simulated" } else { "data" },
        sample.name,
        sample.era
    );

    let processor = opt.analysis.processor(params, opt.era)?;
    let resources = Resources::from_config(processor.config())
        .context("Failed to load trigger and luminosity information")?;

    let mut batches = Vec::new();
    for file in &opt.files {
        debug!("Importing events from {:?}", file);
        for batch in import(file)? {
            batches.push((sample.clone(), batch));
        }
    }

    let output = process_batches(processor.as_ref(), &batches, &resources)?;
    let format = opt
        .format
        .unwrap_or_else(|| ExportFormat::from_path(&opt.output));
    export(&opt.output, &output, format)?;
    info!("Histograms written to {:?}", opt.output);
    Ok(())
}

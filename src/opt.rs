use std::path::PathBuf;

use clap::Parser;

use mutag::configs::AnalysisKind;
use mutag::export::ExportFormat;
use mutag::sample::Era;

#[derive(Debug, Parser)]
#[clap(
    name = "mutag",
    about = "Select and categorise mu-tagged fat jets and fill histograms"
)]
pub struct Opt {
    /// Verbosity level: 'off', 'error', 'warn', 'info', 'debug', 'trace'
    #[clap(short, long, default_value = "info")]
    pub verbosity: String,

    /// Parameter files, later files override earlier ones
    #[clap(short, long)]
    pub params: Vec<PathBuf>,

    /// Analysis to run: 'fatjet_base', 'pt_reweighting' or 'fit_templates'
    #[clap(short, long, default_value = "pt_reweighting")]
    pub analysis: AnalysisKind,

    /// Data-taking era, e.g. '2022_preEE'
    #[clap(short, long)]
    pub era: Era,

    /// Sample name, e.g. 'QCD_MuEnriched'
    #[clap(short, long)]
    pub sample: String,

    /// Primary dataset of real data; samples without are simulation
    #[clap(long)]
    pub primary_dataset: Option<String>,

    /// Output file
    #[clap(short, long)]
    pub output: PathBuf,

    /// Output format: 'json' or 'yaml', by default from the file extension
    #[clap(long)]
    pub format: Option<ExportFormat>,

    /// Number of threads, by default one per core
    #[clap(short = 'j', long)]
    pub threads: Option<usize>,

    /// Event batch files to process
    pub files: Vec<PathBuf>,
}

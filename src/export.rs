use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use anyhow::{Context, Result};
use log::debug;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::histogram::Output;

#[derive(
    Display, EnumString, Copy, Clone, Eq, PartialEq, Hash, Debug, Deserialize, Serialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Json,
    Yaml,
}

impl ExportFormat {
    /// Guess the format from the file extension, defaulting to JSON
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("yaml") | Some("yml") => Self::Yaml,
            _ => Self::Json,
        }
    }
}

pub fn export(path: &Path, output: &Output, format: ExportFormat) -> Result<()> {
    debug!("Exporting output to {path:?} as {format}");
    let out = File::create(path)
        .with_context(|| format!("Failed to open {path:?}"))?;
    let out = BufWriter::new(out);
    match format {
        ExportFormat::Json => serde_json::to_writer(out, output)
            .with_context(|| format!("Failed to write {path:?}")),
        ExportFormat::Yaml => serde_yaml::to_writer(out, output)
            .with_context(|| format!("Failed to write {path:?}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::event::{Collection, Field};
    use crate::histogram::{Axis, Binning, HistConf};

    #[test]
    fn format() {
        assert_eq!(ExportFormat::from_path(Path::new("out.yml")), ExportFormat::Yaml);
        assert_eq!(ExportFormat::from_path(Path::new("out.json")), ExportFormat::Json);
        assert_eq!(ExportFormat::from_path(Path::new("out")), ExportFormat::Json);
    }

    #[test]
    fn written_output_can_be_read_back() {
        let conf = HistConf::new(vec![Axis::object(
            "FatJetGood_pt",
            Collection::FatJetGood,
            Field::Pt,
            Binning::Regular { bins: 2, start: 0., stop: 2. },
        )]);
        let mut output = Output::default();
        output
            .histogram_mut("FatJetGood_pt", "inclusive", "QCD_b", &conf)
            .fill(&[1.5], 2.);
        output.add_cutflow("skim", "QCD", 3.);

        for format in [ExportFormat::Json, ExportFormat::Yaml] {
            let path = std::env::temp_dir()
                .join(format!("mutag-export-{}.{format}", std::process::id()));
            export(&path, &output, format).unwrap();
            let content = std::fs::read_to_string(&path).unwrap();
            let read: Output = match format {
                ExportFormat::Json => serde_json::from_str(&content).unwrap(),
                ExportFormat::Yaml => serde_yaml::from_str(&content).unwrap(),
            };
            assert_eq!(read, output);
            std::fs::remove_file(path).unwrap();
        }
    }
}

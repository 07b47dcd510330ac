use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use log::debug;
use serde::Deserialize;

use crate::event::EventBatch;

#[derive(Deserialize)]
#[serde(untagged)]
enum Batches {
    Many(Vec<EventBatch>),
    One(EventBatch),
}

impl From<Batches> for Vec<EventBatch> {
    fn from(batches: Batches) -> Self {
        match batches {
            Batches::Many(b) => b,
            Batches::One(b) => vec![b],
        }
    }
}

/// Read one event batch or a list of event batches
///
/// The format is JSON if the file starts with `{` or `[`, YAML
/// otherwise.
pub fn import(filename: &Path) -> Result<Vec<EventBatch>> {
    let file = File::open(filename)
        .with_context(|| format!("Failed to open {filename:?}"))?;
    let mut reader = BufReader::new(file);
    let buf = reader.fill_buf()?;
    let first = buf.iter().find(|c| !c.is_ascii_whitespace()).copied();

    let batches: Batches = match first {
        Some(b'{') | Some(b'[') => {
            debug!("trying to import {filename:?} as JSON file");
            serde_json::from_reader(reader)
                .with_context(|| format!("Failed to import {filename:?}"))?
        }
        Some(_) => {
            debug!("trying to import {filename:?} as YAML file");
            let mut content = String::new();
            reader.read_to_string(&mut content)?;
            serde_yaml::from_str(&content)
                .with_context(|| format!("Failed to import {filename:?}"))?
        }
        None => return Err(anyhow!("Failed to import {filename:?}: file is empty")),
    };
    let batches = Vec::from(batches);
    for (n, batch) in batches.iter().enumerate() {
        batch
            .validate()
            .with_context(|| format!("Invalid batch {n} in {filename:?}"))?;
    }
    debug!("Imported {} batches from {filename:?}", batches.len());
    Ok(batches)
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::Write;

    use crate::event::{Collection, EventField, Field};

    fn write_tmp(name: &str, content: &str) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(format!("mutag-import-{}-{name}", std::process::id()));
        let mut file = File::create(&path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        path
    }

    #[test]
    fn json() {
        let path = write_tmp(
            "batch.json",
            r#"{
                "len": 2,
                "scalars": {"PV_npvsGood": [3, 0]},
                "hlt": {"BTagMu_AK8Jet300_Mu5": [true, false]},
                "collections": {
                    "FatJet": {"offsets": [0, 1, 1], "columns": {"pt": [420.0]}}
                }
            }"#,
        );
        let batches = import(&path).unwrap();
        assert_eq!(batches.len(), 1);
        let batch = &batches[0];
        assert_eq!(batch.scalar(EventField::NPvGood).unwrap(), &[3., 0.]);
        assert_eq!(
            batch.column(Collection::FatJet, Field::Pt).unwrap().values(),
            &[420.]
        );
        std::fs::remove_file(path).unwrap();
    }

    #[test]
    fn yaml_list() {
        let path = write_tmp(
            "batches.yaml",
            "- len: 1\n  collections:\n    Muon:\n      offsets: [0, 2]\n      columns:\n        pt: [10, 20]\n- len: 0\n",
        );
        let batches = import(&path).unwrap();
        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0].collection(Collection::Muon).unwrap().n_objects(), 2);
        assert!(batches[1].is_empty());
        std::fs::remove_file(path).unwrap();
    }

    #[test]
    fn invalid() {
        let path = write_tmp("bad.json", r#"{"len": 2, "scalars": {"run": [1]}}"#);
        assert!(import(&path).is_err());
        std::fs::remove_file(path).unwrap();
    }
}

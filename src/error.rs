use thiserror::Error;

use crate::event::{Collection, EventField, Field};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unknown flavor label '{0}', expected one of l, c, b, cc, bb")]
    UnknownFlavor(String),

    #[error("Invalid working point: {0}")]
    WorkingPoint(String),

    #[error("Unsupported upper bin edge '{0}', use a number or 'Inf'")]
    BinEdge(String),

    #[error("Could not find the mass regression factor in {0} for GloParT or PNet")]
    MissingMassRegression(Collection),

    #[error("Not implemented: {0}")]
    NotImplemented(String),

    #[error("Null entries in mask of cut '{cut}'")]
    NullMask { cut: String },

    #[error("Missing collection {0}")]
    MissingCollection(Collection),

    #[error("Missing column {field} in collection {collection}")]
    MissingColumn { collection: Collection, field: Field },

    #[error("Missing event column {0}")]
    MissingEventColumn(EventField),

    #[error("Cannot combine masks on {0} and {1}")]
    CollectionMismatch(Collection, Collection),

    #[error("Invalid event batch: {0}")]
    InvalidBatch(String),

    #[error("Cannot merge histograms: {0}")]
    Merge(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
}

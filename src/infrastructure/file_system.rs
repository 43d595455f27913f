use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use log::{debug, info};
use thiserror::Error;

use crate::domain::JsonObject;

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("failed to open {path:?}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path:?} as JSON: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("{path:?} must contain a single JSON array of objects, found {found}")]
    NotAnArray { path: PathBuf, found: &'static str },
    #[error("element {index} of {path:?} is {found}, expected an object")]
    NotAnObject {
        path: PathBuf,
        index: usize,
        found: &'static str,
    },
}

fn kind_of(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}

/// Reads a file holding one JSON array of objects, e.g. an export of tweets.
///
/// Nothing about the objects is assumed beyond them being objects; the
/// caller decides which fields matter.
pub fn load_json_array(path: &Path) -> Result<Vec<JsonObject>, ImportError> {
    debug!("Loading JSON records from {:?}", path);
    let file = File::open(path).map_err(|source| ImportError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    let value: serde_json::Value =
        serde_json::from_reader(BufReader::new(file)).map_err(|source| ImportError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

    let items = match value {
        serde_json::Value::Array(items) => items,
        other => {
            return Err(ImportError::NotAnArray {
                path: path.to_path_buf(),
                found: kind_of(&other),
            })
        }
    };

    let records = items
        .into_iter()
        .enumerate()
        .map(|(index, item)| match item {
            serde_json::Value::Object(map) => Ok(map),
            other => Err(ImportError::NotAnObject {
                path: path.to_path_buf(),
                index,
                found: kind_of(&other),
            }),
        })
        .collect::<Result<Vec<_>, _>>()?;

    info!("Loaded {} records from {:?}", records.len(), path);
    Ok(records)
}

//! Build a fragment tree from a JSON file.
//!
//! Objects become fragments, arrays become fragment lists (their elements
//! must be objects), scalars become variables. Booleans map to 0/1.

use std::fmt;
use std::path::Path;

use serde_json::Value as Json;
use teng_core::Fragment;

#[derive(Debug)]
pub enum DataError {
    Io(std::io::Error),
    Json(serde_json::Error),
    NotAnObject,
    BadListElement(String),
}

impl fmt::Display for DataError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataError::Io(err) => write!(f, "{err}"),
            DataError::Json(err) => write!(f, "{err}"),
            DataError::NotAnObject => write!(f, "the data root must be a JSON object"),
            DataError::BadListElement(key) => {
                write!(f, "array '{key}' may contain only objects")
            }
        }
    }
}

pub fn load(path: &Path) -> Result<Fragment, DataError> {
    let text = std::fs::read_to_string(path).map_err(DataError::Io)?;
    let json: Json = serde_json::from_str(&text).map_err(DataError::Json)?;
    let Json::Object(map) = json else {
        return Err(DataError::NotAnObject);
    };
    let mut root = Fragment::new();
    fill(&mut root, &map)?;
    Ok(root)
}

fn fill(
    frag: &mut Fragment,
    map: &serde_json::Map<String, Json>,
) -> Result<(), DataError> {
    for (key, value) in map {
        match value {
            Json::Null => frag.add_variable(key.clone(), ""),
            Json::Bool(b) => frag.add_variable(key.clone(), *b as i64),
            Json::Number(n) => {
                if let Some(i) = n.as_i64() {
                    frag.add_variable(key.clone(), i);
                } else {
                    frag.add_variable(key.clone(), n.as_f64().unwrap_or(f64::NAN));
                }
            }
            Json::String(s) => frag.add_variable(key.clone(), s.as_str()),
            Json::Object(inner) => {
                let child = frag.add_fragment(key.clone());
                fill(child, inner)?;
            }
            Json::Array(items) => {
                let list = frag.add_fragment_list(key.clone());
                for item in items {
                    let Json::Object(inner) = item else {
                        return Err(DataError::BadListElement(key.clone()));
                    };
                    let child = list.add_fragment();
                    fill(child, inner)?;
                }
            }
        }
    }
    Ok(())
}

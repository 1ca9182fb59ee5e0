//! Typed events decoded from channel records
//!
//! A record is a JSON array: the event name followed by positional
//! arguments, e.g. `["onFail", {"filename": "a.png", "mismatch": 3.2}]`.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};

use crate::error::{VisregError, VisregResult};

/// Test descriptor reported by the worker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestRecord {
    /// Screenshot the comparison was made for
    pub filename: PathBuf,

    /// Percentage of differing pixels
    #[serde(default, deserialize_with = "lenient_percentage")]
    pub mismatch: Option<f64>,

    #[serde(default)]
    pub fail_file: Option<PathBuf>,

    #[serde(default)]
    pub diff_file: Option<PathBuf>,
}

impl TestRecord {
    pub fn basename(&self) -> String {
        basename(&self.filename)
    }
}

pub(crate) fn basename(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

/// Comparison engines report the mismatch either as a number or as a
/// formatted string such as `"3.20"`.
fn lenient_percentage<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Percentage {
        Number(f64),
        Text(String),
    }

    match Option::<Percentage>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Percentage::Number(n)) => Ok(Some(n)),
        Some(Percentage::Text(s)) => s
            .trim()
            .trim_end_matches('%')
            .parse()
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}

/// A decoded channel record
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Pass(TestRecord),
    Fail(TestRecord),
    Timeout(TestRecord),
    NewImage(TestRecord),
    /// Only the length of `all_tests` is used, so its entries are kept raw
    Complete {
        all_tests: Vec<Value>,
        failed: u32,
        errored: u32,
    },
    /// Event names this orchestrator does not know about
    Unknown(String),
}

impl Event {
    /// Decode one raw channel record
    pub fn decode(record: &str) -> VisregResult<Self> {
        let value: Value = serde_json::from_str(record)
            .map_err(|e| VisregError::Decode(format!("{}: {}", e, record)))?;

        let Value::Array(mut items) = value else {
            return Err(VisregError::Decode(format!("expected an array: {}", record)));
        };
        if items.is_empty() {
            return Err(VisregError::Decode("empty record".to_string()));
        }

        let args = items.split_off(1);
        let name = match items.pop() {
            Some(Value::String(name)) => name,
            _ => {
                return Err(VisregError::Decode(format!(
                    "event name must be a string: {}",
                    record
                )))
            }
        };
        let mut args = Args { name: &name, items: args.into_iter() };

        let event = match name.as_str() {
            "onPass" => Event::Pass(args.next()?),
            "onFail" => Event::Fail(args.next()?),
            "onTimeout" => Event::Timeout(args.next()?),
            "onNewImage" => Event::NewImage(args.next()?),
            "onComplete" => Event::Complete {
                all_tests: args.next()?,
                failed: args.next()?,
                errored: args.next()?,
            },
            _ => Event::Unknown(name.clone()),
        };

        Ok(event)
    }

    /// Wire name of the event
    pub fn name(&self) -> &str {
        match self {
            Event::Pass(_) => "onPass",
            Event::Fail(_) => "onFail",
            Event::Timeout(_) => "onTimeout",
            Event::NewImage(_) => "onNewImage",
            Event::Complete { .. } => "onComplete",
            Event::Unknown(name) => name,
        }
    }
}

/// Positional argument reader for one record
struct Args<'a> {
    name: &'a str,
    items: std::vec::IntoIter<Value>,
}

impl Args<'_> {
    fn next<T: serde::de::DeserializeOwned>(&mut self) -> VisregResult<T> {
        let value = self.items.next().ok_or_else(|| {
            VisregError::Decode(format!("{} is missing an argument", self.name))
        })?;

        serde_json::from_value(value)
            .map_err(|e| VisregError::Decode(format!("{}: {}", self.name, e)))
    }
}

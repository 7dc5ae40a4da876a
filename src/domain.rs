use std::fmt;
use std::str::FromStr;

use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::SyncError;

/// Suffix of the resources the pipeline mirrors.
pub const COMPRESSED_SUFFIX: &str = ".gz";

/// One downloadable file entry as listed by the catalog.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceDescriptor {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default, deserialize_with = "string_or_empty")]
    pub name: String,
    #[serde(default)]
    pub last_modified: Option<String>,
    /// Kept verbatim: the catalog does not guarantee a number here.
    #[serde(default)]
    pub size: Option<Value>,
}

impl ResourceDescriptor {
    /// The URL, if present and pointing at a gzip resource.
    pub fn compressed_url(&self) -> Option<&str> {
        self.url
            .as_deref()
            .filter(|url| !url.is_empty() && url.ends_with(COMPRESSED_SUFFIX))
    }
}

/// Persisted record of the last successfully fetched version of a resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataRecord {
    pub url: String,
    #[serde(default)]
    pub last_modified: Option<String>,
    #[serde(default, deserialize_with = "string_or_empty")]
    pub name: String,
    #[serde(default)]
    pub size: Option<Value>,
}

impl MetadataRecord {
    pub fn from_descriptor(url: &str, resource: &ResourceDescriptor) -> Self {
        Self {
            url: url.to_string(),
            last_modified: resource.last_modified.clone(),
            name: resource.name.clone(),
            size: resource.size.clone(),
        }
    }
}

/// Catalog modification time, `YYYY-MM-DDTHH:MM:SS.ffffff` without a zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ResourceTimestamp(NaiveDateTime);

impl ResourceTimestamp {
    pub const FORMAT: &'static str = "%Y-%m-%dT%H:%M:%S";
}

impl fmt::Display for ResourceTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%dT%H:%M:%S%.6f"))
    }
}

impl FromStr for ResourceTimestamp {
    type Err = SyncError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let invalid = |message: &str| SyncError::TimestampParse {
            value: value.to_string(),
            message: message.to_string(),
        };

        let (head, fraction) = value
            .split_once('.')
            .ok_or_else(|| invalid("missing fractional seconds"))?;
        if fraction.is_empty()
            || fraction.len() > 6
            || !fraction.chars().all(|ch| ch.is_ascii_digit())
        {
            return Err(invalid("fractional seconds must be 1 to 6 digits"));
        }
        let base = NaiveDateTime::parse_from_str(head, Self::FORMAT)
            .map_err(|err| invalid(&err.to_string()))?;
        let micros: i64 = format!("{fraction:0<6}")
            .parse()
            .map_err(|_| invalid("fractional seconds must be 1 to 6 digits"))?;
        Ok(Self(base + Duration::microseconds(micros)))
    }
}

/// Folder name for a resource: the last 4 characters (usually a year) are dropped when
/// they are all digits. Shorter names are checked as a whole, so `"24"` becomes `""`.
pub fn folder_name(name: &str) -> &str {
    let cut = name
        .char_indices()
        .rev()
        .take(4)
        .last()
        .map_or(name.len(), |(index, _)| index);
    let suffix = &name[cut..];
    if !suffix.is_empty() && suffix.chars().all(char::is_numeric) {
        &name[..cut]
    } else {
        name
    }
}

fn string_or_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

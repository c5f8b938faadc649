//! Archive envelope format.
//!
//! A bundle carries one JSON envelope `{ "things": [...] }` next to the
//! attachment files. Exported entries are written with [`ArchivedThing`];
//! imported entries are read with [`ImportedThing`], which also accepts the
//! string timestamps written by older exports.

use chrono::DateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::error::{Error, Result};
use crate::models::{Attachment, ExternalLink, Note};

/// The JSON document stored at [`crate::defaults::ENVELOPE_FILE_NAME`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArchiveEnvelope {
    pub things: Vec<ArchivedThing>,
}

impl ArchiveEnvelope {
    pub fn from_notes<'a>(notes: impl IntoIterator<Item = &'a Note>) -> Self {
        Self {
            things: notes.into_iter().map(ArchivedThing::from).collect(),
        }
    }
}

/// Exported projection of a note. Tags are deliberately absent: importers
/// always recompute them from content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchivedThing {
    pub created_at: i64,
    pub modified_at: i64,
    pub content: String,
    #[serde(default)]
    pub external_content: Vec<ExternalLink>,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

impl From<&Note> for ArchivedThing {
    fn from(note: &Note) -> Self {
        Self {
            created_at: note.created_at,
            modified_at: note.modified_at,
            content: note.content.clone(),
            external_content: note.external_content.clone().unwrap_or_default(),
            attachments: note.attachments.clone(),
        }
    }
}

/// A timestamp as found in an envelope: epoch milliseconds, or a date
/// string from older exports.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum RawTimestamp {
    Millis(i64),
    Fractional(f64),
    Text(String),
}

impl RawTimestamp {
    /// Normalize to epoch milliseconds.
    pub fn to_millis(&self) -> Result<i64> {
        match self {
            RawTimestamp::Millis(ms) => Ok(*ms),
            RawTimestamp::Fractional(ms) => Ok(ms.trunc() as i64),
            RawTimestamp::Text(text) => DateTime::parse_from_rfc3339(text.trim())
                .map(|dt| dt.timestamp_millis())
                .map_err(|e| Error::Validation(format!("invalid timestamp '{}': {}", text, e))),
        }
    }
}

/// Lenient reading of one envelope entry. Any `tags` field is ignored.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportedThing {
    pub content: String,
    #[serde(default)]
    pub created_at: Option<RawTimestamp>,
    #[serde(default)]
    pub modified_at: Option<RawTimestamp>,
    #[serde(default)]
    pub external_content: Option<Vec<ExternalLink>>,
    #[serde(default)]
    pub attachments: Option<Vec<Attachment>>,
}

impl ImportedThing {
    /// Parse a single entry taken from an envelope's `things` array.
    pub fn from_value(value: JsonValue) -> Result<Self> {
        serde_json::from_value(value)
            .map_err(|e| Error::Validation(format!("invalid archive entry: {}", e)))
    }

    /// Creation and modification times in epoch milliseconds.
    ///
    /// A missing modification time falls back to the creation time; a
    /// missing creation time falls back to `now`.
    pub fn timestamps(&self, now: i64) -> Result<(i64, i64)> {
        let created_at = match self.created_at {
            Some(ref ts) => ts.to_millis()?,
            None => now,
        };
        let modified_at = match self.modified_at {
            Some(ref ts) => ts.to_millis()?,
            None => created_at,
        };
        Ok((created_at, modified_at))
    }
}

/// Validate raw envelope bytes and return the entries of its `things` array.
///
/// Entries are returned unparsed so that a bad entry fails on its own turn
/// during sequential import rather than rejecting the whole bundle.
pub fn parse_envelope(data: &[u8]) -> Result<Vec<JsonValue>> {
    let value: JsonValue = serde_json::from_slice(data)
        .map_err(|e| Error::InvalidArchive(format!("content is not JSON: {}", e)))?;

    match value {
        JsonValue::Object(mut map) => match map.remove("things") {
            Some(JsonValue::Array(things)) => Ok(things),
            _ => Err(Error::InvalidArchive(
                "content must have a \"things\" array".to_string(),
            )),
        },
        _ => Err(Error::InvalidArchive(
            "content must have a \"things\" array".to_string(),
        )),
    }
}

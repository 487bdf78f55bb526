//! Note types crossing the plugin boundary, and the internal record the
//! registry owns.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{HostError, HostResult};
use crate::filter::TagClause;

/// The handle a plugin uses to refer to a note across calls.
///
/// A handle returned by any operation always carries a resolvable `uuid`,
/// and its tags are already normalized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteHandle {
    pub uuid: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
}

/// Partial note identification accepted by lookup operations.
///
/// `uuid`, when present, is used regardless of other properties; otherwise
/// `name` is required and `tags` narrows the match (each entry is one tag
/// clause, e.g. `"some-tag"` or `"^not-this-tag"`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
}

impl NoteInfo {
    pub fn by_uuid(uuid: &str) -> Self {
        Self {
            uuid: Some(uuid.to_string()),
            ..Default::default()
        }
    }

    pub fn by_name(name: &str) -> Self {
        Self {
            name: Some(name.to_string()),
            ..Default::default()
        }
    }
}

/// Lookup key resolved from a partial handle.
///
/// An explicit tagged variant instead of ad hoc field-presence checks: one
/// dispatch point decides which lookup path a partial handle takes.
#[derive(Debug, Clone)]
pub enum NoteKey {
    ByUuid(String),
    ByNameAndTags {
        name: String,
        clauses: Vec<TagClause>,
    },
}

impl NoteKey {
    /// Derive the lookup key from partial note info. Missing both `uuid`
    /// and `name` is a contract violation.
    pub fn from_info(info: &NoteInfo) -> HostResult<Self> {
        if let Some(uuid) = &info.uuid {
            return Ok(NoteKey::ByUuid(uuid.clone()));
        }

        let name = info.name.clone().ok_or_else(|| {
            HostError::InvalidInput(
                "note lookup requires a uuid or a name".to_string(),
            )
        })?;

        let mut clauses = Vec::new();
        if let Some(raw_tags) = &info.tags {
            for raw in raw_tags {
                clauses.push(TagClause::parse(raw)?);
            }
        }

        Ok(NoteKey::ByNameAndTags { name, clauses })
    }
}

/// Internal note record owned by the identity registry.
#[derive(Debug, Clone)]
pub struct NoteRecord {
    pub uuid: String,
    pub name: Option<String>,
    /// Normalized tag set.
    pub tags: BTreeSet<String>,
    /// Host-assigned group taxonomy identifier, if any.
    pub group: Option<String>,
    /// Creation sequence number; gives filter results a stable order.
    pub seq: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl NoteRecord {
    /// The plugin-visible handle for this record.
    pub fn handle(&self) -> NoteHandle {
        NoteHandle {
            uuid: self.uuid.clone(),
            name: self.name.clone(),
            tags: Some(self.tags.iter().cloned().collect()),
        }
    }
}

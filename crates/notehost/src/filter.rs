//! The note filter language: `{group, query, tag}` parameters, tag clause
//! parsing, and evaluation against a note snapshot.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::{HostError, HostResult};
use crate::note::{NoteHandle, NoteRecord};
use crate::tags::normalize_tag;

/// Filter parameters accepted by `filterNotes`.
///
/// Absent fields impose no constraint, so an empty filter matches every
/// non-deleted note.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterParameters {
    /// Comma-separated group identifiers; a note matches if it belongs to
    /// any listed group. Identifiers are trimmed and matched exactly.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    /// Fuzzy search term: a case-insensitive substring match on the note
    /// name. Not full-text search; no tokenizing, no ranking.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    /// Comma-separated tag clauses; every clause must be satisfied. A
    /// clause prefixed with `^` matches notes that do *not* have the tag.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
}

/// One comma-separated unit of a tag filter, optionally negated with `^`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagClause {
    pub negated: bool,
    pub tag: String,
}

impl TagClause {
    /// Parse a single raw clause such as `"some-tag"` or `"^not-this-tag"`.
    ///
    /// Whitespace around the clause is trimmed before the `^` prefix is
    /// detected; the body is normalized to the canonical tag alphabet. A
    /// clause that normalizes to nothing is malformed.
    pub fn parse(raw: &str) -> HostResult<Self> {
        let trimmed = raw.trim();
        let (negated, body) = match trimmed.strip_prefix('^') {
            Some(rest) => (true, rest),
            None => (false, trimmed),
        };
        let tag = normalize_tag(body);
        if tag.is_empty() {
            return Err(HostError::InvalidInput(format!(
                "malformed tag clause: {raw:?}"
            )));
        }
        Ok(Self { negated, tag })
    }

    /// Parse a comma-separated clause list, e.g. `"x,^y"`.
    pub fn parse_list(raw: &str) -> HostResult<Vec<Self>> {
        raw.split(',').map(Self::parse).collect()
    }

    /// Whether this clause is satisfied by a note's tag set.
    pub fn matches(&self, tags: &BTreeSet<String>) -> bool {
        tags.contains(&self.tag) != self.negated
    }

    /// Whether every clause is satisfied (logical AND).
    pub fn matches_all(clauses: &[Self], tags: &BTreeSet<String>) -> bool {
        clauses.iter().all(|clause| clause.matches(tags))
    }
}

/// A validated filter, ready to test candidate notes.
///
/// Compilation happens before any snapshot is taken so malformed clauses
/// are reported without touching note state.
#[derive(Debug, Clone)]
pub struct CompiledFilter {
    groups: Option<Vec<String>>,
    query: Option<String>,
    clauses: Vec<TagClause>,
}

impl CompiledFilter {
    pub fn compile(params: &FilterParameters) -> HostResult<Self> {
        let groups = params.group.as_deref().map(|raw| {
            raw.split(',')
                .map(str::trim)
                .filter(|group| !group.is_empty())
                .map(str::to_string)
                .collect::<Vec<_>>()
        });

        let query = params
            .query
            .as_deref()
            .map(|raw| raw.to_lowercase());

        let clauses = match params.tag.as_deref() {
            Some(raw) => TagClause::parse_list(raw)?,
            None => Vec::new(),
        };

        Ok(Self {
            groups,
            query,
            clauses,
        })
    }

    /// Whether a candidate note satisfies every present constraint.
    pub fn matches(&self, record: &NoteRecord) -> bool {
        if let Some(groups) = &self.groups {
            let in_group = record
                .group
                .as_deref()
                .map(|group| groups.iter().any(|candidate| candidate == group))
                .unwrap_or(false);
            if !in_group {
                return false;
            }
        }

        if let Some(query) = &self.query {
            let name = record.name.as_deref().unwrap_or("");
            if !name.to_lowercase().contains(query.as_str()) {
                return false;
            }
        }

        TagClause::matches_all(&self.clauses, &record.tags)
    }
}

/// Evaluate filter parameters against a point-in-time snapshot of notes.
///
/// The snapshot is expected to contain only non-deleted records, already in
/// creation order; output order follows the snapshot, so identical input
/// yields identical output.
pub fn evaluate(params: &FilterParameters, records: &[NoteRecord]) -> HostResult<Vec<NoteHandle>> {
    let compiled = CompiledFilter::compile(params)?;
    Ok(records
        .iter()
        .filter(|record| compiled.matches(record))
        .map(NoteRecord::handle)
        .collect())
}

//! Note identity lifecycle: local UUID minting, promotion to persisted
//! UUIDs, lookup, and deletion marking.

use std::collections::{BTreeSet, HashMap, HashSet};

use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::config::HostConfig;
use crate::error::{HostError, HostResult};
use crate::filter::TagClause;
use crate::note::{NoteHandle, NoteKey, NoteRecord};
use crate::tags::normalize_tag;

/// Owns every note UUID the host has issued.
///
/// Records live in an arena keyed by their canonical UUID; a redirect table
/// forwards locally-minted UUIDs to their persisted successors so every
/// previously-issued handle stays a valid reference. Deleted UUIDs stay in
/// the maps but become unresolvable.
///
/// Reads are concurrent; mutations serialize on the write lock. No lock is
/// held across an await point.
pub struct NoteRegistry {
    local_prefix: String,
    inner: RwLock<RegistryInner>,
}

#[derive(Default)]
struct RegistryInner {
    records: HashMap<String, NoteRecord>,
    /// local UUID -> persisted UUID. Promotion only ever points a local
    /// UUID at a non-local one, which keeps chains finite.
    redirects: HashMap<String, String>,
    deleted: HashSet<String>,
    next_seq: u64,
}

impl RegistryInner {
    /// Follow redirects to the current canonical UUID.
    fn canonical<'a>(&'a self, uuid: &'a str) -> &'a str {
        let mut current = uuid;
        while let Some(next) = self.redirects.get(current) {
            current = next;
        }
        current
    }

    fn resolve_uuid(&self, uuid: &str) -> Option<&NoteRecord> {
        if self.deleted.contains(uuid) {
            return None;
        }
        let canonical = self.canonical(uuid);
        if self.deleted.contains(canonical) {
            return None;
        }
        self.records.get(canonical)
    }
}

impl NoteRegistry {
    pub fn new(config: &HostConfig) -> Self {
        Self {
            local_prefix: config.local_uuid_prefix.clone(),
            inner: RwLock::new(RegistryInner::default()),
        }
    }

    /// Whether a UUID carries the local (pre-persistence) prefix.
    pub fn is_local(&self, uuid: &str) -> bool {
        uuid.starts_with(&self.local_prefix)
    }

    /// Mint a fresh local UUID and store a record for it.
    ///
    /// Supplied tags are normalized; entries that normalize to nothing are
    /// dropped. Returns immediately, without waiting for persistence.
    pub async fn create(&self, name: Option<String>, tags: &[String]) -> String {
        let uuid = format!("{}{}", self.local_prefix, Uuid::new_v4());
        let now = Utc::now();

        let mut normalized = BTreeSet::new();
        for raw in tags {
            let tag = normalize_tag(raw);
            if !tag.is_empty() {
                normalized.insert(tag);
            }
        }

        let mut inner = self.inner.write().await;
        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.records.insert(
            uuid.clone(),
            NoteRecord {
                uuid: uuid.clone(),
                name,
                tags: normalized,
                group: None,
                seq,
                created_at: now,
                updated_at: now,
            },
        );
        tracing::debug!("created note {uuid}");
        uuid
    }

    /// Install a redirect from a local UUID to its persisted UUID, called
    /// by the persistence collaborator when a local note completes
    /// persistence.
    ///
    /// Idempotent for the same target; a different target overwrites the
    /// redirect (last write wins, host-driven ordering). A deletion marked
    /// on any earlier alias carries forward to the new target.
    pub async fn promote(&self, local_uuid: &str, persisted_uuid: &str) -> HostResult<()> {
        if !self.is_local(local_uuid) {
            return Err(HostError::InvalidInput(format!(
                "promotion source {local_uuid:?} is not a local UUID"
            )));
        }
        if self.is_local(persisted_uuid) {
            return Err(HostError::InvalidInput(format!(
                "promotion target {persisted_uuid:?} is itself local"
            )));
        }

        let mut inner = self.inner.write().await;

        if let Some(existing) = inner.redirects.get(local_uuid) {
            if existing == persisted_uuid {
                return Ok(());
            }
            tracing::warn!(
                "re-promoting {local_uuid}: {existing} -> {persisted_uuid}"
            );
        }

        let was_deleted = {
            let old_canonical = inner.canonical(local_uuid);
            inner.deleted.contains(local_uuid) || inner.deleted.contains(old_canonical)
        };

        // Move the record under its persisted key. If the host already
        // registered a record there, that record wins.
        if let Some(mut record) = inner.records.remove(local_uuid) {
            record.uuid = persisted_uuid.to_string();
            record.updated_at = Utc::now();
            inner
                .records
                .entry(persisted_uuid.to_string())
                .or_insert(record);
        }

        inner
            .redirects
            .insert(local_uuid.to_string(), persisted_uuid.to_string());

        if was_deleted {
            inner.deleted.insert(persisted_uuid.to_string());
        }

        tracing::info!("promoted note {local_uuid} -> {persisted_uuid}");
        Ok(())
    }

    /// Resolve a lookup key to the current handle.
    ///
    /// UUID lookups follow redirects transitively, then check the deleted
    /// set. Name lookups require a unique match on exact name plus tag
    /// clauses; an ambiguous match resolves to not-found.
    pub async fn resolve(&self, key: &NoteKey) -> HostResult<Option<NoteHandle>> {
        let inner = self.inner.read().await;
        match key {
            NoteKey::ByUuid(uuid) => Ok(inner.resolve_uuid(uuid).map(NoteRecord::handle)),
            NoteKey::ByNameAndTags { name, clauses } => {
                let mut matches = inner.records.values().filter(|record| {
                    !inner.deleted.contains(&record.uuid)
                        && record.name.as_deref() == Some(name.as_str())
                        && TagClause::matches_all(clauses, &record.tags)
                });
                let first = matches.next();
                if matches.next().is_some() {
                    tracing::debug!("note lookup by name {name:?} is ambiguous");
                    return Ok(None);
                }
                Ok(first.map(NoteRecord::handle))
            }
        }
    }

    /// Mark a UUID (and every alias of it) deleted. The identity mapping is
    /// retained; all later lookups return not-found.
    pub async fn mark_deleted(&self, uuid: &str) {
        let mut inner = self.inner.write().await;
        let canonical = inner.canonical(uuid).to_string();
        inner.deleted.insert(canonical.clone());
        if uuid != canonical {
            inner.deleted.insert(uuid.to_string());
        }
        tracing::info!("marked note {canonical} deleted");
    }

    /// Attach an already-normalized tag to a note.
    pub async fn apply_tag(&self, uuid: &str, tag: &str) -> HostResult<()> {
        let mut inner = self.inner.write().await;
        let canonical = inner.canonical(uuid).to_string();
        if inner.deleted.contains(&canonical) {
            return Err(HostError::InvalidInput(format!("note not found: {uuid}")));
        }
        match inner.records.get_mut(&canonical) {
            Some(record) => {
                record.tags.insert(tag.to_string());
                record.updated_at = Utc::now();
                Ok(())
            }
            None => Err(HostError::InvalidInput(format!("note not found: {uuid}"))),
        }
    }

    /// Assign or clear the host group for a note.
    pub async fn set_group(&self, uuid: &str, group: Option<String>) -> HostResult<()> {
        let mut inner = self.inner.write().await;
        let canonical = inner.canonical(uuid).to_string();
        if inner.deleted.contains(&canonical) {
            return Err(HostError::InvalidInput(format!("note not found: {uuid}")));
        }
        match inner.records.get_mut(&canonical) {
            Some(record) => {
                record.group = group;
                record.updated_at = Utc::now();
                Ok(())
            }
            None => Err(HostError::InvalidInput(format!("note not found: {uuid}"))),
        }
    }

    /// Point-in-time snapshot of all non-deleted records in creation order.
    /// Mutations that complete afterwards are not reflected.
    pub async fn snapshot(&self) -> Vec<NoteRecord> {
        let inner = self.inner.read().await;
        let mut records: Vec<NoteRecord> = inner
            .records
            .values()
            .filter(|record| !inner.deleted.contains(&record.uuid))
            .cloned()
            .collect();
        records.sort_by_key(|record| record.seq);
        records
    }
}

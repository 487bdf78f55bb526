//! The `app` surface handed to plugin action functions.
//!
//! Stateless itself: every operation validates its input, then delegates to
//! the note registry, the filter engine, or an external collaborator. Each
//! operation is atomic from the plugin's point of view, and no lock is held
//! across an await.

use std::sync::Arc;

use uuid::Uuid;

use crate::alert::{
    AlertController, AlertOptions, AlertValue, DialogBroker, DialogPresenter, DialogRequest,
    UserChoice,
};
use crate::config::HostConfig;
use crate::error::{HostError, HostResult};
use crate::filter::{CompiledFilter, FilterParameters};
use crate::identity::NoteRegistry;
use crate::media::{MediaPayload, MediaStore};
use crate::note::{NoteHandle, NoteInfo, NoteKey};
use crate::tags::{normalize_tag, require_tag_string, TagPolicy};

pub struct App {
    config: HostConfig,
    registry: NoteRegistry,
    policy: Arc<dyn TagPolicy>,
    presenter: Arc<dyn DialogPresenter>,
    media: Arc<dyn MediaStore>,
    dialogs: DialogBroker,
}

impl App {
    pub fn new(
        config: HostConfig,
        policy: Arc<dyn TagPolicy>,
        presenter: Arc<dyn DialogPresenter>,
        media: Arc<dyn MediaStore>,
    ) -> Self {
        let registry = NoteRegistry::new(&config);
        Self {
            config,
            registry,
            policy,
            presenter,
            media,
            dialogs: DialogBroker::new(),
        }
    }

    /// `addNoteTag`: normalize a tag name and attach it to a note.
    ///
    /// The tag argument arrives as JSON from the plugin boundary; anything
    /// but a string is a type violation, raised before any state changes.
    /// Returns `false` (not an error) when shared-tag policy forbids the
    /// application.
    pub async fn add_note_tag(
        &self,
        note_info: &NoteInfo,
        tag_name: &serde_json::Value,
    ) -> HostResult<bool> {
        let raw = require_tag_string(tag_name)?;
        let tag = normalize_tag(raw);
        if tag.is_empty() {
            return Err(HostError::InvalidInput(format!(
                "tag name {raw:?} has no allowed characters"
            )));
        }

        let key = NoteKey::from_info(note_info)?;
        let handle = self
            .registry
            .resolve(&key)
            .await?
            .ok_or_else(|| HostError::InvalidInput("note not found".to_string()))?;

        if !self.policy.can_apply(&handle.uuid, &tag).await {
            return Ok(false);
        }

        self.registry.apply_tag(&handle.uuid, &tag).await?;
        Ok(true)
    }

    /// `alert`: show the user a message with optional action buttons and
    /// suspend until the modal interaction reaches a terminal state.
    ///
    /// Returns `null` on dismissal, `-1` for the DONE button (or the
    /// primary action's `value`), and the chosen action's index or `value`
    /// otherwise.
    pub async fn alert(
        &self,
        message: Option<&str>,
        options: Option<AlertOptions>,
    ) -> HostResult<AlertValue> {
        let options = options.unwrap_or_default();
        let mut controller = AlertController::new(&options);

        let dialog_id = Uuid::new_v4().to_string();
        let request = DialogRequest {
            dialog_id: dialog_id.clone(),
            message: message.map(str::to_string),
            options,
        };

        self.dialogs.open(&dialog_id).await;
        if let Err(error) = self.presenter.present(&request).await {
            self.dialogs.cancel(&dialog_id).await;
            return Err(error);
        }

        let choice = self.dialogs.wait(&dialog_id).await?;
        let outcome = controller.resolve(choice)?;
        Ok(outcome.into_value())
    }

    /// `attachNoteMedia`: upload a data-URL-encoded media file and
    /// associate it with a note. Returns the hosted media URL.
    ///
    /// The payload is decoded and size-checked before the upload
    /// collaborator is contacted; upload failures propagate unchanged and
    /// leave the note untouched.
    pub async fn attach_note_media(
        &self,
        note_info: &NoteInfo,
        data_url: &str,
    ) -> HostResult<String> {
        let payload = MediaPayload::from_data_url(data_url)?;
        if payload.bytes.len() > self.config.max_media_bytes {
            return Err(HostError::MediaTooLarge {
                size: payload.bytes.len(),
                limit: self.config.max_media_bytes,
            });
        }

        let key = NoteKey::from_info(note_info)?;
        let handle = self
            .registry
            .resolve(&key)
            .await?
            .ok_or_else(|| HostError::InvalidInput("note not found".to_string()))?;

        self.media.upload(&handle.uuid, payload).await
    }

    /// `createNote`: create a note and return its UUID.
    ///
    /// The returned UUID is local-prefixed and may be superseded once
    /// persistence completes, but keeps identifying the note on this
    /// client; `findNote` with it returns the persisted handle afterwards.
    pub async fn create_note(&self, name: Option<&str>, tags: &[String]) -> HostResult<String> {
        Ok(self.registry.create(name.map(str::to_string), tags).await)
    }

    /// `filterNotes`: handles for all non-deleted notes matching the
    /// filter parameters. No parameters means every non-deleted note.
    pub async fn filter_notes(
        &self,
        filters: Option<&FilterParameters>,
    ) -> HostResult<Vec<NoteHandle>> {
        let default_params = FilterParameters::default();
        let params = filters.unwrap_or(&default_params);

        // Validate the filter before taking the snapshot.
        let compiled = CompiledFilter::compile(params)?;
        let snapshot = self.registry.snapshot().await;
        Ok(snapshot
            .iter()
            .filter(|record| compiled.matches(record))
            .map(|record| record.handle())
            .collect())
    }

    /// `findNote`: the current handle for a note, or `None` when it does
    /// not exist or has been marked deleted. Fills in name and tags when
    /// the caller only has a UUID.
    pub async fn find_note(&self, note_info: &NoteInfo) -> HostResult<Option<NoteHandle>> {
        let key = NoteKey::from_info(note_info)?;
        self.registry.resolve(&key).await
    }

    // Host-side surface, not exposed to plugins. --------------------------

    /// Record that a local note completed persistence under a new UUID.
    pub async fn promote_note(&self, local_uuid: &str, persisted_uuid: &str) -> HostResult<()> {
        self.registry.promote(local_uuid, persisted_uuid).await
    }

    /// Mark a note deleted; later lookups return not-found.
    pub async fn mark_note_deleted(&self, uuid: &str) {
        self.registry.mark_deleted(uuid).await;
    }

    /// Assign or clear a note's group in the host taxonomy.
    pub async fn set_note_group(&self, uuid: &str, group: Option<&str>) -> HostResult<()> {
        self.registry.set_group(uuid, group.map(str::to_string)).await
    }

    /// Deliver the user's choice for a dialog presented earlier. Returns
    /// whether a pending dialog accepted it.
    pub async fn deliver_dialog_choice(&self, dialog_id: &str, choice: UserChoice) -> bool {
        self.dialogs.deliver(dialog_id, choice).await
    }
}

#[cfg(test)]
mod tests;

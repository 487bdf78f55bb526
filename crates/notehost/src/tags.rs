//! Tag name normalization and the shared-tag application policy.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::{HostError, HostResult};

/// Normalize arbitrary tag input to the canonical alphabet (lowercase
/// letters, digits, dashes).
///
/// Runs of disallowed characters collapse into a single dash; leading and
/// trailing dashes are stripped. Pure and idempotent:
/// `normalize_tag(normalize_tag(x)) == normalize_tag(x)`.
///
/// Input with no allowed characters normalizes to the empty string; callers
/// decide whether that is acceptable for their operation.
pub fn normalize_tag(input: &str) -> String {
    let mut tag = String::new();
    let mut previous_dash = false;

    for ch in input.trim().chars() {
        if ch.is_ascii_alphanumeric() {
            tag.push(ch.to_ascii_lowercase());
            previous_dash = false;
            continue;
        }
        if !tag.is_empty() && !previous_dash {
            tag.push('-');
            previous_dash = true;
        }
    }

    while tag.ends_with('-') {
        tag.pop();
    }

    tag
}

/// Boundary check for tag arguments arriving as JSON: anything but a string
/// is a type violation, never coerced.
pub fn require_tag_string(value: &serde_json::Value) -> HostResult<&str> {
    value.as_str().ok_or_else(|| {
        HostError::TypeViolation(format!(
            "tag name must be a string, got {}",
            json_type_name(value)
        ))
    })
}

pub(crate) fn json_type_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

/// Policy hook deciding whether a tag may be attached to a note.
///
/// A `false` answer is a normal-path refusal (surfaced to the plugin as a
/// `false` return from `addNoteTag`), not an error.
#[async_trait]
pub trait TagPolicy: Send + Sync {
    async fn can_apply(&self, note_uuid: &str, tag: &str) -> bool;
}

pub type SharedTagPolicyRef = Arc<dyn TagPolicy>;

/// Permits every tag application.
#[derive(Debug, Default)]
pub struct AllowAll;

#[async_trait]
impl TagPolicy for AllowAll {
    async fn can_apply(&self, _note_uuid: &str, _tag: &str) -> bool {
        true
    }
}

/// A decision recorded for a shared tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SharedTagDecision {
    Allow,
    Refuse,
}

/// Session-scoped policy for shared tags.
///
/// Shared tags are governed by cross-owner rules the host learns from its
/// persistence collaborator; the host records them here. Tags without a
/// recorded decision are always allowed.
#[derive(Debug, Default)]
pub struct SharedTagPolicy {
    decisions: RwLock<HashMap<String, SharedTagDecision>>,
}

impl SharedTagPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a decision for a shared tag. The key is normalized so lookups
    /// match whatever form the plugin supplied.
    pub async fn set_decision(&self, tag: &str, decision: SharedTagDecision) {
        let key = normalize_tag(tag);
        self.decisions.write().await.insert(key, decision);
    }

    pub async fn clear_decision(&self, tag: &str) {
        let key = normalize_tag(tag);
        self.decisions.write().await.remove(&key);
    }
}

#[async_trait]
impl TagPolicy for SharedTagPolicy {
    async fn can_apply(&self, note_uuid: &str, tag: &str) -> bool {
        match self.decisions.read().await.get(tag) {
            Some(SharedTagDecision::Refuse) => {
                tracing::info!("shared tag '{tag}' refused for note {note_uuid}");
                false
            }
            _ => true,
        }
    }
}

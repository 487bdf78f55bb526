//! The modal alert protocol: option payloads, the per-invocation resolution
//! state machine, and the broker that suspends an `alert` call until the
//! host delivers the user's choice.
//!
//! Rendering is an external collaborator's job. The core hands a
//! [`DialogRequest`] to the [`DialogPresenter`] and waits; the host reports
//! the user's terminal choice through [`DialogBroker::deliver`], keyed by
//! dialog id.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, Notify};

use crate::error::{HostError, HostResult};

/// Options for the `alert` operation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertOptions {
    /// Text shown before the main message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preface: Option<String>,
    /// Buttons offered at the bottom of the dialog, in order. Position in
    /// this sequence is an action's identity unless it carries a `value`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub actions: Vec<AlertAction>,
    /// Presentation of the rightmost ("DONE") button.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary_action: Option<PrimaryAction>,
    /// Whether a long message should be scrolled so its end is visible.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub scroll_to_end: bool,
}

/// One selectable button on an alert dialog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertAction {
    pub label: String,
    /// Material Icon name shown on the button.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    /// Returned instead of the action's index when the action is chosen.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

/// The primary ("DONE") button. When it defines a `value`, pressing it
/// returns that value instead of `-1`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrimaryAction {
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

/// What the user did with a presented dialog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum UserChoice {
    /// The dialog was closed without choosing any action.
    Dismissed,
    /// The primary ("DONE") button was pressed.
    Primary,
    /// The zero-based index of the chosen entry in `actions`.
    Action { index: usize },
}

/// Internal resolution result, exhaustively matched by the state machine
/// and collapsed to [`AlertValue`] only at the plugin boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AlertOutcome {
    Dismissed,
    DoneDefault,
    DoneWithValue(String),
    ActionIndex(usize),
    ActionValue(String),
}

impl AlertOutcome {
    /// Collapse to the `null | number | string` union plugins observe.
    pub fn into_value(self) -> AlertValue {
        match self {
            AlertOutcome::Dismissed => AlertValue::Null,
            AlertOutcome::DoneDefault => AlertValue::Number(-1),
            AlertOutcome::DoneWithValue(value) | AlertOutcome::ActionValue(value) => {
                AlertValue::Text(value)
            }
            AlertOutcome::ActionIndex(index) => AlertValue::Number(index as i64),
        }
    }
}

/// The alert result as plugins see it: `null`, a number, or a string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AlertValue {
    Null,
    Number(i64),
    Text(String),
}

enum ControllerState {
    Presented,
    Terminal,
}

/// Per-invocation state machine for one modal interaction.
///
/// `Presented -> {Dismissed, ActionChosen}`; exactly one terminal
/// transition is applied, and later inputs are rejected rather than
/// re-resolving the dialog.
pub struct AlertController {
    actions: Vec<AlertAction>,
    primary_value: Option<String>,
    state: ControllerState,
}

impl AlertController {
    pub fn new(options: &AlertOptions) -> Self {
        Self {
            actions: options.actions.clone(),
            primary_value: options
                .primary_action
                .as_ref()
                .and_then(|action| action.value.clone()),
            state: ControllerState::Presented,
        }
    }

    /// Apply the user's choice and return the outcome.
    ///
    /// The first call with a valid choice is the terminal transition. A
    /// choice referencing an action index the dialog never offered leaves
    /// the controller presented.
    pub fn resolve(&mut self, choice: UserChoice) -> HostResult<AlertOutcome> {
        if matches!(self.state, ControllerState::Terminal) {
            return Err(HostError::InvalidInput(
                "dialog has already been resolved".to_string(),
            ));
        }

        let outcome = match choice {
            UserChoice::Dismissed => AlertOutcome::Dismissed,
            UserChoice::Primary => match &self.primary_value {
                Some(value) => AlertOutcome::DoneWithValue(value.clone()),
                None => AlertOutcome::DoneDefault,
            },
            UserChoice::Action { index } => {
                let action = self.actions.get(index).ok_or_else(|| {
                    HostError::InvalidInput(format!(
                        "action index {index} is out of range for {} actions",
                        self.actions.len()
                    ))
                })?;
                match &action.value {
                    Some(value) => AlertOutcome::ActionValue(value.clone()),
                    None => AlertOutcome::ActionIndex(index),
                }
            }
        };

        self.state = ControllerState::Terminal;
        Ok(outcome)
    }
}

/// A dialog handed to the presenter collaborator.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DialogRequest {
    /// Correlates the presented dialog with the choice delivered back.
    pub dialog_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub options: AlertOptions,
}

/// Collaborator that renders dialogs to the user.
///
/// `present` returns once the dialog is on screen (or queued); the user's
/// choice arrives later via [`DialogBroker::deliver`].
#[async_trait]
pub trait DialogPresenter: Send + Sync {
    async fn present(&self, dialog: &DialogRequest) -> HostResult<()>;
}

pub type SharedDialogPresenter = Arc<dyn DialogPresenter>;

struct PendingDialog {
    choice: Option<UserChoice>,
    notify: Arc<Notify>,
}

/// Matches pending dialogs with the choices the host delivers for them.
///
/// Each `alert` invocation gets an independent slot, so concurrent alerts
/// never interfere. There is no timeout here; cancellation belongs to the
/// surrounding plugin runtime.
#[derive(Default)]
pub struct DialogBroker {
    pending: Mutex<HashMap<String, PendingDialog>>,
}

impl DialogBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a pending dialog before it is presented, so a choice
    /// delivered immediately is not lost.
    pub async fn open(&self, dialog_id: &str) {
        let mut pending = self.pending.lock().await;
        pending.insert(
            dialog_id.to_string(),
            PendingDialog {
                choice: None,
                notify: Arc::new(Notify::new()),
            },
        );
    }

    /// Drop a pending dialog that will never be presented.
    pub async fn cancel(&self, dialog_id: &str) {
        let mut pending = self.pending.lock().await;
        pending.remove(dialog_id);
    }

    /// Deliver the user's terminal choice for a pending dialog.
    ///
    /// Returns whether the choice was accepted. Unknown ids and repeated
    /// deliveries are ignored, which is what guarantees at most one
    /// terminal transition per invocation.
    pub async fn deliver(&self, dialog_id: &str, choice: UserChoice) -> bool {
        let mut pending = self.pending.lock().await;
        match pending.get_mut(dialog_id) {
            Some(slot) if slot.choice.is_none() => {
                slot.choice = Some(choice);
                slot.notify.notify_one();
                true
            }
            Some(_) => {
                tracing::warn!("duplicate choice delivered for dialog {dialog_id}");
                false
            }
            None => {
                tracing::warn!("choice delivered for unknown dialog {dialog_id}");
                false
            }
        }
    }

    /// Suspend until a choice is delivered for the dialog, then take it.
    pub async fn wait(&self, dialog_id: &str) -> HostResult<UserChoice> {
        let notify = {
            let pending = self.pending.lock().await;
            match pending.get(dialog_id) {
                Some(slot) => slot.notify.clone(),
                None => {
                    return Err(HostError::Internal(format!(
                        "dialog {dialog_id} is not pending"
                    )))
                }
            }
        };

        loop {
            {
                let mut pending = self.pending.lock().await;
                match pending.get_mut(dialog_id) {
                    Some(slot) => {
                        if let Some(choice) = slot.choice.take() {
                            pending.remove(dialog_id);
                            return Ok(choice);
                        }
                    }
                    None => {
                        return Err(HostError::Internal(format!(
                            "dialog {dialog_id} was cancelled"
                        )))
                    }
                }
            }
            notify.notified().await;
        }
    }
}

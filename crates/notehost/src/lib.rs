pub mod error;
pub mod config;

pub mod tags;
pub mod filter;
pub mod note;
pub mod identity;
pub mod media;
pub mod alert;
pub mod app;

pub use crate::alert::{
    AlertAction, AlertOptions, AlertValue, DialogPresenter, DialogRequest, PrimaryAction,
    SharedDialogPresenter, UserChoice,
};
pub use crate::app::App;
pub use crate::config::HostConfig;
pub use crate::error::{HostError, HostResult};
pub use crate::filter::FilterParameters;
pub use crate::media::{MediaPayload, MediaStore, SharedMediaStore};
pub use crate::note::{NoteHandle, NoteInfo};
pub use crate::tags::{normalize_tag, SharedTagPolicy, TagPolicy};

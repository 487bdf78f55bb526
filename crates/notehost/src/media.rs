//! Data-URL decoding and the media hosting collaborator seam.

use std::sync::Arc;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

use crate::error::{HostError, HostResult};

const DEFAULT_MIME_TYPE: &str = "text/plain;charset=US-ASCII";

/// A media payload decoded from a `data:` URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaPayload {
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl MediaPayload {
    /// Parse a data URL of the form `data:[mime][;base64],<body>`.
    ///
    /// Base64 bodies are decoded strictly; plain bodies are
    /// percent-decoded. Malformed input is rejected before any collaborator
    /// is contacted.
    pub fn from_data_url(data_url: &str) -> HostResult<Self> {
        let rest = data_url.strip_prefix("data:").ok_or_else(|| {
            HostError::InvalidInput("media payload is not a data URL".to_string())
        })?;
        let (meta, body) = rest.split_once(',').ok_or_else(|| {
            HostError::InvalidInput("data URL is missing the ',' separator".to_string())
        })?;

        let (mime, is_base64) = match meta.strip_suffix(";base64") {
            Some(prefix) => (prefix, true),
            None => (meta, false),
        };
        let mime_type = if mime.is_empty() {
            DEFAULT_MIME_TYPE.to_string()
        } else {
            mime.to_string()
        };

        let bytes = if is_base64 {
            BASE64.decode(body.trim()).map_err(|error| {
                HostError::InvalidInput(format!("invalid base64 media payload: {error}"))
            })?
        } else {
            urlencoding::decode_binary(body.as_bytes()).into_owned()
        };

        Ok(Self { mime_type, bytes })
    }
}

/// External media hosting collaborator.
///
/// Uploads go over the network and may take arbitrarily long. Failures
/// propagate to the caller unchanged; the core does not retry and does not
/// mutate the note when an upload fails.
#[async_trait]
pub trait MediaStore: Send + Sync {
    /// Upload a decoded payload for a note; returns the hosted media URL.
    async fn upload(&self, note_uuid: &str, media: MediaPayload) -> HostResult<String>;
}

pub type SharedMediaStore = Arc<dyn MediaStore>;

use serde::{Deserialize, Serialize};

/// Default ceiling for decoded media payloads (10 MiB).
pub const DEFAULT_MAX_MEDIA_BYTES: usize = 10 * 1024 * 1024;

/// Prefix carried by UUIDs minted client-side before persistence completes.
pub const DEFAULT_LOCAL_UUID_PREFIX: &str = "local-";

/// Host-side limits and identifiers for the plugin-facing core.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostConfig {
    /// Maximum decoded size of a media payload accepted by
    /// `attachNoteMedia`, in bytes.
    pub max_media_bytes: usize,
    /// Prefix identifying locally-minted note UUIDs.
    pub local_uuid_prefix: String,
}

impl HostConfig {
    pub fn default_new() -> Self {
        Self {
            max_media_bytes: DEFAULT_MAX_MEDIA_BYTES,
            local_uuid_prefix: DEFAULT_LOCAL_UUID_PREFIX.to_string(),
        }
    }
}

impl Default for HostConfig {
    fn default() -> Self {
        Self::default_new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_carry_local_prefix() {
        let config = HostConfig::default_new();
        assert_eq!(config.local_uuid_prefix, "local-");
        assert_eq!(config.max_media_bytes, DEFAULT_MAX_MEDIA_BYTES);
    }

    #[test]
    fn config_roundtrips_through_json() {
        let config = HostConfig {
            max_media_bytes: 1024,
            local_uuid_prefix: "draft-".to_string(),
        };
        let json = serde_json::to_string(&config).expect("serialize");
        assert!(json.contains("maxMediaBytes"));
        let parsed: HostConfig = serde_json::from_str(&json).expect("parse");
        assert_eq!(parsed.max_media_bytes, 1024);
        assert_eq!(parsed.local_uuid_prefix, "draft-");
    }
}

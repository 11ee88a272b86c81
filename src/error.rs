//! Error types for the relay core.
//!
//! Every failure here is scoped to a single message or command. The binary
//! wraps these in `anyhow` only at startup.

use std::path::PathBuf;
use thiserror::Error;

/// The channel allow-list could not be written to disk.
///
/// The in-memory registry has already been mutated when this is returned.
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("failed to serialize channel list: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("failed to write {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("channel store task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// A translation could not be obtained for a message.
#[derive(Debug, Error)]
pub enum TranslateError {
    #[error("translation request failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("translation API returned status {0}")]
    Status(u16),

    #[error("translation API error: {0}")]
    Upstream(String),

    #[error("empty translation received")]
    EmptyResult,

    #[error("failed to decode translation response: {0}")]
    Decode(String),
}

/// Decoding failures of a translation response body.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("malformed response body: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("{0}")]
    Upstream(String),

    #[error("translated text field is empty")]
    Empty,
}

impl From<DecodeError> for TranslateError {
    fn from(err: DecodeError) -> Self {
        match err {
            DecodeError::Malformed(e) => TranslateError::Decode(e.to_string()),
            DecodeError::Upstream(msg) => TranslateError::Upstream(msg),
            DecodeError::Empty => TranslateError::EmptyResult,
        }
    }
}

/// A chat-platform call (webhook listing, creation, execution or an
/// interaction reply) failed.
#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("platform request failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("platform API error ({status}): {body}")]
    Status { status: u16, body: String },

    #[error("invalid platform response: {0}")]
    Decode(String),
}

impl PlatformError {
    /// True when the platform reported the target resource as gone.
    pub fn is_not_found(&self) -> bool {
        matches!(self, PlatformError::Status { status: 404, .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_error_maps_to_translate_error() {
        assert!(matches!(
            TranslateError::from(DecodeError::Empty),
            TranslateError::EmptyResult
        ));
        assert!(matches!(
            TranslateError::from(DecodeError::Upstream("quota exceeded".to_string())),
            TranslateError::Upstream(msg) if msg == "quota exceeded"
        ));

        let malformed = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        assert!(matches!(
            TranslateError::from(DecodeError::Malformed(malformed)),
            TranslateError::Decode(_)
        ));
    }

    #[test]
    fn test_status_error_display_includes_code() {
        assert_eq!(
            TranslateError::Status(500).to_string(),
            "translation API returned status 500"
        );
    }

    #[test]
    fn test_platform_not_found() {
        let gone = PlatformError::Status {
            status: 404,
            body: "Unknown Webhook".to_string(),
        };
        let forbidden = PlatformError::Status {
            status: 403,
            body: "Missing Permissions".to_string(),
        };
        assert!(gone.is_not_found());
        assert!(!forbidden.is_not_found());
        assert!(!PlatformError::Decode("bad".to_string()).is_not_found());
    }

    #[test]
    fn test_persist_error_display_includes_path() {
        let err = PersistError::Io {
            path: PathBuf::from("/tmp/channels.json"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        let message = err.to_string();
        assert!(message.contains("/tmp/channels.json"));
        assert!(message.contains("denied"));
    }
}

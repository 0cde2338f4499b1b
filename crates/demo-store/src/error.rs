use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("cache holds {cached} of {requested} demos for {task}/{fingerprint}")]
    CacheMiss {
        task: String,
        fingerprint: String,
        requested: usize,
        cached: usize,
    },

    #[error("requested {requested} demos, but only {available} found; try requesting a smaller number")]
    TooManyDemosRequested { requested: usize, available: usize },

    #[error("demo '{id}' not found under {task}/{fingerprint}")]
    DemoNotFound {
        task: String,
        fingerprint: String,
        id: String,
    },

    #[error("remote unavailable: {reason}")]
    RemoteUnavailable { reason: String },

    #[error("upload rejected for demo '{id}': {reason}")]
    UploadRejected { id: String, reason: String },

    #[error("invalid demo file {}: {reason}", path.display())]
    InvalidDemo { path: PathBuf, reason: String },

    #[error("{0}")]
    Config(String),

    #[error("{context}: {source}")]
    Codec {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

impl StoreError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn remote(reason: impl Into<String>) -> Self {
        Self::RemoteUnavailable {
            reason: reason.into(),
        }
    }

    pub fn invalid_demo(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::InvalidDemo {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn codec(context: impl Into<String>, source: serde_json::Error) -> Self {
        Self::Codec {
            context: context.into(),
            source,
        }
    }

    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn too_many_demos_message_names_both_counts() {
        let e = StoreError::TooManyDemosRequested {
            requested: 6,
            available: 5,
        };
        let msg = e.to_string();
        assert!(msg.contains("requested 6 demos"));
        assert!(msg.contains("only 5 found"));
    }

    #[test]
    fn io_error_keeps_context_and_source() {
        let src = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let e = StoreError::io("failed to read /tmp/x", src);
        assert!(e.to_string().starts_with("failed to read /tmp/x"));
        assert!(std::error::Error::source(&e).is_some());
    }

    #[test]
    fn cache_miss_is_distinct_from_not_found() {
        let miss = StoreError::CacheMiss {
            task: "move_plate".into(),
            fingerprint: "abc".into(),
            requested: 3,
            cached: 1,
        };
        assert!(matches!(miss, StoreError::CacheMiss { cached: 1, .. }));
    }
}

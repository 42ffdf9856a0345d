use thiserror::Error;

/// Unified result type for the slot engine.
pub type Result<T> = std::result::Result<T, SlotError>;

/// Errors surfaced by the slot engine.
///
/// Most of the engine degrades instead of failing, so these mostly show up
/// at the edges: parsing configuration and talking to collaborators.
#[derive(Debug, Error)]
pub enum SlotError {
    #[error("unknown breakpoint `{0}`")]
    UnknownBreakpoint(String),
    #[error("unknown size dimension `{0}`")]
    UnknownDimension(String),
    #[error("invalid media query `{0}`")]
    InvalidMediaQuery(String),
    #[error("invalid props JSON: {0}")]
    InvalidProps(String),
    #[error("storage error: {0}")]
    Store(#[from] StoreError),
    #[error("publish error: {0}")]
    Publish(#[from] PublishError),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Failures reported by a key-value persistence backend.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("storage unavailable")]
    Unavailable,
    #[error("storage quota exceeded")]
    QuotaExceeded,
    #[error("storage backend failure: {0}")]
    Backend(String),
}

/// Why a publish request was refused before reaching the network.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishBlocked {
    NotEditable,
    NotDirty,
    AlreadySaving,
    InvalidProps,
    NotActive,
}

impl std::fmt::Display for PublishBlocked {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let reason = match self {
            Self::NotEditable => "slot is not editable",
            Self::NotDirty => "draft has no changes",
            Self::AlreadySaving => "a publish is already in flight",
            Self::InvalidProps => "props JSON is invalid",
            Self::NotActive => "slot is not the active editable target",
        };
        f.write_str(reason)
    }
}

/// Errors raised while publishing a draft to the remote store.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PublishError {
    #[error("publish blocked: {0}")]
    Blocked(PublishBlocked),
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("remote responded with HTTP {status}")]
    Status { status: u16 },
    #[error("remote rejected draft: {0}")]
    Remote(String),
    #[error("malformed remote response: {0}")]
    Decode(String),
}

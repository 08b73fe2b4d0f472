use thiserror::Error;

/// Errors produced by keystore backends.
///
/// Every variant is a stable, matchable kind. Display text is for humans only.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum KeystoreError {
    /// Requested object (or master key file) does not exist.
    #[error("entry not found: {name}")]
    NotFound { name: String },
    /// An object with this name is already present.
    #[error("entry already exists: {name}")]
    AlreadyExists { name: String },
    /// AEAD verification failed: corrupted, truncated, relocated or tampered ciphertext.
    #[error("ciphertext is not authentic")]
    NotAuthentic,
    /// Master key length does not match the cipher's key size.
    #[error("invalid master key length: expected {expected} bytes, got {actual}")]
    InvalidKeyLength { expected: usize, actual: usize },
    /// Cipher identifier is not registered.
    #[error("unknown cipher: {cipher}")]
    UnknownCipher { cipher: String },
    /// Caller supplied an unusable argument (empty or reserved name, path traversal).
    #[error("invalid argument: {reason}")]
    InvalidArgument { reason: String },
    /// Underlying filesystem failure.
    #[error("i/o failure: {reason}")]
    Io { reason: String },
    /// The call's context was canceled.
    #[error("operation canceled")]
    Canceled,
    /// The call's context deadline passed.
    #[error("deadline exceeded")]
    DeadlineExceeded,
    /// The keystore was closed.
    #[error("keystore is closed")]
    Closed,
}

impl KeystoreError {
    pub fn invalid_argument(reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            reason: reason.into(),
        }
    }

    pub fn io<E: ToString>(err: E) -> Self {
        Self::Io {
            reason: err.to_string(),
        }
    }

    /// True for the context-driven kinds, which callers may retry with a fresh context.
    pub fn is_context_error(&self) -> bool {
        matches!(self, Self::Canceled | Self::DeadlineExceeded)
    }
}

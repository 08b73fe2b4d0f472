use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

use crate::error::KeystoreError;

/// Cancellation and deadline handle threaded through every keystore call.
///
/// Local backends check it at I/O boundaries; remote backends can also race
/// their requests against [`Context::cancelled`].
#[derive(Debug, Clone, Default)]
pub struct Context {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl Context {
    /// A context that is never canceled and has no deadline.
    pub fn background() -> Self {
        Self::default()
    }

    /// Derive a child that is canceled with its parent or on its own.
    pub fn with_cancel(&self) -> Self {
        Self {
            token: self.token.child_token(),
            deadline: self.deadline,
        }
    }

    /// Derive a child whose deadline is the earlier of the parent's and `deadline`.
    pub fn with_deadline(&self, deadline: Instant) -> Self {
        let deadline = match self.deadline {
            Some(current) if current < deadline => current,
            _ => deadline,
        };
        Self {
            token: self.token.child_token(),
            deadline: Some(deadline),
        }
    }

    pub fn with_timeout(&self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Cancel this context and every context derived from it.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once the context is canceled.
    pub async fn cancelled(&self) {
        self.token.cancelled().await
    }

    /// Fail fast if the context is canceled or past its deadline.
    pub fn check(&self) -> Result<(), KeystoreError> {
        if self.token.is_cancelled() {
            return Err(KeystoreError::Canceled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Err(KeystoreError::DeadlineExceeded),
            _ => Ok(()),
        }
    }
}

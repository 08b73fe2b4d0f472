use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

use crate::{context::Context, error::KeystoreError};

mod list;
mod memory;

pub use list::{paginate, Cursor};
pub use memory::InMemoryKeystore;

/// Result of a lightweight liveness probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Status {
    /// Time the probe took end to end.
    pub latency: Duration,
}

/// Contract every keystore backend implements (encrypted filesystem, remote KMS, HSM).
///
/// All operations take a [`Context`] so callers can bound or cancel them
/// regardless of whether the backend is local or remote.
#[async_trait]
pub trait Keystore: Send + Sync {
    /// Human-readable backend description for diagnostics.
    fn describe(&self) -> String;

    /// Check that the backend is reachable without enumerating objects.
    async fn status(&self, ctx: &Context) -> Result<Status, KeystoreError>;

    /// Store a new object. Fails with `AlreadyExists` instead of overwriting.
    async fn create(&self, ctx: &Context, name: &str, value: &[u8])
        -> Result<(), KeystoreError>;

    /// Retrieve the plaintext of an object.
    async fn get(&self, ctx: &Context, name: &str) -> Result<Vec<u8>, KeystoreError>;

    /// Remove an object. Removing a missing object is `NotFound`.
    async fn delete(&self, ctx: &Context, name: &str) -> Result<(), KeystoreError>;

    /// List object names starting with `prefix` in lexicographic order.
    ///
    /// `cursor` resumes a previous listing; `limit == 0` returns everything.
    /// A cursor is returned only when more names remain.
    async fn list(
        &self,
        ctx: &Context,
        prefix: &str,
        cursor: Option<&Cursor>,
        limit: usize,
    ) -> Result<(Vec<String>, Option<Cursor>), KeystoreError>;

    /// Release resources. Calling it more than once is fine.
    async fn close(&self) -> Result<(), KeystoreError>;
}

//! Backend-neutral keystore contract: the `Keystore` trait every backend
//! implements, its error taxonomy, and the per-call `Context`.
//! Concrete backends live in their own crates; this one stays dependency-light.

pub mod context;
pub mod error;
pub mod keystore;

pub use context::Context;
pub use error::KeystoreError;
pub use keystore::{paginate, Cursor, InMemoryKeystore, Keystore, Status};

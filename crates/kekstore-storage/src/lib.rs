//! Encrypted filesystem keystore backend.
//! Objects are sealed with AES-256-GCM or ChaCha20-Poly1305 under a raw master
//! key file and stored one file per object in a plain directory.

pub mod cipher;
pub mod config;
pub mod dir_store;
pub mod envelope;
pub mod keystore;
pub mod master_key;

pub use cipher::CipherSuite;
pub use config::EncryptedFsConfig;
pub use keystore::EncryptedFsKeystore;
pub use master_key::{generate_master_key, MasterKey};

//! Per-object envelope format: `nonce || ciphertext || tag`, with the object
//! name as associated data. No header or version byte precedes the nonce.

use kekstore_core::KeystoreError;
use rand::{rngs::OsRng, RngCore};

use crate::master_key::MasterKey;

/// Seal `plaintext` under `key`, binding it to `context`.
///
/// A fresh random nonce is drawn for every call, so sealing the same input
/// twice yields different blobs.
pub fn seal(key: &MasterKey, context: &str, plaintext: &[u8]) -> Result<Vec<u8>, KeystoreError> {
    let suite = key.cipher();
    let mut nonce = vec![0u8; suite.nonce_len()];
    OsRng.fill_bytes(&mut nonce);

    let sealed = suite.seal(key.expose(), &nonce, context.as_bytes(), plaintext)?;
    let mut blob = Vec::with_capacity(nonce.len() + sealed.len());
    blob.extend_from_slice(&nonce);
    blob.extend_from_slice(&sealed);
    Ok(blob)
}

/// Authenticate and decrypt a blob produced by [`seal`] with the same context.
///
/// Truncation, corruption and a context mismatch are all `NotAuthentic`.
pub fn open(key: &MasterKey, context: &str, blob: &[u8]) -> Result<Vec<u8>, KeystoreError> {
    let suite = key.cipher();
    if blob.len() < suite.nonce_len() + suite.tag_len() {
        return Err(KeystoreError::NotAuthentic);
    }
    let (nonce, sealed) = blob.split_at(suite.nonce_len());
    suite.open(key.expose(), nonce, context.as_bytes(), sealed)
}

use std::path::PathBuf;

use kekstore_core::{Context, KeystoreError};
use serde::{Deserialize, Serialize};

use crate::{cipher::AES256, keystore::EncryptedFsKeystore};

/// Settings for an encrypted filesystem keystore.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedFsConfig {
    /// Directory holding one encrypted file per object.
    pub path: PathBuf,
    /// Raw master key file.
    pub master_key_path: PathBuf,
    /// Cipher identifier, `AES256` unless configured.
    #[serde(default = "default_cipher")]
    pub master_key_cipher: String,
}

fn default_cipher() -> String {
    AES256.to_string()
}

impl EncryptedFsConfig {
    pub fn new(path: impl Into<PathBuf>, master_key_path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            master_key_path: master_key_path.into(),
            master_key_cipher: default_cipher(),
        }
    }

    /// Open the keystore described by this config.
    pub async fn connect(&self, ctx: &Context) -> Result<EncryptedFsKeystore, KeystoreError> {
        ctx.check()?;
        EncryptedFsKeystore::open(
            &self.master_key_path,
            &self.master_key_cipher,
            self.path.clone(),
        )
    }
}

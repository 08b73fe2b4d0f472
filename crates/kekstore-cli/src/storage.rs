use std::fs;

use color_eyre::{eyre::WrapErr, Result};
use kekstore_core::Context;
use kekstore_storage::{generate_master_key, EncryptedFsConfig, EncryptedFsKeystore};
use tracing::{debug, info};

use crate::config::Config;

/// Open the configured encrypted keystore.
pub async fn open_keystore(config: &Config, ctx: &Context) -> Result<EncryptedFsKeystore> {
    let settings = config.keystore()?;
    debug!(root = ?settings.path, "opening encrypted keystore");
    settings
        .connect(ctx)
        .await
        .wrap_err_with(|| format!("failed to open keystore at {}", settings.path.display()))
}

/// Create the keystore directory and a fresh master key for it.
pub fn init_keystore(settings: &EncryptedFsConfig, cipher: Option<&str>) -> Result<()> {
    let cipher = cipher.unwrap_or(settings.master_key_cipher.as_str());
    fs::create_dir_all(&settings.path)?;
    if let Some(parent) = settings.master_key_path.parent() {
        fs::create_dir_all(parent)?;
    }
    generate_master_key(&settings.master_key_path, cipher).wrap_err_with(|| {
        format!(
            "failed to generate master key at {}",
            settings.master_key_path.display()
        )
    })?;
    info!(path = ?settings.master_key_path, %cipher, "generated master key");
    Ok(())
}

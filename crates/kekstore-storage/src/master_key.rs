use std::{
    fmt,
    fs::{self, OpenOptions},
    io::{ErrorKind, Write},
    path::Path,
};

use kekstore_core::KeystoreError;
use rand::{rngs::OsRng, RngCore};
use zeroize::Zeroizing;

use crate::cipher::CipherSuite;

/// Long-lived key that seals every object of one keystore.
///
/// The bytes are wiped from memory when the last handle is dropped.
pub struct MasterKey {
    cipher: CipherSuite,
    bytes: Zeroizing<Vec<u8>>,
}

impl MasterKey {
    /// Read the raw key file at `path` for the cipher named `cipher`.
    ///
    /// The file content is the key verbatim; its length must equal the
    /// cipher's key size exactly.
    pub fn load(path: impl AsRef<Path>, cipher: &str) -> Result<Self, KeystoreError> {
        let path = path.as_ref();
        let suite = CipherSuite::resolve(cipher)?;
        let bytes = Zeroizing::new(fs::read(path).map_err(|err| match err.kind() {
            ErrorKind::NotFound | ErrorKind::PermissionDenied => KeystoreError::NotFound {
                name: path.display().to_string(),
            },
            _ => KeystoreError::io(err),
        })?);
        Self::from_bytes(suite, bytes)
    }

    pub fn from_bytes(
        cipher: CipherSuite,
        bytes: impl Into<Zeroizing<Vec<u8>>>,
    ) -> Result<Self, KeystoreError> {
        let bytes = bytes.into();
        if bytes.len() != cipher.key_len() {
            return Err(KeystoreError::InvalidKeyLength {
                expected: cipher.key_len(),
                actual: bytes.len(),
            });
        }
        Ok(Self { cipher, bytes })
    }

    pub fn cipher(&self) -> CipherSuite {
        self.cipher
    }

    pub(crate) fn expose(&self) -> &[u8] {
        &self.bytes
    }
}

impl fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MasterKey")
            .field("cipher", &self.cipher)
            .field("bytes", &"<redacted>")
            .finish()
    }
}

/// Write a fresh random master key for `cipher` to `path`.
/// Never overwrites: an existing file is `AlreadyExists`.
pub fn generate_master_key(path: impl AsRef<Path>, cipher: &str) -> Result<(), KeystoreError> {
    let path = path.as_ref();
    let suite = CipherSuite::resolve(cipher)?;

    let mut bytes = Zeroizing::new(vec![0u8; suite.key_len()]);
    OsRng.fill_bytes(&mut bytes);

    let mut options = OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options.open(path).map_err(|err| match err.kind() {
        ErrorKind::AlreadyExists => KeystoreError::AlreadyExists {
            name: path.display().to_string(),
        },
        _ => KeystoreError::io(err),
    })?;
    file.write_all(&bytes).map_err(KeystoreError::io)?;
    file.sync_all().map_err(KeystoreError::io)?;
    Ok(())
}

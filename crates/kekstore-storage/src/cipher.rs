use std::{fmt, str::FromStr};

use aes_gcm::{
    aead::{generic_array::GenericArray, Aead, KeyInit, Payload},
    Aes256Gcm,
};
use chacha20poly1305::ChaCha20Poly1305;
use kekstore_core::KeystoreError;

/// Identifier selecting AES-256-GCM.
pub const AES256: &str = "AES256";
/// Identifier selecting ChaCha20-Poly1305.
pub const CHACHA20: &str = "ChaCha20";

const KEY_LEN: usize = 32;
const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;

/// Registered AEAD constructions, selected by exact, case-sensitive identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CipherSuite {
    Aes256Gcm,
    ChaCha20Poly1305,
}

impl CipherSuite {
    pub const ALL: [CipherSuite; 2] = [CipherSuite::Aes256Gcm, CipherSuite::ChaCha20Poly1305];

    /// Look up a suite by identifier. Unknown identifiers never fall back to a default.
    pub fn resolve(identifier: &str) -> Result<Self, KeystoreError> {
        Self::ALL
            .into_iter()
            .find(|suite| suite.identifier() == identifier)
            .ok_or_else(|| KeystoreError::UnknownCipher {
                cipher: identifier.to_string(),
            })
    }

    pub fn identifier(self) -> &'static str {
        match self {
            CipherSuite::Aes256Gcm => AES256,
            CipherSuite::ChaCha20Poly1305 => CHACHA20,
        }
    }

    pub fn key_len(self) -> usize {
        KEY_LEN
    }

    pub fn nonce_len(self) -> usize {
        NONCE_LEN
    }

    pub fn tag_len(self) -> usize {
        TAG_LEN
    }

    /// Encrypt and authenticate `plaintext`, authenticating `aad` alongside it.
    /// Output is ciphertext followed by the tag.
    pub fn seal(
        self,
        key: &[u8],
        nonce: &[u8],
        aad: &[u8],
        plaintext: &[u8],
    ) -> Result<Vec<u8>, KeystoreError> {
        self.check_inputs(key, nonce)?;
        match self {
            CipherSuite::Aes256Gcm => seal_with::<Aes256Gcm>(key, nonce, aad, plaintext),
            CipherSuite::ChaCha20Poly1305 => {
                seal_with::<ChaCha20Poly1305>(key, nonce, aad, plaintext)
            }
        }
    }

    /// Verify and decrypt. Any verification failure is `NotAuthentic`.
    pub fn open(
        self,
        key: &[u8],
        nonce: &[u8],
        aad: &[u8],
        ciphertext: &[u8],
    ) -> Result<Vec<u8>, KeystoreError> {
        self.check_inputs(key, nonce)
            .map_err(|_| KeystoreError::NotAuthentic)?;
        match self {
            CipherSuite::Aes256Gcm => open_with::<Aes256Gcm>(key, nonce, aad, ciphertext),
            CipherSuite::ChaCha20Poly1305 => {
                open_with::<ChaCha20Poly1305>(key, nonce, aad, ciphertext)
            }
        }
    }

    fn check_inputs(self, key: &[u8], nonce: &[u8]) -> Result<(), KeystoreError> {
        if key.len() != self.key_len() {
            return Err(KeystoreError::InvalidKeyLength {
                expected: self.key_len(),
                actual: key.len(),
            });
        }
        if nonce.len() != self.nonce_len() {
            return Err(KeystoreError::invalid_argument(format!(
                "nonce must be {} bytes, got {}",
                self.nonce_len(),
                nonce.len()
            )));
        }
        Ok(())
    }
}

impl fmt::Display for CipherSuite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.identifier())
    }
}

impl FromStr for CipherSuite {
    type Err = KeystoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::resolve(s)
    }
}

// Key and nonce lengths are checked by the caller; `from_slice` would panic otherwise.
fn seal_with<C: Aead + KeyInit>(
    key: &[u8],
    nonce: &[u8],
    aad: &[u8],
    plaintext: &[u8],
) -> Result<Vec<u8>, KeystoreError> {
    let cipher = C::new_from_slice(key).map_err(|_| KeystoreError::InvalidKeyLength {
        expected: KEY_LEN,
        actual: key.len(),
    })?;
    cipher
        .encrypt(
            GenericArray::from_slice(nonce),
            Payload {
                msg: plaintext,
                aad,
            },
        )
        .map_err(|_| KeystoreError::invalid_argument("plaintext too large to seal"))
}

fn open_with<C: Aead + KeyInit>(
    key: &[u8],
    nonce: &[u8],
    aad: &[u8],
    ciphertext: &[u8],
) -> Result<Vec<u8>, KeystoreError> {
    let cipher = C::new_from_slice(key).map_err(|_| KeystoreError::NotAuthentic)?;
    cipher
        .decrypt(
            GenericArray::from_slice(nonce),
            Payload {
                msg: ciphertext,
                aad,
            },
        )
        .map_err(|_| KeystoreError::NotAuthentic)
}

use std::{
    fmt, fs,
    path::{Path, PathBuf},
    sync::{Arc, PoisonError, RwLock},
    time::Instant,
};

use async_trait::async_trait;
use kekstore_core::{Context, Cursor, Keystore, KeystoreError, Status};
use tracing::{debug, instrument};

use crate::{
    dir_store::{DirStore, WriteMode},
    envelope,
    master_key::MasterKey,
};

/// Keystore that keeps every object as an encrypted file in one directory.
///
/// Objects are sealed under the master key with their own name as associated
/// data, so a blob copied or renamed to another name fails to open.
pub struct EncryptedFsKeystore {
    objects: DirStore,
    // `None` once closed. In-flight calls keep their own `Arc`; the key bytes
    // are zeroed when the last one is dropped.
    master_key: RwLock<Option<Arc<MasterKey>>>,
}

impl EncryptedFsKeystore {
    /// Load the master key and attach to an existing directory.
    /// Either step failing aborts construction.
    pub fn open(
        master_key_path: impl AsRef<Path>,
        cipher: &str,
        dir: impl Into<PathBuf>,
    ) -> Result<Self, KeystoreError> {
        let master_key_path = master_key_path.as_ref();
        let dir = dir.into();

        let master_key = MasterKey::load(master_key_path, cipher)?;
        let objects = DirStore::open(&dir, reserved_name(master_key_path, &dir))?;
        debug!(
            root = %dir.display(),
            cipher = %master_key.cipher(),
            "opened encrypted filesystem keystore"
        );

        Ok(Self {
            objects,
            master_key: RwLock::new(Some(Arc::new(master_key))),
        })
    }

    pub fn root(&self) -> &Path {
        self.objects.root()
    }

    fn master_key(&self) -> Result<Arc<MasterKey>, KeystoreError> {
        self.master_key
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or(KeystoreError::Closed)
    }
}

/// The master key file's name is reserved only when its directory entry sits
/// inside the keystore directory. Only the parent is resolved: the entry may be
/// a symlink to a key stored elsewhere and still has to be protected.
fn reserved_name(master_key_path: &Path, dir: &Path) -> Option<String> {
    let parent = match master_key_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    if fs::canonicalize(parent).ok()? != fs::canonicalize(dir).ok()? {
        return None;
    }
    master_key_path.file_name()?.to_str().map(str::to_string)
}

impl fmt::Display for EncryptedFsKeystore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Encrypted Filesystem: {}", self.root().display())
    }
}

impl fmt::Debug for EncryptedFsKeystore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncryptedFsKeystore")
            .field("root", &self.root())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Keystore for EncryptedFsKeystore {
    fn describe(&self) -> String {
        self.to_string()
    }

    #[instrument(skip_all)]
    async fn status(&self, ctx: &Context) -> Result<Status, KeystoreError> {
        ctx.check()?;
        self.master_key()?;
        let start = Instant::now();
        self.objects.probe()?;
        Ok(Status {
            latency: start.elapsed(),
        })
    }

    #[instrument(skip_all, fields(name = %name))]
    async fn create(&self, ctx: &Context, name: &str, value: &[u8]) -> Result<(), KeystoreError> {
        ctx.check()?;
        self.objects.validate_name(name)?;
        let blob = envelope::seal(&*self.master_key()?, name, value)?;
        ctx.check()?;
        self.objects.write(name, &blob, WriteMode::FailIfExists)
    }

    #[instrument(skip_all, fields(name = %name))]
    async fn get(&self, ctx: &Context, name: &str) -> Result<Vec<u8>, KeystoreError> {
        ctx.check()?;
        let key = self.master_key()?;
        let blob = self.objects.read(name)?;
        ctx.check()?;
        envelope::open(&key, name, &blob)
    }

    #[instrument(skip_all, fields(name = %name))]
    async fn delete(&self, ctx: &Context, name: &str) -> Result<(), KeystoreError> {
        ctx.check()?;
        self.master_key()?;
        self.objects.remove(name)
    }

    #[instrument(skip_all, fields(prefix = %prefix, limit = limit))]
    async fn list(
        &self,
        ctx: &Context,
        prefix: &str,
        cursor: Option<&Cursor>,
        limit: usize,
    ) -> Result<(Vec<String>, Option<Cursor>), KeystoreError> {
        ctx.check()?;
        self.master_key()?;
        self.objects.enumerate(ctx, prefix, cursor, limit)
    }

    async fn close(&self) -> Result<(), KeystoreError> {
        let released = self
            .master_key
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if released.is_some() {
            debug!(root = %self.root().display(), "closed encrypted filesystem keystore");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use aes_gcm::{
        aead::{Aead, KeyInit, Payload},
        Aes256Gcm, Nonce,
    };

    use super::*;
    use crate::cipher::AES256;

    const MASTER_KEY: &[u8] = b"passwordpasswordpasswordpassword";
    const KEK_NAME: &str = "test-kek";
    const KEK_PLAINTEXT: &[u8] = b"my-plaintext-kek";

    fn open_store(dir: &Path) -> EncryptedFsKeystore {
        let key_path = dir.join("master-key");
        fs::write(&key_path, MASTER_KEY).expect("write master key");
        EncryptedFsKeystore::open(&key_path, AES256, dir).expect("open keystore")
    }

    #[tokio::test]
    async fn create_list_get_delete() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = open_store(dir.path());
        let ctx = Context::background();

        assert!(store.describe().contains("Encrypted Filesystem"));
        store.status(&ctx).await.expect("status");

        let (names, next) = store.list(&ctx, "test", None, 10).await.expect("list");
        assert!(names.is_empty());
        assert!(next.is_none());

        store
            .create(&ctx, KEK_NAME, KEK_PLAINTEXT)
            .await
            .expect("create");

        let (names, next) = store.list(&ctx, "test", None, 10).await.expect("list");
        assert_eq!(names, vec![KEK_NAME.to_string()]);
        assert!(next.is_none());

        let plaintext = store.get(&ctx, KEK_NAME).await.expect("get");
        assert_eq!(plaintext, KEK_PLAINTEXT);

        store.delete(&ctx, KEK_NAME).await.expect("delete");
        let err = store.get(&ctx, KEK_NAME).await.expect_err("deleted");
        assert!(matches!(err, KeystoreError::NotFound { .. }));
        let (names, _) = store.list(&ctx, "test", None, 10).await.expect("list");
        assert!(names.is_empty());

        store.close().await.expect("close");
    }

    #[tokio::test]
    async fn file_on_disk_is_not_plaintext() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = open_store(dir.path());
        let ctx = Context::background();
        store
            .create(&ctx, KEK_NAME, KEK_PLAINTEXT)
            .await
            .expect("create");

        let on_disk = fs::read(dir.path().join(KEK_NAME)).expect("read kek file");
        assert_ne!(on_disk, KEK_PLAINTEXT);
        assert!(!on_disk
            .windows(KEK_PLAINTEXT.len())
            .any(|window| window == KEK_PLAINTEXT));
    }

    #[tokio::test]
    async fn reads_nonce_prefixed_blob_written_outside_the_store() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = open_store(dir.path());

        let nonce = *b"\x01\x02\x03\x04\x05\x06\x07\x08\x09\x0a\x0b\x0c";
        let sealed = Aes256Gcm::new_from_slice(MASTER_KEY)
            .expect("cipher")
            .encrypt(
                Nonce::from_slice(&nonce),
                Payload {
                    msg: KEK_PLAINTEXT,
                    aad: KEK_NAME.as_bytes(),
                },
            )
            .expect("encrypt");
        let mut blob = nonce.to_vec();
        blob.extend_from_slice(&sealed);
        fs::write(dir.path().join(KEK_NAME), &blob).expect("write blob");

        let plaintext = store
            .get(&Context::background(), KEK_NAME)
            .await
            .expect("get");
        assert_eq!(plaintext, KEK_PLAINTEXT);
    }

    #[tokio::test]
    async fn copied_blob_fails_authentication() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = open_store(dir.path());
        let ctx = Context::background();
        store
            .create(&ctx, KEK_NAME, KEK_PLAINTEXT)
            .await
            .expect("create");

        let blob = fs::read(dir.path().join(KEK_NAME)).expect("read kek file");
        fs::write(dir.path().join("other-kek"), blob).expect("copy kek file");

        let err = store.get(&ctx, "other-kek").await.expect_err("relocated");
        assert_eq!(err, KeystoreError::NotAuthentic);
    }

    #[tokio::test]
    async fn duplicate_create_keeps_original() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = open_store(dir.path());
        let ctx = Context::background();
        store.create(&ctx, KEK_NAME, b"first").await.expect("create");

        let err = store
            .create(&ctx, KEK_NAME, b"second")
            .await
            .expect_err("duplicate");
        assert!(matches!(err, KeystoreError::AlreadyExists { .. }));
        assert_eq!(store.get(&ctx, KEK_NAME).await.expect("get"), b"first");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_creates_have_one_winner() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = Arc::new(open_store(dir.path()));

        let mut handles = Vec::new();
        for i in 0..16u8 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store
                    .create(&Context::background(), "contended", &[i])
                    .await
            }));
        }

        let mut winners = 0;
        for handle in handles {
            match handle.await.expect("join") {
                Ok(()) => winners += 1,
                Err(err) => assert!(matches!(err, KeystoreError::AlreadyExists { .. })),
            }
        }
        assert_eq!(winners, 1);

        let (names, _) = store
            .list(&Context::background(), "", None, 0)
            .await
            .expect("list");
        assert_eq!(names, vec!["contended".to_string()]);
    }

    #[tokio::test]
    async fn rejects_empty_and_reserved_names() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = open_store(dir.path());
        let ctx = Context::background();

        for name in ["", "master-key", "../outside"] {
            let err = store.create(&ctx, name, b"x").await.expect_err("invalid");
            assert!(matches!(err, KeystoreError::InvalidArgument { .. }));
        }
        let (names, _) = store.list(&ctx, "", None, 0).await.expect("list");
        assert!(names.is_empty(), "master key must not be listed");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn symlinked_master_key_in_directory_stays_reserved() {
        let key_dir = tempfile::tempdir().expect("tempdir");
        let data_dir = tempfile::tempdir().expect("tempdir");
        let real_key = key_dir.path().join("real-key");
        fs::write(&real_key, MASTER_KEY).expect("write master key");
        let link = data_dir.path().join("master-key");
        std::os::unix::fs::symlink(&real_key, &link).expect("symlink key");

        let store = EncryptedFsKeystore::open(&link, AES256, data_dir.path()).expect("open");
        let ctx = Context::background();

        let err = store.delete(&ctx, "master-key").await.expect_err("delete");
        assert!(matches!(err, KeystoreError::InvalidArgument { .. }));
        let err = store.get(&ctx, "master-key").await.expect_err("get");
        assert!(matches!(err, KeystoreError::InvalidArgument { .. }));
        let err = store
            .create(&ctx, "master-key", b"x")
            .await
            .expect_err("create");
        assert!(matches!(err, KeystoreError::InvalidArgument { .. }));

        assert!(fs::symlink_metadata(&link).is_ok(), "link must survive");
        let (names, _) = store.list(&ctx, "", None, 0).await.expect("list");
        assert!(names.is_empty());
        drop(store);
        EncryptedFsKeystore::open(&link, AES256, data_dir.path()).expect("reopen");
    }

    #[test]
    fn bare_master_key_name_resolves_against_working_dir() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(dir.path().join("master-key"), MASTER_KEY).expect("write master key");
        assert_eq!(
            reserved_name(&dir.path().join("master-key"), dir.path()),
            Some("master-key".to_string())
        );
        assert_eq!(reserved_name(Path::new("master-key"), dir.path()), None);
    }

    #[tokio::test]
    async fn master_key_outside_directory_reserves_nothing() {
        let key_dir = tempfile::tempdir().expect("tempdir");
        let data_dir = tempfile::tempdir().expect("tempdir");
        let key_path = key_dir.path().join("master-key");
        fs::write(&key_path, MASTER_KEY).expect("write master key");
        let store = EncryptedFsKeystore::open(&key_path, AES256, data_dir.path()).expect("open");
        let ctx = Context::background();

        store.create(&ctx, "master-key", b"x").await.expect("create");
        let (names, _) = store.list(&ctx, "", None, 0).await.expect("list");
        assert_eq!(names, vec!["master-key".to_string()]);
    }

    #[tokio::test]
    async fn list_pages_through_cursor() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = open_store(dir.path());
        let ctx = Context::background();
        for i in 0..5 {
            store
                .create(&ctx, &format!("kek-{i}"), b"v")
                .await
                .expect("create");
        }

        let mut seen = Vec::new();
        let mut cursor = None;
        loop {
            let (names, next) = store
                .list(&ctx, "kek-", cursor.as_ref(), 2)
                .await
                .expect("list");
            assert!(names.len() <= 2);
            seen.extend(names);
            match next {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }
        assert_eq!(seen, vec!["kek-0", "kek-1", "kek-2", "kek-3", "kek-4"]);
    }

    #[test]
    fn construction_fails_without_valid_master_key() {
        let dir = tempfile::tempdir().expect("tempdir");
        let key_path = dir.path().join("master-key");

        let err = EncryptedFsKeystore::open(&key_path, AES256, dir.path()).expect_err("missing");
        assert!(matches!(err, KeystoreError::NotFound { .. }));

        fs::write(&key_path, b"veryshortkey").expect("write key");
        let err = EncryptedFsKeystore::open(&key_path, AES256, dir.path()).expect_err("short");
        assert!(matches!(err, KeystoreError::InvalidKeyLength { .. }));

        fs::write(&key_path, [b'x'; 64]).expect("write key");
        let err = EncryptedFsKeystore::open(&key_path, AES256, dir.path()).expect_err("long");
        assert!(matches!(err, KeystoreError::InvalidKeyLength { .. }));

        fs::write(&key_path, MASTER_KEY).expect("write key");
        let err = EncryptedFsKeystore::open(&key_path, "UNKNOWN", dir.path()).expect_err("cipher");
        assert!(matches!(err, KeystoreError::UnknownCipher { .. }));

        let err = EncryptedFsKeystore::open(&key_path, AES256, dir.path().join("missing"))
            .expect_err("missing dir");
        assert!(matches!(err, KeystoreError::NotFound { .. }));
    }

    #[tokio::test]
    async fn close_is_idempotent_and_final() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = open_store(dir.path());
        let ctx = Context::background();

        store.close().await.expect("close");
        store.close().await.expect("close again");
        assert_eq!(
            store.get(&ctx, KEK_NAME).await.expect_err("closed"),
            KeystoreError::Closed
        );
        assert_eq!(
            store.status(&ctx).await.expect_err("closed"),
            KeystoreError::Closed
        );
    }

    #[tokio::test]
    async fn expired_context_is_not_ignored() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = open_store(dir.path());
        let ctx = Context::background().with_timeout(Duration::ZERO);

        let err = store
            .create(&ctx, KEK_NAME, KEK_PLAINTEXT)
            .await
            .expect_err("deadline");
        assert_eq!(err, KeystoreError::DeadlineExceeded);
        assert!(!dir.path().join(KEK_NAME).exists());
    }

    #[tokio::test]
    async fn status_fails_once_directory_is_gone() {
        let dir = tempfile::tempdir().expect("tempdir");
        let data = dir.path().join("data");
        fs::create_dir(&data).expect("mkdir");
        let key_path = dir.path().join("master-key");
        fs::write(&key_path, MASTER_KEY).expect("write master key");
        let store = EncryptedFsKeystore::open(&key_path, AES256, &data).expect("open");
        let ctx = Context::background();

        store.status(&ctx).await.expect("status");
        fs::remove_dir(&data).expect("remove dir");
        let err = store.status(&ctx).await.expect_err("gone");
        assert!(matches!(err, KeystoreError::NotFound { .. }));
    }
}

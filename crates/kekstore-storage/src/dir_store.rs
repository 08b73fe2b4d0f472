use std::{
    fs::{self, File},
    io::{ErrorKind, Write},
    path::{Path, PathBuf},
    time::{Duration, SystemTime},
};

use kekstore_core::{paginate, Context, Cursor, KeystoreError};
use tempfile::{Builder, NamedTempFile};
use tracing::debug;

/// Prefix of in-flight temporary files. Object names may not start with it.
pub const TEMP_PREFIX: &str = ".kekstore-tmp-";

/// Temporary files untouched for this long are leftovers of an interrupted write.
pub const STALE_TEMP_AGE: Duration = Duration::from_secs(60 * 60);

/// How [`DirStore::write`] treats an existing object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    FailIfExists,
    Overwrite,
}

/// One file per object, directly under `root`. Knows nothing about encryption.
///
/// Each file is its own unit of atomicity: writes go to a temporary file in
/// the same directory and are renamed into place.
#[derive(Debug, Clone)]
pub struct DirStore {
    root: PathBuf,
    reserved: Option<String>,
}

impl DirStore {
    /// Open an existing directory. `reserved` names a file (the master key)
    /// that is never listed and can never be written, read or removed.
    pub fn open(root: impl Into<PathBuf>, reserved: Option<String>) -> Result<Self, KeystoreError> {
        let root = root.into();
        let meta = fs::metadata(&root).map_err(|err| match err.kind() {
            ErrorKind::NotFound => KeystoreError::NotFound {
                name: root.display().to_string(),
            },
            _ => KeystoreError::io(err),
        })?;
        if !meta.is_dir() {
            return Err(KeystoreError::invalid_argument(format!(
                "{} is not a directory",
                root.display()
            )));
        }
        let store = Self { root, reserved };
        store.sweep_stale_temp_files(SystemTime::now());
        Ok(store)
    }

    /// Remove temporary files older than [`STALE_TEMP_AGE`]. Younger ones may
    /// belong to a writer in another process and are left alone.
    fn sweep_stale_temp_files(&self, now: SystemTime) {
        let Ok(entries) = fs::read_dir(&self.root) else {
            return;
        };
        for entry in entries.flatten() {
            let name = entry.file_name();
            if !name.to_string_lossy().starts_with(TEMP_PREFIX) {
                continue;
            }
            let stale = entry
                .metadata()
                .and_then(|meta| meta.modified())
                .is_ok_and(|modified| {
                    now.duration_since(modified)
                        .is_ok_and(|age| age >= STALE_TEMP_AGE)
                });
            if !stale {
                continue;
            }
            match fs::remove_file(entry.path()) {
                Ok(()) => debug!(file = ?name, "removed stale temporary file"),
                Err(err) => debug!(file = ?name, %err, "could not remove stale temporary file"),
            }
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Reject names that are empty, reserved, or could escape the directory.
    pub fn validate_name(&self, name: &str) -> Result<(), KeystoreError> {
        if name.is_empty() {
            return Err(KeystoreError::invalid_argument("name must not be empty"));
        }
        if name == "." || name == ".." || name.contains(['/', '\\', '\0']) {
            return Err(KeystoreError::invalid_argument(format!(
                "name {name:?} is not a plain file name"
            )));
        }
        if name.starts_with(TEMP_PREFIX) || self.reserved.as_deref() == Some(name) {
            return Err(KeystoreError::invalid_argument(format!(
                "name {name:?} is reserved"
            )));
        }
        Ok(())
    }

    fn path_for(&self, name: &str) -> Result<PathBuf, KeystoreError> {
        self.validate_name(name)?;
        Ok(self.root.join(name))
    }

    pub fn write(&self, name: &str, bytes: &[u8], mode: WriteMode) -> Result<(), KeystoreError> {
        let path = self.path_for(name)?;

        let mut tmp = self.temp_file()?;
        tmp.write_all(bytes).map_err(KeystoreError::io)?;
        tmp.flush().map_err(KeystoreError::io)?;
        tmp.as_file().sync_all().map_err(KeystoreError::io)?;

        match mode {
            // Exclusive rename/link: concurrent creators cannot both win.
            WriteMode::FailIfExists => tmp.persist_noclobber(&path).map_err(|e| {
                if e.error.kind() == ErrorKind::AlreadyExists {
                    KeystoreError::AlreadyExists {
                        name: name.to_string(),
                    }
                } else {
                    KeystoreError::io(e.error)
                }
            })?,
            WriteMode::Overwrite => tmp.persist(&path).map_err(|e| KeystoreError::io(e.error))?,
        };
        self.sync_root();
        Ok(())
    }

    pub fn read(&self, name: &str) -> Result<Vec<u8>, KeystoreError> {
        let path = self.path_for(name)?;
        fs::read(path).map_err(|err| not_found_or_io(err, name))
    }

    /// Remove an object. A missing object is `NotFound`, never a silent success.
    pub fn remove(&self, name: &str) -> Result<(), KeystoreError> {
        let path = self.path_for(name)?;
        fs::remove_file(path).map_err(|err| not_found_or_io(err, name))?;
        self.sync_root();
        Ok(())
    }

    /// List object names starting with `prefix`, sorted, resuming at `cursor`
    /// and capped at `limit` (`0` for no cap).
    pub fn enumerate(
        &self,
        ctx: &Context,
        prefix: &str,
        cursor: Option<&Cursor>,
        limit: usize,
    ) -> Result<(Vec<String>, Option<Cursor>), KeystoreError> {
        ctx.check()?;
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.root).map_err(KeystoreError::io)? {
            ctx.check()?;
            let entry = entry.map_err(KeystoreError::io)?;
            if !entry.file_type().map_err(KeystoreError::io)?.is_file() {
                continue;
            }
            // Objects are always created from UTF-8 names; anything else is foreign.
            let Ok(name) = entry.file_name().into_string() else {
                continue;
            };
            if !name.starts_with(prefix) || self.is_hidden(&name) {
                continue;
            }
            names.push(name);
        }
        Ok(paginate(names, prefix, cursor, limit))
    }

    /// Check the directory is still present and writable by creating and
    /// dropping a temporary file.
    pub fn probe(&self) -> Result<(), KeystoreError> {
        let meta = fs::metadata(&self.root)
            .map_err(|err| not_found_or_io(err, &self.root.display().to_string()))?;
        if !meta.is_dir() {
            return Err(KeystoreError::io(format!(
                "{} is no longer a directory",
                self.root.display()
            )));
        }
        let tmp = self.temp_file()?;
        tmp.close().map_err(KeystoreError::io)
    }

    fn is_hidden(&self, name: &str) -> bool {
        name.starts_with(TEMP_PREFIX) || self.reserved.as_deref() == Some(name)
    }

    fn temp_file(&self) -> Result<NamedTempFile, KeystoreError> {
        Builder::new()
            .prefix(TEMP_PREFIX)
            .tempfile_in(&self.root)
            .map_err(KeystoreError::io)
    }

    // Makes renames and unlinks durable. The object operation already
    // succeeded, so a failure here is only reported in the trace.
    fn sync_root(&self) {
        #[cfg(unix)]
        if let Err(err) = File::open(&self.root).and_then(|dir| dir.sync_all()) {
            debug!(root = %self.root.display(), %err, "directory sync failed");
        }
    }
}

fn not_found_or_io(err: std::io::Error, name: &str) -> KeystoreError {
    if err.kind() == ErrorKind::NotFound {
        KeystoreError::NotFound {
            name: name.to_string(),
        }
    } else {
        KeystoreError::io(err)
    }
}

use std::{
    collections::{btree_map::Entry, BTreeMap},
    sync::{Arc, Mutex, MutexGuard},
    time::Instant,
};

use async_trait::async_trait;

use super::{list::paginate, Cursor, Keystore, Status};
use crate::{context::Context, error::KeystoreError};

/// In-memory keystore for tests and smoke runs of the calling layers.
/// Values are held in plaintext; production deployments use an encrypted backend.
#[derive(Debug, Clone)]
pub struct InMemoryKeystore {
    inner: Arc<Mutex<Option<BTreeMap<String, Vec<u8>>>>>,
}

impl Default for InMemoryKeystore {
    fn default() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Some(BTreeMap::new()))),
        }
    }
}

impl InMemoryKeystore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Option<BTreeMap<String, Vec<u8>>>>, KeystoreError> {
        self.inner
            .lock()
            .map_err(|err| KeystoreError::io(format!("lock poisoned: {err}")))
    }
}

fn open_map(
    guard: &mut Option<BTreeMap<String, Vec<u8>>>,
) -> Result<&mut BTreeMap<String, Vec<u8>>, KeystoreError> {
    guard.as_mut().ok_or(KeystoreError::Closed)
}

#[async_trait]
impl Keystore for InMemoryKeystore {
    fn describe(&self) -> String {
        "In-Memory Keystore".to_string()
    }

    async fn status(&self, ctx: &Context) -> Result<Status, KeystoreError> {
        ctx.check()?;
        let start = Instant::now();
        open_map(&mut *self.lock()?)?;
        Ok(Status {
            latency: start.elapsed(),
        })
    }

    async fn create(&self, ctx: &Context, name: &str, value: &[u8]) -> Result<(), KeystoreError> {
        ctx.check()?;
        if name.is_empty() {
            return Err(KeystoreError::invalid_argument("name must not be empty"));
        }
        let mut guard = self.lock()?;
        match open_map(&mut guard)?.entry(name.to_string()) {
            Entry::Occupied(_) => Err(KeystoreError::AlreadyExists {
                name: name.to_string(),
            }),
            Entry::Vacant(slot) => {
                slot.insert(value.to_vec());
                Ok(())
            }
        }
    }

    async fn get(&self, ctx: &Context, name: &str) -> Result<Vec<u8>, KeystoreError> {
        ctx.check()?;
        let mut guard = self.lock()?;
        open_map(&mut guard)?
            .get(name)
            .cloned()
            .ok_or_else(|| KeystoreError::NotFound {
                name: name.to_string(),
            })
    }

    async fn delete(&self, ctx: &Context, name: &str) -> Result<(), KeystoreError> {
        ctx.check()?;
        let mut guard = self.lock()?;
        open_map(&mut guard)?
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| KeystoreError::NotFound {
                name: name.to_string(),
            })
    }

    async fn list(
        &self,
        ctx: &Context,
        prefix: &str,
        cursor: Option<&Cursor>,
        limit: usize,
    ) -> Result<(Vec<String>, Option<Cursor>), KeystoreError> {
        ctx.check()?;
        let mut guard = self.lock()?;
        let names: Vec<String> = open_map(&mut guard)?.keys().cloned().collect();
        Ok(paginate(names, prefix, cursor, limit))
    }

    async fn close(&self) -> Result<(), KeystoreError> {
        self.lock()?.take();
        Ok(())
    }
}

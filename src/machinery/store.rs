// heed based namespace scoped registry

use heed::{
    Database, Env, EnvOpenOptions, MdbError, PutFlags,
    types::{Bytes, Str},
};
use std::{
    collections::BTreeSet,
    marker::PhantomData,
    ops::Bound,
    path::Path,
    sync::atomic::{AtomicUsize, Ordering},
};
use thiserror::Error;
use tokio::fs::create_dir_all;
use tracing::trace;

const KEY_SEPARATOR: char = '/';

/// LMDB's compile-time default for `MDB_MAXKEYSIZE`.
pub const MAX_KEY_SIZE: usize = 511;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("no record for {id} in {namespace}")]
    NotFound { namespace: String, id: String },

    #[error("record for {id} already exists in {namespace}")]
    AlreadyExists { namespace: String, id: String },

    #[error("invalid key segment {segment:?}")]
    InvalidKey { segment: String },

    #[error("key is {len} bytes long, the limit is {}", MAX_KEY_SIZE)]
    KeyTooLong { len: usize },

    #[error(transparent)]
    Backend(#[from] heed::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }

    pub fn is_already_exists(&self) -> bool {
        matches!(self, StoreError::AlreadyExists { .. })
    }

    pub fn is_invalid_key(&self) -> bool {
        matches!(
            self,
            StoreError::InvalidKey { .. } | StoreError::KeyTooLong { .. }
        )
    }
}

/// Keyed store partitioned by namespace.
///
/// Every logical operation opens its own scope and drops it before returning,
/// which is the only way a scope gets closed.
pub trait Registry {
    type Scope<'a>: RegistryScope
    where
        Self: 'a;

    fn open(&self, namespace: &str) -> Result<Self::Scope<'_>, StoreError>;
}

pub trait RegistryScope {
    /// Fails with [`StoreError::NotFound`] when `id` has no `field`.
    fn get(&self, id: &str, field: &str) -> Result<Vec<u8>, StoreError>;

    /// Fails with [`StoreError::AlreadyExists`] instead of overwriting.
    fn create(&self, id: &str, field: &str, value: &[u8]) -> Result<(), StoreError>;

    /// Removes every field of `id`. Fails with [`StoreError::NotFound`] when
    /// there is nothing to remove.
    fn remove(&self, id: &str) -> Result<(), StoreError>;

    fn list_ids(&self) -> Result<Vec<String>, StoreError>;
}

pub struct Set;
pub struct NotSet;

pub struct KeyBuilder<N, I, F> {
    segments: Vec<String>,
    _marker: PhantomData<(N, I, F)>,
}

impl KeyBuilder<NotSet, NotSet, NotSet> {
    pub fn namespace(self, namespace: impl AsRef<str>) -> KeyBuilder<Set, NotSet, NotSet> {
        self.push(namespace)
    }
}

impl KeyBuilder<Set, NotSet, NotSet> {
    pub fn id(self, id: impl AsRef<str>) -> KeyBuilder<Set, Set, NotSet> {
        self.push(id)
    }

    /// Prefix matching every record of the namespace.
    pub fn prefix(self) -> Result<String, StoreError> {
        self.join().map(|prefix| format!("{prefix}{KEY_SEPARATOR}"))
    }
}

impl KeyBuilder<Set, Set, NotSet> {
    pub fn field(self, field: impl AsRef<str>) -> KeyBuilder<Set, Set, Set> {
        self.push(field)
    }

    /// Prefix matching every field of the id.
    pub fn prefix(self) -> Result<String, StoreError> {
        self.join().map(|prefix| format!("{prefix}{KEY_SEPARATOR}"))
    }
}

impl KeyBuilder<Set, Set, Set> {
    pub fn build(self) -> Result<Key, StoreError> {
        self.join().map(Key)
    }
}

impl<N, I, F> KeyBuilder<N, I, F> {
    fn push<N2, I2, F2>(mut self, segment: impl AsRef<str>) -> KeyBuilder<N2, I2, F2> {
        self.segments.push(segment.as_ref().to_string());
        KeyBuilder {
            segments: self.segments,
            _marker: PhantomData,
        }
    }

    fn join(self) -> Result<String, StoreError> {
        for segment in &self.segments {
            validate_key_segment(segment)?;
        }

        let key = self.segments.join(&KEY_SEPARATOR.to_string());
        // prefixes get a trailing separator, leave room for it
        if key.len() >= MAX_KEY_SIZE {
            return Err(StoreError::KeyTooLong { len: key.len() });
        }
        Ok(key)
    }
}

pub fn validate_key_segment(segment: &str) -> Result<(), StoreError> {
    if segment.is_empty() || segment.contains(KEY_SEPARATOR) {
        return Err(StoreError::InvalidKey {
            segment: segment.to_string(),
        });
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Key(String);

impl Key {
    pub fn builder() -> KeyBuilder<NotSet, NotSet, NotSet> {
        KeyBuilder {
            segments: Vec::with_capacity(3),
            _marker: PhantomData,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// every byte sorting after the separator, used as an exclusive range end
fn prefix_upper_bound(prefix: &str) -> String {
    let mut end = prefix.trim_end_matches(KEY_SEPARATOR).to_string();
    end.push((KEY_SEPARATOR as u8 + 1) as char);
    end
}

pub struct Store {
    db: Database<Str, Bytes>,
    env: Env,
    open_scopes: AtomicUsize,
}

impl Store {
    pub async fn new(dir_path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let dir_path = dir_path.as_ref();
        if !dir_path.exists() {
            create_dir_all(dir_path).await?;
        }

        let env = unsafe { EnvOpenOptions::new().open(dir_path)? };

        let db = {
            let mut wtxn = env.write_txn()?;
            let db: Database<Str, Bytes> = env.create_database(&mut wtxn, None)?;
            wtxn.commit()?;

            db
        };

        Ok(Self {
            db,
            env,
            open_scopes: AtomicUsize::new(0),
        })
    }

    /// Number of scopes currently held open.
    pub fn open_scopes(&self) -> usize {
        self.open_scopes.load(Ordering::SeqCst)
    }
}

impl Registry for Store {
    type Scope<'a>
        = StoreScope<'a>
    where
        Self: 'a;

    fn open(&self, namespace: &str) -> Result<StoreScope<'_>, StoreError> {
        validate_key_segment(namespace)?;

        self.open_scopes.fetch_add(1, Ordering::SeqCst);
        trace!(namespace, "opened store scope");

        Ok(StoreScope {
            store: self,
            namespace: namespace.to_string(),
        })
    }
}

pub struct StoreScope<'a> {
    store: &'a Store,
    namespace: String,
}

impl StoreScope<'_> {
    fn key(&self, id: &str, field: &str) -> Result<Key, StoreError> {
        Key::builder()
            .namespace(&self.namespace)
            .id(id)
            .field(field)
            .build()
    }

    fn not_found(&self, id: &str) -> StoreError {
        StoreError::NotFound {
            namespace: self.namespace.clone(),
            id: id.to_string(),
        }
    }
}

impl RegistryScope for StoreScope<'_> {
    fn get(&self, id: &str, field: &str) -> Result<Vec<u8>, StoreError> {
        let key = self.key(id, field)?;
        let rtxn = self.store.env.read_txn()?;
        let value = self.store.db.get(&rtxn, key.as_str())?;

        value.map(|v| v.to_vec()).ok_or_else(|| self.not_found(id))
    }

    fn create(&self, id: &str, field: &str, value: &[u8]) -> Result<(), StoreError> {
        let key = self.key(id, field)?;

        // the existence check and the write share one write txn, so a
        // concurrent create of the same key can't be overwritten
        let mut wtxn = self.store.env.write_txn()?;
        match self
            .store
            .db
            .put_with_flags(&mut wtxn, PutFlags::NO_OVERWRITE, key.as_str(), value)
        {
            Ok(()) => {}
            Err(heed::Error::Mdb(MdbError::KeyExist)) => {
                return Err(StoreError::AlreadyExists {
                    namespace: self.namespace.clone(),
                    id: id.to_string(),
                });
            }
            Err(e) => return Err(e.into()),
        }
        wtxn.commit()?;

        Ok(())
    }

    fn remove(&self, id: &str) -> Result<(), StoreError> {
        let start = Key::builder().namespace(&self.namespace).id(id).prefix()?;
        let end = prefix_upper_bound(&start);
        let range = (Bound::Included(start.as_str()), Bound::Excluded(end.as_str()));

        let mut wtxn = self.store.env.write_txn()?;
        let removed = self.store.db.delete_range(&mut wtxn, &range)?;
        if removed == 0 {
            return Err(self.not_found(id));
        }
        wtxn.commit()?;

        Ok(())
    }

    fn list_ids(&self) -> Result<Vec<String>, StoreError> {
        let prefix = Key::builder().namespace(&self.namespace).prefix()?;
        let rtxn = self.store.env.read_txn()?;
        let iter = self.store.db.prefix_iter(&rtxn, prefix.as_str())?;

        let mut ids = BTreeSet::new();
        for entry in iter {
            let (key, _) = entry?;
            let Some(rest) = key.strip_prefix(prefix.as_str()) else {
                continue;
            };
            if let Some(id) = rest.split(KEY_SEPARATOR).next() {
                ids.insert(id.to_string());
            }
        }
        Ok(ids.into_iter().collect())
    }
}

impl Drop for StoreScope<'_> {
    fn drop(&mut self) {
        self.store.open_scopes.fetch_sub(1, Ordering::SeqCst);
        trace!(namespace = %self.namespace, "closed store scope");
    }
}

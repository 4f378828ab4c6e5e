//! Generic JSON-file-backed record store.
//!
//! A [`Store`] holds an ordered collection of [`Record`]s in memory and keeps
//! a JSON array of the whole collection on disk. Every mutation takes the
//! write lock, changes the collection and rewrites the file before the lock
//! is released; reads share the lock. The file is replaced atomically (temp
//! file, fsync, rename), so a crash mid-write leaves the previous version.
//!
//! Per-kind behaviour (uniqueness, owned media files, defaulting) comes from
//! the [`Record`] hooks; see `kinds.rs` and `session.rs` for the instances.

mod kinds;

pub use kinds::{ActionStore, AudioStore, ImageStore, MoveStore};

use crate::error::StoreError;
use serde::{Serialize, de::DeserializeOwned};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// A value that can live in a [`Store`].
pub trait Record: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Human readable kind, used in errors and logs.
    const KIND: &'static str;

    fn id(&self) -> Uuid;
    fn set_id(&mut self, id: Uuid);
    fn group(&self) -> &str;

    fn is_valid(&self) -> bool {
        true
    }

    fn is_nil(&self) -> bool {
        false
    }

    /// Key that must be unique across the store, if the kind has one.
    fn unique_key(&self) -> Option<&str> {
        None
    }

    /// Media files removed together with the record.
    fn backing_files(&self) -> Vec<&str> {
        Vec::new()
    }

    /// Fills in defaults; runs on load, create and update.
    fn prepare(&mut self) {}
}

pub struct Store<T> {
    path: PathBuf,
    records: RwLock<Vec<T>>,
    fresh: bool,
}

impl<T: Record> Store<T> {
    /// Opens the store at `path`, creating an empty file if there is none.
    pub async fn load(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let persistence = |source| StoreError::Persistence {
            path: path.clone(),
            source,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(persistence)?;
        }

        let (mut records, fresh) = match tokio::fs::read(&path).await {
            Ok(bytes) => (decode_records::<T>(&path, &bytes)?, false),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => (Vec::new(), true),
            Err(e) => return Err(persistence(e)),
        };
        records.iter_mut().for_each(T::prepare);

        write_records(&path, &records).await?;
        info!(
            kind = T::KIND,
            path = %path.display(),
            count = records.len(),
            fresh,
            "Store loaded"
        );

        Ok(Self {
            path,
            records: RwLock::new(records),
            fresh,
        })
    }

    /// True when the backing file did not exist before [`Store::load`].
    pub fn is_fresh(&self) -> bool {
        self.fresh
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    /// All records in insertion order.
    pub async fn list(&self) -> Vec<T> {
        self.records.read().await.clone()
    }

    pub async fn get(&self, id: Uuid) -> Result<T, StoreError> {
        self.records
            .read()
            .await
            .iter()
            .find(|r| r.id() == id)
            .cloned()
            .ok_or_else(|| not_found::<T>(id))
    }

    /// First value produced by `f` over the records, in order.
    pub async fn find_map<R>(&self, f: impl FnMut(&T) -> Option<R>) -> Option<R> {
        self.records.read().await.iter().find_map(f)
    }

    /// Adds a record, assigning an identifier if it has none.
    pub async fn create(&self, mut record: T) -> Result<Uuid, StoreError> {
        if record.id().is_nil() {
            record.set_id(Uuid::new_v4());
        }
        record.prepare();
        check_record(&record)?;

        let id = record.id();
        let mut records = self.records.write().await;
        if records.iter().any(|r| r.id() == id) {
            return Err(StoreError::AlreadyExists {
                kind: T::KIND,
                key: id.to_string(),
            });
        }
        if let Some(key) = record.unique_key() {
            if records.iter().any(|r| r.unique_key() == Some(key)) {
                return Err(StoreError::AlreadyExists {
                    kind: T::KIND,
                    key: key.to_string(),
                });
            }
        }

        records.push(record);
        if let Err(e) = write_records(&self.path, &records).await {
            records.pop();
            return Err(e);
        }
        debug!(kind = T::KIND, %id, "Record created");
        Ok(id)
    }

    /// Replaces the record with the same identifier.
    ///
    /// Updating an identifier the store does not hold is `NotFound`; this
    /// is not an upsert.
    pub async fn update(&self, mut record: T) -> Result<(), StoreError> {
        record.prepare();
        check_record(&record)?;

        let id = record.id();
        let mut records = self.records.write().await;
        let index = records
            .iter()
            .position(|r| r.id() == id)
            .ok_or_else(|| not_found::<T>(id))?;
        if let Some(key) = record.unique_key() {
            let taken = records
                .iter()
                .enumerate()
                .any(|(i, r)| i != index && r.unique_key() == Some(key));
            if taken {
                return Err(StoreError::AlreadyExists {
                    kind: T::KIND,
                    key: key.to_string(),
                });
            }
        }

        let previous = std::mem::replace(&mut records[index], record);
        if let Err(e) = write_records(&self.path, &records).await {
            records[index] = previous;
            return Err(e);
        }
        debug!(kind = T::KIND, %id, "Record updated");
        Ok(())
    }

    /// Removes a record together with the media files it owns.
    pub async fn delete(&self, id: Uuid) -> Result<T, StoreError> {
        let mut records = self.records.write().await;
        let index = records
            .iter()
            .position(|r| r.id() == id)
            .ok_or_else(|| not_found::<T>(id))?;

        let removed = records.remove(index);
        if let Err(e) = write_records(&self.path, &records).await {
            records.insert(index, removed);
            return Err(e);
        }

        let files: Vec<PathBuf> = removed
            .backing_files()
            .into_iter()
            .map(PathBuf::from)
            .collect();
        for file in &files {
            if let Err(e) = remove_backing_file(file).await {
                records.insert(index, removed);
                if let Err(restore) = write_records(&self.path, &records).await {
                    warn!(kind = T::KIND, %id, error = %restore, "Failed to restore record on disk");
                }
                return Err(e);
            }
        }
        debug!(kind = T::KIND, %id, files = files.len(), "Record deleted");
        Ok(removed)
    }

    /// Applies `change` to the first record matching `select` and persists
    /// the collection. Returns `None` when no record matches.
    pub(crate) async fn modify_first<R>(
        &self,
        select: impl Fn(&T) -> bool,
        change: impl FnOnce(&mut T) -> R,
    ) -> Result<Option<R>, StoreError> {
        let mut records = self.records.write().await;
        let Some(index) = records.iter().position(select) else {
            return Ok(None);
        };

        let previous = records[index].clone();
        let result = change(&mut records[index]);
        if let Err(e) = write_records(&self.path, &records).await {
            records[index] = previous;
            return Err(e);
        }
        Ok(Some(result))
    }

    /// Sorted, deduplicated group labels.
    pub async fn groups(&self) -> Vec<String> {
        self.records
            .read()
            .await
            .iter()
            .map(|r| r.group().to_string())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Inserts the records whose identifier and unique key are not taken yet.
    /// Returns how many were added.
    pub async fn insert_missing(&self, candidates: Vec<T>) -> Result<usize, StoreError> {
        let mut records = self.records.write().await;
        let before = records.len();
        for mut candidate in candidates {
            if candidate.id().is_nil() {
                candidate.set_id(Uuid::new_v4());
            }
            candidate.prepare();
            let taken = records.iter().any(|r| {
                r.id() == candidate.id()
                    || (candidate.unique_key().is_some() && r.unique_key() == candidate.unique_key())
            });
            if !taken {
                records.push(candidate);
            }
        }

        let added = records.len() - before;
        if added > 0 {
            if let Err(e) = write_records(&self.path, &records).await {
                records.truncate(before);
                return Err(e);
            }
        }
        Ok(added)
    }
}

fn not_found<T: Record>(id: Uuid) -> StoreError {
    StoreError::NotFound {
        kind: T::KIND,
        key: id.to_string(),
    }
}

fn check_record<T: Record>(record: &T) -> Result<(), StoreError> {
    if record.is_nil() {
        return Err(StoreError::Validation {
            kind: T::KIND,
            reason: "record is empty".to_string(),
        });
    }
    if !record.is_valid() {
        return Err(StoreError::Validation {
            kind: T::KIND,
            reason: "required fields are missing".to_string(),
        });
    }
    Ok(())
}

fn decode_records<T: Record>(path: &Path, bytes: &[u8]) -> Result<Vec<T>, StoreError> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Vec::new());
    }
    let records: Option<Vec<T>> =
        serde_json::from_slice(bytes).map_err(|source| StoreError::Decode {
            path: path.to_path_buf(),
            source,
        })?;
    Ok(records.unwrap_or_default())
}

async fn write_records<T: Serialize>(path: &Path, records: &[T]) -> Result<(), StoreError> {
    let persistence = |source| StoreError::Persistence {
        path: path.to_path_buf(),
        source,
    };
    let mut bytes = serde_json::to_vec_pretty(records)
        .map_err(|e| persistence(std::io::Error::other(e)))?;
    bytes.push(b'\n');

    let mut temp_name = path.file_name().unwrap_or_default().to_os_string();
    temp_name.push(".tmp");
    let temp_path = path.with_file_name(temp_name);

    let mut file = tokio::fs::File::create(&temp_path)
        .await
        .map_err(persistence)?;
    file.write_all(&bytes).await.map_err(persistence)?;
    file.sync_all().await.map_err(persistence)?;
    drop(file);

    tokio::fs::rename(&temp_path, path)
        .await
        .map_err(persistence)
}

/// Deletes a media file; a file that is already gone is not an error.
pub async fn remove_backing_file(path: &Path) -> Result<(), StoreError> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            warn!(path = %path.display(), "Tried to remove a nonexistent file");
            Ok(())
        }
        Err(source) => Err(StoreError::FileRemoval {
            path: path.to_path_buf(),
            source,
        }),
    }
}

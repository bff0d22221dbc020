// src/storage/badge_store.rs
//! Durable badge registry.
//!
//! On-disk layout under the registry directory:
//! - `registry.json`: aggregate document `{ issuer, badges: [...] }`
//! - `<id>.json`: standalone snapshot of each issued badge
//! - `registry.lock`: advisory lock file serializing writers
//!
//! # Consistency
//! - Nothing is cached: every read and every commit starts from disk.
//! - Every document write is an atomic replace (temp file + rename).
//! - Commits are mutually exclusive. An in-process gate orders writers inside
//!   one server, the file lock orders writers across processes. Lock
//!   contention is retried with bounded, jittered backoff.

use crate::error::BadgeError;
use crate::models::badge::{Badge, Issuer};
use crate::models::registry::Registry;
use crate::storage::file_lock::{write_atomic, WriterLock};
use crate::utils::serialization::{from_document, to_document};
use rand::Rng;
use serde_json::Value;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use uuid::Uuid;

const REGISTRY_FILE: &str = "registry.json";
const BACKUP_FILE: &str = "registry.json.bak";
const LOCK_FILE: &str = "registry.lock";

/// What was found at `registry.json`.
enum RegistryFile {
    Missing,
    Parsed(Registry),
    /// Not JSON, or JSON that is not an object. Safe to move aside.
    Unreadable(String),
    /// A JSON object whose contents do not fit the registry model.
    Mismatched(String),
}

/// Bounded retry schedule for acquiring the writer lock.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    /// Roughly ten seconds of patience before giving up.
    fn default() -> Self {
        RetryPolicy {
            max_attempts: 200,
            initial_backoff: Duration::from_millis(2),
            max_backoff: Duration::from_millis(50),
        }
    }
}

/// File-backed registry of issued badges.
///
/// Cloning is cheap and clones share the in-process writer gate.
#[derive(Debug, Clone)]
pub struct BadgeStore {
    dir: PathBuf,
    default_issuer: Issuer,
    retry: RetryPolicy,
    gate: Arc<Mutex<()>>,
}

impl BadgeStore {
    /// Opens (creating if needed) a registry directory.
    ///
    /// # Arguments
    /// * `dir` - Directory holding `registry.json` and the snapshots
    /// * `default_issuer` - Issuer metadata used when no registry exists yet
    pub fn open(dir: impl Into<PathBuf>, default_issuer: Issuer) -> Result<Self, BadgeError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| {
            BadgeError::StorageUnavailable(format!("cannot create {}: {}", dir.display(), e))
        })?;
        Ok(BadgeStore {
            dir,
            default_issuer,
            retry: RetryPolicy::default(),
            gate: Arc::new(Mutex::new(())),
        })
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn registry_path(&self) -> PathBuf {
        self.dir.join(REGISTRY_FILE)
    }

    /// Path of the standalone snapshot for `id`. The id is not validated here.
    pub fn snapshot_path(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{}.json", id))
    }

    /// Reads the current aggregate registry.
    ///
    /// A missing `registry.json` is an empty registry. An unusable one is
    /// reported as `StorageUnavailable`.
    pub fn load(&self) -> Result<Registry, BadgeError> {
        match self.read_registry()? {
            RegistryFile::Missing => Ok(Registry::new(self.default_issuer.clone())),
            RegistryFile::Parsed(registry) => Ok(registry),
            RegistryFile::Unreadable(reason) | RegistryFile::Mismatched(reason) => {
                Err(self.unusable(&reason))
            }
        }
    }

    /// Applies `mutator` to the latest registry state and writes the result back.
    ///
    /// # Process Flow
    /// 1. Takes the in-process gate, then the cross-process file lock
    /// 2. Re-reads `registry.json` under the lock
    /// 3. Runs the mutator in memory; an error aborts with nothing written
    /// 4. Atomically replaces `registry.json`
    ///
    /// # Returns
    /// The registry as written together with the mutator's output.
    ///
    /// # Errors
    /// - Whatever the mutator returns
    /// - `StorageUnavailable` if the lock cannot be taken within the retry
    ///   budget or the write fails
    pub fn commit<T, F>(&self, mutator: F) -> Result<(Registry, T), BadgeError>
    where
        F: FnOnce(&mut Registry) -> Result<T, BadgeError>,
    {
        // The guard protects no data, so a poisoned gate is still usable.
        let _gate = self.gate.lock().unwrap_or_else(|p| p.into_inner());
        let _lock = self.acquire_writer_lock()?;

        let mut registry = self.load_for_write()?;
        let output = mutator(&mut registry)?;

        let bytes = to_document(&registry)?;
        write_atomic(&self.registry_path(), &bytes).map_err(|e| self.write_failed(e))?;

        Ok((registry, output))
    }

    /// Persists `badge` as its own `<id>.json` document.
    pub fn put_snapshot(&self, badge: &Badge) -> Result<(), BadgeError> {
        if canonical_id(&badge.id).is_none() {
            return Err(BadgeError::StorageUnavailable(format!(
                "refusing to write snapshot for malformed id {:?}",
                badge.id
            )));
        }
        let bytes = to_document(badge)?;
        write_atomic(&self.snapshot_path(&badge.id), &bytes).map_err(|e| self.write_failed(e))
    }

    /// Resolves a badge by id.
    ///
    /// Only canonical lowercase hyphenated UUIDs can match, which also keeps
    /// caller input from naming arbitrary files. The standalone snapshot is
    /// consulted first and the aggregate registry second.
    pub fn get_by_id(&self, id: &str) -> Result<Option<Badge>, BadgeError> {
        if canonical_id(id).is_none() {
            return Ok(None);
        }

        let path = self.snapshot_path(id);
        match fs::read(&path) {
            Ok(bytes) => match from_document::<Badge>(&bytes) {
                Ok(badge) if badge.id == id => return Ok(Some(badge)),
                Ok(_) => log::warn!("snapshot {} holds a different id, ignoring", path.display()),
                Err(e) => log::warn!("snapshot {} unreadable, ignoring: {}", path.display(), e),
            },
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        Ok(self.load()?.find(id).cloned())
    }

    fn acquire_writer_lock(&self) -> Result<WriterLock, BadgeError> {
        let path = self.dir.join(LOCK_FILE);
        let mut backoff = self.retry.initial_backoff;
        let mut rng = rand::thread_rng();

        for attempt in 1..=self.retry.max_attempts {
            match WriterLock::try_acquire(&path) {
                Ok(Some(lock)) => return Ok(lock),
                Ok(None) => {
                    let conflict = BadgeError::StorageConflict;
                    log::debug!("{} (attempt {}/{})", conflict, attempt, self.retry.max_attempts);
                }
                Err(e) => {
                    return Err(BadgeError::StorageUnavailable(format!(
                        "cannot lock {}: {}",
                        path.display(),
                        e
                    )))
                }
            }

            let jitter_ms = rng.gen_range(0..=backoff.as_millis() as u64);
            std::thread::sleep(backoff + Duration::from_millis(jitter_ms));
            backoff = (backoff * 2).min(self.retry.max_backoff);
        }

        Err(BadgeError::StorageUnavailable(format!(
            "writer lock still held after {} attempts",
            self.retry.max_attempts
        )))
    }

    /// Like `load`, but a registry that is not a JSON object at all is moved
    /// aside and replaced with a fresh one so that issuance can continue.
    ///
    /// A JSON object that fails the typed parse still holds badges, so it is
    /// left in place and the commit is refused.
    fn load_for_write(&self) -> Result<Registry, BadgeError> {
        match self.read_registry()? {
            RegistryFile::Missing => Ok(Registry::new(self.default_issuer.clone())),
            RegistryFile::Parsed(registry) => Ok(registry),
            RegistryFile::Unreadable(reason) => {
                let backup = self.dir.join(BACKUP_FILE);
                fs::rename(self.registry_path(), &backup).map_err(|e| self.write_failed(e))?;
                log::warn!(
                    "registry.json was invalid ({}); backed up to {} and starting fresh",
                    reason,
                    backup.display()
                );
                Ok(Registry::new(self.default_issuer.clone()))
            }
            RegistryFile::Mismatched(reason) => {
                log::error!("refusing to overwrite registry.json: {}", reason);
                Err(self.unusable(&reason))
            }
        }
    }

    fn read_registry(&self) -> Result<RegistryFile, BadgeError> {
        let bytes = match fs::read(self.registry_path()) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(RegistryFile::Missing),
            Err(e) => return Err(e.into()),
        };
        Ok(self.parse_registry(&bytes))
    }

    fn parse_registry(&self, bytes: &[u8]) -> RegistryFile {
        let mut value: Value = match from_document(bytes) {
            Ok(value) => value,
            Err(e) => return RegistryFile::Unreadable(e.to_string()),
        };
        let object = match value.as_object_mut() {
            Some(object) => object,
            None => return RegistryFile::Unreadable("not a JSON object".to_string()),
        };

        if !object.contains_key("issuer") {
            match serde_json::to_value(&self.default_issuer) {
                Ok(issuer) => object.insert("issuer".to_string(), issuer),
                Err(e) => return RegistryFile::Mismatched(e.to_string()),
            };
        }
        object
            .entry("badges")
            .or_insert_with(|| Value::Array(Vec::new()));

        match serde_json::from_value(value) {
            Ok(registry) => RegistryFile::Parsed(registry),
            Err(e) => RegistryFile::Mismatched(e.to_string()),
        }
    }

    fn unusable(&self, reason: &str) -> BadgeError {
        BadgeError::StorageUnavailable(format!(
            "{} is unusable: {}",
            self.registry_path().display(),
            reason
        ))
    }

    fn write_failed(&self, e: io::Error) -> BadgeError {
        BadgeError::StorageUnavailable(format!("write under {} failed: {}", self.dir.display(), e))
    }
}

/// Parses `id` as a UUID and returns it only if `id` is already in canonical form.
fn canonical_id(id: &str) -> Option<Uuid> {
    Uuid::parse_str(id)
        .ok()
        .filter(|uuid| uuid.hyphenated().to_string() == id)
}

//! Per-entity evidence cache.
//!
//! An entity that has never been fetched has no entry at all; an entity whose
//! fetch produced nothing is stored as an empty list. Entries never expire and
//! are only ever replaced whole.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use heed::types::{Bytes, Str};
use heed::EnvOpenOptions;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::records::{ArticleRecord, EntityKey};

/// Storage behind the evidence cache.
pub trait CacheBackend {
    fn get(&self, key: &EntityKey) -> Result<Option<Vec<ArticleRecord>>>;
    fn put(&self, key: &EntityKey, records: &[ArticleRecord]) -> Result<()>;
    fn name(&self) -> &str;
}

/// One JSON array file per entity inside a directory.
pub struct JsonDirBackend {
    dir: PathBuf,
}

impl JsonDirBackend {
    pub fn new<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).map_err(|e| Error::io(&dir, e))?;
        Ok(Self { dir })
    }

    pub fn path_for(&self, key: &EntityKey) -> PathBuf {
        self.dir.join(format!("{}.json", escape_file_stem(key.as_str())))
    }
}

impl CacheBackend for JsonDirBackend {
    fn get(&self, key: &EntityKey) -> Result<Option<Vec<ArticleRecord>>> {
        let path = self.path_for(key);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(Error::io(&path, e)),
        };
        let records = serde_json::from_slice(&bytes)?;
        Ok(Some(records))
    }

    fn put(&self, key: &EntityKey, records: &[ArticleRecord]) -> Result<()> {
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        let json = serde_json::to_vec_pretty(records)?;

        let mut file = fs::File::create(&tmp).map_err(|e| Error::io(&tmp, e))?;
        file.write_all(&json).map_err(|e| Error::io(&tmp, e))?;
        file.sync_all().map_err(|e| Error::io(&tmp, e))?;
        fs::rename(&tmp, &path).map_err(|e| Error::io(&path, e))?;
        Ok(())
    }

    fn name(&self) -> &str {
        "json"
    }
}

/// Keeps every file name inside the cache directory and distinct per key:
/// anything outside `[A-Za-z0-9 ._,-]` becomes `%XX`, as does a leading dot.
fn escape_file_stem(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for (i, c) in name.char_indices() {
        let plain = c.is_ascii_alphanumeric() || matches!(c, ' ' | '_' | ',' | '-' | '.');
        if plain && !(i == 0 && c == '.') {
            out.push(c);
        } else {
            let mut buf = [0u8; 4];
            for b in c.encode_utf8(&mut buf).bytes() {
                out.push_str(&format!("%{:02X}", b));
            }
        }
    }
    out
}

/// Cache entries in a single LMDB environment, bincode-encoded.
pub struct LmdbBackend {
    env: heed::Env,
    db: heed::Database<Str, Bytes>,
}

impl LmdbBackend {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        fs::create_dir_all(path).map_err(|e| Error::io(path, e))?;

        debug!(path = %path.display(), "opening LMDB cache");
        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(1024 * 1024 * 1024) // 1GB
                .max_dbs(1)
                .open(path)?
        };

        let mut wtxn = env.write_txn()?;
        let db = env.create_database(&mut wtxn, Some("evidence"))?;
        wtxn.commit()?;

        Ok(Self { env, db })
    }

    pub fn keys(&self) -> Result<Vec<String>> {
        let rtxn = self.env.read_txn()?;
        let keys = self
            .db
            .iter(&rtxn)?
            .map(|res| res.map(|(k, _)| k.to_string()))
            .collect::<std::result::Result<Vec<_>, heed::Error>>()?;
        Ok(keys)
    }
}

impl CacheBackend for LmdbBackend {
    fn get(&self, key: &EntityKey) -> Result<Option<Vec<ArticleRecord>>> {
        let rtxn = self.env.read_txn()?;
        match self.db.get(&rtxn, key.as_str())? {
            Some(bytes) => Ok(Some(bincode::deserialize(bytes)?)),
            None => Ok(None),
        }
    }

    fn put(&self, key: &EntityKey, records: &[ArticleRecord]) -> Result<()> {
        let bytes = bincode::serialize(records)?;
        let mut wtxn = self.env.write_txn()?;
        self.db.put(&mut wtxn, key.as_str(), &bytes)?;
        wtxn.commit()?;
        Ok(())
    }

    fn name(&self) -> &str {
        "lmdb"
    }
}

pub struct EvidenceCache {
    backend: Box<dyn CacheBackend>,
}

impl EvidenceCache {
    pub fn new(backend: Box<dyn CacheBackend>) -> Self {
        Self { backend }
    }

    pub fn json_dir<P: AsRef<Path>>(dir: P) -> Result<Self> {
        Ok(Self::new(Box::new(JsonDirBackend::new(dir)?)))
    }

    pub fn lmdb<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self::new(Box::new(LmdbBackend::new(path)?)))
    }

    pub fn get(&self, key: &EntityKey) -> Result<Option<Vec<ArticleRecord>>> {
        self.backend.get(key)
    }

    pub fn put(&self, key: &EntityKey, records: &[ArticleRecord]) -> Result<()> {
        self.backend.put(key, records)
    }

    /// Returns the cached records for `key`, calling `fetch` and persisting
    /// its result (empty or not) only when no entry exists yet.
    ///
    /// A failing `fetch` caches nothing. A failing write is returned to the
    /// caller instead of the fetched records.
    pub fn get_or_fetch<F>(&self, key: &EntityKey, fetch: F) -> Result<Vec<ArticleRecord>>
    where
        F: FnOnce() -> Result<Vec<ArticleRecord>>,
    {
        if let Some(records) = self.backend.get(key)? {
            debug!(entity = %key, count = records.len(), backend = self.backend.name(), "cache hit");
            return Ok(records);
        }

        let records = fetch()?;
        self.backend.put(key, &records)?;
        info!(entity = %key, count = records.len(), backend = self.backend.name(), "cached evidence");
        Ok(records)
    }
}

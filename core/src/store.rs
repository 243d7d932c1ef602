use crate::error::StoreError;
use crate::query::RecordFilter;
use crate::record::Record;
use serde::{Deserialize, Serialize};
use std::fs::{create_dir_all, File};
use std::io::{Read, Write};
use std::ops::Bound;
use std::path::{Path, PathBuf};
use time::OffsetDateTime;

pub const COLLECTION: &str = "tweets";
pub const TEST_COLLECTION: &str = "tweets_test";

#[derive(Debug, Serialize, Deserialize)]
pub struct MetaFile {
    pub num_records: u64,
    pub updated_at: String,
    pub version: u32,
}

pub struct StorePaths {
    pub root: PathBuf,
}

impl StorePaths {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self { root: root.as_ref().to_path_buf() }
    }
    fn db(&self) -> PathBuf { self.root.join("db") }
    fn meta(&self, collection: &str) -> PathBuf { self.root.join(format!("{collection}.meta.json")) }
}

/// Tweets kept in a sled tree ordered by creation time.
///
/// Keys are the creation timestamp (8 bytes, order preserving) followed by the
/// tweet id, so a date range maps onto a key range. A second tree maps ids to
/// keys so re-importing a tweet replaces it instead of duplicating it.
pub struct RecordStore {
    paths: StorePaths,
    collection: String,
    records: sled::Tree,
    ids: sled::Tree,
    _db: sled::Db,
}

impl RecordStore {
    pub fn open<P: AsRef<Path>>(root: P, collection: &str) -> Result<Self, StoreError> {
        let paths = StorePaths::new(root);
        create_dir_all(&paths.root)?;
        let db = sled::open(paths.db())?;
        let records = db.open_tree(collection)?;
        let ids = db.open_tree(format!("{collection}_ids"))?;
        tracing::debug!(root = %paths.root.display(), collection, "opened record store");
        Ok(Self { paths, collection: collection.to_string(), records, ids, _db: db })
    }

    pub fn collection(&self) -> &str { &self.collection }

    pub fn len(&self) -> usize { self.records.len() }

    pub fn is_empty(&self) -> bool { self.records.is_empty() }

    /// Insert or replace a record. Returns `true` when the id was not stored before.
    pub fn insert(&self, record: &Record) -> Result<bool, StoreError> {
        let key = record_key(record.created_at, &record.id);
        let previous = self.ids.insert(record.id.as_bytes(), key.as_slice())?;
        if let Some(old_key) = &previous {
            if old_key.as_ref() != key.as_slice() {
                self.records.remove(old_key)?;
            }
        }
        let bytes = bincode::serialize(record)?;
        self.records.insert(key, bytes)?;
        Ok(previous.is_none())
    }

    /// Lazily scan the records matching `filter`, in creation order.
    pub fn find<'a>(&'a self, filter: &'a RecordFilter) -> impl Iterator<Item = Result<Record, StoreError>> + 'a {
        let lower = Bound::Included(timestamp_key(filter.start).to_vec());
        self.records
            .range((lower, range_end(filter.end)))
            .filter_map(move |entry| {
                let decoded = entry
                    .map_err(StoreError::from)
                    .and_then(|(_, value)| bincode::deserialize::<Record>(&value).map_err(StoreError::from));
                match decoded {
                    Ok(record) if filter.matches(&record) => Some(Ok(record)),
                    Ok(_) => None,
                    Err(e) => Some(Err(e)),
                }
            })
    }

    /// Creation times of the oldest and newest record.
    pub fn span(&self) -> Result<Option<(OffsetDateTime, OffsetDateTime)>, StoreError> {
        let first = match self.records.first()? { Some((_, v)) => bincode::deserialize::<Record>(&v)?, None => return Ok(None) };
        let last = match self.records.last()? { Some((_, v)) => bincode::deserialize::<Record>(&v)?, None => return Ok(None) };
        Ok(Some((first.created_at, last.created_at)))
    }

    pub fn flush(&self) -> Result<(), StoreError> {
        self.records.flush()?;
        self.ids.flush()?;
        Ok(())
    }

    pub fn save_meta(&self, meta: &MetaFile) -> Result<(), StoreError> {
        let mut f = File::create(self.paths.meta(&self.collection))?;
        let json = serde_json::to_string_pretty(meta)?;
        f.write_all(json.as_bytes())?;
        Ok(())
    }

    pub fn load_meta(&self) -> Result<MetaFile, StoreError> {
        let mut f = File::open(self.paths.meta(&self.collection))?;
        let mut buf = String::new();
        f.read_to_string(&mut buf)?;
        let meta: MetaFile = serde_json::from_str(&buf)?;
        Ok(meta)
    }
}

/// Big-endian nanoseconds with the sign bit flipped, so byte order matches time order.
fn timestamp_key(ts: OffsetDateTime) -> [u8; 8] {
    let nanos = ts.unix_timestamp_nanos().clamp(i64::MIN as i128, i64::MAX as i128) as i64;
    ((nanos as u64) ^ (1 << 63)).to_be_bytes()
}

/// Exclusive bound past every key stamped at or before `ts`.
fn range_end(ts: OffsetDateTime) -> Bound<Vec<u8>> {
    match u64::from_be_bytes(timestamp_key(ts)).checked_add(1) {
        Some(next) => Bound::Excluded(next.to_be_bytes().to_vec()),
        None => Bound::Unbounded,
    }
}

fn record_key(ts: OffsetDateTime, id: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(8 + id.len());
    key.extend_from_slice(&timestamp_key(ts));
    key.extend_from_slice(id.as_bytes());
    key
}

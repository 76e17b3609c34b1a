//! Durable JSONL record store and a provider built on it.
//!
//! Records are appended to a JSON Lines file with file locking so several
//! processes can share one store. The local cache and, for offline use, the
//! network side are both stores of this shape.

use crate::provider::{apply_filters, CacheUsage, Filter, RecordProvider};
use crate::types::RawRecord;
use crate::{Error, Result};
use async_trait::async_trait;
use fs2::FileExt;
use std::collections::{HashMap, HashSet};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::NamedTempFile;

/// JSONL-based record store with file locking
#[derive(Clone, Debug)]
pub struct JsonlRecordStore {
    path: PathBuf,
}

impl JsonlRecordStore {
    /// Create a store backed by the given path. The file is created lazily.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Ensure the parent directory exists
    fn ensure_parent_dir(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(())
    }

    /// Append records as JSON lines under an exclusive lock.
    pub fn append(&self, records: &[RawRecord]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }
        self.ensure_parent_dir()?;

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.lock_exclusive()?;

        let mut writer = std::io::BufWriter::new(&file);
        for record in records {
            let line = serde_json::to_string(record)?;
            writer.write_all(line.as_bytes())?;
            writer.write_all(b"\n")?;
        }
        writer.flush()?;
        drop(writer);

        file.unlock()?;
        tracing::debug!("Appended {} records to {:?}", records.len(), self.path);
        Ok(())
    }

    /// Read every record. Corrupt lines are logged and skipped.
    pub fn read_all(&self) -> Result<Vec<RawRecord>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let file = File::open(&self.path)?;
        file.lock_shared()?;

        let reader = BufReader::new(&file);
        let mut records = Vec::new();

        for (line_num, line_result) in reader.lines().enumerate() {
            let line = line_result?;
            if line.trim().is_empty() {
                continue;
            }

            match serde_json::from_str::<RawRecord>(&line) {
                Ok(record) => records.push(record),
                Err(e) => {
                    tracing::warn!(
                        "Failed to parse record at {:?} line {}: {}",
                        self.path,
                        line_num + 1,
                        e
                    );
                }
            }
        }

        file.unlock()?;
        Ok(records)
    }

    /// Records matching any of the filters, newest first, unique by id.
    pub fn query(&self, filters: &[Filter]) -> Result<Vec<RawRecord>> {
        let records = self.read_all()?;
        Ok(apply_filters(filters, &records))
    }

    /// Ids already present in the store.
    pub fn known_ids(&self) -> Result<HashSet<String>> {
        Ok(self.read_all()?.into_iter().map(|r| r.id).collect())
    }

    /// Append only records whose ids are not stored yet. Returns how many were added.
    pub fn insert_new(&self, records: &[RawRecord]) -> Result<usize> {
        let known = self.known_ids()?;
        let mut added = HashSet::new();
        let fresh: Vec<RawRecord> = records
            .iter()
            .filter(|r| !known.contains(&r.id) && added.insert(r.id.clone()))
            .cloned()
            .collect();
        self.append(&fresh)?;
        Ok(fresh.len())
    }

    /// Rewrite the store keeping unique ids and only the newest version of
    /// each replaceable address.
    ///
    /// The new file is written to a temp file, synced, then renamed over the
    /// original. Returns the number of records dropped.
    pub fn compact(&self) -> Result<usize> {
        let records = self.read_all()?;
        let before = records.len();

        let mut newest: HashMap<String, RawRecord> = HashMap::new();
        let mut plain: Vec<RawRecord> = Vec::new();
        let mut seen_ids = HashSet::new();

        for record in records {
            if !seen_ids.insert(record.id.clone()) {
                continue;
            }
            match record.address() {
                Some(address) => {
                    let key = address.to_string();
                    match newest.get(&key) {
                        Some(current) if !record.supersedes(current) => {}
                        _ => {
                            newest.insert(key, record);
                        }
                    }
                }
                None => plain.push(record),
            }
        }

        let mut kept: Vec<RawRecord> = plain.into_iter().chain(newest.into_values()).collect();
        kept.sort_by(|a, b| (a.created_at, &a.id).cmp(&(b.created_at, &b.id)));

        self.ensure_parent_dir()?;
        let parent = self.path.parent().ok_or_else(|| {
            Error::Other(format!("store path {:?} has no parent directory", self.path))
        })?;
        let temp = NamedTempFile::new_in(parent)?;
        temp.as_file().lock_exclusive()?;
        {
            let mut writer = std::io::BufWriter::new(temp.as_file());
            for record in &kept {
                writer.write_all(serde_json::to_string(record)?.as_bytes())?;
                writer.write_all(b"\n")?;
            }
            writer.flush()?;
        }
        temp.as_file().sync_all()?;
        temp.as_file().unlock()?;
        temp.persist(&self.path).map_err(|e| Error::Io(e.error))?;

        let dropped = before - kept.len();
        tracing::info!(
            "Compacted {:?}: kept {}, dropped {}",
            self.path,
            kept.len(),
            dropped
        );
        Ok(dropped)
    }
}

/// Provider over a local cache store and an optional network-side store.
///
/// Records fetched from the network are written back into the cache.
#[derive(Clone, Debug)]
pub struct LocalProvider {
    cache: JsonlRecordStore,
    network: Option<JsonlRecordStore>,
}

impl LocalProvider {
    pub fn new(cache: JsonlRecordStore, network: Option<JsonlRecordStore>) -> Self {
        Self { cache, network }
    }

    /// Provider rooted at `data_dir` (cache at `data_dir/cache/records.jsonl`).
    pub fn in_data_dir(data_dir: &Path, network: Option<PathBuf>) -> Self {
        Self::new(
            JsonlRecordStore::new(data_dir.join("cache").join("records.jsonl")),
            network.map(JsonlRecordStore::new),
        )
    }

    pub fn cache(&self) -> &JsonlRecordStore {
        &self.cache
    }

    pub fn network(&self) -> Option<&JsonlRecordStore> {
        self.network.as_ref()
    }

    pub fn has_network(&self) -> bool {
        self.network.is_some()
    }
}

/// Run store I/O on the blocking pool so lock waits cannot stall the
/// runtime or outlive a caller's deadline.
async fn blocking<T, F>(task: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(task)
        .await
        .map_err(|e| Error::Provider(format!("store task failed: {}", e)))?
}

#[async_trait]
impl RecordProvider for LocalProvider {
    async fn fetch_records(
        &self,
        filters: &[Filter],
        usage: CacheUsage,
        _timeout: Duration,
    ) -> Result<Vec<RawRecord>> {
        let cache = self.cache.clone();
        let filters = filters.to_vec();
        match usage {
            CacheUsage::CacheOnly => blocking(move || cache.query(&filters)).await,
            CacheUsage::NetworkOnly => {
                let network = self
                    .network
                    .clone()
                    .ok_or_else(|| Error::Provider("no network source configured".into()))?;
                blocking(move || {
                    let records = network.query(&filters)?;
                    let cached = cache.insert_new(&records)?;
                    if cached > 0 {
                        tracing::debug!("Cached {} records fetched from network", cached);
                    }
                    Ok(records)
                })
                .await
            }
        }
    }

    async fn publish_record(&self, record: &RawRecord) -> Result<()> {
        let cache = self.cache.clone();
        let network = self.network.clone();
        let record = record.clone();
        blocking(move || {
            cache.insert_new(std::slice::from_ref(&record))?;
            if let Some(network) = network {
                network.insert_new(std::slice::from_ref(&record))?;
            }
            Ok(())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reference::tests::ALICE;
    use crate::tags::tag;
    use crate::types::RecordKind;

    fn collection(id: &str, created_at: i64) -> RawRecord {
        RawRecord {
            id: id.into(),
            kind: RecordKind::COLLECTION_CODE,
            authority: ALICE.into(),
            created_at,
            tags: vec![tag(&["d", "favs"]), tag(&["title", id])],
            content: String::new(),
        }
    }

    fn workout(id: &str) -> RawRecord {
        RawRecord {
            id: id.into(),
            kind: RecordKind::WORKOUT_RECORD_CODE,
            authority: ALICE.into(),
            created_at: 5,
            tags: vec![],
            content: String::new(),
        }
    }

    #[test]
    fn test_append_and_read() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = JsonlRecordStore::new(temp_dir.path().join("nested/records.jsonl"));

        store.append(&[collection("a", 1), collection("b", 2)]).unwrap();
        let records = store.read_all().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].id, "a");
    }

    #[test]
    fn test_read_missing_file_is_empty() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = JsonlRecordStore::new(temp_dir.path().join("missing.jsonl"));
        assert!(store.read_all().unwrap().is_empty());
    }

    #[test]
    fn test_corrupt_lines_are_skipped() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("records.jsonl");
        let good = serde_json::to_string(&collection("a", 1)).unwrap();
        std::fs::write(&path, format!("{{ broken\n\n{}\nnot json\n", good)).unwrap();

        let records = JsonlRecordStore::new(&path).read_all().unwrap();
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn test_insert_new_skips_known_ids() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = JsonlRecordStore::new(temp_dir.path().join("records.jsonl"));
        assert_eq!(store.insert_new(&[collection("a", 1)]).unwrap(), 1);
        assert_eq!(
            store
                .insert_new(&[collection("a", 1), collection("b", 2), collection("b", 2)])
                .unwrap(),
            1
        );
        assert_eq!(store.read_all().unwrap().len(), 2);
    }

    #[test]
    fn test_compact_keeps_newest_replaceable_version() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = JsonlRecordStore::new(temp_dir.path().join("records.jsonl"));
        store
            .append(&[
                collection("old", 1),
                collection("new", 3),
                collection("middle", 2),
                workout("w1"),
                workout("w1"),
            ])
            .unwrap();

        let dropped = store.compact().unwrap();
        assert_eq!(dropped, 3);

        let records = store.read_all().unwrap();
        let ids: Vec<_> = records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["new", "w1"]);

        let extras: Vec<_> = std::fs::read_dir(temp_dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name() != "records.jsonl")
            .collect();
        assert!(extras.is_empty(), "stray files: {:?}", extras);
    }

    #[tokio::test]
    async fn test_network_fetch_populates_cache() {
        let temp_dir = tempfile::tempdir().unwrap();
        let network = JsonlRecordStore::new(temp_dir.path().join("network.jsonl"));
        network.append(&[collection("a", 1)]).unwrap();
        let provider = LocalProvider::in_data_dir(temp_dir.path(), Some(network.path().into()));

        let filters = [Filter::new().kind(RecordKind::Collection)];
        let timeout = Duration::from_secs(1);

        let cached = provider
            .fetch_records(&filters, CacheUsage::CacheOnly, timeout)
            .await
            .unwrap();
        assert!(cached.is_empty());

        let fetched = provider
            .fetch_records(&filters, CacheUsage::NetworkOnly, timeout)
            .await
            .unwrap();
        assert_eq!(fetched.len(), 1);

        let cached = provider
            .fetch_records(&filters, CacheUsage::CacheOnly, timeout)
            .await
            .unwrap();
        assert_eq!(cached.len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_locked_cache_read_respects_deadline() {
        use crate::strategy::{CacheStrategy, FetchOptions, StrategySelector};
        use std::sync::Arc;
        use std::time::Instant;

        let temp_dir = tempfile::tempdir().unwrap();
        let provider = Arc::new(LocalProvider::in_data_dir(temp_dir.path(), None));
        provider.cache().append(&[collection("a", 1)]).unwrap();

        // Another writer holds the cache for a second
        let holder = File::open(provider.cache().path()).unwrap();
        holder.lock_exclusive().unwrap();
        let writer = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(1000));
            holder.unlock().unwrap();
        });

        let selector = StrategySelector::new(provider.clone())
            .with_probe_timeout(Duration::from_millis(100));
        let filters = [Filter::new().kind(RecordKind::Collection)];
        let options = FetchOptions::default()
            .with_strategy(CacheStrategy::CacheOnly)
            .with_timeout(Duration::from_millis(100));

        let started = Instant::now();
        let result = selector.fetch(&filters, &options).await;
        assert!(matches!(result, Err(Error::Timeout { millis: 100 })), "{:?}", result);
        assert!(started.elapsed() < Duration::from_millis(900));

        let availability = selector.check_availability(&filters).await;
        assert!(!availability.available);

        writer.join().unwrap();
        let records = selector.fetch(&filters, &options.with_timeout(Duration::from_secs(5))).await.unwrap();
        assert_eq!(records.len(), 1);
    }

    #[tokio::test]
    async fn test_network_without_source_is_provider_error() {
        let temp_dir = tempfile::tempdir().unwrap();
        let provider = LocalProvider::in_data_dir(temp_dir.path(), None);
        let result = provider
            .fetch_records(&[Filter::new()], CacheUsage::NetworkOnly, Duration::from_secs(1))
            .await;
        assert!(matches!(result, Err(Error::Provider(_))));
    }
}

//! Cache-versus-network read strategies over a `RecordProvider`.
//!
//! Every strategy runs under a hard deadline. A deadline miss is reported
//! as `Error::Timeout`, which callers can tell apart from an empty result.

use crate::provider::{CacheUsage, Filter, RecordProvider};
use crate::types::RawRecord;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::future::Future;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Default deadline for a strategy fetch.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default deadline for an availability probe.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_millis(500);

/// How a fetch chooses between the local cache and the network.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CacheStrategy {
    /// Local cache only; never touches the network.
    CacheOnly,
    /// Cache, falling back to the network when the cache has nothing.
    #[default]
    CacheFirst,
    /// Cache and network concurrently, merged by record id.
    Parallel,
    /// Network only.
    NetworkOnly,
    /// Cache-only when offline; otherwise probe the cache and pick
    /// cache-first or network-only.
    Adaptive,
}

impl CacheStrategy {
    pub const ALL: [CacheStrategy; 5] = [
        CacheStrategy::CacheOnly,
        CacheStrategy::CacheFirst,
        CacheStrategy::Parallel,
        CacheStrategy::NetworkOnly,
        CacheStrategy::Adaptive,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            CacheStrategy::CacheOnly => "cache-only",
            CacheStrategy::CacheFirst => "cache-first",
            CacheStrategy::Parallel => "parallel",
            CacheStrategy::NetworkOnly => "network-only",
            CacheStrategy::Adaptive => "adaptive",
        }
    }
}

impl fmt::Display for CacheStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CacheStrategy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().to_lowercase().replace('_', "-");
        match normalized.as_str() {
            "cache-only" => Ok(CacheStrategy::CacheOnly),
            "cache-first" => Ok(CacheStrategy::CacheFirst),
            "parallel" => Ok(CacheStrategy::Parallel),
            "network-only" => Ok(CacheStrategy::NetworkOnly),
            "adaptive" | "smart" => Ok(CacheStrategy::Adaptive),
            _ => Err(Error::Config(format!(
                "unknown cache strategy '{}' (expected one of: {})",
                s,
                CacheStrategy::ALL.map(CacheStrategy::as_str).join(", ")
            ))),
        }
    }
}

/// Per-fetch controls.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FetchOptions {
    pub strategy: CacheStrategy,
    pub timeout: Duration,
    /// Keep at most this many records (newest first).
    pub max_results: Option<usize>,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            strategy: CacheStrategy::default(),
            timeout: DEFAULT_TIMEOUT,
            max_results: None,
        }
    }
}

impl FetchOptions {
    pub fn with_strategy(mut self, strategy: CacheStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = Some(max_results);
        self
    }
}

/// Result of a cache availability probe.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Availability {
    pub available: bool,
    pub count: usize,
}

/// Runs fetches against a provider according to a `CacheStrategy`.
pub struct StrategySelector {
    provider: Arc<dyn RecordProvider>,
    online: AtomicBool,
    probe_timeout: Duration,
}

impl StrategySelector {
    pub fn new(provider: Arc<dyn RecordProvider>) -> Self {
        Self {
            provider,
            online: AtomicBool::new(true),
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
        }
    }

    pub fn with_probe_timeout(mut self, probe_timeout: Duration) -> Self {
        self.probe_timeout = probe_timeout;
        self
    }

    /// Record whether the network is reachable. Only `adaptive` consults this.
    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::Relaxed);
    }

    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::Relaxed)
    }

    pub fn provider(&self) -> &Arc<dyn RecordProvider> {
        &self.provider
    }

    /// Fetch records matching `filters` using `options.strategy`.
    pub async fn fetch(&self, filters: &[Filter], options: &FetchOptions) -> Result<Vec<RawRecord>> {
        let deadline = options.timeout;
        let mut records = with_deadline(deadline, self.run(filters, options.strategy, deadline)).await?;

        if let Some(max) = options.max_results {
            records.sort_by(|a, b| (b.created_at, &b.id).cmp(&(a.created_at, &a.id)));
            records.truncate(max);
        }

        tracing::debug!(
            "Fetched {} records with {} strategy",
            records.len(),
            options.strategy
        );
        Ok(records)
    }

    /// Cheap, advisory check of what the local cache holds for `filters`.
    ///
    /// Never fails: timeouts and provider errors read as "not available".
    pub async fn check_availability(&self, filters: &[Filter]) -> Availability {
        match with_deadline(self.probe_timeout, self.query(filters, CacheUsage::CacheOnly, self.probe_timeout)).await {
            Ok(records) => Availability {
                available: !records.is_empty(),
                count: records.len(),
            },
            Err(error) => {
                tracing::debug!("Availability probe failed: {}", error);
                Availability::default()
            }
        }
    }

    /// Publish a record through the provider.
    pub async fn publish(&self, record: &RawRecord) -> Result<()> {
        self.provider.publish_record(record).await
    }

    async fn run(
        &self,
        filters: &[Filter],
        strategy: CacheStrategy,
        deadline: Duration,
    ) -> Result<Vec<RawRecord>> {
        match strategy {
            CacheStrategy::CacheOnly => self.query(filters, CacheUsage::CacheOnly, deadline).await,
            CacheStrategy::NetworkOnly => {
                self.query(filters, CacheUsage::NetworkOnly, deadline).await
            }
            CacheStrategy::CacheFirst => self.cache_first(filters, deadline).await,
            CacheStrategy::Parallel => self.parallel(filters, deadline).await,
            CacheStrategy::Adaptive => {
                let chosen = self.choose_adaptive(filters).await;
                tracing::debug!("Adaptive strategy chose {}", chosen);
                match chosen {
                    CacheStrategy::CacheOnly => {
                        self.query(filters, CacheUsage::CacheOnly, deadline).await
                    }
                    CacheStrategy::CacheFirst => self.cache_first(filters, deadline).await,
                    _ => self.query(filters, CacheUsage::NetworkOnly, deadline).await,
                }
            }
        }
    }

    async fn query(
        &self,
        filters: &[Filter],
        usage: CacheUsage,
        deadline: Duration,
    ) -> Result<Vec<RawRecord>> {
        self.provider.fetch_records(filters, usage, deadline).await
    }

    async fn cache_first(&self, filters: &[Filter], deadline: Duration) -> Result<Vec<RawRecord>> {
        match self.query(filters, CacheUsage::CacheOnly, deadline).await {
            Ok(records) if !records.is_empty() => return Ok(records),
            Ok(_) => tracing::debug!("Cache miss, falling back to network"),
            Err(error) => tracing::warn!("Cache query failed ({}), falling back to network", error),
        }
        self.query(filters, CacheUsage::NetworkOnly, deadline).await
    }

    async fn parallel(&self, filters: &[Filter], deadline: Duration) -> Result<Vec<RawRecord>> {
        let (cached, fetched) = tokio::join!(
            self.query(filters, CacheUsage::CacheOnly, deadline),
            self.query(filters, CacheUsage::NetworkOnly, deadline)
        );

        match (cached, fetched) {
            (Ok(cached), Ok(fetched)) => Ok(merge_by_id(cached, fetched)),
            (Ok(cached), Err(error)) => {
                tracing::warn!("Network side of parallel fetch failed: {}", error);
                Ok(cached)
            }
            (Err(error), Ok(fetched)) => {
                tracing::warn!("Cache side of parallel fetch failed: {}", error);
                Ok(fetched)
            }
            (Err(_), Err(network_error)) => Err(network_error),
        }
    }

    async fn choose_adaptive(&self, filters: &[Filter]) -> CacheStrategy {
        if !self.is_online() {
            return CacheStrategy::CacheOnly;
        }
        if self.check_availability(filters).await.available {
            CacheStrategy::CacheFirst
        } else {
            CacheStrategy::NetworkOnly
        }
    }
}

async fn with_deadline<T, F>(deadline: Duration, future: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(deadline, future).await {
        Ok(result) => result,
        Err(_) => Err(Error::Timeout {
            millis: u64::try_from(deadline.as_millis()).unwrap_or(u64::MAX),
        }),
    }
}

/// Union of two result sets, first occurrence of each record id wins.
fn merge_by_id(first: Vec<RawRecord>, second: Vec<RawRecord>) -> Vec<RawRecord> {
    let mut seen = HashSet::new();
    first
        .into_iter()
        .chain(second)
        .filter(|record| seen.insert(record.id.clone()))
        .collect()
}

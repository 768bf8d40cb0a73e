use crate::constants::RATE_CACHE_TTL;
use crate::errors::CommandError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use serde_derive::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Per-region price table. Compute rates are keyed by full instance type
/// (`family.size`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RateTable {
    pub instance_hourly: BTreeMap<String, f64>,
    pub cluster_control_plane_hourly: f64,
    pub gp3_monthly_per_gb: f64,
}

impl RateTable {
    pub fn instance_rate(&self, instance_type: &str) -> f64 {
        self.instance_hourly.get(instance_type).copied().unwrap_or(0.0)
    }
}

static BUNDLED_RATES: Lazy<RateTable> = Lazy::new(|| {
    serde_json::from_str(include_str!("default_rates.json")).expect("bundled rate table is valid JSON")
});

/// The rate table shipped with the binary, used whenever no fresher catalog
/// is available.
pub fn bundled_rates() -> &'static RateTable {
    &BUNDLED_RATES
}

/// Pulls a fresh price catalog for one region. Failure is tolerated
/// everywhere; callers fall back to cache or bundled rates.
#[async_trait]
pub trait RateCatalogFetcher: Send + Sync {
    async fn fetch(&self, region: &str) -> Result<RateTable, CommandError>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CachedRates {
    region: String,
    fetched_at: DateTime<Utc>,
    table: RateTable,
}

/// Region-keyed rate lookup backed by an on-disk JSON cache with a 24 h TTL
/// and the bundled table as the floor.
pub struct RateBook {
    cache_dir: PathBuf,
    fetcher: Option<Box<dyn RateCatalogFetcher>>,
}

impl RateBook {
    pub fn new(cache_dir: impl Into<PathBuf>, fetcher: Option<Box<dyn RateCatalogFetcher>>) -> Self {
        RateBook {
            cache_dir: cache_dir.into(),
            fetcher,
        }
    }

    fn cache_path(&self, region: &str) -> PathBuf {
        self.cache_dir.join(format!("rates_{region}.json"))
    }

    /// Cache hit within TTL wins; otherwise the fetcher refreshes the cache;
    /// any failure falls back to a stale cache entry and finally to the
    /// bundled defaults.
    pub async fn rates_for(&self, region: &str, now: DateTime<Utc>) -> RateTable {
        let cached = read_cache(&self.cache_path(region));

        if let Some(cached) = &cached {
            let age = now.signed_duration_since(cached.fetched_at);
            if age.to_std().map(|age| age < RATE_CACHE_TTL).unwrap_or(false) {
                return cached.table.clone();
            }
        }

        if let Some(fetcher) = &self.fetcher {
            match fetcher.fetch(region).await {
                Ok(table) => {
                    self.write_cache(region, &table, now);
                    return table;
                }
                Err(err) => {
                    warn!("price catalog refresh failed for {region}: {err}");
                }
            }
        }

        cached
            .map(|c| c.table)
            .unwrap_or_else(|| bundled_rates().clone())
    }

    fn write_cache(&self, region: &str, table: &RateTable, now: DateTime<Utc>) {
        let entry = CachedRates {
            region: region.to_string(),
            fetched_at: now,
            table: table.clone(),
        };
        if std::fs::create_dir_all(&self.cache_dir).is_ok() {
            if let Ok(payload) = serde_json::to_string_pretty(&entry) {
                let _ = std::fs::write(self.cache_path(region), payload);
            }
        }
    }
}

fn read_cache(path: &Path) -> Option<CachedRates> {
    let raw = std::fs::read_to_string(path).ok()?;
    serde_json::from_str(&raw).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct CountingFetcher {
        calls: Arc<AtomicUsize>,
        result: Result<RateTable, ()>,
    }

    #[async_trait]
    impl RateCatalogFetcher for CountingFetcher {
        async fn fetch(&self, _region: &str) -> Result<RateTable, CommandError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.result
                .clone()
                .map_err(|_| CommandError::new_from_safe_message("catalog endpoint unreachable".to_string()))
        }
    }

    fn custom_table() -> RateTable {
        RateTable {
            instance_hourly: maplit::btreemap! { "t3.medium".to_string() => 0.05 },
            cluster_control_plane_hourly: 0.65,
            gp3_monthly_per_gb: 0.08,
        }
    }

    #[test]
    fn test_bundled_rates_parse_and_cover_basics() {
        let rates = bundled_rates();
        assert!(rates.instance_rate("t3.medium") > 0.0);
        assert_eq!(rates.instance_rate("nonexistent.type"), 0.0);
        assert!(rates.cluster_control_plane_hourly > 0.0);
    }

    #[tokio::test]
    async fn test_fresh_cache_short_circuits_fetcher() {
        let dir = tempfile::tempdir().unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        let book = RateBook::new(
            dir.path(),
            Some(Box::new(CountingFetcher {
                calls: calls.clone(),
                result: Ok(custom_table()),
            })),
        );

        let now = Utc::now();
        // first call fetches and fills the cache
        let first = book.rates_for("eu-west-1", now).await;
        assert_eq!(first.instance_rate("t3.medium"), 0.05);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        // second call within TTL must not fetch again
        let second = book.rates_for("eu-west-1", now + Duration::hours(1)).await;
        assert_eq!(second, first);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        // past the TTL the fetcher runs again
        let _ = book.rates_for("eu-west-1", now + Duration::hours(25)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_fetch_failure_falls_back_to_bundled() {
        let dir = tempfile::tempdir().unwrap();
        let book = RateBook::new(
            dir.path(),
            Some(Box::new(CountingFetcher {
                calls: Arc::new(AtomicUsize::new(0)),
                result: Err(()),
            })),
        );

        let table = book.rates_for("eu-west-1", Utc::now()).await;
        assert_eq!(&table, bundled_rates());
    }

    #[tokio::test]
    async fn test_no_fetcher_uses_bundled() {
        let dir = tempfile::tempdir().unwrap();
        let book = RateBook::new(dir.path(), None);

        let table = book.rates_for("ap-south-1", Utc::now()).await;
        assert_eq!(&table, bundled_rates());
    }
}

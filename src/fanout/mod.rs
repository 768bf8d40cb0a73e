use crate::models::Account;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// Result envelope for one (account, region) cell.
#[derive(Debug, Clone)]
pub struct CellResult<T> {
    pub account_name: String,
    pub region: String,
    pub elapsed: Duration,
    pub value: T,
}

/// Runs one task per (account, region) cell with a bounded worker pool.
/// Within a cell the task body is strictly sequential; across cells there is
/// no ordering. Cancellation stops submission of new cells and lets in-flight
/// cells finish.
pub struct FanoutScheduler {
    concurrency: usize,
}

impl FanoutScheduler {
    pub fn new(concurrency: usize) -> Self {
        FanoutScheduler {
            concurrency: concurrency.max(1),
        }
    }

    pub async fn run<T, F, Fut>(
        &self,
        cells: Vec<(Account, String)>,
        cancel: &CancellationToken,
        task: F,
    ) -> Vec<CellResult<T>>
    where
        T: Send + 'static,
        F: Fn(Account, String) -> Fut,
        Fut: Future<Output = T> + Send + 'static,
    {
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut join_set: JoinSet<CellResult<T>> = JoinSet::new();

        for (account, region) in cells {
            if cancel.is_cancelled() {
                break;
            }

            let permit = semaphore
                .clone()
                .acquire_owned()
                .await
                .expect("fanout semaphore is never closed");
            // the cancel may have landed while waiting for a worker slot
            if cancel.is_cancelled() {
                break;
            }

            let account_name = account.name.clone();
            let cell_region = region.clone();
            let future = task(account, region);
            join_set.spawn(async move {
                let started = Instant::now();
                let value = future.await;
                drop(permit);

                CellResult {
                    account_name,
                    region: cell_region,
                    elapsed: started.elapsed(),
                    value,
                }
            });
        }

        let mut results = Vec::new();
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok(result) => results.push(result),
                Err(e) => error!("fanout task aborted: {e}"),
            }
        }
        results
    }
}

/// The cartesian product of selected accounts and selected regions, each
/// account contributing its default regions when no explicit region list is
/// given.
pub fn account_region_matrix(accounts: &[Account], regions: Option<&[String]>) -> Vec<(Account, String)> {
    let mut cells = Vec::new();
    for account in accounts {
        let account_regions: Vec<String> = match regions {
            Some(regions) => regions.to_vec(),
            None => account.default_regions.clone(),
        };
        for region in account_regions {
            cells.push((account.clone(), region));
        }
    }
    cells
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn account(name: &str, regions: &[&str]) -> Account {
        Account {
            name: name.to_string(),
            id: "123456789012".to_string(),
            email: String::new(),
            access_key: "AKIA".to_string(),
            secret_key: "s".to_string(),
            default_regions: regions.iter().map(|r| r.to_string()).collect(),
        }
    }

    #[test]
    fn test_account_region_matrix() {
        let accounts = vec![account("a", &["us-east-1", "eu-west-1"]), account("b", &["us-east-1"])];

        let matrix = account_region_matrix(&accounts, None);
        assert_eq!(matrix.len(), 3);

        let explicit = account_region_matrix(&accounts, Some(&["ap-south-1".to_string()]));
        assert_eq!(explicit.len(), 2);
        assert!(explicit.iter().all(|(_, r)| r == "ap-south-1"));
    }

    #[tokio::test]
    async fn test_concurrency_ceiling_is_honored() {
        let scheduler = FanoutScheduler::new(3);
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let cells: Vec<(Account, String)> = (0..20)
            .map(|i| (account(&format!("acc-{i}"), &[]), "us-east-1".to_string()))
            .collect();

        let results = scheduler
            .run(cells, &CancellationToken::new(), |_, _| {
                let running = running.clone();
                let peak = peak.clone();
                async move {
                    let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    running.fetch_sub(1, Ordering::SeqCst);
                }
            })
            .await;

        assert_eq!(results.len(), 20);
        assert!(peak.load(Ordering::SeqCst) <= 3, "peak was {}", peak.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_cancellation_stops_submission() {
        let scheduler = FanoutScheduler::new(1);
        let cancel = CancellationToken::new();
        let executed = Arc::new(AtomicUsize::new(0));

        let cells: Vec<(Account, String)> = (0..10)
            .map(|i| (account(&format!("acc-{i}"), &[]), "us-east-1".to_string()))
            .collect();

        let results = scheduler
            .run(cells, &cancel, |_, _| {
                let executed = executed.clone();
                let cancel = cancel.clone();
                async move {
                    executed.fetch_add(1, Ordering::SeqCst);
                    // first task cancels the run; in-flight work still finishes
                    cancel.cancel();
                }
            })
            .await;

        assert!(results.len() < 10);
        assert_eq!(results.len(), executed.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_result_envelope_carries_cell_identity() {
        let scheduler = FanoutScheduler::new(2);
        let cells = vec![(account("a", &[]), "eu-west-1".to_string())];

        let results = scheduler
            .run(cells, &CancellationToken::new(), |account, region| async move {
                format!("{}:{}", account.name, region)
            })
            .await;

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].account_name, "a");
        assert_eq!(results[0].region, "eu-west-1");
        assert_eq!(results[0].value, "a:eu-west-1");
    }
}

use anyhow::{bail, Result};
use futures::stream::{self, Stream, StreamExt};
use futures::FutureExt;
use std::future::Future;
use tracing::{debug, trace};

/// Runs deferred async operations with a hard cap on how many are in flight.
///
/// A slot frees as soon as its operation finishes, so a slow operation never
/// holds back queued ones. `run` returns results in submission order; `stream`
/// yields them in completion order tagged with their submission index. An
/// operation's closure is not invoked until a slot is free.
#[derive(Debug, Clone, Copy)]
pub struct ConcurrencyLimiter {
    limit: usize,
}

impl ConcurrencyLimiter {
    pub fn new(limit: usize) -> Result<Self> {
        if limit == 0 {
            bail!("Concurrency limit must be greater than zero");
        }
        Ok(Self { limit })
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Yields `(submission index, result)` pairs as operations finish.
    pub fn stream<I, F, Fut, T>(&self, operations: I) -> impl Stream<Item = (usize, T)>
    where
        I: IntoIterator<Item = F>,
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let operations: Vec<F> = operations.into_iter().collect();
        let total = operations.len();
        debug!("Running {} operations with at most {} in flight", total, self.limit);

        stream::iter(operations.into_iter().enumerate())
            .map(move |(index, operation)| {
                trace!("Starting operation {}/{}", index + 1, total);
                operation().map(move |result| (index, result))
            })
            .buffer_unordered(self.limit)
    }

    /// Executes every operation and returns all results, in submission order,
    /// once all have settled.
    pub async fn run<I, F, Fut, T>(&self, operations: I) -> Vec<T>
    where
        I: IntoIterator<Item = F>,
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let mut settled: Vec<(usize, T)> = self.stream(operations).collect().await;
        debug!("All {} operations settled", settled.len());
        settled.sort_by_key(|(index, _)| *index);
        settled.into_iter().map(|(_, result)| result).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    async fn run_tracked(limit: usize, delays_ms: Vec<u64>) -> (Vec<usize>, usize) {
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let operations = delays_ms.into_iter().enumerate().map(|(index, delay)| {
            let in_flight = in_flight.clone();
            let peak = peak.clone();
            move || async move {
                let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(delay)).await;
                in_flight.fetch_sub(1, Ordering::SeqCst);
                index
            }
        });

        let limiter = ConcurrencyLimiter::new(limit).unwrap();
        let results = limiter.run(operations).await;
        (results, peak.load(Ordering::SeqCst))
    }

    #[test]
    fn test_zero_limit_is_rejected() {
        assert!(ConcurrencyLimiter::new(0).is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_bound_is_never_exceeded() {
        let delays = vec![30, 10, 50, 20, 5, 40, 15, 25];
        for limit in 1..=4 {
            let (_, peak) = run_tracked(limit, delays.clone()).await;
            assert!(peak <= limit, "peak {} exceeded limit {}", peak, limit);
            assert_eq!(peak, limit);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_serial_when_limit_is_one() {
        let (results, peak) = run_tracked(1, vec![20, 10, 5]).await;
        assert_eq!(peak, 1);
        assert_eq!(results, vec![0, 1, 2]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_limit_above_task_count_runs_everything_at_once() {
        let (results, peak) = run_tracked(16, vec![10, 10, 10]).await;
        assert_eq!(peak, 3);
        assert_eq!(results.len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_results_follow_submission_order() {
        let (results, _) = run_tracked(3, vec![50, 10, 30, 5, 1]).await;
        assert_eq!(results, vec![0, 1, 2, 3, 4]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stream_yields_in_completion_order() {
        let limiter = ConcurrencyLimiter::new(2).unwrap();
        let operations = [30u64, 10, 5].into_iter().map(|delay| {
            move || async move {
                tokio::time::sleep(Duration::from_millis(delay)).await;
                delay
            }
        });
        let seen: Vec<(usize, u64)> = limiter.stream(operations).collect().await;
        assert_eq!(seen, vec![(1, 10), (2, 5), (0, 30)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_head_does_not_hold_back_queue() {
        let started = Arc::new(AtomicUsize::new(0));
        let operations = [1000u64, 10, 10, 10, 10].into_iter().map(|delay| {
            let started = started.clone();
            move || async move {
                started.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(delay)).await;
                delay
            }
        });

        let limiter = ConcurrencyLimiter::new(2).unwrap();
        let begin = tokio::time::Instant::now();
        let (results, started_midway) = tokio::join!(limiter.run(operations), async {
            tokio::time::sleep(Duration::from_millis(500)).await;
            started.load(Ordering::SeqCst)
        });

        // Every short operation ran in the second slot while the first was still busy
        assert_eq!(started_midway, 5);
        assert_eq!(results, vec![1000, 10, 10, 10, 10]);
        assert!(begin.elapsed() < Duration::from_millis(1010));
    }

    #[tokio::test]
    async fn test_empty_operation_list() {
        let limiter = ConcurrencyLimiter::new(2).unwrap();
        let operations: Vec<fn() -> std::future::Ready<u8>> = Vec::new();
        assert!(limiter.run(operations).await.is_empty());
    }
}

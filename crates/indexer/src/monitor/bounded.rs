//! Width-bounded concurrent execution

use futures::stream::{self, StreamExt};
use std::future::Future;

/// Run `f` over `items` with at most `width` futures in flight
///
/// Results are returned in completion order; callers key them by identity.
pub async fn run_bounded<I, F, Fut, T>(items: I, width: usize, f: F) -> Vec<T>
where
    I: IntoIterator,
    F: FnMut(I::Item) -> Fut,
    Fut: Future<Output = T>,
{
    stream::iter(items)
        .map(f)
        .buffer_unordered(width.max(1))
        .collect::<Vec<_>>()
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn test_width_is_respected() {
        let in_flight = AtomicUsize::new(0);
        let peak = AtomicUsize::new(0);

        let mut results = run_bounded(0..25u64, 10, |i| {
            let in_flight = &in_flight;
            let peak = &peak;
            async move {
                let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(10 + i % 3)).await;
                in_flight.fetch_sub(1, Ordering::SeqCst);
                i
            }
        })
        .await;

        results.sort_unstable();
        assert_eq!(results, (0..25).collect::<Vec<_>>());
        assert_eq!(peak.load(Ordering::SeqCst), 10);
    }

    #[tokio::test]
    async fn test_zero_width_still_progresses() {
        let results = run_bounded(vec![1, 2, 3], 0, |i| async move { i * 2 }).await;
        assert_eq!(results.len(), 3);
    }
}

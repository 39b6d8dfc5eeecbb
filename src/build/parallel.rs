//! Bounded worker pool for independent tool invocations.
//!
//! Stage compiles and pipeline reflections do not depend on each other, so
//! they are handed to a fixed number of scoped worker threads that pull the
//! next job index from a shared counter. Results are returned in job order,
//! which keeps aggregation and error text deterministic regardless of which
//! worker finished first.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

/// Default number of parallel jobs (uses available parallelism).
pub fn default_jobs() -> usize {
    std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1)
}

/// Run `work` over every item using at most `jobs` threads.
///
/// The returned vector is in the same order as `items`.
pub fn run_jobs<T, R, F>(jobs: usize, items: &[T], work: F) -> Vec<R>
where
    T: Sync,
    R: Send,
    F: Fn(&T) -> R + Sync,
{
    if items.is_empty() {
        return Vec::new();
    }

    // For single-threaded or single-item batches, just execute sequentially
    if jobs <= 1 || items.len() == 1 {
        return items.iter().map(&work).collect();
    }

    let results = Mutex::new(Vec::with_capacity(items.len()));
    let next_idx = AtomicUsize::new(0);
    let num_workers = jobs.min(items.len());

    std::thread::scope(|s| {
        for _ in 0..num_workers {
            let results = &results;
            let next_idx = &next_idx;
            let work = &work;

            s.spawn(move || loop {
                let idx = next_idx.fetch_add(1, Ordering::SeqCst);
                if idx >= items.len() {
                    break;
                }

                let result = work(&items[idx]);
                results.lock().unwrap_or_else(PoisonError::into_inner).push((idx, result));
            });
        }
    });

    // Sort results by original index to maintain deterministic order
    let mut results = results.into_inner().unwrap_or_else(PoisonError::into_inner);
    results.sort_by_key(|(idx, _)| *idx);
    results.into_iter().map(|(_, r)| r).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_default_jobs_positive() {
        assert!(default_jobs() >= 1);
    }

    #[test]
    fn test_run_jobs_empty() {
        let items: Vec<u32> = vec![];
        assert!(run_jobs(4, &items, |x| x * 2).is_empty());
    }

    #[test]
    fn test_run_jobs_preserves_order() {
        let items: Vec<u64> = (0..32).collect();
        let results = run_jobs(4, &items, |x| {
            // Later items finish first
            thread::sleep(Duration::from_millis(32 - x));
            x * 10
        });
        assert_eq!(results, items.iter().map(|x| x * 10).collect::<Vec<_>>());
    }

    #[test]
    fn test_run_jobs_uses_multiple_threads() {
        let items: Vec<u32> = (0..8).collect();
        let ids = run_jobs(4, &items, |_| {
            thread::sleep(Duration::from_millis(20));
            thread::current().id()
        });
        let distinct: HashSet<_> = ids.into_iter().collect();
        assert!(distinct.len() > 1);
    }

    #[test]
    fn test_run_jobs_sequential_when_single_job() {
        let items: Vec<u32> = (0..5).collect();
        let main_thread = thread::current().id();
        let ids = run_jobs(1, &items, |_| thread::current().id());
        assert!(ids.iter().all(|id| *id == main_thread));
    }
}

//! Bounded worker pool for per-item agent calls (`moveto`, `rmdirs` roots).
//! At most `action_threads` workers run concurrently, each holding one live
//! child process at a time.

use std::sync::Mutex;

/// Runs `work` once per item in `items`, using at most `workers` concurrent
/// threads, and returns the results in the same order as `items`.
///
/// Each call to `work` is independent; a panic inside one is propagated
/// after all threads have been joined (via `thread::scope`'s own
/// panic-propagation), matching the "workers execute to completion
/// concurrently" contract rather than an early-abort pool.
pub fn run_bounded<T, R, F>(items: &[T], workers: usize, work: F) -> Vec<R>
where
    T: Sync,
    R: Send,
    F: Fn(&T) -> R + Sync,
{
    let workers = workers.max(1);
    let results: Vec<Mutex<Option<R>>> = items.iter().map(|_| Mutex::new(None)).collect();
    let next = std::sync::atomic::AtomicUsize::new(0);

    std::thread::scope(|scope| {
        for _ in 0..workers.min(items.len().max(1)) {
            scope.spawn(|| loop {
                let i = next.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                if i >= items.len() {
                    break;
                }
                let r = work(&items[i]);
                *results[i].lock().unwrap_or_else(std::sync::PoisonError::into_inner) = Some(r);
            });
        }
    });

    results
        .into_iter()
        .map(|m| m.into_inner().unwrap_or_else(std::sync::PoisonError::into_inner).expect("every index visited exactly once"))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn runs_every_item_exactly_once() {
        let items: Vec<i32> = (0..20).collect();
        let seen = AtomicUsize::new(0);
        let results = run_bounded(&items, 4, |x| {
            seen.fetch_add(1, Ordering::SeqCst);
            x * 2
        });
        assert_eq!(seen.load(Ordering::SeqCst), 20);
        assert_eq!(results, (0..20).map(|x| x * 2).collect::<Vec<_>>());
    }

    #[test]
    fn empty_input_returns_empty() {
        let items: Vec<i32> = Vec::new();
        let results = run_bounded(&items, 4, |x| *x);
        assert!(results.is_empty());
    }

    #[test]
    fn clamps_worker_count_to_at_least_one() {
        let items = vec![1, 2, 3];
        let results = run_bounded(&items, 0, |x| *x);
        assert_eq!(results, vec![1, 2, 3]);
    }
}

//! Bounded worker pool over fields of view.

use crate::error::ConfigError;
use rayon::prelude::*;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

/// Cooperative cancellation, checked before each item starts.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> CancelToken {
        CancelToken::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed)
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub completed: usize,
    pub total: usize,
}

#[derive(Debug, Clone, Default)]
pub struct BatchOptions {
    /// worker threads, rayon's default when unset
    pub threads: Option<usize>,
    pub cancel: CancelToken,
}

#[derive(Debug)]
pub struct BatchOutcome<T> {
    /// results of the items that ran, in input order
    pub results: Vec<T>,
    pub cancelled: bool,
}

/// Run `work` over every item on a dedicated pool. `progress` is called once
/// per finished item, from the worker that finished it.
pub fn run_batch<I, T, F, P>(
    items: &[I],
    options: &BatchOptions,
    work: F,
    progress: P,
) -> Result<BatchOutcome<T>, ConfigError>
where
    I: Sync,
    T: Send,
    F: Fn(&I) -> T + Sync,
    P: Fn(Progress) + Sync,
{
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(options.threads.unwrap_or(0))
        .build()?;
    let total = items.len();
    let completed = AtomicUsize::new(0);
    let cancel = &options.cancel;

    let slots = pool.install(|| {
        items
            .par_iter()
            .map(|item| {
                if cancel.is_cancelled() {
                    return None;
                }
                let out = work(item);
                let done = completed.fetch_add(1, Ordering::SeqCst) + 1;
                progress(Progress {
                    completed: done,
                    total,
                });
                Some(out)
            })
            .collect::<Vec<_>>()
    });

    let cancelled = slots.iter().any(|s| s.is_none());
    if cancelled {
        log::warn!(
            "batch cancelled after {} of {} items",
            completed.load(Ordering::SeqCst),
            total
        );
    }
    Ok(BatchOutcome {
        results: slots.into_iter().flatten().collect(),
        cancelled,
    })
}

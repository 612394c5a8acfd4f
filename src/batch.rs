//! Bounded fan-out of independent work items
//!
//! Supports:
//! - A fixed number of in-flight items per pool
//! - Cooperative cancellation: once raised, no new items are dispatched but
//!   in-flight items run to completion
//! - Partial-result reporting via [`BatchOutcome::is_complete`]

use futures::stream::{self, StreamExt};
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::FissionError;

/// Shared cancellation signal
#[derive(Debug, Clone, Default)]
pub struct CancelFlag {
    inner: Arc<AtomicBool>,
}

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stop dispatching new work on every pool sharing this flag
    pub fn cancel(&self) {
        self.inner.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.load(Ordering::SeqCst)
    }
}

/// Results of one bounded fan-out
#[derive(Debug, Clone)]
pub struct BatchOutcome<T> {
    /// One result per dispatched item, in completion order
    pub items: Vec<T>,
    /// Number of items that were started
    pub dispatched: usize,
    /// Number of items submitted
    pub total: usize,
}

impl<T> BatchOutcome<T> {
    /// False when cancellation kept some items from being dispatched
    pub fn is_complete(&self) -> bool {
        self.dispatched == self.total
    }
}

/// Run `f` over `items` with at most `width` in flight, waiting for all of them.
///
/// A width of zero is a setup error. Items not yet started when `cancel` is
/// raised are skipped and reflected in the outcome's counts.
pub async fn run_bounded<I, T, F, Fut>(
    pool: &'static str,
    items: Vec<I>,
    width: usize,
    cancel: &CancelFlag,
    f: F,
) -> Result<BatchOutcome<T>, FissionError>
where
    F: Fn(I) -> Fut,
    Fut: Future<Output = T>,
{
    if width == 0 {
        return Err(FissionError::InvalidPoolWidth { pool });
    }

    let total = items.len();
    let dispatched = AtomicUsize::new(0);

    debug!("Dispatching {} items on '{}' pool (width: {})", total, pool, width);

    let results: Vec<T> = stream::iter(items)
        .take_while(|_| futures::future::ready(!cancel.is_cancelled()))
        .map(|item| {
            dispatched.fetch_add(1, Ordering::SeqCst);
            f(item)
        })
        .buffer_unordered(width)
        .collect()
        .await;

    let outcome = BatchOutcome {
        items: results,
        dispatched: dispatched.load(Ordering::SeqCst),
        total,
    };

    if !outcome.is_complete() {
        warn!(
            "'{}' pool cancelled: {} of {} items dispatched",
            pool, outcome.dispatched, outcome.total
        );
    }

    Ok(outcome)
}

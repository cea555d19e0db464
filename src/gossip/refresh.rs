//! When to run a gossip cycle, and making sure only one runs at a time.
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::Instant;
use tracing::debug;

#[derive(Debug, Default)]
struct RefreshInner {
    last_refresh: Option<Instant>,
    last_updated: DateTime<Utc>,
    invalidated: bool,
    refreshing: bool,
    cycles: u64,
}

/// Staleness timer, invalidation flag and the single-refresh guard.
#[derive(Debug)]
pub struct RefreshState {
    staleness_window: Duration,
    inner: Mutex<RefreshInner>,
}

/// Exclusive right to run one cycle.
///
/// Dropping it without [`RefreshTicket::complete`] (failed or cancelled
/// cycle) releases the guard and restores the invalidation it consumed.
#[derive(Debug)]
pub struct RefreshTicket {
    refresh: Arc<RefreshState>,
    was_invalidated: bool,
    completed: bool,
}

impl RefreshState {
    pub fn new(staleness_window: Duration) -> Self {
        Self {
            staleness_window,
            inner: Mutex::new(RefreshInner::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, RefreshInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Force the next read to run a cycle
    pub fn invalidate(&self) {
        self.lock().invalidated = true;
    }

    pub fn is_invalidated(&self) -> bool {
        self.lock().invalidated
    }

    pub fn is_refreshing(&self) -> bool {
        self.lock().refreshing
    }

    pub fn is_stale(&self) -> bool {
        let inner = self.lock();
        self.stale(&inner)
    }

    fn stale(&self, inner: &RefreshInner) -> bool {
        inner
            .last_refresh
            .map(|at| at.elapsed() > self.staleness_window)
            .unwrap_or(true)
    }

    /// Wall-clock time of the last completed cycle (epoch if none yet)
    pub fn last_updated(&self) -> DateTime<Utc> {
        self.lock().last_updated
    }

    /// Number of completed cycles
    pub fn cycles(&self) -> u64 {
        self.lock().cycles
    }

    /// Claim the next cycle if one is due and none is running.
    pub fn try_begin(self: &Arc<Self>) -> Option<RefreshTicket> {
        let mut inner = self.lock();
        if inner.refreshing {
            debug!("Refresh already running, serving known peers");
            return None;
        }
        if !(inner.invalidated || self.stale(&inner)) {
            return None;
        }
        let was_invalidated = inner.invalidated;
        inner.refreshing = true;
        inner.invalidated = false;
        Some(RefreshTicket {
            refresh: self.clone(),
            was_invalidated,
            completed: false,
        })
    }
}

impl RefreshTicket {
    /// The cycle was forced by an invalidation rather than the timer
    pub fn was_invalidated(&self) -> bool {
        self.was_invalidated
    }

    /// Record a finished cycle. Discovering new peers re-arms the
    /// invalidation so they get a cycle of their own.
    pub fn complete(mut self, discovered_new_peers: bool) {
        let mut inner = self.refresh.lock();
        inner.last_refresh = Some(Instant::now());
        inner.last_updated = Utc::now();
        inner.invalidated = inner.invalidated || discovered_new_peers;
        inner.refreshing = false;
        inner.cycles += 1;
        self.completed = true;
    }
}

impl Drop for RefreshTicket {
    fn drop(&mut self) {
        if !self.completed {
            let mut inner = self.refresh.lock();
            inner.refreshing = false;
            inner.invalidated = inner.invalidated || self.was_invalidated;
        }
    }
}

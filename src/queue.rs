//! Closeable work queue shared by a pool of worker tasks.
//!
//! Every item handed out by [`WorkQueue::get`] must be acknowledged with
//! [`WorkQueue::task_done`], or [`WorkQueue::join`] never returns. Workers
//! exit when `get` yields `None`, which happens once the queue is closed and
//! empty.
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::Notify;

#[derive(Debug)]
struct QueueState<T> {
    items: VecDeque<T>,
    unfinished: usize,
    closed: bool,
}

#[derive(Debug)]
pub struct WorkQueue<T> {
    state: Mutex<QueueState<T>>,
    item_ready: Notify,
    drained: Notify,
}

impl<T> Default for WorkQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> WorkQueue<T> {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(QueueState {
                items: VecDeque::new(),
                unfinished: 0,
                closed: false,
            }),
            item_ready: Notify::new(),
            drained: Notify::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, QueueState<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Enqueue an item. Once closed the item is handed back.
    pub fn put(&self, item: T) -> Result<(), T> {
        {
            let mut state = self.lock();
            if state.closed {
                return Err(item);
            }
            state.items.push_back(item);
            state.unfinished += 1;
        }
        self.item_ready.notify_one();
        Ok(())
    }

    /// Wait for the next item; `None` once the queue is closed and empty.
    pub async fn get(&self) -> Option<T> {
        loop {
            // Registered before checking so a concurrent put/close is never missed
            let notified = self.item_ready.notified();
            {
                let mut state = self.lock();
                if let Some(item) = state.items.pop_front() {
                    let more = !state.items.is_empty();
                    drop(state);
                    if more {
                        self.item_ready.notify_one();
                    }
                    return Some(item);
                }
                if state.closed {
                    return None;
                }
            }
            notified.await;
        }
    }

    /// Mark one previously fetched item as fully processed.
    pub fn task_done(&self) {
        let finished = {
            let mut state = self.lock();
            state.unfinished = state.unfinished.saturating_sub(1);
            state.unfinished == 0
        };
        if finished {
            self.drained.notify_waiters();
        }
    }

    /// Wait until every item put so far has been marked done.
    pub async fn join(&self) {
        loop {
            let notified = self.drained.notified();
            if self.lock().unfinished == 0 {
                return;
            }
            notified.await;
        }
    }

    /// Stop accepting items and release every worker blocked in `get`.
    pub fn close(&self) {
        self.lock().closed = true;
        self.item_ready.notify_waiters();
    }

    pub fn len(&self) -> usize {
        self.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Items put but not yet marked done
    pub fn unfinished(&self) -> usize {
        self.lock().unfinished
    }
}

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use exo_core::ResourceIdentity;
use tokio::sync::Notify;
use tokio::time::Instant;

use crate::backoff::Backoff;
use crate::ratelimit::RateLimiter;

/// Work queue keyed by resource identity.
///
/// Per identity: `Idle → Queued → Running → (Idle | Queued)`.
/// - An identity is pending at most once; repeated adds collapse.
/// - An identity added while running is parked as dirty and only becomes
///   ready after `done`, so two reconciles of one identity never overlap.
/// - Delayed adds wait in a heap; a later delayed add never pushes an
///   earlier deadline back.
/// - Ready identities are served FIFO, gated by a global rate limiter.
pub struct WorkQueue {
    state: Mutex<QueueState>,
    notify: Notify,
    backoff: Backoff,
    limiter: RateLimiter,
}

#[derive(Default)]
struct QueueState {
    ready: VecDeque<ResourceIdentity>,
    /// Needs a reconcile: in `ready`, or parked while running.
    dirty: HashSet<ResourceIdentity>,
    running: HashSet<ResourceIdentity>,
    waiting: BinaryHeap<Reverse<Delayed>>,
    /// Earliest deadline per waiting identity; heap entries that don't
    /// match are stale.
    deadlines: HashMap<ResourceIdentity, Instant>,
    failures: HashMap<ResourceIdentity, u32>,
    seq: u64,
    shutting_down: bool,
}

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
struct Delayed {
    at: Instant,
    seq: u64,
    identity: ResourceIdentity,
}

impl QueueState {
    /// Returns true when the identity became ready to hand out.
    fn insert(&mut self, identity: ResourceIdentity) -> bool {
        if self.shutting_down || self.dirty.contains(&identity) {
            return false;
        }
        self.dirty.insert(identity.clone());
        if self.running.contains(&identity) {
            return false;
        }
        self.ready.push_back(identity);
        true
    }

    fn promote(&mut self, now: Instant) {
        while let Some(Reverse(next)) = self.waiting.peek() {
            if next.at > now {
                break;
            }
            let Some(Reverse(due)) = self.waiting.pop() else {
                break;
            };
            if self.deadlines.get(&due.identity) == Some(&due.at) {
                self.deadlines.remove(&due.identity);
                self.insert(due.identity);
            }
        }
    }

    fn next_deadline(&self) -> Option<Instant> {
        self.waiting.peek().map(|Reverse(d)| d.at)
    }
}

impl WorkQueue {
    pub fn new(backoff: Backoff, limiter: RateLimiter) -> Self {
        Self {
            state: Mutex::new(QueueState::default()),
            notify: Notify::new(),
            backoff,
            limiter,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Queue the identity for an immediate reconcile.
    pub fn add(&self, identity: ResourceIdentity) {
        if self.lock().insert(identity) {
            self.notify.notify_one();
        }
    }

    /// Queue the identity once `delay` has passed.
    pub fn add_after(&self, identity: ResourceIdentity, delay: Duration) {
        if delay.is_zero() {
            return self.add(identity);
        }
        let at = Instant::now() + delay;
        {
            let mut state = self.lock();
            if state.shutting_down {
                return;
            }
            if state.deadlines.get(&identity).is_some_and(|&t| t <= at) {
                return;
            }
            state.seq += 1;
            let seq = state.seq;
            state.deadlines.insert(identity.clone(), at);
            state.waiting.push(Reverse(Delayed { at, seq, identity }));
        }
        // Sleeping workers re-arm their timer against the new deadline.
        self.notify.notify_one();
    }

    /// Record a failure and queue the identity after its backoff delay.
    pub fn add_rate_limited(&self, identity: ResourceIdentity) -> Duration {
        let delay = {
            let mut state = self.lock();
            let failures = state.failures.entry(identity.clone()).or_insert(0);
            *failures = failures.saturating_add(1);
            self.backoff.delay(*failures)
        };
        self.add_after(identity, delay);
        delay
    }

    /// Reset the identity's backoff to the floor.
    pub fn forget(&self, identity: &ResourceIdentity) {
        self.lock().failures.remove(identity);
    }

    /// Drop the identity's pending delayed add and its backoff. Its heap
    /// entry goes stale and is skipped when due.
    pub fn cancel(&self, identity: &ResourceIdentity) {
        let mut state = self.lock();
        state.deadlines.remove(identity);
        state.failures.remove(identity);
    }

    /// Consecutive failures recorded for the identity.
    pub fn failures(&self, identity: &ResourceIdentity) -> u32 {
        self.lock().failures.get(identity).copied().unwrap_or(0)
    }

    /// Wait for the next ready identity and mark it running. Returns `None`
    /// once the queue is shut down.
    pub async fn next(&self) -> Option<ResourceIdentity> {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let (claimed, wake_at) = {
                let mut state = self.lock();
                if state.shutting_down {
                    return None;
                }
                state.promote(Instant::now());
                match state.ready.pop_front() {
                    Some(identity) => {
                        state.dirty.remove(&identity);
                        state.running.insert(identity.clone());
                        let more = !state.ready.is_empty();
                        (Some((identity, more)), None)
                    }
                    None => (None, state.next_deadline()),
                }
            };

            if let Some((identity, more)) = claimed {
                if more {
                    self.notify.notify_one();
                }
                self.limiter.acquire().await;
                return Some(identity);
            }

            match wake_at {
                Some(at) => {
                    tokio::select! {
                        _ = &mut notified => {}
                        _ = tokio::time::sleep_until(at) => {}
                    }
                }
                None => notified.await,
            }
        }
    }

    /// Mark the identity's reconcile finished. If it was re-added meanwhile
    /// it becomes ready now.
    pub fn done(&self, identity: &ResourceIdentity) {
        let requeued = {
            let mut state = self.lock();
            state.running.remove(identity);
            if state.dirty.contains(identity) && !state.shutting_down {
                state.ready.push_back(identity.clone());
                true
            } else {
                false
            }
        };
        if requeued {
            self.notify.notify_one();
        }
    }

    pub fn is_running(&self, identity: &ResourceIdentity) -> bool {
        self.lock().running.contains(identity)
    }

    /// Identities ready to be handed out right now.
    pub fn len(&self) -> usize {
        self.lock().ready.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Identities waiting on a delay.
    pub fn delayed(&self) -> usize {
        self.lock().deadlines.len()
    }

    pub fn shutdown(&self) {
        self.lock().shutting_down = true;
        self.notify.notify_waiters();
    }
}

//! Counting semaphore bounding how many handlers run at once.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::oneshot;

/// Admission control with a fixed number of permits and a FIFO wait list.
///
/// A release hands its permit straight to the oldest waiter instead of
/// returning it to the pool, so a waiter never has to re-check availability.
#[derive(Debug, Clone)]
pub struct ConcurrencyGate {
    inner: Arc<GateInner>,
}

#[derive(Debug)]
struct GateInner {
    capacity: usize,
    state: Mutex<GateState>,
}

#[derive(Debug)]
struct GateState {
    available: usize,
    waiters: VecDeque<oneshot::Sender<()>>,
}

impl ConcurrencyGate {
    pub const DEFAULT_CAPACITY: usize = 10;

    /// Create a gate with `capacity` permits.
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(GateInner {
                capacity,
                state: Mutex::new(GateState {
                    available: capacity,
                    waiters: VecDeque::new(),
                }),
            }),
        }
    }

    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }

    /// Permits not currently held.
    pub fn available_permits(&self) -> usize {
        self.lock().available
    }

    /// Callers suspended in [`acquire`](Self::acquire).
    pub fn waiting(&self) -> usize {
        self.lock()
            .waiters
            .iter()
            .filter(|waiter| !waiter.is_closed())
            .count()
    }

    /// Take a permit, waiting in line when none is free.
    ///
    /// There is no timeout. Dropping the returned permit releases it.
    pub async fn acquire(&self) -> GatePermit {
        let rx = {
            let mut state = self.lock();
            if state.available > 0 {
                state.available -= 1;
                return self.permit();
            }

            let (tx, rx) = oneshot::channel();
            state.waiters.push_back(tx);
            rx
        };

        let mut waiter = Waiter {
            gate: self,
            rx: Some(rx),
        };
        waiter.wait().await;

        self.permit()
    }

    fn permit(&self) -> GatePermit {
        GatePermit { gate: self.clone() }
    }

    fn release(&self) {
        let mut state = self.lock();
        while let Some(waiter) = state.waiters.pop_front() {
            // A closed waiter gave up its place; try the next one.
            if waiter.send(()).is_ok() {
                return;
            }
        }
        state.available += 1;
    }

    fn lock(&self) -> MutexGuard<'_, GateState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for ConcurrencyGate {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAPACITY)
    }
}

/// A held permit. Released on drop, including on panic unwinding.
#[derive(Debug)]
#[must_use = "the permit is released as soon as it is dropped"]
pub struct GatePermit {
    gate: ConcurrencyGate,
}

impl Drop for GatePermit {
    fn drop(&mut self) {
        self.gate.release();
    }
}

/// A queued acquire. If it is dropped after a permit was handed to it,
/// the permit moves on to the next waiter.
struct Waiter<'a> {
    gate: &'a ConcurrencyGate,
    rx: Option<oneshot::Receiver<()>>,
}

impl Waiter<'_> {
    async fn wait(&mut self) {
        if let Some(rx) = self.rx.as_mut() {
            // The sender stays in the wait list until a release uses it.
            let _ = rx.await;
        }
        self.rx = None;
    }
}

impl Drop for Waiter<'_> {
    fn drop(&mut self) {
        if let Some(mut rx) = self.rx.take() {
            rx.close();
            if rx.try_recv().is_ok() {
                self.gate.release();
            }
        }
    }
}

// Readiness gate: defers writes until the backing document is loaded.
//
// States:
//   NotReady(queue) → (declare_ready) → Draining(queue) → Ready
//   any             → (reset)         → NotReady(empty)
//
// While not ready, `run` parks its caller in a FIFO queue. Draining hands
// the serial lock to each parked caller in submission order, one at a
// time, so queued writes run exactly once and never interleave. Once
// ready, callers take the same lock directly. A reset discards parked
// callers; they observe `GateError::Discarded`.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

use thiserror::Error;
use tokio::sync::{oneshot, Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum GateError {
    #[error("queued action was discarded by a reset")]
    Discarded,
}

type Turn = oneshot::Sender<OwnedMutexGuard<()>>;

enum GateState {
    NotReady(VecDeque<Turn>),
    Draining(VecDeque<Turn>),
    Ready,
}

struct GateCore {
    phase: GateState,
    /// Bumped by every reset so a drain started earlier stops handing out turns.
    epoch: u64,
}

struct GateInner {
    state: Mutex<GateCore>,
    serial: Arc<AsyncMutex<()>>,
}

#[derive(Clone)]
pub struct ReadinessGate {
    inner: Arc<GateInner>,
}

impl Default for ReadinessGate {
    fn default() -> Self {
        Self::new()
    }
}

impl ReadinessGate {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(GateInner {
                state: Mutex::new(GateCore {
                    phase: GateState::NotReady(VecDeque::new()),
                    epoch: 0,
                }),
                serial: Arc::new(AsyncMutex::new(())),
            }),
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.lock_state().phase, GateState::Ready)
    }

    /// Number of callers parked until the gate opens.
    pub fn queued(&self) -> usize {
        match &self.lock_state().phase {
            GateState::NotReady(queue) | GateState::Draining(queue) => queue.len(),
            GateState::Ready => 0,
        }
    }

    /// Run `action` once the gate is ready, serialized with every other
    /// action passing through this gate.
    pub async fn run<T, F, Fut>(&self, action: F) -> Result<T, GateError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let parked = {
            let mut state = self.lock_state();
            match &mut state.phase {
                GateState::NotReady(queue) | GateState::Draining(queue) => {
                    let (tx, rx) = oneshot::channel();
                    queue.push_back(tx);
                    debug!(queued = queue.len(), "action parked until ready");
                    Some(rx)
                }
                GateState::Ready => None,
            }
        };

        let _turn = match parked {
            Some(rx) => rx.await.map_err(|_| GateError::Discarded)?,
            None => Arc::clone(&self.inner.serial).lock_owned().await,
        };
        Ok(action().await)
    }

    /// Open the gate, running parked actions first in submission order.
    ///
    /// Returns once every parked action has been handed its turn. Calling
    /// it on an open gate does nothing.
    pub async fn declare_ready(&self) {
        let epoch = {
            let mut state = self.lock_state();
            match std::mem::replace(&mut state.phase, GateState::Ready) {
                GateState::NotReady(queue) => {
                    info!(queued = queue.len(), "backing document ready");
                    state.phase = GateState::Draining(queue);
                    state.epoch
                }
                draining @ GateState::Draining(_) => {
                    // Another caller is already draining.
                    state.phase = draining;
                    return;
                }
                GateState::Ready => return,
            }
        };

        loop {
            let guard = Arc::clone(&self.inner.serial).lock_owned().await;
            let next = {
                let mut state = self.lock_state();
                if state.epoch != epoch {
                    return;
                }
                match &mut state.phase {
                    GateState::Draining(queue) => match queue.pop_front() {
                        Some(turn) => turn,
                        None => {
                            state.phase = GateState::Ready;
                            return;
                        }
                    },
                    _ => return,
                }
            };
            if next.send(guard).is_err() {
                debug!("parked caller went away before its turn");
            }
        }
    }

    /// Close the gate and discard parked actions.
    pub fn reset(&self) {
        let previous = {
            let mut state = self.lock_state();
            state.epoch += 1;
            std::mem::replace(&mut state.phase, GateState::NotReady(VecDeque::new()))
        };
        if let GateState::NotReady(queue) | GateState::Draining(queue) = previous {
            if !queue.is_empty() {
                info!(discarded = queue.len(), "readiness gate reset");
            }
        }
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, GateCore> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

//! Single-threaded UI scheduling.
//!
//! All view state lives on one thread, the UI thread, inside a [`UiLoop`].
//! Other threads never touch it directly: they hold a cloneable [`UiHandle`]
//! and enqueue closures that the loop later runs with `&mut S`. Jobs from a
//! single enqueuer run in the order they were sent.
//!
//! A toolkit main loop can call [`UiLoop::run_pending`] from its idle hook;
//! headless hosts and tests drive [`UiLoop::turn`] or [`UiLoop::run`].

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::future::Future;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::time::Instant;
use tracing::{debug, error};

/// A closure to run on the UI thread.
pub type UiJob<S> = Box<dyn FnOnce(&mut S) + Send + 'static>;

enum Envelope<S> {
    Now(UiJob<S>),
    At(Instant, UiJob<S>),
}

/// Create a connected handle/loop pair. Worker jobs run on `runtime`.
pub fn channel<S: 'static>(runtime: Handle) -> (UiHandle<S>, UiLoop<S>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (
        UiHandle { tx, runtime },
        UiLoop {
            rx,
            timers: BinaryHeap::new(),
            seq: 0,
            closed: false,
        },
    )
}

// ---------------------------------------------------------------------------
// Handle
// ---------------------------------------------------------------------------

/// Sending side of the UI queue. Cheap to clone, usable from any thread.
pub struct UiHandle<S> {
    tx: mpsc::UnboundedSender<Envelope<S>>,
    runtime: Handle,
}

impl<S> Clone for UiHandle<S> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            runtime: self.runtime.clone(),
        }
    }
}

impl<S: 'static> UiHandle<S> {
    /// Enqueue `job` for the UI thread. Returns `false` if the loop is gone.
    pub fn run_on_ui<F>(&self, job: F) -> bool
    where
        F: FnOnce(&mut S) + Send + 'static,
    {
        self.send(Envelope::Now(Box::new(job)))
    }

    /// Enqueue `job` to run once `delay` has elapsed.
    pub fn run_after_ui<F>(&self, delay: Duration, job: F) -> bool
    where
        F: FnOnce(&mut S) + Send + 'static,
    {
        self.send(Envelope::At(Instant::now() + delay, Box::new(job)))
    }

    /// Run blocking `work` on a worker thread, then hand its result to
    /// `apply` on the UI thread.
    ///
    /// A panicking worker is logged and its `apply` never runs.
    pub fn spawn_async<T, W, A>(&self, task: &'static str, work: W, apply: A)
    where
        T: Send + 'static,
        W: FnOnce() -> T + Send + 'static,
        A: FnOnce(&mut S, T) + Send + 'static,
    {
        let ui = self.clone();
        self.runtime.spawn(async move {
            match tokio::task::spawn_blocking(work).await {
                Ok(value) => {
                    ui.run_on_ui(move |state| apply(state, value));
                }
                Err(e) => error!(task, error = %e, "Worker task failed"),
            }
        });
    }

    /// Like [`spawn_async`](Self::spawn_async) for non-blocking futures.
    pub fn spawn_future<T, Fut, A>(&self, future: Fut, apply: A)
    where
        T: Send + 'static,
        Fut: Future<Output = T> + Send + 'static,
        A: FnOnce(&mut S, T) + Send + 'static,
    {
        let ui = self.clone();
        self.runtime.spawn(async move {
            let value = future.await;
            ui.run_on_ui(move |state| apply(state, value));
        });
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    fn send(&self, envelope: Envelope<S>) -> bool {
        if self.tx.send(envelope).is_err() {
            debug!("UI loop is gone, dropping job");
            return false;
        }
        true
    }
}

// ---------------------------------------------------------------------------
// Loop
// ---------------------------------------------------------------------------

struct Timer<S> {
    deadline: Instant,
    seq: u64,
    job: UiJob<S>,
}

impl<S> PartialEq for Timer<S> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl<S> Eq for Timer<S> {}

impl<S> PartialOrd for Timer<S> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<S> Ord for Timer<S> {
    // Reversed so the max-heap pops the earliest deadline first.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .deadline
            .cmp(&self.deadline)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Receiving side of the UI queue; owned by the UI thread.
pub struct UiLoop<S> {
    rx: mpsc::UnboundedReceiver<Envelope<S>>,
    timers: BinaryHeap<Timer<S>>,
    seq: u64,
    closed: bool,
}

impl<S> UiLoop<S> {
    /// Run every job that is ready right now, including due timers.
    /// Returns the number of jobs run.
    pub fn run_pending(&mut self, state: &mut S) -> usize {
        let mut ran = 0;
        loop {
            match self.rx.try_recv() {
                Ok(envelope) => ran += self.dispatch(envelope, state),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.closed = true;
                    break;
                }
            }
        }
        ran + self.run_due_timers(state)
    }

    /// Wait for at least one job (or timer) and run everything ready.
    /// Returns `false` once no job can ever arrive again.
    pub async fn turn(&mut self, state: &mut S) -> bool {
        if self.run_pending(state) > 0 {
            return true;
        }

        let deadline = self.timers.peek().map(|t| t.deadline);
        if self.closed {
            return match deadline {
                Some(deadline) => {
                    tokio::time::sleep_until(deadline).await;
                    self.run_due_timers(state);
                    true
                }
                None => false,
            };
        }

        let received = match deadline {
            Some(deadline) => tokio::select! {
                envelope = self.rx.recv() => Some(envelope),
                _ = tokio::time::sleep_until(deadline) => None,
            },
            None => Some(self.rx.recv().await),
        };

        match received {
            Some(Some(envelope)) => {
                self.dispatch(envelope, state);
            }
            Some(None) => self.closed = true,
            None => {}
        }
        self.run_pending(state);
        true
    }

    /// Drive the loop until every handle is dropped and no timer remains.
    pub async fn run(mut self, mut state: S) -> S {
        while self.turn(&mut state).await {}
        state
    }

    pub fn pending_timers(&self) -> usize {
        self.timers.len()
    }

    fn dispatch(&mut self, envelope: Envelope<S>, state: &mut S) -> usize {
        match envelope {
            Envelope::Now(job) => {
                job(state);
                1
            }
            Envelope::At(deadline, job) => {
                self.seq += 1;
                self.timers.push(Timer {
                    deadline,
                    seq: self.seq,
                    job,
                });
                0
            }
        }
    }

    fn run_due_timers(&mut self, state: &mut S) -> usize {
        let now = Instant::now();
        let mut ran = 0;
        while self.timers.peek().is_some_and(|t| t.deadline <= now) {
            if let Some(timer) = self.timers.pop() {
                (timer.job)(state);
                ran += 1;
            }
        }
        ran
    }
}

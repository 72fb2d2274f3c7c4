//! Interruptible task scheduler
//!
//! A [`Scheduler`] runs one long-lived body on the tokio runtime and lets
//! any holder of a handle wake that body early from a sleep with a typed
//! payload. Lifecycle is linear: `Preparing -> Running -> Stopped`.
//!
//! ```rust,ignore
//! let scheduler = Scheduler::<WakeReason>::new("ddns");
//! let handle = scheduler.start(|s| async move {
//!     loop {
//!         match s.sleep(Duration::from_secs(60)).await {
//!             Ok(()) => { /* periodic work */ }
//!             Err(SleepError::Interrupted(reason)) => { /* react */ }
//!             Err(SleepError::AlreadySleeping) => anyhow::bail!("two sleepers"),
//!         }
//!     }
//! })?;
//! scheduler.interrupt(WakeReason::RunNow)?;
//! ```
//!
//! An interrupt raised while nobody sleeps is kept and consumed by the next
//! sleep, which then returns immediately. Only the latest undelivered
//! payload is kept.

use parking_lot::Mutex;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, error};

/// Lifecycle of a scheduled task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Preparing,
    Running,
    Stopped,
}

/// Misuse of a scheduler handle
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerError {
    #[error("task has already been started")]
    AlreadyStarted,

    #[error("task is not running")]
    NotRunning,
}

/// Why a sleep ended early
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SleepError<P> {
    /// Another sleep on the same task is in progress
    #[error("task is already sleeping")]
    AlreadySleeping,

    /// Woken by [`Scheduler::interrupt`]
    #[error("sleep was interrupted")]
    Interrupted(P),
}

type ErrorHandler = Arc<dyn Fn(&str, &anyhow::Error) + Send + Sync>;

struct Sleeper {
    ticket: u64,
    wake: oneshot::Sender<()>,
}

struct Shared<P> {
    state: TaskState,
    pending: Option<P>,
    sleeper: Option<Sleeper>,
    next_ticket: u64,
}

struct Inner<P> {
    name: String,
    shared: Mutex<Shared<P>>,
    on_error: ErrorHandler,
}

/// Cloneable handle to one scheduled task
pub struct Scheduler<P> {
    inner: Arc<Inner<P>>,
}

impl<P> Clone for Scheduler<P> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<P> fmt::Debug for Scheduler<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let shared = self.inner.shared.lock();
        f.debug_struct("Scheduler")
            .field("name", &self.inner.name)
            .field("state", &shared.state)
            .field("sleeping", &shared.sleeper.is_some())
            .field("pending", &shared.pending.is_some())
            .finish()
    }
}

impl<P: Send + 'static> Scheduler<P> {
    /// Create a scheduler whose uncaught errors are logged
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_error_handler(name, |task, err| {
            error!(task, "uncaught error in task: {:#}", err);
        })
    }

    /// Create a scheduler with a custom handler for uncaught errors
    pub fn with_error_handler(
        name: impl Into<String>,
        handler: impl Fn(&str, &anyhow::Error) + Send + Sync + 'static,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                name: name.into(),
                shared: Mutex::new(Shared {
                    state: TaskState::Preparing,
                    pending: None,
                    sleeper: None,
                    next_ticket: 0,
                }),
                on_error: Arc::new(handler),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn state(&self) -> TaskState {
        self.inner.shared.lock().state
    }

    pub fn is_sleeping(&self) -> bool {
        self.inner.shared.lock().sleeper.is_some()
    }

    /// Spawn `body` on the current runtime
    ///
    /// The body receives a handle to this scheduler. An error returned by
    /// the body, or a panic inside it, is passed to the error handler; the
    /// task is `Stopped` afterwards either way.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start<F, Fut>(&self, body: F) -> Result<JoinHandle<()>, SchedulerError>
    where
        F: FnOnce(Scheduler<P>) -> Fut,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        {
            let mut shared = self.inner.shared.lock();
            if shared.state != TaskState::Preparing {
                return Err(SchedulerError::AlreadyStarted);
            }
            shared.state = TaskState::Running;
        }
        debug!(task = %self.inner.name, "task started");

        let body = tokio::spawn(body(self.clone()));
        let inner = Arc::clone(&self.inner);
        Ok(tokio::spawn(async move {
            let outcome = match body.await {
                Ok(result) => result,
                Err(join_err) if join_err.is_panic() => {
                    Err(anyhow::anyhow!("task panicked: {join_err}"))
                }
                Err(join_err) => Err(anyhow::anyhow!("task was cancelled: {join_err}")),
            };

            {
                let mut shared = inner.shared.lock();
                shared.state = TaskState::Stopped;
                shared.pending = None;
            }
            debug!(task = %inner.name, "task stopped");

            if let Err(err) = outcome {
                (inner.on_error)(&inner.name, &err);
            }
        }))
    }

    /// Sleep for `duration` unless interrupted
    ///
    /// Returns immediately with [`SleepError::Interrupted`] when an interrupt
    /// is already pending. Cancelling the returned future leaves the task
    /// free to sleep again.
    pub async fn sleep(&self, duration: Duration) -> Result<(), SleepError<P>> {
        let (ticket, woken) = {
            let mut shared = self.inner.shared.lock();
            if shared.sleeper.is_some() {
                return Err(SleepError::AlreadySleeping);
            }
            if let Some(payload) = shared.pending.take() {
                return Err(SleepError::Interrupted(payload));
            }
            let (wake, woken) = oneshot::channel();
            shared.next_ticket += 1;
            let ticket = shared.next_ticket;
            shared.sleeper = Some(Sleeper { ticket, wake });
            (ticket, woken)
        };

        let guard = SleepGuard {
            inner: &self.inner,
            ticket,
        };
        tokio::select! {
            _ = tokio::time::sleep(duration) => {}
            _ = woken => {}
        }
        drop(guard);

        let payload = self.inner.shared.lock().pending.take();
        match payload {
            Some(payload) => Err(SleepError::Interrupted(payload)),
            None => Ok(()),
        }
    }

    /// Wake the sleeping body, or leave `payload` for its next sleep
    ///
    /// A newer payload replaces an undelivered older one.
    pub fn interrupt(&self, payload: P) -> Result<(), SchedulerError> {
        let mut shared = self.inner.shared.lock();
        if shared.state != TaskState::Running {
            return Err(SchedulerError::NotRunning);
        }
        if shared.pending.replace(payload).is_some() {
            debug!(task = %self.inner.name, "replaced an undelivered interrupt");
        }
        if let Some(sleeper) = shared.sleeper.take() {
            // receiver is gone only if the sleep was cancelled mid-flight
            let _ = sleeper.wake.send(());
        }
        Ok(())
    }
}

/// Clears the sleeper slot when a sleep ends or is cancelled
struct SleepGuard<'a, P> {
    inner: &'a Inner<P>,
    ticket: u64,
}

impl<P> Drop for SleepGuard<'_, P> {
    fn drop(&mut self) {
        let mut shared = self.inner.shared.lock();
        if shared
            .sleeper
            .as_ref()
            .is_some_and(|sleeper| sleeper.ticket == self.ticket)
        {
            shared.sleeper = None;
        }
    }
}

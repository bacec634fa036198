use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use homelink::request::TimerAction;

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use tokio_util::sync::CancellationToken;

use tracing::{error, info};

use crate::error::{Error, ErrorKind, Result};

/// Function invoked when a timer fires.
///
/// An error returned by the callback is logged and never retried.
pub type TimerCallback = Arc<dyn Fn(TimerAction) -> Result<()> + Send + Sync>;

#[derive(Debug)]
struct TimerRequest {
    duration: Duration,
    action: TimerAction,
    // Cancelled when all timers set before it are canceled.
    cancellation: CancellationToken,
}

/// A single-worker scheduler of delayed actions.
///
/// Timers are served one at a time in submission order: the worker waits
/// for the duration of a timer before moving to the next one.
///
/// Canceling all timers only affects the timers submitted so far, timers
/// submitted afterwards fire normally.
#[derive(Debug)]
pub struct TimerManager {
    sender: UnboundedSender<TimerRequest>,
    generation: Mutex<CancellationToken>,
    shutdown: CancellationToken,
}

impl TimerManager {
    /// Creates a [`TimerManager`] and spawns its worker.
    ///
    /// # Panics
    ///
    /// Panics when called outside of a `tokio` runtime.
    #[must_use]
    pub fn new(callback: TimerCallback) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        let shutdown = CancellationToken::new();

        // The worker terminates on shutdown, its handle is not needed.
        let _ = tokio::spawn(run_worker(receiver, callback, shutdown.clone()));

        Self {
            sender,
            generation: Mutex::new(CancellationToken::new()),
            shutdown,
        }
    }

    /// Schedules an action after the given number of seconds.
    ///
    /// # Errors
    ///
    /// An error is returned if the worker is not running anymore.
    pub fn set_timer(&self, seconds: u64, action: TimerAction) -> Result<()> {
        let cancellation = self
            .generation
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .child_token();

        self.sender
            .send(TimerRequest {
                duration: Duration::from_secs(seconds),
                action,
                cancellation,
            })
            .map_err(|_| Error::new(ErrorKind::TimerState, "Timer worker is not running."))?;

        info!("Timer set: `{action}` in {seconds}s");

        Ok(())
    }

    /// Cancels every timer submitted so far, including the one the worker
    /// is waiting on.
    pub fn cancel_all_timers(&self) {
        let mut generation = self
            .generation
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        generation.cancel();
        *generation = CancellationToken::new();

        info!("All timers canceled");
    }

    /// Stops the worker.
    ///
    /// Timers not fired yet are dropped.
    #[inline]
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }
}

impl Drop for TimerManager {
    fn drop(&mut self) {
        self.shutdown();
    }
}

async fn run_worker(
    mut receiver: UnboundedReceiver<TimerRequest>,
    callback: TimerCallback,
    shutdown: CancellationToken,
) {
    loop {
        let request = tokio::select! {
            // Stop the infinite loop
            () = shutdown.cancelled() => { break; }
            request = receiver.recv() => {
                let Some(request) = request else {
                    break;
                };
                request
            }
        };

        tokio::select! {
            () = shutdown.cancelled() => { break; }
            () = request.cancellation.cancelled() => {
                info!("Timer `{}` canceled", request.action);
                continue;
            }
            () = tokio::time::sleep(request.duration) => {}
        }

        if request.cancellation.is_cancelled() {
            continue;
        }

        info!("Timer fired: `{}`", request.action);

        if let Err(e) = callback(request.action) {
            error!("Timer action `{}` failed: {e}", request.action);
        }
    }
}

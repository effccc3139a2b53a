//! Fault boundary around client decision callbacks.
//!
//! A callback that panics or overruns its deadline forfeits the decision; the
//! cycle keeps going with the caller's default.

use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use contracts::ClientId;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Forfeit {
    Panicked,
    TimedOut,
    WorkerUnavailable,
}

#[derive(Debug, Clone, Default)]
pub struct DecisionGuard {
    timeout: Option<Duration>,
}

impl DecisionGuard {
    /// Run callbacks on the calling thread with panic isolation only.
    pub fn inline() -> Self {
        Self { timeout: None }
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout: Some(timeout),
        }
    }

    /// Zero disables the deadline.
    pub fn from_millis(millis: u64) -> Self {
        if millis == 0 {
            Self::inline()
        } else {
            Self::with_timeout(Duration::from_millis(millis))
        }
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn decide<T, F>(&self, client: &ClientId, decision: &'static str, call: F) -> Result<T, Forfeit>
    where
        T: Send + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        let outcome = match self.timeout {
            None => panic::catch_unwind(AssertUnwindSafe(call)).map_err(|_| Forfeit::Panicked),
            Some(limit) => run_with_deadline(decision, limit, call),
        };
        if let Err(forfeit) = &outcome {
            warn!(client = %client, decision, ?forfeit, "client forfeited decision");
        }
        outcome
    }
}

fn run_with_deadline<T, F>(decision: &'static str, limit: Duration, call: F) -> Result<T, Forfeit>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    let (sender, receiver) = mpsc::sync_channel(1);
    let spawned = thread::Builder::new()
        .name(format!("decision:{decision}"))
        .spawn(move || {
            let result = panic::catch_unwind(AssertUnwindSafe(call));
            // The receiver is gone once the deadline passed.
            let _ = sender.send(result);
        });
    if spawned.is_err() {
        return Err(Forfeit::WorkerUnavailable);
    }
    match receiver.recv_timeout(limit) {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(_)) => Err(Forfeit::Panicked),
        Err(RecvTimeoutError::Timeout) => Err(Forfeit::TimedOut),
        Err(RecvTimeoutError::Disconnected) => Err(Forfeit::Panicked),
    }
}

//! Detached work that can still be drained at shutdown.
//!
//! Spawned dispatch is fire-and-forget for the caller, but the process
//! must not drop in-flight handlers when it exits. Every detached task goes
//! through a shared [`Background`] set; finished tasks are reaped on the
//! next spawn.

use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::{JoinError, JoinSet};
use tokio::time::Instant;
use tracing::{debug, warn};

/// Shared set of detached tasks. Clones refer to the same set.
#[derive(Clone, Default)]
pub struct Background {
    tasks: Arc<Mutex<JoinSet<()>>>,
}

impl Background {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn `task` detached from the caller.
    pub fn spawn<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut tasks = self.tasks.lock().expect("background task lock poisoned");
        while let Some(done) = tasks.try_join_next() {
            log_outcome(done);
        }
        tasks.spawn(task);
    }

    /// Tasks spawned and not yet reaped.
    pub fn len(&self) -> usize {
        self.tasks.lock().expect("background task lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Wait for every task, including ones spawned while draining, for at
    /// most `timeout`. Tasks still running at the deadline are aborted;
    /// returns how many that was.
    pub async fn drain(&self, timeout: Duration) -> usize {
        let deadline = Instant::now() + timeout;
        loop {
            let mut batch = std::mem::take(&mut *self.tasks.lock().expect("background task lock poisoned"));
            if batch.is_empty() {
                return 0;
            }
            debug!(tasks = batch.len(), "draining background tasks");
            loop {
                match tokio::time::timeout_at(deadline, batch.join_next()).await {
                    Ok(Some(done)) => log_outcome(done),
                    Ok(None) => break,
                    Err(_) => {
                        let abandoned = batch.len() + self.len();
                        warn!(abandoned, "background drain timed out, aborting remaining tasks");
                        batch.abort_all();
                        self.tasks.lock().expect("background task lock poisoned").abort_all();
                        return abandoned;
                    }
                }
            }
        }
    }
}

fn log_outcome(result: Result<(), JoinError>) {
    if let Err(e) = result {
        if e.is_panic() {
            warn!(error = %e, "background task panicked");
        }
    }
}

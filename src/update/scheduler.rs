use std::panic::{self, AssertUnwindSafe};

use anyhow::{Result, anyhow};
use tracing::debug;

use super::progress::{CancelToken, Canceled, ProgressIndicator};

/// What a completed task wants next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Followup {
    Done,
    /// Queue the same task object again.
    Resubmit,
}

/// A unit of background work with completion callbacks.
///
/// `run` executes on a worker thread; `on_success`/`on_cancel` execute on the
/// thread that called [`BackgroundScheduler::run`], after `run` has returned.
pub trait Task: Send + 'static {
    fn title(&self) -> &str;

    fn run(&mut self, indicator: &ProgressIndicator) -> Result<(), Canceled>;

    fn on_success(&mut self) -> Followup;

    fn on_cancel(&mut self) -> Followup;
}

/// Runs tasks one at a time on the rayon pool and dispatches their callbacks on
/// the calling thread.
pub struct BackgroundScheduler {
    token: CancelToken,
    show_progress: bool,
}

impl BackgroundScheduler {
    /// Scheduler with a terminal spinner per submission.
    ///
    /// Every submission shares `token`, so one cancel stops the whole chain.
    pub fn new(token: CancelToken) -> Self {
        Self {
            token,
            show_progress: true,
        }
    }

    /// Scheduler whose progress indicators render nothing.
    pub fn hidden(token: CancelToken) -> Self {
        Self {
            token,
            show_progress: false,
        }
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.token
    }

    /// Run `task` until it stops asking to be resubmitted, then hand it back.
    ///
    /// # Errors
    /// Returns an error if the background part of the task panics.
    pub fn run<T: Task>(&self, task: T) -> Result<T> {
        let mut task = task;
        let mut submission = 1u32;
        loop {
            let indicator = self.indicator(task.title());
            debug!(title = task.title(), submission, "submitting background task");

            let (tx, rx) = crossbeam_channel::bounded(1);
            let worker_indicator = indicator.clone();
            rayon::spawn(move || {
                let mut task = task;
                let outcome = panic::catch_unwind(AssertUnwindSafe(|| task.run(&worker_indicator)));
                let _ = tx.send(outcome.map(|res| (task, res)));
            });

            let (returned, res) = rx
                .recv()
                .map_err(|_| anyhow!("background task vanished"))?
                .map_err(|_| anyhow!("background task panicked"))?;
            task = returned;

            let canceled = res.is_err() || indicator.is_canceled();
            indicator.finish(canceled);

            let followup = if canceled {
                task.on_cancel()
            } else {
                task.on_success()
            };
            match followup {
                Followup::Done => return Ok(task),
                Followup::Resubmit => submission += 1,
            }
        }
    }

    fn indicator(&self, title: &str) -> ProgressIndicator {
        if self.show_progress {
            ProgressIndicator::new(self.token.clone(), title)
        } else {
            ProgressIndicator::hidden(self.token.clone())
        }
    }
}

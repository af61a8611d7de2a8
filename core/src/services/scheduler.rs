use crate::sweep::{SweepOutcome, Sweeper};
use std::{sync::Arc, time::Duration};
use store_api::{ContentStore, FileStore};
use tokio::{
    task::JoinHandle,
    time::{self, Instant, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Runs a [`Sweeper`] on a fixed period until stopped.
pub struct Scheduler<S, F> {
    sweeper: Arc<Sweeper<S, F>>,
    period: Duration,
    run_on_start: bool,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl<S, F> Scheduler<S, F>
where
    S: ContentStore + 'static,
    F: FileStore + 'static,
{
    pub fn new(sweeper: Arc<Sweeper<S, F>>, period: Duration) -> Self {
        Self {
            sweeper,
            period: period.max(Duration::from_millis(1)),
            run_on_start: false,
            cancel: CancellationToken::new(),
            task: None,
        }
    }

    /// Fire the first sweep immediately instead of one period after start.
    pub fn run_on_start(mut self, run_on_start: bool) -> Self {
        self.run_on_start = run_on_start;
        self
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Spawn the timer task. Calling `start` on a running scheduler does nothing.
    pub fn start(&mut self) {
        if self.is_running() {
            return;
        }
        self.cancel = CancellationToken::new();
        let cancel = self.cancel.clone();
        let sweeper = self.sweeper.clone();
        let period = self.period;
        let first = if self.run_on_start {
            Instant::now()
        } else {
            Instant::now() + period
        };
        info!(period_secs = period.as_secs(), "image sweep scheduled");
        self.task = Some(tokio::spawn(async move {
            let mut tick = time::interval_at(first, period);
            tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tick.tick() => {
                        run_blocking(sweeper.clone()).await;
                    }
                }
            }
        }));
    }

    /// Stop the timer, waiting for an in-flight sweep to finish.
    pub async fn stop(&mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            if let Err(err) = task.await {
                error!(error = %err, "image sweep scheduler task failed");
            }
        }
        info!("image sweep scheduler stopped");
    }

    /// Run a sweep now, outside the schedule.
    pub async fn trigger(&self) -> SweepOutcome {
        run_blocking(self.sweeper.clone()).await
    }
}

async fn run_blocking<S, F>(sweeper: Arc<Sweeper<S, F>>) -> SweepOutcome
where
    S: ContentStore + 'static,
    F: FileStore + 'static,
{
    match tokio::task::spawn_blocking(move || sweeper.run()).await {
        Ok(outcome) => outcome,
        Err(err) => {
            error!(error = %err, "image sweep task panicked");
            SweepOutcome::Aborted
        }
    }
}

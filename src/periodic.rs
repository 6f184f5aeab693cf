//! Repeating background tasks with an explicit stop handle.

use std::future::Future;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Run `job` every `interval`, starting immediately, until the returned
/// handle is shut down or dropped.
pub fn spawn<F, Fut>(interval: Duration, mut job: F) -> PeriodicHandle
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send,
{
    let (stop_tx, mut stop_rx) = watch::channel(false);
    let task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = ticker.tick() => job().await,
                _ = stop_rx.changed() => break,
            }
        }
    });
    PeriodicHandle {
        stop: stop_tx,
        task: Some(task),
    }
}

#[derive(Debug)]
pub struct PeriodicHandle {
    stop: watch::Sender<bool>,
    task: Option<JoinHandle<()>>,
}

impl PeriodicHandle {
    /// Stop the task and wait for the current run, if any, to finish.
    pub async fn shutdown(mut self) {
        let _ = self.stop.send(true);
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for PeriodicHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

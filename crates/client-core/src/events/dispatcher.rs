//! Sequential delivery of observer callbacks.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;

use futures::FutureExt;
use tokio::sync::mpsc;
use tracing::{debug, error};

type DispatchJob = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// Hands observer callbacks to one dedicated sequential task per client.
///
/// Jobs run in the order they were queued. A panicking callback is caught
/// and logged without stopping delivery; callers never hold a control-plane
/// lock while a job runs. The task exits when the last dispatcher handle is
/// dropped.
#[derive(Debug, Clone)]
pub struct EventDispatcher {
    tx: mpsc::UnboundedSender<DispatchJob>,
}

impl EventDispatcher {
    /// Spawn the dispatch task on the current runtime.
    pub fn spawn() -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<DispatchJob>();
        tokio::spawn(async move {
            while let Some(job) = rx.recv().await {
                if AssertUnwindSafe(job).catch_unwind().await.is_err() {
                    error!("observer callback panicked; continuing event delivery");
                }
            }
            debug!("event dispatcher stopped");
        });
        Self { tx }
    }

    /// Queue a callback future for in-order delivery.
    pub fn dispatch<F>(&self, job: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if self.tx.send(Box::pin(job)).is_err() {
            debug!("event dispatcher closed; dropping event");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::Mutex;

    #[tokio::test]
    async fn delivers_in_queue_order() {
        let dispatcher = EventDispatcher::spawn();
        let log = Arc::new(Mutex::new(Vec::new()));

        for i in 0..20 {
            let log = log.clone();
            dispatcher.dispatch(async move {
                log.lock().await.push(i);
            });
        }

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(*log.lock().await, (0..20).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn panicking_job_does_not_stop_delivery() {
        let dispatcher = EventDispatcher::spawn();
        let log = Arc::new(Mutex::new(Vec::new()));

        dispatcher.dispatch(async {
            panic!("observer bug");
        });
        let after = log.clone();
        dispatcher.dispatch(async move {
            after.lock().await.push("survived");
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(*log.lock().await, vec!["survived"]);
    }
}

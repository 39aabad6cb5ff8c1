//! Bounded worker pool for handler dispatch.
//!
//! Handler code is never run on the I/O context: the router submits work
//! items here and returns immediately. Submission uses `try_send` on a
//! bounded queue — when the queue is full the item is dropped and counted,
//! never blocking the caller. A drain task pulls items off the queue and
//! runs each on the runtime, with a semaphore capping how many handler
//! invocations execute at once.
//!
//! A handler that panics is caught, logged as a dispatch failure, and has
//! no effect on sibling handlers or the I/O context.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde_json::Value;
use tokio::sync::{Semaphore, mpsc};
use tracing::{trace, warn};
use vigil_core::RoutingError;

use crate::registry::ResponseHandler;
use crate::routing_key::RoutingKey;

/// One unit of dispatch work: invoke one handler with one response.
pub(crate) struct DispatchJob {
    /// The interned key that matched.
    pub key: RoutingKey,
    /// The handler to invoke.
    pub handler: Arc<dyn ResponseHandler>,
    /// The decoded response, shared immutably across all jobs for it.
    pub response: Arc<Value>,
}

/// Bounded, non-blocking handler dispatch pool.
pub struct DispatchPool {
    tx: mpsc::Sender<DispatchJob>,
    dropped: Arc<AtomicU64>,
}

impl DispatchPool {
    /// Create a pool with `workers` concurrent handler slots and a queue
    /// of `queue_depth` pending items. Both are clamped to at least 1.
    ///
    /// Must be called from within a Tokio runtime; the drain task is
    /// spawned immediately and runs until the pool is dropped.
    #[must_use]
    pub fn new(workers: usize, queue_depth: usize) -> Self {
        let (tx, mut rx) = mpsc::channel::<DispatchJob>(queue_depth.max(1));
        let slots = Arc::new(Semaphore::new(workers.max(1)));

        drop(tokio::spawn(async move {
            while let Some(job) = rx.recv().await {
                let Ok(permit) = Arc::clone(&slots).acquire_owned().await else {
                    break;
                };
                let _ = tokio::spawn(async move {
                    run_job(&job);
                    drop(permit);
                });
            }
            trace!("dispatch pool drained and shut down");
        }));

        Self {
            tx,
            dropped: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Submit a work item without blocking.
    ///
    /// Returns `false` (and counts a drop) when the queue is full or the
    /// pool has shut down.
    pub(crate) fn submit(&self, job: DispatchJob) -> bool {
        match self.tx.try_send(job) {
            Ok(()) => true,
            Err(err) => {
                let key = match &err {
                    mpsc::error::TrySendError::Full(job)
                    | mpsc::error::TrySendError::Closed(job) => job.key.canonical().to_owned(),
                };
                let _ = self.dropped.fetch_add(1, Ordering::Relaxed);
                warn!(%key, "dispatch queue full, dropping handler invocation");
                false
            }
        }
    }

    /// Total work items dropped due to a full or closed queue.
    #[must_use]
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Run one handler invocation, containing any panic.
fn run_job(job: &DispatchJob) {
    let result = catch_unwind(AssertUnwindSafe(|| {
        job.handler.on_response(&job.key, &job.response);
    }));
    if result.is_err() {
        let err = RoutingError::DispatchFailure {
            key: job.key.canonical().to_owned(),
            detail: "handler panicked during on_response".to_owned(),
        };
        warn!(%err, "response handler failed");
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;

    use super::*;

    struct ForwardingHandler {
        tx: mpsc::UnboundedSender<Value>,
    }

    impl ResponseHandler for ForwardingHandler {
        fn on_response(&self, _key: &RoutingKey, response: &Value) {
            let _ = self.tx.send(response.clone());
        }
    }

    struct PanickingHandler;

    impl ResponseHandler for PanickingHandler {
        fn on_response(&self, _key: &RoutingKey, _response: &Value) {
            panic!("intentional test panic");
        }
    }

    fn key() -> RoutingKey {
        RoutingKey::exact(vec![("host".to_owned(), "srv1".to_owned())]).unwrap()
    }

    fn job(handler: Arc<dyn ResponseHandler>, response: Value) -> DispatchJob {
        DispatchJob {
            key: key(),
            handler,
            response: Arc::new(response),
        }
    }

    #[tokio::test]
    async fn submitted_job_reaches_handler() {
        let pool = DispatchPool::new(2, 16);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let handler = Arc::new(ForwardingHandler { tx });
        assert!(pool.submit(job(handler, json!({"seq": 1}))));
        let seen = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(seen, json!({"seq": 1}));
    }

    #[tokio::test]
    async fn panicking_handler_does_not_stop_later_jobs() {
        let pool = DispatchPool::new(1, 16);
        let (tx, mut rx) = mpsc::unbounded_channel();

        assert!(pool.submit(job(Arc::new(PanickingHandler), json!({"seq": 1}))));
        assert!(pool.submit(job(
            Arc::new(ForwardingHandler { tx }),
            json!({"seq": 2})
        )));

        let seen = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(seen, json!({"seq": 2}));
        assert_eq!(pool.dropped(), 0);
    }

    #[tokio::test]
    async fn overflow_drops_instead_of_blocking() {
        // Handlers that never finish, single worker, queue of one.
        struct StallingHandler;
        impl ResponseHandler for StallingHandler {
            fn on_response(&self, _key: &RoutingKey, _response: &Value) {
                std::thread::sleep(Duration::from_secs(5));
            }
        }

        let pool = DispatchPool::new(1, 1);
        // Saturate the worker and the queue, then overflow.
        let mut dropped_any = false;
        for i in 0..8 {
            if !pool.submit(job(Arc::new(StallingHandler), json!({"seq": i}))) {
                dropped_any = true;
                break;
            }
        }
        assert!(dropped_any, "queue should reject before blocking");
        assert!(pool.dropped() >= 1);
    }

    #[tokio::test]
    async fn handlers_observe_shared_response() {
        let pool = DispatchPool::new(4, 16);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let response = json!({"response": "success", "data": [1, 2, 3]});
        for _ in 0..3 {
            let handler = Arc::new(ForwardingHandler { tx: tx.clone() });
            assert!(pool.submit(job(handler, response.clone())));
        }
        for _ in 0..3 {
            let seen = tokio::time::timeout(Duration::from_secs(1), rx.recv())
                .await
                .unwrap()
                .unwrap();
            assert_eq!(seen, response);
        }
    }
}

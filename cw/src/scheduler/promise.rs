//! Single-resolution promise bridging the dispatch loop and a waiting caller

use tokio::sync::oneshot;
use tracing::debug;

use super::error::{BreakReason, SchedulerError};
use crate::domain::RequestId;

type Outcome<T> = Result<T, BreakReason>;

/// Create a linked writer/reader pair for one request
pub fn promise<T>(request_id: RequestId) -> (Promise<T>, PendingResponse<T>) {
    let (tx, rx) = oneshot::channel();
    (Promise { tx: Some(tx) }, PendingResponse { request_id, rx })
}

/// Writer half, owned by whoever resolves the request
///
/// Resolution is strict: once fulfilled or broken, every later attempt
/// returns [`SchedulerError::AlreadyResolved`] and the first outcome stands.
#[derive(Debug)]
pub struct Promise<T> {
    tx: Option<oneshot::Sender<Outcome<T>>>,
}

impl<T> Promise<T> {
    /// Resolve with a successful value
    pub fn fulfill(&mut self, value: T) -> Result<(), SchedulerError> {
        self.resolve(Ok(value))
    }

    /// Resolve as failed
    pub fn break_promise(&mut self, reason: BreakReason) -> Result<(), SchedulerError> {
        self.resolve(Err(reason))
    }

    /// Whether a terminal state has been reached
    pub fn is_resolved(&self) -> bool {
        self.tx.is_none()
    }

    /// Whether the reader went away before resolution
    pub fn is_abandoned(&self) -> bool {
        self.tx.as_ref().map(|tx| tx.is_closed()).unwrap_or(false)
    }

    fn resolve(&mut self, outcome: Outcome<T>) -> Result<(), SchedulerError> {
        let tx = self.tx.take().ok_or(SchedulerError::AlreadyResolved)?;
        if tx.send(outcome).is_err() {
            // Still resolved; nobody is listening
            debug!("Promise::resolve: reader dropped, outcome discarded");
        }
        Ok(())
    }
}

/// Reader half, returned to the caller at submission
#[derive(Debug)]
pub struct PendingResponse<T> {
    request_id: RequestId,
    rx: oneshot::Receiver<Outcome<T>>,
}

impl<T> PendingResponse<T> {
    /// Identifier of the request this response belongs to
    pub fn request_id(&self) -> RequestId {
        self.request_id
    }

    /// Suspend until the request is fulfilled or broken
    pub async fn wait(self) -> Result<T, SchedulerError> {
        debug!(request_id = %self.request_id, "PendingResponse::wait: called");
        match self.rx.await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(reason)) => Err(SchedulerError::BrokenPromise(reason)),
            Err(_) => Err(SchedulerError::BrokenPromise(BreakReason::Dropped)),
        }
    }
}

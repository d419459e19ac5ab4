//! Request-scoped cancellation
//!
//! One [`AbortController`] per request. Every loader and deferred producer
//! holds a cloned [`AbortSignal`]. Dropping the controller (for example when
//! the client disconnects and the response body is dropped) aborts.

use tokio::sync::watch;

/// Owner side of a request's abort signal
#[derive(Debug)]
pub struct AbortController {
    tx: watch::Sender<bool>,
}

impl AbortController {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx }
    }

    pub fn signal(&self) -> AbortSignal {
        AbortSignal {
            rx: self.tx.subscribe(),
        }
    }

    pub fn abort(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_aborted(&self) -> bool {
        *self.tx.borrow()
    }
}

impl Default for AbortController {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for AbortController {
    fn drop(&mut self) {
        self.abort();
    }
}

/// Observer side of a request's abort signal
#[derive(Debug, Clone)]
pub struct AbortSignal {
    rx: watch::Receiver<bool>,
}

impl AbortSignal {
    pub fn is_aborted(&self) -> bool {
        *self.rx.borrow()
    }

    /// Completes once the request is aborted
    pub async fn aborted(&self) {
        let mut rx = self.rx.clone();
        loop {
            if *rx.borrow_and_update() {
                return;
            }
            if rx.changed().await.is_err() {
                // Controller gone without an explicit abort
                return;
            }
        }
    }
}

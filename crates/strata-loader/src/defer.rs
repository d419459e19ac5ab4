//! Per-request registry of deferred values
//!
//! `defer` spawns the producer immediately. Entries with `stream: false` are
//! awaited by the pipeline before the level's loader message is written;
//! entries with `stream: true` report through a channel the encoder drains
//! after the ready boundary. The channel closes once the registry and every
//! spawned producer are gone, which is how the encoder knows to write `done`.

use crate::error::LoaderThrow;
use crate::signal::AbortSignal;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashSet;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use strata_wire::{DeferredHandle, ErrorPayload};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Options passed alongside a producer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeferOptions {
    /// Unique within the owning level; generated when absent
    pub key: Option<String>,
    /// `false`: resolve before the ready boundary. `true`: stream after it.
    pub stream: bool,
}

impl DeferOptions {
    /// Streamed after the ready boundary
    pub fn streamed(key: impl Into<String>) -> Self {
        Self {
            key: Some(key.into()),
            stream: true,
        }
    }

    /// Awaited before the level's loader message
    pub fn blocking(key: impl Into<String>) -> Self {
        Self {
            key: Some(key.into()),
            stream: false,
        }
    }
}

impl Default for DeferOptions {
    fn default() -> Self {
        Self {
            key: None,
            stream: true,
        }
    }
}

/// A settled `stream: true` entry
#[derive(Debug, Clone, PartialEq)]
pub struct Settlement {
    pub level_id: String,
    pub key: String,
    pub result: Result<Value, ErrorPayload>,
}

type ProducerTask = JoinHandle<Option<Result<Value, ErrorPayload>>>;

#[derive(Default)]
struct LevelEntries {
    keys: HashSet<String>,
    blocking: Vec<(String, ProducerTask)>,
}

/// Owns the settlement channel for one request
pub struct DeferRegistry {
    tx: Option<mpsc::UnboundedSender<Settlement>>,
    rx: Option<mpsc::UnboundedReceiver<Settlement>>,
    signal: AbortSignal,
}

impl DeferRegistry {
    pub fn new(signal: AbortSignal) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx: Some(tx),
            rx: Some(rx),
            signal,
        }
    }

    /// A `defer` function bound to one level
    pub fn deferrer(&self, level_id: &str) -> Deferrer {
        Deferrer {
            level_id: Arc::from(level_id),
            entries: Arc::new(Mutex::new(LevelEntries::default())),
            tx: self.tx.clone(),
            signal: self.signal.clone(),
        }
    }

    /// Stops handing out senders and returns the settlement receiver
    ///
    /// Call once every loader has returned.
    pub fn close(&mut self) -> mpsc::UnboundedReceiver<Settlement> {
        self.tx = None;
        match self.rx.take() {
            Some(rx) => rx,
            None => {
                let (_tx, rx) = mpsc::unbounded_channel();
                rx
            }
        }
    }
}

/// The `defer` function handed to one level's loader
#[derive(Clone)]
pub struct Deferrer {
    level_id: Arc<str>,
    entries: Arc<Mutex<LevelEntries>>,
    tx: Option<mpsc::UnboundedSender<Settlement>>,
    signal: AbortSignal,
}

impl Deferrer {
    /// Starts `producer` now and returns its pending handle
    ///
    /// Fails the level when `options.key` was already used within it.
    pub fn defer<F, T>(&self, options: DeferOptions, producer: F) -> Result<DeferredHandle, LoaderThrow>
    where
        F: Future<Output = anyhow::Result<T>> + Send + 'static,
        T: Serialize + Send + 'static,
    {
        let key = options
            .key
            .unwrap_or_else(|| uuid::Uuid::new_v4().simple().to_string());

        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        if !entries.keys.insert(key.clone()) {
            return Err(LoaderThrow::Failed(
                ErrorPayload::new(format!(
                    "defer key {:?} used twice in level {}",
                    key, self.level_id
                ))
                .with_name("DuplicateDeferKey"),
            ));
        }

        let signal = self.signal.clone();
        let run = async move {
            tokio::select! {
                result = producer => Some(
                    result
                        .map_err(ErrorPayload::from)
                        .and_then(|value| serde_json::to_value(value).map_err(|err| {
                            ErrorPayload::new(err.to_string()).with_name("SerializationError")
                        })),
                ),
                _ = signal.aborted() => None,
            }
        };

        if options.stream {
            let tx = self.tx.clone();
            let level_id = self.level_id.to_string();
            let key_for_task = key.clone();
            tokio::spawn(async move {
                match run.await {
                    Some(result) => {
                        if let Some(tx) = tx {
                            let _ = tx.send(Settlement {
                                level_id,
                                key: key_for_task,
                                result,
                            });
                        }
                    }
                    None => tracing::debug!(
                        "Deferred {} in {} cancelled by request abort",
                        key_for_task,
                        level_id
                    ),
                }
            });
        } else {
            entries.blocking.push((key.clone(), tokio::spawn(run)));
        }

        Ok(DeferredHandle::pending(key))
    }

    pub fn level_id(&self) -> &str {
        &self.level_id
    }

    /// Awaits every `stream: false` entry registered so far
    pub(crate) async fn settle_blocking(&self) -> Vec<DeferredHandle> {
        let tasks = {
            let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
            std::mem::take(&mut entries.blocking)
        };

        let mut settled = Vec::with_capacity(tasks.len());
        for (key, task) in tasks {
            let result = match task.await {
                Ok(Some(result)) => result,
                Ok(None) => Err(ErrorPayload::new("request aborted").with_name("AbortError")),
                Err(join_err) => Err(ErrorPayload::new(join_err.to_string()).with_name("ProducerPanic")),
            };
            settled.push(DeferredHandle::settled(key, result));
        }
        settled
    }
}

impl std::fmt::Debug for Deferrer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Deferrer")
            .field("level_id", &self.level_id)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::AbortController;
    use serde_json::json;
    use std::time::Duration;

    #[tokio::test]
    async fn test_streamed_settlements_arrive_then_channel_closes() {
        let controller = AbortController::new();
        let mut registry = DeferRegistry::new(controller.signal());
        let deferrer = registry.deferrer("page");

        deferrer
            .defer(DeferOptions::streamed("ok"), async { Ok(json!(1)) })
            .unwrap();
        deferrer
            .defer(DeferOptions::streamed("bad"), async {
                Err::<Value, _>(anyhow::anyhow!("boom"))
            })
            .unwrap();
        drop(deferrer);

        let mut rx = registry.close();
        let mut seen = Vec::new();
        while let Some(settlement) = rx.recv().await {
            seen.push((settlement.key, settlement.result.is_ok()));
        }
        seen.sort();
        assert_eq!(seen, vec![("bad".to_string(), false), ("ok".to_string(), true)]);
    }

    #[tokio::test]
    async fn test_blocking_entries_settle_in_place() {
        let controller = AbortController::new();
        let registry = DeferRegistry::new(controller.signal());
        let deferrer = registry.deferrer("page");

        let handle = deferrer
            .defer(DeferOptions::blocking("price"), async { Ok(9.5) })
            .unwrap();
        assert!(handle.is_pending());

        let settled = deferrer.settle_blocking().await;
        assert_eq!(settled, vec![DeferredHandle::resolved("price", json!(9.5))]);
    }

    #[tokio::test]
    async fn test_duplicate_key_fails_the_level() {
        let controller = AbortController::new();
        let registry = DeferRegistry::new(controller.signal());
        let deferrer = registry.deferrer("page");

        deferrer
            .defer(DeferOptions::streamed("k"), async { Ok(1) })
            .unwrap();
        let err = deferrer
            .defer(DeferOptions::streamed("k"), async { Ok(2) })
            .unwrap_err();
        assert!(matches!(err, LoaderThrow::Failed(p) if p.name.as_deref() == Some("DuplicateDeferKey")));
    }

    #[tokio::test]
    async fn test_abort_cancels_producers() {
        let controller = AbortController::new();
        let mut registry = DeferRegistry::new(controller.signal());
        let deferrer = registry.deferrer("page");

        deferrer
            .defer(DeferOptions::streamed("never"), async {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(0)
            })
            .unwrap();
        drop(deferrer);
        let mut rx = registry.close();

        controller.abort();
        let closed = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .unwrap();
        assert!(closed.is_none());
    }

    #[tokio::test]
    async fn test_generated_keys_are_unique() {
        let controller = AbortController::new();
        let registry = DeferRegistry::new(controller.signal());
        let deferrer = registry.deferrer("page");

        let a = deferrer.defer(DeferOptions::default(), async { Ok(1) }).unwrap();
        let b = deferrer.defer(DeferOptions::default(), async { Ok(2) }).unwrap();
        assert_ne!(a.key, b.key);
    }
}

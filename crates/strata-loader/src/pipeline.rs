//! Two-phase loading across a matched chain
//!
//! Phase 1 runs preloaders strictly root to leaf, layering each output onto
//! the context handed to deeper levels. Phase 2 runs the selected loaders
//! concurrently. [`Pipeline::execute`] returns only once every level's
//! synchronous work (loader plus its `stream: false` defers) has settled, so
//! a redirect or not-found thrown anywhere can still replace the response.

use crate::auth::{AuthGate, AuthResolver};
use crate::context::LoaderContext;
use crate::defer::{DeferRegistry, Deferrer, Settlement};
use crate::error::{LoaderThrow, RequestAbort};
use crate::handler::{HeadArgs, LoaderArgs, PreloadArgs, RouteHandler};
use crate::query::QueryTracker;
use crate::signal::{AbortController, AbortSignal};
use axum::http::HeaderMap;
use futures::future::{self, BoxFuture, FutureExt};
use futures::stream::{FuturesUnordered, StreamExt};
use serde_json::Value;
use std::sync::Arc;
use strata_router::{MatchChain, Params};
use strata_wire::{DocumentSnapshot, ErrorPayload, HeadFields, QueryState, StreamMessage};
use tokio::sync::mpsc;

/// Per-request inputs beyond the matched chain
#[derive(Debug, Clone, Default)]
pub struct LoadRequest {
    /// Query string without control parameters
    pub search: String,
    pub headers: Arc<HeaderMap>,
    /// Level ids to refresh; `None` runs the whole chain
    pub levels: Option<Vec<String>>,
    pub prefetch: bool,
}

impl LoadRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_search(mut self, search: impl Into<String>) -> Self {
        self.search = search.into();
        self
    }

    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = Arc::new(headers);
        self
    }

    pub fn with_levels<I, S>(mut self, levels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.levels = Some(levels.into_iter().map(Into::into).collect());
        self
    }

    pub fn as_prefetch(mut self) -> Self {
        self.prefetch = true;
        self
    }
}

/// Synchronous result of one level
#[derive(Debug, Clone, PartialEq)]
pub struct LevelResult {
    pub level_id: String,
    /// Loader data, or `{"$error": ...}` when the level failed
    pub data: Option<Value>,
    pub head: Option<HeadFields>,
    pub failed: bool,
}

impl LevelResult {
    fn failed(level_id: String, payload: ErrorPayload) -> Self {
        Self {
            level_id,
            data: Some(payload.into_level_data()),
            head: None,
            failed: true,
        }
    }

    /// The level's error, if it failed
    pub fn error(&self) -> Option<ErrorPayload> {
        if !self.failed {
            return None;
        }
        self.data.as_ref().and_then(ErrorPayload::from_level_data)
    }
}

/// Everything produced up to the ready boundary, plus the pending settlements
///
/// Dropping the outcome aborts every producer still running.
pub struct LoadOutcome {
    /// Executed level ids in chain order
    pub level_order: Vec<String>,
    /// Level results in completion order
    pub levels: Vec<LevelResult>,
    pub queries: Vec<QueryState>,
    pub(crate) settlements: mpsc::UnboundedReceiver<Settlement>,
    pub(crate) controller: AbortController,
}

impl LoadOutcome {
    pub fn signal(&self) -> AbortSignal {
        self.controller.signal()
    }

    pub fn level(&self, level_id: &str) -> Option<&LevelResult> {
        self.levels.iter().find(|level| level.level_id == level_id)
    }

    /// Loader, head and query messages followed by ready
    pub fn ready_messages(&self) -> Vec<StreamMessage> {
        let mut messages = Vec::with_capacity(self.levels.len() + 2);

        for level in &self.levels {
            messages.push(StreamMessage::Loader {
                level_id: level.level_id.clone(),
                data: level.data.clone(),
            });
            if let Some(head) = &level.head {
                messages.push(StreamMessage::Head {
                    level_id: Some(level.level_id.clone()),
                    head: head.clone(),
                });
            }
        }

        if !self.queries.is_empty() {
            messages.push(StreamMessage::Query {
                queries: self.queries.clone(),
            });
        }

        messages.push(StreamMessage::Ready);
        messages
    }

    /// Waits for every streamed value and folds it all into one snapshot
    pub async fn into_snapshot(mut self) -> DocumentSnapshot {
        let mut snapshot = DocumentSnapshot::from_messages(self.ready_messages());
        while let Some(settlement) = self.settlements.recv().await {
            snapshot.apply(StreamMessage::settlement(
                settlement.level_id,
                settlement.key,
                settlement.result,
            ));
        }
        snapshot
    }
}

impl std::fmt::Debug for LoadOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadOutcome")
            .field("level_order", &self.level_order)
            .field("levels", &self.levels)
            .field("queries", &self.queries.len())
            .finish()
    }
}

/// Runs preloaders and loaders for matched chains
#[derive(Clone, Default)]
pub struct Pipeline {
    auth: Option<Arc<dyn AuthResolver>>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_auth<A: AuthResolver>(mut self, resolver: A) -> Self {
        self.auth = Some(Arc::new(resolver));
        self
    }

    pub fn with_shared_auth(mut self, resolver: Arc<dyn AuthResolver>) -> Self {
        self.auth = Some(resolver);
        self
    }

    /// Loads `chain` up to the ready boundary
    ///
    /// With a level filter, only the filtered loaders run. Preloaders still
    /// run for every level down to the deepest requested one, and the auth
    /// gate always covers the full chain.
    pub async fn execute<H: RouteHandler>(
        &self,
        chain: &MatchChain<H>,
        request: LoadRequest,
    ) -> Result<LoadOutcome, RequestAbort> {
        let controller = AbortController::new();
        let signal = controller.signal();
        let gate = AuthGate::new(self.auth.clone(), Arc::clone(&request.headers));
        let levels = chain.levels();

        let selected: Vec<usize> = match &request.levels {
            None => (0..levels.len()).collect(),
            Some(ids) => {
                for id in ids {
                    if chain.get(id).is_none() {
                        tracing::debug!("Ignoring unknown level {} for {}", id, chain.pathname);
                    }
                }
                levels
                    .iter()
                    .enumerate()
                    .filter(|(_, level)| ids.contains(&level.route.level_id))
                    .map(|(index, _)| index)
                    .collect()
            }
        };
        let preload_depth = selected.last().map_or(0, |deepest| deepest + 1);

        if chain.requires_auth() {
            gate.resolve().await.map_err(|failure| {
                tracing::debug!("Auth gate rejected {}: {}", chain.pathname, failure);
                RequestAbort::from(failure)
            })?;
        }

        // Phase 1
        let mut contexts: Vec<Result<LoaderContext, ErrorPayload>> = Vec::with_capacity(preload_depth);
        let mut context = Ok(LoaderContext::new());
        for level in &levels[..preload_depth] {
            if let Ok(current) = &context {
                let level_id = &level.route.level_id;
                let args = PreloadArgs::new(
                    level_id.clone(),
                    current.clone(),
                    level.route.params.clone(),
                    request.search.clone(),
                    signal.clone(),
                    gate.clone(),
                );

                match level.handler.preload(args).await {
                    Ok(Some(output)) => context = Ok(current.extended(level_id, output)),
                    Ok(None) => {}
                    Err(LoaderThrow::Abort(abort)) => return Err(abort),
                    Err(LoaderThrow::Failed(payload)) => {
                        tracing::warn!("Preloader for {} failed: {}", level_id, payload);
                        context = Err(payload);
                    }
                }
            }
            contexts.push(context.clone());
        }

        // Phase 2
        let mut registry = DeferRegistry::new(signal.clone());
        let queries = QueryTracker::new();
        let mut pending: FuturesUnordered<BoxFuture<'static, Result<LevelResult, RequestAbort>>> =
            FuturesUnordered::new();

        for &index in &selected {
            let level = &levels[index];
            let level_id = level.route.level_id.clone();

            let context = match &contexts[index] {
                Ok(context) => context.clone(),
                Err(payload) => {
                    // Descendants of a failed preloader share its error
                    let failed = LevelResult::failed(level_id, payload.clone());
                    pending.push(future::ready(Ok(failed)).boxed());
                    continue;
                }
            };

            let deferrer = registry.deferrer(&level_id);
            let args = LoaderArgs::new(
                level_id,
                context,
                level.route.params.clone(),
                request.search.clone(),
                signal.clone(),
                request.prefetch,
                queries.clone(),
                gate.clone(),
                deferrer.clone(),
            );
            let handler = Arc::clone(&level.handler);
            let params = level.route.params.clone();
            pending.push(run_level(handler, args, deferrer, params).boxed());
        }

        let mut results = Vec::with_capacity(selected.len());
        while let Some(result) = pending.next().await {
            results.push(result?);
        }

        let settlements = registry.close();
        tracing::debug!(
            "Loaded {} of {} levels for {}",
            results.len(),
            levels.len(),
            chain.pathname
        );

        Ok(LoadOutcome {
            level_order: selected
                .iter()
                .map(|&index| levels[index].route.level_id.clone())
                .collect(),
            levels: results,
            queries: queries.snapshot(),
            settlements,
            controller,
        })
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("auth", &self.auth.is_some())
            .finish()
    }
}

async fn run_level<H: RouteHandler>(
    handler: Arc<H>,
    args: LoaderArgs,
    deferrer: Deferrer,
    params: Params,
) -> Result<LevelResult, RequestAbort> {
    let level_id = args.level_id.clone();
    tracing::debug!("Running loader for {}", level_id);

    let mut data = match handler.load(args).await {
        Ok(data) => data,
        Err(LoaderThrow::Abort(abort)) => return Err(abort),
        Err(LoaderThrow::Failed(payload)) => {
            tracing::warn!("Loader for {} failed: {}", level_id, payload);
            return Ok(LevelResult::failed(level_id, payload));
        }
    };

    for handle in deferrer.settle_blocking().await {
        if let Some(data) = data.as_mut() {
            handle.substitute_into(data);
        }
    }
    drop(deferrer);

    let head = handler.head(HeadArgs {
        level_id: &level_id,
        params: &params,
        data: data.as_ref(),
    });

    Ok(LevelResult {
        level_id,
        data,
        head,
        failed: false,
    })
}

//! Per-level preloader, loader and head functions

use crate::auth::{AuthFailure, AuthGate};
use crate::context::LoaderContext;
use crate::defer::{DeferOptions, Deferrer};
use crate::error::LoadResult;
use crate::query::QueryTracker;
use crate::signal::AbortSignal;
use async_trait::async_trait;
use futures::future::BoxFuture;
use serde::Serialize;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use strata_router::{ParamValue, Params};
use strata_wire::{DeferredHandle, HeadFields};

/// Input of a preloader
#[derive(Debug, Clone)]
pub struct PreloadArgs {
    pub level_id: String,
    /// Merged output of every ancestor preloader
    pub context: LoaderContext,
    pub params: Params,
    /// Query string without the control parameters
    pub search: String,
    pub signal: AbortSignal,
    auth: AuthGate,
}

impl PreloadArgs {
    pub(crate) fn new(
        level_id: String,
        context: LoaderContext,
        params: Params,
        search: String,
        signal: AbortSignal,
        auth: AuthGate,
    ) -> Self {
        Self {
            level_id,
            context,
            params,
            search,
            signal,
            auth,
        }
    }

    /// Resolved auth, shared with every other level of the request
    pub async fn auth(&self) -> Result<Value, AuthFailure> {
        self.auth.resolve().await
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).and_then(ParamValue::as_str)
    }
}

/// Input of a loader
#[derive(Debug, Clone)]
pub struct LoaderArgs {
    pub level_id: String,
    /// Ancestor context plus this level's own preloader output
    pub context: LoaderContext,
    pub params: Params,
    pub search: String,
    pub signal: AbortSignal,
    /// Whether this is a speculative prefetch
    pub is_prefetch: bool,
    pub queries: QueryTracker,
    auth: AuthGate,
    deferrer: Deferrer,
}

impl LoaderArgs {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        level_id: String,
        context: LoaderContext,
        params: Params,
        search: String,
        signal: AbortSignal,
        is_prefetch: bool,
        queries: QueryTracker,
        auth: AuthGate,
        deferrer: Deferrer,
    ) -> Self {
        Self {
            level_id,
            context,
            params,
            search,
            signal,
            is_prefetch,
            queries,
            auth,
            deferrer,
        }
    }

    pub async fn auth(&self) -> Result<Value, AuthFailure> {
        self.auth.resolve().await
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).and_then(ParamValue::as_str)
    }

    /// Every segment captured by a catch-all param
    pub fn param_list(&self, name: &str) -> Option<&[String]> {
        self.params.get(name).and_then(ParamValue::as_slice)
    }

    /// Registers a deferred value owned by this level
    ///
    /// The producer starts immediately. Put the returned handle into the
    /// loader's data where the value belongs.
    pub fn defer<F, T>(&self, options: DeferOptions, producer: F) -> LoadResult<DeferredHandle>
    where
        F: Future<Output = anyhow::Result<T>> + Send + 'static,
        T: Serialize + Send + 'static,
    {
        self.deferrer.defer(options, producer)
    }
}

/// Input of a head function
#[derive(Debug, Clone, Copy)]
pub struct HeadArgs<'a> {
    pub level_id: &'a str,
    pub params: &'a Params,
    /// This level's loader data, with blocking deferred values settled
    pub data: Option<&'a Value>,
}

/// What the pipeline calls for each matched level
///
/// Every method has a pass-through default, so a level only implements what
/// it needs.
#[async_trait]
pub trait RouteHandler: Send + Sync + 'static {
    /// Phase 1. `Ok(None)` passes the ancestor context through unchanged.
    async fn preload(&self, _args: PreloadArgs) -> LoadResult<Option<Value>> {
        Ok(None)
    }

    /// Phase 2. `Ok(None)` produces a loader message without data.
    async fn load(&self, _args: LoaderArgs) -> LoadResult<Option<Value>> {
        Ok(None)
    }

    fn head(&self, _args: HeadArgs<'_>) -> Option<HeadFields> {
        None
    }
}

type PreloaderFn = Arc<dyn Fn(PreloadArgs) -> BoxFuture<'static, LoadResult<Value>> + Send + Sync>;
type LoaderFn = Arc<dyn Fn(LoaderArgs) -> BoxFuture<'static, LoadResult<Value>> + Send + Sync>;
type HeadFn = Arc<dyn Fn(HeadArgs<'_>) -> HeadFields + Send + Sync>;

/// Closure-backed [`RouteHandler`]
///
/// ```
/// use serde_json::json;
/// use strata_loader::LevelHandlers;
///
/// let handlers = LevelHandlers::new()
///     .preloader(|_args| async { Ok(json!({"locale": "en"})) })
///     .loader(|args| async move { Ok(json!({"locale": args.context.get("locale")})) });
/// assert!(handlers.has_loader());
/// ```
#[derive(Clone, Default)]
pub struct LevelHandlers {
    preloader: Option<PreloaderFn>,
    loader: Option<LoaderFn>,
    head: Option<HeadFn>,
}

impl LevelHandlers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn preloader<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(PreloadArgs) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = LoadResult<Value>> + Send + 'static,
    {
        self.preloader = Some(Arc::new(move |args| Box::pin(f(args))));
        self
    }

    pub fn loader<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(LoaderArgs) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = LoadResult<Value>> + Send + 'static,
    {
        self.loader = Some(Arc::new(move |args| Box::pin(f(args))));
        self
    }

    pub fn with_head<F>(mut self, f: F) -> Self
    where
        F: Fn(HeadArgs<'_>) -> HeadFields + Send + Sync + 'static,
    {
        self.head = Some(Arc::new(f));
        self
    }

    /// Static head fields
    pub fn title(self, title: impl Into<String>) -> Self {
        let head = HeadFields::titled(title);
        self.with_head(move |_| head.clone())
    }

    pub fn has_preloader(&self) -> bool {
        self.preloader.is_some()
    }

    pub fn has_loader(&self) -> bool {
        self.loader.is_some()
    }
}

impl std::fmt::Debug for LevelHandlers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LevelHandlers")
            .field("preloader", &self.preloader.is_some())
            .field("loader", &self.loader.is_some())
            .field("head", &self.head.is_some())
            .finish()
    }
}

#[async_trait]
impl RouteHandler for LevelHandlers {
    async fn preload(&self, args: PreloadArgs) -> LoadResult<Option<Value>> {
        match &self.preloader {
            Some(preloader) => preloader(args).await.map(Some),
            None => Ok(None),
        }
    }

    async fn load(&self, args: LoaderArgs) -> LoadResult<Option<Value>> {
        match &self.loader {
            Some(loader) => loader(args).await.map(Some),
            None => Ok(None),
        }
    }

    fn head(&self, args: HeadArgs<'_>) -> Option<HeadFields> {
        self.head.as_ref().map(|head| head(args))
    }
}

//! Client-side navigation
//!
//! A navigation is split into [`Navigator::begin`], any number of
//! [`Navigator::apply`] calls and [`Navigator::finish`]. Each `begin` bumps
//! a sequence number; messages applied under an older [`Navigation`] are
//! discarded and never touch the cache, and the body of the previous
//! navigation stops yielding once it is wrapped with
//! [`Navigation::guard_body`]. [`Navigator::navigate`] drives all three steps
//! over a [`DataTransport`].

use crate::cache::{compute_needed_match_ids, NavigationCache};
use crate::config::ClientConfig;
use crate::fetcher::{FetchError, FetchObserver, LineDecoder, MessageDispatcher, StreamPhase};
use crate::history::{HistoryState, Location, NavFormat};
use crate::scroll::{ScrollPosition, ScrollStore, ScrollTarget};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::future::{AbortHandle, AbortRegistration};
use futures::stream::{Abortable, BoxStream};
use futures::StreamExt;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use strata_router::{Params, Resolution, Router};
use strata_wire::{DeferredHandle, DocumentSnapshot, ErrorPayload, HeadFields, QueryState, StreamMessage};
use thiserror::Error;

const MAX_REDIRECTS: usize = 5;

#[derive(Debug, Error)]
pub enum NavigationError {
    #[error("no route matches {0}")]
    NotFound(String),

    #[error("too many redirects starting at {0}")]
    TooManyRedirects(String),

    #[error("unreadable history state")]
    InvalidHistoryState,

    #[error(transparent)]
    Fetch(#[from] FetchError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationKind {
    Push,
    Replace,
    /// Back/forward to an existing entry
    Pop,
}

/// A request for fresh data
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataRequest {
    pub location: Location,
    /// Level ids to refresh, in chain order
    pub levels: Vec<String>,
    pub prefetch: bool,
}

impl DataRequest {
    /// Path and query with the `_data` fallback signal appended
    pub fn url(&self) -> String {
        let mut url = self.location.pathname.clone();
        url.push('?');
        if !self.location.search.is_empty() {
            url.push_str(&self.location.search);
            url.push('&');
        }
        url.push_str("_data=1");
        url
    }

    /// Signal headers for the request
    pub fn headers(&self) -> Vec<(&'static str, String)> {
        let mut headers = vec![
            ("x-strata-data", "1".to_string()),
            (
                "x-strata-levels",
                self.levels
                    .iter()
                    .map(|id| urlencoding::encode(id).into_owned())
                    .collect::<Vec<_>>()
                    .join(","),
            ),
        ];
        if self.prefetch {
            headers.push(("x-strata-prefetch", "1".to_string()));
        }
        headers
    }
}

/// Response body as raw byte chunks
pub type ByteStream = BoxStream<'static, Result<Vec<u8>, FetchError>>;

/// Fetches data streams; the platform's HTTP client lives behind this
#[async_trait]
pub trait DataTransport: Send + Sync {
    /// Starts the request. A server redirect surfaces as
    /// [`FetchError::Redirect`].
    async fn fetch(&self, request: DataRequest) -> Result<ByteStream, FetchError>;
}

/// One in-flight navigation
#[derive(Debug)]
pub struct Navigation {
    seq: u64,
    pub kind: NavigationKind,
    pub location: Location,
    pub params: Params,
    /// Every level of the matched chain, in order
    pub level_ids: Vec<String>,
    /// Levels whose data must be fetched
    pub needed: Vec<String>,
    stale_times: HashMap<String, Option<Duration>>,
    target_state: Option<HistoryState>,
    dispatcher: MessageDispatcher,
    abort: AbortHandle,
    registration: Option<AbortRegistration>,
}

impl Navigation {
    /// Whether this navigation needs a request at all
    pub fn needs_fetch(&self) -> bool {
        !self.needed.is_empty()
    }

    pub fn data_request(&self) -> DataRequest {
        DataRequest {
            location: self.location.clone(),
            levels: self.needed.clone(),
            prefetch: false,
        }
    }

    /// Ties `body` to this navigation: it ends as soon as a newer
    /// navigation begins
    ///
    /// Only the first body passed in is guarded; later ones are returned
    /// ending immediately.
    pub fn guard_body(&mut self, body: ByteStream) -> ByteStream {
        match self.registration.take() {
            Some(registration) => Abortable::new(body, registration).boxed(),
            None => futures::stream::empty().boxed(),
        }
    }

    /// Whether a newer navigation cancelled this one's fetch
    pub fn is_aborted(&self) -> bool {
        self.abort.is_aborted()
    }
}

/// What the renderer needs after a navigation
#[derive(Debug, Clone, PartialEq)]
pub struct NavigationOutcome {
    pub state: HistoryState,
    pub kind: NavigationKind,
    pub scroll: ScrollTarget,
    /// Levels of the chain, in order
    pub level_ids: Vec<String>,
    /// Levels that were refreshed by this navigation
    pub fetched: Vec<String>,
    /// Heads merged root to leaf
    pub head: HeadFields,
}

/// Owns the client session state: cache, level data, scroll and history
pub struct Navigator<H> {
    router: Arc<Router<H>>,
    config: ClientConfig,
    cache: NavigationCache,
    scroll: ScrollStore,
    level_data: HashMap<String, Option<Value>>,
    heads: HashMap<String, HeadFields>,
    queries: Vec<QueryState>,
    current: Option<HistoryState>,
    sequence: u64,
    in_flight: Option<AbortHandle>,
}

impl<H> Navigator<H> {
    pub fn new(router: Arc<Router<H>>, config: ClientConfig) -> Self {
        let scroll = ScrollStore::new(config.scroll_capacity);
        Self {
            router,
            config,
            cache: NavigationCache::new(),
            scroll,
            level_data: HashMap::new(),
            heads: HashMap::new(),
            queries: Vec::new(),
            current: None,
            sequence: 0,
            in_flight: None,
        }
    }

    /// Replaces the scroll store, e.g. one restored from session storage
    pub fn with_scroll_store(mut self, scroll: ScrollStore) -> Self {
        self.scroll = scroll;
        self
    }

    pub fn cache(&self) -> &NavigationCache {
        &self.cache
    }

    pub fn cache_mut(&mut self) -> &mut NavigationCache {
        &mut self.cache
    }

    pub fn scroll(&self) -> &ScrollStore {
        &self.scroll
    }

    pub fn current(&self) -> Option<&HistoryState> {
        self.current.as_ref()
    }

    /// Latest data for a level
    pub fn level_data(&self, level_id: &str) -> Option<&Value> {
        self.level_data.get(level_id).and_then(Option::as_ref)
    }

    /// Query states from the most recent response
    pub fn queries(&self) -> &[QueryState] {
        &self.queries
    }

    pub fn is_current(&self, navigation: &Navigation) -> bool {
        navigation.seq == self.sequence
    }

    /// Adopts the snapshot of a server-rendered document
    pub fn hydrate(
        &mut self,
        href: &str,
        snapshot: &DocumentSnapshot,
        now: DateTime<Utc>,
    ) -> Result<HistoryState, NavigationError> {
        let location = Location::parse(href);
        let chain = self
            .router
            .match_path(&location.pathname)
            .ok_or_else(|| NavigationError::NotFound(location.pathname.clone()))?;

        for level in chain.iter() {
            let level_id = &level.route.level_id;
            let Some(data) = snapshot.loaders.get(level_id) else {
                continue;
            };
            let failed = data.as_ref().and_then(ErrorPayload::from_level_data).is_some();
            if !failed {
                self.cache.record_loaded(level_id, now, level.route.stale_time);
            }
            self.level_data.insert(level_id.clone(), data.clone());
            if let Some(head) = snapshot.heads.get(level_id) {
                self.heads.insert(level_id.clone(), head.clone());
            }
        }
        self.queries = snapshot.queries.clone();

        let state = HistoryState::initial(location, chain.params.clone(), NavFormat::Document);
        self.current = Some(state.clone());
        Ok(state)
    }

    /// Starts a push or replace navigation to `href`
    ///
    /// `current_scroll` is saved under the current entry's key first.
    pub fn begin(
        &mut self,
        href: &str,
        kind: NavigationKind,
        current_scroll: ScrollPosition,
        now: DateTime<Utc>,
    ) -> Result<Navigation, NavigationError> {
        self.begin_at(Location::parse(href), kind, None, current_scroll, now)
    }

    /// Starts a back/forward navigation to a stored history state
    pub fn begin_pop(
        &mut self,
        state: &Value,
        current_scroll: ScrollPosition,
        now: DateTime<Utc>,
    ) -> Result<Navigation, NavigationError> {
        let target = HistoryState::parse(state).ok_or(NavigationError::InvalidHistoryState)?;
        self.begin_at(target.location(), NavigationKind::Pop, Some(target), current_scroll, now)
    }

    fn begin_at(
        &mut self,
        mut location: Location,
        kind: NavigationKind,
        target_state: Option<HistoryState>,
        current_scroll: ScrollPosition,
        now: DateTime<Utc>,
    ) -> Result<Navigation, NavigationError> {
        if let Some(current) = &self.current {
            self.scroll.save(&current.key, current_scroll);
        }

        let mut redirects = 0;
        let chain = loop {
            match self.router.resolve(&location.pathname) {
                Resolution::Matched(chain) => break chain,
                Resolution::Redirect { location: to, .. } => {
                    redirects += 1;
                    if redirects > MAX_REDIRECTS {
                        return Err(NavigationError::TooManyRedirects(location.pathname));
                    }
                    location.pathname = to;
                }
                Resolution::NotFound => return Err(NavigationError::NotFound(location.pathname)),
            }
        };

        let same_document = self
            .current
            .as_ref()
            .is_some_and(|current| current.location().same_document(&location));
        let needed = if same_document {
            Vec::new()
        } else {
            compute_needed_match_ids(
                &chain,
                &self.cache,
                &location.search,
                now,
                self.config.default_stale_time(),
            )
        };

        if let Some(previous) = self.in_flight.take() {
            previous.abort();
        }
        let (abort, registration) = AbortHandle::new_pair();
        self.in_flight = Some(abort.clone());

        self.sequence += 1;
        tracing::debug!(
            "Navigation {} to {} needs {:?}",
            self.sequence,
            location.href(),
            needed
        );

        Ok(Navigation {
            seq: self.sequence,
            kind,
            params: chain.params.clone(),
            level_ids: chain.level_ids(),
            needed,
            stale_times: chain
                .iter()
                .map(|level| (level.route.level_id.clone(), level.route.stale_time))
                .collect(),
            location,
            target_state,
            dispatcher: MessageDispatcher::new(),
            abort,
            registration: Some(registration),
        })
    }

    /// Applies one message of `navigation`'s response
    ///
    /// Fails with [`FetchError::Superseded`] once a newer navigation began.
    pub fn apply(
        &mut self,
        navigation: &mut Navigation,
        message: &StreamMessage,
        now: DateTime<Utc>,
    ) -> Result<(), FetchError> {
        if !self.is_current(navigation) {
            tracing::warn!(
                "Discarding {} message of superseded navigation {}",
                message.tag(),
                navigation.seq
            );
            return Err(FetchError::Superseded);
        }

        let mut observer = SessionWriter {
            cache: &mut self.cache,
            level_data: &mut self.level_data,
            heads: &mut self.heads,
            queries: &mut self.queries,
            stale_times: &navigation.stale_times,
            now,
        };
        navigation.dispatcher.dispatch(message, &mut observer)
    }

    /// Commits a navigation: history state, scroll target and merged head
    pub fn finish(&mut self, navigation: Navigation) -> Result<NavigationOutcome, FetchError> {
        if !self.is_current(&navigation) {
            return Err(FetchError::Superseded);
        }

        let nav_format = NavFormat::Stream;
        let state = match (&navigation.kind, &self.current, navigation.target_state) {
            (NavigationKind::Pop, _, Some(target)) => target,
            (NavigationKind::Replace, Some(current), _) => {
                current.replaced(navigation.location.clone(), navigation.params, nav_format)
            }
            (_, Some(current), _) => {
                current.pushed(navigation.location.clone(), navigation.params, nav_format)
            }
            (_, None, _) => HistoryState::initial(navigation.location.clone(), navigation.params, nav_format),
        };

        let scroll = match navigation.kind {
            NavigationKind::Pop => match self.scroll.restore_target(&state.key) {
                ScrollTarget::Top if !state.hash.is_empty() => ScrollTarget::Anchor(state.hash.clone()),
                target => target,
            },
            NavigationKind::Push | NavigationKind::Replace if !state.hash.is_empty() => {
                ScrollTarget::Anchor(state.hash.clone())
            }
            NavigationKind::Push | NavigationKind::Replace => ScrollTarget::Top,
        };

        self.in_flight = None;
        let head = navigation
            .level_ids
            .iter()
            .filter_map(|id| self.heads.get(id))
            .cloned()
            .fold(HeadFields::default(), HeadFields::merge);

        self.current = Some(state.clone());
        Ok(NavigationOutcome {
            state,
            kind: navigation.kind,
            scroll,
            level_ids: navigation.level_ids,
            fetched: navigation.needed,
            head,
        })
    }

    /// Runs a whole push or replace navigation over `transport`
    ///
    /// A server redirect only changes the target; a push still adds an entry.
    pub async fn navigate<T: DataTransport + ?Sized>(
        &mut self,
        transport: &T,
        href: &str,
        kind: NavigationKind,
        current_scroll: ScrollPosition,
    ) -> Result<NavigationOutcome, NavigationError> {
        let mut href = href.to_string();

        for _ in 0..=MAX_REDIRECTS {
            let navigation = self.begin(&href, kind, current_scroll, Utc::now())?;
            match self.run(transport, navigation).await {
                Err(NavigationError::Fetch(FetchError::Redirect(location))) => {
                    tracing::debug!("Data request for {} redirected to {}", href, location);
                    href = location;
                }
                result => return result,
            }
        }

        Err(NavigationError::TooManyRedirects(href))
    }

    /// Runs a back/forward navigation over `transport`
    pub async fn navigate_pop<T: DataTransport + ?Sized>(
        &mut self,
        transport: &T,
        state: &Value,
        current_scroll: ScrollPosition,
    ) -> Result<NavigationOutcome, NavigationError> {
        let navigation = self.begin_pop(state, current_scroll, Utc::now())?;
        self.run(transport, navigation).await
    }

    async fn run<T: DataTransport + ?Sized>(
        &mut self,
        transport: &T,
        mut navigation: Navigation,
    ) -> Result<NavigationOutcome, NavigationError> {
        if navigation.needs_fetch() {
            let body = transport.fetch(navigation.data_request()).await?;
            let mut body = navigation.guard_body(body);
            let mut decoder = LineDecoder::new();

            while let Some(chunk) = body.next().await {
                for line in decoder.push(&chunk?) {
                    let message = navigation.dispatcher.decode_line(&line)?;
                    self.apply(&mut navigation, &message, Utc::now())?;
                }
            }

            if navigation.is_aborted() {
                return Err(FetchError::Superseded.into());
            }
            if navigation.dispatcher.phase() != StreamPhase::Done {
                return Err(FetchError::Truncated.into());
            }
        }

        Ok(self.finish(navigation)?)
    }
}

/// Writes one response's messages into the session state
struct SessionWriter<'a> {
    cache: &'a mut NavigationCache,
    level_data: &'a mut HashMap<String, Option<Value>>,
    heads: &'a mut HashMap<String, HeadFields>,
    queries: &'a mut Vec<QueryState>,
    stale_times: &'a HashMap<String, Option<Duration>>,
    now: DateTime<Utc>,
}

impl SessionWriter<'_> {
    fn settle(&mut self, level_id: &str, handle: DeferredHandle) {
        if let Some(Some(data)) = self.level_data.get_mut(level_id) {
            handle.substitute_into(data);
        }
    }
}

impl FetchObserver for SessionWriter<'_> {
    fn on_loader(&mut self, level_id: &str, data: Option<&Value>) {
        let failed = data.and_then(ErrorPayload::from_level_data);
        match failed {
            Some(error) => {
                tracing::warn!("Level {} failed to load: {}", level_id, error);
                self.cache.invalidate(level_id);
            }
            None => {
                let stale_time = self.stale_times.get(level_id).copied().flatten();
                self.cache.record_loaded(level_id, self.now, stale_time);
            }
        }
        self.level_data.insert(level_id.to_string(), data.cloned());
    }

    fn on_head(&mut self, level_id: Option<&str>, head: &HeadFields) {
        let key = level_id.unwrap_or_default().to_string();
        self.heads.insert(key, head.clone());
    }

    fn on_query(&mut self, queries: &[QueryState]) {
        *self.queries = queries.to_vec();
    }

    fn on_chunk(&mut self, level_id: &str, key: &str, data: &Value) {
        self.settle(level_id, DeferredHandle::resolved(key, data.clone()));
    }

    fn on_error(&mut self, level_id: &str, key: Option<&str>, error: &ErrorPayload) {
        match key {
            Some(key) => {
                tracing::warn!("Deferred {} in {} rejected: {}", key, level_id, error);
                self.settle(level_id, DeferredHandle::rejected(key, error.clone()));
            }
            None => tracing::warn!("Stream error: {}", error),
        }
    }
}

//! Turns requests into responses: match, load, then stream or render

use crate::document::{render_document, DocumentContext, DocumentRenderer, ShellRenderer};
use crate::error::RequestAbort;
use crate::handler::RouteHandler;
use crate::pipeline::{LoadRequest, Pipeline};
use crate::request::{RequestSignals, ResponseFormat, PREFETCH_HEADER};
use crate::stream::encode;
use axum::body::Body;
use axum::http::{header, HeaderMap, HeaderValue, StatusCode, Uri};
use axum::response::{Html, IntoResponse, Response};
use std::sync::Arc;
use strata_router::{Resolution, Router};
use strata_wire::NDJSON_CONTENT_TYPE;

/// Everything needed to answer a request for a route tree
pub struct StrataService<H> {
    router: Arc<Router<H>>,
    pipeline: Pipeline,
    renderer: Arc<dyn DocumentRenderer>,
    default_format: ResponseFormat,
}

impl<H: RouteHandler> StrataService<H> {
    pub fn new(router: Router<H>) -> Self {
        Self {
            router: Arc::new(router),
            pipeline: Pipeline::new(),
            renderer: Arc::new(ShellRenderer),
            default_format: ResponseFormat::Document,
        }
    }

    pub fn with_pipeline(mut self, pipeline: Pipeline) -> Self {
        self.pipeline = pipeline;
        self
    }

    pub fn with_renderer<R: DocumentRenderer>(mut self, renderer: R) -> Self {
        self.renderer = Arc::new(renderer);
        self
    }

    /// Format used when the request carries neither a data signal nor an override
    pub fn with_default_format(mut self, format: ResponseFormat) -> Self {
        self.default_format = format;
        self
    }

    pub fn router(&self) -> &Router<H> {
        &self.router
    }

    /// Answers one request
    pub async fn handle(&self, uri: &Uri, headers: &HeaderMap) -> Response {
        let chain = match self.router.resolve(uri.path()) {
            Resolution::Matched(chain) => chain,
            Resolution::Redirect { location, status } => {
                let location = match uri.query() {
                    Some(query) if !query.is_empty() => format!("{}?{}", location, query),
                    _ => location,
                };
                return RequestAbort::redirect_with(location, status).into_response();
            }
            Resolution::NotFound => {
                tracing::debug!("No route for {}", uri.path());
                return RequestAbort::NotFound.into_response();
            }
        };

        let signals = RequestSignals::from_parts(headers, uri.query());
        let format = signals.response_format(self.default_format);
        let request = LoadRequest {
            search: signals.search.clone(),
            headers: Arc::new(headers.clone()),
            levels: signals.levels.clone(),
            prefetch: signals.prefetch,
        };

        let outcome = match self.pipeline.execute(&chain, request).await {
            Ok(outcome) => outcome,
            Err(abort) => {
                tracing::debug!("Request for {} aborted: {}", chain.pathname, abort);
                return abort.into_response();
            }
        };

        let mut response = match format {
            ResponseFormat::Stream => {
                let mut response = Response::new(Body::from_stream(encode(outcome)));
                response.headers_mut().insert(
                    header::CONTENT_TYPE,
                    HeaderValue::from_static(NDJSON_CONTENT_TYPE),
                );
                response
            }
            ResponseFormat::Document => {
                let level_ids = chain.level_ids();
                let snapshot = outcome.into_snapshot().await;
                let head = snapshot.merged_head(&level_ids);
                let ctx = DocumentContext {
                    pathname: &chain.pathname,
                    level_ids: &level_ids,
                    snapshot: &snapshot,
                    head: &head,
                };

                match render_document(self.renderer.as_ref(), &ctx) {
                    Ok(markup) => Html(markup.into_string()).into_response(),
                    Err(err) => {
                        tracing::error!("Failed to serialize snapshot for {}: {}", chain.pathname, err);
                        return (StatusCode::INTERNAL_SERVER_ERROR, "snapshot encoding failed")
                            .into_response();
                    }
                }
            }
        };

        let response_headers = response.headers_mut();
        response_headers.insert(header::VARY, HeaderValue::from_static("x-strata-data, x-strata-levels"));
        if signals.prefetch {
            response_headers.insert(
                header::CACHE_CONTROL,
                HeaderValue::from_static("private, max-age=0"),
            );
            response_headers.insert(PREFETCH_HEADER, HeaderValue::from_static("1"));
        } else if format == ResponseFormat::Stream {
            response_headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
        }

        response
    }
}

impl<H> Clone for StrataService<H> {
    fn clone(&self) -> Self {
        Self {
            router: Arc::clone(&self.router),
            pipeline: self.pipeline.clone(),
            renderer: Arc::clone(&self.renderer),
            default_format: self.default_format,
        }
    }
}

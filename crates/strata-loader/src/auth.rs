//! Auth resolution, memoized per request

use crate::error::{LoaderThrow, RequestAbort};
use async_trait::async_trait;
use axum::http::HeaderMap;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::OnceCell;

/// Why auth did not resolve
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthFailure {
    #[error("no valid credentials")]
    Unauthenticated,
    #[error("credentials lack permission")]
    Forbidden,
}

impl From<AuthFailure> for RequestAbort {
    fn from(failure: AuthFailure) -> Self {
        match failure {
            AuthFailure::Unauthenticated => RequestAbort::Unauthenticated,
            AuthFailure::Forbidden => RequestAbort::Forbidden,
        }
    }
}

impl From<AuthFailure> for LoaderThrow {
    fn from(failure: AuthFailure) -> Self {
        LoaderThrow::Abort(failure.into())
    }
}

/// Opaque auth provider
///
/// Implementations inspect the request headers and return whatever
/// identity value the application's loaders expect.
#[async_trait]
pub trait AuthResolver: Send + Sync + 'static {
    async fn resolve(&self, headers: &HeaderMap) -> Result<Value, AuthFailure>;
}

/// Request-scoped auth accessor
///
/// The first caller runs the resolver; everyone else awaits the same result.
#[derive(Clone)]
pub struct AuthGate {
    cell: Arc<OnceCell<Result<Value, AuthFailure>>>,
    resolver: Option<Arc<dyn AuthResolver>>,
    headers: Arc<HeaderMap>,
}

impl AuthGate {
    pub fn new(resolver: Option<Arc<dyn AuthResolver>>, headers: Arc<HeaderMap>) -> Self {
        Self {
            cell: Arc::new(OnceCell::new()),
            resolver,
            headers,
        }
    }

    /// Resolves auth at most once for this request
    pub async fn resolve(&self) -> Result<Value, AuthFailure> {
        self.cell
            .get_or_init(|| async {
                match &self.resolver {
                    Some(resolver) => {
                        tracing::debug!("Resolving auth for request");
                        resolver.resolve(&self.headers).await
                    }
                    None => Err(AuthFailure::Unauthenticated),
                }
            })
            .await
            .clone()
    }

    /// Whether a resolution has already happened
    pub fn is_resolved(&self) -> bool {
        self.cell.initialized()
    }
}

impl std::fmt::Debug for AuthGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthGate")
            .field("has_resolver", &self.resolver.is_some())
            .field("resolved", &self.cell.initialized())
            .finish()
    }
}

/// Resolver that reads a bearer token from one header
///
/// Any non-empty value is accepted and exposed as `{"token": ...}`. Useful
/// for development servers and tests.
#[derive(Debug, Clone)]
pub struct HeaderTokenResolver {
    header: String,
}

impl HeaderTokenResolver {
    pub fn new(header: impl Into<String>) -> Self {
        Self {
            header: header.into(),
        }
    }
}

#[async_trait]
impl AuthResolver for HeaderTokenResolver {
    async fn resolve(&self, headers: &HeaderMap) -> Result<Value, AuthFailure> {
        let raw = headers
            .get(self.header.as_str())
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .ok_or(AuthFailure::Unauthenticated)?;

        let token = raw.strip_prefix("Bearer ").unwrap_or(raw);
        Ok(serde_json::json!({ "token": token }))
    }
}

//! # Strata Loader
//!
//! Runs the two-phase loading pipeline over a matched chain and delivers the
//! result as an NDJSON stream or a full document.
//!
//! ## Phases
//!
//! 1. **Preload**: strictly root to leaf. Each output is layered onto the
//!    context seen by deeper levels.
//! 2. **Load**: selected levels run concurrently. A loader may `defer`
//!    values; `stream: false` ones settle before its loader message,
//!    `stream: true` ones arrive after the ready boundary.
//!
//! ## Example
//!
//! ```no_run
//! use serde_json::json;
//! use strata_loader::{DeferOptions, LevelHandlers, StrataService};
//! use strata_router::{RouteDef, Router};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let router = Router::builder()
//!     .with_route(RouteDef::root(LevelHandlers::new()))
//!     .with_route(RouteDef::page(
//!         "/products/[id]",
//!         LevelHandlers::new().loader(|args| async move {
//!             let id = args.param("id").unwrap_or_default().to_string();
//!             let reviews = args.defer(DeferOptions::streamed("reviews"), async {
//!                 Ok(vec!["great lamp"])
//!             })?;
//!             Ok(json!({ "id": id, "reviews": reviews }))
//!         }),
//!     ))
//!     .build()?;
//!
//! let service = StrataService::new(router);
//! # let _ = service;
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod context;
pub mod defer;
pub mod document;
pub mod error;
pub mod handler;
pub mod pipeline;
pub mod query;
pub mod request;
pub mod service;
pub mod signal;
pub mod stream;

pub use auth::{AuthFailure, AuthGate, AuthResolver, HeaderTokenResolver};
pub use context::LoaderContext;
pub use defer::{DeferOptions, DeferRegistry, Deferrer, Settlement};
pub use document::{render_document, DocumentContext, DocumentRenderer, ShellRenderer, SNAPSHOT_ELEMENT_ID};
pub use error::{LoadResult, LoaderThrow, RequestAbort};
pub use handler::{HeadArgs, LevelHandlers, LoaderArgs, PreloadArgs, RouteHandler};
pub use pipeline::{LevelResult, LoadOutcome, LoadRequest, Pipeline};
pub use query::QueryTracker;
pub use request::{RequestSignals, ResponseFormat};
pub use service::StrataService;
pub use signal::{AbortController, AbortSignal};
pub use stream::{encode, message_stream};

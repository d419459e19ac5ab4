//! # Strata Client
//!
//! The client half of a Strata application, independent of any browser
//! binding:
//! - [`fetcher`] consumes the NDJSON data stream as lines complete
//! - [`cache`] decides which levels of a match chain need fresh data
//! - [`history`] and [`scroll`] keep per-entry state and scroll positions
//! - [`navigation`] ties them together behind a [`DataTransport`]
//!
//! ```
//! use chrono::Utc;
//! use std::time::Duration;
//! use strata_client::{compute_needed_match_ids, NavigationCache};
//! use strata_router::{RouteDef, Router};
//!
//! let router = Router::builder()
//!     .with_route(RouteDef::root(()))
//!     .with_route(RouteDef::page("/products/[id]", ()))
//!     .build()
//!     .unwrap();
//! let chain = router.match_path("/products/7").unwrap();
//!
//! let now = Utc::now();
//! let mut cache = NavigationCache::new();
//! cache.record_loaded("_root_", now - chrono::Duration::seconds(10), None);
//!
//! let needed = compute_needed_match_ids(&chain, &cache, "", now, Duration::from_secs(60));
//! assert_eq!(needed, vec!["_root_/products/[id]"]);
//! ```

pub mod cache;
pub mod config;
pub mod fetcher;
pub mod history;
pub mod navigation;
pub mod scroll;

pub use cache::{compute_needed_match_ids, CacheEntry, NavigationCache};
pub use config::ClientConfig;
pub use fetcher::{
    consume, CollectingObserver, FetchError, FetchObserver, FetchSummary, LineDecoder,
    MessageDispatcher, StreamPhase,
};
pub use history::{new_history_key, HistoryState, Location, NavFormat};
pub use navigation::{
    ByteStream, DataRequest, DataTransport, Navigation, NavigationError, NavigationKind,
    NavigationOutcome, Navigator,
};
pub use scroll::{
    MemoryStorage, ScrollPosition, ScrollStore, ScrollTarget, SessionStorage,
    DEFAULT_SCROLL_CAPACITY, SCROLL_STORAGE_KEY,
};

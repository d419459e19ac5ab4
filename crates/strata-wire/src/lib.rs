//! # Strata Wire
//!
//! Types shared by the server-side loading pipeline and the client data
//! fetcher:
//!
//! - [`StreamMessage`]: one newline-delimited JSON object of a data stream
//! - [`DeferredHandle`]: the explicit placeholder for a deferred value
//! - [`ErrorPayload`]: the wire shape of an error
//! - [`HeadFields`], [`QueryState`]: per-level head metadata and tracked reads
//! - [`DocumentSnapshot`]: the data embedded in a full-document response
//!
//! ## Example
//!
//! ```
//! use strata_wire::StreamMessage;
//!
//! let line = StreamMessage::Ready.to_line();
//! assert_eq!(line, "{\"t\":\"r\"}\n");
//! assert_eq!(StreamMessage::parse_line(&line).unwrap(), StreamMessage::Ready);
//! ```

pub mod deferred;
pub mod error;
pub mod head;
pub mod message;
pub mod query;
pub mod snapshot;

pub use deferred::{DeferredHandle, DeferredState, DEFER_MARKER};
pub use error::{ErrorPayload, ERROR_MARKER};
pub use head::{HeadFields, LinkTag, MetaTag};
pub use message::StreamMessage;
pub use query::QueryState;
pub use snapshot::DocumentSnapshot;

/// Content type of a streamed data response
pub const NDJSON_CONTENT_TYPE: &str = "application/x-ndjson";

/// Version of the wire protocol
pub const PROTOCOL_VERSION: &str = "1";

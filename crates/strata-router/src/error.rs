//! Build-time route tree errors

use thiserror::Error;

/// Raised while building the route tree, never at request time
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TreeConfigurationError {
    /// Two wildcard children of the same kind with different names at one node
    #[error("conflicting {kind} parameter at `{at}`: `{existing}` vs `{incoming}`")]
    ConflictingParam {
        at: String,
        kind: &'static str,
        existing: String,
        incoming: String,
    },

    /// Two definitions resolving to the same URL shape
    #[error("route `{template}` conflicts with `{existing}`")]
    DuplicateRoute { template: String, existing: String },

    /// A catch-all followed by more URL segments
    #[error("catch-all must be the last segment of `{template}`")]
    CatchAllNotTerminal { template: String },

    /// No root shell registered
    #[error("no root route defined")]
    MissingRoot,

    /// Unparseable template
    #[error("invalid template `{template}`: {reason}")]
    InvalidTemplate { template: String, reason: String },
}

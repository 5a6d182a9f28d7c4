//! Error taxonomy for the store engine

use modelgraph_core_types::{ElementId, IdentifierError, SessionId};
use thiserror::Error;

use crate::session::SessionResult;

/// Result type alias using ModelError
pub type Result<T> = std::result::Result<T, ModelError>;

/// Canonical error taxonomy for the store engine
///
/// Structural violations (`DisposedElement`, `UnknownSchema`, `InvalidType`)
/// are raised immediately at the violating call. Constraint-evaluator faults
/// never surface here: they are caught and downgraded to Error diagnostics
/// inside the session result. `SessionFailed` is raised only when a
/// non-Silent session closes with Error-severity diagnostics, after rollback
/// has already restored consistency.
#[derive(Debug, Error)]
pub enum ModelError {
    /// Any operation against an element whose disposed flag is set
    #[error("element '{element_id}' is disposed")]
    DisposedElement { element_id: ElementId },

    /// The element id does not resolve to a live element
    #[error("element '{element_id}' was not found")]
    ElementNotFound { element_id: ElementId },

    /// An element with this id already exists and is not disposed
    #[error("element '{element_id}' already exists")]
    ElementExists { element_id: ElementId },

    /// A schema or schema element id that cannot be resolved
    #[error("unknown schema '{schema_id}'")]
    UnknownSchema { schema_id: String },

    /// A schema name registered twice on the same store
    #[error("schema '{name}' is already registered")]
    DuplicateSchema { name: String },

    /// A schema element defined twice within one schema
    #[error("schema element '{schema_id}' is already defined")]
    DuplicateSchemaElement { schema_id: String },

    /// The domain name does not resolve against the store registry
    #[error("unknown domain '{name}'")]
    UnknownDomain { name: String },

    /// A domain name registered twice on the same store
    #[error("domain '{name}' already exists")]
    DuplicateDomain { name: String },

    /// A property name that does not resolve across the inheritance chain
    #[error("schema element '{schema_id}' has no property '{property}'")]
    UnknownProperty { schema_id: String, property: String },

    /// Cardinality or type mismatch at a mutating call
    #[error("invalid type: {reason}")]
    InvalidType { reason: String },

    /// Malformed identifier (missing separator, reserved character)
    #[error("invalid identifier: {0}")]
    InvalidIdentifier(#[from] IdentifierError),

    /// Use of a session after its final close
    #[error("session {session_id} is already closed")]
    SessionClosed { session_id: SessionId },

    /// A non-Silent session closed with Error-severity diagnostics
    ///
    /// Carries the full session result; the store has already been rolled
    /// back to its pre-session state when this is raised.
    #[error("session {} failed with {} error diagnostic(s)", result.session_id, result.error_count())]
    SessionFailed { result: Box<SessionResult> },
}

impl ModelError {
    /// Build an `InvalidType` error from a reason string
    pub fn invalid_type(reason: impl Into<String>) -> Self {
        Self::InvalidType {
            reason: reason.into(),
        }
    }

    /// The failed session result, if this is a `SessionFailed` error
    pub fn session_result(&self) -> Option<&SessionResult> {
        match self {
            Self::SessionFailed { result } => Some(result),
            _ => None,
        }
    }
}

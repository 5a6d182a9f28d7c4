//! Core types shared across Modelgraph facilities
//!
//! This crate provides foundational types used by the store engine and by
//! external adapters:
//!
//! - **Identifier types**: ElementId (`"<domain>:<localKey>"`) and
//!   SchemaElementId (`"<schemaName>.<localName>"`), validated on construction
//! - **Correlation types**: StoreId, SessionId
//! - **Schema constants**: Canonical field keys for structured logging

pub mod correlation;
pub mod ids;
pub mod schema;

pub use correlation::{SessionId, StoreId};
pub use ids::{ElementId, IdentifierError, SchemaElementId};

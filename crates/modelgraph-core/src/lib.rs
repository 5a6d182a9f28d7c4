//! Modelgraph core: an embeddable, transactional, in-memory object-graph
//! store.
//!
//! Typed schemas govern named domains of entities and relationships. All
//! mutation happens inside nestable sessions with atomic commit/rollback,
//! is described by reversible events routed through a single dispatcher,
//! and is validated by schema-attached constraints at commit. The same
//! event log drives rollback, the undo manager, and replication observers.
//!
//! ```no_run
//! use modelgraph_core::{Schema, SessionConfig, Store};
//! use modelgraph_core_types::SchemaElementId;
//! use serde_json::json;
//!
//! # fn main() -> modelgraph_core::Result<()> {
//! let mut schema = Schema::new("library")?;
//! let string = SchemaElementId::new("core", "string")?;
//! let book = schema.define_entity("Book", None)?;
//! schema.add_property(&book, "title", &string, None)?;
//!
//! let mut store = Store::new();
//! store.register_schema(schema)?;
//! store.create_domain("lib", "library")?;
//!
//! let (id, _result) = store.with_session(SessionConfig::default(), |store, session| {
//!     let id = store.create_entity(session, "lib", &book, None)?;
//!     store.set_property_value(session, &id, "title", json!("Dune"))?;
//!     Ok(id)
//! })?;
//! assert!(store.element(&id).is_some());
//! # Ok(())
//! # }
//! ```

pub mod constraints;
pub mod dispatch;
pub mod domain;
pub mod errors;
pub mod events;
pub mod logging_facility;
pub mod model;
pub mod session;
pub mod store;
pub mod subscribers;
pub mod undo;

pub use constraints::{
    Constraint, ConstraintContext, ConstraintEvaluator, ConstraintKind, ConstraintsManager,
    DiagnosticMessage, Severity,
};
pub use dispatch::{EventDispatcher, EventHandler};
pub use domain::DomainModel;
pub use errors::{ModelError, Result};
pub use events::{Event, EventKind, EventPayload};
pub use model::{
    Cardinality, ModelElement, PropertyKind, PropertyValue, RelationshipEndpoints, Schema,
    SchemaElement, SchemaKind, SchemaProperty, SchemaRelationshipDef,
};
pub use session::{
    Session, SessionConfig, SessionMode, SessionResult, TrackedElement, TrackingData,
    TrackingState,
};
pub use store::{Store, CORE_SCHEMA};
pub use subscribers::{ObserverHandle, SessionObserver};
pub use undo::{UndoBatch, UndoManager};

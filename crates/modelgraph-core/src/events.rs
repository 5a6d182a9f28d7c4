//! Event model: the closed set of reversible mutation records
//!
//! Every state change in a domain is described by exactly one event. Events
//! are immutable values with a total `reverse` operation, which is what lets
//! rollback, undo/redo, and replication all ride the same replay mechanism.
//!
//! The union is closed over six built-in kinds plus one opaque-payload
//! `Custom` extension point for adapter-defined events.

use modelgraph_core_types::{ElementId, SchemaElementId, SessionId};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::model::RelationshipEndpoints;

/// Event kind tag, used as the dispatch table key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    AddEntity,
    RemoveEntity,
    AddRelationship,
    RemoveRelationship,
    ChangePropertyValue,
    RemoveProperty,
    Custom,
}

/// Kind-specific event data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EventPayload {
    AddEntity {
        id: ElementId,
        schema_id: SchemaElementId,
    },
    RemoveEntity {
        id: ElementId,
        schema_id: SchemaElementId,
    },
    AddRelationship {
        id: ElementId,
        schema_id: SchemaElementId,
        endpoints: RelationshipEndpoints,
    },
    RemoveRelationship {
        id: ElementId,
        schema_id: SchemaElementId,
        endpoints: RelationshipEndpoints,
    },
    ChangePropertyValue {
        id: ElementId,
        schema_id: SchemaElementId,
        property: String,
        value: JsonValue,
        /// None on the first write of this property
        old_value: Option<JsonValue>,
        property_version: u64,
    },
    RemoveProperty {
        id: ElementId,
        schema_id: SchemaElementId,
        property: String,
        /// The value removed; carried so the reverse can restore it
        value: JsonValue,
        property_version: u64,
    },
    /// Opaque extension point; `reverse` swaps payload and reverse_payload
    Custom {
        kind: String,
        payload: JsonValue,
        reverse_payload: JsonValue,
    },
}

/// One immutable, reversible record of a state change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Target domain name
    pub domain: String,
    /// Id of the producing session; used to suppress re-logging of
    /// externally replayed events
    pub correlation: SessionId,
    /// Target element version at emission
    pub version: u64,
    /// Entity/relationship add/remove are top-level; cascaded property
    /// removal is not. Replication channels serialize only top-level events.
    pub top_level: bool,
    pub payload: EventPayload,
}

impl Event {
    pub fn new(
        domain: &str,
        correlation: SessionId,
        version: u64,
        top_level: bool,
        payload: EventPayload,
    ) -> Self {
        Self {
            domain: domain.to_string(),
            correlation,
            version,
            top_level,
            payload,
        }
    }

    /// The kind tag of this event
    pub fn kind(&self) -> EventKind {
        match &self.payload {
            EventPayload::AddEntity { .. } => EventKind::AddEntity,
            EventPayload::RemoveEntity { .. } => EventKind::RemoveEntity,
            EventPayload::AddRelationship { .. } => EventKind::AddRelationship,
            EventPayload::RemoveRelationship { .. } => EventKind::RemoveRelationship,
            EventPayload::ChangePropertyValue { .. } => EventKind::ChangePropertyValue,
            EventPayload::RemoveProperty { .. } => EventKind::RemoveProperty,
            EventPayload::Custom { .. } => EventKind::Custom,
        }
    }

    /// The element this event targets, if any
    pub fn element_id(&self) -> Option<&ElementId> {
        match &self.payload {
            EventPayload::AddEntity { id, .. }
            | EventPayload::RemoveEntity { id, .. }
            | EventPayload::AddRelationship { id, .. }
            | EventPayload::RemoveRelationship { id, .. }
            | EventPayload::ChangePropertyValue { id, .. }
            | EventPayload::RemoveProperty { id, .. } => Some(id),
            EventPayload::Custom { .. } => None,
        }
    }

    /// Compute the inverse event, stamped with a new correlation id
    ///
    /// Total over every payload variant: Add and Remove pair up,
    /// ChangePropertyValue swaps value/old_value (reversing to
    /// RemoveProperty when there was no prior value), and Custom swaps its
    /// opaque payloads.
    pub fn reverse(&self, correlation: SessionId) -> Event {
        let payload = match &self.payload {
            EventPayload::AddEntity { id, schema_id } => EventPayload::RemoveEntity {
                id: id.clone(),
                schema_id: schema_id.clone(),
            },
            EventPayload::RemoveEntity { id, schema_id } => EventPayload::AddEntity {
                id: id.clone(),
                schema_id: schema_id.clone(),
            },
            EventPayload::AddRelationship {
                id,
                schema_id,
                endpoints,
            } => EventPayload::RemoveRelationship {
                id: id.clone(),
                schema_id: schema_id.clone(),
                endpoints: endpoints.clone(),
            },
            EventPayload::RemoveRelationship {
                id,
                schema_id,
                endpoints,
            } => EventPayload::AddRelationship {
                id: id.clone(),
                schema_id: schema_id.clone(),
                endpoints: endpoints.clone(),
            },
            EventPayload::ChangePropertyValue {
                id,
                schema_id,
                property,
                value,
                old_value,
                property_version,
            } => match old_value {
                Some(old) => EventPayload::ChangePropertyValue {
                    id: id.clone(),
                    schema_id: schema_id.clone(),
                    property: property.clone(),
                    value: old.clone(),
                    old_value: Some(value.clone()),
                    property_version: *property_version,
                },
                // First write: reversing means un-setting the property
                None => EventPayload::RemoveProperty {
                    id: id.clone(),
                    schema_id: schema_id.clone(),
                    property: property.clone(),
                    value: value.clone(),
                    property_version: *property_version,
                },
            },
            EventPayload::RemoveProperty {
                id,
                schema_id,
                property,
                value,
                property_version,
            } => EventPayload::ChangePropertyValue {
                id: id.clone(),
                schema_id: schema_id.clone(),
                property: property.clone(),
                value: value.clone(),
                old_value: None,
                property_version: *property_version,
            },
            EventPayload::Custom {
                kind,
                payload,
                reverse_payload,
            } => EventPayload::Custom {
                kind: kind.clone(),
                payload: reverse_payload.clone(),
                reverse_payload: payload.clone(),
            },
        };
        Event {
            domain: self.domain.clone(),
            correlation,
            version: self.version,
            top_level: self.top_level,
            payload,
        }
    }
}

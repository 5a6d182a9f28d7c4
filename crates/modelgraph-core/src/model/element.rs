//! Runtime instances: model elements and property values

use modelgraph_core_types::{ElementId, SchemaElementId};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Endpoint identities carried by relationship instances
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationshipEndpoints {
    pub start: ElementId,
    pub start_schema: SchemaElementId,
    pub end: ElementId,
    pub end_schema: SchemaElementId,
}

/// A live instance of a schema element inside a domain
///
/// The version is bumped on every property write. The disposed flag is
/// terminal: a disposed element is never revived in place, only re-created
/// through event replay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelElement {
    pub id: ElementId,
    pub schema_id: SchemaElementId,
    pub version: u64,
    pub disposed: bool,
    /// Present iff this instance is a relationship
    pub endpoints: Option<RelationshipEndpoints>,
}

impl ModelElement {
    /// Create a new entity (or value object) instance
    pub fn new_entity(id: ElementId, schema_id: SchemaElementId, version: u64) -> Self {
        Self {
            id,
            schema_id,
            version,
            disposed: false,
            endpoints: None,
        }
    }

    /// Create a new relationship instance
    pub fn new_relationship(
        id: ElementId,
        schema_id: SchemaElementId,
        endpoints: RelationshipEndpoints,
        version: u64,
    ) -> Self {
        Self {
            id,
            schema_id,
            version,
            disposed: false,
            endpoints: Some(endpoints),
        }
    }

    pub fn is_relationship(&self) -> bool {
        self.endpoints.is_some()
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }
}

/// The stored value of one `(element, property)` pair
///
/// This triple is the unit the constraint engine and event model operate on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyValue {
    pub value: JsonValue,
    pub old_value: Option<JsonValue>,
    pub version: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_entity() {
        let id = ElementId::new("d", "e1").unwrap();
        let schema = SchemaElementId::new("s", "E").unwrap();
        let el = ModelElement::new_entity(id.clone(), schema, 1);

        assert_eq!(el.id, id);
        assert_eq!(el.version, 1);
        assert!(!el.is_disposed());
        assert!(!el.is_relationship());
    }

    #[test]
    fn test_new_relationship_carries_endpoints() {
        let rel = ModelElement::new_relationship(
            ElementId::new("d", "r1").unwrap(),
            SchemaElementId::new("s", "R").unwrap(),
            RelationshipEndpoints {
                start: ElementId::new("d", "a").unwrap(),
                start_schema: SchemaElementId::new("s", "A").unwrap(),
                end: ElementId::new("d", "b").unwrap(),
                end_schema: SchemaElementId::new("s", "B").unwrap(),
            },
            1,
        );

        assert!(rel.is_relationship());
        let endpoints = rel.endpoints.unwrap();
        assert_eq!(endpoints.start.key(), "a");
        assert_eq!(endpoints.end.key(), "b");
    }
}

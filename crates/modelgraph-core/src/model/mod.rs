pub mod element;
pub mod schema;

pub use element::{ModelElement, PropertyValue, RelationshipEndpoints};
pub use schema::{
    Cardinality, PropertyKind, Schema, SchemaElement, SchemaKind, SchemaProperty,
    SchemaRelationshipDef,
};

//! Shared fixtures: a small library schema over one `lib` domain
//!
//! Book and Shelf entities, a many-to-many `Holds` relationship, and an
//! embedded one-to-many `Owns` relationship from Library to Book.
#![allow(dead_code)]

use modelgraph_core::{Cardinality, Schema, SchemaRelationshipDef, Store};
use modelgraph_core_types::{ElementId, SchemaElementId};
use serde_json::Value as JsonValue;

pub const DOMAIN: &str = "lib";

pub fn sid(name: &str) -> SchemaElementId {
    SchemaElementId::new("library", name).unwrap()
}

pub fn core(name: &str) -> SchemaElementId {
    SchemaElementId::new("core", name).unwrap()
}

pub fn eid(key: &str) -> ElementId {
    ElementId::new(DOMAIN, key).unwrap()
}

pub fn library_schema() -> Schema {
    let mut schema = Schema::new("library").unwrap();
    let book = schema.define_entity("Book", None).unwrap();
    schema
        .add_property(&book, "title", &core("string"), None)
        .unwrap();
    schema
        .add_property(&book, "pages", &core("number"), Some(JsonValue::from(0)))
        .unwrap();
    let shelf = schema.define_entity("Shelf", None).unwrap();
    schema
        .add_property(&shelf, "label", &core("string"), None)
        .unwrap();
    schema
        .define_relationship(
            "Holds",
            SchemaRelationshipDef::new(shelf, book.clone(), Cardinality::ManyToMany),
        )
        .unwrap();
    let library = schema.define_entity("Library", None).unwrap();
    schema
        .define_relationship(
            "Owns",
            SchemaRelationshipDef::new(library, book, Cardinality::OneToMany).embedded(),
        )
        .unwrap();
    schema
}

pub fn library_store() -> Store {
    let mut store = Store::new();
    store.register_schema(library_schema()).unwrap();
    store.create_domain(DOMAIN, "library").unwrap();
    store
}

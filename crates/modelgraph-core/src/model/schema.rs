//! Schema model: type definitions governing domain instances
//!
//! A `Schema` is a named set of `SchemaElement`s (entities, relationships,
//! value objects, primitives) with single-parent inheritance. Inheritance
//! chains are resolved once, when the schema is registered on a store, into
//! memoized flattened chains so that runtime lookups never re-walk the base
//! pointers.
//!
//! Schema elements are built once and treated immutable thereafter.

use std::collections::HashMap;

use modelgraph_core_types::SchemaElementId;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::constraints::ConstraintsManager;
use crate::errors::{ModelError, Result};

/// Kind tag for a schema element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SchemaKind {
    Primitive,
    ValueObject,
    Entity,
    Relationship,
}

/// Relationship cardinality, start-to-end
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Cardinality {
    OneToOne,
    OneToMany,
    ManyToOne,
    ManyToMany,
}

impl Cardinality {
    /// A given start may hold at most one relationship of this schema
    pub fn unique_end_per_start(self) -> bool {
        matches!(self, Cardinality::OneToOne | Cardinality::ManyToOne)
    }

    /// A given end may receive at most one relationship of this schema
    pub fn unique_start_per_end(self) -> bool {
        matches!(self, Cardinality::OneToOne | Cardinality::OneToMany)
    }
}

/// Property kind: stored value or derived
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PropertyKind {
    Normal,
    Calculated,
}

/// A property definition on a schema element
///
/// Name uniqueness is resolved across the inheritance chain at lookup time
/// (nearest definition wins), not enforced at definition time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaProperty {
    pub name: String,
    /// Schema element id of the value type (e.g. `core.string`)
    pub value_schema: SchemaElementId,
    pub default_value: Option<JsonValue>,
    pub kind: PropertyKind,
    /// The schema element this property is defined on
    pub owner: SchemaElementId,
}

/// Relationship-specific definition carried by Relationship schema elements
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaRelationshipDef {
    /// Required schema of the start endpoint
    pub start: SchemaElementId,
    /// Required schema of the end endpoint
    pub end: SchemaElementId,
    pub cardinality: Cardinality,
    /// Embedded: the non-owning (end) endpoint's lifetime is tied to the
    /// relationship
    pub embedded: bool,
    /// Optional navigation property name on the start element
    pub start_property: Option<String>,
    /// Optional navigation property name on the end element
    pub end_property: Option<String>,
}

impl SchemaRelationshipDef {
    /// A plain (non-embedded) relationship definition with no navigation
    /// properties
    pub fn new(start: SchemaElementId, end: SchemaElementId, cardinality: Cardinality) -> Self {
        Self {
            start,
            end,
            cardinality,
            embedded: false,
            start_property: None,
            end_property: None,
        }
    }

    /// Mark the relationship as embedded
    pub fn embedded(mut self) -> Self {
        self.embedded = true;
        self
    }

    /// Set the navigation property names
    pub fn with_navigation(
        mut self,
        start_property: Option<&str>,
        end_property: Option<&str>,
    ) -> Self {
        self.start_property = start_property.map(str::to_string);
        self.end_property = end_property.map(str::to_string);
        self
    }
}

/// A type definition inside a schema
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaElement {
    pub id: SchemaElementId,
    pub kind: SchemaKind,
    /// Optional single base element; inheritance is a tree
    pub base: Option<SchemaElementId>,
    /// Own properties; inherited ones are resolved via the base chain
    pub properties: Vec<SchemaProperty>,
    /// Present iff `kind == Relationship`
    pub relationship: Option<SchemaRelationshipDef>,
}

impl SchemaElement {
    pub fn is_relationship(&self) -> bool {
        self.kind == SchemaKind::Relationship
    }

    /// Find an own (non-inherited) property by name
    pub fn own_property(&self, name: &str) -> Option<&SchemaProperty> {
        self.properties.iter().find(|p| p.name == name)
    }
}

/// A named set of schema elements governing one or more domains
///
/// Owns one `ConstraintsManager`, optionally chained to a parent schema's
/// manager by name. Base chains are memoized by `resolve()`, which the store
/// calls at registration; after that the schema is treated immutable.
#[derive(Debug)]
pub struct Schema {
    name: String,
    elements: HashMap<SchemaElementId, SchemaElement>,
    /// Definition order, for deterministic iteration
    order: Vec<SchemaElementId>,
    constraints: ConstraintsManager,
    /// Memoized base chains, element id -> [self, base, base-of-base, ...]
    chains: HashMap<SchemaElementId, Vec<SchemaElementId>>,
}

impl Schema {
    /// Create an empty schema
    ///
    /// # Errors
    ///
    /// Returns `InvalidIdentifier` if the name contains a reserved separator.
    pub fn new(name: &str) -> Result<Self> {
        // A schema name must itself be a valid identifier part
        SchemaElementId::new(name, "x")?;
        Ok(Self {
            name: name.to_string(),
            elements: HashMap::new(),
            order: Vec::new(),
            constraints: ConstraintsManager::new(),
            chains: HashMap::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The schema's constraints manager
    pub fn constraints(&self) -> &ConstraintsManager {
        &self.constraints
    }

    /// Mutable access for constraint registration
    pub fn constraints_mut(&mut self) -> &mut ConstraintsManager {
        &mut self.constraints
    }

    /// Chain this schema's constraints manager to a parent schema's
    pub fn chain_constraints_to(&mut self, parent_schema: &str) {
        self.constraints.set_parent(parent_schema);
    }

    fn define(
        &mut self,
        name: &str,
        kind: SchemaKind,
        base: Option<&SchemaElementId>,
        relationship: Option<SchemaRelationshipDef>,
    ) -> Result<SchemaElementId> {
        let id = SchemaElementId::new(&self.name, name)?;
        if self.elements.contains_key(&id) {
            return Err(ModelError::DuplicateSchemaElement {
                schema_id: id.to_string(),
            });
        }
        self.elements.insert(
            id.clone(),
            SchemaElement {
                id: id.clone(),
                kind,
                base: base.cloned(),
                properties: Vec::new(),
                relationship,
            },
        );
        self.order.push(id.clone());
        Ok(id)
    }

    /// Define a primitive value type (e.g. a string or number root)
    pub fn define_primitive(&mut self, name: &str) -> Result<SchemaElementId> {
        self.define(name, SchemaKind::Primitive, None, None)
    }

    /// Define a value object, optionally deriving from a base element
    pub fn define_value_object(
        &mut self,
        name: &str,
        base: Option<&SchemaElementId>,
    ) -> Result<SchemaElementId> {
        self.define(name, SchemaKind::ValueObject, base, None)
    }

    /// Define an entity, optionally deriving from a base entity
    pub fn define_entity(
        &mut self,
        name: &str,
        base: Option<&SchemaElementId>,
    ) -> Result<SchemaElementId> {
        self.define(name, SchemaKind::Entity, base, None)
    }

    /// Define a relationship between two schema elements
    pub fn define_relationship(
        &mut self,
        name: &str,
        def: SchemaRelationshipDef,
    ) -> Result<SchemaElementId> {
        self.define(name, SchemaKind::Relationship, None, Some(def))
    }

    /// Add a stored property to a previously defined element
    pub fn add_property(
        &mut self,
        element: &SchemaElementId,
        name: &str,
        value_schema: &SchemaElementId,
        default_value: Option<JsonValue>,
    ) -> Result<()> {
        self.add_property_of_kind(element, name, value_schema, default_value, PropertyKind::Normal)
    }

    /// Add a calculated (derived, non-settable) property
    pub fn add_calculated_property(
        &mut self,
        element: &SchemaElementId,
        name: &str,
        value_schema: &SchemaElementId,
    ) -> Result<()> {
        self.add_property_of_kind(element, name, value_schema, None, PropertyKind::Calculated)
    }

    fn add_property_of_kind(
        &mut self,
        element: &SchemaElementId,
        name: &str,
        value_schema: &SchemaElementId,
        default_value: Option<JsonValue>,
        kind: PropertyKind,
    ) -> Result<()> {
        // Property names obey the same reserved-character rules as local names
        SchemaElementId::new(&self.name, name)?;
        let owner = element.clone();
        let value_schema = value_schema.clone();
        let el = self
            .elements
            .get_mut(element)
            .ok_or_else(|| ModelError::UnknownSchema {
                schema_id: element.to_string(),
            })?;
        el.properties.push(SchemaProperty {
            name: name.to_string(),
            value_schema,
            default_value,
            kind,
            owner,
        });
        Ok(())
    }

    /// Look up an element definition
    pub fn element(&self, id: &SchemaElementId) -> Option<&SchemaElement> {
        self.elements.get(id)
    }

    /// Elements in definition order
    pub fn elements(&self) -> impl Iterator<Item = &SchemaElement> {
        self.order.iter().filter_map(|id| self.elements.get(id))
    }

    /// Resolve and memoize every element's base chain
    ///
    /// Called by the store at registration time. After this the schema is
    /// treated immutable.
    ///
    /// # Errors
    ///
    /// Returns `UnknownSchema` for a dangling base reference and
    /// `InvalidType` for a cycle in the base chain.
    pub fn resolve(&mut self) -> Result<()> {
        let mut chains = HashMap::new();
        for id in &self.order {
            let mut chain = vec![id.clone()];
            let mut current = self.elements.get(id).and_then(|el| el.base.clone());
            while let Some(base_id) = current {
                if chain.contains(&base_id) {
                    return Err(ModelError::invalid_type(format!(
                        "inheritance cycle through '{base_id}'"
                    )));
                }
                let base = self
                    .elements
                    .get(&base_id)
                    .ok_or_else(|| ModelError::UnknownSchema {
                        schema_id: base_id.to_string(),
                    })?;
                chain.push(base_id.clone());
                current = base.base.clone();
            }
            chains.insert(id.clone(), chain);
        }
        self.chains = chains;
        Ok(())
    }

    /// The memoized base chain `[self, base, base-of-base, ...]`
    ///
    /// Empty for an unknown element id.
    pub fn base_chain(&self, id: &SchemaElementId) -> &[SchemaElementId] {
        self.chains.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Whether `id` is `candidate` or derives from it
    pub fn is_a(&self, id: &SchemaElementId, candidate: &SchemaElementId) -> bool {
        self.base_chain(id).contains(candidate)
    }

    /// Resolve a property by name across the inheritance chain
    ///
    /// The nearest definition wins when names shadow each other.
    pub fn find_property(
        &self,
        element: &SchemaElementId,
        name: &str,
    ) -> Option<&SchemaProperty> {
        self.base_chain(element)
            .iter()
            .filter_map(|id| self.elements.get(id))
            .find_map(|el| el.own_property(name))
    }

    /// All properties visible on an element, own first, shadowed inherited
    /// names excluded
    pub fn properties(&self, element: &SchemaElementId) -> Vec<&SchemaProperty> {
        let mut seen: Vec<&str> = Vec::new();
        let mut out = Vec::new();
        for id in self.base_chain(element) {
            if let Some(el) = self.elements.get(id) {
                for prop in &el.properties {
                    if !seen.contains(&prop.name.as_str()) {
                        seen.push(&prop.name);
                        out.push(prop);
                    }
                }
            }
        }
        out
    }
}

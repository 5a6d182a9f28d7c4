//! Domain storage: the indexed instance graph of one named domain
//!
//! HashMap-based, single-threaded storage in the same spirit as the rest of
//! the engine: elements by id, property values per `(element, property)`,
//! and relationship ids indexed under both endpoints so lookups by either
//! side are proportional to that endpoint's relationship count rather than
//! the whole graph.
//!
//! All mutation entry points here are `pub(crate)` apply-handlers invoked by
//! the event dispatcher; the public mutation surface on `Store` builds
//! events and routes them through dispatch so that every change is uniformly
//! loggable and reversible.

use std::collections::HashMap;

use modelgraph_core_types::{ElementId, SchemaElementId};
use serde_json::Value as JsonValue;

use crate::errors::{ModelError, Result};
use crate::model::{ModelElement, PropertyValue, RelationshipEndpoints};

/// Instance graph for one named domain
#[derive(Debug, Clone, Default)]
pub struct DomainModel {
    name: String,
    /// Name of the governing schema
    schema: String,
    /// Elements by id; disposed elements stay as tombstones
    elements: HashMap<ElementId, ModelElement>,
    /// Property values per element
    properties: HashMap<ElementId, HashMap<String, PropertyValue>>,
    /// Relationship ids indexed by start endpoint
    starts: HashMap<ElementId, Vec<ElementId>>,
    /// Relationship ids indexed by end endpoint
    ends: HashMap<ElementId, Vec<ElementId>>,
}

impl DomainModel {
    pub fn new(name: &str, schema: &str) -> Self {
        Self {
            name: name.to_string(),
            schema: schema.to_string(),
            ..Self::default()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn schema_name(&self) -> &str {
        &self.schema
    }

    /// Get a live element by id; disposed and unknown ids return None
    pub fn get(&self, id: &ElementId) -> Option<&ModelElement> {
        self.elements.get(id).filter(|el| !el.disposed)
    }

    /// Get an element bypassing the disposed check (tombstones included)
    pub fn get_raw(&self, id: &ElementId) -> Option<&ModelElement> {
        self.elements.get(id)
    }

    /// Get a live element or fail with the appropriate error
    ///
    /// # Errors
    ///
    /// Returns `ElementNotFound` for an unknown id, `DisposedElement` for a
    /// tombstoned one.
    pub fn require(&self, id: &ElementId) -> Result<&ModelElement> {
        let el = self
            .elements
            .get(id)
            .ok_or_else(|| ModelError::ElementNotFound {
                element_id: id.clone(),
            })?;
        if el.disposed {
            return Err(ModelError::DisposedElement {
                element_id: id.clone(),
            });
        }
        Ok(el)
    }

    /// Number of live elements
    pub fn len(&self) -> usize {
        self.elements.values().filter(|el| !el.disposed).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All live elements (unordered)
    pub fn elements(&self) -> impl Iterator<Item = &ModelElement> {
        self.elements.values().filter(|el| !el.disposed)
    }

    /// Stored value for one `(element, property)` pair, defaults excluded
    pub fn property_value(&self, id: &ElementId, property: &str) -> Option<&PropertyValue> {
        self.properties.get(id).and_then(|map| map.get(property))
    }

    /// All stored property values of an element
    pub fn properties(&self, id: &ElementId) -> Option<&HashMap<String, PropertyValue>> {
        self.properties.get(id)
    }

    /// Lazy, restartable sequence of live relationships
    ///
    /// When a start or end terminal is supplied the walk is backed by that
    /// endpoint's index; otherwise it is a schema-filtered scan over the
    /// whole domain. Call again to restart.
    pub fn relationships<'a>(
        &'a self,
        schema: Option<&'a SchemaElementId>,
        start: Option<&'a ElementId>,
        end: Option<&'a ElementId>,
    ) -> Box<dyn Iterator<Item = &'a ModelElement> + 'a> {
        let candidates: Box<dyn Iterator<Item = &'a ModelElement> + 'a> = match (start, end) {
            (Some(s), _) => Box::new(
                self.starts
                    .get(s)
                    .into_iter()
                    .flatten()
                    .filter_map(|id| self.elements.get(id)),
            ),
            (None, Some(e)) => Box::new(
                self.ends
                    .get(e)
                    .into_iter()
                    .flatten()
                    .filter_map(|id| self.elements.get(id)),
            ),
            (None, None) => Box::new(self.elements.values().filter(|el| el.is_relationship())),
        };
        Box::new(candidates.filter(move |el| {
            if el.disposed || !el.is_relationship() {
                return false;
            }
            if let Some(sc) = schema {
                if el.schema_id != *sc {
                    return false;
                }
            }
            match (&el.endpoints, start, end) {
                (Some(endpoints), s, e) => {
                    s.map_or(true, |s| endpoints.start == *s)
                        && e.map_or(true, |e| endpoints.end == *e)
                }
                _ => false,
            }
        }))
    }

    /// Relationship ids incident to an element, via both endpoint indices
    pub(crate) fn incident_relationships(&self, id: &ElementId) -> Vec<ElementId> {
        let mut out = Vec::new();
        for index in [&self.starts, &self.ends] {
            if let Some(ids) = index.get(id) {
                for rel_id in ids {
                    if self.get(rel_id).is_some() && !out.contains(rel_id) {
                        out.push(rel_id.clone());
                    }
                }
            }
        }
        out
    }

    // ----- apply-handlers, invoked through the event dispatcher -----

    pub(crate) fn apply_add_entity(
        &mut self,
        id: &ElementId,
        schema_id: &SchemaElementId,
        version: u64,
    ) -> Result<()> {
        self.elements.insert(
            id.clone(),
            ModelElement::new_entity(id.clone(), schema_id.clone(), version),
        );
        Ok(())
    }

    pub(crate) fn apply_add_relationship(
        &mut self,
        id: &ElementId,
        schema_id: &SchemaElementId,
        endpoints: &RelationshipEndpoints,
        version: u64,
    ) -> Result<()> {
        self.elements.insert(
            id.clone(),
            ModelElement::new_relationship(
                id.clone(),
                schema_id.clone(),
                endpoints.clone(),
                version,
            ),
        );
        let starts = self.starts.entry(endpoints.start.clone()).or_default();
        starts.retain(|r| r != id);
        starts.push(id.clone());
        let ends = self.ends.entry(endpoints.end.clone()).or_default();
        ends.retain(|r| r != id);
        ends.push(id.clone());
        Ok(())
    }

    pub(crate) fn apply_remove_element(&mut self, id: &ElementId) -> Result<()> {
        let Some(el) = self.elements.get_mut(id) else {
            // Tolerated: the element may belong to a replica that never
            // loaded it
            return Ok(());
        };
        el.disposed = true;
        if let Some(endpoints) = el.endpoints.clone() {
            if let Some(starts) = self.starts.get_mut(&endpoints.start) {
                starts.retain(|r| r != id);
            }
            if let Some(ends) = self.ends.get_mut(&endpoints.end) {
                ends.retain(|r| r != id);
            }
        }
        Ok(())
    }

    pub(crate) fn apply_change_property(
        &mut self,
        id: &ElementId,
        property: &str,
        value: &JsonValue,
        old_value: Option<&JsonValue>,
        property_version: u64,
    ) -> Result<()> {
        self.properties.entry(id.clone()).or_default().insert(
            property.to_string(),
            PropertyValue {
                value: value.clone(),
                old_value: old_value.cloned(),
                version: property_version,
            },
        );
        if let Some(el) = self.elements.get_mut(id) {
            el.version += 1;
        }
        Ok(())
    }

    pub(crate) fn apply_remove_property(&mut self, id: &ElementId, property: &str) -> Result<()> {
        if let Some(map) = self.properties.get_mut(id) {
            map.remove(property);
            if map.is_empty() {
                self.properties.remove(id);
            }
        }
        if let Some(el) = self.elements.get_mut(id) {
            el.version += 1;
        }
        Ok(())
    }
}

//! Store: the root aggregate owning schemas, domains, and dispatch
//!
//! A store is a single-threaded, embeddable object-graph engine. Every
//! mutating call takes an explicit `&mut Session`; there is no ambient
//! session slot, so the borrow checker enforces what used to be a runtime
//! discipline. `with_session` is the scoping convenience for the common
//! one-shot case.
//!
//! Mutations never touch domain storage directly: each public mutator
//! validates, builds the describing event, routes it through the
//! dispatcher, and only then records it on the session. A failed dispatch
//! therefore logs nothing, and the session log stays an exact record of
//! applied changes.

use std::collections::{HashMap, HashSet};
use std::fmt;

use modelgraph_core_types::schema::EVENT_DISPATCH;
use modelgraph_core_types::{ElementId, SchemaElementId, SessionId, StoreId};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::constraints::{self, ConstraintKind, DiagnosticMessage};
use crate::dispatch::EventDispatcher;
use crate::domain::DomainModel;
use crate::errors::{ModelError, Result};
use crate::events::{Event, EventPayload};
use crate::model::{
    ModelElement, PropertyKind, PropertyValue, RelationshipEndpoints, Schema, SchemaElement,
    SchemaKind, SchemaProperty,
};
use crate::session::{Session, SessionConfig, SessionResult};
use crate::subscribers::ObserverHandle;

/// Name of the built-in schema holding the primitive value roots
pub const CORE_SCHEMA: &str = "core";

fn core_schema() -> Schema {
    // Statically valid identifiers; failure here is a programming error
    let mut schema = Schema::new(CORE_SCHEMA).expect("core schema name is valid");
    for primitive in ["string", "number", "boolean", "any"] {
        schema
            .define_primitive(primitive)
            .expect("core primitive name is valid");
    }
    schema.resolve().expect("core schema has no base references");
    schema
}

fn check_core_value(value_schema: &SchemaElementId, value: &JsonValue) -> Result<()> {
    // Null is the universal "unset" value
    if value_schema.schema() != CORE_SCHEMA || value.is_null() {
        return Ok(());
    }
    let conforms = match value_schema.name() {
        "string" => value.is_string(),
        "number" => value.is_number(),
        "boolean" => value.is_boolean(),
        _ => true,
    };
    if conforms {
        Ok(())
    } else {
        Err(ModelError::invalid_type(format!(
            "value {value} does not conform to '{value_schema}'"
        )))
    }
}

/// The root aggregate: schema registry, domain registry, dispatcher, and
/// observer lists
pub struct Store {
    id: StoreId,
    schemas: HashMap<String, Schema>,
    domains: HashMap<String, DomainModel>,
    dispatcher: EventDispatcher,
    next_session: u64,
    observers: Vec<ObserverHandle>,
    domain_observers: HashMap<String, Vec<ObserverHandle>>,
}

impl Store {
    /// Create an empty store with the `core` schema pre-registered
    pub fn new() -> Self {
        let mut schemas = HashMap::new();
        schemas.insert(CORE_SCHEMA.to_string(), core_schema());
        Self {
            id: StoreId::new(),
            schemas,
            domains: HashMap::new(),
            dispatcher: EventDispatcher::new(),
            next_session: 1,
            observers: Vec::new(),
            domain_observers: HashMap::new(),
        }
    }

    /// Globally unique store identity, used as replication origin
    pub fn id(&self) -> &StoreId {
        &self.id
    }

    // ----- schema and domain registries -----

    /// Register a schema, resolving its inheritance chains
    ///
    /// # Errors
    ///
    /// `DuplicateSchema` for a name collision; `UnknownSchema`/`InvalidType`
    /// when chain resolution fails.
    pub fn register_schema(&mut self, mut schema: Schema) -> Result<()> {
        if self.schemas.contains_key(schema.name()) {
            return Err(ModelError::DuplicateSchema {
                name: schema.name().to_string(),
            });
        }
        schema.resolve()?;
        self.schemas.insert(schema.name().to_string(), schema);
        Ok(())
    }

    pub fn schema(&self, name: &str) -> Option<&Schema> {
        self.schemas.get(name)
    }

    /// Mutable schema access, for constraint registration after the fact
    pub fn schema_mut(&mut self, name: &str) -> Option<&mut Schema> {
        self.schemas.get_mut(name)
    }

    /// Resolve a schema element definition
    ///
    /// # Errors
    ///
    /// `UnknownSchema` when either the schema or the element is missing.
    pub fn schema_element(&self, id: &SchemaElementId) -> Result<&SchemaElement> {
        self.schemas
            .get(id.schema())
            .and_then(|s| s.element(id))
            .ok_or_else(|| ModelError::UnknownSchema {
                schema_id: id.to_string(),
            })
    }

    /// Resolve a property definition across the inheritance chain
    ///
    /// # Errors
    ///
    /// `UnknownSchema` for an unregistered schema, `UnknownProperty` when the
    /// name resolves nowhere on the chain.
    pub fn property_definition(
        &self,
        schema_id: &SchemaElementId,
        name: &str,
    ) -> Result<&SchemaProperty> {
        let schema = self
            .schemas
            .get(schema_id.schema())
            .ok_or_else(|| ModelError::UnknownSchema {
                schema_id: schema_id.to_string(),
            })?;
        schema
            .find_property(schema_id, name)
            .ok_or_else(|| ModelError::UnknownProperty {
                schema_id: schema_id.to_string(),
                property: name.to_string(),
            })
    }

    /// Whether `id` is `candidate` or derives from it
    pub fn schema_is_a(&self, id: &SchemaElementId, candidate: &SchemaElementId) -> bool {
        if id == candidate {
            return true;
        }
        self.schemas
            .get(id.schema())
            .is_some_and(|s| s.is_a(id, candidate))
    }

    /// Create a named domain governed by a registered schema
    ///
    /// # Errors
    ///
    /// `InvalidIdentifier` for a name with reserved characters,
    /// `UnknownSchema` for an unregistered schema, `DuplicateDomain` for a
    /// name collision.
    pub fn create_domain(&mut self, name: &str, schema: &str) -> Result<()> {
        // A domain name must itself be a valid identifier part
        ElementId::new(name, "x")?;
        if !self.schemas.contains_key(schema) {
            return Err(ModelError::UnknownSchema {
                schema_id: schema.to_string(),
            });
        }
        if self.domains.contains_key(name) {
            return Err(ModelError::DuplicateDomain {
                name: name.to_string(),
            });
        }
        self.domains
            .insert(name.to_string(), DomainModel::new(name, schema));
        Ok(())
    }

    pub fn domain(&self, name: &str) -> Option<&DomainModel> {
        self.domains.get(name)
    }

    // ----- element access -----

    /// Get a live element by id; unknown domain, unknown id, and disposed
    /// elements all return None
    pub fn element(&self, id: &ElementId) -> Option<&ModelElement> {
        self.domains.get(id.domain()).and_then(|d| d.get(id))
    }

    /// Get a live element or fail
    ///
    /// # Errors
    ///
    /// `UnknownDomain`, `ElementNotFound`, or `DisposedElement`.
    pub fn require_element(&self, id: &ElementId) -> Result<&ModelElement> {
        let domain = self
            .domains
            .get(id.domain())
            .ok_or_else(|| ModelError::UnknownDomain {
                name: id.domain().to_string(),
            })?;
        domain.require(id)
    }

    /// Lazy, restartable sequence of live relationships in one domain
    ///
    /// Any of schema, start, and end may be supplied as filters; an unknown
    /// domain yields the empty sequence.
    pub fn get_relationships<'a>(
        &'a self,
        domain: &str,
        schema: Option<&'a SchemaElementId>,
        start: Option<&'a ElementId>,
        end: Option<&'a ElementId>,
    ) -> Box<dyn Iterator<Item = &'a ModelElement> + 'a> {
        match self.domains.get(domain) {
            Some(d) => d.relationships(schema, start, end),
            None => Box::new(std::iter::empty()),
        }
    }

    // ----- sessions -----

    /// Open a new top-level session
    pub fn begin_session(&mut self, config: SessionConfig) -> Session {
        let id = SessionId::new(self.next_session);
        self.next_session += 1;
        Session::new(id, config)
    }

    /// Run one unit of work in a fresh session
    ///
    /// Commits (accept + close) when the closure returns Ok; closes without
    /// accepting — rolling everything back — when it returns Err.
    ///
    /// # Errors
    ///
    /// The closure's error on failure, or any error from the final close
    /// (constraint failure raises `SessionFailed` unless the mode is Silent).
    pub fn with_session<T>(
        &mut self,
        config: SessionConfig,
        f: impl FnOnce(&mut Store, &mut Session) -> Result<T>,
    ) -> Result<(T, Option<SessionResult>)> {
        let mut session = self.begin_session(config);
        match f(self, &mut session) {
            Ok(value) => {
                session.accept_changes();
                let result = session.close(self)?;
                Ok((value, result))
            }
            Err(err) => {
                // Uncommitted close: the session rolls its own log back
                let _ = session.close(self);
                Err(err)
            }
        }
    }

    // ----- dispatch and observers -----

    /// The handler table; adapters register custom and override handlers here
    pub fn dispatcher_mut(&mut self) -> &mut EventDispatcher {
        &mut self.dispatcher
    }

    /// Subscribe to every completed session, aborted ones included
    pub fn subscribe(&mut self, observer: ObserverHandle) {
        self.observers.push(observer);
    }

    /// Subscribe to clean commits touching one domain
    pub fn subscribe_domain(&mut self, domain: &str, observer: ObserverHandle) {
        self.domain_observers
            .entry(domain.to_string())
            .or_default()
            .push(observer);
    }

    pub(crate) fn notify_completed(&self, result: &SessionResult) {
        let clean = !result.aborted && !result.has_errors() && !result.has_warnings();
        if clean {
            let mut seen: Vec<&str> = Vec::new();
            for event in &result.events {
                if seen.contains(&event.domain.as_str()) {
                    continue;
                }
                seen.push(&event.domain);
                if let Some(observers) = self.domain_observers.get(&event.domain) {
                    for observer in observers {
                        if let Ok(mut obs) = observer.try_borrow_mut() {
                            obs.session_completed(result);
                        }
                    }
                }
            }
        }
        for observer in &self.observers {
            match observer.try_borrow_mut() {
                Ok(mut obs) => obs.session_completed(result),
                // An observer driving the current mutation (e.g. the undo
                // manager mid-replay) is skipped rather than deadlocked on
                Err(_) => tracing::warn!(event = "session_notify_skipped"),
            }
        }
    }

    /// Route one event through the handler table to its target domain
    ///
    /// A missing domain is a silent no-op (replica stores may not host every
    /// domain). An event no handler claims, produced by a foreign session,
    /// is appended to the open session's log so replication forwards it.
    ///
    /// # Errors
    ///
    /// Propagates the first handler failure.
    pub fn dispatch(&mut self, session: Option<&mut Session>, event: &Event) -> Result<bool> {
        let dispatcher = &self.dispatcher;
        let Some(domain) = self.domains.get_mut(&event.domain) else {
            tracing::trace!(
                event = EVENT_DISPATCH,
                domain = %event.domain,
                "no such domain, ignoring"
            );
            return Ok(false);
        };
        let matched = dispatcher.dispatch_to(domain, event)?;
        if !matched {
            if let Some(session) = session {
                if session.is_open() && event.correlation != session.id() {
                    session.log_foreign(event.clone());
                }
            }
        }
        Ok(matched)
    }

    // ----- mutation surface -----

    /// Create an entity (or value object) instance
    ///
    /// With `id` None a fresh time-ordered UUID key is minted in the domain.
    ///
    /// # Errors
    ///
    /// `UnknownDomain`/`UnknownSchema` for unresolved names, `InvalidType`
    /// when the schema element is a relationship or primitive or the id
    /// names another domain, `ElementExists` on id collision.
    pub fn create_entity(
        &mut self,
        session: &mut Session,
        domain: &str,
        schema_id: &SchemaElementId,
        id: Option<ElementId>,
    ) -> Result<ElementId> {
        session.ensure_open()?;
        if !self.domains.contains_key(domain) {
            return Err(ModelError::UnknownDomain {
                name: domain.to_string(),
            });
        }
        let element = self.schema_element(schema_id)?;
        if matches!(element.kind, SchemaKind::Relationship | SchemaKind::Primitive) {
            return Err(ModelError::invalid_type(format!(
                "'{schema_id}' is not an entity schema"
            )));
        }
        let id = match id {
            Some(id) => {
                if id.domain() != domain {
                    return Err(ModelError::invalid_type(format!(
                        "id '{id}' does not belong to domain '{domain}'"
                    )));
                }
                id
            }
            None => ElementId::new(domain, &Uuid::now_v7().to_string())?,
        };
        if self.element(&id).is_some() {
            return Err(ModelError::ElementExists { element_id: id });
        }
        let event = Event::new(
            domain,
            session.id(),
            1,
            true,
            EventPayload::AddEntity {
                id: id.clone(),
                schema_id: schema_id.clone(),
            },
        );
        self.dispatch(Some(session), &event)?;
        session.record(event);
        Ok(id)
    }

    /// Create a relationship instance between two elements
    ///
    /// The start must be a live local element conforming to the definition's
    /// start schema. The end may live in an unloaded replica domain; in that
    /// case `end_schema` supplies its schema and no conformance check runs.
    ///
    /// # Errors
    ///
    /// `InvalidType` on schema, conformance, or cardinality violations;
    /// `ElementNotFound` when the end is unresolvable and no `end_schema`
    /// was given; `ElementExists` on id collision.
    #[allow(clippy::too_many_arguments)]
    pub fn create_relationship(
        &mut self,
        session: &mut Session,
        domain: &str,
        schema_id: &SchemaElementId,
        start: &ElementId,
        end: &ElementId,
        end_schema: Option<&SchemaElementId>,
        id: Option<ElementId>,
    ) -> Result<ElementId> {
        session.ensure_open()?;
        if !self.domains.contains_key(domain) {
            return Err(ModelError::UnknownDomain {
                name: domain.to_string(),
            });
        }
        let def = self
            .schema_element(schema_id)?
            .relationship
            .clone()
            .ok_or_else(|| {
                ModelError::invalid_type(format!("'{schema_id}' is not a relationship schema"))
            })?;

        let start_element = self.require_element(start)?;
        let start_schema = start_element.schema_id.clone();
        if !self.schema_is_a(&start_schema, &def.start) {
            return Err(ModelError::invalid_type(format!(
                "start '{start}' is a '{start_schema}', expected '{}'",
                def.start
            )));
        }
        let end_schema = match self.element(end) {
            Some(el) => {
                let schema = el.schema_id.clone();
                if !self.schema_is_a(&schema, &def.end) {
                    return Err(ModelError::invalid_type(format!(
                        "end '{end}' is a '{schema}', expected '{}'",
                        def.end
                    )));
                }
                schema
            }
            None => end_schema.cloned().ok_or_else(|| ModelError::ElementNotFound {
                element_id: end.clone(),
            })?,
        };

        if def.cardinality.unique_end_per_start()
            && self
                .get_relationships(domain, Some(schema_id), Some(start), None)
                .next()
                .is_some()
        {
            return Err(ModelError::invalid_type(format!(
                "'{start}' already holds a '{schema_id}' relationship"
            )));
        }
        if def.cardinality.unique_start_per_end()
            && self
                .get_relationships(domain, Some(schema_id), None, Some(end))
                .next()
                .is_some()
        {
            return Err(ModelError::invalid_type(format!(
                "'{end}' already receives a '{schema_id}' relationship"
            )));
        }

        let id = match id {
            Some(id) => {
                if id.domain() != domain {
                    return Err(ModelError::invalid_type(format!(
                        "id '{id}' does not belong to domain '{domain}'"
                    )));
                }
                id
            }
            None => ElementId::new(domain, &Uuid::now_v7().to_string())?,
        };
        if self.element(&id).is_some() {
            return Err(ModelError::ElementExists { element_id: id });
        }
        let event = Event::new(
            domain,
            session.id(),
            1,
            true,
            EventPayload::AddRelationship {
                id: id.clone(),
                schema_id: schema_id.clone(),
                endpoints: RelationshipEndpoints {
                    start: start.clone(),
                    start_schema,
                    end: end.clone(),
                    end_schema,
                },
            },
        );
        self.dispatch(Some(session), &event)?;
        session.record(event);
        Ok(id)
    }

    /// Remove an element and everything its removal implies
    ///
    /// Removing an entity first removes every incident relationship; removing
    /// an embedded relationship cascades to its end endpoint. Property values
    /// are removed with explicit (non-top-level) events before each element's
    /// removal event, so reverse replay restores them.
    ///
    /// # Errors
    ///
    /// `UnknownDomain`/`ElementNotFound`/`DisposedElement` for the target;
    /// handler failures from dispatch.
    pub fn remove_element(&mut self, session: &mut Session, id: &ElementId) -> Result<()> {
        session.ensure_open()?;
        self.require_element(id)?;
        let mut visited = HashSet::new();
        let mut events = Vec::new();
        self.collect_removal_events(session.id(), id, &mut visited, &mut events)?;
        for event in events {
            self.dispatch(Some(session), &event)?;
            session.record(event);
        }
        Ok(())
    }

    fn collect_removal_events(
        &self,
        correlation: SessionId,
        id: &ElementId,
        visited: &mut HashSet<ElementId>,
        out: &mut Vec<Event>,
    ) -> Result<()> {
        if !visited.insert(id.clone()) {
            return Ok(());
        }
        let Some(domain) = self.domains.get(id.domain()) else {
            return Ok(());
        };
        let Some(element) = domain.get(id) else {
            // Already gone, nothing to emit
            return Ok(());
        };
        let element = element.clone();
        let domain_name = id.domain();

        if !element.is_relationship() {
            for rel_id in self.incident_relationships_all(id) {
                self.collect_removal_events(correlation, &rel_id, visited, out)?;
            }
        }

        if let Some(props) = domain.properties(id) {
            let mut names: Vec<&String> = props.keys().collect();
            names.sort();
            for name in names {
                if let Some(pv) = props.get(name) {
                    out.push(Event::new(
                        domain_name,
                        correlation,
                        element.version,
                        false,
                        EventPayload::RemoveProperty {
                            id: id.clone(),
                            schema_id: element.schema_id.clone(),
                            property: name.clone(),
                            value: pv.value.clone(),
                            property_version: pv.version,
                        },
                    ));
                }
            }
        }

        match &element.endpoints {
            Some(endpoints) => {
                out.push(Event::new(
                    domain_name,
                    correlation,
                    element.version,
                    true,
                    EventPayload::RemoveRelationship {
                        id: id.clone(),
                        schema_id: element.schema_id.clone(),
                        endpoints: endpoints.clone(),
                    },
                ));
                let embedded = self
                    .schemas
                    .get(element.schema_id.schema())
                    .and_then(|s| s.element(&element.schema_id))
                    .and_then(|el| el.relationship.as_ref())
                    .is_some_and(|def| def.embedded);
                if embedded {
                    // The end endpoint's lifetime is tied to the relationship
                    self.collect_removal_events(correlation, &endpoints.end, visited, out)?;
                }
            }
            None => out.push(Event::new(
                domain_name,
                correlation,
                element.version,
                true,
                EventPayload::RemoveEntity {
                    id: id.clone(),
                    schema_id: element.schema_id.clone(),
                },
            )),
        }
        Ok(())
    }

    /// Relationship ids incident to an element across every hosted domain,
    /// in deterministic domain order
    fn incident_relationships_all(&self, id: &ElementId) -> Vec<ElementId> {
        let mut names: Vec<&String> = self.domains.keys().collect();
        names.sort();
        let mut out = Vec::new();
        for name in names {
            if let Some(domain) = self.domains.get(name) {
                for rel_id in domain.incident_relationships(id) {
                    if !out.contains(&rel_id) {
                        out.push(rel_id);
                    }
                }
            }
        }
        out
    }

    /// Set a property value, returning the new property version
    ///
    /// Setting the currently stored value is a no-op that emits no event.
    ///
    /// # Errors
    ///
    /// `UnknownProperty` for an unresolvable name, `InvalidType` for a
    /// calculated property or a core-primitive type mismatch.
    pub fn set_property_value(
        &mut self,
        session: &mut Session,
        id: &ElementId,
        property: &str,
        value: JsonValue,
    ) -> Result<u64> {
        session.ensure_open()?;
        let element = self.require_element(id)?.clone();
        let (kind, value_schema) = {
            let prop = self.property_definition(&element.schema_id, property)?;
            (prop.kind, prop.value_schema.clone())
        };
        if kind == PropertyKind::Calculated {
            return Err(ModelError::invalid_type(format!(
                "property '{property}' is calculated and cannot be set"
            )));
        }
        check_core_value(&value_schema, &value)?;

        let current = self
            .domains
            .get(id.domain())
            .and_then(|d| d.property_value(id, property))
            .cloned();
        let (old_value, property_version) = match current {
            Some(pv) => {
                if pv.value == value {
                    return Ok(pv.version);
                }
                (Some(pv.value), pv.version + 1)
            }
            None => (None, 1),
        };
        let event = Event::new(
            id.domain(),
            session.id(),
            element.version + 1,
            true,
            EventPayload::ChangePropertyValue {
                id: id.clone(),
                schema_id: element.schema_id.clone(),
                property: property.to_string(),
                value,
                old_value,
                property_version,
            },
        );
        self.dispatch(Some(session), &event)?;
        session.record(event);
        Ok(property_version)
    }

    /// Read a property value, falling back to the schema default
    ///
    /// Defaults come back with version 0 and no old value. A property that
    /// is neither stored nor defaulted reads as None.
    ///
    /// # Errors
    ///
    /// Element resolution errors, plus `UnknownProperty` for a name that
    /// resolves nowhere on the inheritance chain.
    pub fn get_property_value(
        &self,
        id: &ElementId,
        property: &str,
    ) -> Result<Option<PropertyValue>> {
        let element = self.require_element(id)?;
        if let Some(pv) = self
            .domains
            .get(id.domain())
            .and_then(|d| d.property_value(id, property))
        {
            return Ok(Some(pv.clone()));
        }
        let prop = self.property_definition(&element.schema_id, property)?;
        Ok(prop.default_value.clone().map(|value| PropertyValue {
            value,
            old_value: None,
            version: 0,
        }))
    }

    /// Raise an adapter-defined event through the dispatcher
    ///
    /// The reverse payload is what a rollback or undo will dispatch in its
    /// place. Returns whether any handler claimed the event.
    ///
    /// # Errors
    ///
    /// Handler failures from dispatch.
    pub fn raise_custom_event(
        &mut self,
        session: &mut Session,
        domain: &str,
        kind: &str,
        payload: JsonValue,
        reverse_payload: JsonValue,
    ) -> Result<bool> {
        session.ensure_open()?;
        let event = Event::new(
            domain,
            session.id(),
            0,
            true,
            EventPayload::Custom {
                kind: kind.to_string(),
                payload,
                reverse_payload,
            },
        );
        let matched = self.dispatch(Some(session), &event)?;
        session.record(event);
        Ok(matched)
    }

    /// Run all constraints (Validate kind includes Check) for one element
    ///
    /// # Errors
    ///
    /// Element resolution errors; evaluator faults come back as Error
    /// diagnostics, never as Err.
    pub fn validate_element(&self, id: &ElementId) -> Result<Vec<DiagnosticMessage>> {
        let element = self.require_element(id)?;
        Ok(constraints::evaluate(self, element, ConstraintKind::Validate))
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("id", &self.id)
            .field("schemas", &self.schemas.len())
            .field("domains", &self.domains.len())
            .field("observers", &self.observers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Cardinality, SchemaRelationshipDef};

    fn library_schema() -> Schema {
        let mut schema = Schema::new("library").unwrap();
        let string = SchemaElementId::new("core", "string").unwrap();
        let number = SchemaElementId::new("core", "number").unwrap();
        let book = schema.define_entity("Book", None).unwrap();
        schema.add_property(&book, "title", &string, None).unwrap();
        schema
            .add_property(&book, "pages", &number, Some(JsonValue::from(0)))
            .unwrap();
        schema
            .add_calculated_property(&book, "summary", &string)
            .unwrap();
        let shelf = schema.define_entity("Shelf", None).unwrap();
        schema
            .define_relationship(
                "Holds",
                SchemaRelationshipDef::new(shelf, book, Cardinality::ManyToOne),
            )
            .unwrap();
        schema
    }

    fn store_with_domain() -> Store {
        let mut store = Store::new();
        store.register_schema(library_schema()).unwrap();
        store.create_domain("lib", "library").unwrap();
        store
    }

    fn sid(name: &str) -> SchemaElementId {
        SchemaElementId::new("library", name).unwrap()
    }

    #[test]
    fn test_core_schema_preregistered() {
        let store = Store::new();
        let core = store.schema(CORE_SCHEMA).unwrap();
        for primitive in ["string", "number", "boolean", "any"] {
            let id = SchemaElementId::new(CORE_SCHEMA, primitive).unwrap();
            assert!(core.element(&id).is_some());
        }
    }

    #[test]
    fn test_duplicate_schema_rejected() {
        let mut store = Store::new();
        store.register_schema(library_schema()).unwrap();
        assert!(matches!(
            store.register_schema(library_schema()),
            Err(ModelError::DuplicateSchema { .. })
        ));
    }

    #[test]
    fn test_create_domain_validations() {
        let mut store = Store::new();
        store.register_schema(library_schema()).unwrap();
        assert!(matches!(
            store.create_domain("lib", "ghost"),
            Err(ModelError::UnknownSchema { .. })
        ));
        assert!(store.create_domain("bad:name", "library").is_err());
        store.create_domain("lib", "library").unwrap();
        assert!(matches!(
            store.create_domain("lib", "library"),
            Err(ModelError::DuplicateDomain { .. })
        ));
    }

    #[test]
    fn test_create_entity_and_read_back() {
        let mut store = store_with_domain();
        let mut session = store.begin_session(SessionConfig::default());
        let id = store
            .create_entity(&mut session, "lib", &sid("Book"), None)
            .unwrap();

        let element = store.element(&id).unwrap();
        assert_eq!(element.schema_id, sid("Book"));
        assert_eq!(element.version, 1);
        assert_eq!(session.events().len(), 1);
        session.accept_changes();
        session.close(&mut store).unwrap();
    }

    #[test]
    fn test_create_entity_rejects_relationship_schema() {
        let mut store = store_with_domain();
        let mut session = store.begin_session(SessionConfig::default());
        let result = store.create_entity(&mut session, "lib", &sid("Holds"), None);
        assert!(matches!(result, Err(ModelError::InvalidType { .. })));
    }

    #[test]
    fn test_explicit_id_must_match_domain() {
        let mut store = store_with_domain();
        let mut session = store.begin_session(SessionConfig::default());
        let foreign = ElementId::new("elsewhere", "b1").unwrap();
        let result = store.create_entity(&mut session, "lib", &sid("Book"), Some(foreign));
        assert!(matches!(result, Err(ModelError::InvalidType { .. })));
    }

    #[test]
    fn test_set_property_type_checked_against_core() {
        let mut store = store_with_domain();
        let mut session = store.begin_session(SessionConfig::default());
        let id = store
            .create_entity(&mut session, "lib", &sid("Book"), None)
            .unwrap();

        let result =
            store.set_property_value(&mut session, &id, "title", JsonValue::from(42));
        assert!(matches!(result, Err(ModelError::InvalidType { .. })));
        // Null always passes: it means unset
        store
            .set_property_value(&mut session, &id, "title", JsonValue::Null)
            .unwrap();
        store
            .set_property_value(&mut session, &id, "title", JsonValue::from("Dune"))
            .unwrap();
    }

    #[test]
    fn test_set_property_rejects_calculated() {
        let mut store = store_with_domain();
        let mut session = store.begin_session(SessionConfig::default());
        let id = store
            .create_entity(&mut session, "lib", &sid("Book"), None)
            .unwrap();
        let result =
            store.set_property_value(&mut session, &id, "summary", JsonValue::from("s"));
        assert!(matches!(result, Err(ModelError::InvalidType { .. })));
    }

    #[test]
    fn test_equal_value_write_is_noop() {
        let mut store = store_with_domain();
        let mut session = store.begin_session(SessionConfig::default());
        let id = store
            .create_entity(&mut session, "lib", &sid("Book"), None)
            .unwrap();
        store
            .set_property_value(&mut session, &id, "title", JsonValue::from("Dune"))
            .unwrap();
        let logged = session.events().len();
        let version = store
            .set_property_value(&mut session, &id, "title", JsonValue::from("Dune"))
            .unwrap();
        assert_eq!(version, 1);
        assert_eq!(session.events().len(), logged);
    }

    #[test]
    fn test_default_value_read() {
        let mut store = store_with_domain();
        let mut session = store.begin_session(SessionConfig::default());
        let id = store
            .create_entity(&mut session, "lib", &sid("Book"), None)
            .unwrap();

        let pages = store.get_property_value(&id, "pages").unwrap().unwrap();
        assert_eq!(pages.value, JsonValue::from(0));
        assert_eq!(pages.version, 0);

        assert!(store.get_property_value(&id, "title").unwrap().is_none());
        assert!(matches!(
            store.get_property_value(&id, "ghost"),
            Err(ModelError::UnknownProperty { .. })
        ));
    }

    #[test]
    fn test_many_to_one_cardinality_enforced() {
        let mut store = store_with_domain();
        let mut session = store.begin_session(SessionConfig::default());
        let shelf = store
            .create_entity(&mut session, "lib", &sid("Shelf"), None)
            .unwrap();
        let b1 = store
            .create_entity(&mut session, "lib", &sid("Book"), None)
            .unwrap();
        let b2 = store
            .create_entity(&mut session, "lib", &sid("Book"), None)
            .unwrap();

        // ManyToOne: a shelf holds at most one book through this schema
        store
            .create_relationship(&mut session, "lib", &sid("Holds"), &shelf, &b1, None, None)
            .unwrap();
        let result =
            store.create_relationship(&mut session, "lib", &sid("Holds"), &shelf, &b2, None, None);
        assert!(matches!(result, Err(ModelError::InvalidType { .. })));
    }

    #[test]
    fn test_relationship_endpoint_conformance() {
        let mut store = store_with_domain();
        let mut session = store.begin_session(SessionConfig::default());
        let b1 = store
            .create_entity(&mut session, "lib", &sid("Book"), None)
            .unwrap();
        let b2 = store
            .create_entity(&mut session, "lib", &sid("Book"), None)
            .unwrap();

        // Start must be a Shelf
        let result =
            store.create_relationship(&mut session, "lib", &sid("Holds"), &b1, &b2, None, None);
        assert!(matches!(result, Err(ModelError::InvalidType { .. })));
    }

    #[test]
    fn test_remove_entity_cascades_incident_relationships() {
        let mut store = store_with_domain();
        let mut session = store.begin_session(SessionConfig::default());
        let shelf = store
            .create_entity(&mut session, "lib", &sid("Shelf"), None)
            .unwrap();
        let book = store
            .create_entity(&mut session, "lib", &sid("Book"), None)
            .unwrap();
        let rel = store
            .create_relationship(&mut session, "lib", &sid("Holds"), &shelf, &book, None, None)
            .unwrap();

        store.remove_element(&mut session, &shelf).unwrap();
        assert!(store.element(&shelf).is_none());
        assert!(store.element(&rel).is_none());
        // The non-embedded end endpoint survives
        assert!(store.element(&book).is_some());
    }

    #[test]
    fn test_removal_emits_property_events_before_element_event() {
        let mut store = store_with_domain();
        let mut session = store.begin_session(SessionConfig::default());
        let book = store
            .create_entity(&mut session, "lib", &sid("Book"), None)
            .unwrap();
        store
            .set_property_value(&mut session, &book, "title", JsonValue::from("Dune"))
            .unwrap();
        let before = session.events().len();

        store.remove_element(&mut session, &book).unwrap();
        let emitted = &session.events()[before..];
        assert_eq!(emitted.len(), 2);
        assert!(matches!(
            emitted[0].payload,
            EventPayload::RemoveProperty { .. }
        ));
        assert!(!emitted[0].top_level);
        assert!(matches!(
            emitted[1].payload,
            EventPayload::RemoveEntity { .. }
        ));
        assert!(emitted[1].top_level);
    }

    #[test]
    fn test_unknown_domain_dispatch_is_silent_noop() {
        let mut store = store_with_domain();
        let event = Event::new(
            "nowhere",
            SessionId::new(99),
            1,
            true,
            EventPayload::AddEntity {
                id: ElementId::new("nowhere", "e1").unwrap(),
                schema_id: sid("Book"),
            },
        );
        assert!(!store.dispatch(None, &event).unwrap());
    }

    #[test]
    fn test_unhandled_foreign_event_logged_for_forwarding() {
        let mut store = store_with_domain();
        let mut session = store.begin_session(SessionConfig::default());
        let foreign = Event::new(
            "lib",
            SessionId::new(999),
            1,
            true,
            EventPayload::Custom {
                kind: "adapter".to_string(),
                payload: JsonValue::Null,
                reverse_payload: JsonValue::Null,
            },
        );
        let matched = store.dispatch(Some(&mut session), &foreign).unwrap();
        assert!(!matched);
        assert_eq!(session.events().len(), 1);

        // Own-session unhandled events are not re-logged by dispatch
        let own = Event::new(
            "lib",
            session.id(),
            1,
            true,
            EventPayload::Custom {
                kind: "adapter".to_string(),
                payload: JsonValue::Null,
                reverse_payload: JsonValue::Null,
            },
        );
        store.dispatch(Some(&mut session), &own).unwrap();
        assert_eq!(session.events().len(), 1);
    }

    #[test]
    fn test_with_session_commits_on_ok() {
        let mut store = store_with_domain();
        let (id, result) = store
            .with_session(SessionConfig::default(), |store, session| {
                store.create_entity(session, "lib", &sid("Book"), None)
            })
            .unwrap();
        assert!(store.element(&id).is_some());
        let result = result.unwrap();
        assert!(!result.aborted);
        assert_eq!(result.events.len(), 1);
    }

    #[test]
    fn test_with_session_rolls_back_on_err() {
        let mut store = store_with_domain();
        let mut created = None;
        let result = store.with_session(SessionConfig::default(), |store, session| {
            let id = store.create_entity(session, "lib", &sid("Book"), None)?;
            created = Some(id);
            Err::<(), _>(ModelError::invalid_type("abandon"))
        });
        assert!(result.is_err());
        assert!(store.element(&created.unwrap()).is_none());
    }
}

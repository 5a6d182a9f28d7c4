//! Event dispatch: the single application point for all mutations
//!
//! Every state change — direct mutation, rollback replay, undo/redo replay,
//! replication receive — flows through one dispatcher. Handlers are resolved
//! from an explicit table keyed by event kind, preceded by an ordered list
//! of domain-scoped overrides and followed by wildcard handlers, so
//! resolution is deterministic.
//!
//! The six built-in kinds map onto the `DomainModel` apply-handlers; the
//! `Custom` kind has no built-in handler and exists for adapter extensions.

use std::collections::HashMap;
use std::fmt;

use crate::domain::DomainModel;
use crate::errors::Result;
use crate::events::{Event, EventKind, EventPayload};

/// A handler applying one event to a domain's storage
pub type EventHandler = Box<dyn Fn(&mut DomainModel, &Event) -> Result<()>>;

/// Handler table keyed by event kind, with ordered domain-scoped overrides
/// and wildcard handlers
pub struct EventDispatcher {
    by_kind: HashMap<EventKind, Vec<EventHandler>>,
    /// Checked first, in registration order, when the domain name matches
    domain_overrides: Vec<(String, EventKind, EventHandler)>,
    /// Run for every event, after kind handlers
    wildcard: Vec<EventHandler>,
}

impl EventDispatcher {
    /// Build a dispatcher with the six built-in handlers registered
    pub fn new() -> Self {
        let mut dispatcher = Self {
            by_kind: HashMap::new(),
            domain_overrides: Vec::new(),
            wildcard: Vec::new(),
        };
        dispatcher.register(
            EventKind::AddEntity,
            Box::new(|domain, event| {
                if let EventPayload::AddEntity { id, schema_id } = &event.payload {
                    domain.apply_add_entity(id, schema_id, event.version)?;
                }
                Ok(())
            }),
        );
        dispatcher.register(
            EventKind::RemoveEntity,
            Box::new(|domain, event| {
                if let EventPayload::RemoveEntity { id, .. } = &event.payload {
                    domain.apply_remove_element(id)?;
                }
                Ok(())
            }),
        );
        dispatcher.register(
            EventKind::AddRelationship,
            Box::new(|domain, event| {
                if let EventPayload::AddRelationship {
                    id,
                    schema_id,
                    endpoints,
                } = &event.payload
                {
                    domain.apply_add_relationship(id, schema_id, endpoints, event.version)?;
                }
                Ok(())
            }),
        );
        dispatcher.register(
            EventKind::RemoveRelationship,
            Box::new(|domain, event| {
                if let EventPayload::RemoveRelationship { id, .. } = &event.payload {
                    domain.apply_remove_element(id)?;
                }
                Ok(())
            }),
        );
        dispatcher.register(
            EventKind::ChangePropertyValue,
            Box::new(|domain, event| {
                if let EventPayload::ChangePropertyValue {
                    id,
                    property,
                    value,
                    old_value,
                    property_version,
                    ..
                } = &event.payload
                {
                    domain.apply_change_property(
                        id,
                        property,
                        value,
                        old_value.as_ref(),
                        *property_version,
                    )?;
                }
                Ok(())
            }),
        );
        dispatcher.register(
            EventKind::RemoveProperty,
            Box::new(|domain, event| {
                if let EventPayload::RemoveProperty { id, property, .. } = &event.payload {
                    domain.apply_remove_property(id, property)?;
                }
                Ok(())
            }),
        );
        dispatcher
    }

    /// Register an additional handler for one event kind
    pub fn register(&mut self, kind: EventKind, handler: EventHandler) {
        self.by_kind.entry(kind).or_default().push(handler);
    }

    /// Register a handler that only runs for events targeting one domain
    ///
    /// Overrides run before the kind handlers, in registration order.
    pub fn register_for_domain(&mut self, domain: &str, kind: EventKind, handler: EventHandler) {
        self.domain_overrides
            .push((domain.to_string(), kind, handler));
    }

    /// Register a handler that runs for every event
    pub fn register_wildcard(&mut self, handler: EventHandler) {
        self.wildcard.push(handler);
    }

    /// Run all matching handlers against the resolved domain
    ///
    /// Returns whether any handler matched. Wildcard handlers run but do not
    /// count as a match for the re-logging rule: an event nothing claims is
    /// still unhandled.
    ///
    /// # Errors
    ///
    /// Propagates the first handler failure; the session close path catches
    /// per-event faults during replay.
    pub(crate) fn dispatch_to(&self, domain: &mut DomainModel, event: &Event) -> Result<bool> {
        let kind = event.kind();
        let mut matched = false;
        for (name, override_kind, handler) in &self.domain_overrides {
            if name == domain.name() && *override_kind == kind {
                handler(domain, event)?;
                matched = true;
            }
        }
        if let Some(handlers) = self.by_kind.get(&kind) {
            for handler in handlers {
                handler(domain, event)?;
                matched = true;
            }
        }
        for handler in &self.wildcard {
            handler(domain, event)?;
        }
        Ok(matched)
    }
}

impl Default for EventDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventDispatcher")
            .field("kinds", &self.by_kind.len())
            .field("domain_overrides", &self.domain_overrides.len())
            .field("wildcard", &self.wildcard.len())
            .finish()
    }
}

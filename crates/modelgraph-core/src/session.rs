//! Session: the transaction engine
//!
//! A session scopes one unit of work. Nested `begin` calls increment a
//! shared depth counter instead of creating new sessions, so nested logical
//! operations compose into one atomic unit. Each level must call
//! `accept_changes` before its `close`; any level that closes uncommitted
//! aborts the whole session, and the final close then rolls every logged
//! event back by replaying its reverse through the dispatcher.
//!
//! ## Atomicity contract
//!
//! When the final `close` returns, the store is either in the fully
//! committed post-session state or byte-for-byte back in the pre-session
//! state. Faults during rollback replay are caught per event and downgraded
//! to Error diagnostics so one failing step cannot leave a partially
//! rolled-back store.

use std::collections::HashMap;
use std::ops::BitOr;

use chrono::{DateTime, Utc};
use modelgraph_core_types::schema::{EVENT_ROLLBACK, EVENT_SESSION_BEGIN, EVENT_SESSION_CLOSE};
use modelgraph_core_types::{ElementId, SchemaElementId, SessionId, StoreId};
use serde::{Deserialize, Serialize};

use crate::constraints::{self, ConstraintKind, DiagnosticMessage};
use crate::errors::{ModelError, Result};
use crate::events::{Event, EventPayload};
use crate::model::{PropertyValue, RelationshipEndpoints};
use crate::store::Store;

/// Session mode bitset
///
/// `NORMAL` is the empty set. Loading/Undo/Redo gate constraint evaluation
/// and undo capture; Silent suppresses the `SessionFailed` error; Rollback
/// is set by the engine while reverse replay runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionMode(u16);

impl SessionMode {
    pub const NORMAL: SessionMode = SessionMode(0);
    pub const LOADING: SessionMode = SessionMode(1);
    pub const UNDO: SessionMode = SessionMode(1 << 1);
    pub const REDO: SessionMode = SessionMode(1 << 2);
    pub const SERIALIZING: SessionMode = SessionMode(1 << 3);
    pub const SILENT: SessionMode = SessionMode(1 << 4);
    pub const ROLLBACK: SessionMode = SessionMode(1 << 5);

    /// Whether any of the given flags is set
    pub fn contains(self, flags: SessionMode) -> bool {
        self.0 & flags.0 != 0
    }

    pub fn is_normal(self) -> bool {
        self.0 == 0
    }
}

impl Default for SessionMode {
    fn default() -> Self {
        Self::NORMAL
    }
}

impl BitOr for SessionMode {
    type Output = SessionMode;

    fn bitor(self, rhs: SessionMode) -> SessionMode {
        SessionMode(self.0 | rhs.0)
    }
}

/// Configuration for a new session
#[derive(Debug, Clone, Default)]
pub struct SessionConfig {
    pub mode: SessionMode,
    /// Origin store id for sessions replaying received replication events
    pub origin_store: Option<StoreId>,
}

impl SessionConfig {
    pub fn with_mode(mode: SessionMode) -> Self {
        Self {
            mode,
            origin_store: None,
        }
    }
}

/// Net state of a touched element within one session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrackingState {
    Added,
    Removed,
    Updated,
    Unknown,
}

/// Per-session record of one touched element
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackedElement {
    pub id: ElementId,
    pub schema_id: SchemaElementId,
    pub state: TrackingState,
    pub version: u64,
    /// Properties changed within the session, with their value and version
    pub properties: HashMap<String, PropertyValue>,
    /// Present when the tracked element is a relationship
    pub endpoints: Option<RelationshipEndpoints>,
}

/// Map of touched elements, one record per id per session
///
/// Merge policy: an element Added and then Removed within the same session
/// nets to Removed and its intermediate property updates are dropped.
#[derive(Debug, Clone, Default)]
pub struct TrackingData {
    records: HashMap<ElementId, TrackedElement>,
    /// First-touch order, for deterministic iteration
    order: Vec<ElementId>,
}

impl TrackingData {
    fn record_mut(
        &mut self,
        id: &ElementId,
        schema_id: &SchemaElementId,
        state: TrackingState,
        version: u64,
    ) -> &mut TrackedElement {
        if !self.records.contains_key(id) {
            self.order.push(id.clone());
        }
        self.records
            .entry(id.clone())
            .or_insert_with(|| TrackedElement {
                id: id.clone(),
                schema_id: schema_id.clone(),
                state,
                version,
                properties: HashMap::new(),
                endpoints: None,
            })
    }

    /// Fold one event into the tracking map
    pub(crate) fn track_event(&mut self, event: &Event) {
        match &event.payload {
            EventPayload::AddEntity { id, schema_id } => {
                let record = self.record_mut(id, schema_id, TrackingState::Added, event.version);
                record.state = TrackingState::Added;
                record.version = event.version;
            }
            EventPayload::AddRelationship {
                id,
                schema_id,
                endpoints,
            } => {
                let record = self.record_mut(id, schema_id, TrackingState::Added, event.version);
                record.state = TrackingState::Added;
                record.version = event.version;
                record.endpoints = Some(endpoints.clone());
            }
            EventPayload::RemoveEntity { id, schema_id }
            | EventPayload::RemoveRelationship { id, schema_id, .. } => {
                let record = self.record_mut(id, schema_id, TrackingState::Removed, event.version);
                // Added-then-Removed nets to Removed; property updates drop
                record.state = TrackingState::Removed;
                record.properties.clear();
            }
            EventPayload::ChangePropertyValue {
                id,
                schema_id,
                property,
                value,
                old_value,
                property_version,
            } => {
                let record =
                    self.record_mut(id, schema_id, TrackingState::Updated, event.version);
                if record.state == TrackingState::Removed {
                    return;
                }
                record.version = event.version;
                record.properties.insert(
                    property.clone(),
                    PropertyValue {
                        value: value.clone(),
                        old_value: old_value.clone(),
                        version: *property_version,
                    },
                );
            }
            EventPayload::RemoveProperty { id, property, .. } => {
                if let Some(record) = self.records.get_mut(id) {
                    record.properties.remove(property);
                }
            }
            EventPayload::Custom { .. } => {}
        }
    }

    pub fn get(&self, id: &ElementId) -> Option<&TrackedElement> {
        self.records.get(id)
    }

    /// Touched elements in first-touch order
    pub fn touched(&self) -> impl Iterator<Item = &TrackedElement> {
        self.order.iter().filter_map(|id| self.records.get(id))
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Outcome of a completed session
#[derive(Debug, Clone)]
pub struct SessionResult {
    pub session_id: SessionId,
    pub mode: SessionMode,
    pub aborted: bool,
    pub messages: Vec<DiagnosticMessage>,
    /// The session's event log in program order; rolled-back sessions keep
    /// it for diagnostics, observers must check `aborted`
    pub events: Vec<Event>,
    /// Touched elements in first-touch order
    pub touched: Vec<TrackedElement>,
    pub completed_at: DateTime<Utc>,
}

impl SessionResult {
    pub fn has_errors(&self) -> bool {
        self.messages.iter().any(DiagnosticMessage::is_error)
    }

    pub fn has_warnings(&self) -> bool {
        self.messages.iter().any(|m| !m.is_error())
    }

    pub fn error_count(&self) -> usize {
        self.messages.iter().filter(|m| m.is_error()).count()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionState {
    Open,
    Closed,
}

/// One transactional, possibly-nested unit of work
///
/// Created by `Store::begin_session` and closed exactly once (the final
/// `close` at depth 1). Mutating store calls take the session explicitly;
/// `Store::with_session` offers the ambient-style scoping convenience.
#[derive(Debug)]
pub struct Session {
    id: SessionId,
    mode: SessionMode,
    origin_store: Option<StoreId>,
    state: SessionState,
    depth: u32,
    /// Per-level committed flags, index depth-1
    committed: Vec<bool>,
    /// Some level closed without accept_changes
    uncommitted_close: bool,
    events: Vec<Event>,
    tracking: TrackingData,
}

impl Session {
    pub(crate) fn new(id: SessionId, config: SessionConfig) -> Self {
        tracing::debug!(event = EVENT_SESSION_BEGIN, session_id = %id);
        Self {
            id,
            mode: config.mode,
            origin_store: config.origin_store,
            state: SessionState::Open,
            depth: 1,
            committed: vec![false],
            uncommitted_close: false,
            events: Vec::new(),
            tracking: TrackingData::default(),
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn mode(&self) -> SessionMode {
        self.mode
    }

    /// Origin store id carried by replication-receive sessions
    pub fn origin_store(&self) -> Option<&StoreId> {
        self.origin_store.as_ref()
    }

    pub fn depth(&self) -> u32 {
        self.depth
    }

    pub fn is_open(&self) -> bool {
        self.state == SessionState::Open
    }

    /// Logged events in program order
    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn tracking(&self) -> &TrackingData {
        &self.tracking
    }

    pub(crate) fn ensure_open(&self) -> Result<()> {
        if self.is_open() {
            Ok(())
        } else {
            Err(ModelError::SessionClosed {
                session_id: self.id,
            })
        }
    }

    /// Open a nested level sharing this session's log and tracking
    pub fn begin(&mut self) -> Result<()> {
        self.ensure_open()?;
        self.depth += 1;
        self.committed.push(false);
        Ok(())
    }

    /// Mark the current nesting level committed; depth is unchanged
    pub fn accept_changes(&mut self) {
        if let Some(level) = self.committed.last_mut() {
            *level = true;
        }
    }

    /// Log one event and fold it into tracking
    ///
    /// The store's mutation API records automatically after a successful
    /// dispatch. Replication receivers call this themselves after feeding a
    /// received event through `Store::dispatch`, so an aborted receive
    /// session can roll the applied events back.
    pub fn record(&mut self, event: Event) {
        self.tracking.track_event(&event);
        self.events.push(event);
    }

    /// Append a foreign (unhandled, externally produced) event to the log
    /// without tracking
    pub(crate) fn log_foreign(&mut self, event: Event) {
        self.events.push(event);
    }

    /// Close the current nesting level
    ///
    /// Returns `Ok(None)` while outer levels remain open. At the final
    /// level: resolves touched elements, runs Check constraints (unless the
    /// mode is Loading/Undo/Redo), rolls back on abort, fires completion
    /// notifications, and returns the full result.
    ///
    /// # Errors
    ///
    /// `SessionClosed` on a second final close; `SessionFailed` when Error
    /// diagnostics exist and the session is not Silent (raised only after
    /// rollback has restored consistency).
    pub fn close(&mut self, store: &mut Store) -> Result<Option<SessionResult>> {
        self.ensure_open()?;
        let level_committed = self.committed.pop().unwrap_or(false);
        if !level_committed {
            self.uncommitted_close = true;
        }
        self.depth -= 1;
        if self.depth > 0 {
            // The outer scope still owns the commit decision
            return Ok(None);
        }
        self.state = SessionState::Closed;

        let mut aborted = self.uncommitted_close;
        let mut messages = Vec::new();

        let skip_checks = self
            .mode
            .contains(SessionMode::LOADING | SessionMode::UNDO | SessionMode::REDO);
        if !aborted && !skip_checks {
            for tracked in self.tracking.touched() {
                if tracked.state == TrackingState::Removed {
                    continue;
                }
                if let Some(element) = store.element(&tracked.id) {
                    messages.extend(constraints::evaluate(store, element, ConstraintKind::Check));
                }
            }
            if messages.iter().any(DiagnosticMessage::is_error) {
                aborted = true;
            }
        }

        if aborted {
            self.mode = self.mode | SessionMode::ROLLBACK;
            tracing::debug!(
                event = EVENT_ROLLBACK,
                session_id = %self.id,
                event_count = self.events.len(),
            );
            // Strict reverse chronological order; no session is ambient, so
            // nothing is re-logged. Per-event faults become diagnostics
            // instead of propagating.
            for event in self.events.iter().rev() {
                let reverse = event.reverse(self.id);
                if let Err(err) = store.dispatch(None, &reverse) {
                    messages.push(DiagnosticMessage::error(
                        format!("rollback step failed: {err}"),
                        reverse.element_id().cloned(),
                    ));
                }
            }
        }

        let result = SessionResult {
            session_id: self.id,
            mode: self.mode,
            aborted,
            messages,
            events: std::mem::take(&mut self.events),
            touched: self.tracking.touched().cloned().collect(),
            completed_at: Utc::now(),
        };
        tracing::debug!(
            event = EVENT_SESSION_CLOSE,
            session_id = %self.id,
            aborted = result.aborted,
            event_count = result.events.len(),
        );

        store.notify_completed(&result);

        if result.has_errors() && !self.mode.contains(SessionMode::SILENT) {
            return Err(ModelError::SessionFailed {
                result: Box::new(result),
            });
        }
        Ok(Some(result))
    }
}

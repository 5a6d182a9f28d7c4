//! Undo manager: session-granular undo/redo over the event log
//!
//! The manager captures committed sessions as reversible batches. Undo pops
//! the newest batch and replays each event's reverse, in reverse order,
//! inside a fresh Undo-mode session; the reversed events it produced become
//! the redo batch. Undo/Redo/Loading sessions and aborted sessions are
//! never captured, so replay cannot feed back into the stacks.
//!
//! Capture is scoped: only events targeting registered domains are kept
//! (an empty registry means every domain), optionally narrowed further by a
//! custom event filter. A forward commit that captures anything clears the
//! redo stack.

use std::collections::HashSet;
use std::fmt;

use modelgraph_core_types::SessionId;

use crate::errors::Result;
use crate::events::Event;
use crate::session::{SessionConfig, SessionMode, SessionResult};
use crate::store::Store;
use crate::subscribers::SessionObserver;

/// One reversible unit on the undo or redo stack
#[derive(Debug, Clone)]
pub struct UndoBatch {
    /// Id of the session that produced these events
    pub session_id: SessionId,
    /// Captured events in program order
    pub events: Vec<Event>,
}

/// Stack-based undo/redo over captured session batches
pub struct UndoManager {
    domains: HashSet<String>,
    filter: Option<Box<dyn Fn(&Event) -> bool>>,
    undos: Vec<UndoBatch>,
    redos: Vec<UndoBatch>,
}

impl UndoManager {
    pub fn new() -> Self {
        Self {
            domains: HashSet::new(),
            filter: None,
            undos: Vec::new(),
            redos: Vec::new(),
        }
    }

    /// Scope capture to one domain; call repeatedly to widen the scope.
    /// With no registered domains every domain is captured.
    pub fn register_domain(&mut self, name: &str) {
        self.domains.insert(name.to_string());
    }

    /// Narrow capture further with a per-event predicate
    pub fn set_filter(&mut self, filter: Box<dyn Fn(&Event) -> bool>) {
        self.filter = Some(filter);
    }

    pub fn can_undo(&self) -> bool {
        !self.undos.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redos.is_empty()
    }

    /// Mark the current undo position; `undo_to` unwinds back to it
    pub fn save_point(&self) -> Option<SessionId> {
        self.undos.last().map(|b| b.session_id)
    }

    fn captures(&self, event: &Event) -> bool {
        if !self.domains.is_empty() && !self.domains.contains(&event.domain) {
            return false;
        }
        self.filter.as_ref().map_or(true, |f| f(event))
    }

    /// Capture a completed session as an undo batch
    ///
    /// Aborted sessions have already undone themselves; Undo/Redo/Loading
    /// sessions are replay, not user work. Consecutive results from the same
    /// session id merge into one batch.
    pub fn observe(&mut self, result: &SessionResult) {
        if result.aborted
            || result
                .mode
                .contains(SessionMode::UNDO | SessionMode::REDO | SessionMode::LOADING)
        {
            return;
        }
        let captured: Vec<Event> = result
            .events
            .iter()
            .filter(|e| self.captures(e))
            .cloned()
            .collect();
        if captured.is_empty() {
            return;
        }
        match self.undos.last_mut() {
            Some(top) if top.session_id == result.session_id => top.events.extend(captured),
            _ => self.undos.push(UndoBatch {
                session_id: result.session_id,
                events: captured,
            }),
        }
        self.redos.clear();
    }

    /// Replay a batch's reverses in a fresh session of the given mode
    ///
    /// On a handler failure the session closes uncommitted, which rolls the
    /// partially applied steps back before the error propagates.
    fn replay(store: &mut Store, batch: &UndoBatch, mode: SessionMode) -> Result<UndoBatch> {
        let mut session = store.begin_session(SessionConfig::with_mode(mode));
        tracing::debug!(
            event = "undo_replay",
            batch_session = %batch.session_id,
            session_id = %session.id(),
            event_count = batch.events.len(),
        );
        let mut reversed = Vec::with_capacity(batch.events.len());
        for event in batch.events.iter().rev() {
            let rev = event.reverse(session.id());
            if let Err(err) = store.dispatch(Some(&mut session), &rev) {
                let _ = session.close(store);
                return Err(err);
            }
            session.record(rev.clone());
            reversed.push(rev);
        }
        session.accept_changes();
        let session_id = session.id();
        session.close(store)?;
        Ok(UndoBatch {
            session_id,
            events: reversed,
        })
    }

    /// Undo the newest batch; returns false when the stack is empty
    ///
    /// # Errors
    ///
    /// Replay failures; the store is rolled back and the batch stays on the
    /// undo stack.
    pub fn undo(&mut self, store: &mut Store) -> Result<bool> {
        let Some(batch) = self.undos.pop() else {
            return Ok(false);
        };
        match Self::replay(store, &batch, SessionMode::UNDO) {
            Ok(reversed) => {
                self.redos.push(reversed);
                Ok(true)
            }
            Err(err) => {
                self.undos.push(batch);
                Err(err)
            }
        }
    }

    /// Undo until the batch captured at the save point is on top
    ///
    /// An unknown save point unwinds the whole stack. Returns the number of
    /// batches undone.
    ///
    /// # Errors
    ///
    /// Replay failures, leaving already-undone batches undone.
    pub fn undo_to(&mut self, store: &mut Store, save_point: SessionId) -> Result<usize> {
        let mut count = 0;
        while let Some(top) = self.undos.last() {
            if top.session_id == save_point {
                break;
            }
            if !self.undo(store)? {
                break;
            }
            count += 1;
        }
        Ok(count)
    }

    /// Redo the most recently undone batch; returns false when empty
    ///
    /// # Errors
    ///
    /// Replay failures; the store is rolled back and the batch stays on the
    /// redo stack.
    pub fn redo(&mut self, store: &mut Store) -> Result<bool> {
        let Some(batch) = self.redos.pop() else {
            return Ok(false);
        };
        match Self::replay(store, &batch, SessionMode::REDO) {
            Ok(reversed) => {
                self.undos.push(reversed);
                Ok(true)
            }
            Err(err) => {
                self.redos.push(batch);
                Err(err)
            }
        }
    }

    /// Redo until the batch produced by the given replay session is on top
    ///
    /// Returns the number of batches redone.
    ///
    /// # Errors
    ///
    /// Replay failures, leaving already-redone batches applied.
    pub fn redo_to(&mut self, store: &mut Store, target: SessionId) -> Result<usize> {
        let mut count = 0;
        while let Some(top) = self.redos.last() {
            if top.session_id == target {
                break;
            }
            if !self.redo(store)? {
                break;
            }
            count += 1;
        }
        Ok(count)
    }
}

impl Default for UndoManager {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionObserver for UndoManager {
    fn session_completed(&mut self, result: &SessionResult) {
        self.observe(result);
    }
}

impl fmt::Debug for UndoManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UndoManager")
            .field("domains", &self.domains)
            .field("undos", &self.undos.len())
            .field("redos", &self.redos.len())
            .finish()
    }
}

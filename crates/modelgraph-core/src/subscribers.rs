//! Session completion observers
//!
//! Observers are the integration seam for everything that reacts to
//! committed work: persistence adapters append the result's event log to
//! their backing store, replication senders serialize the top-level events
//! for the wire, and the undo manager captures reversible batches.
//!
//! Store-level observers see every completed session, aborted ones
//! included (check `SessionResult::aborted`). Domain-scoped observers are
//! only notified for clean commits touching their domain.
//!
//! The receive side of replication runs the same machinery in the other
//! direction: deserialize incoming events and dispatch them inside a
//! session whose `origin_store` names the sender, so observers can break
//! echo loops.

use std::cell::RefCell;
use std::rc::Rc;

use crate::session::SessionResult;

/// Callback interface for session completion
pub trait SessionObserver {
    fn session_completed(&mut self, result: &SessionResult);
}

/// Shared, interiorly mutable observer registration handle
pub type ObserverHandle = Rc<RefCell<dyn SessionObserver>>;

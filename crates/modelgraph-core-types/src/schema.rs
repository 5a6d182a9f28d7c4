//! Canonical names for structured logging
//!
//! The engine emits `tracing` events tagged with `event = <name>`; adapters
//! that post-process captured logs should match on these constants rather
//! than string literals.

// Field keys the engine attaches to its events
pub const FIELD_EVENT: &str = "event";
pub const FIELD_SESSION_ID: &str = "session_id";
pub const FIELD_DOMAIN: &str = "domain";
pub const FIELD_EVENT_COUNT: &str = "event_count";
pub const FIELD_ABORTED: &str = "aborted";

// Canonical event names
pub const EVENT_SESSION_BEGIN: &str = "session_begin";
pub const EVENT_SESSION_CLOSE: &str = "session_close";
pub const EVENT_ROLLBACK: &str = "rollback";
pub const EVENT_DISPATCH: &str = "dispatch";

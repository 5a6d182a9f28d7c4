//! Session Mode Tests
//!
//! Verifies the mode flags that gate completion work: Loading skips
//! constraint evaluation, Silent suppresses the SessionFailed error, and
//! replay modes are visible on the session result.
//!
//! ## Scenarios Covered
//!
//! 1. Loading sessions commit without running Check constraints
//! 2. Silent sessions report errors without raising
//! 3. A Loading session's result carries its mode for observers
//! 4. origin_store rides along for replication-receive sessions

mod common;

use common::{eid, library_store, sid, DOMAIN};
use modelgraph_core::{
    Constraint, ConstraintKind, SessionConfig, SessionMode, Severity,
};
use modelgraph_core_types::StoreId;
use serde_json::json;

fn forbid_books() -> Constraint {
    Constraint::new(
        "no-books",
        ConstraintKind::Check,
        Severity::Error,
        "books are forbidden",
        Box::new(|_| Ok(false)),
    )
}

#[test]
fn test_loading_mode_skips_checks() {
    // GIVEN a constraint that rejects every Book
    let mut store = library_store();
    store
        .schema_mut("library")
        .unwrap()
        .constraints_mut()
        .add(&sid("Book"), forbid_books());

    // WHEN a Loading session commits one
    let (book, result) = store
        .with_session(
            SessionConfig::with_mode(SessionMode::LOADING),
            |store, session| {
                let book = store.create_entity(session, DOMAIN, &sid("Book"), Some(eid("b1")))?;
                store.set_property_value(session, &book, "title", json!("Dune"))?;
                Ok(book)
            },
        )
        .unwrap();

    // THEN the commit stands, untouched by the constraint
    assert!(store.element(&book).is_some());
    let result = result.unwrap();
    assert!(!result.aborted);
    assert!(result.messages.is_empty());
    assert!(result.mode.contains(SessionMode::LOADING));
}

#[test]
fn test_silent_mode_reports_without_raising() {
    // GIVEN the same rejecting constraint
    let mut store = library_store();
    store
        .schema_mut("library")
        .unwrap()
        .constraints_mut()
        .add(&sid("Book"), forbid_books());

    // WHEN a Silent session commits a violating element
    let (_, result) = store
        .with_session(
            SessionConfig::with_mode(SessionMode::SILENT),
            |store, session| {
                store.create_entity(session, DOMAIN, &sid("Book"), Some(eid("b1")))
            },
        )
        .unwrap();

    // THEN no error is raised, but the result shows the aborted session
    let result = result.unwrap();
    assert!(result.aborted);
    assert!(result.has_errors());
    assert!(result.mode.contains(SessionMode::ROLLBACK));

    // AND the store was still rolled back
    assert!(store.element(&eid("b1")).is_none());
}

#[test]
fn test_normal_mode_runs_checks() {
    // GIVEN the rejecting constraint and a Normal session
    let mut store = library_store();
    store
        .schema_mut("library")
        .unwrap()
        .constraints_mut()
        .add(&sid("Book"), forbid_books());

    // WHEN the session commits
    let outcome = store.with_session(SessionConfig::default(), |store, session| {
        store.create_entity(session, DOMAIN, &sid("Book"), Some(eid("b1")))
    });

    // THEN the constraint aborts it with an error
    assert!(outcome.is_err());
}

#[test]
fn test_origin_store_rides_on_receive_sessions() {
    // GIVEN a session configured as a replication receive
    let mut store = library_store();
    let sender = StoreId::new();
    let config = SessionConfig {
        mode: SessionMode::LOADING,
        origin_store: Some(sender.clone()),
    };

    // WHEN it is opened
    let session = store.begin_session(config);

    // THEN the origin is visible to handlers and observers
    assert_eq!(session.origin_store(), Some(&sender));
}

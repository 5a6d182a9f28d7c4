//! Undo/Redo Tests
//!
//! Verifies the undo manager against a live store: batch capture from
//! committed sessions, undo restoring pre-session state, redo restoring
//! post-session state, save points, and redo invalidation on forward work.
//!
//! ## Scenarios Covered
//!
//! 1. Undo reverses a committed session, redo reapplies it
//! 2. Undo restores overwritten property values
//! 3. Undo of a removal revives the element graph
//! 4. Forward commit clears the redo stack
//! 5. undo_to unwinds to a save point

mod common;

use common::{eid, library_store, sid, DOMAIN};
use modelgraph_core::{SessionConfig, UndoManager};
use serde_json::json;

#[test]
fn test_undo_then_redo_round_trip() {
    // GIVEN a committed session captured by the manager
    let mut store = library_store();
    let mut manager = UndoManager::new();
    let (book, result) = store
        .with_session(SessionConfig::default(), |store, session| {
            let book = store.create_entity(session, DOMAIN, &sid("Book"), Some(eid("b1")))?;
            store.set_property_value(session, &book, "title", json!("Dune"))?;
            Ok(book)
        })
        .unwrap();
    manager.observe(&result.unwrap());

    // WHEN the session is undone
    assert!(manager.undo(&mut store).unwrap());

    // THEN the store is back to its pre-session state
    assert!(store.element(&book).is_none());
    assert!(!manager.can_undo());
    assert!(manager.can_redo());

    // WHEN it is redone
    assert!(manager.redo(&mut store).unwrap());

    // THEN the post-session state is back, property value included
    let title = store.get_property_value(&book, "title").unwrap().unwrap();
    assert_eq!(title.value, json!("Dune"));
    assert!(manager.can_undo());
    assert!(!manager.can_redo());
}

#[test]
fn test_undo_restores_overwritten_value() {
    // GIVEN two committed sessions writing the same property
    let mut store = library_store();
    let mut manager = UndoManager::new();
    let (book, result) = store
        .with_session(SessionConfig::default(), |store, session| {
            let book = store.create_entity(session, DOMAIN, &sid("Book"), Some(eid("b1")))?;
            store.set_property_value(session, &book, "title", json!("first"))?;
            Ok(book)
        })
        .unwrap();
    manager.observe(&result.unwrap());
    let (_, result) = store
        .with_session(SessionConfig::default(), |store, session| {
            store.set_property_value(session, &book, "title", json!("second"))
        })
        .unwrap();
    manager.observe(&result.unwrap());

    // WHEN the second session is undone
    manager.undo(&mut store).unwrap();

    // THEN the first value is back
    let title = store.get_property_value(&book, "title").unwrap().unwrap();
    assert_eq!(title.value, json!("first"));

    // AND undoing again unsets the property entirely
    manager.undo(&mut store).unwrap();
    assert!(store.element(&book).is_none());
}

#[test]
fn test_undo_of_removal_revives_element_graph() {
    // GIVEN a committed shelf-holds-book graph and a committed removal
    let mut store = library_store();
    let mut manager = UndoManager::new();
    let ((shelf, book), result) = store
        .with_session(SessionConfig::default(), |store, session| {
            let shelf = store.create_entity(session, DOMAIN, &sid("Shelf"), Some(eid("s1")))?;
            let book = store.create_entity(session, DOMAIN, &sid("Book"), Some(eid("b1")))?;
            store.set_property_value(session, &book, "title", json!("Dune"))?;
            store.create_relationship(session, DOMAIN, &sid("Holds"), &shelf, &book, None, None)?;
            Ok((shelf, book))
        })
        .unwrap();
    manager.observe(&result.unwrap());
    let (_, result) = store
        .with_session(SessionConfig::default(), |store, session| {
            store.remove_element(session, &shelf)
        })
        .unwrap();
    manager.observe(&result.unwrap());
    assert!(store.element(&shelf).is_none());

    // WHEN the removal is undone
    manager.undo(&mut store).unwrap();

    // THEN the shelf, the relationship, and the untouched book are all live
    assert!(store.element(&shelf).is_some());
    assert!(store.element(&book).is_some());
    assert_eq!(
        store
            .get_relationships(DOMAIN, Some(&sid("Holds")), Some(&shelf), None)
            .count(),
        1
    );
}

#[test]
fn test_forward_commit_clears_redo() {
    // GIVEN an undone session sitting on the redo stack
    let mut store = library_store();
    let mut manager = UndoManager::new();
    let (_, result) = store
        .with_session(SessionConfig::default(), |store, session| {
            store.create_entity(session, DOMAIN, &sid("Book"), Some(eid("b1")))
        })
        .unwrap();
    manager.observe(&result.unwrap());
    manager.undo(&mut store).unwrap();
    assert!(manager.can_redo());

    // WHEN new forward work commits and is captured
    let (_, result) = store
        .with_session(SessionConfig::default(), |store, session| {
            store.create_entity(session, DOMAIN, &sid("Book"), Some(eid("b2")))
        })
        .unwrap();
    manager.observe(&result.unwrap());

    // THEN the redo stack is gone
    assert!(!manager.can_redo());
    assert!(manager.can_undo());
}

#[test]
fn test_undo_to_save_point() {
    // GIVEN three committed sessions with a save point after the first
    let mut store = library_store();
    let mut manager = UndoManager::new();
    let (_, result) = store
        .with_session(SessionConfig::default(), |store, session| {
            store.create_entity(session, DOMAIN, &sid("Book"), Some(eid("b1")))
        })
        .unwrap();
    manager.observe(&result.unwrap());
    let save_point = manager.save_point().unwrap();
    for key in ["b2", "b3"] {
        let (_, result) = store
            .with_session(SessionConfig::default(), |store, session| {
                store.create_entity(session, DOMAIN, &sid("Book"), Some(eid(key)))
            })
            .unwrap();
        manager.observe(&result.unwrap());
    }

    // WHEN unwinding to the save point
    let undone = manager.undo_to(&mut store, save_point).unwrap();

    // THEN only the work after the mark is gone
    assert_eq!(undone, 2);
    assert!(store.element(&eid("b1")).is_some());
    assert!(store.element(&eid("b2")).is_none());
    assert!(store.element(&eid("b3")).is_none());
}

#[test]
fn test_undo_on_empty_stack_is_noop() {
    // GIVEN a manager with nothing captured
    let mut store = library_store();
    let mut manager = UndoManager::new();

    // WHEN undo and redo are attempted
    // THEN both report nothing to do
    assert!(!manager.undo(&mut store).unwrap());
    assert!(!manager.redo(&mut store).unwrap());
}

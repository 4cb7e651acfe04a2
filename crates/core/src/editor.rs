//! User edits to stored documentation.
//!
//! Every path collapses empty member lists and removes records that end up
//! carrying nothing, so the store never holds an empty record.

use tracing::{debug, info};

use crate::errors::EditError;
use crate::models::ClassDocumentation;
use crate::store::EntityStore;

/// Set or clear a class description. Blank text clears it.
pub fn set_class_body<S: EntityStore + ?Sized>(
    store: &S,
    id: u64,
    body: Option<String>,
) -> Result<(), EditError> {
    let body = non_blank(body);
    info!(id, clear = body.is_none(), "editing class description");
    modify(store, id, |record| record.body = body)
}

/// Set or clear one member note. Blank text clears it.
pub fn set_member_body<S: EntityStore + ?Sized>(
    store: &S,
    class_id: u64,
    member_id: u64,
    body: Option<String>,
) -> Result<(), EditError> {
    let body = non_blank(body);
    info!(class_id, member_id, clear = body.is_none(), "editing member note");

    if body.is_none() {
        let exists = store
            .find_by_id(class_id)?
            .is_some_and(|r| r.member(member_id).is_some());
        if !exists {
            return Err(EditError::MemberNotFound {
                class_id,
                member_id,
            });
        }
    }

    modify(store, class_id, |record| match body {
        Some(body) => record.upsert_member(member_id, body),
        None => {
            record.remove_member(member_id);
        }
    })
}

/// Remove all documentation for a class.
pub fn remove_class<S: EntityStore + ?Sized>(store: &S, id: u64) -> Result<(), EditError> {
    info!(id, "removing class documentation");
    store.delete(id)?;
    Ok(())
}

fn modify<S, F>(store: &S, id: u64, change: F) -> Result<(), EditError>
where
    S: EntityStore + ?Sized,
    F: FnOnce(&mut ClassDocumentation),
{
    let existing = store.find_by_id(id)?;
    let mut record = existing.clone().unwrap_or_else(|| ClassDocumentation::new(id));
    change(&mut record);
    record.normalize();

    match (existing, record.is_empty()) {
        (None, true) => debug!(id, "nothing to store"),
        (None, false) => {
            store.create(&record)?;
        }
        (Some(_), true) => {
            debug!(id, "record emptied, deleting");
            store.delete(id)?;
        }
        (Some(previous), false) if previous == record => debug!(id, "record unchanged"),
        (Some(_), false) => store.update(&record)?,
    }
    Ok(())
}

fn non_blank(body: Option<String>) -> Option<String> {
    body.filter(|b| !b.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::models::MemberDocumentation;

    fn setup_db() -> Database {
        let db = Database::in_memory().unwrap();
        db.initialize().unwrap();
        db
    }

    #[test]
    fn test_set_body_creates_and_clears() {
        let db = setup_db();
        set_class_body(&db, 1, Some("hello".into())).unwrap();
        assert_eq!(
            db.find_by_id(1).unwrap(),
            Some(ClassDocumentation::new(1).with_body("hello"))
        );

        set_class_body(&db, 1, Some("   ".into())).unwrap();
        assert!(db.find_by_id(1).unwrap().is_none());
    }

    #[test]
    fn test_clearing_body_keeps_members() {
        let db = setup_db();
        set_class_body(&db, 2, Some("desc".into())).unwrap();
        set_member_body(&db, 2, 20, Some("note".into())).unwrap();
        set_class_body(&db, 2, None).unwrap();
        assert_eq!(
            db.find_by_id(2).unwrap(),
            Some(ClassDocumentation::new(2).with_member(MemberDocumentation::new(20, "note")))
        );
    }

    #[test]
    fn test_removing_last_member_deletes_record() {
        let db = setup_db();
        set_member_body(&db, 3, 30, Some("only".into())).unwrap();
        set_member_body(&db, 3, 30, None).unwrap();
        assert!(db.find_by_id(3).unwrap().is_none());
    }

    #[test]
    fn test_clearing_missing_member_errors() {
        let db = setup_db();
        let err = set_member_body(&db, 4, 40, None).unwrap_err();
        assert!(matches!(
            err,
            EditError::MemberNotFound {
                class_id: 4,
                member_id: 40
            }
        ));
    }

    #[test]
    fn test_remove_class() {
        let db = setup_db();
        set_class_body(&db, 5, Some("x".into())).unwrap();
        remove_class(&db, 5).unwrap();
        remove_class(&db, 5).unwrap();
        assert!(db.find_by_id(5).unwrap().is_none());
    }
}

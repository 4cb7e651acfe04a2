//! Typed queries for the documentation tables and the [`EntityStore`]
//! implementation backed by them.

use std::collections::HashMap;

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::debug;

use super::Database;
use crate::errors::StoreError;
use crate::models::{ClassDocumentation, MemberDocumentation};
use crate::store::EntityStore;

// Catalog ids are full-range u64 hashes; SQLite integers are i64. Store the
// same 64 bits and reinterpret on the way out.
fn to_sql_id(id: u64) -> i64 {
    id as i64
}

fn from_sql_id(id: i64) -> u64 {
    id as u64
}

impl Database {
    /// Number of stored documentation records.
    pub fn count(&self) -> Result<u64, StoreError> {
        let conn = self.conn();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM class_docs", [], |row| row.get(0))?;
        Ok(count as u64)
    }
}

impl EntityStore for Database {
    fn find_all(&self) -> Result<Vec<ClassDocumentation>, StoreError> {
        let conn = self.conn();

        let mut members: HashMap<u64, Vec<MemberDocumentation>> = HashMap::new();
        {
            let mut stmt = conn.prepare(
                "SELECT class_id, member_id, body FROM member_docs ORDER BY class_id, position",
            )?;
            let rows = stmt.query_map([], |row| {
                Ok((
                    from_sql_id(row.get(0)?),
                    MemberDocumentation {
                        id: from_sql_id(row.get(1)?),
                        body: row.get(2)?,
                    },
                ))
            })?;
            for row in rows {
                let (class_id, member) = row?;
                members.entry(class_id).or_default().push(member);
            }
        }

        let mut stmt = conn.prepare("SELECT id, body FROM class_docs ORDER BY id")?;
        let classes = stmt
            .query_map([], |row| {
                Ok((from_sql_id(row.get(0)?), row.get::<_, Option<String>>(1)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let records = classes
            .into_iter()
            .map(|(id, body)| ClassDocumentation {
                id,
                body,
                functions: members.remove(&id),
            })
            .collect::<Vec<_>>();
        debug!(count = records.len(), "loaded documentation records");
        Ok(records)
    }

    fn find_by_id(&self, id: u64) -> Result<Option<ClassDocumentation>, StoreError> {
        let conn = self.conn();
        let body: Option<Option<String>> = conn
            .query_row(
                "SELECT body FROM class_docs WHERE id = ?1",
                params![to_sql_id(id)],
                |row| row.get(0),
            )
            .optional()?;
        let Some(body) = body else {
            return Ok(None);
        };

        let functions = load_members(&conn, id)?;
        Ok(Some(
            ClassDocumentation {
                id,
                body,
                functions: Some(functions),
            }
            .normalized(),
        ))
    }

    fn create(&self, record: &ClassDocumentation) -> Result<u64, StoreError> {
        let record = record.clone().normalized();
        if record.is_empty() {
            return Err(StoreError::EmptyRecord { id: record.id });
        }

        self.transaction(|conn| {
            let exists: Option<i64> = conn
                .query_row(
                    "SELECT id FROM class_docs WHERE id = ?1",
                    params![to_sql_id(record.id)],
                    |row| row.get(0),
                )
                .optional()?;
            if exists.is_some() {
                return Err(StoreError::DuplicateKey { id: record.id });
            }

            conn.execute(
                "INSERT INTO class_docs (id, body, updated_at) VALUES (?1, ?2, ?3)",
                params![to_sql_id(record.id), record.body, Utc::now().to_rfc3339()],
            )?;
            insert_members(conn, &record)?;
            Ok(())
        })?;

        debug!(id = record.id, "created documentation record");
        Ok(record.id)
    }

    fn update(&self, record: &ClassDocumentation) -> Result<(), StoreError> {
        let record = record.clone().normalized();
        if record.is_empty() {
            return Err(StoreError::EmptyRecord { id: record.id });
        }

        self.transaction(|conn| {
            let changed = conn.execute(
                "UPDATE class_docs SET body = ?1, updated_at = ?2 WHERE id = ?3",
                params![record.body, Utc::now().to_rfc3339(), to_sql_id(record.id)],
            )?;
            if changed == 0 {
                return Err(StoreError::NotFound { id: record.id });
            }

            conn.execute(
                "DELETE FROM member_docs WHERE class_id = ?1",
                params![to_sql_id(record.id)],
            )?;
            insert_members(conn, &record)?;
            Ok(())
        })?;

        debug!(id = record.id, "updated documentation record");
        Ok(())
    }

    fn delete(&self, id: u64) -> Result<(), StoreError> {
        self.transaction(|conn| {
            conn.execute(
                "DELETE FROM member_docs WHERE class_id = ?1",
                params![to_sql_id(id)],
            )?;
            conn.execute("DELETE FROM class_docs WHERE id = ?1", params![to_sql_id(id)])?;
            Ok::<_, StoreError>(())
        })?;
        debug!(id, "deleted documentation record");
        Ok(())
    }

    fn delete_all(&self) -> Result<(), StoreError> {
        self.transaction(|conn| {
            conn.execute("DELETE FROM member_docs", [])?;
            let removed = conn.execute("DELETE FROM class_docs", [])?;
            debug!(removed, "deleted all documentation records");
            Ok::<_, StoreError>(())
        })
    }
}

fn load_members(conn: &Connection, class_id: u64) -> Result<Vec<MemberDocumentation>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT member_id, body FROM member_docs WHERE class_id = ?1 ORDER BY position",
    )?;
    let members = stmt
        .query_map(params![to_sql_id(class_id)], |row| {
            Ok(MemberDocumentation {
                id: from_sql_id(row.get(0)?),
                body: row.get(1)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(members)
}

fn insert_members(conn: &Connection, record: &ClassDocumentation) -> Result<(), StoreError> {
    let mut stmt = conn.prepare(
        "INSERT INTO member_docs (class_id, member_id, position, body) VALUES (?1, ?2, ?3, ?4)",
    )?;
    for (position, member) in record.members().iter().enumerate() {
        stmt.execute(params![
            to_sql_id(record.id),
            to_sql_id(member.id),
            position as i64,
            member.body
        ])?;
    }
    Ok(())
}

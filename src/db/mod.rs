//! SQLite persistence for whole JSON documents.
//!
//! Every deck and every study session is one row in `documents`, addressed by
//! `(collection, id)`. Writes replace the whole body and bump `version`;
//! [`Database::compare_and_swap`] only succeeds against the version the caller
//! read, so concurrent writers cannot silently overwrite each other.

mod schema;

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension};
use serde::{de::DeserializeOwned, Serialize};
use uuid::Uuid;

/// A value stored as one document row.
pub trait Document: Serialize + DeserializeOwned + Clone {
    const COLLECTION: &'static str;

    fn id(&self) -> Uuid;
}

/// A document together with the version it was read at.
#[derive(Debug, Clone, PartialEq)]
pub struct Versioned<T> {
    pub version: i64,
    pub updated_at: DateTime<Utc>,
    pub value: T,
}

pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    pub fn open(path: PathBuf) -> Result<Self> {
        let parent = path
            .parent()
            .ok_or_else(|| anyhow::anyhow!("Database path has no parent directory"))?;
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(&path)
            .with_context(|| format!("Failed to open database at {}", path.display()))?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "FULL")?;
        tracing::debug!(path = %path.display(), "Opened database");
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn migrate(&self) -> Result<()> {
        let conn = self.conn.lock().expect("database lock poisoned");
        schema::run_migrations(&conn)
    }

    // ============================================================
    // Document operations
    // ============================================================

    pub fn get<T: Document>(&self, id: Uuid) -> Result<Option<Versioned<T>>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let row = conn
            .query_row(
                "SELECT version, body, updated_at FROM documents WHERE collection = ? AND id = ?",
                (T::COLLECTION, id.to_string()),
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                    ))
                },
            )
            .optional()?;

        row.map(|(version, body, updated_at)| decode(T::COLLECTION, id, version, &body, updated_at))
            .transpose()
    }

    pub fn exists<T: Document>(&self, id: Uuid) -> Result<bool> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM documents WHERE collection = ? AND id = ?",
            (T::COLLECTION, id.to_string()),
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Store a new document at version 1. Fails if the id is already taken.
    pub fn insert<T: Document>(&self, doc: &T) -> Result<Versioned<T>> {
        let body = serde_json::to_string(doc)
            .with_context(|| format!("Failed to encode {} document", T::COLLECTION))?;
        let now = Utc::now();

        let conn = self.conn.lock().expect("database lock poisoned");
        conn.execute(
            "INSERT INTO documents (collection, id, version, body, created_at, updated_at)
             VALUES (?, ?, 1, ?, ?, ?)",
            (
                T::COLLECTION,
                doc.id().to_string(),
                &body,
                now.to_rfc3339(),
                now.to_rfc3339(),
            ),
        )
        .with_context(|| format!("Failed to insert {} document {}", T::COLLECTION, doc.id()))?;

        Ok(Versioned {
            version: 1,
            updated_at: now,
            value: doc.clone(),
        })
    }

    /// Replace the document if it is still at `expected_version`.
    ///
    /// Returns the new version, or `None` when the stored version differs or
    /// the document no longer exists.
    pub fn compare_and_swap<T: Document>(&self, doc: &T, expected_version: i64) -> Result<Option<i64>> {
        let body = serde_json::to_string(doc)
            .with_context(|| format!("Failed to encode {} document", T::COLLECTION))?;
        let next_version = expected_version + 1;

        let conn = self.conn.lock().expect("database lock poisoned");
        let updated = conn.execute(
            "UPDATE documents SET version = ?, body = ?, updated_at = ?
             WHERE collection = ? AND id = ? AND version = ?",
            (
                next_version,
                &body,
                Utc::now().to_rfc3339(),
                T::COLLECTION,
                doc.id().to_string(),
                expected_version,
            ),
        )?;

        Ok((updated == 1).then_some(next_version))
    }

    pub fn delete<T: Document>(&self, id: Uuid) -> Result<bool> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let deleted = conn.execute(
            "DELETE FROM documents WHERE collection = ? AND id = ?",
            (T::COLLECTION, id.to_string()),
        )?;
        Ok(deleted > 0)
    }

    /// Every document of the collection, most recently written first.
    pub fn list<T: Document>(&self) -> Result<Vec<Versioned<T>>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let mut stmt = conn.prepare(
            "SELECT id, version, body, updated_at FROM documents
             WHERE collection = ? ORDER BY updated_at DESC",
        )?;

        let rows = stmt
            .query_map([T::COLLECTION], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(id, version, body, updated_at)| {
                decode(T::COLLECTION, parse_uuid(&id)?, version, &body, updated_at)
            })
            .collect()
    }
}

impl Clone for Database {
    fn clone(&self) -> Self {
        Self {
            conn: self.conn.clone(),
        }
    }
}

fn decode<T: Document>(
    collection: &str,
    id: Uuid,
    version: i64,
    body: &str,
    updated_at: String,
) -> Result<Versioned<T>> {
    let value = serde_json::from_str(body)
        .with_context(|| format!("Corrupt {} document {}", collection, id))?;
    Ok(Versioned {
        version,
        updated_at: parse_datetime(&updated_at),
        value,
    })
}

fn parse_uuid(s: &str) -> Result<Uuid> {
    Uuid::parse_str(s).with_context(|| format!("Invalid document id {s:?}"))
}

fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Note {
        id: Uuid,
        text: String,
    }

    impl Document for Note {
        const COLLECTION: &'static str = "notes";

        fn id(&self) -> Uuid {
            self.id
        }
    }

    fn db() -> Database {
        let db = Database::open_memory().unwrap();
        db.migrate().unwrap();
        db
    }

    fn note(text: &str) -> Note {
        Note {
            id: Uuid::new_v4(),
            text: text.to_string(),
        }
    }

    #[test]
    fn insert_then_get() {
        let db = db();
        let doc = note("first");
        db.insert(&doc).unwrap();

        let stored = db.get::<Note>(doc.id).unwrap().unwrap();
        assert_eq!(stored.version, 1);
        assert_eq!(stored.value, doc);
        assert!(db.exists::<Note>(doc.id).unwrap());
        assert!(db.get::<Note>(Uuid::new_v4()).unwrap().is_none());
    }

    #[test]
    fn duplicate_insert_fails() {
        let db = db();
        let doc = note("once");
        db.insert(&doc).unwrap();
        assert!(db.insert(&doc).is_err());
    }

    #[test]
    fn compare_and_swap_rejects_stale_versions() {
        let db = db();
        let mut doc = note("v1");
        db.insert(&doc).unwrap();

        doc.text = "v2".to_string();
        assert_eq!(db.compare_and_swap(&doc, 1).unwrap(), Some(2));

        doc.text = "stale".to_string();
        assert_eq!(db.compare_and_swap(&doc, 1).unwrap(), None);

        let stored = db.get::<Note>(doc.id).unwrap().unwrap();
        assert_eq!(stored.version, 2);
        assert_eq!(stored.value.text, "v2");
    }

    #[test]
    fn delete_removes_document() {
        let db = db();
        let doc = note("gone");
        db.insert(&doc).unwrap();

        assert!(db.delete::<Note>(doc.id).unwrap());
        assert!(!db.delete::<Note>(doc.id).unwrap());
        assert_eq!(db.compare_and_swap(&doc, 1).unwrap(), None);
    }

    #[test]
    fn corrupt_body_is_an_error() {
        let db = db();
        let id = Uuid::new_v4();
        {
            let conn = db.conn.lock().unwrap();
            conn.execute(
                "INSERT INTO documents (collection, id, version, body, created_at, updated_at)
                 VALUES ('notes', ?, 1, 'not json', 'x', 'x')",
                [id.to_string()],
            )
            .unwrap();
        }
        assert!(db.get::<Note>(id).is_err());
    }
}

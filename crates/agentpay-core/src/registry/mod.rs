//! RevocationRegistry: SQLite-backed revocation set and issued-mandate log.
//!
//! Revocation is monotonic: the first revocation of a mandate id is stored
//! and every later revocation of the same id returns that original entry.
//! All access goes through one connection behind a mutex, so a revocation
//! is visible to every verification that starts after `revoke` returns.

mod issued;
pub mod schema;

use crate::error::{Error, FieldViolation, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use schema::REGISTRY_SCHEMA;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

/// One revoked mandate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevocationEntry {
    pub mandate_id: String,
    pub reason: Option<String>,
    pub revoked_at: DateTime<Utc>,
}

/// SQLite-backed revocation registry.
#[derive(Clone)]
pub struct RevocationRegistry {
    conn: Arc<Mutex<Connection>>,
}

impl RevocationRegistry {
    /// Open a file-backed registry.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    /// Create an in-memory registry (for testing).
    pub fn memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    pub fn from_connection(conn: Connection) -> Result<Self> {
        Self::init_connection(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn init_connection(conn: &Connection) -> Result<()> {
        // WAL mode for file-backed DBs (no-op for in-memory)
        let _ = conn.execute_batch("PRAGMA journal_mode = WAL");
        let _ = conn.execute("PRAGMA busy_timeout = 5000", []);
        conn.execute_batch(REGISTRY_SCHEMA)?;
        Ok(())
    }

    pub(crate) fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| Error::Store("registry lock poisoned".to_string()))
    }

    /// Revoke `mandate_id` now.
    pub fn revoke(&self, mandate_id: &str, reason: Option<&str>) -> Result<RevocationEntry> {
        self.revoke_at(mandate_id, reason, Utc::now())
    }

    /// Revoke `mandate_id` at `revoked_at`. Idempotent: an existing entry is
    /// returned unchanged, including its original reason and timestamp.
    pub fn revoke_at(
        &self,
        mandate_id: &str,
        reason: Option<&str>,
        revoked_at: DateTime<Utc>,
    ) -> Result<RevocationEntry> {
        if mandate_id.trim().is_empty() {
            return Err(Error::validation(vec![FieldViolation::new(
                "mandate_id",
                "must not be empty",
            )]));
        }

        let conn = self.lock()?;
        let inserted = conn.execute(
            r#"
            INSERT INTO revocations (mandate_id, reason, revoked_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(mandate_id) DO NOTHING
            "#,
            params![mandate_id, reason, format_ts(revoked_at)],
        )?;

        let entry = get_revocation_impl(&conn, mandate_id)?.ok_or_else(|| {
            Error::Store(format!("revocation for {mandate_id} missing after insert"))
        })?;

        if inserted == 0 {
            tracing::debug!(mandate_id, "mandate already revoked; returning stored entry");
        } else {
            tracing::info!(mandate_id, reason = ?entry.reason, "mandate revoked");
        }
        Ok(entry)
    }

    pub fn get_revocation(&self, mandate_id: &str) -> Result<Option<RevocationEntry>> {
        let conn = self.lock()?;
        get_revocation_impl(&conn, mandate_id)
    }

    pub fn is_revoked(&self, mandate_id: &str) -> Result<bool> {
        Ok(self.get_revocation(mandate_id)?.is_some())
    }

    /// Every revocation, oldest first.
    pub fn list_revocations(&self) -> Result<Vec<RevocationEntry>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT mandate_id, reason, revoked_at
             FROM revocations
             ORDER BY revoked_at ASC, seq ASC",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, Option<String>>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(mandate_id, reason, ts)| {
                Ok(RevocationEntry {
                    mandate_id,
                    reason,
                    revoked_at: parse_ts("revoked_at", &ts)?,
                })
            })
            .collect()
    }
}

fn get_revocation_impl(conn: &Connection, mandate_id: &str) -> Result<Option<RevocationEntry>> {
    let row: Option<(Option<String>, String)> = conn
        .query_row(
            "SELECT reason, revoked_at FROM revocations WHERE mandate_id = ?1",
            [mandate_id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;

    row.map(|(reason, ts)| {
        Ok(RevocationEntry {
            mandate_id: mandate_id.to_string(),
            reason,
            revoked_at: parse_ts("revoked_at", &ts)?,
        })
    })
    .transpose()
}

/// Fixed-width RFC 3339 so stored timestamps sort lexicographically.
pub(crate) fn format_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

pub(crate) fn parse_ts(column: &str, value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::Store(format!("invalid {column} timestamp {value:?}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, hour, 0, 0).unwrap()
    }

    #[test]
    fn test_registry_bootstraps_schema() {
        let registry = RevocationRegistry::memory().unwrap();
        let conn = registry.lock().unwrap();
        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |r| r.get(0))
            .unwrap()
            .collect::<std::result::Result<_, _>>()
            .unwrap();
        assert!(tables.contains(&"revocations".to_string()));
        assert!(tables.contains(&"issued_mandates".to_string()));
    }

    #[test]
    fn test_revocation_roundtrip() {
        let registry = RevocationRegistry::memory().unwrap();
        assert!(!registry.is_revoked("mdt_1").unwrap());

        let entry = registry
            .revoke_at("mdt_1", Some("card reported stolen"), ts(9))
            .unwrap();
        assert_eq!(entry.mandate_id, "mdt_1");
        assert_eq!(entry.reason.as_deref(), Some("card reported stolen"));
        assert_eq!(entry.revoked_at, ts(9));

        assert!(registry.is_revoked("mdt_1").unwrap());
        assert_eq!(registry.get_revocation("mdt_1").unwrap(), Some(entry));
    }

    #[test]
    fn test_revocation_is_idempotent_and_keeps_original() {
        let registry = RevocationRegistry::memory().unwrap();
        let first = registry.revoke_at("mdt_1", Some("first"), ts(9)).unwrap();
        let second = registry.revoke_at("mdt_1", Some("second"), ts(11)).unwrap();
        let third = registry.revoke_at("mdt_1", None, ts(12)).unwrap();

        assert_eq!(first, second);
        assert_eq!(first, third);
        assert_eq!(registry.list_revocations().unwrap().len(), 1);
    }

    #[test]
    fn test_list_orders_by_revoked_at() {
        let registry = RevocationRegistry::memory().unwrap();
        registry.revoke_at("late", None, ts(15)).unwrap();
        registry.revoke_at("early", None, ts(8)).unwrap();
        registry.revoke_at("mid-a", None, ts(10)).unwrap();
        registry.revoke_at("mid-b", None, ts(10)).unwrap();

        let ids: Vec<String> = registry
            .list_revocations()
            .unwrap()
            .into_iter()
            .map(|e| e.mandate_id)
            .collect();
        assert_eq!(ids, vec!["early", "mid-a", "mid-b", "late"]);
    }

    #[test]
    fn test_empty_mandate_id_is_rejected() {
        let registry = RevocationRegistry::memory().unwrap();
        let err = registry.revoke("  ", None).unwrap_err();
        assert_eq!(err.code(), "E_VALIDATION_FAILED");
    }

    #[test]
    fn test_clones_share_state() {
        let registry = RevocationRegistry::memory().unwrap();
        let other = registry.clone();
        registry.revoke("mdt_shared", None).unwrap();
        assert!(other.is_revoked("mdt_shared").unwrap());
    }

    #[test]
    fn test_timestamps_are_fixed_width() {
        let base = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let a = format_ts(base);
        let b = format_ts(base + chrono::Duration::nanoseconds(5));
        assert_eq!(a.len(), b.len());
        assert!(a < b);
        assert_eq!(parse_ts("t", &b).unwrap().timestamp_subsec_nanos(), 5);
    }
}

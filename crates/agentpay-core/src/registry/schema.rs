//! SQLite schema for the revocation registry.
//!
//! Tables:
//! - `revocations`: append-only revocation log, one row per mandate id
//! - `issued_mandates`: mandates created or signed through the authority

/// DDL for the registry tables.
///
/// Schema version: 1
pub const REGISTRY_SCHEMA: &str = r#"
-- Revocations (append-only, first write wins)
CREATE TABLE IF NOT EXISTS revocations (
    seq              INTEGER PRIMARY KEY AUTOINCREMENT,
    mandate_id       TEXT NOT NULL UNIQUE,
    reason           TEXT,
    revoked_at       TEXT NOT NULL
);

-- Issued mandates (body is immutable once signed = 1)
CREATE TABLE IF NOT EXISTS issued_mandates (
    mandate_id       TEXT PRIMARY KEY,
    body             TEXT NOT NULL,
    signed           INTEGER NOT NULL DEFAULT 0,
    recorded_at      TEXT NOT NULL,
    updated_at       TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_revocations_revoked_at
    ON revocations(revoked_at, seq);
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    #[test]
    fn test_schema_is_valid_sql() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(REGISTRY_SCHEMA).unwrap();
    }

    #[test]
    fn test_schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(REGISTRY_SCHEMA).unwrap();
        conn.execute_batch(REGISTRY_SCHEMA).unwrap();
    }
}

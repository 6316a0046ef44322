//! Issued-mandate log.
//!
//! An unsigned row may be replaced (by its signed version); a signed row
//! never changes.

use super::{format_ts, RevocationRegistry};
use crate::error::{Error, Result};
use crate::mandate::Mandate;
use chrono::Utc;
use rusqlite::{params, OptionalExtension};

impl RevocationRegistry {
    /// Record a mandate created or signed through the authority.
    ///
    /// Re-recording identical content is a no-op. Replacing a signed
    /// mandate with different content fails with `SignatureFailed`.
    pub fn record_mandate(&self, mandate: &Mandate) -> Result<()> {
        let body = serde_json::to_string(mandate)?;
        let now = format_ts(Utc::now());
        let conn = self.lock()?;

        conn.execute(
            r#"
            INSERT INTO issued_mandates (mandate_id, body, signed, recorded_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?4)
            ON CONFLICT(mandate_id) DO UPDATE SET
                body = excluded.body,
                signed = excluded.signed,
                updated_at = excluded.updated_at
            WHERE issued_mandates.signed = 0
            "#,
            params![mandate.id, body, mandate.is_signed() as i32, now],
        )?;

        let stored: String = conn.query_row(
            "SELECT body FROM issued_mandates WHERE mandate_id = ?1",
            [&mandate.id],
            |row| row.get(0),
        )?;
        if stored != body {
            return Err(Error::SignatureFailed {
                reason: format!(
                    "mandate {} is already signed; its signature is immutable",
                    mandate.id
                ),
            });
        }
        Ok(())
    }

    pub fn get_mandate(&self, mandate_id: &str) -> Result<Option<Mandate>> {
        let conn = self.lock()?;
        let body: Option<String> = conn
            .query_row(
                "SELECT body FROM issued_mandates WHERE mandate_id = ?1",
                [mandate_id],
                |row| row.get(0),
            )
            .optional()?;
        body.map(|b| {
            serde_json::from_str(&b)
                .map_err(|e| Error::Store(format!("corrupt mandate body for {mandate_id}: {e}")))
        })
        .transpose()
    }
}

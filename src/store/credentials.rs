//! Identity and credential-blob persistence.

use std::collections::BTreeMap;

use chrono::Utc;
use rusqlite::params;
use tracing::instrument;

use crate::protocol::{CredentialBlob, Identity};
use crate::Result;

use super::database::Database;

/// Durable mapping from session id to identity record and multi-file
/// credential blob.
///
/// The blob is opaque: files are persisted verbatim and handed back to the
/// protocol client on the next connect. Liveness is never derived from
/// this store; a persisted identity can belong to a disconnected session.
#[derive(Clone)]
pub struct CredentialStore {
    db: Database,
}

impl CredentialStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Persist the resolved identity for a session.
    #[instrument(skip(self, identity))]
    pub fn save_identity(&self, session_id: &str, identity: &Identity) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        self.db.with_conn(|conn| {
            conn.execute(
                "REPLACE INTO sessions (session_id, user_id, user_lid, updated_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![session_id, identity.id, identity.lid, now],
            )?;
            Ok(())
        })
    }

    /// Load the identity for a session, if one was ever persisted.
    pub fn get_identity(&self, session_id: &str) -> Result<Option<Identity>> {
        self.db.with_conn(|conn| {
            let mut stmt =
                conn.prepare("SELECT user_id, user_lid FROM sessions WHERE session_id = ?1")?;
            let mut rows = stmt.query([session_id])?;
            match rows.next()? {
                Some(row) => Ok(Some(Identity {
                    id: row.get(0)?,
                    lid: row.get(1)?,
                })),
                None => Ok(None),
            }
        })
    }

    /// All persisted identities, keyed by session id. Used at startup to
    /// restore sessions before their supervisors are started.
    pub fn list_identities(&self) -> Result<Vec<(String, Identity)>> {
        self.db.with_conn(|conn| {
            let mut stmt =
                conn.prepare("SELECT session_id, user_id, user_lid FROM sessions")?;
            let rows = stmt.query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    Identity {
                        id: row.get(1)?,
                        lid: row.get(2)?,
                    },
                ))
            })?;
            let mut out = Vec::new();
            for row in rows {
                out.push(row?);
            }
            Ok(out)
        })
    }

    /// Replace the stored credential blob for a session wholesale.
    ///
    /// The client owns the blob's contents; each rotation callback ships
    /// the complete new state, so stale files are dropped here.
    #[instrument(skip(self, blob), fields(files = blob.len()))]
    pub fn save_blob(&self, session_id: &str, blob: &CredentialBlob) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        self.db.with_conn(|conn| {
            conn.execute(
                "DELETE FROM session_files WHERE session_id = ?1",
                [session_id],
            )?;
            let mut stmt = conn.prepare(
                "INSERT INTO session_files (session_id, file_name, contents, updated_at)
                 VALUES (?1, ?2, ?3, ?4)",
            )?;
            for (name, contents) in blob.files() {
                stmt.execute(params![session_id, name, contents, now])?;
            }
            Ok(())
        })
    }

    /// Load the credential blob for a session. Empty if none was stored,
    /// which makes the next connect attempt issue a fresh QR challenge.
    pub fn load_blob(&self, session_id: &str) -> Result<CredentialBlob> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT file_name, contents FROM session_files WHERE session_id = ?1",
            )?;
            let rows = stmt.query_map([session_id], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, Vec<u8>>(1)?))
            })?;
            let mut files = BTreeMap::new();
            for row in rows {
                let (name, contents) = row?;
                files.insert(name, contents);
            }
            Ok(CredentialBlob::from_files(files))
        })
    }

    /// Delete the identity record and every credential file for a session.
    #[instrument(skip(self))]
    pub fn delete(&self, session_id: &str) -> Result<()> {
        self.db.with_conn(|conn| {
            conn.execute("DELETE FROM sessions WHERE session_id = ?1", [session_id])?;
            conn.execute(
                "DELETE FROM session_files WHERE session_id = ?1",
                [session_id],
            )?;
            Ok(())
        })
    }
}

//! SQLite schema for the credential store.

pub const SCHEMA_VERSION: u32 = 1;

pub const PRAGMAS: &str = "
PRAGMA journal_mode = WAL;
PRAGMA synchronous = NORMAL;
PRAGMA foreign_keys = ON;
";

pub const CREATE_TABLES: &str = "
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS sessions (
    session_id TEXT PRIMARY KEY,
    user_id    TEXT NOT NULL,
    user_lid   TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS session_files (
    session_id TEXT NOT NULL,
    file_name  TEXT NOT NULL,
    contents   BLOB NOT NULL,
    updated_at TEXT NOT NULL,
    PRIMARY KEY (session_id, file_name)
);
";

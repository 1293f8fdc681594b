//! SQLite schema for the snapshot store

/// Current schema version
pub const SCHEMA_VERSION: i32 = 1;

/// Initial schema
///
/// One row per `(reference_date, garage_code)`; the fleet-wide aggregate
/// stores NULL in `garage_code`. SQLite treats NULLs as distinct in plain
/// unique indexes, so uniqueness goes through `ifnull(garage_code, -1)`.
pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS schema_version (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    version INTEGER NOT NULL,
    applied_at INTEGER NOT NULL,
    description TEXT
);

CREATE TABLE IF NOT EXISTS metric_snapshots (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    reference_date TEXT NOT NULL,
    garage_code INTEGER,
    garage_name TEXT,

    total_fines INTEGER NOT NULL DEFAULT 0,
    total_value REAL NOT NULL DEFAULT 0,

    paid INTEGER NOT NULL DEFAULT 0,
    overdue INTEGER NOT NULL DEFAULT 0,
    pending INTEGER NOT NULL DEFAULT 0,

    light INTEGER NOT NULL DEFAULT 0,
    medium INTEGER NOT NULL DEFAULT 0,
    severe INTEGER NOT NULL DEFAULT 0,
    very_severe INTEGER NOT NULL DEFAULT 0,

    electronic INTEGER NOT NULL DEFAULT 0,
    in_person INTEGER NOT NULL DEFAULT 0,

    average_value REAL NOT NULL DEFAULT 0,
    payment_rate REAL NOT NULL DEFAULT 0,

    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_snapshots_date_garage
    ON metric_snapshots(reference_date, ifnull(garage_code, -1));

CREATE INDEX IF NOT EXISTS idx_snapshots_date
    ON metric_snapshots(reference_date);

CREATE INDEX IF NOT EXISTS idx_snapshots_garage
    ON metric_snapshots(garage_code);
"#;

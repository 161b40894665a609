//! SQL schema for the Questline SQLite store.
//!
//! Run in full on every connection open; the `IF NOT EXISTS` DDL makes that
//! idempotent. `PRAGMA user_version` is written but not yet read — it is
//! reserved for future migrations.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

-- One row per (user, mission): the concurrency boundary of the engine.
-- Counter columns only ever move through in-database increments.
CREATE TABLE IF NOT EXISTS mission_progress (
    user_id                     TEXT NOT NULL,
    mission_id                  TEXT NOT NULL,
    completion_percentage       INTEGER NOT NULL DEFAULT 0,
    decisions_made              INTEGER NOT NULL DEFAULT 0,
    good_decisions              INTEGER NOT NULL DEFAULT 0,
    bad_decisions               INTEGER NOT NULL DEFAULT 0,
    diplomatic_decisions        INTEGER NOT NULL DEFAULT 0,
    diplomatic_good_decisions   INTEGER NOT NULL DEFAULT 0,
    diplomatic_bad_decisions    INTEGER NOT NULL DEFAULT 0,
    strategic_decisions         INTEGER NOT NULL DEFAULT 0,
    strategic_good_decisions    INTEGER NOT NULL DEFAULT 0,
    strategic_bad_decisions     INTEGER NOT NULL DEFAULT 0,
    action_decisions            INTEGER NOT NULL DEFAULT 0,
    action_good_decisions       INTEGER NOT NULL DEFAULT 0,
    action_bad_decisions        INTEGER NOT NULL DEFAULT 0,
    investigation_decisions     INTEGER NOT NULL DEFAULT 0,
    investigation_good_decisions INTEGER NOT NULL DEFAULT 0,
    investigation_bad_decisions INTEGER NOT NULL DEFAULT 0,
    time_spent_secs             INTEGER NOT NULL DEFAULT 0,
    can_resume                  INTEGER NOT NULL DEFAULT 0,
    last_message_order          INTEGER NOT NULL DEFAULT 0,
    completed_at                TEXT,            -- set at most once
    last_updated                TEXT NOT NULL,   -- ISO 8601 UTC
    PRIMARY KEY (user_id, mission_id)
);

-- Idempotency ledger: one entry per logical decision submission. Inserted
-- in the same transaction as the counter increment, so a retried write
-- either fully applied once or not at all.
CREATE TABLE IF NOT EXISTS decision_submissions (
    submission_id TEXT PRIMARY KEY,
    user_id       TEXT NOT NULL,
    mission_id    TEXT NOT NULL,
    recorded_at   TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS user_xp (
    user_id  TEXT PRIMARY KEY,
    total_xp INTEGER NOT NULL DEFAULT 0
);

-- Append-only; the primary key makes a double grant a conflict no-op.
CREATE TABLE IF NOT EXISTS unlocked_achievements (
    user_id        TEXT NOT NULL,
    achievement_id TEXT NOT NULL,
    unlocked_at    TEXT NOT NULL,
    PRIMARY KEY (user_id, achievement_id)
);

CREATE TABLE IF NOT EXISTS one_shot_flags (
    user_id TEXT NOT NULL,
    flag    TEXT NOT NULL,   -- 'stop_command' | 'export'
    set_at  TEXT NOT NULL,
    PRIMARY KEY (user_id, flag)
);

CREATE INDEX IF NOT EXISTS progress_user_idx    ON mission_progress(user_id);
CREATE INDEX IF NOT EXISTS submissions_key_idx  ON decision_submissions(user_id, mission_id);

PRAGMA user_version = 1;
";

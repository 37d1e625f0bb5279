use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

/// Ordered schema steps. A step never changes once released; new behaviour
/// gets a new version.
const MIGRATIONS: &[(i64, &str, &str)] = &[
    (
        1,
        "initial schema",
        "
        CREATE TABLE couples (
            id              TEXT PRIMARY KEY,
            email           TEXT NOT NULL UNIQUE,
            display_name    TEXT NOT NULL,
            password        TEXT NOT NULL,
            created_at      TEXT NOT NULL
        );

        CREATE TABLE events (
            id              TEXT PRIMARY KEY,
            couple_id       TEXT NOT NULL REFERENCES couples(id),
            partner_one     TEXT NOT NULL,
            partner_two     TEXT NOT NULL,
            event_date      TEXT NOT NULL,
            code            TEXT NOT NULL UNIQUE,
            cover_path      TEXT,
            guest_quota     INTEGER NOT NULL CHECK (guest_quota > 0),
            created_at      TEXT NOT NULL
        );

        CREATE INDEX idx_events_couple
            ON events(couple_id, created_at);

        CREATE TABLE guests (
            id                  TEXT PRIMARY KEY,
            event_id            TEXT NOT NULL REFERENCES events(id) ON DELETE CASCADE,
            display_name        TEXT NOT NULL,
            photo_quota         INTEGER NOT NULL,
            photos_remaining    INTEGER NOT NULL,
            has_unlocked_feed   INTEGER NOT NULL DEFAULT 0,
            created_at          TEXT NOT NULL,
            CHECK (photos_remaining >= 0 AND photos_remaining <= photo_quota)
        );

        CREATE INDEX idx_guests_event
            ON guests(event_id);

        CREATE TABLE photos (
            id              TEXT PRIMARY KEY,
            event_id        TEXT NOT NULL REFERENCES events(id) ON DELETE CASCADE,
            guest_id        TEXT NOT NULL REFERENCES guests(id) ON DELETE CASCADE,
            storage_path    TEXT NOT NULL UNIQUE,
            sha256          TEXT NOT NULL,
            caption         TEXT CHECK (caption IS NULL OR length(caption) BETWEEN 1 AND 150),
            captured_at     TEXT NOT NULL,
            created_at      TEXT NOT NULL
        );

        CREATE INDEX idx_photos_event
            ON photos(event_id, created_at);
        ",
    ),
    (
        2,
        "per-guest photo index",
        "
        CREATE INDEX idx_photos_guest
            ON photos(guest_id);
        ",
    ),
];

pub fn run(conn: &mut Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let current: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |r| r.get(0),
    )?;

    for &(version, name, sql) in MIGRATIONS {
        if version <= current {
            continue;
        }
        info!("Running migration v{} ({})", version, name);
        let tx = conn.transaction()?;
        tx.execute_batch(sql)?;
        tx.execute("INSERT INTO schema_version (version) VALUES (?1)", [version])?;
        tx.commit()?;
    }

    info!("Database migrations complete");
    Ok(())
}

pub fn latest_version() -> i64 {
    MIGRATIONS.last().map_or(0, |&(version, _, _)| version)
}

use std::collections::HashSet;

use anyhow::Result;
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Row};
use uuid::Uuid;

use confetti_types::api::Principal;
use confetti_types::entitlement::Entitlement;
use confetti_types::models::{Couple, Guest, Photo, WeddingEvent};

use crate::models::{Access, FeedCursor};
use crate::{Database, encode_ts};

const EVENT_COLUMNS: &str = "id, couple_id, partner_one, partner_two, event_date, code, cover_path, guest_quota, created_at";

const GUEST_COLUMNS: &str =
    "g.id, g.event_id, g.display_name, g.photo_quota, g.photos_remaining, g.has_unlocked_feed, g.created_at";

pub(crate) const PHOTO_SELECT: &str = "SELECT p.id, p.event_id, p.guest_id, g.display_name, p.storage_path, p.sha256, p.caption, p.captured_at, p.created_at
     FROM photos p
     JOIN guests g ON g.id = p.guest_id";

impl Database {
    // -- Couples --

    /// Returns `false` when the email is already registered.
    pub fn create_couple(&self, couple: &Couple, password_hash: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let inserted = conn.execute(
                "INSERT INTO couples (id, email, display_name, password, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
                (
                    couple.id.to_string(),
                    &couple.email,
                    &couple.display_name,
                    password_hash,
                    encode_ts(&couple.created_at),
                ),
            );
            match inserted {
                Ok(_) => Ok(true),
                Err(e) if is_unique_violation(&e) => Ok(false),
                Err(e) => Err(e.into()),
            }
        })
    }

    /// The couple plus their stored password hash.
    pub fn get_couple_credentials(&self, email: &str) -> Result<Option<(Couple, String)>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    "SELECT id, email, display_name, created_at, password FROM couples WHERE email = ?1",
                    [email],
                    |row| {
                        let couple = Couple {
                            id: uuid_col(row, 0)?,
                            email: row.get(1)?,
                            display_name: row.get(2)?,
                            created_at: ts_col(row, 3)?,
                        };
                        Ok((couple, row.get::<_, String>(4)?))
                    },
                )
                .optional()?;
            Ok(row)
        })
    }

    // -- Events --

    /// Returns `false` when the event code is already taken.
    pub fn insert_event(&self, event: &WeddingEvent) -> Result<bool> {
        self.with_conn(|conn| {
            let inserted = conn.execute(
                "INSERT INTO events (id, couple_id, partner_one, partner_two, event_date, code, cover_path, guest_quota, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                rusqlite::params![
                    event.id.to_string(),
                    event.couple_id.to_string(),
                    &event.partner_one,
                    &event.partner_two,
                    event.event_date.format("%Y-%m-%d").to_string(),
                    &event.code,
                    &event.cover_path,
                    event.guest_quota,
                    encode_ts(&event.created_at),
                ],
            );
            match inserted {
                Ok(_) => Ok(true),
                Err(e) if is_unique_violation(&e) => Ok(false),
                Err(e) => Err(e.into()),
            }
        })
    }

    pub fn get_event(&self, id: Uuid) -> Result<Option<WeddingEvent>> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {EVENT_COLUMNS} FROM events WHERE id = ?1");
            Ok(conn
                .query_row(&sql, [id.to_string()], event_from_row)
                .optional()?)
        })
    }

    /// `code` must already be normalized (see `EventCode::parse`).
    pub fn get_event_by_code(&self, code: &str) -> Result<Option<WeddingEvent>> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {EVENT_COLUMNS} FROM events WHERE code = ?1");
            Ok(conn.query_row(&sql, [code], event_from_row).optional()?)
        })
    }

    pub fn list_events_for_couple(&self, couple_id: Uuid) -> Result<Vec<WeddingEvent>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {EVENT_COLUMNS} FROM events WHERE couple_id = ?1 ORDER BY created_at DESC"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([couple_id.to_string()], event_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Replaces the cover and returns the previous cover path, if any.
    pub fn set_event_cover(&self, event_id: Uuid, cover_path: &str) -> Result<Option<String>> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let previous: Option<String> = tx
                .query_row(
                    "SELECT cover_path FROM events WHERE id = ?1",
                    [event_id.to_string()],
                    |row| row.get(0),
                )
                .optional()?
                .flatten();
            tx.execute(
                "UPDATE events SET cover_path = ?1 WHERE id = ?2",
                (cover_path, event_id.to_string()),
            )?;
            tx.commit()?;
            Ok(previous)
        })
    }

    // -- Guests --

    pub fn insert_guest(&self, guest: &Guest) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO guests (id, event_id, display_name, photo_quota, photos_remaining, has_unlocked_feed, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                rusqlite::params![
                    guest.id.to_string(),
                    guest.event_id.to_string(),
                    &guest.display_name,
                    guest.entitlement.photo_quota,
                    guest.entitlement.photos_remaining,
                    guest.entitlement.has_unlocked_feed,
                    encode_ts(&guest.created_at),
                ],
            )?;
            Ok(())
        })
    }

    pub fn get_guest(&self, id: Uuid) -> Result<Option<Guest>> {
        self.with_conn(|conn| query_guest(conn, id))
    }

    /// Guests of an event in join order, each with their uploaded photo count.
    pub fn list_guests_with_counts(&self, event_id: Uuid) -> Result<Vec<(Guest, u32)>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {GUEST_COLUMNS}, COUNT(p.id)
                 FROM guests g
                 LEFT JOIN photos p ON p.guest_id = g.id
                 WHERE g.event_id = ?1
                 GROUP BY g.id
                 ORDER BY g.created_at"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([event_id.to_string()], |row| {
                    Ok((guest_from_row(row)?, row.get::<_, u32>(7)?))
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    // -- Photos --

    pub fn get_photo(&self, id: Uuid) -> Result<Option<Photo>> {
        self.with_conn(|conn| query_photo(conn, id))
    }

    /// Newest first, ordered by `(created_at, id)` so that the cursor from
    /// the last photo of a page resumes exactly after it.
    pub fn list_photos(
        &self,
        event_id: Uuid,
        limit: u32,
        before: Option<FeedCursor>,
    ) -> Result<Vec<Photo>> {
        let cursor_ts = before.as_ref().map(|c| encode_ts(&c.created_at));
        let cursor_id = before.and_then(|c| c.id).map(|id| id.to_string());
        self.with_conn(|conn| {
            let sql = format!(
                "{PHOTO_SELECT}
                 WHERE p.event_id = ?1
                   AND (?2 IS NULL OR p.created_at < ?2 OR (p.created_at = ?2 AND p.id < ?3))
                 ORDER BY p.created_at DESC, p.id DESC
                 LIMIT ?4"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(
                    rusqlite::params![event_id.to_string(), cursor_ts, cursor_id, limit],
                    photo_from_row,
                )?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn count_photos(&self, event_id: Uuid) -> Result<u32> {
        self.with_conn(|conn| {
            Ok(conn.query_row(
                "SELECT COUNT(*) FROM photos WHERE event_id = ?1",
                [event_id.to_string()],
                |row| row.get(0),
            )?)
        })
    }

    /// Every blob path the database still references: photos and covers.
    pub fn referenced_storage_paths(&self) -> Result<HashSet<String>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT storage_path FROM photos
                 UNION
                 SELECT cover_path FROM events WHERE cover_path IS NOT NULL",
            )?;
            let paths = stmt
                .query_map([], |row| row.get::<_, String>(0))?
                .collect::<std::result::Result<HashSet<_>, _>>()?;
            Ok(paths)
        })
    }

    // -- Access --

    pub fn access(&self, principal: &Principal, event_id: Uuid) -> Result<Access> {
        self.with_conn(|conn| match *principal {
            Principal::Couple { couple_id } => {
                let owned = conn
                    .query_row(
                        "SELECT 1 FROM events WHERE id = ?1 AND couple_id = ?2",
                        (event_id.to_string(), couple_id.to_string()),
                        |_| Ok(()),
                    )
                    .optional()?;
                Ok(if owned.is_some() { Access::Owner } else { Access::Denied })
            }
            Principal::Guest {
                guest_id,
                event_id: guest_event,
            } => {
                if guest_event != event_id {
                    return Ok(Access::Denied);
                }
                let unlocked: Option<bool> = conn
                    .query_row(
                        "SELECT has_unlocked_feed FROM guests WHERE id = ?1 AND event_id = ?2",
                        (guest_id.to_string(), event_id.to_string()),
                        |row| row.get(0),
                    )
                    .optional()?;
                Ok(unlocked.map_or(Access::Denied, |unlocked| Access::Guest { unlocked }))
            }
        })
    }
}

pub(crate) fn query_guest(conn: &Connection, id: Uuid) -> Result<Option<Guest>> {
    let sql = format!("SELECT {GUEST_COLUMNS} FROM guests g WHERE g.id = ?1");
    Ok(conn
        .query_row(&sql, [id.to_string()], guest_from_row)
        .optional()?)
}

pub(crate) fn query_photo(conn: &Connection, id: Uuid) -> Result<Option<Photo>> {
    let sql = format!("{PHOTO_SELECT} WHERE p.id = ?1");
    Ok(conn
        .query_row(&sql, [id.to_string()], photo_from_row)
        .optional()?)
}

fn event_from_row(row: &Row) -> rusqlite::Result<WeddingEvent> {
    Ok(WeddingEvent {
        id: uuid_col(row, 0)?,
        couple_id: uuid_col(row, 1)?,
        partner_one: row.get(2)?,
        partner_two: row.get(3)?,
        event_date: date_col(row, 4)?,
        code: row.get(5)?,
        cover_path: row.get(6)?,
        guest_quota: row.get(7)?,
        created_at: ts_col(row, 8)?,
    })
}

fn guest_from_row(row: &Row) -> rusqlite::Result<Guest> {
    Ok(Guest {
        id: uuid_col(row, 0)?,
        event_id: uuid_col(row, 1)?,
        display_name: row.get(2)?,
        entitlement: Entitlement {
            photo_quota: row.get(3)?,
            photos_remaining: row.get(4)?,
            has_unlocked_feed: row.get(5)?,
        },
        created_at: ts_col(row, 6)?,
    })
}

fn photo_from_row(row: &Row) -> rusqlite::Result<Photo> {
    Ok(Photo {
        id: uuid_col(row, 0)?,
        event_id: uuid_col(row, 1)?,
        guest_id: uuid_col(row, 2)?,
        guest_display_name: row.get(3)?,
        storage_path: row.get(4)?,
        sha256: row.get(5)?,
        caption: row.get(6)?,
        captured_at: ts_col(row, 7)?,
        created_at: ts_col(row, 8)?,
    })
}

fn uuid_col(row: &Row, idx: usize) -> rusqlite::Result<Uuid> {
    let raw: String = row.get(idx)?;
    raw.parse()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn ts_col(row: &Row, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn date_col(row: &Row, idx: usize) -> rusqlite::Result<NaiveDate> {
    let raw: String = row.get(idx)?;
    NaiveDate::parse_from_str(&raw, "%Y-%m-%d")
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}

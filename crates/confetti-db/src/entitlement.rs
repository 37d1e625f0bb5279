//! Write paths that touch a guest's allowance. Each runs in one IMMEDIATE
//! transaction, so the check against `photos_remaining` and the update that
//! follows it cannot interleave with another writer.

use anyhow::Result;
use chrono::SubsecRound;
use rusqlite::{OptionalExtension, Transaction, TransactionBehavior};
use tracing::debug;
use uuid::Uuid;

use confetti_types::entitlement::Entitlement;
use confetti_types::models::Photo;

use crate::models::{CaptionOutcome, DeleteOutcome, NewPhoto, UploadOutcome};
use crate::queries::{query_guest, query_photo};
use crate::{Database, encode_ts, now};

impl Database {
    /// Consume one unit of the guest's quota and insert the photo row.
    /// Nothing is written unless both succeed.
    pub fn record_upload(&self, new: &NewPhoto) -> Result<UploadOutcome> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            let Some(guest) = query_guest(&tx, new.guest_id)? else {
                return Ok(UploadOutcome::UnknownGuest);
            };
            if guest.event_id != new.event_id {
                return Ok(UploadOutcome::UnknownGuest);
            }
            let Ok(entitlement) = guest.entitlement.consume() else {
                return Ok(UploadOutcome::QuotaExhausted);
            };

            write_entitlement(&tx, new.guest_id, &entitlement)?;

            let created_at = now();
            let captured_at = new.captured_at.trunc_subsecs(6);
            tx.execute(
                "INSERT INTO photos (id, event_id, guest_id, storage_path, sha256, caption, captured_at, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                rusqlite::params![
                    new.id.to_string(),
                    new.event_id.to_string(),
                    new.guest_id.to_string(),
                    &new.storage_path,
                    &new.sha256,
                    &new.caption,
                    encode_ts(&captured_at),
                    encode_ts(&created_at),
                ],
            )?;
            tx.commit()?;

            debug!(
                "Guest {} uploaded photo {} ({} remaining)",
                new.guest_id, new.id, entitlement.photos_remaining
            );

            Ok(UploadOutcome::Recorded {
                photo: Photo {
                    id: new.id,
                    event_id: new.event_id,
                    guest_id: new.guest_id,
                    guest_display_name: guest.display_name,
                    storage_path: new.storage_path.clone(),
                    sha256: new.sha256.clone(),
                    caption: new.caption.clone(),
                    captured_at,
                    created_at,
                },
                entitlement,
            })
        })
    }

    /// Remove the caller's photo row and give one unit of quota back.
    /// The blob itself is the caller's to delete.
    pub fn delete_photo(&self, photo_id: Uuid, guest_id: Uuid) -> Result<DeleteOutcome> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            let Some(photo) = query_photo(&tx, photo_id)? else {
                return Ok(DeleteOutcome::NotFound);
            };
            if photo.guest_id != guest_id {
                return Ok(DeleteOutcome::NotOwner);
            }
            let Some(guest) = query_guest(&tx, guest_id)? else {
                return Ok(DeleteOutcome::NotOwner);
            };

            tx.execute("DELETE FROM photos WHERE id = ?1", [photo_id.to_string()])?;
            let entitlement = guest.entitlement.restore();
            write_entitlement(&tx, guest_id, &entitlement)?;
            tx.commit()?;

            Ok(DeleteOutcome::Deleted { photo, entitlement })
        })
    }

    /// Set or clear the caption of the caller's photo. `caption` must already
    /// be validated.
    pub fn update_caption(
        &self,
        photo_id: Uuid,
        guest_id: Uuid,
        caption: Option<&str>,
    ) -> Result<CaptionOutcome> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            let owner: Option<String> = tx
                .query_row(
                    "SELECT guest_id FROM photos WHERE id = ?1",
                    [photo_id.to_string()],
                    |row| row.get(0),
                )
                .optional()?;
            match owner {
                None => return Ok(CaptionOutcome::NotFound),
                Some(owner) if owner != guest_id.to_string() => {
                    return Ok(CaptionOutcome::NotOwner);
                }
                Some(_) => {}
            }

            tx.execute(
                "UPDATE photos SET caption = ?1 WHERE id = ?2",
                (caption, photo_id.to_string()),
            )?;
            let photo = query_photo(&tx, photo_id)?
                .ok_or_else(|| anyhow::anyhow!("Photo {} vanished mid-transaction", photo_id))?;
            tx.commit()?;

            Ok(CaptionOutcome::Updated(photo))
        })
    }
}

fn write_entitlement(tx: &Transaction<'_>, guest_id: Uuid, entitlement: &Entitlement) -> Result<()> {
    tx.execute(
        "UPDATE guests SET photos_remaining = ?1, has_unlocked_feed = ?2 WHERE id = ?3",
        rusqlite::params![
            entitlement.photos_remaining,
            entitlement.has_unlocked_feed,
            guest_id.to_string(),
        ],
    )?;
    Ok(())
}

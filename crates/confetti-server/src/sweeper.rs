use std::sync::Arc;
use std::time::{Duration, SystemTime};

use tracing::{info, warn};

use confetti_db::Database;
use confetti_storage::PhotoStore;

use confetti_api::AppState;

/// Blobs younger than this are never swept: an upload writes its blob before
/// committing the row that references it.
pub const MIN_ORPHAN_AGE: Duration = Duration::from_secs(60 * 60);

/// Background task that deletes blobs no photo or cover references.
pub async fn run_sweep_loop(state: AppState, interval_secs: u64) {
    let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));

    loop {
        interval.tick().await;

        match sweep_orphans(state.db.clone(), &state.store, MIN_ORPHAN_AGE).await {
            Ok(count) => {
                if count > 0 {
                    info!("Sweep: removed {} orphaned blobs", count);
                }
            }
            Err(e) => {
                warn!("Sweep error: {:#}", e);
            }
        }
    }
}

pub async fn sweep_orphans(
    db: Arc<Database>,
    store: &PhotoStore,
    min_age: Duration,
) -> anyhow::Result<usize> {
    // List first: anything written after the listing is out of reach, and
    // anything listed but committed since is caught by the age check.
    let blobs = store.list_blobs().await?;
    let referenced = tokio::task::spawn_blocking(move || db.referenced_storage_paths()).await??;

    let now = SystemTime::now();
    let mut removed = 0;
    for blob in blobs {
        if referenced.contains(&blob.path) {
            continue;
        }
        let age = now.duration_since(blob.modified).unwrap_or_default();
        if age < min_age {
            continue;
        }
        match store.delete(&blob.path).await {
            Ok(()) => removed += 1,
            Err(e) => warn!("Failed to sweep {}: {}", blob.path, e),
        }
    }

    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Utc};
    use uuid::Uuid;

    use confetti_types::models::{Couple, WeddingEvent};

    async fn setup() -> (tempfile::TempDir, Arc<Database>, PhotoStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = PhotoStore::new(dir.path().join("media")).await.unwrap();
        let db = Arc::new(Database::open_in_memory().unwrap());
        (dir, db, store)
    }

    fn event_with_cover(db: &Database, cover: &str) {
        let couple = Couple {
            id: Uuid::new_v4(),
            email: "ana@example.com".into(),
            display_name: "Ana & Ben".into(),
            created_at: Utc::now(),
        };
        assert!(db.create_couple(&couple, "hash").unwrap());
        let event = WeddingEvent {
            id: Uuid::new_v4(),
            couple_id: couple.id,
            partner_one: "Ana".into(),
            partner_two: "Ben".into(),
            event_date: NaiveDate::from_ymd_opt(2026, 6, 20).unwrap(),
            code: "ABC234".into(),
            cover_path: None,
            guest_quota: 10,
            created_at: Utc::now(),
        };
        assert!(db.insert_event(&event).unwrap());
        db.set_event_cover(event.id, cover).unwrap();
    }

    #[tokio::test]
    async fn removes_only_unreferenced_blobs() {
        let (_dir, db, store) = setup().await;
        store.put("e/cover-1.jpg", b"cover").await.unwrap();
        store.put("e/g/orphan.jpg", b"orphan").await.unwrap();
        event_with_cover(&db, "e/cover-1.jpg");

        let removed = sweep_orphans(db, &store, Duration::ZERO).await.unwrap();
        assert_eq!(removed, 1);
        assert!(store.read("e/cover-1.jpg").await.unwrap().is_some());
        assert!(store.read("e/g/orphan.jpg").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn fresh_orphans_survive_the_grace_period() {
        let (_dir, db, store) = setup().await;
        store.put("e/g/in-flight.jpg", b"bytes").await.unwrap();

        let removed = sweep_orphans(db, &store, MIN_ORPHAN_AGE).await.unwrap();
        assert_eq!(removed, 0);
        assert!(store.read("e/g/in-flight.jpg").await.unwrap().is_some());
    }
}

use std::sync::Arc;

use axum::{
    Router,
    body::{Body, Bytes},
    http::{HeaderMap, Method, Request, StatusCode, header},
};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tempfile::TempDir;
use tower::ServiceExt;

use confetti_api::{AppState, AppStateInner, router};
use confetti_db::Database;
use confetti_gateway::dispatcher::Dispatcher;
use confetti_storage::{PhotoStore, UrlSigner};

const BASE_URL: &str = "http://localhost:3000";
const JPEG: &[u8] = b"\xff\xd8\xff\xe0not-really-a-jpeg";

struct TestApp {
    app: Router,
    state: AppState,
    _media: TempDir,
}

impl TestApp {
    async fn new() -> Self {
        Self::with_default_quota(10).await
    }

    async fn with_default_quota(default_guest_quota: u32) -> Self {
        let media = TempDir::new().unwrap();
        let store = PhotoStore::new(media.path().to_path_buf()).await.unwrap();
        let state: AppState = Arc::new(AppStateInner {
            db: Arc::new(Database::open_in_memory().unwrap()),
            store,
            signer: UrlSigner::new(b"test-signing-secret", BASE_URL, 3600).unwrap(),
            dispatcher: Dispatcher::new(),
            jwt_secret: "test-jwt-secret".into(),
            default_guest_quota,
            max_upload_bytes: 1024,
        });
        Self {
            app: router(state.clone()),
            state,
            _media: media,
        }
    }

    async fn raw(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Body,
        content_type: &str,
    ) -> (StatusCode, HeaderMap, Bytes) {
        let mut req = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, content_type);
        if let Some(token) = token {
            req = req.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let resp = self
            .app
            .clone()
            .oneshot(req.body(body).unwrap())
            .await
            .unwrap();
        let status = resp.status();
        let headers = resp.headers().clone();
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        (status, headers, bytes)
    }

    async fn json(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let body = body.map_or_else(Body::empty, |v| Body::from(v.to_string()));
        let (status, _, bytes) = self
            .raw(method, uri, token, body, "application/json")
            .await;
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, value)
    }

    async fn upload(&self, token: &str, event_id: &str, query: &str) -> (StatusCode, Value) {
        let uri = format!("/events/{}/photos?{}", event_id, query);
        let (status, _, bytes) = self
            .raw(Method::POST, &uri, Some(token), Body::from(JPEG), "image/jpeg")
            .await;
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    /// Registers a couple and creates one event. Returns (couple token, event).
    async fn couple_with_event(&self, quota: Option<u32>) -> (String, Value) {
        let (status, reg) = self
            .json(
                Method::POST,
                "/auth/register",
                None,
                Some(json!({
                    "email": "Ana.Ben@Example.com",
                    "password": "correct horse",
                    "display_name": "Ana & Ben",
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{reg}");
        let token = reg["token"].as_str().unwrap().to_string();

        let mut body = json!({
            "partner_one": "Ana",
            "partner_two": "Ben",
            "event_date": "2026-06-20",
        });
        if let Some(quota) = quota {
            body["guest_quota"] = json!(quota);
        }
        let (status, event) = self
            .json(Method::POST, "/events", Some(&token), Some(body))
            .await;
        assert_eq!(status, StatusCode::CREATED, "{event}");
        (token, event)
    }

    /// Joins by code. Returns (guest token, guest).
    async fn join(&self, code: &str, name: &str) -> (String, Value) {
        let (status, joined) = self
            .json(
                Method::POST,
                &format!("/events/code/{}/guests", code),
                None,
                Some(json!({ "display_name": name })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{joined}");
        (
            joined["token"].as_str().unwrap().to_string(),
            joined["guest"].clone(),
        )
    }
}

fn media_uri(url: &str) -> &str {
    url.strip_prefix(BASE_URL).unwrap()
}

#[tokio::test]
async fn health_is_public() {
    let app = TestApp::new().await;
    let (status, _, body) = app
        .raw(Method::GET, "/health", None, Body::empty(), "text/plain")
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(&body[..], b"ok");
}

#[tokio::test]
async fn protected_routes_require_a_token() {
    let app = TestApp::new().await;
    let (status, body) = app.json(Method::GET, "/events", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "unauthorized");

    let (status, _) = app
        .json(Method::GET, "/events", Some("not-a-jwt"), None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn couples_log_in_with_normalized_email() {
    let app = TestApp::new().await;
    app.couple_with_event(None).await;

    let (status, login) = app
        .json(
            Method::POST,
            "/auth/login",
            None,
            Some(json!({ "email": " ana.ben@example.COM", "password": "correct horse" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(login["display_name"], "Ana & Ben");

    let (status, _) = app
        .json(
            Method::POST,
            "/auth/login",
            None,
            Some(json!({ "email": "ana.ben@example.com", "password": "wrong password" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, dup) = app
        .json(
            Method::POST,
            "/auth/register",
            None,
            Some(json!({
                "email": "ana.ben@example.com",
                "password": "another one",
                "display_name": "Imposter",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(dup["error"], "conflict");
}

#[tokio::test]
async fn events_get_a_code_and_the_deployment_default_quota() {
    let app = TestApp::with_default_quota(7).await;
    let (token, event) = app.couple_with_event(None).await;

    assert_eq!(event["guest_quota"], 7);
    let code = event["code"].as_str().unwrap();
    assert_eq!(code.len(), 6);

    let (status, found) = app
        .json(
            Method::GET,
            &format!("/events/code/{}", code.to_lowercase()),
            None,
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(found["id"], event["id"]);

    let (status, list) = app.json(Method::GET, "/events", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list.as_array().unwrap().len(), 1);

    let (status, body) = app
        .json(
            Method::POST,
            "/events",
            Some(&token),
            Some(json!({
                "partner_one": "Ana",
                "partner_two": "Ben",
                "event_date": "20 June",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "validation");
}

#[tokio::test]
async fn unknown_event_code_is_not_found() {
    let app = TestApp::new().await;
    let (status, body) = app
        .json(Method::GET, "/events/code/ZZZZZZ", None, None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");
}

#[tokio::test]
async fn first_upload_unlocks_the_feed_and_delete_restores_the_slot() {
    let app = TestApp::new().await;
    let (couple_token, event) = app.couple_with_event(None).await;
    let event_id = event["id"].as_str().unwrap();
    let (guest_token, guest) = app.join(event["code"].as_str().unwrap(), "Sam").await;

    assert_eq!(guest["photo_quota"], 10);
    assert_eq!(guest["photos_remaining"], 10);
    assert_eq!(guest["has_unlocked_feed"], false);

    // Locked until the first upload; the couple is never locked.
    let feed_uri = format!("/events/{}/photos", event_id);
    let (status, body) = app
        .json(Method::GET, &feed_uri, Some(&guest_token), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "feed_locked");
    let (status, body) = app
        .json(Method::GET, &feed_uri, Some(&couple_token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 0);

    let (status, uploaded) = app
        .upload(&guest_token, event_id, "file_name=cake.JPG&caption=%20First%20dance%20")
        .await;
    assert_eq!(status, StatusCode::CREATED, "{uploaded}");
    assert_eq!(uploaded["entitlement"]["photos_remaining"], 9);
    assert_eq!(uploaded["entitlement"]["has_unlocked_feed"], true);
    assert_eq!(uploaded["photo"]["caption"], "First dance");
    assert_eq!(uploaded["photo"]["guest_display_name"], "Sam");

    let (status, feed) = app
        .json(Method::GET, &feed_uri, Some(&guest_token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(feed.as_array().unwrap().len(), 1);

    let photo_id = uploaded["photo"]["id"].as_str().unwrap();
    let (status, deleted) = app
        .json(
            Method::DELETE,
            &format!("/photos/{}", photo_id),
            Some(&guest_token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(deleted["entitlement"]["photos_remaining"], 10);
    // Sticky: deleting the only photo does not re-lock the feed.
    assert_eq!(deleted["entitlement"]["has_unlocked_feed"], true);

    let (status, feed) = app
        .json(Method::GET, &feed_uri, Some(&guest_token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(feed.as_array().unwrap().len(), 0);

    let (_, me) = app.json(Method::GET, "/guests/me", Some(&guest_token), None).await;
    assert_eq!(me["photos_remaining"], 10);
    assert_eq!(me["has_unlocked_feed"], true);
}

#[tokio::test]
async fn uploads_stop_at_the_quota() {
    let app = TestApp::new().await;
    let (_, event) = app.couple_with_event(Some(2)).await;
    let event_id = event["id"].as_str().unwrap();
    let (guest_token, _) = app.join(event["code"].as_str().unwrap(), "Sam").await;

    let (status, first) = app.upload(&guest_token, event_id, "file_name=a.jpg").await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, _) = app.upload(&guest_token, event_id, "file_name=b.png").await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = app.upload(&guest_token, event_id, "file_name=c.jpg").await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "quota_exhausted");

    let photo_id = first["photo"]["id"].as_str().unwrap();
    let (status, _) = app
        .json(
            Method::DELETE,
            &format!("/photos/{}", photo_id),
            Some(&guest_token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app.upload(&guest_token, event_id, "file_name=c.jpg").await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["entitlement"]["photos_remaining"], 0);
}

#[tokio::test]
async fn concurrent_uploads_never_overspend_the_quota() {
    let app = TestApp::new().await;
    let (_, event) = app.couple_with_event(Some(3)).await;
    let event_id = event["id"].as_str().unwrap().to_string();
    let (guest_token, _) = app.join(event["code"].as_str().unwrap(), "Sam").await;

    let mut handles = Vec::new();
    for i in 0..6 {
        let router = app.app.clone();
        let uri = format!("/events/{}/photos?file_name=burst-{}.jpg", event_id, i);
        let auth = format!("Bearer {}", guest_token);
        handles.push(tokio::spawn(async move {
            let req = Request::builder()
                .method(Method::POST)
                .uri(uri)
                .header(header::AUTHORIZATION, auth)
                .body(Body::from(JPEG))
                .unwrap();
            router.oneshot(req).await.unwrap().status()
        }));
    }

    let mut created = 0;
    for handle in handles {
        match handle.await.unwrap() {
            StatusCode::CREATED => created += 1,
            StatusCode::CONFLICT => {}
            other => panic!("unexpected status {other}"),
        }
    }
    assert_eq!(created, 3);

    let (_, me) = app.json(Method::GET, "/guests/me", Some(&guest_token), None).await;
    assert_eq!(me["photos_remaining"], 0);
}

#[tokio::test]
async fn upload_rejects_bad_input() {
    let app = TestApp::new().await;
    let (couple_token, event) = app.couple_with_event(None).await;
    let event_id = event["id"].as_str().unwrap();
    let (guest_token, _) = app.join(event["code"].as_str().unwrap(), "Sam").await;
    let uri = format!("/events/{}/photos?file_name=a.jpg", event_id);

    let (status, _, _) = app
        .raw(Method::POST, &uri, Some(&guest_token), Body::empty(), "image/jpeg")
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _, _) = app
        .raw(
            Method::POST,
            &uri,
            Some(&guest_token),
            Body::from(vec![0u8; 4096]),
            "image/jpeg",
        )
        .await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);

    let (status, body) = app.upload(&guest_token, event_id, "file_name=notes.txt").await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "validation");

    let long_caption = "a".repeat(151);
    let (status, _) = app
        .upload(
            &guest_token,
            event_id,
            &format!("file_name=a.jpg&caption={}", long_caption),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    // Couples watch; they do not upload.
    let (status, _) = app.upload(&couple_token, event_id, "file_name=a.jpg").await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Nothing above spent any allowance.
    let (_, me) = app.json(Method::GET, "/guests/me", Some(&guest_token), None).await;
    assert_eq!(me["photos_remaining"], 10);
    assert_eq!(me["has_unlocked_feed"], false);
}

#[tokio::test]
async fn only_the_uploader_edits_or_deletes() {
    let app = TestApp::new().await;
    let (_, event) = app.couple_with_event(None).await;
    let event_id = event["id"].as_str().unwrap();
    let code = event["code"].as_str().unwrap();
    let (sam, _) = app.join(code, "Sam").await;
    let (kim, _) = app.join(code, "Kim").await;

    let (_, uploaded) = app.upload(&sam, event_id, "file_name=a.jpg").await;
    let photo_uri = format!("/photos/{}", uploaded["photo"]["id"].as_str().unwrap());

    let (status, _) = app
        .json(Method::DELETE, &photo_uri, Some(&kim), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = app
        .json(
            Method::PATCH,
            &photo_uri,
            Some(&kim),
            Some(json!({ "caption": "mine now" })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, photo) = app
        .json(
            Method::PATCH,
            &photo_uri,
            Some(&sam),
            Some(json!({ "caption": "  The toast  " })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(photo["caption"], "The toast");

    let (status, photo) = app
        .json(Method::PATCH, &photo_uri, Some(&sam), Some(json!({ "caption": null })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(photo["caption"], Value::Null);

    let (status, _) = app
        .json(Method::PATCH, &photo_uri, Some(&sam), Some(json!({ "caption": "   " })))
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn guests_cannot_read_other_events() {
    let app = TestApp::new().await;
    let (couple_token, event) = app.couple_with_event(None).await;

    let (status, other) = app
        .json(
            Method::POST,
            "/events",
            Some(&couple_token),
            Some(json!({ "partner_one": "Cy", "partner_two": "Di", "event_date": "2026-09-12" })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (guest_token, _) = app.join(event["code"].as_str().unwrap(), "Sam").await;
    let other_id = other["id"].as_str().unwrap();

    let (status, _) = app
        .json(Method::GET, &format!("/events/{}", other_id), Some(&guest_token), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app.upload(&guest_token, other_id, "file_name=a.jpg").await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app
        .json(
            Method::GET,
            &format!("/events/{}/photos", other_id),
            Some(&guest_token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "forbidden");
}

#[tokio::test]
async fn signed_media_urls_serve_the_blob_and_reject_tampering() {
    let app = TestApp::new().await;
    let (_, event) = app.couple_with_event(None).await;
    let event_id = event["id"].as_str().unwrap();
    let (guest_token, _) = app.join(event["code"].as_str().unwrap(), "Sam").await;

    let (_, uploaded) = app.upload(&guest_token, event_id, "file_name=a.jpeg").await;
    let url = uploaded["photo"]["url"].as_str().unwrap();

    let (status, headers, body) = app
        .raw(Method::GET, media_uri(url), None, Body::empty(), "text/plain")
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(&body[..], JPEG);
    assert_eq!(headers[header::CONTENT_TYPE], "image/jpeg");
    assert!(headers.contains_key(header::ETAG));

    let tampered = media_uri(url).replace("expires=", "expires=1");
    let (status, _, _) = app
        .raw(Method::GET, &tampered, None, Body::empty(), "text/plain")
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn dashboard_summarizes_guests_and_photos() {
    let app = TestApp::new().await;
    let (couple_token, event) = app.couple_with_event(None).await;
    let event_id = event["id"].as_str().unwrap();
    let code = event["code"].as_str().unwrap();
    let (sam, _) = app.join(code, "Sam").await;
    app.join(code, "Kim").await;

    app.upload(&sam, event_id, "file_name=a.jpg").await;
    app.upload(&sam, event_id, "file_name=b.jpg").await;

    let dashboard_uri = format!("/events/{}/dashboard", event_id);
    let (status, dash) = app
        .json(Method::GET, &dashboard_uri, Some(&couple_token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(dash["guest_count"], 2);
    assert_eq!(dash["unlocked_guest_count"], 1);
    assert_eq!(dash["photo_count"], 2);

    let sam_row = dash["guests"]
        .as_array()
        .unwrap()
        .iter()
        .find(|g| g["display_name"] == "Sam")
        .unwrap();
    assert_eq!(sam_row["photos_uploaded"], 2);
    assert_eq!(sam_row["photos_remaining"], 8);

    let (status, _) = app.json(Method::GET, &dashboard_uri, Some(&sam), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn uploads_are_published_to_the_event_feed() {
    let app = TestApp::new().await;
    let (_, event) = app.couple_with_event(None).await;
    let event_id = event["id"].as_str().unwrap();
    let (guest_token, _) = app.join(event["code"].as_str().unwrap(), "Sam").await;

    let mut feed = app.state.dispatcher.subscribe();
    let (status, uploaded) = app.upload(&guest_token, event_id, "file_name=a.jpg").await;
    assert_eq!(status, StatusCode::CREATED);

    let msg = feed.recv().await.unwrap();
    assert_eq!(msg.event_id.to_string(), event_id);
    let published: Value = serde_json::from_str(&msg.json).unwrap();
    assert_eq!(published["type"], "PhotoCreate");
    assert_eq!(published["data"]["photo"]["id"], uploaded["photo"]["id"]);
}

#[tokio::test]
async fn cover_is_owner_only_and_replaces_the_previous_image() {
    let app = TestApp::new().await;
    let (couple_token, event) = app.couple_with_event(None).await;
    let event_id = event["id"].as_str().unwrap();
    assert!(event["cover_url"].is_null());
    let cover_uri = |name: &str| format!("/events/{}/cover?file_name={}", event_id, name);

    let (status, _, body) = app
        .raw(
            Method::PUT,
            &cover_uri("venue.jpg"),
            Some(&couple_token),
            Body::from(JPEG),
            "image/jpeg",
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let first: Value = serde_json::from_slice(&body).unwrap();
    let first_url = first["cover_url"].as_str().unwrap().to_string();

    let (status, _, served) = app
        .raw(Method::GET, media_uri(&first_url), None, Body::empty(), "text/plain")
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(&served[..], JPEG);

    let (status, _, body) = app
        .raw(
            Method::PUT,
            &cover_uri("rings.png"),
            Some(&couple_token),
            Body::from(JPEG),
            "image/png",
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let second: Value = serde_json::from_slice(&body).unwrap();
    let second_url = second["cover_url"].as_str().unwrap();
    assert_ne!(second_url, first_url);

    // The old link is still correctly signed, but its blob is gone.
    let (status, _, _) = app
        .raw(Method::GET, media_uri(&first_url), None, Body::empty(), "text/plain")
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _, _) = app
        .raw(Method::GET, media_uri(second_url), None, Body::empty(), "text/plain")
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _, body) = app
        .raw(
            Method::PUT,
            &cover_uri("venue.bmp"),
            Some(&couple_token),
            Body::from(JPEG),
            "image/bmp",
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body["error"], "validation");

    let (guest_token, _) = app.join(event["code"].as_str().unwrap(), "Sam").await;
    let (status, _, _) = app
        .raw(
            Method::PUT,
            &cover_uri("sneaky.jpg"),
            Some(&guest_token),
            Body::from(JPEG),
            "image/jpeg",
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, other) = app
        .json(
            Method::POST,
            "/auth/register",
            None,
            Some(json!({
                "email": "cy@example.com",
                "password": "another horse",
                "display_name": "Cy",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, _, _) = app
        .raw(
            Method::PUT,
            &cover_uri("sneaky.jpg"),
            Some(other["token"].as_str().unwrap()),
            Body::from(JPEG),
            "image/jpeg",
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (_, current) = app
        .json(Method::GET, &format!("/events/{}", event_id), Some(&couple_token), None)
        .await;
    let unsigned = |url: &str| url.split('?').next().unwrap().to_string();
    assert_eq!(
        unsigned(current["cover_url"].as_str().unwrap()),
        unsigned(second_url)
    );
}

#[tokio::test]
async fn deleted_photo_links_stop_serving() {
    let app = TestApp::new().await;
    let (_, event) = app.couple_with_event(None).await;
    let event_id = event["id"].as_str().unwrap();
    let (guest_token, _) = app.join(event["code"].as_str().unwrap(), "Sam").await;

    let (_, uploaded) = app.upload(&guest_token, event_id, "file_name=a.jpg").await;
    let url = uploaded["photo"]["url"].as_str().unwrap();
    let photo_id = uploaded["photo"]["id"].as_str().unwrap();

    let (status, _) = app
        .json(
            Method::DELETE,
            &format!("/photos/{}", photo_id),
            Some(&guest_token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _, body) = app
        .raw(Method::GET, media_uri(url), None, Body::empty(), "text/plain")
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body["error"], "not_found");
}

#[tokio::test]
async fn join_accepts_lowercase_and_padded_codes() {
    let app = TestApp::new().await;
    let (_, event) = app.couple_with_event(None).await;
    let code = event["code"].as_str().unwrap();

    let (_, guest) = app
        .join(&format!("%20{}%20", code.to_lowercase()), "Sam")
        .await;
    assert_eq!(guest["event_id"], event["id"]);
    assert_eq!(guest["photos_remaining"], 10);
}

#[tokio::test]
async fn feed_pages_resume_within_equal_timestamps() {
    let app = TestApp::new().await;
    let (couple_token, event) = app.couple_with_event(None).await;
    let event_id = event["id"].as_str().unwrap();
    let (guest_token, _) = app.join(event["code"].as_str().unwrap(), "Sam").await;

    for name in ["a.jpg", "b.jpg", "c.jpg"] {
        let (status, _) = app.upload(&guest_token, event_id, &format!("file_name={name}")).await;
        assert_eq!(status, StatusCode::CREATED);
    }
    app.state
        .db
        .with_conn(|conn| {
            conn.execute(
                "UPDATE photos SET created_at = '2026-06-20T18:00:00.000000Z'",
                [],
            )?;
            Ok(())
        })
        .unwrap();

    let mut seen = Vec::new();
    let mut uri = format!("/events/{}/photos?limit=1", event_id);
    loop {
        let (status, page) = app.json(Method::GET, &uri, Some(&couple_token), None).await;
        assert_eq!(status, StatusCode::OK, "{page}");
        let Some(last) = page.as_array().unwrap().last() else {
            break;
        };
        seen.push(last["id"].as_str().unwrap().to_string());
        uri = format!(
            "/events/{}/photos?limit=1&before={}&before_id={}",
            event_id,
            last["created_at"].as_str().unwrap().replace('+', "%2B"),
            last["id"].as_str().unwrap(),
        );
    }
    assert_eq!(seen.len(), 3);
    let mut unique = seen.clone();
    unique.sort();
    unique.dedup();
    assert_eq!(unique.len(), 3);

    let (status, _) = app
        .json(
            Method::GET,
            &format!("/events/{}/photos?before_id={}", event_id, seen[0]),
            Some(&couple_token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

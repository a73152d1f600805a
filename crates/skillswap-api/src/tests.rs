use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;
use uuid::Uuid;

use skillswap_db::Database;
use skillswap_gateway::dispatcher::Dispatcher;
use skillswap_media::MediaStore;
use skillswap_types::events::GatewayEvent;

use crate::auth::{AppState, AppStateInner};

const SECRET: &str = "test-secret";

struct TestApp {
    router: Router,
    state: AppState,
}

struct User {
    id: String,
    token: String,
}

impl TestApp {
    async fn new() -> Self {
        let media_dir = std::env::temp_dir().join(format!("skillswap-api-{}", Uuid::new_v4()));
        let state: AppState = Arc::new(AppStateInner {
            db: Arc::new(Database::open_in_memory().unwrap()),
            media: MediaStore::new(media_dir).await.unwrap(),
            dispatcher: Dispatcher::new(),
            jwt_secret: SECRET.into(),
            public_url: "http://skills.test".into(),
        });
        Self {
            router: crate::router(state.clone()),
            state,
        }
    }

    async fn send(&self, req: Request<Body>) -> (StatusCode, Value) {
        let resp = self.router.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                Value::String(String::from_utf8_lossy(&bytes).into_owned())
            })
        };
        (status, body)
    }

    async fn call(&self, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let req = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        self.send(req).await
    }

    async fn register(&self, email: &str) -> User {
        let (status, body) = self
            .call(
                Method::POST,
                "/auth/register",
                None,
                Some(json!({ "email": email, "password": "correct horse" })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        User {
            id: body["user_id"].as_str().unwrap().to_string(),
            token: body["token"].as_str().unwrap().to_string(),
        }
    }

    async fn register_named(&self, email: &str, username: &str) -> User {
        let user = self.register(email).await;
        let (status, _) = self
            .call(Method::PUT, "/users/me", Some(&user.token), Some(json!({ "username": username })))
            .await;
        assert_eq!(status, StatusCode::OK);
        user
    }

    async fn upload(&self, user: &User, data: &[u8]) -> String {
        let (status, body) = self.call(Method::POST, "/uploads", Some(&user.token), None).await;
        assert_eq!(status, StatusCode::CREATED);
        let id = body["id"].as_str().unwrap().to_string();

        let req = Request::builder()
            .method(Method::PUT)
            .uri(format!("/uploads/{id}?offset=0"))
            .header(header::AUTHORIZATION, format!("Bearer {}", user.token))
            .body(Body::from(data.to_vec()))
            .unwrap();
        let (status, _) = self.send(req).await;
        assert_eq!(status, StatusCode::OK);
        id
    }

    async fn publish(&self, user: &User, name: &str, lectures: Value, published: bool) -> Value {
        let (status, body) = self
            .call(
                Method::POST,
                "/skills",
                Some(&user.token),
                Some(json!({
                    "name": name,
                    "description": "learn it",
                    "category": "music",
                    "lectures": lectures,
                    "published": published,
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body
    }

    async fn balance(&self, user: &User) -> i64 {
        let (_, body) = self.call(Method::GET, "/users/me/credits", Some(&user.token), None).await;
        body["balance"].as_i64().unwrap()
    }
}

fn video(url: &str) -> Value {
    json!({ "content": { "type": "video", "url": url } })
}

fn text(body: &str) -> Value {
    json!({ "content": { "type": "text", "body": body } })
}

// -- Auth --

#[tokio::test]
async fn register_login_and_account_info() {
    let app = TestApp::new().await;
    let user = app.register("Ana@Example.com").await;

    let (status, body) = app
        .call(
            Method::POST,
            "/auth/login",
            None,
            Some(json!({ "email": "ana@example.com", "password": "correct horse" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user_id"], user.id.as_str());

    let (status, body) = app.call(Method::GET, "/api/profile", Some(&user.token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "uid": user.id, "email": "ana@example.com" }));
}

#[tokio::test]
async fn auth_failures() {
    let app = TestApp::new().await;
    app.register("ana@example.com").await;

    let (status, _) = app
        .call(
            Method::POST,
            "/auth/login",
            None,
            Some(json!({ "email": "ana@example.com", "password": "wrong password" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = app
        .call(
            Method::POST,
            "/auth/register",
            None,
            Some(json!({ "email": "ana@example.com", "password": "another one" })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].as_str().unwrap().contains("already registered"));

    let (status, _) = app
        .call(
            Method::POST,
            "/auth/register",
            None,
            Some(json!({ "email": "leo@example.com", "password": "short" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app.call(Method::GET, "/api/profile", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body["error"].is_string());

    let (status, _) = app.call(Method::GET, "/api/profile", Some("not-a-jwt"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

// -- Profile --

#[tokio::test]
async fn profile_save_merges_fields() {
    let app = TestApp::new().await;
    let user = app.register("ana@example.com").await;

    let (_, body) = app.call(Method::GET, "/users/me", Some(&user.token), None).await;
    assert_eq!(body["has_profile"], false);

    app.call(Method::PUT, "/users/me", Some(&user.token), Some(json!({ "username": "ana" })))
        .await;
    let (status, body) = app
        .call(Method::PUT, "/users/me", Some(&user.token), Some(json!({ "bio": "I teach guitar" })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["username"], "ana");
    assert_eq!(body["bio"], "I teach guitar");
    assert_eq!(body["has_profile"], true);
    assert_eq!(body["credits"], 0);

    let (status, _) = app
        .call(Method::PUT, "/users/me", Some(&user.token), Some(json!({ "username": "a" })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn avatar_upload_sets_media_url() {
    let app = TestApp::new().await;
    let user = app.register("ana@example.com").await;

    let (status, body) = app
        .call(
            Method::POST,
            "/users/me/avatar",
            Some(&user.token),
            Some(json!({ "data_url": "data:image/png;base64,aGVsbG8=" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let avatar = body["avatar"].as_str().unwrap();
    assert!(avatar.starts_with("http://skills.test/media/avatars/"));

    let path = avatar.trim_start_matches("http://skills.test");
    let resp = app
        .router
        .clone()
        .oneshot(Request::builder().uri(path).body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers()[header::CONTENT_TYPE], "image/png");
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&bytes[..], b"hello");
}

#[tokio::test]
async fn conversation_partners_exclude_self_and_blank_profiles() {
    let app = TestApp::new().await;
    let me = app.register_named("me@example.com", "me_myself").await;
    let leo = app.register_named("leo@example.com", "leo").await;
    app.register("blank@example.com").await;

    let (status, body) = app.call(Method::GET, "/users", Some(&me.token), None).await;
    assert_eq!(status, StatusCode::OK);
    let users = body.as_array().unwrap();
    assert_eq!(users.len(), 1);
    assert_eq!(users[0]["id"], leo.id.as_str());
    assert!(users[0].get("email").is_none());
}

// -- Skills & credits --

#[tokio::test]
async fn publishing_with_a_recording_awards_credits() {
    let app = TestApp::new().await;
    let author = app.register("ana@example.com").await;
    let upload_id = app.upload(&author, b"webm-bytes").await;

    let mut events = app.state.dispatcher.subscribe();

    let lectures = json!([
        video("https://www.youtube.com/embed/abc"),
        text("Hold the pick loosely."),
        { "title": "Strumming", "content": { "type": "recording", "upload_id": upload_id } },
    ]);
    let body = app.publish(&author, "Acoustic Guitar", lectures, true).await;

    assert_eq!(body["credits_awarded"], 25);
    assert_eq!(body["skill"]["credits_required"], 25);
    assert_eq!(body["skill"]["lectures"][0]["title"], "Lecture 1");
    assert_eq!(body["skill"]["lectures"][2]["title"], "Strumming");
    let recorded = body["skill"]["lectures"][2]["content"]["url"].as_str().unwrap();
    assert_eq!(body["skill"]["lectures"][2]["content"]["type"], "video");
    assert!(recorded.ends_with("/lecture_3.webm"), "{recorded}");
    assert_eq!(app.balance(&author).await, 25);

    match events.recv().await.unwrap() {
        GatewayEvent::SkillPublished { skill } => assert_eq!(skill.name, "Acoustic Guitar"),
        other => panic!("unexpected event {other:?}"),
    }

    // The staged upload was consumed.
    let (status, _) = app
        .call(Method::GET, &format!("/uploads/{upload_id}"), Some(&author.token), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn drafts_earn_nothing_and_stay_private() {
    let app = TestApp::new().await;
    let author = app.register("ana@example.com").await;
    let other = app.register("leo@example.com").await;

    let body = app.publish(&author, "Secret Draft", json!([video("https://v/1")]), false).await;
    assert_eq!(body["credits_awarded"], 0);
    assert_eq!(body["skill"]["credits_required"], 5);
    assert_eq!(app.balance(&author).await, 0);

    let id = body["skill"]["id"].as_str().unwrap();
    let (status, _) = app.call(Method::GET, &format!("/skills/{id}"), Some(&other.token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = app.call(Method::GET, &format!("/skills/{id}"), Some(&author.token), None).await;
    assert_eq!(status, StatusCode::OK);

    let (_, listing) = app.call(Method::GET, "/skills", Some(&other.token), None).await;
    assert!(listing.as_array().unwrap().is_empty());
    let (_, mine) = app.call(Method::GET, "/skills/mine", Some(&author.token), None).await;
    assert_eq!(mine.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn credit_gate_reports_shortfall_without_spending() {
    let app = TestApp::new().await;
    let author = app.register("ana@example.com").await;
    let learner = app.register("leo@example.com").await;

    // learner earns 5 by publishing one lecture
    app.publish(&learner, "Knots", json!([text("bowline")]), true).await;
    assert_eq!(app.balance(&learner).await, 5);

    let body = app
        .publish(&author, "Guitar", json!([video("https://v/1"), video("https://v/2")]), true)
        .await;
    let id = body["skill"]["id"].as_str().unwrap().to_string();

    let (status, detail) = app.call(Method::GET, &format!("/skills/{id}"), Some(&learner.token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        detail["access"],
        json!({ "granted": false, "balance": 5, "required": 10, "shortfall": 5 })
    );
    assert_eq!(detail["lectures"][0], json!({ "title": "Lecture 1", "kind": "video" }));

    let (status, body) = app
        .call(Method::GET, &format!("/skills/{id}/lectures"), Some(&learner.token), None)
        .await;
    assert_eq!(status, StatusCode::PAYMENT_REQUIRED);
    assert_eq!(body["shortfall"], 5);
    assert_eq!(app.balance(&learner).await, 5);

    // The author's own balance covers it.
    let (status, lectures) = app
        .call(Method::GET, &format!("/skills/{id}/lectures"), Some(&author.token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(lectures[1]["content"]["url"], "https://v/2");
    assert_eq!(app.balance(&author).await, 10);
}

#[tokio::test]
async fn search_is_case_insensitive_substring() {
    let app = TestApp::new().await;
    let author = app.register("ana@example.com").await;
    app.publish(&author, "Acoustic Guitar", json!([]), true).await;
    app.publish(&author, "Digital Illustration", json!([]), true).await;

    let (_, found) = app.call(Method::GET, "/skills?q=guitar", Some(&author.token), None).await;
    let found = found.as_array().unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0]["name"], "Acoustic Guitar");

    let (_, all) = app.call(Method::GET, "/skills?q=", Some(&author.token), None).await;
    assert_eq!(all.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn invalid_skills_are_rejected() {
    let app = TestApp::new().await;
    let author = app.register("ana@example.com").await;

    for body in [
        json!({ "name": "   " }),
        json!({ "name": "Guitar", "lectures": [video("  ")] }),
        json!({ "name": "Guitar", "lectures": [text("")] }),
        json!({ "name": "Guitar", "lectures": [
            { "content": { "type": "recording", "upload_id": Uuid::new_v4() } }
        ] }),
    ] {
        let (status, resp) = app.call(Method::POST, "/skills", Some(&author.token), Some(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{resp}");
    }
    assert_eq!(app.balance(&author).await, 0);
}

// -- Uploads --

#[tokio::test]
async fn uploads_resume_at_received_offset() {
    let app = TestApp::new().await;
    let user = app.register("ana@example.com").await;
    let id = app.upload(&user, b"first").await;

    let put = |offset: u64, data: &'static [u8]| {
        Request::builder()
            .method(Method::PUT)
            .uri(format!("/uploads/{id}?offset={offset}"))
            .header(header::AUTHORIZATION, format!("Bearer {}", user.token))
            .body(Body::from(data))
            .unwrap()
    };

    let (status, body) = app.send(put(0, b"again")).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["offset"], 5);

    let (status, body) = app.send(put(5, b"-second")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["bytes_received"], 12);

    // Someone else's upload is invisible.
    let other = app.register("leo@example.com").await;
    let (status, _) = app.call(Method::GET, &format!("/uploads/{id}"), Some(&other.token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// -- Chats --

#[tokio::test]
async fn both_sides_share_one_ordered_room() {
    let app = TestApp::new().await;
    let ana = app.register_named("ana@example.com", "ana").await;
    let leo = app.register_named("leo@example.com", "leo").await;
    let mut events = app.state.dispatcher.subscribe();

    let (status, first) = app
        .call(Method::POST, &format!("/chats/{}/messages", leo.id), Some(&ana.token), Some(json!({ "text": " hi leo " })))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(first["text"], "hi leo");
    app.call(Method::POST, &format!("/chats/{}/messages", ana.id), Some(&leo.token), Some(json!({ "text": "hey ana" })))
        .await;

    let expected_key = skillswap_rules::chat::room_key(&ana.id, &leo.id);
    for (me, peer) in [(&ana, &leo), (&leo, &ana)] {
        let (status, history) = app
            .call(Method::GET, &format!("/chats/{}/messages", peer.id), Some(&me.token), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(history["room_key"], expected_key.as_str());
        let texts: Vec<_> = history["messages"]
            .as_array()
            .unwrap()
            .iter()
            .map(|m| m["text"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(texts, ["hi leo", "hey ana"]);
    }

    match events.recv().await.unwrap() {
        GatewayEvent::MessageCreate { message } => assert_eq!(message.room_key, expected_key),
        other => panic!("unexpected event {other:?}"),
    }
}

#[tokio::test]
async fn chat_rejects_self_unknown_and_empty() {
    let app = TestApp::new().await;
    let ana = app.register("ana@example.com").await;

    let (status, _) = app
        .call(Method::POST, &format!("/chats/{}/messages", ana.id), Some(&ana.token), Some(json!({ "text": "me" })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .call(Method::GET, &format!("/chats/{}/messages", Uuid::new_v4()), Some(&ana.token), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let leo = app.register("leo@example.com").await;
    let (status, _) = app
        .call(Method::POST, &format!("/chats/{}/messages", leo.id), Some(&ana.token), Some(json!({ "text": "   " })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn discarded_upload_cannot_be_published() {
    let app = TestApp::new().await;
    let user = app.register("ana@example.com").await;
    let id = app.upload(&user, b"take one").await;

    let (status, _) = app.call(Method::DELETE, &format!("/uploads/{id}"), Some(&user.token), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = app.call(Method::DELETE, &format!("/uploads/{id}"), Some(&user.token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app
        .call(
            Method::POST,
            "/skills",
            Some(&user.token),
            Some(json!({
                "name": "Takes",
                "lectures": [{ "content": { "type": "recording", "upload_id": id } }],
                "published": true,
            })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn one_recording_cannot_back_two_lectures() {
    let app = TestApp::new().await;
    let user = app.register("ana@example.com").await;
    let id = app.upload(&user, b"take one").await;
    let recording = json!({ "content": { "type": "recording", "upload_id": id } });

    let (status, body) = app
        .call(
            Method::POST,
            "/skills",
            Some(&user.token),
            Some(json!({
                "name": "Takes",
                "lectures": [recording.clone(), recording],
                "published": true,
            })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("Lecture 2"), "{body}");

    // Nothing was consumed, so the author can retry with one lecture.
    let (status, body) = app.call(Method::GET, &format!("/uploads/{id}"), Some(&user.token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["bytes_received"], 8);
    assert_eq!(app.balance(&user).await, 0);

    let lectures = json!([{ "content": { "type": "recording", "upload_id": id } }]);
    let body = app.publish(&user, "Takes", lectures, true).await;
    assert_eq!(body["credits_awarded"], 15);
}

#[tokio::test]
async fn failed_save_puts_recordings_back() {
    let app = TestApp::new().await;
    let author = app.register("ana@example.com").await;
    let first = app.upload(&author, b"take one").await;
    let second = app.upload(&author, b"take two!").await;

    // A valid token whose user row is gone makes the save itself fail.
    let ghost_id = Uuid::new_v4();
    let ghost = User {
        id: ghost_id.to_string(),
        token: crate::auth::create_token(SECRET, ghost_id, "ghost@example.com").unwrap(),
    };
    let ghost_upload = app.upload(&ghost, b"lost?").await;

    let (status, _) = app
        .call(
            Method::POST,
            "/skills",
            Some(&ghost.token),
            Some(json!({
                "name": "Haunting",
                "lectures": [
                    { "content": { "type": "recording", "upload_id": ghost_upload } },
                    text("boo"),
                ],
                "published": true,
            })),
        )
        .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

    let (status, body) = app
        .call(Method::GET, &format!("/uploads/{ghost_upload}"), Some(&ghost.token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["bytes_received"], 5);

    // The author's own uploads are untouched and still publishable.
    let lectures = json!([
        { "content": { "type": "recording", "upload_id": first } },
        { "content": { "type": "recording", "upload_id": second } },
    ]);
    let body = app.publish(&author, "Two takes", lectures, true).await;
    assert_eq!(body["credits_awarded"], 20);
}

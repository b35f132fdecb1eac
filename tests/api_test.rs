//! End-to-end tests: the real router on an ephemeral port, driven over
//! HTTP with `reqwest` and over WebSocket with `tokio-tungstenite`.

#![allow(clippy::panic, clippy::indexing_slicing)]

use std::time::Duration;

use chrono::{Days, Utc};
use futures_util::{SinkExt, StreamExt};
use reqwest::StatusCode;
use serde_json::{Value, json};
use tokio_tungstenite::tungstenite::Message;
use uuid::Uuid;

use salon_gateway::api;
use salon_gateway::app_state::AppState;
use salon_gateway::config::MarketConfig;

struct TestApp {
    base: String,
    ws: String,
    client: reqwest::Client,
}

#[derive(Clone, Copy)]
struct User {
    id: Uuid,
    role: &'static str,
}

impl User {
    fn new(role: &'static str) -> Self {
        Self {
            id: Uuid::new_v4(),
            role,
        }
    }
}

async fn spawn_app() -> TestApp {
    let state = AppState::new(&MarketConfig::default(), None);
    let app = api::build_app(state);
    let Ok(listener) = tokio::net::TcpListener::bind("127.0.0.1:0").await else {
        panic!("bind ephemeral port");
    };
    let Ok(addr) = listener.local_addr() else {
        panic!("local addr");
    };
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    TestApp {
        base: format!("http://{addr}"),
        ws: format!("ws://{addr}/ws"),
        client: reqwest::Client::new(),
    }
}

impl TestApp {
    async fn send(
        &self,
        method: reqwest::Method,
        path: &str,
        user: Option<User>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut req = self.client.request(method, format!("{}{path}", self.base));
        if let Some(user) = user {
            req = req
                .header("x-user-id", user.id.to_string())
                .header("x-user-role", user.role);
        }
        if let Some(body) = body {
            req = req.json(&body);
        }
        let Ok(resp) = req.send().await else {
            panic!("request to {path} failed");
        };
        let status = resp.status();
        let body = resp.json::<Value>().await.unwrap_or(Value::Null);
        (status, body)
    }

    async fn get(&self, path: &str, user: Option<User>) -> (StatusCode, Value) {
        self.send(reqwest::Method::GET, path, user, None).await
    }

    async fn post(&self, path: &str, user: User, body: Value) -> (StatusCode, Value) {
        self.send(reqwest::Method::POST, path, Some(user), Some(body)).await
    }

    async fn submit(&self, provider: User, kind: &str, name: &str) -> String {
        let (status, body) = self
            .post(&format!("/api/v1/{kind}s"), provider, listing_body(name))
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        let Some(id) = body["id"].as_str() else {
            panic!("listing id in {body}");
        };
        id.to_string()
    }

    async fn approve(&self, admin: User, id: &str) -> Value {
        let (status, body) = self
            .post(&format!("/api/v1/admin/listings/{id}/approve"), admin, json!({}))
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        body
    }
}

fn listing_body(name: &str) -> Value {
    json!({
        "name": name,
        "service_type": "nails",
        "category": "women",
        "description": "Shape, cuticle care and long-wear gel polish.",
        "pricing": {
            "base_price": 35.0,
            "add_ons": [{ "name": "Nail art", "price": 8.0 }]
        },
        "duration_minutes": 60
    })
}

fn booking_date() -> String {
    let Some(date) = Utc::now().date_naive().checked_add_days(Days::new(2)) else {
        panic!("date in range");
    };
    date.format("%Y-%m-%d").to_string()
}

#[tokio::test]
async fn health_and_catalog() {
    let app = spawn_app().await;
    let (status, body) = app.get("/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");

    let (status, body) = app.get("/config/catalog", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["listing_kinds"][0]["public_id_prefix"], "SRV");
    assert_eq!(body["working_windows"], json!(["09:00-12:00", "14:30-17:30"]));
    assert!(
        body["location_modes"]
            .as_array()
            .is_some_and(|m| m.contains(&json!("in_salon")))
    );
}

#[tokio::test]
async fn approval_assigns_sequential_public_ids_per_kind() {
    let app = spawn_app().await;
    let provider = User::new("service_provider");
    let admin = User::new("admin");

    let first = app.submit(provider, "service", "Gel Manicure").await;
    let second = app.submit(provider, "service", "Gel Pedicure").await;
    let package = app.submit(provider, "package", "Bridal Nails").await;

    let (status, pending) = app.get("/api/v1/admin/listings/pending", Some(admin)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(pending.as_array().map(Vec::len), Some(3));

    let decision = app.approve(admin, &first).await;
    assert_eq!(decision["assigned_public_id"], "SRV_001");
    assert_eq!(decision["listing"]["status"], "approved");
    assert_eq!(app.approve(admin, &package).await["assigned_public_id"], "PKG_001");
    assert_eq!(app.approve(admin, &second).await["assigned_public_id"], "SRV_002");

    let replay = app.approve(admin, &first).await;
    assert_eq!(replay["replayed"], true);
    assert_eq!(replay["listing"]["public_id"], "SRV_001");

    let (_, live) = app.get("/api/v1/listings", None).await;
    let ids: Vec<&str> = live
        .as_array()
        .map(|l| l.iter().filter_map(|x| x["public_id"].as_str()).collect())
        .unwrap_or_default();
    assert_eq!(ids, ["SRV_001", "SRV_002", "PKG_001"]);

    let (_, packages) = app.get("/api/v1/listings?kind=package", None).await;
    assert_eq!(packages.as_array().map(Vec::len), Some(1));

    let (status, body) = app.get("/api/v1/listings?kind=bundle", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], 1002);
}

#[tokio::test]
async fn validation_reports_every_field() {
    let app = spawn_app().await;
    let provider = User::new("service_provider");
    let (status, body) = app
        .post(
            "/api/v1/services",
            provider,
            json!({ "name": "X", "pricing": { "base_price": -1.0 } }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], 1001);
    let fields: Vec<&str> = body["error"]["details"]
        .as_array()
        .map(|d| d.iter().filter_map(|e| e["field"].as_str()).collect())
        .unwrap_or_default();
    for field in ["name", "service_type", "category", "description", "pricing.base_price"] {
        assert!(fields.contains(&field), "missing {field} in {fields:?}");
    }

    let (status, body) = app
        .post(
            "/api/v1/services",
            provider,
            json!({
                "name": "x",
                "service_type": "tattoo",
                "pricing": { "base_price": "abc" },
                "duration_minutes": "sixty"
            }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], 1001);
    let fields: Vec<&str> = body["error"]["details"]
        .as_array()
        .map(|d| d.iter().filter_map(|e| e["field"].as_str()).collect())
        .unwrap_or_default();
    for field in ["name", "service_type", "pricing.base_price", "duration_minutes"] {
        assert!(fields.contains(&field), "missing {field} in {fields:?}");
    }

    let (status, body) = app.post("/api/v1/services", provider, json!("nope")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], 1002);
}

#[tokio::test]
async fn identity_and_roles_are_enforced() {
    let app = spawn_app().await;
    let (status, body) = app
        .send(
            reqwest::Method::POST,
            "/api/v1/services",
            None,
            Some(listing_body("Gel Manicure")),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], 4001);

    let customer = User::new("customer");
    let (status, _) = app
        .post("/api/v1/services", customer, listing_body("Gel Manicure"))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let provider = User::new("service_provider");
    let id = app.submit(provider, "service", "Gel Manicure").await;
    let (status, _) = app
        .post(&format!("/api/v1/admin/listings/{id}/approve"), provider, json!({}))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let stranger = User::new("service_provider");
    let (status, _) = app
        .post(&format!("/api/v1/listings/{id}/reactivate"), stranger, json!({}))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn unpublished_listings_are_hidden_from_the_public() {
    let app = spawn_app().await;
    let provider = User::new("service_provider");
    let admin = User::new("admin");
    let id = app.submit(provider, "service", "Gel Manicure").await;
    let path = format!("/api/v1/listings/{id}");

    assert_eq!(app.get(&path, None).await.0, StatusCode::NOT_FOUND);
    assert_eq!(app.get(&path, Some(User::new("customer"))).await.0, StatusCode::NOT_FOUND);
    assert_eq!(app.get(&path, Some(provider)).await.0, StatusCode::OK);
    assert_eq!(app.get(&path, Some(admin)).await.0, StatusCode::OK);

    app.approve(admin, &id).await;
    let (status, body) = app.get(&path, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["public_id"], "SRV_001");
}

#[tokio::test]
async fn update_is_staged_until_approved() {
    let app = spawn_app().await;
    let provider = User::new("service_provider");
    let admin = User::new("admin");
    let id = app.submit(provider, "service", "Gel Manicure").await;
    app.approve(admin, &id).await;

    let (status, body) = app
        .send(
            reqwest::Method::PUT,
            &format!("/api/v1/listings/{id}"),
            Some(provider),
            Some(json!({ "name": "Luxury Gel Manicure", "reason": "rebrand" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["name"], "Gel Manicure");
    assert_eq!(body["pending_change"]["request_type"], "update");

    let (_, status_body) = app.get(&format!("/api/v1/listings/{id}/status"), None).await;
    assert_eq!(status_body["label"], "Update pending review");
    assert_eq!(status_body["is_pending"], true);

    let (status, body) = app
        .send(
            reqwest::Method::DELETE,
            &format!("/api/v1/listings/{id}"),
            Some(provider),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], 2101);

    let (status, body) = app
        .post(
            &format!("/api/v1/admin/listings/{id}/reject"),
            admin,
            json!({ "reason": "no" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");

    let decision = app.approve(admin, &id).await;
    assert_eq!(decision["request_type"], "update");
    assert_eq!(decision["listing"]["name"], "Luxury Gel Manicure");
    assert_eq!(decision["listing"]["public_id"], "SRV_001");

    let (status, history) = app
        .get(&format!("/api/v1/admin/listings/{id}/history"), Some(admin))
        .await;
    assert_eq!(status, StatusCode::OK);
    let actions: Vec<&str> = history["entries"]
        .as_array()
        .map(|e| e.iter().filter_map(|x| x["action"].as_str()).collect())
        .unwrap_or_default();
    assert_eq!(actions, ["created", "approved", "update_requested", "approved"]);
}

#[tokio::test]
async fn idempotency_key_returns_original_listing() {
    let app = spawn_app().await;
    let provider = User::new("service_provider");
    let mut ids = Vec::new();
    for _ in 0..2 {
        let Ok(resp) = app
            .client
            .post(format!("{}/api/v1/services", app.base))
            .header("x-user-id", provider.id.to_string())
            .header("x-user-role", provider.role)
            .header("idempotency-key", "form-42")
            .json(&listing_body("Gel Manicure"))
            .send()
            .await
        else {
            panic!("request failed");
        };
        assert_eq!(resp.status(), StatusCode::CREATED);
        let Ok(body) = resp.json::<Value>().await else {
            panic!("json body");
        };
        ids.push(body["id"].clone());
    }
    assert_eq!(ids[0], ids[1]);

    let (_, mine) = app.get("/api/v1/listings/mine", Some(provider)).await;
    assert_eq!(mine.as_array().map(Vec::len), Some(1));
}

#[tokio::test]
async fn booking_takes_and_releases_a_slot() {
    let app = spawn_app().await;
    let provider = User::new("service_provider");
    let admin = User::new("admin");
    let customer = User::new("customer");
    let id = app.submit(provider, "service", "Gel Manicure").await;

    let date = booking_date();
    let availability = format!("/api/v1/availability?listing_id={id}&date={date}");
    assert_eq!(app.get(&availability, None).await.0, StatusCode::NOT_FOUND);

    app.approve(admin, &id).await;
    let (status, body) = app.get(&availability, None).await;
    assert_eq!(status, StatusCode::OK);
    let times: Vec<&str> = body["slots"]
        .as_array()
        .map(|s| s.iter().filter_map(|x| x["local_time"].as_str()).collect())
        .unwrap_or_default();
    assert_eq!(times, ["09:00", "10:00", "11:00", "14:30", "15:30", "16:30"]);

    let book = json!({ "listing_id": id, "date": date, "time": "10:00", "notes": "first visit" });
    let (status, booking) = app.post("/api/v1/bookings", customer, book.clone()).await;
    assert_eq!(status, StatusCode::CREATED, "{booking}");
    assert_eq!(booking["status"], "confirmed");
    assert_eq!(booking["provider_id"], provider.id.to_string());

    let (status, body) = app.post("/api/v1/bookings", User::new("customer"), book).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], 2104);

    let (_, body) = app.get(&availability, None).await;
    assert_eq!(body["slots"].as_array().map(Vec::len), Some(5));

    let (_, mine) = app.get("/api/v1/bookings", Some(provider)).await;
    assert_eq!(mine.as_array().map(Vec::len), Some(1));

    let Some(booking_id) = booking["id"].as_str() else {
        panic!("booking id");
    };
    let (status, body) = app
        .post(&format!("/api/v1/bookings/{booking_id}/feedback"), customer, json!({ "rating": 5 }))
        .await;
    assert_eq!(status, StatusCode::CONFLICT, "{body}");

    let (status, cancelled) = app
        .post(
            &format!("/api/v1/bookings/{booking_id}/cancel"),
            customer,
            json!({ "reason": "schedule change" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cancelled["status"], "cancelled");

    let (_, body) = app.get(&availability, None).await;
    assert_eq!(body["slots"].as_array().map(Vec::len), Some(6));

    let (status, summary) = app.get(&format!("/api/v1/listings/{id}/feedback"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(summary["count"], 0);
    assert!(summary["average_rating"].is_null());
}

#[tokio::test]
async fn bad_booking_time_is_a_field_error() {
    let app = spawn_app().await;
    let (status, body) = app
        .post(
            "/api/v1/bookings",
            User::new("customer"),
            json!({ "listing_id": Uuid::new_v4(), "date": booking_date(), "time": "ten" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["details"][0]["field"], "time");
}

#[tokio::test]
async fn direct_messages_round_trip() {
    let app = spawn_app().await;
    let customer = User::new("customer");
    let provider = User::new("service_provider");

    let (status, sent) = app
        .post(
            "/api/v1/messages",
            customer,
            json!({ "recipient_id": provider.id, "body": "Do you do gel removal?" }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (_, unread) = app.get("/api/v1/messages/unread-count", Some(provider)).await;
    assert_eq!(unread["unread"], 1);

    let Some(message_id) = sent["id"].as_str() else {
        panic!("message id");
    };
    let (status, _) = app
        .post(&format!("/api/v1/messages/{message_id}/read"), customer, json!({}))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, read) = app
        .post(&format!("/api/v1/messages/{message_id}/read"), provider, json!({}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(read["read_at"].is_string());

    let (_, thread) = app
        .get(&format!("/api/v1/messages/with/{}", customer.id), Some(provider))
        .await;
    assert_eq!(thread[0]["body"], "Do you do gel removal?");

    let (status, _) = app
        .post(
            "/api/v1/messages",
            customer,
            json!({ "recipient_id": customer.id, "body": "hi me" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn websocket_streams_subscribed_listing_events() {
    let app = spawn_app().await;
    let Ok((mut socket, _)) = tokio_tungstenite::connect_async(app.ws.as_str()).await else {
        panic!("ws connect");
    };

    let subscribe = json!({
        "id": "sub-1",
        "type": "command",
        "payload": { "command": "subscribe", "listing_ids": ["*"] }
    });
    let Ok(()) = socket.send(Message::text(subscribe.to_string())).await else {
        panic!("ws send");
    };

    let next_json = |text: &str| serde_json::from_str::<Value>(text).unwrap_or(Value::Null);
    let Ok(Some(Ok(Message::Text(reply)))) =
        tokio::time::timeout(Duration::from_secs(5), socket.next()).await
    else {
        panic!("subscribe reply");
    };
    let reply = next_json(reply.as_str());
    assert_eq!(reply["id"], "sub-1");
    assert_eq!(reply["payload"]["wildcard"], true);

    let provider = User::new("service_provider");
    let id = app.submit(provider, "service", "Gel Manicure").await;

    let Ok(Some(Ok(Message::Text(event)))) =
        tokio::time::timeout(Duration::from_secs(5), socket.next()).await
    else {
        panic!("listing event");
    };
    let event = next_json(event.as_str());
    assert_eq!(event["type"], "event");
    assert_eq!(event["payload"]["event_type"], "listing_submitted");
    assert_eq!(event["payload"]["listing_id"], id);
}

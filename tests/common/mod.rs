#![allow(dead_code)]

use std::sync::Arc;

use agrolink_api::{
    config::AppConfig,
    db::{self, DbConfig},
    entities::user,
    events,
    services::{
        clock::{ManualClock, SharedClock},
        users::NewUser,
    },
    workflow::{Actor, UserRole},
    AppState,
};
use axum::{
    body::{self, Body},
    http::{Method, Request, StatusCode},
    response::Response,
    Router,
};
use chrono::{DateTime, TimeZone, Utc};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

/// A seeded account plus a bearer token for it.
#[derive(Clone)]
pub struct TestUser {
    pub model: user::Model,
    pub token: String,
}

impl TestUser {
    pub fn id(&self) -> Uuid {
        self.model.id
    }

    pub fn actor(&self) -> Actor {
        Actor::new(self.model.id, self.model.role)
    }
}

/// One account per role, plus a second driver, agronomist and buyer for
/// assignment and visibility tests.
pub struct Seeded {
    pub admin: TestUser,
    pub farmer: TestUser,
    pub buyer: TestUser,
    pub other_buyer: TestUser,
    pub driver: TestUser,
    pub other_driver: TestUser,
    pub agronomist: TestUser,
    pub other_agronomist: TestUser,
}

/// Helper harness for driving the real router over an in-memory SQLite database.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    pub clock: Arc<ManualClock>,
    pub users: Seeded,
    _event_task: tokio::task::JoinHandle<()>,
}

pub fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 4, 7, 8, 0, 0).unwrap()
}

impl TestApp {
    pub async fn new() -> Self {
        let mut cfg = AppConfig::new(
            "sqlite::memory:".to_string(),
            "test_secret_key_for_testing_purposes_only_32chars".to_string(),
            "127.0.0.1".to_string(),
            18_080,
            "test".to_string(),
        );
        // One connection keeps every query on the same in-memory database.
        cfg.db_max_connections = 1;
        cfg.db_min_connections = 1;

        let pool = db::establish_connection_with_config(&DbConfig {
            sqlx_logging: false,
            ..DbConfig::from(&cfg)
        })
        .await
        .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");

        let (event_sender, event_rx, fanout) = events::channel(256);
        let event_task = tokio::spawn(events::process_events(event_rx, fanout));

        let clock = Arc::new(ManualClock::new(start_time()));
        let shared: SharedClock = clock.clone();
        let state = AppState::build(cfg, Arc::new(pool), event_sender, shared);
        let router = agrolink_api::app_router(state.clone());

        let users = Seeded {
            admin: seed(&state, "Ada Admin", "admin@agrolink.test", UserRole::Admin).await,
            farmer: seed(&state, "Femi Farmer", "farmer@agrolink.test", UserRole::Farmer).await,
            buyer: seed(&state, "Bola Buyer", "buyer@agrolink.test", UserRole::Buyer).await,
            other_buyer: seed(&state, "Bisi Buyer", "buyer2@agrolink.test", UserRole::Buyer).await,
            driver: seed(&state, "Dayo Driver", "driver@agrolink.test", UserRole::Driver).await,
            other_driver: seed(&state, "Dele Driver", "driver2@agrolink.test", UserRole::Driver)
                .await,
            agronomist: seed(&state, "Amaka Agro", "agro@agrolink.test", UserRole::Agronomist)
                .await,
            other_agronomist: seed(&state, "Bayo Agro", "agro2@agrolink.test", UserRole::Agronomist)
                .await,
        };

        Self {
            router,
            state,
            clock,
            users,
            _event_task: event_task,
        }
    }

    /// Send a request against the router with an optional bearer token.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);

        if let Some(tok) = token {
            builder = builder.header("authorization", format!("Bearer {}", tok));
        }

        let body = if let Some(json) = body {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_vec(&json).expect("failed to serialize json request body"))
        } else {
            Body::empty()
        };

        let request = builder.body(body).expect("failed to build request");
        let response = self.send(request).await;

        let status = response.status();
        let bytes = body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("response body bytes");
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                Value::String(String::from_utf8_lossy(&bytes).into_owned())
            })
        };
        (status, value)
    }

    /// Raw access for tests that inspect headers.
    pub async fn send(&self, request: Request<Body>) -> Response {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }

    pub async fn get(&self, uri: &str, user: &TestUser) -> (StatusCode, Value) {
        self.request(Method::GET, uri, None, Some(&user.token)).await
    }

    pub async fn post(&self, uri: &str, user: &TestUser, body: Value) -> (StatusCode, Value) {
        self.request(Method::POST, uri, Some(body), Some(&user.token))
            .await
    }

    pub async fn patch(&self, uri: &str, user: &TestUser, body: Value) -> (StatusCode, Value) {
        self.request(Method::PATCH, uri, Some(body), Some(&user.token))
            .await
    }

    /// Places an order for `buyer` and returns the order body.
    pub async fn place_order(&self, buyer: &TestUser, delivery: bool) -> Value {
        let mut body = json!({
            "items": [
                { "listingId": Uuid::new_v4(), "quantity": 3, "unitPrice": "120.00" },
                { "listingId": Uuid::new_v4(), "quantity": 1, "unitPrice": "45.50" }
            ],
            "deliveryType": if delivery { "DELIVERY" } else { "PICKUP" },
        });
        if delivery {
            body["address"] = json!("12 Market Road, Ibadan");
            body["contactName"] = json!("Bola");
            body["phone"] = json!("+2348000000000");
        }
        let (status, response) = self.post("/api/v1/orders", buyer, body).await;
        assert_eq!(status, StatusCode::CREATED, "place order failed: {response}");
        response["data"].clone()
    }

    /// Delivery created for a DELIVERY order.
    pub async fn delivery_for(&self, order_id: &str, user: &TestUser) -> Value {
        let (status, response) = self
            .get(&format!("/api/v1/deliveries/order/{order_id}"), user)
            .await;
        assert_eq!(status, StatusCode::OK, "delivery lookup failed: {response}");
        response["data"].clone()
    }

    /// Creates a harvest request as the seeded farmer.
    pub async fn request_harvest(&self) -> Value {
        let (status, response) = self
            .post(
                "/api/v1/harvest/request",
                &self.users.farmer,
                json!({
                    "crop": "Maize",
                    "expectedYield": "4.5",
                    "yieldUnit": "tonnes",
                    "harvestDate": "2025-05-20",
                    "location": "Oyo North"
                }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "harvest request failed: {response}");
        response["data"].clone()
    }

    pub async fn set_order_status(&self, order_id: &str, status: &str) -> (StatusCode, Value) {
        self.patch(
            &format!("/api/v1/orders/{order_id}/status"),
            &self.users.admin,
            json!({ "status": status }),
        )
        .await
    }
}

async fn seed(state: &AppState, name: &str, email: &str, role: UserRole) -> TestUser {
    let model = state
        .services
        .users
        .register(NewUser {
            name: name.to_string(),
            email: email.to_string(),
            phone: None,
            role,
            service_area: Some("Oyo".to_string()),
        })
        .await
        .expect("seed user");
    let token = state
        .services
        .auth
        .issue_token(&model)
        .expect("issue token")
        .access_token;
    TestUser { model, token }
}

pub fn error_code(body: &Value) -> &str {
    body["code"].as_str().unwrap_or_default()
}

//! AgroLink API Library
//!
//! Workflow backend for the AgroLink marketplace: orders, deliveries and
//! harvest assistance requests moving through audited state machines.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

// Core modules
pub mod auth;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod middleware_helpers;
pub mod migrator;
pub mod openapi;
pub mod queries;
pub mod repositories;
pub mod services;
pub mod tracing;
pub mod workflow;

use axum::{
    response::Json,
    routing::{get, patch, post},
    Router,
};
use chrono::Utc;
use http::HeaderValue;
use sea_orm::DatabaseConnection;
use serde::Serialize;
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
};
use utoipa::ToSchema;

use crate::auth::{AuthConfig, AuthRouterExt, AuthService};
use crate::queries::{Page, PageLimits};
use crate::services::{clock::SharedClock, state_machine::WorkflowSettings, ServiceFactory};

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: config::AppConfig,
    pub event_sender: events::EventSender,
    pub services: handlers::AppServices,
}

impl AppState {
    /// Wires every service over one pool and one clock.
    pub fn build(
        config: config::AppConfig,
        db: Arc<DatabaseConnection>,
        event_sender: events::EventSender,
        clock: SharedClock,
    ) -> Self {
        let settings = WorkflowSettings {
            delivery_fee: config.delivery_fee,
            cancellation_window: config.cancellation_window(),
        };
        let page_limits = PageLimits {
            default_size: config.api_default_page_size,
            max_size: config.api_max_page_size,
        };
        let factory = ServiceFactory::new(
            db.clone(),
            event_sender.clone(),
            clock,
            settings,
            page_limits,
        );
        let auth = Arc::new(AuthService::new(AuthConfig::from(&config), db.clone()));
        let services = handlers::AppServices::new(&factory, auth);

        Self {
            db,
            config,
            event_sender,
            services,
        }
    }
}

// Common response wrappers
#[derive(Serialize, ToSchema)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<ResponseMeta>,
}

#[derive(Serialize, ToSchema)]
pub struct ResponseMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    pub timestamp: String,
}

impl ResponseMeta {
    fn capture() -> Self {
        Self {
            request_id: crate::tracing::current_request_id().map(|rid| rid.as_str().to_string()),
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PaginatedResponse<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u64,
    pub limit: u64,
    pub total_pages: u64,
}

impl<T> From<Page<T>> for PaginatedResponse<T> {
    fn from(page: Page<T>) -> Self {
        Self {
            items: page.items,
            total: page.total,
            page: page.page,
            limit: page.limit,
            total_pages: page.total_pages,
        }
    }
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            meta: Some(ResponseMeta::capture()),
        }
    }
}


/// Standard API result type for JSON responses
pub type ApiResult<T> = Result<Json<ApiResponse<T>>, errors::ServiceError>;

/// Every `/api/v1` route; all of them require a bearer token.
pub fn api_v1_routes(auth: Arc<AuthService>) -> Router<AppState> {
    use handlers::{deliveries, harvest, orders, users};

    let orders_routes = Router::new()
        .route("/orders", post(orders::create_order).get(orders::list_orders))
        .route("/orders/me", get(orders::my_orders))
        .route("/orders/:id", get(orders::get_order))
        .route("/orders/:id/status", patch(orders::update_order_status))
        .route("/orders/:id/cancel", patch(orders::cancel_order))
        .route("/orders/:id/history", get(orders::order_history));

    let deliveries_routes = Router::new()
        .route("/deliveries", get(deliveries::list_deliveries))
        .route("/deliveries/me", get(deliveries::my_deliveries))
        .route("/deliveries/driver/me", get(deliveries::driver_deliveries))
        .route("/deliveries/order/:order_id", get(deliveries::delivery_for_order))
        .route("/deliveries/:id", get(deliveries::get_delivery))
        .route("/deliveries/:id/assign", post(deliveries::assign_driver))
        .route("/deliveries/:id/unassign", post(deliveries::unassign_driver))
        .route("/deliveries/:id/status", post(deliveries::update_delivery_status))
        .route("/deliveries/:id/history", get(deliveries::delivery_history));

    let harvest_routes = Router::new()
        .route("/harvest/request", post(harvest::create_request))
        .route("/harvest/requests", get(harvest::list_requests))
        .route("/harvest/admin/requests", get(harvest::admin_requests))
        .route("/harvest/agronomist/assigned", get(harvest::assigned_to_me))
        .route("/harvest/:id", get(harvest::get_request))
        .route("/harvest/:id/admin/schedule", post(harvest::assign_expert))
        .route("/harvest/:id/unassign", post(harvest::unassign_expert))
        .route("/harvest/:id/accept", post(harvest::respond))
        .route("/harvest/:id/schedule", post(harvest::schedule))
        .route("/harvest/:id/update", post(harvest::record_progress))
        .route("/harvest/:id/status", post(harvest::update_status))
        .route("/harvest/:id/phases/:position", post(harvest::update_phase))
        .route("/harvest/:id/history", get(harvest::harvest_history));

    let users_routes = Router::new()
        .route("/users", post(users::create_user).get(users::list_users))
        .route("/users/me", get(users::me))
        .route("/users/me/availability", patch(users::set_my_availability))
        .route("/users/:id/status", patch(users::set_user_status));

    Router::new()
        .merge(orders_routes)
        .merge(deliveries_routes)
        .merge(harvest_routes)
        .merge(users_routes)
        .with_auth(auth)
}

fn cors_layer(cfg: &config::AppConfig) -> CorsLayer {
    let configured_origins: Option<Vec<HeaderValue>> = cfg
        .cors_allowed_origins
        .as_ref()
        .map(|raw| {
            raw.split(',')
                .filter_map(|origin| {
                    let trimmed = origin.trim();
                    if trimmed.is_empty() {
                        None
                    } else {
                        HeaderValue::from_str(trimmed).ok()
                    }
                })
                .collect::<Vec<_>>()
        })
        .filter(|origins| !origins.is_empty());

    match configured_origins {
        Some(origins) => CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any),
        None if cfg.should_allow_permissive_cors() => CorsLayer::permissive(),
        None => {
            ::tracing::warn!("No CORS origins configured; cross-origin requests will be refused");
            CorsLayer::new()
        }
    }
}

/// The complete HTTP application: health probes, Swagger UI and `/api/v1`.
pub fn app_router(state: AppState) -> Router {
    let auth = state.services.auth.clone();
    let timeout = state.config.request_timeout();
    let cors = cors_layer(&state.config);

    Router::new()
        .merge(handlers::health::health_routes())
        .nest("/api/v1", api_v1_routes(auth))
        .merge(openapi::swagger_ui())
        .layer(crate::tracing::configure_http_tracing())
        .layer(TimeoutLayer::new(timeout))
        .layer(cors)
        // Ensure every request carries a request id for traceability
        .layer(axum::middleware::from_fn(
            middleware_helpers::request_id::request_id_middleware,
        ))
        .with_state(state)
}

pub mod prelude {
    pub use crate::errors::*;
    pub use crate::events::*;
    pub use crate::services::*;
    pub use crate::workflow::*;
}

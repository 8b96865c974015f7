//! Cafe POS API Library
//!
//! Checkout, inventory deduction and back-office reads for a café point of sale.
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
pub mod handlers;
pub mod middleware_helpers;
pub mod migrator;
pub mod openapi;
pub mod services;
pub mod tracing;

use axum::{
    extract::State,
    response::Json,
    routing::{get, post},
    Router,
};
use chrono::Utc;
use sea_orm::DatabaseConnection;
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tower_http::timeout::TimeoutLayer;
use utoipa::ToSchema;

use crate::services::{
    audit::{AuditDispatcher, AuditLogService, AuditSink, DbAuditSink},
    catalog::DbCatalogReader,
    checkout::CheckoutService,
    inventory::InventoryService,
    orders::OrderQueryService,
};

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: config::AppConfig,
    pub checkout: CheckoutService,
    pub inventory: InventoryService,
    pub orders: OrderQueryService,
    pub audit_logs: AuditLogService,
}

impl AppState {
    /// Wires the services against `db`, auditing into the `audit_logs` table.
    pub fn new(db: Arc<DatabaseConnection>, config: config::AppConfig) -> Self {
        let sink = Arc::new(DbAuditSink::new(db.clone()));
        Self::with_audit_sink(db, config, sink)
    }

    pub fn with_audit_sink(
        db: Arc<DatabaseConnection>,
        config: config::AppConfig,
        sink: Arc<dyn AuditSink>,
    ) -> Self {
        let audit = AuditDispatcher::new(sink);
        let catalog = Arc::new(DbCatalogReader::new(db.clone()));

        Self {
            checkout: CheckoutService::new(
                db.clone(),
                catalog,
                audit.clone(),
                config.currency_symbol.clone(),
            ),
            inventory: InventoryService::new(db.clone(), audit),
            orders: OrderQueryService::new(db.clone()),
            audit_logs: AuditLogService::new(db.clone()),
            db,
            config,
        }
    }
}

// Common response wrappers
#[derive(Serialize, ToSchema)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub message: Option<String>,
    pub errors: Option<Vec<String>>,
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
pub struct PaginatedResponse<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u64,
    pub limit: u64,
    pub total_pages: u64,
}

impl<T> PaginatedResponse<T> {
    pub fn new(items: Vec<T>, total: u64, page: u64, limit: u64) -> Self {
        let total_pages = if limit == 0 { 0 } else { (total + limit - 1) / limit };
        Self {
            items,
            total,
            page,
            limit,
            total_pages,
        }
    }
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            errors: None,
            meta: Some(ResponseMeta::capture()),
        }
    }
}


/// Routes nested under `/api/v1`.
pub fn api_v1_routes() -> Router<AppState> {
    Router::new()
        // Status and health endpoints
        .route("/status", get(api_status))
        .route("/health", get(health_check))
        // Checkout
        .route("/checkout", post(handlers::checkout::checkout))
        // Orders and transactions
        .route("/orders", get(handlers::orders::list_orders))
        .route("/orders/:id", get(handlers::orders::get_order))
        .route("/transactions", get(handlers::orders::list_transactions))
        // Inventory
        .route(
            "/inventory",
            get(handlers::inventory::list_inventory).post(handlers::inventory::create_inventory),
        )
        .route(
            "/inventory/:id",
            get(handlers::inventory::get_inventory).patch(handlers::inventory::adjust_inventory),
        )
        .route(
            "/inventory/:id/history",
            get(handlers::inventory::inventory_history),
        )
        // Audit
        .route("/audit-logs", get(handlers::audit_logs::list_audit_logs))
}

/// Full application router without CORS, which the binary adds from config.
pub fn app_router(state: AppState) -> Router {
    let timeout = Duration::from_secs(state.config.request_timeout_secs);

    Router::new()
        .nest("/api/v1", api_v1_routes())
        .merge(openapi::swagger_ui())
        // HTTP tracing layer for consistent request/response telemetry
        .layer(crate::tracing::configure_http_tracing())
        // Dropping the handler future rolls back any open transaction
        .layer(TimeoutLayer::new(timeout))
        // Ensure every request carries a request id for traceability
        .layer(axum::middleware::from_fn(
            middleware_helpers::request_id::request_id_middleware,
        ))
        .with_state(state)
}

/// Build information
#[utoipa::path(
    get,
    path = "/api/v1/status",
    responses((status = 200, description = "Service is up")),
    tag = "health"
)]
pub async fn api_status(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Value>>, errors::ServiceError> {
    let version = env!("CARGO_PKG_VERSION");
    let git = option_env!("GIT_HASH").unwrap_or("unknown");
    let build_time = option_env!("BUILD_TIME").unwrap_or("unknown");
    let status_data = json!({
        "status": "ok",
        "version": version,
        "git": git,
        "build_time": build_time,
        "service": "cafe-pos-api",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "environment": state.config.environment,
    });

    Ok(Json(ApiResponse::success(status_data)))
}

/// Database connectivity check
#[utoipa::path(
    get,
    path = "/api/v1/health",
    responses((status = 200, description = "Health report")),
    tag = "health"
)]
pub async fn health_check(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Value>>, errors::ServiceError> {
    let db_status = match db::check_connection(&state.db).await {
        Ok(_) => "healthy",
        Err(_) => "unhealthy",
    };

    let health_data = json!({
        "status": db_status,
        "checks": {
            "database": db_status,
        },
        "timestamp": chrono::Utc::now().to_rfc3339(),
    });

    Ok(Json(ApiResponse::success(health_data)))
}

pub mod prelude {
    pub use crate::auth::{RequestContext, Role};
    pub use crate::db::*;
    pub use crate::errors::*;
    pub use crate::openapi::*;
    pub use crate::services::*;
    pub use crate::tracing::*;
    pub use crate::{ApiResponse, AppState};
}

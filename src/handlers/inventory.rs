use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::{
    auth::RequestContext,
    entities::{
        inventory_item::{self, InventoryStatus},
        inventory_movement::{self, MovementType},
    },
    errors::ServiceError,
    handlers::common::{PaginationParams, ValidatedJson},
    services::inventory::{AdjustInventoryItem, CreateInventoryItem, InventoryFilter},
    ApiResponse, AppState, PaginatedResponse,
};

#[derive(Debug, Serialize, ToSchema)]
pub struct InventoryItemView {
    pub id: i32,
    pub name: String,
    pub category: String,
    pub size: String,
    pub unit: String,
    /// e.g. "Cup 12oz"
    pub label: String,
    pub current_stock: i32,
    pub cost_price: Decimal,
    pub total_value: Decimal,
    pub status: InventoryStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<inventory_item::Model> for InventoryItemView {
    fn from(m: inventory_item::Model) -> Self {
        let label = m.label();
        Self {
            id: m.id,
            name: m.name,
            category: m.category,
            size: m.size,
            unit: m.unit,
            label,
            current_stock: m.current_stock,
            cost_price: m.cost_price,
            total_value: m.total_value,
            status: m.status,
            created_at: m.created_at,
            updated_at: m.updated_at,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MovementView {
    pub id: Uuid,
    pub change_type: MovementType,
    pub previous_stock: i32,
    pub new_stock: i32,
    pub change_amount: i32,
    pub reason: Option<String>,
    pub reference_id: Option<Uuid>,
    pub created_by: Option<i32>,
    pub created_at: DateTime<Utc>,
}

impl From<inventory_movement::Model> for MovementView {
    fn from(m: inventory_movement::Model) -> Self {
        Self {
            id: m.id,
            change_type: m.change_type,
            previous_stock: m.previous_stock,
            new_stock: m.new_stock,
            change_amount: m.change_amount,
            reason: m.reason,
            reference_id: m.reference_id,
            created_by: m.created_by,
            created_at: m.created_at,
        }
    }
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct InventoryFilters {
    /// active or inactive
    pub status: Option<InventoryStatus>,
    /// Only items at or below this stock level
    pub low_stock_threshold: Option<i32>,
}

/// List inventory items
#[utoipa::path(
    get,
    path = "/api/v1/inventory",
    params(InventoryFilters, PaginationParams),
    responses(
        (status = 200, description = "Inventory list returned", body = PaginatedResponse<InventoryItemView>),
        (status = 401, description = "Missing caller identity", body = crate::errors::ErrorResponse)
    ),
    tag = "inventory"
)]
pub async fn list_inventory(
    State(state): State<AppState>,
    _ctx: RequestContext,
    Query(filters): Query<InventoryFilters>,
    Query(pagination): Query<PaginationParams>,
) -> Result<Json<ApiResponse<PaginatedResponse<InventoryItemView>>>, ServiceError> {
    let (page, limit) = pagination.normalized();
    let filter = InventoryFilter {
        status: filters.status,
        low_stock_threshold: filters.low_stock_threshold,
    };

    let (items, total) = state.inventory.list(filter, page, limit).await?;
    let items = items.into_iter().map(InventoryItemView::from).collect();
    Ok(Json(ApiResponse::success(PaginatedResponse::new(
        items, total, page, limit,
    ))))
}

/// Get one inventory item
#[utoipa::path(
    get,
    path = "/api/v1/inventory/{id}",
    params(("id" = i32, Path, description = "Inventory item id")),
    responses(
        (status = 200, description = "Inventory item returned", body = InventoryItemView),
        (status = 404, description = "Inventory item not found", body = crate::errors::ErrorResponse)
    ),
    tag = "inventory"
)]
pub async fn get_inventory(
    State(state): State<AppState>,
    _ctx: RequestContext,
    Path(id): Path<i32>,
) -> Result<Json<ApiResponse<InventoryItemView>>, ServiceError> {
    let item = state.inventory.get(id).await?;
    Ok(Json(ApiResponse::success(item.into())))
}

/// Create an inventory item (admin)
#[utoipa::path(
    post,
    path = "/api/v1/inventory",
    request_body = CreateInventoryItem,
    responses(
        (status = 201, description = "Inventory item created", body = InventoryItemView),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse),
        (status = 403, description = "Admin role required", body = crate::errors::ErrorResponse),
        (status = 409, description = "Item already exists", body = crate::errors::ErrorResponse)
    ),
    tag = "inventory"
)]
pub async fn create_inventory(
    State(state): State<AppState>,
    ctx: RequestContext,
    ValidatedJson(payload): ValidatedJson<CreateInventoryItem>,
) -> Result<(StatusCode, Json<ApiResponse<InventoryItemView>>), ServiceError> {
    let item = state.inventory.create(&ctx, payload).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(item.into()))))
}

/// Adjust stock, cost or status of an inventory item (admin)
#[utoipa::path(
    patch,
    path = "/api/v1/inventory/{id}",
    params(("id" = i32, Path, description = "Inventory item id")),
    request_body = AdjustInventoryItem,
    responses(
        (status = 200, description = "Inventory item updated", body = InventoryItemView),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse),
        (status = 403, description = "Admin role required", body = crate::errors::ErrorResponse),
        (status = 404, description = "Inventory item not found", body = crate::errors::ErrorResponse)
    ),
    tag = "inventory"
)]
pub async fn adjust_inventory(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(id): Path<i32>,
    ValidatedJson(payload): ValidatedJson<AdjustInventoryItem>,
) -> Result<Json<ApiResponse<InventoryItemView>>, ServiceError> {
    let item = state.inventory.adjust(&ctx, id, payload).await?;
    Ok(Json(ApiResponse::success(item.into())))
}

/// Latest stock movements of an inventory item
#[utoipa::path(
    get,
    path = "/api/v1/inventory/{id}/history",
    params(("id" = i32, Path, description = "Inventory item id")),
    responses(
        (status = 200, description = "Movements returned, newest first", body = Vec<MovementView>),
        (status = 404, description = "Inventory item not found", body = crate::errors::ErrorResponse)
    ),
    tag = "inventory"
)]
pub async fn inventory_history(
    State(state): State<AppState>,
    _ctx: RequestContext,
    Path(id): Path<i32>,
) -> Result<Json<ApiResponse<Vec<MovementView>>>, ServiceError> {
    let movements = state.inventory.history(id).await?;
    Ok(Json(ApiResponse::success(
        movements.into_iter().map(MovementView::from).collect(),
    )))
}

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::{
    auth::RequestContext,
    entities::{
        order::{self, OrderStatus, PaymentMethod},
        order_item,
        transaction::{self, TransactionStatus},
    },
    errors::ServiceError,
    handlers::common::PaginationParams,
    services::orders::OrderDetails,
    ApiResponse, AppState, PaginatedResponse,
};

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderView {
    pub id: Uuid,
    pub payment_method: PaymentMethod,
    pub cash_received: Option<Decimal>,
    pub subtotal: Decimal,
    pub total_amount: Decimal,
    pub status: OrderStatus,
    pub created_by: i32,
    pub created_at: DateTime<Utc>,
}

impl From<order::Model> for OrderView {
    fn from(m: order::Model) -> Self {
        Self {
            id: m.id,
            payment_method: m.payment_method,
            cash_received: m.cash_received,
            subtotal: m.subtotal,
            total_amount: m.total_amount,
            status: m.status,
            created_by: m.created_by,
            created_at: m.created_at,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderItemView {
    pub id: Uuid,
    pub product_id: i32,
    pub size_id: Option<i32>,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub addon_total: Decimal,
    pub line_total: Decimal,
    /// Addons as charged
    #[schema(value_type = Object)]
    pub addons: serde_json::Value,
}

impl From<order_item::Model> for OrderItemView {
    fn from(m: order_item::Model) -> Self {
        Self {
            id: m.id,
            product_id: m.product_id,
            size_id: m.size_id,
            quantity: m.quantity,
            unit_price: m.unit_price,
            addon_total: m.addon_total,
            line_total: m.line_total,
            addons: m.addons,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TransactionView {
    pub id: Uuid,
    pub order_id: Uuid,
    pub cashier_id: i32,
    pub total_amount: Decimal,
    pub payment_method: PaymentMethod,
    pub status: TransactionStatus,
    /// Cart snapshot taken at checkout
    #[schema(value_type = Object)]
    pub order_summary: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl From<transaction::Model> for TransactionView {
    fn from(m: transaction::Model) -> Self {
        Self {
            id: m.id,
            order_id: m.order_id,
            cashier_id: m.cashier_id,
            total_amount: m.total_amount,
            payment_method: m.payment_method,
            status: m.status,
            order_summary: m.order_summary,
            created_at: m.created_at,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderDetailsView {
    pub order: OrderView,
    pub items: Vec<OrderItemView>,
    pub transaction: Option<TransactionView>,
}

impl From<OrderDetails> for OrderDetailsView {
    fn from(d: OrderDetails) -> Self {
        Self {
            order: d.order.into(),
            items: d.items.into_iter().map(Into::into).collect(),
            transaction: d.transaction.map(Into::into),
        }
    }
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct OrderFilters {
    /// pending, completed or cancelled
    pub status: Option<String>,
}

/// List orders, newest first
#[utoipa::path(
    get,
    path = "/api/v1/orders",
    params(OrderFilters, PaginationParams),
    responses(
        (status = 200, description = "Orders returned", body = PaginatedResponse<OrderView>),
        (status = 400, description = "Unknown status filter", body = crate::errors::ErrorResponse),
        (status = 401, description = "Missing caller identity", body = crate::errors::ErrorResponse)
    ),
    tag = "orders"
)]
pub async fn list_orders(
    State(state): State<AppState>,
    _ctx: RequestContext,
    Query(filters): Query<OrderFilters>,
    Query(pagination): Query<PaginationParams>,
) -> Result<Json<ApiResponse<PaginatedResponse<OrderView>>>, ServiceError> {
    let status = filters
        .status
        .as_deref()
        .map(|s| {
            OrderStatus::from_str(s)
                .map_err(|_| ServiceError::ValidationError(format!("Unknown order status '{}'", s)))
        })
        .transpose()?;
    let (page, limit) = pagination.normalized();

    let (orders, total) = state.orders.list_orders(status, page, limit).await?;
    let items = orders.into_iter().map(OrderView::from).collect();
    Ok(Json(ApiResponse::success(PaginatedResponse::new(
        items, total, page, limit,
    ))))
}

/// Get an order with its line items and transaction
#[utoipa::path(
    get,
    path = "/api/v1/orders/{id}",
    params(("id" = Uuid, Path, description = "Order id")),
    responses(
        (status = 200, description = "Order returned", body = OrderDetailsView),
        (status = 401, description = "Missing caller identity", body = crate::errors::ErrorResponse),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse)
    ),
    tag = "orders"
)]
pub async fn get_order(
    State(state): State<AppState>,
    _ctx: RequestContext,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<OrderDetailsView>>, ServiceError> {
    let details = state.orders.get_order(id).await?;
    Ok(Json(ApiResponse::success(details.into())))
}

/// List transactions, newest first
#[utoipa::path(
    get,
    path = "/api/v1/transactions",
    params(PaginationParams),
    responses(
        (status = 200, description = "Transactions returned", body = PaginatedResponse<TransactionView>),
        (status = 401, description = "Missing caller identity", body = crate::errors::ErrorResponse)
    ),
    tag = "orders"
)]
pub async fn list_transactions(
    State(state): State<AppState>,
    _ctx: RequestContext,
    Query(pagination): Query<PaginationParams>,
) -> Result<Json<ApiResponse<PaginatedResponse<TransactionView>>>, ServiceError> {
    let (page, limit) = pagination.normalized();
    let (transactions, total) = state.orders.list_transactions(page, limit).await?;
    let items = transactions.into_iter().map(TransactionView::from).collect();
    Ok(Json(ApiResponse::success(PaginatedResponse::new(
        items, total, page, limit,
    ))))
}

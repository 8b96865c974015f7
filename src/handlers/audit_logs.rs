use axum::{
    extract::{Query, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::{
    auth::RequestContext, entities::audit_log, errors::ServiceError,
    handlers::common::PaginationParams, ApiResponse, AppState, PaginatedResponse,
};

#[derive(Debug, Serialize, ToSchema)]
pub struct AuditLogView {
    pub id: Uuid,
    pub user_id: i32,
    pub action: String,
    pub details: String,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<audit_log::Model> for AuditLogView {
    fn from(m: audit_log::Model) -> Self {
        Self {
            id: m.id,
            user_id: m.user_id,
            action: m.action,
            details: m.details,
            ip_address: m.ip_address,
            user_agent: m.user_agent,
            created_at: m.created_at,
        }
    }
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct AuditLogFilters {
    /// e.g. order_completed
    pub action: Option<String>,
}

/// Browse the audit log (admin)
#[utoipa::path(
    get,
    path = "/api/v1/audit-logs",
    params(AuditLogFilters, PaginationParams),
    responses(
        (status = 200, description = "Audit entries returned, newest first", body = PaginatedResponse<AuditLogView>),
        (status = 403, description = "Admin role required", body = crate::errors::ErrorResponse)
    ),
    tag = "audit"
)]
pub async fn list_audit_logs(
    State(state): State<AppState>,
    ctx: RequestContext,
    Query(filters): Query<AuditLogFilters>,
    Query(pagination): Query<PaginationParams>,
) -> Result<Json<ApiResponse<PaginatedResponse<AuditLogView>>>, ServiceError> {
    ctx.require_admin("read audit logs")?;
    let (page, limit) = pagination.normalized();

    let (entries, total) = state.audit_logs.list(filters.action, page, limit).await?;
    let items = entries.into_iter().map(AuditLogView::from).collect();
    Ok(Json(ApiResponse::success(PaginatedResponse::new(
        items, total, page, limit,
    ))))
}

use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Cafe POS API",
        version = "0.1.0",
        description = r#"
# Cafe POS API

Checkout and inventory service for a café point of sale.

## Caller identity

Login happens upstream. Every request carries the authenticated caller as headers:

```
x-user-id: 42
x-user-role: cashier
```

`x-user-role` is `admin` or `cashier` and defaults to `cashier`. Creating or
adjusting inventory and reading the audit log require `admin`.

## Money

Amounts are decimal strings, e.g. `"100.50"`.

## Error Handling

Errors share one shape:

```json
{
  "error": "Unprocessable Entity",
  "error_kind": "insufficient_stock",
  "message": "Insufficient inventory for Cup 12oz: need 2, have 1",
  "request_id": "7c3f...",
  "timestamp": "2024-01-01T00:00:00Z"
}
```

## Pagination

List endpoints take `page` (default 1) and `limit` (default 20, max 100).
        "#,
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development")
    ),
    tags(
        (name = "checkout", description = "Ring up carts"),
        (name = "orders", description = "Recorded orders and transactions"),
        (name = "inventory", description = "Stock levels and adjustments"),
        (name = "audit", description = "Activity log"),
        (name = "health", description = "Health check endpoints")
    ),
    paths(
        // Checkout
        crate::handlers::checkout::checkout,

        // Orders
        crate::handlers::orders::list_orders,
        crate::handlers::orders::get_order,
        crate::handlers::orders::list_transactions,

        // Inventory
        crate::handlers::inventory::list_inventory,
        crate::handlers::inventory::get_inventory,
        crate::handlers::inventory::create_inventory,
        crate::handlers::inventory::adjust_inventory,
        crate::handlers::inventory::inventory_history,

        // Audit
        crate::handlers::audit_logs::list_audit_logs,

        // Health
        crate::health_check,
        crate::api_status,
    ),
    components(
        schemas(
            crate::errors::ErrorResponse,
            crate::auth::Role,
            crate::services::checkout::CheckoutRequest,
            crate::services::checkout::CartLine,
            crate::services::checkout::CheckoutResult,
            crate::services::checkout::Receipt,
            crate::services::pricing::PricedLine,
            crate::services::pricing::PricedAddon,
            crate::services::inventory::CreateInventoryItem,
            crate::services::inventory::AdjustInventoryItem,
            crate::handlers::orders::OrderView,
            crate::handlers::orders::OrderItemView,
            crate::handlers::orders::TransactionView,
            crate::handlers::orders::OrderDetailsView,
            crate::handlers::inventory::InventoryItemView,
            crate::handlers::inventory::MovementView,
            crate::handlers::audit_logs::AuditLogView,
            crate::entities::order::PaymentMethod,
            crate::entities::order::OrderStatus,
            crate::entities::transaction::TransactionStatus,
            crate::entities::inventory_item::InventoryStatus,
            crate::entities::inventory_movement::MovementType,
        )
    )
)]
pub struct ApiDocV1;

pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/swagger-ui")
        .url("/api-docs/openapi.json", ApiDocV1::openapi())
        .config(utoipa_swagger_ui::Config::from("/api-docs/openapi.json").try_it_out_enabled(true))
}

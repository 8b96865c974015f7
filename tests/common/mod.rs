#![allow(dead_code)]

use std::str::FromStr;
use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{Method, Request, StatusCode},
    Router,
};
use chrono::Utc;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    Set,
};
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use cafe_pos_api::{
    app_router,
    auth::{Role, USER_ID_HEADER, USER_ROLE_HEADER},
    config::AppConfig,
    db,
    entities::{
        addon, inventory_item, inventory_movement, order, product, product_price, size,
        transaction,
    },
    services::audit::AuditSink,
    AppState,
};

pub const CASHIER_ID: i32 = 7;
pub const ADMIN_ID: i32 = 1;

/// Size ids of the seeded catalog
pub const SIZE_8OZ: i32 = 1;
pub const SIZE_12OZ: i32 = 2;
pub const SIZE_16OZ: i32 = 3;

/// Product ids of the seeded catalog
pub const AMERICANO: i32 = 1;
pub const LATTE: i32 = 2;

pub const EXTRA_SHOT: i32 = 1;

/// Application backed by a throwaway SQLite file with a small seeded catalog.
///
/// Catalog:
/// - sizes 8oz (₱40), 12oz (₱50), 16oz (₱65)
/// - Americano (base ₱45), Cafe Latte (base ₱55, ₱60 for 12oz)
/// - Extra Shot addon (₱20)
///
/// No cups are stocked; tests add the ones they need with [`TestApp::seed_cup`].
pub struct TestApp {
    router: Router,
    pub state: AppState,
    pub db: Arc<DatabaseConnection>,
    _dir: TempDir,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::build(None).await
    }

    pub async fn with_audit_sink(sink: Arc<dyn AuditSink>) -> Self {
        Self::build(Some(sink)).await
    }

    async fn build(sink: Option<Arc<dyn AuditSink>>) -> Self {
        let dir = tempfile::tempdir().expect("temp dir");
        let db_path = dir.path().join("cafe_pos_test.db");

        let mut cfg = AppConfig::new(
            format!("sqlite://{}?mode=rwc", db_path.display()),
            "127.0.0.1".to_string(),
            18_080,
            "test".to_string(),
        );
        cfg.db_max_connections = 5;
        cfg.db_min_connections = 1;

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");

        let db = Arc::new(pool);
        seed_catalog(&db).await;

        let state = match sink {
            Some(sink) => AppState::with_audit_sink(db.clone(), cfg, sink),
            None => AppState::new(db.clone(), cfg),
        };
        let router = app_router(state.clone());

        Self {
            router,
            state,
            db,
            _dir: dir,
        }
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        headers: &[(&str, String)],
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        for (name, value) in headers {
            builder = builder.header(*name, value.as_str());
        }
        let request = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("request");

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router response");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, value)
    }

    pub async fn as_cashier(&self, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        self.request(method, uri, body, &identity(CASHIER_ID, Role::Cashier))
            .await
    }

    pub async fn as_admin(&self, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        self.request(method, uri, body, &identity(ADMIN_ID, Role::Admin))
            .await
    }

    /// Stocks a "Cup / Packaging / {ounces} / Ounce" item at ₱2.50 per cup.
    pub async fn seed_cup(&self, ounces: &str, stock: i32) -> inventory_item::Model {
        let now = Utc::now();
        inventory_item::ActiveModel {
            name: Set("Cup".to_string()),
            category: Set("Packaging".to_string()),
            size: Set(ounces.to_string()),
            unit: Set("Ounce".to_string()),
            current_stock: Set(stock),
            cost_price: Set(dec!(2.50)),
            total_value: Set(dec!(2.50) * Decimal::from(stock)),
            status: Set(inventory_item::InventoryStatus::Active),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(self.db.as_ref())
        .await
        .expect("seed cup")
    }

    pub async fn stock_of(&self, item_id: i32) -> i32 {
        inventory_item::Entity::find_by_id(item_id)
            .one(self.db.as_ref())
            .await
            .expect("query")
            .expect("inventory item")
            .current_stock
    }

    pub async fn order_count(&self) -> u64 {
        order::Entity::find()
            .count(self.db.as_ref())
            .await
            .expect("count orders")
    }

    pub async fn transaction_count(&self) -> u64 {
        transaction::Entity::find()
            .count(self.db.as_ref())
            .await
            .expect("count transactions")
    }

    pub async fn sale_movement_count(&self) -> u64 {
        inventory_movement::Entity::find()
            .filter(
                inventory_movement::Column::ChangeType
                    .eq(inventory_movement::MovementType::Sale),
            )
            .count(self.db.as_ref())
            .await
            .expect("count movements")
    }

    pub async fn set_size_default_price(&self, size_id: i32, price: Decimal) {
        let size = size::Entity::find_by_id(size_id)
            .one(self.db.as_ref())
            .await
            .expect("query")
            .expect("size");
        let mut active: size::ActiveModel = size.into();
        active.default_price = Set(price);
        active.update(self.db.as_ref()).await.expect("update size");
    }
}

pub fn identity(user_id: i32, role: Role) -> Vec<(&'static str, String)> {
    vec![
        (USER_ID_HEADER, user_id.to_string()),
        (USER_ROLE_HEADER, role.to_string()),
        ("user-agent", "till-test/1.0".to_string()),
    ]
}

/// Parses a decimal serialized as a JSON string or number.
pub fn decimal(value: &Value) -> Decimal {
    match value {
        Value::String(s) => Decimal::from_str(s).expect("decimal string"),
        Value::Number(n) => Decimal::from_str(&n.to_string()).expect("decimal number"),
        other => panic!("not a decimal: {other}"),
    }
}

async fn seed_catalog(db: &DatabaseConnection) {
    for (name, price) in [("8oz", dec!(40)), ("12oz", dec!(50)), ("16oz", dec!(65))] {
        size::ActiveModel {
            name: Set(name.to_string()),
            default_price: Set(price),
            is_active: Set(true),
            ..Default::default()
        }
        .insert(db)
        .await
        .expect("seed size");
    }

    for (name, base_price) in [("Americano", dec!(45)), ("Cafe Latte", dec!(55))] {
        product::ActiveModel {
            name: Set(name.to_string()),
            base_price: Set(base_price),
            is_active: Set(true),
            ..Default::default()
        }
        .insert(db)
        .await
        .expect("seed product");
    }

    product_price::ActiveModel {
        product_id: Set(LATTE),
        size_id: Set(SIZE_12OZ),
        price: Set(dec!(60)),
        ..Default::default()
    }
    .insert(db)
    .await
    .expect("seed price override");

    addon::ActiveModel {
        name: Set("Extra Shot".to_string()),
        price: Set(dec!(20)),
        is_active: Set(true),
        ..Default::default()
    }
    .insert(db)
    .await
    .expect("seed addon");
}

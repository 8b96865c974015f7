//! Inventory ledger and back-office stock management.
//!
//! Every stock change goes through a guarded update that only succeeds while
//! `current_stock >= quantity`, so stock never goes negative. Each change also
//! writes one `inventory_movements` row.

use std::sync::Arc;

use chrono::Utc;
use metrics::counter;
use rust_decimal::Decimal;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection,
    DbBackend, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set,
};
use serde::Deserialize;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    auth::RequestContext,
    db,
    entities::{
        inventory_item::{self, InventoryStatus},
        inventory_movement::{self, MovementType},
    },
    errors::ServiceError,
    services::{
        audit::{AuditDispatcher, AuditEntry, INVENTORY_CREATED, INVENTORY_UPDATED},
        catalog::SkuKey,
    },
};

/// Number of movements returned by [`InventoryService::history`].
pub const HISTORY_LIMIT: u64 = 50;

/// Result of a successful deduction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deduction {
    pub item_id: i32,
    pub sku: String,
    pub previous_stock: i32,
    pub new_stock: i32,
}

/// Checks and deducts stock inside a caller-provided transaction.
#[derive(Debug, Clone, Default)]
pub struct InventoryLedger;

impl InventoryLedger {
    pub fn new() -> Self {
        Self
    }

    /// Deducts `quantity` units of `key` for an order.
    ///
    /// Fails with `NotFound` when no item matches the key and with
    /// `InsufficientStock` when the guarded update matches no row. On
    /// Postgres the item row is also locked `FOR UPDATE`; on SQLite the
    /// enclosing write transaction serializes writers.
    #[instrument(skip(self, conn), fields(sku = %key))]
    pub async fn check_and_deduct<C>(
        &self,
        conn: &C,
        key: &SkuKey,
        quantity: i32,
        order_id: Uuid,
        cashier_id: i32,
    ) -> Result<Deduction, ServiceError>
    where
        C: ConnectionTrait,
    {
        if quantity <= 0 {
            return Err(ServiceError::ValidationError(format!(
                "Deduction quantity must be positive, got {}",
                quantity
            )));
        }

        let mut query = inventory_item::Entity::find()
            .filter(inventory_item::Column::Name.eq(key.name.as_str()))
            .filter(inventory_item::Column::Size.eq(key.size.as_str()))
            .filter(inventory_item::Column::Unit.eq(key.unit.as_str()))
            .order_by_asc(inventory_item::Column::Id);
        if conn.get_database_backend() == DbBackend::Postgres {
            query = query.lock_exclusive();
        }

        let item = query
            .one(conn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Inventory item {} not found", key)))?;

        if item.current_stock < quantity {
            return Err(insufficient(key, quantity, item.current_stock));
        }

        let now = Utc::now();
        let updated = inventory_item::Entity::update_many()
            .col_expr(
                inventory_item::Column::CurrentStock,
                Expr::col(inventory_item::Column::CurrentStock).sub(quantity),
            )
            .col_expr(inventory_item::Column::UpdatedAt, Expr::value(now))
            .filter(inventory_item::Column::Id.eq(item.id))
            .filter(inventory_item::Column::CurrentStock.gte(quantity))
            .exec(conn)
            .await?;

        if updated.rows_affected == 0 {
            // Lost the race between read and write
            let available = inventory_item::Entity::find_by_id(item.id)
                .one(conn)
                .await?
                .map(|i| i.current_stock)
                .unwrap_or(0);
            return Err(insufficient(key, quantity, available));
        }

        let item = inventory_item::Entity::find_by_id(item.id)
            .one(conn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Inventory item {} not found", key)))?;
        let new_stock = item.current_stock;
        let previous_stock = new_stock + quantity;

        let total_value = item.cost_price * Decimal::from(new_stock);
        let mut active: inventory_item::ActiveModel = item.clone().into();
        active.total_value = Set(total_value);
        active.update(conn).await?;

        record_movement(
            conn,
            item.id,
            MovementType::Sale,
            previous_stock,
            new_stock,
            Some(format!("Order {}", order_id)),
            Some(order_id),
            Some(cashier_id),
        )
        .await?;

        counter!("cafe_pos.inventory.deducted", quantity as u64, "sku" => key.to_string());
        info!(
            item_id = item.id,
            previous_stock, new_stock, "Inventory deducted"
        );

        Ok(Deduction {
            item_id: item.id,
            sku: key.to_string(),
            previous_stock,
            new_stock,
        })
    }
}

fn insufficient(key: &SkuKey, requested: i32, available: i32) -> ServiceError {
    counter!("cafe_pos.inventory.insufficient", 1, "sku" => key.to_string());
    warn!(sku = %key, requested, available, "Insufficient inventory");
    ServiceError::InsufficientStock {
        sku: key.to_string(),
        requested,
        available,
    }
}

#[allow(clippy::too_many_arguments)]
async fn record_movement<C: ConnectionTrait>(
    conn: &C,
    item_id: i32,
    change_type: MovementType,
    previous_stock: i32,
    new_stock: i32,
    reason: Option<String>,
    reference_id: Option<Uuid>,
    created_by: Option<i32>,
) -> Result<(), ServiceError> {
    inventory_movement::ActiveModel {
        id: Set(Uuid::new_v4()),
        inventory_item_id: Set(item_id),
        change_type: Set(change_type),
        previous_stock: Set(previous_stock),
        new_stock: Set(new_stock),
        change_amount: Set(new_stock - previous_stock),
        reason: Set(reason),
        reference_id: Set(reference_id),
        created_by: Set(created_by),
        created_at: Set(Utc::now()),
    }
    .insert(conn)
    .await?;
    Ok(())
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct InventoryFilter {
    pub status: Option<InventoryStatus>,
    /// Only items with `current_stock <= threshold`
    pub low_stock_threshold: Option<i32>,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateInventoryItem {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[validate(length(min = 1, max = 100))]
    pub category: String,
    #[validate(length(min = 1, max = 50))]
    pub size: String,
    #[validate(length(min = 1, max = 50))]
    pub unit: String,
    #[validate(range(min = 0))]
    pub current_stock: i32,
    pub cost_price: Decimal,
}

/// Partial update. `current_stock` is an absolute count, not a delta.
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct AdjustInventoryItem {
    #[validate(range(min = 0))]
    pub current_stock: Option<i32>,
    pub cost_price: Option<Decimal>,
    pub status: Option<InventoryStatus>,
    #[validate(length(max = 255))]
    pub reason: Option<String>,
}

impl AdjustInventoryItem {
    fn is_empty(&self) -> bool {
        self.current_stock.is_none() && self.cost_price.is_none() && self.status.is_none()
    }
}

/// Back-office management of inventory items.
#[derive(Clone)]
pub struct InventoryService {
    db: Arc<DatabaseConnection>,
    audit: AuditDispatcher,
}

impl InventoryService {
    pub fn new(db: Arc<DatabaseConnection>, audit: AuditDispatcher) -> Self {
        Self { db, audit }
    }

    /// Items ordered by name then size.
    #[instrument(skip(self))]
    pub async fn list(
        &self,
        filter: InventoryFilter,
        page: u64,
        limit: u64,
    ) -> Result<(Vec<inventory_item::Model>, u64), ServiceError> {
        let mut query = inventory_item::Entity::find();
        if let Some(status) = filter.status {
            query = query.filter(inventory_item::Column::Status.eq(status));
        }
        if let Some(threshold) = filter.low_stock_threshold {
            query = query.filter(inventory_item::Column::CurrentStock.lte(threshold));
        }

        let paginator = query
            .order_by_asc(inventory_item::Column::Name)
            .order_by_asc(inventory_item::Column::Size)
            .order_by_asc(inventory_item::Column::Id)
            .paginate(self.db.as_ref(), limit.max(1));
        let total = paginator.num_items().await?;
        let items = paginator.fetch_page(page.saturating_sub(1)).await?;
        Ok((items, total))
    }

    #[instrument(skip(self))]
    pub async fn get(&self, id: i32) -> Result<inventory_item::Model, ServiceError> {
        inventory_item::Entity::find_by_id(id)
            .one(self.db.as_ref())
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Inventory item {} not found", id)))
    }

    #[instrument(skip(self, ctx, input), fields(user_id = ctx.user_id))]
    pub async fn create(
        &self,
        ctx: &RequestContext,
        input: CreateInventoryItem,
    ) -> Result<inventory_item::Model, ServiceError> {
        ctx.require_admin("create inventory items")?;
        input.validate()?;
        if input.cost_price.is_sign_negative() {
            return Err(ServiceError::ValidationError(
                "cost_price must not be negative".to_string(),
            ));
        }

        let actor = ctx.user_id;
        let item = db::transaction(self.db.as_ref(), "inventory_create", move |txn| {
            Box::pin(async move {
                let duplicate = inventory_item::Entity::find()
                    .filter(inventory_item::Column::Name.eq(input.name.as_str()))
                    .filter(inventory_item::Column::Category.eq(input.category.as_str()))
                    .filter(inventory_item::Column::Size.eq(input.size.as_str()))
                    .filter(inventory_item::Column::Unit.eq(input.unit.as_str()))
                    .one(txn)
                    .await?;
                if duplicate.is_some() {
                    return Err(ServiceError::Conflict(format!(
                        "Inventory item {} / {} / {} / {} already exists",
                        input.name, input.category, input.size, input.unit
                    )));
                }

                let now = Utc::now();
                let item = inventory_item::ActiveModel {
                    name: Set(input.name),
                    category: Set(input.category),
                    size: Set(input.size),
                    unit: Set(input.unit),
                    current_stock: Set(input.current_stock),
                    cost_price: Set(input.cost_price),
                    total_value: Set(input.cost_price * Decimal::from(input.current_stock)),
                    status: Set(InventoryStatus::Active),
                    created_at: Set(now),
                    updated_at: Set(now),
                    ..Default::default()
                }
                .insert(txn)
                .await?;

                record_movement(
                    txn,
                    item.id,
                    MovementType::Initial,
                    0,
                    item.current_stock,
                    Some("Initial stock".to_string()),
                    None,
                    Some(actor),
                )
                .await?;

                Ok(item)
            })
        })
        .await?;

        info!(item_id = item.id, label = %item.label(), "Inventory item created");
        self.audit.dispatch(AuditEntry::new(
            ctx,
            INVENTORY_CREATED,
            format!("Item ID: {}, {}, Stock: {}", item.id, item.label(), item.current_stock),
        ));
        Ok(item)
    }

    /// Applies a manual adjustment and recomputes `total_value`.
    #[instrument(skip(self, ctx, input), fields(user_id = ctx.user_id))]
    pub async fn adjust(
        &self,
        ctx: &RequestContext,
        id: i32,
        input: AdjustInventoryItem,
    ) -> Result<inventory_item::Model, ServiceError> {
        ctx.require_admin("adjust inventory")?;
        input.validate()?;
        if input.is_empty() {
            return Err(ServiceError::ValidationError(
                "At least one of current_stock, cost_price or status is required".to_string(),
            ));
        }
        if input.cost_price.is_some_and(|c| c.is_sign_negative()) {
            return Err(ServiceError::ValidationError(
                "cost_price must not be negative".to_string(),
            ));
        }

        let actor = ctx.user_id;
        let (item, previous_stock) =
            db::transaction(self.db.as_ref(), "inventory_adjust", move |txn| {
                Box::pin(async move {
                    let mut query = inventory_item::Entity::find_by_id(id);
                    if txn.get_database_backend() == DbBackend::Postgres {
                        query = query.lock_exclusive();
                    }
                    let current = query.one(txn).await?.ok_or_else(|| {
                        ServiceError::NotFound(format!("Inventory item {} not found", id))
                    })?;

                    let previous_stock = current.current_stock;
                    let new_stock = input.current_stock.unwrap_or(previous_stock);
                    let cost_price = input.cost_price.unwrap_or(current.cost_price);

                    let mut active: inventory_item::ActiveModel = current.into();
                    active.current_stock = Set(new_stock);
                    active.cost_price = Set(cost_price);
                    active.total_value = Set(cost_price * Decimal::from(new_stock));
                    if let Some(status) = input.status {
                        active.status = Set(status);
                    }
                    active.updated_at = Set(Utc::now());
                    let item = active.update(txn).await?;

                    if new_stock != previous_stock {
                        record_movement(
                            txn,
                            item.id,
                            MovementType::Adjustment,
                            previous_stock,
                            new_stock,
                            input.reason.or_else(|| Some("Manual adjustment".to_string())),
                            None,
                            Some(actor),
                        )
                        .await?;
                    }

                    Ok((item, previous_stock))
                })
            })
            .await?;

        info!(
            item_id = item.id,
            previous_stock,
            new_stock = item.current_stock,
            "Inventory item adjusted"
        );
        self.audit.dispatch(AuditEntry::new(
            ctx,
            INVENTORY_UPDATED,
            format!(
                "Item ID: {}, {}, Stock: {} -> {}",
                item.id,
                item.label(),
                previous_stock,
                item.current_stock
            ),
        ));
        Ok(item)
    }

    /// Latest movements first.
    #[instrument(skip(self))]
    pub async fn history(
        &self,
        id: i32,
    ) -> Result<Vec<inventory_movement::Model>, ServiceError> {
        self.get(id).await?;
        let movements = inventory_movement::Entity::find()
            .filter(inventory_movement::Column::InventoryItemId.eq(id))
            .order_by_desc(inventory_movement::Column::CreatedAt)
            .limit(HISTORY_LIMIT)
            .all(self.db.as_ref())
            .await?;
        Ok(movements)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{establish_connection_with_config, run_migrations, DbConfig};
    use assert_matches::assert_matches;
    use sea_orm::TransactionTrait;

    async fn seeded(stock: i32) -> (DatabaseConnection, i32) {
        let cfg = DbConfig {
            url: "sqlite::memory:".to_string(),
            max_connections: 1,
            ..Default::default()
        };
        let db = establish_connection_with_config(&cfg).await.unwrap();
        run_migrations(&db).await.unwrap();

        let now = Utc::now();
        let item = inventory_item::ActiveModel {
            name: Set("Cup".into()),
            category: Set("Packaging".into()),
            size: Set("12".into()),
            unit: Set("Ounce".into()),
            current_stock: Set(stock),
            cost_price: Set(Decimal::new(250, 2)),
            total_value: Set(Decimal::new(250, 2) * Decimal::from(stock)),
            status: Set(InventoryStatus::Active),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&db)
        .await
        .unwrap();
        (db, item.id)
    }

    #[tokio::test]
    async fn deducts_and_records_movement() {
        let (db, item_id) = seeded(10).await;
        let order_id = Uuid::new_v4();

        let txn = db.begin().await.unwrap();
        let deduction = InventoryLedger::new()
            .check_and_deduct(&txn, &SkuKey::cup("12"), 3, order_id, 4)
            .await
            .unwrap();
        txn.commit().await.unwrap();

        assert_eq!(deduction.previous_stock, 10);
        assert_eq!(deduction.new_stock, 7);

        let item = inventory_item::Entity::find_by_id(item_id)
            .one(&db)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(item.current_stock, 7);
        assert_eq!(item.total_value, Decimal::new(1750, 2));

        let movements = inventory_movement::Entity::find().all(&db).await.unwrap();
        assert_eq!(movements.len(), 1);
        assert_eq!(movements[0].change_type, MovementType::Sale);
        assert_eq!(movements[0].change_amount, -3);
        assert_eq!(movements[0].reference_id, Some(order_id));
    }

    #[tokio::test]
    async fn refuses_to_go_negative() {
        let (db, item_id) = seeded(2).await;

        let txn = db.begin().await.unwrap();
        let err = InventoryLedger::new()
            .check_and_deduct(&txn, &SkuKey::cup("12"), 3, Uuid::new_v4(), 4)
            .await
            .unwrap_err();
        txn.rollback().await.unwrap();

        assert_matches!(
            err,
            ServiceError::InsufficientStock { requested: 3, available: 2, .. }
        );
        let item = inventory_item::Entity::find_by_id(item_id)
            .one(&db)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(item.current_stock, 2);
    }

    #[tokio::test]
    async fn unknown_sku_is_not_found() {
        let (db, _) = seeded(5).await;
        let err = InventoryLedger::new()
            .check_and_deduct(&db, &SkuKey::cup("20"), 1, Uuid::new_v4(), 4)
            .await
            .unwrap_err();
        assert_matches!(err, ServiceError::NotFound(_));
    }
}

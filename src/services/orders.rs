use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    ModelTrait, PaginatorTrait, QueryFilter, QueryOrder, Set,
};
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::{
    entities::{
        order::{self, OrderStatus, PaymentMethod},
        order_item,
        transaction::{self, TransactionStatus},
    },
    errors::ServiceError,
    services::pricing::PricedLine,
};

/// Everything needed to persist one completed checkout.
#[derive(Debug, Clone)]
pub struct NewOrder<'a> {
    pub order_id: Uuid,
    pub lines: &'a [PricedLine],
    pub payment_method: PaymentMethod,
    pub cash_received: Option<Decimal>,
    pub subtotal: Decimal,
    pub total_amount: Decimal,
    pub cashier_id: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordedOrder {
    pub order_id: Uuid,
    pub transaction_id: Uuid,
}

/// Writes the order, its line items and its transaction on the caller's
/// connection. Does no business validation.
#[derive(Debug, Clone, Default)]
pub struct OrderRecorder;

impl OrderRecorder {
    pub fn new() -> Self {
        Self
    }

    #[instrument(skip(self, conn, new_order), fields(order_id = %new_order.order_id))]
    pub async fn record_order<C>(
        &self,
        conn: &C,
        new_order: &NewOrder<'_>,
    ) -> Result<RecordedOrder, ServiceError>
    where
        C: ConnectionTrait,
    {
        order::ActiveModel {
            id: Set(new_order.order_id),
            payment_method: Set(new_order.payment_method),
            cash_received: Set(new_order.cash_received),
            subtotal: Set(new_order.subtotal),
            total_amount: Set(new_order.total_amount),
            status: Set(OrderStatus::Completed),
            created_by: Set(new_order.cashier_id),
            created_at: Set(new_order.created_at),
        }
        .insert(conn)
        .await?;

        for line in new_order.lines {
            order_item::ActiveModel {
                id: Set(Uuid::new_v4()),
                order_id: Set(new_order.order_id),
                product_id: Set(line.product_id),
                size_id: Set(line.size_id),
                quantity: Set(line.quantity),
                unit_price: Set(line.unit_price),
                addon_total: Set(line.addon_total),
                line_total: Set(line.line_total),
                addons: Set(serde_json::to_value(&line.addons)?),
            }
            .insert(conn)
            .await?;
        }

        let transaction_id = Uuid::new_v4();
        transaction::ActiveModel {
            id: Set(transaction_id),
            order_id: Set(new_order.order_id),
            cashier_id: Set(new_order.cashier_id),
            order_summary: Set(serde_json::to_value(new_order.lines)?),
            total_amount: Set(new_order.total_amount),
            payment_method: Set(new_order.payment_method),
            status: Set(TransactionStatus::Completed),
            created_at: Set(new_order.created_at),
        }
        .insert(conn)
        .await?;

        debug!(%transaction_id, lines = new_order.lines.len(), "Order recorded");
        Ok(RecordedOrder {
            order_id: new_order.order_id,
            transaction_id,
        })
    }
}

/// An order with its line items and transaction.
#[derive(Debug, Clone)]
pub struct OrderDetails {
    pub order: order::Model,
    pub items: Vec<order_item::Model>,
    pub transaction: Option<transaction::Model>,
}

/// Read-only access to recorded orders and transactions.
#[derive(Clone)]
pub struct OrderQueryService {
    db: Arc<DatabaseConnection>,
}

impl OrderQueryService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Newest first. `page` is 1-based.
    #[instrument(skip(self))]
    pub async fn list_orders(
        &self,
        status: Option<OrderStatus>,
        page: u64,
        limit: u64,
    ) -> Result<(Vec<order::Model>, u64), ServiceError> {
        let mut query = order::Entity::find();
        if let Some(status) = status {
            query = query.filter(order::Column::Status.eq(status));
        }

        let paginator = query
            .order_by_desc(order::Column::CreatedAt)
            .paginate(self.db.as_ref(), limit.max(1));
        let total = paginator.num_items().await?;
        let orders = paginator.fetch_page(page.saturating_sub(1)).await?;
        Ok((orders, total))
    }

    #[instrument(skip(self))]
    pub async fn get_order(&self, order_id: Uuid) -> Result<OrderDetails, ServiceError> {
        let db = self.db.as_ref();
        let order = order::Entity::find_by_id(order_id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        let items = order
            .find_related(order_item::Entity)
            .order_by_asc(order_item::Column::ProductId)
            .all(db)
            .await?;
        let transaction = order.find_related(transaction::Entity).one(db).await?;

        Ok(OrderDetails {
            order,
            items,
            transaction,
        })
    }

    /// Newest first. `page` is 1-based.
    #[instrument(skip(self))]
    pub async fn list_transactions(
        &self,
        page: u64,
        limit: u64,
    ) -> Result<(Vec<transaction::Model>, u64), ServiceError> {
        let paginator = transaction::Entity::find()
            .order_by_desc(transaction::Column::CreatedAt)
            .paginate(self.db.as_ref(), limit.max(1));
        let total = paginator.num_items().await?;
        let transactions = paginator.fetch_page(page.saturating_sub(1)).await?;
        Ok((transactions, total))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{establish_connection_with_config, run_migrations, DbConfig};
    use crate::services::pricing::{subtotal, PricedAddon};
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn records_order_items_and_transaction() {
        let cfg = DbConfig {
            url: "sqlite::memory:".to_string(),
            max_connections: 1,
            ..Default::default()
        };
        let db = establish_connection_with_config(&cfg).await.unwrap();
        run_migrations(&db).await.unwrap();

        let lines = vec![
            PricedLine::new(
                1,
                Some(2),
                2,
                dec!(50),
                vec![PricedAddon {
                    addon_id: 3,
                    price: dec!(15),
                }],
            ),
            PricedLine::new(4, None, 1, dec!(35), vec![]),
        ];
        let total = subtotal(&lines);
        let new_order = NewOrder {
            order_id: Uuid::new_v4(),
            lines: &lines,
            payment_method: PaymentMethod::Card,
            cash_received: None,
            subtotal: total,
            total_amount: total,
            cashier_id: 9,
            created_at: Utc::now(),
        };

        let recorded = OrderRecorder::new()
            .record_order(&db, &new_order)
            .await
            .unwrap();
        assert_eq!(recorded.order_id, new_order.order_id);

        let details = OrderQueryService::new(Arc::new(db))
            .get_order(recorded.order_id)
            .await
            .unwrap();
        assert_eq!(details.order.total_amount, dec!(165));
        assert_eq!(details.order.status, OrderStatus::Completed);
        assert_eq!(details.items.len(), 2);
        let txn = details.transaction.unwrap();
        assert_eq!(txn.id, recorded.transaction_id);
        assert_eq!(txn.cashier_id, 9);
        assert_eq!(txn.order_summary[0]["productID"], 1);
    }
}

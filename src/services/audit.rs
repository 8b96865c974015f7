use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use metrics::counter;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set,
};
use tokio::task::JoinHandle;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::{auth::RequestContext, entities::audit_log, errors::ServiceError};

pub const ORDER_COMPLETED: &str = "order_completed";
pub const ORDER_FAILED: &str = "order_failed";
pub const INVENTORY_CREATED: &str = "inventory_created";
pub const INVENTORY_UPDATED: &str = "inventory_updated";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditEntry {
    pub user_id: i32,
    pub action: String,
    pub details: String,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

impl AuditEntry {
    pub fn new(ctx: &RequestContext, action: &str, details: impl Into<String>) -> Self {
        Self {
            user_id: ctx.user_id,
            action: action.to_string(),
            details: details.into(),
            ip_address: ctx.ip_address.clone(),
            user_agent: ctx.user_agent.clone(),
        }
    }
}

/// Append-only activity log.
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record(&self, entry: AuditEntry) -> Result<(), ServiceError>;
}

/// Writes audit entries to the `audit_logs` table.
#[derive(Clone)]
pub struct DbAuditSink {
    db: Arc<DatabaseConnection>,
}

impl DbAuditSink {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl AuditSink for DbAuditSink {
    async fn record(&self, entry: AuditEntry) -> Result<(), ServiceError> {
        audit_log::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(entry.user_id),
            action: Set(entry.action),
            details: Set(entry.details),
            ip_address: Set(entry.ip_address),
            user_agent: Set(entry.user_agent),
            created_at: Set(Utc::now()),
        }
        .insert(self.db.as_ref())
        .await
        .map_err(|e| ServiceError::AuditWrite(e.to_string()))?;
        Ok(())
    }
}

/// Fire-and-forget front for an [`AuditSink`].
///
/// Each entry is written on its own task. Sink errors and panics end up in
/// the log and the `cafe_pos.audit.failures` counter, never in the caller.
#[derive(Clone)]
pub struct AuditDispatcher {
    sink: Arc<dyn AuditSink>,
}

impl AuditDispatcher {
    pub fn new(sink: Arc<dyn AuditSink>) -> Self {
        Self { sink }
    }

    /// Returns a handle that resolves once the write attempt has finished.
    /// Callers normally drop it.
    pub fn dispatch(&self, entry: AuditEntry) -> JoinHandle<()> {
        let sink = self.sink.clone();
        let action = entry.action.clone();
        let write = tokio::spawn(async move { sink.record(entry).await });

        tokio::spawn(async move {
            match write.await {
                Ok(Ok(())) => debug!(action = %action, "Audit entry recorded"),
                Ok(Err(e)) => {
                    counter!("cafe_pos.audit.failures", 1);
                    warn!(action = %action, error = %e, "Audit write failed");
                }
                Err(join_err) => {
                    counter!("cafe_pos.audit.failures", 1);
                    warn!(action = %action, error = %join_err, "Audit task aborted");
                }
            }
        })
    }
}

/// Read side of the audit log for the back office.
#[derive(Clone)]
pub struct AuditLogService {
    db: Arc<DatabaseConnection>,
}

impl AuditLogService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Newest first. `page` is 1-based.
    #[instrument(skip(self))]
    pub async fn list(
        &self,
        action: Option<String>,
        page: u64,
        limit: u64,
    ) -> Result<(Vec<audit_log::Model>, u64), ServiceError> {
        let mut query = audit_log::Entity::find();
        if let Some(action) = action {
            query = query.filter(audit_log::Column::Action.eq(action));
        }

        let paginator = query
            .order_by_desc(audit_log::Column::CreatedAt)
            .paginate(self.db.as_ref(), limit.max(1));
        let total = paginator.num_items().await?;
        let entries = paginator.fetch_page(page.saturating_sub(1)).await?;
        Ok((entries, total))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Role;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingSink {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl AuditSink for CountingSink {
        async fn record(&self, _entry: AuditEntry) -> Result<(), ServiceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(ServiceError::AuditWrite("disk full".into()))
            } else {
                Ok(())
            }
        }
    }

    struct PanickingSink;

    #[async_trait]
    impl AuditSink for PanickingSink {
        async fn record(&self, _entry: AuditEntry) -> Result<(), ServiceError> {
            panic!("sink exploded");
        }
    }

    fn entry() -> AuditEntry {
        let mut ctx = RequestContext::new(7, Role::Cashier);
        ctx.ip_address = Some("10.0.0.2".into());
        AuditEntry::new(&ctx, ORDER_COMPLETED, "Order ID: x")
    }

    #[test]
    fn entry_copies_request_context() {
        let e = entry();
        assert_eq!(e.user_id, 7);
        assert_eq!(e.action, "order_completed");
        assert_eq!(e.ip_address.as_deref(), Some("10.0.0.2"));
    }

    #[tokio::test]
    async fn dispatch_swallows_sink_errors() {
        let sink = Arc::new(CountingSink {
            calls: AtomicUsize::new(0),
            fail: true,
        });
        let dispatcher = AuditDispatcher::new(sink.clone());

        dispatcher.dispatch(entry()).await.unwrap();
        assert_eq!(sink.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn dispatch_contains_panics() {
        let dispatcher = AuditDispatcher::new(Arc::new(PanickingSink));
        assert!(dispatcher.dispatch(entry()).await.is_ok());
    }
}

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal::Decimal;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};
use tracing::instrument;

use crate::{
    entities::{addon, product, product_price, size},
    errors::ServiceError,
    services::pricing::ounces_from_size_name,
};

pub const CUP_SKU_NAME: &str = "Cup";
pub const OUNCE_UNIT: &str = "Ounce";

/// Lookup key of a physical SKU in the inventory ledger.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SkuKey {
    pub name: String,
    pub size: String,
    pub unit: String,
}

impl SkuKey {
    /// The cup consumed by one drink of the given ounce size.
    pub fn cup(ounces: impl Into<String>) -> Self {
        Self {
            name: CUP_SKU_NAME.to_string(),
            size: ounces.into(),
            unit: OUNCE_UNIT.to_string(),
        }
    }
}

impl fmt::Display for SkuKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.unit == OUNCE_UNIT {
            write!(f, "{} {}oz", self.name, self.size)
        } else {
            write!(f, "{} {} {}", self.name, self.size, self.unit)
        }
    }
}

/// Point-in-time catalog lookups used by checkout. No caching across calls.
#[async_trait]
pub trait CatalogReader: Send + Sync {
    /// Per-size override if present, else the size default; sizeless lines use the product base price.
    async fn get_price(&self, product_id: i32, size_id: Option<i32>)
        -> Result<Decimal, ServiceError>;

    async fn get_addon_price(&self, addon_id: i32) -> Result<Decimal, ServiceError>;

    /// Physical SKU consumed by one unit of the given size.
    async fn get_sku(&self, size_id: i32) -> Result<SkuKey, ServiceError>;
}

#[derive(Clone)]
pub struct DbCatalogReader {
    db: Arc<DatabaseConnection>,
}

impl DbCatalogReader {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    async fn active_size(&self, size_id: i32) -> Result<size::Model, ServiceError> {
        size::Entity::find_by_id(size_id)
            .filter(size::Column::IsActive.eq(true))
            .one(self.db.as_ref())
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Size {} not found", size_id)))
    }
}

#[async_trait]
impl CatalogReader for DbCatalogReader {
    #[instrument(skip(self))]
    async fn get_price(
        &self,
        product_id: i32,
        size_id: Option<i32>,
    ) -> Result<Decimal, ServiceError> {
        let db = self.db.as_ref();

        let product = product::Entity::find_by_id(product_id)
            .filter(product::Column::IsActive.eq(true))
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", product_id)))?;

        let Some(size_id) = size_id else {
            return Ok(product.base_price);
        };

        let size = self.active_size(size_id).await?;

        let override_price = product_price::Entity::find()
            .filter(product_price::Column::ProductId.eq(product.id))
            .filter(product_price::Column::SizeId.eq(size.id))
            .one(db)
            .await?;

        Ok(override_price
            .map(|p| p.price)
            .unwrap_or(size.default_price))
    }

    #[instrument(skip(self))]
    async fn get_addon_price(&self, addon_id: i32) -> Result<Decimal, ServiceError> {
        addon::Entity::find_by_id(addon_id)
            .filter(addon::Column::IsActive.eq(true))
            .one(self.db.as_ref())
            .await?
            .map(|a| a.price)
            .ok_or_else(|| ServiceError::NotFound(format!("Addon {} not found", addon_id)))
    }

    #[instrument(skip(self))]
    async fn get_sku(&self, size_id: i32) -> Result<SkuKey, ServiceError> {
        let size = self.active_size(size_id).await?;
        Ok(SkuKey::cup(ounces_from_size_name(&size.name)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cup_key_displays_as_ounces() {
        let key = SkuKey::cup("12");
        assert_eq!(key.name, "Cup");
        assert_eq!(key.unit, "Ounce");
        assert_eq!(key.to_string(), "Cup 12oz");
    }
}

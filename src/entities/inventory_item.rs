use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// A physical stock-keeping unit, e.g. "Cup / Packaging / 12 / Ounce".
///
/// `(name, category, size, unit)` is unique. `current_stock` never goes
/// below zero; `total_value` is always `cost_price * current_stock`.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "inventory_items")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub name: String,
    pub category: String,
    pub size: String,
    pub unit: String,
    pub current_stock: i32,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub cost_price: Decimal,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub total_value: Decimal,
    pub status: InventoryStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Model {
    /// Human label used in error messages, e.g. "Cup 12oz".
    pub fn label(&self) -> String {
        if self.unit.eq_ignore_ascii_case("ounce") {
            format!("{} {}oz", self.name, self.size)
        } else {
            format!("{} {} {}", self.name, self.size, self.unit)
        }
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumIter, DeriveActiveEnum, ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[serde(rename_all = "lowercase")]
pub enum InventoryStatus {
    #[sea_orm(string_value = "active")]
    Active,
    #[sea_orm(string_value = "inactive")]
    Inactive,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::inventory_movement::Entity")]
    InventoryMovement,
}

impl Related<super::inventory_movement::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::InventoryMovement.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn item(unit: &str) -> Model {
        Model {
            id: 1,
            name: "Cup".into(),
            category: "Packaging".into(),
            size: "12".into(),
            unit: unit.into(),
            current_stock: 0,
            cost_price: dec!(0),
            total_value: dec!(0),
            status: InventoryStatus::Active,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn label_uses_ounce_shorthand() {
        assert_eq!(item("Ounce").label(), "Cup 12oz");
        assert_eq!(item("Piece").label(), "Cup 12 Piece");
    }
}

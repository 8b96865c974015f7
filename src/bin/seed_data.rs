//! Seed data script - populates the database with a small café menu
//!
//! Run with: cargo run --bin seed-data
//!
//! This creates:
//! - 3 cup sizes and 5 products, with per-size price overrides
//! - 3 addons
//! - Cup inventory for every size

use anyhow::Context;
use chrono::Utc;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::{
    ActiveModelTrait, EntityTrait, PaginatorTrait, Set, TransactionTrait,
};
use tracing::info;
use uuid::Uuid;

use cafe_pos_api::{
    config, db,
    entities::{
        addon,
        inventory_item::{self, InventoryStatus},
        inventory_movement::{self, MovementType},
        product, product_price, size,
    },
    services::{
        catalog::{CUP_SKU_NAME, OUNCE_UNIT},
        pricing::ounces_from_size_name,
    },
};

const SIZES: &[(&str, Decimal)] = &[("12oz", dec!(50)), ("16oz", dec!(65)), ("22oz", dec!(80))];

/// (name, base price, per-size overrides by size name)
const PRODUCTS: &[(&str, Decimal, &[(&str, Decimal)])] = &[
    ("Americano", dec!(45), &[]),
    ("Cafe Latte", dec!(55), &[("16oz", dec!(75)), ("22oz", dec!(90))]),
    ("Caramel Macchiato", dec!(60), &[("12oz", dec!(70)), ("16oz", dec!(85))]),
    ("Hot Chocolate", dec!(50), &[]),
    ("Butter Croissant", dec!(55), &[]),
];

const ADDONS: &[(&str, Decimal)] = &[
    ("Extra Shot", dec!(20)),
    ("Oat Milk", dec!(25)),
    ("Whipped Cream", dec!(15)),
];

/// (size name, stock, cost per cup)
const CUPS: &[(&str, i32, Decimal)] = &[
    ("12oz", 500, dec!(2.50)),
    ("16oz", 400, dec!(3.00)),
    ("22oz", 250, dec!(3.75)),
];

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = config::load_config().context("failed to load configuration")?;
    config::init_tracing(cfg.log_level(), cfg.log_json);

    info!("=== Cafe POS Seed Data ===");
    let pool = db::establish_connection_from_app_config(&cfg).await?;
    db::run_migrations(&pool).await?;

    if product::Entity::find().count(&pool).await? > 0 {
        info!("Catalog already present, nothing to do");
        return Ok(());
    }

    let txn = pool.begin().await?;
    seed_catalog(&txn).await?;
    seed_cups(&txn).await?;
    txn.commit().await?;

    info!("Seed data created");
    db::close_pool(pool).await?;
    Ok(())
}

async fn seed_catalog<C: sea_orm::ConnectionTrait>(conn: &C) -> anyhow::Result<()> {
    let mut size_ids = Vec::with_capacity(SIZES.len());
    for (name, default_price) in SIZES {
        let size = size::ActiveModel {
            name: Set(name.to_string()),
            default_price: Set(*default_price),
            is_active: Set(true),
            ..Default::default()
        }
        .insert(conn)
        .await?;
        size_ids.push((*name, size.id));
    }
    info!("  Created {} sizes", size_ids.len());

    for (name, base_price, overrides) in PRODUCTS {
        let product = product::ActiveModel {
            name: Set(name.to_string()),
            base_price: Set(*base_price),
            is_active: Set(true),
            ..Default::default()
        }
        .insert(conn)
        .await?;

        for (size_name, price) in *overrides {
            let Some((_, size_id)) = size_ids.iter().find(|(n, _)| n == size_name) else {
                continue;
            };
            product_price::ActiveModel {
                product_id: Set(product.id),
                size_id: Set(*size_id),
                price: Set(*price),
                ..Default::default()
            }
            .insert(conn)
            .await?;
        }
    }
    info!("  Created {} products", PRODUCTS.len());

    for (name, price) in ADDONS {
        addon::ActiveModel {
            name: Set(name.to_string()),
            price: Set(*price),
            is_active: Set(true),
            ..Default::default()
        }
        .insert(conn)
        .await?;
    }
    info!("  Created {} addons", ADDONS.len());

    Ok(())
}

async fn seed_cups<C: sea_orm::ConnectionTrait>(conn: &C) -> anyhow::Result<()> {
    let now = Utc::now();
    for (size_name, stock, cost) in CUPS {
        let item = inventory_item::ActiveModel {
            name: Set(CUP_SKU_NAME.to_string()),
            category: Set("Packaging".to_string()),
            size: Set(ounces_from_size_name(size_name)),
            unit: Set(OUNCE_UNIT.to_string()),
            current_stock: Set(*stock),
            cost_price: Set(*cost),
            total_value: Set(*cost * Decimal::from(*stock)),
            status: Set(InventoryStatus::Active),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(conn)
        .await?;

        inventory_movement::ActiveModel {
            id: Set(Uuid::new_v4()),
            inventory_item_id: Set(item.id),
            change_type: Set(MovementType::Initial),
            previous_stock: Set(0),
            new_stock: Set(*stock),
            change_amount: Set(*stock),
            reason: Set(Some("Seed data".to_string())),
            reference_id: Set(None),
            created_by: Set(None),
            created_at: Set(now),
        }
        .insert(conn)
        .await?;

        info!("  Stocked {} x {}", stock, item.label());
    }
    Ok(())
}

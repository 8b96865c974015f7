//! sea-orm entities, one module per table.

pub mod addon;
pub mod audit_log;
pub mod inventory_item;
pub mod inventory_movement;
pub mod order;
pub mod order_item;
pub mod product;
pub mod product_price;
pub mod size;
pub mod transaction;

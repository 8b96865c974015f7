//! Pure money and quantity arithmetic for checkout.
//!
//! Everything here is `Decimal`; nothing touches the database.

use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;
use utoipa::ToSchema;

/// Addon as charged on a line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct PricedAddon {
    #[serde(rename = "addonID")]
    pub addon_id: i32,
    pub price: Decimal,
}

/// Cart line after catalog resolution, carrying the snapshotted prices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PricedLine {
    #[serde(rename = "productID")]
    pub product_id: i32,
    #[serde(rename = "sizeID")]
    pub size_id: Option<i32>,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub addons: Vec<PricedAddon>,
    pub addon_total: Decimal,
    pub line_total: Decimal,
}

impl PricedLine {
    pub fn new(
        product_id: i32,
        size_id: Option<i32>,
        quantity: i32,
        unit_price: Decimal,
        addons: Vec<PricedAddon>,
    ) -> Self {
        let addon_total = addons.iter().map(|a| a.price).sum();
        let line_total = line_total(unit_price, addon_total, quantity);
        Self {
            product_id,
            size_id,
            quantity,
            unit_price,
            addons,
            addon_total,
            line_total,
        }
    }
}

/// `(unit + addons) * quantity`
pub fn line_total(unit_price: Decimal, addon_total: Decimal, quantity: i32) -> Decimal {
    (unit_price + addon_total) * Decimal::from(quantity)
}

pub fn subtotal(lines: &[PricedLine]) -> Decimal {
    lines.iter().map(|l| l.line_total).sum()
}

/// Units consumed per size id. Lines without a size consume nothing.
///
/// Sorted by size id so every checkout touches SKUs in the same order.
pub fn aggregate_by_size<'a>(lines: impl IntoIterator<Item = &'a PricedLine>) -> BTreeMap<i32, i32> {
    let mut by_size = BTreeMap::new();
    for line in lines {
        if let Some(size_id) = line.size_id {
            *by_size.entry(size_id).or_insert(0) += line.quantity;
        }
    }
    by_size
}

/// Ounce descriptor for a size name: the first run of digits ("12oz" -> "12").
/// Names without digits are used as-is, trimmed.
pub fn ounces_from_size_name(name: &str) -> String {
    let digits: String = name
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(|c| c.is_ascii_digit())
        .collect();
    if digits.is_empty() {
        name.trim().to_string()
    } else {
        digits
    }
}

//! Checkout orchestration.
//!
//! A checkout validates the cart, prices it against the live catalog, then
//! records the order and deducts cups in one database transaction. Auditing
//! happens after the transaction has finished and cannot change its outcome.

use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use metrics::{counter, histogram};
use rust_decimal::Decimal;
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    auth::RequestContext,
    db,
    entities::order::PaymentMethod,
    errors::ServiceError,
    services::{
        audit::{AuditDispatcher, AuditEntry, ORDER_COMPLETED, ORDER_FAILED},
        catalog::{CatalogReader, SkuKey},
        inventory::InventoryLedger,
        orders::{NewOrder, OrderRecorder},
        pricing::{aggregate_by_size, subtotal, PricedAddon, PricedLine},
    },
};

pub const MAX_CART_LINES: usize = 100;

const RECEIPT_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CartLine {
    #[serde(rename = "productID")]
    pub product_id: i32,
    #[serde(rename = "sizeID", default)]
    pub size_id: Option<i32>,
    #[validate(range(min = 1, max = 1000, message = "Quantity must be between 1 and 1000"))]
    pub quantity: i32,
    /// Addon ids
    #[serde(default)]
    pub addons: Vec<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequest {
    #[validate(length(min = 1, message = "Cart must not be empty"))]
    pub cart: Vec<CartLine>,
    /// `cash`, `card` or `other`
    pub payment_method: String,
    /// Required for cash payments only
    #[serde(default)]
    pub cash_received: Option<Decimal>,
}

impl CheckoutRequest {
    /// Input checks that need no lookups. Returns the parsed payment method.
    pub fn validate_request(&self) -> Result<PaymentMethod, ServiceError> {
        self.validate()?;
        if self.cart.len() > MAX_CART_LINES {
            return Err(ServiceError::ValidationError(format!(
                "Cart must not contain more than {} lines, got {}",
                MAX_CART_LINES,
                self.cart.len()
            )));
        }
        for (index, line) in self.cart.iter().enumerate() {
            line.validate().map_err(|e| {
                ServiceError::ValidationError(format!("cart[{}]: {}", index, e))
            })?;
        }

        let payment_method = PaymentMethod::from_str(self.payment_method.trim()).map_err(|_| {
            ServiceError::ValidationError(format!(
                "Unsupported payment method '{}'",
                self.payment_method
            ))
        })?;

        match (payment_method, self.cash_received) {
            (PaymentMethod::Cash, None) => Err(ServiceError::ValidationError(
                "cashReceived is required for cash payments".to_string(),
            )),
            (PaymentMethod::Cash, Some(cash)) if cash.is_sign_negative() => Err(
                ServiceError::ValidationError("cashReceived must not be negative".to_string()),
            ),
            (PaymentMethod::Card | PaymentMethod::Other, Some(_)) => {
                Err(ServiceError::ValidationError(format!(
                    "cashReceived is only accepted for cash payments, not {}",
                    payment_method
                )))
            }
            _ => Ok(payment_method),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Receipt {
    #[serde(rename = "orderID")]
    pub order_id: Uuid,
    pub items: Vec<PricedLine>,
    pub subtotal: Decimal,
    pub total_amount: Decimal,
    pub payment_method: PaymentMethod,
    pub cash_received: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub change: Option<Decimal>,
    /// `YYYY-MM-DD HH:MM:SS`, UTC
    pub timestamp: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutResult {
    #[serde(rename = "orderID")]
    pub order_id: Uuid,
    pub total_amount: Decimal,
    pub receipt: Receipt,
}

/// Priced cart plus the cups it consumes, resolved before any write.
struct PricedCart {
    lines: Vec<PricedLine>,
    deductions: BTreeMap<SkuKey, i32>,
    subtotal: Decimal,
}

#[derive(Clone)]
pub struct CheckoutService {
    db: Arc<DatabaseConnection>,
    catalog: Arc<dyn CatalogReader>,
    ledger: InventoryLedger,
    recorder: OrderRecorder,
    audit: AuditDispatcher,
    currency_symbol: String,
}

impl CheckoutService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        catalog: Arc<dyn CatalogReader>,
        audit: AuditDispatcher,
        currency_symbol: impl Into<String>,
    ) -> Self {
        Self {
            db,
            catalog,
            ledger: InventoryLedger::new(),
            recorder: OrderRecorder::new(),
            audit,
            currency_symbol: currency_symbol.into(),
        }
    }

    /// Runs a checkout for the cashier in `ctx`.
    ///
    /// Either the order, its transaction and every cup deduction are
    /// committed together, or nothing is written.
    #[instrument(skip(self, ctx, request), fields(user_id = ctx.user_id, lines = request.cart.len()))]
    pub async fn checkout(
        &self,
        ctx: &RequestContext,
        request: CheckoutRequest,
    ) -> Result<CheckoutResult, ServiceError> {
        let payment_method = request.validate_request()?;
        let start = Instant::now();

        let result = self.process(ctx, &request, payment_method).await;
        histogram!("cafe_pos.checkout.duration", start.elapsed());

        match &result {
            Ok(done) => {
                counter!("cafe_pos.checkout.completed", 1, "payment_method" => payment_method.to_string());
                info!(order_id = %done.order_id, total = %done.total_amount, "Checkout completed");
                self.audit.dispatch(AuditEntry::new(
                    ctx,
                    ORDER_COMPLETED,
                    format!(
                        "Order ID: {}, Total: {}{}",
                        done.order_id, self.currency_symbol, done.total_amount
                    ),
                ));
            }
            Err(e) => {
                counter!("cafe_pos.checkout.failed", 1, "kind" => e.error_kind());
                warn!(error = %e, "Checkout failed");
                self.audit.dispatch(AuditEntry::new(
                    ctx,
                    ORDER_FAILED,
                    format!("Checkout failed: {}", e.response_message()),
                ));
            }
        }

        result
    }

    async fn process(
        &self,
        ctx: &RequestContext,
        request: &CheckoutRequest,
        payment_method: PaymentMethod,
    ) -> Result<CheckoutResult, ServiceError> {
        let priced = self.price_cart(&request.cart).await?;
        let total_amount = priced.subtotal;

        let change = match request.cash_received {
            Some(cash) if payment_method == PaymentMethod::Cash => {
                if cash < total_amount {
                    return Err(ServiceError::ValidationError(format!(
                        "Cash received {sym}{cash} is less than total {sym}{total}",
                        sym = self.currency_symbol,
                        cash = cash,
                        total = total_amount
                    )));
                }
                Some(cash - total_amount)
            }
            _ => None,
        };

        let order_id = Uuid::new_v4();
        let created_at = Utc::now();
        let cashier_id = ctx.user_id;
        let cash_received = request.cash_received;
        let lines = priced.lines.clone();
        let deductions = priced.deductions;
        let ledger = self.ledger.clone();
        let recorder = self.recorder.clone();

        db::transaction(self.db.as_ref(), "checkout", move |txn| {
            Box::pin(async move {
                let new_order = NewOrder {
                    order_id,
                    lines: &lines,
                    payment_method,
                    cash_received,
                    subtotal: total_amount,
                    total_amount,
                    cashier_id,
                    created_at,
                };
                recorder.record_order(txn, &new_order).await?;

                for (sku, quantity) in &deductions {
                    match ledger
                        .check_and_deduct(txn, sku, *quantity, order_id, cashier_id)
                        .await
                    {
                        Ok(_) => {}
                        Err(ServiceError::NotFound(_)) => {
                            // Sizes without a tracked cup SKU sell without deduction
                            counter!("cafe_pos.checkout.sku_untracked", 1, "sku" => sku.to_string());
                            warn!(sku = %sku, quantity, "No inventory item for size, skipping deduction");
                        }
                        Err(e) => return Err(e),
                    }
                }
                Ok(())
            })
        })
        .await?;

        Ok(CheckoutResult {
            order_id,
            total_amount,
            receipt: Receipt {
                order_id,
                items: priced.lines,
                subtotal: priced.subtotal,
                total_amount,
                payment_method,
                cash_received,
                change,
                timestamp: created_at.format(RECEIPT_TIMESTAMP_FORMAT).to_string(),
            },
        })
    }

    /// Resolves every price and SKU for the cart. Read-only.
    async fn price_cart(&self, cart: &[CartLine]) -> Result<PricedCart, ServiceError> {
        let mut lines = Vec::with_capacity(cart.len());
        for line in cart {
            let unit_price = self.catalog.get_price(line.product_id, line.size_id).await?;
            let mut addons = Vec::with_capacity(line.addons.len());
            for &addon_id in &line.addons {
                let price = self.catalog.get_addon_price(addon_id).await?;
                addons.push(PricedAddon { addon_id, price });
            }
            lines.push(PricedLine::new(
                line.product_id,
                line.size_id,
                line.quantity,
                unit_price,
                addons,
            ));
        }

        let mut deductions = BTreeMap::new();
        for (size_id, quantity) in aggregate_by_size(&lines) {
            let sku = self.catalog.get_sku(size_id).await?;
            *deductions.entry(sku).or_insert(0) += quantity;
        }

        let subtotal = subtotal(&lines);
        Ok(PricedCart {
            lines,
            deductions,
            subtotal,
        })
    }
}

//! Weighted-average cost recomputation.
//!
//! Runs on owned-stock receipts only, before the ledger mutation of the same
//! commit, so the blend reflects the pre-transaction stock level. The product
//! row is locked first to serialize concurrent recosting across
//! simultaneously-committing receipts.

use chrono::Utc;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::{ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QuerySelect, Set};
use tracing::debug;

use crate::db;
use crate::entities::product::{self, Entity as Product};
use crate::entities::stock_quant::{self, Entity as StockQuant};
use crate::errors::ServiceError;

/// Price changes smaller than this are not persisted.
pub const COST_EPSILON: Decimal = dec!(0.0001);

/// The pure blend: average of current stock value and incoming value.
/// Falls back to the incoming price when there is nothing to blend with.
pub fn blend_average_cost(
    current_qty: Decimal,
    current_price: Decimal,
    incoming_qty: Decimal,
    incoming_price: Decimal,
) -> Decimal {
    let denominator = current_qty + incoming_qty;
    if denominator <= Decimal::ZERO {
        return incoming_price;
    }
    (current_qty * current_price + incoming_qty * incoming_price) / denominator
}

/// Recomputes a product's `standard_price` from an incoming receipt.
/// No-op for non-positive quantities or negative prices.
pub async fn update_weighted_average_cost<C: ConnectionTrait>(
    conn: &C,
    product_id: i64,
    incoming_qty: Decimal,
    incoming_price: Decimal,
) -> Result<(), ServiceError> {
    if incoming_qty <= Decimal::ZERO || incoming_price < Decimal::ZERO {
        return Ok(());
    }

    let mut query = Product::find_by_id(product_id);
    if db::supports_row_locking(conn.get_database_backend()) {
        query = query.lock_exclusive();
    }
    let product = query
        .one(conn)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("product {} not found", product_id)))?;

    let quants = StockQuant::find()
        .filter(stock_quant::Column::ProductId.eq(product_id))
        .all(conn)
        .await?;
    let current_qty: Decimal = quants.iter().map(|q| q.quantity).sum::<Decimal>().max(Decimal::ZERO);

    let new_avg = blend_average_cost(
        current_qty,
        product.standard_price,
        incoming_qty,
        incoming_price,
    );

    if (new_avg - product.standard_price).abs() > COST_EPSILON {
        debug!(
            product_id,
            old_price = %product.standard_price,
            new_price = %new_avg,
            %incoming_qty,
            "updating weighted-average cost"
        );
        let mut active: product::ActiveModel = product.into();
        active.standard_price = Set(new_avg);
        active.updated_at = Set(Some(Utc::now()));
        active.update(conn).await?;
    }

    Ok(())
}

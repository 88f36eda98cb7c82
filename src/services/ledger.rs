//! Stock quant ledger.
//!
//! The single write primitive for the quant table. All stock mutation in the
//! system funnels through [`apply_quantity_delta`]; callers own the enclosing
//! transaction and are expected to pre-validate availability, so a failure
//! here is an invariant breach rather than a user-facing validation error.

use chrono::Utc;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, ModelTrait, QueryFilter, Set,
};
use tracing::debug;

use crate::entities::stock_quant::{self, Entity as StockQuant};
use crate::errors::ServiceError;

/// Quantities within this distance of zero are treated as zero; quant rows
/// that decay below it are deleted rather than stored.
pub const QTY_EPSILON: Decimal = dec!(0.001);

/// Looks up the unique quant row for the four-part key. The optional key
/// parts are matched null-aware with explicit `IS NULL` predicates.
pub async fn find_quant<C: ConnectionTrait>(
    conn: &C,
    product_id: i64,
    location_id: i64,
    lot_id: Option<i64>,
    project_id: Option<i64>,
) -> Result<Option<stock_quant::Model>, ServiceError> {
    let mut query = StockQuant::find()
        .filter(stock_quant::Column::ProductId.eq(product_id))
        .filter(stock_quant::Column::LocationId.eq(location_id));

    query = match lot_id {
        Some(lot) => query.filter(stock_quant::Column::LotId.eq(lot)),
        None => query.filter(stock_quant::Column::LotId.is_null()),
    };
    query = match project_id {
        Some(project) => query.filter(stock_quant::Column::ProjectId.eq(project)),
        None => query.filter(stock_quant::Column::ProjectId.is_null()),
    };

    Ok(query.one(conn).await?)
}

/// Current quantity under the four-part key, zero when no row exists.
pub async fn quantity_of<C: ConnectionTrait>(
    conn: &C,
    product_id: i64,
    location_id: i64,
    lot_id: Option<i64>,
    project_id: Option<i64>,
) -> Result<Decimal, ServiceError> {
    Ok(find_quant(conn, product_id, location_id, lot_id, project_id)
        .await?
        .map(|q| q.quantity)
        .unwrap_or(Decimal::ZERO))
}

/// Applies a signed quantity delta to the quant identified by the four-part
/// key. Exactly one row is created, updated, or deleted per call.
///
/// Subtracting below zero — or from a key with no row at all — fails with
/// `IntegrityViolation`: callers pre-validate stock sufficiency, and virtual
/// locations are never materialized as quants, so there is no legitimate path
/// to an impossible subtraction.
pub async fn apply_quantity_delta<C: ConnectionTrait>(
    conn: &C,
    product_id: i64,
    location_id: i64,
    delta: Decimal,
    lot_id: Option<i64>,
    project_id: Option<i64>,
) -> Result<(), ServiceError> {
    if delta.abs() <= QTY_EPSILON {
        return Ok(());
    }

    match find_quant(conn, product_id, location_id, lot_id, project_id).await? {
        Some(quant) => {
            let new_qty = quant.quantity + delta;
            if new_qty < -QTY_EPSILON {
                return Err(ServiceError::IntegrityViolation(format!(
                    "quant of product {} at location {} would go negative: {} + {} = {}",
                    product_id, location_id, quant.quantity, delta, new_qty
                )));
            }

            if new_qty > QTY_EPSILON {
                debug!(
                    product_id,
                    location_id,
                    %delta,
                    %new_qty,
                    "updating quant"
                );
                let mut active: stock_quant::ActiveModel = quant.into();
                active.quantity = Set(new_qty);
                active.updated_at = Set(Some(Utc::now()));
                active.update(conn).await?;
            } else {
                debug!(product_id, location_id, "quant decayed to zero; deleting");
                quant.delete(conn).await?;
            }
        }
        None => {
            if delta < Decimal::ZERO {
                return Err(ServiceError::IntegrityViolation(format!(
                    "attempted to remove {} of product {} from location {} with no stock on hand",
                    delta.abs(),
                    product_id,
                    location_id
                )));
            }

            debug!(product_id, location_id, %delta, "creating quant");
            let quant = stock_quant::ActiveModel {
                product_id: Set(product_id),
                location_id: Set(location_id),
                lot_id: Set(lot_id),
                project_id: Set(project_id),
                quantity: Set(delta),
                created_at: Set(Utc::now()),
                updated_at: Set(None),
                ..Default::default()
            };
            quant.insert(conn).await?;
        }
    }

    Ok(())
}

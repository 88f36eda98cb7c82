//! Pre-flight stock sufficiency checks.
//!
//! Invoked twice in a picking's lifecycle: before reservation (`listo`) and
//! again inside the locked commit transaction, which closes the race window
//! between reserving and executing.

use rust_decimal::Decimal;
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::entities::location::Entity as Location;
use crate::entities::product::Entity as Product;
use crate::entities::stock_move::{self, Entity as StockMove};
use crate::entities::stock_picking::{self, Entity as StockPicking, PickingState, PickingType};
use crate::errors::ServiceError;
use crate::services::availability;
use crate::services::ledger::QTY_EPSILON;

/// One unsatisfiable demand line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Shortage {
    pub product_id: i64,
    pub product_name: String,
    pub location_id: i64,
    pub location_name: String,
    pub required: Decimal,
    pub available: Decimal,
}

/// Result of a stock check. `message` aggregates one line per shortage in
/// operator-readable form.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockCheck {
    pub ok: bool,
    pub shortages: Vec<Shortage>,
    pub message: String,
}

impl StockCheck {
    fn passed() -> Self {
        Self {
            ok: true,
            shortages: Vec::new(),
            message: String::new(),
        }
    }
}

/// Loads the picking and its moves, then delegates to
/// [`check_picking_stock`].
pub async fn check_stock<C: ConnectionTrait>(
    conn: &C,
    picking_id: i64,
) -> Result<StockCheck, ServiceError> {
    let picking = StockPicking::find_by_id(picking_id)
        .one(conn)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("picking {} not found", picking_id)))?;

    let moves = StockMove::find()
        .filter(stock_move::Column::PickingId.eq(picking_id))
        .filter(stock_move::Column::State.ne(PickingState::Cancelled.as_str()))
        .all(conn)
        .await?;

    check_picking_stock(conn, &picking, &moves).await
}

/// Checks every (product, demand-location) line of the picking against
/// current stock. Receipts always pass; adjustments validate negative deltas
/// against physical quantity directly; consuming types subtract the demand of
/// other `listo` pickings first.
pub async fn check_picking_stock<C: ConnectionTrait>(
    conn: &C,
    picking: &stock_picking::Model,
    moves: &[stock_move::Model],
) -> Result<StockCheck, ServiceError> {
    let picking_type = picking.picking_type().ok_or_else(|| {
        ServiceError::InternalError(format!(
            "picking {} has unknown type '{}'",
            picking.id, picking.picking_type
        ))
    })?;

    if picking_type == PickingType::Receipt {
        return Ok(StockCheck::passed());
    }

    // Aggregate demand per (product, location). BTreeMap keeps the shortage
    // report in a stable order.
    let mut demand: BTreeMap<(i64, i64), Decimal> = BTreeMap::new();
    for mv in moves {
        if mv.state == PickingState::Cancelled.as_str() {
            continue;
        }
        match picking_type {
            PickingType::Adjustment => {
                // Only negative corrections remove stock; the affected
                // location is the destination side of an adjustment move.
                if mv.product_uom_qty < Decimal::ZERO {
                    if let Some(location_id) = mv.location_dest_id {
                        *demand.entry((mv.product_id, location_id)).or_default() +=
                            mv.product_uom_qty.abs();
                    }
                }
            }
            _ => {
                if let Some(location_id) = mv.location_id {
                    *demand.entry((mv.product_id, location_id)).or_default() +=
                        mv.product_uom_qty;
                }
            }
        }
    }

    let mut shortages = Vec::new();
    for ((product_id, location_id), needed) in demand {
        let physical = availability::physical_quantity(conn, product_id, location_id, None).await?;
        let available = if picking_type == PickingType::Adjustment {
            // Adjustments bypass reservation; they are ground-truth
            // corrections validated against what is physically there.
            physical
        } else {
            let reserved_by_others =
                availability::reserved_quantity(conn, product_id, location_id, Some(picking.id))
                    .await?;
            physical - reserved_by_others
        };

        if needed > available + QTY_EPSILON {
            let product_name = Product::find_by_id(product_id)
                .one(conn)
                .await?
                .map(|p| p.name)
                .unwrap_or_else(|| format!("producto {}", product_id));
            let location_name = Location::find_by_id(location_id)
                .one(conn)
                .await?
                .map(|l| l.name)
                .unwrap_or_else(|| format!("ubicacion {}", location_id));

            shortages.push(Shortage {
                product_id,
                product_name,
                location_id,
                location_name,
                required: needed,
                available: available.max(Decimal::ZERO),
            });
        }
    }

    if shortages.is_empty() {
        return Ok(StockCheck::passed());
    }

    let mut lines = vec![format!(
        "Stock insuficiente para el documento {}:",
        picking.name
    )];
    for s in &shortages {
        lines.push(format!(
            "  - {} en {}: requerido {}, disponible {}",
            s.product_name, s.location_name, s.required, s.available
        ));
    }

    Ok(StockCheck {
        ok: false,
        message: lines.join("\n"),
        shortages,
    })
}

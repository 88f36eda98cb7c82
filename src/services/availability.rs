//! Availability and reservation arithmetic.
//!
//! Stock is a shared physical resource across projects: reservation exists at
//! location level only, computed live from the move rows of `listo` pickings.
//! Competing documents are resolved first-listo-first-served; the commit path
//! re-checks under its row lock to close the remaining race window.

use rust_decimal::Decimal;
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, JoinType, QueryFilter, QuerySelect, RelationTrait};
use serde::{Deserialize, Serialize};

use crate::entities::stock_move::{self, Entity as StockMove};
use crate::entities::stock_picking::{self, PickingState};
use crate::entities::stock_quant::{self, Entity as StockQuant};
use crate::errors::ServiceError;

/// Snapshot returned to the API layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvailabilityReport {
    pub product_id: i64,
    pub location_id: i64,
    pub project_id: Option<i64>,
    /// On-hand quantity; project-scoped when a project filter was given.
    pub physical: Decimal,
    /// Planned demand of other `listo` pickings at this location.
    pub reserved: Decimal,
    /// Planned receipts of `listo` pickings into this location.
    pub incoming: Decimal,
    /// max(0, total physical − reserved). Never project-scoped, since
    /// reservation is a location-level concept.
    pub available: Decimal,
}

/// Sum of quant quantities at (product, location). `project_scope` narrows to
/// one project for reporting; deduction logic always passes `None`.
pub async fn physical_quantity<C: ConnectionTrait>(
    conn: &C,
    product_id: i64,
    location_id: i64,
    project_scope: Option<i64>,
) -> Result<Decimal, ServiceError> {
    let mut query = StockQuant::find()
        .filter(stock_quant::Column::ProductId.eq(product_id))
        .filter(stock_quant::Column::LocationId.eq(location_id));
    if let Some(project_id) = project_scope {
        query = query.filter(stock_quant::Column::ProjectId.eq(project_id));
    }

    let quants = query.all(conn).await?;
    Ok(quants.iter().map(|q| q.quantity).sum())
}

/// Planned quantity reserved at (product, location) by pickings in `listo`
/// state, excluding cancelled moves and, when validating a specific picking,
/// that picking's own rows.
pub async fn reserved_quantity<C: ConnectionTrait>(
    conn: &C,
    product_id: i64,
    location_id: i64,
    exclude_picking: Option<i64>,
) -> Result<Decimal, ServiceError> {
    let mut query = StockMove::find()
        .join(JoinType::InnerJoin, stock_move::Relation::Picking.def())
        .filter(stock_move::Column::ProductId.eq(product_id))
        .filter(stock_move::Column::LocationId.eq(location_id))
        .filter(stock_move::Column::State.ne(PickingState::Cancelled.as_str()))
        .filter(stock_picking::Column::State.eq(PickingState::Listo.as_str()));
    if let Some(picking_id) = exclude_picking {
        query = query.filter(stock_move::Column::PickingId.ne(picking_id));
    }

    let moves = query.all(conn).await?;
    Ok(moves.iter().map(|m| m.product_uom_qty).sum())
}

/// Mirror of [`reserved_quantity`] over destination locations: planned
/// receipts still in flight. Reporting only; never used in deduction logic.
pub async fn incoming_quantity<C: ConnectionTrait>(
    conn: &C,
    product_id: i64,
    location_id: i64,
    project_scope: Option<i64>,
) -> Result<Decimal, ServiceError> {
    let mut query = StockMove::find()
        .join(JoinType::InnerJoin, stock_move::Relation::Picking.def())
        .filter(stock_move::Column::ProductId.eq(product_id))
        .filter(stock_move::Column::LocationDestId.eq(location_id))
        .filter(stock_move::Column::State.ne(PickingState::Cancelled.as_str()))
        .filter(stock_picking::Column::State.eq(PickingState::Listo.as_str()));
    if let Some(project_id) = project_scope {
        query = query.filter(stock_move::Column::ProjectId.eq(project_id));
    }

    let moves = query.all(conn).await?;
    Ok(moves.iter().map(|m| m.product_uom_qty).sum())
}

/// Net quantity a new consumer could take: max(0, physical − reserved).
pub async fn real_available<C: ConnectionTrait>(
    conn: &C,
    product_id: i64,
    location_id: i64,
    exclude_picking: Option<i64>,
) -> Result<Decimal, ServiceError> {
    let physical = physical_quantity(conn, product_id, location_id, None).await?;
    let reserved = reserved_quantity(conn, product_id, location_id, exclude_picking).await?;
    Ok((physical - reserved).max(Decimal::ZERO))
}

/// Full availability snapshot for the API layer.
pub async fn get_availability<C: ConnectionTrait>(
    conn: &C,
    product_id: i64,
    location_id: i64,
    project_id: Option<i64>,
) -> Result<AvailabilityReport, ServiceError> {
    let physical_total = physical_quantity(conn, product_id, location_id, None).await?;
    let reserved = reserved_quantity(conn, product_id, location_id, None).await?;
    let available = (physical_total - reserved).max(Decimal::ZERO);

    let physical = match project_id {
        Some(project) => physical_quantity(conn, product_id, location_id, Some(project)).await?,
        None => physical_total,
    };
    let incoming = incoming_quantity(conn, product_id, location_id, project_id).await?;

    Ok(AvailabilityReport {
        product_id,
        location_id,
        project_id,
        physical,
        reserved,
        incoming,
        available,
    })
}

//! Picking lifecycle: draft → listo → done, with cancellation and the
//! reversible listo → draft release.
//!
//! Every transition locks the picking header row before reading its state,
//! turning check-then-act into an atomic step: a duplicate request blocks on
//! the lock, then observes the advanced state and returns idempotently. All
//! mutations of one transition share a single transaction; any failure rolls
//! the whole document back.

use chrono::Utc;
use lazy_static::lazy_static;
use prometheus::{IntCounter, IntCounterVec, Opts};
use rust_decimal::Decimal;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, ModelTrait,
    QueryFilter, QuerySelect, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

use crate::db;
use crate::entities::location::{self, Entity as Location, LocationUsage};
use crate::entities::product::{self, Entity as Product, Tracking};
use crate::entities::stock_lot;
use crate::entities::stock_move::{self, Entity as StockMove};
use crate::entities::stock_move_line::{self, Entity as StockMoveLine};
use crate::entities::stock_picking::{self, Entity as StockPicking, PickingState, PickingType};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::services::costing;
use crate::services::ledger::{self, QTY_EPSILON};
use crate::services::lots;
use crate::services::projects::ProjectPhaseAutomaton;
use crate::services::sequences;
use crate::services::validation;

lazy_static! {
    static ref PICKINGS_COMMITTED: IntCounterVec = IntCounterVec::new(
        Opts::new(
            "almacen_pickings_committed_total",
            "Pickings committed, by type"
        ),
        &["picking_type"]
    )
    .expect("metric can be created");
    static ref STOCK_CHECK_REJECTIONS: IntCounter = IntCounter::new(
        "almacen_stock_check_rejections_total",
        "Transitions rejected by the stock sufficiency check"
    )
    .expect("metric can be created");
}

/// Header + lines of a new document.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewPicking {
    pub picking_type: PickingType,
    pub location_id: Option<i64>,
    pub location_dest_id: Option<i64>,
    #[validate(length(max = 128))]
    pub partner_name: Option<String>,
    #[validate(length(max = 64))]
    pub origin: Option<String>,
    pub project_id: Option<i64>,
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
    pub lines: Vec<NewPickingLine>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewPickingLine {
    pub product_id: i64,
    /// Planned quantity; may be negative only on adjustments.
    pub quantity: Decimal,
    pub price_unit: Option<Decimal>,
    /// Per-line project override. Overwritten by the header value at
    /// reservation time; the header is authoritative.
    pub project_id: Option<i64>,
}

/// Lot-level execution data supplied at commit time.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CommitTracking {
    pub moves: Vec<MoveTracking>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MoveTracking {
    pub move_id: i64,
    /// Quantity actually executed; defaults to the planned quantity.
    pub quantity_done: Option<Decimal>,
    pub lots: Vec<TrackingLine>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TrackingLine {
    pub lot_name: String,
    pub qty: Decimal,
}

/// Result of a state transition. Rejections surface as `ServiceError`;
/// requests that find the document already in the target state succeed
/// without touching anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionOutcome {
    Applied,
    AlreadyInState,
}

/// A move with its execution data resolved, ready for ledger application.
struct PreparedMove {
    model: stock_move::Model,
    product: product::Model,
    quantity_done: Decimal,
    /// (lot, qty) splits; a single `(None, quantity_done)` unit for
    /// untracked products.
    units: Vec<(Option<stock_lot::Model>, Decimal)>,
}

#[derive(Clone)]
pub struct PickingService {
    db: Arc<DatabaseConnection>,
    event_sender: EventSender,
    project_phase: Arc<dyn ProjectPhaseAutomaton>,
    company_code: String,
}

impl PickingService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        event_sender: EventSender,
        project_phase: Arc<dyn ProjectPhaseAutomaton>,
        company_code: String,
    ) -> Self {
        Self {
            db,
            event_sender,
            project_phase,
            company_code,
        }
    }

    /// Creates a picking in `draft` with its move lines. No stock effect.
    #[instrument(skip(self, input))]
    pub async fn create_picking(
        &self,
        input: NewPicking,
    ) -> Result<stock_picking::Model, ServiceError> {
        input.validate()?;

        let txn = self.db.begin().await?;

        let (source, dest) = resolve_creation_endpoints(&txn, &input).await?;
        let name =
            sequences::next_document_name(&txn, &self.company_code, input.picking_type).await?;

        let picking = stock_picking::ActiveModel {
            name: Set(name.clone()),
            picking_type: Set(input.picking_type.as_str().to_string()),
            state: Set(PickingState::Draft.as_str().to_string()),
            location_id: Set(source),
            location_dest_id: Set(dest),
            partner_name: Set(input.partner_name.clone()),
            origin: Set(input.origin.clone()),
            project_id: Set(input.project_id),
            notes: Set(input.notes.clone()),
            date_done: Set(None),
            created_at: Set(Utc::now()),
            updated_at: Set(None),
            ..Default::default()
        };
        let picking = picking.insert(&txn).await?;

        for line in &input.lines {
            let product = Product::find_by_id(line.product_id)
                .one(&txn)
                .await?
                .ok_or_else(|| {
                    ServiceError::NotFound(format!("product {} not found", line.product_id))
                })?;

            if input.picking_type == PickingType::Adjustment {
                if line.quantity.abs() <= QTY_EPSILON {
                    return Err(ServiceError::ValidationError(format!(
                        "adjustment quantity for '{}' must be non-zero",
                        product.name
                    )));
                }
            } else if line.quantity <= QTY_EPSILON {
                return Err(ServiceError::ValidationError(format!(
                    "quantity for '{}' must be positive",
                    product.name
                )));
            }

            let price_unit = line.price_unit.unwrap_or(Decimal::ZERO);
            if price_unit < Decimal::ZERO {
                return Err(ServiceError::ValidationError(format!(
                    "unit price for '{}' must not be negative",
                    product.name
                )));
            }

            let mv = stock_move::ActiveModel {
                picking_id: Set(picking.id),
                product_id: Set(line.product_id),
                product_uom_qty: Set(line.quantity),
                quantity_done: Set(Decimal::ZERO),
                price_unit: Set(price_unit),
                location_id: Set(source),
                location_dest_id: Set(dest),
                project_id: Set(line.project_id.or(input.project_id)),
                state: Set(PickingState::Draft.as_str().to_string()),
                created_at: Set(Utc::now()),
                ..Default::default()
            };
            mv.insert(&txn).await?;
        }

        txn.commit().await?;

        info!(picking_id = picking.id, name = %name, "picking created");
        self.event_sender
            .send(Event::PickingCreated {
                picking_id: picking.id,
                name,
            })
            .await;

        Ok(picking)
    }

    /// Reserves the document (draft → listo) after a stock sufficiency
    /// check. Receipts skip the check — they only add stock.
    #[instrument(skip(self))]
    pub async fn mark_ready(&self, picking_id: i64) -> Result<TransitionOutcome, ServiceError> {
        let txn = self.db.begin().await?;

        let picking = picking_for_update(&txn, picking_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("picking {} not found", picking_id)))?;
        let state = state_of(&picking)?;

        match state {
            PickingState::Listo => {
                txn.commit().await?;
                return Ok(TransitionOutcome::AlreadyInState);
            }
            PickingState::Done | PickingState::Cancelled => {
                return Err(ServiceError::InvalidStatus(format!(
                    "picking {} is {} and cannot be reserved",
                    picking.name,
                    state.as_str()
                )));
            }
            PickingState::Draft => {}
        }

        let moves = active_moves(&txn, picking_id).await?;
        if moves.is_empty() {
            return Err(ServiceError::EmptyDocument(format!(
                "picking {} has no lines to reserve",
                picking.name
            )));
        }

        // The header's project is authoritative: it overwrites any per-line
        // value, including clearing it when the header moves to general
        // stock.
        StockMove::update_many()
            .col_expr(stock_move::Column::ProjectId, Expr::value(picking.project_id))
            .filter(stock_move::Column::PickingId.eq(picking_id))
            .filter(stock_move::Column::State.ne(PickingState::Cancelled.as_str()))
            .exec(&txn)
            .await?;

        let check = validation::check_picking_stock(&txn, &picking, &moves).await?;
        if !check.ok {
            STOCK_CHECK_REJECTIONS.inc();
            return Err(ServiceError::InsufficientStock(check.message));
        }

        StockMove::update_many()
            .col_expr(
                stock_move::Column::State,
                Expr::value(PickingState::Listo.as_str()),
            )
            .filter(stock_move::Column::PickingId.eq(picking_id))
            .filter(stock_move::Column::State.eq(PickingState::Draft.as_str()))
            .exec(&txn)
            .await?;

        let mut active: stock_picking::ActiveModel = picking.clone().into();
        active.state = Set(PickingState::Listo.as_str().to_string());
        active.updated_at = Set(Some(Utc::now()));
        active.update(&txn).await?;

        txn.commit().await?;

        info!(picking_id, name = %picking.name, "picking reserved");
        self.event_sender
            .send(Event::PickingReserved { picking_id })
            .await;

        Ok(TransitionOutcome::Applied)
    }

    /// Commits the document (listo → done): re-validates under the header
    /// lock, recomputes costs for owned receipts, applies every ledger
    /// mutation, and marks the document terminal. Calling it again on a
    /// `done` picking is an idempotent success.
    #[instrument(skip(self, tracking))]
    pub async fn commit_picking(
        &self,
        picking_id: i64,
        tracking: CommitTracking,
    ) -> Result<TransitionOutcome, ServiceError> {
        let txn = self.db.begin().await?;

        let picking = picking_for_update(&txn, picking_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("picking {} not found", picking_id)))?;
        let state = state_of(&picking)?;

        match state {
            PickingState::Done => {
                txn.commit().await?;
                info!(picking_id, "picking already done; commit is a no-op");
                return Ok(TransitionOutcome::AlreadyInState);
            }
            PickingState::Cancelled => {
                return Err(ServiceError::InvalidStatus(format!(
                    "picking {} is cancelled and cannot be confirmed",
                    picking.name
                )));
            }
            PickingState::Draft => {
                return Err(ServiceError::InvalidStatus(format!(
                    "picking {} must be reserved before confirmation",
                    picking.name
                )));
            }
            PickingState::Listo => {}
        }

        let picking_type = type_of(&picking)?;
        let moves = active_moves(&txn, picking_id).await?;

        // Second sufficiency check, now under the header lock: closes the
        // window between reservation and execution.
        let check = validation::check_picking_stock(&txn, &picking, &moves).await?;
        if !check.ok {
            STOCK_CHECK_REJECTIONS.inc();
            return Err(ServiceError::InsufficientStock(check.message));
        }

        let prepared = prepare_moves(&txn, picking_type, &moves, &tracking).await?;

        // Costing first: the blend must see the pre-transaction stock level.
        if picking_type == PickingType::Receipt {
            for p in &prepared {
                if p.product.is_owned() && p.quantity_done > QTY_EPSILON {
                    costing::update_weighted_average_cost(
                        &txn,
                        p.product.id,
                        p.quantity_done,
                        p.model.price_unit,
                    )
                    .await?;
                }
            }
        }

        for p in &prepared {
            apply_move_to_ledger(&txn, picking_type, p).await?;
        }

        let now = Utc::now();
        for p in &prepared {
            for (lot, qty) in &p.units {
                if let Some(lot) = lot {
                    let line = stock_move_line::ActiveModel {
                        move_id: Set(p.model.id),
                        lot_id: Set(lot.id),
                        qty_done: Set(*qty),
                        ..Default::default()
                    };
                    line.insert(&txn).await?;
                }
            }

            let mut active: stock_move::ActiveModel = p.model.clone().into();
            active.quantity_done = Set(p.quantity_done);
            active.state = Set(PickingState::Done.as_str().to_string());
            active.update(&txn).await?;
        }

        let mut active: stock_picking::ActiveModel = picking.clone().into();
        active.state = Set(PickingState::Done.as_str().to_string());
        active.date_done = Set(Some(now));
        active.updated_at = Set(Some(now));
        active.update(&txn).await?;

        txn.commit().await?;

        PICKINGS_COMMITTED
            .with_label_values(&[picking_type.as_str()])
            .inc();
        info!(picking_id, name = %picking.name, picking_type = picking_type.as_str(), "picking committed");

        if let Some(project_id) = picking.project_id {
            if let Err(e) = self.project_phase.recompute_project_phase(project_id).await {
                warn!(
                    project_id,
                    error = %e,
                    "project phase recomputation failed after commit"
                );
            }
        }

        self.event_sender
            .send(Event::PickingCommitted {
                picking_id,
                picking_type: picking_type.as_str().to_string(),
                project_id: picking.project_id,
                commit_ref: Uuid::new_v4(),
                date_done: now,
            })
            .await;

        Ok(TransitionOutcome::Applied)
    }

    /// Cancels a draft or reserved picking. Committed history cannot be
    /// cancelled. No ledger effect: reservation is computed live from move
    /// rows, so leaving `listo` releases it implicitly.
    #[instrument(skip(self))]
    pub async fn cancel_picking(&self, picking_id: i64) -> Result<TransitionOutcome, ServiceError> {
        let txn = self.db.begin().await?;

        let picking = picking_for_update(&txn, picking_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("picking {} not found", picking_id)))?;
        let state = state_of(&picking)?;

        match state {
            PickingState::Cancelled => {
                txn.commit().await?;
                return Ok(TransitionOutcome::AlreadyInState);
            }
            PickingState::Done => {
                return Err(ServiceError::InvalidStatus(format!(
                    "picking {} is done; committed history cannot be cancelled",
                    picking.name
                )));
            }
            PickingState::Draft | PickingState::Listo => {}
        }

        set_picking_and_moves_state(&txn, &picking, PickingState::Cancelled).await?;
        txn.commit().await?;

        info!(picking_id, name = %picking.name, "picking cancelled");
        self.event_sender
            .send(Event::PickingCancelled { picking_id })
            .await;

        Ok(TransitionOutcome::Applied)
    }

    /// Releases a reservation (listo → draft) so the document can be edited
    /// again.
    #[instrument(skip(self))]
    pub async fn return_to_draft(
        &self,
        picking_id: i64,
    ) -> Result<TransitionOutcome, ServiceError> {
        let txn = self.db.begin().await?;

        let picking = picking_for_update(&txn, picking_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("picking {} not found", picking_id)))?;
        let state = state_of(&picking)?;

        match state {
            PickingState::Draft => {
                txn.commit().await?;
                return Ok(TransitionOutcome::AlreadyInState);
            }
            PickingState::Done | PickingState::Cancelled => {
                return Err(ServiceError::InvalidStatus(format!(
                    "picking {} is {} and cannot return to draft",
                    picking.name,
                    state.as_str()
                )));
            }
            PickingState::Listo => {}
        }

        set_picking_and_moves_state(&txn, &picking, PickingState::Draft).await?;
        txn.commit().await?;

        info!(picking_id, name = %picking.name, "picking returned to draft");
        self.event_sender
            .send(Event::PickingReturnedToDraft { picking_id })
            .await;

        Ok(TransitionOutcome::Applied)
    }

    /// Deletes a draft picking, cascading its move lines and moves.
    #[instrument(skip(self))]
    pub async fn delete_picking(&self, picking_id: i64) -> Result<(), ServiceError> {
        let txn = self.db.begin().await?;

        let picking = picking_for_update(&txn, picking_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("picking {} not found", picking_id)))?;
        let state = state_of(&picking)?;

        if state != PickingState::Draft {
            return Err(ServiceError::InvalidStatus(format!(
                "picking {} is {}; only drafts can be deleted",
                picking.name,
                state.as_str()
            )));
        }

        let move_ids: Vec<i64> = StockMove::find()
            .filter(stock_move::Column::PickingId.eq(picking_id))
            .all(&txn)
            .await?
            .into_iter()
            .map(|m| m.id)
            .collect();

        if !move_ids.is_empty() {
            StockMoveLine::delete_many()
                .filter(stock_move_line::Column::MoveId.is_in(move_ids.clone()))
                .exec(&txn)
                .await?;
            StockMove::delete_many()
                .filter(stock_move::Column::PickingId.eq(picking_id))
                .exec(&txn)
                .await?;
        }

        picking.clone().delete(&txn).await?;
        txn.commit().await?;

        info!(picking_id, name = %picking.name, "picking deleted");
        self.event_sender
            .send(Event::PickingDeleted { picking_id })
            .await;

        Ok(())
    }

    /// Loads a picking with its moves.
    pub async fn get_picking(
        &self,
        picking_id: i64,
    ) -> Result<(stock_picking::Model, Vec<stock_move::Model>), ServiceError> {
        let picking = StockPicking::find_by_id(picking_id)
            .one(self.db.as_ref())
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("picking {} not found", picking_id)))?;
        let moves = StockMove::find()
            .filter(stock_move::Column::PickingId.eq(picking_id))
            .all(self.db.as_ref())
            .await?;
        Ok((picking, moves))
    }

    /// Stand-alone sufficiency check for the API layer.
    pub async fn check_stock(
        &self,
        picking_id: i64,
    ) -> Result<validation::StockCheck, ServiceError> {
        validation::check_stock(self.db.as_ref(), picking_id).await
    }
}

/// Loads the picking header under a row-level exclusive lock where the
/// backend supports one.
async fn picking_for_update<C: ConnectionTrait>(
    conn: &C,
    picking_id: i64,
) -> Result<Option<stock_picking::Model>, ServiceError> {
    let mut query = StockPicking::find_by_id(picking_id);
    if db::supports_row_locking(conn.get_database_backend()) {
        query = query.lock_exclusive();
    }
    Ok(query.one(conn).await?)
}

fn state_of(picking: &stock_picking::Model) -> Result<PickingState, ServiceError> {
    picking.state().ok_or_else(|| {
        ServiceError::InternalError(format!(
            "picking {} has unknown state '{}'",
            picking.id, picking.state
        ))
    })
}

fn type_of(picking: &stock_picking::Model) -> Result<PickingType, ServiceError> {
    picking.picking_type().ok_or_else(|| {
        ServiceError::InternalError(format!(
            "picking {} has unknown type '{}'",
            picking.id, picking.picking_type
        ))
    })
}

async fn active_moves<C: ConnectionTrait>(
    conn: &C,
    picking_id: i64,
) -> Result<Vec<stock_move::Model>, ServiceError> {
    Ok(StockMove::find()
        .filter(stock_move::Column::PickingId.eq(picking_id))
        .filter(stock_move::Column::State.ne(PickingState::Cancelled.as_str()))
        .all(conn)
        .await?)
}

async fn set_picking_and_moves_state<C: ConnectionTrait>(
    conn: &C,
    picking: &stock_picking::Model,
    state: PickingState,
) -> Result<(), ServiceError> {
    StockMove::update_many()
        .col_expr(stock_move::Column::State, Expr::value(state.as_str()))
        .filter(stock_move::Column::PickingId.eq(picking.id))
        .exec(conn)
        .await?;

    let mut active: stock_picking::ActiveModel = picking.clone().into();
    active.state = Set(state.as_str().to_string());
    active.updated_at = Set(Some(Utc::now()));
    active.update(conn).await?;
    Ok(())
}

async fn location_by_id<C: ConnectionTrait>(
    conn: &C,
    location_id: i64,
) -> Result<location::Model, ServiceError> {
    Location::find_by_id(location_id)
        .one(conn)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("location {} not found", location_id)))
}

/// First active location with the given usage; these are the virtual
/// counterpart endpoints for external-facing moves.
async fn virtual_location<C: ConnectionTrait>(
    conn: &C,
    usage: LocationUsage,
) -> Result<location::Model, ServiceError> {
    Location::find()
        .filter(location::Column::Usage.eq(usage.as_str()))
        .filter(location::Column::Active.eq(true))
        .one(conn)
        .await?
        .ok_or_else(|| {
            ServiceError::InternalError(format!(
                "no virtual {} location configured",
                usage.as_str()
            ))
        })
}

async fn require_internal<C: ConnectionTrait>(
    conn: &C,
    location_id: Option<i64>,
    role: &str,
) -> Result<location::Model, ServiceError> {
    let location_id = location_id.ok_or_else(|| {
        ServiceError::ValidationError(format!("a {} location is required", role))
    })?;
    let location = location_by_id(conn, location_id).await?;
    if !location.is_internal() {
        return Err(ServiceError::ValidationError(format!(
            "location '{}' cannot be used as {}: not an internal location",
            location.name, role
        )));
    }
    Ok(location)
}

/// Resolves the stored endpoints of a new document from its type: external
/// sides default to the matching virtual location.
async fn resolve_creation_endpoints<C: ConnectionTrait>(
    conn: &C,
    input: &NewPicking,
) -> Result<(Option<i64>, Option<i64>), ServiceError> {
    match input.picking_type {
        PickingType::Receipt => {
            let dest = require_internal(conn, input.location_dest_id, "destination").await?;
            let source = match input.location_id {
                Some(id) => id,
                None => virtual_location(conn, LocationUsage::Supplier).await?.id,
            };
            Ok((Some(source), Some(dest.id)))
        }
        PickingType::Dispatch | PickingType::Liquidation => {
            let source = require_internal(conn, input.location_id, "source").await?;
            let dest = match input.location_dest_id {
                Some(id) => id,
                None => virtual_location(conn, LocationUsage::Customer).await?.id,
            };
            Ok((Some(source.id), Some(dest)))
        }
        PickingType::Transfer => {
            let source = require_internal(conn, input.location_id, "source").await?;
            let dest = require_internal(conn, input.location_dest_id, "destination").await?;
            if source.id == dest.id {
                return Err(ServiceError::ValidationError(
                    "transfer source and destination must differ".to_string(),
                ));
            }
            Ok((Some(source.id), Some(dest.id)))
        }
        PickingType::Adjustment => {
            let affected = input.location_dest_id.or(input.location_id);
            let affected = require_internal(conn, affected, "adjusted").await?;
            let loss = virtual_location(conn, LocationUsage::InventoryLoss).await?;
            Ok((Some(loss.id), Some(affected.id)))
        }
    }
}

/// Resolves execution quantities and lot splits for every move, enforcing
/// tracked-quantity consistency and the serial rules.
async fn prepare_moves<C: ConnectionTrait>(
    conn: &C,
    picking_type: PickingType,
    moves: &[stock_move::Model],
    tracking: &CommitTracking,
) -> Result<Vec<PreparedMove>, ServiceError> {
    let tracking_by_move: HashMap<i64, &MoveTracking> =
        tracking.moves.iter().map(|t| (t.move_id, t)).collect();

    // Serials referenced so far in this commit, keyed by (product, name).
    let mut seen_serials: HashSet<(i64, String)> = HashSet::new();
    let mut prepared = Vec::with_capacity(moves.len());

    for mv in moves {
        let product = Product::find_by_id(mv.product_id)
            .one(conn)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("product {} not found", mv.product_id))
            })?;

        let entry = tracking_by_move.get(&mv.id).copied();
        let quantity_done = entry
            .and_then(|t| t.quantity_done)
            .unwrap_or(mv.product_uom_qty);

        let units = match product.tracking() {
            Tracking::None => {
                if entry.map(|t| !t.lots.is_empty()).unwrap_or(false) {
                    return Err(ServiceError::ValidationError(format!(
                        "product '{}' is not lot-tracked but tracking data was supplied",
                        product.name
                    )));
                }
                vec![(None, quantity_done)]
            }
            Tracking::Lot | Tracking::Serial => {
                let is_serial = product.tracking() == Tracking::Serial;
                let entry = entry.filter(|t| !t.lots.is_empty()).ok_or_else(|| {
                    ServiceError::ValidationError(format!(
                        "product '{}' requires lot tracking data",
                        product.name
                    ))
                })?;

                let mut units = Vec::with_capacity(entry.lots.len());
                let mut total = Decimal::ZERO;
                for line in &entry.lots {
                    let name = lots::normalize_lot_name(&line.lot_name)?;

                    if picking_type != PickingType::Adjustment && line.qty <= QTY_EPSILON {
                        return Err(ServiceError::ValidationError(format!(
                            "lot '{}' of product '{}' must carry a positive quantity",
                            name, product.name
                        )));
                    }

                    if is_serial {
                        if (line.qty.abs() - Decimal::ONE).abs() > QTY_EPSILON {
                            return Err(ServiceError::ValidationError(format!(
                                "serial '{}' of product '{}' must move exactly 1.0",
                                name, product.name
                            )));
                        }
                        if !seen_serials.insert((mv.product_id, name.clone())) {
                            return Err(ServiceError::DuplicateSerial(format!(
                                "serial '{}' of product '{}' referenced more than once in this document",
                                name, product.name
                            )));
                        }
                        // Virginity rule: a serial being received must not
                        // already have live stock anywhere.
                        if picking_type == PickingType::Receipt
                            && lots::has_live_stock(conn, mv.product_id, &name).await?
                        {
                            return Err(ServiceError::DuplicateSerial(format!(
                                "serial '{}' of product '{}' already has stock on hand",
                                name, product.name
                            )));
                        }
                    }

                    let lot = lots::find_or_create(conn, mv.product_id, &line.lot_name).await?;
                    total += line.qty;
                    units.push((Some(lot), line.qty));
                }

                if (total - quantity_done).abs() > QTY_EPSILON {
                    return Err(ServiceError::ValidationError(format!(
                        "lot quantities for product '{}' sum to {} but quantity done is {}",
                        product.name, total, quantity_done
                    )));
                }
                units
            }
        };

        prepared.push(PreparedMove {
            model: mv.clone(),
            product,
            quantity_done,
            units,
        });
    }

    Ok(prepared)
}

/// Applies one prepared move to the quant ledger. Only internal endpoints
/// are materialized; the virtual counterpart side of an external-facing move
/// never holds quants.
async fn apply_move_to_ledger<C: ConnectionTrait>(
    conn: &C,
    picking_type: PickingType,
    prepared: &PreparedMove,
) -> Result<(), ServiceError> {
    let mv = &prepared.model;
    let product = &prepared.product;

    match picking_type {
        PickingType::Receipt => {
            let dest = required_endpoint(conn, mv.location_dest_id, mv.id, "destination").await?;
            let project = credited_project(&dest, mv.project_id);
            for (lot, qty) in &prepared.units {
                ledger::apply_quantity_delta(
                    conn,
                    product.id,
                    dest.id,
                    *qty,
                    lot.as_ref().map(|l| l.id),
                    project,
                )
                .await?;
            }
        }
        PickingType::Dispatch | PickingType::Liquidation => {
            let source = required_endpoint(conn, mv.location_id, mv.id, "source").await?;
            for (lot, qty) in &prepared.units {
                deduct_with_project_fallback(
                    conn,
                    product,
                    &source,
                    lot.as_ref().map(|l| l.id),
                    mv.project_id,
                    *qty,
                )
                .await?;
            }
        }
        PickingType::Transfer => {
            let source = required_endpoint(conn, mv.location_id, mv.id, "source").await?;
            let dest = required_endpoint(conn, mv.location_dest_id, mv.id, "destination").await?;
            let project = credited_project(&dest, mv.project_id);
            for (lot, qty) in &prepared.units {
                let lot_id = lot.as_ref().map(|l| l.id);
                deduct_with_project_fallback(conn, product, &source, lot_id, mv.project_id, *qty)
                    .await?;
                ledger::apply_quantity_delta(conn, product.id, dest.id, *qty, lot_id, project)
                    .await?;
            }
        }
        PickingType::Adjustment => {
            // The affected location is the destination side; the virtual
            // loss location is the counterpart and stays off the ledger.
            let affected =
                required_endpoint(conn, mv.location_dest_id, mv.id, "adjusted").await?;
            let project = credited_project(&affected, mv.project_id);
            for (lot, qty) in &prepared.units {
                let lot_id = lot.as_ref().map(|l| l.id);
                if *qty >= Decimal::ZERO {
                    ledger::apply_quantity_delta(conn, product.id, affected.id, *qty, lot_id, project)
                        .await?;
                } else {
                    deduct_with_project_fallback(
                        conn,
                        product,
                        &affected,
                        lot_id,
                        mv.project_id,
                        qty.abs(),
                    )
                    .await?;
                }
            }
        }
    }

    Ok(())
}

async fn required_endpoint<C: ConnectionTrait>(
    conn: &C,
    location_id: Option<i64>,
    move_id: i64,
    role: &str,
) -> Result<location::Model, ServiceError> {
    let location_id = location_id.ok_or_else(|| {
        ServiceError::IntegrityViolation(format!("move {} has no {} location", move_id, role))
    })?;
    location_by_id(conn, location_id).await
}

/// Project tag written on the credited quant: destinations in the main
/// warehouse category return material to general stock.
fn credited_project(dest: &location::Model, project_id: Option<i64>) -> Option<i64> {
    if dest.is_main_warehouse() {
        None
    } else {
        project_id
    }
}

/// Outbound deduction depletes the project-tagged quant first, then borrows
/// the remainder from general (untagged) stock. Stock tagged to other
/// projects is never touched.
async fn deduct_with_project_fallback<C: ConnectionTrait>(
    conn: &C,
    product: &product::Model,
    location: &location::Model,
    lot_id: Option<i64>,
    project_id: Option<i64>,
    qty: Decimal,
) -> Result<(), ServiceError> {
    let mut remaining = qty;

    if let Some(project) = project_id {
        let project_qty =
            ledger::quantity_of(conn, product.id, location.id, lot_id, Some(project)).await?;
        let take = remaining.min(project_qty.max(Decimal::ZERO));
        if take > QTY_EPSILON {
            ledger::apply_quantity_delta(
                conn,
                product.id,
                location.id,
                -take,
                lot_id,
                Some(project),
            )
            .await?;
            remaining -= take;
        }
    }

    if remaining > QTY_EPSILON {
        let general_qty = ledger::quantity_of(conn, product.id, location.id, lot_id, None).await?;
        if remaining > general_qty + QTY_EPSILON {
            return Err(ServiceError::InsufficientStock(format!(
                "Stock insuficiente de '{}' en {}: requerido {}, disponible {}",
                product.name, location.name, remaining, general_qty
            )));
        }
        ledger::apply_quantity_delta(conn, product.id, location.id, -remaining, lot_id, None)
            .await?;
    }

    Ok(())
}

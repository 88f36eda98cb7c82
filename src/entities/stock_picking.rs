use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Kind of stock-moving document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PickingType {
    /// Vendor receipt into an internal location.
    Receipt,
    /// Dispatch to a customer or contractor.
    Dispatch,
    /// Transfer between two internal locations.
    Transfer,
    /// Ground-truth correction of an internal location.
    Adjustment,
    /// Work-order liquidation (material consumed at the obra).
    Liquidation,
}

impl PickingType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PickingType::Receipt => "in",
            PickingType::Dispatch => "out",
            PickingType::Transfer => "int",
            PickingType::Adjustment => "adj",
            PickingType::Liquidation => "ret",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "in" => Some(PickingType::Receipt),
            "out" => Some(PickingType::Dispatch),
            "int" => Some(PickingType::Transfer),
            "adj" => Some(PickingType::Adjustment),
            "ret" => Some(PickingType::Liquidation),
            _ => None,
        }
    }

    /// Segment used in document numbers, e.g. the `IN` of `C1/IN/00042`.
    pub fn code(&self) -> &'static str {
        match self {
            PickingType::Receipt => "IN",
            PickingType::Dispatch => "OUT",
            PickingType::Transfer => "INT",
            PickingType::Adjustment => "ADJ",
            PickingType::Liquidation => "RET",
        }
    }

    /// Types whose moves consume stock from their source location and
    /// therefore participate in reservation.
    pub fn consumes_source(&self) -> bool {
        matches!(
            self,
            PickingType::Dispatch | PickingType::Transfer | PickingType::Liquidation
        )
    }
}

/// Lifecycle state shared by pickings and their moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PickingState {
    Draft,
    Listo,
    Done,
    Cancelled,
}

impl PickingState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PickingState::Draft => "draft",
            PickingState::Listo => "listo",
            PickingState::Done => "done",
            PickingState::Cancelled => "cancelled",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "draft" => Some(PickingState::Draft),
            "listo" => Some(PickingState::Listo),
            "done" => Some(PickingState::Done),
            "cancelled" => Some(PickingState::Cancelled),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, PickingState::Done | PickingState::Cancelled)
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "stock_pickings")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Allocated document number, e.g. `C1/OUT/00017`.
    pub name: String,
    pub picking_type: String,
    pub state: String,
    pub location_id: Option<i64>,
    pub location_dest_id: Option<i64>,
    pub partner_name: Option<String>,
    /// Free-form reference to the originating work order.
    pub origin: Option<String>,
    pub project_id: Option<i64>,
    pub notes: Option<String>,
    pub date_done: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Model {
    pub fn picking_type(&self) -> Option<PickingType> {
        PickingType::from_str(&self.picking_type)
    }

    pub fn state(&self) -> Option<PickingState> {
        PickingState::from_str(&self.state)
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::stock_move::Entity")]
    StockMoves,
}

impl Related<super::stock_move::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::StockMoves.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn picking_type_roundtrip() {
        for ty in [
            PickingType::Receipt,
            PickingType::Dispatch,
            PickingType::Transfer,
            PickingType::Adjustment,
            PickingType::Liquidation,
        ] {
            assert_eq!(PickingType::from_str(ty.as_str()), Some(ty));
        }
        assert_eq!(PickingType::from_str("xyz"), None);
    }

    #[test]
    fn state_roundtrip() {
        assert_eq!(PickingState::from_str("listo"), Some(PickingState::Listo));
        assert!(PickingState::Done.is_terminal());
        assert!(PickingState::Cancelled.is_terminal());
        assert!(!PickingState::Listo.is_terminal());
    }

    #[test]
    fn consuming_types() {
        assert!(PickingType::Dispatch.consumes_source());
        assert!(PickingType::Liquidation.consumes_source());
        assert!(!PickingType::Receipt.consumes_source());
        assert!(!PickingType::Adjustment.consumes_source());
    }
}

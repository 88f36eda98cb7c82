use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// One product line of a picking. Owned exclusively by its picking; the state
/// column mirrors the picking lifecycle (see `stock_picking::PickingState`).
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "stock_moves")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub picking_id: i64,
    pub product_id: i64,
    /// Planned quantity; negative only on adjustment lines.
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub product_uom_qty: Decimal,
    /// Quantity actually executed at commit time.
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub quantity_done: Decimal,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub price_unit: Decimal,
    pub location_id: Option<i64>,
    pub location_dest_id: Option<i64>,
    pub project_id: Option<i64>,
    pub state: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::stock_picking::Entity",
        from = "Column::PickingId",
        to = "super::stock_picking::Column::Id"
    )]
    Picking,
    #[sea_orm(
        belongs_to = "super::product::Entity",
        from = "Column::ProductId",
        to = "super::product::Column::Id"
    )]
    Product,
    #[sea_orm(has_many = "super::stock_move_line::Entity")]
    MoveLines,
}

impl Related<super::stock_picking::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Picking.def()
    }
}

impl Related<super::product::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Product.def()
    }
}

impl Related<super::stock_move_line::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::MoveLines.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

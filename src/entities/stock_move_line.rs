use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Lot-level split of a move's executed quantity. Written at commit time; the
/// splits of a move must sum to its `quantity_done`.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "stock_move_lines")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub move_id: i64,
    pub lot_id: i64,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub qty_done: Decimal,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::stock_move::Entity",
        from = "Column::MoveId",
        to = "super::stock_move::Column::Id"
    )]
    Move,
    #[sea_orm(
        belongs_to = "super::stock_lot::Entity",
        from = "Column::LotId",
        to = "super::stock_lot::Column::Id"
    )]
    Lot,
}

impl Related<super::stock_move::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Move.def()
    }
}

impl Related<super::stock_lot::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Lot.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// A cost-tracking dimension (obra / field job). The `phase` column is owned
/// by the external project-phase automaton, not by this crate.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "projects")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub name: String,
    pub code: Option<String>,
    pub phase: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::stock_quant::Entity")]
    StockQuants,
}

impl Related<super::stock_quant::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::StockQuants.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

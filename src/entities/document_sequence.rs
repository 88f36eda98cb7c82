use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Next free number per document prefix (`C{company}/{TYPE}`). Allocation
/// happens under an advisory lock; see `services::sequences`.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "document_sequences")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub prefix: String,
    pub next_number: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

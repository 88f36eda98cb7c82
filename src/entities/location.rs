use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Category name marking general-stock destinations. Material arriving at a
/// location in this category loses its project tag.
pub const MAIN_WAREHOUSE_CATEGORY: &str = "ALMACEN PRINCIPAL";

/// What a location physically is. Non-internal locations are virtual
/// counterpart endpoints and never hold quants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocationUsage {
    Internal,
    Supplier,
    Customer,
    InventoryLoss,
}

impl LocationUsage {
    pub fn as_str(&self) -> &'static str {
        match self {
            LocationUsage::Internal => "internal",
            LocationUsage::Supplier => "supplier",
            LocationUsage::Customer => "customer",
            LocationUsage::InventoryLoss => "inventory_loss",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "internal" => Some(LocationUsage::Internal),
            "supplier" => Some(LocationUsage::Supplier),
            "customer" => Some(LocationUsage::Customer),
            "inventory_loss" => Some(LocationUsage::InventoryLoss),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "locations")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub name: String,
    pub usage: String,
    pub category: Option<String>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Model {
    pub fn usage(&self) -> Option<LocationUsage> {
        LocationUsage::from_str(&self.usage)
    }

    pub fn is_internal(&self) -> bool {
        self.usage == LocationUsage::Internal.as_str()
    }

    /// Destinations in the main warehouse category return material to general
    /// stock, dropping any project tag.
    pub fn is_main_warehouse(&self) -> bool {
        self.category
            .as_deref()
            .map(|c| c.eq_ignore_ascii_case(MAIN_WAREHOUSE_CATEGORY))
            .unwrap_or(false)
    }
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usage_roundtrip() {
        assert_eq!(LocationUsage::InventoryLoss.as_str(), "inventory_loss");
        assert_eq!(
            LocationUsage::from_str("supplier"),
            Some(LocationUsage::Supplier)
        );
        assert_eq!(LocationUsage::from_str("warehouse"), None);
    }
}

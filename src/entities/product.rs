use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// How units of a product are identified in stock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tracking {
    None,
    Lot,
    Serial,
}

impl Tracking {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tracking::None => "none",
            Tracking::Lot => "lot",
            Tracking::Serial => "serial",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "none" => Some(Tracking::None),
            "lot" => Some(Tracking::Lot),
            "serial" => Some(Tracking::Serial),
            _ => None,
        }
    }
}

/// Who carries the goods on their books. Consigned stock never feeds the
/// weighted-average cost basis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Ownership {
    Owned,
    Consigned,
}

impl Ownership {
    pub fn as_str(&self) -> &'static str {
        match self {
            Ownership::Owned => "owned",
            Ownership::Consigned => "consigned",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "owned" => Some(Ownership::Owned),
            "consigned" => Some(Ownership::Consigned),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "products")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub name: String,
    pub default_code: Option<String>,
    pub tracking: String,
    pub ownership: String,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub standard_price: Decimal,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Model {
    pub fn tracking(&self) -> Tracking {
        Tracking::from_str(&self.tracking).unwrap_or(Tracking::None)
    }

    pub fn is_owned(&self) -> bool {
        Ownership::from_str(&self.ownership)
            .map(|o| o == Ownership::Owned)
            .unwrap_or(false)
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::stock_quant::Entity")]
    StockQuants,
    #[sea_orm(has_many = "super::stock_lot::Entity")]
    StockLots,
}

impl Related<super::stock_quant::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::StockQuants.def()
    }
}

impl Related<super::stock_lot::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::StockLots.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracking_roundtrip() {
        assert_eq!(Tracking::Serial.as_str(), "serial");
        assert_eq!(Tracking::from_str("lot"), Some(Tracking::Lot));
        assert_eq!(Tracking::from_str("bogus"), None);
    }

    #[test]
    fn ownership_roundtrip() {
        assert_eq!(Ownership::Consigned.as_str(), "consigned");
        assert_eq!(Ownership::from_str("owned"), Some(Ownership::Owned));
        assert_eq!(Ownership::from_str(""), None);
    }
}

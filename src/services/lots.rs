//! Lot/serial registry.
//!
//! Lot names are normalized before touching the database: trimmed,
//! uppercased, restricted to a conservative charset and 30 characters.
//! Serials additionally obey the virginity rule — a serial with live stock
//! anywhere in internal locations cannot be received again.

use chrono::Utc;
use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, JoinType, PaginatorTrait,
    QueryFilter, QuerySelect, RelationTrait, Set,
};

use crate::entities::stock_lot::{self, Entity as StockLot};
use crate::entities::stock_quant::{self, Entity as StockQuant};
use crate::errors::ServiceError;

pub const MAX_LOT_NAME_LEN: usize = 30;

static LOT_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Z0-9\-_/.]+$").expect("lot name pattern is valid"));

/// Normalizes a raw lot name, rejecting empty, oversized, or
/// charset-violating input.
pub fn normalize_lot_name(raw: &str) -> Result<String, ServiceError> {
    let name = raw.trim().to_uppercase();
    if name.is_empty() {
        return Err(ServiceError::ValidationError(
            "lot name must not be empty".to_string(),
        ));
    }
    if name.chars().count() > MAX_LOT_NAME_LEN {
        return Err(ServiceError::ValidationError(format!(
            "lot name '{}' exceeds {} characters",
            name, MAX_LOT_NAME_LEN
        )));
    }
    if !LOT_NAME_RE.is_match(&name) {
        return Err(ServiceError::ValidationError(format!(
            "lot name '{}' contains characters outside A-Z 0-9 - _ / .",
            name
        )));
    }
    Ok(name)
}

/// Resolves a lot by normalized name, creating it on first reference.
pub async fn find_or_create<C: ConnectionTrait>(
    conn: &C,
    product_id: i64,
    raw_name: &str,
) -> Result<stock_lot::Model, ServiceError> {
    let name = normalize_lot_name(raw_name)?;

    if let Some(lot) = StockLot::find()
        .filter(stock_lot::Column::ProductId.eq(product_id))
        .filter(stock_lot::Column::Name.eq(name.clone()))
        .one(conn)
        .await?
    {
        return Ok(lot);
    }

    let lot = stock_lot::ActiveModel {
        product_id: Set(product_id),
        name: Set(name),
        created_at: Set(Utc::now()),
        ..Default::default()
    };
    Ok(lot.insert(conn).await?)
}

/// True when the serial already has positive quantity somewhere in internal
/// stock. Quants only exist for internal locations, so one positive row is
/// enough to convict.
pub async fn has_live_stock<C: ConnectionTrait>(
    conn: &C,
    product_id: i64,
    normalized_name: &str,
) -> Result<bool, ServiceError> {
    let count = StockQuant::find()
        .join(JoinType::InnerJoin, stock_quant::Relation::Lot.def())
        .filter(stock_quant::Column::ProductId.eq(product_id))
        .filter(stock_lot::Column::Name.eq(normalized_name))
        .filter(stock_quant::Column::Quantity.gt(Decimal::ZERO))
        .count(conn)
        .await?;
    Ok(count > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("sn-100", "SN-100")]
    #[case("  lote/2024.b  ", "LOTE/2024.B")]
    #[case("A_B", "A_B")]
    fn normalization_accepts(#[case] raw: &str, #[case] expected: &str) {
        assert_eq!(normalize_lot_name(raw).unwrap(), expected);
    }

    #[rstest]
    #[case("")]
    #[case("   ")]
    #[case("SN 100")]
    #[case("LOTE#9")]
    #[case("ÑU-1")]
    fn normalization_rejects(#[case] raw: &str) {
        assert!(normalize_lot_name(raw).is_err());
    }

    #[test]
    fn normalization_rejects_oversized() {
        let raw = "A".repeat(MAX_LOT_NAME_LEN + 1);
        assert!(normalize_lot_name(&raw).is_err());
        let raw = "A".repeat(MAX_LOT_NAME_LEN);
        assert!(normalize_lot_name(&raw).is_ok());
    }
}

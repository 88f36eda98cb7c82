//! Document numbering.
//!
//! Numbers look like `C{company}/{TYPE}/00042` and must be dense per prefix.
//! On Postgres, a transaction-scoped advisory lock keyed by a stable hash of
//! the prefix serializes concurrent allocators without a table lock; SQLite's
//! single-writer model makes the lock unnecessary there.

use sea_orm::{ActiveModelTrait, ConnectionTrait, DbBackend, EntityTrait, Set, Statement};

use crate::entities::document_sequence::{self, Entity as DocumentSequence};
use crate::entities::stock_picking::PickingType;
use crate::errors::ServiceError;

/// Stable FNV-1a fold of the prefix into the advisory-lock keyspace.
fn prefix_lock_key(prefix: &str) -> i64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in prefix.as_bytes() {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    hash as i64
}

/// Allocates the next document name for (company, type). Must be called
/// inside the transaction that creates the document, so the advisory lock is
/// released on commit or rollback.
pub async fn next_document_name<C: ConnectionTrait>(
    conn: &C,
    company_code: &str,
    picking_type: PickingType,
) -> Result<String, ServiceError> {
    let prefix = format!("C{}/{}", company_code, picking_type.code());

    if conn.get_database_backend() == DbBackend::Postgres {
        conn.execute(Statement::from_sql_and_values(
            DbBackend::Postgres,
            "SELECT pg_advisory_xact_lock($1)",
            [prefix_lock_key(&prefix).into()],
        ))
        .await?;
    }

    let number = match DocumentSequence::find_by_id(prefix.clone()).one(conn).await? {
        Some(row) => {
            let number = row.next_number;
            let mut active: document_sequence::ActiveModel = row.into();
            active.next_number = Set(number + 1);
            active.update(conn).await?;
            number
        }
        None => {
            let row = document_sequence::ActiveModel {
                prefix: Set(prefix.clone()),
                next_number: Set(2),
            };
            row.insert(conn).await?;
            1
        }
    };

    Ok(format!("{}/{:05}", prefix, number))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lock_key_is_stable_and_discriminating() {
        assert_eq!(prefix_lock_key("C1/IN"), prefix_lock_key("C1/IN"));
        assert_ne!(prefix_lock_key("C1/IN"), prefix_lock_key("C1/OUT"));
        assert_ne!(prefix_lock_key("C1/IN"), prefix_lock_key("C2/IN"));
    }
}

//! The visibility ledger: one row per (order, eligible supplier), recording the supplier's response to the offer.
//!
//! Every row starts as `Offered` and moves exactly once, to `Accepted`, `Declined` or `Expired`. Rows only ever move
//! via a compare-and-swap on the `Offered` status, so a stale attempt is detected rather than overwriting a response.
use log::trace;
use sqlx::{QueryBuilder, SqliteConnection};

use crate::db_types::{OrderId, SupplierId, VisibilityRecord, VisibilityStatus};

/// The outcome of [`transition`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OfferTransition {
    /// The record was `Offered` and now has the requested status.
    Moved(VisibilityRecord),
    /// The record exists but had already left `Offered`. Carries the status it was found in.
    Stale(VisibilityStatus),
    /// The supplier was never offered the order.
    NotOffered,
}

/// Creates one `Offered` record per supplier as a single statement. Either every record is written or none is.
pub async fn insert_offers(
    order_id: &OrderId,
    suppliers: &[SupplierId],
    conn: &mut SqliteConnection,
) -> Result<Vec<VisibilityRecord>, sqlx::Error> {
    if suppliers.is_empty() {
        return Ok(vec![]);
    }
    let mut builder = QueryBuilder::new("INSERT INTO order_visibility (order_id, supplier_id, status) ");
    builder.push_values(suppliers, |mut row, supplier| {
        row.push_bind(order_id.value()).push_bind(supplier.as_str()).push_bind(VisibilityStatus::Offered);
    });
    builder.push(" RETURNING *");
    let mut records: Vec<VisibilityRecord> = builder.build_query_as().fetch_all(conn).await?;
    records.sort_by_key(|r| r.id);
    trace!("👁️ {} offers created for order {order_id}", records.len());
    Ok(records)
}

/// Compare-and-swap from `Offered` to `new_status`.
pub async fn transition(
    order_id: &OrderId,
    supplier_id: &SupplierId,
    new_status: VisibilityStatus,
    conn: &mut SqliteConnection,
) -> Result<OfferTransition, sqlx::Error> {
    let moved: Option<VisibilityRecord> = sqlx::query_as(
        r#"
        UPDATE order_visibility SET status = $1, updated_at = CURRENT_TIMESTAMP
        WHERE order_id = $2 AND supplier_id = $3 AND status = 'Offered'
        RETURNING *;
        "#,
    )
    .bind(new_status)
    .bind(order_id)
    .bind(supplier_id)
    .fetch_optional(&mut *conn)
    .await?;
    if let Some(record) = moved {
        trace!("👁️ Offer of {order_id} to {supplier_id} is now {new_status}");
        return Ok(OfferTransition::Moved(record));
    }
    let result = match fetch_offer(order_id, supplier_id, conn).await? {
        Some(record) => OfferTransition::Stale(record.status),
        None => OfferTransition::NotOffered,
    };
    Ok(result)
}

/// Expires every still-open offer on the order, returning the records that changed.
pub async fn expire_open_offers(
    order_id: &OrderId,
    conn: &mut SqliteConnection,
) -> Result<Vec<VisibilityRecord>, sqlx::Error> {
    let mut records: Vec<VisibilityRecord> = sqlx::query_as(
        r#"
        UPDATE order_visibility SET status = 'Expired', updated_at = CURRENT_TIMESTAMP
        WHERE order_id = $1 AND status = 'Offered'
        RETURNING *;
        "#,
    )
    .bind(order_id)
    .fetch_all(conn)
    .await?;
    records.sort_by_key(|r| r.id);
    trace!("👁️ {} open offers on order {order_id} expired", records.len());
    Ok(records)
}

/// The number of offers on the order that are still `Offered` or have been `Accepted`.
pub async fn count_live_offers(order_id: &OrderId, conn: &mut SqliteConnection) -> Result<i64, sqlx::Error> {
    let (count,): (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM order_visibility WHERE order_id = $1 AND status IN ('Offered', 'Accepted')",
    )
    .bind(order_id)
    .fetch_one(conn)
    .await?;
    Ok(count)
}

pub async fn fetch_offer(
    order_id: &OrderId,
    supplier_id: &SupplierId,
    conn: &mut SqliteConnection,
) -> Result<Option<VisibilityRecord>, sqlx::Error> {
    let record = sqlx::query_as("SELECT * FROM order_visibility WHERE order_id = $1 AND supplier_id = $2")
        .bind(order_id)
        .bind(supplier_id)
        .fetch_optional(conn)
        .await?;
    Ok(record)
}

pub async fn fetch_offers_for_order(
    order_id: &OrderId,
    conn: &mut SqliteConnection,
) -> Result<Vec<VisibilityRecord>, sqlx::Error> {
    let records = sqlx::query_as("SELECT * FROM order_visibility WHERE order_id = $1 ORDER BY id")
        .bind(order_id)
        .fetch_all(conn)
        .await?;
    Ok(records)
}

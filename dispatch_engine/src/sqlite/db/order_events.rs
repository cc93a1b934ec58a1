use log::trace;
use sqlx::SqliteConnection;

use crate::db_types::{NewOrderEvent, OrderEvent, OrderId};

/// Appends an entry to the lifecycle log. Entries are never modified afterwards; the schema rejects it.
pub async fn log_event(event: NewOrderEvent, conn: &mut SqliteConnection) -> Result<OrderEvent, sqlx::Error> {
    let NewOrderEvent { order_id, actor_id, kind, payload } = event;
    let entry: OrderEvent = sqlx::query_as(
        r#"
        INSERT INTO order_events (order_id, actor_id, kind, payload)
        VALUES ($1, $2, $3, $4)
        RETURNING *;
        "#,
    )
    .bind(order_id)
    .bind(actor_id)
    .bind(kind)
    .bind(payload.to_string())
    .fetch_one(conn)
    .await?;
    trace!("🧾️ {} logged for order {order_id}", entry.kind);
    Ok(entry)
}

pub async fn fetch_events_for_order(
    order_id: &OrderId,
    conn: &mut SqliteConnection,
) -> Result<Vec<OrderEvent>, sqlx::Error> {
    let events =
        sqlx::query_as("SELECT * FROM order_events WHERE order_id = $1 ORDER BY id").bind(order_id).fetch_all(conn).await?;
    Ok(events)
}

/// Events whose order has since been removed.
pub async fn fetch_orphaned_events(conn: &mut SqliteConnection) -> Result<Vec<OrderEvent>, sqlx::Error> {
    let events = sqlx::query_as("SELECT * FROM order_events WHERE order_id IS NULL ORDER BY id").fetch_all(conn).await?;
    Ok(events)
}

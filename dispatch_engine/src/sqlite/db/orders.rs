use chrono::Duration;
use log::{debug, trace};
use sqlx::{QueryBuilder, SqliteConnection};

use crate::db_types::{LineItem, NewOrder, Order, OrderId, OrderStatusType, SupplierId, VendorId};

/// Inserts a new order, with status `Created`, and its line items. This is not atomic. Embed the call inside a
/// transaction if you need to ensure atomicity, and pass `&mut *tx` as the connection argument.
pub async fn insert_order(order: NewOrder, conn: &mut SqliteConnection) -> Result<Order, sqlx::Error> {
    let NewOrder { vendor_id, items, delivery_location, partial_allowed } = order;
    let mut inserted: Order = sqlx::query_as(
        r#"
            INSERT INTO orders (vendor_id, delivery_location, partial_allowed, status)
            VALUES ($1, $2, $3, 'Created')
            RETURNING *;
        "#,
    )
    .bind(vendor_id)
    .bind(delivery_location)
    .bind(partial_allowed)
    .fetch_one(&mut *conn)
    .await?;
    insert_line_items(&inserted.id, &items, conn).await?;
    debug!("📝️ Order {} inserted with {} line items", inserted.id, items.len());
    inserted.items = items;
    Ok(inserted)
}

async fn insert_line_items(
    order_id: &OrderId,
    items: &[LineItem],
    conn: &mut SqliteConnection,
) -> Result<(), sqlx::Error> {
    if items.is_empty() {
        return Ok(());
    }
    let mut builder = QueryBuilder::new("INSERT INTO order_items (order_id, position, sku, quantity) ");
    builder.push_values(items.iter().enumerate(), |mut row, (position, item)| {
        row.push_bind(order_id.value())
            .push_bind(position as i64)
            .push_bind(item.sku.as_str())
            .push_bind(item.quantity.value());
    });
    builder.build().execute(conn).await?;
    Ok(())
}

pub async fn fetch_line_items(order_id: &OrderId, conn: &mut SqliteConnection) -> Result<Vec<LineItem>, sqlx::Error> {
    let items = sqlx::query_as("SELECT sku, quantity FROM order_items WHERE order_id = $1 ORDER BY position")
        .bind(order_id)
        .fetch_all(conn)
        .await?;
    Ok(items)
}

async fn with_line_items(mut order: Order, conn: &mut SqliteConnection) -> Result<Order, sqlx::Error> {
    order.items = fetch_line_items(&order.id, conn).await?;
    Ok(order)
}

async fn with_line_items_all(orders: Vec<Order>, conn: &mut SqliteConnection) -> Result<Vec<Order>, sqlx::Error> {
    let mut result = Vec::with_capacity(orders.len());
    for order in orders {
        result.push(with_line_items(order, conn).await?);
    }
    Ok(result)
}

/// Fetches the order, including its line items.
pub async fn fetch_order(order_id: &OrderId, conn: &mut SqliteConnection) -> Result<Option<Order>, sqlx::Error> {
    let order: Option<Order> =
        sqlx::query_as("SELECT * FROM orders WHERE id = $1").bind(order_id).fetch_optional(&mut *conn).await?;
    match order {
        Some(o) => Ok(Some(with_line_items(o, conn).await?)),
        None => Ok(None),
    }
}

/// Fetches the order status alone. Used to classify a failed guarded write.
pub async fn fetch_order_status(
    order_id: &OrderId,
    conn: &mut SqliteConnection,
) -> Result<Option<(OrderStatusType, VendorId)>, sqlx::Error> {
    let status =
        sqlx::query_as("SELECT status, vendor_id FROM orders WHERE id = $1").bind(order_id).fetch_optional(conn).await?;
    Ok(status)
}

/// Returns every order placed by the vendor, newest first.
pub async fn fetch_orders_for_vendor(
    vendor_id: &VendorId,
    conn: &mut SqliteConnection,
) -> Result<Vec<Order>, sqlx::Error> {
    let orders = sqlx::query_as("SELECT * FROM orders WHERE vendor_id = $1 ORDER BY created_at DESC, id DESC")
        .bind(vendor_id)
        .fetch_all(&mut *conn)
        .await?;
    with_line_items_all(orders, conn).await
}

/// Returns every order on which the supplier holds an open offer, oldest first.
pub async fn fetch_active_orders_for_supplier(
    supplier_id: &SupplierId,
    conn: &mut SqliteConnection,
) -> Result<Vec<Order>, sqlx::Error> {
    let orders = sqlx::query_as(
        r#"
        SELECT orders.* FROM orders
        JOIN order_visibility ON order_visibility.order_id = orders.id
        WHERE order_visibility.supplier_id = $1
          AND order_visibility.status = 'Offered'
          AND orders.status = 'Offered'
        ORDER BY orders.created_at, orders.id
        "#,
    )
    .bind(supplier_id)
    .fetch_all(&mut *conn)
    .await?;
    with_line_items_all(orders, conn).await
}

/// Moves the order to `new_status`, but only if its current status is one of `from`. Returns the updated order, or
/// `None` if the order does not exist or its status did not match.
pub async fn update_status_if(
    order_id: &OrderId,
    from: &[OrderStatusType],
    new_status: OrderStatusType,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    if from.is_empty() {
        return Ok(None);
    }
    let mut builder = QueryBuilder::new("UPDATE orders SET status = ");
    builder.push_bind(new_status);
    builder.push(", updated_at = CURRENT_TIMESTAMP WHERE id = ");
    builder.push_bind(order_id.value());
    builder.push(" AND status IN (");
    let mut statuses = builder.separated(", ");
    for s in from {
        statuses.push_bind(*s);
    }
    statuses.push_unseparated(") RETURNING *");
    let order: Option<Order> = builder.build_query_as().fetch_optional(&mut *conn).await?;
    match order {
        Some(o) => {
            trace!("📝️ Order {} moved to {new_status}", o.id);
            Ok(Some(with_line_items(o, conn).await?))
        },
        None => Ok(None),
    }
}

/// The compare-and-swap at the heart of the claim flow. Moves an `Offered` order to `Accepted` and records the
/// winning supplier in one statement.
pub async fn claim_order(
    order_id: &OrderId,
    supplier_id: &SupplierId,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let order: Option<Order> = sqlx::query_as(
        r#"
        UPDATE orders SET status = 'Accepted', accepted_by = $1, updated_at = CURRENT_TIMESTAMP
        WHERE id = $2 AND status = 'Offered'
        RETURNING *;
        "#,
    )
    .bind(supplier_id)
    .bind(order_id)
    .fetch_optional(&mut *conn)
    .await?;
    match order {
        Some(o) => Ok(Some(with_line_items(o, conn).await?)),
        None => Ok(None),
    }
}

/// Cancels the order if it belongs to `vendor_id` and is still cancellable.
pub async fn cancel_order(
    order_id: &OrderId,
    vendor_id: &VendorId,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let order: Option<Order> = sqlx::query_as(
        r#"
        UPDATE orders SET status = 'Cancelled', updated_at = CURRENT_TIMESTAMP
        WHERE id = $1 AND vendor_id = $2 AND status IN ('Created', 'Offered', 'Accepted')
        RETURNING *;
        "#,
    )
    .bind(order_id)
    .bind(vendor_id)
    .fetch_optional(&mut *conn)
    .await?;
    match order {
        Some(o) => Ok(Some(with_line_items(o, conn).await?)),
        None => Ok(None),
    }
}

/// Moves every order that has been `Offered` for at least `ttl` to `DeclinedAll`, returning the affected orders.
pub async fn decline_stale_orders(ttl: Duration, conn: &mut SqliteConnection) -> Result<Vec<Order>, sqlx::Error> {
    let orders = sqlx::query_as(
        r#"
        UPDATE orders SET status = 'DeclinedAll', updated_at = CURRENT_TIMESTAMP
        WHERE status = 'Offered'
          AND CAST(strftime('%s', 'now') AS INTEGER) - CAST(strftime('%s', updated_at) AS INTEGER) >= $1
        RETURNING *;
        "#,
    )
    .bind(ttl.num_seconds())
    .fetch_all(&mut *conn)
    .await?;
    with_line_items_all(orders, conn).await
}

/// Deletes the order. Line items and visibility records go with it; events keep their row with a null order
/// reference.
pub async fn delete_order(order_id: &OrderId, conn: &mut SqliteConnection) -> Result<Option<Order>, sqlx::Error> {
    let rows: Vec<(i64, String, i64)> =
        sqlx::query_as("DELETE FROM order_items WHERE order_id = $1 RETURNING position, sku, quantity")
            .bind(order_id)
            .fetch_all(&mut *conn)
            .await?;
    let mut items =
        rows.into_iter().map(|(position, sku, quantity)| (position, LineItem::new(sku, quantity))).collect::<Vec<_>>();
    items.sort_by_key(|(position, _)| *position);
    let order: Option<Order> =
        sqlx::query_as("DELETE FROM orders WHERE id = $1 RETURNING *").bind(order_id).fetch_optional(conn).await?;
    Ok(order.map(|mut o| {
        o.items = items.into_iter().map(|(_, item)| item).collect();
        o
    }))
}

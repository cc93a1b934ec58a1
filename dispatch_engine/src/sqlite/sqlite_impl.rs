//! `SqliteDatabase` is a concrete implementation of a dispatch engine backend.
//!
//! Unsurprisingly, it uses SQLite as the backend and implements all the traits defined in the [`crate::traits`] module.
//!
//! Every lifecycle method opens a transaction whose first statement is a write. SQLite therefore hands out its writer
//! lock in the order the transitions arrive, and each guarded update sees the committed result of every transition
//! before it.
use std::{collections::HashSet, fmt::Debug};

use chrono::Duration;
use log::*;
use serde_json::json;
use sqlx::{SqliteConnection, SqlitePool};

use super::db::{
    catalog,
    db_url,
    new_pool,
    order_events,
    orders,
    visibility::{self, OfferTransition},
};
use crate::{
    config::EngineConfig,
    db_types::{
        EventKind,
        InventoryRecord,
        NewOrder,
        NewOrderEvent,
        Order,
        OrderEvent,
        OrderId,
        OrderStatusType,
        SupplierId,
        SupplierProfile,
        VendorId,
        VisibilityRecord,
        VisibilityStatus,
    },
    traits::{
        DispatchDatabase,
        DispatchError,
        InventoryCatalog,
        OfferDeclined,
        OfferExpiryResult,
        OrderAccepted,
        OrderCancelled,
        OrderQueries,
        PlacedOrder,
        TimedOutOrder,
    },
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

fn supplier_ids(records: &[VisibilityRecord]) -> Vec<&SupplierId> {
    records.iter().map(|r| &r.supplier_id).collect()
}

impl DispatchDatabase for SqliteDatabase {
    fn url(&self) -> &str {
        self.url.as_str()
    }

    async fn insert_order_with_offers(
        &self,
        order: NewOrder,
        eligible: &HashSet<SupplierId>,
    ) -> Result<PlacedOrder, DispatchError> {
        let mut tx = self.pool.begin().await?;
        let vendor_id = order.vendor_id.clone();
        let created = orders::insert_order(order, &mut tx).await?;
        let order_id = created.id;
        let event = NewOrderEvent::new(order_id, EventKind::OrderCreated).with_actor(&vendor_id).with_payload(json!({
            "items": created.items,
            "delivery_location": created.delivery_location,
            "partial_allowed": created.partial_allowed,
        }));
        order_events::log_event(event, &mut tx).await?;

        let mut offered_to = eligible.iter().cloned().collect::<Vec<SupplierId>>();
        offered_to.sort();
        let order = if offered_to.is_empty() {
            let order =
                orders::update_status_if(&order_id, &[OrderStatusType::Created], OrderStatusType::DeclinedAll, &mut tx)
                    .await?
                    .ok_or(DispatchError::OrderNotFound(order_id))?;
            let event = NewOrderEvent::new(order_id, EventKind::OrderDeclinedAll)
                .with_payload(json!({ "reason": "no eligible suppliers" }));
            order_events::log_event(event, &mut tx).await?;
            info!("🗃️ Order {order_id} has no eligible suppliers and was declined");
            order
        } else {
            visibility::insert_offers(&order_id, &offered_to, &mut tx).await?;
            let order =
                orders::update_status_if(&order_id, &[OrderStatusType::Created], OrderStatusType::Offered, &mut tx)
                    .await?
                    .ok_or(DispatchError::OrderNotFound(order_id))?;
            let event =
                NewOrderEvent::new(order_id, EventKind::OrderOffered).with_payload(json!({ "suppliers": offered_to }));
            order_events::log_event(event, &mut tx).await?;
            info!("🗃️ Order {order_id} offered to {} suppliers", offered_to.len());
            order
        };
        tx.commit().await?;
        Ok(PlacedOrder { order, offered_to })
    }

    async fn accept_order(&self, order_id: &OrderId, supplier_id: &SupplierId) -> Result<OrderAccepted, DispatchError> {
        let mut tx = self.pool.begin().await?;
        let Some(order) = orders::claim_order(order_id, supplier_id, &mut tx).await? else {
            let err = explain_failed_claim(order_id, supplier_id, &mut tx).await?;
            debug!("🗃️ Claim of {order_id} by {supplier_id} rejected. {err}");
            return Err(err);
        };
        let offer = match visibility::transition(order_id, supplier_id, VisibilityStatus::Accepted, &mut tx).await? {
            OfferTransition::Moved(record) => record,
            OfferTransition::Stale(status) => {
                debug!("🗃️ {supplier_id} already responded to {order_id} ({status}). Rolling back the claim");
                return Err(DispatchError::OfferConflict {
                    order_id: *order_id,
                    supplier_id: supplier_id.clone(),
                    status,
                });
            },
            OfferTransition::NotOffered => {
                debug!("🗃️ {supplier_id} was never offered {order_id}. Rolling back the claim");
                return Err(DispatchError::OfferNotFound { order_id: *order_id, supplier_id: supplier_id.clone() });
            },
        };
        let expired = visibility::expire_open_offers(order_id, &mut tx).await?;
        let event = NewOrderEvent::new(*order_id, EventKind::OrderAccepted)
            .with_actor(supplier_id)
            .with_payload(json!({ "accepted_by": supplier_id, "expired": supplier_ids(&expired) }));
        order_events::log_event(event, &mut tx).await?;
        tx.commit().await?;
        info!("🗃️ Order {order_id} accepted by {supplier_id}. {} sibling offers expired", expired.len());
        Ok(OrderAccepted { order, offer, expired })
    }

    async fn decline_order(
        &self,
        order_id: &OrderId,
        supplier_id: &SupplierId,
    ) -> Result<OfferDeclined, DispatchError> {
        let mut tx = self.pool.begin().await?;
        let offer = match visibility::transition(order_id, supplier_id, VisibilityStatus::Declined, &mut tx).await? {
            OfferTransition::Moved(record) => record,
            OfferTransition::Stale(status) => {
                return Err(DispatchError::OfferConflict {
                    order_id: *order_id,
                    supplier_id: supplier_id.clone(),
                    status,
                });
            },
            OfferTransition::NotOffered => {
                return match orders::fetch_order_status(order_id, &mut tx).await? {
                    None => Err(DispatchError::OrderNotFound(*order_id)),
                    Some((status, _)) if status.is_terminal() => {
                        Err(DispatchError::OrderConflict { order_id: *order_id, status })
                    },
                    Some(_) => Err(DispatchError::OfferNotFound { order_id: *order_id, supplier_id: supplier_id.clone() }),
                };
            },
        };
        let event = NewOrderEvent::new(*order_id, EventKind::OfferDeclined).with_actor(supplier_id);
        order_events::log_event(event, &mut tx).await?;

        let live = visibility::count_live_offers(order_id, &mut tx).await?;
        let exhausted = if live == 0 {
            orders::update_status_if(order_id, &[OrderStatusType::Offered], OrderStatusType::DeclinedAll, &mut tx)
                .await?
        } else {
            None
        };
        let order = match exhausted {
            Some(order) => {
                let event = NewOrderEvent::new(*order_id, EventKind::OrderDeclinedAll)
                    .with_payload(json!({ "reason": "every offer was declined" }));
                order_events::log_event(event, &mut tx).await?;
                info!("🗃️ Every supplier declined order {order_id}");
                order
            },
            None => orders::fetch_order(order_id, &mut tx).await?.ok_or(DispatchError::OrderNotFound(*order_id))?,
        };
        tx.commit().await?;
        debug!("🗃️ {supplier_id} declined order {order_id}. {live} live offers remain");
        Ok(OfferDeclined { offer, order })
    }

    async fn cancel_order(&self, order_id: &OrderId, vendor_id: &VendorId) -> Result<OrderCancelled, DispatchError> {
        let mut tx = self.pool.begin().await?;
        let Some(order) = orders::cancel_order(order_id, vendor_id, &mut tx).await? else {
            let err = match orders::fetch_order_status(order_id, &mut tx).await? {
                None => DispatchError::OrderNotFound(*order_id),
                Some((_, owner)) if owner != *vendor_id => {
                    warn!("🗃️ Vendor {vendor_id} tried to cancel order {order_id}, which belongs to {owner}");
                    DispatchError::Unauthorized { order_id: *order_id, vendor_id: vendor_id.clone() }
                },
                Some((status, _)) => DispatchError::OrderConflict { order_id: *order_id, status },
            };
            return Err(err);
        };
        let expired = visibility::expire_open_offers(order_id, &mut tx).await?;
        let event = NewOrderEvent::new(*order_id, EventKind::OrderCancelled)
            .with_actor(vendor_id)
            .with_payload(json!({ "accepted_by": order.accepted_by, "expired": supplier_ids(&expired) }));
        order_events::log_event(event, &mut tx).await?;
        tx.commit().await?;
        info!("🗃️ Order {order_id} cancelled by {vendor_id}");
        Ok(OrderCancelled { order, expired })
    }

    async fn complete_order(&self, order_id: &OrderId) -> Result<Order, DispatchError> {
        let mut tx = self.pool.begin().await?;
        let Some(order) =
            orders::update_status_if(order_id, &[OrderStatusType::Accepted], OrderStatusType::Completed, &mut tx)
                .await?
        else {
            let err = match orders::fetch_order_status(order_id, &mut tx).await? {
                None => DispatchError::OrderNotFound(*order_id),
                Some((status, _)) => DispatchError::OrderConflict { order_id: *order_id, status },
            };
            return Err(err);
        };
        let mut event = NewOrderEvent::new(*order_id, EventKind::OrderCompleted);
        if let Some(supplier) = &order.accepted_by {
            event = event.with_actor(supplier);
        }
        order_events::log_event(event, &mut tx).await?;
        tx.commit().await?;
        info!("🗃️ Order {order_id} completed");
        Ok(order)
    }

    async fn expire_stale_offers(&self, ttl: Duration) -> Result<OfferExpiryResult, DispatchError> {
        let mut tx = self.pool.begin().await?;
        let stale = orders::decline_stale_orders(ttl, &mut tx).await?;
        let mut result = OfferExpiryResult::default();
        for order in stale {
            let expired = visibility::expire_open_offers(&order.id, &mut tx).await?;
            let event = NewOrderEvent::new(order.id, EventKind::OffersTimedOut)
                .with_payload(json!({ "ttl_secs": ttl.num_seconds(), "expired": supplier_ids(&expired) }));
            order_events::log_event(event, &mut tx).await?;
            result.orders.push(TimedOutOrder { order, expired });
        }
        tx.commit().await?;
        if !result.is_empty() {
            info!("🗃️ {} orders timed out waiting for a supplier", result.count());
        }
        Ok(result)
    }

    async fn remove_order(&self, order_id: &OrderId) -> Result<Order, DispatchError> {
        let mut tx = self.pool.begin().await?;
        let order = orders::delete_order(order_id, &mut tx).await?.ok_or(DispatchError::OrderNotFound(*order_id))?;
        tx.commit().await?;
        warn!("🗃️ Order {order_id} has been removed. Its event history is retained");
        Ok(order)
    }

    async fn close(&mut self) -> Result<(), DispatchError> {
        self.pool.close().await;
        Ok(())
    }
}

/// Works out why the claim compare-and-swap matched nothing. A finished order is always a conflict. Otherwise a
/// supplier that was never offered the order is told so, even when the order has already been taken.
async fn explain_failed_claim(
    order_id: &OrderId,
    supplier_id: &SupplierId,
    conn: &mut SqliteConnection,
) -> Result<DispatchError, sqlx::Error> {
    let Some((status, _)) = orders::fetch_order_status(order_id, conn).await? else {
        return Ok(DispatchError::OrderNotFound(*order_id));
    };
    if status.is_terminal() {
        return Ok(DispatchError::OrderConflict { order_id: *order_id, status });
    }
    let err = match visibility::fetch_offer(order_id, supplier_id, conn).await? {
        None => DispatchError::OfferNotFound { order_id: *order_id, supplier_id: supplier_id.clone() },
        Some(_) => DispatchError::OrderConflict { order_id: *order_id, status },
    };
    Ok(err)
}

impl OrderQueries for SqliteDatabase {
    async fn fetch_order(&self, order_id: &OrderId) -> Result<Option<Order>, DispatchError> {
        let mut conn = self.pool.acquire().await?;
        let order = orders::fetch_order(order_id, &mut conn).await?;
        Ok(order)
    }

    async fn fetch_orders_for_vendor(&self, vendor_id: &VendorId) -> Result<Vec<Order>, DispatchError> {
        let mut conn = self.pool.acquire().await?;
        let orders = orders::fetch_orders_for_vendor(vendor_id, &mut conn).await?;
        Ok(orders)
    }

    async fn fetch_active_orders_for_supplier(&self, supplier_id: &SupplierId) -> Result<Vec<Order>, DispatchError> {
        let mut conn = self.pool.acquire().await?;
        let orders = orders::fetch_active_orders_for_supplier(supplier_id, &mut conn).await?;
        Ok(orders)
    }

    async fn fetch_visibility_for_order(&self, order_id: &OrderId) -> Result<Vec<VisibilityRecord>, DispatchError> {
        let mut conn = self.pool.acquire().await?;
        let records = visibility::fetch_offers_for_order(order_id, &mut conn).await?;
        Ok(records)
    }

    async fn fetch_events_for_order(&self, order_id: &OrderId) -> Result<Vec<OrderEvent>, DispatchError> {
        let mut conn = self.pool.acquire().await?;
        let events = order_events::fetch_events_for_order(order_id, &mut conn).await?;
        Ok(events)
    }
}

impl InventoryCatalog for SqliteDatabase {
    async fn fetch_supplier_profiles(&self) -> Result<Vec<SupplierProfile>, DispatchError> {
        let mut conn = self.pool.acquire().await?;
        let profiles = catalog::fetch_supplier_profiles(&mut conn).await?;
        trace!("🗃️ Loaded {} supplier profiles", profiles.len());
        Ok(profiles)
    }
}

impl SqliteDatabase {
    /// Creates a new database API object, using `DISPATCH_DATABASE_URL` or the default database location.
    pub async fn new(max_connections: u32) -> Result<Self, DispatchError> {
        let url = db_url();
        SqliteDatabase::new_with_url(url.as_str(), max_connections).await
    }

    /// Connects to an existing database at `url`.
    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, DispatchError> {
        Self::connect(url, max_connections, false).await
    }

    /// Connects to the database at `url`, optionally creating the file if it does not exist yet.
    pub async fn connect(url: &str, max_connections: u32, create_if_missing: bool) -> Result<Self, DispatchError> {
        trace!("Creating new database connection pool with url {url}");
        let pool = new_pool(url, max_connections, create_if_missing).await?;
        let url = url.to_string();
        Ok(Self { url, pool })
    }

    /// Connects using the engine configuration and brings the schema up to date.
    pub async fn from_config(config: &EngineConfig) -> Result<Self, DispatchError> {
        let db = Self::connect(&config.database_url, config.max_db_connections, config.create_database).await?;
        db.run_migrations().await?;
        Ok(db)
    }

    /// Returns a reference to the database connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Brings the schema up to date.
    pub async fn run_migrations(&self) -> Result<(), DispatchError> {
        sqlx::migrate!("./src/sqlite/migrations")
            .run(&self.pool)
            .await
            .map_err(|e| DispatchError::DatabaseError(format!("Migration failed. {e}")))?;
        debug!("🗃️ Migrations complete");
        Ok(())
    }

    /// Registers the supplier, or replaces everything known about it, in a single transaction.
    pub async fn upsert_supplier_profile(&self, profile: &SupplierProfile) -> Result<(), DispatchError> {
        let mut tx = self.pool.begin().await?;
        catalog::upsert_supplier_profile(profile, &mut tx).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Updates the stock level of a single item for a registered supplier.
    pub async fn set_inventory(&self, record: &InventoryRecord) -> Result<(), DispatchError> {
        let mut conn = self.pool.acquire().await?;
        catalog::set_inventory(record, &mut conn).await?;
        Ok(())
    }

    /// Events whose order has been removed.
    pub async fn fetch_orphaned_events(&self) -> Result<Vec<OrderEvent>, DispatchError> {
        let mut conn = self.pool.acquire().await?;
        let events = order_events::fetch_orphaned_events(&mut conn).await?;
        Ok(events)
    }
}

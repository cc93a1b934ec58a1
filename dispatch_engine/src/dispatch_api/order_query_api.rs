use std::fmt::Debug;

use crate::{
    db_types::{Order, OrderEvent, OrderId, SupplierId, VendorId, VisibilityRecord},
    traits::{DispatchError, OrderQueries},
};

/// Read-only access to orders, offers and the audit trail.
pub struct OrderQueryApi<B> {
    db: B,
}

impl<B> Debug for OrderQueryApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OrderQueryApi")
    }
}

impl<B> OrderQueryApi<B>
where B: OrderQueries
{
    pub fn new(db: B) -> Self {
        Self { db }
    }

    pub async fn order_by_id(&self, order_id: &OrderId) -> Result<Order, DispatchError> {
        self.db.fetch_order(order_id).await?.ok_or(DispatchError::OrderNotFound(*order_id))
    }

    /// Every order the vendor has placed, newest first, with its status and the accepting supplier, if any.
    pub async fn orders_for_vendor(&self, vendor_id: &VendorId) -> Result<Vec<Order>, DispatchError> {
        self.db.fetch_orders_for_vendor(vendor_id).await
    }

    /// Orders the supplier has been offered and not yet responded to.
    pub async fn active_orders_for_supplier(&self, supplier_id: &SupplierId) -> Result<Vec<Order>, DispatchError> {
        self.db.fetch_active_orders_for_supplier(supplier_id).await
    }

    pub async fn offers_for_order(&self, order_id: &OrderId) -> Result<Vec<VisibilityRecord>, DispatchError> {
        self.db.fetch_visibility_for_order(order_id).await
    }

    pub async fn events_for_order(&self, order_id: &OrderId) -> Result<Vec<OrderEvent>, DispatchError> {
        self.db.fetch_events_for_order(order_id).await
    }
}

use crate::{
    db_types::{Order, OrderEvent, OrderId, SupplierId, VendorId, VisibilityRecord},
    traits::DispatchError,
};

/// Read access to orders, their offers and their audit trail. Returned orders always have their line items populated.
#[allow(async_fn_in_trait)]
pub trait OrderQueries {
    async fn fetch_order(&self, order_id: &OrderId) -> Result<Option<Order>, DispatchError>;

    /// All orders placed by the vendor, most recent first.
    async fn fetch_orders_for_vendor(&self, vendor_id: &VendorId) -> Result<Vec<Order>, DispatchError>;

    /// Orders on which the supplier currently holds an `Offered` visibility record.
    async fn fetch_active_orders_for_supplier(&self, supplier_id: &SupplierId) -> Result<Vec<Order>, DispatchError>;

    async fn fetch_visibility_for_order(&self, order_id: &OrderId) -> Result<Vec<VisibilityRecord>, DispatchError>;

    /// The order's lifecycle events, in the order they were written.
    async fn fetch_events_for_order(&self, order_id: &OrderId) -> Result<Vec<OrderEvent>, DispatchError>;
}

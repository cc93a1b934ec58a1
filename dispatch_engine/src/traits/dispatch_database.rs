use std::collections::HashSet;

use chrono::Duration;
use thiserror::Error;

use crate::{
    db_types::{NewOrder, Order, OrderId, OrderStatusType, SupplierId, VendorId, VisibilityStatus},
    traits::{
        data_objects::{OfferDeclined, OfferExpiryResult, OrderAccepted, OrderCancelled, PlacedOrder},
        OrderQueries,
    },
};

/// This trait defines the lifecycle writes for backends supporting the dispatch engine.
///
/// Every method runs as one transaction whose first statement is the guarded (compare-and-swap) write on the order or
/// the visibility record. Competing transitions on the same order are therefore totally ordered by the store, and a
/// failed guard leaves every record untouched.
#[allow(async_fn_in_trait)]
pub trait DispatchDatabase: Clone + OrderQueries {
    /// The URL of the database
    fn url(&self) -> &str;

    /// Stores a validated order, its line items and one `Offered` visibility record for each supplier in `eligible`,
    /// in a single atomic transaction.
    ///
    /// The order is written as `Created` and immediately moved on: to `Offered` if `eligible` is non-empty, or to
    /// `DeclinedAll` (with no visibility records) if it is empty. An event is logged for each step.
    async fn insert_order_with_offers(
        &self,
        order: NewOrder,
        eligible: &HashSet<SupplierId>,
    ) -> Result<PlacedOrder, DispatchError>;

    /// Claims the order for `supplier_id`.
    ///
    /// The order must be `Offered` and the supplier's visibility record must be `Offered`. On success, the order moves
    /// to `Accepted` with `accepted_by` set, the caller's record becomes `Accepted` and every other `Offered` record
    /// becomes `Expired`, all in the same transaction.
    ///
    /// ## Failure modes:
    /// - [`DispatchError::OrderNotFound`] if the order does not exist.
    /// - [`DispatchError::OfferNotFound`] if the supplier was never offered the order.
    /// - [`DispatchError::OrderConflict`] / [`DispatchError::OfferConflict`] if the order or offer has already moved on.
    async fn accept_order(&self, order_id: &OrderId, supplier_id: &SupplierId) -> Result<OrderAccepted, DispatchError>;

    /// Declines the offer on behalf of `supplier_id`. If this was the last open offer and nobody has accepted, the
    /// order moves to `DeclinedAll`.
    async fn decline_order(&self, order_id: &OrderId, supplier_id: &SupplierId)
        -> Result<OfferDeclined, DispatchError>;

    /// Cancels the order on behalf of its owning vendor. Only `Created`, `Offered` and `Accepted` orders may be
    /// cancelled. Every still-open offer is expired.
    async fn cancel_order(&self, order_id: &OrderId, vendor_id: &VendorId) -> Result<OrderCancelled, DispatchError>;

    /// Moves an `Accepted` order to `Completed`.
    async fn complete_order(&self, order_id: &OrderId) -> Result<Order, DispatchError>;

    /// Retires every order that has sat in `Offered` for at least `ttl`. The orders move to `DeclinedAll` and their
    /// open offers to `Expired`.
    async fn expire_stale_offers(&self, ttl: Duration) -> Result<OfferExpiryResult, DispatchError>;

    /// Removes an order, its line items and visibility records. Events referring to the order are kept, with their
    /// order reference cleared.
    async fn remove_order(&self, order_id: &OrderId) -> Result<Order, DispatchError>;

    /// Closes the database connection.
    async fn close(&mut self) -> Result<(), DispatchError> {
        Ok(())
    }
}

/// Coarse classification of a [`DispatchError`], for callers that map errors onto a transport (e.g. HTTP status codes).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Conflict,
    Unauthorized,
    Internal,
}

#[derive(Debug, Clone, Error)]
pub enum DispatchError {
    #[error("We have an internal database engine (configuration/uptime etc.) : {0}")]
    DatabaseError(String),
    #[error("Invalid order. {0}")]
    ValidationError(String),
    #[error("The requested order {0} does not exist")]
    OrderNotFound(OrderId),
    #[error("Order {order_id} was never offered to supplier {supplier_id}")]
    OfferNotFound { order_id: OrderId, supplier_id: SupplierId },
    #[error("Order {order_id} is {status}, so the requested change is not possible")]
    OrderConflict { order_id: OrderId, status: OrderStatusType },
    #[error("The offer of order {order_id} to supplier {supplier_id} is already {status}")]
    OfferConflict { order_id: OrderId, supplier_id: SupplierId, status: VisibilityStatus },
    #[error("Vendor {vendor_id} does not own order {order_id}")]
    Unauthorized { order_id: OrderId, vendor_id: VendorId },
}

impl DispatchError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::DatabaseError(_) => ErrorKind::Internal,
            Self::ValidationError(_) => ErrorKind::Validation,
            Self::OrderNotFound(_) | Self::OfferNotFound { .. } => ErrorKind::NotFound,
            Self::OrderConflict { .. } | Self::OfferConflict { .. } => ErrorKind::Conflict,
            Self::Unauthorized { .. } => ErrorKind::Unauthorized,
        }
    }

    pub fn is_conflict(&self) -> bool {
        self.kind() == ErrorKind::Conflict
    }
}

impl From<sqlx::Error> for DispatchError {
    fn from(e: sqlx::Error) -> Self {
        DispatchError::DatabaseError(e.to_string())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn error_kinds() {
        let oid = OrderId(1);
        assert_eq!(DispatchError::ValidationError("x".into()).kind(), ErrorKind::Validation);
        assert_eq!(DispatchError::OrderNotFound(oid).kind(), ErrorKind::NotFound);
        let e = DispatchError::OfferNotFound { order_id: oid, supplier_id: "s2".into() };
        assert_eq!(e.kind(), ErrorKind::NotFound);
        let e = DispatchError::OrderConflict { order_id: oid, status: OrderStatusType::Accepted };
        assert!(e.is_conflict());
        assert_eq!(e.to_string(), "Order #1 is Accepted, so the requested change is not possible");
        let e = DispatchError::Unauthorized { order_id: oid, vendor_id: "v2".into() };
        assert_eq!(e.kind(), ErrorKind::Unauthorized);
        assert_eq!(DispatchError::from(sqlx::Error::PoolClosed).kind(), ErrorKind::Internal);
    }
}

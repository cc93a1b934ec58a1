use serde::{Deserialize, Serialize};

use crate::db_types::{Order, OrderStatusType, SupplierId, VisibilityRecord};

/// The result of a successful order submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlacedOrder {
    pub order: Order,
    /// The suppliers the order was offered to, sorted. Empty if the order went straight to `DeclinedAll`.
    pub offered_to: Vec<SupplierId>,
}

impl PlacedOrder {
    pub fn offer_count(&self) -> usize {
        self.offered_to.len()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderAccepted {
    pub order: Order,
    /// The winning supplier's visibility record
    pub offer: VisibilityRecord,
    /// Sibling offers that were expired by this acceptance
    pub expired: Vec<VisibilityRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OfferDeclined {
    pub offer: VisibilityRecord,
    /// The order after the decline. Its status is `DeclinedAll` if this was the last open offer.
    pub order: Order,
}

impl OfferDeclined {
    pub fn exhausted(&self) -> bool {
        self.order.status == OrderStatusType::DeclinedAll
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderCancelled {
    pub order: Order,
    /// Open offers that were expired by the cancellation
    pub expired: Vec<VisibilityRecord>,
}

/// A single order retired by the offer TTL, along with the offers that were expired.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimedOutOrder {
    pub order: Order,
    pub expired: Vec<VisibilityRecord>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OfferExpiryResult {
    pub orders: Vec<TimedOutOrder>,
}

impl OfferExpiryResult {
    pub fn count(&self) -> usize {
        self.orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }
}

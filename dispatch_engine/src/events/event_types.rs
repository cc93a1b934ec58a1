use std::fmt::Display;

use serde::{Deserialize, Serialize};

use crate::db_types::OrderId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NotificationKind {
    /// A supplier has been offered a new order
    OrderOffered,
    /// The supplier's open offer has been withdrawn, because another supplier accepted, the vendor cancelled, or the
    /// offer timed out
    OfferExpired,
    /// The vendor's order was accepted by a supplier
    OrderAccepted,
    /// No supplier was eligible, or every offered supplier declined
    OrderDeclinedAll,
    /// The supplier's accepted order was cancelled by the vendor
    OrderCancelled,
    OrderCompleted,
    /// Nobody answered the vendor's order before the offer TTL ran out
    OrderTimedOut,
}

impl Display for NotificationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::OrderOffered => "OrderOffered",
            Self::OfferExpired => "OfferExpired",
            Self::OrderAccepted => "OrderAccepted",
            Self::OrderDeclinedAll => "OrderDeclinedAll",
            Self::OrderCancelled => "OrderCancelled",
            Self::OrderCompleted => "OrderCompleted",
            Self::OrderTimedOut => "OrderTimedOut",
        };
        f.write_str(s)
    }
}

/// A request to tell a vendor or supplier about something that happened to one of their orders. Delivery is the
/// transport's business; the engine only publishes these.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub recipient_id: String,
    pub kind: NotificationKind,
    pub order_id: OrderId,
    pub message: String,
}

impl Notification {
    pub fn new<R: Display, S: Into<String>>(recipient: R, kind: NotificationKind, order_id: OrderId, message: S) -> Self {
        Self { recipient_id: recipient.to_string(), kind, order_id, message: message.into() }
    }
}

use std::fmt::Debug;

use chrono::Duration;
use log::*;

use crate::{
    db_types::{NewOrder, Order, OrderId, SupplierId, VendorId, VisibilityRecord},
    dispatch_api::order_objects::NewOrderRequest,
    events::{EventProducers, Notification, NotificationKind},
    matcher::EligibilityMatcher,
    traits::{
        DispatchDatabase,
        DispatchError,
        InventoryCatalog,
        OfferDeclined,
        OfferExpiryResult,
        OrderAccepted,
        OrderCancelled,
        PlacedOrder,
    },
};

/// `DispatchFlowApi` is the coordinator for every order lifecycle flow: order submission, supplier claims and
/// declines, vendor cancellation, completion and offer expiry.
///
/// Each flow runs one guarded backend transition. Only once that has committed are notifications handed to the
/// registered hooks, so a failing notification transport can never undo a transition. Publishing waits for room in
/// the notification channel, so a flow call returns late (but with its transition committed) if the handlers fall
/// behind or were never started.
pub struct DispatchFlowApi<B> {
    db: B,
    matcher: EligibilityMatcher,
    producers: EventProducers,
}

impl<B> Debug for DispatchFlowApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "DispatchFlowApi")
    }
}

impl<B> DispatchFlowApi<B> {
    pub fn new(db: B, producers: EventProducers) -> Self {
        Self { db, matcher: EligibilityMatcher::default(), producers }
    }

    /// Replaces the default (substring) eligibility matcher.
    pub fn with_matcher(mut self, matcher: EligibilityMatcher) -> Self {
        self.matcher = matcher;
        self
    }

    pub fn db(&self) -> &B {
        &self.db
    }

    pub fn db_mut(&mut self) -> &mut B {
        &mut self.db
    }

    async fn notify(&self, notifications: Vec<Notification>) {
        if notifications.is_empty() || self.producers.is_empty() {
            return;
        }
        for emitter in &self.producers.notification_producer {
            debug!("🔄️📣️ Publishing {} notifications", notifications.len());
            for n in &notifications {
                emitter.publish_event(n.clone()).await;
            }
        }
    }
}

impl<B> DispatchFlowApi<B>
where B: DispatchDatabase + InventoryCatalog
{
    /// Validates and places a new order for `vendor_id`.
    ///
    /// The order is matched against a fresh snapshot of the supplier catalog and stored, together with an offer for
    /// every eligible supplier, in one transaction. If nobody is eligible the order is stored as `DeclinedAll` and the
    /// vendor is told so.
    pub async fn submit_order(
        &self,
        vendor_id: &VendorId,
        request: NewOrderRequest,
    ) -> Result<PlacedOrder, DispatchError> {
        let order = request.validate(vendor_id)?;
        self.place_order(order).await
    }

    async fn place_order(&self, order: NewOrder) -> Result<PlacedOrder, DispatchError> {
        let suppliers = self.db.fetch_supplier_profiles().await?;
        let eligible = self.matcher.eligible_suppliers(&order, &suppliers);
        trace!("🔄️📦️ {} of {} suppliers are eligible for the new order", eligible.len(), suppliers.len());
        let placed = self.db.insert_order_with_offers(order, &eligible).await?;
        let order = &placed.order;
        let notifications = if placed.offered_to.is_empty() {
            vec![Notification::new(
                &order.vendor_id,
                NotificationKind::OrderDeclinedAll,
                order.id,
                format!("No supplier can currently fulfil order {}", order.id),
            )]
        } else {
            placed
                .offered_to
                .iter()
                .map(|s| {
                    Notification::new(
                        s,
                        NotificationKind::OrderOffered,
                        order.id,
                        format!("New order {} for delivery to {}", order.id, order.delivery_location),
                    )
                })
                .collect()
        };
        self.notify(notifications).await;
        debug!(
            "🔄️📦️ Order {} ({}) placed for {}. {} offers made",
            order.id,
            order.total_units(),
            order.vendor_id,
            placed.offer_count()
        );
        Ok(placed)
    }

    /// A supplier claims the order. Exactly one of any number of concurrent claims succeeds; the rest fail with a
    /// conflict.
    pub async fn accept_order(
        &self,
        order_id: &OrderId,
        supplier_id: &SupplierId,
    ) -> Result<OrderAccepted, DispatchError> {
        let accepted = self.db.accept_order(order_id, supplier_id).await?;
        let order = &accepted.order;
        let mut notifications = vec![Notification::new(
            &order.vendor_id,
            NotificationKind::OrderAccepted,
            order.id,
            format!("Order {} was accepted by {supplier_id}", order.id),
        )];
        notifications.extend(expiry_notices(order, &accepted.expired, "was accepted by another supplier"));
        self.notify(notifications).await;
        Ok(accepted)
    }

    /// A supplier declines its offer. The vendor hears about it only if this leaves the order with no takers.
    pub async fn decline_order(
        &self,
        order_id: &OrderId,
        supplier_id: &SupplierId,
    ) -> Result<OfferDeclined, DispatchError> {
        let declined = self.db.decline_order(order_id, supplier_id).await?;
        if declined.exhausted() {
            let order = &declined.order;
            let n = Notification::new(
                &order.vendor_id,
                NotificationKind::OrderDeclinedAll,
                order.id,
                format!("Every supplier declined order {}", order.id),
            );
            self.notify(vec![n]).await;
        }
        Ok(declined)
    }

    /// The owning vendor withdraws the order. Suppliers with an open offer, and the accepting supplier if there is
    /// one, are told.
    pub async fn cancel_order(&self, order_id: &OrderId, vendor_id: &VendorId) -> Result<OrderCancelled, DispatchError> {
        let cancelled = self.db.cancel_order(order_id, vendor_id).await?;
        let order = &cancelled.order;
        let mut notifications = expiry_notices(order, &cancelled.expired, "was cancelled by the vendor");
        if let Some(supplier) = &order.accepted_by {
            notifications.push(Notification::new(
                supplier,
                NotificationKind::OrderCancelled,
                order.id,
                format!("Order {} was cancelled by the vendor", order.id),
            ));
        }
        self.notify(notifications).await;
        Ok(cancelled)
    }

    pub async fn complete_order(&self, order_id: &OrderId) -> Result<Order, DispatchError> {
        let order = self.db.complete_order(order_id).await?;
        let n = Notification::new(
            &order.vendor_id,
            NotificationKind::OrderCompleted,
            order.id,
            format!("Order {} has been fulfilled", order.id),
        );
        self.notify(vec![n]).await;
        Ok(order)
    }

    /// Retires every order that has been waiting on suppliers for at least `ttl`.
    pub async fn expire_stale_offers(&self, ttl: Duration) -> Result<OfferExpiryResult, DispatchError> {
        let result = self.db.expire_stale_offers(ttl).await?;
        let mut notifications = vec![];
        for timed_out in &result.orders {
            let order = &timed_out.order;
            notifications.push(Notification::new(
                &order.vendor_id,
                NotificationKind::OrderTimedOut,
                order.id,
                format!("No supplier accepted order {} in time", order.id),
            ));
            notifications.extend(expiry_notices(order, &timed_out.expired, "timed out"));
        }
        self.notify(notifications).await;
        Ok(result)
    }

    /// Administrative removal of an order. Its event history is kept.
    pub async fn remove_order(&self, order_id: &OrderId) -> Result<Order, DispatchError> {
        self.db.remove_order(order_id).await
    }
}

fn expiry_notices(order: &Order, expired: &[VisibilityRecord], reason: &str) -> Vec<Notification> {
    expired
        .iter()
        .map(|r| {
            Notification::new(
                &r.supplier_id,
                NotificationKind::OfferExpired,
                order.id,
                format!("Your offer for order {} is no longer open. The order {reason}", order.id),
            )
        })
        .collect()
}

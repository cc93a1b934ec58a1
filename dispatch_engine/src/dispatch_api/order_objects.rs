//! Request and response objects exchanged with the (external) transport layer.
use serde::{Deserialize, Serialize};

use crate::{
    db_types::{LineItem, NewOrder, Order, Sku, VendorId},
    traits::{DispatchError, PlacedOrder},
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItemRequest {
    pub sku: String,
    pub quantity: i64,
}

/// An order as submitted by a vendor. The vendor id is not part of the body; it is resolved by the caller's
/// authentication layer and passed to [`NewOrderRequest::validate`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewOrderRequest {
    pub items: Vec<LineItemRequest>,
    #[serde(default)]
    pub delivery_location: Option<String>,
    #[serde(default)]
    pub partial_allowed: bool,
}

impl NewOrderRequest {
    pub fn new<S: Into<String>>(delivery_location: S, partial_allowed: bool) -> Self {
        Self { items: vec![], delivery_location: Some(delivery_location.into()), partial_allowed }
    }

    pub fn with_item<S: Into<String>>(mut self, sku: S, quantity: i64) -> Self {
        self.items.push(LineItemRequest { sku: sku.into(), quantity });
        self
    }

    /// Checks the request and converts it into a [`NewOrder`] owned by `vendor_id`. Nothing is written anywhere if
    /// this fails.
    pub fn validate(self, vendor_id: &VendorId) -> Result<NewOrder, DispatchError> {
        if vendor_id.is_blank() {
            return Err(DispatchError::ValidationError("A vendor id is required".into()));
        }
        let delivery_location = self.delivery_location.map(|s| s.trim().to_string()).unwrap_or_default();
        if delivery_location.is_empty() {
            return Err(DispatchError::ValidationError("A delivery location is required".into()));
        }
        if self.items.is_empty() {
            return Err(DispatchError::ValidationError("An order must contain at least one line item".into()));
        }
        let items = self
            .items
            .into_iter()
            .enumerate()
            .map(|(i, item)| {
                let sku = Sku::from(item.sku.trim());
                if sku.is_blank() {
                    return Err(DispatchError::ValidationError(format!("Line item {} has no SKU", i + 1)));
                }
                if item.quantity <= 0 {
                    return Err(DispatchError::ValidationError(format!(
                        "Line item {} ({sku}) must have a positive quantity, not {}",
                        i + 1,
                        item.quantity
                    )));
                }
                Ok(LineItem::new(sku, item.quantity))
            })
            .collect::<Result<Vec<LineItem>, DispatchError>>()?;
        Ok(NewOrder { vendor_id: vendor_id.clone(), items, delivery_location, partial_allowed: self.partial_allowed })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceOrderResponse {
    pub order: Order,
    pub suppliers_offered: usize,
}

impl From<PlacedOrder> for PlaceOrderResponse {
    fn from(placed: PlacedOrder) -> Self {
        let suppliers_offered = placed.offer_count();
        Self { order: placed.order, suppliers_offered }
    }
}

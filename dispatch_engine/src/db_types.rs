use std::{
    collections::{HashMap, HashSet},
    fmt::Display,
    str::FromStr,
};

use chrono::{DateTime, Utc};
use dispatch_common::Quantity;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[error("Invalid value: {0}")]
pub struct ConversionError(String);

//--------------------------------------        OrderId        ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
#[serde(transparent)]
pub struct OrderId(pub i64);

impl From<i64> for OrderId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl FromStr for OrderId {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().trim_start_matches('#');
        s.parse::<i64>().map(Self).map_err(|e| ConversionError(format!("{s} is not a valid order id. {e}")))
    }
}

impl Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl OrderId {
    pub fn value(&self) -> i64 {
        self.0
    }
}

//--------------------------------------   Actor identifiers   ---------------------------------------------------------
macro_rules! string_id {
    ($name:ident) => {
        #[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Type, Serialize, Deserialize)]
        #[sqlx(transparent)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl $name {
            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn is_blank(&self) -> bool {
                self.0.trim().is_empty()
            }
        }
    };
}

string_id!(SupplierId);
string_id!(VendorId);
string_id!(Sku);

//--------------------------------------   OrderStatusType     ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
pub enum OrderStatusType {
    /// The order has just been persisted and has not been offered to anyone yet. Never observable after the
    /// creation transaction commits.
    Created,
    /// The order is visible to at least one eligible supplier and is waiting for a claim.
    Offered,
    /// A supplier has claimed the order.
    Accepted,
    /// Every offered supplier declined, or no supplier was eligible in the first place.
    DeclinedAll,
    /// The vendor withdrew the order.
    Cancelled,
    /// The accepting supplier fulfilled the order.
    Completed,
}

impl OrderStatusType {
    /// Terminal statuses admit no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::DeclinedAll | Self::Cancelled | Self::Completed)
    }

    /// The vendor may only cancel an order that has not run its course.
    pub fn is_cancellable(&self) -> bool {
        matches!(self, Self::Created | Self::Offered | Self::Accepted)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "Created",
            Self::Offered => "Offered",
            Self::Accepted => "Accepted",
            Self::DeclinedAll => "DeclinedAll",
            Self::Cancelled => "Cancelled",
            Self::Completed => "Completed",
        }
    }
}

impl Display for OrderStatusType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatusType {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Created" => Ok(Self::Created),
            "Offered" => Ok(Self::Offered),
            "Accepted" => Ok(Self::Accepted),
            "DeclinedAll" => Ok(Self::DeclinedAll),
            "Cancelled" => Ok(Self::Cancelled),
            "Completed" => Ok(Self::Completed),
            s => Err(ConversionError(format!("Invalid order status: {s}"))),
        }
    }
}

//--------------------------------------   VisibilityStatus    ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
pub enum VisibilityStatus {
    Offered,
    Accepted,
    Declined,
    Expired,
}

impl VisibilityStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Offered => "Offered",
            Self::Accepted => "Accepted",
            Self::Declined => "Declined",
            Self::Expired => "Expired",
        }
    }
}

impl Display for VisibilityStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VisibilityStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Offered" => Ok(Self::Offered),
            "Accepted" => Ok(Self::Accepted),
            "Declined" => Ok(Self::Declined),
            "Expired" => Ok(Self::Expired),
            s => Err(ConversionError(format!("Invalid visibility status: {s}"))),
        }
    }
}

//--------------------------------------      StockStatus      ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
pub enum StockStatus {
    Available,
    /// The supplier can only partially or marginally fulfil orders for this item.
    Low,
    Unavailable,
}

impl Display for StockStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StockStatus::Available => write!(f, "Available"),
            StockStatus::Low => write!(f, "Low"),
            StockStatus::Unavailable => write!(f, "Unavailable"),
        }
    }
}

impl FromStr for StockStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "available" => Ok(Self::Available),
            "low" => Ok(Self::Low),
            "unavailable" => Ok(Self::Unavailable),
            _ => Err(ConversionError(format!("Invalid stock status: {s}"))),
        }
    }
}

//--------------------------------------       LineItem        ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct LineItem {
    pub sku: Sku,
    pub quantity: Quantity,
}

impl LineItem {
    pub fn new<S: Into<Sku>>(sku: S, quantity: i64) -> Self {
        Self { sku: sku.into(), quantity: Quantity::from(quantity) }
    }
}

//--------------------------------------        Order          ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub vendor_id: VendorId,
    pub delivery_location: String,
    pub partial_allowed: bool,
    pub status: OrderStatusType,
    /// The supplier whose claim won the order. Set in the same write that moves the order to `Accepted`.
    pub accepted_by: Option<SupplierId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[sqlx(skip)]
    pub items: Vec<LineItem>,
}

impl Order {
    pub fn total_units(&self) -> Quantity {
        self.items.iter().map(|i| i.quantity).sum()
    }
}

//--------------------------------------       NewOrder        ---------------------------------------------------------
/// A validated order, ready to be matched and persisted. Build one with
/// [`crate::order_objects::NewOrderRequest::validate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrder {
    pub vendor_id: VendorId,
    pub items: Vec<LineItem>,
    pub delivery_location: String,
    pub partial_allowed: bool,
}

//--------------------------------------   VisibilityRecord    ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct VisibilityRecord {
    pub id: i64,
    pub order_id: OrderId,
    pub supplier_id: SupplierId,
    pub status: VisibilityStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

//--------------------------------------     OrderEvent        ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
pub enum EventKind {
    OrderCreated,
    OrderOffered,
    OrderAccepted,
    OfferDeclined,
    OrderDeclinedAll,
    OrderCancelled,
    OrderCompleted,
    OffersTimedOut,
}

impl Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            EventKind::OrderCreated => "OrderCreated",
            EventKind::OrderOffered => "OrderOffered",
            EventKind::OrderAccepted => "OrderAccepted",
            EventKind::OfferDeclined => "OfferDeclined",
            EventKind::OrderDeclinedAll => "OrderDeclinedAll",
            EventKind::OrderCancelled => "OrderCancelled",
            EventKind::OrderCompleted => "OrderCompleted",
            EventKind::OffersTimedOut => "OffersTimedOut",
        };
        f.write_str(s)
    }
}

/// An entry in the append-only lifecycle log. The order reference is nulled if the order is ever removed, but the
/// entry itself is never changed or deleted.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct OrderEvent {
    pub id: i64,
    pub order_id: Option<OrderId>,
    pub actor_id: Option<String>,
    pub kind: EventKind,
    /// JSON document describing the transition
    pub payload: String,
    pub created_at: DateTime<Utc>,
}

impl OrderEvent {
    pub fn payload_json(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::from_str(&self.payload)
    }
}

#[derive(Debug, Clone)]
pub struct NewOrderEvent {
    pub order_id: OrderId,
    pub actor_id: Option<String>,
    pub kind: EventKind,
    pub payload: serde_json::Value,
}

impl NewOrderEvent {
    pub fn new(order_id: OrderId, kind: EventKind) -> Self {
        Self { order_id, actor_id: None, kind, payload: serde_json::Value::Object(Default::default()) }
    }

    pub fn with_actor<S: Display>(mut self, actor: S) -> Self {
        self.actor_id = Some(actor.to_string());
        self
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }
}

//--------------------------------------  Inventory & catalog  ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct InventoryRecord {
    pub supplier_id: SupplierId,
    pub sku: Sku,
    pub status: StockStatus,
    pub quantity: Quantity,
}

/// Everything the matcher needs to know about one supplier: where it delivers, what it stocks, and how much of it is
/// on hand. A snapshot; the engine never writes through it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SupplierProfile {
    pub supplier_id: SupplierId,
    pub service_areas: Vec<String>,
    pub catalog: HashSet<Sku>,
    pub inventory: HashMap<Sku, InventoryRecord>,
}

impl SupplierProfile {
    pub fn new<S: Into<SupplierId>>(supplier_id: S) -> Self {
        Self { supplier_id: supplier_id.into(), ..Default::default() }
    }

    pub fn with_service_area<S: Into<String>>(mut self, area: S) -> Self {
        self.service_areas.push(area.into());
        self
    }

    /// Adds the item to the catalog along with its current inventory record.
    pub fn with_stock<S: Into<Sku>>(mut self, sku: S, status: StockStatus, quantity: i64) -> Self {
        let sku = sku.into();
        self.catalog.insert(sku.clone());
        let record = InventoryRecord {
            supplier_id: self.supplier_id.clone(),
            sku: sku.clone(),
            status,
            quantity: Quantity::from(quantity),
        };
        self.inventory.insert(sku, record);
        self
    }

    /// Lists the item in the catalog without any inventory record.
    pub fn with_catalog_entry<S: Into<Sku>>(mut self, sku: S) -> Self {
        self.catalog.insert(sku.into());
        self
    }

    pub fn stock_status(&self, sku: &Sku) -> Option<StockStatus> {
        self.inventory.get(sku).map(|r| r.status)
    }
}

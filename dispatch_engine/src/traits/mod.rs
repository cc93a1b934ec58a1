//! # Storage backend contracts
//!
//! This module defines the behaviour a storage backend must expose in order to drive the dispatch engine.
//!
//! * [`DispatchDatabase`] owns every lifecycle write: order creation with its offer batch, and the guarded accept,
//!   decline, cancel, complete and expiry transitions. Each method is a single atomic transaction.
//! * [`OrderQueries`] provides read access to orders, visibility records and the event log.
//! * [`InventoryCatalog`] is the read interface onto supplier service areas, catalogs and inventory. The engine only
//!   ever reads through it.
//!
//! All three return [`DispatchError`], which classifies failures via [`DispatchError::kind`].
mod data_objects;
mod dispatch_database;
mod inventory_catalog;
mod order_queries;

pub use data_objects::{OfferDeclined, OfferExpiryResult, OrderAccepted, OrderCancelled, PlacedOrder, TimedOutOrder};
pub use dispatch_database::{DispatchDatabase, DispatchError, ErrorKind};
pub use inventory_catalog::InventoryCatalog;
pub use order_queries::OrderQueries;

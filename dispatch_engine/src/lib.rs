//! Supplier Dispatch Engine
//!
//! The dispatch engine distributes a vendor's order to the suppliers able to fulfil it, and then arbitrates between
//! them so that exactly one supplier wins the order, however many try to claim it at the same moment.
//!
//! The library is divided into these main sections:
//! 1. Matching ([`mod@matcher`]). A pure function from an order and a snapshot of supplier catalogs and inventory to
//!    the set of eligible suppliers.
//! 2. Storage ([`mod@traits`] and [`mod@sqlite`]). The traits describe the guarded lifecycle transitions a backend must
//!    provide; [`SqliteDatabase`] is the SQLite implementation. Every transition is a single transaction whose first
//!    write is a compare-and-swap, so competing claims are serialized by the store.
//! 3. The public API ([`DispatchFlowApi`] and [`OrderQueryApi`]). The flow API validates input, runs the matcher,
//!    drives the transitions and publishes notifications once they have committed.
//!
//! Notifications are delivered through a small hook framework in [`mod@events`], so that any transport can be
//! plugged in without the engine knowing about it.
pub mod config;
pub mod db_types;
mod dispatch_api;
pub mod events;
#[cfg(feature = "sqlite")]
pub mod expiry_worker;
pub mod matcher;
#[cfg(feature = "sqlite")]
pub mod sqlite;
pub mod traits;

#[cfg(any(feature = "test_utils", test))]
pub mod test_utils;

pub use config::{ConfigError, EngineConfig};
pub use dispatch_api::{dispatch_flow_api::DispatchFlowApi, order_objects, order_query_api::OrderQueryApi};
pub use matcher::EligibilityMatcher;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteDatabase;
pub use traits::{DispatchDatabase, DispatchError, ErrorKind, InventoryCatalog, OrderQueries};

use crate::{db_types::SupplierProfile, traits::DispatchError};

/// The read interface onto supplier service areas, catalogs and stock levels.
///
/// The matcher only needs a consistent snapshot at match time, so implementations are free to serve slightly stale
/// data.
#[allow(async_fn_in_trait)]
pub trait InventoryCatalog {
    /// A snapshot of every registered supplier.
    async fn fetch_supplier_profiles(&self) -> Result<Vec<SupplierProfile>, DispatchError>;
}

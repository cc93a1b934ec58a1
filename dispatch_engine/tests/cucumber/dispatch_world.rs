use std::collections::{BTreeMap, HashMap};

use cucumber::World;
use dispatch_engine::{
    db_types::{OrderId, SupplierId, SupplierProfile},
    events::EventProducers,
    test_utils::prepare_env::{prepare_test_env, random_db_path},
    DispatchError,
    DispatchFlowApi,
    OrderQueryApi,
    SqliteDatabase,
};
use log::*;

#[derive(Default, Debug, World)]
pub struct DispatchWorld {
    pub system: Option<DispatchSystem>,
    /// Scenario aliases for the orders placed so far
    pub orders: HashMap<String, OrderId>,
    pub suppliers: BTreeMap<SupplierId, SupplierProfile>,
    pub last_error: Option<DispatchError>,
}

#[derive(Debug)]
pub struct DispatchSystem {
    pub db_path: String,
    pub db: SqliteDatabase,
    pub api: DispatchFlowApi<SqliteDatabase>,
    pub queries: OrderQueryApi<SqliteDatabase>,
}

impl DispatchWorld {
    fn system(&self) -> &DispatchSystem {
        self.system.as_ref().expect("Dispatch system not initialised")
    }

    pub fn api(&self) -> &DispatchFlowApi<SqliteDatabase> {
        &self.system().api
    }

    pub fn queries(&self) -> &OrderQueryApi<SqliteDatabase> {
        &self.system().queries
    }

    pub fn order_id(&self, alias: &str) -> OrderId {
        *self.orders.get(alias).unwrap_or_else(|| panic!("No order called {alias} has been placed"))
    }

    /// Applies `f` to the named supplier's profile and writes the whole profile back to the database.
    pub async fn update_supplier<F: FnOnce(SupplierProfile) -> SupplierProfile>(&mut self, id: &str, f: F) {
        let id = SupplierId::from(id);
        let profile = self.suppliers.remove(&id).unwrap_or_else(|| SupplierProfile::new(id.clone()));
        let profile = f(profile);
        self.system().db.upsert_supplier_profile(&profile).await.expect("Error storing supplier profile");
        self.suppliers.insert(id, profile);
    }

    /// Stores the error of a failed attempt, so that a later step can inspect it.
    pub fn record<T>(&mut self, result: Result<T, DispatchError>) -> Option<T> {
        match result {
            Ok(v) => {
                self.last_error = None;
                Some(v)
            },
            Err(e) => {
                debug!("🥒️ Attempt failed: {e}");
                self.last_error = Some(e);
                None
            },
        }
    }
}

impl DispatchSystem {
    pub async fn new() -> Self {
        let url = random_db_path();
        prepare_test_env(&url).await;
        let db = SqliteDatabase::new_with_url(&url, 5).await.expect("Error creating connection to database");
        debug!("Created database: {url}");
        let api = DispatchFlowApi::new(db.clone(), EventProducers::default());
        let queries = OrderQueryApi::new(db.clone());
        Self { db_path: url, db, api, queries }
    }
}

use std::str::FromStr;

use cucumber::given;
use dispatch_engine::db_types::StockStatus;

use crate::cucumber::{dispatch_world::DispatchSystem, DispatchWorld};

#[given("a fresh install")]
async fn fresh_database(world: &mut DispatchWorld) {
    let system = DispatchSystem::new().await;
    world.system = Some(system);
}

#[given(expr = "supplier {word} serves {string}")]
async fn supplier_serves(world: &mut DispatchWorld, supplier: String, area: String) {
    world.update_supplier(&supplier, |p| p.with_service_area(area)).await;
}

#[given(expr = "supplier {word} has {int} units of {word} in stock with status {word}")]
async fn supplier_stock(world: &mut DispatchWorld, supplier: String, quantity: i64, sku: String, status: String) {
    let status = StockStatus::from_str(&status).expect("Invalid stock status");
    world.update_supplier(&supplier, |p| p.with_stock(sku, status, quantity)).await;
}

#[given(expr = "supplier {word} lists {word} in its catalog")]
async fn supplier_catalog(world: &mut DispatchWorld, supplier: String, sku: String) {
    world.update_supplier(&supplier, |p| p.with_catalog_entry(sku)).await;
}

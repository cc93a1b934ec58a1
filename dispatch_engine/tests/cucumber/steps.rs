use std::str::FromStr;

use chrono::Duration;
use cucumber::{then, when};
use dispatch_engine::{
    db_types::{OrderStatusType, SupplierId, VendorId, VisibilityStatus},
    order_objects::NewOrderRequest,
};

use crate::cucumber::DispatchWorld;

fn id_list(list: &str) -> Vec<String> {
    match list.trim() {
        "nobody" | "" => vec![],
        s => s.split(',').map(|id| id.trim().to_string()).collect(),
    }
}

async fn place_order(
    world: &mut DispatchWorld,
    vendor: String,
    quantity: i64,
    sku: String,
    location: String,
    partial_allowed: bool,
    alias: String,
) {
    let request = NewOrderRequest::new(location, partial_allowed).with_item(sku, quantity);
    let result = world.api().submit_order(&VendorId::from(vendor), request).await;
    if let Some(placed) = world.record(result) {
        world.orders.insert(alias, placed.order.id);
    }
}

#[when(expr = "vendor {word} orders {int} x {word} for delivery to {string} as order {word}")]
async fn order_in_full(world: &mut DispatchWorld, vendor: String, qty: i64, sku: String, loc: String, alias: String) {
    place_order(world, vendor, qty, sku, loc, false, alias).await;
}

#[when(expr = "vendor {word} orders {int} x {word} for delivery to {string} accepting partial fulfilment as order {word}")]
async fn order_partial(world: &mut DispatchWorld, vendor: String, qty: i64, sku: String, loc: String, alias: String) {
    place_order(world, vendor, qty, sku, loc, true, alias).await;
}

#[when(expr = "supplier {word} accepts order {word}")]
async fn accept(world: &mut DispatchWorld, supplier: String, alias: String) {
    let id = world.order_id(&alias);
    let result = world.api().accept_order(&id, &SupplierId::from(supplier)).await;
    world.record(result);
}

#[when(expr = "supplier {word} declines order {word}")]
async fn decline(world: &mut DispatchWorld, supplier: String, alias: String) {
    let id = world.order_id(&alias);
    let result = world.api().decline_order(&id, &SupplierId::from(supplier)).await;
    world.record(result);
}

#[when(expr = "vendor {word} cancels order {word}")]
async fn cancel(world: &mut DispatchWorld, vendor: String, alias: String) {
    let id = world.order_id(&alias);
    let result = world.api().cancel_order(&id, &VendorId::from(vendor)).await;
    world.record(result);
}

#[when(expr = "order {word} is completed")]
async fn complete(world: &mut DispatchWorld, alias: String) {
    let id = world.order_id(&alias);
    let result = world.api().complete_order(&id).await;
    world.record(result);
}

#[when("every open offer times out")]
async fn time_out(world: &mut DispatchWorld) {
    let result = world.api().expire_stale_offers(Duration::zero()).await;
    world.record(result);
}

#[then("the attempt succeeds")]
async fn attempt_succeeds(world: &mut DispatchWorld) {
    if let Some(e) = world.last_error.take() {
        panic!("Expected success, but got: {e}");
    }
}

#[then(expr = "the attempt fails with a {word} error")]
async fn attempt_fails(world: &mut DispatchWorld, kind: String) {
    let err = world.last_error.take().expect("Expected the last attempt to fail");
    assert_eq!(format!("{:?}", err.kind()), kind, "Unexpected error: {err}");
}

#[then(expr = "order {word} has status {word}")]
async fn order_status(world: &mut DispatchWorld, alias: String, status: String) {
    let id = world.order_id(&alias);
    let order = world.queries().order_by_id(&id).await.expect("Error fetching order");
    let expected = OrderStatusType::from_str(&status).expect("Invalid order status");
    assert_eq!(order.status, expected, "Status of order {alias} is incorrect");
}

#[then(expr = "order {word} is accepted by {word}")]
async fn order_winner(world: &mut DispatchWorld, alias: String, supplier: String) {
    let id = world.order_id(&alias);
    let order = world.queries().order_by_id(&id).await.expect("Error fetching order");
    assert_eq!(order.accepted_by, Some(SupplierId::from(supplier)));
}

#[then(expr = "order {word} is offered to {string}")]
async fn offered_to(world: &mut DispatchWorld, alias: String, suppliers: String) {
    let id = world.order_id(&alias);
    let offers = world.queries().offers_for_order(&id).await.expect("Error fetching offers");
    let mut offered = offers.into_iter().map(|o| o.supplier_id.to_string()).collect::<Vec<_>>();
    offered.sort();
    let mut expected = id_list(&suppliers);
    expected.sort();
    assert_eq!(offered, expected);
}

#[then(expr = "the offer of order {word} to {word} is {word}")]
async fn offer_status(world: &mut DispatchWorld, alias: String, supplier: String, status: String) {
    let id = world.order_id(&alias);
    let offers = world.queries().offers_for_order(&id).await.expect("Error fetching offers");
    let offer = offers
        .into_iter()
        .find(|o| o.supplier_id.as_str() == supplier)
        .unwrap_or_else(|| panic!("{supplier} was never offered order {alias}"));
    let expected = VisibilityStatus::from_str(&status).expect("Invalid offer status");
    assert_eq!(offer.status, expected);
}

#[then(expr = "supplier {word} sees {int} active order(s)")]
async fn active_orders(world: &mut DispatchWorld, supplier: String, count: usize) {
    let orders = world.queries().active_orders_for_supplier(&SupplierId::from(supplier)).await.expect("Error fetching");
    assert_eq!(orders.len(), count);
}

#[then(expr = "the history of order {word} is {string}")]
async fn history(world: &mut DispatchWorld, alias: String, kinds: String) {
    let id = world.order_id(&alias);
    let events = world.queries().events_for_order(&id).await.expect("Error fetching events");
    let actual = events.into_iter().map(|e| e.kind.to_string()).collect::<Vec<_>>();
    assert_eq!(actual, id_list(&kinds));
}

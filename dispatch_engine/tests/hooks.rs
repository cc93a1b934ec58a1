use std::{
    future::Future,
    pin::Pin,
    sync::{Arc, Mutex},
    time::Duration,
};

use dispatch_engine::{
    db_types::{OrderId, StockStatus, SupplierProfile, VendorId},
    events::{EventHandlers, EventHooks, Notification, NotificationKind},
    order_objects::NewOrderRequest,
    test_utils::prepare_env::seeded_database,
    DispatchDatabase,
    DispatchFlowApi,
    SqliteDatabase,
};
use log::*;
use sqlx::{migrate::MigrateDatabase, Sqlite};
use tokio::runtime::Runtime;

#[derive(Default, Clone)]
struct Inbox {
    received: Arc<Mutex<Vec<Notification>>>,
}

impl Inbox {
    fn push(&self, n: Notification) {
        if let Ok(mut v) = self.received.lock() {
            v.push(n);
        }
    }

    fn take(&self) -> Vec<(String, NotificationKind, OrderId)> {
        let mut v = self.received.lock().unwrap();
        let mut result = v.drain(..).map(|n| (n.recipient_id, n.kind, n.order_id)).collect::<Vec<_>>();
        result.sort_by(|a, b| a.0.cmp(&b.0));
        result
    }
}

fn suppliers() -> Vec<SupplierProfile> {
    ["north", "south"]
        .into_iter()
        .map(|s| SupplierProfile::new(s).with_service_area("Polokwane").with_stock("SAND-1T", StockStatus::Low, 9))
        .collect()
}

async fn setup(inbox: Inbox) -> DispatchFlowApi<SqliteDatabase> {
    let db = seeded_database(&suppliers()).await;
    let mut hooks = EventHooks::default();
    hooks.on_notification(move |n| {
        info!("🪝️ {n:?}");
        let inbox = inbox.clone();
        Box::pin(async move {
            inbox.push(n);
        }) as Pin<Box<dyn Future<Output = ()> + Send>>
    });
    let handlers = EventHandlers::new(10, hooks);
    let producers = handlers.producers();
    handlers.start_handlers().await;
    DispatchFlowApi::new(db, producers)
}

async fn settle() {
    tokio::time::sleep(Duration::from_millis(100)).await;
}

async fn tear_down(mut api: DispatchFlowApi<SqliteDatabase>) {
    let url = api.db().url().to_string();
    if let Err(e) = api.db_mut().close().await {
        error!("🚀️ Failed to close database: {e}");
    }
    Sqlite::drop_database(&url).await.unwrap();
}

#[test]
fn notifications_follow_each_transition() {
    dotenvy::from_filename(".env.test").ok();
    let _ = env_logger::try_init();
    let rt = Runtime::new().unwrap();
    let inbox = Inbox::default();
    let vendor = VendorId::from("vendor-7");
    rt.block_on(async move {
        let api = setup(inbox.clone()).await;
        let request = NewOrderRequest::new("Polokwane Industrial", true).with_item("SAND-1T", 2);
        let id = api.submit_order(&vendor, request).await.unwrap().order.id;
        settle().await;
        assert_eq!(inbox.take(), vec![
            ("north".to_string(), NotificationKind::OrderOffered, id),
            ("south".to_string(), NotificationKind::OrderOffered, id),
        ]);

        api.accept_order(&id, &"south".into()).await.unwrap();
        settle().await;
        assert_eq!(inbox.take(), vec![
            ("north".to_string(), NotificationKind::OfferExpired, id),
            ("vendor-7".to_string(), NotificationKind::OrderAccepted, id),
        ]);

        // Failed transitions are silent
        assert!(api.accept_order(&id, &"north".into()).await.is_err());
        settle().await;
        assert!(inbox.take().is_empty());

        api.cancel_order(&id, &vendor).await.unwrap();
        settle().await;
        assert_eq!(inbox.take(), vec![("south".to_string(), NotificationKind::OrderCancelled, id)]);
        tear_down(api).await;
    });
}

#[test]
fn vendor_hears_about_unplaceable_and_exhausted_orders() {
    let _ = env_logger::try_init();
    let rt = Runtime::new().unwrap();
    let inbox = Inbox::default();
    let vendor = VendorId::from("vendor-8");
    rt.block_on(async move {
        let api = setup(inbox.clone()).await;
        // Low stock only, so a vendor that insists on full fulfilment finds nobody
        let request = NewOrderRequest::new("Polokwane", false).with_item("SAND-1T", 2);
        let id = api.submit_order(&vendor, request).await.unwrap().order.id;
        settle().await;
        assert_eq!(inbox.take(), vec![("vendor-8".to_string(), NotificationKind::OrderDeclinedAll, id)]);

        let request = NewOrderRequest::new("Polokwane", true).with_item("SAND-1T", 2);
        let id = api.submit_order(&vendor, request).await.unwrap().order.id;
        settle().await;
        inbox.take();
        api.decline_order(&id, &"north".into()).await.unwrap();
        settle().await;
        assert!(inbox.take().is_empty());
        api.decline_order(&id, &"south".into()).await.unwrap();
        settle().await;
        assert_eq!(inbox.take(), vec![("vendor-8".to_string(), NotificationKind::OrderDeclinedAll, id)]);
        tear_down(api).await;
    });
}

#[test]
fn transitions_commit_without_any_listener() {
    let rt = Runtime::new().unwrap();
    rt.block_on(async move {
        let db = seeded_database(&suppliers()).await;
        // The handler is dropped without ever being started, so every publish fails
        let mut hooks = EventHooks::default();
        hooks.on_notification(|_| Box::pin(async {}) as Pin<Box<dyn Future<Output = ()> + Send>>);
        let producers = EventHandlers::new(1, hooks).producers();
        let api = DispatchFlowApi::new(db, producers);
        let request = NewOrderRequest::new("Polokwane", true).with_item("SAND-1T", 2);
        let placed = api.submit_order(&VendorId::from("vendor-9"), request).await.unwrap();
        assert_eq!(placed.offer_count(), 2);
        api.accept_order(&placed.order.id, &"north".into()).await.unwrap();
        tear_down(api).await;
    });
}

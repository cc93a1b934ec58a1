use chrono::Duration;
use log::*;
use tokio::task::JoinHandle;

use crate::{
    config::EngineConfig,
    dispatch_api::dispatch_flow_api::DispatchFlowApi,
    events::EventProducers,
    traits::OfferExpiryResult,
    SqliteDatabase,
};

/// Starts the offer expiry worker, which retires orders that have been waiting on suppliers for longer than `ttl`.
/// Do not await the returned JoinHandle, as it will run indefinitely.
pub fn start_offer_expiry_worker(
    db: SqliteDatabase,
    producers: EventProducers,
    ttl: Duration,
    interval: std::time::Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut timer = tokio::time::interval(interval);
        let api = DispatchFlowApi::new(db, producers);
        info!("🕰️ Offer expiry worker started. Offers time out after {} minutes", ttl.num_minutes());
        loop {
            timer.tick().await;
            trace!("🕰️ Running offer expiry job");
            match api.expire_stale_offers(ttl).await {
                Ok(result) if result.is_empty() => {},
                Ok(result) => {
                    info!("🕰️ {} orders timed out", result.count());
                    debug!("🕰️ Timed out orders: {}", order_list(&result));
                },
                Err(e) => {
                    error!("🕰️ Error running offer expiry job: {e}");
                },
            }
        }
    })
}

/// Starts the worker only if an offer TTL is configured. Without one, offers never time out.
pub fn start_offer_expiry_worker_from_config(
    db: SqliteDatabase,
    producers: EventProducers,
    config: &EngineConfig,
) -> Option<JoinHandle<()>> {
    match config.offer_ttl {
        Some(ttl) => Some(start_offer_expiry_worker(db, producers, ttl, config.expiry_interval)),
        None => {
            info!("🕰️ No offer TTL is configured. Orders will wait for suppliers indefinitely");
            None
        },
    }
}

fn order_list(result: &OfferExpiryResult) -> String {
    result
        .orders
        .iter()
        .map(|t| format!("{} vendor: {} offers expired: {}", t.order.id, t.order.vendor_id, t.expired.len()))
        .collect::<Vec<String>>()
        .join(", ")
}

#[cfg(test)]
mod test {
    use sqlx::{migrate::MigrateDatabase, Sqlite};

    use super::*;
    use crate::{
        db_types::{OrderStatusType, StockStatus, SupplierProfile, VendorId},
        order_objects::NewOrderRequest,
        test_utils::prepare_env::{random_db_path, seeded_database},
        DispatchDatabase,
        OrderQueries,
    };

    fn suppliers() -> Vec<SupplierProfile> {
        vec![SupplierProfile::new("S1").with_service_area("Kimberley").with_stock("GRAVEL", StockStatus::Available, 8)]
    }

    #[tokio::test]
    async fn no_worker_without_a_ttl() {
        let db = seeded_database(&suppliers()).await;
        let config = EngineConfig { offer_ttl: None, ..Default::default() };
        let handle = start_offer_expiry_worker_from_config(db.clone(), EventProducers::default(), &config);
        assert!(handle.is_none());
        Sqlite::drop_database(db.url()).await.unwrap();
    }

    #[tokio::test]
    async fn worker_retires_unanswered_orders() {
        let config = EngineConfig {
            database_url: random_db_path(),
            create_database: true,
            offer_ttl: Some(Duration::zero()),
            expiry_interval: std::time::Duration::from_millis(50),
            ..Default::default()
        };
        let mut db = SqliteDatabase::from_config(&config).await.unwrap();
        for s in suppliers() {
            db.upsert_supplier_profile(&s).await.unwrap();
        }
        let api = DispatchFlowApi::new(db.clone(), EventProducers::default());
        let request = NewOrderRequest::new("Kimberley", false).with_item("GRAVEL", 3);
        let id = api.submit_order(&VendorId::from("vendor-1"), request).await.unwrap().order.id;

        let handle = start_offer_expiry_worker_from_config(db.clone(), EventProducers::default(), &config)
            .expect("A TTL is configured, so the worker should start");
        let mut status = OrderStatusType::Offered;
        for _ in 0..20 {
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
            status = db.fetch_order(&id).await.unwrap().unwrap().status;
            if status != OrderStatusType::Offered {
                break;
            }
        }
        handle.abort();
        assert_eq!(status, OrderStatusType::DeclinedAll);
        assert!(db.fetch_active_orders_for_supplier(&"S1".into()).await.unwrap().is_empty());
        db.close().await.unwrap();
        Sqlite::drop_database(&config.database_url).await.unwrap();
    }
}

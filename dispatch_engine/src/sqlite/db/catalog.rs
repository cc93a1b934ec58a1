//! Supplier service areas, catalogs and inventory.
//!
//! The dispatch flows only ever read these tables. The write helpers exist for the stock-keeping collaborator and for
//! seeding test data.
use std::collections::BTreeMap;

use log::debug;
use sqlx::{QueryBuilder, SqliteConnection};

use crate::db_types::{InventoryRecord, Sku, SupplierId, SupplierProfile};

/// Replaces everything stored about the supplier with the contents of `profile`. This is not atomic; run it inside a
/// transaction.
pub async fn upsert_supplier_profile(profile: &SupplierProfile, conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
    let id = &profile.supplier_id;
    sqlx::query(
        r#"INSERT INTO suppliers (id) VALUES ($1)
        ON CONFLICT (id) DO UPDATE SET updated_at = CURRENT_TIMESTAMP"#,
    )
    .bind(id)
    .execute(&mut *conn)
    .await?;
    sqlx::query("DELETE FROM supplier_service_areas WHERE supplier_id = $1").bind(id).execute(&mut *conn).await?;
    sqlx::query("DELETE FROM supplier_catalog WHERE supplier_id = $1").bind(id).execute(&mut *conn).await?;
    sqlx::query("DELETE FROM inventory WHERE supplier_id = $1").bind(id).execute(&mut *conn).await?;

    let mut areas = profile.service_areas.iter().map(|a| a.trim()).filter(|a| !a.is_empty()).collect::<Vec<_>>();
    areas.sort_unstable();
    areas.dedup();
    if !areas.is_empty() {
        let mut builder = QueryBuilder::new("INSERT INTO supplier_service_areas (supplier_id, area) ");
        builder.push_values(areas, |mut row, area| {
            row.push_bind(id.as_str()).push_bind(area);
        });
        builder.build().execute(&mut *conn).await?;
    }
    if !profile.catalog.is_empty() {
        let mut builder = QueryBuilder::new("INSERT INTO supplier_catalog (supplier_id, sku) ");
        builder.push_values(profile.catalog.iter(), |mut row, sku| {
            row.push_bind(id.as_str()).push_bind(sku.as_str());
        });
        builder.build().execute(&mut *conn).await?;
    }
    for record in profile.inventory.values() {
        set_inventory(record, conn).await?;
    }
    debug!(
        "📦️ Supplier {id} stored with {} catalog entries and {} inventory records",
        profile.catalog.len(),
        profile.inventory.len()
    );
    Ok(())
}

/// Inserts or replaces the inventory record for its (supplier, sku) pair. The supplier must already exist.
pub async fn set_inventory(record: &InventoryRecord, conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO inventory (supplier_id, sku, status, quantity) VALUES ($1, $2, $3, $4)
        ON CONFLICT (supplier_id, sku) DO UPDATE
            SET status = excluded.status, quantity = excluded.quantity, updated_at = CURRENT_TIMESTAMP
        "#,
    )
    .bind(&record.supplier_id)
    .bind(&record.sku)
    .bind(record.status)
    .bind(record.quantity)
    .execute(conn)
    .await?;
    Ok(())
}

/// Assembles a profile for every registered supplier, sorted by supplier id.
pub async fn fetch_supplier_profiles(conn: &mut SqliteConnection) -> Result<Vec<SupplierProfile>, sqlx::Error> {
    let ids: Vec<(SupplierId,)> = sqlx::query_as("SELECT id FROM suppliers").fetch_all(&mut *conn).await?;
    let mut profiles =
        ids.into_iter().map(|(id,)| (id.clone(), SupplierProfile::new(id))).collect::<BTreeMap<_, _>>();

    let areas: Vec<(SupplierId, String)> =
        sqlx::query_as("SELECT supplier_id, area FROM supplier_service_areas ORDER BY supplier_id, area")
            .fetch_all(&mut *conn)
            .await?;
    for (id, area) in areas {
        if let Some(p) = profiles.get_mut(&id) {
            p.service_areas.push(area);
        }
    }

    let catalog: Vec<(SupplierId, Sku)> =
        sqlx::query_as("SELECT supplier_id, sku FROM supplier_catalog").fetch_all(&mut *conn).await?;
    for (id, sku) in catalog {
        if let Some(p) = profiles.get_mut(&id) {
            p.catalog.insert(sku);
        }
    }

    let inventory: Vec<InventoryRecord> =
        sqlx::query_as("SELECT supplier_id, sku, status, quantity FROM inventory").fetch_all(conn).await?;
    for record in inventory {
        if let Some(p) = profiles.get_mut(&record.supplier_id) {
            p.inventory.insert(record.sku.clone(), record);
        }
    }
    Ok(profiles.into_values().collect())
}

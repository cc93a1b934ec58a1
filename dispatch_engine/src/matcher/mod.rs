//! # Eligibility matching
//!
//! Given a new order and a snapshot of every registered supplier, [`EligibilityMatcher`] returns the set of suppliers
//! allowed to see and claim the order. A supplier is eligible only if **all** of the following hold:
//!
//! 1. Its service areas cover the delivery location (see [`ServiceAreaPredicate`]).
//! 2. Every line item is in its catalog.
//! 3. Every line item has an inventory record that is not `Unavailable`.
//! 4. If the vendor disallows partial fulfilment, every one of those inventory records is exactly `Available`.
//!
//! Matching is a pure function of its inputs. The result is a set, so callers must not rely on any ordering.
mod service_area;

use std::{collections::HashSet, fmt::Debug, sync::Arc};

use log::*;
pub use service_area::{ServiceAreaPredicate, SubstringServiceArea};

use crate::db_types::{NewOrder, StockStatus, SupplierId, SupplierProfile};

#[derive(Clone)]
pub struct EligibilityMatcher {
    service_area: Arc<dyn ServiceAreaPredicate>,
}

impl Debug for EligibilityMatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "EligibilityMatcher")
    }
}

impl Default for EligibilityMatcher {
    fn default() -> Self {
        Self::new(SubstringServiceArea)
    }
}

impl EligibilityMatcher {
    pub fn new<P: ServiceAreaPredicate + 'static>(service_area: P) -> Self {
        Self { service_area: Arc::new(service_area) }
    }

    /// Returns every supplier in `suppliers` that is eligible for `order`.
    pub fn eligible_suppliers(&self, order: &NewOrder, suppliers: &[SupplierProfile]) -> HashSet<SupplierId> {
        let result = suppliers
            .iter()
            .filter(|s| self.is_eligible(order, s))
            .map(|s| s.supplier_id.clone())
            .collect::<HashSet<SupplierId>>();
        debug!(
            "🧮️ {} of {} suppliers are eligible for an order of {} line items to '{}'",
            result.len(),
            suppliers.len(),
            order.items.len(),
            order.delivery_location
        );
        result
    }

    pub fn is_eligible(&self, order: &NewOrder, supplier: &SupplierProfile) -> bool {
        if order.items.is_empty() {
            return false;
        }
        if !self.service_area.covers(&supplier.service_areas, &order.delivery_location) {
            trace!("🧮️ {} does not deliver to '{}'", supplier.supplier_id, order.delivery_location);
            return false;
        }
        order.items.iter().all(|item| {
            if !supplier.catalog.contains(&item.sku) {
                trace!("🧮️ {} does not list {}", supplier.supplier_id, item.sku);
                return false;
            }
            match supplier.stock_status(&item.sku) {
                Some(StockStatus::Available) => true,
                Some(StockStatus::Low) => order.partial_allowed,
                Some(StockStatus::Unavailable) | None => {
                    trace!("🧮️ {} has no stock of {}", supplier.supplier_id, item.sku);
                    false
                },
            }
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::db_types::{LineItem, VendorId};

    fn order(items: Vec<LineItem>, location: &str, partial_allowed: bool) -> NewOrder {
        NewOrder {
            vendor_id: VendorId::from("vendor-1"),
            items,
            delivery_location: location.to_string(),
            partial_allowed,
        }
    }

    fn bolts(partial_allowed: bool) -> NewOrder {
        order(vec![LineItem::new("M8-BOLT-20", 50)], "Johannesburg CBD, Unit 4", partial_allowed)
    }

    fn supplier(id: &str, area: &str, status: StockStatus) -> SupplierProfile {
        SupplierProfile::new(id).with_service_area(area).with_stock("M8-BOLT-20", status, 100)
    }

    fn ids(v: &[&str]) -> HashSet<SupplierId> {
        v.iter().map(|s| SupplierId::from(*s)).collect()
    }

    #[test]
    fn low_stock_excluded_when_partial_disallowed() {
        let suppliers = vec![
            supplier("s1", "Johannesburg CBD", StockStatus::Available),
            supplier("s2", "Johannesburg CBD", StockStatus::Low),
        ];
        let matcher = EligibilityMatcher::default();
        assert_eq!(matcher.eligible_suppliers(&bolts(false), &suppliers), ids(&["s1"]));
        assert_eq!(matcher.eligible_suppliers(&bolts(true), &suppliers), ids(&["s1", "s2"]));
    }

    #[test]
    fn unavailable_and_missing_inventory_never_match() {
        let suppliers = vec![
            supplier("s1", "Johannesburg", StockStatus::Unavailable),
            SupplierProfile::new("s2").with_service_area("Johannesburg").with_catalog_entry("M8-BOLT-20"),
        ];
        let matcher = EligibilityMatcher::default();
        assert!(matcher.eligible_suppliers(&bolts(true), &suppliers).is_empty());
    }

    #[test]
    fn inventory_without_catalog_entry_does_not_match() {
        let mut s = supplier("s1", "Johannesburg", StockStatus::Available);
        s.catalog.clear();
        let matcher = EligibilityMatcher::default();
        assert!(!matcher.is_eligible(&bolts(true), &s));
    }

    #[test]
    fn every_line_item_must_be_satisfied() {
        let s = supplier("s1", "Johannesburg", StockStatus::Available).with_stock("M10-NUT", StockStatus::Low, 3);
        let two_items = |partial| {
            order(
                vec![LineItem::new("M8-BOLT-20", 50), LineItem::new("M10-NUT", 50)],
                "Johannesburg CBD",
                partial,
            )
        };
        let matcher = EligibilityMatcher::default();
        assert!(matcher.is_eligible(&two_items(true), &s));
        assert!(!matcher.is_eligible(&two_items(false), &s));
        let three_items = order(
            vec![LineItem::new("M8-BOLT-20", 1), LineItem::new("M10-NUT", 1), LineItem::new("WASHER", 1)],
            "Johannesburg CBD",
            true,
        );
        assert!(!matcher.is_eligible(&three_items, &s));
    }

    #[test]
    fn geography_and_empty_orders() {
        let suppliers = vec![
            supplier("s1", "Cape Town", StockStatus::Available),
            SupplierProfile::new("s2").with_stock("M8-BOLT-20", StockStatus::Available, 10),
        ];
        let matcher = EligibilityMatcher::default();
        assert!(matcher.eligible_suppliers(&bolts(true), &suppliers).is_empty());
        let empty = order(vec![], "Johannesburg CBD", true);
        let s = supplier("s3", "Johannesburg", StockStatus::Available);
        assert!(!matcher.is_eligible(&empty, &s));
    }

    #[test]
    fn completeness_over_a_mixed_market() {
        // Every item is stocked by at least one covering supplier, so the eligible set can't be empty
        let suppliers = vec![
            supplier("s1", "Durban", StockStatus::Available),
            supplier("s2", "johannesburg", StockStatus::Low),
            supplier("s3", "Johannesburg CBD", StockStatus::Unavailable),
        ];
        let matcher = EligibilityMatcher::default();
        let eligible = matcher.eligible_suppliers(&bolts(true), &suppliers);
        assert_eq!(eligible, ids(&["s2"]));
    }

    struct Everywhere;

    impl ServiceAreaPredicate for Everywhere {
        fn covers(&self, _: &[String], _: &str) -> bool {
            true
        }
    }

    #[test]
    fn custom_service_area_predicate() {
        let s = SupplierProfile::new("s1").with_stock("M8-BOLT-20", StockStatus::Available, 100);
        assert!(!EligibilityMatcher::default().is_eligible(&bolts(false), &s));
        assert!(EligibilityMatcher::new(Everywhere).is_eligible(&bolts(false), &s));
    }
}

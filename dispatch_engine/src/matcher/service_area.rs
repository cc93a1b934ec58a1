//! Service-area predicates.
//!
//! The marketplace does not geocode addresses. A supplier covers a delivery location when any of its declared service
//! area strings appears, case-insensitively, inside the location text. The test is deliberately permissive and is kept
//! behind [`ServiceAreaPredicate`] so that a geocoded implementation can be dropped in later.

/// Decides whether a supplier with the given service areas delivers to `delivery_location`.
pub trait ServiceAreaPredicate: Send + Sync {
    fn covers(&self, service_areas: &[String], delivery_location: &str) -> bool;
}

/// Case-insensitive substring containment. Blank service areas are ignored, so that an accidental empty string does
/// not make a supplier cover every address.
#[derive(Debug, Clone, Copy, Default)]
pub struct SubstringServiceArea;

impl ServiceAreaPredicate for SubstringServiceArea {
    fn covers(&self, service_areas: &[String], delivery_location: &str) -> bool {
        let location = delivery_location.to_lowercase();
        service_areas
            .iter()
            .map(|area| area.trim())
            .filter(|area| !area.is_empty())
            .any(|area| location.contains(&area.to_lowercase()))
    }
}

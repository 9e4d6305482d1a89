pub mod aggregator;
pub mod classifier;
pub mod ladder;
pub mod service;

pub use aggregator::{PriceSummary, WindowedAggregator, WindowedStats};
pub use service::{seller_label, MarketStatsService};

use crate::types::{Listing, ListingAttributes, NewAdDraft};

/// What the comparable search is run for: a saved listing or a draft ad.
#[derive(Debug, Clone, Default)]
pub struct Subject {
    /// Listing to leave out of its own comparables.
    pub exclude_id: Option<String>,
    pub price: Option<f64>,
    pub category_id: String,
    pub subcategory_id: Option<String>,
    pub city: Option<String>,
    pub attributes: ListingAttributes,
}

impl From<&Listing> for Subject {
    fn from(listing: &Listing) -> Self {
        Self {
            exclude_id: Some(listing.id.clone()),
            price: Some(listing.price),
            category_id: listing.category_id.clone(),
            subcategory_id: listing.subcategory_id.clone(),
            city: listing.city.clone(),
            attributes: listing.attributes.clone(),
        }
    }
}

impl From<&NewAdDraft> for Subject {
    fn from(draft: &NewAdDraft) -> Self {
        Self {
            exclude_id: None,
            price: draft.price,
            category_id: draft.category_id.clone(),
            subcategory_id: draft.subcategory_id.clone(),
            city: draft.city.clone(),
            attributes: draft.attributes.clone(),
        }
    }
}

/// Trimmed, non-empty attribute value.
pub(crate) fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

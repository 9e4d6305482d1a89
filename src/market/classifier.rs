use crate::market::{present, Subject};
use crate::types::ComparisonType;

/// Category / subcategory ids that carry electronics attributes.
pub const ELECTRONICS_CATEGORIES: &[&str] = &[
    "electronics",
    "phones",
    "smartphones",
    "tablets",
    "laptops",
    "computers",
    "consoles",
];

pub const VEHICLE_CATEGORIES: &[&str] = &[
    "vehicles",
    "auto",
    "cars",
    "motorcycles",
    "trucks",
];

pub const REALESTATE_CATEGORIES: &[&str] = &[
    "realestate",
    "real_estate",
    "apartments",
    "houses",
    "rooms",
    "commercial_property",
];

/// Pick the comparison strategy for a subject.
///
/// A structured strategy applies only when the category matches its tag set
/// AND the attributes its first ladder rungs key on are present; otherwise the
/// subject is compared as `General`.
pub fn classify(subject: &Subject) -> ComparisonType {
    let attrs = &subject.attributes;

    if in_categories(subject, ELECTRONICS_CATEGORIES)
        && present(&attrs.brand).is_some()
        && present(&attrs.model).is_some()
    {
        return ComparisonType::Electronics;
    }

    if in_categories(subject, VEHICLE_CATEGORIES)
        && present(&attrs.make).is_some()
        && present(&attrs.model).is_some()
    {
        return ComparisonType::Vehicles;
    }

    if in_categories(subject, REALESTATE_CATEGORIES)
        && present(&attrs.realty_type).is_some()
        && attrs.area.is_some_and(|a| a > 0.0)
    {
        return ComparisonType::RealEstate;
    }

    ComparisonType::General
}

fn in_categories(subject: &Subject, tags: &[&str]) -> bool {
    let matches = |id: &str| tags.iter().any(|t| t.eq_ignore_ascii_case(id.trim()));
    matches(&subject.category_id) || subject.subcategory_id.as_deref().is_some_and(matches)
}

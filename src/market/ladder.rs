//! Relaxation ladders: per-strategy ordered filter builders, narrowest first.
//!
//! Every structured ladder ends in the general ladder. A rung whose attributes
//! are missing on the subject builds `None` and is skipped.

use crate::config::VEHICLE_YEAR_TOLERANCE;
use crate::market::{present, Subject};
use crate::types::ComparisonType;

/// Value aggregated for each comparable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Metric {
    #[default]
    Price,
    /// price / area, only for comparables with a positive area.
    PricePerArea,
}

/// Equality predicates applied to eligible comparables. `None` = unconstrained.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ComparableFilter {
    pub category_id: String,
    pub subcategory_id: Option<String>,
    pub city: Option<String>,
    pub brand: Option<String>,
    pub model: Option<String>,
    pub storage: Option<String>,
    pub make: Option<String>,
    /// Inclusive model-year range.
    pub year_range: Option<(i32, i32)>,
    pub realty_type: Option<String>,
    pub district: Option<String>,
    pub exclude_id: Option<String>,
    pub metric: Metric,
}

pub struct Rung {
    pub comparison: ComparisonType,
    /// Human-readable rung name, logged and reported with the stats.
    pub criteria: &'static str,
    pub build: fn(&Subject) -> Option<ComparableFilter>,
}

const ELECTRONICS: &[Rung] = &[
    Rung { comparison: ComparisonType::Electronics, criteria: "brand+model+storage", build: electronics_full },
    Rung { comparison: ComparisonType::Electronics, criteria: "brand+model", build: electronics_model },
];

const VEHICLES: &[Rung] = &[
    Rung { comparison: ComparisonType::Vehicles, criteria: "make+model+year", build: vehicles_full },
    Rung { comparison: ComparisonType::Vehicles, criteria: "make+model", build: vehicles_model },
];

const REALESTATE: &[Rung] = &[
    Rung { comparison: ComparisonType::RealEstate, criteria: "type+city+district", build: realty_district },
    Rung { comparison: ComparisonType::RealEstate, criteria: "type+city", build: realty_city },
];

const GENERAL: &[Rung] = &[
    Rung { comparison: ComparisonType::General, criteria: "category+subcategory+city", build: general_sub_city },
    Rung { comparison: ComparisonType::General, criteria: "category+subcategory", build: general_sub },
    Rung { comparison: ComparisonType::General, criteria: "category+city", build: general_city },
    Rung { comparison: ComparisonType::General, criteria: "category", build: general_category },
];

/// Rungs to try for a strategy, in order.
pub fn ladder(kind: ComparisonType) -> impl Iterator<Item = &'static Rung> {
    let specific: &'static [Rung] = match kind {
        ComparisonType::Electronics => ELECTRONICS,
        ComparisonType::Vehicles => VEHICLES,
        ComparisonType::RealEstate => REALESTATE,
        ComparisonType::General => &[],
    };
    specific.iter().chain(GENERAL.iter())
}

fn base(s: &Subject) -> Option<ComparableFilter> {
    let category_id = s.category_id.trim();
    if category_id.is_empty() {
        return None;
    }
    Some(ComparableFilter {
        category_id: category_id.to_string(),
        exclude_id: s.exclude_id.clone(),
        ..ComparableFilter::default()
    })
}

fn owned(value: &Option<String>) -> Option<String> {
    present(value).map(str::to_string)
}

fn electronics_full(s: &Subject) -> Option<ComparableFilter> {
    Some(ComparableFilter {
        storage: Some(owned(&s.attributes.storage)?),
        ..electronics_model(s)?
    })
}

fn electronics_model(s: &Subject) -> Option<ComparableFilter> {
    Some(ComparableFilter {
        brand: Some(owned(&s.attributes.brand)?),
        model: Some(owned(&s.attributes.model)?),
        ..base(s)?
    })
}

fn vehicles_full(s: &Subject) -> Option<ComparableFilter> {
    let year = s.attributes.year?;
    Some(ComparableFilter {
        year_range: Some((
            year.saturating_sub(VEHICLE_YEAR_TOLERANCE),
            year.saturating_add(VEHICLE_YEAR_TOLERANCE),
        )),
        ..vehicles_model(s)?
    })
}

fn vehicles_model(s: &Subject) -> Option<ComparableFilter> {
    Some(ComparableFilter {
        make: Some(owned(&s.attributes.make)?),
        model: Some(owned(&s.attributes.model)?),
        ..base(s)?
    })
}

fn realty_district(s: &Subject) -> Option<ComparableFilter> {
    Some(ComparableFilter {
        district: Some(owned(&s.attributes.district)?),
        ..realty_city(s)?
    })
}

fn realty_city(s: &Subject) -> Option<ComparableFilter> {
    s.attributes.area.filter(|a| *a > 0.0)?;
    Some(ComparableFilter {
        realty_type: Some(owned(&s.attributes.realty_type)?),
        city: Some(owned(&s.city)?),
        metric: Metric::PricePerArea,
        ..base(s)?
    })
}

fn general_sub_city(s: &Subject) -> Option<ComparableFilter> {
    Some(ComparableFilter {
        city: Some(owned(&s.city)?),
        ..general_sub(s)?
    })
}

fn general_sub(s: &Subject) -> Option<ComparableFilter> {
    Some(ComparableFilter {
        subcategory_id: Some(owned(&s.subcategory_id)?),
        ..base(s)?
    })
}

fn general_city(s: &Subject) -> Option<ComparableFilter> {
    Some(ComparableFilter {
        city: Some(owned(&s.city)?),
        ..base(s)?
    })
}

fn general_category(s: &Subject) -> Option<ComparableFilter> {
    base(s)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ListingAttributes;

    fn criteria(kind: ComparisonType) -> Vec<&'static str> {
        ladder(kind).map(|r| r.criteria).collect()
    }

    fn built(kind: ComparisonType, s: &Subject) -> Vec<&'static str> {
        ladder(kind).filter(|r| (r.build)(s).is_some()).map(|r| r.criteria).collect()
    }

    #[test]
    fn electronics_ladder_ends_in_general() {
        assert_eq!(
            criteria(ComparisonType::Electronics),
            vec![
                "brand+model+storage",
                "brand+model",
                "category+subcategory+city",
                "category+subcategory",
                "category+city",
                "category",
            ]
        );
    }

    #[test]
    fn missing_attributes_skip_rungs() {
        let s = Subject {
            exclude_id: Some("l1".into()),
            category_id: "phones".into(),
            attributes: ListingAttributes {
                brand: Some("Apple".into()),
                model: Some("iPhone 13".into()),
                ..Default::default()
            },
            ..Subject::default()
        };
        // no storage, no subcategory, no city
        assert_eq!(built(ComparisonType::Electronics, &s), vec!["brand+model", "category"]);
    }

    #[test]
    fn vehicle_year_rung_spans_one_year_each_side() {
        let s = Subject {
            category_id: "cars".into(),
            attributes: ListingAttributes {
                make: Some("Toyota".into()),
                model: Some("Corolla".into()),
                year: Some(2015),
                ..Default::default()
            },
            ..Subject::default()
        };
        let first = ladder(ComparisonType::Vehicles).next().unwrap();
        let filter = (first.build)(&s).unwrap();
        assert_eq!(filter.year_range, Some((2014, 2016)));
        assert_eq!(filter.make.as_deref(), Some("Toyota"));
        assert_eq!(filter.metric, Metric::Price);
    }

    #[test]
    fn extreme_year_saturates() {
        let mut s = Subject {
            category_id: "cars".into(),
            attributes: ListingAttributes {
                make: Some("Toyota".into()),
                model: Some("Corolla".into()),
                year: Some(i32::MIN),
                ..Default::default()
            },
            ..Subject::default()
        };
        let first = ladder(ComparisonType::Vehicles).next().unwrap();
        assert_eq!((first.build)(&s).unwrap().year_range, Some((i32::MIN, i32::MIN + 1)));

        s.attributes.year = Some(i32::MAX);
        assert_eq!((first.build)(&s).unwrap().year_range, Some((i32::MAX - 1, i32::MAX)));
    }

    #[test]
    fn vehicles_ladder_drops_year_before_general() {
        assert_eq!(
            criteria(ComparisonType::Vehicles)[..3],
            ["make+model+year", "make+model", "category+subcategory+city"]
        );
    }

    #[test]
    fn realty_ladder_drops_district_before_general() {
        assert_eq!(
            criteria(ComparisonType::RealEstate)[..3],
            ["type+city+district", "type+city", "category+subcategory+city"]
        );
    }

    #[test]
    fn realty_rungs_compare_per_area_and_general_does_not() {
        let s = Subject {
            category_id: "apartments".into(),
            city: Some("Minsk".into()),
            attributes: ListingAttributes {
                realty_type: Some("flat".into()),
                district: Some("Center".into()),
                area: Some(50.0),
                ..Default::default()
            },
            ..Subject::default()
        };
        let metrics: Vec<(ComparisonType, Metric)> = ladder(ComparisonType::RealEstate)
            .filter_map(|r| (r.build)(&s).map(|f| (r.comparison, f.metric)))
            .collect();
        assert_eq!(metrics[0], (ComparisonType::RealEstate, Metric::PricePerArea));
        assert_eq!(metrics[1], (ComparisonType::RealEstate, Metric::PricePerArea));
        assert!(metrics[2..]
            .iter()
            .all(|(kind, m)| *kind == ComparisonType::General && *m == Metric::Price));
    }

    #[test]
    fn general_ladder_order() {
        let s = Subject {
            category_id: "berries".into(),
            subcategory_id: Some("strawberry".into()),
            city: Some("Brest".into()),
            ..Subject::default()
        };
        assert_eq!(
            built(ComparisonType::General, &s),
            vec!["category+subcategory+city", "category+subcategory", "category+city", "category"]
        );
    }

    #[test]
    fn empty_category_builds_nothing() {
        let s = Subject::default();
        assert!(built(ComparisonType::General, &s).is_empty());
    }
}

//! Situational multipliers applied on top of the market average. Each one is
//! a pure function clamped to its own range; 1.0 is neutral.

use crate::types::Listing;

pub const SEASONAL_RANGE: (f64, f64) = (0.8, 1.3);
pub const TIME_OF_DAY_RANGE: (f64, f64) = (0.85, 1.2);
pub const QUALITY_RANGE: (f64, f64) = (0.85, 1.15);

/// Morning is [6, 11), evening is [17, 22) local time.
pub const MORNING_HOURS: std::ops::Range<u32> = 6..11;
pub const EVENING_HOURS: std::ops::Range<u32> = 17..22;

// ---------------------------------------------------------------------------
// Seasonal
// ---------------------------------------------------------------------------

struct SeasonalProfile {
    categories: &'static [&'static str],
    peak_months: &'static [u32],
    peak: f64,
    off_peak: f64,
}

/// Off-peak can price above peak: out of season, supply is scarce.
const SEASONAL_PROFILES: &[SeasonalProfile] = &[
    SeasonalProfile {
        categories: &["berries", "strawberry", "raspberry", "blueberry"],
        peak_months: &[5, 6, 7, 8],
        peak: 1.0,
        off_peak: 1.3,
    },
    SeasonalProfile {
        categories: &["vegetables", "greens"],
        peak_months: &[7, 8, 9, 10],
        peak: 1.0,
        off_peak: 1.2,
    },
    SeasonalProfile {
        categories: &["fruits", "apples"],
        peak_months: &[8, 9, 10],
        peak: 1.0,
        off_peak: 1.2,
    },
    SeasonalProfile {
        categories: &["flowers"],
        peak_months: &[2, 3, 5],
        peak: 1.2,
        off_peak: 1.0,
    },
    SeasonalProfile {
        categories: &["christmas_trees"],
        peak_months: &[12],
        peak: 1.3,
        off_peak: 0.8,
    },
    SeasonalProfile {
        categories: &["winter_clothes", "skis", "snowboards"],
        peak_months: &[11, 12, 1, 2],
        peak: 1.15,
        off_peak: 0.9,
    },
    SeasonalProfile {
        categories: &["bicycles", "camping", "swimwear"],
        peak_months: &[4, 5, 6, 7, 8, 9],
        peak: 1.1,
        off_peak: 0.9,
    },
];

/// `month` is 1-based.
pub fn seasonal_factor(category_id: &str, subcategory_id: Option<&str>, month: u32) -> f64 {
    let Some(profile) = SEASONAL_PROFILES
        .iter()
        .find(|p| matches_any(p.categories, category_id, subcategory_id))
    else {
        return 1.0;
    };
    let factor = if profile.peak_months.contains(&month) {
        profile.peak
    } else {
        profile.off_peak
    };
    clamp(factor, SEASONAL_RANGE)
}

// ---------------------------------------------------------------------------
// Time of day
// ---------------------------------------------------------------------------

struct TimeProfile {
    categories: &'static [&'static str],
    morning: f64,
    evening: f64,
}

const TIME_PROFILES: &[TimeProfile] = &[
    TimeProfile { categories: &["bakery", "bread", "pastry"], morning: 1.15, evening: 0.9 },
    TimeProfile { categories: &["ready_food", "homemade_food", "meals"], morning: 0.95, evening: 1.1 },
    TimeProfile { categories: &["flowers"], morning: 1.0, evening: 1.1 },
    TimeProfile { categories: &["coffee"], morning: 1.1, evening: 0.9 },
];

/// `hour` is local, 0-23.
pub fn time_of_day_factor(category_id: &str, subcategory_id: Option<&str>, hour: u32) -> f64 {
    let Some(profile) = TIME_PROFILES
        .iter()
        .find(|p| matches_any(p.categories, category_id, subcategory_id))
    else {
        return 1.0;
    };
    let factor = if MORNING_HOURS.contains(&hour) {
        profile.morning
    } else if EVENING_HOURS.contains(&hour) {
        profile.evening
    } else {
        1.0
    };
    clamp(factor, TIME_OF_DAY_RANGE)
}

// ---------------------------------------------------------------------------
// Listing quality
// ---------------------------------------------------------------------------

pub fn quality_factor(listing: &Listing) -> f64 {
    let photos = match listing.photo_count {
        0 => -0.10,
        1..=2 => 0.0,
        3..=5 => 0.03,
        _ => 0.05,
    };
    let description = match listing.description.trim().chars().count() {
        0..=29 => -0.05,
        30..=99 => 0.0,
        100..=299 => 0.03,
        _ => 0.05,
    };
    let title = match listing.title.trim().chars().count() {
        0..=9 => -0.02,
        10..=24 => 0.0,
        _ => 0.02,
    };
    let contact = if listing.has_contact_info { 0.03 } else { 0.0 };

    clamp(1.0 + photos + description + title + contact, QUALITY_RANGE)
}

// ---------------------------------------------------------------------------
// Local competition
// ---------------------------------------------------------------------------

/// Non-increasing in the number of nearby competitors.
pub fn competition_factor(competitors: u64) -> f64 {
    match competitors {
        0..=2 => 1.15,
        3..=5 => 1.05,
        6..=10 => 1.0,
        11..=20 => 0.95,
        _ => 0.90,
    }
}

fn matches_any(tags: &[&str], category_id: &str, subcategory_id: Option<&str>) -> bool {
    let hit = |id: &str| tags.iter().any(|t| t.eq_ignore_ascii_case(id.trim()));
    hit(category_id) || subcategory_id.is_some_and(hit)
}

fn clamp(value: f64, (lo, hi): (f64, f64)) -> f64 {
    value.clamp(lo, hi)
}

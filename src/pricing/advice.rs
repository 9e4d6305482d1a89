//! Seller-facing output of a calculation: confidence, reasons, impulses.

use crate::config::COMPETITION_RADIUS_KM;
use crate::types::{
    diff_percent, round_to, ImpulseAction, ImpulseSuggestion, Listing, PriceFactors,
    PricePosition, Urgency,
};

pub const CONFIDENCE_BASE: f64 = 0.5;
pub const CONFIDENCE_CAP: f64 = 0.95;

/// Demand factor above which confidence gets a bonus.
const CONFIDENT_DEMAND: f64 = 1.1;
/// Demand factor from which a price raise is suggested.
const RAISE_DEMAND: f64 = 1.15;
/// Descriptions shorter than this get a nudge.
const SHORT_DESCRIPTION_CHARS: usize = 50;

/// In [0.5, 0.95]; non-decreasing in sample size for a fixed demand factor.
pub fn confidence(sample_size: u32, demand: f64) -> f64 {
    let sample_bonus = match sample_size {
        50.. => 0.3,
        20..=49 => 0.2,
        10..=19 => 0.1,
        5..=9 => 0.05,
        _ => 0.0,
    };
    let demand_bonus = if demand > CONFIDENT_DEMAND { 0.1 } else { 0.0 };
    // flat bonus for having market data at all
    let raw = CONFIDENCE_BASE + sample_bonus + demand_bonus + 0.1;
    round_to(raw.min(CONFIDENCE_CAP), 2)
}

/// One reason per signal, price comparison first.
pub fn reasons(listing: &Listing, market_average: f64, factors: &PriceFactors) -> Vec<String> {
    let mut out = Vec::new();

    match diff_percent(listing.price, market_average) {
        Some(diff) => {
            let pct = diff.abs().round();
            out.push(match PricePosition::from_diff_percent(diff) {
                PricePosition::High => {
                    format!("Price is {pct:.0}% above the market average of {market_average:.0}")
                }
                PricePosition::Low => {
                    format!("Price is {pct:.0}% below the market average of {market_average:.0}")
                }
                PricePosition::Optimal => {
                    format!("Price is close to the market average of {market_average:.0}")
                }
            });
        }
        None => out.push(format!("Market average is {market_average:.0}")),
    }

    if factors.demand >= CONFIDENT_DEMAND {
        out.push("High demand for this category nearby".to_string());
    } else if factors.demand < 1.0 {
        out.push("Low demand for this category nearby".to_string());
    }

    match factors.competitor_count {
        Some(n) if n <= 2 => out.push("Few competing listings nearby".to_string()),
        Some(n) if n > 10 => {
            out.push(format!("{n} competing listings within {COMPETITION_RADIUS_KM} km"))
        }
        _ => {}
    }

    if factors.seasonal > 1.0 {
        out.push("Seasonal demand supports a higher price".to_string());
    } else if factors.seasonal < 1.0 {
        out.push("Off-season: buyers expect lower prices".to_string());
    }

    if factors.time_of_day > 1.0 {
        out.push("Buyers are most active at this time of day".to_string());
    } else if factors.time_of_day < 1.0 {
        out.push("Fewer buyers are active at this time of day".to_string());
    }

    if listing.photo_count == 0 {
        out.push("Add photos to attract more buyers".to_string());
    }
    if listing.description.trim().chars().count() < SHORT_DESCRIPTION_CHARS {
        out.push("A longer description builds buyer trust".to_string());
    }

    out
}

pub fn impulses(position: PricePosition, factors: &PriceFactors) -> Vec<ImpulseSuggestion> {
    let mut out = Vec::new();
    let suggest = |action, urgency, message: &str| ImpulseSuggestion {
        action,
        urgency,
        message: message.to_string(),
    };

    let mut raised = false;
    if factors.demand >= RAISE_DEMAND && position != PricePosition::High {
        out.push(suggest(
            ImpulseAction::Raise,
            Urgency::High,
            "Demand is high nearby: consider raising the price by 10-15%",
        ));
        raised = true;
    }

    match position {
        PricePosition::High if factors.competition < 1.0 => out.push(suggest(
            ImpulseAction::Lower,
            Urgency::High,
            "Many similar listings nearby: lowering the price will help it sell",
        )),
        PricePosition::High => out.push(suggest(
            ImpulseAction::Lower,
            Urgency::Medium,
            "Price is above the market: a small reduction may speed up the sale",
        )),
        PricePosition::Low if factors.demand >= 1.0 && !raised => out.push(suggest(
            ImpulseAction::Raise,
            Urgency::Medium,
            "Price is below the market: you can move it closer to the average",
        )),
        _ => {}
    }

    if factors.time_of_day > 1.0 {
        out.push(suggest(
            ImpulseAction::Timing,
            Urgency::Medium,
            "Good moment to publish or bump the listing",
        ));
    } else if factors.time_of_day < 1.0 {
        out.push(suggest(
            ImpulseAction::Timing,
            Urgency::Low,
            "Buyers in this category are more active at another time of day",
        ));
    }

    out
}

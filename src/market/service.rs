use tracing::debug;

use crate::config::SUGGESTED_BAND;
use crate::error::{AppError, Result};
use crate::market::aggregator::{PriceSummary, WindowedAggregator};
use crate::market::classifier::classify;
use crate::market::ladder::{ladder, Metric, Rung};
use crate::market::Subject;
use crate::types::{
    diff_percent, round_to, Listing, MarketLevel, MarketStats, NewAdDraft, SellerLabel,
};

/// Classifier + relaxation ladder + aggregator, producing one normalized
/// `MarketStats` per subject.
pub struct MarketStatsService {
    aggregator: WindowedAggregator,
}

impl MarketStatsService {
    pub fn new(aggregator: WindowedAggregator) -> Self {
        Self { aggregator }
    }

    /// `Ok(None)` means no rung reached the minimum sample in any window.
    pub async fn market_stats(&self, listing: &Listing) -> Result<Option<MarketStats>> {
        if listing.id.trim().is_empty() {
            return Err(AppError::InvalidListing("listing id is empty".to_string()));
        }
        self.stats_for_subject(&Subject::from(listing)).await
    }

    /// Pre-listing estimate from draft fields. Nothing is persisted.
    pub async fn stats_for_new_ad(&self, draft: &NewAdDraft) -> Result<Option<MarketStats>> {
        self.stats_for_subject(&Subject::from(draft)).await
    }

    pub async fn stats_for_subject(&self, subject: &Subject) -> Result<Option<MarketStats>> {
        let kind = classify(subject);

        for rung in ladder(kind) {
            let Some(filter) = (rung.build)(subject) else {
                continue;
            };
            let windowed = self.aggregator.aggregate(&filter).await?;
            debug!(
                strategy = %kind,
                criteria = rung.criteria,
                window_days = windowed.window_days,
                count = windowed.count(),
                "ladder rung aggregated"
            );

            if windowed.count() < self.aggregator.min_sample() {
                continue;
            }
            if let Some(summary) = windowed.summary {
                return Ok(Some(normalize(subject, rung, filter.metric, windowed.window_days, summary)));
            }
        }

        Ok(None)
    }
}

/// Round absolute prices to integers. Per-area figures are rounded to cents
/// and only the final product with the subject's area is rounded to an integer.
fn normalize(
    subject: &Subject,
    rung: &Rung,
    metric: Metric,
    window_days: u32,
    summary: PriceSummary,
) -> MarketStats {
    let (avg_price, min_price, max_price, median_price, avg_price_per_area) = match metric {
        Metric::Price => (
            summary.mean.round(),
            summary.min.round(),
            summary.max.round(),
            summary.median.round(),
            None,
        ),
        Metric::PricePerArea => {
            let area = subject.attributes.area.unwrap_or(0.0);
            let scale = |per_area: f64| (round_to(per_area, 2) * area).round();
            (
                scale(summary.mean),
                scale(summary.min),
                scale(summary.max),
                scale(summary.median),
                Some(round_to(summary.mean, 2)),
            )
        }
    };

    let diff = subject
        .price
        .filter(|p| *p > 0.0)
        .and_then(|p| diff_percent(p, avg_price));

    MarketStats {
        count: u32::try_from(summary.count).unwrap_or(u32::MAX),
        avg_price,
        min_price,
        max_price,
        median_price,
        avg_price_per_area,
        window_days,
        comparison_type: rung.comparison,
        criteria: rung.criteria,
        diff_percent: diff.map(|d| round_to(d, 1)),
        market_level: diff.map(MarketLevel::from_diff_percent),
    }
}

/// Seller-facing recommendation with a ±5% band around the market average.
/// None when the subject had no price to compare.
pub fn seller_label(stats: &MarketStats) -> Option<SellerLabel> {
    let level = stats.market_level?;
    let avg = stats.avg_price;
    let suggested_min = (avg * (1.0 - SUGGESTED_BAND)).round();
    let suggested_max = (avg * (1.0 + SUGGESTED_BAND)).round();
    let pct = stats.diff_percent.unwrap_or(0.0).abs().round();

    let message = match level {
        MarketLevel::Below => format!(
            "Your price is {pct:.0}% below the market average of {avg:.0}. \
             You could ask {suggested_min:.0}-{suggested_max:.0}."
        ),
        MarketLevel::Fair => format!("Your price is in line with the market average of {avg:.0}."),
        MarketLevel::Above => format!(
            "Your price is {pct:.0}% above the market average of {avg:.0}. \
             Similar items sell for {suggested_min:.0}-{suggested_max:.0}."
        ),
    };

    Some(SellerLabel { level, message, suggested_min, suggested_max })
}

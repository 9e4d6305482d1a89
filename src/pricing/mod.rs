pub mod advice;
pub mod calculator;
pub mod demand;
pub mod factors;

pub use calculator::{CalculatorSettings, PriceCalculator};
pub use demand::{DemandEstimator, HttpDemandEstimator, NeutralDemandEstimator};

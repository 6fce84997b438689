//! Short-horizon forecasting
//!
//! Each configured metric keeps a bounded `RollingBuffer` of raw values; the
//! `ForecastEngine` extrapolates from it on demand.

mod buffer;
mod forecast;

pub use buffer::{RollingBuffer, DEFAULT_BUFFER_CAPACITY};
pub use forecast::{
    linear_trend, ForecastConfig, ForecastEngine, DEFAULT_HORIZON, FORECAST_MODEL_NAME,
    MAX_HORIZON, MIN_FORECAST_HISTORY,
};

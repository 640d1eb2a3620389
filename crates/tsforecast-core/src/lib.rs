//! Core forecasting engine: a validated time series container, the
//! `Forecaster` contract, and a family of univariate forecasting models
//! (simple baselines, exponential smoothing/ETS, ARIMA, intermittent-demand
//! estimators, Theta, MFLES) plus cross-validation and accuracy metrics.

pub mod arima;
pub mod auto_arima;
pub mod auto_ets;
pub mod auto_mfles;
pub mod auto_mstl;
pub mod baselines;
pub mod calendar;
pub mod changepoint;
pub mod cv;
pub mod differencing;
pub mod error;
pub mod ets;
pub mod forecaster;
pub mod intermittent;
pub mod metrics;
pub mod mfles;
pub mod mstl;
pub mod numeric;
pub mod optimizer;
pub mod seasonality;
pub mod theta;
pub mod timeseries;

pub use arima::{Arima, ArimaDiagnostics, ArimaOrder, ArimaParams};
pub use auto_arima::{AutoArima, AutoArimaCaps, AutoArimaConfig, AutoArimaDiagnostics, SearchStrategy};
pub use auto_ets::{AutoEts, AutoEtsConfig, AutoEtsDiagnostics, DampedPolicy, InformationCriterion};
pub use auto_mfles::{AutoMfles, AutoMflesConfig, AutoMflesDiagnostics, AutoMflesStrategy};
pub use auto_mstl::{AutoMstl, AutoMstlConfig, AutoMstlDiagnostics};
pub use baselines::{Naive, RandomWalkWithDrift, SeasonalNaive, SeasonalWindowAverage, SimpleMovingAverage};
pub use calendar::{CalendarAnnotations, Holiday, Occurrence, Regressor, RegressorMode, StandardizationPolicy};
pub use changepoint::{detect_changepoints, ChangepointResult, CostFunction};
pub use cv::{rolling_cv, CvConfig, CvFold, CvResult, CvStrategy};
pub use error::{ForecastError, Result};
pub use ets::{Ets, EtsConfig, EtsDiagnostics, EtsParams, ErrorType, SeasonType, TrendType};
pub use forecaster::{Forecast, Forecaster, DEFAULT_CONFIDENCE_LEVEL};
pub use intermittent::{Adida, Croston, Imapa, Tsb};
pub use metrics::{score, AccuracyMetrics};
pub use mfles::{Mfles, MflesConfig, MflesDecomposition, MflesDiagnostics, MflesTrendMethod, ResidualSmoother};
pub use mstl::{MstlDecomposition, MstlForecaster, SeasonalMethod, TrendMethod};
pub use theta::ThetaModel;
pub use timeseries::{SanitizePolicy, TimeSeries, Timezone};

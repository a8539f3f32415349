//! Traffic analysis of modelled freeway corridor segments: AADT, peak-hour
//! flow, PCE-weighted capacity use, level of service and truck metrics,
//! summarized per direction and facility type.

pub mod analyzers;
pub mod config;
pub mod error;
pub mod loader;
pub mod metrics;
pub mod output;
pub mod segment;

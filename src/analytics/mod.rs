//! Rating-gap analytics: the pure reduction plus the service that
//! assembles populations, resolves granularity, and runs it.

mod gap;
mod service;

pub use gap::{reduce_gaps, DimensionGap, RatingSample};
pub use service::{GapAnalysis, GapAnalysisService, GapGroup, GapScope, Granularity, PopulationFilter};

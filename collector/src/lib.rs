pub mod config;
pub mod engine;
pub mod ingest;
pub mod types;

pub use config::{CollectorConfig, now_ms};
pub use engine::{Collector, CycleError, CycleOutcome, SkipReason};
pub use types::{
    AnalysisBundle, Decision, DecisionOracle, OracleResponse, OracleVerdict, PortfolioReader,
    PortfolioSnapshot, VerdictV1, VerdictV2, WhaleFlowSummary,
};

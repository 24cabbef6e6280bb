use alerts::validation::ValidationConfig;
use alerts::window_gate::WindowGateConfig;
use market::threshold::ThresholdConfig;

/// Wall-clock milliseconds. Core logic takes explicit `now_ms`
/// parameters; hosts and the periodic runner source them from here.
pub fn now_ms() -> u64 {
    chrono::Utc::now().timestamp_millis() as u64
}

#[derive(Clone, Debug)]
pub struct CollectorConfig {
    /// Instrument this collector watches, e.g. "BTC".
    pub instrument: String,

    /// Database connection string for the alert store.
    pub database_url: String,

    // =========================
    // Cycle configuration
    // =========================
    /// Spacing between periodic analysis cycles.
    ///
    /// The gating components run on a 5-10 minute cadence; the raw
    /// classifier runs continuously off the feed and is not bound by
    /// this interval.
    pub cadence_ms: u64,

    /// Hard timeout on one decision-oracle call. On expiry the in-flight
    /// request is abandoned and the cycle fails; the next periodic
    /// trigger is the retry.
    pub oracle_timeout_ms: u64,

    // =========================
    // Gating and validation
    // =========================
    pub gate: WindowGateConfig,
    pub validation: ValidationConfig,
    pub threshold: ThresholdConfig,
}

impl CollectorConfig {
    pub fn from_env(instrument: impl Into<String>) -> Self {
        let database_url = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://riptide_dev.db".to_string());

        Self {
            instrument: instrument.into(),
            database_url,

            // Cycle defaults: 5-minute cadence, 120s oracle ceiling.
            cadence_ms: 300_000,
            oracle_timeout_ms: 120_000,

            gate: WindowGateConfig::default(),
            validation: ValidationConfig::default(),
            threshold: ThresholdConfig::default(),
        }
    }
}

//! Dynamic whale threshold.
//!
//! "Large" is relative: in a quiet market a smaller notional already
//! stands out, in a volatile one the bar rises. The scaling rule keys
//! off the 1-hour window's volatility percent (the ATR proxy computed by
//! the aggregator).

/// Breakpoints and multipliers for threshold scaling.
///
/// The defaults are the reference values; hosts may override them
/// without touching the scaling rule itself.
#[derive(Clone, Copy, Debug, serde::Serialize)]
pub struct ThresholdConfig {
    /// Static base threshold in USD.
    pub base_usd: f64,
    /// Below this volatility percent the market counts as quiet.
    pub quiet_vol_pct: f64,
    /// Above this volatility percent the market counts as volatile.
    pub volatile_vol_pct: f64,
    pub quiet_multiplier: f64,
    pub volatile_multiplier: f64,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            base_usd: 50_000.0,
            quiet_vol_pct: 0.5,
            volatile_vol_pct: 1.5,
            quiet_multiplier: 0.6,
            volatile_multiplier: 2.0,
        }
    }
}

/// Effective whale threshold for the given realized volatility.
///
/// Pure and total: every real input (zero, negative, NaN) yields a
/// strictly positive multiple of the base. NaN fails both comparisons
/// and falls through to the unchanged base.
pub fn effective_whale_threshold(cfg: &ThresholdConfig, volatility_pct: f64) -> f64 {
    if volatility_pct < cfg.quiet_vol_pct {
        cfg.base_usd * cfg.quiet_multiplier
    } else if volatility_pct > cfg.volatile_vol_pct {
        cfg.base_usd * cfg.volatile_multiplier
    } else {
        cfg.base_usd
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> ThresholdConfig {
        ThresholdConfig::default()
    }

    #[test]
    fn quiet_market_lowers_the_bar() {
        assert_eq!(effective_whale_threshold(&cfg(), 0.3), 30_000.0);
    }

    #[test]
    fn volatile_market_raises_the_bar() {
        assert_eq!(effective_whale_threshold(&cfg(), 2.0), 100_000.0);
    }

    #[test]
    fn normal_band_keeps_the_base() {
        assert_eq!(effective_whale_threshold(&cfg(), 0.5), 50_000.0);
        assert_eq!(effective_whale_threshold(&cfg(), 1.0), 50_000.0);
        assert_eq!(effective_whale_threshold(&cfg(), 1.5), 50_000.0);
    }

    #[test]
    fn monotonic_across_the_breakpoints() {
        let low = effective_whale_threshold(&cfg(), 0.2);
        let mid = effective_whale_threshold(&cfg(), 1.0);
        let high = effective_whale_threshold(&cfg(), 3.0);

        assert!(low <= mid);
        assert!(mid <= high);
        assert_eq!(low, 50_000.0 * 0.6);
        assert_eq!(high, 50_000.0 * 2.0);
    }

    #[test]
    fn total_for_degenerate_inputs() {
        assert_eq!(effective_whale_threshold(&cfg(), 0.0), 30_000.0);
        assert_eq!(effective_whale_threshold(&cfg(), -1.0), 30_000.0);
        // NaN compares false both ways -> unchanged base.
        assert_eq!(effective_whale_threshold(&cfg(), f64::NAN), 50_000.0);
        assert!(effective_whale_threshold(&cfg(), f64::INFINITY) > 0.0);
    }
}

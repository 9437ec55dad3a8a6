//! Bitrate budgeting for playback capture.

use mediashrink_common::config::VideoDefaults;
use mediashrink_media_model::CompressionTarget;
use serde::{Deserialize, Serialize};

/// Durations shorter than this are treated as degenerate and get the floor.
pub const MIN_MEASURABLE_DURATION_SECS: f64 = 1e-3;

/// Where a bitrate came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BudgetBasis {
    /// Derived from target and duration.
    Duration,
    /// Derived value was below the floor.
    Floor,
    /// Duration unknown; fixed fallback used.
    Fallback,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BitrateBudget {
    pub bits_per_second: u64,
    pub basis: BudgetBasis,
}

/// Bitrate that makes a capture of `duration_secs` land under `target`.
///
/// `floor(bytes * 8 / duration * safety_factor)`, never below the configured
/// minimum. A missing, non-finite, or non-positive duration means metadata
/// has not loaded yet and yields the fallback bitrate.
pub fn budget_bitrate(
    target: CompressionTarget,
    duration_secs: Option<f64>,
    cfg: &VideoDefaults,
) -> BitrateBudget {
    let Some(duration) = duration_secs.filter(|d| d.is_finite() && *d > 0.0) else {
        tracing::warn!(
            fallback = cfg.fallback_bitrate_bps,
            "Duration unknown; using fallback bitrate"
        );
        return BitrateBudget {
            bits_per_second: cfg.fallback_bitrate_bps,
            basis: BudgetBasis::Fallback,
        };
    };

    if duration < MIN_MEASURABLE_DURATION_SECS {
        return BitrateBudget {
            bits_per_second: cfg.min_bitrate_bps,
            basis: BudgetBasis::Floor,
        };
    }

    let raw = (target.bytes() as f64 * 8.0 / duration * cfg.safety_factor).floor();
    // `as` saturates, so absurd targets clamp to u64::MAX instead of wrapping.
    let derived = raw as u64;
    if derived < cfg.min_bitrate_bps {
        BitrateBudget {
            bits_per_second: cfg.min_bitrate_bps,
            basis: BudgetBasis::Floor,
        }
    } else {
        BitrateBudget {
            bits_per_second: derived,
            basis: BudgetBasis::Duration,
        }
    }
}

/// Size a capture at `bits_per_second` should produce over `duration_secs`.
pub fn expected_output_bytes(bits_per_second: u64, duration_secs: f64) -> u64 {
    (bits_per_second as f64 * duration_secs.max(0.0) / 8.0).floor() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn mb(n: u64) -> CompressionTarget {
        CompressionTarget::new(n * 1024 * 1024).unwrap()
    }

    #[test]
    fn four_mb_over_ten_seconds() {
        let budget = budget_bitrate(mb(4), Some(10.0), &VideoDefaults::default());
        // 4 * 1024 * 1024 * 8 / 10 * 0.7
        assert_eq!(budget.bits_per_second, 2_348_810);
        assert_eq!(budget.basis, BudgetBasis::Duration);
    }

    #[test]
    fn unknown_duration_uses_fallback() {
        let cfg = VideoDefaults::default();
        for duration in [None, Some(f64::NAN), Some(f64::INFINITY), Some(0.0), Some(-3.0)] {
            let budget = budget_bitrate(mb(4), duration, &cfg);
            assert_eq!(budget.bits_per_second, 2_500_000);
            assert_eq!(budget.basis, BudgetBasis::Fallback);
        }
    }

    #[test]
    fn near_zero_duration_returns_floor() {
        let budget = budget_bitrate(mb(4), Some(1e-9), &VideoDefaults::default());
        assert_eq!(budget.bits_per_second, 100_000);
        assert_eq!(budget.basis, BudgetBasis::Floor);
    }

    #[test]
    fn long_media_hits_floor() {
        // 1 MB over 10 hours is far below 100 kbps.
        let budget = budget_bitrate(mb(1), Some(36_000.0), &VideoDefaults::default());
        assert_eq!(budget.bits_per_second, 100_000);
        assert_eq!(budget.basis, BudgetBasis::Floor);
    }

    #[test]
    fn fifteen_second_capture_stays_under_target() {
        let budget = budget_bitrate(mb(4), Some(15.0), &VideoDefaults::default());
        let bytes = expected_output_bytes(budget.bits_per_second, 15.0);
        assert!(bytes < 4 * 1024 * 1024);
    }

    proptest! {
        #[test]
        fn bitrate_never_below_floor(
            bytes in 1u64..=(1u64 << 40),
            duration in 0.0001f64..100_000.0,
        ) {
            let cfg = VideoDefaults::default();
            let budget = budget_bitrate(CompressionTarget::new(bytes).unwrap(), Some(duration), &cfg);
            prop_assert!(budget.bits_per_second >= cfg.min_bitrate_bps);
        }
    }
}

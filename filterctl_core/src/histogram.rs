//! Per-frame pixel-count histograms and the threshold evaluator.

use serde::{Deserialize, Serialize};

/// Histogram bins the evaluator can trigger on, in precedence order.
///
/// The high bins trigger when the count is *above* the threshold (too many
/// bright pixels, attenuate more); the low bins trigger when the count is
/// *below* it (too few counts, attenuate less). The catastrophic `high3`
/// bin never reaches the evaluator; it is checked by [`catastrophic`] and
/// closes the shutter instead of adjusting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bin {
    High2,
    High1,
    Low2,
    Low1,
}

impl Bin {
    pub fn as_str(&self) -> &'static str {
        match self {
            Bin::High2 => "high2",
            Bin::High1 => "high1",
            Bin::Low2 => "low2",
            Bin::Low1 => "low1",
        }
    }

    /// Signed level delta applied when this bin triggers.
    pub fn adjustment(&self) -> i32 {
        match self {
            Bin::High2 => 2,
            Bin::High1 => 1,
            Bin::Low2 => -2,
            Bin::Low1 => -1,
        }
    }
}

/// Pixel counts for one frame. All five bins are required; extra keys in the
/// source object are ignored.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct Histogram {
    pub low1: u64,
    pub low2: u64,
    pub high1: u64,
    pub high2: u64,
    pub high3: u64,
}

/// One pixel-count threshold per bin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ThresholdSet {
    pub low1: u64,
    pub low2: u64,
    pub high1: u64,
    pub high2: u64,
    pub high3: u64,
}

impl Default for ThresholdSet {
    fn default() -> Self {
        Self {
            low1: 2,
            low2: 2,
            high1: 2,
            high2: 2,
            high3: 2,
        }
    }
}

/// Inbound data message: a frame number plus its histogram.
#[derive(Debug, Clone, Deserialize)]
pub struct DataMessage {
    pub frame_number: i64,
    pub parameters: Histogram,
}

/// Whether the catastrophic bin exceeded its threshold. Checked before the
/// frame-skip gate and never suppressed by it.
#[inline]
pub fn catastrophic(histogram: &Histogram, thresholds: &ThresholdSet) -> bool {
    histogram.high3 > thresholds.high3
}

/// Pick at most one triggered bin, in strict precedence order. The
/// comparisons are strict: `>` for the high bins, `<` for the low bins.
pub fn evaluate(histogram: &Histogram, thresholds: &ThresholdSet) -> Option<(Bin, i32)> {
    let triggered = if histogram.high2 > thresholds.high2 {
        Bin::High2
    } else if histogram.high1 > thresholds.high1 {
        Bin::High1
    } else if histogram.low2 < thresholds.low2 {
        Bin::Low2
    } else if histogram.low1 < thresholds.low1 {
        Bin::Low1
    } else {
        return None;
    };
    Some((triggered, triggered.adjustment()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn histogram(low1: u64, low2: u64, high1: u64, high2: u64, high3: u64) -> Histogram {
        Histogram {
            low1,
            low2,
            high1,
            high2,
            high3,
        }
    }

    #[test]
    fn thresholds_are_strict() {
        let t = ThresholdSet::default();
        // Equal to the threshold is not a trigger on either side.
        assert_eq!(evaluate(&histogram(2, 2, 2, 2, 0), &t), None);
        assert!(!catastrophic(&histogram(2, 2, 2, 2, 2), &t));
        assert!(catastrophic(&histogram(2, 2, 2, 2, 3), &t));
    }

    #[test]
    fn high2_takes_precedence_over_high1() {
        let t = ThresholdSet::default();
        assert_eq!(
            evaluate(&histogram(9, 9, 9, 9, 0), &t),
            Some((Bin::High2, 2))
        );
    }

    #[test]
    fn low_bins_trigger_below_threshold() {
        let t = ThresholdSet::default();
        assert_eq!(
            evaluate(&histogram(0, 0, 9, 0, 0), &t),
            Some((Bin::High1, 1))
        );
        assert_eq!(evaluate(&histogram(0, 0, 2, 2, 0), &t), Some((Bin::Low2, -2)));
        assert_eq!(evaluate(&histogram(0, 9, 2, 2, 0), &t), Some((Bin::Low1, -1)));
        assert_eq!(evaluate(&histogram(9, 9, 2, 2, 0), &t), None);
    }
}

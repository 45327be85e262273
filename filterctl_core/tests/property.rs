//! Invariant properties over randomized inputs.

use std::sync::Arc;

use proptest::prelude::*;

use filterctl_core::mocks::{MockMotionController, TestClock, VecEventSink};
use filterctl_core::{
    attenuation::clamp_level, histogram, ControlMode, Demand, FilterController, Histogram,
    ThresholdSet, MAX_ATTENUATION,
};

proptest! {
    #[test]
    fn demand_roundtrips_through_clamping(level in i32::MIN..i32::MAX) {
        let demand = Demand::from_level(level);
        prop_assert_eq!(demand.level(), clamp_level(level));
        prop_assert!((0..=MAX_ATTENUATION).contains(&demand.level()));
    }

    #[test]
    fn evaluator_picks_at_most_one_bin_in_precedence_order(
        low1 in 0u64..6,
        low2 in 0u64..6,
        high1 in 0u64..6,
        high2 in 0u64..6,
        threshold in 0u64..6,
    ) {
        let histogram = Histogram { low1, low2, high1, high2, high3: 0 };
        let thresholds = ThresholdSet {
            low1: threshold,
            low2: threshold,
            high1: threshold,
            high2: threshold,
            high3: threshold,
        };
        let expected = if high2 > threshold {
            Some(2)
        } else if high1 > threshold {
            Some(1)
        } else if low2 < threshold {
            Some(-2)
        } else if low1 < threshold {
            Some(-1)
        } else {
            None
        };
        prop_assert_eq!(
            histogram::evaluate(&histogram, &thresholds).map(|(_, delta)| delta),
            expected
        );
    }

    #[test]
    fn attenuation_stays_in_range_and_cursors_stay_ordered(
        counts in prop::collection::vec((0u64..6, 0u64..6, 0u64..6, 0u64..6), 1..40)
    ) {
        let motion = MockMotionController::new();
        let clock = Arc::new(TestClock::new());
        let controller = FilterController::builder()
            .with_motion(motion)
            .with_clock(clock)
            .with_mode(ControlMode::Continuous)
            .with_timeout(3600.0)
            .build()
            .expect("build controller");
        let mut events = VecEventSink::new();
        controller.tick();

        let mut processed = Vec::new();
        for (n, (low1, low2, high1, high2)) in counts.iter().enumerate() {
            let frame = n as i64;
            let payload = format!(
                r#"{{"frame_number":{frame},"parameters":{{"low1":{low1},"low2":{low2},"high1":{high1},"high2":{high2},"high3":0}}}}"#
            );
            let before = controller.last_processed_frame();
            controller.process_message(payload.as_bytes(), &mut events);
            controller.tick();

            let attenuation = controller.attenuation();
            prop_assert!((0..=MAX_ATTENUATION).contains(&attenuation));
            prop_assert!(controller.last_processed_frame() <= controller.last_received_frame());
            if controller.last_processed_frame() != before {
                processed.push(frame);
            }
        }

        // Consecutive processed frames are always at least two apart.
        for pair in processed.windows(2) {
            prop_assert!(pair[1] >= pair[0] + 2, "processed {} then {}", pair[0], pair[1]);
        }

        // Every accepted frame produced exactly one event, in order.
        let events = events.events();
        prop_assert_eq!(events.len(), counts.len());
        for (n, event) in events.iter().enumerate() {
            prop_assert_eq!(event.frame_number, n as i64);
            prop_assert!((0..=MAX_ATTENUATION).contains(&event.attenuation));
        }
    }
}

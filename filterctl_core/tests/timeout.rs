//! Data-starvation timeout behavior, driven by the test clock.

use std::sync::Arc;
use std::time::Duration;

use filterctl_core::mocks::{MockMotionController, TestClock, VecEventSink};
use filterctl_core::{ControlMode, ControlState, FilterController, MAX_ATTENUATION};

fn controller(
    timeout: f64,
) -> (
    FilterController<MockMotionController>,
    MockMotionController,
    Arc<TestClock>,
) {
    let motion = MockMotionController::new();
    let clock = Arc::new(TestClock::new());
    let controller = FilterController::builder()
        .with_motion(motion.clone())
        .with_clock(clock.clone())
        .with_mode(ControlMode::Continuous)
        .with_timeout(timeout)
        .build()
        .expect("build controller");
    (controller, motion, clock)
}

fn starved_frame(n: i64) -> Vec<u8> {
    format!(
        r#"{{"frame_number":{n},"parameters":{{"low1":0,"low2":0,"high1":0,"high2":0,"high3":0}}}}"#
    )
    .into_bytes()
}

#[test]
fn starvation_in_active_trips_timeout_and_demands_max() {
    let (controller, motion, clock) = controller(1.0);
    let mut events = VecEventSink::new();
    controller.tick();
    controller.process_message(&starved_frame(0), &mut events);
    assert_eq!(controller.state(), ControlState::Active);
    assert_eq!(controller.attenuation(), 13);
    motion.clear();

    // Not starved yet.
    clock.advance(Duration::from_millis(900));
    controller.tick();
    assert_eq!(controller.state(), ControlState::Active);
    assert!(motion.log().executions.is_empty());

    clock.advance(Duration::from_millis(100));
    controller.tick();
    assert_eq!(controller.state(), ControlState::Timeout);
    assert_eq!(controller.attenuation(), MAX_ATTENUATION);
    assert_eq!(motion.log().executions, vec!["filter_move".to_string()]);

    // Stays in TIMEOUT without further motion until cleared.
    clock.advance(Duration::from_secs(5));
    controller.tick();
    assert_eq!(controller.state(), ControlState::Timeout);
    assert_eq!(motion.log().executions.len(), 1);

    assert!(controller.handle_request(br#"{"command":"clear_error"}"#).success);
    controller.tick();
    assert_eq!(controller.state(), ControlState::Waiting);
}

#[test]
fn waiting_never_times_out() {
    let (controller, _motion, clock) = controller(1.0);
    controller.tick();
    assert_eq!(controller.state(), ControlState::Waiting);
    clock.advance(Duration::from_secs(60));
    controller.tick();
    assert_eq!(controller.state(), ControlState::Waiting);
}

#[test]
fn a_fresh_message_rearms_the_timeout_window() {
    let (controller, _motion, clock) = controller(1.0);
    let mut events = VecEventSink::new();
    controller.tick();
    controller.process_message(&starved_frame(0), &mut events);

    for n in 1..5 {
        clock.advance(Duration::from_millis(800));
        controller.process_message(&starved_frame(n * 2), &mut events);
        controller.tick();
        assert_eq!(controller.state(), ControlState::Active);
    }
}

#[test]
fn configured_timeout_is_reported_and_honored() {
    let (controller, _motion, clock) = controller(3.0);
    let mut events = VecEventSink::new();
    assert!(
        controller
            .handle_request(br#"{"command":"configure","params":{"timeout":0.5}}"#)
            .success
    );
    let status = controller
        .handle_request(br#"{"command":"status"}"#)
        .status
        .expect("status attached");
    assert_eq!(status.timeout, 0.5);

    controller.tick();
    controller.process_message(&starved_frame(0), &mut events);

    // Elapsed time is floored to whole seconds before the comparison, so a
    // fractional timeout only trips once a full second has gone by.
    clock.advance(Duration::from_millis(500));
    controller.tick();
    assert_eq!(controller.state(), ControlState::Active);

    clock.advance(Duration::from_millis(500));
    controller.tick();
    assert_eq!(controller.state(), ControlState::Timeout);
}

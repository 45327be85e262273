#![cfg(not(feature = "hardware"))]

use filterctl_hardware::DryRunMotionController;
use filterctl_traits::MotionController;

#[test]
fn records_the_last_value_written_to_each_slot() {
    let mut motion = DryRunMotionController::new();
    motion.set_position(4071, 100).expect("set position");
    motion.set_position(4071, 250).expect("set position");
    motion.set_position(4081, -4).expect("set position");

    assert_eq!(motion.position(4071), Some(250));
    assert_eq!(motion.position(4081), Some(-4));
    assert_eq!(motion.position(4072), None);
}

#[test]
fn counts_program_executions() {
    let mut motion = DryRunMotionController::new();
    assert_eq!(motion.executions(), 0);
    motion.execute("filter_move").expect("execute");
    motion.execute("close_shutter").expect("execute");
    assert_eq!(motion.executions(), 2);
}

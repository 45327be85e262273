//! The two cooperating loops: the control (request/reply) loop and the data
//! (subscribe/process/publish) loop.
//!
//! The control loop runs on the caller's thread; the data loop runs on a
//! spawned thread. Both observe the controller's shutdown flag, which is the
//! only shutdown path. When the control loop exits, the data thread is
//! joined before returning.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use eyre::{eyre, WrapErr};
use filterctl_traits::{ControlChannel, DataChannel, EventSink, MotionController};

use crate::engine::FilterController;
use crate::error::Result;

/// Bound on the data-loop transport poll; the loop re-runs the state machine
/// at least this often even with no traffic.
pub const POLL_TIMEOUT: Duration = Duration::from_millis(100);

/// Run both loops to completion. Returns once a shutdown request has been
/// served and the data thread has been joined.
pub fn run<M, C, D, E>(
    controller: Arc<FilterController<M>>,
    control: C,
    data: D,
    events: E,
) -> Result<()>
where
    M: MotionController + Send + 'static,
    C: ControlChannel,
    D: DataChannel + Send + 'static,
    E: EventSink + Send + 'static,
{
    let data_controller = Arc::clone(&controller);
    let data_thread = thread::Builder::new()
        .name("filterctl-data".to_string())
        .spawn(move || run_data_loop(data_controller, data, events))
        .wrap_err("spawn data thread")?;

    let served = run_control_loop(&controller, control);

    // Make sure the data thread exits even if the control loop failed.
    controller.request_shutdown();
    data_thread
        .join()
        .map_err(|_| eyre!("data thread panicked"))?;

    served
}

/// Serve the strict request/reply loop until shutdown.
pub fn run_control_loop<M, C>(controller: &FilterController<M>, mut channel: C) -> Result<()>
where
    M: MotionController,
    C: ControlChannel,
{
    while !controller.shutdown_requested() {
        let raw = channel
            .recv()
            .map_err(|e| eyre!(e))
            .wrap_err("control receive")?;
        let response = controller.handle_request(&raw);
        let reply = serde_json::to_string(&response).wrap_err("encode control reply")?;
        channel
            .send(&reply)
            .map_err(|e| eyre!(e))
            .wrap_err("control send")?;
    }
    tracing::info!("control loop stopped");
    Ok(())
}

/// Poll all data endpoints, run the state machine and feed the pipeline
/// until shutdown. Transport errors are logged and the loop carries on.
pub fn run_data_loop<M, D, E>(controller: Arc<FilterController<M>>, mut data: D, mut events: E)
where
    M: MotionController,
    D: DataChannel,
    E: EventSink,
{
    tracing::info!(endpoints = data.endpoints(), "data loop started");
    while !controller.shutdown_requested() {
        controller.tick();
        let ready = match data.poll(POLL_TIMEOUT) {
            Ok(ready) => ready,
            Err(error) => {
                tracing::warn!(%error, "data poll failed");
                thread::sleep(POLL_TIMEOUT);
                continue;
            }
        };
        for index in ready {
            match data.recv(index) {
                Ok(Some(payload)) => controller.process_message(&payload, &mut events),
                Ok(None) => {}
                Err(error) => tracing::warn!(index, %error, "data receive failed"),
            }
        }
    }
    tracing::info!("data loop stopped");
}

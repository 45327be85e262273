//! Test and helper mocks for filterctl_core.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use filterctl_traits::{BoxError, Clock, ControlChannel, DataChannel, EventSink};

use crate::events::FrameEvent;

/// Recorded activity of a [`MockMotionController`].
#[derive(Debug, Default, Clone)]
pub struct MotionLog {
    /// Every `set_position` call, in order.
    pub writes: Vec<(u16, i32)>,
    /// Every `execute` call, in order.
    pub executions: Vec<String>,
}

/// Motion controller that records all commands. Clones share the log, so a
/// test can keep a handle while the engine owns the controller.
#[derive(Debug, Default, Clone)]
pub struct MockMotionController {
    log: Arc<Mutex<MotionLog>>,
}

impl MockMotionController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn log(&self) -> MotionLog {
        self.log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn clear(&self) {
        let mut log = self.log.lock().unwrap_or_else(PoisonError::into_inner);
        log.writes.clear();
        log.executions.clear();
    }
}

impl filterctl_traits::MotionController for MockMotionController {
    fn set_position(&mut self, slot: u16, value: i32) -> Result<(), BoxError> {
        self.log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .writes
            .push((slot, value));
        Ok(())
    }

    fn execute(&mut self, program: &str) -> Result<(), BoxError> {
        self.log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .executions
            .push(program.to_string());
        Ok(())
    }
}

/// Event sink that collects published payloads in memory. Clones share the
/// storage, so a test can keep a handle while a loop owns the sink.
#[derive(Debug, Default, Clone)]
pub struct VecEventSink {
    payloads: Arc<Mutex<Vec<Vec<u8>>>>,
}

impl VecEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn payloads(&self) -> Vec<Vec<u8>> {
        self.payloads
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Decode all collected payloads as frame events.
    pub fn events(&self) -> Vec<FrameEvent> {
        self.payloads()
            .iter()
            .filter_map(|p| serde_json::from_slice(p).ok())
            .collect()
    }
}

impl EventSink for VecEventSink {
    fn publish(&mut self, payload: &[u8]) -> Result<(), BoxError> {
        self.payloads
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(payload.to_vec());
        Ok(())
    }
}

/// Control channel that replays a fixed request script. `recv` fails once
/// the script is exhausted, so scripts normally end with a shutdown request.
/// Clones share both the script and the recorded replies.
#[derive(Debug, Default, Clone)]
pub struct ScriptedControlChannel {
    requests: Arc<Mutex<VecDeque<Vec<u8>>>>,
    replies: Arc<Mutex<Vec<String>>>,
}

impl ScriptedControlChannel {
    pub fn new<I, P>(requests: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<Vec<u8>>,
    {
        Self {
            requests: Arc::new(Mutex::new(requests.into_iter().map(Into::into).collect())),
            replies: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn replies(&self) -> Vec<String> {
        self.replies
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl ControlChannel for ScriptedControlChannel {
    fn recv(&mut self) -> Result<Vec<u8>, BoxError> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .ok_or_else(|| "request script exhausted".into())
    }

    fn send(&mut self, reply: &str) -> Result<(), BoxError> {
        self.replies
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(reply.to_string());
        Ok(())
    }
}

/// In-memory data channel: one message queue per endpoint, shared with the
/// test through clones.
#[derive(Debug, Default, Clone)]
pub struct QueueDataChannel {
    queues: Arc<Mutex<Vec<VecDeque<Vec<u8>>>>>,
}

impl QueueDataChannel {
    pub fn new(endpoints: usize) -> Self {
        Self {
            queues: Arc::new(Mutex::new(vec![VecDeque::new(); endpoints])),
        }
    }

    pub fn push(&self, endpoint: usize, payload: impl Into<Vec<u8>>) {
        let mut queues = self.queues.lock().unwrap_or_else(PoisonError::into_inner);
        queues[endpoint].push_back(payload.into());
    }
}

impl DataChannel for QueueDataChannel {
    fn endpoints(&self) -> usize {
        self.queues
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn poll(&mut self, timeout: Duration) -> Result<Vec<usize>, BoxError> {
        let ready: Vec<usize> = {
            let queues = self.queues.lock().unwrap_or_else(PoisonError::into_inner);
            queues
                .iter()
                .enumerate()
                .filter(|(_, q)| !q.is_empty())
                .map(|(i, _)| i)
                .collect()
        };
        if ready.is_empty() {
            // Keep test loops from spinning; a fraction of the real timeout
            // is plenty.
            std::thread::sleep(timeout.min(Duration::from_millis(1)));
        }
        Ok(ready)
    }

    fn recv(&mut self, index: usize) -> Result<Option<Vec<u8>>, BoxError> {
        let mut queues = self.queues.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(queues.get_mut(index).and_then(VecDeque::pop_front))
    }
}

/// Deterministic test clock whose time is advanced manually.
///
/// now() = origin + offset; sleep(d) advances internal time by d without
/// actually sleeping.
#[derive(Debug, Clone)]
pub struct TestClock {
    origin: Instant,
    offset: Arc<Mutex<Duration>>,
}

impl Default for TestClock {
    fn default() -> Self {
        Self::new()
    }
}

impl TestClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            offset: Arc::new(Mutex::new(Duration::ZERO)),
        }
    }

    /// Advance the clock by the given duration.
    pub fn advance(&self, d: Duration) {
        if let Ok(mut offset) = self.offset.lock() {
            *offset = offset.saturating_add(d);
        }
    }
}

impl Clock for TestClock {
    fn now(&self) -> Instant {
        let offset = self.offset.lock().map(|g| *g).unwrap_or(Duration::ZERO);
        self.origin + offset
    }

    fn sleep(&self, d: Duration) {
        self.advance(d);
    }
}

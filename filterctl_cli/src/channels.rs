//! ZeroMQ implementations of the transport traits.
//!
//! One shared context; reply and publish sockets bind on all interfaces,
//! subscribe sockets connect to each data endpoint with no topic filter and
//! CONFLATE enabled, so only the newest pending message is ever delivered.

use std::time::Duration;

use eyre::{Result, WrapErr};
use filterctl_config::Endpoint;
use filterctl_traits::{BoxError, ControlChannel, DataChannel, EventSink};

pub struct ZmqControlChannel {
    socket: zmq::Socket,
}

impl ZmqControlChannel {
    pub fn bind(context: &zmq::Context, port: u16) -> Result<Self> {
        let socket = context.socket(zmq::REP).wrap_err("create reply socket")?;
        socket.set_linger(0).wrap_err("set linger")?;
        let address = format!("tcp://*:{port}");
        socket
            .bind(&address)
            .wrap_err_with(|| format!("bind control socket on {address}"))?;
        tracing::info!(%address, "control socket bound");
        Ok(Self { socket })
    }
}

impl ControlChannel for ZmqControlChannel {
    fn recv(&mut self) -> Result<Vec<u8>, BoxError> {
        let payload = self.socket.recv_bytes(0)?;
        Ok(payload)
    }

    fn send(&mut self, reply: &str) -> Result<(), BoxError> {
        self.socket.send(reply, 0)?;
        Ok(())
    }
}

pub struct ZmqDataChannel {
    sockets: Vec<zmq::Socket>,
}

impl ZmqDataChannel {
    pub fn connect(context: &zmq::Context, endpoints: &[Endpoint]) -> Result<Self> {
        let mut sockets = Vec::with_capacity(endpoints.len());
        for endpoint in endpoints {
            let socket = context
                .socket(zmq::SUB)
                .wrap_err("create subscribe socket")?;
            socket.set_linger(0).wrap_err("set linger")?;
            // No topic filter; conflate keeps only the latest message.
            socket.set_subscribe(b"").wrap_err("set subscription")?;
            socket.set_conflate(true).wrap_err("set conflate")?;
            let address = format!("tcp://{endpoint}");
            socket
                .connect(&address)
                .wrap_err_with(|| format!("connect data socket to {address}"))?;
            tracing::info!(%address, "data endpoint connected");
            sockets.push(socket);
        }
        Ok(Self { sockets })
    }
}

impl DataChannel for ZmqDataChannel {
    fn endpoints(&self) -> usize {
        self.sockets.len()
    }

    fn poll(&mut self, timeout: Duration) -> Result<Vec<usize>, BoxError> {
        let mut items: Vec<zmq::PollItem<'_>> = self
            .sockets
            .iter()
            .map(|s| s.as_poll_item(zmq::POLLIN))
            .collect();
        zmq::poll(&mut items, timeout.as_millis() as i64)?;
        Ok(items
            .iter()
            .enumerate()
            .filter(|(_, item)| item.is_readable())
            .map(|(index, _)| index)
            .collect())
    }

    fn recv(&mut self, index: usize) -> Result<Option<Vec<u8>>, BoxError> {
        let socket = self
            .sockets
            .get(index)
            .ok_or_else(|| BoxError::from(format!("no data endpoint {index}")))?;
        match socket.recv_bytes(zmq::DONTWAIT) {
            Ok(payload) => Ok(Some(payload)),
            Err(zmq::Error::EAGAIN) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

pub struct ZmqEventSink {
    socket: zmq::Socket,
}

impl ZmqEventSink {
    pub fn bind(context: &zmq::Context, port: u16) -> Result<Self> {
        let socket = context.socket(zmq::PUB).wrap_err("create publish socket")?;
        socket.set_linger(0).wrap_err("set linger")?;
        let address = format!("tcp://*:{port}");
        socket
            .bind(&address)
            .wrap_err_with(|| format!("bind publish socket on {address}"))?;
        tracing::info!(%address, "event socket bound");
        Ok(Self { socket })
    }
}

impl EventSink for ZmqEventSink {
    fn publish(&mut self, payload: &[u8]) -> Result<(), BoxError> {
        self.socket.send(payload, 0)?;
        Ok(())
    }
}

//! # Oracle Client
//!
//! Owns the TCP connection to the oracle for the whole run. The protocol is
//! strictly request-then-response: callers send one request and block on its
//! response before sending the next.

use std::collections::BTreeMap;
use std::net::{SocketAddr, TcpStream};
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, info, warn};

use super::channel::FramedChannel;
use super::message::{Request, Response};
use crate::error::{GeneticError, Result};

/// Client side of the oracle protocol.
#[derive(Debug)]
pub struct OracleClient {
    channel: Option<FramedChannel<TcpStream>>,
    local_addr: SocketAddr,
    peer_addr: Option<String>,
}

impl OracleClient {
    /// Connects to the oracle and performs the address handshake.
    ///
    /// `read_timeout` bounds every blocking receive; `None` waits forever.
    ///
    /// # Errors
    ///
    /// `Connection` if the TCP connection cannot be established. The handshake
    /// reply is informational, so an odd reply is only logged.
    pub fn connect(host: &str, port: u16, read_timeout: Option<Duration>) -> Result<Self> {
        info!(host, port, "connecting to oracle");
        let stream = TcpStream::connect((host, port))
            .map_err(|e| GeneticError::Connection(format!("{}:{}: {}", host, port, e)))?;
        Self::from_stream(stream, read_timeout)
    }

    /// Wraps an already connected stream and performs the handshake.
    pub fn from_stream(stream: TcpStream, read_timeout: Option<Duration>) -> Result<Self> {
        stream
            .set_read_timeout(read_timeout)
            .map_err(|e| GeneticError::Connection(e.to_string()))?;
        stream
            .set_nodelay(true)
            .map_err(|e| GeneticError::Connection(e.to_string()))?;
        let local_addr = stream
            .local_addr()
            .map_err(|e| GeneticError::Connection(e.to_string()))?;

        let mut client = Self {
            channel: Some(FramedChannel::new(stream)),
            local_addr,
            peer_addr: None,
        };
        client.handshake()?;
        Ok(client)
    }

    fn handshake(&mut self) -> Result<()> {
        self.send(&Request::Info(self.local_addr.to_string()))?;
        let reply = self.channel_mut()?.receive_value()?;

        match reply.get("data") {
            Some(Value::String(addr)) => self.peer_addr = Some(addr.clone()),
            Some(Value::Array(parts)) if parts.len() == 2 => {
                let host = match &parts[0] {
                    Value::String(host) => host.clone(),
                    other => other.to_string(),
                };
                self.peer_addr = Some(format!("{}:{}", host, parts[1]))
            }
            Some(other) => self.peer_addr = Some(other.to_string()),
            None => warn!(reply = %reply, "handshake reply carries no address"),
        }

        info!(
            local = %self.local_addr,
            peer = self.peer_addr.as_deref().unwrap_or("unknown"),
            "connected to oracle"
        );
        Ok(())
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Address the oracle reported during the handshake, if any.
    pub fn peer_addr(&self) -> Option<&str> {
        self.peer_addr.as_deref()
    }

    pub fn is_open(&self) -> bool {
        self.channel.is_some()
    }

    pub fn send(&mut self, request: &Request) -> Result<()> {
        debug!(kind = request.kind(), "sending request");
        self.channel_mut()?.send(request)
    }

    /// Blocks until one full response arrives.
    pub fn receive(&mut self) -> Result<Response> {
        let value = self.channel_mut()?.receive_value()?;
        let response = Response::from_value(value)?;
        debug!(kind = response.kind(), "received response");
        Ok(response)
    }

    /// Sends `request` and waits for its response.
    pub fn request(&mut self, request: &Request) -> Result<Response> {
        self.send(request)?;
        self.receive()
    }

    /// Sends `request` and waits for a response of the same kind.
    ///
    /// # Errors
    ///
    /// `Protocol` if the oracle answers with a different kind (an `error`
    /// response is passed through for the caller to report).
    pub fn request_expect(&mut self, request: &Request) -> Result<Response> {
        self.send(request)?;
        let value = self.channel_mut()?.receive_value()?;
        let response = Response::from_value_expecting(value, request.kind())?;
        debug!(kind = response.kind(), "received response");
        Ok(response)
    }

    /// Asks the oracle to load its simulator and returns the variables it supports.
    ///
    /// # Errors
    ///
    /// `Protocol` if the oracle answers with any other kind.
    pub fn load_simulator(&mut self, population_size: usize) -> Result<BTreeMap<String, Value>> {
        info!(population_size, "loading simulator");
        match self.request_expect(&Request::LoadSimulator(population_size))? {
            Response::LoadSimulator(variables) => Ok(variables),
            Response::Error(msg) => Err(GeneticError::Protocol(format!(
                "Oracle failed to load the simulator: {}",
                msg
            ))),
            other => Err(GeneticError::Protocol(format!(
                "Expected a 'loadSimulator' response, got '{}'",
                other.kind()
            ))),
        }
    }

    /// Sends the exit signal if the channel still works, then closes.
    ///
    /// A failure to send is logged and returned, but the client is closed either way.
    pub fn shutdown(&mut self) -> Result<()> {
        if !self.is_open() {
            return Ok(());
        }
        info!("ending connection with the oracle");
        let sent = self.send(&Request::exit());
        if let Err(e) = &sent {
            warn!(error = %e, "could not deliver the exit request");
        }
        self.close();
        sent
    }

    /// Releases the connection. Calling it again has no effect.
    pub fn close(&mut self) {
        if let Some(channel) = self.channel.take() {
            let _ = channel.into_inner().shutdown(std::net::Shutdown::Both);
            debug!("oracle connection closed");
        }
    }

    fn channel_mut(&mut self) -> Result<&mut FramedChannel<TcpStream>> {
        self.channel.as_mut().ok_or(GeneticError::ConnectionClosed)
    }
}

impl Drop for OracleClient {
    fn drop(&mut self) {
        self.close();
    }
}

//! # Oracle Server
//!
//! The oracle-facing end of the protocol. It accepts one optimizer connection,
//! answers the handshake, and forwards `loadSimulator` and `updateAndRun`
//! requests to a [`Simulator`] until the optimizer sends the exit signal.
//!
//! A simulator failure does not end the session: it is reported back as an
//! `error` response and the optimizer decides what to do.

use std::collections::BTreeMap;
use std::io::{Read, Write};
use std::net::{TcpListener, ToSocketAddrs};

use serde_json::Value;
use tracing::{debug, info, warn};

use super::channel::FramedChannel;
use super::message::{Record, Request, Response};
use crate::error::{GeneticError, Result};

/// Outcome of a simulator call; the error text is sent back to the optimizer.
pub type SimResult<T> = std::result::Result<T, String>;

/// The black box that turns designs into measurements.
pub trait Simulator {
    /// Prepares the simulator for batches of up to `population_size` designs and
    /// returns the variables it knows, mapped to their bounds or default values.
    fn load(&mut self, population_size: usize) -> SimResult<BTreeMap<String, Value>>;

    /// Simulates every design of the batch and returns one measurement record
    /// per design, in batch order.
    fn run(&mut self, batch: &[Record]) -> SimResult<Vec<Record>>;
}

/// Serves the oracle protocol on top of a [`Simulator`].
#[derive(Debug)]
pub struct OracleServer<Sim> {
    simulator: Sim,
    requests: usize,
}

impl<Sim: Simulator> OracleServer<Sim> {
    pub fn new(simulator: Sim) -> Self {
        Self {
            simulator,
            requests: 0,
        }
    }

    pub fn simulator(&self) -> &Sim {
        &self.simulator
    }

    pub fn into_simulator(self) -> Sim {
        self.simulator
    }

    /// Number of simulator requests handled so far.
    pub fn requests(&self) -> usize {
        self.requests
    }

    /// Binds `addr`, accepts a single connection and serves it to completion.
    pub fn listen_once<A: ToSocketAddrs>(&mut self, addr: A) -> Result<()> {
        let listener = TcpListener::bind(addr)?;
        self.accept_once(&listener)
    }

    /// Accepts a single connection on `listener` and serves it to completion.
    pub fn accept_once(&mut self, listener: &TcpListener) -> Result<()> {
        let (stream, peer) = listener.accept()?;
        info!(%peer, "optimizer connected");
        self.serve(stream, &peer.to_string())
    }

    /// Serves one session over `stream`. `peer` is echoed in the handshake reply.
    ///
    /// Returns `Ok(())` after the exit signal; a closed connection before that is
    /// reported as `ConnectionClosed`.
    pub fn serve<S: Read + Write>(&mut self, stream: S, peer: &str) -> Result<()> {
        let mut channel = FramedChannel::new(stream);

        match Request::from_value(channel.receive_value()?)? {
            Request::Info(client_addr) => {
                info!(client = %client_addr, "handshake received");
            }
            other => {
                return Err(GeneticError::Protocol(format!(
                    "Expected an 'info' handshake, got '{}'",
                    other.kind()
                )))
            }
        }
        channel.send(&Response::Info(Value::String(peer.to_string())))?;

        loop {
            let request = match Request::from_value(channel.receive_value()?) {
                Ok(request) => request,
                Err(e) => {
                    warn!(error = %e, "rejecting malformed request");
                    channel.send(&Response::Error(e.to_string()))?;
                    continue;
                }
            };

            let response = match request {
                ref r if r.is_exit() => {
                    info!(requests = self.requests, "optimizer ended the session");
                    return Ok(());
                }
                Request::Info(msg) => {
                    debug!(%msg, "info message");
                    continue;
                }
                Request::LoadSimulator(population_size) => {
                    self.requests += 1;
                    match self.simulator.load(population_size) {
                        Ok(variables) => Response::LoadSimulator(variables),
                        Err(msg) => Response::Error(msg),
                    }
                }
                Request::UpdateAndRun(batch) => {
                    self.requests += 1;
                    debug!(designs = batch.len(), "running batch");
                    match self.simulator.run(&batch) {
                        Ok(results) if results.len() == batch.len() => {
                            Response::UpdateAndRun(results)
                        }
                        Ok(results) => Response::Error(format!(
                            "Simulator returned {} results for {} designs",
                            results.len(),
                            batch.len()
                        )),
                        Err(msg) => Response::Error(msg),
                    }
                }
            };

            if let Response::Error(msg) = &response {
                warn!(%msg, "request failed");
            }
            channel.send(&response)?;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Cursor;

    struct Doubler;

    impl Simulator for Doubler {
        fn load(&mut self, _population_size: usize) -> SimResult<BTreeMap<String, Value>> {
            let mut vars = BTreeMap::new();
            vars.insert("x".to_string(), json!(1.0));
            Ok(vars)
        }

        fn run(&mut self, batch: &[Record]) -> SimResult<Vec<Record>> {
            batch
                .iter()
                .map(|r| -> SimResult<Record> {
                    let x = r.get("x").ok_or("missing x")?;
                    let mut out = Record::new();
                    out.insert("y".to_string(), 2.0 * x);
                    Ok(out)
                })
                .collect()
        }
    }

    /// Scripted input, captured output.
    struct Script {
        input: Cursor<Vec<u8>>,
        output: Vec<u8>,
    }

    impl Read for Script {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            self.input.read(buf)
        }
    }

    impl Write for Script {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.output.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn script(messages: &[Value]) -> Script {
        let mut input = Vec::new();
        for m in messages {
            let payload = serde_json::to_vec(m).unwrap();
            input.extend_from_slice(&(payload.len() as u32).to_be_bytes());
            input.extend_from_slice(&payload);
        }
        Script {
            input: Cursor::new(input),
            output: Vec::new(),
        }
    }

    fn replies(output: Vec<u8>) -> Vec<Response> {
        let mut channel = FramedChannel::new(Script {
            input: Cursor::new(output),
            output: Vec::new(),
        });
        let mut out = Vec::new();
        while let Ok(value) = channel.receive_value() {
            out.push(Response::from_value(value).unwrap());
        }
        out
    }

    #[test]
    fn test_full_session() {
        let mut stream = script(&[
            json!({"type": "info", "data": "127.0.0.1:5000"}),
            json!({"type": "loadSimulator", "data": 2}),
            json!({"type": "updateAndRun", "data": [{"x": 1.0}, {"x": 2.5}]}),
            json!({"type": "info", "data": "exit"}),
        ]);
        let mut server = OracleServer::new(Doubler);
        server.serve(&mut stream, "127.0.0.1:3000").unwrap();
        assert_eq!(server.requests(), 2);

        let responses = replies(stream.output);
        assert_eq!(responses.len(), 3);
        assert_eq!(responses[0], Response::Info(json!("127.0.0.1:3000")));
        assert_eq!(responses[1].kind(), "loadSimulator");
        match &responses[2] {
            Response::UpdateAndRun(results) => {
                assert_eq!(results[0]["y"], 2.0);
                assert_eq!(results[1]["y"], 5.0);
            }
            other => panic!("unexpected response {:?}", other),
        }
    }

    #[test]
    fn test_simulator_failure_becomes_error_response() {
        let mut stream = script(&[
            json!({"type": "info", "data": "peer"}),
            json!({"type": "updateAndRun", "data": [{"z": 1.0}]}),
            json!({"type": "info", "data": "exit"}),
        ]);
        let mut server = OracleServer::new(Doubler);
        server.serve(&mut stream, "me").unwrap();

        let responses = replies(stream.output);
        assert_eq!(responses[1], Response::Error("missing x".to_string()));
    }

    #[test]
    fn test_disconnect_without_exit() {
        let mut stream = script(&[json!({"type": "info", "data": "peer"})]);
        let mut server = OracleServer::new(Doubler);
        assert!(matches!(
            server.serve(&mut stream, "me"),
            Err(GeneticError::ConnectionClosed)
        ));
    }
}

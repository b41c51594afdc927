//! # Oracle
//!
//! The length-prefixed JSON protocol spoken with the external simulator
//! process, from both ends.

pub mod channel;
pub mod client;
pub mod message;
pub mod server;

pub use channel::FramedChannel;
pub use client::OracleClient;
pub use message::{Record, Request, Response};
pub use server::{OracleServer, SimResult, Simulator};

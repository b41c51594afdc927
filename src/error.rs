//! # Error Types
//!
//! This module defines the error type shared by the optimizer, the oracle
//! protocol and the checkpoint store. Every variant is fatal for a run: the
//! oracle round trip is expensive and stateful, so nothing here is retried.
//!
//! ## Examples
//!
//! Using the `Result` type:
//!
//! ```rust
//! use simloop::error::{GeneticError, Result};
//!
//! fn connect_somewhere() -> Result<()> {
//!     Err(GeneticError::Connection("refused".to_string()))
//! }
//!
//! match connect_somewhere() {
//!     Ok(_) => println!("connected"),
//!     Err(e) => assert_eq!(e.exit_code(), 3),
//! }
//! ```
//!
//! Using the `OptionExt` trait to convert `Option` to `Result`:
//!
//! ```rust
//! use simloop::error::{GeneticError, OptionExt};
//!
//! fn first_front(fronts: &[Vec<f64>]) -> simloop::error::Result<&Vec<f64>> {
//!     fronts.first().ok_or_else_genetic(|| GeneticError::EmptyPopulation)
//! }
//! ```

use std::error::Error as StdError;
use std::fmt;
use thiserror::Error;

/// Represents errors that can occur while optimizing against an oracle.
#[derive(Error, Debug)]
pub enum GeneticError {
    /// The initial connection to the oracle could not be established.
    #[error("Connection error: {0}")]
    Connection(String),

    /// The oracle closed the stream while a frame was being sent or received.
    #[error("Connection closed by peer")]
    ConnectionClosed,

    /// A request could not be serialized or a response could not be parsed.
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// The oracle answered with an unexpected kind or left out a required field.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// A constraint bound is malformed.
    #[error("Constraint specification error: {0}")]
    ConstraintSpec(String),

    /// No response arrived within the configured read timeout.
    #[error("Oracle did not respond within the read timeout")]
    OracleTimeout,

    /// A frame header announced a payload larger than the channel accepts.
    #[error("Frame of {0} bytes exceeds the maximum frame length of {1} bytes")]
    FrameTooLarge(usize, usize),

    /// A checkpoint could not be written, read or understood.
    #[error("Checkpoint error: {0}")]
    Checkpoint(String),

    /// Error that occurs when an evolution process fails.
    #[error("Evolution error: {0}")]
    Evolution(String),

    /// Error that occurs when an invalid configuration is provided.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Error that occurs when an empty population is encountered.
    #[error("Empty population error: Cannot operate on an empty population")]
    EmptyPopulation,

    /// Error that occurs when a fitness calculation fails.
    #[error("Fitness calculation error: {0}")]
    FitnessCalculation(String),

    /// Error that occurs when a gene is outside of its variable's bounds.
    #[error("Bounds error: {0}")]
    OutOfBounds(String),

    /// Error that occurs when an I/O operation fails.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A generic error with a custom message.
    #[error("{0}")]
    Other(String),
}

impl GeneticError {
    /// Returns the process exit code reported for this error.
    ///
    /// Each failure family maps to its own code so that a supervising script
    /// can tell a refused connection from a protocol mismatch.
    pub fn exit_code(&self) -> i32 {
        match self {
            GeneticError::Connection(_) => 3,
            GeneticError::Configuration(_)
            | GeneticError::ConstraintSpec(_)
            | GeneticError::OutOfBounds(_) => 4,
            GeneticError::Protocol(_)
            | GeneticError::Encoding(_)
            | GeneticError::FrameTooLarge(..) => 5,
            GeneticError::ConnectionClosed => 6,
            GeneticError::OracleTimeout => 7,
            GeneticError::Checkpoint(_) | GeneticError::Io(_) => 8,
            GeneticError::Evolution(_)
            | GeneticError::EmptyPopulation
            | GeneticError::FitnessCalculation(_)
            | GeneticError::Other(_) => 1,
        }
    }
}

impl From<serde_json::Error> for GeneticError {
    fn from(err: serde_json::Error) -> Self {
        GeneticError::Encoding(err.to_string())
    }
}

/// A specialized Result type for optimizer operations.
pub type Result<T> = std::result::Result<T, GeneticError>;

/// Extension trait for Result to add context to errors.
///
/// ## Examples
///
/// ```rust
/// use simloop::error::ResultExt;
/// use std::fs::File;
///
/// fn open_report(path: &str) -> simloop::error::Result<()> {
///     File::open(path).context("Failed to open report")?;
///     Ok(())
/// }
/// ```
pub trait ResultExt<T, E> {
    /// Converts the error into `GeneticError::Other`, prefixed with `context`.
    fn context<C>(self, context: C) -> Result<T>
    where
        C: fmt::Display + Send + Sync + 'static;
}

impl<T, E> ResultExt<T, E> for std::result::Result<T, E>
where
    E: StdError + Send + Sync + 'static,
{
    fn context<C>(self, context: C) -> Result<T>
    where
        C: fmt::Display + Send + Sync + 'static,
    {
        self.map_err(|e| GeneticError::Other(format!("{}: {}", context, e)))
    }
}

/// Extension trait for Option to convert to Result with a custom error.
pub trait OptionExt<T> {
    /// Converts an `Option<T>` to a `Result<T, GeneticError>` using `err_fn`.
    fn ok_or_else_genetic<F>(self, err_fn: F) -> Result<T>
    where
        F: FnOnce() -> GeneticError;
}

impl<T> OptionExt<T> for Option<T> {
    fn ok_or_else_genetic<F>(self, err_fn: F) -> Result<T>
    where
        F: FnOnce() -> GeneticError,
    {
        self.ok_or_else(err_fn)
    }
}

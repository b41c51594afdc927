//! # Oracle Messages
//!
//! Closed tagged unions for everything that travels over the oracle channel.
//! On the wire every message is a JSON object `{"type": <kind>, "data": <payload>}`.
//!
//! ```rust
//! use simloop::oracle::message::Request;
//!
//! let json = serde_json::to_string(&Request::LoadSimulator(8)).unwrap();
//! assert_eq!(json, r#"{"type":"loadSimulator","data":8}"#);
//! ```

use std::collections::BTreeMap;

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;

use crate::error::{GeneticError, Result};

/// `data` of the info request that ends a session.
pub const EXIT: &str = "exit";

/// One variable-name → value (or measurement-name → value) record.
pub type Record = BTreeMap<String, f64>;

/// Messages sent by the optimizer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum Request {
    /// Handshake (carrying the local address) or the `"exit"` shutdown signal.
    #[serde(rename = "info")]
    Info(String),
    /// Prepares the simulator; carries the population size as a parallelism hint.
    #[serde(rename = "loadSimulator")]
    LoadSimulator(usize),
    /// Evaluates one batch of designs, one record per individual.
    #[serde(rename = "updateAndRun")]
    UpdateAndRun(Vec<Record>),
}

impl Request {
    pub fn exit() -> Self {
        Request::Info(EXIT.to_string())
    }

    pub fn is_exit(&self) -> bool {
        matches!(self, Request::Info(data) if data == EXIT)
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Request::Info(_) => "info",
            Request::LoadSimulator(_) => "loadSimulator",
            Request::UpdateAndRun(_) => "updateAndRun",
        }
    }

    /// Parses a request received by the oracle side.
    pub fn from_value(value: Value) -> Result<Self> {
        let (kind, data) = split_envelope(value)?;
        match kind.as_str() {
            "info" => Ok(Request::Info(match data {
                Value::String(s) => s,
                other => other.to_string(),
            })),
            "loadSimulator" => Ok(Request::LoadSimulator(parse_data(data)?)),
            "updateAndRun" => Ok(Request::UpdateAndRun(parse_data(data)?)),
            other => Err(GeneticError::Protocol(format!(
                "Unknown request type '{}'",
                other
            ))),
        }
    }
}

/// Messages sent by the oracle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum Response {
    /// Handshake reply; the payload is only logged.
    #[serde(rename = "info")]
    Info(Value),
    /// Variables the simulator knows, mapped to their bounds or default values.
    #[serde(rename = "loadSimulator")]
    LoadSimulator(BTreeMap<String, Value>),
    /// Measurement records, in the same order as the request's records.
    #[serde(rename = "updateAndRun")]
    UpdateAndRun(Vec<Record>),
    /// The oracle failed to process the request.
    #[serde(rename = "error")]
    Error(String),
}

impl Response {
    pub fn kind(&self) -> &'static str {
        match self {
            Response::Info(_) => "info",
            Response::LoadSimulator(_) => "loadSimulator",
            Response::UpdateAndRun(_) => "updateAndRun",
            Response::Error(_) => "error",
        }
    }

    /// Parses a response received by the optimizer.
    ///
    /// # Errors
    ///
    /// `Protocol` if `type` or `data` is missing or the type is unknown,
    /// `Encoding` if `data` does not have the shape the type requires.
    pub fn from_value(value: Value) -> Result<Self> {
        let (kind, data) = split_envelope(value)?;
        Self::decode(kind, data)
    }

    /// Parses a response that must be of kind `expected` or an `error`.
    ///
    /// The kind is checked before `data` is decoded, so a reply of the wrong
    /// kind is always a `Protocol` error whatever its payload looks like.
    pub fn from_value_expecting(value: Value, expected: &str) -> Result<Self> {
        let (kind, data) = split_envelope(value)?;
        if kind != expected && kind != "error" {
            return Err(GeneticError::Protocol(format!(
                "Expected a '{}' response, got '{}'",
                expected, kind
            )));
        }
        Self::decode(kind, data)
    }

    fn decode(kind: String, data: Value) -> Result<Self> {
        match kind.as_str() {
            "info" => Ok(Response::Info(data)),
            "loadSimulator" => Ok(Response::LoadSimulator(parse_data(data)?)),
            "updateAndRun" => Ok(Response::UpdateAndRun(parse_data(data)?)),
            "error" => Ok(Response::Error(match data {
                Value::String(s) => s,
                other => other.to_string(),
            })),
            other => Err(GeneticError::Protocol(format!(
                "Unknown response type '{}'",
                other
            ))),
        }
    }
}

fn split_envelope(value: Value) -> Result<(String, Value)> {
    let mut object = match value {
        Value::Object(object) => object,
        other => {
            return Err(GeneticError::Protocol(format!(
                "Expected a message object, got {}",
                other
            )))
        }
    };

    let kind = match object.remove("type") {
        Some(Value::String(kind)) => kind,
        Some(other) => {
            return Err(GeneticError::Protocol(format!(
                "Message type must be a string, got {}",
                other
            )))
        }
        None => {
            return Err(GeneticError::Protocol(
                "Message is missing the 'type' field".to_string(),
            ))
        }
    };

    let data = object.remove("data").ok_or_else(|| {
        GeneticError::Protocol(format!("'{}' message is missing the 'data' field", kind))
    })?;

    Ok((kind, data))
}

fn parse_data<T: DeserializeOwned>(data: Value) -> Result<T> {
    Ok(serde_json::from_value(data)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_update_and_run_wire_shape() {
        let mut record = Record::new();
        record.insert("w".to_string(), 1.5);
        let json = serde_json::to_value(Request::UpdateAndRun(vec![record])).unwrap();
        assert_eq!(json, json!({"type": "updateAndRun", "data": [{"w": 1.5}]}));
    }

    #[test]
    fn test_exit_request() {
        let json = serde_json::to_value(Request::exit()).unwrap();
        assert_eq!(json, json!({"type": "info", "data": "exit"}));
        assert!(Request::from_value(json).unwrap().is_exit());
    }

    #[test]
    fn test_response_parsing() {
        let response = Response::from_value(json!({
            "type": "updateAndRun",
            "data": [{"gain": 40.0}, {"gain": 41.5}]
        }))
        .unwrap();
        match response {
            Response::UpdateAndRun(records) => {
                assert_eq!(records.len(), 2);
                assert_eq!(records[1]["gain"], 41.5);
            }
            other => panic!("unexpected response {:?}", other),
        }
    }

    #[test]
    fn test_missing_fields_are_protocol_errors() {
        assert!(matches!(
            Response::from_value(json!({"data": 1})),
            Err(GeneticError::Protocol(_))
        ));
        assert!(matches!(
            Response::from_value(json!({"type": "updateAndRun"})),
            Err(GeneticError::Protocol(_))
        ));
        assert!(matches!(
            Response::from_value(json!({"type": "bogus", "data": 1})),
            Err(GeneticError::Protocol(_))
        ));
        assert!(matches!(
            Response::from_value(json!([1, 2])),
            Err(GeneticError::Protocol(_))
        ));
    }

    #[test]
    fn test_wrong_data_shape_is_encoding_error() {
        assert!(matches!(
            Response::from_value(json!({"type": "updateAndRun", "data": "oops"})),
            Err(GeneticError::Encoding(_))
        ));
    }

    #[test]
    fn test_wrong_kind_is_protocol_error_whatever_the_payload() {
        assert!(matches!(
            Response::from_value_expecting(
                json!({"type": "loadSimulator", "data": "ready"}),
                "updateAndRun"
            ),
            Err(GeneticError::Protocol(_))
        ));
        assert!(matches!(
            Response::from_value_expecting(
                json!({"type": "loadSimulator", "data": {"w": 1.0}}),
                "updateAndRun"
            ),
            Err(GeneticError::Protocol(_))
        ));
        assert_eq!(
            Response::from_value_expecting(json!({"type": "error", "data": "boom"}), "updateAndRun")
                .unwrap(),
            Response::Error("boom".to_string())
        );
        assert!(matches!(
            Response::from_value_expecting(
                json!({"type": "updateAndRun", "data": "oops"}),
                "updateAndRun"
            ),
            Err(GeneticError::Encoding(_))
        ));
    }

    #[test]
    fn test_response_serialization_matches_parser() {
        let mut vars = BTreeMap::new();
        vars.insert("w".to_string(), json!([1.0, 2.0]));
        let original = Response::LoadSimulator(vars);
        let value = serde_json::to_value(&original).unwrap();
        assert_eq!(Response::from_value(value).unwrap(), original);
    }
}

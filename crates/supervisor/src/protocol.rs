// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Line-delimited JSON protocol spoken with the worker over stdio.
//!
//! Requests: `{"version":"1.0","id":..,"method":..,"params":{..}}\n`.
//! Responses carry the request id and either `result` or `error`.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use warden_core::RequestId;

/// Protocol version stamped on every request.
pub const PROTOCOL_VERSION: &str = "1.0";

/// Longest stdout line accepted from a worker (16 MiB).
pub const MAX_LINE_BYTES: usize = 16 * 1024 * 1024;

/// Code used when a worker error carries no numeric code.
pub const GENERIC_ERROR_CODE: i64 = -32000;

/// Protocol errors
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("expected a JSON object")]
    NotAnObject,

    #[error("line too long: {size} bytes (max {max})")]
    LineTooLong { size: usize, max: usize },
}

/// A request as written to the worker's stdin
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireRequest {
    pub version: String,
    pub id: RequestId,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

impl WireRequest {
    pub fn new(id: RequestId, method: impl Into<String>, params: Value) -> Self {
        Self {
            version: PROTOCOL_VERSION.to_string(),
            id,
            method: method.into(),
            params,
        }
    }
}

/// Error payload of a response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl ErrorBody {
    fn from_value(value: Value) -> Self {
        match value {
            Value::Object(map) => Self {
                code: map
                    .get("code")
                    .and_then(Value::as_i64)
                    .unwrap_or(GENERIC_ERROR_CODE),
                message: map
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or("worker error")
                    .to_string(),
                data: map.get("data").filter(|d| !d.is_null()).cloned(),
            },
            Value::String(message) => Self {
                code: GENERIC_ERROR_CODE,
                message,
                data: None,
            },
            other => Self {
                code: GENERIC_ERROR_CODE,
                message: other.to_string(),
                data: None,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Result(Value),
    Error(ErrorBody),
    /// Neither `result` nor `error` present
    Missing,
}

/// A decoded stdout line
#[derive(Debug, Clone, PartialEq)]
pub struct WireResponse {
    pub id: Option<RequestId>,
    pub payload: Payload,
}

/// Encode a request as a single newline-terminated line.
pub fn encode_request(request: &WireRequest) -> Result<Vec<u8>, ProtocolError> {
    let mut bytes = serde_json::to_vec(request)?;
    bytes.push(b'\n');
    Ok(bytes)
}

/// Decode one stdout line into a response.
///
/// Numeric ids are accepted and stringified. A `null` error is treated as absent.
pub fn decode_response(line: &str) -> Result<WireResponse, ProtocolError> {
    let Value::Object(mut map) = serde_json::from_str::<Value>(line)? else {
        return Err(ProtocolError::NotAnObject);
    };

    let id = match map.remove("id") {
        Some(Value::String(s)) => Some(RequestId::new(s)),
        Some(Value::Number(n)) => Some(RequestId::new(n.to_string())),
        _ => None,
    };

    let payload = match map.remove("error").filter(|e| !e.is_null()) {
        Some(error) => Payload::Error(ErrorBody::from_value(error)),
        None => match map.remove("result") {
            Some(result) => Payload::Result(result),
            None => Payload::Missing,
        },
    };

    Ok(WireResponse { id, payload })
}

/// Output of [`LineBuffer`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Line {
    Text(String),
    /// A line longer than the limit was dropped; carries its length in bytes.
    Oversized(usize),
}

/// Splits a byte stream into lines, retaining a trailing partial line
/// between reads.
#[derive(Debug)]
pub struct LineBuffer {
    buf: Vec<u8>,
    max_line: usize,
    discarding: Option<usize>,
}

impl Default for LineBuffer {
    fn default() -> Self {
        Self::new(MAX_LINE_BYTES)
    }
}

impl LineBuffer {
    pub fn new(max_line: usize) -> Self {
        Self {
            buf: Vec::new(),
            max_line,
            discarding: None,
        }
    }

    /// Feed a chunk, returning every line it completes.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Line> {
        let mut lines = Vec::new();
        let mut rest = chunk;
        while let Some(pos) = rest.iter().position(|&b| b == b'\n') {
            self.append(&rest[..pos]);
            if let Some(line) = self.take_line() {
                lines.push(line);
            }
            rest = &rest[pos + 1..];
        }
        self.append(rest);
        lines
    }

    /// Flush a trailing unterminated line at end of stream.
    pub fn finish(&mut self) -> Option<Line> {
        if self.buf.is_empty() && self.discarding.is_none() {
            return None;
        }
        self.take_line()
    }

    /// Bytes held for an incomplete line.
    pub fn pending(&self) -> usize {
        self.buf.len()
    }

    fn append(&mut self, bytes: &[u8]) {
        if let Some(discarded) = self.discarding.as_mut() {
            *discarded += bytes.len();
            return;
        }
        let len = self.buf.len() + bytes.len();
        if len > self.max_line {
            self.discarding = Some(len);
            self.buf = Vec::new();
            return;
        }
        self.buf.extend_from_slice(bytes);
    }

    fn take_line(&mut self) -> Option<Line> {
        if let Some(size) = self.discarding.take() {
            return Some(Line::Oversized(size));
        }
        let mut bytes = std::mem::take(&mut self.buf);
        if bytes.last() == Some(&b'\r') {
            bytes.pop();
        }
        let text = String::from_utf8_lossy(&bytes);
        if text.trim().is_empty() {
            None
        } else {
            Some(Line::Text(text.into_owned()))
        }
    }
}

#[cfg(test)]
#[path = "protocol_tests.rs"]
mod tests;

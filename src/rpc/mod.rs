//! JSON-RPC 2.0 framing over `Content-Length`-delimited stdio.
//!
//! Mirrors the wire format LSP servers expect: a header block terminated by
//! a blank line, then exactly `Content-Length` bytes of UTF-8 JSON body.

use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};

use crate::error::CoreError;

pub const CONTENT_TYPE: &str = "application/vscode-jsonrpc; charset=utf-8";

/// Encodes a JSON-RPC payload as a framed message ready to write to a
/// child process's stdin.
pub fn encode(payload: &Value) -> Result<Vec<u8>, CoreError> {
    let body = serde_json::to_vec(payload).map_err(|e| CoreError::InvalidFrame(e.to_string()))?;
    let header = format!(
        "Content-Length: {}\r\nContent-Type: {}\r\n\r\n",
        body.len(),
        CONTENT_TYPE
    );
    let mut out = Vec::with_capacity(header.len() + body.len());
    out.extend_from_slice(header.as_bytes());
    out.extend_from_slice(&body);
    Ok(out)
}

pub async fn write_message<W: AsyncWrite + Unpin>(writer: &mut W, payload: &Value) -> Result<(), CoreError> {
    let framed = encode(payload)?;
    writer
        .write_all(&framed)
        .await
        .map_err(|e| CoreError::InvalidFrame(e.to_string()))?;
    writer
        .flush()
        .await
        .map_err(|e| CoreError::InvalidFrame(e.to_string()))?;
    Ok(())
}

/// Reads one framed JSON-RPC message from `reader`.
///
/// Returns `Ok(None)` on a clean EOF at the start of a message (the process
/// closed its stdout between messages). Malformed headers or bodies are
/// reported as `CoreError::InvalidFrame`/`InvalidEncoding`; per the framer's
/// contract the caller is expected to log and keep reading rather than treat
/// this as process termination.
pub async fn read_message<R: AsyncRead + Unpin>(
    reader: &mut BufReader<R>,
) -> Result<Option<Value>, CoreError> {
    let mut content_length: Option<usize> = None;
    loop {
        let mut line = String::new();
        let n = reader
            .read_line(&mut line)
            .await
            .map_err(|e| CoreError::InvalidFrame(e.to_string()))?;
        if n == 0 {
            if content_length.is_none() {
                return Ok(None);
            }
            return Err(CoreError::InvalidFrame("EOF inside header block".into()));
        }
        let trimmed = line.trim_end_matches(['\r', '\n']);
        if trimmed.is_empty() {
            break;
        }
        if let Some((name, value)) = trimmed.split_once(':') {
            if name.eq_ignore_ascii_case("content-length") {
                content_length = Some(
                    value
                        .trim()
                        .parse()
                        .map_err(|_| CoreError::InvalidFrame(format!("bad Content-Length: {value}")))?,
                );
            }
            // Other headers (Content-Type, ...) are accepted and ignored.
        }
    }

    let len = content_length.ok_or_else(|| CoreError::InvalidFrame("missing Content-Length".into()))?;
    let mut body = vec![0u8; len];
    reader
        .read_exact(&mut body)
        .await
        .map_err(|e| CoreError::InvalidFrame(e.to_string()))?;

    let text = std::str::from_utf8(&body).map_err(|_| CoreError::InvalidEncoding)?;
    let value: Value = serde_json::from_str(text).map_err(|e| CoreError::InvalidFrame(e.to_string()))?;
    Ok(Some(value))
}

/// Builds a JSON-RPC 2.0 request object.
pub fn make_request(id: i64, method: &str, params: Value) -> Value {
    serde_json::json!({
        "jsonrpc": "2.0",
        "id": id,
        "method": method,
        "params": params,
    })
}

/// Builds a JSON-RPC 2.0 notification (no `id`).
pub fn make_notification(method: &str, params: Value) -> Value {
    serde_json::json!({
        "jsonrpc": "2.0",
        "method": method,
        "params": params,
    })
}

pub fn make_response(id: Value, result: Value) -> Value {
    serde_json::json!({
        "jsonrpc": "2.0",
        "id": id,
        "result": result,
    })
}

pub fn make_error_response(id: Value, code: i32, message: &str) -> Value {
    serde_json::json!({
        "jsonrpc": "2.0",
        "id": id,
        "error": { "code": code, "message": message },
    })
}

pub mod error_codes {
    pub const PARSE_ERROR: i32 = -32700;
    pub const INVALID_REQUEST: i32 = -32600;
    pub const METHOD_NOT_FOUND: i32 = -32601;
    pub const INVALID_PARAMS: i32 = -32602;
    pub const INTERNAL_ERROR: i32 = -32603;
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::BufReader;

    #[tokio::test]
    async fn round_trips_a_request() {
        let payload = make_request(7, "textDocument/hover", serde_json::json!({"a": 1}));
        let framed = encode(&payload).unwrap();
        let mut reader = BufReader::new(&framed[..]);
        let decoded = read_message(&mut reader).await.unwrap().unwrap();
        assert_eq!(decoded["id"], 7);
        assert_eq!(decoded["method"], "textDocument/hover");
    }

    #[tokio::test]
    async fn rejects_bad_content_length() {
        let bad = b"Content-Length: notanumber\r\n\r\n{}".to_vec();
        let mut reader = BufReader::new(&bad[..]);
        let result = read_message(&mut reader).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn clean_eof_before_any_header_returns_none() {
        let empty: Vec<u8> = Vec::new();
        let mut reader = BufReader::new(&empty[..]);
        let result = read_message(&mut reader).await.unwrap();
        assert!(result.is_none());
    }
}

//! Streamable-HTTP JSON-RPC session used by the discovery client.
//!
//! Every call is a POST that may answer either as a plain JSON body or as a
//! short event stream; the session id handed back on initialize rides a
//! response header and is echoed on every later call.

use futures_util::StreamExt;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

pub const JSON_CONTENT_TYPE: &str = "application/json";
pub const JSON_AND_SSE_ACCEPT: &str = "application/json, text/event-stream";
pub const PROTOCOL_VERSION_HEADER: &str = "MCP-Protocol-Version";
pub const SESSION_ID_HEADER: &str = "mcp-session-id";
pub const PROTOCOL_VERSION: &str = "2025-03-26";

#[derive(Debug, Deserialize)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
    #[serde(default)]
    pub data: Option<Value>,
}

#[derive(Debug, Deserialize)]
pub struct RpcEnvelope {
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<RpcError>,
}

pub fn format_rpc_error(error: &RpcError) -> String {
    match &error.data {
        Some(data) => format!("RPC error {}: {} ({data})", error.code, error.message),
        None => format!("RPC error {}: {}", error.code, error.message),
    }
}

#[derive(Default)]
pub struct SseLineBuffer {
    buffer: Vec<u8>,
}

impl SseLineBuffer {
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(chunk);
        self.drain_lines(false)
    }

    pub fn finish(&mut self) -> Vec<String> {
        self.drain_lines(true)
    }

    fn drain_lines(&mut self, flush: bool) -> Vec<String> {
        let mut lines = Vec::new();
        let mut search_index = 0;

        while let Some(relative_pos) = self.buffer[search_index..].iter().position(|b| *b == b'\n')
        {
            let newline_index = search_index + relative_pos;
            let mut line_end = newline_index;
            if line_end > search_index && self.buffer[line_end - 1] == b'\r' {
                line_end -= 1;
            }

            let line_bytes = &self.buffer[search_index..line_end];
            if let Ok(text) = std::str::from_utf8(line_bytes) {
                let trimmed = text.trim();
                if !trimmed.is_empty() {
                    lines.push(trimmed.to_string());
                }
            }

            search_index = newline_index + 1;
        }

        if flush {
            if let Ok(text) = std::str::from_utf8(&self.buffer[search_index..]) {
                let trimmed = text.trim();
                if !trimmed.is_empty() {
                    lines.push(trimmed.to_string());
                }
            }
            self.buffer.clear();
        } else if search_index > 0 {
            self.buffer.drain(..search_index);
        }

        lines
    }
}

pub fn is_event_stream_content_type(content_type: &str) -> bool {
    content_type
        .split(';')
        .next()
        .map(str::trim)
        .is_some_and(|value| value.eq_ignore_ascii_case("text/event-stream"))
}

pub fn sse_data_payload(line: &str) -> Option<&str> {
    line.strip_prefix("data:").map(str::trim)
}

/// Reads the stream until the first data payload carrying a response or
/// error envelope.
pub async fn next_sse_envelope(response: reqwest::Response) -> Result<RpcEnvelope, String> {
    let mut stream = response.bytes_stream();
    let mut buffer = SseLineBuffer::default();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|err| err.to_string())?;
        for line in buffer.push(&chunk) {
            if let Some(envelope) = decode_sse_line(&line)? {
                return Ok(envelope);
            }
        }
    }

    for line in buffer.finish() {
        if let Some(envelope) = decode_sse_line(&line)? {
            return Ok(envelope);
        }
    }

    Err("Empty event-stream response.".to_string())
}

fn decode_sse_line(line: &str) -> Result<Option<RpcEnvelope>, String> {
    let Some(payload) = sse_data_payload(line) else {
        return Ok(None);
    };
    if payload.is_empty() {
        return Ok(None);
    }

    let envelope = serde_json::from_str::<RpcEnvelope>(payload).map_err(|err| err.to_string())?;
    if envelope.result.is_none() && envelope.error.is_none() {
        return Ok(None);
    }
    Ok(Some(envelope))
}

/// One established JSON-RPC session against the discovery endpoint.
pub struct RpcSession {
    client: reqwest::Client,
    endpoint: String,
    auth_header: String,
    tenant_header: Option<String>,
    session_id: Option<String>,
    protocol_version: Option<String>,
    next_request_id: i64,
}

impl RpcSession {
    pub fn new(
        client: reqwest::Client,
        endpoint: String,
        access_token: &str,
        tenant_name: Option<String>,
    ) -> Self {
        Self {
            client,
            endpoint,
            auth_header: format!("Bearer {access_token}"),
            tenant_header: tenant_name,
            session_id: None,
            protocol_version: None,
            next_request_id: 1,
        }
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    pub fn set_protocol_version(&mut self, version: Option<String>) {
        self.protocol_version = version;
    }

    fn next_request_id(&mut self) -> i64 {
        let id = self.next_request_id;
        self.next_request_id += 1;
        id
    }

    /// Sends a request and returns the `result` payload, mapping RPC error
    /// envelopes to readable messages.
    pub async fn send_request(&mut self, method: &str, params: Value) -> Result<Value, String> {
        let id = self.next_request_id();
        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });

        let envelope = self.post_message(body).await?;
        if let Some(error) = envelope.error {
            return Err(format_rpc_error(&error));
        }
        envelope
            .result
            .ok_or_else(|| "Response carried neither result nor error.".to_string())
    }

    /// Sends a notification; any response body is ignored.
    pub async fn send_notification(&mut self, method: &str) -> Result<(), String> {
        let body = json!({
            "jsonrpc": "2.0",
            "method": method,
        });
        let request = self.apply_headers(self.client.post(&self.endpoint)).json(&body);
        let response = request.send().await.map_err(|err| err.to_string())?;
        if !response.status().is_success() && response.status() != reqwest::StatusCode::ACCEPTED {
            return Err(format!(
                "Notification rejected with status {}.",
                response.status()
            ));
        }
        Ok(())
    }

    async fn post_message(&mut self, body: Value) -> Result<RpcEnvelope, String> {
        let request = self.apply_headers(self.client.post(&self.endpoint)).json(&body);
        let response = request.send().await.map_err(|err| err.to_string())?;

        if let Some(session_id) = response
            .headers()
            .get(SESSION_ID_HEADER)
            .and_then(|value| value.to_str().ok())
        {
            self.session_id = Some(session_id.to_string());
        }

        let status = response.status();
        if !status.is_success() {
            return Err(format!("Request failed with status {status}."));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or("")
            .to_string();
        debug!(endpoint = %self.endpoint, %content_type, "Discovery response received");

        if is_event_stream_content_type(&content_type) {
            next_sse_envelope(response).await
        } else {
            let text = response.text().await.map_err(|err| err.to_string())?;
            serde_json::from_str::<RpcEnvelope>(&text).map_err(|err| err.to_string())
        }
    }

    fn apply_headers(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let mut request = request
            .header("Content-Type", JSON_CONTENT_TYPE)
            .header("Accept", JSON_AND_SSE_ACCEPT)
            .header("Authorization", &self.auth_header);
        if let Some(tenant) = &self.tenant_header {
            request = request.header(crate::core::constants::TENANT_HEADER, tenant);
        }
        if let Some(session_id) = &self.session_id {
            request = request.header(SESSION_ID_HEADER, session_id);
        }
        if let Some(version) = &self.protocol_version {
            request = request.header(PROTOCOL_VERSION_HEADER, version);
        }
        request
    }
}

//! HTTP transport seam for the Zenkit client.
//!
//! # Design
//! Requests and responses are described as plain data so the client stays
//! deterministic: `ZenkitClient` builds `HttpRequest` values and parses
//! `HttpResponse` values, and the `Transport` trait executes the actual
//! round-trip. Pagination and batch delete are multi-request flows, so the
//! seam is a trait rather than a build/parse split — unit tests plug in a
//! scripted transport, production uses `UreqTransport`.

use std::time::Duration;

use crate::error::Error;

/// Transport-level request timeout. The remote service mandates none, so a
/// conservative one beats waiting forever on a stalled connection.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP method for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
}

/// An HTTP request described as plain data.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
}

/// An HTTP response described as plain data.
///
/// Non-2xx statuses are carried as data, never as transport errors; status
/// interpretation belongs to the client, not the transport.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

/// Executes one HTTP round-trip.
///
/// Implementations return `Error::Connectivity` for timeouts and transport
/// failures and nothing else — every response the server actually produced,
/// whatever its status, comes back as an `HttpResponse`.
pub trait Transport: Send + Sync {
    fn execute(&self, request: HttpRequest) -> Result<HttpResponse, Error>;
}

/// Blocking `ureq`-backed transport used in production.
pub struct UreqTransport {
    agent: ureq::Agent,
}

impl UreqTransport {
    pub fn new() -> Self {
        let agent = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .timeout_global(Some(REQUEST_TIMEOUT))
            .build()
            .new_agent();
        Self { agent }
    }
}

impl Default for UreqTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for UreqTransport {
    fn execute(&self, request: HttpRequest) -> Result<HttpResponse, Error> {
        let result = match (request.method, request.body) {
            (HttpMethod::Get, _) => {
                let mut r = self.agent.get(&request.url);
                for (name, value) in &request.headers {
                    r = r.header(name.as_str(), value.as_str());
                }
                r.call()
            }
            (HttpMethod::Post, Some(body)) => {
                let mut r = self.agent.post(&request.url);
                for (name, value) in &request.headers {
                    r = r.header(name.as_str(), value.as_str());
                }
                r.send(body.as_bytes())
            }
            (HttpMethod::Post, None) => {
                let mut r = self.agent.post(&request.url);
                for (name, value) in &request.headers {
                    r = r.header(name.as_str(), value.as_str());
                }
                r.send_empty()
            }
            (HttpMethod::Put, Some(body)) => {
                let mut r = self.agent.put(&request.url);
                for (name, value) in &request.headers {
                    r = r.header(name.as_str(), value.as_str());
                }
                r.send(body.as_bytes())
            }
            (HttpMethod::Put, None) => {
                let mut r = self.agent.put(&request.url);
                for (name, value) in &request.headers {
                    r = r.header(name.as_str(), value.as_str());
                }
                r.send_empty()
            }
        };

        let mut response = result.map_err(|e| Error::Connectivity(e.to_string()))?;
        let status = response.status().as_u16();
        let body = response
            .body_mut()
            .read_to_string()
            .map_err(|e| Error::Connectivity(e.to_string()))?;

        Ok(HttpResponse { status, body })
    }
}

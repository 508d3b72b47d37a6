//! Transport collaborator for outbound demand-source calls.
//!
//! The exchange never opens sockets itself; it hands fully-formed
//! [`OutboundCall`]s to an injected [`Transport`] together with the deadline
//! the call must honor. The host wires in whatever HTTP client its runtime
//! provides; tests wire in a scripted one.

use async_trait::async_trait;
use bytes::Bytes;
use derive_more::{Display, Error};
use http::{Method, StatusCode};

/// One outbound HTTP call produced by an adapter's request-building step.
#[derive(Debug, Clone)]
pub struct OutboundCall {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

impl OutboundCall {
    /// A JSON POST, the shape almost every demand source expects.
    #[must_use]
    pub fn post_json(url: impl Into<String>, body: Bytes) -> Self {
        Self {
            method: Method::POST,
            url: url.into(),
            headers: vec![
                ("content-type".to_string(), "application/json".to_string()),
                ("accept".to_string(), "application/json".to_string()),
            ],
            body,
        }
    }

    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

/// Raw response handed back to the adapter's parsing step.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: StatusCode,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

impl HttpResponse {
    #[must_use]
    pub fn new(status: StatusCode, body: Bytes) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body,
        }
    }
}

/// Network or HTTP-layer failure reported by the transport.
#[derive(Debug, Clone, Display, Error)]
#[display("{message}")]
pub struct TransportError {
    pub message: String,
    /// Set when the transport gave up because the caller's deadline elapsed.
    pub timed_out: bool,
}

impl TransportError {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            timed_out: false,
        }
    }

    #[must_use]
    pub fn timed_out(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            timed_out: true,
        }
    }
}

/// Issues one outbound call, honoring the supplied deadline.
///
/// Implementations must cancel the underlying request when the deadline
/// elapses and report it as a timed-out [`TransportError`]; the dispatcher
/// additionally enforces the deadline from the outside, so a transport that
/// overruns is cut off either way.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(
        &self,
        call: &OutboundCall,
        deadline: std::time::Duration,
    ) -> Result<HttpResponse, TransportError>;
}

//! Request-plane tracing interceptor.
//!
//! A span is opened only when the inbound call already carries a parent trace
//! context (`traceparent`, W3C Trace Context). Untraced callers pass through
//! untouched so they never produce orphan root spans.
//!
//! Two strategies implement [`Interceptor`]; the server picks one at startup
//! and the middleware itself never branches on configuration.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use thiserror::Error;
use tracing::{Instrument, Span};

use crate::config::TracingSection;

pub const TRACEPARENT: &str = "traceparent";

/// Name of the per-call span.
pub const DECIDE_SPAN: &str = "pdp.decide";

/// Parent context propagated by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceContext {
    pub trace_id: String,
    pub parent_span_id: String,
    pub sampled: bool,
}

impl TraceContext {
    /// Parse `version-traceid-parentid-flags`. Anything malformed is "no context".
    pub fn parse(raw: &str) -> Option<Self> {
        let mut parts = raw.trim().split('-');
        let version = parts.next()?;
        let trace_id = parts.next()?;
        let parent = parts.next()?;
        let flags = parts.next()?;

        // version 00 has exactly four fields; later versions may append more
        if version == "00" && parts.next().is_some() {
            return None;
        }
        if !is_hex(version, 2) || version == "ff" {
            return None;
        }
        if !is_hex(trace_id, 32) || is_zero(trace_id) {
            return None;
        }
        if !is_hex(parent, 16) || is_zero(parent) {
            return None;
        }
        if !is_hex(flags, 2) {
            return None;
        }
        let flags = u8::from_str_radix(flags, 16).ok()?;

        Some(Self {
            trace_id: trace_id.to_string(),
            parent_span_id: parent.to_string(),
            sampled: flags & 0x01 != 0,
        })
    }

    pub fn from_headers(headers: &HeaderMap) -> Option<Self> {
        headers
            .get(TRACEPARENT)
            .and_then(|v| v.to_str().ok())
            .and_then(Self::parse)
    }
}

fn is_hex(s: &str, len: usize) -> bool {
    s.len() == len && s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

fn is_zero(s: &str) -> bool {
    s.bytes().all(|b| b == b'0')
}

/// Call-wrapping contract shared by both strategies.
pub trait Interceptor: Send + Sync + 'static {
    /// Span to run the call in, if any.
    fn span_for(&self, headers: &HeaderMap) -> Option<Span>;

    fn enabled(&self) -> bool;
}

/// Tracing disabled: every call passes through.
#[derive(Debug, Default)]
pub struct NoopInterceptor;

impl Interceptor for NoopInterceptor {
    fn span_for(&self, _headers: &HeaderMap) -> Option<Span> {
        None
    }

    fn enabled(&self) -> bool {
        false
    }
}

/// Tracing enabled: span only for calls with a parent context.
#[derive(Debug)]
pub struct SpanInterceptor {
    backend: String,
}

impl SpanInterceptor {
    pub fn new(backend: impl Into<String>) -> Self {
        Self {
            backend: backend.into(),
        }
    }
}

impl Interceptor for SpanInterceptor {
    fn span_for(&self, headers: &HeaderMap) -> Option<Span> {
        let ctx = TraceContext::from_headers(headers)?;
        Some(tracing::info_span!(
            "pdp.decide",
            backend = %self.backend,
            trace_id = %ctx.trace_id,
            parent_span_id = %ctx.parent_span_id,
            sampled = ctx.sampled,
        ))
    }

    fn enabled(&self) -> bool {
        true
    }
}

pub type SharedInterceptor = Arc<dyn Interceptor>;

pub fn disabled() -> SharedInterceptor {
    Arc::new(NoopInterceptor)
}

/// axum middleware: run the downstream handler inside the chosen span.
/// The span closes when the handler future completes, success or error.
pub async fn intercept(
    State(interceptor): State<SharedInterceptor>,
    mut req: Request,
    next: Next,
) -> Response {
    match interceptor.span_for(req.headers()) {
        Some(span) => {
            if let Some(ctx) = TraceContext::from_headers(req.headers()) {
                req.extensions_mut().insert(ctx);
            }
            next.run(req).instrument(span).await
        }
        None => next.run(req).await,
    }
}

#[derive(Debug, Error)]
pub enum TracingInitError {
    #[error("tracing not configured")]
    NotConfigured,
    #[error("unknown tracing backend: {0}")]
    UnknownBackend(String),
    #[error("tracing backend {backend} requires an endpoint")]
    MissingEndpoint { backend: String },
    #[error("tracing endpoint {endpoint} unreachable: {reason}")]
    Unreachable { endpoint: String, reason: String },
}

const PROBE_TIMEOUT: Duration = Duration::from_millis(500);

/// Try to bring up the configured backend. Callers treat any error as
/// "run untraced" (see [`disabled`]).
///
/// Both backends emit spans to the process `tracing` subscriber only.
/// `"zipkin"` checks that its endpoint accepts TCP connections and tags spans
/// with `backend = "zipkin"`; nothing is exported to the collector.
pub async fn init(cfg: Option<&TracingSection>) -> Result<SharedInterceptor, TracingInitError> {
    let cfg = cfg.ok_or(TracingInitError::NotConfigured)?;
    let backend = cfg.backend.trim();

    match backend {
        "" => Err(TracingInitError::NotConfigured),
        // spans go to the process subscriber
        "log" => Ok(Arc::new(SpanInterceptor::new("log"))),
        // reachability check only; spans stay local
        "zipkin" => {
            let endpoint = cfg
                .endpoint
                .as_deref()
                .map(str::trim)
                .filter(|e| !e.is_empty())
                .ok_or_else(|| TracingInitError::MissingEndpoint {
                    backend: backend.to_string(),
                })?;
            probe(endpoint).await?;
            Ok(Arc::new(SpanInterceptor::new("zipkin")))
        }
        other => Err(TracingInitError::UnknownBackend(other.to_string())),
    }
}

async fn probe(endpoint: &str) -> Result<(), TracingInitError> {
    let unreachable = |reason: String| TracingInitError::Unreachable {
        endpoint: endpoint.to_string(),
        reason,
    };
    match tokio::time::timeout(PROBE_TIMEOUT, tokio::net::TcpStream::connect(endpoint)).await {
        Ok(Ok(_)) => Ok(()),
        Ok(Err(e)) => Err(unreachable(e.to_string())),
        Err(_) => Err(unreachable("connect timed out".into())),
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use axum::http::HeaderValue;

    const VALID: &str = "00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01";

    #[test]
    fn parses_valid_traceparent() {
        let ctx = TraceContext::parse(VALID).unwrap();
        assert_eq!(ctx.trace_id, "4bf92f3577b34da6a3ce929d0e0e4736");
        assert_eq!(ctx.parent_span_id, "00f067aa0ba902b7");
        assert!(ctx.sampled);
    }

    #[test]
    fn rejects_malformed_traceparent() {
        for raw in [
            "",
            "garbage",
            "00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7",
            "00-00000000000000000000000000000000-00f067aa0ba902b7-01",
            "00-4bf92f3577b34da6a3ce929d0e0e4736-0000000000000000-01",
            "ff-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01",
            "00-4BF92F3577B34DA6A3CE929D0E0E4736-00f067aa0ba902b7-01",
            "00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01-extra",
        ] {
            assert!(TraceContext::parse(raw).is_none(), "{raw}");
        }
    }

    #[test]
    fn noop_never_spans() {
        let mut h = HeaderMap::new();
        h.insert(TRACEPARENT, HeaderValue::from_static(VALID));
        assert!(NoopInterceptor.span_for(&h).is_none());
    }

    #[test]
    fn span_interceptor_requires_parent() {
        let i = SpanInterceptor::new("log");
        assert!(i.span_for(&HeaderMap::new()).is_none());

        let mut h = HeaderMap::new();
        h.insert(TRACEPARENT, HeaderValue::from_static(VALID));
        assert!(i.span_for(&h).is_some());
    }

    #[test]
    fn spans_are_local_and_tagged_with_backend() {
        let mut h = HeaderMap::new();
        h.insert(TRACEPARENT, HeaderValue::from_static(VALID));

        tracing::subscriber::with_default(tracing_subscriber::registry(), || {
            let span = SpanInterceptor::new("zipkin").span_for(&h).unwrap();
            let meta = span.metadata().unwrap();
            assert_eq!(meta.name(), DECIDE_SPAN);
            assert!(meta.fields().field("backend").is_some());
            assert!(meta.fields().field("trace_id").is_some());
        });
    }

    #[tokio::test]
    async fn init_degrades_instead_of_failing() {
        assert!(matches!(init(None).await, Err(TracingInitError::NotConfigured)));

        let unknown = TracingSection {
            backend: "jaeger-ng".into(),
            endpoint: None,
        };
        assert!(matches!(
            init(Some(&unknown)).await,
            Err(TracingInitError::UnknownBackend(_))
        ));

        let no_ep = TracingSection {
            backend: "zipkin".into(),
            endpoint: None,
        };
        assert!(matches!(
            init(Some(&no_ep)).await,
            Err(TracingInitError::MissingEndpoint { .. })
        ));

        let log = TracingSection {
            backend: "log".into(),
            endpoint: None,
        };
        assert!(init(Some(&log)).await.unwrap().enabled());
    }

    #[tokio::test]
    async fn zipkin_probe_needs_a_listener() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();

        let up = TracingSection {
            backend: "zipkin".into(),
            endpoint: Some(addr.clone()),
        };
        assert!(init(Some(&up)).await.unwrap().enabled());

        drop(listener);
        let down = TracingSection {
            backend: "zipkin".into(),
            endpoint: Some(addr),
        };
        assert!(matches!(
            init(Some(&down)).await,
            Err(TracingInitError::Unreachable { .. })
        ));
    }
}

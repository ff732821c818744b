//! Trace-id correlation and request/response logging
//!
//! Every request outside the skip-set gets exactly one "request received"
//! and one "request completed" record, both bound to the same trace id.

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{self, header, HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};
use std::{
    collections::HashSet,
    fmt,
    net::SocketAddr,
    sync::Arc,
    time::{Duration, Instant},
};
use tower_http::trace::{
    DefaultMakeSpan, DefaultOnEos, DefaultOnFailure, DefaultOnRequest, DefaultOnResponse,
    MakeSpan, OnEos, OnFailure, OnRequest, OnResponse,
};
use tracing::{Level, Span};
use uuid::Uuid;

use crate::error::RequestErrors;
use crate::logger::Logger;

/// Inbound header carrying the caller's correlation id
pub const TRACE_ID_HEADER: &str = "x-trace-id";

/// Correlation id of the current request, stored in the request extensions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceId(String);

impl TraceId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TraceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Shared, read-only state of the logging middleware
#[derive(Debug, Clone)]
pub struct TraceLogging {
    logger: Logger,
    skip_paths: Arc<HashSet<String>>,
}

impl TraceLogging {
    pub fn new<I, S>(logger: Logger, skip_paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            logger,
            skip_paths: Arc::new(skip_paths.into_iter().map(Into::into).collect()),
        }
    }

    pub fn skips(&self, path: &str) -> bool {
        self.skip_paths.contains(path)
    }

    /// Callbacks for `tower_http::trace::TraceLayer` honouring the same skip-set.
    pub fn framework_trace(&self) -> FrameworkTrace {
        FrameworkTrace {
            skip_paths: self.skip_paths.clone(),
        }
    }
}

/// `TraceLayer` callbacks that stay silent for skipped paths.
///
/// A skipped request gets `Span::none()`; every later callback sees that
/// span and emits nothing. Other requests get tower-http's default records.
#[derive(Debug, Clone)]
pub struct FrameworkTrace {
    skip_paths: Arc<HashSet<String>>,
}

impl<B> MakeSpan<B> for FrameworkTrace {
    fn make_span(&mut self, request: &http::Request<B>) -> Span {
        if self.skip_paths.contains(request.uri().path()) {
            Span::none()
        } else {
            // ERROR-level span so it is never disabled by the level filter,
            // which would read as skipped below
            DefaultMakeSpan::new().level(Level::ERROR).make_span(request)
        }
    }
}

impl<B> OnRequest<B> for FrameworkTrace {
    fn on_request(&mut self, request: &http::Request<B>, span: &Span) {
        if !span.is_none() {
            DefaultOnRequest::new().on_request(request, span);
        }
    }
}

impl<B> OnResponse<B> for FrameworkTrace {
    fn on_response(self, response: &http::Response<B>, latency: Duration, span: &Span) {
        if !span.is_none() {
            DefaultOnResponse::new().on_response(response, latency, span);
        }
    }
}

impl<C: fmt::Display> OnFailure<C> for FrameworkTrace {
    fn on_failure(&mut self, failure_classification: C, latency: Duration, span: &Span) {
        if !span.is_none() {
            DefaultOnFailure::new().on_failure(failure_classification, latency, span);
        }
    }
}

impl OnEos for FrameworkTrace {
    fn on_eos(self, trailers: Option<&HeaderMap>, stream_duration: Duration, span: &Span) {
        if !span.is_none() {
            DefaultOnEos::new().on_eos(trailers, stream_duration, span);
        }
    }
}

/// axum middleware: propagate a trace id and log the request lifecycle.
///
/// Install with `axum::middleware::from_fn_with_state(state, trace_logging)`.
pub async fn trace_logging(
    State(state): State<Arc<TraceLogging>>,
    mut req: Request,
    next: Next,
) -> Response {
    if state.skips(req.uri().path()) {
        return next.run(req).await;
    }

    let trace_id = match header_trace_id(req.headers()) {
        Some(id) => TraceId(id.to_string()),
        None => {
            let id = TraceId::generate();
            state.logger.in_scope(|| {
                tracing::debug!(
                    trace_id = %id,
                    "request received without x-trace-id, generated a new trace id"
                )
            });
            id
        }
    };

    let start = Instant::now();
    let logger = state.logger.for_request(trace_id.as_str());

    let method = req.method().clone();
    let path = display_path(req.uri().path(), req.uri().query());
    let client_ip = client_ip(&req);
    let user_agent = req
        .headers()
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();

    logger.in_scope(|| {
        tracing::info!(
            method = %method,
            path = %path,
            client_ip = %client_ip,
            user_agent = %user_agent,
            "request received"
        )
    });

    req.extensions_mut().insert(trace_id);
    req.extensions_mut().insert(logger.clone());

    let response = logger.bind(next.run(req)).await;

    let elapsed = start.elapsed();
    let status = response.status();
    let message = match response.extensions().get::<RequestErrors>() {
        Some(errors) if !errors.is_empty() => format!("request completed: {}", errors),
        _ => "request completed".to_string(),
    };

    // `event!` needs a constant level, hence one arm per severity
    macro_rules! completed {
        ($level:expr) => {
            tracing::event!(
                $level,
                status = status.as_u16(),
                method = %method,
                path = %path,
                client_ip = %client_ip,
                latency = ?elapsed,
                user_agent = %user_agent,
                "{}",
                message
            )
        };
    }

    logger.in_scope(|| match completion_level(status) {
        Level::ERROR => completed!(Level::ERROR),
        Level::WARN => completed!(Level::WARN),
        _ => completed!(Level::TRACE),
    });

    response
}

/// Caller-supplied trace id, if present and non-empty
pub fn header_trace_id(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(TRACE_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
}

/// Path as logged: the raw path, plus `?query` when a query is present.
pub fn display_path(path: &str, query: Option<&str>) -> String {
    match query {
        Some(q) if !q.is_empty() => format!("{}?{}", path, q),
        _ => path.to_string(),
    }
}

/// Severity of the completion record for a response status.
///
/// Routine successes go to TRACE so default-level logs stay quiet.
pub fn completion_level(status: StatusCode) -> Level {
    match status.as_u16() {
        400..=499 => Level::WARN,
        500.. => Level::ERROR,
        _ => Level::TRACE,
    }
}

/// Best-effort client address: `X-Forwarded-For` (first hop), then
/// `X-Real-IP`, then the peer address. Empty when none is known.
pub fn client_ip(req: &Request) -> String {
    let headers = req.headers();

    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').map(str::trim).find(|ip| !ip.is_empty()));
    if let Some(ip) = forwarded {
        return ip.to_string();
    }

    let real_ip = headers
        .get("x-real-ip")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|ip| !ip.is_empty());
    if let Some(ip) = real_ip {
        return ip.to_string();
    }

    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{HeaderName, HeaderValue},
    };
    use tracing_subscriber::prelude::*;

    fn request_builder() -> axum::http::request::Builder {
        axum::http::Request::builder().uri("/")
    }

    #[test]
    fn test_display_path() {
        assert_eq!(display_path("/x", Some("a=1")), "/x?a=1");
        assert_eq!(display_path("/x", None), "/x");
        assert_eq!(display_path("/x", Some("")), "/x");
    }

    #[test]
    fn test_completion_level() {
        assert_eq!(completion_level(StatusCode::OK), Level::TRACE);
        assert_eq!(completion_level(StatusCode::MOVED_PERMANENTLY), Level::TRACE);
        assert_eq!(completion_level(StatusCode::BAD_REQUEST), Level::WARN);
        assert_eq!(completion_level(StatusCode::NOT_FOUND), Level::WARN);
        assert_eq!(completion_level(StatusCode::INTERNAL_SERVER_ERROR), Level::ERROR);
        assert_eq!(completion_level(StatusCode::SERVICE_UNAVAILABLE), Level::ERROR);
    }

    #[test]
    fn test_header_trace_id() {
        let mut headers = HeaderMap::new();
        assert_eq!(header_trace_id(&headers), None);

        let mixed_case = HeaderName::from_bytes(b"X-Trace-Id").unwrap();
        headers.insert(mixed_case, HeaderValue::from_static("abc"));
        assert_eq!(header_trace_id(&headers), Some("abc"));

        headers.insert(TRACE_ID_HEADER, HeaderValue::from_static(""));
        assert_eq!(header_trace_id(&headers), None);
    }

    #[test]
    fn test_generated_trace_ids_differ() {
        assert_ne!(TraceId::generate(), TraceId::generate());
    }

    #[test]
    fn test_client_ip_resolution_order() {
        let mut req = request_builder()
            .header("x-forwarded-for", " 10.0.0.1, 10.0.0.2")
            .header("x-real-ip", "10.0.0.9")
            .body(Body::empty())
            .unwrap();
        req.extensions_mut()
            .insert(ConnectInfo(SocketAddr::from(([127, 0, 0, 1], 5000))));
        assert_eq!(client_ip(&req), "10.0.0.1");

        req.headers_mut().remove("x-forwarded-for");
        assert_eq!(client_ip(&req), "10.0.0.9");

        req.headers_mut().remove("x-real-ip");
        assert_eq!(client_ip(&req), "127.0.0.1");

        let bare = request_builder().body(Body::empty()).unwrap();
        assert_eq!(client_ip(&bare), "");
    }

    #[test]
    fn test_framework_trace_has_no_span_for_skipped_paths() {
        let logger = Logger::with_writer(
            &crate::config::LogConfig::default(),
            "svc",
            std::io::sink,
        )
        .unwrap();
        let mut framework = TraceLogging::new(logger, ["/health"]).framework_trace();
        // A restrictive filter must not make logged paths look skipped
        let dispatch = tracing::Dispatch::new(
            tracing_subscriber::registry().with(tracing_subscriber::filter::LevelFilter::WARN),
        );

        tracing::dispatcher::with_default(&dispatch, || {
            let skipped = request_builder().uri("/health").body(()).unwrap();
            assert!(framework.make_span(&skipped).is_none());

            let logged = request_builder().uri("/hello-world").body(()).unwrap();
            assert!(!framework.make_span(&logged).is_none());
        });
    }

    #[test]
    fn test_skip_paths() {
        let logger = Logger::with_writer(
            &crate::config::LogConfig::default(),
            "svc",
            std::io::sink,
        )
        .unwrap();
        let state = TraceLogging::new(logger, ["/health"]);

        assert!(state.skips("/health"));
        assert!(!state.skips("/hello-world"));
    }
}

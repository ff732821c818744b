use axum::{
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use std::{any::Any, sync::Arc};
use tower::ServiceBuilder;
use tower_http::{
    catch_panic::CatchPanicLayer,
    timeout::{RequestBodyTimeoutLayer, TimeoutLayer},
    trace::TraceLayer,
};

use crate::{
    config::{Config, RunMode},
    error::AppError,
    handlers::{self, AppState},
    logger::Logger,
    middleware::{trace_logging, TraceLogging},
};

/// Build the application router.
///
/// Middleware, outermost first:
/// 1. framework request log (`TraceLayer`)
/// 2. trace-id correlation and request logging
/// 3. panic recovery
/// 4. write timeout
/// 5. request body read timeout
///
/// Recovery sits inside the logging middleware so a panicking handler still
/// yields a completion record with the recovered 500.
pub fn create_router(logger: Logger, config: &Config) -> Router {
    let registered: [(&str, &str); 2] = [("GET", "/hello-world"), ("GET", "/health")];
    if config.server.run_mode == RunMode::Debug {
        logger.in_scope(|| {
            for (method, path) in registered {
                tracing::debug!(method, path, "route registered");
            }
        });
    }

    let routes = Router::new()
        .route("/hello-world", get(handlers::hello_world::hello_world))
        .route("/health", get(handlers::health::health_check))
        .fallback(handlers::not_found)
        .with_state(AppState::new(&config.service_name));

    with_middleware(routes, logger, config)
}

/// Wrap `routes` in the request middleware chain described on [`create_router`].
pub fn with_middleware(routes: Router, logger: Logger, config: &Config) -> Router {
    let trace_logging_state = Arc::new(TraceLogging::new(
        logger,
        config.log.skip_paths.iter().cloned(),
    ));
    let framework_trace = trace_logging_state.framework_trace();

    routes.layer(
        ServiceBuilder::new()
            .layer(
                TraceLayer::new_for_http()
                    .make_span_with(framework_trace.clone())
                    .on_request(framework_trace.clone())
                    .on_response(framework_trace.clone())
                    .on_failure(framework_trace.clone())
                    .on_eos(framework_trace),
            )
            .layer(middleware::from_fn_with_state(
                trace_logging_state,
                trace_logging,
            ))
            .layer(CatchPanicLayer::custom(recover_panic))
            .layer(TimeoutLayer::with_status_code(
                StatusCode::REQUEST_TIMEOUT,
                config.server.write_timeout,
            ))
            .layer(RequestBodyTimeoutLayer::new(config.server.read_timeout)),
    )
}

/// Turn a handler panic into a 500 whose message reaches the completion record.
fn recover_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic payload".to_string()
    };

    AppError::Internal(format!("handler panicked: {}", detail)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use tower::ServiceExt;

    fn quiet_logger() -> Logger {
        Logger::with_writer(
            &crate::config::LogConfig::default(),
            "svc",
            std::io::sink,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_create_router_serves_hello_world() {
        let app = create_router(quiet_logger(), &Config::default());

        let response = app
            .oneshot(Request::builder().uri("/hello-world").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_unknown_route_is_not_found() {
        let app = create_router(quiet_logger(), &Config::default());

        let response = app
            .oneshot(Request::builder().uri("/nope").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_slow_handler_times_out_with_408() {
        let mut config = Config::default();
        config.server.write_timeout = std::time::Duration::from_millis(20);

        let routes = Router::new().route(
            "/slow",
            get(|| async {
                tokio::time::sleep(std::time::Duration::from_secs(5)).await;
                "late"
            }),
        );
        let app = with_middleware(routes, quiet_logger(), &config);

        let response = app
            .oneshot(Request::builder().uri("/slow").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::REQUEST_TIMEOUT);
    }

    #[test]
    fn test_recover_panic_message() {
        let response = recover_panic(Box::new("boom"));
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let errors = response
            .extensions()
            .get::<crate::error::RequestErrors>()
            .unwrap();
        assert_eq!(errors.to_string(), "Error #01: Internal error: handler panicked: boom");
    }
}

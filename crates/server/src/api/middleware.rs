//! Metrics middleware for API routes.

use axum::{body::Body, http::Request, middleware::Next, response::Response};
use prometheus::IntGauge;
use std::time::Instant;

use crate::metrics::{
    normalize_path, HTTP_REQUESTS_IN_FLIGHT, HTTP_REQUESTS_TOTAL, HTTP_REQUEST_DURATION,
};

/// Holds one unit of an in-flight gauge until dropped, so requests whose
/// future is dropped before completing are still subtracted.
struct InFlight<'a>(&'a IntGauge);

impl<'a> InFlight<'a> {
    fn enter(gauge: &'a IntGauge) -> Self {
        gauge.inc();
        Self(gauge)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.dec();
    }
}

/// Metrics middleware that tracks HTTP request duration and counts.
///
/// This middleware records:
/// - Request duration until the response head (histogram)
/// - Request count (counter)
/// - Requests in flight (gauge)
pub async fn metrics_middleware(request: Request<Body>, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().to_string();
    let path = normalize_path(request.uri().path());

    let in_flight = InFlight::enter(&HTTP_REQUESTS_IN_FLIGHT);
    let response = next.run(request).await;
    drop(in_flight);

    let duration = start.elapsed().as_secs_f64();
    let status = response.status().as_u16().to_string();

    HTTP_REQUEST_DURATION
        .with_label_values(&[&method, &path, &status])
        .observe(duration);
    HTTP_REQUESTS_TOTAL
        .with_label_values(&[&method, &path, &status])
        .inc();

    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::StatusCode, middleware, routing::get, Router};
    use std::time::Duration;
    use tower::ServiceExt;

    async fn dummy_handler() -> &'static str {
        "OK"
    }

    #[tokio::test]
    async fn test_requests_are_counted_by_normalized_path() {
        let app = Router::new()
            .route("/torrent/{hash}", get(dummy_handler))
            .layer(middleware::from_fn(metrics_middleware));

        let labels = ["GET", "/torrent/{hash}", "200"];
        let before = HTTP_REQUESTS_TOTAL.with_label_values(&labels).get();

        let request = Request::builder()
            .uri("/torrent/a94a8fe5ccb19ba61c4c0873d391e987982fbbd3")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let after = HTTP_REQUESTS_TOTAL.with_label_values(&labels).get();
        assert_eq!(after, before + 1);
    }

    #[test]
    fn test_in_flight_released_on_drop() {
        let gauge = IntGauge::new("test_in_flight", "test").unwrap();
        {
            let _a = InFlight::enter(&gauge);
            let _b = InFlight::enter(&gauge);
            assert_eq!(gauge.get(), 2);
        }
        assert_eq!(gauge.get(), 0);
    }

    #[tokio::test]
    async fn test_abandoned_request_releases_in_flight() {
        let app = Router::new()
            .route("/stall", get(|| std::future::pending::<&'static str>()))
            .layer(middleware::from_fn(metrics_middleware));

        let before = HTTP_REQUESTS_IN_FLIGHT.get();

        let request = Request::builder()
            .uri("/stall")
            .body(Body::empty())
            .unwrap();
        let task = tokio::spawn(app.oneshot(request));
        tokio::time::sleep(Duration::from_millis(20)).await;
        task.abort();
        let _ = task.await;

        // Other tests share the gauge; allow their requests to settle.
        let mut settled = false;
        for _ in 0..50 {
            if HTTP_REQUESTS_IN_FLIGHT.get() <= before {
                settled = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(settled, "in-flight gauge not released");
    }
}

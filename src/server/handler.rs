//! The image handler: fetch, optionally transform, respond.
//!
//! | Outcome | Status | Body | Counter |
//! |---|---|---|---|
//! | fetch failed | backend status | empty | `storage_fetch_error` |
//! | no query, no default params | 200 | fetched bytes | |
//! | transformed | 200 | manipulator output | |
//! | source format not decodable | 200 | fetched bytes | `processor_error` |
//! | any other manipulator failure | 422 | empty | `processor_error` |
//!
//! The manipulator is CPU-bound and runs on the blocking pool. A panic
//! inside it is re-raised on the request task so the recovery wrapper sees
//! it like any other fault.

use super::AppState;
use crate::manipulator::{ManipulationRequest, ParameterMap};
use crate::metrics::HandlerError;
use axum::extract::{Query, State};
use axum::http::{StatusCode, Uri, header};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use tracing::{error, warn};

pub async fn serve_image(
    State(state): State<AppState>,
    uri: Uri,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Response {
    let path = uri.path();
    let source = match state.storage.fetch(path).await {
        Ok(data) => data,
        Err(e) => {
            error!(path, error = %e, "storage fetch failed");
            state.metrics.increment(HandlerError::StorageFetch);
            return e.status().into_response();
        }
    };

    if pairs.is_empty() && !state.manipulator.has_default_params() {
        return image_response(source, state.cache_time);
    }

    let request = ManipulationRequest::builder()
        .image_data(source.clone())
        .params(ParameterMap::from_query_pairs(pairs))
        .build();
    let manipulator = state.manipulator.clone();
    let outcome = match tokio::task::spawn_blocking(move || manipulator.process(request)).await {
        Ok(outcome) => outcome,
        Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
        Err(e) => {
            error!(path, error = %e, "manipulator task cancelled");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    match outcome {
        Ok(data) => image_response(Bytes::from(data), state.cache_time),
        Err(e) if e.is_unsupported_format() => {
            warn!(path, error = %e, "serving original bytes");
            state.metrics.increment(HandlerError::Processor);
            image_response(source, state.cache_time)
        }
        Err(e) => {
            error!(path, error = %e, "manipulator failed");
            state.metrics.increment(HandlerError::Processor);
            StatusCode::UNPROCESSABLE_ENTITY.into_response()
        }
    }
}

/// A 200 carrying `body` with caching headers. The body is fully buffered,
/// so `Content-Length` is known before anything is sent.
fn image_response(body: Bytes, cache_time: u64) -> Response {
    let content_type = image::guess_format(&body)
        .map(|format| format.to_mime_type())
        .unwrap_or("application/octet-stream");
    (
        [
            (header::CACHE_CONTROL, format!("public,max-age={cache_time}")),
            (header::VARY, "Accept".to_string()),
            (header::CONTENT_TYPE, content_type.to_string()),
            (header::CONTENT_LENGTH, body.len().to_string()),
        ],
        body,
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manipulator::ManipulateError;
    use crate::metrics::PrometheusMetrics;
    use crate::server::{RouteDecision, build_router, image_routes};
    use crate::test_helpers::{RecordingMetrics, ScriptedStorage, StubManipulator};
    use axum::Router;
    use axum::body::{Body, to_bytes};
    use axum::http::{HeaderMap, Request};
    use std::sync::Arc;
    use tower::ServiceExt;

    const TWELVE: &[u8] = b"twelve bytes";

    struct Harness {
        router: Router,
        storage: Arc<ScriptedStorage>,
        manipulator: Arc<StubManipulator>,
        metrics: Arc<RecordingMetrics>,
    }

    fn harness(storage: ScriptedStorage, manipulator: StubManipulator) -> Harness {
        let storage = Arc::new(storage);
        let manipulator = Arc::new(manipulator);
        let metrics = Arc::new(RecordingMetrics::default());
        let state = AppState {
            storage: storage.clone(),
            manipulator: manipulator.clone(),
            metrics: metrics.clone(),
            cache_time: 60,
        };
        Harness {
            router: image_routes(state, &RouteDecision::CatchAll),
            storage,
            manipulator,
            metrics,
        }
    }

    async fn send(router: &Router, uri: &str) -> (StatusCode, HeaderMap, Vec<u8>) {
        let response = router
            .clone()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, headers, body.to_vec())
    }

    fn header_value<'a>(headers: &'a HeaderMap, name: header::HeaderName) -> &'a str {
        headers.get(name).unwrap().to_str().unwrap()
    }

    #[tokio::test]
    async fn untouched_fetch_is_passed_through() {
        let h = harness(
            ScriptedStorage::new().with_object("/a.jpg", TWELVE),
            StubManipulator::returning(b"never".to_vec()),
        );
        let (status, headers, body) = send(&h.router, "/a.jpg").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, TWELVE);
        assert_eq!(header_value(&headers, header::CACHE_CONTROL), "public,max-age=60");
        assert_eq!(header_value(&headers, header::VARY), "Accept");
        assert_eq!(header_value(&headers, header::CONTENT_LENGTH), "12");
        assert!(h.manipulator.calls().is_empty());
        assert!(h.metrics.events().is_empty());
    }

    #[tokio::test]
    async fn fetch_failure_forwards_status_without_body() {
        let h = harness(
            ScriptedStorage::new().with_failure("/gone.jpg", StatusCode::NOT_FOUND),
            StubManipulator::returning(Vec::new()),
        );
        let (status, _, body) = send(&h.router, "/gone.jpg").await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body.is_empty());
        assert_eq!(h.metrics.events(), vec![HandlerError::StorageFetch]);
        assert!(h.manipulator.calls().is_empty());
    }

    #[tokio::test]
    async fn backend_status_other_than_404_is_forwarded() {
        let h = harness(
            ScriptedStorage::new().with_failure("/a.jpg", StatusCode::SERVICE_UNAVAILABLE),
            StubManipulator::returning(Vec::new()),
        );
        let (status, _, _) = send(&h.router, "/a.jpg").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn unsupported_format_serves_original_bytes() {
        let h = harness(
            ScriptedStorage::new().with_object("/a.bin", TWELVE),
            StubManipulator::failing(|| ManipulateError::UnsupportedFormat),
        );
        let (status, headers, body) = send(&h.router, "/a.bin?w=100").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, TWELVE);
        assert_eq!(header_value(&headers, header::CONTENT_LENGTH), "12");
        assert_eq!(h.metrics.events(), vec![HandlerError::Processor]);
    }

    #[tokio::test]
    async fn other_manipulator_failure_is_422() {
        let h = harness(
            ScriptedStorage::new().with_object("/a.jpg", TWELVE),
            StubManipulator::failing(|| ManipulateError::InvalidParam {
                name: "w".into(),
                value: "-1".into(),
            }),
        );
        let (status, _, body) = send(&h.router, "/a.jpg?w=-1").await;

        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body.is_empty());
        assert_eq!(h.metrics.events(), vec![HandlerError::Processor]);
    }

    #[tokio::test]
    async fn transformed_output_replaces_body() {
        let h = harness(
            ScriptedStorage::new().with_object("/a.jpg", TWELVE),
            StubManipulator::returning(b"small".to_vec()),
        );
        let (status, headers, body) = send(&h.router, "/a.jpg?w=10&h=&fit=crop").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, b"small");
        assert_eq!(header_value(&headers, header::CONTENT_LENGTH), "5");
        assert_eq!(header_value(&headers, header::CONTENT_TYPE), "application/octet-stream");

        let calls = h.manipulator.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0], ParameterMap::from_query_pairs([("w", "10"), ("fit", "crop")]));
    }

    #[tokio::test]
    async fn only_empty_values_still_invoke_manipulator() {
        let h = harness(
            ScriptedStorage::new().with_object("/a.jpg", TWELVE),
            StubManipulator::returning(b"out".to_vec()),
        );
        let (_, _, body) = send(&h.router, "/a.jpg?w=").await;
        assert_eq!(body, b"out");
        assert_eq!(h.manipulator.calls(), vec![ParameterMap::new()]);
    }

    #[tokio::test]
    async fn default_params_force_manipulation() {
        let h = harness(
            ScriptedStorage::new().with_object("/a.jpg", TWELVE),
            StubManipulator::returning(b"defaulted".to_vec()).with_default_params(),
        );
        let (_, _, body) = send(&h.router, "/a.jpg").await;
        assert_eq!(body, b"defaulted");
        assert_eq!(h.manipulator.calls().len(), 1);
    }

    #[tokio::test]
    async fn storage_sees_full_request_path() {
        let h = harness(
            ScriptedStorage::new().with_object("/albums/2024/a.jpg", TWELVE),
            StubManipulator::returning(Vec::new()),
        );
        send(&h.router, "/albums/2024/a.jpg?w=1").await;
        assert_eq!(h.storage.fetched(), vec!["/albums/2024/a.jpg"]);
    }

    #[tokio::test]
    async fn storage_receives_path_still_encoded() {
        let h = harness(
            ScriptedStorage::new().with_object("/a%20b.jpg", TWELVE),
            StubManipulator::returning(Vec::new()),
        );
        let (status, _, body) = send(&h.router, "/a%20b.jpg").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, TWELVE);
        assert_eq!(h.storage.fetched(), vec!["/a%20b.jpg"]);
    }

    #[tokio::test]
    async fn manipulator_panic_is_500_and_server_survives() {
        let storage = Arc::new(ScriptedStorage::new().with_object("/a.jpg", TWELVE));
        let metrics = Arc::new(RecordingMetrics::default());
        let state = AppState {
            storage: storage.clone(),
            manipulator: Arc::new(StubManipulator::panicking("manipulator blew up")),
            metrics: metrics.clone(),
            cache_time: 60,
        };
        let exporter = Arc::new(PrometheusMetrics::new().unwrap());
        let router = build_router(state, &RouteDecision::CatchAll, exporter, None);

        let (status, _, body) = send(&router, "/a.jpg?w=10").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body.is_empty());
        assert!(metrics.events().is_empty());

        let (status, _, body) = send(&router, "/a.jpg").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.len(), 12);
        assert_eq!(storage.fetched(), vec!["/a.jpg", "/a.jpg"]);
    }

    #[test]
    fn content_type_is_sniffed() {
        let png = crate::test_helpers::encoded(
            &crate::test_helpers::gradient_rgb(2, 2),
            image::ImageFormat::Png,
        );
        let response = image_response(Bytes::from(png), 5);
        assert_eq!(header_value(response.headers(), header::CONTENT_TYPE), "image/png");
        assert_eq!(header_value(response.headers(), header::CACHE_CONTROL), "public,max-age=5");
    }
}

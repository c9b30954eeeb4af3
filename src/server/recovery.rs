//! Panic recovery middleware.
//!
//! Wraps every request future in `catch_unwind`. A panic anywhere downstream
//! is logged with the request method and URI and turned into an empty 500;
//! the connection task and the server keep running.

use axum::extract::Request;
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;

pub async fn recover(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    match AssertUnwindSafe(next.run(request)).catch_unwind().await {
        Ok(response) => response,
        Err(payload) => {
            tracing::error!(
                %method,
                %uri,
                panic = panic_message(payload.as_ref()),
                "recovered from panic"
            );
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "non-string panic payload"
    }
}

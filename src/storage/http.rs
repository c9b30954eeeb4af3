//! HTTP origin backend: object stores, CDN distributions and plain web
//! folders, all reached with a GET against `base_url` + path.

use super::{FetchResult, Storage, StorageError, backend_path};
use async_trait::async_trait;
use axum::http::StatusCode;
use std::time::Duration;

pub struct HttpStorage {
    client: reqwest::Client,
    base_url: String,
    path_prefix: String,
}

impl HttpStorage {
    pub fn new(
        base_url: impl Into<String>,
        path_prefix: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, StorageError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| StorageError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            path_prefix: path_prefix.into(),
        })
    }

    pub(crate) fn url_for(&self, path: &str) -> String {
        let path = backend_path(path, &self.path_prefix);
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }
}

fn classify(err: reqwest::Error) -> StorageError {
    if err.is_timeout() {
        StorageError::Timeout(err.to_string())
    } else {
        StorageError::Transport(err.to_string())
    }
}

#[async_trait]
impl Storage for HttpStorage {
    async fn fetch(&self, path: &str) -> FetchResult {
        let url = self.url_for(path);
        let response = self.client.get(&url).send().await.map_err(classify)?;
        let status = response.status();
        if !status.is_success() {
            tracing::debug!(url = %url, status = status.as_u16(), "origin rejected fetch");
            let status =
                StatusCode::from_u16(status.as_u16()).unwrap_or(StatusCode::BAD_GATEWAY);
            return Err(StorageError::Upstream { status });
        }
        response.bytes().await.map_err(classify)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::Router;
    use axum::routing::get;

    async fn spawn_origin() -> String {
        let app = Router::new()
            .route("/bucket/a.jpg", get(|| async { &b"origin-bytes"[..] }))
            .route(
                "/bucket/private.jpg",
                get(|| async { (StatusCode::FORBIDDEN, "no") }),
            );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}/bucket")
    }

    #[test]
    fn url_joins_base_and_stripped_path() {
        let storage =
            HttpStorage::new("https://cdn.example.com/", "/img/", Duration::from_secs(1)).unwrap();
        assert_eq!(storage.url_for("/img/a/b.png"), "https://cdn.example.com/a/b.png");
        assert_eq!(storage.url_for("/other.png"), "https://cdn.example.com/other.png");
    }

    #[tokio::test]
    async fn fetch_success_returns_body() {
        let base = spawn_origin().await;
        let storage = HttpStorage::new(base, "", Duration::from_secs(5)).unwrap();
        let data = storage.fetch("/a.jpg").await.unwrap();
        assert_eq!(data.as_ref(), b"origin-bytes");
    }

    #[tokio::test]
    async fn fetch_forwards_origin_status() {
        let base = spawn_origin().await;
        let storage = HttpStorage::new(base, "", Duration::from_secs(5)).unwrap();
        let missing = storage.fetch("/missing.jpg").await.unwrap_err();
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);
        let private = storage.fetch("/private.jpg").await.unwrap_err();
        assert_eq!(private.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn unreachable_origin_is_bad_gateway() {
        // Bind then drop to get a port nothing listens on.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let storage =
            HttpStorage::new(format!("http://{addr}"), "", Duration::from_secs(2)).unwrap();
        let err = storage.fetch("/a.jpg").await.unwrap_err();
        assert!(matches!(
            err.status(),
            StatusCode::BAD_GATEWAY | StatusCode::GATEWAY_TIMEOUT
        ));
    }
}

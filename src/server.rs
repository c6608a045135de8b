//! Tiny HTTP server that tells callers their own public IP.
//!
//! Meant to sit behind a reverse proxy, which puts the client address in
//! `X-Real-IP` or `X-Forwarded-For`. Another ovh-ddns instance can then use
//! it as its `ip_url`.

use crate::error::Result;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Router;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio::sync::watch;

const SOURCE_HEADERS: [&str; 2] = ["X-Real-IP", "X-Forwarded-For"];

/// Client address reported by the proxy, if any.
///
/// Only the first (client-most) entry of `X-Forwarded-For` is kept.
pub fn source_ip(headers: &HeaderMap) -> Option<String> {
    SOURCE_HEADERS.iter().find_map(|name| {
        let value = headers.get(*name)?.to_str().ok()?;
        let first = value.split(',').next()?.trim();
        (!first.is_empty()).then(|| first.to_string())
    })
}

async fn echo(headers: HeaderMap) -> Response {
    match source_ip(&headers) {
        Some(ip) => (StatusCode::OK, ip).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

/// Every path and method answers with the caller's address.
pub fn router() -> Router {
    Router::new().fallback(echo)
}

/// Bound echo server, ready to serve.
pub struct EchoServer {
    listener: TcpListener,
}

impl EchoServer {
    pub async fn bind(addr: &str) -> Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self { listener })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Serve until `shutdown` changes, then finish in-flight requests.
    pub async fn serve(self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        tracing::info!(addr = %self.local_addr()?, "Server running");

        axum::serve(self.listener, router())
            .with_graceful_shutdown(async move {
                let _ = shutdown.changed().await;
                tracing::info!("Server is shutting down");
            })
            .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_source_ip_prefers_real_ip() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("198.51.100.9"));
        headers.insert("x-real-ip", HeaderValue::from_static("203.0.113.1"));
        assert_eq!(source_ip(&headers), Some("203.0.113.1".to_string()));
    }

    #[test]
    fn test_source_ip_first_forwarded_entry() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("203.0.113.1, 10.0.0.1"),
        );
        assert_eq!(source_ip(&headers), Some("203.0.113.1".to_string()));
    }

    #[test]
    fn test_source_ip_missing() {
        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", HeaderValue::from_static(""));
        assert_eq!(source_ip(&headers), None);
    }

    #[tokio::test]
    async fn test_serve_echo_and_shutdown() {
        let server = EchoServer::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", server.local_addr().unwrap());

        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(server.serve(rx));

        let client = reqwest::Client::new();

        let response = client
            .get(format!("{}/any/path", base))
            .header("X-Real-IP", "203.0.113.1")
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::OK);
        assert_eq!(response.text().await.unwrap(), "203.0.113.1");

        let response = client.get(&base).send().await.unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::NOT_FOUND);
        drop(client);

        tx.send(true).unwrap();
        handle.await.unwrap().unwrap();
    }
}

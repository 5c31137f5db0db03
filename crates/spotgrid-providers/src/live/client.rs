//! Minimal HTTP/1.1 client for live providers.
//!
//! One connection per request over plain TCP, driven by hyper. Timeouts
//! are applied by the caller through [`crate::call_with_retry`].

use bytes::Bytes;
use http::{Method, StatusCode, Uri};
use http_body_util::{BodyExt, Empty};
use tracing::debug;

use crate::error::{ProviderError, ProviderResult};

const USER_AGENT: &str = concat!("spotgrid/", env!("CARGO_PKG_VERSION"));

/// Status and fully buffered body of a response.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: StatusCode,
    pub body: Bytes,
}

impl HttpResponse {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).trim().to_string()
    }

    pub fn json<T: serde::de::DeserializeOwned>(&self) -> ProviderResult<T> {
        serde_json::from_slice(&self.body).map_err(|e| ProviderError::Decode(e.to_string()))
    }
}

/// Issue a request with an empty body and buffer the response.
pub async fn send(method: Method, uri: &str, headers: &[(&str, &str)]) -> ProviderResult<HttpResponse> {
    let parsed: Uri = uri
        .parse()
        .map_err(|e| ProviderError::Unavailable(format!("invalid uri {uri}: {e}")))?;
    if parsed.scheme_str() != Some("http") {
        return Err(ProviderError::Unavailable(format!(
            "unsupported scheme in {uri}; only http:// is supported"
        )));
    }
    let authority = parsed
        .authority()
        .cloned()
        .ok_or_else(|| ProviderError::Unavailable(format!("no host in {uri}")))?;
    let address = format!("{}:{}", authority.host(), authority.port_u16().unwrap_or(80));

    let stream = tokio::net::TcpStream::connect(&address).await.map_err(|e| {
        debug!(error = %e, %uri, "connection failed");
        ProviderError::Unavailable(format!("connect {address}: {e}"))
    })?;

    let io = hyper_util::rt::TokioIo::new(stream);
    let (mut sender, conn) = hyper::client::conn::http1::handshake(io)
        .await
        .map_err(|e| ProviderError::Unavailable(format!("handshake with {address}: {e}")))?;

    // Drive the connection in the background.
    tokio::spawn(async move {
        if let Err(e) = conn.await {
            debug!(error = %e, "http connection closed with error");
        }
    });

    let path = parsed.path_and_query().map_or("/", |p| p.as_str());
    let mut builder = http::Request::builder()
        .method(method)
        .uri(path)
        .header(http::header::HOST, authority.as_str())
        .header(http::header::USER_AGENT, USER_AGENT);
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    let req = builder
        .body(Empty::<Bytes>::new())
        .map_err(|e| ProviderError::Unavailable(format!("build request for {uri}: {e}")))?;

    let resp = sender
        .send_request(req)
        .await
        .map_err(|e| ProviderError::Unavailable(format!("request to {uri}: {e}")))?;
    let status = resp.status();
    let body = resp
        .into_body()
        .collect()
        .await
        .map_err(|e| ProviderError::Unavailable(format!("read body from {uri}: {e}")))?
        .to_bytes();

    debug!(%uri, %status, bytes = body.len(), "http response");
    Ok(HttpResponse { status, body })
}

pub async fn get(uri: &str) -> ProviderResult<HttpResponse> {
    send(Method::GET, uri, &[]).await
}

/// Map a non-2xx status to an error, keeping 404 as `NotFound`.
pub fn expect_success(resp: HttpResponse, uri: &str) -> ProviderResult<HttpResponse> {
    match resp.status {
        s if s.is_success() => Ok(resp),
        StatusCode::NOT_FOUND => Err(ProviderError::NotFound(uri.to_string())),
        s => Err(ProviderError::Status {
            status: s.as_u16(),
            uri: uri.to_string(),
        }),
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fetches_body() {
        let addr = test_server::serve(vec![("GET", "/hello", 200, "world".to_string())]).await;
        let resp = get(&format!("http://{addr}/hello")).await.unwrap();
        assert_eq!(resp.status, StatusCode::OK);
        assert_eq!(resp.text(), "world");
    }

    #[tokio::test]
    async fn maps_statuses() {
        let addr = test_server::serve(vec![("GET", "/boom", 503, String::new())]).await;
        let uri = format!("http://{addr}/missing");
        let missing = get(&uri).await.unwrap();
        assert!(matches!(
            expect_success(missing, &uri),
            Err(ProviderError::NotFound(_))
        ));

        let uri = format!("http://{addr}/boom");
        let boom = get(&uri).await.unwrap();
        assert!(matches!(
            expect_success(boom, &uri),
            Err(ProviderError::Status { status: 503, .. })
        ));
    }

    #[tokio::test]
    async fn rejects_https() {
        let err = get("https://example.com/").await.unwrap_err();
        assert!(matches!(err, ProviderError::Unavailable(_)));
    }

    #[tokio::test]
    async fn unreachable_host_is_unavailable() {
        // Port 9 on localhost is almost never listening.
        let err = get("http://127.0.0.1:9/").await.unwrap_err();
        assert!(err.is_transient());
    }
}

//! Buffered inbound request as seen by hooks and the dispatch pipeline.

use std::error::Error as StdError;

use axum::body::{Body, Bytes};
use axum::http::{header, HeaderMap, HeaderValue, Method, Request, Uri};
use http_body_util::LengthLimitError;

use super::error::GatewayError;

/// An inbound request with its body read into memory.
///
/// The pipeline rewrites the body, URI and headers in place before the
/// request is turned into the upstream call.
#[derive(Debug, Clone)]
pub struct ProxyRequest {
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
    pub body: Bytes,
    /// Headers staged for the outgoing response, whatever it turns out to be.
    pub response_headers: HeaderMap,
}

impl ProxyRequest {
    /// Read `request`'s body, refusing anything larger than `limit` bytes.
    pub async fn from_request(request: Request<Body>, limit: usize) -> Result<Self, GatewayError> {
        let declared = request
            .headers()
            .get(header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<usize>().ok());
        if declared.is_some_and(|len| len > limit) {
            return Err(GatewayError::BodyTooLarge { limit });
        }

        let (parts, body) = request.into_parts();
        let body = axum::body::to_bytes(body, limit).await.map_err(|e| {
            if exceeds_limit(&e) {
                GatewayError::BodyTooLarge { limit }
            } else {
                GatewayError::internal("could not read request body", e)
            }
        })?;

        Ok(Self {
            method: parts.method,
            uri: parts.uri,
            headers: parts.headers,
            body,
            response_headers: HeaderMap::new(),
        })
    }

    /// Build a request directly, mostly for tests and custom handlers.
    pub fn new(method: Method, uri: Uri, body: impl Into<Bytes>) -> Self {
        Self {
            method,
            uri,
            headers: HeaderMap::new(),
            body: body.into(),
            response_headers: HeaderMap::new(),
        }
    }

    pub fn path(&self) -> &str {
        self.uri.path()
    }

    pub fn query(&self) -> Option<&str> {
        self.uri.query()
    }

    /// Replace the body and keep `Content-Length` in step with it.
    pub fn set_body(&mut self, body: Vec<u8>) {
        self.headers
            .insert(header::CONTENT_LENGTH, HeaderValue::from(body.len()));
        self.body = Bytes::from(body);
    }

    /// Turn the (already rewritten) request into the upstream call.
    ///
    /// Always HTTP/1.1, whatever version the caller spoke.
    pub fn to_upstream(&self) -> Result<Request<Body>, GatewayError> {
        let mut builder = Request::builder()
            .method(self.method.clone())
            .uri(self.uri.clone());

        if let Some(headers) = builder.headers_mut() {
            for (name, value) in &self.headers {
                // The client derives these from the target URI and the body.
                if name == header::HOST || name == header::TRANSFER_ENCODING {
                    continue;
                }
                headers.append(name.clone(), value.clone());
            }
        }

        builder
            .body(Body::from(self.body.clone()))
            .map_err(|e| GatewayError::internal("could not proxy request", e))
    }
}

/// Bodies without a declared length only hit the limit while streaming.
fn exceeds_limit(err: &(dyn StdError + 'static)) -> bool {
    let mut current = Some(err);
    while let Some(e) = current {
        if e.is::<LengthLimitError>() {
            return true;
        }
        current = e.source();
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_from_request_buffers_body() {
        let request = Request::builder()
            .method("POST")
            .uri("http://foo.example/eth/v1/beacon/pool/attestations?x=1")
            .body(Body::from("{}"))
            .unwrap();
        let req = ProxyRequest::from_request(request, 1024).await.unwrap();
        assert_eq!(req.method, Method::POST);
        assert_eq!(req.path(), "/eth/v1/beacon/pool/attestations");
        assert_eq!(req.query(), Some("x=1"));
        assert_eq!(&req.body[..], b"{}");
    }

    #[tokio::test]
    async fn test_from_request_enforces_limit() {
        let request = Request::builder()
            .method("POST")
            .uri("/")
            .header("content-length", "2048")
            .body(Body::from(vec![b'a'; 2048]))
            .unwrap();
        let err = ProxyRequest::from_request(request, 1024).await.unwrap_err();
        assert_eq!(err.status_code(), 413);
    }

    #[tokio::test]
    async fn test_from_request_enforces_limit_without_content_length() {
        let chunks = vec![
            Ok::<_, std::io::Error>(Bytes::from(vec![b'a'; 40])),
            Ok(Bytes::from(vec![b'a'; 24])),
        ];
        let request = Request::builder()
            .method("POST")
            .uri("/")
            .body(Body::from_stream(futures_util::stream::iter(chunks)))
            .unwrap();
        assert!(request.headers().get(header::CONTENT_LENGTH).is_none());
        let err = ProxyRequest::from_request(request, 16).await.unwrap_err();
        assert_eq!(err.status_code(), 413);
    }

    #[tokio::test]
    async fn test_body_at_limit_is_accepted() {
        let request = Request::builder()
            .method("POST")
            .uri("/")
            .body(Body::from(vec![b'a'; 16]))
            .unwrap();
        let req = ProxyRequest::from_request(request, 16).await.unwrap();
        assert_eq!(req.body.len(), 16);
    }

    #[test]
    fn test_set_body_updates_content_length() {
        let mut req = ProxyRequest::new(Method::POST, Uri::from_static("/"), "");
        req.set_body(br#"{"TestString":"test string","TestHexString":"0x666F6F"}"#.to_vec());
        assert_eq!(req.headers.get(header::CONTENT_LENGTH).unwrap(), "55");
        assert_eq!(req.body.len(), 55);
    }

    #[test]
    fn test_to_upstream_drops_host() {
        let mut req = ProxyRequest::new(Method::GET, Uri::from_static("http://127.0.0.1:3500/internal/x"), "");
        req.headers.insert(header::HOST, HeaderValue::from_static("public.example"));
        req.headers.insert("x-custom", HeaderValue::from_static("1"));
        let upstream = req.to_upstream().unwrap();
        assert!(upstream.headers().get(header::HOST).is_none());
        assert_eq!(upstream.headers().get("x-custom").unwrap(), "1");
        assert_eq!(upstream.uri(), "http://127.0.0.1:3500/internal/x");
    }
}

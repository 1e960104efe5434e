//! The per-request pipeline.
//!
//! # Data Flow
//! ```text
//! inbound request
//!     → factory.create(path)          fresh descriptor
//!     → custom handlers               may short-circuit
//!     → POST / non-empty DELETE       hooks, strict decode, hex → base64, re-encode
//!     → rewrite URI                   upstream address, /internal prefix, params
//!     → proxy                         bounded by the request timeout
//!     → non-empty body?
//!         error message set?          write upstream error, done
//!         hooks, lenient decode, base64 → hex / enum / time, encode
//!     → write headers, status, body
//! ```
//!
//! Any failure before the response is written is turned into a wire error
//! by [`write_gateway_error`].

use std::error::Error as StdError;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::body::{Body, Bytes};
use axum::http::{header, HeaderMap, HeaderValue, Method, Request, StatusCode};
use axum::response::Response;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;

use super::endpoint::{Endpoint, EndpointFactory};
use super::error::{BoxedError, DefaultError, ErrorJson, GatewayError};
use super::hooks::{HookAction, Hooks, SerializeAction};
use super::params::rewrite_request_uri;
use super::request::ProxyRequest;
use crate::config::GatewayConfig;
use crate::http::request::request_id;
use crate::http::response::{
    copy_headers, response_is_empty, write_error, write_gateway_error, write_middleware_response,
};
use crate::observability::metrics;
use crate::payload::{process_request_fields, process_response_fields, DecodeMode, Payload};

/// Upstream response with its body fully read.
#[derive(Debug, Clone)]
pub struct UpstreamResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// Translating proxy in front of the gRPC-gateway.
pub struct Gateway {
    upstream_address: String,
    path_prefix: String,
    timeout: Duration,
    max_body_size: usize,
    factory: Arc<dyn EndpointFactory>,
    client: Client<HttpConnector, Body>,
}

impl Gateway {
    pub fn new(config: &GatewayConfig, factory: Arc<dyn EndpointFactory>) -> Self {
        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(Duration::from_secs(config.timeouts.connect_secs)));
        let client = Client::builder(TokioExecutor::new()).build(connector);

        Self {
            upstream_address: config.upstream.address.clone(),
            path_prefix: config.upstream.path_prefix.clone(),
            timeout: Duration::from_secs(config.timeouts.request_secs),
            max_body_size: config.security.max_body_size,
            factory,
            client,
        }
    }

    pub fn factory(&self) -> &Arc<dyn EndpointFactory> {
        &self.factory
    }

    pub fn upstream_address(&self) -> &str {
        &self.upstream_address
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Point `request` at the upstream, re-encoding path and query parameters.
    pub fn prepare_request_for_proxying(
        &self,
        endpoint: &Endpoint,
        request: &mut ProxyRequest,
    ) -> Result<(), GatewayError> {
        rewrite_request_uri(endpoint, request, &self.upstream_address, &self.path_prefix)
    }

    /// Send `request` upstream and read the whole response.
    ///
    /// The request timeout covers both the call and the body read.
    pub async fn proxy_request(&self, request: &ProxyRequest) -> Result<UpstreamResponse, GatewayError> {
        let upstream_request = request.to_upstream()?;
        let deadline = tokio::time::Instant::now() + self.timeout;

        let response = match tokio::time::timeout_at(deadline, self.client.request(upstream_request)).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) if is_timeout(&e) => {
                metrics::record_upstream_error("timeout");
                return Err(GatewayError::Timeout);
            }
            Ok(Err(e)) => {
                metrics::record_upstream_error("connect");
                return Err(GatewayError::internal("could not proxy request", e));
            }
            Err(_) => {
                metrics::record_upstream_error("timeout");
                return Err(GatewayError::Timeout);
            }
        };

        let (parts, body): (_, hyper::body::Incoming) = response.into_parts();
        let body = match tokio::time::timeout_at(deadline, axum::body::to_bytes(Body::new(body), usize::MAX)).await {
            Ok(Ok(bytes)) => bytes,
            Ok(Err(e)) => {
                metrics::record_upstream_error("body");
                return Err(GatewayError::internal("could not read response body", e));
            }
            Err(elapsed) => {
                metrics::record_upstream_error("body");
                return Err(GatewayError::internal("could not read response body", elapsed));
            }
        };

        Ok(UpstreamResponse {
            status: parts.status,
            headers: parts.headers,
            body,
        })
    }

    /// Serve one request bound to the template `path`.
    pub async fn handle(&self, path: &str, request: Request<Body>) -> Response {
        let start = Instant::now();
        let method = request.method().clone();
        let request_id = request_id(request.headers()).to_string();

        tracing::debug!(
            request_id = %request_id,
            method = %method,
            path = %request.uri().path(),
            template = %path,
            "Proxying request"
        );

        let mut endpoint = match self.factory.create(path) {
            Ok(endpoint) => endpoint,
            Err(e) => {
                tracing::error!(request_id = %request_id, error = %e, "Could not create endpoint");
                metrics::record_request(path, method.as_str(), 500, start);
                return empty_response(StatusCode::INTERNAL_SERVER_ERROR);
            }
        };

        let mut request = match ProxyRequest::from_request(request, self.max_body_size).await {
            Ok(request) => request,
            Err(e) => return self.finish_with_error(e, path, &method, &request_id, start, None),
        };

        let result = self.run(&mut endpoint, &mut request).await;
        match result {
            Ok(mut response) => {
                apply_staged_headers(&request.response_headers, response.headers_mut());
                metrics::record_request(path, method.as_str(), response.status().as_u16(), start);
                response
            }
            Err(e) => self.finish_with_error(e, path, &method, &request_id, start, Some(&request.response_headers)),
        }
    }

    fn finish_with_error(
        &self,
        err: GatewayError,
        path: &str,
        method: &Method,
        request_id: &str,
        start: Instant,
        staged: Option<&HeaderMap>,
    ) -> Response {
        let status = err.status_code();
        if status >= 500 {
            tracing::error!(request_id = %request_id, status, error = %err, "Request failed");
        } else {
            tracing::warn!(request_id = %request_id, status, error = %err, "Request rejected");
        }

        let mut response = write_gateway_error(err);
        if let Some(staged) = staged {
            apply_staged_headers(staged, response.headers_mut());
        }
        metrics::record_request(path, method.as_str(), response.status().as_u16(), start);
        response
    }

    async fn run(&self, endpoint: &mut Endpoint, request: &mut ProxyRequest) -> Result<Response, GatewayError> {
        for handler in &endpoint.custom_handlers {
            if let Some(response) = handler.handle(self, endpoint, request).await {
                return Ok(response);
            }
        }

        if request.method == Method::POST {
            handle_post_request_body(endpoint, request)?;
        } else if request.method == Method::DELETE && !request.body.is_empty() {
            handle_delete_request_body(endpoint, request)?;
        }

        self.prepare_request_for_proxying(endpoint, request)?;
        let upstream = self.proxy_request(request).await?;

        let mut body = Vec::new();
        if !response_is_empty(&upstream.body) {
            if let Some(response) = handle_upstream_error(&mut endpoint.err, &upstream)? {
                return Ok(response);
            }

            let hooks = endpoint.hooks.clone();
            let method = request.method.clone();
            let container = endpoint.response_container_mut(&method).ok_or_else(|| {
                GatewayError::internal(
                    "could not unmarshal response",
                    format!("endpoint declares no {method} response shape"),
                )
            })?;
            deserialize_upstream_response(&hooks, &upstream.body, container)?;
            process_response_fields(container)
                .map_err(|e| GatewayError::internal("could not process response data", e))?;
            body = serialize_middleware_response(&hooks, container)?;
        }

        write_middleware_response(upstream.status, &upstream.headers, body)
    }
}

impl std::fmt::Debug for Gateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gateway")
            .field("upstream_address", &self.upstream_address)
            .field("path_prefix", &self.path_prefix)
            .field("timeout", &self.timeout)
            .field("max_body_size", &self.max_body_size)
            .finish_non_exhaustive()
    }
}

fn missing_shape(method: &str) -> GatewayError {
    GatewayError::internal(
        "could not decode request body",
        format!("endpoint declares no {method} request shape"),
    )
}

/// Hooks, strict decode and hex → base64 for a POST body.
pub fn handle_post_request_body(endpoint: &mut Endpoint, request: &mut ProxyRequest) -> Result<(), GatewayError> {
    let mut action = HookAction::RunDefault;
    if let Some(hook) = endpoint.hooks.on_pre_deserialize_request_body.clone() {
        action = hook(endpoint, request)?;
    }
    if action == HookAction::RunDefault {
        let container = endpoint.post_request.as_mut().ok_or_else(|| missing_shape("POST"))?;
        container
            .decode(&request.body, DecodeMode::Strict)
            .map_err(GatewayError::decode)?;
    }
    if let Some(hook) = endpoint.hooks.on_post_deserialize_request_body.clone() {
        hook(endpoint, request)?;
    }

    let container = endpoint.post_request.as_mut().ok_or_else(|| missing_shape("POST"))?;
    process_request_fields(container).map_err(|e| GatewayError::internal("could not process request data", e))?;
    set_request_body_to_container(container, request)
}

/// Strict decode and hex → base64 for a DELETE body. No hooks run here.
pub fn handle_delete_request_body(endpoint: &mut Endpoint, request: &mut ProxyRequest) -> Result<(), GatewayError> {
    let container = endpoint.delete_request.as_mut().ok_or_else(|| missing_shape("DELETE"))?;
    container
        .decode(&request.body, DecodeMode::Strict)
        .map_err(GatewayError::decode)?;
    process_request_fields(container).map_err(|e| GatewayError::internal("could not process request data", e))?;
    set_request_body_to_container(container, request)
}

/// Encode `container` as the outgoing request body.
pub fn set_request_body_to_container(container: &Payload, request: &mut ProxyRequest) -> Result<(), GatewayError> {
    let body = container
        .encode()
        .map_err(|e| GatewayError::internal("could not marshal request body", e))?;
    request.set_body(body);
    Ok(())
}

/// Project an upstream error body, if it carries one.
///
/// Returns `Ok(None)` when the parsed message is empty, i.e. the body is a
/// regular response.
pub fn handle_upstream_error(
    err: &mut BoxedError,
    upstream: &UpstreamResponse,
) -> Result<Option<Response>, GatewayError> {
    err.merge_json(&upstream.body)
        .map_err(|e| GatewayError::internal("could not unmarshal error message", e))?;
    if err.message().is_empty() {
        return Ok(None);
    }

    if upstream.status == StatusCode::GATEWAY_TIMEOUT {
        *err = Box::new(DefaultError::timeout());
    } else {
        err.set_status_code(upstream.status.as_u16());
    }

    let mut response = write_error(err.as_mut(), Some(&upstream.headers));
    copy_headers(&upstream.headers, response.headers_mut());
    Ok(Some(response))
}

/// Fill `container` from the upstream body unless a hook already did.
pub fn deserialize_upstream_response(
    hooks: &Hooks,
    body: &[u8],
    container: &mut Payload,
) -> Result<(), GatewayError> {
    let mut action = HookAction::RunDefault;
    if let Some(hook) = &hooks.on_pre_deserialize_grpc_response {
        action = hook(body, container)?;
    }
    if action == HookAction::RunDefault {
        container
            .decode(body, DecodeMode::Lenient)
            .map_err(|e| GatewayError::internal("could not unmarshal response", e))?;
    }
    Ok(())
}

/// Encode the response body unless a hook supplies it.
pub fn serialize_middleware_response(hooks: &Hooks, container: &Payload) -> Result<Vec<u8>, GatewayError> {
    if let Some(hook) = &hooks.on_pre_serialize_middleware_response {
        if let SerializeAction::Replace(bytes) = hook(container)? {
            return Ok(bytes);
        }
    }
    container
        .encode()
        .map_err(|e| GatewayError::internal("could not marshal response", e))
}

fn apply_staged_headers(staged: &HeaderMap, headers: &mut HeaderMap) {
    for (name, value) in staged {
        headers.insert(name.clone(), value.clone());
    }
}

fn empty_response(status: StatusCode) -> Response {
    let mut response = Response::new(Body::empty());
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(header::CONTENT_LENGTH, HeaderValue::from_static("0"));
    response
}

/// True when `err` or anything it wraps is an I/O timeout.
fn is_timeout(err: &(dyn StdError + 'static)) -> bool {
    let mut current = Some(err);
    while let Some(e) = current {
        if let Some(io) = e.downcast_ref::<std::io::Error>() {
            if io.kind() == std::io::ErrorKind::TimedOut {
                return true;
            }
        }
        current = e.source();
    }
    false
}

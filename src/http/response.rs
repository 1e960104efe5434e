//! Response projection.
//!
//! # Responsibilities
//! - Write wire errors (`{"message", "code"}` plus endpoint fields)
//! - Strip gRPC metadata headers from upstream responses
//! - Apply the `Grpc-Metadata-X-Http-Code` status override
//! - Set `Content-Length` on everything written
//!
//! # Design Decisions
//! - Upstream errors are written with the default two-field envelope unless
//!   the upstream sent `Grpc-Metadata-Custom-Error`; otherwise optional
//!   endpoint fields would leak with empty values
//! - Hop-by-hop headers and the upstream `Content-Length` are never copied,
//!   since the body is re-encoded

use axum::body::Body;
use axum::http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::Response;

use crate::gateway::error::{DefaultError, ErrorJson, GatewayError};

/// Prefix shared by every gRPC metadata header.
pub const GRPC_METADATA_PREFIX: &str = "grpc-metadata";

/// Upstream header carrying the HTTP status the handler asked for.
pub const HTTP_CODE_METADATA: &str = "grpc-metadata-x-http-code";

/// Upstream header carrying endpoint-specific error fields as JSON.
pub const CUSTOM_ERROR_METADATA: &str = "grpc-metadata-custom-error";

/// Both a zero-length body and `{}` count as empty.
pub fn response_is_empty(body: &[u8]) -> bool {
    body.is_empty() || body == b"{}"
}

fn is_hop_by_hop(name: &HeaderName) -> bool {
    name == header::CONNECTION
        || name == header::TRANSFER_ENCODING
        || name == header::CONTENT_LENGTH
        || name.as_str() == "keep-alive"
}

/// Copy `from` into `to`, skipping hop-by-hop headers and names `to`
/// already carries.
pub fn copy_headers(from: &HeaderMap, to: &mut HeaderMap) {
    let preset: Vec<HeaderName> = to.keys().cloned().collect();
    for (name, value) in from {
        if is_hop_by_hop(name) || preset.contains(name) {
            continue;
        }
        to.append(name.clone(), value.clone());
    }
}

fn json_response(status: StatusCode, body: Vec<u8>) -> Response {
    let mut response = Response::new(Body::from(body.clone()));
    *response.status_mut() = status;
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(body.len()));
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}

/// Serialize `err` as the response.
///
/// With `upstream_headers` carrying the custom-error metadata, its JSON is
/// merged into `err` and the full endpoint shape is written. Otherwise only
/// the default envelope is.
pub fn write_error(err: &mut dyn ErrorJson, upstream_headers: Option<&HeaderMap>) -> Response {
    let custom = upstream_headers.and_then(|h| h.get(CUSTOM_ERROR_METADATA));

    let mut has_custom_error = false;
    if let Some(value) = custom {
        match err.merge_json(value.as_bytes()) {
            Ok(()) => has_custom_error = true,
            Err(e) => tracing::error!(error = %e, "Could not unmarshal custom error message"),
        }
    }

    let body = if has_custom_error {
        err.to_json()
    } else {
        DefaultError::new(err.status_code(), err.message()).to_json()
    };
    let status = StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

    match body {
        Ok(body) => json_response(status, body),
        Err(e) => {
            tracing::error!(error = %e, "Could not marshal error message");
            let mut response = Response::new(Body::empty());
            *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
            response
                .headers_mut()
                .insert(header::CONTENT_LENGTH, HeaderValue::from_static("0"));
            response
        }
    }
}

/// Write a pipeline failure.
pub fn write_gateway_error(err: GatewayError) -> Response {
    let mut wire = err.into_error_json();
    write_error(wire.as_mut(), None)
}

fn parse_status_override(value: &HeaderValue) -> Result<StatusCode, GatewayError> {
    let context = "could not parse status code";
    let text = value.to_str().map_err(|e| GatewayError::internal(context, e))?;
    let code = text.trim().parse::<u16>().map_err(|e| GatewayError::internal(context, e))?;
    StatusCode::from_u16(code).map_err(|e| GatewayError::internal(context, e))
}

/// Build the success response from the upstream status and headers.
///
/// `Grpc-Metadata-*` headers are dropped; `Grpc-Metadata-X-Http-Code`
/// overrides the status when the body is non-empty.
pub fn write_middleware_response(
    upstream_status: StatusCode,
    upstream_headers: &HeaderMap,
    body: Vec<u8>,
) -> Result<Response, GatewayError> {
    let mut headers = HeaderMap::new();
    let mut status_override = None;
    for (name, value) in upstream_headers {
        if name.as_str().starts_with(GRPC_METADATA_PREFIX) {
            if name.as_str() == HTTP_CODE_METADATA && status_override.is_none() {
                status_override = Some(value.clone());
            }
            continue;
        }
        if is_hop_by_hop(name) {
            continue;
        }
        headers.append(name.clone(), value.clone());
    }

    let status = if response_is_empty(&body) {
        upstream_status
    } else {
        match &status_override {
            Some(value) => parse_status_override(value)?,
            None => upstream_status,
        }
    };
    // An empty body is written as such, even when it was `{}`.
    let body = if response_is_empty(&body) { Vec::new() } else { body };

    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(body.len()));
    let mut response = Response::new(Body::from(body));
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    Ok(response)
}

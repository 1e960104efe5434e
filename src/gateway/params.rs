//! Path and query parameter rewriting.
//!
//! The gRPC-gateway expects byte strings as base64, while the REST API
//! carries them as `0x` hex. Non-literal path parameters and hex-flagged
//! query parameters are re-encoded with URL-safe base64 so the result never
//! breaks the URL; enum-flagged query parameters are lowercased.

use axum::http::Uri;
use url::{form_urlencoded, Url};

use super::endpoint::{Endpoint, QueryParam};
use super::error::GatewayError;
use super::request::ProxyRequest;
use crate::payload::transforms::url_value_to_base64;
use crate::routing::template::{PathTemplate, Segment};

/// Re-encode the non-literal `{name}` segments of `path` against
/// `endpoint`'s template. A path the template does not match is an error.
pub fn handle_url_parameters(endpoint: &Endpoint, path: &str) -> Result<String, GatewayError> {
    let template = PathTemplate::parse(&endpoint.path)
        .map_err(|e| GatewayError::internal("could not process URL parameter", e))?;
    let captures = template.captures(path).ok_or_else(|| {
        GatewayError::internal(
            "could not process URL parameter",
            format!("path {path:?} does not match template {template}"),
        )
    })?;

    let mut captures = captures.into_iter();
    let mut rewritten = String::with_capacity(path.len());
    for segment in template.segments() {
        rewritten.push('/');
        match segment {
            Segment::Literal(lit) => rewritten.push_str(lit),
            Segment::Param(_) => {
                let Some((name, value)) = captures.next() else {
                    break;
                };
                if endpoint.is_literal(name) {
                    rewritten.push_str(value);
                } else {
                    let encoded = url_value_to_base64(value)
                        .map_err(|e| GatewayError::internal("could not process URL parameter", e))?;
                    rewritten.push_str(&encoded);
                }
            }
        }
    }

    Ok(rewritten)
}

/// Rewrite query values per `params`. Returns `None` when nothing is left.
///
/// Comma-separated values are split into repeated keys first, so
/// `id=1,2` becomes `id=1&id=2`.
pub fn handle_query_parameters(query: Option<&str>, params: &[QueryParam]) -> Result<Option<String>, GatewayError> {
    let Some(query) = query else {
        return Ok(None);
    };

    let mut pairs: Vec<(String, String)> = Vec::new();
    for (key, value) in form_urlencoded::parse(query.as_bytes()) {
        for part in value.split(',') {
            pairs.push((key.to_string(), part.to_string()));
        }
    }

    for (key, value) in pairs.iter_mut() {
        let Some(param) = params.iter().find(|p| p.name == *key) else {
            continue;
        };
        if param.enumeration {
            *value = value.to_lowercase();
        }
        if param.hex {
            *value = url_value_to_base64(value.as_str())
                .map_err(|e| GatewayError::internal("could not process query parameter", e))?;
        }
    }

    if pairs.is_empty() {
        return Ok(None);
    }
    Ok(Some(
        form_urlencoded::Serializer::new(String::new())
            .extend_pairs(pairs)
            .finish(),
    ))
}

/// Point `request` at the upstream.
///
/// Parameters are rewritten before `prefix` is prepended, since the prefix
/// shifts the path segments away from the template.
pub fn rewrite_request_uri(
    endpoint: &Endpoint,
    request: &mut ProxyRequest,
    upstream: &str,
    prefix: &str,
) -> Result<(), GatewayError> {
    let path = handle_url_parameters(endpoint, request.path())?;
    let query = handle_query_parameters(request.query(), &endpoint.request_query_params)?;

    let mut url = Url::parse(&format!("http://{upstream}"))
        .map_err(|e| GatewayError::internal("could not proxy request", e))?;
    url.set_path(&format!("{prefix}{path}"));
    url.set_query(query.as_deref());

    request.uri = url
        .as_str()
        .parse::<Uri>()
        .map_err(|e| GatewayError::internal("could not proxy request", e))?;
    Ok(())
}

//! Route binding.
//!
//! # Responsibilities
//! - Bind every factory path to the dispatch pipeline, for all methods
//! - Reject malformed or conflicting templates before axum sees them
//! - Refuse to start without a factory
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks)
//! - Two templates differing only in placeholder names conflict
//! - Unbound paths fall through to axum's empty 404

use std::collections::HashMap;
use std::sync::Arc;

use axum::body::Body;
use axum::http::Request;
use axum::routing::any;
use thiserror::Error;

use super::template::{PathTemplate, Segment, TemplateError};
use crate::gateway::Gateway;

#[derive(Debug, Error)]
pub enum RouteError {
    #[error("endpoint factory is nil")]
    NilFactory,

    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error("path {path:?} conflicts with {existing:?}")]
    Conflict { path: String, existing: String },
}

/// Template with placeholder names erased, e.g. `/eth/{}/x`.
fn route_key(template: &PathTemplate) -> String {
    let mut key = String::new();
    for segment in template.segments() {
        key.push('/');
        match segment {
            Segment::Literal(lit) => key.push_str(lit),
            Segment::Param(_) => key.push_str("{}"),
        }
    }
    key
}

/// Build the axum router for `gateway`'s factory.
pub fn bind_routes(gateway: Arc<Gateway>) -> Result<axum::Router, RouteError> {
    let factory = gateway.factory().clone();
    if factory.is_nil() {
        return Err(RouteError::NilFactory);
    }

    let mut seen: HashMap<String, String> = HashMap::new();
    let mut router = axum::Router::new();
    for path in factory.paths() {
        let template = PathTemplate::parse(&path)?;
        if let Some(existing) = seen.insert(route_key(&template), path.clone()) {
            return Err(RouteError::Conflict { path, existing });
        }

        let gateway = gateway.clone();
        let bound = path.clone();
        router = router.route(
            &path,
            any(move |request: Request<Body>| {
                let gateway = gateway.clone();
                let bound = bound.clone();
                async move { gateway.handle(&bound, request).await }
            }),
        );
        tracing::debug!(path = %path, "Bound endpoint");
    }

    Ok(router)
}

//! Endpoint descriptors and the factory that mints them.

use std::fmt;
use std::sync::Arc;

use axum::http::Method;
use thiserror::Error;

use super::error::{BoxedError, DefaultError};
use super::hooks::{CustomHandler, Hooks};
use crate::payload::Payload;

/// Canonicalisation applied to one query parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryParam {
    pub name: String,
    /// Values are hex and are re-encoded as URL-safe base64.
    pub hex: bool,
    /// Values are enum names and are lowercased.
    pub enumeration: bool,
}

impl QueryParam {
    pub fn new(name: impl Into<String>, hex: bool, enumeration: bool) -> Self {
        Self {
            name: name.into(),
            hex,
            enumeration,
        }
    }

    pub fn hex(name: impl Into<String>) -> Self {
        Self::new(name, true, false)
    }

    pub fn enumeration(name: impl Into<String>) -> Self {
        Self::new(name, false, true)
    }
}

/// Everything the dispatch pipeline needs to know about one proxied path.
///
/// Containers are filled in place while a request is processed, so a
/// descriptor must never outlive the request it was created for.
pub struct Endpoint {
    /// URL template with `{name}` placeholders.
    pub path: String,
    pub get_response: Option<Payload>,
    pub post_request: Option<Payload>,
    pub post_response: Option<Payload>,
    pub delete_request: Option<Payload>,
    pub delete_response: Option<Payload>,
    /// Placeholders forwarded as-is instead of being base64 encoded.
    pub request_url_literals: Vec<String>,
    pub request_query_params: Vec<QueryParam>,
    /// Error shape upstream error bodies are parsed into.
    pub err: BoxedError,
    pub hooks: Hooks,
    pub custom_handlers: Vec<Arc<dyn CustomHandler>>,
}

impl Endpoint {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            get_response: None,
            post_request: None,
            post_response: None,
            delete_request: None,
            delete_response: None,
            request_url_literals: Vec::new(),
            request_query_params: Vec::new(),
            err: Box::new(DefaultError::default()),
            hooks: Hooks::default(),
            custom_handlers: Vec::new(),
        }
    }

    /// Container the upstream success body is decoded into for `method`.
    pub fn response_container_mut(&mut self, method: &Method) -> Option<&mut Payload> {
        if method == Method::GET {
            self.get_response.as_mut()
        } else if method == Method::DELETE {
            self.delete_response.as_mut()
        } else {
            self.post_response.as_mut()
        }
    }

    pub fn is_literal(&self, name: &str) -> bool {
        self.request_url_literals.iter().any(|l| l == name)
    }
}

impl fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Endpoint")
            .field("path", &self.path)
            .field("get_response", &self.get_response.as_ref().map(|p| p.shape().name()))
            .field("post_request", &self.post_request.as_ref().map(|p| p.shape().name()))
            .field("post_response", &self.post_response.as_ref().map(|p| p.shape().name()))
            .field("delete_request", &self.delete_request.as_ref().map(|p| p.shape().name()))
            .field("delete_response", &self.delete_response.as_ref().map(|p| p.shape().name()))
            .field("request_url_literals", &self.request_url_literals)
            .field("request_query_params", &self.request_query_params)
            .field("err", &self.err)
            .field("hooks", &self.hooks)
            .field("custom_handlers", &self.custom_handlers.len())
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum FactoryError {
    #[error("invalid path: {0}")]
    UnknownPath(String),

    #[error("could not create endpoint for {path}: {reason}")]
    Creation { path: String, reason: String },
}

/// Source of endpoint descriptors.
///
/// Consulted once at startup for [`paths`](Self::paths) and once per request
/// for a fresh descriptor.
pub trait EndpointFactory: Send + Sync {
    fn paths(&self) -> Vec<String>;

    fn create(&self, path: &str) -> Result<Endpoint, FactoryError>;

    /// True when the factory carries no endpoints at all.
    fn is_nil(&self) -> bool {
        false
    }
}

type Constructor = Arc<dyn Fn() -> Endpoint + Send + Sync>;

/// Factory backed by a list of `path → constructor` pairs.
#[derive(Clone, Default)]
pub struct RegistryFactory {
    entries: Vec<(String, Constructor)>,
}

impl RegistryFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `constructor` for `path`. A later registration for the same
    /// path replaces the earlier one.
    pub fn register<F>(mut self, path: impl Into<String>, constructor: F) -> Self
    where
        F: Fn() -> Endpoint + Send + Sync + 'static,
    {
        let path = path.into();
        self.entries.retain(|(p, _)| *p != path);
        self.entries.push((path, Arc::new(constructor)));
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for RegistryFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.entries.iter().map(|(p, _)| p)).finish()
    }
}

impl EndpointFactory for RegistryFactory {
    fn paths(&self) -> Vec<String> {
        self.entries.iter().map(|(p, _)| p.clone()).collect()
    }

    fn create(&self, path: &str) -> Result<Endpoint, FactoryError> {
        let (registered, constructor) = self
            .entries
            .iter()
            .find(|(p, _)| p == path)
            .ok_or_else(|| FactoryError::UnknownPath(path.to_string()))?;

        let mut endpoint = constructor();
        if endpoint.path != *registered {
            endpoint.path = registered.clone();
        }
        Ok(endpoint)
    }

    fn is_nil(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::{DecodeMode, Shape};

    fn factory() -> RegistryFactory {
        let shape = Shape::new("Version").string("version").build();
        RegistryFactory::new()
            .register("/eth/v1/node/version", move || {
                let mut e = Endpoint::new("/eth/v1/node/version");
                e.get_response = Some(Payload::new(shape.clone()));
                e
            })
            .register("/eth/v1/beacon/headers/{block_id}", || Endpoint::new(""))
    }

    #[test]
    fn test_paths_in_registration_order() {
        assert_eq!(
            factory().paths(),
            vec!["/eth/v1/node/version", "/eth/v1/beacon/headers/{block_id}"]
        );
    }

    #[test]
    fn test_create_returns_fresh_descriptors() {
        let factory = factory();
        let mut first = factory.create("/eth/v1/node/version").unwrap();
        first
            .get_response
            .as_mut()
            .unwrap()
            .decode(br#"{"version":"v1"}"#, DecodeMode::Strict)
            .unwrap();

        let second = factory.create("/eth/v1/node/version").unwrap();
        assert_eq!(second.get_response.as_ref().unwrap().get("version"), None);
    }

    #[test]
    fn test_create_fills_in_path() {
        let endpoint = factory().create("/eth/v1/beacon/headers/{block_id}").unwrap();
        assert_eq!(endpoint.path, "/eth/v1/beacon/headers/{block_id}");
        assert_eq!(endpoint.err.status_code(), 0);
    }

    #[test]
    fn test_unknown_path() {
        let err = factory().create("/nope").unwrap_err();
        assert_eq!(err.to_string(), "invalid path: /nope");
    }

    #[test]
    fn test_nil_check() {
        assert!(RegistryFactory::new().is_nil());
        assert!(!factory().is_nil());
    }

    #[test]
    fn test_response_container_by_method() {
        let shape = Shape::new("S").build();
        let mut e = Endpoint::new("/x");
        e.get_response = Some(Payload::new(Shape::new("Get").build()));
        e.post_response = Some(Payload::new(shape.clone()));
        e.delete_response = Some(Payload::new(Shape::new("Delete").build()));

        assert_eq!(e.response_container_mut(&Method::GET).unwrap().shape().name(), "Get");
        assert_eq!(e.response_container_mut(&Method::POST).unwrap().shape().name(), "S");
        assert_eq!(e.response_container_mut(&Method::DELETE).unwrap().shape().name(), "Delete");
    }
}

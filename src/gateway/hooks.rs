//! Per-endpoint interception points.
//!
//! Hooks run on the request's own task, in pipeline order:
//!
//! ```text
//! pre-deserialize-request-body → [default decode] → post-deserialize-request-body
//! ... proxy ...
//! pre-deserialize-grpc-response → [default decode] → response field processing
//! pre-serialize-middleware-response → [default encode]
//! ```
//!
//! A hook returning an error aborts the pipeline and the error is written
//! as the response. The post-deserialize hook runs whether or not the
//! default decode ran.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use axum::response::Response;

use super::dispatch::Gateway;
use super::endpoint::Endpoint;
use super::error::BoxedError;
use super::request::ProxyRequest;
use crate::payload::Payload;

/// Whether the default step after a hook should still run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HookAction {
    #[default]
    RunDefault,
    SkipDefault,
}

/// Result of the pre-serialize hook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SerializeAction {
    RunDefault,
    /// Use these bytes as the response body instead of encoding the container.
    Replace(Vec<u8>),
}

pub type PreDeserializeRequestHook =
    Arc<dyn Fn(&mut Endpoint, &mut ProxyRequest) -> Result<HookAction, BoxedError> + Send + Sync>;

pub type PostDeserializeRequestHook =
    Arc<dyn Fn(&mut Endpoint, &mut ProxyRequest) -> Result<(), BoxedError> + Send + Sync>;

pub type PreDeserializeGrpcHook =
    Arc<dyn Fn(&[u8], &mut Payload) -> Result<HookAction, BoxedError> + Send + Sync>;

pub type PreSerializeHook = Arc<dyn Fn(&Payload) -> Result<SerializeAction, BoxedError> + Send + Sync>;

#[derive(Clone, Default)]
pub struct Hooks {
    pub on_pre_deserialize_request_body: Option<PreDeserializeRequestHook>,
    pub on_post_deserialize_request_body: Option<PostDeserializeRequestHook>,
    pub on_pre_deserialize_grpc_response: Option<PreDeserializeGrpcHook>,
    pub on_pre_serialize_middleware_response: Option<PreSerializeHook>,
}

impl fmt::Debug for Hooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hooks")
            .field("on_pre_deserialize_request_body", &self.on_pre_deserialize_request_body.is_some())
            .field("on_post_deserialize_request_body", &self.on_post_deserialize_request_body.is_some())
            .field("on_pre_deserialize_grpc_response", &self.on_pre_deserialize_grpc_response.is_some())
            .field(
                "on_pre_serialize_middleware_response",
                &self.on_pre_serialize_middleware_response.is_some(),
            )
            .finish()
    }
}

/// Full replacement of the default pipeline for one endpoint.
///
/// Returning `Some(response)` marks the request as handled; nothing else
/// runs for it. `None` hands the request to the next handler or to the
/// default pipeline.
#[async_trait]
pub trait CustomHandler: Send + Sync {
    async fn handle(
        &self,
        gateway: &Gateway,
        endpoint: &Endpoint,
        request: &mut ProxyRequest,
    ) -> Option<Response>;
}

//! REST ↔ gRPC-gateway translation.
//!
//! # Data Flow
//! ```text
//! EndpointFactory (endpoint.rs)
//!     → fresh Endpoint per request
//!     → dispatch.rs pipeline
//!         request.rs   buffered inbound request
//!         hooks.rs     per-endpoint interception
//!         params.rs    path/query re-encoding
//!         error.rs     wire error model
//! ```
//!
//! # Design Decisions
//! - Descriptors are never shared between requests; containers are filled
//!   in place
//! - Hooks are plain closures; only custom handlers are async

pub mod dispatch;
pub mod endpoint;
pub mod error;
pub mod hooks;
pub mod params;
pub mod request;

pub use dispatch::{Gateway, UpstreamResponse};
pub use endpoint::{Endpoint, EndpointFactory, FactoryError, QueryParam, RegistryFactory};
pub use error::{BoxedError, DefaultError, ErrorJson, ExtendedError, GatewayError};
pub use hooks::{CustomHandler, HookAction, Hooks, SerializeAction};
pub use request::ProxyRequest;

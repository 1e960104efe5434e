//! Beacon REST gateway library.
//!
//! Serves the Ethereum beacon-node REST API in front of a gRPC-gateway,
//! converting hex ↔ base64 byte strings, enum casing and timestamps on the
//! way through.

pub mod catalogue;
pub mod config;
pub mod gateway;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod payload;
pub mod routing;

pub use config::GatewayConfig;
pub use gateway::{Endpoint, EndpointFactory, Gateway, RegistryFactory};
pub use http::HttpServer;
pub use lifecycle::Shutdown;

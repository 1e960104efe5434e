//! Payload model.
//!
//! # Data Flow
//! ```text
//! request bytes
//!     → container.rs (strict decode against the endpoint shape)
//!     → fields.rs (request set: hex → base64)
//!     → container.rs (ordered encode) → upstream
//!
//! upstream bytes
//!     → container.rs (lenient decode)
//!     → fields.rs (response set: base64 → hex, enum → lowercase, time → unix)
//!     → container.rs (ordered encode) → client
//! ```
//!
//! # Design Decisions
//! - Shapes are data, not types: one walk serves every endpoint
//! - Each payload is walked once per direction; `hex` is not idempotent

pub mod container;
pub mod fields;
pub mod shape;
pub mod transforms;

pub use container::{DecodeError, DecodeMode, Payload};
pub use fields::{process_fields, process_request_fields, process_response_fields, FieldError, ProcessorSet};
pub use shape::{Field, Kind, Shape, Tag};
pub use transforms::TransformError;

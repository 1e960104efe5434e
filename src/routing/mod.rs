//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Route binding (at startup):
//!     factory.paths()
//!     → template.rs (parse, validate placeholders)
//!     → router.rs (conflict check, bind to dispatch)
//!     → Freeze as immutable axum Router
//!
//! Incoming Request (path)
//!     → axum matches the bound template
//!     → dispatch receives the template, not the concrete path
//! ```
//!
//! # Design Decisions
//! - Routes compiled at startup, immutable at runtime
//! - No regex in hot path (segment matching only)
//! - Deterministic: same input always matches same route

pub mod router;
pub mod template;

pub use router::{bind_routes, RouteError};
pub use template::{PathTemplate, Segment, TemplateError};

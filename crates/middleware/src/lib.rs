//! Pre-filters that run on every canonical event before rule evaluation.
//!
//! This crate provides:
//! - The [`Middleware`] trait and the type-keyed [`MiddlewareRegistry`]
//! - [`MiddlewarePipeline`], an ordered chain loaded from YAML
//! - Six built-in middlewares (dedup, block list, rate limit, follow dedup,
//!   keyword filter, allow list)

pub mod builtin;
pub mod error;
pub mod pipeline;
pub mod registry;
pub mod traits;

pub use error::MiddlewareError;
pub use pipeline::{MiddlewarePipeline, MiddlewareSpec, PipelineVerdict};
pub use registry::MiddlewareRegistry;
pub use traits::{Middleware, MiddlewareContext, MiddlewareOutcome};

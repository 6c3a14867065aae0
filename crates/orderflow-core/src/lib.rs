//! Core infrastructure for orderflow.
//!
//! This crate provides shared functionality used across all orderflow components:
//! - Event system for observability
//! - Registry for sharing named component handles
//!
//! Application code normally depends on the component crates (or the `orderflow`
//! facade) rather than on this crate directly.

pub mod events;
pub mod registry;

pub use events::{EventListener, EventListeners, FlowEvent, FnListener};
pub use registry::Registry;

/// Boxed error type accepted from user-supplied callbacks such as write
/// processors. Matches the error type tower uses for type-erased services.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

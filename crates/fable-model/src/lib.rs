//! Immutable story model: stories, scenarios, meta, examples tables and lifecycles.
//!
//! Values in this crate are produced by a story parser and consumed by the
//! runner. Nothing here is mutated in place: every `with_*` method returns a
//! new value.

pub mod errors;
pub mod examples;
pub mod given;
pub mod lifecycle;
pub mod meta;
pub mod parameters;
pub mod story;

pub use errors::*;
pub use examples::*;
pub use given::*;
pub use lifecycle::*;
pub use meta::*;
pub use parameters::*;
pub use story::*;

//! The built-in in-memory storage engine.

pub(crate) mod collection;
pub mod engine;

pub use engine::InMemoryEngine;

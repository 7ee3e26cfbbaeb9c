//! Storage-agnostic filter trees and their compilation into engine
//! predicates.
//!
//! Filters are built with the fluent [`field`] API or the [`and`] / [`or`]
//! combinators, carried around as plain data, and compiled by
//! [`FilterCompiler`] right before a find or remove executes.

pub mod compile;
#[allow(clippy::module_inception)]
pub mod filter;
pub mod fluent;

pub use compile::FilterCompiler;
pub use filter::{and, or, BetweenBounds, CompareFilter, CompareOp, Filter};
pub use fluent::{field, FieldExpr, ELEMENT};

//! The relational side of relsparql.
//!
//! A SPARQL query in safe algebra form is translated by the [RelationalBuilder] into a
//! [CalculusModel](calculus::CalculusModel) plus a [ValueBinder](binders::ValueBinder) per
//! output variable. The [rewrite] module provides the framework the optimizers are built on.

pub mod binders;
pub mod builder;
pub mod calculus;
pub mod expression_sets;
mod query;
pub mod rewrite;
mod tree_node;

pub use builder::{PatternResult, RelationalBuilder};
pub use query::RelationalQuery;

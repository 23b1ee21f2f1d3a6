//! The SPARQL side of the query pipeline.
//!
//! Queries are parsed with [spargebra] and converted into the [GraphPattern] algebra of this
//! crate. The [MappingTransformer] replaces every triple pattern with the union of the mapping
//! rules that may produce matching triples, and the [passes] bring the algebra into the safe
//! form expected by the relational builder.

mod conversion;
mod expression;
mod mapping_transformer;
pub mod passes;
mod pattern;
mod query;
mod tree_node;
mod variables;

pub use conversion::convert_query;
pub use expression::{
    ArithmeticOperator, ComparisonOperator, Expression, Function, OrderExpression,
};
pub use mapping_transformer::MappingTransformer;
pub use pattern::{GraphPattern, ObjectTarget, PatternTerm, RestrictedTriplePattern, TriplePattern};
pub use query::{QueryForm, QueryModifiers, SparqlQuery};
pub use variables::is_out_of_scope;

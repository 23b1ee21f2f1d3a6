//! The relational calculus model.
//!
//! A [CalculusModel] is the relational intermediate representation between the SPARQL algebra
//! and SQL. It consists of sources ([SourceCondition]), assignments ([AssignmentCondition]) and
//! filters ([FilterCondition]) over [CalculusVariable]s.

mod condition;
mod expression;
mod model;
mod source;
mod variable;

pub use condition::{AssignmentCondition, ComparisonType, FilterCondition};
pub(crate) use expression::write_list;
pub use expression::{CaseBranch, Expression, SqlValue};
pub use model::{CalculusModel, ModelModifiers, OrderingKey};
pub use source::{
    CalculusSource, LeftJoinSource, SourceCondition, SqlTable, TableSource, UnionBranch,
    UnionedSources,
};
pub use variable::{CalculusIdGenerator, CalculusVariable, SourceId, VariableId, VariableKind};

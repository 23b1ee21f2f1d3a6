//! SQL dialects of the supported database products.

mod mssql;
mod mysql;

pub use mssql::MsSqlDialect;
pub use mysql::MySqlDialect;

use crate::types::{SqlColumnType, SqlColumnTypeRef};
use crate::DFResult;
use std::fmt::Debug;
use std::sync::Arc;

/// A reference-counted dialect.
pub type SqlDialectRef = Arc<dyn SqlDialect>;

/// The parts of a statement that implement `OFFSET`/`LIMIT`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Paging {
    /// Written directly after `SELECT [DISTINCT]`.
    pub select_prefix: Option<String>,
    /// Written after the `ORDER BY` clause.
    pub suffix: Option<String>,
    /// Whether the dialect needs an `ORDER BY` clause for [Self::suffix].
    pub requires_order_by: bool,
}

/// The product-specific parts of SQL generation.
pub trait SqlDialect: Debug + Send + Sync {
    /// The name of the dialect.
    fn name(&self) -> &str;

    /// Parses a column type as reported by the schema of the database.
    fn parse_column_type(&self, db_type: &str) -> DFResult<SqlColumnTypeRef>;

    /// The type of the `NULL` literal.
    fn null_type(&self) -> SqlColumnTypeRef;

    fn boolean_type(&self) -> SqlColumnTypeRef;

    fn integer_type(&self) -> SqlColumnTypeRef;

    fn decimal_type(&self) -> SqlColumnTypeRef;

    fn double_type(&self) -> SqlColumnTypeRef;

    /// A text type that can hold any string.
    fn string_type(&self) -> SqlColumnTypeRef;

    fn date_time_type(&self) -> SqlColumnTypeRef;

    /// Quotes an identifier (table or column name).
    fn quote_identifier(&self, identifier: &str) -> String;

    /// Renders a string literal.
    fn string_literal(&self, value: &str) -> String;

    /// Renders a boolean literal.
    fn boolean_literal(&self, value: bool) -> String {
        if value { "1" } else { "0" }.to_owned()
    }

    /// Renders the concatenation of already rendered expressions.
    fn concat(&self, parts: &[String]) -> String {
        match parts {
            [] => self.string_literal(""),
            [part] => part.clone(),
            parts => format!("CONCAT({})", parts.join(", ")),
        }
    }

    /// Renders a cast of an already rendered expression.
    fn cast(&self, expression: &str, target: &dyn SqlColumnType) -> DFResult<String> {
        Ok(format!("CAST({expression} AS {})", target.db_string()?))
    }

    /// Computes the paging clauses for the given offset and limit.
    fn paging(&self, offset: usize, limit: Option<usize>) -> Paging;
}

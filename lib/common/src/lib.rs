mod database;
pub mod dialect;
pub mod error;
mod schema;
pub mod tree_node;
pub mod types;

pub use database::{QueryResultReader, QueryResultRow, SqlDatabase};
pub use dialect::{MsSqlDialect, MySqlDialect, Paging, SqlDialect, SqlDialectRef};
pub use schema::{ColumnInfo, InMemorySchema, SchemaProvider, TableInfo, UniqueKey};
pub use types::{SqlColumnType, SqlColumnTypeRef, SqlTypeKind};

pub type DFResult<T> = datafusion::error::Result<T>;

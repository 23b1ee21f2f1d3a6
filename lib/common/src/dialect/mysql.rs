use crate::dialect::{Paging, SqlDialect};
use crate::types::{
    DateTimeKind, IntegerWidth, MySqlColumnType, SqlColumnType, SqlColumnTypeRef, SqlTypeKind,
};
use crate::DFResult;
use std::sync::Arc;

/// The dialect of MySQL.
#[derive(Debug, Clone, Copy, Default)]
pub struct MySqlDialect;

impl SqlDialect for MySqlDialect {
    fn name(&self) -> &str {
        "mysql"
    }

    fn parse_column_type(&self, db_type: &str) -> DFResult<SqlColumnTypeRef> {
        Ok(Arc::new(MySqlColumnType::parse(db_type)?))
    }

    fn null_type(&self) -> SqlColumnTypeRef {
        Arc::new(MySqlColumnType::Null)
    }

    fn boolean_type(&self) -> SqlColumnTypeRef {
        Arc::new(MySqlColumnType::Boolean)
    }

    fn integer_type(&self) -> SqlColumnTypeRef {
        Arc::new(MySqlColumnType::Integer(IntegerWidth::BigInt))
    }

    fn decimal_type(&self) -> SqlColumnTypeRef {
        Arc::new(MySqlColumnType::Decimal {
            precision: 65,
            scale: 10,
        })
    }

    fn double_type(&self) -> SqlColumnTypeRef {
        Arc::new(MySqlColumnType::Float { double: true })
    }

    fn string_type(&self) -> SqlColumnTypeRef {
        Arc::new(MySqlColumnType::MAX_TEXT)
    }

    fn date_time_type(&self) -> SqlColumnTypeRef {
        Arc::new(MySqlColumnType::DateTime(DateTimeKind::DateTime))
    }

    fn quote_identifier(&self, identifier: &str) -> String {
        format!("`{}`", identifier.replace('`', "``"))
    }

    fn string_literal(&self, value: &str) -> String {
        format!("'{}'", value.replace('\\', "\\\\").replace('\'', "''"))
    }

    /// `CAST` only accepts a few target types in MySQL.
    fn cast(&self, expression: &str, target: &dyn SqlColumnType) -> DFResult<String> {
        let target = match target.kind() {
            SqlTypeKind::Null | SqlTypeKind::String => "CHAR".to_owned(),
            SqlTypeKind::Boolean | SqlTypeKind::Integer => "SIGNED".to_owned(),
            SqlTypeKind::Decimal | SqlTypeKind::Float => target.db_string()?.to_uppercase(),
            SqlTypeKind::DateTime => "DATETIME".to_owned(),
            SqlTypeKind::Binary => "BINARY".to_owned(),
        };
        Ok(format!("CAST({expression} AS {target})"))
    }

    fn paging(&self, offset: usize, limit: Option<usize>) -> Paging {
        let suffix = match (offset, limit) {
            (0, None) => None,
            (0, Some(limit)) => Some(format!("LIMIT {limit}")),
            (offset, Some(limit)) => Some(format!("LIMIT {limit} OFFSET {offset}")),
            (offset, None) => Some(format!("LIMIT {} OFFSET {offset}", u64::MAX)),
        };
        Paging {
            select_prefix: None,
            suffix,
            requires_order_by: false,
        }
    }
}

use crate::dialect::{Paging, SqlDialect};
use crate::types::{DateTimeKind, IntegerWidth, MsSqlColumnType, SqlColumnTypeRef};
use crate::DFResult;
use std::sync::Arc;

/// The dialect of Microsoft SQL Server.
#[derive(Debug, Clone, Copy, Default)]
pub struct MsSqlDialect;

impl SqlDialect for MsSqlDialect {
    fn name(&self) -> &str {
        "mssql"
    }

    fn parse_column_type(&self, db_type: &str) -> DFResult<SqlColumnTypeRef> {
        Ok(Arc::new(MsSqlColumnType::parse(db_type)?))
    }

    fn null_type(&self) -> SqlColumnTypeRef {
        Arc::new(MsSqlColumnType::Null)
    }

    fn boolean_type(&self) -> SqlColumnTypeRef {
        Arc::new(MsSqlColumnType::Bit)
    }

    fn integer_type(&self) -> SqlColumnTypeRef {
        Arc::new(MsSqlColumnType::Integer(IntegerWidth::BigInt))
    }

    fn decimal_type(&self) -> SqlColumnTypeRef {
        Arc::new(MsSqlColumnType::Decimal {
            precision: 38,
            scale: 10,
        })
    }

    fn double_type(&self) -> SqlColumnTypeRef {
        Arc::new(MsSqlColumnType::Float { double: true })
    }

    fn string_type(&self) -> SqlColumnTypeRef {
        Arc::new(MsSqlColumnType::MAX_TEXT)
    }

    fn date_time_type(&self) -> SqlColumnTypeRef {
        Arc::new(MsSqlColumnType::DateTime(DateTimeKind::PreciseDateTime))
    }

    fn quote_identifier(&self, identifier: &str) -> String {
        format!("[{}]", identifier.replace(']', "]]"))
    }

    fn string_literal(&self, value: &str) -> String {
        format!("N'{}'", value.replace('\'', "''"))
    }

    fn paging(&self, offset: usize, limit: Option<usize>) -> Paging {
        match (offset, limit) {
            (0, None) => Paging::default(),
            (0, Some(limit)) => Paging {
                select_prefix: Some(format!("TOP {limit}")),
                ..Paging::default()
            },
            (offset, limit) => Paging {
                select_prefix: None,
                suffix: Some(match limit {
                    Some(limit) => {
                        format!("OFFSET {offset} ROWS FETCH NEXT {limit} ROWS ONLY")
                    }
                    None => format!("OFFSET {offset} ROWS"),
                }),
                requires_order_by: true,
            },
        }
    }
}

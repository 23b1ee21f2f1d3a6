use crate::types::{
    common_decimal, parse_type_arguments, parse_u8_argument, same_product, DateTimeKind,
    IntegerWidth, SqlColumnType, SqlColumnTypeRef, SqlTypeKind, TypeLength,
};
use crate::DFResult;
use datafusion::common::{internal_err, not_impl_err};
use relsparql_model::vocab::xsd;
use relsparql_model::NamedNodeRef;
use std::any::Any;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

const MAX_DECIMAL_PRECISION: u8 = 38;

/// A column type of Microsoft SQL Server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MsSqlColumnType {
    /// The type of the `NULL` literal.
    Null,
    Bit,
    Integer(IntegerWidth),
    Decimal { precision: u8, scale: u8 },
    /// `float` (double precision) or `real` (single precision).
    Float { double: bool },
    Text {
        unicode: bool,
        fixed: bool,
        length: TypeLength,
    },
    DateTime(DateTimeKind),
    Binary { fixed: bool, length: TypeLength },
}

impl MsSqlColumnType {
    /// The widest text type, used whenever no better common type exists.
    pub const MAX_TEXT: Self = Self::Text {
        unicode: true,
        fixed: false,
        length: TypeLength::Max,
    };

    /// Parses a type name as reported by the database (e.g., `nvarchar(50)`).
    pub fn parse(db_type: &str) -> DFResult<Self> {
        let db_type = db_type.trim().to_ascii_lowercase();

        let (name, rest) = match db_type.find('(') {
            Some(index) => (db_type[..index].trim(), &db_type[index..]),
            None => (db_type.as_str(), ""),
        };
        let args = parse_type_arguments(rest)?;

        let result = match name {
            "bit" => Self::Bit,
            "tinyint" => Self::Integer(IntegerWidth::TinyInt),
            "smallint" => Self::Integer(IntegerWidth::SmallInt),
            "int" | "integer" => Self::Integer(IntegerWidth::Int),
            "bigint" => Self::Integer(IntegerWidth::BigInt),
            "decimal" | "numeric" => Self::Decimal {
                precision: parse_u8_argument(&args, 0, 18)?,
                scale: parse_u8_argument(&args, 1, 0)?,
            },
            "money" => Self::Decimal {
                precision: 19,
                scale: 4,
            },
            "smallmoney" => Self::Decimal {
                precision: 10,
                scale: 4,
            },
            "float" => Self::Float {
                double: parse_u8_argument(&args, 0, 53)? > 24,
            },
            "real" => Self::Float { double: false },
            "char" | "varchar" | "nchar" | "nvarchar" => Self::Text {
                unicode: name.starts_with('n'),
                fixed: !name.contains("var"),
                length: match args.first() {
                    Some(length) => TypeLength::parse(length)?,
                    None => TypeLength::Limited(1),
                },
            },
            "text" => Self::Text {
                unicode: false,
                fixed: false,
                length: TypeLength::Max,
            },
            "ntext" | "xml" => Self::MAX_TEXT,
            "uniqueidentifier" => Self::Text {
                unicode: false,
                fixed: true,
                length: TypeLength::Limited(36),
            },
            "date" => Self::DateTime(DateTimeKind::Date),
            "time" => Self::DateTime(DateTimeKind::Time),
            "datetime" | "smalldatetime" => Self::DateTime(DateTimeKind::DateTime),
            "datetime2" => Self::DateTime(DateTimeKind::PreciseDateTime),
            "datetimeoffset" => Self::DateTime(DateTimeKind::DateTimeOffset),
            "binary" | "varbinary" => Self::Binary {
                fixed: name == "binary",
                length: match args.first() {
                    Some(length) => TypeLength::parse(length)?,
                    None => TypeLength::Limited(1),
                },
            },
            "image" => Self::Binary {
                fixed: false,
                length: TypeLength::Max,
            },
            _ => return not_impl_err!("Unsupported MS SQL column type '{db_type}'."),
        };
        Ok(result)
    }

    fn common(self, other: Self) -> Self {
        use MsSqlColumnType::*;
        match (self, other) {
            (Null, other) | (other, Null) => other,
            (a, b) if a == b => a,
            (Bit, Integer(w)) | (Integer(w), Bit) => Integer(w),
            (Integer(a), Integer(b)) => Integer(a.max(b)),
            (Bit, Decimal { precision, scale }) | (Decimal { precision, scale }, Bit) => {
                Decimal { precision, scale }
            }
            (Integer(w), Decimal { precision, scale })
            | (Decimal { precision, scale }, Integer(w)) => {
                let (precision, scale) = common_decimal(
                    (w.decimal_digits(), 0),
                    (precision, scale),
                    MAX_DECIMAL_PRECISION,
                );
                Decimal { precision, scale }
            }
            (
                Decimal {
                    precision: p1,
                    scale: s1,
                },
                Decimal {
                    precision: p2,
                    scale: s2,
                },
            ) => {
                let (precision, scale) =
                    common_decimal((p1, s1), (p2, s2), MAX_DECIMAL_PRECISION);
                Decimal { precision, scale }
            }
            (Bit | Integer(_), Float { .. }) | (Float { .. }, Bit | Integer(_)) => Decimal {
                precision: MAX_DECIMAL_PRECISION,
                scale: 10,
            },
            (Decimal { .. }, Float { .. }) | (Float { .. }, Decimal { .. }) => {
                Float { double: true }
            }
            (Float { double: a }, Float { double: b }) => Float { double: a || b },
            (
                Text {
                    unicode: u1,
                    fixed: f1,
                    length: l1,
                },
                Text {
                    unicode: u2,
                    fixed: f2,
                    length: l2,
                },
            ) => Text {
                unicode: u1 || u2,
                fixed: f1 && f2 && l1 == l2,
                length: l1.max(l2),
            },
            (DateTime(a), DateTime(b)) => match a.common(b) {
                Some(kind) => DateTime(kind),
                None => Self::MAX_TEXT,
            },
            (Binary { length: l1, .. }, Binary { length: l2, .. }) => Binary {
                fixed: false,
                length: l1.max(l2),
            },
            _ => Self::MAX_TEXT,
        }
    }
}

impl Display for MsSqlColumnType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.db_string() {
            Ok(name) => write!(f, "{name}"),
            Err(_) => write!(f, "null"),
        }
    }
}

impl SqlColumnType for MsSqlColumnType {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn dyn_eq(&self, other: &dyn SqlColumnType) -> bool {
        other.as_any().downcast_ref::<Self>() == Some(self)
    }

    fn kind(&self) -> SqlTypeKind {
        match self {
            MsSqlColumnType::Null => SqlTypeKind::Null,
            MsSqlColumnType::Bit => SqlTypeKind::Boolean,
            MsSqlColumnType::Integer(_) => SqlTypeKind::Integer,
            MsSqlColumnType::Decimal { .. } => SqlTypeKind::Decimal,
            MsSqlColumnType::Float { .. } => SqlTypeKind::Float,
            MsSqlColumnType::Text { .. } => SqlTypeKind::String,
            MsSqlColumnType::DateTime(_) => SqlTypeKind::DateTime,
            MsSqlColumnType::Binary { .. } => SqlTypeKind::Binary,
        }
    }

    fn default_rdf_type(&self) -> DFResult<NamedNodeRef<'static>> {
        Ok(match self {
            MsSqlColumnType::Null => {
                return internal_err!("The null type has no RDF datatype.");
            }
            MsSqlColumnType::Bit => xsd::BOOLEAN,
            MsSqlColumnType::Integer(_) => xsd::INTEGER,
            MsSqlColumnType::Decimal { .. } => xsd::DECIMAL,
            MsSqlColumnType::Float { .. } => xsd::DOUBLE,
            MsSqlColumnType::Text { .. } => xsd::STRING,
            MsSqlColumnType::DateTime(kind) => kind.default_rdf_type(),
            MsSqlColumnType::Binary { .. } => xsd::HEX_BINARY,
        })
    }

    fn common_type(&self, other: &dyn SqlColumnType) -> DFResult<SqlColumnTypeRef> {
        let other = same_product::<Self>(self, other)?;
        Ok(Arc::new(self.common(*other)))
    }

    fn db_string(&self) -> DFResult<String> {
        Ok(match self {
            MsSqlColumnType::Null => {
                return internal_err!("The null type cannot be written as a column type.");
            }
            MsSqlColumnType::Bit => "bit".to_owned(),
            MsSqlColumnType::Integer(width) => match width {
                IntegerWidth::TinyInt => "tinyint",
                IntegerWidth::SmallInt => "smallint",
                IntegerWidth::MediumInt | IntegerWidth::Int => "int",
                IntegerWidth::BigInt => "bigint",
            }
            .to_owned(),
            MsSqlColumnType::Decimal { precision, scale } => {
                format!("decimal({precision},{scale})")
            }
            MsSqlColumnType::Float { double: true } => "float".to_owned(),
            MsSqlColumnType::Float { double: false } => "real".to_owned(),
            MsSqlColumnType::Text {
                unicode,
                fixed,
                length,
            } => {
                let prefix = if *unicode { "n" } else { "" };
                let var = if *fixed { "" } else { "var" };
                format!("{prefix}{var}char({length})")
            }
            MsSqlColumnType::DateTime(kind) => match kind {
                DateTimeKind::Date => "date",
                DateTimeKind::Time => "time",
                DateTimeKind::DateTime => "datetime",
                DateTimeKind::PreciseDateTime => "datetime2",
                DateTimeKind::DateTimeOffset => "datetimeoffset",
            }
            .to_owned(),
            MsSqlColumnType::Binary { fixed, length } => {
                let var = if *fixed { "" } else { "var" };
                format!("{var}binary({length})")
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use datafusion::error::DataFusionError;

    fn common(a: &str, b: &str) -> String {
        let a = MsSqlColumnType::parse(a).unwrap();
        let b = MsSqlColumnType::parse(b).unwrap();
        a.common_type(&b).unwrap().db_string().unwrap()
    }

    #[test]
    fn test_parse_types() {
        assert_eq!(
            MsSqlColumnType::parse("NVARCHAR(50)").unwrap(),
            MsSqlColumnType::Text {
                unicode: true,
                fixed: false,
                length: TypeLength::Limited(50)
            }
        );
        assert_eq!(
            MsSqlColumnType::parse("varchar(max)").unwrap(),
            MsSqlColumnType::Text {
                unicode: false,
                fixed: false,
                length: TypeLength::Max
            }
        );
        assert_eq!(
            MsSqlColumnType::parse("int").unwrap(),
            MsSqlColumnType::Integer(IntegerWidth::Int)
        );
        assert!(MsSqlColumnType::parse("geography").is_err());
    }

    #[test]
    fn test_parse_decimal_arguments() {
        assert_eq!(
            MsSqlColumnType::parse("numeric(10, 2)").unwrap(),
            MsSqlColumnType::Decimal {
                precision: 10,
                scale: 2
            }
        );
        assert_eq!(
            MsSqlColumnType::parse("decimal(7,3)").unwrap(),
            MsSqlColumnType::Decimal {
                precision: 7,
                scale: 3
            }
        );
        assert_eq!(
            MsSqlColumnType::parse("decimal").unwrap(),
            MsSqlColumnType::Decimal {
                precision: 18,
                scale: 0
            }
        );
    }

    #[test]
    fn test_common_types() {
        assert_eq!(common("int", "bigint"), "bigint");
        assert_eq!(common("tinyint", "bit"), "tinyint");
        assert_eq!(common("int", "decimal(5,2)"), "decimal(12,2)");
        assert_eq!(common("decimal(5,2)", "decimal(10,0)"), "decimal(12,2)");
        assert_eq!(common("int", "float"), "decimal(38,10)");
        assert_eq!(common("decimal(5,2)", "real"), "float");
        assert_eq!(common("varchar(10)", "nchar(20)"), "nvarchar(20)");
        assert_eq!(common("date", "datetime"), "datetime2");
        assert_eq!(common("int", "nvarchar(20)"), "nvarchar(max)");
        assert_eq!(common("int", "date"), "nvarchar(max)");
    }

    #[test]
    fn test_null_type() {
        let null = MsSqlColumnType::Null;
        assert!(matches!(
            null.default_rdf_type(),
            Err(DataFusionError::Internal(_))
        ));
        assert!(matches!(null.db_string(), Err(DataFusionError::Internal(_))));
        assert_eq!(
            null.common_type(&MsSqlColumnType::Bit)
                .unwrap()
                .db_string()
                .unwrap(),
            "bit"
        );
    }

    #[test]
    fn test_default_rdf_types() {
        assert_eq!(
            MsSqlColumnType::parse("nvarchar(10)")
                .unwrap()
                .default_rdf_type()
                .unwrap(),
            xsd::STRING
        );
        assert_eq!(
            MsSqlColumnType::parse("bit").unwrap().default_rdf_type().unwrap(),
            xsd::BOOLEAN
        );
        assert_eq!(
            MsSqlColumnType::parse("datetime2")
                .unwrap()
                .default_rdf_type()
                .unwrap(),
            xsd::DATE_TIME
        );
    }
}

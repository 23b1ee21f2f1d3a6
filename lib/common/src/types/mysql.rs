use crate::types::{
    common_decimal, parse_type_arguments, parse_u8_argument, same_product, DateTimeKind,
    IntegerWidth, SqlColumnType, SqlColumnTypeRef, SqlTypeKind, TypeLength,
};
use crate::DFResult;
use datafusion::common::{internal_err, not_impl_err, plan_err};
use relsparql_model::vocab::xsd;
use relsparql_model::NamedNodeRef;
use std::any::Any;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

const MAX_DECIMAL_PRECISION: u8 = 65;

/// The size class of MySQL `TEXT` and `BLOB` types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LobSize {
    Tiny,
    Normal,
    Medium,
    Long,
}

impl LobSize {
    fn render(self, suffix: &str) -> String {
        match self {
            LobSize::Tiny => format!("tiny{suffix}"),
            LobSize::Normal => suffix.to_owned(),
            LobSize::Medium => format!("medium{suffix}"),
            LobSize::Long => format!("long{suffix}"),
        }
    }
}

/// A column type of MySQL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MySqlColumnType {
    /// The type of the `NULL` literal.
    Null,
    Boolean,
    Integer(IntegerWidth),
    Decimal { precision: u8, scale: u8 },
    Float { double: bool },
    Char(u32),
    VarChar(u32),
    Text(LobSize),
    DateTime(DateTimeKind),
    Binary { fixed: bool, length: u32 },
    Blob(LobSize),
}

impl MySqlColumnType {
    /// The widest text type, used whenever no better common type exists.
    pub const MAX_TEXT: Self = Self::Text(LobSize::Long);

    /// Parses a type name as reported by the database (e.g., `varchar(50)`).
    pub fn parse(db_type: &str) -> DFResult<Self> {
        let db_type = db_type.trim().to_ascii_lowercase();
        let db_type = db_type
            .strip_suffix("unsigned")
            .map(str::trim)
            .unwrap_or(db_type.as_str());

        let (name, rest) = match db_type.find('(') {
            Some(index) => (db_type[..index].trim(), &db_type[index..]),
            None => (db_type, ""),
        };
        let args = parse_type_arguments(rest)?;

        let length = |default: u32| -> DFResult<u32> {
            match args.first() {
                None => Ok(default),
                Some(value) => match TypeLength::parse(value)? {
                    TypeLength::Limited(length) => Ok(length),
                    TypeLength::Max => plan_err!("MySQL types have no maximum length."),
                },
            }
        };

        let result = match name {
            "bool" | "boolean" => Self::Boolean,
            "bit" if args.is_empty() || args == ["1"] => Self::Boolean,
            "tinyint" if args == ["1"] => Self::Boolean,
            "tinyint" => Self::Integer(IntegerWidth::TinyInt),
            "smallint" => Self::Integer(IntegerWidth::SmallInt),
            "mediumint" => Self::Integer(IntegerWidth::MediumInt),
            "int" | "integer" => Self::Integer(IntegerWidth::Int),
            "bigint" => Self::Integer(IntegerWidth::BigInt),
            "decimal" | "numeric" | "dec" | "fixed" => Self::Decimal {
                precision: parse_u8_argument(&args, 0, 10)?,
                scale: parse_u8_argument(&args, 1, 0)?,
            },
            "float" => Self::Float { double: false },
            "double" | "real" | "double precision" => Self::Float { double: true },
            "char" => Self::Char(length(1)?),
            "varchar" => Self::VarChar(length(255)?),
            "tinytext" => Self::Text(LobSize::Tiny),
            "text" => Self::Text(LobSize::Normal),
            "mediumtext" => Self::Text(LobSize::Medium),
            "longtext" | "json" => Self::Text(LobSize::Long),
            "enum" | "set" => Self::VarChar(255),
            "date" => Self::DateTime(DateTimeKind::Date),
            "time" => Self::DateTime(DateTimeKind::Time),
            "datetime" => Self::DateTime(DateTimeKind::DateTime),
            "timestamp" => Self::DateTime(DateTimeKind::PreciseDateTime),
            "binary" => Self::Binary {
                fixed: true,
                length: length(1)?,
            },
            "varbinary" => Self::Binary {
                fixed: false,
                length: length(255)?,
            },
            "tinyblob" => Self::Blob(LobSize::Tiny),
            "blob" => Self::Blob(LobSize::Normal),
            "mediumblob" => Self::Blob(LobSize::Medium),
            "longblob" => Self::Blob(LobSize::Long),
            _ => return not_impl_err!("Unsupported MySQL column type '{db_type}'."),
        };
        Ok(result)
    }

    /// Orders text types by capacity; [None] for non-text types.
    fn text_capacity(self) -> Option<(u8, u32)> {
        match self {
            MySqlColumnType::Char(length) | MySqlColumnType::VarChar(length) => {
                Some((0, length))
            }
            MySqlColumnType::Text(size) => Some((1 + size as u8, 0)),
            _ => None,
        }
    }

    fn common(self, other: Self) -> Self {
        use MySqlColumnType::*;
        match (self, other) {
            (Null, other) | (other, Null) => other,
            (a, b) if a == b => a,
            (Boolean, Integer(w)) | (Integer(w), Boolean) => Integer(w),
            (Integer(a), Integer(b)) => Integer(a.max(b)),
            (Boolean, Decimal { precision, scale }) | (Decimal { precision, scale }, Boolean) => {
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
            (Boolean | Integer(_), Float { .. }) | (Float { .. }, Boolean | Integer(_)) => {
                Decimal {
                    precision: MAX_DECIMAL_PRECISION,
                    scale: 10,
                }
            }
            (Decimal { .. }, Float { .. }) | (Float { .. }, Decimal { .. }) => {
                Float { double: true }
            }
            (Float { double: a }, Float { double: b }) => Float { double: a || b },
            (Char(a), Char(b)) => Char(a.max(b)),
            (a @ (Char(_) | VarChar(_) | Text(_)), b @ (Char(_) | VarChar(_) | Text(_))) => {
                match (a.text_capacity(), b.text_capacity()) {
                    (Some((0, l1)), Some((0, l2))) => VarChar(l1.max(l2)),
                    (Some(c1), Some(c2)) => {
                        if c1 >= c2 {
                            a.widen_to_text()
                        } else {
                            b.widen_to_text()
                        }
                    }
                    _ => Self::MAX_TEXT,
                }
            }
            (DateTime(a), DateTime(b)) => match a.common(b) {
                Some(kind) => DateTime(kind),
                None => Self::MAX_TEXT,
            },
            (Binary { length: l1, .. }, Binary { length: l2, .. }) => Binary {
                fixed: false,
                length: l1.max(l2),
            },
            (Blob(a), Blob(b)) => Blob(a.max(b)),
            (Binary { .. }, Blob(size)) | (Blob(size), Binary { .. }) => Blob(size),
            _ => Self::MAX_TEXT,
        }
    }

    fn widen_to_text(self) -> Self {
        match self {
            MySqlColumnType::Char(_) | MySqlColumnType::VarChar(_) => {
                MySqlColumnType::Text(LobSize::Normal)
            }
            other => other,
        }
    }
}

impl Display for MySqlColumnType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.db_string() {
            Ok(name) => write!(f, "{name}"),
            Err(_) => write!(f, "null"),
        }
    }
}

impl SqlColumnType for MySqlColumnType {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn dyn_eq(&self, other: &dyn SqlColumnType) -> bool {
        other.as_any().downcast_ref::<Self>() == Some(self)
    }

    fn kind(&self) -> SqlTypeKind {
        match self {
            MySqlColumnType::Null => SqlTypeKind::Null,
            MySqlColumnType::Boolean => SqlTypeKind::Boolean,
            MySqlColumnType::Integer(_) => SqlTypeKind::Integer,
            MySqlColumnType::Decimal { .. } => SqlTypeKind::Decimal,
            MySqlColumnType::Float { .. } => SqlTypeKind::Float,
            MySqlColumnType::Char(_) | MySqlColumnType::VarChar(_) | MySqlColumnType::Text(_) => {
                SqlTypeKind::String
            }
            MySqlColumnType::DateTime(_) => SqlTypeKind::DateTime,
            MySqlColumnType::Binary { .. } | MySqlColumnType::Blob(_) => SqlTypeKind::Binary,
        }
    }

    fn default_rdf_type(&self) -> DFResult<NamedNodeRef<'static>> {
        Ok(match self {
            MySqlColumnType::Null => {
                return internal_err!("The null type has no RDF datatype.");
            }
            MySqlColumnType::Boolean => xsd::BOOLEAN,
            MySqlColumnType::Integer(_) => xsd::INTEGER,
            MySqlColumnType::Decimal { .. } => xsd::DECIMAL,
            MySqlColumnType::Float { .. } => xsd::DOUBLE,
            MySqlColumnType::Char(_) | MySqlColumnType::VarChar(_) | MySqlColumnType::Text(_) => {
                xsd::STRING
            }
            MySqlColumnType::DateTime(kind) => kind.default_rdf_type(),
            MySqlColumnType::Binary { .. } | MySqlColumnType::Blob(_) => xsd::HEX_BINARY,
        })
    }

    fn common_type(&self, other: &dyn SqlColumnType) -> DFResult<SqlColumnTypeRef> {
        let other = same_product::<Self>(self, other)?;
        Ok(Arc::new(self.common(*other)))
    }

    fn db_string(&self) -> DFResult<String> {
        Ok(match self {
            MySqlColumnType::Null => {
                return internal_err!("The null type cannot be written as a column type.");
            }
            MySqlColumnType::Boolean => "boolean".to_owned(),
            MySqlColumnType::Integer(width) => match width {
                IntegerWidth::TinyInt => "tinyint",
                IntegerWidth::SmallInt => "smallint",
                IntegerWidth::MediumInt => "mediumint",
                IntegerWidth::Int => "int",
                IntegerWidth::BigInt => "bigint",
            }
            .to_owned(),
            MySqlColumnType::Decimal { precision, scale } => {
                format!("decimal({precision},{scale})")
            }
            MySqlColumnType::Float { double: true } => "double".to_owned(),
            MySqlColumnType::Float { double: false } => "float".to_owned(),
            MySqlColumnType::Char(length) => format!("char({length})"),
            MySqlColumnType::VarChar(length) => format!("varchar({length})"),
            MySqlColumnType::Text(size) => size.render("text"),
            MySqlColumnType::DateTime(kind) => match kind {
                DateTimeKind::Date => "date",
                DateTimeKind::Time => "time",
                DateTimeKind::DateTime | DateTimeKind::DateTimeOffset => "datetime",
                DateTimeKind::PreciseDateTime => "timestamp",
            }
            .to_owned(),
            MySqlColumnType::Binary {
                fixed: true,
                length,
            } => format!("binary({length})"),
            MySqlColumnType::Binary {
                fixed: false,
                length,
            } => format!("varbinary({length})"),
            MySqlColumnType::Blob(size) => size.render("blob"),
        })
    }
}

//! Column types of the supported relational databases.
//!
//! Every database product has its own type system. The query pipeline only needs a small set
//! of capabilities from a column type: the RDF datatype it naturally maps to, a common type
//! that can hold values of two different types (used for `UNION ALL` columns) and the SQL name
//! of the type.

mod mssql;
mod mysql;

pub use mssql::MsSqlColumnType;
pub use mysql::{LobSize, MySqlColumnType};

use crate::DFResult;
use datafusion::common::plan_err;
use relsparql_model::NamedNodeRef;
use std::any::Any;
use std::fmt::{Debug, Display};
use std::sync::Arc;

/// A reference-counted column type.
pub type SqlColumnTypeRef = Arc<dyn SqlColumnType>;

/// The coarse family of a column type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SqlTypeKind {
    /// The type of the `NULL` literal.
    Null,
    Boolean,
    Integer,
    Decimal,
    Float,
    String,
    DateTime,
    Binary,
}

impl SqlTypeKind {
    /// Returns true for integer, decimal and floating point types.
    pub fn is_numeric(self) -> bool {
        matches!(self, Self::Integer | Self::Decimal | Self::Float)
    }
}

/// A column type of a specific database product.
pub trait SqlColumnType: Debug + Display + Send + Sync {
    /// Returns this type as [Any] for downcasting.
    fn as_any(&self) -> &dyn Any;

    /// Compares two types of possibly different products.
    fn dyn_eq(&self, other: &dyn SqlColumnType) -> bool;

    /// The family of this type.
    fn kind(&self) -> SqlTypeKind;

    /// The RDF datatype that values of this type are mapped to if the mapping does not specify
    /// one.
    ///
    /// Fails for the type of `NULL`.
    fn default_rdf_type(&self) -> DFResult<NamedNodeRef<'static>>;

    /// Computes a type that can hold values of this type and of `other`.
    fn common_type(&self, other: &dyn SqlColumnType) -> DFResult<SqlColumnTypeRef>;

    /// The name of the type as written in SQL statements.
    ///
    /// Fails for the type of `NULL`.
    fn db_string(&self) -> DFResult<String>;
}

impl PartialEq for dyn SqlColumnType {
    fn eq(&self, other: &Self) -> bool {
        self.dyn_eq(other)
    }
}

impl Eq for dyn SqlColumnType {}

/// Downcasts `other` to `T`, failing if the two types belong to different products.
pub(crate) fn same_product<'a, T: 'static>(
    this: &dyn SqlColumnType,
    other: &'a dyn SqlColumnType,
) -> DFResult<&'a T> {
    match other.as_any().downcast_ref::<T>() {
        Some(other) => Ok(other),
        None => plan_err!("Cannot combine column types {this} and {other} of different databases."),
    }
}

/// Integer widths shared by the supported products.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum IntegerWidth {
    TinyInt,
    SmallInt,
    MediumInt,
    Int,
    BigInt,
}

impl IntegerWidth {
    /// The number of decimal digits necessary to represent every value of this width.
    pub fn decimal_digits(self) -> u8 {
        match self {
            IntegerWidth::TinyInt => 3,
            IntegerWidth::SmallInt => 5,
            IntegerWidth::MediumInt => 8,
            IntegerWidth::Int => 10,
            IntegerWidth::BigInt => 19,
        }
    }
}

/// Date and time types shared by the supported products.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DateTimeKind {
    Date,
    Time,
    DateTime,
    /// A date time with higher precision (`datetime2`, `timestamp`).
    PreciseDateTime,
    DateTimeOffset,
}

impl DateTimeKind {
    fn default_rdf_type(self) -> NamedNodeRef<'static> {
        use relsparql_model::vocab::xsd;
        match self {
            DateTimeKind::Date => xsd::DATE,
            DateTimeKind::Time => xsd::TIME,
            DateTimeKind::DateTime
            | DateTimeKind::PreciseDateTime
            | DateTimeKind::DateTimeOffset => xsd::DATE_TIME,
        }
    }

    /// The common kind of two date time kinds, [None] if there is none.
    fn common(self, other: DateTimeKind) -> Option<DateTimeKind> {
        match (self, other) {
            (a, b) if a == b => Some(a),
            (DateTimeKind::Time, _) | (_, DateTimeKind::Time) => None,
            (DateTimeKind::DateTimeOffset, _) | (_, DateTimeKind::DateTimeOffset) => {
                Some(DateTimeKind::DateTimeOffset)
            }
            _ => Some(DateTimeKind::PreciseDateTime),
        }
    }
}

/// The length of a character or binary type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TypeLength {
    Limited(u32),
    Max,
}

impl TypeLength {
    fn parse(value: &str) -> DFResult<Self> {
        if value.eq_ignore_ascii_case("max") {
            return Ok(TypeLength::Max);
        }
        match value.parse::<u32>() {
            Ok(value) => Ok(TypeLength::Limited(value)),
            Err(_) => plan_err!("Invalid type length '{value}'."),
        }
    }
}

impl Display for TypeLength {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TypeLength::Limited(length) => write!(f, "{length}"),
            TypeLength::Max => write!(f, "max"),
        }
    }
}

/// Splits the arguments of a type such as `decimal(10, 2)`. `rest` is the part after the type
/// name.
pub(crate) fn parse_type_arguments(rest: &str) -> DFResult<Vec<&str>> {
    let rest = rest.trim();
    if rest.is_empty() {
        return Ok(Vec::new());
    }

    let Some(inner) = rest.strip_prefix('(').and_then(|r| r.strip_suffix(')')) else {
        return plan_err!("Invalid type arguments '{rest}'.");
    };
    Ok(inner.split(',').map(str::trim).collect())
}

/// Parses an optional numeric type argument.
pub(crate) fn parse_u8_argument(args: &[&str], index: usize, default: u8) -> DFResult<u8> {
    match args.get(index) {
        None => Ok(default),
        Some(value) => match value.parse::<u8>() {
            Ok(value) => Ok(value),
            Err(_) => plan_err!("Invalid type argument '{value}'."),
        },
    }
}

/// The common decimal type of two decimal types, bounded by `max_precision`.
pub(crate) fn common_decimal(
    (p1, s1): (u8, u8),
    (p2, s2): (u8, u8),
    max_precision: u8,
) -> (u8, u8) {
    let integer_digits = p1.saturating_sub(s1).max(p2.saturating_sub(s2));
    let scale = s1.max(s2);
    let precision = integer_digits.saturating_add(scale).min(max_precision);
    (precision, scale.min(precision))
}

use crate::calculus::{CalculusVariable, FilterCondition};
use relsparql_algebra::ArithmeticOperator;
use relsparql_common::SqlColumnTypeRef;
use std::fmt::{Display, Formatter};

/// A constant value of the relational level.
///
/// Equality includes the kind of the value: the string `"2"` is not equal to the integer `2`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SqlValue {
    String(String),
    Integer(i64),
    /// A decimal number in its canonical lexical form.
    Decimal(String),
    Boolean(bool),
}

impl SqlValue {
    pub fn string(value: impl Into<String>) -> Self {
        SqlValue::String(value.into())
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            SqlValue::String(value) => Some(value),
            _ => None,
        }
    }

    /// The textual form of this value as produced by a cast to a string type.
    pub fn to_text(&self) -> String {
        match self {
            SqlValue::String(value) | SqlValue::Decimal(value) => value.clone(),
            SqlValue::Integer(value) => value.to_string(),
            SqlValue::Boolean(value) => if *value { "1" } else { "0" }.to_owned(),
        }
    }
}

impl Display for SqlValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            SqlValue::String(value) => write!(f, "'{value}'"),
            SqlValue::Integer(value) => write!(f, "{value}"),
            SqlValue::Decimal(value) => write!(f, "{value}"),
            SqlValue::Boolean(value) => write!(f, "{value}"),
        }
    }
}

/// One `WHEN ... THEN ...` branch of [Expression::Case].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaseBranch {
    pub condition: FilterCondition,
    pub value: Expression,
}

impl CaseBranch {
    pub fn new(condition: FilterCondition, value: Expression) -> Self {
        Self { condition, value }
    }
}

/// A value expression of the relational level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expression {
    Constant(SqlValue),
    Column(CalculusVariable),
    Concatenation(Vec<Expression>),
    Binary(ArithmeticOperator, Box<Expression>, Box<Expression>),
    /// The value of the first branch whose condition holds, `NULL` if there is none.
    Case(Vec<CaseBranch>),
    Coalesce(Vec<Expression>),
    Cast(Box<Expression>, SqlColumnTypeRef),
    /// The IRI-safe version of a text value: every character that is not an IRI unreserved
    /// character is percent-encoded.
    IriSafe(Box<Expression>),
    Null,
}

impl Expression {
    pub fn string(value: impl Into<String>) -> Self {
        Expression::Constant(SqlValue::String(value.into()))
    }

    pub fn integer(value: i64) -> Self {
        Expression::Constant(SqlValue::Integer(value))
    }

    pub fn column(variable: &CalculusVariable) -> Self {
        Expression::Column(variable.clone())
    }

    pub fn binary(operator: ArithmeticOperator, left: Expression, right: Expression) -> Self {
        Expression::Binary(operator, Box::new(left), Box::new(right))
    }

    pub fn cast(expression: Expression, sql_type: SqlColumnTypeRef) -> Self {
        Expression::Cast(Box::new(expression), sql_type)
    }

    pub fn iri_safe(expression: Expression) -> Self {
        Expression::IriSafe(Box::new(expression))
    }

    /// A case expression. A single branch with an always true condition is returned as its value.
    pub fn case(branches: Vec<CaseBranch>) -> Self {
        match branches.as_slice() {
            [] => Expression::Null,
            [CaseBranch {
                condition: FilterCondition::AlwaysTrue,
                value,
            }] => value.clone(),
            _ => Expression::Case(branches),
        }
    }

    pub fn as_constant(&self) -> Option<&SqlValue> {
        match self {
            Expression::Constant(value) => Some(value),
            _ => None,
        }
    }

    /// Appends all variables referenced by this expression to `result`.
    pub fn collect_variables(&self, result: &mut Vec<CalculusVariable>) {
        match self {
            Expression::Column(variable) => result.push(variable.clone()),
            Expression::Constant(_) | Expression::Null => {}
            Expression::Concatenation(parts) | Expression::Coalesce(parts) => {
                for part in parts {
                    part.collect_variables(result);
                }
            }
            Expression::Binary(_, left, right) => {
                left.collect_variables(result);
                right.collect_variables(result);
            }
            Expression::Case(branches) => {
                for branch in branches {
                    branch.condition.collect_variables(result);
                    branch.value.collect_variables(result);
                }
            }
            Expression::Cast(inner, _) | Expression::IriSafe(inner) => {
                inner.collect_variables(result);
            }
        }
    }
}

impl Display for Expression {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Expression::Constant(value) => write!(f, "{value}"),
            Expression::Column(variable) => write!(f, "{variable}"),
            Expression::Concatenation(parts) => {
                write!(f, "CONCAT(")?;
                write_list(f, parts, ", ")?;
                write!(f, ")")
            }
            Expression::Binary(operator, left, right) => write!(f, "({left} {operator} {right})"),
            Expression::Case(branches) => {
                write!(f, "CASE")?;
                for branch in branches {
                    write!(f, " WHEN {} THEN {}", branch.condition, branch.value)?;
                }
                write!(f, " END")
            }
            Expression::Coalesce(parts) => {
                write!(f, "COALESCE(")?;
                write_list(f, parts, ", ")?;
                write!(f, ")")
            }
            Expression::Cast(inner, sql_type) => write!(f, "CAST({inner} AS {sql_type})"),
            Expression::IriSafe(inner) => write!(f, "IRI_SAFE({inner})"),
            Expression::Null => write!(f, "NULL"),
        }
    }
}

pub(crate) fn write_list<T: Display>(
    f: &mut Formatter<'_>,
    items: &[T],
    separator: &str,
) -> std::fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(separator)?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}

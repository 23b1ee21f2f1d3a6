use crate::calculus::expression::write_list;
use crate::calculus::{CalculusVariable, Expression};
use std::fmt::{Display, Formatter};

/// The operator of [FilterCondition::Comparison].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComparisonType {
    Less,
    LessOrEqual,
    Greater,
    GreaterOrEqual,
}

impl Display for ComparisonType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            ComparisonType::Less => "<",
            ComparisonType::LessOrEqual => "<=",
            ComparisonType::Greater => ">",
            ComparisonType::GreaterOrEqual => ">=",
        })
    }
}

/// A condition that restricts the tuples of a [CalculusModel](crate::calculus::CalculusModel).
///
/// Conditions follow the semantics of SQL: a comparison that involves `NULL` does not hold, and
/// neither does its negation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterCondition {
    AlwaysTrue,
    AlwaysFalse,
    Conjunction(Vec<FilterCondition>),
    Disjunction(Vec<FilterCondition>),
    Negation(Box<FilterCondition>),
    Comparison(ComparisonType, Expression, Expression),
    EqualExpressions(Expression, Expression),
    EqualVariables(CalculusVariable, CalculusVariable),
    IsNull(CalculusVariable),
    /// `expression LIKE pattern`
    Like(Expression, String),
    /// Matches a language tag against a constant language range.
    LangMatches(Expression, String),
}

impl FilterCondition {
    /// A conjunction of `conditions`. No condition yields [FilterCondition::AlwaysTrue].
    pub fn conjunction(mut conditions: Vec<FilterCondition>) -> Self {
        match conditions.len() {
            0 => FilterCondition::AlwaysTrue,
            1 => conditions.remove(0),
            _ => FilterCondition::Conjunction(conditions),
        }
    }

    /// A disjunction of `conditions`. No condition yields [FilterCondition::AlwaysFalse].
    pub fn disjunction(mut conditions: Vec<FilterCondition>) -> Self {
        match conditions.len() {
            0 => FilterCondition::AlwaysFalse,
            1 => conditions.remove(0),
            _ => FilterCondition::Disjunction(conditions),
        }
    }

    pub fn and(self, other: FilterCondition) -> Self {
        Self::conjunction(vec![self, other])
    }

    pub fn or(self, other: FilterCondition) -> Self {
        Self::disjunction(vec![self, other])
    }

    pub fn negate(self) -> Self {
        FilterCondition::Negation(Box::new(self))
    }

    pub fn is_not_null(variable: &CalculusVariable) -> Self {
        FilterCondition::IsNull(variable.clone()).negate()
    }

    pub fn equal(left: Expression, right: Expression) -> Self {
        FilterCondition::EqualExpressions(left, right)
    }

    /// The constant value of this condition, if it is [FilterCondition::AlwaysTrue] or
    /// [FilterCondition::AlwaysFalse].
    pub fn as_constant(&self) -> Option<bool> {
        match self {
            FilterCondition::AlwaysTrue => Some(true),
            FilterCondition::AlwaysFalse => Some(false),
            _ => None,
        }
    }

    /// Appends all variables referenced by this condition to `result`.
    pub fn collect_variables(&self, result: &mut Vec<CalculusVariable>) {
        match self {
            FilterCondition::AlwaysTrue | FilterCondition::AlwaysFalse => {}
            FilterCondition::Conjunction(conditions) | FilterCondition::Disjunction(conditions) => {
                for condition in conditions {
                    condition.collect_variables(result);
                }
            }
            FilterCondition::Negation(inner) => inner.collect_variables(result),
            FilterCondition::Comparison(_, left, right)
            | FilterCondition::EqualExpressions(left, right) => {
                left.collect_variables(result);
                right.collect_variables(result);
            }
            FilterCondition::EqualVariables(left, right) => {
                result.push(left.clone());
                result.push(right.clone());
            }
            FilterCondition::IsNull(variable) => result.push(variable.clone()),
            FilterCondition::Like(expression, _) | FilterCondition::LangMatches(expression, _) => {
                expression.collect_variables(result);
            }
        }
    }
}

impl Display for FilterCondition {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            FilterCondition::AlwaysTrue => write!(f, "TRUE"),
            FilterCondition::AlwaysFalse => write!(f, "FALSE"),
            FilterCondition::Conjunction(conditions) => {
                write!(f, "(")?;
                write_list(f, conditions, " AND ")?;
                write!(f, ")")
            }
            FilterCondition::Disjunction(conditions) => {
                write!(f, "(")?;
                write_list(f, conditions, " OR ")?;
                write!(f, ")")
            }
            FilterCondition::Negation(inner) => write!(f, "NOT {inner}"),
            FilterCondition::Comparison(operator, left, right) => {
                write!(f, "({left} {operator} {right})")
            }
            FilterCondition::EqualExpressions(left, right) => write!(f, "({left} = {right})"),
            FilterCondition::EqualVariables(left, right) => write!(f, "({left} == {right})"),
            FilterCondition::IsNull(variable) => write!(f, "{variable} IS NULL"),
            FilterCondition::Like(expression, pattern) => {
                write!(f, "({expression} LIKE '{pattern}')")
            }
            FilterCondition::LangMatches(expression, range) => {
                write!(f, "LANGMATCHES({expression}, '{range}')")
            }
        }
    }
}

/// `variable := expression`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssignmentCondition {
    pub variable: CalculusVariable,
    pub expression: Expression,
}

impl AssignmentCondition {
    pub fn new(variable: CalculusVariable, expression: Expression) -> Self {
        Self {
            variable,
            expression,
        }
    }
}

impl Display for AssignmentCondition {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} := {}", self.variable, self.expression)
    }
}

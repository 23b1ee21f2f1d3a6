use crate::binders::ValueBinder;
use crate::calculus::{ComparisonType, Expression, FilterCondition, SqlValue};
use crate::expression_sets::{all_of, any_of, equal, negation, BooleanSet, ExpressionsSet};
use datafusion::common::{internal_err, not_impl_err};
use relsparql_algebra::{
    ArithmeticOperator, ComparisonOperator, Expression as SparqlExpression, Function,
};
use relsparql_common::{DFResult, SqlDialect};
use relsparql_model::vocab::xsd;
use relsparql_model::{is_numeric_datatype, NamedNodeRef, TypeCategory, Variable};
use std::collections::BTreeMap;

/// Compiles SPARQL expressions over the solutions of a pattern.
///
/// Every variable is read through the [ValueBinder] that the pattern assigned to it. Variables
/// without binder are unbound.
pub struct ExpressionBuilder<'a> {
    binders: &'a BTreeMap<Variable, ValueBinder>,
    dialect: &'a dyn SqlDialect,
}

impl<'a> ExpressionBuilder<'a> {
    pub fn new(binders: &'a BTreeMap<Variable, ValueBinder>, dialect: &'a dyn SqlDialect) -> Self {
        Self { binders, dialect }
    }

    /// Compiles an expression that computes an RDF term.
    pub fn build_value(&self, expression: &SparqlExpression) -> DFResult<ExpressionsSet> {
        match expression {
            SparqlExpression::Variable(variable) => match self.binders.get(variable) {
                Some(binder) => binder.expressions(self.dialect),
                None => Ok(ExpressionsSet::error()),
            },
            SparqlExpression::NamedNode(node) => Ok(ExpressionsSet::from_term(node.as_ref().into())),
            SparqlExpression::Literal(literal) => {
                Ok(ExpressionsSet::from_term(literal.as_ref().into()))
            }
            SparqlExpression::Arithmetic(operator, left, right) => {
                let left = self.build_value(left)?;
                let right = self.build_value(right)?;
                Ok(self.arithmetic(*operator, left, right))
            }
            SparqlExpression::UnaryPlus(inner) => {
                let inner = self.build_value(inner)?;
                Ok(ExpressionsSet {
                    is_not_error: all_of([
                        inner.is_not_error.clone(),
                        inner.has_category(TypeCategory::NumericLiteral),
                    ]),
                    ..inner
                })
            }
            SparqlExpression::UnaryMinus(inner) => {
                let inner = self.build_value(inner)?;
                let zero = ExpressionsSet::numeric(
                    FilterCondition::AlwaysTrue,
                    inner.type_iri.clone(),
                    Expression::integer(0),
                    Expression::string("0"),
                );
                Ok(self.arithmetic(ArithmeticOperator::Subtract, zero, inner))
            }
            SparqlExpression::If(test, then, otherwise) => {
                let test = self.build_boolean(test)?;
                Ok(ExpressionsSet::choose(vec![
                    (test.when_true, self.build_value(then)?),
                    (test.when_false, self.build_value(otherwise)?),
                ]))
            }
            SparqlExpression::Coalesce(args) => Ok(ExpressionsSet::choose(
                args.iter()
                    .map(|arg| Ok((FilterCondition::AlwaysTrue, self.build_value(arg)?)))
                    .collect::<DFResult<_>>()?,
            )),
            SparqlExpression::FunctionCall(Function::Str, args) => {
                let arg = self.build_value(single_argument(Function::Str, args)?)?;
                Ok(ExpressionsSet::string_literal(
                    all_of([
                        arg.is_not_error.clone(),
                        negation(arg.has_category(TypeCategory::BlankNode)),
                    ]),
                    arg.string_value,
                ))
            }
            SparqlExpression::FunctionCall(Function::Lang, args) => {
                let arg = self.build_value(single_argument(Function::Lang, args)?)?;
                Ok(ExpressionsSet::string_literal(
                    all_of([arg.is_not_error.clone(), arg.is_literal()]),
                    arg.language,
                ))
            }
            SparqlExpression::FunctionCall(Function::Datatype, args) => {
                let arg = self.build_value(single_argument(Function::Datatype, args)?)?;
                Ok(ExpressionsSet::iri(
                    all_of([arg.is_not_error.clone(), arg.is_literal()]),
                    arg.type_iri,
                ))
            }
            _ => Ok(ExpressionsSet::from_boolean(self.build_boolean(expression)?)),
        }
    }

    /// Compiles an expression that is used as a condition.
    pub fn build_boolean(&self, expression: &SparqlExpression) -> DFResult<BooleanSet> {
        match expression {
            SparqlExpression::Or(left, right) => {
                Ok(self.build_boolean(left)?.or(self.build_boolean(right)?))
            }
            SparqlExpression::And(left, right) => {
                Ok(self.build_boolean(left)?.and(self.build_boolean(right)?))
            }
            SparqlExpression::Not(inner) => Ok(self.build_boolean(inner)?.negate()),
            SparqlExpression::Compare(operator, left, right) => {
                let left = self.build_value(left)?;
                let right = self.build_value(right)?;
                Ok(match comparison_type(*operator) {
                    None => equality(&left, &right),
                    Some(comparison) => ordering(comparison, &left, &right),
                })
            }
            SparqlExpression::SameTerm(left, right) => {
                let left = self.build_value(left)?;
                let right = self.build_value(right)?;
                Ok(BooleanSet::from_condition(
                    all_of([left.is_not_error.clone(), right.is_not_error.clone()]),
                    left.same_term(&right),
                ))
            }
            SparqlExpression::Bound(variable) => Ok(match self.binders.get(variable) {
                Some(binder) => BooleanSet::from_condition(
                    FilterCondition::AlwaysTrue,
                    binder.bound_condition(),
                ),
                None => BooleanSet::constant(false),
            }),
            SparqlExpression::In(needle, haystack) => {
                let needle = self.build_value(needle)?;
                let mut result = BooleanSet::from_condition(
                    needle.is_not_error.clone(),
                    FilterCondition::AlwaysFalse,
                );
                for item in haystack {
                    result = result.or(equality(&needle, &self.build_value(item)?));
                }
                Ok(result)
            }
            SparqlExpression::FunctionCall(function, args) => self.build_test(*function, args),
            _ => Ok(BooleanSet::effective_boolean_value(
                &self.build_value(expression)?,
            )),
        }
    }

    fn build_test(&self, function: Function, args: &[SparqlExpression]) -> DFResult<BooleanSet> {
        match function {
            Function::IsIri | Function::IsBlank | Function::IsLiteral | Function::IsNumeric => {
                let arg = self.build_value(single_argument(function, args)?)?;
                let test = match function {
                    Function::IsIri => arg.has_category(TypeCategory::Iri),
                    Function::IsBlank => arg.has_category(TypeCategory::BlankNode),
                    Function::IsNumeric => arg.has_category(TypeCategory::NumericLiteral),
                    _ => arg.is_literal(),
                };
                Ok(BooleanSet::from_condition(arg.is_not_error, test))
            }
            Function::LangMatches => {
                let [tag, range] = args else {
                    return internal_err!("LANGMATCHES expects two arguments.");
                };
                let range = match range {
                    SparqlExpression::Literal(range) => range.value().to_owned(),
                    _ => return not_impl_err!("LANGMATCHES with a non-constant language range"),
                };
                let tag = self.build_value(tag)?;
                Ok(BooleanSet::from_condition(
                    all_of([tag.is_not_error.clone(), tag.is_string()]),
                    FilterCondition::LangMatches(tag.string_value, range),
                ))
            }
            Function::Regex => {
                let (text, pattern) = match args {
                    [text, SparqlExpression::Literal(pattern)] => (text, pattern.value()),
                    [_, _] => return not_impl_err!("REGEX with a non-constant pattern"),
                    _ => return not_impl_err!("REGEX with flags"),
                };
                let Some(like) = regex_to_like(pattern) else {
                    return not_impl_err!("REGEX pattern '{pattern}' cannot be expressed in SQL");
                };
                let text = self.build_value(text)?;
                Ok(BooleanSet::from_condition(
                    all_of([
                        text.is_not_error.clone(),
                        text.has_any_category(&[
                            TypeCategory::SimpleLiteral,
                            TypeCategory::StringLiteral,
                            TypeCategory::LangString,
                        ]),
                    ]),
                    FilterCondition::Like(text.string_value, like),
                ))
            }
            Function::Str | Function::Lang | Function::Datatype => {
                let value = self.build_value(&SparqlExpression::FunctionCall(
                    function,
                    args.to_vec(),
                ))?;
                Ok(BooleanSet::effective_boolean_value(&value))
            }
        }
    }

    /// Numeric arithmetic. The result type follows the XSD type promotion if both operand
    /// types are known and is `xsd:decimal` otherwise.
    ///
    /// # Relevant Resources
    /// - [SPARQL 1.1 - Operator Mapping](https://www.w3.org/TR/sparql11-query/#OperatorMapping)
    fn arithmetic(
        &self,
        operator: ArithmeticOperator,
        left: ExpressionsSet,
        right: ExpressionsSet,
    ) -> ExpressionsSet {
        let mut is_not_error = all_of([
            left.is_not_error.clone(),
            right.is_not_error.clone(),
            left.has_category(TypeCategory::NumericLiteral),
            right.has_category(TypeCategory::NumericLiteral),
        ]);
        let left_value = match operator {
            ArithmeticOperator::Divide => {
                is_not_error = all_of([
                    is_not_error,
                    negation(equal(right.numeric_value.clone(), Expression::integer(0))),
                ]);
                Expression::cast(left.numeric_value, self.dialect.decimal_type())
            }
            _ => left.numeric_value,
        };

        let type_iri = match (
            numeric_rank(&left.type_iri),
            numeric_rank(&right.type_iri),
        ) {
            (Some(l), Some(r)) => {
                let rank = l.max(r);
                if operator == ArithmeticOperator::Divide {
                    rank.max(NumericRank::Decimal)
                } else {
                    rank
                }
            }
            _ => NumericRank::Decimal,
        };

        let numeric_value = Expression::binary(operator, left_value, right.numeric_value);
        let string_value = Expression::cast(numeric_value.clone(), self.dialect.string_type());
        ExpressionsSet::numeric(
            is_not_error,
            Expression::string(type_iri.datatype()),
            numeric_value,
            string_value,
        )
    }
}

/// `=` compares numbers by value and all other terms as RDF terms.
///
/// # Relevant Resources
/// - [SPARQL 1.1 - RDFterm-equal](https://www.w3.org/TR/sparql11-query/#func-RDFterm-equal)
fn equality(left: &ExpressionsSet, right: &ExpressionsSet) -> BooleanSet {
    let numeric = all_of([
        left.has_category(TypeCategory::NumericLiteral),
        right.has_category(TypeCategory::NumericLiteral),
    ]);
    let equal_numbers = equal(left.numeric_value.clone(), right.numeric_value.clone());
    let same_term = left.same_term(right);
    let is_not_error = all_of([left.is_not_error.clone(), right.is_not_error.clone()]);

    let when_true = any_of([
        all_of([numeric.clone(), equal_numbers.clone()]),
        all_of([negation(numeric.clone()), same_term.clone()]),
    ]);
    let when_false = any_of([
        all_of([numeric.clone(), negation(equal_numbers)]),
        all_of([negation(numeric), negation(same_term)]),
    ]);
    BooleanSet::new(
        all_of([is_not_error.clone(), when_true]),
        all_of([is_not_error, when_false]),
    )
}

/// `<`, `<=`, `>` and `>=` on numbers, strings and date times. Other combinations are errors.
fn ordering(
    comparison: ComparisonType,
    left: &ExpressionsSet,
    right: &ExpressionsSet,
) -> BooleanSet {
    let numeric = all_of([
        left.has_category(TypeCategory::NumericLiteral),
        right.has_category(TypeCategory::NumericLiteral),
    ]);
    let strings = all_of([left.is_string(), right.is_string()]);
    let date_times = all_of([
        left.has_category(TypeCategory::DateTimeLiteral),
        right.has_category(TypeCategory::DateTimeLiteral),
    ]);
    let compare = |comparison: ComparisonType| {
        any_of([
            all_of([
                numeric.clone(),
                FilterCondition::Comparison(
                    comparison,
                    left.numeric_value.clone(),
                    right.numeric_value.clone(),
                ),
            ]),
            all_of([
                any_of([strings.clone(), date_times.clone()]),
                FilterCondition::Comparison(
                    comparison,
                    left.string_value.clone(),
                    right.string_value.clone(),
                ),
            ]),
        ])
    };

    let is_not_error = all_of([left.is_not_error.clone(), right.is_not_error.clone()]);
    BooleanSet::new(
        all_of([is_not_error.clone(), compare(comparison)]),
        all_of([is_not_error, compare(inverse(comparison))]),
    )
}

fn comparison_type(operator: ComparisonOperator) -> Option<ComparisonType> {
    match operator {
        ComparisonOperator::Equal => None,
        ComparisonOperator::Less => Some(ComparisonType::Less),
        ComparisonOperator::LessOrEqual => Some(ComparisonType::LessOrEqual),
        ComparisonOperator::Greater => Some(ComparisonType::Greater),
        ComparisonOperator::GreaterOrEqual => Some(ComparisonType::GreaterOrEqual),
    }
}

fn inverse(comparison: ComparisonType) -> ComparisonType {
    match comparison {
        ComparisonType::Less => ComparisonType::GreaterOrEqual,
        ComparisonType::LessOrEqual => ComparisonType::Greater,
        ComparisonType::Greater => ComparisonType::LessOrEqual,
        ComparisonType::GreaterOrEqual => ComparisonType::Less,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum NumericRank {
    Integer,
    Decimal,
    Float,
    Double,
}

impl NumericRank {
    fn datatype(self) -> &'static str {
        match self {
            NumericRank::Integer => xsd::INTEGER.as_str(),
            NumericRank::Decimal => xsd::DECIMAL.as_str(),
            NumericRank::Float => xsd::FLOAT.as_str(),
            NumericRank::Double => xsd::DOUBLE.as_str(),
        }
    }
}

/// The promotion rank of a constant numeric datatype. Derived integer types count as
/// `xsd:integer`.
fn numeric_rank(type_iri: &Expression) -> Option<NumericRank> {
    let Some(SqlValue::String(datatype)) = type_iri.as_constant() else {
        return None;
    };
    let datatype = datatype.as_str();
    if datatype == xsd::DECIMAL.as_str() {
        Some(NumericRank::Decimal)
    } else if datatype == xsd::FLOAT.as_str() {
        Some(NumericRank::Float)
    } else if datatype == xsd::DOUBLE.as_str() {
        Some(NumericRank::Double)
    } else if is_numeric_datatype(NamedNodeRef::new_unchecked(datatype)) {
        Some(NumericRank::Integer)
    } else {
        None
    }
}

fn single_argument(function: Function, args: &[SparqlExpression]) -> DFResult<&SparqlExpression> {
    match args {
        [arg] => Ok(arg),
        _ => internal_err!("{function} expects a single argument."),
    }
}

/// Translates a regular expression into a `LIKE` pattern. Only literal text with optional
/// `^` and `$` anchors is supported.
fn regex_to_like(pattern: &str) -> Option<String> {
    let (body, anchored_start) = match pattern.strip_prefix('^') {
        Some(body) => (body, true),
        None => (pattern, false),
    };
    let (body, anchored_end) = match body.strip_suffix('$') {
        Some(body) => (body, true),
        None => (body, false),
    };
    if body.chars().any(|c| ".*+?()[]{}|\\^$%_".contains(c)) {
        return None;
    }

    let start = if anchored_start { "" } else { "%" };
    let end = if anchored_end { "" } else { "%" };
    Some(format!("{start}{body}{end}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use relsparql_common::MsSqlDialect;
    use relsparql_model::{Literal, NamedNode};

    fn literal(value: &str) -> SparqlExpression {
        SparqlExpression::Literal(Literal::new_simple_literal(value))
    }

    fn integer(value: &str) -> SparqlExpression {
        SparqlExpression::Literal(Literal::new_typed_literal(value, xsd::INTEGER))
    }

    #[test]
    fn test_regex_to_like() {
        assert_eq!(regex_to_like("^Jane").as_deref(), Some("Jane%"));
        assert_eq!(regex_to_like("Doe$").as_deref(), Some("%Doe"));
        assert_eq!(regex_to_like("oh").as_deref(), Some("%oh%"));
        assert_eq!(regex_to_like("^a.b$"), None);
        assert_eq!(regex_to_like("100%"), None);
    }

    #[test]
    fn test_constant_comparisons_are_folded() {
        let binders = BTreeMap::new();
        let builder = ExpressionBuilder::new(&binders, &MsSqlDialect);

        let same = SparqlExpression::compare(ComparisonOperator::Equal, literal("a"), literal("a"));
        assert_eq!(builder.build_boolean(&same).unwrap(), BooleanSet::constant(true));

        let iri = SparqlExpression::NamedNode(NamedNode::new_unchecked("http://ex.org/a"));
        let mixed = SparqlExpression::compare(ComparisonOperator::Equal, iri, literal("a"));
        assert_eq!(builder.build_boolean(&mixed).unwrap(), BooleanSet::constant(false));
    }

    #[test]
    fn test_unbound_variable() {
        let binders = BTreeMap::new();
        let builder = ExpressionBuilder::new(&binders, &MsSqlDialect);
        let bound = SparqlExpression::Bound(Variable::new_unchecked("x"));
        assert_eq!(builder.build_boolean(&bound).unwrap(), BooleanSet::constant(false));

        let value = builder
            .build_value(&SparqlExpression::Variable(Variable::new_unchecked("x")))
            .unwrap();
        assert_eq!(value.is_not_error, FilterCondition::AlwaysFalse);
    }

    #[test]
    fn test_integer_division_is_decimal() {
        let binders = BTreeMap::new();
        let builder = ExpressionBuilder::new(&binders, &MsSqlDialect);
        let division = SparqlExpression::Arithmetic(
            ArithmeticOperator::Divide,
            Box::new(integer("1")),
            Box::new(integer("2")),
        );
        let value = builder.build_value(&division).unwrap();
        assert_eq!(value.type_iri, Expression::string(xsd::DECIMAL.as_str()));
        insta::assert_snapshot!(value.numeric_value, @"(CAST(1 AS decimal(38,10)) / 2)");
        insta::assert_snapshot!(value.is_not_error, @"TRUE");
    }

    #[test]
    fn test_regex_with_flags_is_not_supported() {
        let binders = BTreeMap::new();
        let builder = ExpressionBuilder::new(&binders, &MsSqlDialect);
        let regex = SparqlExpression::FunctionCall(
            Function::Regex,
            vec![literal("a"), literal("a"), literal("i")],
        );
        assert!(builder.build_boolean(&regex).is_err());
    }
}

use crate::{CalculusOptimizerRule, OptimizerContext};
use datafusion::common::tree_node::Transformed;
use relsparql_common::{DFResult, SqlTypeKind};
use relsparql_logical::calculus::{
    CalculusModel, CalculusVariable, Expression, FilterCondition, SqlValue,
};
use relsparql_logical::rewrite::CalculusRewriter;
use relsparql_mapping::{appears_in_iri_safe, iri_unsafe};
use std::collections::VecDeque;

/// Splits equalities that involve concatenations (usually IRI templates) into equalities of
/// the concatenated parts.
///
/// - Literal prefixes and suffixes are stripped from both sides. A mismatch yields `FALSE`.
/// - If a single constant remains on one side, it is split at the literal separators of the other
///   side and every part is compared on its own. This only happens if no value can contain the
///   separator that follows it.
/// - If a single column remains on both sides, the columns are compared directly.
/// - Casts of integer columns to text are unwrapped when compared to a constant.
/// - IRI-safe texts are compared to the decoded constant. A constant that is not IRI-safe never
///   matches.
#[derive(Debug, Default)]
pub struct ConcatenationInEqualConditionRule {}

impl ConcatenationInEqualConditionRule {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CalculusOptimizerRule for ConcatenationInEqualConditionRule {
    fn name(&self) -> &str {
        "concatenation-in-equal-condition"
    }

    fn rewrite(
        &self,
        model: CalculusModel,
        _context: &mut OptimizerContext,
    ) -> DFResult<Transformed<CalculusModel>> {
        ConcatenationRewriter {}.rewrite_model(model)
    }
}

struct ConcatenationRewriter {}

impl CalculusRewriter for ConcatenationRewriter {
    fn post_rewrite_filter(
        &mut self,
        filter: FilterCondition,
    ) -> DFResult<Transformed<FilterCondition>> {
        Ok(match filter {
            FilterCondition::EqualExpressions(left, right) => rewrite_equality(left, right),
            filter => Transformed::no(filter),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Part {
    Text(String),
    Value(Expression),
}

fn rewrite_equality(left: Expression, right: Expression) -> Transformed<FilterCondition> {
    if matches!(left, Expression::Concatenation(_)) || matches!(right, Expression::Concatenation(_))
    {
        if let Some(condition) = split(parts(&left), parts(&right)) {
            return Transformed::yes(condition);
        }
    }

    match unwrap_integer_cast(&left, &right).or_else(|| unwrap_integer_cast(&right, &left)) {
        Some(condition) => Transformed::yes(condition),
        None => match unwrap_iri_safe(&left, &right) {
            Some(condition) => Transformed::yes(condition),
            None => Transformed::no(FilterCondition::EqualExpressions(left, right)),
        },
    }
}

/// The flattened parts of a concatenation. Adjacent texts are merged and empty texts dropped.
fn parts(expression: &Expression) -> VecDeque<Part> {
    fn collect(expression: &Expression, result: &mut VecDeque<Part>) {
        match expression {
            Expression::Concatenation(parts) => {
                for part in parts {
                    collect(part, result);
                }
            }
            Expression::Constant(SqlValue::String(text)) => {
                if text.is_empty() {
                    return;
                }
                match result.back_mut() {
                    Some(Part::Text(previous)) => previous.push_str(text),
                    _ => result.push_back(Part::Text(text.clone())),
                }
            }
            other => result.push_back(Part::Value(other.clone())),
        }
    }

    let mut result = VecDeque::new();
    collect(expression, &mut result);
    result
}

fn to_expression(parts: VecDeque<Part>) -> Expression {
    let mut expressions = parts
        .into_iter()
        .map(|part| match part {
            Part::Text(text) => Expression::string(text),
            Part::Value(value) => value,
        })
        .collect::<Vec<_>>();
    match expressions.len() {
        0 => Expression::string(""),
        1 => expressions.remove(0),
        _ => Expression::Concatenation(expressions),
    }
}

/// Compares both sides part by part. Returns [None] if nothing can be simplified.
fn split(mut left: VecDeque<Part>, mut right: VecDeque<Part>) -> Option<FilterCondition> {
    let mut changed = false;

    while let (Some(Part::Text(l)), Some(Part::Text(r))) = (left.front_mut(), right.front_mut()) {
        if l.starts_with(r.as_str()) {
            l.drain(..r.len());
            r.clear();
        } else if r.starts_with(l.as_str()) {
            r.drain(..l.len());
            l.clear();
        } else {
            return Some(FilterCondition::AlwaysFalse);
        }
        drop_empty_front(&mut left);
        drop_empty_front(&mut right);
        changed = true;
    }

    while let (Some(Part::Text(l)), Some(Part::Text(r))) = (left.back_mut(), right.back_mut()) {
        if l.ends_with(r.as_str()) {
            l.truncate(l.len() - r.len());
            r.clear();
        } else if r.ends_with(l.as_str()) {
            r.truncate(r.len() - l.len());
            l.clear();
        } else {
            return Some(FilterCondition::AlwaysFalse);
        }
        drop_empty_back(&mut left);
        drop_empty_back(&mut right);
        changed = true;
    }

    match (left.len(), right.len()) {
        (0, 0) => return Some(FilterCondition::AlwaysTrue),
        (0, _) | (_, 0) => {
            let rest = if left.is_empty() { &right } else { &left };
            if rest.iter().all(|p| matches!(p, Part::Text(_))) {
                return Some(FilterCondition::AlwaysFalse);
            }
        }
        (1, 1) => {
            if let (Some(Part::Value(l)), Some(Part::Value(r))) = (left.front(), right.front()) {
                return Some(value_equality(l.clone(), r.clone()));
            }
        }
        _ => {}
    }

    if let Some(condition) = split_at_separators(&left, &right)
        .or_else(|| split_at_separators(&right, &left))
    {
        return Some(condition);
    }

    changed.then(|| value_equality(to_expression(left), to_expression(right)))
}

fn drop_empty_front(parts: &mut VecDeque<Part>) {
    if matches!(parts.front(), Some(Part::Text(text)) if text.is_empty()) {
        parts.pop_front();
    }
}

fn drop_empty_back(parts: &mut VecDeque<Part>) {
    if matches!(parts.back(), Some(Part::Text(text)) if text.is_empty()) {
        parts.pop_back();
    }
}

/// Matches a constant (`constant`) against values separated by literal texts (`values`). Each
/// separator is matched at its first occurrence, so the value in front of a separator must not be
/// able to contain its first character.
fn split_at_separators(
    values: &VecDeque<Part>,
    constant: &VecDeque<Part>,
) -> Option<FilterCondition> {
    if constant.len() != 1 {
        return None;
    }
    let Some(Part::Text(constant)) = constant.front() else {
        return None;
    };
    let alternating = values.iter().zip(values.iter().skip(1)).all(|(a, b)| {
        matches!(
            (a, b),
            (Part::Value(_), Part::Text(_)) | (Part::Text(_), Part::Value(_))
        )
    });
    if !alternating || !matches!(values.front(), Some(Part::Value(_))) {
        return None;
    }
    let unambiguous = values
        .iter()
        .zip(values.iter().skip(1))
        .all(|pair| match pair {
            (Part::Value(value), Part::Text(separator)) => separator
                .chars()
                .next()
                .is_some_and(|c| !can_contain(value, c)),
            _ => true,
        });
    if !unambiguous {
        return None;
    }

    let mut conditions = Vec::new();
    let mut rest = constant.as_str();
    let mut pending: Option<&Expression> = None;
    for part in values {
        match part {
            Part::Value(value) => pending = Some(value),
            Part::Text(separator) => {
                let Some(position) = rest.find(separator.as_str()) else {
                    return Some(FilterCondition::AlwaysFalse);
                };
                if let Some(value) = pending.take() {
                    conditions.push(value_equality(
                        value.clone(),
                        Expression::string(&rest[..position]),
                    ));
                }
                rest = &rest[position + separator.len()..];
            }
        }
    }
    match pending {
        Some(value) => conditions.push(value_equality(value.clone(), Expression::string(rest))),
        None if !rest.is_empty() => return Some(FilterCondition::AlwaysFalse),
        None => {}
    }
    Some(FilterCondition::conjunction(conditions))
}

/// Whether the text of `value` may contain `c`.
fn can_contain(value: &Expression, c: char) -> bool {
    if integer_column(value).is_some() {
        return c == '-' || c.is_ascii_digit();
    }
    match value {
        Expression::IriSafe(_) => appears_in_iri_safe(c),
        _ => true,
    }
}

/// The equality of two single values.
fn value_equality(left: Expression, right: Expression) -> FilterCondition {
    if let Some(condition) = unwrap_iri_safe(&left, &right) {
        return condition;
    }
    match (integer_column(&left), integer_column(&right)) {
        (Some(l), Some(r)) => return FilterCondition::EqualVariables(l.clone(), r.clone()),
        (None, None) => {}
        _ => {
            if let Some(condition) =
                unwrap_integer_cast(&left, &right).or_else(|| unwrap_integer_cast(&right, &left))
            {
                return condition;
            }
        }
    }
    match (left, right) {
        (Expression::Column(l), Expression::Column(r)) => FilterCondition::EqualVariables(l, r),
        (left, right) => FilterCondition::EqualExpressions(left, right),
    }
}

/// The column of `CAST(column AS <text>)` if the column holds integers.
fn integer_column(expression: &Expression) -> Option<&CalculusVariable> {
    let Expression::Cast(inner, target) = expression else {
        return None;
    };
    match inner.as_ref() {
        Expression::Column(variable)
            if target.kind() == SqlTypeKind::String
                && variable.sql_type().kind() == SqlTypeKind::Integer =>
        {
            Some(variable)
        }
        _ => None,
    }
}

/// `CAST(column AS <text>) = 'constant'` becomes `column = constant` for integer columns. Text
/// that is not the canonical form of an integer never matches.
fn unwrap_integer_cast(cast: &Expression, constant: &Expression) -> Option<FilterCondition> {
    let variable = integer_column(cast)?;
    let Expression::Constant(SqlValue::String(text)) = constant else {
        return None;
    };
    Some(match text.parse::<i64>() {
        Ok(value) if value.to_string() == *text => {
            FilterCondition::equal(Expression::column(variable), Expression::integer(value))
        }
        _ => FilterCondition::AlwaysFalse,
    })
}

/// Compares the texts of two IRI-safe values, or the text of an IRI-safe value with the decoded
/// constant.
fn unwrap_iri_safe(left: &Expression, right: &Expression) -> Option<FilterCondition> {
    match (left, right) {
        (Expression::IriSafe(left), Expression::IriSafe(right)) => {
            Some(value_equality(left.as_ref().clone(), right.as_ref().clone()))
        }
        (Expression::IriSafe(value), Expression::Constant(SqlValue::String(text)))
        | (Expression::Constant(SqlValue::String(text)), Expression::IriSafe(value)) => {
            Some(match iri_unsafe(text) {
                Some(decoded) => {
                    value_equality(value.as_ref().clone(), Expression::string(decoded))
                }
                None => FilterCondition::AlwaysFalse,
            })
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relsparql_common::{MsSqlDialect, SqlDialect};
    use relsparql_logical::calculus::CalculusIdGenerator;

    fn rewrite(left: Expression, right: Expression) -> Transformed<CalculusModel> {
        let mut generator = CalculusIdGenerator::new();
        let mut model = CalculusModel::new(generator.next_source_id());
        model.filters.push(FilterCondition::equal(left, right));
        ConcatenationInEqualConditionRule::new()
            .rewrite(model, &mut OptimizerContext::new())
            .unwrap()
    }

    fn person_iri(id: &CalculusVariable) -> Expression {
        Expression::Concatenation(vec![
            Expression::string("http://ex.org/person/"),
            Expression::cast(Expression::column(id), MsSqlDialect.string_type()),
        ])
    }

    fn variables() -> (CalculusVariable, CalculusVariable) {
        let mut generator = CalculusIdGenerator::new();
        (
            generator.column_variable("a", MsSqlDialect.integer_type(), false),
            generator.column_variable("b", MsSqlDialect.string_type(), true),
        )
    }

    #[test]
    fn test_prefix_is_stripped_and_cast_unwrapped() {
        let (a, _) = variables();
        let result = rewrite(person_iri(&a), Expression::string("http://ex.org/person/12"));
        assert!(result.transformed);
        insta::assert_snapshot!(result.data.filters[0], @"(a#0 = 12)");
    }

    #[test]
    fn test_prefix_mismatch() {
        let (a, _) = variables();
        let result = rewrite(person_iri(&a), Expression::string("http://ex.org/dept/12"));
        assert_eq!(result.data.filters, vec![FilterCondition::AlwaysFalse]);
    }

    #[test]
    fn test_non_canonical_integer_never_matches() {
        let (a, _) = variables();
        let result = rewrite(person_iri(&a), Expression::string("http://ex.org/person/012"));
        assert_eq!(result.data.filters, vec![FilterCondition::AlwaysFalse]);
    }

    #[test]
    fn test_split_at_separator() {
        let (a, b) = variables();
        let template = Expression::Concatenation(vec![
            Expression::string("http://ex.org/"),
            Expression::cast(Expression::column(&a), MsSqlDialect.string_type()),
            Expression::string("/"),
            Expression::column(&b),
        ]);
        let result = rewrite(Expression::string("http://ex.org/7/x"), template);
        insta::assert_snapshot!(result.data.filters[0], @"((a#0 = 7) AND (b#1 = 'x'))");
    }

    #[test]
    fn test_split_at_separators_with_suffix() {
        let mut generator = CalculusIdGenerator::new();
        let col1 = generator.column_variable("col1", MsSqlDialect.integer_type(), false);
        let col2 = generator.column_variable("col2", MsSqlDialect.integer_type(), false);
        let template = Expression::Concatenation(vec![
            Expression::string("http://s.com/"),
            Expression::cast(Expression::column(&col1), MsSqlDialect.string_type()),
            Expression::string("/s/"),
            Expression::cast(Expression::column(&col2), MsSqlDialect.string_type()),
            Expression::string("/e"),
        ]);
        let result = rewrite(template, Expression::string("http://s.com/12/s/14/e"));
        insta::assert_snapshot!(result.data.filters[0], @"((col1#0 = 12) AND (col2#1 = 14))");
    }

    #[test]
    fn test_text_columns_are_not_split() {
        let mut generator = CalculusIdGenerator::new();
        let b = generator.column_variable("b", MsSqlDialect.string_type(), false);
        let c = generator.column_variable("c", MsSqlDialect.string_type(), false);
        let template = Expression::Concatenation(vec![
            Expression::string("http://ex.org/"),
            Expression::column(&b),
            Expression::string("/"),
            Expression::column(&c),
        ]);
        let result = rewrite(template, Expression::string("http://ex.org/a/b/c"));
        insta::assert_snapshot!(result.data.filters[0], @"(CONCAT(b#0, '/', c#1) = 'a/b/c')");
    }

    #[test]
    fn test_separator_that_integers_contain_is_not_split() {
        let mut generator = CalculusIdGenerator::new();
        let a = generator.column_variable("a", MsSqlDialect.integer_type(), false);
        let b = generator.column_variable("b", MsSqlDialect.integer_type(), false);
        let template = Expression::Concatenation(vec![
            Expression::string("http://ex.org/"),
            Expression::cast(Expression::column(&a), MsSqlDialect.string_type()),
            Expression::string("-"),
            Expression::cast(Expression::column(&b), MsSqlDialect.string_type()),
        ]);
        let result = rewrite(template, Expression::string("http://ex.org/-1-2"));
        insta::assert_snapshot!(
            result.data.filters[0],
            @"(CONCAT(CAST(a#0 AS nvarchar(max)), '-', CAST(b#1 AS nvarchar(max))) = '-1-2')"
        );
    }

    #[test]
    fn test_iri_safe_columns_are_split_and_decoded() {
        let mut generator = CalculusIdGenerator::new();
        let b = generator.column_variable("b", MsSqlDialect.string_type(), false);
        let c = generator.column_variable("c", MsSqlDialect.string_type(), false);
        let template = Expression::Concatenation(vec![
            Expression::string("http://ex.org/"),
            Expression::iri_safe(Expression::column(&b)),
            Expression::string("/"),
            Expression::iri_safe(Expression::column(&c)),
        ]);
        let result = rewrite(template, Expression::string("http://ex.org/a%2Fb/c"));
        insta::assert_snapshot!(result.data.filters[0], @"((b#0 = 'a/b') AND (c#1 = 'c'))");
    }

    #[test]
    fn test_text_that_is_not_iri_safe_never_matches() {
        let (_, b) = variables();
        let template = Expression::Concatenation(vec![
            Expression::string("http://ex.org/person/"),
            Expression::iri_safe(Expression::column(&b)),
        ]);
        let result = rewrite(template, Expression::string("http://ex.org/person/a b"));
        assert_eq!(result.data.filters, vec![FilterCondition::AlwaysFalse]);
    }

    #[test]
    fn test_iri_safe_values_compare_their_texts() {
        let mut generator = CalculusIdGenerator::new();
        let b = generator.column_variable("b", MsSqlDialect.string_type(), false);
        let c = generator.column_variable("c", MsSqlDialect.string_type(), false);
        let iri = |variable: &CalculusVariable| {
            Expression::Concatenation(vec![
                Expression::string("http://ex.org/person/"),
                Expression::iri_safe(Expression::column(variable)),
            ])
        };
        let result = rewrite(iri(&b), iri(&c));
        insta::assert_snapshot!(result.data.filters[0], @"(b#0 == c#1)");
    }

    #[test]
    fn test_missing_separator() {
        let (a, b) = variables();
        let template = Expression::Concatenation(vec![
            Expression::column(&b),
            Expression::string("-"),
            Expression::cast(Expression::column(&a), MsSqlDialect.string_type()),
        ]);
        let result = rewrite(template, Expression::string("x"));
        assert_eq!(result.data.filters, vec![FilterCondition::AlwaysFalse]);
    }

    #[test]
    fn test_same_template_compares_columns() {
        let mut generator = CalculusIdGenerator::new();
        let a = generator.column_variable("a", MsSqlDialect.integer_type(), false);
        let b = generator.column_variable("b", MsSqlDialect.integer_type(), false);
        let result = rewrite(person_iri(&a), person_iri(&b));
        insta::assert_snapshot!(result.data.filters[0], @"(a#0 == b#1)");
    }

    #[test]
    fn test_plain_equality_is_kept() {
        let (_, b) = variables();
        let result = rewrite(Expression::column(&b), Expression::string("x"));
        assert!(!result.transformed);
    }
}

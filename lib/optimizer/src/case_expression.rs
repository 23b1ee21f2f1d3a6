use crate::{CalculusOptimizerRule, OptimizerContext};
use datafusion::common::tree_node::Transformed;
use relsparql_common::DFResult;
use relsparql_logical::calculus::{
    CalculusModel, CaseBranch, ComparisonType, Expression, FilterCondition,
};
use relsparql_logical::expression_sets::{all_of, any_of, equal, negation};
use relsparql_logical::rewrite::CalculusRewriter;

/// Lifts `CASE` expressions out of equalities and comparisons.
///
/// `CASE WHEN c1 THEN v1 WHEN c2 THEN v2 END = x` becomes
/// `(c1 AND v1 = x) OR (c2 AND NOT (c1 IS TRUE) AND v2 = x)`. The branch values are usually
/// constants, so the resulting comparisons can be folded by the other rules. Nested cases are
/// flattened: every conjunction carries the conditions of all enclosing branches.
///
/// `c IS TRUE` is expressed with null checks of the variables of `c`. Cases whose conditions do
/// not allow this are left alone, and so are conditions below a negation.
#[derive(Debug, Default)]
pub struct CaseExpressionToConditionRule {}

impl CaseExpressionToConditionRule {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CalculusOptimizerRule for CaseExpressionToConditionRule {
    fn name(&self) -> &str {
        "case-expression-to-condition"
    }

    fn rewrite(
        &self,
        model: CalculusModel,
        _context: &mut OptimizerContext,
    ) -> DFResult<Transformed<CalculusModel>> {
        CaseLifter {}.rewrite_model(model)
    }
}

struct CaseLifter {}

impl CalculusRewriter for CaseLifter {
    fn should_rewrite_filter(&mut self, filter: &FilterCondition) -> bool {
        !matches!(filter, FilterCondition::Negation(_))
    }

    fn post_rewrite_filter(
        &mut self,
        filter: FilterCondition,
    ) -> DFResult<Transformed<FilterCondition>> {
        Ok(match filter {
            FilterCondition::EqualExpressions(left, right) => {
                match lift(&left, &right, &Comparison::Equal) {
                    Some(condition) => Transformed::yes(condition),
                    None => Transformed::no(FilterCondition::EqualExpressions(left, right)),
                }
            }
            FilterCondition::Comparison(operator, left, right) => {
                match lift(&left, &right, &Comparison::Ordered(operator)) {
                    Some(condition) => Transformed::yes(condition),
                    None => Transformed::no(FilterCondition::Comparison(operator, left, right)),
                }
            }
            filter => Transformed::no(filter),
        })
    }
}

enum Comparison {
    Equal,
    Ordered(ComparisonType),
}

impl Comparison {
    fn build(&self, left: Expression, right: Expression) -> FilterCondition {
        if matches!(left, Expression::Null) || matches!(right, Expression::Null) {
            return FilterCondition::AlwaysFalse;
        }
        match self {
            Comparison::Equal => equal(left, right),
            Comparison::Ordered(operator) => FilterCondition::Comparison(*operator, left, right),
        }
    }
}

/// Alternatives of a lifted comparison. Each alternative is a list of conditions that hold
/// together.
type Alternatives = Vec<Vec<FilterCondition>>;

/// Returns [None] if neither side is a `CASE` expression or if a case cannot be lifted.
fn lift(
    left: &Expression,
    right: &Expression,
    comparison: &Comparison,
) -> Option<FilterCondition> {
    if !matches!(left, Expression::Case(_)) && !matches!(right, Expression::Case(_)) {
        return None;
    }
    let alternatives = alternatives(left, right, comparison)?;
    Some(any_of(alternatives.into_iter().map(all_of)))
}

fn alternatives(
    left: &Expression,
    right: &Expression,
    comparison: &Comparison,
) -> Option<Alternatives> {
    match (left, right) {
        (Expression::Case(branches), _) => {
            expand(branches, |value| alternatives(value, right, comparison))
        }
        (_, Expression::Case(branches)) => {
            expand(branches, |value| alternatives(left, value, comparison))
        }
        _ => Some(vec![vec![comparison.build(left.clone(), right.clone())]]),
    }
}

/// Prefixes the alternatives of every branch value with the conditions under which the branch
/// applies: its own condition and that none of the previous conditions is true.
fn expand(
    branches: &[CaseBranch],
    mut compare: impl FnMut(&Expression) -> Option<Alternatives>,
) -> Option<Alternatives> {
    let mut result = Vec::new();
    let mut not_previous = Vec::new();
    for (i, branch) in branches.iter().enumerate() {
        if i > 0 {
            not_previous.push(negation(is_true(&branches[i - 1].condition)?));
        }
        let enclosing = std::iter::once(branch.condition.clone())
            .chain(not_previous.iter().cloned())
            .collect::<Vec<_>>();
        for inner in compare(&branch.value)? {
            result.push(enclosing.iter().cloned().chain(inner).collect());
        }
    }
    Some(result)
}

/// A condition that holds if `condition` holds and is false otherwise, also where `condition`
/// is unknown.
fn is_true(condition: &FilterCondition) -> Option<FilterCondition> {
    Some(match condition {
        FilterCondition::AlwaysTrue | FilterCondition::AlwaysFalse | FilterCondition::IsNull(_) => {
            condition.clone()
        }
        FilterCondition::Conjunction(conditions) => {
            all_of(conditions.iter().map(is_true).collect::<Option<Vec<_>>>()?)
        }
        FilterCondition::Disjunction(conditions) => {
            any_of(conditions.iter().map(is_true).collect::<Option<Vec<_>>>()?)
        }
        FilterCondition::Negation(inner) => is_false(inner)?,
        atom => all_of(std::iter::once(atom.clone()).chain(not_null_guards(atom)?)),
    })
}

/// A condition that holds if `condition` is false and is false otherwise.
fn is_false(condition: &FilterCondition) -> Option<FilterCondition> {
    Some(match condition {
        FilterCondition::AlwaysTrue | FilterCondition::AlwaysFalse | FilterCondition::IsNull(_) => {
            negation(condition.clone())
        }
        FilterCondition::Conjunction(conditions) => {
            any_of(conditions.iter().map(is_false).collect::<Option<Vec<_>>>()?)
        }
        FilterCondition::Disjunction(conditions) => {
            all_of(conditions.iter().map(is_false).collect::<Option<Vec<_>>>()?)
        }
        FilterCondition::Negation(inner) => is_true(inner)?,
        atom => all_of(std::iter::once(negation(atom.clone())).chain(not_null_guards(atom)?)),
    })
}

/// `NOT v IS NULL` for every variable of an atom that is unknown exactly if one of its variables
/// is `NULL`. [None] for other atoms.
fn not_null_guards(atom: &FilterCondition) -> Option<Vec<FilterCondition>> {
    let strict = match atom {
        FilterCondition::Comparison(_, left, right)
        | FilterCondition::EqualExpressions(left, right) => is_strict(left) && is_strict(right),
        FilterCondition::Like(expression, _) | FilterCondition::LangMatches(expression, _) => {
            is_strict(expression)
        }
        FilterCondition::EqualVariables(_, _) => true,
        _ => false,
    };
    if !strict {
        return None;
    }

    let mut variables = Vec::new();
    atom.collect_variables(&mut variables);
    variables.dedup();
    Some(variables.iter().map(FilterCondition::is_not_null).collect())
}

/// Whether the expression is `NULL` exactly if one of its variables is `NULL`.
fn is_strict(expression: &Expression) -> bool {
    match expression {
        Expression::Constant(_) | Expression::Column(_) => true,
        Expression::Binary(_, left, right) => is_strict(left) && is_strict(right),
        Expression::Cast(inner, _) | Expression::IriSafe(inner) => is_strict(inner),
        Expression::Concatenation(_)
        | Expression::Case(_)
        | Expression::Coalesce(_)
        | Expression::Null => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relsparql_common::{MsSqlDialect, SqlDialect};
    use relsparql_logical::calculus::{CalculusIdGenerator, CalculusVariable};

    fn rewrite(filter: FilterCondition) -> Transformed<CalculusModel> {
        let mut generator = CalculusIdGenerator::new();
        let mut model = CalculusModel::new(generator.next_source_id());
        model.filters.push(filter);
        CaseExpressionToConditionRule::new()
            .rewrite(model, &mut OptimizerContext::new())
            .unwrap()
    }

    fn variables() -> (CalculusVariable, CalculusVariable) {
        let mut generator = CalculusIdGenerator::new();
        (
            generator.column_variable("a", MsSqlDialect.integer_type(), true),
            generator.column_variable("b", MsSqlDialect.integer_type(), true),
        )
    }

    fn category(a: &CalculusVariable, b: &CalculusVariable) -> Expression {
        Expression::Case(vec![
            CaseBranch::new(FilterCondition::is_not_null(a), Expression::integer(0)),
            CaseBranch::new(FilterCondition::is_not_null(b), Expression::integer(5)),
        ])
    }

    #[test]
    fn test_case_is_lifted_out_of_equality() {
        let (a, b) = variables();
        let result = rewrite(FilterCondition::equal(category(&a, &b), Expression::integer(5)));
        assert!(result.transformed);
        insta::assert_snapshot!(
            result.data.filters[0],
            @"(NOT b#1 IS NULL AND NOT NOT a#0 IS NULL)"
        );
    }

    #[test]
    fn test_case_on_both_sides() {
        let (a, b) = variables();
        let result = rewrite(FilterCondition::equal(
            category(&a, &b),
            category(&a, &b),
        ));
        assert!(result.transformed);
        let FilterCondition::Disjunction(alternatives) = &result.data.filters[0] else {
            panic!("Expected a disjunction: {}", result.data);
        };
        assert_eq!(alternatives.len(), 2);
    }

    #[test]
    fn test_case_in_comparison() {
        let (a, b) = variables();
        let result = rewrite(FilterCondition::Comparison(
            ComparisonType::Less,
            Expression::column(&a),
            category(&a, &b),
        ));
        insta::assert_snapshot!(
            result.data.filters[0],
            @"((NOT a#0 IS NULL AND (a#0 < 0)) OR (NOT b#1 IS NULL AND NOT NOT a#0 IS NULL AND (a#0 < 5)))"
        );
    }

    #[test]
    fn test_nested_case_is_flattened() {
        let mut generator = CalculusIdGenerator::new();
        let a = generator.column_variable("a", MsSqlDialect.integer_type(), true);
        let b = generator.column_variable("b", MsSqlDialect.integer_type(), true);
        let c = generator.column_variable("c", MsSqlDialect.integer_type(), true);
        let inner = Expression::Case(vec![
            CaseBranch::new(FilterCondition::IsNull(b.clone()), Expression::integer(1)),
            CaseBranch::new(FilterCondition::IsNull(c.clone()), Expression::integer(2)),
        ]);
        let outer = Expression::Case(vec![
            CaseBranch::new(FilterCondition::IsNull(a.clone()), inner),
            CaseBranch::new(FilterCondition::IsNull(c.clone()), Expression::integer(3)),
        ]);

        let result = rewrite(FilterCondition::Comparison(
            ComparisonType::Greater,
            outer,
            Expression::integer(0),
        ));

        let FilterCondition::Disjunction(alternatives) = &result.data.filters[0] else {
            panic!("Expected a disjunction: {}", result.data);
        };
        for alternative in alternatives {
            let FilterCondition::Conjunction(conditions) = alternative else {
                panic!("Expected a conjunction: {alternative}");
            };
            assert!(conditions.iter().all(|condition| !matches!(
                condition,
                FilterCondition::Conjunction(_) | FilterCondition::Disjunction(_)
            )));
        }
        insta::assert_snapshot!(
            result.data.filters[0],
            @"((a#0 IS NULL AND b#1 IS NULL AND (1 > 0)) OR (a#0 IS NULL AND c#2 IS NULL AND NOT b#1 IS NULL AND (2 > 0)) OR (c#2 IS NULL AND NOT a#0 IS NULL AND (3 > 0)))"
        );
    }

    #[test]
    fn test_unknown_condition_does_not_block_later_branches() {
        let (a, b) = variables();
        let case = Expression::Case(vec![
            CaseBranch::new(
                FilterCondition::Comparison(
                    ComparisonType::Greater,
                    Expression::column(&a),
                    Expression::integer(1),
                ),
                Expression::integer(0),
            ),
            CaseBranch::new(FilterCondition::is_not_null(&b), Expression::integer(5)),
        ]);
        let result = rewrite(FilterCondition::equal(case, Expression::integer(5)));
        insta::assert_snapshot!(
            result.data.filters[0],
            @"(NOT b#1 IS NULL AND NOT ((a#0 > 1) AND NOT a#0 IS NULL))"
        );
    }

    #[test]
    fn test_case_with_nullable_condition_values_is_kept() {
        let (a, b) = variables();
        let case = Expression::Case(vec![
            CaseBranch::new(
                FilterCondition::equal(
                    Expression::Coalesce(vec![Expression::column(&a), Expression::column(&b)]),
                    Expression::integer(1),
                ),
                Expression::integer(0),
            ),
            CaseBranch::new(FilterCondition::is_not_null(&b), Expression::integer(5)),
        ]);
        let result = rewrite(FilterCondition::equal(case, Expression::integer(5)));
        assert!(!result.transformed);
    }

    #[test]
    fn test_negated_condition_is_not_lifted() {
        let (a, b) = variables();
        let result = rewrite(
            FilterCondition::equal(category(&a, &b), Expression::integer(5)).negate(),
        );
        assert!(!result.transformed);
    }
}

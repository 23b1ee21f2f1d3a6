use super::SparqlRewriteRule;
use crate::{Expression, GraphPattern};
use datafusion::common::tree_node::{Transformed, TreeNode};
use relsparql_common::DFResult;
use relsparql_model::Variable;

/// Hoists extensions out of the operands of a left join.
///
/// - `LeftJoin(Extend(L, v, e), R, c)` becomes `Extend(LeftJoin(L, R, c), v, e)` if all variables
///   of `e` are always bound in `L`, `v` does not occur in `R` and `c` does not use `v`.
/// - `LeftJoin(L, Extend(R, v, e), c)` becomes `Extend(LeftJoin(L, R, c), v, e)` if `e` has
///   variables, all of them are always bound in `R` and none occurs in `L`, `e` fails on unbound
///   variables, `v` does not occur in `L` and `c` does not use `v`. Solutions without a match in
///   `R` then leave `v` unbound just like before.
#[derive(Debug, Default)]
pub struct AscendExtendPattern {}

impl AscendExtendPattern {
    pub fn new() -> Self {
        Self::default()
    }

    fn rewrite_node(pattern: GraphPattern) -> Transformed<GraphPattern> {
        match pattern {
            GraphPattern::LeftJoin {
                left,
                right,
                expression,
            } => Self::rewrite_left_join(*left, *right, expression),
            other => Transformed::no(other),
        }
    }

    fn rewrite_left_join(
        left: GraphPattern,
        right: GraphPattern,
        condition: Option<Expression>,
    ) -> Transformed<GraphPattern> {
        match (left, right) {
            (
                GraphPattern::Extend {
                    inner,
                    variable,
                    expression,
                },
                right,
            ) if can_ascend_left(&inner, &variable, &expression, &right, condition.as_ref()) => {
                Transformed::yes(GraphPattern::extend(
                    GraphPattern::left_join(*inner, right, condition),
                    variable,
                    expression,
                ))
            }
            (
                left,
                GraphPattern::Extend {
                    inner,
                    variable,
                    expression,
                },
            ) if can_ascend_right(&left, &inner, &variable, &expression, condition.as_ref()) => {
                Transformed::yes(GraphPattern::extend(
                    GraphPattern::left_join(left, *inner, condition),
                    variable,
                    expression,
                ))
            }
            (left, right) => Transformed::no(GraphPattern::left_join(left, right, condition)),
        }
    }
}

fn can_ascend_left(
    inner: &GraphPattern,
    variable: &Variable,
    expression: &Expression,
    right: &GraphPattern,
    condition: Option<&Expression>,
) -> bool {
    let always_bound = inner.always_bound_variables();
    !right.variables().contains(variable)
        && !uses_variable(condition, variable)
        && expression
            .variables()
            .iter()
            .all(|v| always_bound.contains(v))
}

fn can_ascend_right(
    left: &GraphPattern,
    inner: &GraphPattern,
    variable: &Variable,
    expression: &Expression,
    condition: Option<&Expression>,
) -> bool {
    let left_variables = left.variables();
    let always_bound = inner.always_bound_variables();
    let expression_variables = expression.variables();
    !expression_variables.is_empty()
        && expression_variables
            .iter()
            .all(|v| always_bound.contains(v) && !left_variables.contains(v))
        && !is_error_tolerant(expression)
        && !left_variables.contains(variable)
        && !uses_variable(condition, variable)
}

fn uses_variable(condition: Option<&Expression>, variable: &Variable) -> bool {
    condition.is_some_and(|c| c.variables().contains(variable))
}

/// Checks whether `expression` may produce a value although some of its variables are unbound.
fn is_error_tolerant(expression: &Expression) -> bool {
    match expression {
        Expression::Bound(_)
        | Expression::Coalesce(_)
        | Expression::If(..)
        | Expression::Or(..)
        | Expression::And(..) => true,
        other => other.children().into_iter().any(is_error_tolerant),
    }
}

impl SparqlRewriteRule for AscendExtendPattern {
    fn name(&self) -> &str {
        "ascend-extend-pattern"
    }

    fn rewrite(&self, pattern: GraphPattern) -> DFResult<Transformed<GraphPattern>> {
        pattern.transform_up(|pattern| Ok(Self::rewrite_node(pattern)))
    }
}

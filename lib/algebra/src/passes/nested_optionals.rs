use super::SparqlRewriteRule;
use crate::{Expression, GraphPattern};
use datafusion::common::tree_node::{Transformed, TreeNode};
use relsparql_common::DFResult;
use relsparql_model::Variable;

/// Un-nests optional patterns.
///
/// `LeftJoin(L, LeftJoin(R1, R2, c2), c1)` becomes
/// `LeftJoin(LeftJoin(L, R1, c1), R2, c2 && BOUND(w))` where `w` is a variable that is always
/// bound in `R1` and does not occur in `L`. `BOUND(w)` prevents `R2` from matching solutions that
/// did not match `R1`. The rewrite requires that `R2` and `c2` only meet `L` through variables that
/// are always bound in `R1` and that `c1` only meets `R2` through such variables.
#[derive(Debug, Default)]
pub struct RemoveNestedOptionals {}

impl RemoveNestedOptionals {
    pub fn new() -> Self {
        Self::default()
    }

    fn rewrite_node(pattern: GraphPattern) -> Transformed<GraphPattern> {
        match pattern {
            GraphPattern::LeftJoin {
                left,
                right,
                expression,
            } => match *right {
                GraphPattern::LeftJoin {
                    left: right_left,
                    right: right_right,
                    expression: right_expression,
                } => Self::rewrite_nested(
                    *left,
                    *right_left,
                    *right_right,
                    expression,
                    right_expression,
                ),
                right => Transformed::no(GraphPattern::LeftJoin {
                    left,
                    right: Box::new(right),
                    expression,
                }),
            },
            other => Transformed::no(other),
        }
    }

    fn rewrite_nested(
        left: GraphPattern,
        r1: GraphPattern,
        r2: GraphPattern,
        c1: Option<Expression>,
        c2: Option<Expression>,
    ) -> Transformed<GraphPattern> {
        match find_witness(&left, &r1, &r2, c1.as_ref(), c2.as_ref()) {
            Some(witness) => Transformed::yes(GraphPattern::left_join(
                GraphPattern::left_join(left, r1, c1),
                r2,
                Some(Expression::and_option(c2, Expression::Bound(witness))),
            )),
            None => Transformed::no(GraphPattern::left_join(
                left,
                GraphPattern::left_join(r1, r2, c2),
                c1,
            )),
        }
    }
}

/// Returns a variable always bound in `r1` but not occurring in `left` if the rewrite is valid.
fn find_witness(
    left: &GraphPattern,
    r1: &GraphPattern,
    r2: &GraphPattern,
    c1: Option<&Expression>,
    c2: Option<&Expression>,
) -> Option<Variable> {
    let left_variables = left.variables();
    let r1_always_bound = r1.always_bound_variables();
    let r2_variables = r2.variables();
    let meets_only_through_r1 = |variables: &[Variable], other: &[Variable]| {
        variables
            .iter()
            .filter(|v| other.contains(*v))
            .all(|v| r1_always_bound.contains(v))
    };

    let c1_variables = c1.map(Expression::variables).unwrap_or_default();
    let c2_variables = c2.map(Expression::variables).unwrap_or_default();
    let valid = meets_only_through_r1(&r2_variables, &left_variables)
        && meets_only_through_r1(&c1_variables, &r2_variables)
        && meets_only_through_r1(&c2_variables, &left_variables);
    if !valid {
        return None;
    }

    r1_always_bound
        .iter()
        .find(|v| !left_variables.contains(*v))
        .cloned()
}

impl SparqlRewriteRule for RemoveNestedOptionals {
    fn name(&self) -> &str {
        "remove-nested-optionals"
    }

    fn rewrite(&self, pattern: GraphPattern) -> DFResult<Transformed<GraphPattern>> {
        pattern.transform_up(|pattern| Ok(Self::rewrite_node(pattern)))
    }
}

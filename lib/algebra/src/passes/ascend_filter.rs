use super::SparqlRewriteRule;
use crate::{is_out_of_scope, Expression, GraphPattern};
use datafusion::common::tree_node::{Transformed, TreeNode};
use relsparql_common::DFResult;

/// Hoists filters out of the operands of a left join.
///
/// - `LeftJoin(L, Filter(R, e), c)` becomes `LeftJoin(L, R, c && e)`.
/// - `LeftJoin(Filter(L, e), R, c)` becomes `Filter(LeftJoin(L, R, c), e)`.
///
/// A filter is only hoisted if its expression is not out of scope of the filtered pattern.
#[derive(Debug, Default)]
pub struct AscendFilterPattern {}

impl AscendFilterPattern {
    pub fn new() -> Self {
        Self::default()
    }

    fn rewrite_node(pattern: GraphPattern) -> Transformed<GraphPattern> {
        match pattern {
            GraphPattern::LeftJoin {
                left,
                right,
                expression,
            } => Self::rewrite_left_join(left, right, expression),
            other => Transformed::no(other),
        }
    }

    fn rewrite_left_join(
        left: Box<GraphPattern>,
        right: Box<GraphPattern>,
        expression: Option<Expression>,
    ) -> Transformed<GraphPattern> {
        match (*left, *right) {
            (left, GraphPattern::Filter { inner, expression: filter })
                if !is_out_of_scope(&filter, &inner) =>
            {
                Transformed::yes(GraphPattern::left_join(
                    left,
                    *inner,
                    Some(Expression::and_option(expression, filter)),
                ))
            }
            (GraphPattern::Filter { inner, expression: filter }, right)
                if !is_out_of_scope(&filter, &inner) =>
            {
                Transformed::yes(GraphPattern::filter(
                    GraphPattern::left_join(*inner, right, expression),
                    filter,
                ))
            }
            (left, right) => Transformed::no(GraphPattern::left_join(left, right, expression)),
        }
    }
}

impl SparqlRewriteRule for AscendFilterPattern {
    fn name(&self) -> &str {
        "ascend-filter-pattern"
    }

    fn rewrite(&self, pattern: GraphPattern) -> DFResult<Transformed<GraphPattern>> {
        pattern.transform_up(|pattern| Ok(Self::rewrite_node(pattern)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::passes::test_utils::*;

    fn rewrite(pattern: GraphPattern) -> Transformed<GraphPattern> {
        AscendFilterPattern::new().rewrite(pattern).unwrap()
    }

    #[test]
    fn test_right_filter_moves_into_condition() {
        let result = rewrite(GraphPattern::left_join(
            triple("s", "a"),
            GraphPattern::filter(triple("s", "b"), bound("b")),
            Some(bound("a")),
        ));
        assert!(result.transformed);
        insta::assert_snapshot!(result.data, @"LeftJoin(Triple(?s <http://ex.org/p> ?a), Triple(?s <http://ex.org/p> ?b), (BOUND(?a) && BOUND(?b)))");
    }

    #[test]
    fn test_left_filter_moves_above_left_join() {
        let result = rewrite(GraphPattern::left_join(
            GraphPattern::filter(triple("s", "a"), bound("a")),
            triple("s", "b"),
            None,
        ));
        insta::assert_snapshot!(result.data, @"Filter(LeftJoin(Triple(?s <http://ex.org/p> ?a), Triple(?s <http://ex.org/p> ?b)), BOUND(?a))");
    }

    #[test]
    fn test_out_of_scope_filter_stays() {
        let pattern = GraphPattern::left_join(
            triple("s", "a"),
            GraphPattern::filter(triple("s", "b"), bound("a")),
            None,
        );
        let result = rewrite(pattern.clone());
        assert!(!result.transformed);
        assert_eq!(result.data, pattern);
    }
}

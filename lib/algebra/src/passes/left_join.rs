use super::SparqlRewriteRule;
use crate::{Expression, GraphPattern};
use datafusion::common::tree_node::{Transformed, TreeNode};
use relsparql_common::DFResult;

/// Simplifies left joins whose optional side can never contribute bindings.
///
/// `LeftJoin(L, NotMatching, c)`, `LeftJoin(L, Empty, c)` and `LeftJoin(L, R, false)` are all
/// equivalent to `L`. A constant `true` condition is dropped.
#[derive(Debug, Default)]
pub struct SimplifyLeftJoin {}

impl SimplifyLeftJoin {
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
        if matches!(*right, GraphPattern::NotMatching | GraphPattern::Empty) {
            return Transformed::yes(*left);
        }

        match expression.as_ref().and_then(Expression::as_constant_boolean) {
            Some(false) => Transformed::yes(*left),
            Some(true) => Transformed::yes(GraphPattern::LeftJoin {
                left,
                right,
                expression: None,
            }),
            None => Transformed::no(GraphPattern::LeftJoin {
                left,
                right,
                expression,
            }),
        }
    }
}

impl SparqlRewriteRule for SimplifyLeftJoin {
    fn name(&self) -> &str {
        "simplify-left-join"
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
        SimplifyLeftJoin::new().rewrite(pattern).unwrap()
    }

    #[test]
    fn test_not_matching_or_empty_right() {
        for right in [GraphPattern::NotMatching, GraphPattern::Empty] {
            let result = rewrite(GraphPattern::left_join(
                triple("s", "a"),
                right,
                Some(bound("a")),
            ));
            assert!(result.transformed);
            assert_eq!(result.data, triple("s", "a"));
        }
    }

    #[test]
    fn test_false_condition() {
        let result = rewrite(GraphPattern::left_join(
            triple("s", "a"),
            triple("s", "b"),
            Some(boolean(false)),
        ));
        assert_eq!(result.data, triple("s", "a"));
    }

    #[test]
    fn test_true_condition_is_dropped() {
        let result = rewrite(GraphPattern::left_join(
            triple("s", "a"),
            triple("s", "b"),
            Some(boolean(true)),
        ));
        insta::assert_snapshot!(result.data, @"LeftJoin(Triple(?s <http://ex.org/p> ?a), Triple(?s <http://ex.org/p> ?b))");
    }

    #[test]
    fn test_regular_left_join_is_kept() {
        let pattern =
            GraphPattern::left_join(triple("s", "a"), triple("s", "b"), Some(bound("a")));
        let result = rewrite(pattern.clone());
        assert!(!result.transformed);
        assert_eq!(result.data, pattern);
    }
}

use super::SparqlRewriteRule;
use crate::GraphPattern;
use datafusion::common::tree_node::{Transformed, TreeNode};
use relsparql_common::DFResult;

/// Propagates [GraphPattern::Empty] and [GraphPattern::NotMatching] through their parents.
///
/// A join with a non-matching operand does not match, a join with an empty operand is the
/// other operand, non-matching union branches are removed and nested unions are flattened.
/// Filters and extensions of non-matching patterns do not match either. Filters with constant
/// conditions are resolved.
#[derive(Debug, Default)]
pub struct PropagateEmptyPatterns {}

impl PropagateEmptyPatterns {
    pub fn new() -> Self {
        Self::default()
    }

    fn rewrite_node(pattern: GraphPattern) -> Transformed<GraphPattern> {
        match pattern {
            GraphPattern::Join { left, right } => match (*left, *right) {
                (GraphPattern::NotMatching, _) | (_, GraphPattern::NotMatching) => {
                    Transformed::yes(GraphPattern::NotMatching)
                }
                (GraphPattern::Empty, other) | (other, GraphPattern::Empty) => {
                    Transformed::yes(other)
                }
                (left, right) => Transformed::no(GraphPattern::join(left, right)),
            },
            GraphPattern::Union(branches) => {
                let needs_rewrite = branches.len() < 2
                    || branches.iter().any(|branch| {
                        matches!(branch, GraphPattern::NotMatching | GraphPattern::Union(_))
                    });
                if !needs_rewrite {
                    return Transformed::no(GraphPattern::Union(branches));
                }

                let mut flat = Vec::with_capacity(branches.len());
                for branch in branches {
                    match branch {
                        GraphPattern::NotMatching => {}
                        GraphPattern::Union(inner) => flat.extend(inner),
                        other => flat.push(other),
                    }
                }
                Transformed::yes(GraphPattern::union(flat))
            }
            GraphPattern::Filter { inner, expression } => {
                if *inner == GraphPattern::NotMatching {
                    return Transformed::yes(GraphPattern::NotMatching);
                }
                match expression.as_constant_boolean() {
                    Some(true) => Transformed::yes(*inner),
                    Some(false) => Transformed::yes(GraphPattern::NotMatching),
                    None => Transformed::no(GraphPattern::Filter { inner, expression }),
                }
            }
            GraphPattern::Extend { inner, .. } | GraphPattern::LeftJoin { left: inner, .. }
                if *inner == GraphPattern::NotMatching =>
            {
                Transformed::yes(GraphPattern::NotMatching)
            }
            other => Transformed::no(other),
        }
    }
}

impl SparqlRewriteRule for PropagateEmptyPatterns {
    fn name(&self) -> &str {
        "propagate-empty-patterns"
    }

    fn rewrite(&self, pattern: GraphPattern) -> DFResult<Transformed<GraphPattern>> {
        pattern.transform_up(|pattern| Ok(Self::rewrite_node(pattern)))
    }
}

//! Rewrites that bring a [GraphPattern] into the safe form expected by the relational builder.
//!
//! Each pass is a [SparqlRewriteRule]. [SafeAlgebraPasses] applies a list of rules until none of
//! them changes the pattern anymore.

mod ascend_extend;
mod ascend_filter;
mod empty_propagation;
mod left_join;
mod nested_optionals;

pub use ascend_extend::AscendExtendPattern;
pub use ascend_filter::AscendFilterPattern;
pub use empty_propagation::PropagateEmptyPatterns;
pub use left_join::SimplifyLeftJoin;
pub use nested_optionals::RemoveNestedOptionals;

use crate::GraphPattern;
use datafusion::common::tree_node::Transformed;
use relsparql_common::DFResult;
use std::fmt::Debug;
use std::sync::Arc;

/// A rewrite of the SPARQL algebra.
pub trait SparqlRewriteRule: Debug + Send + Sync {
    /// A unique name of the rule, used for logging.
    fn name(&self) -> &str;

    /// Rewrites `pattern`. Returns [Transformed::no] if nothing changed.
    fn rewrite(&self, pattern: GraphPattern) -> DFResult<Transformed<GraphPattern>>;
}

/// A shared [SparqlRewriteRule].
pub type SparqlRewriteRuleRef = Arc<dyn SparqlRewriteRule>;

/// Creates the list of passes that make a pattern safe for the relational builder.
pub fn create_safe_algebra_rules() -> Vec<SparqlRewriteRuleRef> {
    vec![
        Arc::new(PropagateEmptyPatterns::new()),
        Arc::new(SimplifyLeftJoin::new()),
        Arc::new(AscendFilterPattern::new()),
        Arc::new(AscendExtendPattern::new()),
        Arc::new(RemoveNestedOptionals::new()),
    ]
}

/// Applies a list of [SparqlRewriteRule]s until a fixpoint is reached.
#[derive(Debug, Clone)]
pub struct SafeAlgebraPasses {
    rules: Vec<SparqlRewriteRuleRef>,
    max_iterations: usize,
}

impl Default for SafeAlgebraPasses {
    fn default() -> Self {
        Self::new(create_safe_algebra_rules())
    }
}

impl SafeAlgebraPasses {
    const DEFAULT_MAX_ITERATIONS: usize = 16;

    pub fn new(rules: Vec<SparqlRewriteRuleRef>) -> Self {
        Self {
            rules,
            max_iterations: Self::DEFAULT_MAX_ITERATIONS,
        }
    }

    #[must_use]
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Applies all rules in order, repeating the whole list while any rule changes the pattern.
    pub fn apply(&self, mut pattern: GraphPattern) -> DFResult<Transformed<GraphPattern>> {
        let mut any_change = false;
        for iteration in 0..self.max_iterations {
            let mut changed = false;
            for rule in &self.rules {
                let result = rule.rewrite(pattern)?;
                if result.transformed {
                    tracing::debug!("Pass {} changed the pattern", rule.name());
                    changed = true;
                }
                pattern = result.data;
            }

            if !changed {
                tracing::trace!("Safe algebra passes converged after {iteration} iterations");
                break;
            }
            any_change = true;
        }

        Ok(Transformed::new_transformed(pattern, any_change))
    }
}


#[cfg(test)]
mod tests {
    use super::test_utils::*;
    use super::*;

    #[test]
    fn test_passes_reach_fixpoint() {
        let pattern = GraphPattern::left_join(
            triple("s", "a"),
            GraphPattern::filter(
                GraphPattern::join(GraphPattern::NotMatching, triple("s", "b")),
                bound("b"),
            ),
            None,
        );
        let result = SafeAlgebraPasses::default().apply(pattern).unwrap();
        assert!(result.transformed);
        insta::assert_snapshot!(result.data, @"Triple(?s <http://ex.org/p> ?a)");
    }

    #[test]
    fn test_passes_without_change() {
        let pattern = GraphPattern::join(triple("s", "a"), triple("s", "b"));
        let result = SafeAlgebraPasses::default().apply(pattern.clone()).unwrap();
        assert!(!result.transformed);
        assert_eq!(result.data, pattern);
    }
}

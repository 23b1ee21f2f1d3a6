use crate::expression::Expression;
use crate::pattern::{GraphPattern, TriplePattern};
use itertools::Itertools;
use relsparql_model::Variable;

impl TriplePattern {
    /// The variables of the pattern in the order subject, predicate, object, graph.
    pub fn variables(&self) -> impl Iterator<Item = &Variable> {
        [
            Some(&self.subject),
            Some(&self.predicate),
            Some(&self.object),
            self.graph.as_ref(),
        ]
        .into_iter()
        .flatten()
        .filter_map(|term| term.as_variable())
    }
}

impl GraphPattern {
    /// The variables that may be bound by a solution, in order of appearance.
    pub fn variables(&self) -> Vec<Variable> {
        let mut result = Vec::new();
        self.collect_variables(&mut result);
        result.into_iter().unique().collect()
    }

    fn collect_variables(&self, result: &mut Vec<Variable>) {
        match self {
            GraphPattern::Triple(pattern) => result.extend(pattern.variables().cloned()),
            GraphPattern::RestrictedTriple(pattern) => {
                result.extend(pattern.pattern.variables().cloned());
            }
            GraphPattern::Join { left, right } | GraphPattern::LeftJoin { left, right, .. } => {
                left.collect_variables(result);
                right.collect_variables(result);
            }
            GraphPattern::Union(branches) => {
                for branch in branches {
                    branch.collect_variables(result);
                }
            }
            GraphPattern::Filter { inner, .. } => inner.collect_variables(result),
            GraphPattern::Extend {
                inner, variable, ..
            } => {
                inner.collect_variables(result);
                result.push(variable.clone());
            }
            GraphPattern::Empty | GraphPattern::NotMatching => {}
        }
    }

    /// The variables that are bound in every solution.
    pub fn always_bound_variables(&self) -> Vec<Variable> {
        match self {
            GraphPattern::Triple(pattern) => pattern.variables().cloned().unique().collect(),
            GraphPattern::RestrictedTriple(pattern) => {
                pattern.pattern.variables().cloned().unique().collect()
            }
            GraphPattern::Join { left, right } => left
                .always_bound_variables()
                .into_iter()
                .chain(right.always_bound_variables())
                .unique()
                .collect(),
            GraphPattern::LeftJoin { left, .. } => left.always_bound_variables(),
            GraphPattern::Union(branches) => {
                let mut branches = branches.iter().map(GraphPattern::always_bound_variables);
                let Some(first) = branches.next() else {
                    return Vec::new();
                };
                branches.fold(first, |acc, branch| {
                    acc.into_iter().filter(|v| branch.contains(v)).collect()
                })
            }
            GraphPattern::Filter { inner, .. } | GraphPattern::Extend { inner, .. } => {
                inner.always_bound_variables()
            }
            GraphPattern::Empty | GraphPattern::NotMatching => Vec::new(),
        }
    }
}

impl Expression {
    /// The variables used by the expression, including the ones of `BOUND`.
    pub fn variables(&self) -> Vec<Variable> {
        let mut result = Vec::new();
        self.collect_variables(&mut result);
        result.into_iter().unique().collect()
    }

    fn collect_variables(&self, result: &mut Vec<Variable>) {
        match self {
            Expression::Variable(variable) | Expression::Bound(variable) => {
                result.push(variable.clone());
            }
            other => {
                for child in other.children() {
                    child.collect_variables(result);
                }
            }
        }
    }

    /// The direct sub-expressions.
    pub fn children(&self) -> Vec<&Expression> {
        match self {
            Expression::Variable(_)
            | Expression::NamedNode(_)
            | Expression::Literal(_)
            | Expression::Bound(_) => Vec::new(),
            Expression::Or(left, right)
            | Expression::And(left, right)
            | Expression::Compare(_, left, right)
            | Expression::SameTerm(left, right)
            | Expression::Arithmetic(_, left, right) => vec![left.as_ref(), right.as_ref()],
            Expression::Not(inner) | Expression::UnaryPlus(inner) | Expression::UnaryMinus(inner) => {
                vec![inner.as_ref()]
            }
            Expression::If(test, then, otherwise) => vec![test.as_ref(), then.as_ref(), otherwise.as_ref()],
            Expression::Coalesce(args) | Expression::FunctionCall(_, args) => args.iter().collect(),
            Expression::In(needle, haystack) => {
                std::iter::once(needle.as_ref()).chain(haystack).collect()
            }
        }
    }
}

/// Checks whether `expression` would see different variable bindings if it were evaluated
/// outside of `pattern`, i.e. not all of its variables are always bound by `pattern`.
pub fn is_out_of_scope(expression: &Expression, pattern: &GraphPattern) -> bool {
    let always_bound = pattern.always_bound_variables();
    expression
        .variables()
        .iter()
        .any(|v| !always_bound.contains(v))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::PatternTerm;
    use relsparql_model::NamedNode;

    fn triple(s: &str, o: &str) -> GraphPattern {
        GraphPattern::Triple(TriplePattern {
            subject: PatternTerm::Variable(Variable::new_unchecked(s)),
            predicate: PatternTerm::Term(NamedNode::new_unchecked("http://ex.org/p").into()),
            object: PatternTerm::Variable(Variable::new_unchecked(o)),
            graph: None,
        })
    }

    fn names(variables: &[Variable]) -> Vec<&str> {
        variables.iter().map(Variable::as_str).collect()
    }

    #[test]
    fn test_union_always_bound_is_intersection() {
        let pattern = GraphPattern::Union(vec![triple("s", "a"), triple("s", "b")]);
        assert_eq!(names(&pattern.variables()), vec!["s", "a", "b"]);
        assert_eq!(names(&pattern.always_bound_variables()), vec!["s"]);
    }

    #[test]
    fn test_left_join_always_bound_is_left() {
        let pattern = GraphPattern::left_join(triple("s", "a"), triple("s", "b"), None);
        assert_eq!(names(&pattern.always_bound_variables()), vec!["s", "a"]);
    }

    #[test]
    fn test_extend_variable_is_not_always_bound() {
        let pattern = GraphPattern::extend(
            triple("s", "a"),
            Variable::new_unchecked("x"),
            Expression::Variable(Variable::new_unchecked("a")),
        );
        assert_eq!(names(&pattern.variables()), vec!["s", "a", "x"]);
        assert_eq!(names(&pattern.always_bound_variables()), vec!["s", "a"]);
    }

    #[test]
    fn test_is_out_of_scope() {
        let pattern = GraphPattern::left_join(triple("s", "a"), triple("s", "b"), None);
        let in_scope = Expression::Bound(Variable::new_unchecked("a"));
        let out_of_scope = Expression::Bound(Variable::new_unchecked("b"));
        assert!(!is_out_of_scope(&in_scope, &pattern));
        assert!(is_out_of_scope(&out_of_scope, &pattern));
    }
}

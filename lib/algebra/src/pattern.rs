use crate::expression::Expression;
use relsparql_mapping::{RefObjectMap, TermMap, TriplesMap};
use relsparql_model::{Term, Variable};
use std::fmt::{Display, Formatter};
use std::sync::Arc;

/// A position of a triple pattern: either a bound term or a variable.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PatternTerm {
    Variable(Variable),
    Term(Term),
}

impl PatternTerm {
    pub fn as_variable(&self) -> Option<&Variable> {
        match self {
            PatternTerm::Variable(variable) => Some(variable),
            PatternTerm::Term(_) => None,
        }
    }

    pub fn as_term(&self) -> Option<&Term> {
        match self {
            PatternTerm::Variable(_) => None,
            PatternTerm::Term(term) => Some(term),
        }
    }
}

impl Display for PatternTerm {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            PatternTerm::Variable(variable) => write!(f, "{variable}"),
            PatternTerm::Term(term) => write!(f, "{term}"),
        }
    }
}

/// A triple pattern, optionally restricted to a graph.
///
/// A pattern without graph matches the default graph, which is the union of all graphs
/// produced by the mapping.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TriplePattern {
    pub subject: PatternTerm,
    pub predicate: PatternTerm,
    pub object: PatternTerm,
    pub graph: Option<PatternTerm>,
}

impl Display for TriplePattern {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} {}", self.subject, self.predicate, self.object)?;
        if let Some(graph) = &self.graph {
            write!(f, " GRAPH {graph}")?;
        }
        Ok(())
    }
}

/// The object side of a [RestrictedTriplePattern].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ObjectTarget {
    /// An object map, or the constant class of an `rr:class` assertion.
    Map(TermMap),
    /// The subjects of a parent triples map.
    Ref(RefObjectMap),
}

/// A triple pattern that is only matched against one mapping rule.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RestrictedTriplePattern {
    pub pattern: TriplePattern,
    pub triples_map: Arc<TriplesMap>,
    pub predicate_map: TermMap,
    pub object: ObjectTarget,
    pub graph_map: Option<TermMap>,
}

/// The SPARQL algebra understood by the relational builder.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum GraphPattern {
    Triple(TriplePattern),
    RestrictedTriple(Box<RestrictedTriplePattern>),
    Join {
        left: Box<GraphPattern>,
        right: Box<GraphPattern>,
    },
    Union(Vec<GraphPattern>),
    LeftJoin {
        left: Box<GraphPattern>,
        right: Box<GraphPattern>,
        expression: Option<Expression>,
    },
    Filter {
        inner: Box<GraphPattern>,
        expression: Expression,
    },
    Extend {
        inner: Box<GraphPattern>,
        variable: Variable,
        expression: Expression,
    },
    /// A single solution without bindings.
    Empty,
    /// No solution at all.
    NotMatching,
}

impl GraphPattern {
    pub fn join(left: GraphPattern, right: GraphPattern) -> Self {
        GraphPattern::Join {
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn left_join(
        left: GraphPattern,
        right: GraphPattern,
        expression: Option<Expression>,
    ) -> Self {
        GraphPattern::LeftJoin {
            left: Box::new(left),
            right: Box::new(right),
            expression,
        }
    }

    pub fn filter(inner: GraphPattern, expression: Expression) -> Self {
        GraphPattern::Filter {
            inner: Box::new(inner),
            expression,
        }
    }

    pub fn extend(inner: GraphPattern, variable: Variable, expression: Expression) -> Self {
        GraphPattern::Extend {
            inner: Box::new(inner),
            variable,
            expression,
        }
    }

    /// A union of `branches`. A single branch is returned as is and no branch yields
    /// [GraphPattern::NotMatching].
    pub fn union(mut branches: Vec<GraphPattern>) -> Self {
        match branches.len() {
            0 => GraphPattern::NotMatching,
            1 => branches.remove(0),
            _ => GraphPattern::Union(branches),
        }
    }
}

impl Display for GraphPattern {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            GraphPattern::Triple(pattern) => write!(f, "Triple({pattern})"),
            GraphPattern::RestrictedTriple(pattern) => {
                write!(f, "Restricted({} @ {})", pattern.pattern, pattern.triples_map.id)
            }
            GraphPattern::Join { left, right } => write!(f, "Join({left}, {right})"),
            GraphPattern::Union(branches) => {
                write!(f, "Union(")?;
                for (i, branch) in branches.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{branch}")?;
                }
                write!(f, ")")
            }
            GraphPattern::LeftJoin {
                left,
                right,
                expression,
            } => match expression {
                Some(expression) => write!(f, "LeftJoin({left}, {right}, {expression})"),
                None => write!(f, "LeftJoin({left}, {right})"),
            },
            GraphPattern::Filter { inner, expression } => {
                write!(f, "Filter({inner}, {expression})")
            }
            GraphPattern::Extend {
                inner,
                variable,
                expression,
            } => write!(f, "Extend({inner}, {variable} := {expression})"),
            GraphPattern::Empty => write!(f, "Empty"),
            GraphPattern::NotMatching => write!(f, "NotMatching"),
        }
    }
}

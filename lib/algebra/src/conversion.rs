use crate::expression::{
    ArithmeticOperator, ComparisonOperator, Expression, Function, OrderExpression,
};
use crate::pattern::{GraphPattern, PatternTerm, TriplePattern};
use crate::query::{QueryForm, QueryModifiers, SparqlQuery};
use datafusion::common::{not_impl_err, plan_err};
use relsparql_common::DFResult;
use relsparql_model::Variable;
use spargebra::algebra as sparql;
use spargebra::term::{NamedNodePattern, TermPattern};

const BLANK_NODE_VARIABLE_PREFIX: &str = "__bnode_";

/// Checks whether `variable` stands for a blank node of the query.
pub(crate) fn is_blank_node_variable(variable: &Variable) -> bool {
    variable.as_str().starts_with(BLANK_NODE_VARIABLE_PREFIX)
}

/// Converts a parsed query into the algebra of this crate.
///
/// Only `SELECT` and `ASK` queries over the supported subset of SPARQL are accepted.
pub fn convert_query(query: &spargebra::Query) -> DFResult<SparqlQuery> {
    let (form, pattern, dataset, base_iri) = match query {
        spargebra::Query::Select {
            dataset,
            pattern,
            base_iri,
        } => (QueryForm::Select, pattern, dataset, base_iri),
        spargebra::Query::Ask {
            dataset,
            pattern,
            base_iri,
        } => (QueryForm::Ask, pattern, dataset, base_iri),
        spargebra::Query::Construct { .. } => return not_impl_err!("CONSTRUCT queries"),
        spargebra::Query::Describe { .. } => return not_impl_err!("DESCRIBE queries"),
    };
    if dataset.is_some() {
        return not_impl_err!("FROM and FROM NAMED clauses");
    }

    let mut modifiers = QueryModifiers::default();
    let inner = peel_modifiers(pattern, &mut modifiers)?;
    if form == QueryForm::Ask {
        modifiers.limit = Some(1);
    }

    Ok(SparqlQuery {
        form,
        pattern: convert_pattern(inner, None)?,
        modifiers,
        base_iri: base_iri.as_ref().map(|iri| iri.as_str().to_owned()),
    })
}

/// Strips the solution modifiers at the top of the pattern.
fn peel_modifiers<'p>(
    pattern: &'p sparql::GraphPattern,
    modifiers: &mut QueryModifiers,
) -> DFResult<&'p sparql::GraphPattern> {
    let mut current = pattern;
    loop {
        current = match current {
            sparql::GraphPattern::Slice {
                inner,
                start,
                length,
            } => {
                modifiers.offset = *start;
                modifiers.limit = *length;
                inner
            }
            sparql::GraphPattern::Distinct { inner } => {
                modifiers.distinct = true;
                inner
            }
            sparql::GraphPattern::Reduced { inner } => inner,
            sparql::GraphPattern::Project { inner, variables } => {
                modifiers.projection = Some(variables.clone());
                inner
            }
            sparql::GraphPattern::OrderBy { inner, expression } => {
                modifiers.order_by = expression
                    .iter()
                    .map(|e| {
                        Ok(match e {
                            sparql::OrderExpression::Asc(e) => {
                                OrderExpression::Asc(convert_expression(e)?)
                            }
                            sparql::OrderExpression::Desc(e) => {
                                OrderExpression::Desc(convert_expression(e)?)
                            }
                        })
                    })
                    .collect::<DFResult<Vec<_>>>()?;
                inner
            }
            other => return Ok(other),
        }
    }
}

fn convert_pattern(
    pattern: &sparql::GraphPattern,
    graph: Option<&PatternTerm>,
) -> DFResult<GraphPattern> {
    Ok(match pattern {
        sparql::GraphPattern::Bgp { patterns } => patterns
            .iter()
            .map(|triple| {
                Ok(GraphPattern::Triple(TriplePattern {
                    subject: convert_term_pattern(&triple.subject)?,
                    predicate: convert_named_node_pattern(&triple.predicate),
                    object: convert_term_pattern(&triple.object)?,
                    graph: graph.cloned(),
                }))
            })
            .collect::<DFResult<Vec<_>>>()?
            .into_iter()
            .reduce(GraphPattern::join)
            .unwrap_or(GraphPattern::Empty),
        sparql::GraphPattern::Path {
            subject,
            path,
            object,
        } => match path {
            spargebra::algebra::PropertyPathExpression::NamedNode(predicate) => {
                GraphPattern::Triple(TriplePattern {
                    subject: convert_term_pattern(subject)?,
                    predicate: PatternTerm::Term(predicate.clone().into()),
                    object: convert_term_pattern(object)?,
                    graph: graph.cloned(),
                })
            }
            _ => return not_impl_err!("Property path {path}"),
        },
        sparql::GraphPattern::Join { left, right } => {
            GraphPattern::join(convert_pattern(left, graph)?, convert_pattern(right, graph)?)
        }
        sparql::GraphPattern::LeftJoin {
            left,
            right,
            expression,
        } => GraphPattern::left_join(
            convert_pattern(left, graph)?,
            convert_pattern(right, graph)?,
            expression.as_ref().map(convert_expression).transpose()?,
        ),
        sparql::GraphPattern::Filter { expr, inner } => {
            GraphPattern::filter(convert_pattern(inner, graph)?, convert_expression(expr)?)
        }
        sparql::GraphPattern::Union { left, right } => {
            let mut branches = Vec::new();
            for side in [left, right] {
                match convert_pattern(side, graph)? {
                    GraphPattern::Union(nested) => branches.extend(nested),
                    other => branches.push(other),
                }
            }
            GraphPattern::Union(branches)
        }
        sparql::GraphPattern::Graph { name, inner } => {
            let name = convert_named_node_pattern(name);
            convert_pattern(inner, Some(&name))?
        }
        sparql::GraphPattern::Extend {
            inner,
            variable,
            expression,
        } => GraphPattern::extend(
            convert_pattern(inner, graph)?,
            variable.clone(),
            convert_expression(expression)?,
        ),
        sparql::GraphPattern::Project { .. }
        | sparql::GraphPattern::Distinct { .. }
        | sparql::GraphPattern::Reduced { .. }
        | sparql::GraphPattern::Slice { .. }
        | sparql::GraphPattern::OrderBy { .. } => return not_impl_err!("Sub-queries"),
        sparql::GraphPattern::Minus { .. } => return not_impl_err!("MINUS"),
        sparql::GraphPattern::Values { .. } => return not_impl_err!("VALUES"),
        sparql::GraphPattern::Group { .. } => return not_impl_err!("Aggregates"),
        sparql::GraphPattern::Service { .. } => return not_impl_err!("SERVICE"),
        #[allow(unreachable_patterns, reason = "Depends on the enabled spargebra features")]
        _ => return not_impl_err!("Graph pattern {pattern}"),
    })
}

fn convert_term_pattern(term: &TermPattern) -> DFResult<PatternTerm> {
    Ok(match term {
        TermPattern::NamedNode(node) => PatternTerm::Term(node.clone().into()),
        TermPattern::Literal(literal) => PatternTerm::Term(literal.clone().into()),
        TermPattern::Variable(variable) => PatternTerm::Variable(variable.clone()),
        TermPattern::BlankNode(node) => PatternTerm::Variable(Variable::new_unchecked(format!(
            "{BLANK_NODE_VARIABLE_PREFIX}{}",
            node.as_str()
        ))),
        #[allow(unreachable_patterns, reason = "Depends on the enabled spargebra features")]
        _ => return not_impl_err!("Term pattern {term}"),
    })
}

fn convert_named_node_pattern(pattern: &NamedNodePattern) -> PatternTerm {
    match pattern {
        NamedNodePattern::NamedNode(node) => PatternTerm::Term(node.clone().into()),
        NamedNodePattern::Variable(variable) => PatternTerm::Variable(variable.clone()),
    }
}

fn convert_expression(expression: &sparql::Expression) -> DFResult<Expression> {
    Ok(match expression {
        sparql::Expression::NamedNode(node) => Expression::NamedNode(node.clone()),
        sparql::Expression::Literal(literal) => Expression::Literal(literal.clone()),
        sparql::Expression::Variable(variable) => Expression::Variable(variable.clone()),
        sparql::Expression::Or(left, right) => {
            let (left, right) = convert_pair(left, right)?;
            Expression::Or(left, right)
        }
        sparql::Expression::And(left, right) => {
            let (left, right) = convert_pair(left, right)?;
            Expression::And(left, right)
        }
        sparql::Expression::Not(inner) => Expression::Not(Box::new(convert_expression(inner)?)),
        sparql::Expression::Equal(left, right) => {
            compare(ComparisonOperator::Equal, left, right)?
        }
        sparql::Expression::Less(left, right) => compare(ComparisonOperator::Less, left, right)?,
        sparql::Expression::LessOrEqual(left, right) => {
            compare(ComparisonOperator::LessOrEqual, left, right)?
        }
        sparql::Expression::Greater(left, right) => {
            compare(ComparisonOperator::Greater, left, right)?
        }
        sparql::Expression::GreaterOrEqual(left, right) => {
            compare(ComparisonOperator::GreaterOrEqual, left, right)?
        }
        sparql::Expression::SameTerm(left, right) => {
            let (left, right) = convert_pair(left, right)?;
            Expression::SameTerm(left, right)
        }
        sparql::Expression::Add(left, right) => {
            arithmetic(ArithmeticOperator::Add, left, right)?
        }
        sparql::Expression::Subtract(left, right) => {
            arithmetic(ArithmeticOperator::Subtract, left, right)?
        }
        sparql::Expression::Multiply(left, right) => {
            arithmetic(ArithmeticOperator::Multiply, left, right)?
        }
        sparql::Expression::Divide(left, right) => {
            arithmetic(ArithmeticOperator::Divide, left, right)?
        }
        sparql::Expression::UnaryPlus(inner) => {
            Expression::UnaryPlus(Box::new(convert_expression(inner)?))
        }
        sparql::Expression::UnaryMinus(inner) => {
            Expression::UnaryMinus(Box::new(convert_expression(inner)?))
        }
        sparql::Expression::Bound(variable) => Expression::Bound(variable.clone()),
        sparql::Expression::If(test, then, otherwise) => Expression::If(
            Box::new(convert_expression(test)?),
            Box::new(convert_expression(then)?),
            Box::new(convert_expression(otherwise)?),
        ),
        sparql::Expression::Coalesce(args) => Expression::Coalesce(convert_expressions(args)?),
        sparql::Expression::In(needle, haystack) => Expression::In(
            Box::new(convert_expression(needle)?),
            convert_expressions(haystack)?,
        ),
        sparql::Expression::FunctionCall(function, args) => {
            let function = match function {
                sparql::Function::Str => Function::Str,
                sparql::Function::Lang => Function::Lang,
                sparql::Function::Datatype => Function::Datatype,
                sparql::Function::LangMatches => Function::LangMatches,
                sparql::Function::IsIri => Function::IsIri,
                sparql::Function::IsBlank => Function::IsBlank,
                sparql::Function::IsLiteral => Function::IsLiteral,
                sparql::Function::IsNumeric => Function::IsNumeric,
                sparql::Function::Regex => Function::Regex,
                other => return not_impl_err!("Function {other}"),
            };
            let args = convert_expressions(args)?;
            let arity_ok = match function {
                Function::LangMatches => args.len() == 2,
                Function::Regex => matches!(args.len(), 2 | 3),
                _ => args.len() == 1,
            };
            if !arity_ok {
                return plan_err!("Wrong number of arguments for {function}.");
            }
            Expression::FunctionCall(function, args)
        }
        sparql::Expression::Exists(_) => return not_impl_err!("EXISTS"),
    })
}

fn convert_pair(
    left: &sparql::Expression,
    right: &sparql::Expression,
) -> DFResult<(Box<Expression>, Box<Expression>)> {
    Ok((
        Box::new(convert_expression(left)?),
        Box::new(convert_expression(right)?),
    ))
}

fn compare(
    operator: ComparisonOperator,
    left: &sparql::Expression,
    right: &sparql::Expression,
) -> DFResult<Expression> {
    let (left, right) = convert_pair(left, right)?;
    Ok(Expression::Compare(operator, left, right))
}

fn arithmetic(
    operator: ArithmeticOperator,
    left: &sparql::Expression,
    right: &sparql::Expression,
) -> DFResult<Expression> {
    let (left, right) = convert_pair(left, right)?;
    Ok(Expression::Arithmetic(operator, left, right))
}

fn convert_expressions(expressions: &[sparql::Expression]) -> DFResult<Vec<Expression>> {
    expressions.iter().map(convert_expression).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn convert(query: &str) -> DFResult<SparqlQuery> {
        let query = spargebra::Query::parse(query, None).unwrap();
        convert_query(&query)
    }

    #[test]
    fn test_convert_select() {
        let query = convert(
            "PREFIX foaf: <http://xmlns.com/foaf/0.1/>
             SELECT DISTINCT ?n WHERE { ?p foaf:name ?n } ORDER BY ?n LIMIT 10 OFFSET 5",
        )
        .unwrap();

        assert_eq!(query.form, QueryForm::Select);
        assert!(query.modifiers.distinct);
        assert_eq!(query.modifiers.offset, 5);
        assert_eq!(query.modifiers.limit, Some(10));
        assert_eq!(query.modifiers.order_by.len(), 1);
        insta::assert_snapshot!(query.pattern, @"Triple(?p <http://xmlns.com/foaf/0.1/name> ?n)");
        assert_eq!(
            query
                .output_variables()
                .iter()
                .map(Variable::as_str)
                .collect::<Vec<_>>(),
            vec!["n"]
        );
    }

    #[test]
    fn test_convert_optional_and_graph() {
        let query = convert(
            "SELECT * WHERE {
                GRAPH ?g { ?s <http://ex.org/p> ?o }
                OPTIONAL { ?s <http://ex.org/q> ?x FILTER(?x > 3) }
            }",
        )
        .unwrap();
        insta::assert_snapshot!(query.pattern, @"LeftJoin(Triple(?s <http://ex.org/p> ?o GRAPH ?g), Triple(?s <http://ex.org/q> ?x), (?x > \"3\"^^<http://www.w3.org/2001/XMLSchema#integer>))");
    }

    #[test]
    fn test_blank_nodes_become_hidden_variables() {
        let query = convert("SELECT * WHERE { _:b <http://ex.org/p> ?o }").unwrap();
        assert_eq!(
            query
                .output_variables()
                .iter()
                .map(Variable::as_str)
                .collect::<Vec<_>>(),
            vec!["o"]
        );
    }

    #[test]
    fn test_ask_is_limited_to_one_solution() {
        let query = convert("ASK { ?s ?p ?o }").unwrap();
        assert_eq!(query.form, QueryForm::Ask);
        assert_eq!(query.modifiers.limit, Some(1));
    }

    #[test]
    fn test_unsupported_constructs() {
        assert!(convert("SELECT * WHERE { ?s <http://ex.org/p>* ?o }").is_err());
        assert!(convert("SELECT * WHERE { ?s ?p ?o MINUS { ?s ?p 1 } }").is_err());
        assert!(convert("SELECT (COUNT(*) AS ?c) WHERE { ?s ?p ?o }").is_err());
        assert!(convert("CONSTRUCT { ?s ?p ?o } WHERE { ?s ?p ?o }").is_err());
    }
}

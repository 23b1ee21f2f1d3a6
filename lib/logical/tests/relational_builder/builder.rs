use crate::test_utils::{build, mapping, schema};
use relsparql_algebra::{
    GraphPattern, PatternTerm, QueryForm, QueryModifiers, SparqlQuery, TriplePattern,
};
use relsparql_common::{DFResult, MsSqlDialect};
use relsparql_logical::binders::ValueBinder;
use relsparql_logical::calculus::{CalculusSource, FilterCondition, SourceCondition};
use relsparql_logical::RelationalBuilder;
use relsparql_model::Variable;
use std::sync::Arc;

fn binder<'a>(query: &'a relsparql_logical::RelationalQuery, name: &str) -> &'a ValueBinder {
    query
        .bindings
        .iter()
        .find(|(variable, _)| variable.as_str() == name)
        .map(|(_, binder)| binder)
        .unwrap()
}

#[test]
fn test_single_triple() -> DFResult<()> {
    let query = build("SELECT ?name WHERE { ?p <http://xmlns.com/foaf/0.1/name> ?name }")?;
    insta::assert_snapshot!(query, @r"
    Model s1 [name#1]
      Table s0 person [id#0, name#1]
      Filter NOT id#0 IS NULL
      Filter NOT name#1 IS NULL
    Bind ?name <- Base({name} name#1)
    ");
    Ok(())
}

#[test]
fn test_join_on_subject_compares_columns() -> DFResult<()> {
    let query = build(
        "SELECT ?name ?dept WHERE {
            ?p <http://xmlns.com/foaf/0.1/name> ?name .
            ?p <http://ex.org/dept> ?dept
        }",
    )?;

    let tables = query
        .model
        .sources
        .iter()
        .filter(|s| matches!(s, SourceCondition::Tuple(CalculusSource::Table(_))))
        .count();
    assert_eq!(tables, 3);
    assert!(query
        .model
        .filters
        .iter()
        .any(|f| matches!(f, FilterCondition::EqualVariables(..))));
    assert!(matches!(binder(&query, "dept"), ValueBinder::Base(_)));
    Ok(())
}

#[test]
fn test_union_binds_through_switch() -> DFResult<()> {
    let query = build(
        "SELECT ?x WHERE {
            { ?s <http://xmlns.com/foaf/0.1/name> ?x }
            UNION
            { ?s <http://www.w3.org/2000/01/rdf-schema#label> ?x }
        }",
    )?;

    let [SourceCondition::Union(union)] = query.model.sources.as_slice() else {
        panic!("Expected a single union source: {query}");
    };
    assert_eq!(union.branches.len(), 2);
    // One slot for each of ?s and ?x.
    assert_eq!(union.variables.len(), 2);
    let ValueBinder::Switch(switch) = binder(&query, "x") else {
        panic!("Expected a switch binder: {query}");
    };
    assert_eq!(switch.case_variable, union.case_variable);
    assert_eq!(switch.cases.len(), 2);
    Ok(())
}

#[test]
fn test_optional_becomes_left_join() -> DFResult<()> {
    let query = build(
        "SELECT ?name ?dept WHERE {
            ?p <http://xmlns.com/foaf/0.1/name> ?name .
            OPTIONAL { ?p <http://ex.org/dept> ?dept }
        }",
    )?;

    let left_join = query
        .model
        .sources
        .iter()
        .find_map(|s| match s {
            SourceCondition::LeftJoin(left_join) => Some(left_join),
            _ => None,
        })
        .unwrap();
    assert!(left_join.condition.as_constant().is_none());
    assert!(!left_join.model.variables.is_empty());
    assert!(matches!(binder(&query, "dept"), ValueBinder::Base(_)));
    Ok(())
}

#[test]
fn test_bind_assigns_all_parts() -> DFResult<()> {
    let query = build(
        "SELECT ?copy WHERE {
            ?p <http://xmlns.com/foaf/0.1/name> ?name .
            BIND(?name AS ?copy)
        }",
    )?;

    assert_eq!(query.model.assignments.len(), 6);
    assert!(matches!(binder(&query, "copy"), ValueBinder::ExpressionSet(_)));
    assert_eq!(query.model.variables.len(), 6);
    Ok(())
}

#[test]
fn test_unmapped_predicate_is_empty() -> DFResult<()> {
    let query = build("SELECT ?o WHERE { ?s <http://ex.org/unknown> ?o }")?;
    assert!(query.is_empty());
    Ok(())
}

#[test]
fn test_ask_is_limited_to_one_row() -> DFResult<()> {
    let query = build("ASK { ?p <http://xmlns.com/foaf/0.1/name> ?name }")?;
    assert_eq!(query.form, QueryForm::Ask);
    assert!(query.bindings.is_empty());
    assert!(query.model.variables.is_empty());
    assert_eq!(query.model.modifiers.limit, Some(1));
    Ok(())
}

#[test]
fn test_order_by_adds_ordering_keys() -> DFResult<()> {
    let query = build(
        "SELECT ?name WHERE { ?p <http://xmlns.com/foaf/0.1/name> ?name } ORDER BY DESC(?name) LIMIT 5",
    )?;

    let modifiers = &query.model.modifiers;
    assert_eq!(modifiers.limit, Some(5));
    assert!(!modifiers.ordering.is_empty());
    assert!(modifiers.ordering.iter().all(|key| !key.ascending));
    Ok(())
}

#[test]
fn test_unrestricted_triple_is_rejected() {
    let variable = |name: &str| PatternTerm::Variable(Variable::new_unchecked(name));
    let query = SparqlQuery {
        form: QueryForm::Select,
        pattern: GraphPattern::Triple(TriplePattern {
            subject: variable("s"),
            predicate: variable("p"),
            object: variable("o"),
            graph: None,
        }),
        modifiers: QueryModifiers::default(),
        base_iri: None,
    };

    let result = RelationalBuilder::new(mapping(), schema(), Arc::new(MsSqlDialect)).build(&query);
    assert!(result.is_err());
}

use relsparql_algebra::passes::SafeAlgebraPasses;
use relsparql_algebra::{convert_query, MappingTransformer};
use relsparql_common::types::{IntegerWidth, MsSqlColumnType, TypeLength};
use relsparql_common::{DFResult, InMemorySchema, MsSqlDialect, TableInfo};
use relsparql_logical::calculus::{CalculusSource, FilterCondition, SourceCondition};
use relsparql_logical::{RelationalBuilder, RelationalQuery};
use relsparql_mapping::{
    LogicalTable, PredicateObjectMap, R2RmlMapping, SubjectMap, TermMap, TermPosition,
    TriplesMap,
};
use relsparql_model::NamedNode;
use relsparql_optimizer::{CalculusOptimizer, OptimizationLevel};
use std::sync::Arc;

const PERSON_QUERY: &str = "SELECT ?name ?dept WHERE {
    ?p <http://xmlns.com/foaf/0.1/name> ?name .
    ?p <http://ex.org/dept> ?dept
}";

fn mapping() -> Arc<R2RmlMapping> {
    let person = TriplesMap::new(
        "person",
        LogicalTable::Table("person".to_owned()),
        SubjectMap::new(
            TermMap::template(TermPosition::Subject, "http://ex.org/person/{id}").unwrap(),
        ),
    )
    .with_predicate_object_map(
        PredicateObjectMap::new()
            .with_predicate(NamedNode::new_unchecked("http://xmlns.com/foaf/0.1/name"))
            .with_object_map(TermMap::column(TermPosition::Object, "name")),
    )
    .with_predicate_object_map(
        PredicateObjectMap::new()
            .with_predicate(NamedNode::new_unchecked("http://ex.org/dept"))
            .with_object_map(TermMap::column(TermPosition::Object, "dept")),
    );
    Arc::new(R2RmlMapping::try_new([person]).unwrap())
}

fn schema() -> InMemorySchema {
    let text = MsSqlColumnType::Text {
        unicode: true,
        fixed: false,
        length: TypeLength::Limited(50),
    };
    InMemorySchema::new().with_table(
        TableInfo::new("person")
            .with_column("id", Arc::new(MsSqlColumnType::Integer(IntegerWidth::Int)), false)
            .with_column("name", Arc::new(text.clone()), false)
            .with_column("dept", Arc::new(text), true)
            .with_primary_key(["id"]),
    )
}

fn build(query: &str) -> DFResult<RelationalQuery> {
    let query = spargebra::Query::parse(query, None).unwrap();
    let mut query = convert_query(&query)?;
    let mapping = mapping();
    let pattern = MappingTransformer::new(Arc::clone(&mapping))
        .transform(query.pattern)?
        .data;
    query.pattern = SafeAlgebraPasses::default().apply(pattern)?.data;
    RelationalBuilder::new(mapping, Arc::new(schema()), Arc::new(MsSqlDialect)).build(&query)
}

fn table_count(query: &RelationalQuery) -> usize {
    query
        .model
        .sources
        .iter()
        .filter(|s| matches!(s, SourceCondition::Tuple(CalculusSource::Table(_))))
        .count()
}

#[test]
fn test_full_level_merges_subject_join() -> DFResult<()> {
    let query = build(PERSON_QUERY)?;
    assert_eq!(table_count(&query), 2);

    let optimized = CalculusOptimizer::with_level(OptimizationLevel::Full).optimize(query)?;
    assert!(optimized.transformed);
    assert_eq!(table_count(&optimized.data), 1);

    // Every binder reads from the remaining table.
    let table_columns = optimized.data.model.produced_variables();
    for (_, binder) in &optimized.data.bindings {
        for variable in binder.needed_variables() {
            assert!(table_columns.contains(&variable), "{}", optimized.data);
        }
    }
    Ok(())
}

#[test]
fn test_default_level_keeps_tables() -> DFResult<()> {
    let query = build(PERSON_QUERY)?;
    let optimized = CalculusOptimizer::with_level(OptimizationLevel::Default).optimize(query)?;
    assert_eq!(table_count(&optimized.data), 2);
    Ok(())
}

#[test]
fn test_none_level_only_simplifies() -> DFResult<()> {
    let query = build(PERSON_QUERY)?;
    let optimized = CalculusOptimizer::with_level(OptimizationLevel::None).optimize(query)?;
    assert_eq!(table_count(&optimized.data), 2);
    assert!(optimized
        .data
        .model
        .filters
        .iter()
        .any(|filter| matches!(filter, FilterCondition::EqualVariables(..))));
    Ok(())
}

#[test]
fn test_not_null_guards_of_key_columns_are_removed() -> DFResult<()> {
    let query = build("SELECT ?name WHERE { ?p <http://xmlns.com/foaf/0.1/name> ?name }")?;
    assert!(!query.model.filters.is_empty());

    let optimized = CalculusOptimizer::with_level(OptimizationLevel::Full).optimize(query)?;
    assert!(optimized
        .data
        .model
        .filters
        .iter()
        .all(|filter| !matches!(filter, FilterCondition::Negation(_))));
    Ok(())
}

use relsparql_algebra::passes::SafeAlgebraPasses;
use relsparql_algebra::{convert_query, MappingTransformer};
use relsparql_common::types::{IntegerWidth, MsSqlColumnType, TypeLength};
use relsparql_common::{DFResult, InMemorySchema, MsSqlDialect, SchemaProvider, TableInfo};
use relsparql_logical::{RelationalBuilder, RelationalQuery};
use relsparql_mapping::{
    LogicalTable, PredicateObjectMap, R2RmlMapping, RefObjectMap, SubjectMap, TermMap,
    TermPosition, TriplesMap,
};
use relsparql_model::NamedNode;
use std::sync::Arc;

fn integer() -> Arc<MsSqlColumnType> {
    Arc::new(MsSqlColumnType::Integer(IntegerWidth::Int))
}

fn text() -> Arc<MsSqlColumnType> {
    Arc::new(MsSqlColumnType::Text {
        unicode: true,
        fixed: false,
        length: TypeLength::Limited(50),
    })
}

pub fn schema() -> Arc<dyn SchemaProvider> {
    Arc::new(
        InMemorySchema::new()
            .with_table(
                TableInfo::new("person")
                    .with_column("id", integer(), false)
                    .with_column("name", text(), true)
                    .with_column("dept", integer(), true)
                    .with_primary_key(["id"]),
            )
            .with_table(
                TableInfo::new("dept")
                    .with_column("id", integer(), false)
                    .with_column("label", text(), true)
                    .with_primary_key(["id"]),
            ),
    )
}

fn iri(value: &str) -> NamedNode {
    NamedNode::new_unchecked(value)
}

pub fn mapping() -> Arc<R2RmlMapping> {
    let person = TriplesMap::new(
        "person",
        LogicalTable::Table("person".to_owned()),
        SubjectMap::new(
            TermMap::template(TermPosition::Subject, "http://ex.org/person/{id}").unwrap(),
        )
        .with_class(iri("http://ex.org/Person")),
    )
    .with_predicate_object_map(
        PredicateObjectMap::new()
            .with_predicate(iri("http://xmlns.com/foaf/0.1/name"))
            .with_object_map(TermMap::column(TermPosition::Object, "name")),
    )
    .with_predicate_object_map(
        PredicateObjectMap::new()
            .with_predicate(iri("http://ex.org/dept"))
            .with_ref_object_map(RefObjectMap::new("dept").with_join_condition("dept", "id")),
    );
    let dept = TriplesMap::new(
        "dept",
        LogicalTable::Table("dept".to_owned()),
        SubjectMap::new(
            TermMap::template(TermPosition::Subject, "http://ex.org/dept/{id}").unwrap(),
        ),
    )
    .with_predicate_object_map(
        PredicateObjectMap::new()
            .with_predicate(iri("http://www.w3.org/2000/01/rdf-schema#label"))
            .with_object_map(TermMap::column(TermPosition::Object, "label")),
    );
    Arc::new(R2RmlMapping::try_new([person, dept]).unwrap())
}

/// Runs the SPARQL side of the pipeline and builds the relational query.
pub fn build(query: &str) -> DFResult<RelationalQuery> {
    let query = spargebra::Query::parse(query, None).unwrap();
    let mut query = convert_query(&query)?;
    let mapping = mapping();
    let pattern = MappingTransformer::new(Arc::clone(&mapping))
        .transform(query.pattern)?
        .data;
    query.pattern = SafeAlgebraPasses::default().apply(pattern)?.data;
    RelationalBuilder::new(mapping, schema(), Arc::new(MsSqlDialect)).build(&query)
}

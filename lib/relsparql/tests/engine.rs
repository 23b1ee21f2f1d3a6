#![cfg(test)]

use relsparql::common::error::DatabaseError;
use relsparql::common::types::{IntegerWidth, MsSqlColumnType, TypeLength};
use relsparql::common::{
    InMemorySchema, MsSqlDialect, MySqlDialect, QueryResultReader, QueryResultRow,
    SqlDatabase, SqlDialectRef, TableInfo,
};
use relsparql::error::QueryEvaluationError;
use relsparql::mapping::{
    LogicalTable, PredicateObjectMap, R2RmlMapping, SubjectMap, TermMap, TermPosition,
    TriplesMap,
};
use relsparql::model::{Literal, NamedNode, Term};
use relsparql::{QueryOptions, QueryResults, RelSparqlEngine};
use std::sync::{Arc, Mutex};

const NAME_QUERY: &str = "SELECT ?n WHERE { ?p <http://xmlns.com/foaf/0.1/name> ?n }";

/// Returns the same rows for every statement and records the statements.
#[derive(Debug, Default)]
struct FakeDatabase {
    rows: Vec<QueryResultRow>,
    queries: Mutex<Vec<String>>,
}

impl FakeDatabase {
    fn with_rows(rows: Vec<QueryResultRow>) -> Self {
        Self {
            rows,
            queries: Mutex::default(),
        }
    }

    fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }
}

impl SqlDatabase for FakeDatabase {
    fn execute_query(
        &self,
        query: &str,
    ) -> Result<Box<dyn QueryResultReader + '_>, DatabaseError> {
        self.queries.lock().unwrap().push(query.to_owned());
        Ok(Box::new(self.rows.clone().into_iter()))
    }
}

/// Fails every statement.
#[derive(Debug)]
struct UnavailableDatabase;

impl SqlDatabase for UnavailableDatabase {
    fn execute_query(
        &self,
        _query: &str,
    ) -> Result<Box<dyn QueryResultReader + '_>, DatabaseError> {
        Err(DatabaseError::rejected("connection closed"))
    }
}

fn schema() -> InMemorySchema {
    InMemorySchema::new().with_table(
        TableInfo::new("person")
            .with_column("id", Arc::new(MsSqlColumnType::Integer(IntegerWidth::Int)), false)
            .with_column(
                "name",
                Arc::new(MsSqlColumnType::Text {
                    unicode: false,
                    fixed: false,
                    length: TypeLength::Limited(50),
                }),
                false,
            )
            .with_primary_key(["id"]),
    )
}

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
    );
    Arc::new(R2RmlMapping::try_new([person]).unwrap())
}

/// Identifies persons by their name.
fn name_mapping() -> Arc<R2RmlMapping> {
    let person = TriplesMap::new(
        "person",
        LogicalTable::Table("person".to_owned()),
        SubjectMap::new(
            TermMap::template(TermPosition::Subject, "http://ex.org/person/{name}").unwrap(),
        ),
    )
    .with_predicate_object_map(
        PredicateObjectMap::new()
            .with_predicate(NamedNode::new_unchecked("http://ex.org/id"))
            .with_object_map(TermMap::column(TermPosition::Object, "id")),
    );
    Arc::new(R2RmlMapping::try_new([person]).unwrap())
}

fn engine_with(database: Arc<dyn SqlDatabase>, dialect: SqlDialectRef) -> RelSparqlEngine {
    RelSparqlEngine::new(mapping(), Arc::new(schema()), dialect, database)
}

fn engine(database: Arc<FakeDatabase>) -> RelSparqlEngine {
    engine_with(database, Arc::new(MsSqlDialect))
}

#[test]
fn test_name_query_compiles_to_single_table() {
    let engine = engine(Arc::new(FakeDatabase::default()));
    let compiled = engine.compile(NAME_QUERY, &QueryOptions::default()).unwrap();

    insta::assert_snapshot!(compiled.relational_query().model, @r"
    Model s1 [name#1]
      Table s0 person [id#0, name#1]
    ");
    insta::assert_snapshot!(
        compiled.sql().unwrap(),
        @"SELECT t1.[name] AS c1 FROM [person] AS t1"
    );
    assert_eq!(compiled.output_columns().unwrap(), vec!["c1"]);
    assert_eq!(compiled.variables().len(), 1);
    assert_eq!(compiled.variables()[0].as_str(), "n");
}

#[test]
fn test_rows_become_solutions() {
    let database = Arc::new(FakeDatabase::with_rows(vec![
        QueryResultRow::default().with_value("c1", Some("Alice")),
        QueryResultRow::default().with_value("c1", Some("Bob")),
    ]));
    let engine = engine(Arc::clone(&database));

    let QueryResults::Solutions(solutions) =
        engine.query(NAME_QUERY, &QueryOptions::default()).unwrap()
    else {
        panic!("Expected solutions");
    };
    let names = solutions
        .map(|solution| solution.unwrap().get("n").cloned())
        .collect::<Vec<_>>();

    assert_eq!(
        names,
        vec![
            Some(Term::from(Literal::new_simple_literal("Alice"))),
            Some(Term::from(Literal::new_simple_literal("Bob"))),
        ]
    );
    assert_eq!(database.queries().len(), 1);
}

#[test]
fn test_null_value_is_unbound() {
    let database = Arc::new(FakeDatabase::with_rows(vec![
        QueryResultRow::default().with_value("c1", None),
    ]));
    let engine = engine(database);

    let QueryResults::Solutions(mut solutions) =
        engine.query(NAME_QUERY, &QueryOptions::default()).unwrap()
    else {
        panic!("Expected solutions");
    };
    let solution = solutions.next().unwrap().unwrap();
    assert_eq!(solution.get("n"), None);
    assert!(solutions.next().is_none());
}

#[test]
fn test_constant_subject_becomes_key_condition() {
    let engine = engine(Arc::new(FakeDatabase::default()));
    let compiled = engine
        .compile(
            "SELECT ?n WHERE { <http://ex.org/person/7> <http://xmlns.com/foaf/0.1/name> ?n }",
            &QueryOptions::default(),
        )
        .unwrap();

    let sql = compiled.sql().unwrap();
    assert!(sql.contains("t1.[id] = 7"), "{sql}");
}

#[test]
fn test_subject_outside_of_template_has_no_solutions() {
    let database = Arc::new(FakeDatabase::default());
    let engine = engine(Arc::clone(&database));

    let results = engine
        .query(
            "SELECT ?n WHERE { <http://ex.org/dept/7> <http://xmlns.com/foaf/0.1/name> ?n }",
            &QueryOptions::default(),
        )
        .unwrap();

    let QueryResults::Solutions(mut solutions) = results else {
        panic!("Expected solutions");
    };
    assert!(solutions.next().is_none());
    assert!(database.queries().is_empty());
}

#[test]
fn test_ask() {
    let database = Arc::new(FakeDatabase::with_rows(vec![QueryResultRow::default()]));
    let query = "ASK { ?p <http://xmlns.com/foaf/0.1/name> ?n }";

    let matching = engine(Arc::clone(&database));
    let results = matching.query(query, &QueryOptions::default()).unwrap();
    assert!(matches!(results, QueryResults::Boolean(true)));
    assert!(database.queries()[0].starts_with("SELECT TOP 1 "));

    let empty = engine(Arc::new(FakeDatabase::default()));
    let results = empty.query(query, &QueryOptions::default()).unwrap();
    assert!(matches!(results, QueryResults::Boolean(false)));
}

#[test]
fn test_unmapped_predicate_does_not_query_database() {
    let database = Arc::new(FakeDatabase::default());
    let engine = engine(Arc::clone(&database));

    let results = engine
        .query(
            "ASK { ?p <http://ex.org/unknown> ?n }",
            &QueryOptions::default(),
        )
        .unwrap();

    assert!(matches!(results, QueryResults::Boolean(false)));
    assert!(database.queries().is_empty());
}

#[test]
fn test_syntax_error() {
    let engine = engine(Arc::new(FakeDatabase::default()));
    let error = engine
        .compile("SELECT ?n WHERE {", &QueryOptions::default())
        .unwrap_err();
    assert!(matches!(error, QueryEvaluationError::Parsing(_)));
}

#[test]
fn test_unsupported_constructs() {
    let engine = engine(Arc::new(FakeDatabase::default()));
    for query in [
        "SELECT ?n WHERE { ?p <http://xmlns.com/foaf/0.1/name> ?n MINUS { ?p ?q ?n } }",
        "SELECT ?n WHERE { ?p <http://xmlns.com/foaf/0.1/name>+ ?n }",
    ] {
        let error = engine.compile(query, &QueryOptions::default()).unwrap_err();
        assert!(
            matches!(error, QueryEvaluationError::NotImplemented(_)),
            "{query}: {error}"
        );
    }
}

#[test]
fn test_database_error_is_reported() {
    let engine = engine_with(Arc::new(UnavailableDatabase), Arc::new(MsSqlDialect));
    let Err(error) = engine.query(NAME_QUERY, &QueryOptions::default()) else {
        panic!("Expected an error");
    };
    assert!(matches!(error, QueryEvaluationError::Database(_)));
}

#[test]
fn test_mysql_paging() {
    let database = Arc::new(FakeDatabase::default());
    let engine = engine_with(database, Arc::new(MySqlDialect));
    let compiled = engine
        .compile(
            &format!("{NAME_QUERY} LIMIT 10 OFFSET 5"),
            &QueryOptions::default(),
        )
        .unwrap();

    insta::assert_snapshot!(
        compiled.sql().unwrap(),
        @"SELECT t1.`name` AS c1 FROM `person` AS t1 LIMIT 10 OFFSET 5"
    );
}

#[test]
fn test_returned_iri_can_be_queried() {
    let query = "SELECT ?p WHERE { ?p <http://ex.org/id> ?i }";
    let columns = RelSparqlEngine::new(
        name_mapping(),
        Arc::new(schema()),
        Arc::new(MsSqlDialect),
        Arc::new(FakeDatabase::default()),
    )
    .compile(query, &QueryOptions::default())
    .unwrap()
    .output_columns()
    .unwrap()
    .into_iter()
    .map(ToOwned::to_owned)
    .collect::<Vec<_>>();
    let row = columns
        .iter()
        .fold(QueryResultRow::default(), |row, column| {
            row.with_value(column, Some("a b"))
        });
    let database = Arc::new(FakeDatabase::with_rows(vec![row]));
    let engine = RelSparqlEngine::new(
        name_mapping(),
        Arc::new(schema()),
        Arc::new(MsSqlDialect),
        Arc::clone(&database) as Arc<dyn SqlDatabase>,
    );

    let QueryResults::Solutions(mut solutions) =
        engine.query(query, &QueryOptions::default()).unwrap()
    else {
        panic!("Expected solutions");
    };
    let subject = solutions.next().unwrap().unwrap().get("p").cloned();
    assert_eq!(
        subject,
        Some(Term::from(NamedNode::new_unchecked("http://ex.org/person/a%20b")))
    );

    let compiled = engine
        .compile(
            "SELECT ?i WHERE { <http://ex.org/person/a%20b> <http://ex.org/id> ?i }",
            &QueryOptions::default(),
        )
        .unwrap();
    let sql = compiled.sql().unwrap();
    assert!(sql.contains("t1.[name] = N'a b'"), "{sql}");
}

#[test]
fn test_iri_that_is_not_iri_safe_has_no_solutions() {
    let database = Arc::new(FakeDatabase::default());
    let engine = RelSparqlEngine::new(
        name_mapping(),
        Arc::new(schema()),
        Arc::new(MsSqlDialect),
        Arc::clone(&database) as Arc<dyn SqlDatabase>,
    );

    let results = engine
        .query(
            "SELECT ?i WHERE { <http://ex.org/person/a/b> <http://ex.org/id> ?i }",
            &QueryOptions::default(),
        )
        .unwrap();

    let QueryResults::Solutions(mut solutions) = results else {
        panic!("Expected solutions");
    };
    assert!(solutions.next().is_none());
    assert!(database.queries().is_empty());
}

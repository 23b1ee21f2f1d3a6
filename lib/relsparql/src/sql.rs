//! Renders a [CalculusModel] as a SQL statement of a [SqlDialect].

use crate::naming::QueryNaming;
use datafusion::common::internal_err;
use relsparql_common::{DFResult, SqlDialect, SqlTypeKind};
use relsparql_logical::calculus::{
    CalculusModel, CalculusSource, CalculusVariable, Expression, FilterCondition, SourceCondition,
    SourceId, SqlTable, SqlValue, TableSource, UnionBranch, UnionedSources, VariableId,
};
use relsparql_mapping::{appears_in_iri_safe, iri_safe};
use std::collections::HashMap;

/// Writes the SQL text of a model.
///
/// Every model becomes one `SELECT` statement. Nested models, unions and left joins become
/// derived tables whose columns are referenced through the names of the [QueryNaming].
#[derive(Debug, Clone, Copy)]
pub struct SqlWriter<'a> {
    dialect: &'a dyn SqlDialect,
    naming: &'a QueryNaming,
}

/// The SQL expressions of the variables visible in one `SELECT` statement.
#[derive(Debug, Default)]
struct Scope {
    columns: HashMap<VariableId, String>,
}

impl Scope {
    fn get(&self, variable: &CalculusVariable) -> DFResult<&str> {
        match self.columns.get(&variable.id()) {
            Some(column) => Ok(column),
            None => internal_err!("Variable {variable} is not in scope"),
        }
    }

    fn insert(&mut self, variable: &CalculusVariable, column: String) {
        self.columns.insert(variable.id(), column);
    }
}

impl<'a> SqlWriter<'a> {
    pub fn new(dialect: &'a dyn SqlDialect, naming: &'a QueryNaming) -> Self {
        Self { dialect, naming }
    }

    /// Renders the statement that produces the tuples of `model`.
    pub fn write_query(&self, model: &CalculusModel) -> DFResult<String> {
        let scope = self.model_scope(model)?;
        let mut columns = Vec::with_capacity(model.variables.len());
        for variable in &model.variables {
            columns.push(format!(
                "{} AS {}",
                scope.get(variable)?,
                self.naming.variable_name(variable)?
            ));
        }
        self.write_select(model, &scope, columns)
    }

    /// Adds the sources and assignments of `model` to a new scope.
    fn model_scope(&self, model: &CalculusModel) -> DFResult<Scope> {
        let mut scope = Scope::default();
        for source in &model.sources {
            match source {
                SourceCondition::Tuple(CalculusSource::Table(table)) => {
                    let alias = self.naming.source_name(table.id())?;
                    for column in table.columns() {
                        let Some(name) = column.column_name() else {
                            return internal_err!("Table column {column} has no column name");
                        };
                        scope.insert(
                            column,
                            format!("{alias}.{}", self.dialect.quote_identifier(name)),
                        );
                    }
                }
                SourceCondition::Tuple(CalculusSource::Model(inner)) => {
                    self.expose(&mut scope, inner.id, &inner.variables)?;
                }
                SourceCondition::Union(union) => {
                    self.expose(&mut scope, union.id, union.provided_variables())?;
                }
                SourceCondition::LeftJoin(left_join) => {
                    self.expose(&mut scope, left_join.model.id, &left_join.model.variables)?;
                }
            }
        }
        for assignment in &model.assignments {
            let expression = self.write_expression(&assignment.expression, &scope)?;
            scope.insert(&assignment.variable, expression);
        }
        Ok(scope)
    }

    /// Makes the columns of a derived table visible.
    fn expose<'v>(
        &self,
        scope: &mut Scope,
        source: SourceId,
        variables: impl IntoIterator<Item = &'v CalculusVariable>,
    ) -> DFResult<()> {
        let alias = self.naming.source_name(source)?;
        for variable in variables {
            scope.insert(
                variable,
                format!("{alias}.{}", self.naming.variable_name(variable)?),
            );
        }
        Ok(())
    }

    fn write_select(
        &self,
        model: &CalculusModel,
        scope: &Scope,
        mut columns: Vec<String>,
    ) -> DFResult<String> {
        let modifiers = &model.modifiers;
        let mut order_by = Vec::with_capacity(modifiers.ordering.len());
        for (i, key) in modifiers.ordering.iter().enumerate() {
            let expression = self.write_expression(&key.expression, scope)?;
            let direction = if key.ascending { "ASC" } else { "DESC" };
            if modifiers.distinct {
                // ORDER BY may only reference selected columns of a SELECT DISTINCT.
                columns.push(format!("{expression} AS o{i}"));
                order_by.push(format!("o{i} {direction}"));
            } else {
                order_by.push(format!("{expression} {direction}"));
            }
        }
        if columns.is_empty() {
            columns.push("1 AS one".to_owned());
        }

        let paging = self.dialect.paging(modifiers.offset, modifiers.limit);
        let mut sql = String::from("SELECT ");
        if modifiers.distinct {
            sql.push_str("DISTINCT ");
        }
        if let Some(prefix) = &paging.select_prefix {
            sql.push_str(prefix);
            sql.push(' ');
        }
        sql.push_str(&columns.join(", "));

        if let Some(from) = self.write_from(model, scope)? {
            sql.push_str(" FROM ");
            sql.push_str(&from);
        }

        let mut filters = Vec::with_capacity(model.filters.len());
        for filter in &model.filters {
            filters.push(self.write_condition(filter, scope)?);
        }
        if !filters.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&filters.join(" AND "));
        }

        if order_by.is_empty() && paging.requires_order_by && paging.suffix.is_some() {
            order_by.push("(SELECT NULL)".to_owned());
        }
        if !order_by.is_empty() {
            sql.push_str(" ORDER BY ");
            sql.push_str(&order_by.join(", "));
        }
        if let Some(suffix) = &paging.suffix {
            sql.push(' ');
            sql.push_str(suffix);
        }
        Ok(sql)
    }

    /// The `FROM` clause. [None] if the model has no sources and no filters.
    fn write_from(&self, model: &CalculusModel, scope: &Scope) -> DFResult<Option<String>> {
        let needs_unit_source = matches!(
            model.sources.first(),
            None | Some(SourceCondition::LeftJoin(_))
        );
        let mut from = String::new();
        if needs_unit_source {
            if model.sources.is_empty() && model.filters.is_empty() {
                return Ok(None);
            }
            // A single empty tuple as the left operand.
            from.push_str(&format!(
                "(SELECT 1 AS one) AS {}",
                self.naming.source_name(model.id)?
            ));
        }

        for source in &model.sources {
            let item = match source {
                SourceCondition::Tuple(CalculusSource::Table(table)) => self.write_table(table)?,
                SourceCondition::Tuple(CalculusSource::Model(inner)) => format!(
                    "({}) AS {}",
                    self.write_query(inner)?,
                    self.naming.source_name(inner.id)?
                ),
                SourceCondition::Union(union) => self.write_union(union)?,
                SourceCondition::LeftJoin(left_join) => {
                    from.push_str(&format!(
                        " LEFT JOIN ({}) AS {} ON {}",
                        self.write_query(&left_join.model)?,
                        self.naming.source_name(left_join.model.id)?,
                        self.write_condition(&left_join.condition, scope)?
                    ));
                    continue;
                }
            };
            if !from.is_empty() {
                from.push_str(" CROSS JOIN ");
            }
            from.push_str(&item);
        }
        Ok(Some(from))
    }

    fn write_table(&self, table: &SqlTable) -> DFResult<String> {
        let alias = self.naming.source_name(table.id())?;
        Ok(match table.source() {
            TableSource::Table(name) => {
                format!("{} AS {alias}", self.dialect.quote_identifier(name))
            }
            TableSource::Query(query) => format!("({query}) AS {alias}"),
        })
    }

    fn write_union(&self, union: &UnionedSources) -> DFResult<String> {
        let mut branches = Vec::with_capacity(union.branches.len());
        for branch in &union.branches {
            branches.push(self.write_union_branch(union, branch)?);
        }
        if branches.is_empty() {
            return internal_err!("Union {} has no branches", union.id);
        }
        Ok(format!(
            "({}) AS {}",
            branches.join(" UNION ALL "),
            self.naming.source_name(union.id)?
        ))
    }

    fn write_union_branch(&self, union: &UnionedSources, branch: &UnionBranch) -> DFResult<String> {
        let scope = self.model_scope(&branch.model)?;
        let mut columns = Vec::with_capacity(union.variables.len() + 1);
        columns.push(format!(
            "{} AS {}",
            branch.case,
            self.naming.variable_name(&union.case_variable)?
        ));
        for (slot, binding) in union.variables.iter().zip(&branch.bindings) {
            let value = match binding {
                Some(variable) => {
                    let column = scope.get(variable)?;
                    if **variable.sql_type() == **slot.sql_type() {
                        column.to_owned()
                    } else {
                        self.dialect.cast(column, slot.sql_type().as_ref())?
                    }
                }
                None if slot.sql_type().kind() == SqlTypeKind::Null => "NULL".to_owned(),
                None => self.dialect.cast("NULL", slot.sql_type().as_ref())?,
            };
            columns.push(format!("{value} AS {}", self.naming.variable_name(slot)?));
        }
        self.write_select(&branch.model, &scope, columns)
    }

    fn write_condition(&self, condition: &FilterCondition, scope: &Scope) -> DFResult<String> {
        Ok(match condition {
            FilterCondition::AlwaysTrue => "1 = 1".to_owned(),
            FilterCondition::AlwaysFalse => "1 = 0".to_owned(),
            FilterCondition::Conjunction(conditions) => {
                self.write_junction(conditions, " AND ", "1 = 1", scope)?
            }
            FilterCondition::Disjunction(conditions) => {
                self.write_junction(conditions, " OR ", "1 = 0", scope)?
            }
            FilterCondition::Negation(inner) => {
                let inner = self.write_condition(inner, scope)?;
                if inner.starts_with('(') {
                    format!("NOT {inner}")
                } else {
                    format!("NOT ({inner})")
                }
            }
            FilterCondition::Comparison(operator, left, right) => format!(
                "({} {operator} {})",
                self.write_expression(left, scope)?,
                self.write_expression(right, scope)?
            ),
            FilterCondition::EqualExpressions(left, right) => format!(
                "({} = {})",
                self.write_expression(left, scope)?,
                self.write_expression(right, scope)?
            ),
            FilterCondition::EqualVariables(left, right) => {
                format!("({} = {})", scope.get(left)?, scope.get(right)?)
            }
            FilterCondition::IsNull(variable) => format!("({} IS NULL)", scope.get(variable)?),
            FilterCondition::Like(expression, pattern) => format!(
                "({} LIKE {})",
                self.write_expression(expression, scope)?,
                self.dialect.string_literal(pattern)
            ),
            FilterCondition::LangMatches(expression, range) => {
                let expression = self.write_expression(expression, scope)?;
                if range == "*" {
                    format!("({expression} <> {})", self.dialect.string_literal(""))
                } else {
                    let range = range.to_ascii_lowercase();
                    format!(
                        "((LOWER({expression}) = {}) OR (LOWER({expression}) LIKE {}))",
                        self.dialect.string_literal(&range),
                        self.dialect.string_literal(&format!("{range}-%"))
                    )
                }
            }
        })
    }

    fn write_junction(
        &self,
        conditions: &[FilterCondition],
        separator: &str,
        empty: &str,
        scope: &Scope,
    ) -> DFResult<String> {
        if conditions.is_empty() {
            return Ok(empty.to_owned());
        }
        let mut parts = Vec::with_capacity(conditions.len());
        for condition in conditions {
            parts.push(self.write_condition(condition, scope)?);
        }
        Ok(format!("({})", parts.join(separator)))
    }

    fn write_expression(&self, expression: &Expression, scope: &Scope) -> DFResult<String> {
        Ok(match expression {
            Expression::Constant(value) => self.write_value(value),
            Expression::Column(variable) => scope.get(variable)?.to_owned(),
            Expression::Concatenation(parts) => {
                let parts = self.write_expressions(parts, scope)?;
                self.dialect.concat(&parts)
            }
            Expression::Binary(operator, left, right) => format!(
                "({} {operator} {})",
                self.write_expression(left, scope)?,
                self.write_expression(right, scope)?
            ),
            Expression::Case(branches) if branches.is_empty() => "NULL".to_owned(),
            Expression::Case(branches) => {
                let mut sql = String::from("CASE");
                for branch in branches {
                    sql.push_str(&format!(
                        " WHEN {} THEN {}",
                        self.write_condition(&branch.condition, scope)?,
                        self.write_expression(&branch.value, scope)?
                    ));
                }
                sql.push_str(" END");
                sql
            }
            Expression::Coalesce(expressions) => match expressions.as_slice() {
                [] => "NULL".to_owned(),
                [expression] => self.write_expression(expression, scope)?,
                expressions => format!(
                    "COALESCE({})",
                    self.write_expressions(expressions, scope)?.join(", ")
                ),
            },
            Expression::Cast(inner, sql_type) => {
                let inner = self.write_expression(inner, scope)?;
                self.dialect.cast(&inner, sql_type.as_ref())?
            }
            Expression::IriSafe(inner) => {
                let mut sql = self.write_expression(inner, scope)?;
                for c in iri_safe_escapes() {
                    let c = c.to_string();
                    sql = format!(
                        "REPLACE({sql}, {}, {})",
                        self.dialect.string_literal(&c),
                        self.dialect.string_literal(&iri_safe(&c))
                    );
                }
                sql
            }
            Expression::Null => "NULL".to_owned(),
        })
    }

    fn write_expressions(&self, expressions: &[Expression], scope: &Scope) -> DFResult<Vec<String>> {
        expressions
            .iter()
            .map(|expression| self.write_expression(expression, scope))
            .collect()
    }

    fn write_value(&self, value: &SqlValue) -> String {
        match value {
            SqlValue::String(value) => self.dialect.string_literal(value),
            SqlValue::Integer(value) => value.to_string(),
            SqlValue::Decimal(value) => value.clone(),
            SqlValue::Boolean(value) => self.dialect.boolean_literal(*value),
        }
    }
}

/// The printable ASCII characters that are percent-encoded in IRI-safe texts. `%` comes first so
/// that the escapes of the other characters are kept.
fn iri_safe_escapes() -> impl Iterator<Item = char> {
    std::iter::once('%').chain((' '..='~').filter(|c| *c != '%' && !appears_in_iri_safe(*c)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use relsparql_common::{MsSqlDialect, MySqlDialect, SqlDialect};
    use relsparql_logical::calculus::{
        AssignmentCondition, CalculusIdGenerator, CaseBranch, ComparisonType, LeftJoinSource,
        OrderingKey,
    };

    struct Fixture {
        generator: CalculusIdGenerator,
        model: CalculusModel,
        id: CalculusVariable,
        name: CalculusVariable,
    }

    fn person_model() -> Fixture {
        let mut generator = CalculusIdGenerator::new();
        let id = generator.column_variable("id", MsSqlDialect.integer_type(), false);
        let name = generator.column_variable("name", MsSqlDialect.string_type(), true);
        let mut table = SqlTable::new(
            generator.next_source_id(),
            TableSource::Table("person".to_owned()),
            vec![vec!["id".to_owned()]],
        );
        table.add_column(id.clone());
        table.add_column(name.clone());

        let mut model = CalculusModel::new(generator.next_source_id());
        model
            .sources
            .push(SourceCondition::Tuple(CalculusSource::Table(table)));
        model.variables = vec![name.clone()];
        Fixture {
            generator,
            model,
            id,
            name,
        }
    }

    fn write(model: &CalculusModel, dialect: &dyn SqlDialect) -> String {
        let naming = QueryNaming::new(model);
        SqlWriter::new(dialect, &naming).write_query(model).unwrap()
    }

    #[test]
    fn test_table_with_filters() {
        let Fixture {
            mut model, id, name, ..
        } = person_model();
        model.filters.push(FilterCondition::equal(
            Expression::column(&id),
            Expression::integer(7),
        ));
        model
            .filters
            .push(FilterCondition::IsNull(name).negate());

        insta::assert_snapshot!(
            write(&model, &MsSqlDialect),
            @"SELECT t1.[name] AS c1 FROM [person] AS t1 WHERE (t1.[id] = 7) AND NOT (t1.[name] IS NULL)"
        );
    }

    #[test]
    fn test_ordering_and_paging() {
        let Fixture { mut model, name, .. } = person_model();
        model.modifiers.ordering.push(OrderingKey {
            expression: Expression::column(&name),
            ascending: false,
        });
        model.modifiers.offset = 10;
        model.modifiers.limit = Some(5);

        insta::assert_snapshot!(
            write(&model, &MsSqlDialect),
            @"SELECT t1.[name] AS c1 FROM [person] AS t1 ORDER BY t1.[name] DESC OFFSET 10 ROWS FETCH NEXT 5 ROWS ONLY"
        );
        insta::assert_snapshot!(
            write(&model, &MySqlDialect),
            @"SELECT t1.`name` AS c1 FROM `person` AS t1 ORDER BY t1.`name` DESC LIMIT 5 OFFSET 10"
        );
    }

    #[test]
    fn test_offset_without_ordering() {
        let Fixture { mut model, .. } = person_model();
        model.modifiers.offset = 3;

        insta::assert_snapshot!(
            write(&model, &MsSqlDialect),
            @"SELECT t1.[name] AS c1 FROM [person] AS t1 ORDER BY (SELECT NULL) OFFSET 3 ROWS"
        );
    }

    #[test]
    fn test_distinct_selects_order_keys() {
        let Fixture { mut model, name, .. } = person_model();
        model.modifiers.distinct = true;
        model.modifiers.limit = Some(1);
        model.modifiers.ordering.push(OrderingKey {
            expression: Expression::column(&name),
            ascending: true,
        });

        insta::assert_snapshot!(
            write(&model, &MsSqlDialect),
            @"SELECT DISTINCT TOP 1 t1.[name] AS c1, t1.[name] AS o0 FROM [person] AS t1 ORDER BY o0 ASC"
        );
    }

    #[test]
    fn test_left_join_and_case() {
        let Fixture {
            mut generator,
            mut model,
            id,
            name,
        } = person_model();
        let dept_id = generator.column_variable("id", MsSqlDialect.integer_type(), false);
        let mut dept = SqlTable::new(
            generator.next_source_id(),
            TableSource::Table("dept".to_owned()),
            Vec::new(),
        );
        dept.add_column(dept_id.clone());
        let mut right = CalculusModel::new(generator.next_source_id());
        right
            .sources
            .push(SourceCondition::Tuple(CalculusSource::Table(dept)));
        right.variables = vec![dept_id.clone()];

        model.sources.push(SourceCondition::LeftJoin(LeftJoinSource {
            model: Box::new(right),
            condition: FilterCondition::EqualVariables(id.clone(), dept_id.clone()),
        }));
        let label = generator.computed_variable(MsSqlDialect.string_type());
        model.assignments.push(AssignmentCondition::new(
            label.clone(),
            Expression::Case(vec![CaseBranch::new(
                FilterCondition::IsNull(dept_id).negate(),
                Expression::Column(name),
            )]),
        ));
        model.variables = vec![label];

        insta::assert_snapshot!(
            write(&model, &MsSqlDialect),
            @"SELECT CASE WHEN NOT (t2.c2 IS NULL) THEN t1.[name] END AS c3 FROM [person] AS t1 LEFT JOIN (SELECT t3.[id] AS c2 FROM [dept] AS t3) AS t2 ON (t1.[id] = t2.c2)"
        );
    }

    #[test]
    fn test_union_casts_and_pads_branches() {
        let mut generator = CalculusIdGenerator::new();
        let mut branch = |column: &str, kind_is_integer: bool| {
            let sql_type = if kind_is_integer {
                MsSqlDialect.integer_type()
            } else {
                MsSqlDialect.string_type()
            };
            let variable = generator.column_variable(column, sql_type, true);
            let mut table = SqlTable::new(
                generator.next_source_id(),
                TableSource::Table("person".to_owned()),
                Vec::new(),
            );
            table.add_column(variable.clone());
            let mut model = CalculusModel::new(generator.next_source_id());
            model
                .sources
                .push(SourceCondition::Tuple(CalculusSource::Table(table)));
            (model, variable)
        };
        let (first, id) = branch("id", true);
        let (second, name) = branch("name", false);

        let case_variable = generator.computed_variable(MsSqlDialect.integer_type());
        let slot = generator.computed_variable(MsSqlDialect.string_type());
        let union = UnionedSources {
            id: generator.next_source_id(),
            case_variable: case_variable.clone(),
            variables: vec![slot.clone()],
            branches: vec![
                UnionBranch {
                    case: 0,
                    model: first,
                    bindings: vec![Some(id)],
                },
                UnionBranch {
                    case: 1,
                    model: second,
                    bindings: vec![Some(name)],
                },
                UnionBranch {
                    case: 2,
                    model: CalculusModel::new(generator.next_source_id()),
                    bindings: vec![None],
                },
            ],
        };
        let mut model = CalculusModel::new(generator.next_source_id());
        model.sources.push(SourceCondition::Union(union));
        model.variables = vec![slot.clone()];
        model.filters.push(FilterCondition::Comparison(
            ComparisonType::Less,
            Expression::column(&case_variable),
            Expression::integer(2),
        ));

        let sql = write(&model, &MsSqlDialect);
        assert!(sql.contains(" UNION ALL "), "{sql}");
        assert!(sql.starts_with("SELECT t1.c1 AS c1 FROM (SELECT 0 AS c0, CAST(t3.[id] AS "));
        assert!(sql.contains("SELECT 1 AS c0, t5.[name] AS c1 FROM [person] AS t5"), "{sql}");
        assert!(sql.contains("SELECT 2 AS c0, CAST(NULL AS "), "{sql}");
        assert!(sql.ends_with(") AS t1 WHERE (t1.c0 < 2)"), "{sql}");
    }

    #[test]
    fn test_empty_model() {
        let mut model = CalculusModel::new(CalculusIdGenerator::new().next_source_id());
        assert_eq!(write(&model, &MsSqlDialect), "SELECT 1 AS one");

        model.filters.push(FilterCondition::AlwaysFalse);
        assert_eq!(
            write(&model, &MsSqlDialect),
            "SELECT 1 AS one FROM (SELECT 1 AS one) AS t0 WHERE 1 = 0"
        );
    }

    #[test]
    fn test_iri_safe_text() {
        let Fixture {
            mut model, id, name, ..
        } = person_model();
        model.filters.push(FilterCondition::equal(
            Expression::iri_safe(Expression::column(&name)),
            Expression::cast(Expression::column(&id), MsSqlDialect.string_type()),
        ));

        let sql = write(&model, &MsSqlDialect);
        assert!(sql.contains("REPLACE(t1.[name], N'%', N'%25')"), "{sql}");
        assert!(sql.contains(", N' ', N'%20')"), "{sql}");
        assert!(sql.contains(", N'/', N'%2F')"), "{sql}");
        assert_eq!(sql.matches("REPLACE(").count(), 29);
        assert!(sql.ends_with(" = CAST(t1.[id] AS nvarchar(max)))"), "{sql}");
    }

    #[test]
    fn test_lang_matches() {
        let Fixture { mut model, name, .. } = person_model();
        model.filters.push(FilterCondition::LangMatches(
            Expression::column(&name),
            "EN".to_owned(),
        ));
        insta::assert_snapshot!(
            write(&model, &MySqlDialect),
            @"SELECT t1.`name` AS c1 FROM `person` AS t1 WHERE ((LOWER(t1.`name`) = 'en') OR (LOWER(t1.`name`) LIKE 'en-%'))"
        );
    }
}

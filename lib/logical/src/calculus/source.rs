use crate::calculus::{CalculusModel, CalculusVariable, FilterCondition, SourceId};
use std::fmt::{Display, Formatter};

/// Where the rows of a [SqlTable] come from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TableSource {
    Table(String),
    /// A literal SQL query (`rr:sqlQuery`).
    Query(String),
}

impl Display for TableSource {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            TableSource::Table(name) => write!(f, "{name}"),
            TableSource::Query(query) => write!(f, "({query})"),
        }
    }
}

/// One occurrence of a table in a query.
///
/// The same physical table may occur several times, each occurrence with its own
/// [SourceId] and its own column variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlTable {
    id: SourceId,
    source: TableSource,
    unique_keys: Vec<Vec<String>>,
    columns: Vec<CalculusVariable>,
}

impl SqlTable {
    pub fn new(id: SourceId, source: TableSource, unique_keys: Vec<Vec<String>>) -> Self {
        Self {
            id,
            source,
            unique_keys,
            columns: Vec::new(),
        }
    }

    pub fn id(&self) -> SourceId {
        self.id
    }

    pub fn source(&self) -> &TableSource {
        &self.source
    }

    /// The primary key and unique keys of the table.
    pub fn unique_keys(&self) -> &[Vec<String>] {
        &self.unique_keys
    }

    /// The column variables of this occurrence.
    pub fn columns(&self) -> &[CalculusVariable] {
        &self.columns
    }

    /// Finds the variable of a column of this occurrence.
    pub fn column(&self, name: &str) -> Option<&CalculusVariable> {
        self.columns.iter().find(|v| v.column_name() == Some(name))
    }

    /// Adds a column variable. Does nothing if the variable is already part of this table.
    pub fn add_column(&mut self, variable: CalculusVariable) {
        if !self.columns.contains(&variable) {
            self.columns.push(variable);
        }
    }

    pub(crate) fn columns_mut(&mut self) -> &mut Vec<CalculusVariable> {
        &mut self.columns
    }
}

/// A source of tuples.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CalculusSource {
    Table(SqlTable),
    Model(Box<CalculusModel>),
}

impl CalculusSource {
    pub fn id(&self) -> SourceId {
        match self {
            CalculusSource::Table(table) => table.id(),
            CalculusSource::Model(model) => model.id,
        }
    }

    /// The variables provided to the enclosing model.
    pub fn provided_variables(&self) -> &[CalculusVariable] {
        match self {
            CalculusSource::Table(table) => table.columns(),
            CalculusSource::Model(model) => &model.variables,
        }
    }
}

/// One branch of [UnionedSources].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnionBranch {
    /// The value of the case variable for tuples of this branch.
    pub case: i64,
    pub model: CalculusModel,
    /// The branch variable bound to each union variable, [None] for `NULL`.
    pub bindings: Vec<Option<CalculusVariable>>,
}

/// The union of several models. The `case_variable` tells which branch produced a tuple.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnionedSources {
    pub id: SourceId,
    pub case_variable: CalculusVariable,
    pub variables: Vec<CalculusVariable>,
    pub branches: Vec<UnionBranch>,
}

impl UnionedSources {
    /// The variables provided to the enclosing model.
    pub fn provided_variables(&self) -> impl Iterator<Item = &CalculusVariable> {
        std::iter::once(&self.case_variable).chain(self.variables.iter())
    }
}

/// A left outer join of the enclosing model (left operand) with `model`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeftJoinSource {
    pub model: Box<CalculusModel>,
    pub condition: FilterCondition,
}

/// A source of a [CalculusModel].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceCondition {
    /// Every tuple of a source.
    Tuple(CalculusSource),
    Union(UnionedSources),
    LeftJoin(LeftJoinSource),
}

impl SourceCondition {
    pub fn id(&self) -> SourceId {
        match self {
            SourceCondition::Tuple(source) => source.id(),
            SourceCondition::Union(union) => union.id,
            SourceCondition::LeftJoin(left_join) => left_join.model.id,
        }
    }

    /// The variables provided to the enclosing model.
    pub fn provided_variables(&self) -> Vec<CalculusVariable> {
        match self {
            SourceCondition::Tuple(source) => source.provided_variables().to_vec(),
            SourceCondition::Union(union) => union.provided_variables().cloned().collect(),
            SourceCondition::LeftJoin(left_join) => left_join.model.variables.clone(),
        }
    }
}

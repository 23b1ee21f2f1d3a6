use relsparql_common::SqlColumnTypeRef;
use std::cmp::Ordering;
use std::fmt::{Debug, Display, Formatter};
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Identifies a [CalculusVariable] within one compilation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VariableId(usize);

impl VariableId {
    pub fn as_usize(self) -> usize {
        self.0
    }
}

/// Identifies a source (table occurrence, nested model) within one compilation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SourceId(usize);

impl SourceId {
    pub fn as_usize(self) -> usize {
        self.0
    }
}

impl Display for SourceId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "s{}", self.0)
    }
}

/// Allocates the identifiers of one compilation.
///
/// Variables and sources are identified by an index instead of their address. Side tables such
/// as the names of the generated SQL are keyed by these identifiers.
#[derive(Debug, Default)]
pub struct CalculusIdGenerator {
    next_variable: usize,
    next_source: usize,
}

impl CalculusIdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_source_id(&mut self) -> SourceId {
        let id = SourceId(self.next_source);
        self.next_source += 1;
        id
    }

    /// Creates a variable for a column of a table.
    pub fn column_variable(
        &mut self,
        column: impl Into<String>,
        sql_type: SqlColumnTypeRef,
        nullable: bool,
    ) -> CalculusVariable {
        self.create(
            VariableKind::Column {
                column: column.into(),
                nullable,
            },
            sql_type,
        )
    }

    /// Creates a variable that is computed by the query (assignments, union slots, case
    /// discriminants).
    pub fn computed_variable(&mut self, sql_type: SqlColumnTypeRef) -> CalculusVariable {
        self.create(VariableKind::Computed, sql_type)
    }

    fn create(&mut self, kind: VariableKind, sql_type: SqlColumnTypeRef) -> CalculusVariable {
        let id = VariableId(self.next_variable);
        self.next_variable += 1;
        CalculusVariable(Arc::new(VariableInner { id, kind, sql_type }))
    }
}

/// What a [CalculusVariable] stands for.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum VariableKind {
    /// A physical column of a table.
    Column { column: String, nullable: bool },
    /// A value computed by the query.
    Computed,
}

#[derive(Debug)]
struct VariableInner {
    id: VariableId,
    kind: VariableKind,
    sql_type: SqlColumnTypeRef,
}

/// A slot of a relational tuple.
///
/// Two variables are equal iff they have the same [VariableId]. Cloning is cheap.
#[derive(Clone)]
pub struct CalculusVariable(Arc<VariableInner>);

impl CalculusVariable {
    pub fn id(&self) -> VariableId {
        self.0.id
    }

    pub fn kind(&self) -> &VariableKind {
        &self.0.kind
    }

    pub fn sql_type(&self) -> &SqlColumnTypeRef {
        &self.0.sql_type
    }

    /// The column name, if this variable stands for a physical column.
    pub fn column_name(&self) -> Option<&str> {
        match &self.0.kind {
            VariableKind::Column { column, .. } => Some(column),
            VariableKind::Computed => None,
        }
    }

    /// Whether the schema allows `NULL` values. Computed variables are always nullable.
    pub fn is_nullable(&self) -> bool {
        match &self.0.kind {
            VariableKind::Column { nullable, .. } => *nullable,
            VariableKind::Computed => true,
        }
    }
}

impl PartialEq for CalculusVariable {
    fn eq(&self, other: &Self) -> bool {
        self.id() == other.id()
    }
}

impl Eq for CalculusVariable {}

impl Hash for CalculusVariable {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id().hash(state);
    }
}

impl PartialOrd for CalculusVariable {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for CalculusVariable {
    fn cmp(&self, other: &Self) -> Ordering {
        self.id().cmp(&other.id())
    }
}

impl Debug for CalculusVariable {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self}: {}", self.sql_type())
    }
}

impl Display for CalculusVariable {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.0.kind {
            VariableKind::Column { column, .. } => write!(f, "{column}#{}", self.0.id.0),
            VariableKind::Computed => write!(f, "v{}", self.0.id.0),
        }
    }
}

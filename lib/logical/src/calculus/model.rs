use crate::calculus::expression::write_list;
use crate::calculus::{
    AssignmentCondition, CalculusSource, CalculusVariable, Expression, FilterCondition,
    SourceCondition, SourceId,
};
use std::fmt::{Display, Formatter};

/// An ordering criterion of a model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderingKey {
    pub expression: Expression,
    pub ascending: bool,
}

/// The solution modifiers of a model.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModelModifiers {
    pub distinct: bool,
    pub offset: usize,
    pub limit: Option<usize>,
    pub ordering: Vec<OrderingKey>,
}

impl ModelModifiers {
    pub fn is_empty(&self) -> bool {
        !self.distinct && self.offset == 0 && self.limit.is_none() && self.ordering.is_empty()
    }
}

/// A relational query in tuple relational calculus style.
///
/// The tuples of a model are the combinations of the tuples of its sources that satisfy all
/// filters. Assignments compute additional variables for each tuple. The `variables` are the
/// ones visible to an enclosing model, or the columns of the result for the root model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalculusModel {
    pub id: SourceId,
    pub variables: Vec<CalculusVariable>,
    pub sources: Vec<SourceCondition>,
    pub assignments: Vec<AssignmentCondition>,
    pub filters: Vec<FilterCondition>,
    pub modifiers: ModelModifiers,
}

impl CalculusModel {
    /// An empty model that has exactly one empty tuple.
    pub fn new(id: SourceId) -> Self {
        Self {
            id,
            variables: Vec::new(),
            sources: Vec::new(),
            assignments: Vec::new(),
            filters: Vec::new(),
            modifiers: ModelModifiers::default(),
        }
    }

    /// Adds the sources, assignments and filters of `other` (joining both models).
    pub fn merge(&mut self, other: CalculusModel) {
        self.sources.extend(other.sources);
        self.assignments.extend(other.assignments);
        self.filters.extend(other.filters);
    }

    /// Whether a filter of this model can never hold.
    pub fn is_always_false(&self) -> bool {
        self.filters
            .iter()
            .any(|f| matches!(f, FilterCondition::AlwaysFalse))
    }

    /// The variables produced at the level of this model: the ones provided by its sources and
    /// the assigned ones.
    pub fn produced_variables(&self) -> Vec<CalculusVariable> {
        self.sources
            .iter()
            .flat_map(SourceCondition::provided_variables)
            .chain(self.assignments.iter().map(|a| a.variable.clone()))
            .collect()
    }

    fn fmt_indented(&self, f: &mut Formatter<'_>, indent: usize) -> std::fmt::Result {
        let pad = "  ".repeat(indent);
        write!(f, "{pad}Model {} [", self.id)?;
        write_list(f, &self.variables, ", ")?;
        writeln!(f, "]")?;

        let pad = "  ".repeat(indent + 1);
        for source in &self.sources {
            match source {
                SourceCondition::Tuple(CalculusSource::Table(table)) => {
                    write!(f, "{pad}Table {} {} [", table.id(), table.source())?;
                    write_list(f, table.columns(), ", ")?;
                    writeln!(f, "]")?;
                }
                SourceCondition::Tuple(CalculusSource::Model(model)) => {
                    model.fmt_indented(f, indent + 1)?;
                }
                SourceCondition::Union(union) => {
                    write!(f, "{pad}Union {} {} [", union.id, union.case_variable)?;
                    write_list(f, &union.variables, ", ")?;
                    writeln!(f, "]")?;
                    for branch in &union.branches {
                        write!(f, "{pad}  Branch {} [", branch.case)?;
                        for (i, binding) in branch.bindings.iter().enumerate() {
                            if i > 0 {
                                write!(f, ", ")?;
                            }
                            match binding {
                                Some(variable) => write!(f, "{variable}")?,
                                None => write!(f, "NULL")?,
                            }
                        }
                        writeln!(f, "]")?;
                        branch.model.fmt_indented(f, indent + 3)?;
                    }
                }
                SourceCondition::LeftJoin(left_join) => {
                    writeln!(f, "{pad}LeftJoin ON {}", left_join.condition)?;
                    left_join.model.fmt_indented(f, indent + 2)?;
                }
            }
        }
        for assignment in &self.assignments {
            writeln!(f, "{pad}Assign {assignment}")?;
        }
        for filter in &self.filters {
            writeln!(f, "{pad}Filter {filter}")?;
        }

        let modifiers = &self.modifiers;
        if modifiers.distinct {
            writeln!(f, "{pad}Distinct")?;
        }
        for key in &modifiers.ordering {
            let direction = if key.ascending { "ASC" } else { "DESC" };
            writeln!(f, "{pad}OrderBy {} {direction}", key.expression)?;
        }
        if modifiers.offset > 0 || modifiers.limit.is_some() {
            write!(f, "{pad}Slice offset={}", modifiers.offset)?;
            if let Some(limit) = modifiers.limit {
                write!(f, " limit={limit}")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

impl Display for CalculusModel {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        self.fmt_indented(f, 0)
    }
}

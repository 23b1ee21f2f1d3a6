use datafusion::common::internal_err;
use relsparql_common::DFResult;
use relsparql_logical::calculus::{
    CalculusModel, CalculusSource, CalculusVariable, SourceCondition, SourceId, VariableId,
};
use std::collections::HashMap;

/// Stable SQL names for the sources and variables of a compiled model.
///
/// Sources are named `t0`, `t1`, ... and variables `c0`, `c1`, ... in the order in which they
/// are first encountered by a pre-order walk of the model. The names are keyed by the arena ids
/// of the calculus, so they stay valid for clones of the model.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryNaming {
    sources: HashMap<SourceId, String>,
    variables: HashMap<VariableId, String>,
}

impl QueryNaming {
    /// Names every source and variable of `model`.
    pub fn new(model: &CalculusModel) -> Self {
        let mut naming = Self::default();
        naming.register_model(model);
        naming
    }

    /// The alias of a source.
    pub fn source_name(&self, id: SourceId) -> DFResult<&str> {
        match self.sources.get(&id) {
            Some(name) => Ok(name),
            None => internal_err!("Source {id} has no name"),
        }
    }

    /// The column alias of a variable.
    pub fn variable_name(&self, variable: &CalculusVariable) -> DFResult<&str> {
        match self.variables.get(&variable.id()) {
            Some(name) => Ok(name),
            None => internal_err!("Variable {variable} has no name"),
        }
    }

    fn register_model(&mut self, model: &CalculusModel) {
        self.register_source(model.id);
        for source in &model.sources {
            match source {
                SourceCondition::Tuple(CalculusSource::Table(table)) => {
                    self.register_source(table.id());
                    for column in table.columns() {
                        self.register_variable(column);
                    }
                }
                SourceCondition::Tuple(CalculusSource::Model(inner)) => {
                    self.register_model(inner);
                }
                SourceCondition::Union(union) => {
                    self.register_source(union.id);
                    self.register_variable(&union.case_variable);
                    for variable in &union.variables {
                        self.register_variable(variable);
                    }
                    for branch in &union.branches {
                        self.register_model(&branch.model);
                    }
                }
                SourceCondition::LeftJoin(left_join) => self.register_model(&left_join.model),
            }
        }
        for assignment in &model.assignments {
            self.register_variable(&assignment.variable);
        }
        for variable in &model.variables {
            self.register_variable(variable);
        }
    }

    fn register_source(&mut self, id: SourceId) {
        let next = self.sources.len();
        self.sources.entry(id).or_insert_with(|| format!("t{next}"));
    }

    fn register_variable(&mut self, variable: &CalculusVariable) {
        let next = self.variables.len();
        self.variables
            .entry(variable.id())
            .or_insert_with(|| format!("c{next}"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relsparql_common::{MsSqlDialect, SqlDialect};
    use relsparql_logical::calculus::{CalculusIdGenerator, SqlTable, TableSource};

    #[test]
    fn test_names_follow_pre_order() {
        let mut generator = CalculusIdGenerator::new();
        let id = generator.column_variable("id", MsSqlDialect.integer_type(), false);
        let name = generator.column_variable("name", MsSqlDialect.string_type(), true);
        let unused = generator.column_variable("dept", MsSqlDialect.integer_type(), true);

        let mut table = SqlTable::new(
            generator.next_source_id(),
            TableSource::Table("person".to_owned()),
            Vec::new(),
        );
        table.add_column(id.clone());
        table.add_column(name.clone());
        let mut model = CalculusModel::new(generator.next_source_id());
        model.variables = vec![name.clone()];
        model
            .sources
            .push(SourceCondition::Tuple(CalculusSource::Table(table)));

        let naming = QueryNaming::new(&model);
        assert_eq!(naming.source_name(model.id).unwrap(), "t0");
        assert_eq!(naming.source_name(model.sources[0].id()).unwrap(), "t1");
        assert_eq!(naming.variable_name(&id).unwrap(), "c0");
        assert_eq!(naming.variable_name(&name).unwrap(), "c1");
        assert!(naming.variable_name(&unused).is_err());
    }
}

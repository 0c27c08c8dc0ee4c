use crate::error::{ExperimentError, Result};
use indexmap::IndexMap;
use sedflow_dsl::script_v1::StatementV1;
use serde::{Deserialize, Serialize};

/// Binds one model to one simulation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub model_id: String,
    pub simulation_id: String,
}

impl Task {
    pub fn new(
        id: impl Into<String>,
        model_id: impl Into<String>,
        simulation_id: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            model_id: model_id.into(),
            simulation_id: simulation_id.into(),
        }
    }

    pub fn to_statement(&self) -> StatementV1 {
        StatementV1::Run {
            id: self.id.clone(),
            simulation: self.simulation_id.clone(),
            model: self.model_id.clone(),
        }
    }
}

/// Parameter values to sweep. Columns are global parameter names; row `i`
/// takes element `i` of every column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "IndexMap<String, Vec<f64>>", into = "IndexMap<String, Vec<f64>>")]
pub struct ParameterTable {
    columns: IndexMap<String, Vec<f64>>,
    num_rows: usize,
}

impl ParameterTable {
    pub fn from_columns(columns: IndexMap<String, Vec<f64>>) -> Result<Self> {
        let num_rows = match columns.values().next() {
            Some(first) if !first.is_empty() => first.len(),
            _ => return Err(ExperimentError::EmptyParameterTable),
        };
        for (column, values) in &columns {
            if values.len() != num_rows {
                return Err(ExperimentError::RaggedParameterTable {
                    column: column.clone(),
                    expected: num_rows,
                    actual: values.len(),
                });
            }
        }
        Ok(Self { columns, num_rows })
    }

    /// Single-parameter sweep.
    pub fn single(name: impl Into<String>, values: Vec<f64>) -> Result<Self> {
        let mut columns = IndexMap::new();
        columns.insert(name.into(), values);
        Self::from_columns(columns)
    }

    pub fn parameter_names(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }

    pub fn columns(&self) -> &IndexMap<String, Vec<f64>> {
        &self.columns
    }

    pub fn num_rows(&self) -> usize {
        self.num_rows
    }

    /// Rows as `(name, value)` pairs, in table order.
    pub fn rows(&self) -> impl Iterator<Item = Vec<(&str, f64)>> + '_ {
        (0..self.num_rows).map(move |i| {
            self.columns
                .iter()
                .map(|(name, values)| (name.as_str(), values[i]))
                .collect()
        })
    }
}

impl TryFrom<IndexMap<String, Vec<f64>>> for ParameterTable {
    type Error = ExperimentError;

    fn try_from(columns: IndexMap<String, Vec<f64>>) -> Result<Self> {
        Self::from_columns(columns)
    }
}

impl From<ParameterTable> for IndexMap<String, Vec<f64>> {
    fn from(table: ParameterTable) -> Self {
        table.columns
    }
}

/// Re-runs a task once per row of a parameter table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepeatedTask {
    pub id: String,
    pub subtask_id: String,
    pub parameters: ParameterTable,
    /// Reset model state between sweep rows.
    pub reset: bool,
}

impl RepeatedTask {
    pub fn new(
        id: impl Into<String>,
        subtask_id: impl Into<String>,
        parameters: ParameterTable,
        reset: bool,
    ) -> Self {
        Self {
            id: id.into(),
            subtask_id: subtask_id.into(),
            parameters,
            reset,
        }
    }

    pub fn to_statement(&self) -> StatementV1 {
        StatementV1::Repeat {
            id: self.id.clone(),
            task: self.subtask_id.clone(),
            ranges: self
                .parameters
                .columns()
                .iter()
                .map(|(name, values)| (name.clone(), values.clone()))
                .collect(),
            reset: self.reset,
        }
    }
}

//! Column-named result tables.

use crate::error::{ExperimentError, Result};
use serde::Serialize;
use std::io::Write;
use std::path::Path;

/// Row-major table of `f64` values with named columns.
///
/// Column names need not be unique; lookups take the first match.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ResultTable {
    columns: Vec<String>,
    rows: Vec<Vec<f64>>,
}

impl ResultTable {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    pub fn from_rows(columns: Vec<String>, rows: Vec<Vec<f64>>) -> Result<Self> {
        let mut table = Self::new(columns);
        for row in rows {
            table.push_row(row)?;
        }
        Ok(table)
    }

    pub fn push_row(&mut self, row: Vec<f64>) -> Result<()> {
        if row.len() != self.columns.len() {
            return Err(ExperimentError::TableShape(format!(
                "row has {} values, table has {} columns",
                row.len(),
                self.columns.len()
            )));
        }
        self.rows.push(row);
        Ok(())
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<f64>] {
        &self.rows
    }

    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn index_of(&self, name: &str) -> Result<usize> {
        self.columns
            .iter()
            .position(|c| c == name)
            .ok_or_else(|| ExperimentError::UnknownColumn(name.to_string()))
    }

    pub fn column(&self, name: &str) -> Result<Vec<f64>> {
        let idx = self.index_of(name)?;
        Ok(self.rows.iter().map(|r| r[idx]).collect())
    }

    /// Append a column holding `value` in every row.
    pub fn append_constant_column(&mut self, name: impl Into<String>, value: f64) {
        self.columns.push(name.into());
        for row in &mut self.rows {
            row.push(value);
        }
    }

    /// Stack `other` below `self`. Column names must match exactly.
    pub fn vstack(&mut self, other: ResultTable) -> Result<()> {
        if self.columns.is_empty() && self.rows.is_empty() {
            *self = other;
            return Ok(());
        }
        if self.columns != other.columns {
            return Err(ExperimentError::TableShape(format!(
                "cannot stack columns {:?} under {:?}",
                other.columns, self.columns
            )));
        }
        self.rows.extend(other.rows);
        Ok(())
    }

    /// Place `other` to the right of `self`, aligning rows by position.
    pub fn hstack(&mut self, other: ResultTable) -> Result<()> {
        if self.columns.is_empty() {
            *self = other;
            return Ok(());
        }
        if self.rows.len() != other.rows.len() {
            return Err(ExperimentError::TableShape(format!(
                "cannot align {} rows with {} rows",
                self.rows.len(),
                other.rows.len()
            )));
        }
        self.columns.extend(other.columns);
        for (row, extra) in self.rows.iter_mut().zip(other.rows) {
            row.extend(extra);
        }
        Ok(())
    }

    /// New table with the named columns, in the order given.
    pub fn select<S: AsRef<str>>(&self, names: &[S]) -> Result<ResultTable> {
        let indices = names
            .iter()
            .map(|n| self.index_of(n.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        Ok(ResultTable {
            columns: names.iter().map(|n| n.as_ref().to_string()).collect(),
            rows: self
                .rows
                .iter()
                .map(|r| indices.iter().map(|&i| r[i]).collect())
                .collect(),
        })
    }

    /// Rename columns through `f`; columns it maps to `None` keep their name.
    pub fn rename(&mut self, f: impl Fn(&str) -> Option<String>) {
        for c in &mut self.columns {
            if let Some(renamed) = f(c) {
                *c = renamed;
            }
        }
    }

    /// Prefix every column with `<scope>.`.
    pub fn qualify(&mut self, scope: &str) {
        self.rename(|c| Some(sedflow_dsl::lexical::scoped(scope, c)));
    }

    pub fn write_csv<W: Write>(&self, writer: W) -> Result<()> {
        let mut out = csv::Writer::from_writer(writer);
        out.write_record(&self.columns)?;
        for row in &self.rows {
            out.write_record(row.iter().map(|v| v.to_string()))?;
        }
        out.flush()?;
        Ok(())
    }

    pub fn write_csv_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let file = std::fs::File::create(path)?;
        self.write_csv(std::io::BufWriter::new(file))
    }
}

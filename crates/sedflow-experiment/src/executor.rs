//! Execution orchestrator.
//!
//! Runs tasks and repeated tasks against a [`SimulationBackend`] and shapes
//! the raw runs into one [`ResultTable`]. Everything is sequential: sweep rows
//! run in table order, and with `reset=false` a row starts from the state the
//! previous row left behind.

use crate::backend::SimulationBackend;
use crate::error::{ExperimentError, Result};
use crate::model::{Model, ModelSource};
use crate::registry::{EntityKind, EntityRegistry};
use crate::simulation::SimulationKind;
use crate::table::ResultTable;
use crate::variables::{check_homogeneous, VariableCollection};
use indexmap::IndexMap;
use sedflow_dsl::lexical::split_scope;
use serde::Serialize;

/// Tasks and repeated tasks a set of variable references depends on, in order
/// of first appearance.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScopeResult {
    pub task_ids: Vec<String>,
    pub repeated_task_ids: Vec<String>,
    /// Whether the references were scope-qualified.
    pub scoped: bool,
}

/// Data handed to a [`Renderer`]. Columns are already relabelled, x first.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlotFrame {
    pub plot_id: String,
    pub title: Option<String>,
    pub x_label: String,
    pub y_labels: Vec<String>,
    pub table: ResultTable,
}

pub trait Renderer {
    fn render(&mut self, frame: &PlotFrame) -> std::result::Result<(), String>;
}

/// Outcome of [`Executor::execute`].
#[derive(Debug, Clone, PartialEq)]
pub struct Execution {
    pub report_id: Option<String>,
    pub table: ResultTable,
    pub warnings: Vec<String>,
}

/// Upper bound on `model = model <prior>` chains.
const MAX_MODEL_CHAIN: usize = 64;

/// The model holding the definition behind `model`, and the parameter values
/// accumulated along its prior-model chain (outermost wins).
pub(crate) fn backing_model<'r>(
    registry: &'r EntityRegistry,
    model: &'r Model,
) -> Result<(&'r Model, IndexMap<String, f64>)> {
    let mut chain = vec![model];
    let mut current = model;
    while let ModelSource::Prior(prior) = &current.source {
        let unknown = || ExperimentError::UnknownEntity {
            kind: EntityKind::Model,
            id: prior.clone(),
        };
        if chain.len() > MAX_MODEL_CHAIN {
            return Err(unknown());
        }
        current = registry.model(prior).ok_or_else(unknown)?;
        chain.push(current);
    }
    let mut parameters = IndexMap::new();
    for m in chain.iter().rev() {
        for (k, v) in &m.parameters {
            parameters.insert(k.clone(), *v);
        }
    }
    Ok((current, parameters))
}

/// `hstack` that names the offending scopes when row counts disagree.
fn stack_scope<'s>(
    combined: &mut ResultTable,
    first: &mut Option<&'s str>,
    scope: &'s str,
    table: ResultTable,
) -> Result<()> {
    match *first {
        Some(first) if combined.num_rows() != table.num_rows() => {
            Err(ExperimentError::TableShape(format!(
                "scope `{first}` produced {} rows but scope `{scope}` produced {}; \
                 scopes with different row counts cannot share a plot or report",
                combined.num_rows(),
                table.num_rows()
            )))
        }
        Some(_) => combined.hstack(table),
        None => {
            *first = Some(scope);
            combined.hstack(table)
        }
    }
}

pub struct Executor<'a, B: SimulationBackend + ?Sized> {
    registry: &'a EntityRegistry,
    variables: &'a VariableCollection,
    backend: &'a mut B,
    labels: IndexMap<String, String>,
}

impl<'a, B: SimulationBackend + ?Sized> Executor<'a, B> {
    pub fn new(
        registry: &'a EntityRegistry,
        variables: &'a VariableCollection,
        backend: &'a mut B,
    ) -> Self {
        Self {
            registry,
            variables,
            backend,
            labels: IndexMap::new(),
        }
    }

    /// Column name to display label, applied to plot frames.
    pub fn with_labels(mut self, labels: IndexMap<String, String>) -> Self {
        self.labels = labels;
        self
    }

    // ------------------------------------------------------------------------
    // Tasks
    // ------------------------------------------------------------------------

    /// Run one task from reset state. `overrides` win over the model's own
    /// parameter values.
    pub fn run_task(&mut self, task_id: &str, overrides: &[(&str, f64)]) -> Result<ResultTable> {
        self.run_task_with(task_id, overrides, true)
    }

    fn run_task_with(
        &mut self,
        task_id: &str,
        overrides: &[(&str, f64)],
        reset: bool,
    ) -> Result<ResultTable> {
        let registry = self.registry;
        let task = registry
            .task(task_id)
            .ok_or_else(|| ExperimentError::UnknownTask(task_id.to_string()))?;
        let model = registry
            .model(&task.model_id)
            .ok_or_else(|| ExperimentError::UnknownEntity {
                kind: EntityKind::Model,
                id: task.model_id.clone(),
            })?;
        let sim = registry.simulation(&task.simulation_id).ok_or_else(|| {
            ExperimentError::UnknownEntity {
                kind: EntityKind::Simulation,
                id: task.simulation_id.clone(),
            }
        })?;
        let (backing, parameters) = backing_model(registry, model)?;

        if reset {
            self.backend.reset(backing)?;
        }
        let assignments = parameters
            .iter()
            .map(|(k, v)| (k.as_str(), *v))
            .chain(overrides.iter().copied());
        for (name, value) in assignments {
            if !self.backend.has_quantity(backing, name)? {
                return Err(ExperimentError::UnknownParameter {
                    model_id: model.id.clone(),
                    name: name.to_string(),
                });
            }
            self.backend.set_value(backing, name, value)?;
        }
        if let Some(algorithm) = &sim.algorithm {
            self.backend.set_algorithm(backing, algorithm, &sim.options)?;
        }

        let selections = self.variables.display_variables()?;
        let table = match sim.kind {
            SimulationKind::Uniform | SimulationKind::UniformStochastic => self.backend.simulate(
                backing,
                sim.start,
                sim.end,
                sim.num_point(),
                &selections,
            )?,
            SimulationKind::OneStep => self.backend.simulate(
                backing,
                sim.start,
                sim.start + sim.time_interval,
                2,
                &selections,
            )?,
            SimulationKind::SteadyState => self.backend.steady_state(backing, &selections)?,
        };
        tracing::debug!(
            task = %task_id,
            model = %model.id,
            simulation = %sim.id,
            rows = table.num_rows(),
            "task run"
        );
        Ok(table)
    }

    /// Run the subtask once per sweep row and stack the runs, each with the
    /// row's parameter values appended as constant columns.
    pub fn run_repeated_task(&mut self, repeated_task_id: &str) -> Result<ResultTable> {
        let registry = self.registry;
        let repeated = registry.repeated_task(repeated_task_id).ok_or_else(|| {
            ExperimentError::UnknownEntity {
                kind: EntityKind::RepeatedTask,
                id: repeated_task_id.to_string(),
            }
        })?;
        let subtask = registry
            .task(&repeated.subtask_id)
            .ok_or_else(|| ExperimentError::UnknownTask(repeated.subtask_id.clone()))?;
        let steady = registry
            .simulation(&subtask.simulation_id)
            .is_some_and(|sim| sim.kind == SimulationKind::SteadyState);
        if steady {
            return Err(ExperimentError::UnsupportedScan {
                repeated_task_id: repeated_task_id.to_string(),
            });
        }

        let mut stacked = ResultTable::default();
        for (i, row) in repeated.parameters.rows().enumerate() {
            let reset = repeated.reset || i == 0;
            let mut run = self.run_task_with(&repeated.subtask_id, &row, reset)?;
            for (name, value) in &row {
                run.append_constant_column(*name, *value);
            }
            stacked.vstack(run)?;
        }
        tracing::debug!(
            repeated_task = %repeated_task_id,
            sweep_rows = repeated.parameters.num_rows(),
            rows = stacked.num_rows(),
            "repeated task run"
        );
        Ok(stacked)
    }

    // ------------------------------------------------------------------------
    // Scopes
    // ------------------------------------------------------------------------

    /// Find what must run to produce `references`. Unscoped references depend
    /// on every task.
    pub fn resolve_scope<S: AsRef<str>>(&self, references: &[S]) -> Result<ScopeResult> {
        let scoped = check_homogeneous(references)?;
        let mut result = ScopeResult {
            scoped,
            ..Default::default()
        };
        if !scoped {
            result.task_ids = self
                .registry
                .ids(EntityKind::Task)
                .into_iter()
                .map(str::to_string)
                .collect();
            return Ok(result);
        }
        for reference in references {
            let Some((scope, _)) = split_scope(reference.as_ref()) else {
                continue;
            };
            let scope = scope.to_string();
            if self.registry.task(&scope).is_some() {
                if !result.task_ids.contains(&scope) {
                    result.task_ids.push(scope);
                }
            } else if self.registry.repeated_task(&scope).is_some() {
                if !result.repeated_task_ids.contains(&scope) {
                    result.repeated_task_ids.push(scope);
                }
            } else {
                return Err(ExperimentError::UnresolvableScope(scope));
            }
        }
        Ok(result)
    }

    /// Run every scope and align the results side by side.
    fn run_scopes(&mut self, scopes: &ScopeResult) -> Result<ResultTable> {
        let mut combined = ResultTable::default();
        let mut first: Option<&str> = None;
        for task_id in &scopes.task_ids {
            let mut table = self.run_task(task_id, &[])?;
            if scopes.scoped {
                table.qualify(task_id);
            }
            stack_scope(&mut combined, &mut first, task_id, table)?;
        }
        for repeated_id in &scopes.repeated_task_ids {
            let mut table = self.run_repeated_task(repeated_id)?;
            table.qualify(repeated_id);
            stack_scope(&mut combined, &mut first, repeated_id, table)?;
        }
        Ok(combined)
    }

    /// Run what `references` depend on and select them, in order.
    ///
    /// Scope results are placed side by side, so every scope involved must
    /// produce the same number of rows. A repeated task yields one run per
    /// sweep row, which usually differs from a plain task; mixing the two in
    /// one plot or report fails with `TableShape` naming both scopes.
    pub fn collect<S: AsRef<str>>(&mut self, references: &[S]) -> Result<ResultTable> {
        let scopes = self.resolve_scope(references)?;
        self.run_scopes(&scopes)?.select(references)
    }

    fn label(&self, column: &str) -> String {
        self.labels
            .get(column)
            .cloned()
            .unwrap_or_else(|| column.to_string())
    }

    // ------------------------------------------------------------------------
    // Outputs
    // ------------------------------------------------------------------------

    /// Build the frame for a 2D plot and hand it to `renderer`.
    pub fn render_plot(&mut self, plot_id: &str, renderer: &mut dyn Renderer) -> Result<PlotFrame> {
        let registry = self.registry;
        let plot = registry
            .plot(plot_id)
            .ok_or_else(|| ExperimentError::UnknownEntity {
                kind: EntityKind::Plot,
                id: plot_id.to_string(),
            })?;
        if plot.z.is_some() {
            return Err(ExperimentError::UnsupportedPlotKind {
                plot_id: plot_id.to_string(),
            });
        }
        let mut table = self.collect(&plot.variables())?;
        table.rename(|c| self.labels.get(c).cloned());
        let frame = PlotFrame {
            plot_id: plot.id.clone(),
            title: plot.title.clone(),
            x_label: self.label(&plot.x),
            y_labels: plot.y.iter().map(|y| self.label(y)).collect(),
            table,
        };
        renderer.render(&frame).map_err(ExperimentError::Renderer)?;
        Ok(frame)
    }

    /// A report's columns, named by its variable references.
    pub fn run_report(&mut self, report_id: &str) -> Result<ResultTable> {
        let registry = self.registry;
        let report = registry
            .report(report_id)
            .ok_or_else(|| ExperimentError::UnknownEntity {
                kind: EntityKind::Report,
                id: report_id.to_string(),
            })?;
        self.collect(&report.variables)
    }

    /// Run the last registered report.
    pub fn execute(&mut self) -> Result<Execution> {
        let registry = self.registry;
        let mut warnings = Vec::new();
        let report_ids = registry.ids(EntityKind::Report);
        if report_ids.len() > 1 {
            warnings.push(format!(
                "{} reports are registered; only the last one is returned",
                report_ids.len()
            ));
        }
        let repeated = registry.ids(EntityKind::RepeatedTask);
        if !repeated.is_empty() {
            warnings.push(format!(
                "repeated tasks ({}) stack one run per sweep row; time restarts at each row",
                repeated.join(", ")
            ));
        }
        for warning in &warnings {
            tracing::warn!(%warning, "execute");
        }

        let Some(last) = report_ids.last().map(|id| id.to_string()) else {
            warnings.push("no report is registered; nothing to execute".to_string());
            tracing::warn!("no report is registered; nothing to execute");
            return Ok(Execution {
                report_id: None,
                table: ResultTable::default(),
                warnings,
            });
        };
        let table = self.run_report(&last)?;
        Ok(Execution {
            report_id: Some(last),
            table,
            warnings,
        })
    }
}

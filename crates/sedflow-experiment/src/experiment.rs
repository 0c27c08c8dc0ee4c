//! The experiment facade.
//!
//! [`Experiment`] owns everything an experiment needs: the registry, the
//! scope resolver, the model loader and the directory model files live in.
//! Callers declare entities through `add_*`, then either compile a script or
//! execute against a backend.

use crate::archive::{self, ArchivePackager, StagedArchive};
use crate::backend::SimulationBackend;
use crate::compiler::{ScriptCompiler, ScriptConverter};
use crate::config::ExperimentConfig;
use crate::error::{ExperimentError, Result};
use crate::executor::{backing_model, Execution, Executor, PlotFrame, Renderer};
use crate::model::{LocalModelLoader, Model, ModelInformation, ModelLoader, ModelRefKind, ModelSpec};
use crate::output::{PlotSpec, Report};
use crate::registry::{EntityKind, EntityRegistry};
use crate::simulation::{Simulation, SimulationSpec};
use crate::table::ResultTable;
use crate::task::{ParameterTable, RepeatedTask, Task};
use crate::variables::{check_homogeneous, LabelStyle, VariableCollection};
use indexmap::IndexMap;
use sedflow_dsl::lexical::is_identifier;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

enum ProjectDir {
    /// Removed when the experiment is dropped.
    Temporary(TempDir),
    Given(PathBuf),
}

impl ProjectDir {
    fn path(&self) -> &Path {
        match self {
            ProjectDir::Temporary(dir) => dir.path(),
            ProjectDir::Given(path) => path,
        }
    }
}

pub struct Experiment {
    config: ExperimentConfig,
    registry: EntityRegistry,
    variables: VariableCollection,
    loader: Box<dyn ModelLoader>,
    project_dir: ProjectDir,
    information: IndexMap<String, ModelInformation>,
}

impl std::fmt::Debug for Experiment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Experiment")
            .field("config", &self.config)
            .field("registry", &self.registry)
            .field("project_dir", &self.project_dir.path())
            .finish_non_exhaustive()
    }
}

impl Experiment {
    pub fn new(config: ExperimentConfig) -> Result<Self> {
        let project_dir = match &config.project_dir {
            Some(path) => {
                std::fs::create_dir_all(path)?;
                ProjectDir::Given(path.clone())
            }
            None => ProjectDir::Temporary(tempfile::Builder::new().prefix("sedflow-").tempdir()?),
        };
        let variables =
            VariableCollection::new(config.display_variables.clone(), config.include_time);
        Ok(Self {
            config,
            registry: EntityRegistry::new(),
            variables,
            loader: Box::new(LocalModelLoader),
            project_dir,
            information: IndexMap::new(),
        })
    }

    pub fn with_loader(mut self, loader: impl ModelLoader + 'static) -> Self {
        self.loader = Box::new(loader);
        self
    }

    pub fn config(&self) -> &ExperimentConfig {
        &self.config
    }

    pub fn project_id(&self) -> &str {
        &self.config.project_id
    }

    pub fn project_dir(&self) -> &Path {
        self.project_dir.path()
    }

    pub fn registry(&self) -> &EntityRegistry {
        &self.registry
    }

    pub fn variables(&self) -> &VariableCollection {
        &self.variables
    }

    /// Switch how qualified names are labelled in plots and final scripts.
    pub fn set_label_style(&mut self, style: LabelStyle) {
        self.config.label_style = style;
    }

    // ------------------------------------------------------------------------
    // Declarations
    // ------------------------------------------------------------------------

    /// Resolve, persist and register a model.
    ///
    /// Without an explicit id, file references take the file stem when it is
    /// an identifier. Everything else takes `model<N>`.
    pub fn add_model(&mut self, spec: ModelSpec) -> Result<String> {
        let known = self.registry.model_ids();
        let kind = match spec.kind {
            Some(kind) => kind,
            None => ModelRefKind::infer(&spec.reference, &known)?,
        };
        let id = match &spec.id {
            Some(id) => id.clone(),
            None if kind.is_file() => Model::id_from_file(&spec.reference)
                .filter(|stem| is_identifier(stem))
                .unwrap_or_else(|| self.registry.next_model_id()),
            None => self.registry.next_model_id(),
        };
        // Checked before materializing so a rejected model writes no file.
        if !is_identifier(&id) {
            return Err(ExperimentError::InvalidIdentifier {
                kind: EntityKind::Model,
                id,
            });
        }
        if known.contains(&id) {
            return Err(ExperimentError::DuplicateIdentifier {
                kind: EntityKind::Model,
                id,
            });
        }
        let model = Model::materialize(
            id,
            &spec,
            kind,
            self.loader.as_ref(),
            self.project_dir.path(),
            self.config.overwrite_models,
        )?;
        tracing::debug!(model = %model.id, kind = ?kind, "model registered");
        self.registry.add_model(model)
    }

    pub fn add_simulation(&mut self, id: impl Into<String>, spec: SimulationSpec) -> Result<String> {
        let simulation = Simulation::new(id, spec)?;
        self.registry.add_simulation(simulation)
    }

    /// Register a task; its id becomes a scope.
    pub fn add_task(
        &mut self,
        id: impl Into<String>,
        model_id: impl Into<String>,
        simulation_id: impl Into<String>,
    ) -> Result<String> {
        let id = self.registry.add_task(Task::new(id, model_id, simulation_id))?;
        self.variables.register_scope(id.clone());
        Ok(id)
    }

    /// Register a repeated task; its id becomes a scope and its columns scan
    /// parameters.
    pub fn add_repeated_task(
        &mut self,
        id: impl Into<String>,
        subtask_id: impl Into<String>,
        parameters: ParameterTable,
        reset: bool,
    ) -> Result<String> {
        let names: Vec<String> = parameters.parameter_names().map(str::to_string).collect();
        let repeated = RepeatedTask::new(id, subtask_id, parameters, reset);
        let id = self.registry.add_repeated_task(repeated)?;
        self.variables.add_scan_parameters(names);
        self.variables.register_scope(id.clone());
        Ok(id)
    }

    /// Add a report. An id that is already taken fails with
    /// `DuplicateIdentifier`; use [`Experiment::extend_report`] to append.
    pub fn add_report(
        &mut self,
        id: Option<&str>,
        variables: Vec<String>,
        title: Option<String>,
    ) -> Result<String> {
        check_homogeneous(&variables)?;
        let id = match id {
            Some(id) => id.to_string(),
            None => self.registry.next_report_id(),
        };
        let mut report = Report::new(id, variables);
        report.title = title;
        self.registry.add_report(report)
    }

    /// Append variables to the report `id`. A new title replaces the old one.
    pub fn extend_report(
        &mut self,
        id: &str,
        variables: Vec<String>,
        title: Option<String>,
    ) -> Result<()> {
        self.registry.extend_report(id, variables, title)
    }

    pub fn add_plot(&mut self, spec: PlotSpec) -> Result<String> {
        let id = match &spec.id {
            Some(id) => id.clone(),
            None => self.registry.next_plot_id(),
        };
        let plot = spec.into_plot(id);
        check_homogeneous(&plot.variables())?;
        self.registry.add_plot(plot)
    }

    // ------------------------------------------------------------------------
    // Model information
    // ------------------------------------------------------------------------

    /// Ask the backend about every model and default the display variables
    /// to the first model's floating species.
    pub fn describe_models<B: SimulationBackend + ?Sized>(&mut self, backend: &mut B) -> Result<()> {
        for model in self.registry.models() {
            let (backing, _) = backing_model(&self.registry, model)?;
            let info = backend.information(backing)?;
            self.information.insert(model.id.clone(), info);
        }
        if let Some(first) = self.information.values().next() {
            self.variables.resolve_defaults(first);
        }
        Ok(())
    }

    pub fn model_information(&self, model_id: &str) -> Option<&ModelInformation> {
        self.information.get(model_id)
    }

    /// Column name to label, for both scoped and unscoped names.
    pub fn display_labels(&self) -> Result<IndexMap<String, String>> {
        let mut labels = IndexMap::new();
        if let Some(first) = self.information.values().next() {
            labels.extend(self.variables.display_name_map(first)?);
        }
        if !self.variables.scopes().is_empty() {
            labels.extend(self.variables.qualified_display_names(
                &self.registry,
                &self.information,
                self.config.label_style,
            )?);
        }
        Ok(labels)
    }

    // ------------------------------------------------------------------------
    // Compilation
    // ------------------------------------------------------------------------

    fn compiler(&self) -> ScriptCompiler {
        ScriptCompiler::new().basename_sources(self.config.basename_sources)
    }

    pub fn script(&self) -> Result<String> {
        self.compiler().compile(&self.registry)
    }

    pub fn final_script(&self, converter: &dyn ScriptConverter) -> Result<String> {
        let labels = if self.variables.is_resolved() {
            self.display_labels()?
        } else {
            IndexMap::new()
        };
        self.compiler()
            .compile_final(&self.registry, converter, &labels)
    }

    // ------------------------------------------------------------------------
    // Execution
    // ------------------------------------------------------------------------

    pub fn executor<'a, B: SimulationBackend + ?Sized>(
        &'a self,
        backend: &'a mut B,
    ) -> Result<Executor<'a, B>> {
        Ok(Executor::new(&self.registry, &self.variables, backend).with_labels(self.display_labels()?))
    }

    pub fn execute<B: SimulationBackend + ?Sized>(&self, backend: &mut B) -> Result<Execution> {
        self.executor(backend)?.execute()
    }

    pub fn run_report<B: SimulationBackend + ?Sized>(
        &self,
        backend: &mut B,
        report_id: &str,
    ) -> Result<ResultTable> {
        self.executor(backend)?.run_report(report_id)
    }

    pub fn render_plot<B: SimulationBackend + ?Sized>(
        &self,
        backend: &mut B,
        plot_id: &str,
        renderer: &mut dyn Renderer,
    ) -> Result<PlotFrame> {
        self.executor(backend)?.render_plot(plot_id, renderer)
    }

    /// Render every plot, in registration order.
    pub fn render_plots<B: SimulationBackend + ?Sized>(
        &self,
        backend: &mut B,
        renderer: &mut dyn Renderer,
    ) -> Result<Vec<PlotFrame>> {
        let mut executor = self.executor(backend)?;
        self.registry
            .ids(EntityKind::Plot)
            .into_iter()
            .map(|id| executor.render_plot(id, renderer))
            .collect()
    }

    // ------------------------------------------------------------------------
    // Archives and cleanup
    // ------------------------------------------------------------------------

    pub fn stage_archive(&self, dir: impl AsRef<Path>) -> Result<StagedArchive> {
        archive::stage_archive(&self.registry, dir.as_ref(), &self.config.project_id)
    }

    /// Stage into the project directory and package it.
    pub fn make_archive(&self, packager: &dyn ArchivePackager) -> Result<PathBuf> {
        archive::make_archive(
            &self.registry,
            self.project_dir.path(),
            &self.config.project_id,
            packager,
        )
    }

    /// Delete every model file this experiment wrote. Idempotent.
    pub fn cleanup(&mut self) -> Result<()> {
        for model in self.registry.models() {
            model.cleanup()?;
        }
        Ok(())
    }
}

impl Drop for Experiment {
    fn drop(&mut self) {
        if let Err(err) = self.cleanup() {
            tracing::warn!(error = %err, "failed to remove model files");
        }
    }
}

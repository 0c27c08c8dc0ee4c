//! Ready-made experiments.
//!
//! Each template declares a complete experiment (models, simulation, tasks, a
//! report and plots) from a handful of inputs. Templates describe their
//! models through the backend while building, so that default display
//! variables are known before reports and plots are declared.

use crate::backend::SimulationBackend;
use crate::config::ExperimentConfig;
use crate::error::{ExperimentError, Result};
use crate::experiment::Experiment;
use crate::model::ModelSpec;
use crate::output::PlotSpec;
use crate::registry::EntityRegistry;
use crate::simulation::{SimulationKind, SimulationSpec, DEFAULT_TIME_INTERVAL};
use crate::task::ParameterTable;
use crate::variables::{LabelStyle, TIME};

pub const MULTI_MODEL_SIMULATION_ID: &str = "mmtc_sim1";
pub const MULTI_MODEL_REPORT_ID: &str = "mmtc_report1";
pub const MULTI_MODEL_PLOT_PREFIX: &str = "mmtc_plot1";
pub const TIME_COURSE_TASK_PREFIX: &str = "t";
pub const SCAN_TASK_PREFIX: &str = "task_";
pub const SCAN_REPEATED_TASK_PREFIX: &str = "rtask_";

fn check_scan_kind(id: &str, spec: &SimulationSpec) -> Result<()> {
    match spec.kind {
        SimulationKind::OneStep | SimulationKind::SteadyState => Ok(()),
        other => Err(ExperimentError::InvalidSimulation {
            id: id.to_string(),
            message: format!("parameter scans run onestep or steadystate simulations, not {other:?}"),
        }),
    }
}

// ============================================================================
// Single model time course
// ============================================================================

/// One model, one uniform simulation, one report, one plot of time against
/// every other display variable.
#[derive(Debug, Clone)]
pub struct SingleModelTimeCourse {
    pub model: ModelSpec,
    pub simulation: SimulationSpec,
    pub title: Option<String>,
    pub plot: bool,
}

impl SingleModelTimeCourse {
    pub fn new(model: ModelSpec) -> Self {
        Self {
            model,
            simulation: SimulationSpec::default(),
            title: None,
            plot: true,
        }
    }

    pub fn with_simulation(mut self, simulation: SimulationSpec) -> Self {
        self.simulation = simulation;
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn without_plot(mut self) -> Self {
        self.plot = false;
        self
    }

    pub fn build<B: SimulationBackend + ?Sized>(
        self,
        config: ExperimentConfig,
        backend: &mut B,
    ) -> Result<Experiment> {
        let project = config.project_id.clone();
        let mut exp = Experiment::new(config)?;

        let model_id = exp.add_model(self.model.with_id(format!("{project}_model")))?;
        exp.describe_models(backend)?;
        let sim_id = exp.add_simulation(format!("{project}_sim"), self.simulation)?;
        exp.add_task(format!("{project}_task"), model_id, sim_id)?;

        let variables = exp.variables().display_variables()?;
        exp.add_report(None, variables.clone(), self.title.clone())?;
        if let Some((x, ys)) = variables.split_first().filter(|(_, ys)| self.plot && !ys.is_empty()) {
            let mut plot = PlotSpec::new(x.clone(), ys.to_vec());
            plot.title = self.title;
            exp.add_plot(plot)?;
        }
        Ok(exp)
    }
}

// ============================================================================
// Multiple model time course
// ============================================================================

/// Several models run under one shared simulation. The report carries one
/// scoped column per model and variable plus a single shared time column;
/// each display variable gets a plot with one line per model.
#[derive(Debug, Clone)]
pub struct MultipleModelTimeCourse {
    pub models: Vec<ModelSpec>,
    pub simulation: SimulationSpec,
    pub plot: bool,
}

impl MultipleModelTimeCourse {
    pub fn new(models: Vec<ModelSpec>) -> Self {
        Self {
            models,
            simulation: SimulationSpec::default(),
            plot: true,
        }
    }

    pub fn with_simulation(mut self, simulation: SimulationSpec) -> Self {
        self.simulation = simulation;
        self
    }

    pub fn without_plot(mut self) -> Self {
        self.plot = false;
        self
    }

    pub fn build<B: SimulationBackend + ?Sized>(
        self,
        mut config: ExperimentConfig,
        backend: &mut B,
    ) -> Result<Experiment> {
        if self.models.is_empty() {
            return Err(ExperimentError::EmptyExperiment("no models were given".to_string()));
        }
        config.label_style = LabelStyle::Model;
        let mut exp = Experiment::new(config)?;

        let mut model_ids = Vec::with_capacity(self.models.len());
        for spec in self.models {
            model_ids.push(exp.add_model(spec)?);
        }
        exp.describe_models(backend)?;
        let sim_id = exp.add_simulation(MULTI_MODEL_SIMULATION_ID, self.simulation)?;

        let mut task_ids = Vec::with_capacity(model_ids.len());
        for model_id in &model_ids {
            let task_id = EntityRegistry::scoped_task_id(TIME_COURSE_TASK_PREFIX, model_id);
            task_ids.push(exp.add_task(task_id, model_id.as_str(), sim_id.as_str())?);
        }

        let scoped_time = exp.variables().scoped_time(&task_ids);
        let mut report = vec![scoped_time.clone()];
        report.extend(exp.variables().scoped_variables(&task_ids, false, true, true)?.flat);
        exp.add_report(Some(MULTI_MODEL_REPORT_ID), report, None)?;

        if self.plot {
            for variable in exp.variables().display_variables()? {
                if variable == TIME {
                    continue;
                }
                let ys: Vec<String> = task_ids.iter().map(|t| format!("{t}.{variable}")).collect();
                exp.add_plot(
                    PlotSpec::new(scoped_time.clone(), ys)
                        .with_id(format!("{MULTI_MODEL_PLOT_PREFIX}_{variable}"))
                        .with_title(variable.clone()),
                )?;
            }
        }
        Ok(exp)
    }
}

// ============================================================================
// Single model parameter scan
// ============================================================================

/// Sweeps one model over a parameter table. The first scan parameter goes on
/// the x axis.
#[derive(Debug, Clone)]
pub struct SingleModelParameterScan {
    pub model: ModelSpec,
    pub scan: ParameterTable,
    /// Onestep or steadystate. Executing a steady-state scan fails with
    /// `UnsupportedScan`; a onestep simulation with a long interval is the
    /// usual substitute.
    pub simulation: SimulationSpec,
    pub title: Option<String>,
    pub plot: bool,
}

impl SingleModelParameterScan {
    pub fn new(model: ModelSpec, scan: ParameterTable) -> Self {
        Self {
            model,
            scan,
            simulation: SimulationSpec::one_step(DEFAULT_TIME_INTERVAL),
            title: None,
            plot: true,
        }
    }

    pub fn with_simulation(mut self, simulation: SimulationSpec) -> Self {
        self.simulation = simulation;
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn without_plot(mut self) -> Self {
        self.plot = false;
        self
    }

    pub fn build<B: SimulationBackend + ?Sized>(
        self,
        mut config: ExperimentConfig,
        backend: &mut B,
    ) -> Result<Experiment> {
        let project = config.project_id.clone();
        let sim_id = format!("s_{project}");
        check_scan_kind(&sim_id, &self.simulation)?;
        config.include_time = false;
        let mut exp = Experiment::new(config)?;

        let model_id = exp.add_model(self.model.with_id(format!("m_{project}")))?;
        exp.describe_models(backend)?;
        exp.add_simulation(sim_id.as_str(), self.simulation)?;
        let subtask_id = exp.add_task(format!("st_{project}"), model_id.as_str(), sim_id.as_str())?;
        let rt_id = exp.add_repeated_task(format!("rt_{project}"), subtask_id, self.scan, true)?;

        let scope = [rt_id];
        let title = self
            .title
            .unwrap_or_else(|| format!("Parameter scan for {model_id}"));
        let report = exp.variables().scoped_variables(&scope, false, true, true)?.flat;
        exp.add_report(Some(format!("r_{project}").as_str()), report, Some(title.clone()))?;

        if self.plot {
            let parameters = exp.variables().scoped_variables(&scope, false, true, false)?.flat;
            if parameters.len() > 1 {
                tracing::warn!(
                    x = %parameters[0],
                    count = parameters.len(),
                    "only one scan parameter can go on the x axis; plotting the first"
                );
            }
            let ys = exp.variables().scoped_variables(&scope, false, false, true)?.flat;
            if let Some(x) = parameters.into_iter().next() {
                exp.add_plot(
                    PlotSpec::new(x, ys)
                        .with_id(format!("p_{project}"))
                        .with_title(title),
                )?;
            }
        }
        Ok(exp)
    }
}

// ============================================================================
// Multiple model parameter scan
// ============================================================================

/// Sweeps several models over the same parameter table, one repeated task per
/// model, with one plot per display variable comparing the models.
#[derive(Debug, Clone)]
pub struct MultipleModelParameterScan {
    pub models: Vec<ModelSpec>,
    pub scan: ParameterTable,
    pub simulation: SimulationSpec,
    pub plot: bool,
}

impl MultipleModelParameterScan {
    pub fn new(models: Vec<ModelSpec>, scan: ParameterTable) -> Self {
        Self {
            models,
            scan,
            simulation: SimulationSpec::one_step(DEFAULT_TIME_INTERVAL),
            plot: true,
        }
    }

    pub fn with_simulation(mut self, simulation: SimulationSpec) -> Self {
        self.simulation = simulation;
        self
    }

    pub fn without_plot(mut self) -> Self {
        self.plot = false;
        self
    }

    pub fn build<B: SimulationBackend + ?Sized>(
        self,
        mut config: ExperimentConfig,
        backend: &mut B,
    ) -> Result<Experiment> {
        if self.models.is_empty() {
            return Err(ExperimentError::EmptyExperiment("no models were given".to_string()));
        }
        check_scan_kind(MULTI_MODEL_SIMULATION_ID, &self.simulation)?;
        config.include_time = false;
        config.label_style = LabelStyle::Model;
        let mut exp = Experiment::new(config)?;

        let mut model_ids = Vec::with_capacity(self.models.len());
        for spec in self.models {
            model_ids.push(exp.add_model(spec)?);
        }
        exp.describe_models(backend)?;
        let sim_id = exp.add_simulation(MULTI_MODEL_SIMULATION_ID, self.simulation)?;

        let mut repeated_ids = Vec::with_capacity(model_ids.len());
        for model_id in &model_ids {
            let task_id = exp.add_task(
                EntityRegistry::scoped_task_id(SCAN_TASK_PREFIX, model_id),
                model_id.as_str(),
                sim_id.as_str(),
            )?;
            repeated_ids.push(exp.add_repeated_task(
                EntityRegistry::scoped_task_id(SCAN_REPEATED_TASK_PREFIX, model_id),
                task_id,
                self.scan.clone(),
                true,
            )?);
        }

        let report = exp
            .variables()
            .scoped_variables(&repeated_ids, false, true, true)?
            .flat;
        exp.add_report(Some(MULTI_MODEL_REPORT_ID), report, None)?;

        if self.plot {
            let x = exp
                .variables()
                .scoped_variables(&repeated_ids[..1], false, true, false)?
                .flat
                .into_iter()
                .next();
            if let Some(x) = x {
                for variable in exp.variables().display_variables()? {
                    let ys: Vec<String> = repeated_ids
                        .iter()
                        .map(|rt| format!("{rt}.{variable}"))
                        .collect();
                    exp.add_plot(
                        PlotSpec::new(x.clone(), ys)
                            .with_id(format!("{MULTI_MODEL_PLOT_PREFIX}_{variable}"))
                            .with_title(variable.clone()),
                    )?;
                }
            }
        }
        Ok(exp)
    }
}

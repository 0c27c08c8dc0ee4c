//! JSON experiment documents.
//!
//! A document declares a whole experiment in one file:
//!
//! ```json
//! {
//!   "config": { "project_id": "decay" },
//!   "models": [{ "id": "m1", "reference": "decay.ant" }],
//!   "simulations": [{ "id": "sim1", "spec": { "kind": "uniform", "start": 0, "end": 50 } }],
//!   "tasks": [{ "id": "task1", "model": "m1", "simulation": "sim1" }],
//!   "reports": [{ "variables": ["task1.time", "task1.S1"] }]
//! }
//! ```
//!
//! Entities are registered in document order within each section, models
//! first and plots last.

use anyhow::{Context, Result};
use sedflow_experiment::{
    Experiment, ExperimentConfig, ModelSpec, ParameterTable, PlotSpec, SimulationSpec,
};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ExperimentDocument {
    pub config: ExperimentConfig,
    pub models: Vec<ModelSpec>,
    pub simulations: Vec<SimulationEntry>,
    pub tasks: Vec<TaskEntry>,
    pub repeated_tasks: Vec<RepeatedTaskEntry>,
    pub reports: Vec<ReportEntry>,
    pub plots: Vec<PlotSpec>,
}

#[derive(Debug, Deserialize)]
pub struct SimulationEntry {
    pub id: String,
    #[serde(default)]
    pub spec: SimulationSpec,
}

#[derive(Debug, Deserialize)]
pub struct TaskEntry {
    pub id: String,
    pub model: String,
    pub simulation: String,
}

#[derive(Debug, Deserialize)]
pub struct RepeatedTaskEntry {
    pub id: String,
    pub task: String,
    pub parameters: ParameterTable,
    #[serde(default = "default_reset")]
    pub reset: bool,
}

fn default_reset() -> bool {
    true
}

#[derive(Debug, Deserialize)]
pub struct ReportEntry {
    #[serde(default)]
    pub id: Option<String>,
    pub variables: Vec<String>,
    #[serde(default)]
    pub title: Option<String>,
}

impl ExperimentDocument {
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("failed to parse experiment document {}", path.display()))
    }

    /// Register every entity. The first failing declaration aborts the build.
    pub fn build(self) -> Result<Experiment> {
        let mut exp = Experiment::new(self.config)?;
        for model in self.models {
            let reference = model.reference.clone();
            exp.add_model(model)
                .with_context(|| format!("model `{reference}`"))?;
        }
        for sim in self.simulations {
            exp.add_simulation(sim.id.as_str(), sim.spec)
                .with_context(|| format!("simulation `{}`", sim.id))?;
        }
        for task in self.tasks {
            exp.add_task(task.id.as_str(), task.model, task.simulation)
                .with_context(|| format!("task `{}`", task.id))?;
        }
        for rt in self.repeated_tasks {
            exp.add_repeated_task(rt.id.as_str(), rt.task, rt.parameters, rt.reset)
                .with_context(|| format!("repeated task `{}`", rt.id))?;
        }
        for report in self.reports {
            exp.add_report(report.id.as_deref(), report.variables, report.title)?;
        }
        for plot in self.plots {
            exp.add_plot(plot)?;
        }
        Ok(exp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = r#"{
        "config": { "project_id": "decay", "basename_sources": true },
        "models": [{ "id": "m1", "reference": "S1 -> S2; k1*S1\nk1 = 0.4", "parameters": { "k1": 0.2 } }],
        "simulations": [{ "id": "sim1", "spec": { "start": 0, "end": 50, "num_point": 11 } }],
        "tasks": [{ "id": "task1", "model": "m1", "simulation": "sim1" }],
        "repeated_tasks": [{ "id": "rt1", "task": "task1", "parameters": { "k1": [0.1, 0.2] } }],
        "reports": [{ "variables": ["task1.time", "task1.S1"] }],
        "plots": [{ "title": "Decay", "x": "task1.time", "y": ["task1.S1"] }]
    }"#;

    #[test]
    fn builds_and_compiles_a_document() {
        let doc: ExperimentDocument = serde_json::from_str(DOC).unwrap();
        let exp = doc.build().unwrap();
        let script = exp.script().unwrap();
        assert_eq!(
            script,
            "m1 = model \"m1.ant\" with k1 = 0.2\n\
             sim1 = simulate uniform(0, 50, 10)\n\
             sim1.algorithm = CVODE\n\
             task1 = run sim1 on m1\n\
             rt1 = repeat task1 for k1 in [0.1, 0.2], reset=true\n\
             report task1.time, task1.S1\n\
             plot \"Decay\" task1.time vs task1.S1"
        );
    }

    #[test]
    fn failing_declaration_names_the_entity() {
        let doc: ExperimentDocument = serde_json::from_str(
            r#"{ "tasks": [{ "id": "task1", "model": "nope", "simulation": "sim1" }] }"#,
        )
        .unwrap();
        let err = doc.build().unwrap_err();
        assert!(format!("{err:#}").contains("task `task1`"));
    }

    #[test]
    fn reads_documents_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("exp.json");
        std::fs::write(&path, DOC).unwrap();
        let doc = ExperimentDocument::from_file(&path).unwrap();
        assert_eq!(doc.config.project_id, "decay");
        assert!(doc.repeated_tasks[0].reset);
    }
}

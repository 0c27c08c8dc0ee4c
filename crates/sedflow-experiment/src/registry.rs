//! Entity registry: one insertion-ordered map per entity kind.
//!
//! Registration is all-or-nothing. A failed `add_*` leaves every map as it
//! was, so a caller can fix the offending declaration and retry.

use crate::error::{ExperimentError, Result};
use crate::model::Model;
use crate::output::{Plot, Report};
use crate::simulation::Simulation;
use crate::task::{RepeatedTask, Task};
use crate::variables::check_homogeneous;
use indexmap::IndexMap;
use sedflow_dsl::lexical::is_identifier;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Model,
    Simulation,
    Task,
    RepeatedTask,
    Report,
    Plot,
}

impl EntityKind {
    pub const ALL: [EntityKind; 6] = [
        EntityKind::Model,
        EntityKind::Simulation,
        EntityKind::Task,
        EntityKind::RepeatedTask,
        EntityKind::Report,
        EntityKind::Plot,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            EntityKind::Model => "model",
            EntityKind::Simulation => "simulation",
            EntityKind::Task => "task",
            EntityKind::RepeatedTask => "repeated task",
            EntityKind::Report => "report",
            EntityKind::Plot => "plot",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A typed reference to a registered entity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityRef {
    pub kind: EntityKind,
    pub id: String,
}

impl EntityRef {
    pub fn new(kind: EntityKind, id: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.into(),
        }
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} `{}`", self.kind, self.id)
    }
}

#[derive(Debug, Clone, Default)]
pub struct EntityRegistry {
    models: IndexMap<String, Model>,
    simulations: IndexMap<String, Simulation>,
    tasks: IndexMap<String, Task>,
    repeated_tasks: IndexMap<String, RepeatedTask>,
    reports: IndexMap<String, Report>,
    plots: IndexMap<String, Plot>,
    report_counter: usize,
    plot_counter: usize,
}

fn insert_unique<T>(
    map: &mut IndexMap<String, T>,
    kind: EntityKind,
    id: String,
    value: T,
) -> Result<String> {
    if map.contains_key(&id) {
        return Err(ExperimentError::DuplicateIdentifier { kind, id });
    }
    map.insert(id.clone(), value);
    Ok(id)
}

/// Models, simulations and tasks are named in the script, so their ids must
/// be identifiers. Report and plot ids are counters and never appear there.
fn require_identifier(kind: EntityKind, id: &str) -> Result<()> {
    if is_identifier(id) {
        Ok(())
    } else {
        Err(ExperimentError::InvalidIdentifier {
            kind,
            id: id.to_string(),
        })
    }
}

impl EntityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    // ------------------------------------------------------------------------
    // Registration
    // ------------------------------------------------------------------------

    pub fn add_model(&mut self, model: Model) -> Result<String> {
        require_identifier(EntityKind::Model, &model.id)?;
        let id = model.id.clone();
        insert_unique(&mut self.models, EntityKind::Model, id, model)
    }

    pub fn add_simulation(&mut self, simulation: Simulation) -> Result<String> {
        require_identifier(EntityKind::Simulation, &simulation.id)?;
        let id = simulation.id.clone();
        insert_unique(&mut self.simulations, EntityKind::Simulation, id, simulation)
    }

    /// Fails with `UnknownEntity` if the task's model or simulation is absent.
    pub fn add_task(&mut self, task: Task) -> Result<String> {
        require_identifier(EntityKind::Task, &task.id)?;
        if self.tasks.contains_key(&task.id) {
            return Err(ExperimentError::DuplicateIdentifier {
                kind: EntityKind::Task,
                id: task.id,
            });
        }
        self.require(EntityKind::Model, &task.model_id)?;
        self.require(EntityKind::Simulation, &task.simulation_id)?;
        let id = task.id.clone();
        insert_unique(&mut self.tasks, EntityKind::Task, id, task)
    }

    /// Fails with `UnknownEntity` if the subtask is absent.
    pub fn add_repeated_task(&mut self, repeated: RepeatedTask) -> Result<String> {
        require_identifier(EntityKind::RepeatedTask, &repeated.id)?;
        if self.repeated_tasks.contains_key(&repeated.id) {
            return Err(ExperimentError::DuplicateIdentifier {
                kind: EntityKind::RepeatedTask,
                id: repeated.id,
            });
        }
        self.require(EntityKind::Task, &repeated.subtask_id)?;
        let id = repeated.id.clone();
        insert_unique(&mut self.repeated_tasks, EntityKind::RepeatedTask, id, repeated)
    }

    pub fn add_report(&mut self, report: Report) -> Result<String> {
        let id = report.id.clone();
        insert_unique(&mut self.reports, EntityKind::Report, id, report)
    }

    /// Append variables to an existing report, keeping its position. A new
    /// title replaces the old one. The combined variables must stay all
    /// scoped or all unscoped; on failure the report is unchanged.
    pub fn extend_report(
        &mut self,
        id: &str,
        variables: Vec<String>,
        title: Option<String>,
    ) -> Result<()> {
        let report = self
            .reports
            .get_mut(id)
            .ok_or_else(|| ExperimentError::UnknownEntity {
                kind: EntityKind::Report,
                id: id.to_string(),
            })?;
        let mut combined = report.variables.clone();
        combined.extend(variables);
        check_homogeneous(&combined)?;
        report.variables = combined;
        if title.is_some() {
            report.title = title;
        }
        Ok(())
    }

    pub fn add_plot(&mut self, plot: Plot) -> Result<String> {
        let id = plot.id.clone();
        insert_unique(&mut self.plots, EntityKind::Plot, id, plot)
    }

    fn require(&self, kind: EntityKind, id: &str) -> Result<()> {
        if self.contains(&EntityRef::new(kind, id)) {
            Ok(())
        } else {
            Err(ExperimentError::UnknownEntity {
                kind,
                id: id.to_string(),
            })
        }
    }

    // ------------------------------------------------------------------------
    // Id generation
    // ------------------------------------------------------------------------

    /// `model<N>` where N is the number of registered models.
    pub fn next_model_id(&self) -> String {
        format!("model{}", self.models.len())
    }

    /// Next free report counter id (`"0"`, `"1"`, ...).
    pub fn next_report_id(&mut self) -> String {
        next_counter_id(&mut self.report_counter, &self.reports)
    }

    /// Next free plot counter id (`"0"`, `"1"`, ...).
    pub fn next_plot_id(&mut self) -> String {
        next_counter_id(&mut self.plot_counter, &self.plots)
    }

    /// `<prefix><model_id>`, the id convention for per-model tasks.
    pub fn scoped_task_id(prefix: &str, model_id: &str) -> String {
        format!("{prefix}{model_id}")
    }

    // ------------------------------------------------------------------------
    // Lookup
    // ------------------------------------------------------------------------

    pub fn contains(&self, entity: &EntityRef) -> bool {
        let id = entity.id.as_str();
        match entity.kind {
            EntityKind::Model => self.models.contains_key(id),
            EntityKind::Simulation => self.simulations.contains_key(id),
            EntityKind::Task => self.tasks.contains_key(id),
            EntityKind::RepeatedTask => self.repeated_tasks.contains_key(id),
            EntityKind::Report => self.reports.contains_key(id),
            EntityKind::Plot => self.plots.contains_key(id),
        }
    }

    pub fn model(&self, id: &str) -> Option<&Model> {
        self.models.get(id)
    }

    pub fn simulation(&self, id: &str) -> Option<&Simulation> {
        self.simulations.get(id)
    }

    pub fn task(&self, id: &str) -> Option<&Task> {
        self.tasks.get(id)
    }

    pub fn repeated_task(&self, id: &str) -> Option<&RepeatedTask> {
        self.repeated_tasks.get(id)
    }

    pub fn report(&self, id: &str) -> Option<&Report> {
        self.reports.get(id)
    }

    pub fn plot(&self, id: &str) -> Option<&Plot> {
        self.plots.get(id)
    }

    pub fn models(&self) -> impl Iterator<Item = &Model> {
        self.models.values()
    }

    pub fn simulations(&self) -> impl Iterator<Item = &Simulation> {
        self.simulations.values()
    }

    pub fn tasks(&self) -> impl Iterator<Item = &Task> {
        self.tasks.values()
    }

    pub fn repeated_tasks(&self) -> impl Iterator<Item = &RepeatedTask> {
        self.repeated_tasks.values()
    }

    pub fn reports(&self) -> impl Iterator<Item = &Report> {
        self.reports.values()
    }

    pub fn plots(&self) -> impl Iterator<Item = &Plot> {
        self.plots.values()
    }

    pub fn model_ids(&self) -> Vec<String> {
        self.models.keys().cloned().collect()
    }

    /// Registered ids of one kind, in registration order.
    pub fn ids(&self, kind: EntityKind) -> Vec<&str> {
        fn keys<T>(map: &IndexMap<String, T>) -> Vec<&str> {
            map.keys().map(String::as_str).collect()
        }
        match kind {
            EntityKind::Model => keys(&self.models),
            EntityKind::Simulation => keys(&self.simulations),
            EntityKind::Task => keys(&self.tasks),
            EntityKind::RepeatedTask => keys(&self.repeated_tasks),
            EntityKind::Report => keys(&self.reports),
            EntityKind::Plot => keys(&self.plots),
        }
    }

    /// The model a task or repeated-task scope ultimately runs.
    pub fn model_for_scope(&self, scope: &str) -> Result<&str> {
        if let Some(task) = self.tasks.get(scope) {
            return Ok(&task.model_id);
        }
        if let Some(repeated) = self.repeated_tasks.get(scope) {
            let task = self
                .tasks
                .get(&repeated.subtask_id)
                .ok_or_else(|| ExperimentError::UnknownTask(repeated.subtask_id.clone()))?;
            return Ok(&task.model_id);
        }
        Err(ExperimentError::UnresolvableScope(scope.to_string()))
    }
}

fn next_counter_id<T>(counter: &mut usize, taken: &IndexMap<String, T>) -> String {
    loop {
        let id = counter.to_string();
        *counter += 1;
        if !taken.contains_key(&id) {
            return id;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ModelRefKind, ModelSource};
    use crate::simulation::SimulationSpec;
    use crate::task::ParameterTable;

    fn model(id: &str) -> Model {
        Model {
            id: id.to_string(),
            reference: "m".to_string(),
            kind: ModelRefKind::ModelId,
            definition: String::new(),
            source: ModelSource::Prior("m".to_string()),
            parameters: IndexMap::new(),
        }
    }

    fn populated() -> EntityRegistry {
        let mut reg = EntityRegistry::new();
        reg.add_model(model("m1")).unwrap();
        reg.add_simulation(Simulation::new("sim1", SimulationSpec::default()).unwrap())
            .unwrap();
        reg.add_task(Task::new("task1", "m1", "sim1")).unwrap();
        reg
    }

    #[test]
    fn duplicate_ids_fail_per_kind_only() {
        let mut reg = populated();
        let err = reg.add_model(model("m1")).unwrap_err();
        assert!(matches!(
            err,
            ExperimentError::DuplicateIdentifier {
                kind: EntityKind::Model,
                ..
            }
        ));
        // Same id string under a different kind is fine.
        reg.add_simulation(Simulation::new("m1", SimulationSpec::default()).unwrap())
            .unwrap();
        assert_eq!(reg.ids(EntityKind::Model), vec!["m1"]);
        assert_eq!(reg.ids(EntityKind::Simulation), vec!["sim1", "m1"]);
    }

    #[test]
    fn task_with_unknown_model_leaves_registry_unchanged() {
        let mut reg = populated();
        let err = reg.add_task(Task::new("task2", "nope", "sim1")).unwrap_err();
        assert!(matches!(
            err,
            ExperimentError::UnknownEntity {
                kind: EntityKind::Model,
                ..
            }
        ));
        assert_eq!(reg.ids(EntityKind::Task), vec!["task1"]);
    }

    #[test]
    fn counters_skip_taken_ids() {
        let mut reg = EntityRegistry::new();
        reg.add_report(Report::new("1", vec!["S1".to_string()])).unwrap();
        assert_eq!(reg.next_report_id(), "0");
        assert_eq!(reg.next_report_id(), "2");
        assert_eq!(reg.next_plot_id(), "0");
        assert_eq!(reg.next_model_id(), "model0");
    }

    #[test]
    fn model_for_scope_follows_repeated_tasks() {
        let mut reg = populated();
        let table = ParameterTable::single("k1", vec![1.0]).unwrap();
        reg.add_repeated_task(RepeatedTask::new("rt1", "task1", table, true))
            .unwrap();
        assert_eq!(reg.model_for_scope("task1").unwrap(), "m1");
        assert_eq!(reg.model_for_scope("rt1").unwrap(), "m1");
        assert!(matches!(
            reg.model_for_scope("zzz"),
            Err(ExperimentError::UnresolvableScope(_))
        ));
    }

    #[test]
    fn extend_report_appends() {
        let mut reg = EntityRegistry::new();
        reg.add_report(Report::new("r", vec!["a".to_string()])).unwrap();
        reg.extend_report("r", vec!["b".to_string()], Some("Both".to_string()))
            .unwrap();
        let report = reg.report("r").unwrap();
        assert_eq!(report.variables, vec!["a", "b"]);
        assert_eq!(report.title.as_deref(), Some("Both"));
    }

    #[test]
    fn extend_report_rejects_mixed_scoping() {
        let mut reg = EntityRegistry::new();
        reg.add_report(Report::new("r", vec!["task1.S1".to_string()]))
            .unwrap();
        let err = reg
            .extend_report("r", vec!["S2".to_string()], Some("Mixed".to_string()))
            .unwrap_err();
        assert!(matches!(err, ExperimentError::InconsistentScoping { .. }));
        let report = reg.report("r").unwrap();
        assert_eq!(report.variables, vec!["task1.S1"]);
        assert!(report.title.is_none());
    }

    #[test]
    fn script_named_ids_must_be_identifiers() {
        let mut reg = populated();
        let err = reg.add_model(model("my-model")).unwrap_err();
        assert!(matches!(
            err,
            ExperimentError::InvalidIdentifier {
                kind: EntityKind::Model,
                ..
            }
        ));
        let err = reg
            .add_simulation(Simulation::new("bad id", SimulationSpec::default()).unwrap())
            .unwrap_err();
        assert!(matches!(
            err,
            ExperimentError::InvalidIdentifier {
                kind: EntityKind::Simulation,
                ..
            }
        ));
        let err = reg.add_task(Task::new("2nd", "m1", "sim1")).unwrap_err();
        assert!(matches!(
            err,
            ExperimentError::InvalidIdentifier {
                kind: EntityKind::Task,
                ..
            }
        ));
        assert_eq!(reg.ids(EntityKind::Model), vec!["m1"]);
        assert_eq!(reg.ids(EntityKind::Task), vec!["task1"]);
        // Counter ids are not script names.
        reg.add_report(Report::new("0", vec!["S1".to_string()])).unwrap();
    }
}

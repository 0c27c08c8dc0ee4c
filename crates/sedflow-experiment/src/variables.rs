//! Scope resolution between logical variable names and scope-qualified names.
//!
//! A *logical* name is model-relative (`S1`); a *qualified* name is prefixed
//! with the task or repeated task that produced it (`task1.S1`). Time is
//! reserved: it stays `time` when unscoped and collapses to a single
//! `<first_scope>.time` when scoped, never one column per scope.

use crate::error::{ExperimentError, Result};
use crate::model::ModelInformation;
use crate::registry::EntityRegistry;
use indexmap::IndexMap;
use sedflow_dsl::lexical::{scoped, split_scope};
use serde::{Deserialize, Serialize};

pub const TIME: &str = "time";

/// How qualified names are labelled for display.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LabelStyle {
    /// The variable's display name (`S1`, or its model-declared name).
    #[default]
    Variable,
    /// The id of the model behind the scope; used for multi-model legends.
    Model,
}

/// Result of a scoped-variable query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScopedVariables {
    /// Logical name to its qualified names, one per scope (time: exactly one).
    pub by_name: IndexMap<String, Vec<String>>,
    /// Every qualified name, in `by_name` order.
    pub flat: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct VariableCollection {
    explicit: Option<Vec<String>>,
    resolved: Option<Vec<String>>,
    added: Vec<String>,
    include_time: bool,
    scan_parameters: Vec<String>,
    scopes: Vec<String>,
}

impl VariableCollection {
    pub fn new(display_variables: Option<Vec<String>>, include_time: bool) -> Self {
        Self {
            explicit: display_variables,
            include_time,
            ..Default::default()
        }
    }

    /// Default the display variables to the floating species of `info`.
    /// Has no effect when an explicit list was given.
    pub fn resolve_defaults(&mut self, info: &ModelInformation) {
        if self.explicit.is_none() {
            self.resolved = Some(info.floating_species.keys().cloned().collect());
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.explicit.is_some() || self.resolved.is_some()
    }

    pub fn display_variables(&self) -> Result<Vec<String>> {
        let base = self
            .explicit
            .as_ref()
            .or(self.resolved.as_ref())
            .ok_or(ExperimentError::DisplayVariablesUnresolved)?;
        let mut out: Vec<String> = Vec::with_capacity(base.len() + self.added.len() + 1);
        for v in base.iter().chain(&self.added) {
            if !out.contains(v) {
                out.push(v.clone());
            }
        }
        if self.include_time && !out.iter().any(|v| v == TIME) {
            out.insert(0, TIME.to_string());
        }
        Ok(out)
    }

    pub fn add_display_variables<I, S>(&mut self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.added.extend(names.into_iter().map(Into::into));
    }

    pub fn add_scan_parameters<I, S>(&mut self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for name in names {
            let name = name.into();
            if !self.scan_parameters.contains(&name) {
                self.scan_parameters.push(name);
            }
        }
    }

    pub fn scan_parameters(&self) -> &[String] {
        &self.scan_parameters
    }

    /// Record a task or repeated-task id as producing data. Duplicates are
    /// ignored.
    pub fn register_scope(&mut self, scope: impl Into<String>) {
        let scope = scope.into();
        if !self.scopes.contains(&scope) {
            self.scopes.push(scope);
        }
    }

    pub fn scopes(&self) -> &[String] {
        &self.scopes
    }

    fn check_scopes(&self, scopes: &[String]) -> Result<()> {
        if self.scopes.is_empty() {
            return Err(ExperimentError::NoScopeRegistered);
        }
        match scopes.iter().find(|s| !self.scopes.contains(s)) {
            Some(unknown) => Err(ExperimentError::UnknownScope(unknown.clone())),
            None => Ok(()),
        }
    }

    /// The time reference for a set of scopes.
    pub fn scoped_time(&self, scopes: &[String]) -> String {
        match scopes.first() {
            Some(first) => scoped(first, TIME),
            None => TIME.to_string(),
        }
    }

    /// Qualify variables for each scope. An empty `scopes` slice yields
    /// unscoped names. Scan parameters come first, then display variables;
    /// time always leads when included.
    pub fn scoped_variables(
        &self,
        scopes: &[String],
        include_time: bool,
        include_scan: bool,
        include_display: bool,
    ) -> Result<ScopedVariables> {
        self.check_scopes(scopes)?;

        let mut logical: Vec<String> = Vec::new();
        if include_scan {
            logical.extend(self.scan_parameters.iter().cloned());
        }
        let mut has_time = false;
        if include_display {
            for v in self.display_variables()? {
                if v == TIME {
                    has_time = true;
                } else if !logical.contains(&v) {
                    logical.push(v);
                }
            }
        }

        let mut by_name = IndexMap::new();
        if include_time && has_time {
            by_name.insert(TIME.to_string(), vec![self.scoped_time(scopes)]);
        }
        for v in logical {
            let names = if scopes.is_empty() {
                vec![v.clone()]
            } else {
                scopes.iter().map(|s| scoped(s, &v)).collect()
            };
            by_name.insert(v, names);
        }
        let flat = by_name.values().flatten().cloned().collect();
        Ok(ScopedVariables { by_name, flat })
    }

    /// `scoped_variables` over every registered scope.
    pub fn registered_scoped_variables(
        &self,
        include_time: bool,
        include_scan: bool,
        include_display: bool,
    ) -> Result<ScopedVariables> {
        self.scoped_variables(&self.scopes, include_time, include_scan, include_display)
    }

    /// Logical display variable or scan parameter to its label.
    pub fn display_name_map(&self, info: &ModelInformation) -> Result<IndexMap<String, String>> {
        let mut map = IndexMap::new();
        for v in self.display_variables()?.iter().chain(&self.scan_parameters) {
            let label = if v == TIME { TIME } else { info.label(v) };
            map.insert(v.clone(), label.to_string());
        }
        Ok(map)
    }

    /// Qualified name to label over every registered scope.
    ///
    /// `infos` is keyed by model id; a model without information is labelled
    /// by its ids.
    pub fn qualified_display_names(
        &self,
        registry: &EntityRegistry,
        infos: &IndexMap<String, ModelInformation>,
        style: LabelStyle,
    ) -> Result<IndexMap<String, String>> {
        let vars = self.registered_scoped_variables(true, true, true)?;
        let mut map = IndexMap::new();
        for (logical, qualified) in &vars.by_name {
            if logical == TIME {
                for q in qualified {
                    map.insert(q.clone(), TIME.to_string());
                }
                continue;
            }
            for q in qualified {
                let Some((scope, _)) = split_scope(q) else {
                    continue;
                };
                let model_id = registry.model_for_scope(scope)?;
                let label = match style {
                    LabelStyle::Model => model_id.to_string(),
                    LabelStyle::Variable => infos
                        .get(model_id)
                        .map(|info| info.label(logical).to_string())
                        .unwrap_or_else(|| logical.clone()),
                };
                map.insert(q.clone(), label);
            }
        }
        Ok(map)
    }
}

/// `Ok(true)` when every reference is scoped, `Ok(false)` when none is.
pub fn check_homogeneous<S: AsRef<str>>(references: &[S]) -> Result<bool> {
    let scoped_count = references
        .iter()
        .filter(|r| split_scope(r.as_ref()).is_some())
        .count();
    if scoped_count == 0 {
        Ok(false)
    } else if scoped_count == references.len() {
        Ok(true)
    } else {
        Err(ExperimentError::InconsistentScoping {
            references: references.iter().map(|r| r.as_ref().to_string()).collect(),
        })
    }
}

//! Shared fixtures: an analytic backend for `S1 -> S2; k1*S1` and recording
//! collaborators.
#![allow(dead_code)]

use indexmap::IndexMap;
use sedflow_experiment::{
    AlgorithmOptions, BackendError, Model, ModelInformation, PlotFrame, Renderer, ResultTable,
    ScriptConverter, SimulationBackend,
};
use std::collections::HashMap;

/// First-order decay with initial `S1 = 10`, `S2 = 0`, `k1 = 0.4`.
pub const DECAY: &str = "S1 -> S2; k1*S1\nk1 = 0.4\nS1 = 10\nS2 = 0";

/// Same network, different rate and labelled species.
pub const FAST_DECAY: &str =
    "S1 -> S2; k1*S1\nk1 = 1.2\nS1 = 10\nS2 = 0\nS1 is \"Substrate\"";

#[derive(Debug, Clone)]
struct Definition {
    values: IndexMap<String, f64>,
    display_names: IndexMap<String, String>,
}

fn parse(definition: &str) -> Definition {
    let mut values = IndexMap::new();
    let mut display_names = IndexMap::new();
    for line in definition.lines() {
        if let Some((name, label)) = line.split_once(" is ") {
            display_names.insert(name.trim().to_string(), label.trim().trim_matches('"').to_string());
        } else if let Some((name, value)) = line.split_once('=') {
            if let Ok(value) = value.trim().parse::<f64>() {
                values.insert(name.trim().to_string(), value);
            }
        }
    }
    Definition {
        values,
        display_names,
    }
}

fn is_parameter(name: &str) -> bool {
    name.starts_with('k')
}

/// Solves the decay analytically from the current state. State persists
/// between runs until `reset`.
#[derive(Debug, Default)]
pub struct DecayBackend {
    state: HashMap<String, IndexMap<String, f64>>,
    pub resets: usize,
    pub runs: usize,
    pub algorithms: Vec<String>,
    pub assignments: Vec<(String, String, f64)>,
}

impl DecayBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&mut self, model: &Model) -> &mut IndexMap<String, f64> {
        self.state
            .entry(model.id.clone())
            .or_insert_with(|| parse(&model.definition).values)
    }

    fn row(values: &IndexMap<String, f64>, time: f64, selections: &[String]) -> Result<Vec<f64>, BackendError> {
        selections
            .iter()
            .map(|s| {
                if s == "time" {
                    Ok(time)
                } else {
                    values
                        .get(s)
                        .copied()
                        .ok_or_else(|| BackendError::Simulation(format!("unknown selection `{s}`")))
                }
            })
            .collect()
    }
}

impl SimulationBackend for DecayBackend {
    fn information(&mut self, model: &Model) -> Result<ModelInformation, BackendError> {
        let def = parse(&model.definition);
        let mut info = ModelInformation {
            model_name: model.id.clone(),
            display_names: def.display_names,
            num_reactions: 1,
            ..Default::default()
        };
        for (name, value) in def.values {
            if is_parameter(&name) {
                info.parameters.insert(name, value);
            } else {
                info.floating_species.insert(name, value);
            }
        }
        Ok(info)
    }

    fn reset(&mut self, model: &Model) -> Result<(), BackendError> {
        self.resets += 1;
        self.state
            .insert(model.id.clone(), parse(&model.definition).values);
        Ok(())
    }

    fn has_quantity(&mut self, model: &Model, name: &str) -> Result<bool, BackendError> {
        Ok(self.state(model).contains_key(name))
    }

    fn set_value(&mut self, model: &Model, name: &str, value: f64) -> Result<(), BackendError> {
        self.assignments
            .push((model.id.clone(), name.to_string(), value));
        self.state(model).insert(name.to_string(), value);
        Ok(())
    }

    fn set_algorithm(
        &mut self,
        _model: &Model,
        algorithm: &str,
        _options: &AlgorithmOptions,
    ) -> Result<(), BackendError> {
        self.algorithms.push(algorithm.to_string());
        Ok(())
    }

    fn simulate(
        &mut self,
        model: &Model,
        start: f64,
        end: f64,
        num_point: u64,
        selections: &[String],
    ) -> Result<ResultTable, BackendError> {
        self.runs += 1;
        let state = self.state(model).clone();
        let k1 = state.get("k1").copied().unwrap_or(0.0);
        let s1_0 = state.get("S1").copied().unwrap_or(0.0);
        let s2_0 = state.get("S2").copied().unwrap_or(0.0);

        let mut table = ResultTable::new(selections.to_vec());
        let mut values = state;
        let steps = num_point.saturating_sub(1).max(1) as f64;
        for i in 0..num_point {
            let t = start + (end - start) * i as f64 / steps;
            let s1 = s1_0 * (-k1 * (t - start)).exp();
            values.insert("S1".to_string(), s1);
            values.insert("S2".to_string(), s2_0 + s1_0 - s1);
            let row = Self::row(&values, t, selections)?;
            table
                .push_row(row)
                .map_err(|e| BackendError::Simulation(e.to_string()))?;
        }
        self.state.insert(model.id.clone(), values);
        Ok(table)
    }

    fn steady_state(
        &mut self,
        model: &Model,
        selections: &[String],
    ) -> Result<ResultTable, BackendError> {
        self.runs += 1;
        let mut values = self.state(model).clone();
        let total = values.get("S1").copied().unwrap_or(0.0) + values.get("S2").copied().unwrap_or(0.0);
        values.insert("S1".to_string(), 0.0);
        values.insert("S2".to_string(), total);
        let row = Self::row(&values, 0.0, selections)?;
        let mut table = ResultTable::new(selections.to_vec());
        table
            .push_row(row)
            .map_err(|e| BackendError::Simulation(e.to_string()))?;
        Ok(table)
    }
}

/// Wraps each script line in a `<line name="...">` element, quoting the
/// variable references it finds after `report`.
pub struct XmlConverter;

impl ScriptConverter for XmlConverter {
    fn convert(&self, script: &str) -> Result<String, String> {
        let mut out = String::from("<doc>\n");
        for line in script.lines() {
            if let Some(vars) = line.strip_prefix("report ") {
                for var in vars.split(", ") {
                    out.push_str(&format!("  <variable name=\"{var}\"/>\n"));
                }
            } else {
                out.push_str(&format!("  <line text=\"{}\"/>\n", line.replace('"', "'")));
            }
        }
        out.push_str("</doc>");
        Ok(out)
    }
}

#[derive(Debug, Default)]
pub struct RecordingRenderer {
    pub frames: Vec<PlotFrame>,
}

impl Renderer for RecordingRenderer {
    fn render(&mut self, frame: &PlotFrame) -> Result<(), String> {
        self.frames.push(frame.clone());
        Ok(())
    }
}

//! Simulation declarations.
//!
//! A simulation fixes *how* a model is run: its kind, its numeric bounds and
//! the integrator configuration. Construction validates the bounds once; the
//! resulting [`Simulation`] is immutable.

use crate::error::{ExperimentError, Result};
use indexmap::IndexMap;
use sedflow_dsl::script_v1::{OptionValueV1, SimulateKindV1, StatementV1};
use serde::{Deserialize, Serialize};

pub const DEFAULT_START: f64 = 0.0;
pub const DEFAULT_END: f64 = 5.0;
pub const DEFAULT_NUM_STEP: u64 = 10;
pub const DEFAULT_TIME_INTERVAL: f64 = 0.5;
pub const DEFAULT_DETERMINISTIC_ALGORITHM: &str = "CVODE";
pub const DEFAULT_STOCHASTIC_ALGORITHM: &str = "gillespie";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum SimulationKind {
    /// Fixed-step deterministic time course.
    #[default]
    Uniform,
    /// Fixed-step stochastic time course.
    UniformStochastic,
    SteadyState,
    /// A single interval `[start, start + time_interval]`.
    OneStep,
}

impl SimulationKind {
    pub fn default_algorithm(self) -> Option<&'static str> {
        match self {
            SimulationKind::Uniform | SimulationKind::OneStep => {
                Some(DEFAULT_DETERMINISTIC_ALGORITHM)
            }
            SimulationKind::UniformStochastic => Some(DEFAULT_STOCHASTIC_ALGORITHM),
            SimulationKind::SteadyState => None,
        }
    }

    pub fn is_fixed_step(self) -> bool {
        matches!(self, SimulationKind::Uniform | SimulationKind::UniformStochastic)
    }
}

/// Integrator configuration.
///
/// Every field is optional; unset fields keep the backend's defaults and are
/// not emitted. `extra` carries backend-specific options verbatim.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AlgorithmOptions {
    /// Integrator name; `None` uses the kind's default.
    pub algorithm: Option<String>,
    /// Absolute error tolerance of the integrator.
    pub absolute_tolerance: Option<f64>,
    /// Relative error tolerance of the integrator.
    pub relative_tolerance: Option<f64>,
    /// First step size tried by the integrator.
    pub initial_time_step: Option<f64>,
    /// Lower bound on the step size.
    pub minimum_time_step: Option<f64>,
    /// Upper bound on the step size.
    pub maximum_time_step: Option<f64>,
    /// Highest order used by the Adams (non-stiff) method.
    pub maximum_adams_order: Option<u32>,
    /// Highest order used by the BDF (stiff) method.
    pub maximum_bdf_order: Option<u32>,
    /// Iteration cap for steady-state solvers.
    pub maximum_iterations: Option<u32>,
    /// Cap on internal integrator steps per output interval.
    pub maximum_num_steps: Option<u32>,
    /// Damping floor for steady-state Newton iterations.
    pub minimum_damping: Option<f64>,
    /// Random seed for stochastic integrators.
    pub seed: Option<u64>,
    /// Let the integrator choose output points adaptively.
    pub variable_step_size: Option<bool>,
    /// Backend-specific options, emitted as `sim.algorithm.<key> = <value>`.
    pub extra: IndexMap<String, String>,
}

impl AlgorithmOptions {
    /// Set options as `(key, value)` in declaration order, `extra` last.
    pub fn entries(&self) -> Vec<(String, OptionValueV1)> {
        let mut out = Vec::new();
        let mut num = |key: &str, v: Option<f64>| {
            if let Some(v) = v {
                out.push((key.to_string(), OptionValueV1::Number(v)));
            }
        };
        num("absolute_tolerance", self.absolute_tolerance);
        num("relative_tolerance", self.relative_tolerance);
        num("initial_time_step", self.initial_time_step);
        num("minimum_time_step", self.minimum_time_step);
        num("maximum_time_step", self.maximum_time_step);
        let ints = [
            ("maximum_adams_order", self.maximum_adams_order),
            ("maximum_bdf_order", self.maximum_bdf_order),
            ("maximum_iterations", self.maximum_iterations),
            ("maximum_num_steps", self.maximum_num_steps),
        ];
        for (key, v) in ints {
            if let Some(v) = v {
                out.push((key.to_string(), OptionValueV1::Integer(i64::from(v))));
            }
        }
        if let Some(v) = self.minimum_damping {
            out.push(("minimum_damping".to_string(), OptionValueV1::Number(v)));
        }
        if let Some(seed) = self.seed {
            out.push((
                "seed".to_string(),
                OptionValueV1::Integer(i64::try_from(seed).unwrap_or(i64::MAX)),
            ));
        }
        if let Some(v) = self.variable_step_size {
            out.push(("variable_step_size".to_string(), OptionValueV1::Bool(v)));
        }
        for (key, value) in &self.extra {
            out.push((key.clone(), OptionValueV1::Word(value.clone())));
        }
        out
    }
}

/// What a caller supplies to declare a simulation. Unset bounds take the
/// defaults above.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationSpec {
    pub kind: SimulationKind,
    pub start: Option<f64>,
    pub end: Option<f64>,
    pub num_step: Option<u64>,
    pub num_point: Option<u64>,
    pub time_interval: Option<f64>,
    pub options: AlgorithmOptions,
}

impl SimulationSpec {
    pub fn uniform(start: f64, end: f64) -> Self {
        Self {
            kind: SimulationKind::Uniform,
            start: Some(start),
            end: Some(end),
            ..Default::default()
        }
    }

    pub fn stochastic(start: f64, end: f64) -> Self {
        Self {
            kind: SimulationKind::UniformStochastic,
            ..Self::uniform(start, end)
        }
    }

    pub fn one_step(time_interval: f64) -> Self {
        Self {
            kind: SimulationKind::OneStep,
            time_interval: Some(time_interval),
            ..Default::default()
        }
    }

    pub fn steady_state() -> Self {
        Self {
            kind: SimulationKind::SteadyState,
            ..Default::default()
        }
    }

    pub fn with_num_step(mut self, num_step: u64) -> Self {
        self.num_step = Some(num_step);
        self
    }

    pub fn with_num_point(mut self, num_point: u64) -> Self {
        self.num_point = Some(num_point);
        self
    }

    pub fn with_algorithm(mut self, algorithm: impl Into<String>) -> Self {
        self.options.algorithm = Some(algorithm.into());
        self
    }

    pub fn with_options(mut self, options: AlgorithmOptions) -> Self {
        self.options = options;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Simulation {
    pub id: String,
    pub kind: SimulationKind,
    pub start: f64,
    pub end: f64,
    pub num_step: u64,
    pub time_interval: f64,
    /// Resolved integrator name (`None` for steady state unless requested).
    pub algorithm: Option<String>,
    pub options: AlgorithmOptions,
}

impl Simulation {
    pub fn new(id: impl Into<String>, spec: SimulationSpec) -> Result<Self> {
        let id = id.into();
        let invalid = |message: &str| ExperimentError::InvalidSimulation {
            id: id.clone(),
            message: message.to_string(),
        };

        let start = spec.start.unwrap_or(DEFAULT_START);
        let end = spec.end.unwrap_or(DEFAULT_END);
        let time_interval = spec.time_interval.unwrap_or(DEFAULT_TIME_INTERVAL);
        if !start.is_finite() || !end.is_finite() || !time_interval.is_finite() {
            return Err(invalid("bounds must be finite"));
        }

        // Steady state has no time grid, so step and point counts are ignored.
        let num_step = match (spec.num_step, spec.num_point) {
            _ if spec.kind == SimulationKind::SteadyState => {
                spec.num_step.unwrap_or(DEFAULT_NUM_STEP)
            }
            (None, None) => DEFAULT_NUM_STEP,
            (Some(step), None) => step,
            (None, Some(0)) => return Err(invalid("num_point must be at least 1")),
            (None, Some(point)) => point - 1,
            (Some(step), Some(point)) => {
                if step.checked_add(1) != Some(point) {
                    return Err(ExperimentError::InconsistentPointCount {
                        num_step: step,
                        num_point: point,
                    });
                }
                step
            }
        };

        match spec.kind {
            SimulationKind::Uniform | SimulationKind::UniformStochastic => {
                if start >= end {
                    return Err(invalid("start must be less than end"));
                }
                if num_step == 0 {
                    return Err(invalid("num_step must be positive"));
                }
            }
            SimulationKind::OneStep => {
                if time_interval <= 0.0 {
                    return Err(invalid("time_interval must be positive"));
                }
            }
            SimulationKind::SteadyState => {}
        }

        let algorithm = spec
            .options
            .algorithm
            .clone()
            .or_else(|| spec.kind.default_algorithm().map(str::to_string));

        Ok(Self {
            id,
            kind: spec.kind,
            start,
            end,
            num_step,
            time_interval,
            algorithm,
            options: spec.options,
        })
    }

    pub fn num_point(&self) -> u64 {
        self.num_step + 1
    }

    /// One `simulate` line, then one line per set option, then the algorithm
    /// line. One-step simulations carry no option lines.
    pub fn to_statements(&self) -> Vec<StatementV1> {
        let kind = match self.kind {
            SimulationKind::Uniform => SimulateKindV1::Uniform {
                start: self.start,
                end: self.end,
                num_step: self.num_step,
            },
            SimulationKind::UniformStochastic => SimulateKindV1::UniformStochastic {
                start: self.start,
                end: self.end,
                num_step: self.num_step,
            },
            SimulationKind::OneStep => SimulateKindV1::OneStep {
                interval: self.time_interval,
            },
            SimulationKind::SteadyState => SimulateKindV1::SteadyState,
        };
        let mut out = vec![StatementV1::Simulate {
            id: self.id.clone(),
            kind,
        }];
        if self.kind == SimulationKind::OneStep {
            return out;
        }
        for (key, value) in self.options.entries() {
            out.push(StatementV1::AlgorithmOption {
                simulation: self.id.clone(),
                key: Some(key),
                value,
            });
        }
        if let Some(algorithm) = &self.algorithm {
            out.push(StatementV1::AlgorithmOption {
                simulation: self.id.clone(),
                key: None,
                value: OptionValueV1::Word(algorithm.clone()),
            });
        }
        out
    }
}

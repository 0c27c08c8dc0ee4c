//! Script dialect: `script_v1`
//!
//! One statement per line:
//!
//! ```text
//! m1 = model "m1.xml" with k1 = 0.4
//! sim1 = simulate uniform(0, 50, 10)
//! sim1.algorithm = CVODE
//! task1 = run sim1 on m1
//! rt1 = repeat task1 for k1 in [1, 3, 5], reset=true
//! report task1.time, task1.S1
//! plot "Decay" task1.time vs task1.S1, task1.S2
//! ```
//!
//! Formatting is total over valid statements and deterministic: the same
//! statement always renders to the same bytes.

use crate::lexical::{format_number, is_bare_word, is_identifier, is_variable_reference};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type Name = String;

// ============================================================================
// AST
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "tag", rename_all = "snake_case")]
pub enum StatementV1 {
    Model {
        id: Name,
        source: ModelSourceV1,
        /// Parameter value changes applied to the model (`with p = v, ...`).
        changes: Vec<(Name, f64)>,
    },
    Simulate {
        id: Name,
        kind: SimulateKindV1,
    },
    /// `sim.algorithm = NAME` when `key` is `None`, else `sim.algorithm.key = VALUE`.
    AlgorithmOption {
        simulation: Name,
        key: Option<Name>,
        value: OptionValueV1,
    },
    Run {
        id: Name,
        simulation: Name,
        model: Name,
    },
    Repeat {
        id: Name,
        task: Name,
        /// One `param in [values]` range per swept parameter. All ranges have
        /// the same length; row `i` of the sweep takes element `i` of each.
        ranges: Vec<(Name, Vec<f64>)>,
        reset: bool,
    },
    Report {
        variables: Vec<Name>,
    },
    Plot {
        title: Option<String>,
        x: Name,
        y: Vec<Name>,
        /// Third axis; only valid with exactly one `y`.
        z: Option<Name>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "tag", content = "value", rename_all = "snake_case")]
pub enum ModelSourceV1 {
    /// A file holding the model definition (rendered quoted).
    Path(String),
    /// A previously declared model (rendered bare).
    ModelId(Name),
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(tag = "tag", rename_all = "snake_case")]
pub enum SimulateKindV1 {
    Uniform { start: f64, end: f64, num_step: u64 },
    UniformStochastic { start: f64, end: f64, num_step: u64 },
    OneStep { interval: f64 },
    SteadyState,
}

impl SimulateKindV1 {
    pub fn keyword(&self) -> &'static str {
        match self {
            SimulateKindV1::Uniform { .. } => "uniform",
            SimulateKindV1::UniformStochastic { .. } => "uniform_stochastic",
            SimulateKindV1::OneStep { .. } => "onestep",
            SimulateKindV1::SteadyState => "steadystate",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "tag", content = "value", rename_all = "snake_case")]
pub enum OptionValueV1 {
    Number(f64),
    Integer(i64),
    Bool(bool),
    Word(String),
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Error, PartialEq)]
pub enum FormatError {
    #[error("invalid identifier `{0}`")]
    InvalidIdentifier(String),
    #[error("invalid variable reference `{0}`")]
    InvalidVariable(String),
    #[error("non-finite number in `{context}`")]
    NonFinite { context: String },
    #[error("invalid option value `{0}`")]
    InvalidOptionValue(String),
    #[error("titles may not contain quotes or newlines: `{0}`")]
    InvalidTitle(String),
    #[error("`{0}` requires at least one entry")]
    Empty(&'static str),
    #[error("repeat `{id}`: range `{param}` has {actual} values, expected {expected}")]
    RaggedRanges {
        id: String,
        param: String,
        expected: usize,
        actual: usize,
    },
    #[error("a plot with a z axis takes exactly one y variable, got {0}")]
    SurfaceArity(usize),
}

// ============================================================================
// Formatter
// ============================================================================

fn ident(s: &str) -> Result<&str, FormatError> {
    if is_identifier(s) {
        Ok(s)
    } else {
        Err(FormatError::InvalidIdentifier(s.to_string()))
    }
}

fn variable(s: &str) -> Result<&str, FormatError> {
    if is_variable_reference(s) {
        Ok(s)
    } else {
        Err(FormatError::InvalidVariable(s.to_string()))
    }
}

fn number(value: f64, context: &str) -> Result<String, FormatError> {
    format_number(value).ok_or_else(|| FormatError::NonFinite {
        context: context.to_string(),
    })
}

fn variable_list(vars: &[Name]) -> Result<String, FormatError> {
    let vars = vars
        .iter()
        .map(|v| variable(v))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(vars.join(", "))
}

fn option_value(value: &OptionValueV1, context: &str) -> Result<String, FormatError> {
    match value {
        OptionValueV1::Number(x) => number(*x, context),
        OptionValueV1::Integer(i) => Ok(i.to_string()),
        OptionValueV1::Bool(b) => Ok(b.to_string()),
        OptionValueV1::Word(w) if is_bare_word(w) => Ok(w.clone()),
        OptionValueV1::Word(w) => Err(FormatError::InvalidOptionValue(w.clone())),
    }
}

pub fn format_statement_v1(stmt: &StatementV1) -> Result<String, FormatError> {
    match stmt {
        StatementV1::Model {
            id,
            source,
            changes,
        } => {
            let source = match source {
                ModelSourceV1::Path(path) => {
                    if path.contains('"') || path.contains('\n') {
                        return Err(FormatError::InvalidTitle(path.clone()));
                    }
                    format!("\"{path}\"")
                }
                ModelSourceV1::ModelId(prior) => ident(prior)?.to_string(),
            };
            let mut line = format!("{} = model {source}", ident(id)?);
            if !changes.is_empty() {
                let changes = changes
                    .iter()
                    .map(|(name, value)| Ok(format!("{} = {}", ident(name)?, number(*value, name)?)))
                    .collect::<Result<Vec<_>, FormatError>>()?;
                line.push_str(" with ");
                line.push_str(&changes.join(", "));
            }
            Ok(line)
        }
        StatementV1::Simulate { id, kind } => {
            let args = match kind {
                SimulateKindV1::Uniform {
                    start,
                    end,
                    num_step,
                }
                | SimulateKindV1::UniformStochastic {
                    start,
                    end,
                    num_step,
                } => format!(
                    "({}, {}, {num_step})",
                    number(*start, id)?,
                    number(*end, id)?
                ),
                SimulateKindV1::OneStep { interval } => format!("({})", number(*interval, id)?),
                SimulateKindV1::SteadyState => String::new(),
            };
            Ok(format!("{} = simulate {}{args}", ident(id)?, kind.keyword()))
        }
        StatementV1::AlgorithmOption {
            simulation,
            key,
            value,
        } => {
            let simulation = ident(simulation)?;
            match key {
                Some(key) => Ok(format!(
                    "{simulation}.algorithm.{} = {}",
                    ident(key)?,
                    option_value(value, key)?
                )),
                None => Ok(format!(
                    "{simulation}.algorithm = {}",
                    option_value(value, "algorithm")?
                )),
            }
        }
        StatementV1::Run {
            id,
            simulation,
            model,
        } => Ok(format!(
            "{} = run {} on {}",
            ident(id)?,
            ident(simulation)?,
            ident(model)?
        )),
        StatementV1::Repeat {
            id,
            task,
            ranges,
            reset,
        } => {
            let Some((_, first)) = ranges.first() else {
                return Err(FormatError::Empty("repeat"));
            };
            let expected = first.len();
            let mut parts = Vec::with_capacity(ranges.len());
            for (param, values) in ranges {
                if values.len() != expected {
                    return Err(FormatError::RaggedRanges {
                        id: id.clone(),
                        param: param.clone(),
                        expected,
                        actual: values.len(),
                    });
                }
                let values = values
                    .iter()
                    .map(|v| number(*v, param))
                    .collect::<Result<Vec<_>, _>>()?;
                parts.push(format!("{} in [{}]", ident(param)?, values.join(", ")));
            }
            Ok(format!(
                "{} = repeat {} for {}, reset={reset}",
                ident(id)?,
                ident(task)?,
                parts.join(", ")
            ))
        }
        StatementV1::Report { variables } => {
            if variables.is_empty() {
                return Err(FormatError::Empty("report"));
            }
            Ok(format!("report {}", variable_list(variables)?))
        }
        StatementV1::Plot { title, x, y, z } => {
            if y.is_empty() {
                return Err(FormatError::Empty("plot"));
            }
            let clause = match z {
                None => format!("{} vs {}", variable(x)?, variable_list(y)?),
                Some(z) => {
                    if y.len() != 1 {
                        return Err(FormatError::SurfaceArity(y.len()));
                    }
                    format!("{} vs {} vs {}", variable(x)?, variable(&y[0])?, variable(z)?)
                }
            };
            match title {
                None => Ok(format!("plot {clause}")),
                Some(t) if t.contains('"') || t.contains('\n') => {
                    Err(FormatError::InvalidTitle(t.clone()))
                }
                Some(t) => Ok(format!("plot \"{t}\" {clause}")),
            }
        }
    }
}

/// Format a whole script: one line per statement, `\n`-separated, no trailing
/// newline.
pub fn format_script_v1(statements: &[StatementV1]) -> Result<String, FormatError> {
    let lines = statements
        .iter()
        .map(format_statement_v1)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(lines.join("\n"))
}

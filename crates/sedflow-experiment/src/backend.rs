//! The simulation backend seam.
//!
//! The core never integrates anything itself. It drives a backend through
//! this trait: reset, set values, pick an algorithm, run.

use crate::model::{Model, ModelInformation};
use crate::simulation::AlgorithmOptions;
use crate::table::ResultTable;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("backend could not load model `{model_id}`: {message}")]
    Load { model_id: String, message: String },

    #[error("algorithm `{0}` is not available")]
    UnknownAlgorithm(String),

    #[error("simulation failed: {0}")]
    Simulation(String),

    #[error("backend does not support {0}")]
    Unsupported(String),
}

/// A simulation engine holding per-model numeric state.
///
/// Calls for one model are strictly sequential. `reset` restores initial
/// conditions; state otherwise carries from one `simulate` to the next.
pub trait SimulationBackend {
    fn information(&mut self, model: &Model) -> Result<ModelInformation, BackendError>;

    fn reset(&mut self, model: &Model) -> Result<(), BackendError>;

    /// Whether `name` is a quantity `set_value` accepts.
    fn has_quantity(&mut self, model: &Model, name: &str) -> Result<bool, BackendError>;

    fn set_value(&mut self, model: &Model, name: &str, value: f64) -> Result<(), BackendError>;

    fn set_algorithm(
        &mut self,
        model: &Model,
        algorithm: &str,
        options: &AlgorithmOptions,
    ) -> Result<(), BackendError>;

    /// Time course over `[start, end]` with `num_point` rows. Columns are
    /// `selections`, in order.
    fn simulate(
        &mut self,
        model: &Model,
        start: f64,
        end: f64,
        num_point: u64,
        selections: &[String],
    ) -> Result<ResultTable, BackendError>;

    /// A single row at steady state. Columns are `selections`, in order.
    fn steady_state(
        &mut self,
        model: &Model,
        selections: &[String],
    ) -> Result<ResultTable, BackendError>;
}

use crate::backend::BackendError;
use crate::model::LoaderError;
use crate::registry::EntityKind;
use sedflow_dsl::script_v1::FormatError;
use thiserror::Error;

pub type Result<T, E = ExperimentError> = std::result::Result<T, E>;

/// Every failure the experiment core can report. Errors are raised at the
/// point of detection and never batched; a failed `add_*` leaves the registry
/// untouched.
#[derive(Debug, Error)]
pub enum ExperimentError {
    #[error("duplicate {kind} id `{id}`")]
    DuplicateIdentifier { kind: EntityKind, id: String },

    #[error("unknown {kind} `{id}`")]
    UnknownEntity { kind: EntityKind, id: String },

    #[error("{kind} id `{id}` is not an identifier ([A-Za-z_][A-Za-z0-9_]*)")]
    InvalidIdentifier { kind: EntityKind, id: String },

    #[error("unknown task `{0}`")]
    UnknownTask(String),

    #[error("scope `{0}` was never registered by a task or repeated task")]
    UnknownScope(String),

    #[error("no scope has been registered yet; add a task or repeated task first")]
    NoScopeRegistered,

    #[error("scope `{0}` is neither a task nor a repeated task")]
    UnresolvableScope(String),

    #[error("variable references must all be scoped or all unscoped: {references:?}")]
    InconsistentScoping { references: Vec<String> },

    #[error("`{name}` is not a settable quantity of model `{model_id}`")]
    UnknownParameter { model_id: String, name: String },

    #[error("script conversion failed: {diagnostic}")]
    ScriptConversion { diagnostic: String },

    #[error("plot `{plot_id}` has a z axis; only 2D plots can be rendered")]
    UnsupportedPlotKind { plot_id: String },

    #[error("repeated task `{repeated_task_id}` sweeps a steady-state simulation, which is not supported; use a one-step simulation with a long interval")]
    UnsupportedScan { repeated_task_id: String },

    #[error("num_point must be num_step + 1 (num_step={num_step}, num_point={num_point})")]
    InconsistentPointCount { num_step: u64, num_point: u64 },

    #[error("invalid simulation `{id}`: {message}")]
    InvalidSimulation { id: String, message: String },

    #[error("display variables are unresolved; pass them explicitly or describe the models first")]
    DisplayVariablesUnresolved,

    #[error("unidentifiable model reference `{0}`; specify the reference kind explicitly")]
    UnidentifiableModelReference(String),

    #[error("parameter table column `{column}` has {actual} rows, expected {expected}")]
    RaggedParameterTable {
        column: String,
        expected: usize,
        actual: usize,
    },

    #[error("parameter table needs at least one column and one row")]
    EmptyParameterTable,

    #[error("experiment is empty: {0}")]
    EmptyExperiment(String),

    #[error("table shape mismatch: {0}")]
    TableShape(String),

    #[error("unknown column `{0}`")]
    UnknownColumn(String),

    #[error("renderer failed: {0}")]
    Renderer(String),

    #[error("archive packaging failed: {0}")]
    Archive(String),

    #[error(transparent)]
    Format(#[from] FormatError),

    #[error(transparent)]
    Loader(#[from] LoaderError),

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("pattern error: {0}")]
    Pattern(#[from] regex::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("configuration error: {0}")]
    Config(#[from] serde_json::Error),
}

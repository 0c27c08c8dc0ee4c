//! Sedflow experiments
//!
//! Declare a simulation experiment over one or more models, compile it into
//! an experiment script, and run it against a simulation backend:
//!
//! ```text
//! ┌──────────────┐    ┌──────────────┐    ┌───────────────┐
//! │  Experiment  │───►│   Script     │───►│  Converter    │  (external)
//! │  add_*       │    │   Compiler   │    └───────────────┘
//! └──────┬───────┘    └──────────────┘
//!        │
//!        │            ┌──────────────┐    ┌───────────────┐
//!        └───────────►│   Executor   │───►│   Backend     │  (external)
//!                     │  tasks/scans │    └───────────────┘
//!                     └──────┬───────┘
//!                            ▼
//!                      ResultTable ──► Renderer / CSV
//! ```
//!
//! ## Key pieces
//!
//! - **Registry**: uniquely-identified models, simulations, tasks, repeated
//!   tasks, reports and plots, kept in registration order.
//! - **Scope resolution**: `task1.S1`-style qualified names, with a single
//!   shared time column across scopes.
//! - **Compiler**: deterministic section-ordered script text.
//! - **Executor**: sequential task runs and parameter sweeps, reassembled into
//!   one table.
//!
//! Model loading, simulation, script conversion, rendering and archive
//! packaging are collaborator traits ([`ModelLoader`], [`SimulationBackend`],
//! [`ScriptConverter`], [`Renderer`], [`ArchivePackager`]).

pub mod archive;
pub mod backend;
pub mod compiler;
pub mod config;
pub mod error;
pub mod executor;
pub mod experiment;
pub mod model;
pub mod output;
pub mod registry;
pub mod simulation;
pub mod table;
pub mod task;
pub mod templates;
pub mod variables;

pub use archive::{ArchivePackager, StagedArchive};
pub use backend::{BackendError, SimulationBackend};
pub use compiler::{ScriptCompiler, ScriptConverter};
pub use config::ExperimentConfig;
pub use error::{ExperimentError, Result};
pub use executor::{Execution, Executor, PlotFrame, Renderer, ScopeResult};
pub use experiment::Experiment;
pub use model::{
    LoaderError, LocalModelLoader, Model, ModelInformation, ModelLoader, ModelRefKind, ModelSpec,
};
pub use output::{Plot, PlotSpec, Report};
pub use registry::{EntityKind, EntityRef, EntityRegistry};
pub use simulation::{AlgorithmOptions, Simulation, SimulationKind, SimulationSpec};
pub use table::ResultTable;
pub use task::{ParameterTable, RepeatedTask, Task};
pub use templates::{
    MultipleModelParameterScan, MultipleModelTimeCourse, SingleModelParameterScan,
    SingleModelTimeCourse,
};
pub use variables::{LabelStyle, ScopedVariables, VariableCollection};

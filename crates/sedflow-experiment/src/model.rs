//! Models: references, the loader seam, and on-disk persistence.
//!
//! A model reference is resolved by a [`ModelLoader`] into a definition
//! string, which is then written to the project directory. From that point the
//! file is the single source of truth for simulation.

use crate::error::{ExperimentError, Result};
use indexmap::IndexMap;
use sedflow_dsl::script_v1::{ModelSourceV1, StatementV1};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const SBML_EXTENSION: &str = "xml";
pub const ANTIMONY_EXTENSION: &str = "ant";

// ============================================================================
// Reference kinds
// ============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ModelRefKind {
    SbmlString,
    AntimonyString,
    SbmlFile,
    AntimonyFile,
    SbmlUrl,
    /// Id of a model already registered in the same experiment.
    ModelId,
}

impl ModelRefKind {
    /// Guess the kind of a reference.
    ///
    /// Known model ids win over everything else, including a file of the same
    /// name.
    pub fn infer(reference: &str, known_model_ids: &[String]) -> Result<Self> {
        if known_model_ids.iter().any(|id| id == reference) {
            if Path::new(reference).exists() {
                tracing::warn!(reference, "model id is also a file path; using the model id");
            }
            return Ok(ModelRefKind::ModelId);
        }
        if reference.contains("<sbml") {
            return Ok(ModelRefKind::SbmlString);
        }
        if reference.contains("->") {
            return Ok(ModelRefKind::AntimonyString);
        }
        if reference.starts_with("http://") || reference.starts_with("https://") {
            return Ok(ModelRefKind::SbmlUrl);
        }
        let path = Path::new(reference);
        if path.is_file() {
            let head = std::fs::read_to_string(path)?;
            return Ok(if head.trim_start().starts_with('<') {
                ModelRefKind::SbmlFile
            } else {
                ModelRefKind::AntimonyFile
            });
        }
        Err(ExperimentError::UnidentifiableModelReference(
            reference.to_string(),
        ))
    }

    pub fn is_file(self) -> bool {
        matches!(self, ModelRefKind::SbmlFile | ModelRefKind::AntimonyFile)
    }

    fn extension(self) -> &'static str {
        match self {
            ModelRefKind::AntimonyString | ModelRefKind::AntimonyFile => ANTIMONY_EXTENSION,
            _ => SBML_EXTENSION,
        }
    }
}

// ============================================================================
// Loader seam
// ============================================================================

#[derive(Debug, Error)]
pub enum LoaderError {
    #[error("failed to read model file `{}`: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to fetch model from `{url}`: {message}")]
    Fetch { url: String, message: String },
    #[error("unsupported model reference: {0}")]
    Unsupported(String),
}

/// Resolves a model reference into a definition string.
pub trait ModelLoader {
    fn load(&self, reference: &str, kind: ModelRefKind) -> Result<String, LoaderError>;
}

/// Resolves strings and local files; URLs need the `http` feature.
///
/// Definitions are passed through untouched: converting Antimony to SBML is
/// left to the simulation backend.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalModelLoader;

impl ModelLoader for LocalModelLoader {
    fn load(&self, reference: &str, kind: ModelRefKind) -> Result<String, LoaderError> {
        match kind {
            ModelRefKind::SbmlString | ModelRefKind::AntimonyString => Ok(reference.to_string()),
            ModelRefKind::SbmlFile | ModelRefKind::AntimonyFile => std::fs::read_to_string(reference)
                .map_err(|source| LoaderError::Io {
                    path: PathBuf::from(reference),
                    source,
                }),
            ModelRefKind::ModelId => Ok(String::new()),
            ModelRefKind::SbmlUrl => fetch_url(reference),
        }
    }
}

#[cfg(feature = "http")]
fn fetch_url(url: &str) -> Result<String, LoaderError> {
    let fetch_err = |message: String| LoaderError::Fetch {
        url: url.to_string(),
        message,
    };
    let response = reqwest::blocking::get(url).map_err(|e| fetch_err(e.to_string()))?;
    let status = response.status();
    if !status.is_success() {
        return Err(fetch_err(format!("HTTP {status}")));
    }
    response.text().map_err(|e| fetch_err(e.to_string()))
}

#[cfg(not(feature = "http"))]
fn fetch_url(url: &str) -> Result<String, LoaderError> {
    Err(LoaderError::Unsupported(format!(
        "`{url}` (rebuild with the `http` feature to fetch URLs)"
    )))
}

// ============================================================================
// Model
// ============================================================================

/// What a caller supplies to register a model.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelSpec {
    pub id: Option<String>,
    pub reference: String,
    pub kind: Option<ModelRefKind>,
    /// Parameter overrides applied on every run of this model.
    pub parameters: IndexMap<String, f64>,
}

impl ModelSpec {
    pub fn new(reference: impl Into<String>) -> Self {
        Self {
            reference: reference.into(),
            ..Default::default()
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_kind(mut self, kind: ModelRefKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn with_parameter(mut self, name: impl Into<String>, value: f64) -> Self {
        self.parameters.insert(name.into(), value);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelSource {
    /// Definition persisted at this path. `owned` is set when the experiment
    /// wrote the file and is therefore responsible for removing it.
    File { path: PathBuf, owned: bool },
    /// Refers to another registered model.
    Prior(String),
}

#[derive(Debug, Clone)]
pub struct Model {
    pub id: String,
    pub reference: String,
    pub kind: ModelRefKind,
    pub definition: String,
    pub source: ModelSource,
    pub parameters: IndexMap<String, f64>,
}

impl Model {
    /// Id derived from a file reference: the file name up to its first `.`.
    pub fn id_from_file(reference: &str) -> Option<String> {
        let name = Path::new(reference).file_name()?.to_str()?;
        let stem = name.split('.').next()?;
        (!stem.is_empty()).then(|| stem.to_string())
    }

    /// Resolve and persist a model. The caller has already checked that `id`
    /// is free.
    pub fn materialize(
        id: String,
        spec: &ModelSpec,
        kind: ModelRefKind,
        loader: &dyn ModelLoader,
        dir: &Path,
        overwrite: bool,
    ) -> Result<Self> {
        let definition = loader.load(&spec.reference, kind)?;
        let source = if kind == ModelRefKind::ModelId {
            ModelSource::Prior(spec.reference.clone())
        } else {
            let path = dir.join(format!("{id}.{}", kind.extension()));
            if overwrite || !path.exists() {
                std::fs::write(&path, definition.as_bytes())?;
                ModelSource::File { path, owned: true }
            } else {
                tracing::warn!(
                    path = %path.display(),
                    "model file already exists and will be used as the model source; enable overwrite to replace it"
                );
                ModelSource::File { path, owned: false }
            }
        };
        Ok(Self {
            id,
            reference: spec.reference.clone(),
            kind,
            definition,
            source,
            parameters: spec.parameters.clone(),
        })
    }

    pub fn source_path(&self) -> Option<&Path> {
        match &self.source {
            ModelSource::File { path, .. } => Some(path),
            ModelSource::Prior(_) => None,
        }
    }

    pub fn to_statement(&self, basename: bool) -> StatementV1 {
        let source = match &self.source {
            ModelSource::Prior(prior) => ModelSourceV1::ModelId(prior.clone()),
            ModelSource::File { path, .. } => {
                let shown = if basename {
                    path.file_name().map(PathBuf::from).unwrap_or_else(|| path.clone())
                } else {
                    path.clone()
                };
                ModelSourceV1::Path(shown.to_string_lossy().into_owned())
            }
        };
        StatementV1::Model {
            id: self.id.clone(),
            source,
            changes: self
                .parameters
                .iter()
                .map(|(k, v)| (k.clone(), *v))
                .collect(),
        }
    }

    /// Remove the persisted definition if this model wrote it. Idempotent.
    pub fn cleanup(&self) -> Result<()> {
        if let ModelSource::File { path, owned: true } = &self.source {
            match std::fs::remove_file(path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }
}

// ============================================================================
// Model information
// ============================================================================

/// Metadata a backend reports for a loaded model.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ModelInformation {
    pub model_name: String,
    /// Floating species ids with their initial values, in model order.
    pub floating_species: IndexMap<String, f64>,
    pub boundary_species: IndexMap<String, f64>,
    /// Global parameters with their values.
    pub parameters: IndexMap<String, f64>,
    /// Human-readable names for elements that declare one.
    pub display_names: IndexMap<String, String>,
    pub num_reactions: usize,
}

impl ModelInformation {
    /// Display label for an element, falling back to its id.
    pub fn label<'a>(&'a self, id: &'a str) -> &'a str {
        self.display_names.get(id).map(String::as_str).unwrap_or(id)
    }

    pub fn num_species(&self) -> usize {
        self.floating_species.len() + self.boundary_species.len()
    }
}

use crate::error::Result;
use crate::variables::LabelStyle;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_PROJECT_ID: &str = "project";

/// Configuration for an experiment.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperimentConfig {
    /// Used to derive ids in templates and to name the staged script.
    pub project_id: String,
    /// Where model definitions are persisted. `None` uses a temporary
    /// directory owned by the experiment and removed with it.
    pub project_dir: Option<PathBuf>,
    /// Replace existing model files instead of reusing them.
    pub overwrite_models: bool,
    /// Display variables; `None` defaults to the floating species of the first
    /// model once the models are described.
    pub display_variables: Option<Vec<String>>,
    /// Prepend the reserved time variable to the display variables.
    pub include_time: bool,
    /// How scope-qualified names are labelled in converted output and plots.
    pub label_style: LabelStyle,
    /// Emit model sources as file names instead of full paths.
    pub basename_sources: bool,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            project_id: DEFAULT_PROJECT_ID.to_string(),
            project_dir: None,
            overwrite_models: true,
            display_variables: None,
            include_time: true,
            label_style: LabelStyle::Variable,
            basename_sources: false,
        }
    }
}

impl ExperimentConfig {
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    pub fn with_project_id(mut self, project_id: impl Into<String>) -> Self {
        self.project_id = project_id.into();
        self
    }

    pub fn with_project_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.project_dir = Some(dir.into());
        self
    }

    pub fn with_display_variables<I, S>(mut self, variables: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.display_variables = Some(variables.into_iter().map(Into::into).collect());
        self
    }

    pub fn without_time(mut self) -> Self {
        self.include_time = false;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let config: ExperimentConfig =
            serde_json::from_str(r#"{"project_id": "decay", "include_time": false}"#).unwrap();
        assert_eq!(config.project_id, "decay");
        assert!(!config.include_time);
        assert!(config.overwrite_models);
        assert!(config.project_dir.is_none());
    }

    #[test]
    fn reads_config_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"display_variables": ["S1", "S2"]}"#).unwrap();
        let config = ExperimentConfig::from_json_file(&path).unwrap();
        assert_eq!(
            config.display_variables,
            Some(vec!["S1".to_string(), "S2".to_string()])
        );
    }
}

//! Reports and plots: what an experiment shows once it has run.

use indexmap::IndexMap;
use sedflow_dsl::script_v1::StatementV1;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub id: String,
    pub title: Option<String>,
    /// Variable references, all scoped or all unscoped.
    pub variables: Vec<String>,
    /// Free-form annotations carried alongside the report.
    #[serde(default)]
    pub metadata: IndexMap<String, String>,
}

impl Report {
    pub fn new(id: impl Into<String>, variables: Vec<String>) -> Self {
        Self {
            id: id.into(),
            title: None,
            variables,
            metadata: IndexMap::new(),
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn to_statement(&self) -> StatementV1 {
        StatementV1::Report {
            variables: self.variables.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plot {
    pub id: String,
    pub title: Option<String>,
    pub x: String,
    pub y: Vec<String>,
    pub z: Option<String>,
}

impl Plot {
    /// Every variable the plot references, x first.
    pub fn variables(&self) -> Vec<String> {
        std::iter::once(self.x.clone())
            .chain(self.y.iter().cloned())
            .chain(self.z.iter().cloned())
            .collect()
    }

    pub fn to_statement(&self) -> StatementV1 {
        StatementV1::Plot {
            title: self.title.clone(),
            x: self.x.clone(),
            y: self.y.clone(),
            z: self.z.clone(),
        }
    }
}

/// Caller-facing plot declaration; `id: None` takes the next plot counter.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlotSpec {
    pub id: Option<String>,
    pub title: Option<String>,
    pub x: String,
    pub y: Vec<String>,
    pub z: Option<String>,
}

impl PlotSpec {
    pub fn new<I, S>(x: impl Into<String>, y: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            x: x.into(),
            y: y.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_z(mut self, z: impl Into<String>) -> Self {
        self.z = Some(z.into());
        self
    }

    pub fn into_plot(self, id: String) -> Plot {
        Plot {
            id,
            title: self.title,
            x: self.x,
            y: self.y,
            z: self.z,
        }
    }
}

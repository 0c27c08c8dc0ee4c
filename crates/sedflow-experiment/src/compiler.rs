//! Script compiler.
//!
//! Sections are emitted in a fixed order (models, simulations, tasks,
//! repeated tasks, reports, plots) and, within a section, in registration
//! order. Compilation reads the registry only, so compiling an unchanged
//! registry twice yields the same bytes.

use crate::error::{ExperimentError, Result};
use crate::registry::EntityRegistry;
use indexmap::IndexMap;
use regex::{Captures, Regex};
use sedflow_dsl::script_v1::{format_script_v1, StatementV1};

/// Converts compiled script text into the executable document format.
pub trait ScriptConverter {
    /// Returns the converted document, or the converter's diagnostic.
    fn convert(&self, script: &str) -> std::result::Result<String, String>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ScriptCompiler {
    basename_sources: bool,
}

impl ScriptCompiler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Emit model sources as bare file names, for scripts that travel next to
    /// their model files.
    pub fn basename_sources(mut self, basename: bool) -> Self {
        self.basename_sources = basename;
        self
    }

    pub fn statements(&self, registry: &EntityRegistry) -> Vec<StatementV1> {
        let mut out = Vec::new();
        out.extend(registry.models().map(|m| m.to_statement(self.basename_sources)));
        for sim in registry.simulations() {
            out.extend(sim.to_statements());
        }
        out.extend(registry.tasks().map(|t| t.to_statement()));
        out.extend(registry.repeated_tasks().map(|rt| rt.to_statement()));
        out.extend(registry.reports().map(|r| r.to_statement()));
        out.extend(registry.plots().map(|p| p.to_statement()));
        out
    }

    pub fn compile(&self, registry: &EntityRegistry) -> Result<String> {
        Ok(format_script_v1(&self.statements(registry))?)
    }

    /// Compile, convert, then replace qualified names in `name="..."`
    /// attributes with their labels from `names`.
    pub fn compile_final(
        &self,
        registry: &EntityRegistry,
        converter: &dyn ScriptConverter,
        names: &IndexMap<String, String>,
    ) -> Result<String> {
        let script = self.compile(registry)?;
        let converted = converter
            .convert(&script)
            .map_err(|diagnostic| ExperimentError::ScriptConversion { diagnostic })?;
        rewrite_display_names(&converted, names)
    }
}

/// Only whole attribute values that exactly match a key are replaced.
pub fn rewrite_display_names(document: &str, names: &IndexMap<String, String>) -> Result<String> {
    if names.is_empty() {
        return Ok(document.to_string());
    }
    let attr = Regex::new(r#"\bname="([^"]*)""#)?;
    let rewritten = attr.replace_all(document, |caps: &Captures<'_>| match names.get(&caps[1]) {
        Some(label) => format!("name=\"{}\"", escape_attribute(label)),
        None => caps[0].to_string(),
    });
    Ok(rewritten.into_owned())
}

fn escape_attribute(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('"', "&quot;")
        .replace('<', "&lt;")
}

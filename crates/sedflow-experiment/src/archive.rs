//! Archive staging.
//!
//! An archive directory holds one script file plus one definition file per
//! model. Packaging that directory is left to an [`ArchivePackager`].

use crate::compiler::ScriptCompiler;
use crate::error::{ExperimentError, Result};
use crate::registry::EntityRegistry;
use std::path::{Path, PathBuf};

/// Extension of the staged script file.
pub const SCRIPT_EXTENSION: &str = "txt";

/// Stale manifests are removed so the packager always writes a fresh one.
pub const MANIFEST_FILE: &str = "manifest.xml";

/// Packs a staged directory into an archive and returns the archive path.
pub trait ArchivePackager {
    fn package(&self, dir: &Path, project_id: &str) -> std::result::Result<PathBuf, String>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedArchive {
    pub dir: PathBuf,
    pub script_path: PathBuf,
    pub model_paths: Vec<PathBuf>,
}

/// Write `<project_id>.txt` and every persisted model file into `dir`.
///
/// Model sources are emitted as bare file names so the script resolves them
/// next to itself.
pub fn stage_archive(
    registry: &EntityRegistry,
    dir: &Path,
    project_id: &str,
) -> Result<StagedArchive> {
    std::fs::create_dir_all(dir)?;
    let manifest = dir.join(MANIFEST_FILE);
    if manifest.exists() {
        std::fs::remove_file(&manifest)?;
    }

    let mut model_paths = Vec::new();
    for model in registry.models() {
        let Some(source) = model.source_path() else {
            continue;
        };
        let file_name = source.file_name().ok_or_else(|| {
            ExperimentError::Archive(format!(
                "model `{}` has no file name: {}",
                model.id,
                source.display()
            ))
        })?;
        let target = dir.join(file_name);
        if !same_file(source, &target) {
            std::fs::copy(source, &target)?;
        }
        model_paths.push(target);
    }

    let script = ScriptCompiler::new().basename_sources(true).compile(registry)?;
    let script_path = dir.join(format!("{project_id}.{SCRIPT_EXTENSION}"));
    std::fs::write(&script_path, script)?;

    tracing::info!(
        dir = %dir.display(),
        models = model_paths.len(),
        "archive staged"
    );
    Ok(StagedArchive {
        dir: dir.to_path_buf(),
        script_path,
        model_paths,
    })
}

fn same_file(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// Stage into `dir` and hand the directory to `packager`.
pub fn make_archive(
    registry: &EntityRegistry,
    dir: &Path,
    project_id: &str,
    packager: &dyn ArchivePackager,
) -> Result<PathBuf> {
    let staged = stage_archive(registry, dir, project_id)?;
    packager
        .package(&staged.dir, project_id)
        .map_err(ExperimentError::Archive)
}

use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum ModelResolveError {
    #[error("model file not found: {}", .0.display())]
    Missing(PathBuf),
    #[error("model {name} not found; looked in: {}", join_paths(.searched))]
    NotInstalled { name: String, searched: Vec<PathBuf> },
}

fn join_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Locates a model file on disk. Weights are installed out of band; nothing
/// is downloaded here.
///
/// Resolution order:
/// 1. Explicit path (must exist)
/// 2. User cache directory (platform-specific)
/// 3. Bundled directory (for development / pre-packaged installs)
pub fn resolve(
    name: &str,
    explicit: Option<&Path>,
    bundled_dir: Option<&Path>,
) -> Result<PathBuf, ModelResolveError> {
    if let Some(path) = explicit {
        return if path.is_file() {
            Ok(path.to_path_buf())
        } else {
            Err(ModelResolveError::Missing(path.to_path_buf()))
        };
    }

    let candidates: Vec<PathBuf> = model_cache_dir()
        .into_iter()
        .chain(bundled_dir.map(Path::to_path_buf))
        .map(|dir| dir.join(name))
        .collect();

    candidates
        .iter()
        .find(|p| p.is_file())
        .cloned()
        .ok_or_else(|| ModelResolveError::NotInstalled {
            name: name.to_string(),
            searched: candidates,
        })
}

/// Platform-specific model cache directory.
///
/// - macOS: `~/Library/Application Support/FaceTrack/models/`
/// - Linux: `$XDG_CACHE_HOME/FaceTrack/models/` or `~/.cache/FaceTrack/models/`
/// - Windows: `%LOCALAPPDATA%/FaceTrack/models/`
pub fn model_cache_dir() -> Option<PathBuf> {
    #[cfg(target_os = "macos")]
    {
        dirs::data_dir().map(|d| d.join("FaceTrack").join("models"))
    }
    #[cfg(not(target_os = "macos"))]
    {
        dirs::cache_dir().map(|d| d.join("FaceTrack").join("models"))
    }
}

//! Profile directory loading
//!
//! The engine consumes already-loaded `(path, text)` pairs; this module owns
//! the actual filesystem walk. Layout follows the InSpec convention:
//! `inspec.yml` at the root, control files under `controls/`, custom
//! resources under `libraries/`.

use std::path::{Path, PathBuf};

use portcullis::{ProfileMetadata, ProfileSources, SourceFile};

use crate::error::{CliError, Result};

/// Load a profile directory into engine inputs
pub fn load_profile(dir: &Path) -> Result<ProfileSources> {
    if !dir.is_dir() {
        return Err(CliError::ProfileNotFound {
            path: dir.to_path_buf(),
        });
    }

    let metadata = load_metadata(dir)?;
    let mut sources = ProfileSources::new(metadata);

    let controls = ruby_files(&dir.join("controls"))?;
    if controls.is_empty() {
        return Err(CliError::NoControls {
            path: dir.to_path_buf(),
        });
    }
    for path in controls {
        sources = sources.with_control(read_source(dir, &path)?);
    }

    for path in ruby_files(&dir.join("libraries"))? {
        sources = sources.with_library(read_source(dir, &path)?);
    }

    Ok(sources)
}

fn load_metadata(dir: &Path) -> Result<ProfileMetadata> {
    let metadata_path = dir.join("inspec.yml");
    if metadata_path.is_file() {
        let text = std::fs::read_to_string(&metadata_path).map_err(|e| CliError::SourceRead {
            path: metadata_path.clone(),
            source: e,
        })?;
        return Ok(ProfileMetadata::from_yaml(&text)?);
    }

    // No metadata file: derive the profile name from the directory
    let name = dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "profile".to_string());
    Ok(ProfileMetadata::fallback(name))
}

/// `.rb` files directly under `dir`, sorted for deterministic load order
fn ruby_files(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "rb"))
        .collect();
    files.sort();
    Ok(files)
}

fn read_source(profile_root: &Path, path: &Path) -> Result<SourceFile> {
    let text = std::fs::read_to_string(path).map_err(|e| CliError::SourceRead {
        path: path.to_path_buf(),
        source: e,
    })?;
    // Diagnostics show profile-relative paths
    let display = path
        .strip_prefix(profile_root)
        .unwrap_or(path)
        .to_string_lossy()
        .into_owned();
    Ok(SourceFile::new(display, text))
}

//! InSpec Profile Model
//!
//! A profile is a directory-rooted unit: an `inspec.yml` metadata record,
//! control sources (`controls/*.rb`), and optional custom-resource support
//! sources (`libraries/*.rb`). The engine never touches the filesystem
//! directly; callers hand it already-loaded `(path, text)` pairs.
//!
//! # Metadata File Format
//!
//! ```yaml
//! name: cis-windows2019
//! title: CIS Microsoft Windows Server 2019 Benchmark
//! version: 1.2.0
//! summary: Level 1 and Level 2 member server checks
//! ```

use serde::Deserialize;

use crate::error::{ConvertError, Result};

/// One already-loaded profile source file
#[derive(Debug, Clone)]
pub struct SourceFile {
    /// Path as supplied by the loader; used only for diagnostics
    pub path: String,

    /// Full UTF-8 source text
    pub text: String,
}

impl SourceFile {
    pub fn new(path: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            text: text.into(),
        }
    }
}

/// Profile metadata from `inspec.yml`
#[derive(Debug, Clone)]
pub struct ProfileMetadata {
    /// Profile identifier (machine name)
    pub name: String,

    /// Human-readable title
    pub title: Option<String>,

    /// Profile version string
    pub version: String,

    /// Short description
    pub summary: Option<String>,
}

/// Raw YAML structure for `inspec.yml`
#[derive(Debug, Deserialize)]
struct RawMetadata {
    name: String,

    #[serde(default)]
    title: Option<String>,

    #[serde(default)]
    version: Option<String>,

    #[serde(default)]
    summary: Option<String>,
}

impl ProfileMetadata {
    /// Parse from `inspec.yml` content
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let raw: RawMetadata = serde_yaml::from_str(yaml).map_err(|e| ConvertError::Yaml {
            path: None,
            message: e.to_string(),
        })?;
        Ok(Self {
            name: raw.name,
            title: raw.title,
            version: raw.version.unwrap_or_else(|| "0.1.0".to_string()),
            summary: raw.summary,
        })
    }

    /// Synthesize metadata when no `inspec.yml` is present
    pub fn fallback(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            title: None,
            version: "0.1.0".to_string(),
            summary: None,
        }
    }
}

/// The inputs for one conversion run: metadata plus loaded sources
#[derive(Debug, Clone)]
pub struct ProfileSources {
    pub metadata: ProfileMetadata,

    /// Control files, in load order
    pub controls: Vec<SourceFile>,

    /// Custom-resource support files (`libraries/`), in load order
    pub libraries: Vec<SourceFile>,
}

impl ProfileSources {
    pub fn new(metadata: ProfileMetadata) -> Self {
        Self {
            metadata,
            controls: Vec::new(),
            libraries: Vec::new(),
        }
    }

    /// Add a control source file
    pub fn with_control(mut self, file: SourceFile) -> Self {
        self.controls.push(file);
        self
    }

    /// Add a custom-resource support file
    pub fn with_library(mut self, file: SourceFile) -> Self {
        self.libraries.push(file);
        self
    }
}

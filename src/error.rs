//! Error types for profile conversion
//!
//! Only fatal conditions live here. Recoverable conditions (malformed spans,
//! untranslatable resources) are accumulated as [`crate::report::Diagnostic`]
//! values and never abort the pipeline.

use std::path::PathBuf;

/// Fatal conversion errors
#[derive(Debug)]
pub enum ConvertError {
    /// The supplied translator table is malformed (duplicate resource names,
    /// empty module names). Raised before any parsing begins.
    RegistryConfiguration { message: String },

    /// Zero tasks were produced across the whole profile; there is nothing
    /// meaningful to assemble.
    EmptyCollection { controls_total: usize },

    /// IO error while loading sources or publishing output
    Io { path: PathBuf, message: String },

    /// YAML parse or serialization error
    Yaml {
        path: Option<PathBuf>,
        message: String,
    },

    /// Output destination already exists; the packager never overwrites
    OutputExists { path: PathBuf },
}

impl std::fmt::Display for ConvertError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RegistryConfiguration { message } => {
                write!(f, "Registry configuration error: {}", message)
            }
            Self::EmptyCollection { controls_total } => {
                write!(
                    f,
                    "No tasks produced from {} control(s); refusing to assemble an empty collection",
                    controls_total
                )
            }
            Self::Io { path, message } => {
                write!(f, "IO error for {:?}: {}", path, message)
            }
            Self::Yaml { path, message } => match path {
                Some(p) => write!(f, "YAML error in {:?}: {}", p, message),
                None => write!(f, "YAML error: {}", message),
            },
            Self::OutputExists { path } => {
                write!(f, "Output destination {:?} already exists", path)
            }
        }
    }
}

impl std::error::Error for ConvertError {}

impl From<std::io::Error> for ConvertError {
    fn from(e: std::io::Error) -> Self {
        Self::Io {
            path: PathBuf::new(),
            message: e.to_string(),
        }
    }
}

impl From<serde_yaml::Error> for ConvertError {
    fn from(e: serde_yaml::Error) -> Self {
        Self::Yaml {
            path: None,
            message: e.to_string(),
        }
    }
}

/// Result type alias for conversion operations
pub type Result<T> = std::result::Result<T, ConvertError>;

//! # Portcullis
//!
//! Translation engine that converts InSpec compliance profiles into
//! equivalent Ansible collections, executable without the InSpec runtime.
//!
//! The pipeline is a sequential set of stages, each consuming the previous
//! stage's output:
//!
//! - **Tokenizer**: scans control-file text into lexical spans, capturing
//!   quoted identifiers with a same-delimiter rule so embedded opposite-kind
//!   quotes survive intact
//! - **Parser**: builds [`parser::Control`] records with verbatim ids,
//!   declared fields, and ordered resource calls
//! - **Translation engine**: maps each resource call through the
//!   [`registry::TranslatorRegistry`] to extraction and assertion tasks with
//!   matcher-preserving conditions
//! - **Custom resource detector**: synthesizes stub strategies for
//!   user-authored resources found in the profile's support files
//! - **Collection assembler**: lays out metadata, categorized task groups,
//!   the playbook, and the result-collection plugin reference
//! - **Packager**: stages the collection tree on disk and publishes it
//!   atomically
//!
//! Recoverable problems (malformed spans, untranslatable resources) are
//! accumulated as diagnostics in the run's [`report::TranslationSummary`]
//! and never abort a run; the fatal conditions are enumerated in
//! [`error::ConvertError`].
//!
//! ## Quick Start
//!
//! ```ignore
//! use portcullis::convert::Converter;
//! use portcullis::packager::Packager;
//! use portcullis::profile::{ProfileMetadata, ProfileSources, SourceFile};
//!
//! let sources = ProfileSources::new(ProfileMetadata::fallback("baseline"))
//!     .with_control(SourceFile::new("controls/ssh.rb", ssh_source));
//!
//! let conversion = Converter::new().convert(&sources)?;
//! Packager::new().write(&conversion.collection, "out/baseline".as_ref())?;
//! ```

pub mod collection;
pub mod convert;
pub mod custom;
pub mod error;
pub mod packager;
pub mod parser;
pub mod profile;
pub mod registry;
pub mod report;
pub mod sanitize;
pub mod tokenizer;
pub mod translate;

// Re-exports for the common entry points
pub use collection::{Collection, CollectionAssembler, TaskCategory};
pub use convert::{Conversion, Converter};
pub use error::{ConvertError, Result};
pub use packager::Packager;
pub use profile::{ProfileMetadata, ProfileSources, SourceFile};
pub use registry::{NativeTemplate, ResourceKind, TranslationStrategy, TranslatorRegistry};
pub use report::{Diagnostic, SourceLocator, TranslationSummary};

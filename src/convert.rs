//! Conversion Pipeline
//!
//! Wires the stages together for one profile: custom-resource detection,
//! per-file parsing, translation, and assembly. Each stage consumes the
//! previous stage's output as a finite sequence; recoverable diagnostics
//! accumulate into the run's [`TranslationSummary`] and only the fatal
//! conditions in [`crate::error::ConvertError`] abort.
//!
//! # Example
//!
//! ```ignore
//! use portcullis::convert::Converter;
//! use portcullis::profile::{ProfileMetadata, ProfileSources, SourceFile};
//!
//! let sources = ProfileSources::new(ProfileMetadata::fallback("baseline"))
//!     .with_control(SourceFile::new("controls/ssh.rb", ssh_text));
//!
//! let conversion = Converter::new().convert(&sources)?;
//! println!("{} controls translated", conversion.summary.controls_translated);
//! ```

use crate::collection::{galaxy_name, Collection, CollectionAssembler, DEFAULT_NAMESPACE};
use crate::custom;
use crate::error::Result;
use crate::parser;
use crate::profile::ProfileSources;
use crate::registry::TranslatorRegistry;
use crate::report::TranslationSummary;
use crate::translate::TranslationEngine;

/// A completed conversion: the assembled collection plus the run summary
/// (also embedded in the collection metadata)
#[derive(Debug)]
pub struct Conversion {
    pub collection: Collection,
    pub summary: TranslationSummary,
}

/// One-profile conversion pipeline.
///
/// The base registry is shared read-only; custom-resource fallbacks detected
/// in the profile extend a run-local copy, so concurrent conversions never
/// observe each other's resources.
#[derive(Debug)]
pub struct Converter {
    registry: TranslatorRegistry,
    namespace: String,
}

impl Default for Converter {
    fn default() -> Self {
        Self::new()
    }
}

impl Converter {
    /// Converter with the builtin translator table
    pub fn new() -> Self {
        Self {
            registry: TranslatorRegistry::builtin(),
            namespace: DEFAULT_NAMESPACE.to_string(),
        }
    }

    /// Converter with an injected, pre-validated registry
    pub fn with_registry(registry: TranslatorRegistry) -> Self {
        Self {
            registry,
            namespace: DEFAULT_NAMESPACE.to_string(),
        }
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    /// Run the full pipeline on one profile's loaded sources
    pub fn convert(&self, sources: &ProfileSources) -> Result<Conversion> {
        let mut summary = TranslationSummary::new();

        // Custom resources extend a run-local registry copy
        let mut registry = self.registry.clone();
        let definitions = custom::detect_resources(&sources.libraries);
        let registered = custom::register_fallbacks(&mut registry, &definitions);
        if !registered.is_empty() {
            tracing::info!(
                resources = ?registered,
                "registered custom-resource fallbacks"
            );
        }

        // Parse every control file; malformed spans are diagnostics, not
        // failures, so later controls still come through.
        let mut controls = Vec::new();
        for file in &sources.controls {
            let parsed = parser::parse_file(&file.path, &file.text);
            summary.extend(parsed.diagnostics);
            controls.extend(parsed.controls);
        }
        summary.controls_total = controls.len();

        // Translate in source order
        let stub_module = format!(
            "{}.{}.resource_stub",
            self.namespace,
            galaxy_name(&sources.metadata.name)
        );
        let mut engine = TranslationEngine::new(&registry, stub_module);
        let translated: Vec<_> = controls
            .iter()
            .map(|c| engine.translate_control(c))
            .collect();
        summary.extend(engine.take_diagnostics());
        summary.controls_translated = translated.iter().filter(|c| c.task_count() > 0).count();
        summary.controls_untranslatable =
            translated.iter().filter(|c| c.task_count() == 0).count();

        tracing::info!(
            profile = %sources.metadata.name,
            controls = summary.controls_total,
            translated = summary.controls_translated,
            untranslatable = summary.controls_untranslatable,
            "translation complete"
        );

        let collection = CollectionAssembler::new()
            .with_namespace(self.namespace.clone())
            .assemble(&sources.metadata, &translated, summary.clone())?;

        Ok(Conversion {
            collection,
            summary,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConvertError;
    use crate::profile::{ProfileMetadata, SourceFile};

    fn sources_with(controls: &[(&str, &str)]) -> ProfileSources {
        let mut sources = ProfileSources::new(ProfileMetadata::fallback("unit-test"));
        for (path, text) in controls {
            sources = sources.with_control(SourceFile::new(*path, *text));
        }
        sources
    }

    #[test]
    fn test_end_to_end_counts() {
        let sources = sources_with(&[(
            "controls/base.rb",
            r#"
control 'good' do
  describe file('/etc/passwd') do
    it { should exist }
  end
end

control 'bad' do
  describe unknown_widget('x') do
    it { should exist }
  end
end
"#,
        )]);

        let conversion = Converter::new().convert(&sources).unwrap();
        assert_eq!(conversion.summary.controls_total, 2);
        assert_eq!(conversion.summary.controls_translated, 1);
        assert_eq!(conversion.summary.controls_untranslatable, 1);
        assert_eq!(conversion.summary.untranslatable_count(), 1);
        assert!(conversion.collection.total_tasks() > 0);
    }

    #[test]
    fn test_total_failure_is_fatal() {
        let sources = sources_with(&[(
            "controls/base.rb",
            r#"
control 'only-bad' do
  describe unknown_widget('x') do
    it { should exist }
  end
end
"#,
        )]);

        let err = Converter::new().convert(&sources).unwrap_err();
        assert!(matches!(err, ConvertError::EmptyCollection { .. }));
    }

    #[test]
    fn test_custom_library_resource_translates() {
        let mut sources = sources_with(&[(
            "controls/custom.rb",
            r#"
control 'custom' do
  describe app_settings('/etc/app.conf') do
    its('retention_days') { should cmp >= 90 }
  end
end
"#,
        )]);
        sources = sources.with_library(SourceFile::new(
            "libraries/app_settings.rb",
            r#"
class AppSettings < Inspec.resource(1)
  name 'app_settings'
  def retention_days
  end
end
"#,
        ));

        let conversion = Converter::new().convert(&sources).unwrap();
        assert_eq!(conversion.summary.controls_translated, 1);
        assert!(conversion.summary.diagnostics.is_empty());

        let stub_tasks: Vec<_> = conversion
            .collection
            .task_groups
            .values()
            .flatten()
            .filter(|t| t.module == "portcullis.unit_test.resource_stub")
            .collect();
        assert_eq!(stub_tasks.len(), 1);
    }

    #[test]
    fn test_multi_file_profile_parses_all_files() {
        let sources = sources_with(&[
            (
                "controls/one.rb",
                "control 'a' do\n  describe file('/a') do\n    it { should exist }\n  end\nend\n",
            ),
            (
                "controls/two.rb",
                "control 'b' do\n  describe file('/b') do\n    it { should exist }\n  end\nend\n",
            ),
        ]);

        let conversion = Converter::new().convert(&sources).unwrap();
        assert_eq!(conversion.summary.controls_total, 2);
        assert_eq!(conversion.summary.controls_translated, 2);
    }

    #[test]
    fn test_diversely_quoted_regression() {
        // Many controls with embedded opposite-kind quotes, as in the
        // CIS-benchmark shape that motivated the same-quote header rule.
        let mut src = String::new();
        for i in 0..358 {
            if i % 2 == 0 {
                src.push_str(&format!(
                    "control \"{}.{}.{} (L1) Ensure 'Some policy' is set to 'value {}'\" do\n",
                    1 + i / 100,
                    (i / 10) % 10,
                    i % 10,
                    i
                ));
            } else {
                src.push_str(&format!(
                    "control '{}.{}.{} (L1) Ensure \"Some policy\" is set to \"value {}\"' do\n",
                    1 + i / 100,
                    (i / 10) % 10,
                    i % 10,
                    i
                ));
            }
            src.push_str("  describe file('/etc/example') do\n    it { should exist }\n  end\nend\n\n");
        }

        let sources = sources_with(&[("controls/cis.rb", src.as_str())]);
        let conversion = Converter::new().convert(&sources).unwrap();

        assert_eq!(conversion.summary.controls_total, 358);
        assert_eq!(conversion.summary.controls_translated, 358);

        let symbols: std::collections::HashSet<_> = conversion
            .collection
            .task_groups
            .values()
            .flatten()
            .filter_map(|t| t.register.clone())
            .collect();
        // one extraction register and one assert register per control
        assert_eq!(symbols.len(), 358 * 2);
    }
}

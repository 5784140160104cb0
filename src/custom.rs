//! Custom Resource Detector
//!
//! Profiles may ship user-authored resources under `libraries/`. This
//! scanner finds `Inspec.resource` class definitions in those support files,
//! collects their declared resource name and instance methods, and
//! synthesizes a [`CustomFallback`] registry entry for each one not already
//! covered by the base table. The fallback keeps the translation engine
//! total for known custom resources; the emitted stub task is a best-effort
//! bridge, and the stub module itself is a generated artifact outside this
//! engine.

use std::collections::BTreeSet;

use regex::Regex;

use crate::profile::SourceFile;
use crate::registry::{CustomFallback, TranslatorRegistry};

/// A custom resource discovered in a support file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceDefinition {
    /// Declared resource name (`name 'foo'` inside the class body)
    pub name: String,

    /// Declared instance methods
    pub declared_methods: BTreeSet<String>,

    /// Support file the definition came from
    pub source_path: String,
}

/// Scan support files for custom resource definitions.
///
/// Method attribution is per class block: a `def` belongs to the most recent
/// `Inspec.resource` class opened above it in the same file.
pub fn detect_resources(libraries: &[SourceFile]) -> Vec<ResourceDefinition> {
    // Patterns are fixed; construction cannot fail at runtime.
    let class_re =
        Regex::new(r"class\s+(\w+)\s*<\s*Inspec\.resource").expect("class pattern is valid");
    let name_re =
        Regex::new(r#"^\s*name\s+['"]([^'"]+)['"]"#).expect("name pattern is valid");
    let def_re =
        Regex::new(r"^\s*def\s+([a-zA-Z_][a-zA-Z0-9_?!]*)").expect("def pattern is valid");

    let mut definitions = Vec::new();

    for file in libraries {
        let mut current: Option<ResourceDefinition> = None;

        for line in file.text.lines() {
            if class_re.is_match(line) {
                if let Some(def) = current.take() {
                    if !def.name.is_empty() {
                        definitions.push(def);
                    }
                }
                current = Some(ResourceDefinition {
                    name: String::new(),
                    declared_methods: BTreeSet::new(),
                    source_path: file.path.clone(),
                });
                continue;
            }

            let Some(def) = current.as_mut() else {
                continue;
            };

            if def.name.is_empty() {
                if let Some(caps) = name_re.captures(line) {
                    def.name = caps[1].to_string();
                    continue;
                }
            }

            if let Some(caps) = def_re.captures(line) {
                let method = caps[1].to_string();
                // Constructor is plumbing, not an inspectable method
                if method != "initialize" {
                    def.declared_methods.insert(method);
                }
            }
        }

        if let Some(def) = current.take() {
            if !def.name.is_empty() {
                definitions.push(def);
            }
        }
    }

    tracing::debug!(found = definitions.len(), "scanned support files for custom resources");
    definitions
}

/// Register fallbacks for every detected resource not already in the table.
/// Returns the names actually registered, in detection order.
pub fn register_fallbacks(
    registry: &mut TranslatorRegistry,
    definitions: &[ResourceDefinition],
) -> Vec<String> {
    let mut registered = Vec::new();
    for def in definitions {
        let added = registry.register_custom(CustomFallback {
            name: def.name.clone(),
            methods: def.declared_methods.clone(),
        });
        if added {
            registered.push(def.name.clone());
        }
    }
    registered
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::TranslationStrategy;

    fn library(text: &str) -> SourceFile {
        SourceFile::new("libraries/app_settings.rb", text)
    }

    #[test]
    fn test_detects_resource_with_methods() {
        let defs = detect_resources(&[library(
            r#"
class AppSettings < Inspec.resource(1)
  name 'app_settings'
  desc 'Reads application settings'

  def initialize(path)
    @path = path
  end

  def retention_days
    read_config['retention']
  end

  def encrypted?
    read_config['encrypted'] == 'true'
  end

  private

  def read_config
    {}
  end
end
"#,
        )]);

        assert_eq!(defs.len(), 1);
        assert_eq!(defs[0].name, "app_settings");
        assert!(defs[0].declared_methods.contains("retention_days"));
        assert!(defs[0].declared_methods.contains("encrypted?"));
        assert!(!defs[0].declared_methods.contains("initialize"));
    }

    #[test]
    fn test_multiple_classes_in_one_file() {
        let defs = detect_resources(&[library(
            r#"
class One < Inspec.resource(1)
  name 'one'
  def alpha
  end
end

class Two < Inspec.resource(1)
  name 'two'
  def beta
  end
end
"#,
        )]);

        let names: Vec<&str> = defs.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["one", "two"]);
        assert!(defs[0].declared_methods.contains("alpha"));
        assert!(!defs[0].declared_methods.contains("beta"));
    }

    #[test]
    fn test_class_without_name_declaration_skipped() {
        let defs = detect_resources(&[library(
            r#"
class Helper < Inspec.resource(1)
  def whatever
  end
end
"#,
        )]);
        assert!(defs.is_empty());
    }

    #[test]
    fn test_non_resource_classes_ignored() {
        let defs = detect_resources(&[library(
            r#"
class PlainHelper
  def util
  end
end
"#,
        )]);
        assert!(defs.is_empty());
    }

    #[test]
    fn test_register_fallbacks_respects_base_table() {
        let mut registry = TranslatorRegistry::builtin();
        let defs = vec![
            ResourceDefinition {
                name: "file".to_string(), // shadows a builtin: must not register
                declared_methods: BTreeSet::new(),
                source_path: "libraries/shadow.rb".to_string(),
            },
            ResourceDefinition {
                name: "app_settings".to_string(),
                declared_methods: BTreeSet::from(["retention_days".to_string()]),
                source_path: "libraries/app_settings.rb".to_string(),
            },
        ];

        let registered = register_fallbacks(&mut registry, &defs);
        assert_eq!(registered, vec!["app_settings"]);
        assert!(matches!(
            registry.lookup("app_settings"),
            Some(TranslationStrategy::Custom(_))
        ));
        assert!(matches!(
            registry.lookup("file"),
            Some(TranslationStrategy::Native(_))
        ));
    }
}

//! Resource Translator Registry
//!
//! Maps InSpec resource names to translation strategies. The registry is an
//! explicitly constructed, immutable value handed to the translation engine;
//! the base table is validated up front and a malformed table fails the run
//! before any parsing begins. Strategy dispatch is a closed variant set
//! (native template or custom fallback), resolved once per resource call.
//!
//! The builtin table covers the common infrastructure-inspection resources.
//! Embedding applications extend the catalog through
//! [`TranslatorRegistry::with_entries`] without modifying the engine.

use std::collections::{BTreeMap, BTreeSet};

use crate::error::{ConvertError, Result};

/// Closed set of natively translatable resource shapes. The per-kind
/// parameter mapping and condition emission live in the translation engine;
/// the kind makes that dispatch exhaustiveness-checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    File,
    Directory,
    Service,
    Package,
    Port,
    User,
    Group,
    RegistryKey,
    ParseConfigFile,
    Command,
}

impl ResourceKind {
    /// Ansible module that performs the data-extraction step for this kind
    pub fn facts_module(self) -> &'static str {
        match self {
            Self::File | Self::Directory => "ansible.builtin.stat",
            Self::Service => "ansible.builtin.service_facts",
            Self::Package => "ansible.builtin.package_facts",
            Self::Port => "ansible.builtin.wait_for",
            Self::Command => "ansible.builtin.command",
            Self::User | Self::Group => "ansible.builtin.getent",
            Self::RegistryKey => "ansible.windows.win_reg_stat",
            Self::ParseConfigFile => "ansible.builtin.slurp",
        }
    }
}

/// Predefined mapping from one resource name to native automation tasks
#[derive(Debug, Clone)]
pub struct NativeTemplate {
    /// Resource name this template translates
    pub resource: String,

    pub kind: ResourceKind,

    /// Extraction-task module; assertion conditions evaluate its registered
    /// result
    pub facts_module: String,

    /// Whether an extraction task precedes the assertion task. Every builtin
    /// kind extracts; injected templates may assert directly.
    pub requires_extraction: bool,
}

impl NativeTemplate {
    pub fn new(resource: impl Into<String>, kind: ResourceKind) -> Self {
        Self {
            resource: resource.into(),
            kind,
            facts_module: kind.facts_module().to_string(),
            requires_extraction: true,
        }
    }
}

/// Synthesized stand-in for a user-authored resource (see `custom.rs`)
#[derive(Debug, Clone)]
pub struct CustomFallback {
    /// Resource name as declared in the support file
    pub name: String,

    /// Instance methods declared by the resource class
    pub methods: BTreeSet<String>,
}

/// Translation strategy for one resource name
#[derive(Debug, Clone)]
pub enum TranslationStrategy {
    Native(NativeTemplate),
    Custom(CustomFallback),
}

/// Read-only lookup table from resource name to strategy.
///
/// Built once per run (base table shared read-only across concurrent runs is
/// fine; the table is never mutated during translation).
#[derive(Debug, Clone)]
pub struct TranslatorRegistry {
    entries: BTreeMap<String, TranslationStrategy>,
}

impl TranslatorRegistry {
    /// The builtin base table
    pub fn builtin() -> Self {
        let mut entries = BTreeMap::new();
        for (name, kind) in [
            ("file", ResourceKind::File),
            ("directory", ResourceKind::Directory),
            ("service", ResourceKind::Service),
            ("package", ResourceKind::Package),
            ("port", ResourceKind::Port),
            ("user", ResourceKind::User),
            ("group", ResourceKind::Group),
            ("registry_key", ResourceKind::RegistryKey),
            ("parse_config_file", ResourceKind::ParseConfigFile),
            ("command", ResourceKind::Command),
        ] {
            entries.insert(
                name.to_string(),
                TranslationStrategy::Native(NativeTemplate::new(name, kind)),
            );
        }
        Self { entries }
    }

    /// Build a registry from a caller-supplied table, validating it before
    /// any parsing begins
    pub fn with_entries(
        entries: impl IntoIterator<Item = (String, TranslationStrategy)>,
    ) -> Result<Self> {
        let mut table = BTreeMap::new();
        for (name, strategy) in entries {
            if name.trim().is_empty() {
                return Err(ConvertError::RegistryConfiguration {
                    message: "empty resource name in translator table".to_string(),
                });
            }
            if let TranslationStrategy::Native(template) = &strategy {
                if template.requires_extraction && template.facts_module.trim().is_empty() {
                    return Err(ConvertError::RegistryConfiguration {
                        message: format!(
                            "template for `{}` requires extraction but names no facts module",
                            name
                        ),
                    });
                }
            }
            if table.insert(name.clone(), strategy).is_some() {
                return Err(ConvertError::RegistryConfiguration {
                    message: format!("duplicate resource name `{}` in translator table", name),
                });
            }
        }
        Ok(Self { entries: table })
    }

    /// Look up the strategy for a resource name
    pub fn lookup(&self, resource_name: &str) -> Option<&TranslationStrategy> {
        self.entries.get(resource_name)
    }

    /// Register a synthesized custom-resource fallback. Base entries win:
    /// a custom definition never shadows an existing strategy.
    pub fn register_custom(&mut self, fallback: CustomFallback) -> bool {
        if self.entries.contains_key(&fallback.name) {
            return false;
        }
        self.entries
            .insert(fallback.name.clone(), TranslationStrategy::Custom(fallback));
        true
    }

    /// Registered resource names, in stable order
    pub fn resource_names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

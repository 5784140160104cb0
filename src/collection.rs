//! Collection Assembler
//!
//! Lays out the full output artifact model from the translated controls: one
//! metadata record, one task group per category, one playbook referencing
//! every group, and a reference to the bundled result-collection callback
//! plugin. Assembly is deterministic: given the same profile and registry,
//! two runs produce identical output apart from the build timestamp.
//!
//! A run in which no control produced any task is a total translation
//! failure; the assembler refuses to emit a collection for it.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::{ConvertError, Result};
use crate::profile::ProfileMetadata;
use crate::report::TranslationSummary;
use crate::translate::{Task, TranslatedControl};

/// Default collection namespace
pub const DEFAULT_NAMESPACE: &str = "portcullis";

/// Path of the bundled result-collection callback plugin, relative to the
/// collection root
pub const RESULT_PLUGIN_REF: &str = "plugins/callback/compliance_summary.py";

/// Task-group categories, derived from module names. Ordered by category
/// name so group iteration is stable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskCategory {
    CommandExec,
    Custom,
    Filesystem,
    Identity,
    Network,
    PackageMgmt,
    Service,
    WindowsRegistry,
}

impl TaskCategory {
    /// Role/group name in the generated collection
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CommandExec => "command_exec",
            Self::Custom => "custom",
            Self::Filesystem => "filesystem",
            Self::Identity => "identity",
            Self::Network => "network",
            Self::PackageMgmt => "package_mgmt",
            Self::Service => "service",
            Self::WindowsRegistry => "windows_registry",
        }
    }

    /// Default classification of an extraction/stub module name
    pub fn classify(module: &str) -> Self {
        match module {
            "ansible.builtin.stat" | "ansible.builtin.slurp" | "ansible.builtin.file" => {
                Self::Filesystem
            }
            "ansible.builtin.service_facts" | "ansible.builtin.systemd" => Self::Service,
            "ansible.builtin.package_facts" | "ansible.builtin.package" => Self::PackageMgmt,
            "ansible.builtin.wait_for" | "ansible.builtin.uri" => Self::Network,
            "ansible.builtin.getent" => Self::Identity,
            "ansible.windows.win_reg_stat" => Self::WindowsRegistry,
            "ansible.builtin.command" | "ansible.builtin.shell" => Self::CommandExec,
            _ => Self::Custom,
        }
    }
}

impl Ord for TaskCategory {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.as_str().cmp(other.as_str())
    }
}

impl PartialOrd for TaskCategory {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl std::fmt::Display for TaskCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Collection metadata record (drives `galaxy.yml`)
#[derive(Debug, Clone, Serialize)]
pub struct CollectionMetadata {
    pub namespace: String,

    /// Galaxy-safe collection name derived from the profile name
    pub name: String,

    pub version: String,
    pub title: Option<String>,
    pub summary: Option<String>,

    /// Build timestamp; the one non-deterministic field
    pub build_time: DateTime<Utc>,

    /// Translation counts and diagnostics from this run
    pub translation: TranslationSummary,
}

/// The generated playbook: every category group in stable order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Playbook {
    pub name: String,
    pub hosts: String,
    pub roles: Vec<String>,
}

/// The assembled output artifact model, handed to the packager and never
/// mutated afterwards
#[derive(Debug)]
pub struct Collection {
    pub metadata: CollectionMetadata,
    pub task_groups: BTreeMap<TaskCategory, Vec<Task>>,
    pub playbook: Playbook,
    pub result_plugin_ref: String,
}

impl Collection {
    pub fn total_tasks(&self) -> usize {
        self.task_groups.values().map(Vec::len).sum()
    }
}

/// Builds a [`Collection`] from translated controls
#[derive(Debug)]
pub struct CollectionAssembler {
    namespace: String,

    /// Caller-supplied classification overrides, keyed by module name
    category_overrides: BTreeMap<String, TaskCategory>,
}

impl Default for CollectionAssembler {
    fn default() -> Self {
        Self::new()
    }
}

impl CollectionAssembler {
    pub fn new() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
            category_overrides: BTreeMap::new(),
        }
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    /// Override the category for a module name
    pub fn with_category(mut self, module: impl Into<String>, category: TaskCategory) -> Self {
        self.category_overrides.insert(module.into(), category);
        self
    }

    fn classify(&self, module: &str) -> TaskCategory {
        self.category_overrides
            .get(module)
            .copied()
            .unwrap_or_else(|| TaskCategory::classify(module))
    }

    /// Assemble the collection. Fails with [`ConvertError::EmptyCollection`]
    /// when zero tasks were produced across the whole profile.
    pub fn assemble(
        &self,
        profile: &ProfileMetadata,
        controls: &[TranslatedControl],
        summary: TranslationSummary,
    ) -> Result<Collection> {
        let mut task_groups: BTreeMap<TaskCategory, Vec<Task>> = BTreeMap::new();

        // Controls in source order, units in body order: within a category
        // the original ordering is preserved.
        for control in controls {
            for unit in &control.units {
                let category = self.classify(&unit.source_module);
                task_groups
                    .entry(category)
                    .or_default()
                    .extend(unit.tasks.iter().cloned());
            }
        }

        let total: usize = task_groups.values().map(Vec::len).sum();
        if total == 0 {
            return Err(ConvertError::EmptyCollection {
                controls_total: summary.controls_total,
            });
        }

        let name = galaxy_name(&profile.name);
        let roles: Vec<String> = task_groups.keys().map(|c| c.as_str().to_string()).collect();

        tracing::info!(
            collection = %format!("{}.{}", self.namespace, name),
            tasks = total,
            groups = task_groups.len(),
            "assembled collection"
        );

        Ok(Collection {
            metadata: CollectionMetadata {
                namespace: self.namespace.clone(),
                name,
                version: profile.version.clone(),
                title: profile.title.clone(),
                summary: profile.summary.clone(),
                build_time: Utc::now(),
                translation: summary,
            },
            task_groups,
            playbook: Playbook {
                name: profile.name.clone(),
                hosts: "all".to_string(),
                roles,
            },
            result_plugin_ref: RESULT_PLUGIN_REF.to_string(),
        })
    }
}

/// Galaxy collection names allow lowercase alphanumerics and underscores
pub fn galaxy_name(profile_name: &str) -> String {
    let mut out = String::with_capacity(profile_name.len());
    let mut pending = false;
    for c in profile_name.chars() {
        if c.is_ascii_alphanumeric() {
            if pending && !out.is_empty() {
                out.push('_');
            }
            pending = false;
            out.push(c.to_ascii_lowercase());
        } else {
            pending = true;
        }
    }
    if out.is_empty() {
        out.push_str("profile");
    }
    // Leading digits are not valid galaxy names
    if out.starts_with(|c: char| c.is_ascii_digit()) {
        out.insert(0, '_');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_file;
    use crate::registry::TranslatorRegistry;
    use crate::translate::TranslationEngine;

    fn assemble_src(src: &str) -> Result<Collection> {
        let registry = TranslatorRegistry::builtin();
        let parsed = parse_file("controls/test.rb", src);
        let mut engine = TranslationEngine::new(&registry, "portcullis.test.resource_stub");
        let controls: Vec<_> = parsed
            .controls
            .iter()
            .map(|c| engine.translate_control(c))
            .collect();

        let mut summary = TranslationSummary::new();
        summary.controls_total = parsed.controls.len();
        summary.controls_translated = controls.iter().filter(|c| c.task_count() > 0).count();
        summary.controls_untranslatable =
            controls.iter().filter(|c| c.task_count() == 0).count();
        summary.extend(engine.take_diagnostics());

        CollectionAssembler::new().assemble(
            &ProfileMetadata::fallback("test-profile"),
            &controls,
            summary,
        )
    }

    const MIXED: &str = r#"
control 'fs-check' do
  describe file('/etc/shadow') do
    it { should exist }
  end
end

control 'svc-check' do
  describe service('auditd') do
    it { should be_running }
  end
end

control 'net-check' do
  describe port(22) do
    it { should be_listening }
  end
end
"#;

    #[test]
    fn test_groups_by_category_in_stable_order() {
        let collection = assemble_src(MIXED).unwrap();

        let categories: Vec<&str> = collection
            .task_groups
            .keys()
            .map(|c| c.as_str())
            .collect();
        assert_eq!(categories, vec!["filesystem", "network", "service"]);
        assert_eq!(collection.playbook.roles, vec!["filesystem", "network", "service"]);
        assert_eq!(collection.playbook.hosts, "all");
        assert_eq!(collection.result_plugin_ref, RESULT_PLUGIN_REF);
    }

    #[test]
    fn test_metadata_carries_profile_and_summary() {
        let collection = assemble_src(MIXED).unwrap();
        assert_eq!(collection.metadata.namespace, "portcullis");
        assert_eq!(collection.metadata.name, "test_profile");
        assert_eq!(collection.metadata.translation.controls_total, 3);
        assert_eq!(collection.metadata.translation.controls_translated, 3);
    }

    #[test]
    fn test_empty_collection_is_fatal() {
        let err = assemble_src(
            r#"
control 'hopeless' do
  describe mystery_resource('x') do
    it { should exist }
  end
end
"#,
        )
        .unwrap_err();

        match err {
            ConvertError::EmptyCollection { controls_total } => assert_eq!(controls_total, 1),
            other => panic!("expected EmptyCollection, got {:?}", other),
        }
    }

    #[test]
    fn test_assembly_is_deterministic() {
        let a = assemble_src(MIXED).unwrap();
        let b = assemble_src(MIXED).unwrap();

        let names = |c: &Collection| {
            c.task_groups
                .values()
                .flatten()
                .map(|t| t.name.clone())
                .collect::<Vec<_>>()
        };
        assert_eq!(names(&a), names(&b));
        assert_eq!(a.playbook, b.playbook);
    }

    #[test]
    fn test_category_override() {
        let registry = TranslatorRegistry::builtin();
        let parsed = parse_file(
            "controls/test.rb",
            "control 'c' do\n  describe file('/x') do\n    it { should exist }\n  end\nend\n",
        );
        let mut engine = TranslationEngine::new(&registry, "portcullis.test.resource_stub");
        let controls: Vec<_> = parsed
            .controls
            .iter()
            .map(|c| engine.translate_control(c))
            .collect();

        let mut summary = TranslationSummary::new();
        summary.controls_total = 1;
        summary.controls_translated = 1;

        let collection = CollectionAssembler::new()
            .with_category("ansible.builtin.stat", TaskCategory::Custom)
            .assemble(&ProfileMetadata::fallback("p"), &controls, summary)
            .unwrap();

        assert!(collection.task_groups.contains_key(&TaskCategory::Custom));
        assert!(!collection.task_groups.contains_key(&TaskCategory::Filesystem));
    }

    #[test]
    fn test_galaxy_name_normalization() {
        assert_eq!(galaxy_name("cis-windows2019"), "cis_windows2019");
        assert_eq!(galaxy_name("CIS Benchmark!"), "cis_benchmark");
        assert_eq!(galaxy_name("2019-baseline"), "_2019_baseline");
        assert_eq!(galaxy_name("---"), "profile");
    }
}

//! Collection Packager
//!
//! Serializes the assembled [`Collection`] to an on-disk Ansible-collection
//! directory tree: `galaxy.yml`, one role per task group, the playbook, and
//! the bundled callback plugin. Output is staged in a sibling temporary
//! directory and atomically renamed into place on success; partial output is
//! never published.

use std::fs;
use std::path::{Path, PathBuf};

use serde_yaml::{Mapping, Value};

use crate::collection::Collection;
use crate::error::{ConvertError, Result};
use crate::translate::Task;

/// Generated callback plugin: tallies per-assertion results into one
/// compliance summary at the end of the play.
const CALLBACK_PLUGIN: &str = r#"# Generated by portcullis. Collects per-assertion outcomes into a
# compliance summary printed at the end of the play.
from ansible.plugins.callback import CallbackBase

DOCUMENTATION = """
    name: compliance_summary
    type: aggregate
    short_description: compliance result roll-up
"""


class CallbackModule(CallbackBase):
    CALLBACK_VERSION = 2.0
    CALLBACK_TYPE = "aggregate"
    CALLBACK_NAME = "compliance_summary"

    def __init__(self):
        super(CallbackModule, self).__init__()
        self.passed = 0
        self.failed = 0

    def v2_runner_on_ok(self, result):
        if result._task.action.endswith("assert"):
            self.passed += 1

    def v2_runner_on_failed(self, result, ignore_errors=False):
        if result._task.action.endswith("assert"):
            self.failed += 1

    def v2_playbook_on_stats(self, stats):
        self._display.display(
            "compliance summary: %d passed, %d failed" % (self.passed, self.failed)
        )
"#;

/// Generated bridge module for custom-resource stub tasks. Reports the
/// requested resource/method opaquely; behavioral fidelity for user-authored
/// resource logic stays with the profile author.
const STUB_MODULE: &str = r#"# Generated by portcullis. Bridge module for custom InSpec resources:
# reports the requested resource, method, and arguments without evaluating
# the original Ruby logic.
from ansible.module_utils.basic import AnsibleModule


def main():
    module = AnsibleModule(
        argument_spec=dict(
            resource=dict(type="str", required=True),
            args=dict(type="list", default=[]),
            assertions=dict(type="list", default=[]),
        ),
        supports_check_mode=True,
    )
    module.exit_json(
        changed=False,
        resource=module.params["resource"],
        args=module.params["args"],
        assertions=module.params["assertions"],
        skipped_reason="custom resource requires manual review",
    )


if __name__ == "__main__":
    main()
"#;

/// Writes a [`Collection`] to disk
#[derive(Debug, Default)]
pub struct Packager;

impl Packager {
    pub fn new() -> Self {
        Self
    }

    /// Write the collection tree under `dest`. `dest` must not exist; the
    /// tree is staged next to it and renamed into place only when every file
    /// has been written.
    pub fn write(&self, collection: &Collection, dest: &Path) -> Result<()> {
        if dest.exists() {
            return Err(ConvertError::OutputExists {
                path: dest.to_path_buf(),
            });
        }

        let staging = staging_dir(dest)?;
        if staging.exists() {
            fs::remove_dir_all(&staging).map_err(|e| io_err(&staging, e))?;
        }

        let outcome = self.write_tree(collection, &staging);
        if outcome.is_err() {
            // Never leave partial output behind
            let _ = fs::remove_dir_all(&staging);
            return outcome;
        }

        fs::rename(&staging, dest).map_err(|e| io_err(dest, e))?;
        tracing::info!(dest = %dest.display(), "published collection");
        Ok(())
    }

    fn write_tree(&self, collection: &Collection, root: &Path) -> Result<()> {
        fs::create_dir_all(root).map_err(|e| io_err(root, e))?;

        write_file(&root.join("galaxy.yml"), &render_galaxy(collection)?)?;
        write_file(&root.join("README.md"), &render_readme(collection))?;

        for (category, tasks) in &collection.task_groups {
            let dir = root.join("roles").join(category.as_str()).join("tasks");
            fs::create_dir_all(&dir).map_err(|e| io_err(&dir, e))?;
            write_file(&dir.join("main.yml"), &render_tasks(tasks)?)?;
        }

        let playbook_dir = root.join("playbooks");
        fs::create_dir_all(&playbook_dir).map_err(|e| io_err(&playbook_dir, e))?;
        write_file(&playbook_dir.join("site.yml"), &render_playbook(collection)?)?;

        let plugin_path = root.join(&collection.result_plugin_ref);
        if let Some(parent) = plugin_path.parent() {
            fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
        }
        write_file(&plugin_path, CALLBACK_PLUGIN)?;

        if uses_stub(collection) {
            let modules_dir = root.join("plugins").join("modules");
            fs::create_dir_all(&modules_dir).map_err(|e| io_err(&modules_dir, e))?;
            write_file(&modules_dir.join("resource_stub.py"), STUB_MODULE)?;
        }

        Ok(())
    }
}

fn uses_stub(collection: &Collection) -> bool {
    collection
        .task_groups
        .values()
        .flatten()
        .any(|t| t.module.ends_with(".resource_stub"))
}

fn staging_dir(dest: &Path) -> Result<PathBuf> {
    let name = dest
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| ConvertError::Io {
            path: dest.to_path_buf(),
            message: "destination has no usable directory name".to_string(),
        })?;
    Ok(dest.with_file_name(format!(".{}.staging", name)))
}

fn io_err(path: &Path, e: std::io::Error) -> ConvertError {
    ConvertError::Io {
        path: path.to_path_buf(),
        message: e.to_string(),
    }
}

fn write_file(path: &Path, content: &str) -> Result<()> {
    fs::write(path, content).map_err(|e| io_err(path, e))
}

fn ystr(s: &str) -> Value {
    Value::String(s.to_string())
}

fn render_galaxy(collection: &Collection) -> Result<String> {
    let meta = &collection.metadata;
    let mut m = Mapping::new();
    m.insert(ystr("namespace"), ystr(&meta.namespace));
    m.insert(ystr("name"), ystr(&meta.name));
    m.insert(ystr("version"), ystr(&meta.version));
    m.insert(ystr("readme"), ystr("README.md"));
    m.insert(
        ystr("description"),
        ystr(meta.summary.as_deref().unwrap_or("Generated compliance collection")),
    );
    m.insert(
        ystr("authors"),
        Value::Sequence(vec![ystr("portcullis profile converter")]),
    );
    m.insert(ystr("tags"), Value::Sequence(vec![ystr("compliance"), ystr("security")]));
    Ok(serde_yaml::to_string(&Value::Mapping(m))?)
}

fn render_readme(collection: &Collection) -> String {
    let meta = &collection.metadata;
    let mut out = String::new();
    out.push_str(&format!("# {}.{}\n\n", meta.namespace, meta.name));
    if let Some(title) = &meta.title {
        out.push_str(&format!("{}\n\n", title));
    }
    out.push_str(&format!(
        "Generated from a compliance profile on {}.\n\n",
        meta.build_time.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    out.push_str(&format!(
        "Translation: {} of {} control(s) translated, {} untranslatable, {} diagnostic(s).\n",
        meta.translation.controls_translated,
        meta.translation.controls_total,
        meta.translation.controls_untranslatable,
        meta.translation.diagnostics.len()
    ));
    out
}

fn task_value(task: &Task) -> Value {
    let mut m = Mapping::new();
    m.insert(ystr("name"), ystr(&task.name));

    let mut params = Mapping::new();
    for (key, value) in &task.parameters {
        params.insert(ystr(key), value.clone());
    }
    if let Some(that) = &task.assertion {
        params.insert(
            ystr("that"),
            Value::Sequence(that.iter().map(|c| ystr(c)).collect()),
        );
    }
    m.insert(ystr(&task.module), Value::Mapping(params));

    if let Some(register) = &task.register {
        m.insert(ystr("register"), ystr(register));
    }
    if task.ignore_errors {
        m.insert(ystr("ignore_errors"), Value::Bool(true));
    }
    if let Some(changed) = task.changed_when {
        m.insert(ystr("changed_when"), Value::Bool(changed));
    }
    Value::Mapping(m)
}

fn render_tasks(tasks: &[Task]) -> Result<String> {
    let seq: Vec<Value> = tasks.iter().map(task_value).collect();
    Ok(format!("---\n{}", serde_yaml::to_string(&Value::Sequence(seq))?))
}

fn render_playbook(collection: &Collection) -> Result<String> {
    let playbook = &collection.playbook;
    let mut play = Mapping::new();
    play.insert(
        ystr("name"),
        ystr(&format!("Compliance checks: {}", playbook.name)),
    );
    play.insert(ystr("hosts"), ystr(&playbook.hosts));
    play.insert(
        ystr("roles"),
        Value::Sequence(
            playbook
                .roles
                .iter()
                .map(|r| {
                    ystr(&format!(
                        "{}.{}.{}",
                        collection.metadata.namespace, collection.metadata.name, r
                    ))
                })
                .collect(),
        ),
    );
    Ok(format!(
        "---\n{}",
        serde_yaml::to_string(&Value::Sequence(vec![Value::Mapping(play)]))?
    ))
}

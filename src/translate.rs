//! Translation Engine
//!
//! Turns parsed resource calls into native Ansible tasks. For each call the
//! engine resolves a strategy in the [`TranslatorRegistry`] and emits a
//! data-extraction task (result captured into a `register` variable) followed
//! by an assertion task whose conditions evaluate the captured state. Every
//! emitted task carries `ignore_errors: true` and its own register so a
//! failing check never aborts the play and every outcome is individually
//! recoverable for reporting.
//!
//! Matcher semantics are preserved exactly: `>=` stays `>=`, `match` becomes
//! a regex search, package version comparisons use the `version()` test. A
//! matcher with no safe native equivalent marks the whole resource call
//! untranslatable (diagnostic, not fatal) rather than approximating it.

use std::collections::BTreeMap;

use serde_yaml::Value;

use crate::parser::{Assertion, CmpOp, Control, MatchValue, Matcher, ResourceCall};
use crate::registry::{CustomFallback, NativeTemplate, ResourceKind, TranslationStrategy, TranslatorRegistry};
use crate::report::Diagnostic;
use crate::sanitize::SymbolAllocator;

/// One generated automation task
#[derive(Debug, Clone)]
pub struct Task {
    pub name: String,

    /// Fully qualified module name
    pub module: String,

    /// Module parameters
    pub parameters: BTreeMap<String, Value>,

    /// Variable capturing the task result
    pub register: Option<String>,

    pub ignore_errors: bool,

    /// `changed_when: false` for read-only command probes
    pub changed_when: Option<bool>,

    /// Assertion conditions (`that:` expressions); set only on assert tasks
    pub assertion: Option<Vec<String>>,
}

impl Task {
    fn new(name: impl Into<String>, module: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            module: module.into(),
            parameters: BTreeMap::new(),
            register: None,
            ignore_errors: false,
            changed_when: None,
            assertion: None,
        }
    }

    fn param(mut self, key: &str, value: Value) -> Self {
        self.parameters.insert(key.to_string(), value);
        self
    }
}

/// Tasks produced from one resource call, kept together so the assertion
/// stays adjacent to the extraction it references
#[derive(Debug, Clone)]
pub struct TranslatedUnit {
    /// Module driving category classification (the extraction/stub module)
    pub source_module: String,

    pub tasks: Vec<Task>,
}

/// One control with its generated tasks
#[derive(Debug, Clone)]
pub struct TranslatedControl {
    pub id: String,
    pub title: Option<String>,
    pub impact: f64,
    pub tags: BTreeMap<String, String>,

    /// Run-unique sanitized symbol for variable/task naming
    pub symbol: String,

    /// Units in source body order
    pub units: Vec<TranslatedUnit>,
}

impl TranslatedControl {
    /// Total generated tasks
    pub fn task_count(&self) -> usize {
        self.units.iter().map(|u| u.tasks.len()).sum()
    }
}

/// Per-run translation engine. Holds the run-local symbol allocator; the
/// registry itself is shared read-only.
pub struct TranslationEngine<'r> {
    registry: &'r TranslatorRegistry,
    symbols: SymbolAllocator,

    /// FQCN of the generated bridge module for custom-resource stubs
    stub_module: String,

    diagnostics: Vec<Diagnostic>,
}

impl<'r> TranslationEngine<'r> {
    pub fn new(registry: &'r TranslatorRegistry, stub_module: impl Into<String>) -> Self {
        Self {
            registry,
            symbols: SymbolAllocator::new(),
            stub_module: stub_module.into(),
            diagnostics: Vec::new(),
        }
    }

    /// Drain accumulated diagnostics
    pub fn take_diagnostics(&mut self) -> Vec<Diagnostic> {
        std::mem::take(&mut self.diagnostics)
    }

    /// Translate one control, preserving body order
    pub fn translate_control(&mut self, control: &Control) -> TranslatedControl {
        let symbol = self.symbols.allocate(&control.id);
        let mut units = Vec::new();

        for (index, call) in control.body.iter().enumerate() {
            match self.translate_call(control, call, &symbol, index + 1) {
                Ok(unit) => units.push(unit),
                Err(reason) => {
                    self.diagnostics.push(Diagnostic::UntranslatableResource {
                        control_id: control.id.clone(),
                        resource_name: call.resource_name.clone(),
                        reason,
                    });
                }
            }
        }

        tracing::debug!(
            control = %control.id,
            symbol = %symbol,
            units = units.len(),
            "translated control"
        );

        TranslatedControl {
            id: control.id.clone(),
            title: control.title.clone(),
            impact: control.impact,
            tags: control.tags.clone(),
            symbol,
            units,
        }
    }

    fn translate_call(
        &mut self,
        control: &Control,
        call: &ResourceCall,
        symbol: &str,
        index: usize,
    ) -> std::result::Result<TranslatedUnit, String> {
        let registry = self.registry;
        let strategy = registry
            .lookup(&call.resource_name)
            .ok_or_else(|| "no registry entry and no custom-resource fallback".to_string())?;

        match strategy {
            TranslationStrategy::Native(template) => {
                self.translate_native(control, call, template, symbol, index)
            }
            TranslationStrategy::Custom(fallback) => {
                Ok(self.translate_custom(control, call, fallback, symbol, index))
            }
        }
    }

    fn translate_native(
        &mut self,
        control: &Control,
        call: &ResourceCall,
        template: &NativeTemplate,
        symbol: &str,
        index: usize,
    ) -> std::result::Result<TranslatedUnit, String> {
        if call.assertions.is_empty() {
            return Err("describe block carries no recognizable assertions".to_string());
        }

        // Reserved through the allocator: a control id can sanitize straight
        // to another control's register name.
        let register = self.symbols.derive(symbol, &format!("r{}", index));

        // Conditions first: an unsupported matcher fails the whole call
        // before any task is emitted.
        let mut conditions = Vec::with_capacity(call.assertions.len());
        for assertion in &call.assertions {
            let expr = build_condition(template.kind, call, assertion, &register)?;
            conditions.push(if assertion.negated {
                format!("not ({})", expr)
            } else {
                expr
            });
        }

        let mut tasks = Vec::new();
        if template.requires_extraction {
            tasks.push(extraction_task(template.kind, call, control, &register)?);
        }

        let mut assert_task = Task::new(
            format!("{} | verify {}", control.id, call.resource_name),
            "ansible.builtin.assert",
        );
        assert_task.register = Some(self.symbols.derive(symbol, &format!("a{}", index)));
        assert_task.ignore_errors = true;
        assert_task.assertion = Some(conditions);
        tasks.push(assert_task);

        Ok(TranslatedUnit {
            source_module: template.facts_module.clone(),
            tasks,
        })
    }

    /// Custom resources bridge through a generated stub module: one task per
    /// call, resource name and arguments passed through opaquely. The stub's
    /// report is the pass-through result; full behavioral fidelity for
    /// user-authored logic is out of scope.
    fn translate_custom(
        &mut self,
        control: &Control,
        call: &ResourceCall,
        fallback: &CustomFallback,
        symbol: &str,
        index: usize,
    ) -> TranslatedUnit {
        let assertions: Vec<Value> = call
            .assertions
            .iter()
            .map(|a| {
                let mut m = serde_yaml::Mapping::new();
                m.insert(ystr("method"), ystr(a.target.as_deref().unwrap_or("default")));
                m.insert(ystr("negated"), Value::Bool(a.negated));
                let (matcher, expected) = matcher_parts(&a.matcher);
                m.insert(ystr("matcher"), ystr(matcher));
                if let Some(expected) = expected {
                    m.insert(ystr("expected"), ystr(expected));
                }
                Value::Mapping(m)
            })
            .collect();

        let task = Task::new(
            format!("{} | custom resource {}", control.id, fallback.name),
            self.stub_module.clone(),
        )
        .param("resource", ystr(&fallback.name))
        .param(
            "args",
            Value::Sequence(call.arguments.iter().map(|a| ystr(&a.text)).collect()),
        )
        .param("assertions", Value::Sequence(assertions));

        let mut task = task;
        task.register = Some(self.symbols.derive(symbol, &format!("r{}", index)));
        task.ignore_errors = true;

        TranslatedUnit {
            source_module: self.stub_module.clone(),
            tasks: vec![task],
        }
    }
}

fn ystr(s: &str) -> Value {
    Value::String(s.to_string())
}

/// Matcher name and expected value for the opaque stub payload
fn matcher_parts(matcher: &Matcher) -> (&'static str, Option<&str>) {
    match matcher {
        Matcher::Eq(v) => ("eq", Some(v.text.as_str())),
        Matcher::Cmp { op, value } => (
            match op {
                CmpOp::Eq => "cmp_eq",
                CmpOp::Gte => "cmp_gte",
                CmpOp::Lte => "cmp_lte",
                CmpOp::Gt => "cmp_gt",
                CmpOp::Lt => "cmp_lt",
            },
            Some(value.text.as_str()),
        ),
        Matcher::Include(v) => ("include", Some(v)),
        Matcher::Match(v) => ("match", Some(v)),
        Matcher::Exist => ("exist", None),
        Matcher::BeRunning => ("be_running", None),
        Matcher::BeInstalled => ("be_installed", None),
        Matcher::BeEnabled => ("be_enabled", None),
        Matcher::BeListening => ("be_listening", None),
        Matcher::BeFile => ("be_file", None),
        Matcher::BeDirectory => ("be_directory", None),
    }
}

fn parse_port(token: &str) -> std::result::Result<u16, String> {
    token
        .parse::<u16>()
        .map_err(|_| format!("port argument `{}` is not a literal port number", token))
}

/// First argument, required to be a literal. Expression arguments (`input(...)`,
/// variables) have no value at translation time; embedding their source text
/// as a literal would silently change the check's meaning.
fn primary_arg<'a>(call: &'a ResourceCall) -> std::result::Result<&'a str, String> {
    let arg = call
        .arguments
        .first()
        .ok_or_else(|| format!("resource `{}` called without arguments", call.resource_name))?;
    if !arg.literal {
        return Err(format!(
            "argument `{}` is an expression, not a literal",
            arg.text
        ));
    }
    Ok(&arg.text)
}

/// Build the extraction task for a native template
fn extraction_task(
    kind: ResourceKind,
    call: &ResourceCall,
    control: &Control,
    register: &str,
) -> std::result::Result<Task, String> {
    let mut task = Task::new(
        format!("{} | collect {}", control.id, call.resource_name),
        kind.facts_module(),
    );
    task.ignore_errors = true;

    match kind {
        ResourceKind::File | ResourceKind::Directory => {
            task = task.param("path", ystr(primary_arg(call)?));
            task.register = Some(register.to_string());
        }
        // service_facts / package_facts populate ansible_facts directly
        ResourceKind::Service | ResourceKind::Package => {}
        ResourceKind::Port => {
            // Probe, not wait: a short timeout keeps closed ports cheap
            task = task
                .param("port", Value::Number(parse_port(primary_arg(call)?)?.into()))
                .param("state", ystr("started"))
                .param("timeout", Value::Number(3.into()));
            task.register = Some(register.to_string());
        }
        ResourceKind::User => {
            task = task
                .param("database", ystr("passwd"))
                .param("key", ystr(primary_arg(call)?));
        }
        ResourceKind::Group => {
            task = task
                .param("database", ystr("group"))
                .param("key", ystr(primary_arg(call)?));
        }
        ResourceKind::RegistryKey => {
            // Last argument is the key path; earlier ones are display names
            let path = call
                .arguments
                .last()
                .ok_or_else(|| "registry_key called without a path".to_string())?;
            if !path.literal {
                return Err(format!(
                    "registry path `{}` is an expression, not a literal",
                    path.text
                ));
            }
            task = task.param("path", ystr(&path.text));
            task.register = Some(register.to_string());
        }
        ResourceKind::ParseConfigFile => {
            task = task.param("src", ystr(primary_arg(call)?));
            task.register = Some(register.to_string());
        }
        ResourceKind::Command => {
            task = task.param("cmd", ystr(primary_arg(call)?));
            task.register = Some(register.to_string());
            task.changed_when = Some(false);
        }
    }

    Ok(task)
}

/// Quote a literal for embedding in a Jinja condition
fn jq(value: &str) -> String {
    format!("'{}'", value.replace('\\', "\\\\").replace('\'', "\\'"))
}

/// A token safe to embed as a Jinja number literal. Leading-zero forms are
/// excluded: `0644` is invalid Python 3 syntax, and treating it as decimal
/// would corrupt octal-intended values anyway.
fn jinja_number(value: &str) -> bool {
    if value.parse::<f64>().is_err() {
        return false;
    }
    let digits = value.strip_prefix('-').unwrap_or(value);
    !(digits.len() > 1 && digits.starts_with('0') && !digits.starts_with("0."))
}

/// Numeric coercion applies only to bare numeric tokens; a quoted value
/// (`cmp '0000'`) compares as the string the source wrote.
fn cmp_expr(subject: &str, op: CmpOp, value: &MatchValue) -> String {
    if !value.quoted && jinja_number(&value.text) {
        format!("{} | int {} {}", subject, op.as_str(), value.text)
    } else {
        format!("{} {} {}", subject, op.as_str(), jq(&value.text))
    }
}

/// Build one matcher-preserving Jinja condition. `Err` carries the reason
/// the assertion has no safe native equivalent.
fn build_condition(
    kind: ResourceKind,
    call: &ResourceCall,
    assertion: &Assertion,
    register: &str,
) -> std::result::Result<String, String> {
    let unsupported = |what: &str| {
        Err(format!(
            "no native equivalent for {} on resource `{}`",
            what, call.resource_name
        ))
    };

    match kind {
        ResourceKind::File | ResourceKind::Directory => match (&assertion.target, &assertion.matcher) {
            (None, Matcher::Exist) => Ok(format!("{}.stat.exists", register)),
            (None, Matcher::BeFile) => Ok(format!("{}.stat.isreg | default(false)", register)),
            (None, Matcher::BeDirectory) => Ok(format!("{}.stat.isdir | default(false)", register)),
            (Some(prop), matcher) => {
                let subject = match prop.as_str() {
                    "mode" => format!("{}.stat.mode | default('')", register),
                    "owner" => format!("{}.stat.pw_name | default('')", register),
                    "group" => format!("{}.stat.gr_name | default('')", register),
                    "size" => format!("{}.stat.size | default(0)", register),
                    other => return unsupported(&format!("property `{}`", other)),
                };
                value_condition(&subject, matcher)
                    .ok_or_else(|| format!("matcher not expressible for file property `{}`", prop))
            }
            (None, m) => unsupported(&format!("matcher {:?}", m)),
        },

        ResourceKind::Service => {
            let name = primary_arg(call)?;
            let entry = format!("(ansible_facts.services[{}] | default({{}}))", jq(name));
            match (&assertion.target, &assertion.matcher) {
                (None, Matcher::BeRunning) => {
                    Ok(format!("{}.state | default('') == 'running'", entry))
                }
                (None, Matcher::BeEnabled) => {
                    Ok(format!("{}.status | default('') == 'enabled'", entry))
                }
                (None, Matcher::BeInstalled) | (None, Matcher::Exist) => {
                    Ok(format!("{} in ansible_facts.services", jq(name)))
                }
                _ => unsupported("service assertion"),
            }
        }

        ResourceKind::Package => {
            let name = primary_arg(call)?;
            match (&assertion.target, &assertion.matcher) {
                (None, Matcher::BeInstalled) | (None, Matcher::Exist) => {
                    Ok(format!("{} in ansible_facts.packages", jq(name)))
                }
                (Some(prop), matcher) if prop == "version" => {
                    let subject =
                        format!("ansible_facts.packages[{}][0].version | default('')", jq(name));
                    // The version() test keeps ordered comparisons exact
                    let versioned = |op: &str, v: &str| {
                        format!("{} is version({}, '{}')", subject, jq(v), op)
                    };
                    match matcher {
                        Matcher::Eq(v) => Ok(versioned("==", &v.text)),
                        Matcher::Cmp { op, value } => Ok(versioned(op.as_str(), &value.text)),
                        Matcher::Match(pat) => Ok(format!("{} is search({})", subject, jq(pat))),
                        _ => unsupported("package version matcher"),
                    }
                }
                _ => unsupported("package assertion"),
            }
        }

        ResourceKind::Port => match (&assertion.target, &assertion.matcher) {
            (None, Matcher::BeListening) => {
                Ok(format!("not ({}.failed | default(true))", register))
            }
            _ => unsupported("port assertion"),
        },

        ResourceKind::User => {
            let name = primary_arg(call)?;
            match (&assertion.target, &assertion.matcher) {
                (None, Matcher::Exist) => Ok(format!(
                    "{} in (ansible_facts.getent_passwd | default({{}}))",
                    jq(name)
                )),
                (Some(prop), matcher) => {
                    // getent passwd fields after the key: passwd, uid, gid,
                    // gecos, home, shell
                    let field = match prop.as_str() {
                        "uid" => 1,
                        "gid" => 2,
                        "home" => 4,
                        "shell" => 5,
                        other => return unsupported(&format!("user property `{}`", other)),
                    };
                    let subject =
                        format!("ansible_facts.getent_passwd[{}][{}]", jq(name), field);
                    value_condition(&subject, matcher)
                        .ok_or_else(|| format!("matcher not expressible for user `{}`", prop))
                }
                _ => unsupported("user assertion"),
            }
        }

        ResourceKind::Group => {
            let name = primary_arg(call)?;
            match (&assertion.target, &assertion.matcher) {
                (None, Matcher::Exist) => Ok(format!(
                    "{} in (ansible_facts.getent_group | default({{}}))",
                    jq(name)
                )),
                (Some(prop), matcher) if prop == "gid" => {
                    let subject = format!("ansible_facts.getent_group[{}][1]", jq(name));
                    value_condition(&subject, matcher)
                        .ok_or_else(|| "matcher not expressible for group gid".to_string())
                }
                _ => unsupported("group assertion"),
            }
        }

        ResourceKind::RegistryKey => match (&assertion.target, &assertion.matcher) {
            (None, Matcher::Exist) => Ok(format!("{}.exists | default(false)", register)),
            (Some(prop), matcher) => {
                let subject = format!(
                    "({}.properties[{}] | default({{}})).value | default('')",
                    register,
                    jq(prop)
                );
                value_condition(&subject, matcher)
                    .ok_or_else(|| format!("matcher not expressible for registry value `{}`", prop))
            }
            (None, m) => unsupported(&format!("matcher {:?}", m)),
        },

        ResourceKind::ParseConfigFile => match (&assertion.target, &assertion.matcher) {
            (Some(key), matcher) => {
                // Pull the keyed value out of the slurped content, then apply
                // the matcher to the extracted string.
                let subject = format!(
                    "({}.content | b64decode | regex_search('(?m)^\\\\s*{}\\\\s*[=:]\\\\s*(.*)$', '\\\\1') | first | default('') | trim)",
                    register,
                    regex::escape(key)
                );
                value_condition(&subject, matcher).ok_or_else(|| {
                    format!("matcher not expressible for config key `{}`", key)
                })
            }
            _ => unsupported("config-file assertion without a key"),
        },

        ResourceKind::Command => match (&assertion.target, &assertion.matcher) {
            (Some(prop), matcher) => {
                let subject = match prop.as_str() {
                    "stdout" => format!("{}.stdout | default('')", register),
                    "stderr" => format!("{}.stderr | default('')", register),
                    "exit_status" => format!("{}.rc | default(-1)", register),
                    other => return unsupported(&format!("command property `{}`", other)),
                };
                value_condition(&subject, matcher)
                    .ok_or_else(|| format!("matcher not expressible for command `{}`", prop))
            }
            _ => unsupported("bare command assertion"),
        },
    }
}

/// Generic value matchers shared across kinds. Returns `None` for pairs with
/// no exact equivalent.
fn value_condition(subject: &str, matcher: &Matcher) -> Option<String> {
    match matcher {
        Matcher::Eq(v) => Some(if !v.quoted && jinja_number(&v.text) {
            format!("{} | int == {}", subject, v.text)
        } else {
            format!("{} == {}", subject, jq(&v.text))
        }),
        Matcher::Cmp { op, value } => Some(cmp_expr(subject, *op, value)),
        Matcher::Include(v) => Some(format!("{} in {}", jq(v), subject)),
        Matcher::Match(pat) => Some(format!("{} | string is search({})", subject, jq(pat))),
        _ => None,
    }
}

//! Control Parser
//!
//! Consumes the tokenizer's span stream and yields [`Control`] records:
//! verbatim identifier, declared fields (`title`, `desc`, `impact`, `tag`),
//! and the ordered resource calls found in the body. Field statements are
//! extracted by keyword lookahead; the first occurrence wins and later
//! duplicates are recorded as non-fatal diagnostics.
//!
//! Body expressions the parser does not recognize are retained verbatim on
//! the control (`opaque`) for manual review rather than dropped.

use std::collections::BTreeMap;

use crate::report::{Diagnostic, SourceLocator};
use crate::tokenizer::{self, scan_quoted, strip_line_comment, LexSpan};

/// Neutral default when `impact` is absent, out of range, or unparseable
pub const DEFAULT_IMPACT: f64 = 0.5;

/// One named compliance check
#[derive(Debug, Clone)]
pub struct Control {
    /// Verbatim identifier from the declaration, internal quotes preserved
    pub id: String,

    pub title: Option<String>,
    pub desc: Option<String>,

    /// Impact score in [0.0, 1.0]
    pub impact: f64,

    /// `tag` declarations; bare tags map to an empty value
    pub tags: BTreeMap<String, String>,

    /// Resource calls in body order
    pub body: Vec<ResourceCall>,

    /// Unrecognized body expressions, retained for manual review
    pub opaque: Vec<String>,

    /// Location of the declaration
    pub locator: SourceLocator,
}

/// One assertion unit inside a control body: a `describe` block
#[derive(Debug, Clone)]
pub struct ResourceCall {
    /// Resource identifier, e.g. `file`, `service`, `registry_key`
    pub resource_name: String,

    /// Argument tokens in call order
    pub arguments: Vec<Argument>,

    /// Assertions in block order
    pub assertions: Vec<Assertion>,

    /// One-based line of the `describe` keyword
    pub line: usize,
}

/// One resource-call argument token.
///
/// Quoted strings and bare numbers are literals; anything else (`input(...)`,
/// variable references, interpolation) is an expression whose value only
/// exists at profile runtime. Translation must not treat expression text as
/// a literal value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Argument {
    /// Unquoted literal text, or the raw expression source
    pub text: String,

    pub literal: bool,
}

impl Argument {
    pub fn literal(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            literal: true,
        }
    }

    pub fn expression(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            literal: false,
        }
    }
}

/// One `it`/`its` expectation inside a describe block
#[derive(Debug, Clone, PartialEq)]
pub struct Assertion {
    /// `its('...')` target property, `None` for plain `it` expectations
    pub target: Option<String>,

    /// `should_not` negation
    pub negated: bool,

    pub matcher: Matcher,
}

/// Comparison operator for `cmp`/`be` matchers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Gte,
    Lte,
    Gt,
    Lt,
}

impl CmpOp {
    /// Jinja-side operator text
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Eq => "==",
            Self::Gte => ">=",
            Self::Lte => "<=",
            Self::Gt => ">",
            Self::Lt => "<",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "==" => Some(Self::Eq),
            ">=" => Some(Self::Gte),
            "<=" => Some(Self::Lte),
            ">" => Some(Self::Gt),
            "<" => Some(Self::Lt),
            _ => None,
        }
    }
}

/// Expected value of an `eq`/`cmp` matcher, source quoting preserved.
///
/// `cmp '0000'` and `cmp 0` are different assertions: the quoted form
/// compares as a string (octal file modes depend on this), the bare form as
/// a number. The flag keeps that distinction through translation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchValue {
    pub text: String,

    /// True when the source wrote the value as a quoted literal
    pub quoted: bool,
}

impl MatchValue {
    pub fn quoted(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            quoted: true,
        }
    }

    pub fn bare(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            quoted: false,
        }
    }
}

/// Closed matcher set. Translation must preserve these semantics exactly;
/// a matcher with no safe native equivalent is surfaced as untranslatable,
/// never silently relaxed.
#[derive(Debug, Clone, PartialEq)]
pub enum Matcher {
    /// `should eq <value>` (strict equality)
    Eq(MatchValue),

    /// `should cmp <op> <value>` / `should be <op> <value>`
    Cmp { op: CmpOp, value: MatchValue },

    /// `should include <value>`
    Include(String),

    /// `should match <pattern>`
    Match(String),

    /// `should exist`
    Exist,

    /// Predicate matchers with no expected value
    BeRunning,
    BeInstalled,
    BeEnabled,
    BeListening,
    BeFile,
    BeDirectory,
}

/// Parse result for one control file
#[derive(Debug, Default)]
pub struct ParsedFile {
    pub controls: Vec<Control>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Tokenize and parse one control source file
pub fn parse_file(path: &str, text: &str) -> ParsedFile {
    let stream = tokenizer::tokenize(path, text);
    let mut out = ParsedFile {
        diagnostics: stream.diagnostics,
        ..Default::default()
    };

    let mut spans = stream.spans.into_iter().peekable();
    while let Some(span) = spans.next() {
        let LexSpan::ControlHeader { id, line, column } = span else {
            continue;
        };

        let body = match spans.peek() {
            Some(LexSpan::ControlBody { .. }) => match spans.next() {
                Some(LexSpan::ControlBody { text, line }) => Some((text, line)),
                _ => None,
            },
            _ => None,
        };

        let locator = SourceLocator::new(path, line, column);
        let control = match body {
            Some((body_text, body_line)) => parse_control(
                id,
                locator,
                &body_text,
                body_line,
                path,
                &mut out.diagnostics,
            ),
            None => Control {
                id,
                title: None,
                desc: None,
                impact: DEFAULT_IMPACT,
                tags: BTreeMap::new(),
                body: Vec::new(),
                opaque: Vec::new(),
                locator,
            },
        };
        out.controls.push(control);
    }

    tracing::debug!(
        path = %path,
        controls = out.controls.len(),
        diagnostics = out.diagnostics.len(),
        "parsed control file"
    );
    out
}

fn parse_control(
    id: String,
    locator: SourceLocator,
    body: &str,
    body_line: usize,
    path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) -> Control {
    let mut control = Control {
        id,
        title: None,
        desc: None,
        impact: DEFAULT_IMPACT,
        tags: BTreeMap::new(),
        body: Vec::new(),
        opaque: Vec::new(),
        locator,
    };
    let mut impact_seen = false;

    let lines: Vec<&str> = body.lines().collect();
    let mut i = 0;

    while i < lines.len() {
        let trimmed = strip_line_comment(lines[i]).trim();
        let at = |idx: usize| SourceLocator::new(path, body_line + idx, 1);

        if trimmed.is_empty() || trimmed.starts_with('#') {
            i += 1;
            continue;
        }

        if let Some(rest) = keyword(trimmed, "impact") {
            if impact_seen {
                diagnostics.push(Diagnostic::DuplicateField {
                    control_id: control.id.clone(),
                    field: "impact".into(),
                    locator: at(i),
                });
            } else {
                impact_seen = true;
                control.impact = parse_impact(rest, &control.id, at(i), diagnostics);
            }
            i += 1;
            continue;
        }

        if let Some(rest) = keyword(trimmed, "title") {
            take_quoted_field(&mut control.title, rest, "title", &control.id, at(i), diagnostics);
            i += 1;
            continue;
        }

        if let Some(rest) = keyword(trimmed, "desc").or_else(|| keyword(trimmed, "description")) {
            take_quoted_field(&mut control.desc, rest, "desc", &control.id, at(i), diagnostics);
            i += 1;
            continue;
        }

        if let Some(rest) = keyword(trimmed, "tag") {
            parse_tags(rest, &mut control.tags);
            i += 1;
            continue;
        }

        if keyword(trimmed, "only_if").is_some() {
            diagnostics.push(Diagnostic::RuntimeGuard {
                control_id: control.id.clone(),
                locator: at(i),
            });
            // Skip the guard block when it opens one
            if trimmed.ends_with("do") {
                i = skip_block(&lines, i + 1);
            } else {
                i += 1;
            }
            continue;
        }

        if let Some(rest) = keyword(trimmed, "describe") {
            let (call, next) = parse_describe(rest, &lines, i, body_line, &mut control.opaque);
            match call {
                Some(call) => control.body.push(call),
                None => control.opaque.push(trimmed.to_string()),
            }
            i = next;
            continue;
        }

        control.opaque.push(trimmed.to_string());
        i += 1;
    }

    control
}

/// Match `keyword` followed by whitespace, `(` or a quote; returns the rest
fn keyword<'a>(line: &'a str, kw: &str) -> Option<&'a str> {
    let rest = line.strip_prefix(kw)?;
    match rest.chars().next() {
        None => Some(rest),
        Some(c) if c.is_whitespace() || c == '(' || c == '\'' || c == '"' => Some(rest),
        _ => None,
    }
}

fn take_quoted_field(
    slot: &mut Option<String>,
    rest: &str,
    field: &str,
    control_id: &str,
    locator: SourceLocator,
    diagnostics: &mut Vec<Diagnostic>,
) {
    if slot.is_some() {
        diagnostics.push(Diagnostic::DuplicateField {
            control_id: control_id.to_string(),
            field: field.to_string(),
            locator,
        });
        return;
    }
    if let Some((value, _)) = scan_quoted(rest) {
        *slot = Some(value);
    }
}

fn parse_impact(
    rest: &str,
    control_id: &str,
    locator: SourceLocator,
    diagnostics: &mut Vec<Diagnostic>,
) -> f64 {
    let token = rest.trim().trim_end_matches(',');
    match token.parse::<f64>() {
        Ok(v) if (0.0..=1.0).contains(&v) => v,
        Ok(v) => {
            diagnostics.push(Diagnostic::MalformedProfile {
                locator,
                message: format!(
                    "impact {} out of range [0.0, 1.0] in control '{}'; using {}",
                    v, control_id, DEFAULT_IMPACT
                ),
            });
            DEFAULT_IMPACT
        }
        Err(_) => {
            diagnostics.push(Diagnostic::MalformedProfile {
                locator,
                message: format!(
                    "unparseable impact `{}` in control '{}'; using {}",
                    token, control_id, DEFAULT_IMPACT
                ),
            });
            DEFAULT_IMPACT
        }
    }
}

/// Parse `tag key: 'value', other: 'v2'` and bare `tag 'name'` forms
fn parse_tags(rest: &str, tags: &mut BTreeMap<String, String>) {
    for part in split_top_level(rest) {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        if let Some(colon) = find_top_level_colon(part) {
            let key = part[..colon].trim().trim_matches(|c| c == '\'' || c == '"');
            let value = unquote(part[colon + 1..].trim());
            if !key.is_empty() {
                tags.entry(key.to_string()).or_insert(value);
            }
        } else {
            let key = unquote(part);
            if !key.is_empty() {
                tags.entry(key).or_insert_with(String::new);
            }
        }
    }
}

/// Parse a `describe resource(args) do ... end` block starting at `lines[i]`.
/// Returns the call (if the resource form is recognizable) and the index of
/// the line following the block.
fn parse_describe(
    rest: &str,
    lines: &[&str],
    i: usize,
    body_line: usize,
    opaque: &mut Vec<String>,
) -> (Option<ResourceCall>, usize) {
    let rest = rest.trim();

    // Resource name: identifier run up to `(` or whitespace
    let name_end = rest
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .unwrap_or(rest.len());
    let resource_name = &rest[..name_end];
    if resource_name.is_empty() {
        return (None, i + 1);
    }

    let after_name = rest[name_end..].trim_start();
    let arguments = if let Some(inner) = after_name.strip_prefix('(') {
        match inner.rfind(')') {
            Some(close) => split_top_level(&inner[..close])
                .into_iter()
                .map(|a| parse_argument(a.trim()))
                .filter(|a| !a.text.is_empty())
                .collect(),
            None => return (None, i + 1),
        }
    } else {
        Vec::new()
    };

    let mut call = ResourceCall {
        resource_name: resource_name.to_string(),
        arguments,
        assertions: Vec::new(),
        line: body_line + i,
    };

    if !rest.trim_end().ends_with("do") {
        // One-line describe with no block: nothing to assert on
        return (Some(call), i + 1);
    }

    // Walk the block, depth-aware
    let mut depth = 1;
    let mut j = i + 1;
    while j < lines.len() && depth > 0 {
        let t = strip_line_comment(lines[j]).trim();
        if t == "end" {
            depth -= 1;
            j += 1;
            continue;
        }
        if t.ends_with(" do") || t == "do" || (t.contains(" do |") && t.ends_with('|')) {
            depth += 1;
            j += 1;
            continue;
        }
        if depth == 1 {
            match parse_assertion(t) {
                Some(assertion) => call.assertions.push(assertion),
                None => {
                    if !t.is_empty() && !t.starts_with('#') {
                        opaque.push(t.to_string());
                    }
                }
            }
        } else if !t.is_empty() && !t.starts_with('#') {
            opaque.push(t.to_string());
        }
        j += 1;
    }

    (Some(call), j)
}

/// Skip a `do`/`end` block starting after its opener line; returns the index
/// after the closing `end`
fn skip_block(lines: &[&str], mut i: usize) -> usize {
    let mut depth = 1;
    while i < lines.len() && depth > 0 {
        let t = strip_line_comment(lines[i]).trim();
        if t == "end" {
            depth -= 1;
        } else if t.ends_with(" do") || t == "do" || (t.contains(" do |") && t.ends_with('|')) {
            depth += 1;
        }
        i += 1;
    }
    i
}

/// Parse one `it { should ... }` / `its('x') { should ... }` line
fn parse_assertion(line: &str) -> Option<Assertion> {
    let line = line.trim();
    let (target, rest) = if let Some(rest) = line.strip_prefix("its") {
        let rest = rest.trim_start();
        let inner = rest.strip_prefix('(')?;
        let close = inner.find(')')?;
        let raw = inner[..close].trim();
        let target = raw
            .strip_prefix(':')
            .map(str::to_string)
            .unwrap_or_else(|| unquote(raw));
        (Some(target), inner[close + 1..].trim_start())
    } else if let Some(rest) = line.strip_prefix("it") {
        (None, rest.trim_start())
    } else {
        return None;
    };

    let body = rest.strip_prefix('{')?.trim();
    let body = body.strip_suffix('}')?.trim_end();

    let (negated, expr) = if let Some(e) = body.strip_prefix("should_not") {
        (true, e.trim_start())
    } else if let Some(e) = body.strip_prefix("should") {
        (false, e.trim_start())
    } else {
        return None;
    };

    let matcher = parse_matcher(expr)?;
    Some(Assertion {
        target,
        negated,
        matcher,
    })
}

fn parse_matcher(expr: &str) -> Option<Matcher> {
    let expr = expr.trim();
    match expr {
        "exist" => return Some(Matcher::Exist),
        "be_running" => return Some(Matcher::BeRunning),
        "be_installed" => return Some(Matcher::BeInstalled),
        "be_enabled" => return Some(Matcher::BeEnabled),
        "be_listening" => return Some(Matcher::BeListening),
        "be_file" => return Some(Matcher::BeFile),
        "be_directory" => return Some(Matcher::BeDirectory),
        _ => {}
    }

    let (kw, rest) = expr.split_once(|c: char| c.is_whitespace() || c == '(')?;
    let rest = rest.trim().trim_end_matches(')').trim();

    match kw {
        "eq" => Some(Matcher::Eq(parse_value(rest))),
        "include" => Some(Matcher::Include(parse_value(rest).text)),
        "match" => Some(Matcher::Match(parse_pattern(rest))),
        "cmp" | "be" => {
            let mut parts = rest.splitn(2, char::is_whitespace);
            let first = parts.next()?;
            match CmpOp::parse(first) {
                Some(op) => Some(Matcher::Cmp {
                    op,
                    value: parse_value(parts.next()?.trim()),
                }),
                // `cmp 'value'` with no operator is equality
                None if kw == "cmp" => Some(Matcher::Cmp {
                    op: CmpOp::Eq,
                    value: parse_value(rest),
                }),
                None => None,
            }
        }
        _ => None,
    }
}

/// Classify a matcher value, applying the same-delimiter rule to quoted
/// literals and keeping anything else verbatim as a bare token
fn parse_value(token: &str) -> MatchValue {
    let token = token.trim();
    match scan_quoted(token) {
        Some((inner, rest)) if rest.trim().is_empty() => MatchValue::quoted(inner),
        _ => MatchValue::bare(token),
    }
}

/// Classify one resource-call argument token
fn parse_argument(token: &str) -> Argument {
    match scan_quoted(token) {
        Some((inner, rest)) if rest.trim().is_empty() => Argument::literal(inner),
        _ if !token.is_empty() && token.parse::<f64>().is_ok() => Argument::literal(token),
        _ => Argument::expression(token),
    }
}

/// `/pattern/` or quoted pattern
fn parse_pattern(token: &str) -> String {
    let token = token.trim();
    if token.len() >= 2 && token.starts_with('/') && token.ends_with('/') {
        return token[1..token.len() - 1].to_string();
    }
    unquote(token)
}

fn unquote(token: &str) -> String {
    match scan_quoted(token) {
        Some((inner, rest)) if rest.trim().is_empty() => inner,
        _ => token.to_string(),
    }
}

/// Split on commas at nesting depth zero, quote-aware
fn split_top_level(input: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    let mut depth = 0usize;

    for c in input.chars() {
        match quote {
            Some(q) => {
                current.push(c);
                if c == q {
                    quote = None;
                }
            }
            None => match c {
                '\'' | '"' => {
                    quote = Some(c);
                    current.push(c);
                }
                '(' | '[' | '{' => {
                    depth += 1;
                    current.push(c);
                }
                ')' | ']' | '}' => {
                    depth = depth.saturating_sub(1);
                    current.push(c);
                }
                ',' if depth == 0 => {
                    parts.push(std::mem::take(&mut current));
                }
                _ => current.push(c),
            },
        }
    }
    if !current.trim().is_empty() {
        parts.push(current);
    }
    parts
}

/// First `:` outside quotes, for `key: value` tag pairs
fn find_top_level_colon(input: &str) -> Option<usize> {
    let mut quote: Option<char> = None;
    for (idx, c) in input.char_indices() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None => match c {
                '\'' | '"' => quote = Some(c),
                ':' => return Some(idx),
                _ => {}
            },
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_one(src: &str) -> ParsedFile {
        parse_file("controls/test.rb", src)
    }

    #[test]
    fn test_full_control_fields() {
        let parsed = parse_one(
            r#"
control "2.2.27 (L1) Ensure 'Enable computer and user accounts' is set" do
  title "Ensure 'Enable computer and user accounts' is set"
  desc 'Verifies delegation trust settings'
  impact 0.7
  tag cis: '2.2.27', level: '1'
  tag 'windows'

  describe file('/etc/passwd') do
    it { should exist }
  end
end
"#,
        );

        assert_eq!(parsed.controls.len(), 1);
        let c = &parsed.controls[0];
        assert_eq!(
            c.id,
            "2.2.27 (L1) Ensure 'Enable computer and user accounts' is set"
        );
        assert_eq!(
            c.title.as_deref(),
            Some("Ensure 'Enable computer and user accounts' is set")
        );
        assert_eq!(c.desc.as_deref(), Some("Verifies delegation trust settings"));
        assert!((c.impact - 0.7).abs() < f64::EPSILON);
        assert_eq!(c.tags.get("cis").map(String::as_str), Some("2.2.27"));
        assert_eq!(c.tags.get("level").map(String::as_str), Some("1"));
        assert_eq!(c.tags.get("windows").map(String::as_str), Some(""));
        assert_eq!(c.body.len(), 1);
        assert!(parsed.diagnostics.is_empty());
    }

    #[test]
    fn test_duplicate_fields_first_wins() {
        let parsed = parse_one(
            r#"
control 'dup' do
  title 'first'
  title 'second'
  impact 0.3
  impact 0.9
end
"#,
        );

        let c = &parsed.controls[0];
        assert_eq!(c.title.as_deref(), Some("first"));
        assert!((c.impact - 0.3).abs() < f64::EPSILON);
        assert_eq!(parsed.diagnostics.len(), 2);
        assert!(parsed
            .diagnostics
            .iter()
            .all(|d| matches!(d, Diagnostic::DuplicateField { .. })));
    }

    #[test]
    fn test_impact_out_of_range_defaults() {
        let parsed = parse_one("control 'x' do\n  impact 3.5\nend\n");
        assert!((parsed.controls[0].impact - DEFAULT_IMPACT).abs() < f64::EPSILON);
        assert_eq!(parsed.diagnostics.len(), 1);

        let parsed = parse_one("control 'y' do\n  impact awful\nend\n");
        assert!((parsed.controls[0].impact - DEFAULT_IMPACT).abs() < f64::EPSILON);
        assert_eq!(parsed.diagnostics.len(), 1);
    }

    #[test]
    fn test_describe_block_assertions() {
        let parsed = parse_one(
            r#"
control 'sshd' do
  describe sshd_config('/etc/ssh/sshd_config') do
    its('PermitRootLogin') { should cmp 'no' }
    its('MaxAuthTries') { should cmp <= 4 }
    it { should exist }
    it { should_not be_directory }
  end
end
"#,
        );

        let call = &parsed.controls[0].body[0];
        assert_eq!(call.resource_name, "sshd_config");
        assert_eq!(call.arguments, vec![Argument::literal("/etc/ssh/sshd_config")]);
        assert_eq!(call.assertions.len(), 4);

        assert_eq!(
            call.assertions[0],
            Assertion {
                target: Some("PermitRootLogin".into()),
                negated: false,
                matcher: Matcher::Cmp {
                    op: CmpOp::Eq,
                    value: MatchValue::quoted("no")
                },
            }
        );
        assert_eq!(
            call.assertions[1].matcher,
            Matcher::Cmp {
                op: CmpOp::Lte,
                value: MatchValue::bare("4")
            }
        );
        assert_eq!(call.assertions[2].matcher, Matcher::Exist);
        assert!(call.assertions[3].negated);
        assert_eq!(call.assertions[3].matcher, Matcher::BeDirectory);
    }

    #[test]
    fn test_resource_call_order_preserved() {
        let parsed = parse_one(
            r#"
control 'ordered' do
  describe file('/one') do
    it { should exist }
  end
  describe service('sshd') do
    it { should be_running }
  end
  describe package('auditd') do
    it { should be_installed }
  end
end
"#,
        );

        let names: Vec<&str> = parsed.controls[0]
            .body
            .iter()
            .map(|c| c.resource_name.as_str())
            .collect();
        assert_eq!(names, vec!["file", "service", "package"]);
    }

    #[test]
    fn test_unrecognized_expressions_kept_opaque() {
        let parsed = parse_one(
            r#"
control 'weird' do
  evaluate_mystery_hook :flag
  describe file('/tmp/x') do
    it { should exist }
    it { should have_sticky_bit_set }
  end
end
"#,
        );

        let c = &parsed.controls[0];
        assert_eq!(c.body[0].assertions.len(), 1);
        assert_eq!(c.opaque.len(), 2);
        assert!(c.opaque.contains(&"evaluate_mystery_hook :flag".to_string()));
        assert!(c
            .opaque
            .contains(&"it { should have_sticky_bit_set }".to_string()));
    }

    #[test]
    fn test_only_if_guard_flagged() {
        let parsed = parse_one(
            r#"
control 'guarded' do
  only_if { os.windows? }
  describe file('/tmp') do
    it { should exist }
  end
end
"#,
        );

        assert_eq!(parsed.controls[0].body.len(), 1);
        assert!(parsed
            .diagnostics
            .iter()
            .any(|d| matches!(d, Diagnostic::RuntimeGuard { .. })));
    }

    #[test]
    fn test_match_pattern_forms() {
        let parsed = parse_one(
            r#"
control 'patterns' do
  describe command('sysctl kernel.randomize_va_space') do
    its('stdout') { should match /= 2/ }
    its('stderr') { should match 'denied' }
  end
end
"#,
        );

        let call = &parsed.controls[0].body[0];
        assert_eq!(call.assertions[0].matcher, Matcher::Match("= 2".into()));
        assert_eq!(call.assertions[1].matcher, Matcher::Match("denied".into()));
    }

    #[test]
    fn test_describe_argument_with_mixed_quotes() {
        let parsed = parse_one(
            r#"
control 'reg' do
  describe registry_key('HKEY_LOCAL_MACHINE\System\CurrentControlSet', "it's a value") do
    its('Start') { should eq 4 }
  end
end
"#,
        );

        let call = &parsed.controls[0].body[0];
        assert_eq!(call.arguments.len(), 2);
        assert_eq!(call.arguments[1], Argument::literal("it's a value"));
        assert_eq!(call.assertions[0].matcher, Matcher::Eq(MatchValue::bare("4")));
    }

    #[test]
    fn test_quoted_values_keep_quoting_bare_stay_bare() {
        let parsed = parse_one(
            r#"
control 'mode' do
  describe file('/etc/shadow') do
    its('mode') { should cmp '0000' }
    its('size') { should cmp <= 10 }
  end
end
"#,
        );

        let call = &parsed.controls[0].body[0];
        assert_eq!(
            call.assertions[0].matcher,
            Matcher::Cmp {
                op: CmpOp::Eq,
                value: MatchValue::quoted("0000")
            }
        );
        assert_eq!(
            call.assertions[1].matcher,
            Matcher::Cmp {
                op: CmpOp::Lte,
                value: MatchValue::bare("10")
            }
        );
    }

    #[test]
    fn test_expression_argument_classified_as_expression() {
        let parsed = parse_one(
            r#"
control 'expr' do
  describe file(input('log_path')) do
    it { should exist }
  end
  describe port(22) do
    it { should be_listening }
  end
end
"#,
        );

        let file_call = &parsed.controls[0].body[0];
        assert_eq!(file_call.arguments, vec![Argument::expression("input('log_path')")]);

        // Bare numbers are literals
        let port_call = &parsed.controls[0].body[1];
        assert_eq!(port_call.arguments, vec![Argument::literal("22")]);
    }

    #[test]
    fn test_trailing_comments_ignored_outside_quotes() {
        let parsed = parse_one(
            r#"
control 'commented' do # tracked upstream
  impact 0.5 # raised from 0.3
  title 'keeps # inside quotes'
  describe file('/tmp') do # inline note
    it { should exist } # checked daily
  end
end
"#,
        );

        let c = &parsed.controls[0];
        assert!((c.impact - 0.5).abs() < f64::EPSILON);
        assert_eq!(c.title.as_deref(), Some("keeps # inside quotes"));
        assert_eq!(c.body.len(), 1);
        assert_eq!(c.body[0].assertions.len(), 1);
        assert!(parsed.diagnostics.is_empty());
    }
}

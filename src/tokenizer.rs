//! Control-file Tokenizer
//!
//! Scans raw profile source into a flat sequence of lexical spans: control
//! headers, control bodies, comments, and everything else. The scanner is
//! line-oriented and makes a single pass per file.
//!
//! The header rule is the load-bearing part: a declaration opened with quote
//! character Q (`'` or `"`) captures everything up to the next occurrence of
//! the *same* Q, even when the captured run contains the other quote
//! character. `control "Ensure 'x' is set to '7 password(s)'" do` therefore
//! captures the whole identifier; only `"` terminates it. A generic
//! match-until-any-quote rule breaks exactly here.
//!
//! Malformed input (unterminated header, unbalanced `do`/`end` nesting)
//! records a diagnostic and resumes at the next recognizable `control`
//! header, so later controls are still extracted.

use crate::report::{Diagnostic, SourceLocator};

/// One classified lexical span
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LexSpan {
    /// A `control <quoted-id> do` declaration; `id` is verbatim, internal
    /// other-kind quotes preserved
    ControlHeader {
        id: String,
        line: usize,
        column: usize,
    },

    /// The body of the most recent header, from after its `do` to the
    /// matching `end` (exclusive), raw text with original indentation
    ControlBody { text: String, line: usize },

    /// A full-line `#` comment outside any control body
    Comment { text: String, line: usize },

    /// Arbitrary top-level code outside control declarations
    Other { text: String, line: usize },
}

/// Scan result for one source file
#[derive(Debug, Default)]
pub struct TokenStream {
    pub spans: Vec<LexSpan>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Capture a quoted run using the same-delimiter rule.
///
/// `input` must begin (after leading whitespace) with `'` or `"`. Returns the
/// verbatim inner text and the remainder after the closing quote. Returns
/// `None` when no quote opens the run or the opening quote is never matched
/// on this line.
pub fn scan_quoted(input: &str) -> Option<(String, &str)> {
    let trimmed = input.trim_start();
    let mut chars = trimmed.char_indices();
    let (_, quote) = chars.next()?;
    if quote != '\'' && quote != '"' {
        return None;
    }
    let rest = &trimmed[quote.len_utf8()..];
    let close = rest.find(quote)?;
    Some((rest[..close].to_string(), &rest[close + quote.len_utf8()..]))
}

/// Whether a (comment-stripped, trimmed) line opens a `do`/`end` block
fn opens_block(trimmed: &str) -> bool {
    if trimmed.starts_with("if ")
        || trimmed.starts_with("unless ")
        || trimmed.starts_with("case ")
    {
        return true;
    }
    if trimmed == "do" || trimmed.ends_with(" do") {
        return true;
    }
    // Block with parameters: `... do |entry|`
    if trimmed.ends_with('|') {
        if let Some(pipe) = trimmed.rfind(" do |") {
            return trimmed[pipe + 5..trimmed.len() - 1]
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == ',' || c == ' ');
        }
    }
    false
}

/// Whether a trimmed line closes a `do`/`end` block
fn closes_block(trimmed: &str) -> bool {
    trimmed == "end"
}

fn is_comment(trimmed: &str) -> bool {
    trimmed.starts_with('#')
}

/// Strip a trailing `#` comment, quote-aware: a `#` inside a quoted run is
/// content, not a comment. Block-opener checks run on the stripped text so
/// `control 'x' do # note` still opens a body.
pub(crate) fn strip_line_comment(line: &str) -> &str {
    let mut quote: Option<char> = None;
    for (idx, c) in line.char_indices() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None => match c {
                '\'' | '"' => quote = Some(c),
                '#' => return &line[..idx],
                _ => {}
            },
        }
    }
    line
}

/// Whether a trimmed line begins a control declaration
fn is_control_header(trimmed: &str) -> bool {
    trimmed
        .strip_prefix("control")
        .map(|rest| {
            let rest = rest.trim_start();
            rest.starts_with('\'') || rest.starts_with('"')
        })
        .unwrap_or(false)
}

/// Tokenize one control file
pub fn tokenize(path: &str, text: &str) -> TokenStream {
    let mut stream = TokenStream::default();
    let lines: Vec<&str> = text.lines().collect();
    let mut i = 0;

    while i < lines.len() {
        let line = lines[i];
        let trimmed = line.trim();

        if trimmed.is_empty() {
            i += 1;
            continue;
        }

        if is_comment(trimmed) {
            stream.spans.push(LexSpan::Comment {
                text: trimmed.to_string(),
                line: i + 1,
            });
            i += 1;
            continue;
        }

        if !is_control_header(trimmed) {
            stream.spans.push(LexSpan::Other {
                text: line.to_string(),
                line: i + 1,
            });
            i += 1;
            continue;
        }

        // Header line. Column of the keyword, one-based.
        let column = line.len() - line.trim_start().len() + 1;
        let after_kw = trimmed.strip_prefix("control").unwrap_or(trimmed);

        let (id, after_id) = match scan_quoted(after_kw) {
            Some(pair) => pair,
            None => {
                stream.diagnostics.push(Diagnostic::MalformedProfile {
                    locator: SourceLocator::new(path, i + 1, column),
                    message: "unterminated quoted control identifier".to_string(),
                });
                i += 1;
                // Forward recovery: resume scanning for the next header.
                continue;
            }
        };

        stream.spans.push(LexSpan::ControlHeader {
            id,
            line: i + 1,
            column,
        });

        // The declaration's own `do` opens depth 1; nested blocks inside the
        // body raise it further. The body closes on the `end` that returns
        // the depth to zero.
        let header_opens = opens_block(strip_line_comment(after_id).trim());
        let body_start = i + 1;
        let mut depth: i32 = if header_opens { 1 } else { 0 };
        let mut body_lines: Vec<&str> = Vec::new();
        let mut j = body_start;
        let mut closed = false;

        while j < lines.len() {
            let body_trimmed = strip_line_comment(lines[j]).trim();

            if depth == 0 {
                // `do` not yet seen (declaration split across lines)
                if body_trimmed == "do" || body_trimmed.starts_with("do ") {
                    depth = 1;
                    j += 1;
                    continue;
                }
                break;
            }

            if is_control_header(body_trimmed) {
                // A new declaration before this body closed: unbalanced
                // nesting. Keep what we have and resume at the new header.
                stream.diagnostics.push(Diagnostic::MalformedProfile {
                    locator: SourceLocator::new(path, j + 1, 1),
                    message: "unbalanced block nesting: control body not closed before next declaration".to_string(),
                });
                break;
            }

            if !is_comment(body_trimmed) {
                if closes_block(body_trimmed) {
                    depth -= 1;
                    if depth == 0 {
                        closed = true;
                        j += 1;
                        break;
                    }
                } else if opens_block(body_trimmed) {
                    depth += 1;
                }
            }

            body_lines.push(lines[j]);
            j += 1;
        }

        if depth == 0 && !closed && body_lines.is_empty() && !header_opens {
            stream.diagnostics.push(Diagnostic::MalformedProfile {
                locator: SourceLocator::new(path, i + 1, column),
                message: "control declaration without a block opener".to_string(),
            });
        } else if !closed && j >= lines.len() && depth > 0 {
            stream.diagnostics.push(Diagnostic::MalformedProfile {
                locator: SourceLocator::new(path, i + 1, column),
                message: "unbalanced block nesting: control body never closed".to_string(),
            });
        }

        stream.spans.push(LexSpan::ControlBody {
            text: body_lines.join("\n"),
            line: body_start + 1,
        });

        i = j.max(i + 1);
    }

    stream
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(stream: &TokenStream) -> Vec<&str> {
        stream
            .spans
            .iter()
            .filter_map(|s| match s {
                LexSpan::ControlHeader { id, .. } => Some(id.as_str()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_double_quoted_id_with_embedded_single_quotes() {
        let src = r#"
control "1.1.1 (L1) Ensure 'Enforce password history' is set to '7 password(s)'" do
  impact 1.0
end
"#;
        let stream = tokenize("controls/pw.rb", src);
        assert_eq!(
            headers(&stream),
            vec!["1.1.1 (L1) Ensure 'Enforce password history' is set to '7 password(s)'"]
        );
        assert!(stream.diagnostics.is_empty());
    }

    #[test]
    fn test_single_quoted_id_with_embedded_double_quotes() {
        let src = r#"
control 'test-id-with-"double"-quotes' do
  impact 0.5
end
"#;
        let stream = tokenize("controls/q.rb", src);
        assert_eq!(headers(&stream), vec![r#"test-id-with-"double"-quotes"#]);
    }

    #[test]
    fn test_nested_blocks_tracked_by_depth() {
        let src = r#"
control 'nested' do
  describe file('/etc/ssh/sshd_config') do
    it { should exist }
  end
  ['a', 'b'].each do |entry|
    describe file(entry) do
      it { should exist }
    end
  end
end

control 'after' do
  impact 0.3
end
"#;
        let stream = tokenize("controls/nest.rb", src);
        assert_eq!(headers(&stream), vec!["nested", "after"]);
        assert!(stream.diagnostics.is_empty());

        // Nested body kept whole, inner `end`s included
        let body = stream.spans.iter().find_map(|s| match s {
            LexSpan::ControlBody { text, .. } => Some(text.clone()),
            _ => None,
        });
        let body = body.unwrap();
        assert!(body.contains("describe file('/etc/ssh/sshd_config')"));
        assert!(body.contains(".each do |entry|"));
    }

    #[test]
    fn test_unterminated_header_recovers_to_next_control() {
        let src = r#"
control "never closed do
  impact 1.0
end

control 'survivor' do
  impact 0.5
end
"#;
        let stream = tokenize("controls/bad.rb", src);
        assert_eq!(headers(&stream), vec!["survivor"]);
        assert_eq!(stream.diagnostics.len(), 1);
        assert!(stream.diagnostics[0]
            .to_string()
            .contains("unterminated quoted control identifier"));
    }

    #[test]
    fn test_unbalanced_nesting_recovers_at_next_header() {
        let src = r#"
control 'broken' do
  describe file('/tmp') do
    it { should exist }

control 'next-one' do
  impact 0.2
end
"#;
        let stream = tokenize("controls/unbalanced.rb", src);
        assert_eq!(headers(&stream), vec!["broken", "next-one"]);
        assert_eq!(stream.diagnostics.len(), 1);
        assert!(stream.diagnostics[0].to_string().contains("unbalanced"));
    }

    #[test]
    fn test_comments_and_other_spans_classified() {
        let src = r#"
# frozen_string_literal: true
require 'json'

control 'c' do
end
"#;
        let stream = tokenize("controls/mix.rb", src);
        assert!(matches!(stream.spans[0], LexSpan::Comment { .. }));
        assert!(matches!(stream.spans[1], LexSpan::Other { .. }));
        assert_eq!(headers(&stream), vec!["c"]);
    }

    #[test]
    fn test_header_with_trailing_comment_opens_block() {
        let src = r#"
control 'commented' do # tracked upstream
  impact 0.5
  describe file('/tmp') do # inline note
    it { should exist }
  end
end
"#;
        let stream = tokenize("controls/comment.rb", src);
        assert_eq!(headers(&stream), vec!["commented"]);
        assert!(stream.diagnostics.is_empty());

        let body = stream
            .spans
            .iter()
            .find_map(|s| match s {
                LexSpan::ControlBody { text, .. } => Some(text.clone()),
                _ => None,
            })
            .unwrap();
        assert!(body.contains("impact 0.5"));
        assert!(body.contains("it { should exist }"));
    }

    #[test]
    fn test_strip_line_comment_quote_aware() {
        assert_eq!(strip_line_comment("impact 0.5 # note"), "impact 0.5 ");
        assert_eq!(
            strip_line_comment("title 'keeps # inside' # but not this"),
            "title 'keeps # inside' "
        );
        assert_eq!(strip_line_comment("no comment at all"), "no comment at all");
    }

    #[test]
    fn test_scan_quoted_same_delimiter_rule() {
        let (inner, rest) = scan_quoted(r#" "a 'b' c" do"#).unwrap();
        assert_eq!(inner, "a 'b' c");
        assert_eq!(rest, " do");

        let (inner, _) = scan_quoted(r#"'x "y" z'"#).unwrap();
        assert_eq!(inner, r#"x "y" z"#);

        assert!(scan_quoted("no quotes here").is_none());
        assert!(scan_quoted("\"never closed").is_none());
    }
}

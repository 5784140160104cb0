//! Identifier Sanitization
//!
//! Control identifiers are arbitrary text (quotes, parentheses, dots) but
//! must become usable Ansible variable/task names. [`sanitize`] is the pure,
//! deterministic mapping; it is legitimately lossy, so two distinct inputs
//! may collide. The run-scoped [`SymbolAllocator`] owns the collision policy,
//! appending a numeric disambiguator to the second and later colliding
//! inputs. Keeping the pure mapping and the stateful disambiguation separate
//! keeps the former testable in isolation and the latter centralized.

use std::collections::{HashMap, HashSet};

/// Fixed namespace prefix for every generated symbol
pub const SYMBOL_PREFIX: &str = "ptl";

/// Separator substituted for every non-alphanumeric run
const SEPARATOR: char = '_';

/// Maximum symbol length before the disambiguator is appended
const MAX_SYMBOL_LEN: usize = 60;

/// Map arbitrary text to a lowercase, alphanumeric-and-separator symbol.
///
/// Every maximal run of non-alphanumeric characters becomes a single `_`,
/// leading/trailing separators are stripped, the `ptl` namespace prefix is
/// applied, and the result is truncated to a fixed maximum at a separator
/// boundary where one exists. Pure and deterministic.
pub fn sanitize(text: &str) -> String {
    let mut body = String::with_capacity(text.len());
    let mut pending_sep = false;

    for c in text.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_sep && !body.is_empty() {
                body.push(SEPARATOR);
            }
            pending_sep = false;
            body.push(c.to_ascii_lowercase());
        } else {
            pending_sep = true;
        }
    }

    let mut symbol = if body.is_empty() {
        format!("{}{}unnamed", SYMBOL_PREFIX, SEPARATOR)
    } else {
        format!("{}{}{}", SYMBOL_PREFIX, SEPARATOR, body)
    };

    if symbol.len() > MAX_SYMBOL_LEN {
        symbol.truncate(MAX_SYMBOL_LEN);
        // Stable truncation: back off to the previous separator so we never
        // cut a token mid-run, unless that would leave only the prefix.
        if let Some(cut) = symbol.rfind(SEPARATOR) {
            if cut > SYMBOL_PREFIX.len() + 1 {
                symbol.truncate(cut);
            }
        }
        while symbol.ends_with(SEPARATOR) {
            symbol.pop();
        }
    }

    symbol
}

/// Run-local symbol table enforcing injectivity.
///
/// The first input mapping to a given sanitized base receives it verbatim;
/// later colliding inputs receive `_2`, `_3`, and so on. Counters are scoped
/// to one conversion run and never shared.
#[derive(Debug, Default)]
pub struct SymbolAllocator {
    issued: HashSet<String>,
    counters: HashMap<String, u32>,
}

impl SymbolAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a distinct final symbol for `text`
    pub fn allocate(&mut self, text: &str) -> String {
        let base = sanitize(text);
        if self.issued.insert(base.clone()) {
            self.counters.insert(base.clone(), 1);
            return base;
        }

        let counter = self.counters.entry(base.clone()).or_insert(1);
        loop {
            *counter += 1;
            let candidate = format!("{}{}{}", base, SEPARATOR, counter);
            if self.issued.insert(candidate.clone()) {
                return candidate;
            }
        }
    }

    /// Reserve a name derived from an already-issued symbol.
    ///
    /// Generated register variables share the namespace with control symbols,
    /// so a control id sanitizing to e.g. `ptl_x_r1` must not silently alias
    /// another control's first register. Derived names go through the same
    /// issued set and walk the counter on collision.
    pub fn derive(&mut self, base: &str, suffix: &str) -> String {
        let candidate = format!("{}{}{}", base, SEPARATOR, suffix);
        if self.issued.insert(candidate.clone()) {
            self.counters.insert(candidate.clone(), 1);
            return candidate;
        }

        let counter = self.counters.entry(candidate.clone()).or_insert(1);
        loop {
            *counter += 1;
            let next = format!("{}{}{}", candidate, SEPARATOR, counter);
            if self.issued.insert(next.clone()) {
                return next;
            }
        }
    }
}

//! Pattern matching for automation rules.
//!
//! Compiles a rule pattern (substring, wildcard, regex, exact, prefix,
//! suffix) once and evaluates it against incoming lines, yielding captured
//! variables for command substitution. Invalid patterns surface as a
//! compile error so the engine can skip the owning rule without aborting
//! the evaluation pass.

use fancy_regex::Regex;
use thiserror::Error;
use tracing::warn;

use crate::common::types::{CaptureVariables, PatternType};

/// A pattern that failed to compile.
#[derive(Debug, Clone, Error)]
#[error("invalid pattern '{pattern}': {message}")]
pub struct PatternError {
    pub pattern: String,
    pub message: String,
}

/// Compiled form of one rule pattern.
#[derive(Debug, Clone)]
enum Compiled {
    /// Plain text comparisons; the needle is pre-lowercased when the
    /// pattern is case-insensitive.
    Substring(String),
    Exact(String),
    BeginsWith(String),
    EndsWith(String),
    /// Wildcard patterns compile to an anchored regex with one capture
    /// group per `*` span.
    Wildcard(Regex),
    Regex(Regex),
}

/// A compiled pattern with its original string for debugging.
#[derive(Debug, Clone)]
pub struct CompiledPattern {
    original: String,
    ignore_case: bool,
    compiled: Compiled,
}

impl CompiledPattern {
    /// Compile a pattern for the given type and case rule.
    pub fn compile(
        pattern: &str,
        pattern_type: PatternType,
        ignore_case: bool,
    ) -> Result<Self, PatternError> {
        let needle = if ignore_case {
            pattern.to_lowercase()
        } else {
            pattern.to_string()
        };

        let compiled = match pattern_type {
            PatternType::Substring => Compiled::Substring(needle),
            PatternType::Exact => Compiled::Exact(needle),
            PatternType::BeginsWith => Compiled::BeginsWith(needle),
            PatternType::EndsWith => Compiled::EndsWith(needle),
            PatternType::Wildcard => {
                Compiled::Wildcard(compile_regex(&wildcard_to_regex(pattern), ignore_case, pattern)?)
            }
            PatternType::Regex => Compiled::Regex(compile_regex(pattern, ignore_case, pattern)?),
        };

        Ok(Self {
            original: pattern.to_string(),
            ignore_case,
            compiled,
        })
    }

    /// Check whether the line matches.
    ///
    /// Runtime regex errors (backtracking limits) are treated as
    /// no-match rather than failing the evaluation pass.
    pub fn is_match(&self, line: &str) -> bool {
        match &self.compiled {
            Compiled::Substring(needle) => self.folded(line).contains(needle.as_str()),
            Compiled::Exact(text) => self.folded(line).as_ref() == text,
            Compiled::BeginsWith(prefix) => self.folded(line).starts_with(prefix.as_str()),
            Compiled::EndsWith(suffix) => self.folded(line).ends_with(suffix.as_str()),
            Compiled::Wildcard(regex) | Compiled::Regex(regex) => {
                regex.is_match(line).unwrap_or_else(|e| {
                    warn!("Regex match error for pattern '{}': {}", self.original, e);
                    false
                })
            }
        }
    }

    /// Extract capture variables from a matching line.
    ///
    /// Wildcard patterns capture each `*` span as `$1`, `$2`, ... in
    /// left-to-right order. Regex patterns map capture groups to `$1`...
    /// and additionally expose the whole match as `$*`. Groups present in
    /// the pattern that did not participate capture the empty string.
    /// Text pattern types capture nothing.
    pub fn captures(&self, line: &str) -> CaptureVariables {
        let mut vars = CaptureVariables::new();

        let (regex, whole_match) = match &self.compiled {
            Compiled::Wildcard(regex) => (regex, false),
            Compiled::Regex(regex) => (regex, true),
            _ => return vars,
        };

        let caps = match regex.captures(line) {
            Ok(Some(caps)) => caps,
            Ok(None) => return vars,
            Err(e) => {
                warn!("Regex capture error for pattern '{}': {}", self.original, e);
                return vars;
            }
        };

        if whole_match {
            if let Some(whole) = caps.get(0) {
                vars.insert("*".to_string(), whole.as_str().to_string());
            }
        }
        for i in 1..caps.len() {
            let text = caps.get(i).map(|m| m.as_str()).unwrap_or_default();
            vars.insert(i.to_string(), text.to_string());
        }

        vars
    }

    fn folded<'a>(&self, line: &'a str) -> std::borrow::Cow<'a, str> {
        if self.ignore_case {
            std::borrow::Cow::Owned(line.to_lowercase())
        } else {
            std::borrow::Cow::Borrowed(line)
        }
    }
}

/// Translate a wildcard pattern into an anchored regex.
///
/// `*` matches any span (captured), `?` matches exactly one character
/// (not captured), everything else is literal.
fn wildcard_to_regex(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len() + 8);
    out.push('^');
    for c in pattern.chars() {
        match c {
            '*' => out.push_str("(.*)"),
            '?' => out.push('.'),
            c => out.push_str(&fancy_regex::escape(&c.to_string())),
        }
    }
    out.push('$');
    out
}

fn compile_regex(source: &str, ignore_case: bool, original: &str) -> Result<Regex, PatternError> {
    let source = if ignore_case {
        format!("(?i){}", source)
    } else {
        source.to_string()
    };

    Regex::new(&source).map_err(|e| PatternError {
        pattern: original.to_string(),
        message: e.to_string(),
    })
}

/// Substitute capture variables into a command template.
///
/// Replaces `$N` and `$*` tokens with their captured values. A `$`
/// immediately terminating a token is consumed as an optional delimiter,
/// so `kill $1$` expands to `kill orc`. A `$N` with no corresponding
/// capture is left as literal text.
pub fn substitute(template: &str, captures: &CaptureVariables) -> String {
    let bytes = template.as_bytes();
    let mut out = String::with_capacity(template.len());
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == b'$' && i + 1 < bytes.len() {
            // $* token
            if bytes[i + 1] == b'*' {
                let mut end = i + 2;
                if let Some(value) = captures.get("*") {
                    if bytes.get(end) == Some(&b'$') {
                        end += 1; // delimiter form $*$
                    }
                    out.push_str(value);
                } else {
                    out.push_str("$*");
                }
                i = end;
                continue;
            }

            // $N token
            let mut j = i + 1;
            while j < bytes.len() && bytes[j].is_ascii_digit() {
                j += 1;
            }
            if j > i + 1 {
                let key = &template[i + 1..j];
                match captures.get(key) {
                    Some(value) => {
                        out.push_str(value);
                        if bytes.get(j) == Some(&b'$') {
                            j += 1; // delimiter form $1$
                        }
                    }
                    None => out.push_str(&template[i..j]),
                }
                i = j;
                continue;
            }
        }

        let ch = template[i..].chars().next().expect("in-bounds index");
        out.push(ch);
        i += ch.len_utf8();
    }

    out
}

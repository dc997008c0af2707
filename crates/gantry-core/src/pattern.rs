// crates/gantry-core/src/pattern.rs
// ============================================================================
// Module: Glob Pattern Matcher
// Description: Glob semantics over refs, tags, branches, and file paths.
// Purpose: Back the trigger matcher's branch/tag/path filter lists.
// Dependencies: regex, tracing
// ============================================================================

//! ## Overview
//! Filter patterns support three wildcards: `*` matches any run of
//! characters excluding `/`, `**` matches any run including `/`, and `?`
//! matches exactly one character; every other character is literal. A
//! leading or embedded `**/` also matches zero directories, so `**/x`
//! matches `x` at any depth including the root. Exact string equality
//! short-circuits before compilation. An ill-formed pattern never raises:
//! it logs a warning and matches nothing.

// ============================================================================
// SECTION: Imports
// ============================================================================

use regex::Regex;
use tracing::warn;

// ============================================================================
// SECTION: Glob Translation
// ============================================================================

/// Translates a glob pattern into an anchored regular expression source.
///
/// Regex metacharacters are escaped; `**/` becomes an optional directory run,
/// a remaining `**` becomes `.*`, `*` becomes `[^/]*`, and `?` becomes `.`.
fn glob_to_regex(pattern: &str) -> String {
    let mut source = String::with_capacity(pattern.len() + 8);
    source.push('^');
    let mut chars = pattern.chars().peekable();
    while let Some(ch) = chars.next() {
        match ch {
            '*' => {
                if chars.peek() == Some(&'*') {
                    chars.next();
                    if chars.peek() == Some(&'/') {
                        chars.next();
                        source.push_str("(?:.*/)?");
                    } else {
                        source.push_str(".*");
                    }
                } else {
                    source.push_str("[^/]*");
                }
            }
            '?' => source.push('.'),
            '.' | '+' | '(' | ')' | '[' | ']' | '{' | '}' | '^' | '$' | '|' | '\\' => {
                source.push('\\');
                source.push(ch);
            }
            other => source.push(other),
        }
    }
    source.push('$');
    source
}

/// Compiles a glob pattern, logging and returning `None` when ill-formed.
fn compile(pattern: &str) -> Option<Regex> {
    let source = glob_to_regex(pattern);
    match Regex::new(&source) {
        Ok(regex) => Some(regex),
        Err(error) => {
            warn!(pattern, %error, "ignoring ill-formed filter pattern");
            None
        }
    }
}

// ============================================================================
// SECTION: Matching Operations
// ============================================================================

/// Matches a ref-like value (branch or tag name) against one pattern.
#[must_use]
pub fn match_ref(value: &str, pattern: &str) -> bool {
    if value == pattern {
        return true;
    }
    compile(pattern).is_some_and(|regex| regex.is_match(value))
}

/// Matches a file path against one pattern.
///
/// Path matching uses the same wildcard semantics as ref matching; `**/x`
/// matches `x` at any depth.
#[must_use]
pub fn match_path(path: &str, pattern: &str) -> bool {
    if path == pattern {
        return true;
    }
    compile(pattern).is_some_and(|regex| regex.is_match(path))
}

/// Returns true when any pattern in the list matches the value.
///
/// An empty list matches nothing; callers decide whether an empty list means
/// "unconstrained" or "opt-in" for their filter position.
#[must_use]
pub fn match_list(value: &str, patterns: &[String]) -> bool {
    patterns.iter().any(|pattern| match_ref(value, pattern))
}

/// Returns true when any path pattern in the list matches the path.
#[must_use]
pub fn match_path_list(path: &str, patterns: &[String]) -> bool {
    patterns.iter().any(|pattern| match_path(path, pattern))
}

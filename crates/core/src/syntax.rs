//! Textual predicates over Solidity source
//!
//! The flattener never builds an AST. Every structural assumption it makes
//! about the contract language lives here, behind small named functions, so
//! the matching rules can change without touching the merge pipeline.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::borrow::Cow;

/// `// SPDX-License-Identifier: ...` occupying a whole line
static LICENSE_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^[ \t]*//\s*SPDX-License-Identifier:.*$").expect("valid regex"));

/// `import {A, B} from "./A.sol";` occupying a whole line
static RELATIVE_SYMBOL_IMPORT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?m)^[ \t]*import\s+\{[^}]+\}\s+from\s+["']\.{1,2}/[^"']*["'];\s*$"#)
        .expect("valid regex")
});

/// `import "../A.sol";` occupying a whole line
static RELATIVE_BARE_IMPORT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?m)^[ \t]*import\s+["']\.{1,2}/[^"']*["'];\s*$"#).expect("valid regex")
});

/// Non-nested `/* ... */` block comment
static BLOCK_COMMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/\*[^*]*\*+(?:[^/*][^*]*\*+)*/").expect("valid regex"));

static BOILERPLATE_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)copyright|file:").expect("valid regex"));

/// `// File: path/to/Source.sol` marker left behind by other flatteners
static FILE_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)//\s*File:.*").expect("valid regex"));

/// `pragma solidity ^0.8.0;`
static VERSION_DIRECTIVE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"pragma solidity [^;]+;").expect("valid regex"));

/// A newline, optional whitespace, another newline
static BLANK_RUN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\n\s*\n").expect("valid regex"));

static IMPORT_STATEMENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"import\s+(?:\{[^}]+\}\s+from\s+)?["']([^"']+)["'];"#).expect("valid regex")
});

/// Returns true if the line looks like an import statement
pub fn is_import_line(line: &str) -> bool {
    line.trim().starts_with("import ")
}

/// Extracts the target path of an import statement.
///
/// Returns `None` for anything that is not a recognizable import, including
/// malformed import lines.
pub fn import_path(line: &str) -> Option<&str> {
    if !is_import_line(line) {
        return None;
    }
    IMPORT_STATEMENT
        .captures(line)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Returns true if an import target is relative to the importing file
pub fn is_relative_path(path: &str) -> bool {
    path.starts_with('.')
}

/// Returns true if the line is an import of a relative (`./`, `../`) path
#[cfg(test)]
pub(crate) fn is_relative_import(line: &str) -> bool {
    RELATIVE_SYMBOL_IMPORT.is_match(line) || RELATIVE_BARE_IMPORT.is_match(line)
}

/// Returns true if the text contains a compiler version directive
pub fn is_version_directive(text: &str) -> bool {
    VERSION_DIRECTIVE.is_match(text)
}

/// Returns true if a block comment is a copyright banner or file marker
pub fn is_boilerplate_comment(comment: &str) -> bool {
    BOILERPLATE_MARKER.is_match(comment)
}

/// Removes whole-line license identifier comments
pub fn strip_license_lines(text: &str) -> Cow<'_, str> {
    LICENSE_LINE.replace_all(text, "")
}

/// Removes whole-line relative imports, braced and bare forms
pub fn strip_relative_imports(text: &str) -> Cow<'_, str> {
    match RELATIVE_SYMBOL_IMPORT.replace_all(text, "") {
        Cow::Borrowed(text) => RELATIVE_BARE_IMPORT.replace_all(text, ""),
        Cow::Owned(text) => Cow::Owned(RELATIVE_BARE_IMPORT.replace_all(&text, "").into_owned()),
    }
}

/// Removes block comments for which [`is_boilerplate_comment`] holds
pub fn strip_boilerplate_comments(text: &str) -> Cow<'_, str> {
    BLOCK_COMMENT.replace_all(text, |caps: &Captures| {
        let comment = &caps[0];
        if is_boilerplate_comment(comment) {
            String::new()
        } else {
            comment.to_string()
        }
    })
}

/// Removes `// File:` marker comments
pub fn strip_file_markers(text: &str) -> Cow<'_, str> {
    FILE_MARKER.replace_all(text, "")
}

/// Visits every version directive in order and removes those for which
/// `keep` returns false
pub fn retain_version_directives(text: &str, mut keep: impl FnMut() -> bool) -> Cow<'_, str> {
    VERSION_DIRECTIVE.replace_all(text, |caps: &Captures| {
        if keep() {
            caps[0].to_string()
        } else {
            String::new()
        }
    })
}

/// Replaces every run of blank lines with a single newline
pub fn collapse_blank_runs(text: &str) -> Cow<'_, str> {
    BLANK_RUN.replace_all(text, "\n")
}

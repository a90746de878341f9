//! Per-file content cleanup before merging

use crate::syntax::{
    collapse_blank_runs, retain_version_directives, strip_boilerplate_comments,
    strip_file_markers, strip_license_lines, strip_relative_imports,
};
use std::borrow::Cow;

/// Strips boilerplate from a single source file.
///
/// Steps run in a fixed order, later patterns rely on earlier ones:
/// 1. license identifier lines
/// 2. relative imports (braced and bare forms)
/// 3. block comments mentioning `copyright` or `file:`
/// 4. `// File:` markers
/// 5. every compiler version directive after the first one in this file
/// 6. blank line runs
/// 7. surrounding whitespace
pub fn normalize(raw: &str) -> String {
    let text = strip_license_lines(raw);
    let text = strip_relative_imports(&text);
    let text = strip_boilerplate_comments(&text);
    let text = strip_file_markers(&text);
    let text = keep_first_version_directive(&text);
    collapse_blank_lines(&text).trim().to_string()
}

/// Collapses every run of blank lines into a single newline
pub fn collapse_blank_lines(text: &str) -> Cow<'_, str> {
    collapse_blank_runs(text)
}

fn keep_first_version_directive(text: &str) -> Cow<'_, str> {
    let mut seen = false;
    retain_version_directives(text, || !std::mem::replace(&mut seen, true))
}

//! Job-wide compiler version directive reduction

use crate::syntax::{is_version_directive, retain_version_directives};
use std::borrow::Cow;

/// Tracks whether a merge job already emitted its compiler version directive.
///
/// One instance per job. The first directive seen across the whole job
/// survives, every later one is removed regardless of the file it came from.
#[derive(Debug, Default, Clone)]
pub struct PragmaState {
    emitted: bool,
}

impl PragmaState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a directive has already been let through
    pub fn emitted(&self) -> bool {
        self.emitted
    }

    /// Removes every directive in `chunk` except the first one of the job
    pub fn reduce<'a>(&mut self, chunk: &'a str) -> Cow<'a, str> {
        if !is_version_directive(chunk) {
            return Cow::Borrowed(chunk);
        }
        retain_version_directives(chunk, || !std::mem::replace(&mut self.emitted, true))
    }
}

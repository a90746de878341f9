//! Deduplication of external import statements in merged output

use crate::syntax::{import_path, is_relative_path};
use std::collections::HashSet;

/// External import statements already emitted by one merge job
#[derive(Debug, Default, Clone)]
pub struct ImportTracker {
    seen: HashSet<String>,
}

impl ImportTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if the line should be kept.
    ///
    /// Non-import lines and relative imports always pass. An external import
    /// passes the first time its trimmed text is seen.
    pub fn admit(&mut self, line: &str) -> bool {
        match import_path(line) {
            Some(path) if !is_relative_path(path) => self.seen.insert(line.trim().to_string()),
            _ => true,
        }
    }

    /// Number of distinct external imports recorded
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

/// Drops repeated external import statements, preserving line order
pub fn dedupe(merged: &str) -> String {
    dedupe_with(&mut ImportTracker::new(), merged)
}

/// Same as [`dedupe`] but records into a caller-owned tracker
pub fn dedupe_with(tracker: &mut ImportTracker, merged: &str) -> String {
    merged
        .split('\n')
        .filter(|line| tracker.admit(line))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_duplicate_external_import_kept_once() {
        let merged = "import \"x/Ext.sol\";\ncontract A {}\nimport \"x/Ext.sol\";\ncontract B {}\n";
        assert_eq!(
            dedupe(merged),
            "import \"x/Ext.sol\";\ncontract A {}\ncontract B {}\n"
        );
    }

    #[test]
    fn test_indented_duplicates_compare_trimmed() {
        let merged = "import {A} from \"lib/A.sol\";\n    import {A} from \"lib/A.sol\";";
        assert_eq!(dedupe(merged), "import {A} from \"lib/A.sol\";");
    }

    #[test]
    fn test_different_symbols_from_same_path_are_distinct_lines() {
        let merged = "import {A} from \"lib/X.sol\";\nimport {B} from \"lib/X.sol\";";
        assert_eq!(dedupe(merged), merged);
    }

    #[test]
    fn test_relative_and_malformed_imports_pass_through() {
        let merged = "import \"./Local.sol\";\nimport \"./Local.sol\";\nimport broken\nimport broken";
        assert_eq!(dedupe(merged), merged);
    }

    #[test]
    fn test_tracker_counts_external_imports() {
        let mut tracker = ImportTracker::new();
        assert!(tracker.is_empty());
        dedupe_with(&mut tracker, "import \"a/A.sol\";\nimport \"b/B.sol\";\nimport \"a/A.sol\";");
        assert_eq!(tracker.len(), 2);
    }

    fn merged_text() -> impl Strategy<Value = String> {
        let line = prop_oneof![
            Just("import \"x/Ext.sol\";".to_string()),
            Just("import {A} from \"lib/A.sol\";".to_string()),
            Just("  import \"x/Ext.sol\";".to_string()),
            Just("import \"./Local.sol\";".to_string()),
            Just("contract A {}".to_string()),
            Just(String::new()),
            "[a-z ;{}]{0,12}",
        ];
        prop::collection::vec(line, 0..24).prop_map(|lines| lines.join("\n"))
    }

    proptest! {
        #[test]
        fn prop_dedupe_is_idempotent(text in merged_text()) {
            let once = dedupe(&text);
            prop_assert_eq!(dedupe(&once), once);
        }

        #[test]
        fn prop_no_duplicate_external_imports(text in merged_text()) {
            let out = dedupe(&text);
            let mut seen = HashSet::new();
            for line in out.split('\n') {
                if let Some(path) = import_path(line) {
                    if !is_relative_path(path) {
                        prop_assert!(seen.insert(line.trim().to_string()));
                    }
                }
            }
        }
    }
}

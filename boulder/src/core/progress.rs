//! Checkbox progress counting, independent of task and wave structure.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

static CHECKBOX_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^\s*[-*]\s*\[([ xX])\]").expect("checkbox regex is valid")
});

/// Checkbox totals for a plan document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PlanProgress {
    pub total: usize,
    pub completed: usize,
    pub is_complete: bool,
}

impl PlanProgress {
    pub fn remaining(&self) -> usize {
        self.total - self.completed
    }
}

/// Count `- [ ]` / `- [x]` style checkboxes anywhere in `text`.
///
/// A document without checkboxes is complete: there is nothing left to do.
pub fn count_checkboxes(text: &str) -> PlanProgress {
    let mut total = 0;
    let mut completed = 0;
    for caps in CHECKBOX_RE.captures_iter(text) {
        total += 1;
        if &caps[1] != " " {
            completed += 1;
        }
    }
    PlanProgress {
        total,
        completed,
        is_complete: total == completed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_flat_checklist() {
        let progress = count_checkboxes("- [ ] 1. A\n- [x] 2. B\n- [ ] 3. C");
        assert_eq!(
            progress,
            PlanProgress {
                total: 3,
                completed: 1,
                is_complete: false
            }
        );
        assert_eq!(progress.remaining(), 2);
    }

    #[test]
    fn empty_document_is_complete() {
        let progress = count_checkboxes("# Nothing here\n\njust prose\n");
        assert_eq!(progress.total, 0);
        assert!(progress.is_complete);
    }

    #[test]
    fn counts_nested_and_unnumbered_boxes() {
        let text = "### Wave 1\n- [x] 1. Parent\n  - [X] sub step\n  * [ ] another\n";
        let progress = count_checkboxes(text);
        assert_eq!((progress.total, progress.completed), (3, 2));
    }

    #[test]
    fn all_checked_is_complete() {
        assert!(count_checkboxes("- [x] a\n* [X] b\n").is_complete);
    }
}

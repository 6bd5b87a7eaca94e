//! Property-based tests for the bootstrapper
//!
//! These tests verify:
//! - Config files survive parse → render untouched
//! - Setting one key leaves every other line byte-for-byte as it was
//! - A set key is active exactly once afterwards and reads back as written
//! - Stage ordering invariants of the progress state machine

use bootstrapper::env_file::{EnvDocument, SetOutcome};
use bootstrapper::progress::{RunProgress, StageId, StageOutcome};
use proptest::prelude::*;
use strum::IntoEnumIterator;

// =============================================================================
// Strategies
// =============================================================================

fn key_strategy() -> impl Strategy<Value = String> {
    "[A-Z_][A-Z0-9_]{0,12}"
}

/// One line of a realistic template: assignments, comments, blanks, junk
fn line_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        (key_strategy(), "[a-zA-Z0-9:/._-]{0,20}").prop_map(|(k, v)| format!("{}={}", k, v)),
        (key_strategy(), "[a-z ]{0,10}").prop_map(|(k, v)| format!("export {}=\"{}\"", k, v)),
        "# [ -~]{0,30}",
        Just(String::new()),
        "[ -~]{0,30}",
    ]
}

fn document_strategy() -> impl Strategy<Value = String> {
    (prop::collection::vec(line_strategy(), 0..20), any::<bool>()).prop_map(
        |(lines, trailing)| {
            let mut text = lines.join("\n");
            if trailing && !text.is_empty() {
                text.push('\n');
            }
            text
        },
    )
}

/// Values an operator might paste, including ones that need quoting
fn value_strategy() -> impl Strategy<Value = String> {
    "[ -~]{0,40}"
}

// =============================================================================
// Config file transform
// =============================================================================

proptest! {
    /// parse → render is the identity for LF files
    #[test]
    fn env_document_roundtrip(text in document_strategy()) {
        prop_assert_eq!(EnvDocument::parse(&text).render(), text);
    }

    /// parse → render is the identity for CRLF files
    #[test]
    fn env_document_crlf_roundtrip(lines in prop::collection::vec(line_strategy(), 1..10)) {
        let text = format!("{}\r\n", lines.join("\r\n"));
        prop_assert_eq!(EnvDocument::parse(&text).render(), text);
    }

    /// Replacing a key touches only the lines carrying that key
    #[test]
    fn set_preserves_other_lines(
        text in document_strategy(),
        key in key_strategy(),
        value in value_strategy(),
    ) {
        let mut doc = EnvDocument::parse(&text);
        let outcome = doc.set(&key, &value);
        let rendered = doc.render();

        let assigns_key = |line: &str| {
            let line = line.trim_start();
            let line = line.strip_prefix("export ").unwrap_or(line);
            line.split_once('=').map(|(k, _)| k.trim_end() == key).unwrap_or(false)
        };
        let before: Vec<&str> = text.lines().filter(|l| !assigns_key(*l)).collect();
        let after: Vec<&str> = rendered.lines().filter(|l| !assigns_key(*l)).collect();
        prop_assert_eq!(before, after);

        if outcome == SetOutcome::Replaced {
            prop_assert!(text.lines().any(assigns_key));
        }
    }

    /// After `set`, the key is active exactly once
    #[test]
    fn set_leaves_key_active_once(
        text in document_strategy(),
        key in key_strategy(),
        value in value_strategy(),
    ) {
        let mut doc = EnvDocument::parse(&text);
        doc.set(&key, &value);

        let reparsed = EnvDocument::parse(&doc.render());
        let count = reparsed.keys().iter().filter(|k| **k == key).count();
        prop_assert_eq!(count, 1);
    }

    /// Any printable value written by `set` reads back unchanged after a
    /// re-parse, quotes, `$`, backticks and backslashes included
    #[test]
    fn set_value_reads_back(
        text in document_strategy(),
        key in key_strategy(),
        value in value_strategy(),
    ) {
        let mut doc = EnvDocument::parse(&text);
        doc.set(&key, &value);

        let reparsed = EnvDocument::parse(&doc.render());
        let got = reparsed.get(&key);
        prop_assert_eq!(got.as_deref(), Some(value.as_str()));
    }

    /// Setting a key twice is the same as setting it once with the last value
    #[test]
    fn set_is_idempotent(
        text in document_strategy(),
        key in key_strategy(),
        first in value_strategy(),
        second in value_strategy(),
    ) {
        let mut twice = EnvDocument::parse(&text);
        twice.set(&key, &first);
        twice.set(&key, &second);

        let mut once = EnvDocument::parse(&text);
        once.set(&key, &second);

        prop_assert_eq!(twice.render(), once.render());
    }
}

// =============================================================================
// Progress state machine
// =============================================================================

proptest! {
    /// Beginning any stage other than the expected next one is rejected
    #[test]
    fn progress_rejects_out_of_order(done in 0usize..7, jump in 0usize..7) {
        let stages: Vec<StageId> = StageId::iter().collect();
        let mut progress = RunProgress::new();
        for stage in stages.iter().take(done) {
            progress.begin(*stage).unwrap();
            progress.finish(StageOutcome::Applied).unwrap();
        }

        let result = progress.begin(stages[jump]);
        prop_assert_eq!(result.is_ok(), jump == done);
    }
}

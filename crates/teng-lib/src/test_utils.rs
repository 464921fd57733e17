//! Shared helpers for the page-generation test suites.

use teng_core::{ErrorLog, Fragment, Severity};

use crate::Teng;

/// Render `template` against `data` with the default content type.
pub(crate) fn g(template: &str, data: &Fragment) -> (String, ErrorLog) {
    Teng::new(".").page(template).generate_to_string(data)
}

/// Render with an explicit content type.
pub(crate) fn g_ct(template: &str, data: &Fragment, ctype: &str) -> (String, ErrorLog) {
    Teng::new(".").page(template).content_type(ctype).generate_to_string(data)
}

/// Assert the exact content and order of the diagnostic log.
#[track_caller]
pub(crate) fn assert_log(log: &ErrorLog, expected: &[(Severity, (u32, u32), &str)]) {
    for (i, (entry, (severity, (line, col), msg))) in
        log.entries().iter().zip(expected).enumerate()
    {
        assert_eq!(entry.severity, *severity, "severity of entry {i}: {entry}");
        assert_eq!(
            (entry.pos.line, entry.pos.col),
            (*line, *col),
            "position of entry {i}: {entry}",
        );
        assert_eq!(entry.msg, *msg, "message of entry {i}");
    }
    assert_eq!(log.len(), expected.len(), "unexpected log size:\n{log}");
}

/// Assert an empty log, printing it on failure.
#[track_caller]
pub(crate) fn assert_clean(log: &ErrorLog) {
    assert!(log.is_empty(), "expected an empty log, got:\n{log}");
}

use super::*;

#[test]
fn entries_keep_insertion_order() {
    let mut log = ErrorLog::new();
    log.error(Pos::new(1, 10), "first");
    log.diag(Pos::new(1, 0), "second");
    log.warning(Pos::new(2, 3), "third");

    let severities: Vec<_> = log.entries().iter().map(|e| e.severity).collect();
    assert_eq!(severities, vec![Severity::Error, Severity::Diag, Severity::Warning]);
}

#[test]
fn duplicates_are_not_coalesced() {
    let mut log = ErrorLog::new();
    log.warning(Pos::new(1, 0), "same");
    log.warning(Pos::new(1, 0), "same");
    assert_eq!(log.len(), 2);
}

#[test]
fn severity_counters() {
    let mut log = ErrorLog::new();
    log.diag(Pos::start(), "hint");
    log.error(Pos::start(), "boom");
    log.error(Pos::start(), "boom again");
    assert_eq!(log.count_of(Severity::Error), 2);
    assert_eq!(log.count_of(Severity::Fatal), 0);
    assert!(!log.has_fatal());
}

#[test]
fn entry_display() {
    let entry = Entry {
        severity: Severity::Error,
        pos: Pos::new(1, 10),
        msg: "Unexpected token: name=END, view=?>".to_owned(),
    };
    assert_eq!(entry.to_string(), "ERROR [1:10] Unexpected token: name=END, view=?>");
}

#[test]
fn located_in_labels_missing_filename() {
    assert_eq!(Pos::new(1, 39).located_in(""), "(no file):1:39");
    assert_eq!(Pos::new(2, 0).located_in("page.html"), "page.html:2:0");
}

use crate::space::SpaceMode;

#[test]
fn parse_accepts_the_documented_names() {
    assert_eq!(SpaceMode::parse("noformat"), Some(SpaceMode::Noformat));
    assert_eq!(SpaceMode::parse("nospace"), Some(SpaceMode::Nospace));
    assert_eq!(SpaceMode::parse("nowhite"), Some(SpaceMode::Nospace));
    assert_eq!(SpaceMode::parse("onespace"), Some(SpaceMode::Onespace));
    assert_eq!(SpaceMode::parse("striplines"), Some(SpaceMode::Striplines));
    assert_eq!(SpaceMode::parse("joinlines"), Some(SpaceMode::Joinlines));
    assert_eq!(SpaceMode::parse("bogus"), None);
}

#[test]
fn noformat_passes_through() {
    assert_eq!(SpaceMode::Noformat.apply(" a \n b "), " a \n b ");
}

#[test]
fn nospace_drops_all_whitespace() {
    assert_eq!(SpaceMode::Nospace.apply(" a \t\n b "), "ab");
}

#[test]
fn onespace_collapses_runs() {
    assert_eq!(SpaceMode::Onespace.apply("a  \n\t b"), "a b");
    assert_eq!(SpaceMode::Onespace.apply("  x"), " x");
}

#[test]
fn striplines_trims_line_edges() {
    assert_eq!(SpaceMode::Striplines.apply("  a  \n  b  "), "a\nb");
    assert_eq!(SpaceMode::Striplines.apply("  a  \n"), "a\n");
}

#[test]
fn joinlines_also_removes_newlines() {
    assert_eq!(SpaceMode::Joinlines.apply("  a  \n  b  "), "ab");
}

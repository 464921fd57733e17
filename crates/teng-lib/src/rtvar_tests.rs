//! Runtime variables: `$$` paths, indexing, `_parent` navigation.

use teng_core::{Fragment, Severity};

use crate::test_utils::{assert_clean, assert_log, g};

fn three_frags() -> Fragment {
    let mut root = Fragment::new();
    for n in 0..3 {
        root.add_fragment("first").add_variable("n", n);
    }
    root
}

#[test]
fn useless_runtime_variable_is_rewritten_with_a_warning() {
    let (out, log) = g("${$$var}", &Fragment::new());
    assert_eq!(out, "undefined");
    assert_log(
        &log,
        &[
            (
                Severity::Warning,
                (1, 4),
                "The runtime variable is useless; converting it to regular variable",
            ),
            (
                Severity::Warning,
                (1, 4),
                "Runtime: Variable '.var' is undefined [open_frags=., iteration=0/1]",
            ),
        ],
    );
}

#[test]
fn this_prefixed_runtime_variable_is_also_useless() {
    let (_, log) = g("${$$_this.var}", &Fragment::new());
    assert_eq!(
        log.entries()[0].msg,
        "The runtime variable is useless; converting it to regular variable",
    );
    assert_eq!((log.entries()[0].pos.line, log.entries()[0].pos.col), (1, 10));
}

#[test]
fn absolute_single_name_is_useless_too() {
    let mut root = Fragment::new();
    root.add_variable("var", "x");
    let (out, log) = g("${$$.var}", &root);
    assert_eq!(out, "x");
    assert_log(
        &log,
        &[(
            Severity::Warning,
            (1, 5),
            "The runtime variable is useless; converting it to regular variable",
        )],
    );
}

#[test]
fn expanding_paths_resolve_through_fragments() {
    let mut root = Fragment::new();
    root.add_fragment("first")
        .add_fragment("second")
        .add_variable("var", "deep");
    let (out, log) = g("${$$.first.second.var}", &root);
    assert_clean(&log);
    assert_eq!(out, "deep");
}

#[test]
fn relative_paths_start_at_the_current_fragment() {
    let mut root = Fragment::new();
    root.add_fragment("outer")
        .add_fragment("inner")
        .add_variable("v", 7);
    let (out, log) = g(
        "<?teng frag outer?>${$$inner.v}<?teng endfrag?>",
        &root,
    );
    assert_clean(&log);
    assert_eq!(out, "7");
}

#[test]
fn missing_key_on_the_root_fragment() {
    let (out, log) = g("${$$missing.sub}", &Fragment::new());
    assert_eq!(out, "undefined");
    assert_log(
        &log,
        &[(
            Severity::Warning,
            (1, 4),
            "Runtime: This fragment doesn't contain any value for key 'missing' \
             [open_frags=., iteration=0/1]",
        )],
    );
}

#[test]
fn missing_key_deeper_in_the_path() {
    let mut root = Fragment::new();
    root.add_fragment("first");
    let (out, log) = g("${$$.first.var}", &root);
    assert_eq!(out, "undefined");
    assert_log(
        &log,
        &[(
            Severity::Warning,
            (1, 11),
            "Runtime: The path expression '.first' references fragment that \
             doesn't contain any value for key 'var' [open_frags=., iteration=0/1]",
        )],
    );
}

#[test]
fn ambiguous_list_reference() {
    // spec scenario 5
    let data = three_frags();
    let (out, log) = g("${$$.first.var}", &data);
    assert_eq!(out, "undefined");
    assert_log(
        &log,
        &[(
            Severity::Warning,
            (1, 11),
            "Runtime: The path expression '.first' references fragment list of \
             '3' fragments; the expression is ambiguous [open_frags=., iteration=0/1]",
        )],
    );
}

#[test]
fn indexing_disambiguates_lists() {
    let data = three_frags();
    let (out, log) = g("${$$.first[0].n}${$$.first[2].n}", &data);
    assert_clean(&log);
    assert_eq!(out, "02");
}

#[test]
fn negative_indices_wrap_once() {
    let data = three_frags();
    // for 0 <= i < len, path[i] equals path[-len + i]
    for i in 0..3i64 {
        let plain = g(&format!("${{$$.first[{i}].n}}"), &data);
        let wrapped = g(&format!("${{$$.first[{}].n}}", i - 3), &data);
        assert_eq!(plain.0, wrapped.0, "index {i}");
        assert_clean(&plain.1);
        assert_clean(&wrapped.1);
    }
}

#[test]
fn out_of_range_indices_warn() {
    let data = three_frags();
    let (out, log) = g("${$$.first[10].n}", &data);
    assert_eq!(out, "undefined");
    assert_log(
        &log,
        &[(
            Severity::Warning,
            (1, 13),
            "Runtime: The index '10' is out of valid range <0, 3) of the fragments \
             list referenced by this path expression '.first' \
             [open_frags=., iteration=0/1]",
        )],
    );

    let (out, log) = g("${$$.first[-10].n}", &data);
    assert_eq!(out, "undefined");
    assert_eq!(
        log.entries()[0].msg,
        "Runtime: The index '-10' is out of valid range <0, 3) of the fragments \
         list referenced by this path expression '.first' \
         [open_frags=., iteration=0/1]",
    );
}

#[test]
fn computed_indices_evaluate_on_the_stack() {
    let data = three_frags();
    let (out, log) = g("${$$.first[2 - 1].n}", &data);
    assert_clean(&log);
    assert_eq!(out, "1");
}

#[test]
fn string_index_acts_as_attribute_lookup() {
    let mut root = Fragment::new();
    root.add_fragment("single").add_variable("key", "v");
    let (out, log) = g("${$$.single['key']}", &root);
    assert_clean(&log);
    assert_eq!(out, "v");
}

#[test]
fn index_on_a_plain_fragment_is_the_fragment_itself() {
    let mut root = Fragment::new();
    root.add_fragment("frag").add_variable("v", 1);
    let (out, log) = g("${$$.frag[0].v}", &root);
    assert_clean(&log);
    assert_eq!(out, "1");

    let (out, log) = g("${$$.frag[-1].v}", &root);
    assert_clean(&log);
    assert_eq!(out, "1");
}

#[test]
fn parent_climbs_one_level() {
    let mut root = Fragment::new();
    root.add_variable("v", "root");
    let child = root.add_fragment("child");
    child.add_variable("v", "child");
    let (out, log) = g(
        "<?teng frag child?>${$$_parent.v}<?teng endfrag?>",
        &root,
    );
    assert_clean(&log);
    assert_eq!(out, "root");
}

#[test]
fn parent_past_the_root_degrades_to_this() {
    let mut root = Fragment::new();
    root.add_variable("v", "root");
    let (out, log) = g("${$$_parent.v}", &root);
    assert_eq!(out, "root");
    assert_log(
        &log,
        &[(
            Severity::Warning,
            (1, 4),
            "The builtin _parent variable has crossed root boundary; \
             converting it to _this",
        )],
    );
}

#[test]
fn parent_after_a_path_segment_returns_to_the_walked_fragment() {
    let mut root = Fragment::new();
    root.add_variable("v", "top");
    root.add_fragment("a").add_variable("v", "nested");
    let (out, log) = g("${$$.a._parent.v}", &root);
    assert_clean(&log);
    assert_eq!(out, "top");
}

#[test]
fn count_pseudo_attribute_terminates_the_path() {
    let data = three_frags();
    let (out, log) = g("${$$.first._count}", &data);
    assert_clean(&log);
    assert_eq!(out, "3");

    let mut root = Fragment::new();
    root.add_fragment_list("empty");
    let (out, log) = g("${$$.empty._count}", &root);
    assert_clean(&log);
    assert_eq!(out, "0");
}

#[test]
fn printing_a_fragment_reference_warns() {
    let mut root = Fragment::new();
    root.add_fragment("frag");
    let (out, log) = g("${$$frag}", &root);
    assert_eq!(out, "$frag$");
    assert_log(
        &log,
        &[
            (
                Severity::Warning,
                (1, 4),
                "The runtime variable is useless; converting it to regular variable",
            ),
            (
                Severity::Warning,
                (1, 0),
                "Runtime: Variable is a fragment, not a scalar value",
            ),
        ],
    );
}

#[test]
fn printing_a_list_reference_warns() {
    let data = three_frags();
    let (out, log) = g("${$$first}", &data);
    assert_eq!(out, "$list$");
    assert_log(
        &log,
        &[
            (
                Severity::Warning,
                (1, 4),
                "The runtime variable is useless; converting it to regular variable",
            ),
            (
                Severity::Warning,
                (1, 0),
                "Runtime: Variable is a fragment list, not a scalar value",
            ),
        ],
    );
}

#[test]
fn dotted_static_paths_matching_open_fragments_compile_statically() {
    let mut root = Fragment::new();
    root.add_fragment("outer").add_variable("v", "x");
    let (out, log) = g("<?teng frag outer?>${outer.v}<?teng endfrag?>", &root);
    assert_clean(&log);
    assert_eq!(out, "x");
}

#[test]
fn dotted_paths_not_matching_open_fragments_resolve_at_runtime() {
    let mut root = Fragment::new();
    root.add_fragment("closed").add_variable("v", "y");
    let (out, log) = g("${closed.v}", &root);
    assert_clean(&log);
    assert_eq!(out, "y");
}

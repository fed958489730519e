use predicates::prelude::*;
use std::io::Write;
use std::process::Command;
use tempfile::{NamedTempFile, TempDir};

fn cmd() -> assert_cmd::Command {
    assert_cmd::Command::from(Command::new(env!("CARGO_BIN_EXE_macro-doc-check")))
}

fn fixture_path(name: &str) -> String {
    format!("{}/tests/fixtures/{}", env!("CARGO_MANIFEST_DIR"), name)
}

// -- clean input --

#[test]
fn documented_macro_passes() {
    cmd()
        .arg(fixture_path("greet.jinja"))
        .assert()
        .success()
        .stdout("")
        .stderr("");
}

#[test]
fn realistic_macro_file_passes() {
    cmd()
        .arg(fixture_path("macros.jinja"))
        .assert()
        .success()
        .stderr("");
}

#[test]
fn directory_input() {
    let dir = TempDir::new().unwrap();
    std::fs::copy(fixture_path("greet.jinja"), dir.path().join("greet.jinja")).unwrap();
    std::fs::write(dir.path().join("README.md"), "not a template\n").unwrap();

    cmd()
        .arg(dir.path().to_str().unwrap())
        .assert()
        .success()
        .stderr("");
}

// -- consistency errors --

#[test]
fn extra_header_param_fails() {
    cmd()
        .arg(fixture_path("greet_extra_param.jinja"))
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("ERROR("))
        .stderr(predicate::str::contains("greet_extra_param.jinja:9:MacroBody): "))
        .stderr(predicate::str::contains("param `age` is declared but unused"))
        .stderr(predicate::str::contains("{{%- endmacro %}}"));
}

#[test]
fn documented_param_missing_from_header_fails() {
    cmd()
        .arg(fixture_path("missing_header_param.jinja"))
        .assert()
        .failure()
        .stderr(predicate::str::contains(
            "param `y` is documented but not a real parameter",
        ));
}

#[test]
fn double_blank_line_fails() {
    cmd()
        .arg(fixture_path("blank_lines.jinja"))
        .assert()
        .failure()
        .stderr(predicate::str::contains(
            "blank_lines.jinja:4:CommentText): more than one empty line",
        ));
}

#[test]
fn malformed_type_fails() {
    let mut input = NamedTempFile::with_suffix(".jinja").unwrap();
    input
        .write_all(b"{{#\n:param a: Items.\n:type a: dict[str]\n#}}\n")
        .unwrap();

    cmd()
        .arg(input.path().to_str().unwrap())
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot parse type `dict[str]`"));
}

// -- levels --

#[test]
fn undocumented_param_only_fails_at_level_three() {
    cmd()
        .arg(fixture_path("undocumented.jinja"))
        .assert()
        .success();

    cmd()
        .args(["--level", "3"])
        .arg(fixture_path("undocumented.jinja"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("param `tag` is undocumented"))
        .stderr(predicate::str::contains("`caller`").not());
}

#[test]
fn maybe_bool_is_a_warning_at_level_two() {
    let mut input = NamedTempFile::with_suffix(".jinja").unwrap();
    input
        .write_all(
            b"{{#\n:param a: Name.\n:type a: str\n#}}\n{{%- macro f(a) %}}\n{{%- if a %}}{{{ a }}}{{%- endif %}}\n{{%- endmacro %}}\n",
        )
        .unwrap();

    cmd()
        .args(["--level", "2"])
        .arg(input.path().to_str().unwrap())
        .assert()
        .success()
        .stderr(predicate::str::contains("WARNING("))
        .stderr(predicate::str::contains(
            "param `a` is tested as a boolean but declared `str`",
        ));
}

// -- multiple files --

#[test]
fn every_file_is_checked_by_default() {
    cmd()
        .arg(fixture_path("greet_extra_param.jinja"))
        .arg(fixture_path("missing_header_param.jinja"))
        .arg(fixture_path("greet.jinja"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("`age`"))
        .stderr(predicate::str::contains("`y`"));
}

#[test]
fn fail_fast_stops_at_first_bad_file() {
    cmd()
        .arg("--fail-fast")
        .arg(fixture_path("greet_extra_param.jinja"))
        .arg(fixture_path("missing_header_param.jinja"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("`age`"))
        .stderr(predicate::str::contains("`y`").not());
}

#[test]
fn missing_file_fails() {
    cmd()
        .arg(fixture_path("does-not-exist.jinja"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("no files matched"));
}

#[test]
fn help_describes_diagnostic_prefixes() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("ERROR(<file>:<line>:<state>)"))
        .stdout(predicate::str::contains("WARNING(<file>:<line>:<state>)"));
}

#[test]
fn files_are_required() {
    cmd().assert().failure();
}

// -- outputs --

#[test]
fn emit_guards_prints_statements() {
    cmd()
        .arg("--emit-guards")
        .arg(fixture_path("macros.jinja"))
        .assert()
        .success()
        .stdout(predicate::str::contains("{{# oval_packages(negate) #}}"))
        .stdout(predicate::str::contains("{{%- if negate is not boolean %}}"))
        .stdout(predicate::str::contains("{{%- elif packages is string %}}"))
        .stdout(predicate::str::contains("{{%- for elem_packages in packages %}}"))
        .stdout(predicate::str::contains("{{%- elif mode is none %}}"));
}

#[test]
fn log_traces_states_and_ledger() {
    cmd()
        .arg("--log")
        .arg(fixture_path("greet.jinja"))
        .assert()
        .success()
        .stderr(predicate::str::contains("greet.jinja:1 PreComment {{#"))
        .stderr(predicate::str::contains("CommentParam :param name: Who to greet."))
        .stderr(predicate::str::contains("greet name: type=str"));
}

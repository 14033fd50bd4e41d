use predicates::prelude::*;
use std::fs;
use std::process::Command;
use tempfile::TempDir;

fn cmd() -> assert_cmd::Command {
    assert_cmd::Command::from(Command::new(env!("CARGO_BIN_EXE_glcp")))
}

const HELLO: &str = "package hello\n\nfunc HelloFunc() {\n\tfmt.Println(\"hello\")\n}\n";
const HELLO_DOCUMENTED: &str = "package hello\n\n// HelloFunc needs a comment (THIS IS A PLACEHOLDER)\nfunc HelloFunc() {\n\tfmt.Println(\"hello\")\n}\n";

fn package(files: &[(&str, &str)]) -> TempDir {
    let dir = TempDir::new().unwrap();
    for (name, body) in files {
        fs::write(dir.path().join(name), body).unwrap();
    }
    dir
}

#[test]
fn cli_prints_to_stdout() {
    let dir = package(&[("hello.go", HELLO)]);
    cmd()
        .arg(dir.path())
        .assert()
        .success()
        .stdout(HELLO_DOCUMENTED);
    assert_eq!(fs::read_to_string(dir.path().join("hello.go")).unwrap(), HELLO);
}

#[test]
fn cli_write_in_place() {
    let dir = package(&[("hello.go", HELLO)]);
    cmd()
        .arg("-w")
        .arg(dir.path())
        .assert()
        .success()
        .stdout("");
    assert_eq!(
        fs::read_to_string(dir.path().join("hello.go")).unwrap(),
        HELLO_DOCUMENTED
    );
}

#[test]
fn cli_write_is_idempotent() {
    let dir = package(&[("hello.go", HELLO)]);
    cmd().arg("-w").arg(dir.path()).assert().success();
    cmd().arg("-w").arg(dir.path()).assert().success();
    assert_eq!(
        fs::read_to_string(dir.path().join("hello.go")).unwrap(),
        HELLO_DOCUMENTED
    );
}

#[test]
fn cli_relative_package_in_current_dir() {
    let dir = package(&[
        ("2.go", "package hello\n\nvar y = 2\n"),
        ("1.go", "package hello\n\nconst X = 1\n"),
        ("1_test.go", "package hello\n\nfunc TestX() {}\n"),
    ]);
    cmd()
        .current_dir(dir.path())
        .arg(".")
        .assert()
        .success()
        .stdout(
            "package hello\n\n// X needs a comment (THIS IS A PLACEHOLDER)\nconst X = 1\npackage hello\n\nvar y = 2\n",
        );
}

#[test]
fn cli_several_packages_in_order() {
    let first = package(&[("a.go", "package a\n\nfunc A() {}\n")]);
    let second = package(&[("b.go", "package b\n\nfunc b() {}\n")]);
    cmd()
        .arg(first.path())
        .arg(second.path())
        .assert()
        .success()
        .stdout(
            "package a\n\n// A needs a comment (THIS IS A PLACEHOLDER)\nfunc A() {}\npackage b\n\nfunc b() {}\n",
        );
}

#[test]
fn cli_unexported_only_is_unchanged() {
    let src = "package hello\n\nvar (\n\thelloVar  = \"hello\"\n\thelloVar2 = \"hello2\"\n)\n";
    let dir = package(&[("hello.go", src)]);
    cmd().arg(dir.path()).assert().success().stdout(src);
}

#[test]
fn cli_missing_package_is_usage_error() {
    cmd()
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("PACKAGE"));
}

#[test]
fn cli_parse_error_exits_nonzero() {
    let dir = package(&[("bad.go", "package hello\n\nfunc {\n")]);
    cmd()
        .arg("-w")
        .arg(dir.path())
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::starts_with("error: "))
        .stderr(predicate::str::contains("bad.go:3:"));
    assert_eq!(
        fs::read_to_string(dir.path().join("bad.go")).unwrap(),
        "package hello\n\nfunc {\n"
    );
}

#[test]
fn cli_unknown_package() {
    let gopath = TempDir::new().unwrap();
    cmd()
        .env("GOPATH", gopath.path())
        .env_remove("GOROOT")
        .arg("example.com/does/not/exist")
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains(
            "cannot find package \"example.com/does/not/exist\"",
        ));
}

#[test]
fn cli_directory_without_go_files() {
    let dir = package(&[("README.md", "nothing here\n")]);
    cmd()
        .arg(dir.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("no buildable Go source files"));
}

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

fn bindle() -> Command {
  Command::cargo_bin("bindle").expect("binary builds")
}

#[test]
fn test_bundle_to_outfile() {
  let tmp = TempDir::new().unwrap();
  fs::write(tmp.path().join("dep.js"), "export let msg = 'hello';\n").unwrap();
  fs::write(
    tmp.path().join("main.js"),
    "import { msg } from './dep.js';\nconsole.log(msg);\n",
  )
  .unwrap();

  bindle()
    .current_dir(tmp.path())
    .args(["main.js", "--bundle", "--outfile", "out.js"])
    .assert()
    .success();

  let out = fs::read_to_string(tmp.path().join("out.js")).unwrap();
  assert!(out.contains("hello"), "{}", out);
  assert!(!out.contains("import"), "{}", out);
}

#[test]
fn test_stdout_when_no_destination() {
  let tmp = TempDir::new().unwrap();
  fs::write(tmp.path().join("main.js"), "let x = 1;\nconsole.log(x);\n").unwrap();

  bindle()
    .current_dir(tmp.path())
    .args(["main.js", "--bundle"])
    .assert()
    .success()
    .stdout(predicate::str::contains("console.log"));
}

#[test]
fn test_unresolved_import_fails_with_nonzero_exit() {
  let tmp = TempDir::new().unwrap();
  fs::write(tmp.path().join("main.js"), "import './nope.js';\n").unwrap();

  bindle()
    .current_dir(tmp.path())
    .args(["main.js", "--bundle", "--outfile", "out.js"])
    .assert()
    .failure()
    .stderr(predicate::str::contains("Could not resolve"));

  assert!(!tmp.path().join("out.js").exists(), "failed builds must not write output");
}

#[test]
fn test_minify_flag() {
  let tmp = TempDir::new().unwrap();
  fs::write(tmp.path().join("main.js"), "let value = true;\nconsole.log(value);\n").unwrap();

  bindle()
    .current_dir(tmp.path())
    .args(["main.js", "--bundle", "--minify", "--outfile", "out.js"])
    .assert()
    .success();

  let out = fs::read_to_string(tmp.path().join("out.js")).unwrap();
  assert!(out.contains("!0"), "{}", out);
  assert!(!out.contains('\n'), "{}", out);
}

#[test]
fn test_invalid_format_is_rejected() {
  let tmp = TempDir::new().unwrap();
  fs::write(tmp.path().join("main.js"), "console.log(1);\n").unwrap();

  bindle()
    .current_dir(tmp.path())
    .args(["main.js", "--bundle", "--format", "umd", "--outfile", "out.js"])
    .assert()
    .failure()
    .stderr(predicate::str::contains("Invalid output format"));
}

#[test]
fn test_splitting_requires_esm() {
  let tmp = TempDir::new().unwrap();
  fs::write(tmp.path().join("main.js"), "console.log(1);\n").unwrap();

  bindle()
    .current_dir(tmp.path())
    .args(["main.js", "--bundle", "--splitting", "--format", "cjs", "--outdir", "dist"])
    .assert()
    .failure()
    .stderr(predicate::str::contains("esm"));
}

#[test]
fn test_metafile_written() {
  let tmp = TempDir::new().unwrap();
  fs::write(tmp.path().join("main.js"), "console.log(1);\n").unwrap();

  bindle()
    .current_dir(tmp.path())
    .args(["main.js", "--bundle", "--outfile", "out.js", "--metafile", "meta.json"])
    .assert()
    .success();

  let meta = fs::read_to_string(tmp.path().join("meta.json")).unwrap();
  let value: serde_json::Value = serde_json::from_str(&meta).unwrap();
  assert!(value["inputs"]["main.js"].is_object(), "{}", meta);
}

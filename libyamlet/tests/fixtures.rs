//! Test harness for the YAML parser against fixture files.
//!
//! Every `test/yaml/*.yaml` file must parse, one document at a time, to the
//! compact JSON lines of the matching `test/json/*.json` file. Every
//! `test/nay/*.yaml` file must fail with the message in its `.error` file.

use std::fs;
use std::path::{Path, PathBuf};

use glob::glob;
use libyamlet::{parse_all, parse_with_filename, Value};

/// Root test directory.
fn test_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .unwrap()
        .join("test")
}

/// All `.yaml` files in a subdirectory of `test/`, sorted.
fn yaml_files(subdir: &str) -> Vec<PathBuf> {
    let pattern = test_root().join(subdir).join("*.yaml");
    let mut files: Vec<PathBuf> = glob(&pattern.to_string_lossy())
        .expect("fixture pattern is valid")
        .flatten()
        .collect();
    files.sort();
    files
}

/// Read a sibling file with the same stem from `subdir` and extension `ext`.
fn read_expected(path: &Path, subdir: &str, ext: &str) -> Option<String> {
    let stem = path.file_stem()?.to_string_lossy();
    fs::read_to_string(test_root().join(subdir).join(format!("{}.{}", stem, ext))).ok()
}

fn file_name(path: &Path) -> String {
    path.file_name().unwrap().to_string_lossy().to_string()
}

/// Run a single fixture that is expected to parse.
fn run_yaml_test(path: &Path) -> Result<(), String> {
    let filename = file_name(path);
    let content = fs::read_to_string(path).map_err(|e| format!("Failed to read {}: {}", filename, e))?;

    let documents = parse_all(&content).map_err(|e| format!("{}: Unexpected parse error: {}", filename, e))?;
    let actual: Vec<String> = documents.iter().map(Value::to_string).collect();

    match read_expected(path, "json", "json") {
        Some(expected) => {
            let expected: Vec<&str> = expected.lines().filter(|line| !line.trim().is_empty()).collect();
            if actual != expected {
                return Err(format!(
                    "{}: Output mismatch\n    expected: {}\n    actual:   {}",
                    filename,
                    expected.join(" | "),
                    actual.join(" | ")
                ));
            }
            println!("  {} => {}", filename, actual.join(" | "));
        }
        None => println!("  {} => {} (no expected output)", filename, actual.join(" | ")),
    }
    Ok(())
}

/// Run a single fixture that is expected to fail.
fn run_nay_test(path: &Path) -> Result<(), String> {
    let filename = file_name(path);
    let content = fs::read_to_string(path).map_err(|e| format!("Failed to read {}: {}", filename, e))?;

    match parse_with_filename(&content, Some(&filename)) {
        Ok(value) => Err(format!(
            "{}: Expected parse error, but got success: {}",
            filename, value
        )),
        Err(e) => {
            let actual = e.to_string();
            match read_expected(path, "nay", "error") {
                Some(expected) if expected.trim() == actual => {
                    println!("  {} => error (as expected)", filename);
                    Ok(())
                }
                Some(expected) => Err(format!(
                    "{}: Error mismatch\n    expected: {}\n    actual:   {}",
                    filename,
                    expected.trim(),
                    actual
                )),
                None => {
                    println!("  {} => error: {} (no .error file to compare)", filename, actual);
                    Ok(())
                }
            }
        }
    }
}

fn run_all(kind: &str, files: &[PathBuf], run: fn(&Path) -> Result<(), String>) {
    println!("\nRunning {} {} fixtures:", files.len(), kind);

    let mut passed = 0;
    let mut errors: Vec<String> = Vec::new();
    for file in files {
        match run(file) {
            Ok(()) => passed += 1,
            Err(e) => errors.push(e),
        }
    }

    println!("\nResults: {} passed, {} failed", passed, errors.len());
    if !errors.is_empty() {
        println!("\nErrors:");
        for error in &errors {
            println!("  - {}", error);
        }
    }
    assert!(errors.is_empty(), "{} {} fixtures failed", errors.len(), kind);
}

#[test]
fn test_all_yaml_fixtures() {
    let files = yaml_files("yaml");
    assert!(!files.is_empty(), "no fixtures found under test/yaml");
    run_all("yaml", &files, run_yaml_test);
}

#[test]
fn test_all_nay_fixtures() {
    let files = yaml_files("nay");
    assert!(!files.is_empty(), "no fixtures found under test/nay");
    run_all("nay", &files, run_nay_test);
}

#[test]
fn test_every_yaml_fixture_has_expected_output() {
    for file in yaml_files("yaml") {
        assert!(
            read_expected(&file, "json", "json").is_some(),
            "{} has no json counterpart",
            file_name(&file)
        );
    }
}

#[test]
fn test_reparse_is_stable() {
    for file in yaml_files("yaml") {
        let content = fs::read_to_string(&file).unwrap();
        assert_eq!(parse_all(&content).unwrap(), parse_all(&content).unwrap());
    }
}

// Individual cases

#[test]
fn test_single_scalar() {
    assert_eq!(libyamlet::parse("1").unwrap(), Value::Integer(1));
    assert_eq!(libyamlet::parse("   1    ").unwrap(), Value::Integer(1));
}

#[test]
fn test_folded_value() {
    let value = libyamlet::parse("foo: >\n  bar\n  baz").unwrap();
    assert_eq!(value.get("foo"), Some(&Value::from("bar baz")));
}

#[test]
fn test_literal_chomping() {
    let clip = libyamlet::parse("|\nfoo\nbar\n\n\n").unwrap();
    let strip = libyamlet::parse("|-\nfoo\nbar\n\n\n").unwrap();
    let keep = libyamlet::parse("|+\nfoo\nbar\n\n\n").unwrap();
    assert_eq!(clip, Value::from("foo\nbar\n"));
    assert_eq!(strip, Value::from("foo\nbar"));
    assert_eq!(keep, Value::from("foo\nbar\n\n\n"));
}

#[test]
fn test_folding_blank_line() {
    assert_eq!(libyamlet::parse(">\n  foo\n  bar\n").unwrap(), Value::from("foo bar\n"));
    assert_eq!(libyamlet::parse(">\n  foo\n\n  bar\n").unwrap(), Value::from("foo\nbar\n"));
}

#[test]
fn test_empty_and_blank_input_fail() {
    assert!(libyamlet::parse("").is_err());
    assert!(libyamlet::parse("    ").is_err());
}

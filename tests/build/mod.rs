use assert_cmd::assert::Assert;
use assert_cmd::assert::OutputAssertExt;
use assert_cmd::Command;
use rand;
use std::{
    env::temp_dir,
    path::{Path, PathBuf},
};

lazy_static! {
    pub static ref CASES_DIR: PathBuf = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/cases");
}

/**
 * Write `code` to a fresh file in the temporary directory.
 */
pub fn write_source(code: &str) -> PathBuf {
    let mut filename = temp_dir();
    filename.push(format!("{:016X}.c", rand::random::<u64>()));
    std::fs::write(&filename, code).unwrap();
    filename
}

pub fn run(args: &[&str], input: &Path) -> Assert {
    Command::cargo_bin("extint-cc")
        .unwrap()
        .args(args)
        .arg(input)
        .output()
        .unwrap()
        .assert()
}

pub fn compile(code: &str, args: &[&str]) -> Assert {
    run(args, &write_source(code))
}

pub fn stderr_of(assert: &Assert) -> String {
    String::from_utf8_lossy(&assert.get_output().stderr).to_string()
}

pub fn stdout_of(assert: &Assert) -> String {
    String::from_utf8_lossy(&assert.get_output().stdout).to_string()
}

/**
 * Flags from the `//cc-args` header line and the messages of `//expected-error:` lines.
 */
pub fn parse_case(text: &str) -> (Vec<String>, Vec<String>) {
    let mut args = Vec::new();
    let mut errors = Vec::new();
    for line in text.lines() {
        if let Some(rest) = line.strip_prefix("//cc-args") {
            args.extend(rest.split_whitespace().map(|s| s.to_string()));
        } else if let Some(rest) = line.strip_prefix("//expected-error:") {
            errors.push(rest.trim().to_string());
        }
    }
    (args, errors)
}

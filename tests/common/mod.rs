#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

pub fn write_lines(path: &Path, lines: usize) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    let body: String = (0..lines).map(|i| format!("line {i}\n")).collect();
    fs::write(path, body).unwrap();
}

/// Lays out the worked example: five chapters (one a 10-line stub) and two
/// appendices, plus title and metadata files.
pub fn sample_book(root: &Path) {
    write_lines(&root.join("content/title.md"), 3);
    fs::write(root.join("metadata.yaml"), "title: FreeBSD Device Drivers\n").unwrap();

    write_lines(&root.join("content/chapters/01-intro.md"), 40);
    write_lines(&root.join("content/chapters/02-tools.md"), 25);
    write_lines(&root.join("content/chapters/03-stub.md"), 10);
    write_lines(&root.join("content/chapters/04-kld/index.md"), 120);
    write_lines(&root.join("content/chapters/05-newbus.md"), 20);

    write_lines(&root.join("content/appendices/a-style.md"), 30);
    write_lines(&root.join("content/appendices/b-refs.md"), 22);
}

#[cfg(unix)]
pub fn write_script(path: &Path, body: &str) {
    use std::os::unix::fs::PermissionsExt;

    fs::write(path, format!("#!/bin/sh\n{body}")).unwrap();
    fs::set_permissions(path, fs::Permissions::from_mode(0o755)).unwrap();
}

/// A stand-in for pandoc. Each invocation appends its arguments, one per
/// line, to `log` followed by `--end--`, then writes a small artifact to the
/// path after `-o`. Invocations whose arguments contain `fail_on` exit 3.
#[cfg(unix)]
pub fn fake_converter(dir: &Path, log: &Path, fail_on: Option<&str>) -> PathBuf {
    let script = dir.join("fake-pandoc");
    let failure = match fail_on {
        Some(pattern) => format!(
            "case \"$*\" in *{pattern}*) echo \"converter exploded\" >&2; exit 3;; esac\n"
        ),
        None => String::new(),
    };
    let body = format!(
        r#"if [ "$1" = "--version" ]; then echo "pandoc 3.1.9"; exit 0; fi
for arg in "$@"; do printf '%s\n' "$arg" >> "{log}"; done
echo "--end--" >> "{log}"
{failure}out=""
prev=""
for arg in "$@"; do
  if [ "$prev" = "-o" ]; then out="$arg"; fi
  prev="$arg"
done
printf '<html><head><title>Fake Book</title></head></html>' > "$out"
"#,
        log = log.display(),
        failure = failure,
    );
    write_script(&script, &body);
    script
}

/// Splits the converter log into one argument list per invocation.
pub fn invocations(log: &Path) -> Vec<Vec<String>> {
    let text = fs::read_to_string(log).unwrap_or_default();
    let mut calls = Vec::new();
    let mut current = Vec::new();
    for line in text.lines() {
        if line == "--end--" {
            calls.push(std::mem::take(&mut current));
        } else {
            current.push(line.to_string());
        }
    }
    calls
}

/// The leading `.md` arguments of one invocation.
pub fn input_files(call: &[String]) -> Vec<String> {
    call.iter()
        .take_while(|arg| arg.ends_with(".md"))
        .cloned()
        .collect()
}

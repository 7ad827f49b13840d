//! Hygiene: coding standards enforced at test time.
//!
//! Scans production sources under `src/` for antipatterns. Each pattern has a
//! budget; if you must add one, fix an existing one first. Budgets never grow.

use std::fs;
use std::path::Path;

/// `(pattern, budget)`.
const BUDGETS: &[(&str, usize)] = &[
    // Panics.
    (".unwrap()", 0),
    (".expect(", 0),
    ("panic!(", 0),
    ("unreachable!(", 0),
    ("todo!(", 0),
    ("unimplemented!(", 0),
    // Silent loss.
    ("let _ =", 0),
    (".ok()", 0),
    // Structure.
    ("#[allow(dead_code)]", 0),
];

struct SourceFile {
    path: String,
    content: String,
}

/// Production `.rs` files, skipping `*_test.rs` and test-only helpers.
fn source_files(dir: &Path, out: &mut Vec<SourceFile>) {
    let Ok(entries) = fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            source_files(&path, out);
            continue;
        }
        let path_str = path.to_string_lossy().to_string();
        let is_rust = path.extension().is_some_and(|e| e == "rs");
        if !is_rust || path_str.ends_with("_test.rs") || path_str.ends_with("test_support.rs") {
            continue;
        }
        if let Ok(content) = fs::read_to_string(&path) {
            out.push(SourceFile { path: path_str, content });
        }
    }
}

fn hits(files: &[SourceFile], pattern: &str) -> Vec<(String, usize)> {
    files
        .iter()
        .map(|file| {
            let count = file.content.lines().filter(|line| line.contains(pattern)).count();
            (file.path.clone(), count)
        })
        .filter(|(_, count)| *count > 0)
        .collect()
}

#[test]
fn antipattern_budgets() {
    let mut files = Vec::new();
    source_files(Path::new("src"), &mut files);
    assert!(!files.is_empty(), "no sources found under src/");

    let mut over = Vec::new();
    for (pattern, budget) in BUDGETS {
        let found = hits(&files, pattern);
        let count = found.iter().map(|(_, c)| c).sum::<usize>();
        if count > *budget {
            let detail = found
                .iter()
                .map(|(path, c)| format!("    {path}: {c}"))
                .collect::<Vec<_>>()
                .join("\n");
            over.push(format!("  `{pattern}`: found {count}, max {budget}\n{detail}"));
        }
    }
    assert!(over.is_empty(), "hygiene budget exceeded:\n{}", over.join("\n"));
}

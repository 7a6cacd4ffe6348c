use grep::regex::RegexMatcher;
use grep::searcher::{Searcher, Sink, SinkMatch};
use std::error::Error;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

const SOURCE_DIRS: [&str; 3] = ["step", "tests", "benches"];

const FORBIDDEN_WORDS: &str = "FIXED|CORRECTED|FIXES|FIX|NEW|CHANGED|CHANGES|CHANGE|MODIFIED|MODIFIES|MODIFY|UPDATED|UPDATES|UPDATE";

/// One source policy: a line-level regex plus a filter deciding whether a
/// matching line is really a violation.
#[derive(Clone, Copy)]
enum Policy {
    UnderscorePrefix,
    ForbiddenCommentWord,
    StarsInComment,
    AllCapsComment,
    AllowDeadCode,
}

impl Policy {
    const ALL: [Policy; 5] = [
        Policy::UnderscorePrefix,
        Policy::ForbiddenCommentWord,
        Policy::StarsInComment,
        Policy::AllCapsComment,
        Policy::AllowDeadCode,
    ];

    fn pattern(self) -> String {
        match self {
            Policy::UnderscorePrefix => r"\b(_[a-zA-Z0-9_]+)\b".to_string(),
            Policy::ForbiddenCommentWord => format!(r"(//|/\*).*(?:{FORBIDDEN_WORDS})"),
            Policy::StarsInComment => r"(//|/\*).*\*\*".to_string(),
            Policy::AllCapsComment => r"(//|/\*).*".to_string(),
            Policy::AllowDeadCode => r"#\s*\[\s*allow\s*\(\s*dead_code\s*\)\s*\]".to_string(),
        }
    }

    fn description(self) -> &'static str {
        match self {
            Policy::UnderscorePrefix => "underscore-prefixed identifiers",
            Policy::ForbiddenCommentWord => "comments announcing edits (FIX, NEW, UPDATE and similar)",
            Policy::StarsInComment => "'**' in regular comments",
            Policy::AllCapsComment => "comments written entirely in uppercase",
            Policy::AllowDeadCode => "#[allow(dead_code)] attributes",
        }
    }

    fn is_violation(self, line: &str) -> bool {
        let trimmed = line.trim_start();
        match self {
            Policy::UnderscorePrefix => !trimmed.starts_with("//") && !underscore_only_in_strings(line),
            Policy::ForbiddenCommentWord | Policy::AllowDeadCode => true,
            Policy::StarsInComment => !trimmed.starts_with("///") && !trimmed.starts_with("//!"),
            Policy::AllCapsComment => {
                let Some(start) = line.find("//") else {
                    return false;
                };
                let letters: Vec<char> = line[start..]
                    .trim_start_matches(['/', '!'])
                    .chars()
                    .filter(|c| c.is_alphabetic())
                    .collect();
                !letters.is_empty() && letters.iter().all(|c| c.is_uppercase())
            }
        }
    }
}

fn underscore_only_in_strings(line: &str) -> bool {
    line.contains('"')
        && line
            .split('"')
            .enumerate()
            .any(|(i, part)| i % 2 == 1 && part.contains('_'))
}

struct PolicyCollector {
    policy: Policy,
    file_path: PathBuf,
    violations: Vec<String>,
}

impl PolicyCollector {
    fn new(policy: Policy, file_path: &Path) -> Self {
        Self {
            policy,
            file_path: file_path.to_path_buf(),
            violations: Vec::new(),
        }
    }

    fn error_message(&self) -> Option<String> {
        if self.violations.is_empty() {
            return None;
        }

        let mut msg = format!(
            "\n❌ ERROR: Found {} {} in {}:\n",
            self.violations.len(),
            self.policy.description(),
            self.file_path.display()
        );
        for violation in &self.violations {
            msg.push_str(&format!("   {violation}\n"));
        }
        msg.push_str("\n⚠️ These patterns are not allowed in this project. Remove them before committing.\n");
        Some(msg)
    }
}

impl Sink for PolicyCollector {
    type Error = std::io::Error;

    fn matched(&mut self, _: &Searcher, mat: &SinkMatch) -> Result<bool, Self::Error> {
        let line_number = mat.line_number().unwrap_or(0);
        let line_text = std::str::from_utf8(mat.bytes()).unwrap_or("").trim_end();

        if self.policy.is_violation(line_text) {
            self.violations.push(format!("{line_number}:{line_text}"));
        }
        Ok(true)
    }
}

fn rust_sources() -> impl Iterator<Item = PathBuf> {
    SOURCE_DIRS.into_iter().flat_map(|dir| {
        WalkDir::new(dir)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.path().extension().is_some_and(|ext| ext == "rs"))
            .map(|e| e.into_path())
    })
}

fn scan_sources() -> Result<(), Box<dyn Error>> {
    let mut searcher = Searcher::new();

    for policy in Policy::ALL {
        let matcher = RegexMatcher::new_line_matcher(&policy.pattern())?;
        for path in rust_sources() {
            let mut collector = PolicyCollector::new(policy, &path);
            searcher.search_path(&matcher, &path, &mut collector)?;
            if let Some(msg) = collector.error_message() {
                return Err(msg.into());
            }
        }
    }
    Ok(())
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    for dir in SOURCE_DIRS {
        println!("cargo:rerun-if-changed={dir}");
    }

    if let Err(e) = scan_sources() {
        eprintln!("{e}");
        std::process::exit(1);
    }
}

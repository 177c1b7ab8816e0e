use grep::regex::RegexMatcher;
use grep::searcher::{Searcher, Sink, SinkMatch};
use std::error::Error;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

// Directories holding the crate's own Rust sources. Everything else in the
// checkout (build output, reference material) is out of scope for the gate.
const SOURCE_DIRS: [&str; 4] = ["evaluate", "cli", "tests", "benches"];

const FORBIDDEN_WORDS: [&str; 14] = [
    "FIXED",
    "CORRECTED",
    "FIX",
    "FIXES",
    "NEW",
    "CHANGED",
    "CHANGES",
    "CHANGE",
    "MODIFIED",
    "MODIFIES",
    "MODIFY",
    "UPDATED",
    "UPDATES",
    "UPDATE",
];

#[derive(Clone, Copy)]
enum Rule {
    UnderscorePrefix,
    ForbiddenWord,
    DoubleStar,
    AllCapsComment,
    AllowDeadCode,
}

impl Rule {
    const ALL: [Rule; 5] = [
        Rule::UnderscorePrefix,
        Rule::ForbiddenWord,
        Rule::DoubleStar,
        Rule::AllCapsComment,
        Rule::AllowDeadCode,
    ];

    fn pattern(self) -> String {
        match self {
            Rule::UnderscorePrefix => r"\b(_[a-zA-Z0-9_]+)\b".to_string(),
            Rule::ForbiddenWord => format!(r"(//|/\*).*(?:{})", FORBIDDEN_WORDS.join("|")),
            Rule::DoubleStar => r"(//|/\*).*\*\*".to_string(),
            Rule::AllCapsComment => r"(//|/\*).*".to_string(),
            Rule::AllowDeadCode => r"#\s*\[\s*allow\s*\(\s*dead_code\s*\)\s*\]".to_string(),
        }
    }

    fn explanation(self) -> &'static str {
        match self {
            Rule::UnderscorePrefix => {
                "Underscore-prefixed names are not allowed. Use the binding or remove it."
            }
            Rule::ForbiddenWord => {
                "Comments must not narrate edits (FIX, NEW, CHANGE, UPDATE, MODIFY and variants)."
            }
            Rule::DoubleStar => "The '**' pattern is only allowed in doc comments.",
            Rule::AllCapsComment => "Comments written entirely in uppercase are not allowed.",
            Rule::AllowDeadCode => "#[allow(dead_code)] is not allowed. Use the code or delete it.",
        }
    }

    // Second-stage filter on a line the regex already matched.
    fn is_violation(self, line: &str) -> bool {
        let trimmed = line.trim_start();
        match self {
            Rule::UnderscorePrefix => !trimmed.starts_with("//") && !in_string_literal(line),
            Rule::ForbiddenWord | Rule::AllowDeadCode => true,
            Rule::DoubleStar => !trimmed.starts_with("///") && !trimmed.starts_with("//!"),
            Rule::AllCapsComment => match comment_text(line) {
                Some(text) => {
                    let mut letters = text.chars().filter(|c| c.is_alphabetic()).peekable();
                    letters.peek().is_some() && letters.all(|c| c.is_uppercase())
                }
                None => false,
            },
        }
    }
}

// True when some quoted segment of the line contains an underscore.
fn in_string_literal(line: &str) -> bool {
    line.split('"')
        .enumerate()
        .any(|(i, part)| i % 2 == 1 && part.contains('_'))
}

fn comment_text(line: &str) -> Option<&str> {
    let trimmed = line.trim_start();
    for prefix in ["///", "//!", "//"] {
        if let Some(rest) = trimmed.strip_prefix(prefix) {
            return Some(rest.trim());
        }
    }
    let start = line.find("/*")? + 2;
    let body = &line[start..];
    Some(body.find("*/").map_or(body, |end| &body[..end]).trim())
}

// Collects the offending lines of one file for one rule.
struct ViolationCollector {
    rule: Rule,
    violations: Vec<String>,
}

impl Sink for ViolationCollector {
    type Error = std::io::Error;

    fn matched(&mut self, _: &Searcher, mat: &SinkMatch) -> Result<bool, Self::Error> {
        let line_number = mat.line_number().unwrap_or(0);
        let line_text = std::str::from_utf8(mat.bytes()).unwrap_or("").trim_end();
        if self.rule.is_violation(line_text) {
            self.violations.push(format!("{line_number}:{line_text}"));
        }
        Ok(true)
    }
}

fn check_file(path: &Path, rule: Rule, searcher: &mut Searcher) -> Result<(), Box<dyn Error>> {
    let matcher = RegexMatcher::new_line_matcher(&rule.pattern())?;
    let mut collector = ViolationCollector {
        rule,
        violations: Vec::new(),
    };
    searcher.search_path(&matcher, path, &mut collector)?;
    if collector.violations.is_empty() {
        return Ok(());
    }

    let mut error_msg = format!(
        "\n❌ ERROR: Found {} violations in {}:\n",
        collector.violations.len(),
        path.display()
    );
    for violation in &collector.violations {
        error_msg.push_str(&format!("   {violation}\n"));
    }
    error_msg.push_str(&format!("\n⚠️ {}\n", rule.explanation()));
    Err(error_msg.into())
}

// Every readable .rs file under the source directories.
fn rust_sources() -> Vec<PathBuf> {
    SOURCE_DIRS
        .iter()
        .flat_map(|dir| WalkDir::new(dir).into_iter().filter_map(|e| e.ok()))
        .filter(|e| e.path().extension().is_some_and(|ext| ext == "rs"))
        .filter(|e| std::fs::read_to_string(e.path()).is_ok())
        .map(|e| e.into_path())
        .collect()
}

fn scan_sources() -> Result<(), Box<dyn Error>> {
    let mut searcher = Searcher::new();
    for path in rust_sources() {
        for rule in Rule::ALL {
            check_file(&path, rule, &mut searcher)?;
        }
    }
    Ok(())
}

// Compiles this script on its own with the crate's lint policy enforced.
fn check_build_script_lints() {
    let out_dir = std::env::var("OUT_DIR").unwrap_or_else(|_| ".".to_string());
    let output = std::process::Command::new("rustc")
        .args([
            "--edition",
            "2021",
            "-D",
            "unused_variables",
            "-D",
            "dead_code",
            "-D",
            "unused_imports",
            "--crate-type",
            "bin",
            "--emit",
            "metadata",
            "--out-dir",
            out_dir.as_str(),
            "build.rs",
        ])
        .output();

    match output {
        Ok(output) if !output.status.success() => {
            let stderr = String::from_utf8_lossy(&output.stderr);
            if stderr.contains("unused") || stderr.contains("never used") {
                eprintln!("\n❌ ERROR: build.rs violates the lint policy:\n{stderr}");
                std::process::exit(1);
            }
        }
        Ok(_) => {}
        Err(_) => println!("cargo:warning=Could not lint build.rs with rustc"),
    }
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    for dir in SOURCE_DIRS {
        println!("cargo:rerun-if-changed={dir}");
    }

    check_build_script_lints();

    if let Err(e) = scan_sources() {
        eprintln!("{e}");
        std::process::exit(1);
    }
}

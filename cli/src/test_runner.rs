use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::debug;

use novascript::{Block, BlockType, ParseErrorKind};

const FIXTURE_SUFFIX: &str = ".test.nova";

#[derive(Debug, Deserialize)]
pub struct ExpectedBlock {
    #[serde(rename = "type")]
    pub block_type: BlockType,

    /// Exact block content. Unchecked when absent.
    #[serde(default)]
    pub content: Option<String>,

    /// Valued attributes (`key = value`).
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,

    /// Bare flag attributes.
    #[serde(default)]
    pub flags: Vec<String>,

    /// 1-based line the block must start on.
    #[serde(default)]
    pub line: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct Fixture {
    #[serde(default)]
    pub description: Option<String>,

    /// If present, the exact block list the script must parse to.
    #[serde(default)]
    pub expect_blocks: Option<Vec<ExpectedBlock>>,

    /// If present, parsing must fail with this error kind.
    #[serde(default)]
    pub expect_error: Option<ParseErrorKind>,

    /// Line the expected error must be reported on.
    #[serde(default)]
    pub expect_error_line: Option<usize>,
}

/// Split a `.test.nova` file into its TOML frontmatter and script source.
fn split_fixture(content: &str) -> Result<(Fixture, &str), String> {
    let content = content.trim_start_matches('\u{feff}');
    let body = content
        .strip_prefix("---")
        .ok_or("missing opening --- frontmatter delimiter")?;
    let body = body
        .strip_prefix("\r\n")
        .or_else(|| body.strip_prefix('\n'))
        .unwrap_or(body);

    let close = body
        .find("\n---")
        .ok_or("missing closing --- frontmatter delimiter")?;
    let frontmatter = body[..close].trim_end_matches('\r');

    let after = &body[close + "\n---".len()..];
    let source = after
        .strip_prefix("\r\n")
        .or_else(|| after.strip_prefix('\n'))
        .unwrap_or(after);

    let fixture: Fixture =
        toml::from_str(frontmatter).map_err(|e| format!("TOML parse error: {}", e))?;
    Ok((fixture, source))
}

pub struct TestResult {
    pub path: PathBuf,
    pub description: Option<String>,
    /// `None` on success, otherwise the failure reason.
    pub failure: Option<String>,
}

impl TestResult {
    fn label(&self) -> &str {
        self.description.as_deref().unwrap_or_else(|| {
            self.path
                .file_name()
                .and_then(|s| s.to_str())
                .map(|s| s.trim_end_matches(FIXTURE_SUFFIX))
                .unwrap_or("?")
        })
    }
}

fn run_fixture(path: &Path) -> TestResult {
    let (description, failure) = match std::fs::read_to_string(path) {
        Err(e) => (None, Some(format!("cannot read file: {}", e))),
        Ok(content) => match split_fixture(&content) {
            Err(e) => (None, Some(format!("frontmatter error: {}", e))),
            Ok((fixture, source)) => (fixture.description.clone(), check_fixture(&fixture, source)),
        },
    };
    debug!(path = %path.display(), passed = failure.is_none(), "fixture finished");

    TestResult {
        path: path.to_path_buf(),
        description,
        failure,
    }
}

/// Parse `source` and compare against the fixture's expectations.
/// Returns `Some(reason)` on mismatch.
fn check_fixture(fixture: &Fixture, source: &str) -> Option<String> {
    let result = novascript::parse(source);

    match (fixture.expect_error, result) {
        (Some(expected), Err(err)) => {
            if err.kind != expected {
                return Some(format!(
                    "expected {} error, got {}: {}",
                    expected.name(),
                    err.kind.name(),
                    err
                ));
            }
            match fixture.expect_error_line {
                Some(line) if line != err.line => Some(format!(
                    "expected {} error on line {}, got line {}",
                    expected.name(),
                    line,
                    err.line
                )),
                _ => None,
            }
        }
        (Some(expected), Ok(blocks)) => Some(format!(
            "expected {} error, but parsing succeeded with {} block(s)",
            expected.name(),
            blocks.len()
        )),
        (None, Err(err)) => Some(format!("unexpected {} error: {}", err.kind.name(), err)),
        (None, Ok(blocks)) => fixture
            .expect_blocks
            .as_deref()
            .and_then(|expected| check_blocks(&blocks, expected)),
    }
}

fn check_blocks(actual: &[Block], expected: &[ExpectedBlock]) -> Option<String> {
    if actual.len() != expected.len() {
        let listing: Vec<String> = actual
            .iter()
            .map(|b| format!("  - {} {:?} (line {})", b.block_type.name(), b.content, b.line))
            .collect();
        return Some(format!(
            "expected {} block(s), got {}\n  actual blocks:\n{}",
            expected.len(),
            actual.len(),
            if listing.is_empty() {
                "    (none)".to_string()
            } else {
                listing.join("\n")
            }
        ));
    }

    for (i, (block, want)) in actual.iter().zip(expected).enumerate() {
        if block.block_type != want.block_type {
            return Some(format!(
                "block[{}]: expected {}, got {}",
                i,
                want.block_type.name(),
                block.block_type.name()
            ));
        }
        if let Some(content) = want.content.as_ref().filter(|c| **c != block.content) {
            return Some(format!(
                "block[{}]: content mismatch\n  expected: {:?}\n  actual:   {:?}",
                i, content, block.content
            ));
        }
        if let Some(line) = want.line.filter(|&l| l != block.line) {
            return Some(format!(
                "block[{}]: expected on line {}, got line {}",
                i, line, block.line
            ));
        }

        let mut values = BTreeMap::new();
        let mut flags = Vec::new();
        for (key, value) in block.attributes.iter() {
            match value {
                Some(value) => {
                    values.insert(key.to_string(), value.to_string());
                }
                None => flags.push(key.to_string()),
            }
        }
        if values != want.attributes || flags != want.flags {
            return Some(format!(
                "block[{}]: attribute mismatch\n  expected: {:?} flags {:?}\n  actual:   {:?} flags {:?}",
                i, want.attributes, want.flags, values, flags
            ));
        }
    }

    None
}

/// Discover fixture files grouped by category (subfolder relative to root).
/// Files directly in `root` get the empty category.
fn discover(root: &Path) -> BTreeMap<String, Vec<PathBuf>> {
    fn walk(dir: &Path, root: &Path, out: &mut BTreeMap<String, Vec<PathBuf>>) {
        let Ok(entries) = std::fs::read_dir(dir) else {
            return;
        };
        for path in entries.flatten().map(|e| e.path()) {
            if path.is_dir() {
                walk(&path, root, out);
                continue;
            }
            let is_fixture = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.ends_with(FIXTURE_SUFFIX));
            if is_fixture {
                let category = path
                    .parent()
                    .and_then(|p| p.strip_prefix(root).ok())
                    .map(|p| p.to_string_lossy().replace('\\', "/"))
                    .unwrap_or_default();
                out.entry(category).or_default().push(path);
            }
        }
    }

    let mut categories = BTreeMap::new();
    walk(root, root, &mut categories);
    for files in categories.values_mut() {
        files.sort();
    }
    categories
}

fn category_label(category: &str) -> &str {
    if category.is_empty() { "(root)" } else { category }
}

pub fn list_categories(path: &Path) {
    if path.is_file() {
        eprintln!("(single file, no categories)");
        return;
    }

    let categories = discover(path);
    if categories.is_empty() {
        eprintln!("no {} files found in {}", FIXTURE_SUFFIX, path.display());
        return;
    }

    eprintln!("available categories:");
    for (category, files) in &categories {
        eprintln!("  {} ({} tests)", category_label(category), files.len());
    }
}

struct Style {
    no_color: bool,
}

impl Style {
    fn paint(&self, code: &str, s: &str) -> String {
        if self.no_color {
            s.to_string()
        } else {
            format!("\x1b[{}m{}\x1b[0m", code, s)
        }
    }

    fn pass(&self) -> String {
        self.paint("32", "PASS")
    }

    fn fail(&self) -> String {
        self.paint("31", "FAIL")
    }

    fn bold(&self, s: &str) -> String {
        self.paint("1", s)
    }
}

/// Select the categories to run. Unknown names produce a warning.
fn select<'a>(
    all: &'a BTreeMap<String, Vec<PathBuf>>,
    requested: &[String],
) -> Vec<(&'a str, &'a [PathBuf])> {
    if requested.is_empty() {
        return all.iter().map(|(k, v)| (k.as_str(), v.as_slice())).collect();
    }

    let mut selected: BTreeMap<&str, &[PathBuf]> = BTreeMap::new();
    for name in requested {
        let name = name.trim_matches('/');
        let prefix = format!("{}/", name);
        let before = selected.len();
        for (category, files) in all {
            if category == name || category.starts_with(&prefix) {
                selected.insert(category.as_str(), files.as_slice());
            }
        }
        if selected.len() == before && !all.contains_key(name) {
            let available: Vec<&str> = all.keys().map(|k| category_label(k)).collect();
            eprintln!(
                "warning: category '{}' not found (available: {})",
                name,
                available.join(", ")
            );
        }
    }
    selected.into_iter().collect()
}

/// Run every fixture under `path` (or the single file at `path`).
/// If `categories` is non-empty, only those categories run.
/// Returns the process exit code.
pub fn run_tests(path: &Path, no_color: bool, categories: &[String]) -> i32 {
    let style = Style { no_color };
    let mut results = Vec::new();

    if path.is_file() {
        let result = run_fixture(path);
        let status = if result.failure.is_none() { style.pass() } else { style.fail() };
        eprintln!("  {}  {}", status, result.label());
        results.push(result);
    } else {
        let all = discover(path);
        if all.is_empty() {
            eprintln!("no {} files found in {}", FIXTURE_SUFFIX, path.display());
            return 1;
        }
        let selected = select(&all, categories);
        if selected.is_empty() {
            eprintln!("no matching categories found");
            return 1;
        }

        for (category, files) in selected {
            eprintln!();
            eprintln!("{}", style.bold(category_label(category)));
            for file in files {
                let result = run_fixture(file);
                let status = if result.failure.is_none() { style.pass() } else { style.fail() };
                eprintln!("  {}  {}", status, result.label());
                results.push(result);
            }
        }
    }

    report(&results, &style)
}

fn report(results: &[TestResult], style: &Style) -> i32 {
    let failures: Vec<&TestResult> = results.iter().filter(|r| r.failure.is_some()).collect();
    let passed = results.len() - failures.len();

    if !failures.is_empty() {
        eprintln!();
        eprintln!("failures:");
        for result in &failures {
            eprintln!();
            eprintln!("  --- {} ---", result.path.display());
            for line in result.failure.iter().flat_map(|reason| reason.lines()) {
                eprintln!("  {}", line);
            }
        }
    }

    eprintln!();
    if failures.is_empty() {
        eprintln!("test result: {}. {} passed, 0 failed", style.paint("32", "ok"), passed);
        0
    } else {
        eprintln!(
            "test result: {}. {} passed, {} failed (of {})",
            style.paint("31", "FAILED"),
            passed,
            failures.len(),
            results.len()
        );
        1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_frontmatter_from_source() {
        let file = "---\ndescription = \"x\"\nexpect_error = \"UnterminatedBlock\"\n---\n<| a\n";
        let (fixture, source) = split_fixture(file).unwrap();
        assert_eq!(fixture.description.as_deref(), Some("x"));
        assert_eq!(fixture.expect_error, Some(ParseErrorKind::UnterminatedBlock));
        assert_eq!(source, "<| a\n");
        assert!(check_fixture(&fixture, source).is_none());
    }

    #[test]
    fn missing_frontmatter_is_reported() {
        assert!(split_fixture("<| a |>").is_err());
        assert!(split_fixture("---\ndescription = \"x\"\n").is_err());
    }

    #[test]
    fn block_mismatch_names_the_index() {
        let file = "---\n[[expect_blocks]]\ntype = \"Text\"\ncontent = \"A\"\n\n[[expect_blocks]]\ntype = \"Text\"\ncontent = \"C\"\n---\nA\nB\n";
        let (fixture, source) = split_fixture(file).unwrap();
        let reason = check_fixture(&fixture, source).unwrap();
        assert!(reason.starts_with("block[1]: content mismatch"), "{}", reason);
    }

    #[test]
    fn attributes_and_flags_are_compared() {
        let file = "---\n[[expect_blocks]]\ntype = \"EagerExecution\"\nattributes = { stage = \"before\" }\nflags = [\"once\"]\n---\n@[stage = before, once]<| x |>\n";
        let (fixture, source) = split_fixture(file).unwrap();
        assert_eq!(check_fixture(&fixture, source), None);
    }
}

//! Wordlist files and run summaries.

use anyhow::{Context, Result};
use burp_wordlists::{Category, CorpusReport, CorpusSets};
use serde::Serialize;
use std::collections::BTreeSet;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};

/// Check if color output is enabled.
pub fn color_enabled() -> bool {
    // https://no-color.org/
    if std::env::var_os("NO_COLOR").is_some() {
        return false;
    }
    std::io::stderr().is_terminal()
}

const GREEN: &str = "\x1b[32m";
const YELLOW: &str = "\x1b[33m";
const DIM: &str = "\x1b[2m";
const BOLD: &str = "\x1b[1m";
const RESET: &str = "\x1b[0m";

/// Colored string builder.
pub struct Styled {
    use_color: bool,
}

impl Styled {
    pub fn new() -> Self {
        Self {
            use_color: color_enabled(),
        }
    }

    pub fn plain() -> Self {
        Self { use_color: false }
    }

    /// Green checkmark symbol.
    pub fn ok_sym(&self) -> &str {
        if self.use_color {
            "\x1b[32m\u{2713}\x1b[0m"
        } else {
            "OK"
        }
    }

    /// Yellow warning symbol.
    pub fn warn_sym(&self) -> &str {
        if self.use_color {
            "\x1b[33m\u{26a0}\x1b[0m"
        } else {
            "??"
        }
    }

    pub fn green(&self, s: &str) -> String {
        self.paint(GREEN, s)
    }

    pub fn yellow(&self, s: &str) -> String {
        self.paint(YELLOW, s)
    }

    pub fn dim(&self, s: &str) -> String {
        self.paint(DIM, s)
    }

    pub fn bold(&self, s: &str) -> String {
        self.paint(BOLD, s)
    }

    fn paint(&self, code: &str, s: &str) -> String {
        if self.use_color {
            format!("{code}{s}{RESET}")
        } else {
            s.to_string()
        }
    }
}

impl Default for Styled {
    fn default() -> Self {
        Self::new()
    }
}

/// Output file name for a category.
pub fn file_name(category: Category) -> &'static str {
    match category {
        Category::RequestPaths => "BurpHistoryRequestPaths.pay",
        Category::RequestBaseNames => "BurpHistoryRequestBaseNames.pay",
        Category::FileNames => "BurpHistoryFileNames.pay",
        Category::FileNamesNoExtension => "BurpHistoryFileNamesNoExtension.pay",
        Category::PostParams => "BurpHistoryPostParams.pay",
        Category::QueryParams => "BurpHistoryQueryParams.pay",
        Category::RequestParams => "BurpHistoryRequestParams.pay",
        Category::Cookies => "BurpHistoryCookies.pay",
        Category::Headers => "BurpHistoryHeaders.pay",
    }
}

/// Sorted entries joined by newlines, without a trailing newline.
pub fn render(entries: &BTreeSet<String>) -> String {
    entries
        .iter()
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join("\n")
}

/// One wordlist written to disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WrittenList {
    pub category: Category,
    pub path: PathBuf,
    pub entries: usize,
}

/// Write every category to `dir`, creating it first.
///
/// Empty categories still produce an (empty) file.
pub fn write_wordlists(dir: &Path, sets: &CorpusSets) -> Result<Vec<WrittenList>> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("cannot create output directory {}", dir.display()))?;

    let mut written = Vec::with_capacity(Category::ALL.len());
    for category in Category::ALL {
        let entries = sets.category(category);
        let path = dir.join(file_name(category));
        std::fs::write(&path, render(&entries))
            .with_context(|| format!("cannot write {}", path.display()))?;
        written.push(WrittenList {
            category,
            path,
            entries: entries.len(),
        });
    }
    Ok(written)
}

/// Everything reported at the end of a run.
#[derive(Debug, Clone, Serialize)]
pub struct Summary {
    pub output_dir: PathBuf,
    pub lists: Vec<WrittenList>,
    pub report: CorpusReport,
}

impl Summary {
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("cannot serialize summary")
    }

    /// Human-readable summary lines.
    pub fn render_text(&self, s: &Styled) -> Vec<String> {
        let mut lines = vec![
            format!(
                "  {} {}",
                s.bold("burp-wordlists"),
                s.dim(&format!("v{}", env!("CARGO_PKG_VERSION")))
            ),
            String::new(),
            format!("  {}", s.bold("Wordlists")),
        ];
        for list in &self.lists {
            let name = list
                .path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            lines.push(format!(
                "    {} {:<28} {:>7}  {}",
                s.ok_sym(),
                list.category.label(),
                list.entries,
                s.dim(&name)
            ));
        }

        let failed: Vec<_> = self.report.failed_files().collect();
        if !failed.is_empty() {
            lines.push(String::new());
            lines.push(format!("  {}", s.bold("Incomplete inputs")));
            for file in &failed {
                lines.push(format!(
                    "    {} {}  {}",
                    s.warn_sym(),
                    file.file.display(),
                    s.dim(file.error.as_deref().unwrap_or("unknown error"))
                ));
            }
        }

        let status = if failed.is_empty() {
            s.green("done")
        } else {
            s.yellow("done with errors")
        };
        lines.push(String::new());
        lines.push(format!(
            "  {}: {status} ({} files, {} records, {} skipped, output in {})",
            s.bold("Status"),
            self.report.files.len(),
            self.report.total_records(),
            self.report.total_skipped(),
            self.output_dir.display()
        ));
        lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burp_wordlists::corpus::FileReport;
    use tempfile::TempDir;

    fn sample_sets() -> CorpusSets {
        let mut sets = CorpusSets::new();
        sets.request_paths
            .extend(["/b/login.php", "/a"].map(String::from));
        sets.filenames.insert("login.php".into());
        sets.post_params.extend(["user", "pass"].map(String::from));
        sets.query_params.insert("next".into());
        sets.headers.insert("host".into());
        sets
    }

    #[test]
    fn test_file_names_are_distinct() {
        let names: BTreeSet<_> = Category::ALL.iter().map(|c| file_name(*c)).collect();
        assert_eq!(names.len(), Category::ALL.len());
        assert!(names.iter().all(|n| n.ends_with(".pay")));
    }

    #[test]
    fn test_render_has_no_trailing_newline() {
        let set: BTreeSet<String> = ["b", "a"].map(String::from).into();
        assert_eq!(render(&set), "a\nb");
        assert_eq!(render(&BTreeSet::new()), "");
    }

    #[test]
    fn test_write_wordlists() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("nested/out");

        let written = write_wordlists(&dir, &sample_sets()).unwrap();
        assert_eq!(written.len(), 9);

        let read = |name: &str| std::fs::read_to_string(dir.join(name)).unwrap();
        assert_eq!(read("BurpHistoryRequestPaths.pay"), "/a\n/b/login.php");
        assert_eq!(read("BurpHistoryRequestBaseNames.pay"), "a\nlogin.php");
        assert_eq!(read("BurpHistoryFileNamesNoExtension.pay"), "login");
        assert_eq!(read("BurpHistoryRequestParams.pay"), "next\npass\nuser");
        assert_eq!(read("BurpHistoryCookies.pay"), "");
    }

    #[test]
    fn test_unwritable_output_dir() {
        let temp = TempDir::new().unwrap();
        let blocker = temp.path().join("file");
        std::fs::write(&blocker, "x").unwrap();
        assert!(write_wordlists(&blocker.join("out"), &sample_sets()).is_err());
    }

    #[test]
    fn test_summary_text_and_json() {
        let temp = TempDir::new().unwrap();
        let lists = write_wordlists(temp.path(), &sample_sets()).unwrap();
        let summary = Summary {
            output_dir: temp.path().to_path_buf(),
            lists,
            report: CorpusReport {
                files: vec![FileReport {
                    file: "broken.xml".into(),
                    records: 3,
                    incomplete: 1,
                    completed: false,
                    error: Some("truncated".into()),
                    ..FileReport::default()
                }],
            },
        };

        let text = summary.render_text(&Styled::plain()).join("\n");
        assert!(text.contains("post params"));
        assert!(text.contains("broken.xml"));
        assert!(text.contains("done with errors"));
        assert!(text.contains("3 records, 1 skipped"));

        let json: serde_json::Value = serde_json::from_str(&summary.to_json().unwrap()).unwrap();
        assert_eq!(json["lists"][4]["category"], "post_params");
        assert_eq!(json["lists"][4]["entries"], 2);
        assert_eq!(json["report"]["files"][0]["completed"], false);
    }
}

use std::fs;
use std::path::Path;

use serde::Serialize;
use walkdir::{DirEntry, WalkDir};

use crate::services::file_manager::IGNORED_DIRS;

pub const DEFAULT_MAX_RESULTS: usize = 200;

/// Files larger than this are skipped.
const MAX_FILE_SIZE: u64 = 2 * 1024 * 1024;
/// Matched lines are clipped to this many characters in results.
const MAX_LINE_CHARS: usize = 500;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SearchMatch {
    pub path: String,
    /// 1-based line number.
    pub line: usize,
    /// 1-based character column of the first match on the line.
    pub column: usize,
    pub text: String,
}

#[derive(Debug, Clone)]
pub struct SearchOptions {
    pub case_sensitive: bool,
    pub max_results: usize,
}

impl Default for SearchOptions {
    fn default() -> Self {
        SearchOptions {
            case_sensitive: true,
            max_results: DEFAULT_MAX_RESULTS,
        }
    }
}

fn is_ignored(entry: &DirEntry) -> bool {
    entry.file_type().is_dir()
        && entry
            .file_name()
            .to_str()
            .map(|name| IGNORED_DIRS.contains(&name))
            .unwrap_or(false)
}

/// Character index in `line` where the lowercase `needle` first matches.
/// Lowercasing can change a character's length (`İ` becomes two chars), so
/// each lowered byte remembers the original character it came from.
fn find_ignoring_case(line: &str, needle: &str) -> Option<usize> {
    let mut lowered = String::with_capacity(line.len());
    let mut origin = Vec::with_capacity(line.len());
    for (char_index, c) in line.chars().enumerate() {
        for lower in c.to_lowercase() {
            lowered.push(lower);
            origin.resize(lowered.len(), char_index);
        }
    }
    lowered.find(needle).map(|byte_offset| origin[byte_offset])
}

/// Plain substring search over every readable text file under `root`.
pub fn search(root: &Path, query: &str, options: &SearchOptions) -> Vec<SearchMatch> {
    let mut matches = Vec::new();
    if query.is_empty() || options.max_results == 0 {
        return matches;
    }
    let needle = if options.case_sensitive {
        query.to_string()
    } else {
        query.to_lowercase()
    };

    let walker = WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !is_ignored(e));

    for entry in walker.filter_map(Result::ok) {
        if !entry.file_type().is_file() {
            continue;
        }
        let too_large = entry
            .metadata()
            .map(|m| m.len() > MAX_FILE_SIZE)
            .unwrap_or(true);
        if too_large {
            continue;
        }
        // Binary and non-UTF-8 files fail here and are skipped.
        let Ok(content) = fs::read_to_string(entry.path()) else {
            continue;
        };

        let relative = entry
            .path()
            .strip_prefix(root)
            .unwrap_or(entry.path())
            .to_string_lossy()
            .replace('\\', "/");

        for (index, line) in content.lines().enumerate() {
            let column = if options.case_sensitive {
                line.find(&needle)
                    .map(|byte_offset| line[..byte_offset].chars().count())
            } else {
                find_ignoring_case(line, &needle)
            };
            if let Some(column) = column {
                matches.push(SearchMatch {
                    path: relative.clone(),
                    line: index + 1,
                    column: column + 1,
                    text: line.chars().take(MAX_LINE_CHARS).collect(),
                });
                if matches.len() >= options.max_results {
                    return matches;
                }
            }
        }
    }

    matches
}

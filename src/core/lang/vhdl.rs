//
//  Copyright (C) 2022-2024  Chase Ruskin
//
//  This program is free software: you can redistribute it and/or modify
//  it under the terms of the GNU General Public License as published by
//  the Free Software Foundation, either version 3 of the License, or
//  (at your option) any later version.
//
//  This program is distributed in the hope that it will be useful,
//  but WITHOUT ANY WARRANTY; without even the implied warranty of
//  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
//  GNU General Public License for more details.
//
//  You should have received a copy of the GNU General Public License
//  along with this program.  If not, see <http://www.gnu.org/licenses/>.
//

use once_cell::sync::Lazy;
use regex::Regex;

static USE_CLAUSE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\s*use\s+([^;]+);").expect("valid regex"));

static USE_ITEM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\s*(\w+)\s*\.\s*(\w+)\s*\.\s*all\s*$").expect("valid regex"));

static PACKAGE_DECL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\s*package\s+(\w+)\s+is\b").expect("valid regex"));

/// Removes a trailing `--` comment from a line.
fn strip_comment(line: &str) -> &str {
    match line.find("--") {
        Some(i) => &line[..i],
        None => line,
    }
}

/// Finds every `<library>.<package>.all` item named in a `use` clause.
///
/// Pairs are lowercased and returned in order of appearance. Items that select
/// a single declaration instead of `all` are not package requirements and are
/// skipped.
pub fn search_use_clauses(text: &str) -> Vec<(String, String)> {
    let mut found = Vec::new();
    for line in text.lines() {
        let line = strip_comment(line);
        let clause = match USE_CLAUSE.captures(line) {
            Some(c) => c,
            None => continue,
        };
        for item in clause[1].split(',') {
            if let Some(c) = USE_ITEM.captures(item) {
                found.push((c[1].to_lowercase(), c[2].to_lowercase()));
            }
        }
    }
    found
}

/// Finds the names of the packages declared in the text (bodies excluded).
pub fn search_packages(text: &str) -> Vec<String> {
    text.lines()
        .filter_map(|line| PACKAGE_DECL.captures(strip_comment(line)))
        .map(|c| c[1].to_lowercase())
        .filter(|name| name != "body")
        .collect()
}

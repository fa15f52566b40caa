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

use colored::Colorize;
use std::fmt::Display;
use std::path::PathBuf;

/// Quickly implement a custom/unique error message.
///
/// Used by collaborators (fetchers, front-ends, manifest readers) that only
/// need to report a reason.
#[derive(Debug, PartialEq)]
pub struct AnyError(pub String);

impl std::error::Error for AnyError {}

impl Display for AnyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for AnyError {
    fn from(value: &str) -> Self {
        AnyError(value.to_string())
    }
}

pub type Fault = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, PartialEq, Clone, thiserror::Error)]
pub enum Error {
    #[error("invalid source file {0:?}: {1}")]
    InvalidFile(PathBuf, LastError),
    #[error("unsupported file extension for {0:?}{1}")]
    UnsupportedExtension(PathBuf, Hint),
    #[error("failed to extract dependencies for {0:?}: {1}")]
    DependencyExtraction(PathBuf, LastError),
    #[error("circular module reference: {}", .0.join(" -> "))]
    CircularModuleReference(Vec<String>),
    #[error("failed to fetch module {0}: {1}")]
    ModuleFetch(String, LastError),
    #[error("failed to read manifest {0:?}: {1}")]
    ManifestParse(PathBuf, LastError),
    #[error("module {0} is declared with conflicting revisions {1:?} and {2:?}")]
    ConflictingRevision(String, String, String),
    #[error("file {0:?} requires {1} but nothing provides it")]
    UnresolvedDependency(PathBuf, String),
    #[error("{0} is provided by both {1:?} and {2:?}")]
    DuplicateProvider(String, PathBuf, PathBuf),
    #[error("cyclic dependency between files: {}", display_cycle(.0))]
    CyclicDependency(Vec<PathBuf>),
    #[error("top file {0:?} is not part of the file set")]
    TopNotFound(PathBuf),
    #[error("top file {0:?} cannot be compiled last because {1:?} depends on it{2}")]
    TopHasDependents(PathBuf, PathBuf, Hint),
    #[error("command {0:?} timed out after {1} seconds")]
    ProcessTimeout(String, u64),
    #[error("command {0:?} exited with error code: {1}")]
    ChildProcErrorCode(String, i32),
    #[error("command {0:?} terminated by signal")]
    ChildProcTerminated(String),
    #[error("{} errors occurred:\n{}", .0.len(), display_list(.0))]
    Aggregate(Vec<Error>),
}

fn display_cycle(files: &[PathBuf]) -> String {
    files
        .iter()
        .map(|f| format!("{:?}", f))
        .collect::<Vec<String>>()
        .join(" -> ")
}

fn display_list(errors: &[Error]) -> String {
    errors
        .iter()
        .map(|e| format!("  - {}", e))
        .collect::<Vec<String>>()
        .join("\n")
}

impl Error {
    pub fn lowerize(s: String) -> String {
        // get the first word
        let first_word = match s.split_whitespace().next() {
            Some(w) => w,
            None => return s,
        };
        // retain punctuation if the first word is all-caps and longer than 1 character
        if first_word.len() > 1
            && first_word
                .chars()
                .find(|c| c.is_ascii_lowercase() == true)
                .is_none()
        {
            s
        } else {
            s.char_indices()
                .map(|(i, c)| if i == 0 { c.to_ascii_lowercase() } else { c })
                .collect()
        }
    }

    /// Combines a list of errors into a single error.
    ///
    /// Returns `None` for an empty list and the lone error for a list of one.
    pub fn collect(mut errors: Vec<Error>) -> Option<Error> {
        match errors.len() {
            0 => None,
            1 => errors.pop(),
            _ => Some(Error::Aggregate(errors)),
        }
    }
}

#[derive(Debug, PartialEq, Clone)]
pub struct LastError(pub String);

impl Display for LastError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", Error::lowerize(self.0.to_string()))
    }
}

impl<T: std::error::Error + ?Sized> From<&T> for LastError {
    fn from(value: &T) -> Self {
        LastError(value.to_string())
    }
}

#[derive(Debug, PartialEq, Clone)]
pub enum Hint {
    None,
    FileKinds,
    TopLast,
}

impl Display for Hint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let message = match self {
            Self::None => return Ok(()),
            Self::FileKinds => {
                "supported extensions are listed by `FileKind::extensions`; remove the file from the manifest or rename it"
            }
            Self::TopLast => "the top file must not be required by any other file in the set",
        };
        write!(
            f,
            "\n\n{}: {}",
            "hint".green(),
            Error::lowerize(message.to_string())
        )
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn lowerize_first_word() {
        assert_eq!(
            Error::lowerize(String::from("No such file")),
            "no such file"
        );
        assert_eq!(
            Error::lowerize(String::from("URL is malformed")),
            "URL is malformed"
        );
        assert_eq!(Error::lowerize(String::new()), "");
    }

    #[test]
    fn collect_errors() {
        assert_eq!(Error::collect(vec![]), None);

        let e = Error::TopNotFound(PathBuf::from("top.vhd"));
        assert_eq!(Error::collect(vec![e.clone()]), Some(e));

        let list = vec![
            Error::TopNotFound(PathBuf::from("a.vhd")),
            Error::TopNotFound(PathBuf::from("b.vhd")),
        ];
        let combined = Error::collect(list).unwrap();
        assert_eq!(combined.to_string().starts_with("2 errors occurred:"), true);
    }

    #[test]
    fn cycle_message_names_files() {
        let e = Error::CyclicDependency(vec![PathBuf::from("a.vhd"), PathBuf::from("b.vhd")]);
        assert_eq!(
            e.to_string(),
            "cyclic dependency between files: \"a.vhd\" -> \"b.vhd\""
        );
    }
}

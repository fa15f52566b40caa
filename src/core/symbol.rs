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

use std::collections::BTreeSet;
use std::fmt::Display;
use std::path::{Path, PathBuf};

/// The library every file lands in unless told otherwise. A requirement naming
/// `work` always refers to the requiring file's own library.
pub const WORK_LIBRARY: &str = "work";

/// A `(library, identifier)` pair. Both halves are compared case-insensitively,
/// so they are folded to lowercase on construction.
#[derive(Debug, PartialEq, Eq, Hash, Clone, PartialOrd, Ord)]
pub struct Symbol {
    library: String,
    name: String,
}

impl Symbol {
    pub fn new(library: &str, name: &str) -> Self {
        Self {
            library: library.to_lowercase(),
            name: name.to_lowercase(),
        }
    }

    pub fn get_library(&self) -> &str {
        &self.library
    }

    pub fn get_name(&self) -> &str {
        &self.name
    }

    pub fn is_work(&self) -> bool {
        self.library == WORK_LIBRARY
    }

    /// Re-routes a `work` library prefix to `library`.
    pub fn resolve_work(self, library: &str) -> Self {
        match self.is_work() {
            true => Self::new(library, &self.name),
            false => self,
        }
    }
}

impl Display for Symbol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.library, self.name)
    }
}

/// One edge endpoint in the dependency graph.
#[derive(Debug, PartialEq, Eq, Hash, Clone, PartialOrd, Ord)]
pub enum Dependency {
    /// A design unit scoped by its library.
    Unit(Symbol),
    /// A literal include target; Verilog has no libraries so these are unscoped
    /// and matched by file name.
    Include(String),
    /// An exact file reported by an external front-end.
    File(PathBuf),
}

impl Dependency {
    /// Creates an include requirement keyed by the final component of `target`.
    pub fn include(target: &str) -> Self {
        let name = Path::new(target)
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| target.to_string());
        Self::Include(name)
    }
}

impl Display for Dependency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unit(s) => write!(f, "{}", s),
            Self::Include(s) => write!(f, "`include \"{}\"", s),
            Self::File(p) => write!(f, "{:?}", p),
        }
    }
}

/// The provides/requires sets of one source file.
///
/// Files whose content cannot be scanned carry an ordering `index` instead and
/// never take part in symbol matching.
#[derive(Debug, PartialEq, Clone, Default)]
pub struct Dependencies {
    provides: BTreeSet<Dependency>,
    requires: BTreeSet<Dependency>,
    index: Option<usize>,
}

impl Dependencies {
    /// A file that neither provides nor requires anything.
    pub fn none() -> Self {
        Self::default()
    }

    /// Builds the sets for a scanned file. Anything the file provides itself is
    /// dropped from its requirements.
    pub fn declared(provides: BTreeSet<Dependency>, requires: BTreeSet<Dependency>) -> Self {
        let requires = requires
            .into_iter()
            .filter(|r| provides.contains(r) == false)
            .collect();
        Self {
            provides: provides,
            requires: requires,
            index: None,
        }
    }

    /// An opaque file placed by its synthetic `index`.
    pub fn opaque(index: usize) -> Self {
        Self {
            provides: BTreeSet::new(),
            requires: BTreeSet::new(),
            index: Some(index),
        }
    }

    pub fn get_provides(&self) -> &BTreeSet<Dependency> {
        &self.provides
    }

    pub fn get_requires(&self) -> &BTreeSet<Dependency> {
        &self.requires
    }

    pub fn get_index(&self) -> Option<usize> {
        self.index
    }

    pub fn is_opaque(&self) -> bool {
        self.index.is_some()
    }
}

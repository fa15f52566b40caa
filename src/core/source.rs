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

use indexmap::IndexMap;
use once_cell::sync::OnceCell;
use serde_derive::Serialize;
use std::collections::BTreeSet;
use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::core::module::{Module, ModuleId};
use crate::core::symbol::{Dependencies, WORK_LIBRARY};
use crate::error::{Error, Hint, LastError};
use crate::util::filesystem;

#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    Vhdl,
    Verilog,
    SystemVerilog,
    Constraint,
    IpCore,
    Script,
    Opaque,
}

const EXTENSIONS: &[(&str, FileKind)] = &[
    ("vhd", FileKind::Vhdl),
    ("vhdl", FileKind::Vhdl),
    ("vho", FileKind::Vhdl),
    ("v", FileKind::Verilog),
    ("vh", FileKind::Verilog),
    ("vo", FileKind::Verilog),
    ("vm", FileKind::Verilog),
    ("sv", FileKind::SystemVerilog),
    ("svh", FileKind::SystemVerilog),
    ("ucf", FileKind::Constraint),
    ("sdc", FileKind::Constraint),
    ("xdc", FileKind::Constraint),
    ("pdc", FileKind::Constraint),
    ("lpf", FileKind::Constraint),
    ("ngc", FileKind::IpCore),
    ("xco", FileKind::IpCore),
    ("xci", FileKind::IpCore),
    ("qip", FileKind::IpCore),
    ("bd", FileKind::IpCore),
    ("xmp", FileKind::IpCore),
    ("tcl", FileKind::Script),
    ("cdc", FileKind::Opaque),
    ("stp", FileKind::Opaque),
    ("wb", FileKind::Opaque),
    ("xise", FileKind::Opaque),
    ("ise", FileKind::Opaque),
    ("dpf", FileKind::Opaque),
    ("bmm", FileKind::Opaque),
    ("mif", FileKind::Opaque),
    ("hex", FileKind::Opaque),
    ("dat", FileKind::Opaque),
];

impl FileKind {
    /// Maps the extension of `path` to a kind (case-insensitive).
    pub fn classify(path: &Path) -> Result<Self, Error> {
        Self::from_path(path).ok_or_else(|| Error::UnsupportedExtension(path.to_path_buf(), Hint::FileKinds))
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_lowercase();
        EXTENSIONS.iter().find(|(e, _)| *e == ext).map(|(_, k)| *k)
    }

    /// Lists every recognized extension.
    pub fn extensions() -> impl Iterator<Item = &'static str> {
        EXTENSIONS.iter().map(|(e, _)| *e)
    }

    pub fn is_hdl(&self) -> bool {
        match self {
            Self::Vhdl | Self::Verilog | Self::SystemVerilog => true,
            _ => false,
        }
    }

    pub fn is_verilog(&self) -> bool {
        match self {
            Self::Verilog | Self::SystemVerilog => true,
            _ => false,
        }
    }
}

impl Display for FileKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Self::Vhdl => "vhdl",
                Self::Verilog => "verilog",
                Self::SystemVerilog => "systemverilog",
                Self::Constraint => "constraint",
                Self::IpCore => "ipcore",
                Self::Script => "script",
                Self::Opaque => "opaque",
            }
        )
    }
}

/// A source file registered by a module.
#[derive(Debug)]
pub struct SourceFile {
    path: PathBuf,
    module: ModuleId,
    kind: FileKind,
    library: String,
    options: String,
    include_dirs: Vec<PathBuf>,
    deps: OnceCell<Dependencies>,
}

impl SourceFile {
    /// Registers `path` (relative to the module root when not absolute) as a
    /// file owned by `module`.
    pub fn new(path: &Path, module: &Module) -> Result<Self, Error> {
        if path.as_os_str().is_empty() == true {
            return Err(Error::InvalidFile(path.to_path_buf(), LastError("path is empty".to_string())));
        }
        if module.is_fetched() == false {
            return Err(Error::InvalidFile(
                path.to_path_buf(),
                LastError(format!("owning module {} is not fetched", module.get_name())),
            ));
        }
        let path = filesystem::resolve(module.get_root(), path);
        let kind = FileKind::classify(&path)?;
        let config = module.get_config();

        let options = match kind {
            FileKind::Vhdl => config.get_vcom_opt(),
            FileKind::Verilog | FileKind::SystemVerilog => config.get_vlog_opt(),
            _ => None,
        };
        let mut include_dirs: Vec<PathBuf> = config
            .get_include_dirs()
            .iter()
            .map(|d| filesystem::resolve(module.get_root(), Path::new(d)))
            .collect();
        if let Some(parent) = path.parent() {
            if include_dirs.iter().any(|d| d == parent) == false {
                include_dirs.push(parent.to_path_buf());
            }
        }

        Ok(Self {
            module: module.get_id(),
            kind: kind,
            library: config
                .get_library()
                .map(|l| l.to_lowercase())
                .unwrap_or_else(|| WORK_LIBRARY.to_string()),
            options: options.cloned().unwrap_or_default(),
            include_dirs: include_dirs,
            path: path,
            deps: OnceCell::new(),
        })
    }

    pub fn library(mut self, lib: &str) -> Self {
        self.library = lib.trim().to_lowercase();
        self
    }

    pub fn options(mut self, opt: &str) -> Self {
        self.options = opt.to_string();
        self
    }

    pub fn get_path(&self) -> &PathBuf {
        &self.path
    }

    pub fn get_module(&self) -> ModuleId {
        self.module
    }

    pub fn get_kind(&self) -> FileKind {
        self.kind
    }

    pub fn get_library(&self) -> &str {
        &self.library
    }

    pub fn get_options(&self) -> &str {
        &self.options
    }

    pub fn get_include_dirs(&self) -> &Vec<PathBuf> {
        &self.include_dirs
    }

    /// Returns the cached provides/requires, if they were computed.
    pub fn get_dependencies(&self) -> Option<&Dependencies> {
        self.deps.get()
    }

    /// Computes the provides/requires with `f` on first access only.
    ///
    /// A failed computation leaves the cache empty.
    pub fn init_dependencies<F>(&self, f: F) -> Result<&Dependencies, Error>
    where
        F: FnOnce() -> Result<Dependencies, Error>,
    {
        self.deps.get_or_try_init(f)
    }
}

/// An insertion-ordered set of source files keyed by absolute path.
#[derive(Debug, Default, Clone)]
pub struct SourceFileSet {
    files: IndexMap<PathBuf, Arc<SourceFile>>,
}

impl SourceFileSet {
    pub fn new() -> Self {
        Self {
            files: IndexMap::new(),
        }
    }

    /// Inserts `file` unless its path is already present.
    ///
    /// The first registration wins; a later one with a different library or
    /// options is reported and dropped. Returns `true` when inserted.
    pub fn add<T: Into<Arc<SourceFile>>>(&mut self, file: T) -> bool {
        let file: Arc<SourceFile> = file.into();
        match self.files.get(file.get_path()) {
            Some(existing) => {
                if existing.get_library() != file.get_library()
                    || existing.get_options() != file.get_options()
                {
                    tracing::warn!(
                        "file {:?} registered again with library {:?} and options {:?}; keeping library {:?} and options {:?}",
                        file.get_path(),
                        file.get_library(),
                        file.get_options(),
                        existing.get_library(),
                        existing.get_options()
                    );
                }
                false
            }
            None => {
                self.files.insert(file.get_path().clone(), file);
                true
            }
        }
    }

    /// Keeps only the files of the given `kind`.
    pub fn filter(&self, kind: FileKind) -> Self {
        self.retain_by(|f| f.get_kind() == kind)
    }

    /// Keeps every file not of the given `kind`.
    pub fn inversed_filter(&self, kind: FileKind) -> Self {
        self.retain_by(|f| f.get_kind() != kind)
    }

    pub fn retain_by<P: Fn(&SourceFile) -> bool>(&self, predicate: P) -> Self {
        Self {
            files: self
                .files
                .iter()
                .filter(|(_, f)| predicate(f))
                .map(|(p, f)| (p.clone(), f.clone()))
                .collect(),
        }
    }

    /// Collects the libraries used by the files in the set.
    pub fn get_libs(&self) -> BTreeSet<String> {
        self.files.values().map(|f| f.get_library().to_string()).collect()
    }

    pub fn get(&self, path: &Path) -> Option<&Arc<SourceFile>> {
        self.files.get(path)
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.files.contains_key(path)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<SourceFile>> {
        self.files.values()
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

impl FromIterator<Arc<SourceFile>> for SourceFileSet {
    fn from_iter<I: IntoIterator<Item = Arc<SourceFile>>>(iter: I) -> Self {
        let mut set = Self::new();
        for f in iter {
            set.add(f);
        }
        set
    }
}

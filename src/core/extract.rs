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

use rayon::prelude::*;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::core::frontend::Frontend;
use crate::core::lang::{self, verilog, vhdl};
use crate::core::source::{FileKind, SourceFile, SourceFileSet};
use crate::core::symbol::{Dependencies, Dependency, Symbol};
use crate::core::tool::StdLibs;
use crate::error::{Error, LastError};
use crate::util::filesystem;

/// The outcome of looking inside one file.
#[derive(Debug, PartialEq)]
enum Scan {
    Declared(Dependencies),
    /// The content cannot be read; the file is placed by a synthetic index.
    Encrypted,
}

/// Computes the provides/requires of source files.
///
/// The active standard libraries are supplied up front; requirements on them
/// are never recorded.
pub struct Extractor {
    std_libs: StdLibs,
    frontend: Option<Box<dyn Frontend>>,
    next_index: AtomicUsize,
}

impl Extractor {
    pub fn new(std_libs: StdLibs) -> Self {
        Self {
            std_libs: std_libs,
            frontend: None,
            next_index: AtomicUsize::new(0),
        }
    }

    /// Delegates Verilog files to an external front-end instead of scanning
    /// their includes.
    pub fn frontend(mut self, fe: Box<dyn Frontend>) -> Self {
        self.frontend = Some(fe);
        self
    }

    pub fn get_std_libs(&self) -> &StdLibs {
        &self.std_libs
    }

    fn next_index(&self) -> usize {
        self.next_index.fetch_add(1, Ordering::SeqCst)
    }

    fn settle(&self, scan: Scan) -> Dependencies {
        match scan {
            Scan::Declared(d) => d,
            Scan::Encrypted => Dependencies::opaque(self.next_index()),
        }
    }

    /// Returns the dependencies of `file`, computing them on first use.
    pub fn dependencies<'a>(&self, file: &'a SourceFile) -> Result<&'a Dependencies, Error> {
        file.init_dependencies(|| Ok(self.settle(self.scan(file)?)))
    }

    /// Computes the dependencies of every file in `set` that has none cached yet.
    ///
    /// Files are scanned in parallel. Synthetic indices are handed out
    /// afterward in path order so the outcome does not depend on scheduling.
    /// Files that fail are returned as errors and stay uncached.
    pub fn prepare(&self, set: &SourceFileSet) -> Vec<Error> {
        let mut pending: Vec<&Arc<SourceFile>> = set
            .iter()
            .filter(|f| f.get_dependencies().is_none())
            .collect();
        pending.sort_by(|a, b| a.get_path().cmp(b.get_path()));

        let scans: Vec<Result<Scan, Error>> = pending.par_iter().map(|f| self.scan(f)).collect();

        let mut errors = Vec::new();
        for (file, scan) in pending.into_iter().zip(scans) {
            let result = file.init_dependencies(|| Ok(self.settle(scan?)));
            if let Err(e) = result {
                errors.push(e);
            }
        }
        errors
    }

    fn scan(&self, file: &SourceFile) -> Result<Scan, Error> {
        let scan = match file.get_kind() {
            FileKind::Vhdl => self.scan_vhdl(file)?,
            FileKind::Verilog | FileKind::SystemVerilog => match &self.frontend {
                Some(fe) => self.scan_frontend(fe.as_ref(), file)?,
                None => self.scan_verilog(file)?,
            },
            _ => Scan::Declared(Dependencies::none()),
        };
        if let Scan::Declared(deps) = &scan {
            tracing::debug!(
                "{:?} provides [{}] requires [{}]",
                file.get_path(),
                join(deps.get_provides()),
                join(deps.get_requires())
            );
        }
        Ok(scan)
    }

    fn read(file: &SourceFile) -> Result<Vec<u8>, Error> {
        std::fs::read(file.get_path())
            .map_err(|e| Error::DependencyExtraction(file.get_path().clone(), LastError::from(&e)))
    }

    fn scan_vhdl(&self, file: &SourceFile) -> Result<Scan, Error> {
        let bytes = Self::read(file)?;
        if lang::is_encrypted(&bytes) == true {
            tracing::debug!("{:?} is encrypted; skipping its declarations", file.get_path());
            return Ok(Scan::Encrypted);
        }
        let text = lang::decode(&bytes);

        let provides: BTreeSet<Dependency> = vhdl::search_packages(&text)
            .into_iter()
            .map(|p| Dependency::Unit(Symbol::new(file.get_library(), &p)))
            .collect();
        let requires: BTreeSet<Dependency> = vhdl::search_use_clauses(&text)
            .into_iter()
            .filter(|(lib, _)| self.std_libs.contains(lib) == false)
            .map(|(lib, pkg)| {
                Dependency::Unit(Symbol::new(&lib, &pkg).resolve_work(file.get_library()))
            })
            .collect();
        Ok(Scan::Declared(Dependencies::declared(provides, requires)))
    }

    /// Everything a Verilog file offers to others: its own name for includes
    /// and its path for front-end edges.
    fn verilog_provides(file: &SourceFile) -> BTreeSet<Dependency> {
        let mut provides = BTreeSet::new();
        if let Some(name) = file.get_path().file_name() {
            provides.insert(Dependency::Include(name.to_string_lossy().to_string()));
        }
        provides.insert(Dependency::File(file.get_path().clone()));
        provides
    }

    fn scan_verilog(&self, file: &SourceFile) -> Result<Scan, Error> {
        let bytes = Self::read(file)?;
        if lang::is_encrypted(&bytes) == true {
            return Ok(Scan::Encrypted);
        }
        let text = lang::decode(&bytes);
        let requires: BTreeSet<Dependency> = verilog::search_includes(&text)
            .iter()
            .map(|t| Dependency::include(t))
            .collect();
        Ok(Scan::Declared(Dependencies::declared(Self::verilog_provides(file), requires)))
    }

    fn scan_frontend(&self, fe: &dyn Frontend, file: &SourceFile) -> Result<Scan, Error> {
        let found = fe
            .extract_deps(file.get_path(), file.get_include_dirs(), file.get_options())
            .map_err(|e| Error::DependencyExtraction(file.get_path().clone(), LastError(e.to_string())))?;
        let requires: BTreeSet<Dependency> = found
            .into_iter()
            .map(|p| Dependency::File(filesystem::normalize(&p)))
            .collect();
        Ok(Scan::Declared(Dependencies::declared(Self::verilog_provides(file), requires)))
    }
}

fn join(deps: &BTreeSet<Dependency>) -> String {
    deps.iter()
        .map(|d| d.to_string())
        .collect::<Vec<String>>()
        .join(", ")
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::core::module::{Module, ModuleKey};
    use crate::error::{AnyError, Fault};
    use std::fs;
    use std::path::{Path, PathBuf};

    fn module(root: &Path) -> Module {
        let mut m = Module::new(0, ModuleKey::local(root), root.into(), root.into());
        m.mark_fetched();
        m
    }

    fn unit(lib: &str, name: &str) -> Dependency {
        Dependency::Unit(Symbol::new(lib, name))
    }

    #[test]
    fn vhdl_provides_and_requires() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("pkg_b.vhd"),
            "library ieee;\nuse ieee.numeric_std.all;\nuse work.pkg_a.all;\nuse other.pkg_x.all;\npackage pkg_b is\nend package;\n",
        )
        .unwrap();
        let file = SourceFile::new(Path::new("pkg_b.vhd"), &module(dir.path()))
            .unwrap()
            .library("fifo_lib");

        let ex = Extractor::new(StdLibs::default());
        let deps = ex.dependencies(&file).unwrap();
        assert_eq!(deps.get_provides(), &BTreeSet::from([unit("fifo_lib", "pkg_b")]));
        assert_eq!(
            deps.get_requires(),
            &BTreeSet::from([unit("fifo_lib", "pkg_a"), unit("other", "pkg_x")])
        );
    }

    #[test]
    fn encrypted_files_get_unique_indices() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.vhd"), b"Xlx\x01\x02package hidden is").unwrap();
        fs::write(dir.path().join("b.vhd"), b"Xlx\xff\xfe").unwrap();
        fs::write(dir.path().join("c.vhd"), "package plain is end;\n").unwrap();
        let m = module(dir.path());
        let set: SourceFileSet = ["c.vhd", "b.vhd", "a.vhd"]
            .iter()
            .map(|p| Arc::new(SourceFile::new(Path::new(p), &m).unwrap()))
            .collect();

        let ex = Extractor::new(StdLibs::default());
        assert_eq!(ex.prepare(&set), vec![]);
        let a = set.get(&dir.path().join("a.vhd")).unwrap().get_dependencies().unwrap();
        let b = set.get(&dir.path().join("b.vhd")).unwrap().get_dependencies().unwrap();
        assert_eq!(a.get_index(), Some(0));
        assert_eq!(b.get_index(), Some(1));
        assert_eq!(a.get_provides().is_empty(), true);
        assert_eq!(
            set.get(&dir.path().join("c.vhd")).unwrap().get_dependencies().unwrap().get_index(),
            None
        );
    }

    #[test]
    fn verilog_includes() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("top.v"), "`include \"inc/defs.vh\"\nmodule top; endmodule\n").unwrap();
        let file = SourceFile::new(Path::new("top.v"), &module(dir.path())).unwrap();
        let deps = Extractor::new(StdLibs::default()).dependencies(&file).unwrap();
        assert_eq!(
            deps.get_requires(),
            &BTreeSet::from([Dependency::Include("defs.vh".to_string())])
        );
        assert_eq!(
            deps.get_provides().contains(&Dependency::Include("top.v".to_string())),
            true
        );
    }

    #[test]
    fn unreadable_file_is_extraction_error() {
        let dir = tempfile::tempdir().unwrap();
        let file = SourceFile::new(Path::new("gone.vhd"), &module(dir.path())).unwrap();
        let err = Extractor::new(StdLibs::default()).dependencies(&file).unwrap_err();
        assert!(matches!(err, Error::DependencyExtraction(..)));
        assert_eq!(file.get_dependencies(), None);
    }

    #[test]
    fn other_kinds_have_no_dependencies() {
        let dir = tempfile::tempdir().unwrap();
        let file = SourceFile::new(Path::new("pins.ucf"), &module(dir.path())).unwrap();
        let deps = Extractor::new(StdLibs::default()).dependencies(&file).unwrap();
        assert_eq!(deps, &Dependencies::none());
    }

    struct FakeFrontend(Result<Vec<PathBuf>, String>);

    impl Frontend for FakeFrontend {
        fn extract_deps(&self, _: &Path, _: &[PathBuf], _: &str) -> Result<Vec<PathBuf>, Fault> {
            match &self.0 {
                Ok(v) => Ok(v.clone()),
                Err(e) => Err(AnyError(e.clone()))?,
            }
        }
    }

    #[test]
    fn frontend_paths_become_file_requirements() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("top.v"), "").unwrap();
        let m = module(dir.path());

        let file = SourceFile::new(Path::new("top.v"), &m).unwrap();
        let ex = Extractor::new(StdLibs::default())
            .frontend(Box::new(FakeFrontend(Ok(vec![PathBuf::from("/ip/./uart.v")]))));
        let deps = ex.dependencies(&file).unwrap();
        assert_eq!(
            deps.get_requires(),
            &BTreeSet::from([Dependency::File(PathBuf::from("/ip/uart.v"))])
        );

        let file = SourceFile::new(Path::new("top.v"), &m).unwrap();
        let ex = Extractor::new(StdLibs::default())
            .frontend(Box::new(FakeFrontend(Err("exited with error code: 2".to_string()))));
        let err = ex.dependencies(&file).unwrap_err();
        assert_eq!(err.to_string().contains("top.v"), true);
    }
}

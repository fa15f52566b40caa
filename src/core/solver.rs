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

//! Orders a file set so every file comes after the files it depends on.

use serde_derive::Serialize;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::core::extract::Extractor;
use crate::core::module::ModuleId;
use crate::core::source::{FileKind, SourceFile, SourceFileSet};
use crate::core::symbol::Dependency;
use crate::error::{Error, Hint};
use crate::util::filesystem;
use crate::util::graph::{Graph, NodeIndex};

#[derive(Debug, PartialEq, Clone, Default)]
pub struct SolveOptions {
    strict: bool,
    top: Option<PathBuf>,
    base: Option<PathBuf>,
    minimal: bool,
}

impl SolveOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Turns unresolved requirements, duplicate providers, and failed
    /// extractions into errors.
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Pins `top` as the last file of the order.
    pub fn top(mut self, top: PathBuf) -> Self {
        self.top = Some(top);
        self
    }

    /// Sets the directory that relative paths (the top file, tie-break keys)
    /// are taken against.
    pub fn base(mut self, base: PathBuf) -> Self {
        self.base = Some(base);
        self
    }

    /// Keeps only the files the top file needs.
    pub fn minimal(mut self, minimal: bool) -> Self {
        self.minimal = minimal;
        self
    }

    pub fn is_strict(&self) -> bool {
        self.strict
    }

    pub fn get_top(&self) -> Option<&PathBuf> {
        self.top.as_ref()
    }
}

/// One entry of the compile list handed to the project emitters.
#[derive(Debug, PartialEq, Clone, Serialize)]
pub struct CompileRecord {
    path: PathBuf,
    kind: FileKind,
    library: String,
    options: String,
    module: ModuleId,
}

impl CompileRecord {
    pub fn get_path(&self) -> &PathBuf {
        &self.path
    }

    pub fn get_library(&self) -> &str {
        &self.library
    }
}

impl From<&SourceFile> for CompileRecord {
    fn from(file: &SourceFile) -> Self {
        Self {
            path: file.get_path().clone(),
            kind: file.get_kind(),
            library: file.get_library().to_string(),
            options: file.get_options().to_string(),
            module: file.get_module(),
        }
    }
}

#[derive(Debug)]
pub struct Solution {
    order: Vec<Arc<SourceFile>>,
    warnings: Vec<Error>,
}

impl Solution {
    /// The files in compile order.
    pub fn get_order(&self) -> &Vec<Arc<SourceFile>> {
        &self.order
    }

    /// Problems that did not stop the order from being produced.
    pub fn get_warnings(&self) -> &Vec<Error> {
        &self.warnings
    }

    pub fn paths(&self) -> Vec<&PathBuf> {
        self.order.iter().map(|f| f.get_path()).collect()
    }

    pub fn records(&self) -> Vec<CompileRecord> {
        self.order.iter().map(|f| CompileRecord::from(f.as_ref())).collect()
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&self.records())
    }
}

/// Computes a compile order for `files`.
///
/// Ready files are taken by smallest relative path so the same set always
/// yields the same order.
pub fn solve(files: &SourceFileSet, extractor: &Extractor, opts: &SolveOptions) -> Result<Solution, Error> {
    let mut warnings = Vec::new();
    let mut failures = Vec::new();

    // make sure every file has its provides/requires computed
    for err in extractor.prepare(files) {
        match opts.strict {
            true => failures.push(err),
            false => {
                tracing::warn!("excluding file from the order: {}", err);
                warnings.push(err);
            }
        }
    }
    if let Some(err) = Error::collect(failures) {
        return Err(err);
    }

    let base = opts.base.clone().unwrap_or_default();
    // nodes are indexed in order of their path relative to the base, so
    // neither ties nor provider conflicts depend on where the project sits
    let mut keyed: Vec<(String, &Arc<SourceFile>)> = files
        .iter()
        .filter(|f| f.get_dependencies().is_some())
        .map(|f| (filesystem::relative_to(f.get_path(), &base), f))
        .collect();
    keyed.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.get_path().cmp(b.1.get_path())));
    let (keys, nodes): (Vec<String>, Vec<&Arc<SourceFile>>) = keyed.into_iter().unzip();

    let mut graph: Graph<Arc<SourceFile>, ()> = Graph::new();
    for f in &nodes {
        graph.add_node(Arc::clone(f));
    }

    let mut errors = Vec::new();
    let providers = index_providers(&nodes, opts.strict, &mut warnings, &mut errors);
    connect(&nodes, &providers, &mut graph, opts.strict, &mut errors);
    if let Some(err) = Error::collect(errors) {
        return Err(err);
    }

    let top = match &opts.top {
        Some(t) => Some(find_top(&nodes, &graph, &filesystem::resolve(&base, t))?),
        None => None,
    };

    let order = graph.topological_sort_by_key(|i| keys[i].as_str(), top);
    if order.len() < graph.node_count() {
        let placed: HashSet<NodeIndex> = order.iter().copied().collect();
        let remaining: HashSet<NodeIndex> = (0..graph.node_count()).filter(|i| placed.contains(i) == false).collect();
        let cycle = match graph.shortest_cycle(&remaining, |i| keys[i].as_str()) {
            Some(c) => c,
            None => {
                let mut r: Vec<NodeIndex> = remaining.into_iter().collect();
                r.sort();
                r
            }
        };
        return Err(Error::CyclicDependency(
            cycle.into_iter().map(|i| nodes[i].get_path().clone()).collect(),
        ));
    }

    let order = match (top, opts.minimal) {
        (Some(t), true) => {
            let mut keep = graph.ancestors(t);
            keep.insert(t);
            order.into_iter().filter(|i| keep.contains(i)).collect()
        }
        _ => order,
    };

    Ok(Solution {
        order: order.into_iter().map(|i| Arc::clone(nodes[i])).collect(),
        warnings: warnings,
    })
}

/// Maps every provided dependency to the file providing it.
///
/// When more than one file provides the same thing, the one indexed last
/// (the later relative path) wins.
fn index_providers<'a>(
    nodes: &[&'a Arc<SourceFile>],
    strict: bool,
    warnings: &mut Vec<Error>,
    errors: &mut Vec<Error>,
) -> HashMap<&'a Dependency, NodeIndex> {
    let mut providers: HashMap<&Dependency, NodeIndex> = HashMap::new();
    for (i, f) in nodes.iter().copied().enumerate() {
        let deps = match f.get_dependencies() {
            Some(d) => d,
            None => continue,
        };
        for p in deps.get_provides() {
            if let Some(prev) = providers.insert(p, i) {
                let conflict = Error::DuplicateProvider(
                    p.to_string(),
                    nodes[prev].get_path().clone(),
                    f.get_path().clone(),
                );
                match strict {
                    true => errors.push(conflict),
                    false => {
                        tracing::warn!("{}; using {:?}", conflict, f.get_path());
                        warnings.push(conflict);
                    }
                }
            }
        }
    }
    providers
}

/// Adds an edge from each provider to every file requiring it.
fn connect(
    nodes: &[&Arc<SourceFile>],
    providers: &HashMap<&Dependency, NodeIndex>,
    graph: &mut Graph<Arc<SourceFile>, ()>,
    strict: bool,
    errors: &mut Vec<Error>,
) {
    let mut opaque: Vec<(usize, NodeIndex)> = Vec::new();
    for (i, f) in nodes.iter().enumerate() {
        let deps = match f.get_dependencies() {
            Some(d) => d,
            None => continue,
        };
        if let Some(index) = deps.get_index() {
            opaque.push((index, i));
        }
        for r in deps.get_requires() {
            match providers.get(r) {
                Some(&p) if p != i => {
                    graph.add_edge(p, i, ());
                }
                Some(_) => (),
                None => match strict {
                    true => errors.push(Error::UnresolvedDependency(f.get_path().clone(), r.to_string())),
                    false => tracing::debug!("{:?} requires {} which is assumed to be external", f.get_path(), r),
                },
            }
        }
    }
    // opaque files keep the order of their synthetic indices
    opaque.sort();
    for pair in opaque.windows(2) {
        graph.add_edge(pair[0].1, pair[1].1, ());
    }
}

fn find_top(nodes: &[&Arc<SourceFile>], graph: &Graph<Arc<SourceFile>, ()>, top: &Path) -> Result<NodeIndex, Error> {
    let index = match nodes.iter().position(|f| f.get_path() == top) {
        Some(i) => i,
        None => return Err(Error::TopNotFound(top.to_path_buf())),
    };
    let mut dependents: Vec<NodeIndex> = graph.successors(index).collect();
    dependents.sort();
    match dependents.first() {
        Some(&d) => Err(Error::TopHasDependents(
            top.to_path_buf(),
            nodes[d].get_path().clone(),
            Hint::TopLast,
        )),
        None => Ok(index),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::core::module::{Module, ModuleKey};
    use crate::core::tool::StdLibs;
    use std::fs;
    use tempfile::TempDir;

    struct Project {
        dir: TempDir,
        module: Module,
    }

    impl Project {
        fn new() -> Self {
            let dir = tempfile::tempdir().unwrap();
            let root = dir.path().to_path_buf();
            let mut module = Module::new(0, ModuleKey::local(&root), root.clone(), root);
            module.mark_fetched();
            Self { dir: dir, module: module }
        }

        fn write(&self, name: &str, text: &[u8]) -> &Self {
            fs::write(self.dir.path().join(name), text).unwrap();
            self
        }

        fn path(&self, name: &str) -> PathBuf {
            self.dir.path().join(name)
        }

        fn set(&self, names: &[&str]) -> SourceFileSet {
            names
                .iter()
                .map(|n| Arc::new(SourceFile::new(Path::new(n), &self.module).unwrap()))
                .collect()
        }

        fn names(&self, solution: &Solution) -> Vec<String> {
            solution
                .get_order()
                .iter()
                .map(|f| filesystem::relative_to(f.get_path(), self.dir.path()))
                .collect()
        }

        fn options(&self) -> SolveOptions {
            SolveOptions::new().base(self.dir.path().to_path_buf())
        }
    }

    fn packages() -> Project {
        let p = Project::new();
        p.write("top.vhd", b"use work.pkg_b.all;\nentity top is end;\n")
            .write("pkg_b.vhd", b"use work.pkg_a.all;\npackage pkg_b is end;\n")
            .write("pkg_a.vhd", b"library ieee;\nuse ieee.std_logic_1164.all;\npackage pkg_a is end;\n");
        p
    }

    #[test]
    fn orders_packages_before_users() {
        let p = packages();
        let set = p.set(&["top.vhd", "pkg_b.vhd", "pkg_a.vhd"]);
        let ex = Extractor::new(StdLibs::default());
        let solution = solve(&set, &ex, &p.options()).unwrap();
        assert_eq!(p.names(&solution), vec!["pkg_a.vhd", "pkg_b.vhd", "top.vhd"]);
        assert_eq!(solution.get_warnings().is_empty(), true);
    }

    #[test]
    fn order_is_deterministic() {
        let p = packages();
        p.write("a_misc.vhd", b"entity misc is end;\n")
            .write("z_misc.vhd", b"entity misc2 is end;\n");
        let one = p.set(&["z_misc.vhd", "top.vhd", "pkg_b.vhd", "a_misc.vhd", "pkg_a.vhd"]);
        let two = p.set(&["pkg_a.vhd", "a_misc.vhd", "pkg_b.vhd", "top.vhd", "z_misc.vhd"]);
        let ex = Extractor::new(StdLibs::default());
        let first = solve(&one, &ex, &p.options()).unwrap();
        let second = solve(&two, &ex, &p.options()).unwrap();
        assert_eq!(p.names(&first), p.names(&second));
        assert_eq!(
            p.names(&first),
            vec!["a_misc.vhd", "pkg_a.vhd", "pkg_b.vhd", "top.vhd", "z_misc.vhd"]
        );
    }

    #[test]
    fn pinned_top_is_last() {
        let p = packages();
        p.write("z_misc.vhd", b"entity misc is end;\n");
        let set = p.set(&["top.vhd", "pkg_b.vhd", "pkg_a.vhd", "z_misc.vhd"]);
        let ex = Extractor::new(StdLibs::default());

        let solution = solve(&set, &ex, &p.options().top(PathBuf::from("top.vhd"))).unwrap();
        assert_eq!(
            p.names(&solution),
            vec!["pkg_a.vhd", "pkg_b.vhd", "z_misc.vhd", "top.vhd"]
        );

        let solution = solve(
            &set,
            &ex,
            &p.options().top(PathBuf::from("top.vhd")).minimal(true),
        )
        .unwrap();
        assert_eq!(p.names(&solution), vec!["pkg_a.vhd", "pkg_b.vhd", "top.vhd"]);
    }

    #[test]
    fn top_errors() {
        let p = packages();
        let set = p.set(&["top.vhd", "pkg_b.vhd", "pkg_a.vhd"]);
        let ex = Extractor::new(StdLibs::default());

        let err = solve(&set, &ex, &p.options().top(PathBuf::from("pkg_a.vhd"))).unwrap_err();
        assert_eq!(
            err,
            Error::TopHasDependents(p.path("pkg_a.vhd"), p.path("pkg_b.vhd"), Hint::TopLast)
        );

        let err = solve(&set, &ex, &p.options().top(PathBuf::from("missing.vhd"))).unwrap_err();
        assert_eq!(err, Error::TopNotFound(p.path("missing.vhd")));
    }

    #[test]
    fn cycle_names_both_files() {
        let p = Project::new();
        p.write("a.vhd", b"use work.pkg_b.all;\npackage pkg_a is end;\n")
            .write("b.vhd", b"use work.pkg_a.all;\npackage pkg_b is end;\n")
            .write("c.vhd", b"package pkg_c is end;\n");
        let set = p.set(&["a.vhd", "b.vhd", "c.vhd"]);
        let err = solve(&set, &Extractor::new(StdLibs::default()), &p.options()).unwrap_err();
        assert_eq!(err, Error::CyclicDependency(vec![p.path("a.vhd"), p.path("b.vhd")]));
    }

    #[test]
    fn encrypted_files_keep_index_order() {
        let p = Project::new();
        p.write("z_enc.vhd", b"Xlx\x00package pkg_a is")
            .write("a_enc.vhd", b"Xlx\x00\x01")
            .write("user.vhd", b"use work.pkg_a.all;\nentity user is end;\n");
        let set = p.set(&["user.vhd", "z_enc.vhd", "a_enc.vhd"]);
        let ex = Extractor::new(StdLibs::default());
        let solution = solve(&set, &ex, &p.options()).unwrap();
        // encrypted content never satisfies a requirement
        assert_eq!(p.names(&solution), vec!["a_enc.vhd", "user.vhd", "z_enc.vhd"]);
        let a = set.get(&p.path("a_enc.vhd")).unwrap().get_dependencies().unwrap();
        let z = set.get(&p.path("z_enc.vhd")).unwrap().get_dependencies().unwrap();
        assert_eq!(a.get_index() < z.get_index(), true);
        assert_eq!(z.get_provides().is_empty(), true);
    }

    #[test]
    fn strict_mode_rejects_unresolved() {
        let p = Project::new();
        p.write("top.vhd", b"use work.missing_pkg.all;\nentity top is end;\n");
        let set = p.set(&["top.vhd"]);
        let ex = Extractor::new(StdLibs::default());

        assert_eq!(solve(&set, &ex, &p.options()).unwrap().get_order().len(), 1);
        let err = solve(&set, &ex, &p.options().strict(true)).unwrap_err();
        assert_eq!(
            err,
            Error::UnresolvedDependency(p.path("top.vhd"), "work.missing_pkg".to_string())
        );
    }

    #[test]
    fn duplicate_providers() {
        let p = Project::new();
        p.write("a.vhd", b"package pkg is end;\n")
            .write("b.vhd", b"package pkg is end;\n")
            .write("c.vhd", b"use work.pkg.all;\nentity c is end;\n");
        let set = p.set(&["c.vhd", "b.vhd", "a.vhd"]);
        let ex = Extractor::new(StdLibs::default());

        let solution = solve(&set, &ex, &p.options()).unwrap();
        assert_eq!(solution.get_warnings().len(), 1);
        // the later path wins and `c` must follow it
        assert_eq!(p.names(&solution), vec!["a.vhd", "b.vhd", "c.vhd"]);

        let err = solve(&set, &ex, &p.options().strict(true)).unwrap_err();
        assert_eq!(
            err,
            Error::DuplicateProvider("work.pkg".to_string(), p.path("a.vhd"), p.path("b.vhd"))
        );
    }

    #[test]
    fn provider_outside_base_orders_by_relative_path() {
        let p = Project::new();
        fs::create_dir_all(p.path("proj")).unwrap();
        fs::create_dir_all(p.path("zzz")).unwrap();
        p.write("proj/pkg.vhd", b"package pkg is end;\n")
            .write("zzz/pkg.vhd", b"package pkg is end;\n")
            .write("proj/user.vhd", b"use work.pkg.all;\nentity user is end;\n");
        let set = p.set(&["proj/user.vhd", "zzz/pkg.vhd", "proj/pkg.vhd"]);
        let ex = Extractor::new(StdLibs::default());
        let opts = SolveOptions::new().base(p.path("proj"));

        // `../zzz/pkg.vhd` sorts before `pkg.vhd`, so the file inside the base wins
        let solution = solve(&set, &ex, &opts).unwrap();
        assert_eq!(
            p.names(&solution),
            vec!["zzz/pkg.vhd", "proj/pkg.vhd", "proj/user.vhd"]
        );

        let err = solve(&set, &ex, &opts.strict(true)).unwrap_err();
        assert_eq!(
            err,
            Error::DuplicateProvider(
                "work.pkg".to_string(),
                p.path("zzz/pkg.vhd"),
                p.path("proj/pkg.vhd")
            )
        );
    }

    #[test]
    fn failed_extraction_excludes_file() {
        let p = Project::new();
        p.write("a.vhd", b"package pkg is end;\n");
        let set = p.set(&["a.vhd", "gone.vhd"]);
        let ex = Extractor::new(StdLibs::default());

        let solution = solve(&set, &ex, &p.options()).unwrap();
        assert_eq!(p.names(&solution), vec!["a.vhd"]);
        assert!(matches!(solution.get_warnings()[0], Error::DependencyExtraction(..)));

        let err = solve(&set, &ex, &p.options().strict(true)).unwrap_err();
        assert!(matches!(err, Error::DependencyExtraction(..)));
    }

    #[test]
    fn verilog_headers_come_first() {
        let p = Project::new();
        p.write("top.v", b"`include \"defs.vh\"\nmodule top; endmodule\n")
            .write("defs.vh", b"`define WIDTH 8\n")
            .write("pins.ucf", b"NET clk LOC = P1;\n");
        let set = p.set(&["top.v", "pins.ucf", "defs.vh"]);
        let solution = solve(&set, &Extractor::new(StdLibs::default()), &p.options()).unwrap();
        assert_eq!(p.names(&solution), vec!["defs.vh", "pins.ucf", "top.v"]);
    }

    #[test]
    fn records_as_json() {
        let p = packages();
        let set = p.set(&["pkg_a.vhd"]);
        let solution = solve(&set, &Extractor::new(StdLibs::default()), &p.options()).unwrap();
        let records = solution.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].get_library(), "work");

        let json: serde_json::Value = serde_json::from_str(&solution.to_json().unwrap()).unwrap();
        assert_eq!(json[0]["kind"], "vhdl");
        assert_eq!(json[0]["library"], "work");
        assert_eq!(json[0]["module"], 0);
    }
}

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

use parking_lot::Mutex;
use rayon::prelude::*;
use std::path::{Path, PathBuf};

use crate::core::fetch::Fetch;
use crate::core::manifest::{Manifest, ManifestReader, SubModule, MANIFEST_FILE};
use crate::core::module::{FetchMethod, Module, ModuleId, ModuleKey};
use crate::core::source::{SourceFile, SourceFileSet};
use crate::core::tool::{Action, SimTool, StdLibs};
use crate::error::{Error, LastError};
use crate::util::filesystem;
use crate::util::graph::Twig;
use crate::util::graphmap::GraphMap;

/// Directory remote modules are fetched into when a module does not say.
pub const DEFAULT_FETCH_DIR: &str = "modules";

/// Every module reachable from a root module, keyed by identity.
#[derive(Debug)]
pub struct ModulePool {
    graph: GraphMap<ModuleKey, Module, ()>,
    root: ModuleId,
    warnings: Vec<Error>,
}

impl ModulePool {
    fn new() -> Self {
        Self {
            graph: GraphMap::new(),
            root: 0,
            warnings: Vec::new(),
        }
    }

    pub fn get_root(&self) -> &Module {
        // the root is inserted before the pool is ever handed out
        self.graph
            .get_node_by_index(self.root)
            .map(|n| n.as_ref())
            .expect("pool always holds its root module")
    }

    pub fn get_module(&self, id: ModuleId) -> Option<&Module> {
        Some(self.graph.get_node_by_index(id)?.as_ref())
    }

    fn get_module_mut(&mut self, id: ModuleId) -> Option<&mut Module> {
        Some(self.graph.get_node_by_index_mut(id)?.as_ref_mut())
    }

    pub fn find(&self, key: &ModuleKey) -> Option<&Module> {
        Some(self.graph.get_node_by_key(key)?.as_ref())
    }

    /// Iterates over the modules in the order they were discovered.
    pub fn iter(&self) -> impl Iterator<Item = &Module> {
        self.graph.iter().map(|(_, m)| m)
    }

    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    /// Counts the parent-child links between modules.
    pub fn link_count(&self) -> usize {
        self.graph.get_graph().edge_count()
    }

    pub fn unfetched(&self) -> Vec<&Module> {
        self.iter().filter(|m| m.is_fetched() == false).collect()
    }

    /// Problems met during resolution that did not stop it.
    pub fn get_warnings(&self) -> &Vec<Error> {
        &self.warnings
    }

    /// Merges the files of every fetched module that satisfy `predicate`.
    ///
    /// A file registered by more than one module keeps its first library and
    /// options.
    pub fn aggregate_files<P>(&self, predicate: P) -> SourceFileSet
    where
        P: Fn(&Module, &SourceFile) -> bool,
    {
        let mut set = SourceFileSet::new();
        for m in self.iter().filter(|m| m.is_fetched() == true) {
            for f in m.get_files().iter() {
                if predicate(m, f) == true {
                    set.add(f.clone());
                }
            }
        }
        set
    }

    pub fn all_files(&self) -> SourceFileSet {
        self.aggregate_files(|_, _| true)
    }

    /// Selects the standard libraries for the tool chosen by the root module.
    pub fn std_libs(&self) -> StdLibs {
        let root = self.get_root();
        let cfg = root.get_config();
        if let Some(ini) = cfg.get_modelsim_ini() {
            let uses_modelsim = cfg.get_action() == Some(Action::Simulation)
                && (cfg.get_sim_tool() == Some(SimTool::Modelsim) || cfg.get_sim_tool().is_none());
            if uses_modelsim == true {
                let path = filesystem::resolve(root.get_root(), ini);
                match StdLibs::read_modelsim_ini(&path) {
                    Ok(libs) => return libs,
                    Err(e) => tracing::warn!("ignoring {:?}: {}", path, e),
                }
            }
        }
        StdLibs::select(cfg.get_action(), cfg.get_sim_tool(), cfg.get_syn_tool())
    }

    /// Renders the module hierarchy as a tree, optionally listing the files of
    /// each module beneath it.
    pub fn treeview(&self, with_files: bool, ascii: bool) -> String {
        let draw = |t: &Twig| match ascii {
            true => t.to_ascii(),
            false => t.to_string(),
        };
        let mut tree = String::new();
        for (twig, index) in self.graph.get_graph().treeview(self.root) {
            let m = match self.get_module(index) {
                Some(m) => m,
                None => continue,
            };
            let branch = draw(&twig);
            tree.push_str(&branch);
            tree.push_str(m.get_name());
            if let Some(rev) = m.get_revision() {
                tree.push_str(&format!(" @ {}", rev));
            }
            if m.is_fetched() == false {
                tree.push_str(" (unfetched)");
            }
            tree.push('\n');
            if with_files == true {
                let pad = " ".repeat(branch.chars().count() + 2);
                for f in m.get_files().iter() {
                    tree.push_str(&format!(
                        "{}{}\n",
                        pad,
                        filesystem::relative_to(f.get_path(), m.get_root())
                    ));
                }
            }
        }
        tree
    }

    /// Links `child` under `parent`; repeated links are ignored.
    fn connect(&mut self, parent: ModuleId, child: ModuleId) {
        if self.graph.add_edge_by_index(parent, child, ()).is_ok() == true {
            if let Some(p) = self.get_module_mut(parent) {
                p.add_child(child);
            }
        }
    }

    /// Applies a freshly read manifest to module `id`.
    ///
    /// Returns the declared sub-modules and any files that failed to register.
    fn apply(&mut self, id: ModuleId, manifest: Option<Manifest>) -> (Vec<SubModule>, Vec<Error>) {
        let module = match self.get_module_mut(id) {
            Some(m) => m,
            None => return (Vec::new(), Vec::new()),
        };
        match manifest {
            Some(manifest) => {
                let (config, files, subs) = manifest.into_parts();
                module.set_config(config);
                let errors = module.load_files(&files);
                tracing::debug!("module {} declares {} files", module.get_name(), module.get_files().len());
                (subs, errors)
            }
            None => {
                tracing::debug!("module {} has no manifest", module.get_name());
                (Vec::new(), Vec::new())
            }
        }
    }

    /// Registers the sub-module `sub` declared by `parent`.
    ///
    /// Returns the index of a newly created module that still has to be
    /// fetched, or `None` when an existing module was linked instead.
    fn link(&mut self, parent: ModuleId, sub: &SubModule) -> Result<Option<ModuleId>, Error> {
        let (key, checkout, root) = match self.get_module(parent) {
            Some(p) => place(p, sub),
            None => return Ok(None),
        };
        if let Some(node) = self.graph.get_node_by_key(&key) {
            let existing = node.index();
            let graph = self.graph.get_graph();
            if existing == parent || graph.ancestors(parent).contains(&existing) == true {
                let mut chain = graph
                    .find_path(existing, parent)
                    .unwrap_or_else(|| vec![existing]);
                chain.push(existing);
                return Err(Error::CircularModuleReference(
                    chain
                        .into_iter()
                        .filter_map(|i| self.get_module(i))
                        .map(|m| m.get_key().to_string())
                        .collect(),
                ));
            }
            self.connect(parent, existing);
            return Ok(None);
        }
        let id = self.graph.node_count();
        let module = Module::new(id, key.clone(), checkout, root)
            .method(sub.get_method())
            .url(sub.get_url())
            .parent(parent);
        self.graph.add_node(key, module);
        self.connect(parent, id);
        Ok(Some(id))
    }

    /// Reports modules that come from the same place at different revisions.
    fn check_revisions(&mut self) {
        // groups are kept in discovery order
        let mut seen: Vec<Vec<&Module>> = Vec::new();
        for m in self.iter().filter(|m| m.get_method().is_remote() == true) {
            match seen
                .iter_mut()
                .find(|g| g[0].get_key().same_origin(m.get_key()) == true)
            {
                Some(group) => group.push(m),
                None => seen.push(vec![m]),
            }
        }
        let mut conflicts = Vec::new();
        for group in seen {
            let first = group[0];
            for other in group.iter().skip(1) {
                let conflict = Error::ConflictingRevision(
                    ModuleKey::new(first.get_key().get_url(), Some(first.get_key().get_path()), None).to_string(),
                    describe_revision(first),
                    describe_revision(other),
                );
                tracing::warn!("{}", conflict);
                conflicts.push(conflict);
            }
        }
        self.warnings.append(&mut conflicts);
    }
}

fn describe_revision(m: &Module) -> String {
    m.get_revision()
        .cloned()
        .unwrap_or_else(|| String::from("(default)"))
}

/// Computes where a sub-module lives: its identity, its checkout directory,
/// and the directory holding its sources.
fn place(parent: &Module, sub: &SubModule) -> (ModuleKey, PathBuf, PathBuf) {
    let sub_path = sub.get_path().map(|p| p.as_str());
    match sub.get_method() {
        FetchMethod::Local => {
            let dir = filesystem::resolve(parent.get_root(), Path::new(sub.get_url().trim()));
            let key = ModuleKey::new(&filesystem::into_std_str(&dir), sub_path, None);
            let root = filesystem::normalize(&dir.join(sub_path.unwrap_or_default()));
            (key, dir, root)
        }
        FetchMethod::Git | FetchMethod::Svn => {
            let revision = sub.get_revision().map(|r| r.as_str());
            let key = ModuleKey::new(sub.get_url(), sub_path, revision);
            let basename = Module::basename(sub.get_url());
            let folder = match key.get_revision() {
                Some(rev) => format!("{}@{}", basename, rev.replace(|c| c == '/' || c == '\\', "_")),
                None => basename,
            };
            let checkout = parent
                .get_root()
                .join(parent.get_config().get_fetch_to().map(|s| s.as_str()).unwrap_or(DEFAULT_FETCH_DIR))
                .join(folder);
            let root = filesystem::normalize(&checkout.join(sub_path.unwrap_or_default()));
            (key, filesystem::normalize(&checkout), root)
        }
    }
}

/// A module fetched by a worker, ready to be expanded on the next level.
struct Expanded {
    id: ModuleId,
    subs: Vec<SubModule>,
    warnings: Vec<Error>,
}

/// Builds a [ModulePool] by fetching modules level by level from a root.
pub struct Resolver {
    fetcher: Box<dyn Fetch>,
    reader: Box<dyn ManifestReader>,
}

impl Resolver {
    pub fn new(fetcher: Box<dyn Fetch>, reader: Box<dyn ManifestReader>) -> Self {
        Self {
            fetcher: fetcher,
            reader: reader,
        }
    }

    /// Resolves the module tree rooted at the directory `root`.
    ///
    /// Siblings are fetched in parallel once their parent's manifest is known.
    /// A sub-module that fails to fetch is left unfetched and reported as a
    /// warning; a circular reference or an unreadable root manifest fails the
    /// whole resolution.
    pub fn resolve(&self, root: &Path) -> Result<ModulePool, Error> {
        let root_dir = filesystem::normalize(root);
        let manifest = self
            .reader
            .read(&root_dir)
            .map_err(|e| Error::ManifestParse(root_dir.join(MANIFEST_FILE), LastError(e.to_string())))?;

        let mut pool = ModulePool::new();
        let key = ModuleKey::local(&root_dir);
        let mut module = Module::new(0, key.clone(), root_dir.clone(), root_dir.clone());
        module.mark_fetched();
        pool.root = pool.graph.add_node(key, module);
        let (subs, mut warnings) = pool.apply(pool.root, manifest);
        pool.warnings.append(&mut warnings);

        let pool = Mutex::new(pool);
        let mut level: Vec<(ModuleId, Vec<SubModule>)> = vec![(0, subs)];
        while level.is_empty() == false {
            let mut pending: Vec<ModuleId> = Vec::new();
            {
                let mut guard = pool.lock();
                for (parent, subs) in &level {
                    for sub in subs {
                        if let Some(id) = guard.link(*parent, sub)? {
                            pending.push(id);
                        }
                    }
                }
            }
            let outcomes: Vec<Result<Expanded, Error>> =
                pending.par_iter().map(|id| self.fetch_one(&pool, *id)).collect();

            level = Vec::new();
            let mut guard = pool.lock();
            for outcome in outcomes {
                match outcome {
                    Ok(mut done) => {
                        guard.warnings.append(&mut done.warnings);
                        level.push((done.id, done.subs));
                    }
                    Err(e) => {
                        tracing::warn!("{}", e);
                        guard.warnings.push(e);
                    }
                }
            }
        }

        let mut pool = pool.into_inner();
        // only the root module is created without a declaring parent
        debug_assert_eq!(pool.iter().filter(|m| m.is_root() == true).count(), 1);
        pool.check_revisions();
        let unfetched: Vec<String> = pool.unfetched().iter().map(|m| m.get_key().to_string()).collect();
        if unfetched.is_empty() == false {
            tracing::warn!("unfetched modules: {}", unfetched.join(", "));
        }
        Ok(pool)
    }

    /// Fetches module `id` and reads its manifest.
    ///
    /// The pool is only locked to read the module's location and to record
    /// the result, never while the fetch runs.
    fn fetch_one(&self, pool: &Mutex<ModulePool>, id: ModuleId) -> Result<Expanded, Error> {
        let (key, url, method, checkout, root, declared_by) = {
            let guard = pool.lock();
            match guard.get_module(id) {
                Some(m) => (
                    m.get_key().clone(),
                    m.get_url().to_string(),
                    m.get_method(),
                    m.get_checkout().clone(),
                    m.get_root().clone(),
                    m.get_parent()
                        .and_then(|p| guard.get_module(p))
                        .map(|p| p.get_name().to_string())
                        .unwrap_or_default(),
                ),
                None => return Ok(Expanded { id: id, subs: Vec::new(), warnings: Vec::new() }),
            }
        };
        tracing::debug!("fetching {} for module {} into {:?}", key, declared_by, checkout);
        let revision = key.get_revision().map(|r| r.as_str());
        self.fetcher
            .fetch(&url, revision, method, &checkout)
            .map_err(|e| Error::ModuleFetch(key.to_string(), LastError(e.to_string())))?;
        let manifest = self
            .reader
            .read(&root)
            .map_err(|e| Error::ManifestParse(root.join(MANIFEST_FILE), LastError(e.to_string())))?;

        let mut guard = pool.lock();
        if let Some(m) = guard.get_module_mut(id) {
            m.mark_fetched();
        }
        let (subs, warnings) = guard.apply(id, manifest);
        Ok(Expanded {
            id: id,
            subs: subs,
            warnings: warnings,
        })
    }
}

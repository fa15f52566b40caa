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

//! Runs the whole engine: resolve the module tree, gather its files, and order
//! them for compilation.

use std::path::{Path, PathBuf};

use crate::core::config::Config;
use crate::core::extract::Extractor;
use crate::core::manifest::TomlManifestReader;
use crate::core::pool::{ModulePool, Resolver};
use crate::core::solver::{self, SolveOptions, Solution};
use crate::error::Error;

/// The module tree of a project and the compile order derived from it.
#[derive(Debug)]
pub struct Plan {
    pool: ModulePool,
    solution: Solution,
}

impl Plan {
    /// Resolves the project rooted at `root` and orders every file it declares.
    ///
    /// The strict setting of `config` is combined with the one in `opts`.
    pub fn build(root: &Path, config: &Config, opts: SolveOptions) -> Result<Self, Error> {
        let resolver = Resolver::new(Box::new(config.fetcher()), Box::new(TomlManifestReader));
        let pool = resolver.resolve(root)?;
        Self::from_pool(pool, config, opts)
    }

    /// Orders the files of an already resolved pool.
    pub fn from_pool(pool: ModulePool, config: &Config, opts: SolveOptions) -> Result<Self, Error> {
        let module_dirs: Vec<PathBuf> = pool
            .iter()
            .filter(|m| m.is_fetched() == true)
            .map(|m| m.get_root().clone())
            .collect();
        let mut extractor = Extractor::new(pool.std_libs());
        if let Some(fe) = config.frontend(&module_dirs) {
            extractor = extractor.frontend(fe);
        }

        let strict = opts.is_strict() || config.is_strict();
        let opts = opts.strict(strict).base(pool.get_root().get_root().clone());
        let files = pool.all_files();
        tracing::info!(
            "ordering {} files from {} modules",
            files.len(),
            pool.len() - pool.unfetched().len()
        );
        let solution = solver::solve(&files, &extractor, &opts)?;
        Ok(Self {
            pool: pool,
            solution: solution,
        })
    }

    pub fn get_pool(&self) -> &ModulePool {
        &self.pool
    }

    pub fn get_solution(&self) -> &Solution {
        &self.solution
    }

    /// Every non-fatal problem from resolution followed by those from solving.
    pub fn warnings(&self) -> Vec<&Error> {
        self.pool
            .get_warnings()
            .iter()
            .chain(self.solution.get_warnings().iter())
            .collect()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::core::manifest::MANIFEST_FILE;
    use crate::util::filesystem;
    use std::fs;
    use std::str::FromStr;

    #[test]
    fn build_across_local_modules() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("proj");
        let ip = dir.path().join("ip_fifo");
        fs::create_dir_all(root.join("rtl")).unwrap();
        fs::create_dir_all(&ip).unwrap();

        fs::write(
            root.join(MANIFEST_FILE),
            "files = [\"rtl\"]\n[module]\naction = \"synthesis\"\nsyn-vendor = \"xilinx\"\n[[modules]]\nmethod = \"local\"\nurl = \"../ip_fifo\"\n",
        )
        .unwrap();
        fs::write(
            root.join("rtl/top.vhd"),
            "library unisim;\nuse unisim.vcomponents.all;\nlibrary fifo_lib;\nuse fifo_lib.fifo_pkg.all;\nentity top is end;\n",
        )
        .unwrap();
        fs::write(
            ip.join(MANIFEST_FILE),
            "files = [\"fifo_pkg.vhd\"]\n[module]\nname = \"fifo\"\nlibrary = \"fifo_lib\"\n",
        )
        .unwrap();
        fs::write(ip.join("fifo_pkg.vhd"), "package fifo_pkg is end;\n").unwrap();

        let opts = SolveOptions::new()
            .strict(true)
            .top(PathBuf::from("rtl/top.vhd"));
        let plan = Plan::build(&root, &Config::new(), opts).unwrap();

        assert_eq!(plan.get_pool().len(), 2);
        assert_eq!(plan.warnings().is_empty(), true);
        let order: Vec<String> = plan
            .get_solution()
            .paths()
            .iter()
            .map(|p| filesystem::relative_to(p, dir.path()))
            .collect();
        assert_eq!(order, vec!["ip_fifo/fifo_pkg.vhd", "proj/rtl/top.vhd"]);
        assert_eq!(plan.get_solution().records()[0].get_library(), "fifo_lib");
    }

    /// Lays out `<ws>/nest/proj` using local modules at `../ip_b` and
    /// `../../zz_ip`, then returns the file names in compile order.
    fn order_in_workspace(ws: &Path) -> Vec<String> {
        let proj = ws.join("nest/proj");
        let ip_b = ws.join("nest/ip_b");
        let zz_ip = ws.join("zz_ip");
        for d in [&proj, &ip_b, &zz_ip] {
            fs::create_dir_all(d).unwrap();
        }
        fs::write(
            proj.join(MANIFEST_FILE),
            "files = [\"a.vhd\"]\n[[modules]]\nmethod = \"local\"\nurl = \"../ip_b\"\n[[modules]]\nmethod = \"local\"\nurl = \"../../zz_ip\"\n",
        )
        .unwrap();
        fs::write(proj.join("a.vhd"), "entity a is end;\n").unwrap();
        fs::write(ip_b.join(MANIFEST_FILE), "files = [\"b.vhd\"]\n").unwrap();
        fs::write(ip_b.join("b.vhd"), "entity b is end;\n").unwrap();
        fs::write(zz_ip.join(MANIFEST_FILE), "files = [\"z.vhd\"]\n").unwrap();
        fs::write(zz_ip.join("z.vhd"), "entity z is end;\n").unwrap();

        let plan = Plan::build(&proj, &Config::new(), SolveOptions::new()).unwrap();
        plan.get_solution()
            .paths()
            .iter()
            .filter_map(|p| p.file_name())
            .map(|n| n.to_string_lossy().to_string())
            .collect()
    }

    #[test]
    fn order_ignores_workspace_location() {
        let dir = tempfile::tempdir().unwrap();
        let first = order_in_workspace(&dir.path().join("ws"));
        let second = order_in_workspace(&dir.path().join("zzz_ws"));
        assert_eq!(first, second);
        // ties break on paths relative to the root module
        assert_eq!(first, vec!["z.vhd", "b.vhd", "a.vhd"]);
    }

    #[test]
    fn strict_config_applies() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(MANIFEST_FILE), "files = [\"top.vhd\"]\n").unwrap();
        fs::write(dir.path().join("top.vhd"), "use work.nowhere.all;\n").unwrap();

        let lenient = Plan::build(dir.path(), &Config::new(), SolveOptions::new()).unwrap();
        assert_eq!(lenient.get_solution().get_order().len(), 1);

        let config = Config::from_str("[solve]\nstrict = true\n").unwrap();
        let err = Plan::build(dir.path(), &config, SolveOptions::new()).unwrap_err();
        assert!(matches!(err, Error::UnresolvedDependency(..)));
    }
}

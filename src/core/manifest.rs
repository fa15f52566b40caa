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

use serde_derive::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::core::module::FetchMethod;
use crate::core::tool::{Action, SimTool, SynTool};
use crate::error::Fault;

pub const MANIFEST_FILE: &str = "Manifest.toml";

pub trait FromFile: FromStr
where
    Self: Sized,
    <Self as std::str::FromStr>::Err: 'static + std::error::Error + Send + Sync,
{
    fn from_file(path: &Path) -> Result<Self, Fault> {
        // try to open the file in read-only mode
        let text = std::fs::read_to_string(&path)?;
        Ok(Self::from_str(&text)?)
    }
}

/// The declarations of one module: its settings, its source files, and the
/// sub-modules it pulls in.
#[derive(Deserialize, Serialize, Debug, PartialEq, Clone, Default)]
#[serde(deny_unknown_fields)]
pub struct Manifest {
    #[serde(default)]
    files: Vec<FileEntry>,
    #[serde(default)]
    module: ModuleConfig,
    #[serde(default)]
    modules: Vec<SubModule>,
}

impl FromFile for Manifest {}

impl FromStr for Manifest {
    type Err = toml::de::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        toml::from_str(s)
    }
}

impl Manifest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_files(&self) -> &Vec<FileEntry> {
        &self.files
    }

    pub fn get_config(&self) -> &ModuleConfig {
        &self.module
    }

    pub fn get_modules(&self) -> &Vec<SubModule> {
        &self.modules
    }

    /// Splits the manifest into its configuration, files, and sub-modules.
    pub fn into_parts(self) -> (ModuleConfig, Vec<FileEntry>, Vec<SubModule>) {
        (self.module, self.files, self.modules)
    }

    pub fn file(mut self, entry: FileEntry) -> Self {
        self.files.push(entry);
        self
    }

    pub fn sub_module(mut self, sub: SubModule) -> Self {
        self.modules.push(sub);
        self
    }

    pub fn config(mut self, config: ModuleConfig) -> Self {
        self.module = config;
        self
    }
}

/// Module-level settings.
#[derive(Deserialize, Serialize, Debug, PartialEq, Clone, Default)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct ModuleConfig {
    name: Option<String>,
    library: Option<String>,
    action: Option<Action>,
    sim_tool: Option<SimTool>,
    syn_tool: Option<SynTool>,
    syn_vendor: Option<String>,
    syn_device: Option<String>,
    top: Option<String>,
    fetch_to: Option<String>,
    #[serde(default)]
    include_dirs: Vec<String>,
    vcom_opt: Option<String>,
    vlog_opt: Option<String>,
    pre_cmd: Option<String>,
    post_cmd: Option<String>,
    modelsim_ini: Option<PathBuf>,
}

impl ModuleConfig {
    pub fn get_name(&self) -> Option<&String> {
        self.name.as_ref()
    }

    pub fn get_library(&self) -> Option<&String> {
        self.library.as_ref()
    }

    pub fn get_action(&self) -> Option<Action> {
        self.action
    }

    pub fn get_sim_tool(&self) -> Option<SimTool> {
        self.sim_tool
    }

    /// Returns the synthesis tool, guessing it from the vendor when it is not
    /// named directly.
    pub fn get_syn_tool(&self) -> Option<SynTool> {
        match self.syn_tool {
            Some(t) => Some(t),
            None => SynTool::from_vendor(self.syn_vendor.as_ref()?),
        }
    }

    pub fn get_syn_vendor(&self) -> Option<&String> {
        self.syn_vendor.as_ref()
    }

    pub fn get_syn_device(&self) -> Option<&String> {
        self.syn_device.as_ref()
    }

    pub fn get_top(&self) -> Option<&String> {
        self.top.as_ref()
    }

    pub fn get_fetch_to(&self) -> Option<&String> {
        self.fetch_to.as_ref()
    }

    pub fn get_include_dirs(&self) -> &Vec<String> {
        &self.include_dirs
    }

    pub fn get_vcom_opt(&self) -> Option<&String> {
        self.vcom_opt.as_ref()
    }

    pub fn get_vlog_opt(&self) -> Option<&String> {
        self.vlog_opt.as_ref()
    }

    pub fn get_pre_cmd(&self) -> Option<&String> {
        self.pre_cmd.as_ref()
    }

    pub fn get_post_cmd(&self) -> Option<&String> {
        self.post_cmd.as_ref()
    }

    pub fn get_modelsim_ini(&self) -> Option<&PathBuf> {
        self.modelsim_ini.as_ref()
    }

    pub fn name(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    pub fn library(mut self, lib: &str) -> Self {
        self.library = Some(lib.to_string());
        self
    }

    pub fn action(mut self, action: Action) -> Self {
        self.action = Some(action);
        self
    }

    pub fn sim_tool(mut self, tool: SimTool) -> Self {
        self.sim_tool = Some(tool);
        self
    }

    pub fn top(mut self, top: &str) -> Self {
        self.top = Some(top.to_string());
        self
    }

    pub fn include_dir(mut self, dir: &str) -> Self {
        self.include_dirs.push(dir.to_string());
        self
    }

    pub fn vcom_opt(mut self, opt: &str) -> Self {
        self.vcom_opt = Some(opt.to_string());
        self
    }

    pub fn vlog_opt(mut self, opt: &str) -> Self {
        self.vlog_opt = Some(opt.to_string());
        self
    }
}

/// A declared source file: a bare path (or glob, or directory) or a table
/// with per-file overrides.
#[derive(Deserialize, Serialize, Debug, PartialEq, Clone)]
#[serde(untagged)]
pub enum FileEntry {
    Path(String),
    Detailed {
        path: String,
        library: Option<String>,
        options: Option<String>,
    },
}

impl FileEntry {
    pub fn get_path(&self) -> &str {
        match self {
            Self::Path(p) => p,
            Self::Detailed { path, .. } => path,
        }
    }

    pub fn get_library(&self) -> Option<&String> {
        match self {
            Self::Path(_) => None,
            Self::Detailed { library, .. } => library.as_ref(),
        }
    }

    pub fn get_options(&self) -> Option<&String> {
        match self {
            Self::Path(_) => None,
            Self::Detailed { options, .. } => options.as_ref(),
        }
    }

    /// Checks if the entry should be expanded as a glob pattern.
    pub fn is_pattern(&self) -> bool {
        self.get_path().contains(|c| c == '*' || c == '?' || c == '[')
    }
}

impl From<&str> for FileEntry {
    fn from(s: &str) -> Self {
        Self::Path(s.to_string())
    }
}

/// A reference to another module.
#[derive(Deserialize, Serialize, Debug, PartialEq, Clone)]
#[serde(deny_unknown_fields)]
pub struct SubModule {
    #[serde(default)]
    method: FetchMethod,
    url: String,
    revision: Option<String>,
    path: Option<String>,
}

impl SubModule {
    pub fn new(method: FetchMethod, url: &str) -> Self {
        Self {
            method: method,
            url: url.to_string(),
            revision: None,
            path: None,
        }
    }

    pub fn revision(mut self, rev: &str) -> Self {
        self.revision = Some(rev.to_string());
        self
    }

    pub fn path(mut self, path: &str) -> Self {
        self.path = Some(path.to_string());
        self
    }

    pub fn get_method(&self) -> FetchMethod {
        self.method
    }

    pub fn get_url(&self) -> &str {
        &self.url
    }

    pub fn get_revision(&self) -> Option<&String> {
        self.revision.as_ref()
    }

    pub fn get_path(&self) -> Option<&String> {
        self.path.as_ref()
    }
}

/// Supplies the parsed manifest of a module directory.
pub trait ManifestReader: Send + Sync {
    /// Returns `None` when `root` carries no manifest at all.
    fn read(&self, root: &Path) -> Result<Option<Manifest>, Fault>;
}

/// Reads `Manifest.toml` files from disk.
#[derive(Debug, Default)]
pub struct TomlManifestReader;

impl ManifestReader for TomlManifestReader {
    fn read(&self, root: &Path) -> Result<Option<Manifest>, Fault> {
        let path = root.join(MANIFEST_FILE);
        match path.is_file() {
            true => Ok(Some(Manifest::from_file(&path)?)),
            false => Ok(None),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const EXAMPLE: &str = r#"
files = ["rtl/a.vhd", { path = "rtl/b.vhd", library = "lib_b", options = "-2008" }, "rtl/*.v"]

[module]
name = "core"
library = "core_lib"
action = "synthesis"
syn-vendor = "Xilinx"
top = "top_entity"
fetch-to = "ip_cores"
include-dirs = ["include"]
vcom-opt = "-93"

[[modules]]
method = "git"
url = "https://example.com/ip/uart.git"
revision = "v1.2"
path = "hdl"

[[modules]]
url = "https://example.com/ip/spi.git"
"#;

    #[test]
    fn parse_full_manifest() {
        let man = Manifest::from_str(EXAMPLE).unwrap();
        assert_eq!(man.get_files().len(), 3);
        assert_eq!(man.get_files()[0], FileEntry::Path("rtl/a.vhd".to_string()));
        assert_eq!(man.get_files()[1].get_library(), Some(&"lib_b".to_string()));
        assert_eq!(man.get_files()[1].get_options(), Some(&"-2008".to_string()));
        assert_eq!(man.get_files()[2].is_pattern(), true);

        let cfg = man.get_config();
        assert_eq!(cfg.get_name(), Some(&"core".to_string()));
        assert_eq!(cfg.get_action(), Some(Action::Synthesis));
        assert_eq!(cfg.get_syn_tool(), Some(SynTool::Ise));
        assert_eq!(cfg.get_include_dirs(), &vec!["include".to_string()]);

        let subs = man.get_modules();
        assert_eq!(subs.len(), 2);
        assert_eq!(subs[0].get_revision(), Some(&"v1.2".to_string()));
        assert_eq!(subs[0].get_path(), Some(&"hdl".to_string()));
        assert_eq!(subs[1].get_method(), FetchMethod::Git);
    }

    #[test]
    fn empty_manifest_is_valid() {
        assert_eq!(Manifest::from_str("").unwrap(), Manifest::new());
    }

    #[test]
    fn unknown_key_is_rejected() {
        assert_eq!(Manifest::from_str("[module]\ncolor = \"red\"\n").is_err(), true);
    }

    #[test]
    fn toml_reader() {
        let dir = tempfile::tempdir().unwrap();
        let reader = TomlManifestReader;
        assert_eq!(reader.read(dir.path()).unwrap(), None);

        std::fs::write(dir.path().join(MANIFEST_FILE), "files = [\"a.vhd\"]\n").unwrap();
        let man = reader.read(dir.path()).unwrap().unwrap();
        assert_eq!(man.get_files(), &vec![FileEntry::from("a.vhd")]);

        std::fs::write(dir.path().join(MANIFEST_FILE), "files = 4\n").unwrap();
        assert_eq!(reader.read(dir.path()).is_err(), true);
    }
}

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
use std::fmt::Display;
use std::path::{Path, PathBuf};

use crate::core::manifest::{FileEntry, ModuleConfig};
use crate::core::source::{FileKind, SourceFile, SourceFileSet};
use crate::error::{Error, LastError};
use crate::util::filesystem;
use crate::util::graph::NodeIndex;

/// Index of a module inside its pool.
pub type ModuleId = NodeIndex;

#[derive(Deserialize, Serialize, Debug, PartialEq, Eq, Hash, Clone, Copy, Default)]
#[serde(rename_all = "lowercase")]
pub enum FetchMethod {
    Local,
    #[default]
    Git,
    Svn,
}

impl FetchMethod {
    pub fn is_remote(&self) -> bool {
        self != &Self::Local
    }
}

impl Display for FetchMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Local => write!(f, "local"),
            Self::Git => write!(f, "git"),
            Self::Svn => write!(f, "svn"),
        }
    }
}

#[derive(Debug, PartialEq, Clone, Copy)]
pub enum FetchState {
    Unfetched,
    Fetched,
}

/// The identity of a module: where it comes from, which sub-path of it is
/// used, and at which revision.
#[derive(Debug, PartialEq, Eq, Hash, Clone, PartialOrd, Ord)]
pub struct ModuleKey {
    url: String,
    path: String,
    revision: Option<String>,
}

impl ModuleKey {
    pub fn new(url: &str, path: Option<&str>, revision: Option<&str>) -> Self {
        Self {
            url: Self::normalize_url(url),
            path: path.map(|p| Self::normalize_sub_path(p)).unwrap_or_default(),
            revision: revision
                .map(|r| r.trim().to_string())
                .filter(|r| r.is_empty() == false),
        }
    }

    /// Identifies a module that lives in a directory on disk.
    pub fn local(dir: &Path) -> Self {
        Self::new(&filesystem::into_std_str(&filesystem::normalize(dir)), None, None)
    }

    /// Folds away the spelling differences of one location: surrounding
    /// whitespace, backslashes, trailing slashes, a `.git` suffix, and the case
    /// of the scheme and host.
    pub fn normalize_url(url: &str) -> String {
        let mut url = url.trim().replace('\\', "/");
        while url.len() > 1 && url.ends_with('/') == true {
            url.pop();
        }
        if let Some(stripped) = url.strip_suffix(".git") {
            url = stripped.to_string();
        }
        match url.split_once("://") {
            Some((scheme, rest)) => {
                let (host, tail) = match rest.split_once('/') {
                    Some((h, t)) => (h, format!("/{}", t)),
                    None => (rest, String::new()),
                };
                format!("{}://{}{}", scheme.to_lowercase(), host.to_lowercase(), tail)
            }
            None => match url.split_once(':') {
                // scp-like syntax: user@host:path
                Some((host, tail)) if host.contains('@') == true => {
                    format!("{}:{}", host.to_lowercase(), tail)
                }
                _ => url,
            },
        }
    }

    fn normalize_sub_path(path: &str) -> String {
        let path = filesystem::normalize(Path::new(path.trim()));
        filesystem::into_std_str(&path).trim_end_matches('/').to_string()
    }

    pub fn get_url(&self) -> &str {
        &self.url
    }

    pub fn get_path(&self) -> &str {
        &self.path
    }

    pub fn get_revision(&self) -> Option<&String> {
        self.revision.as_ref()
    }

    /// Checks if `other` names the same location, ignoring the revision.
    pub fn same_origin(&self, other: &Self) -> bool {
        self.url == other.url && self.path == other.path
    }
}

impl Display for ModuleKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.url)?;
        if self.path.is_empty() == false {
            write!(f, "//{}", self.path)?;
        }
        if let Some(rev) = &self.revision {
            write!(f, "@{}", rev)?;
        }
        Ok(())
    }
}

/// One project directory and the source files it declares.
#[derive(Debug)]
pub struct Module {
    id: ModuleId,
    name: String,
    key: ModuleKey,
    url: String,
    method: FetchMethod,
    checkout: PathBuf,
    root: PathBuf,
    state: FetchState,
    parent: Option<ModuleId>,
    children: Vec<ModuleId>,
    files: SourceFileSet,
    config: ModuleConfig,
}

impl Module {
    /// Creates an unfetched module that will be placed at `checkout`, with its
    /// sources found under `root`.
    pub fn new(id: ModuleId, key: ModuleKey, checkout: PathBuf, root: PathBuf) -> Self {
        let name = Self::basename(key.get_url());
        Self {
            id: id,
            name: name,
            url: key.get_url().to_string(),
            key: key,
            method: FetchMethod::Local,
            checkout: checkout,
            root: root,
            state: FetchState::Unfetched,
            parent: None,
            children: Vec::new(),
            files: SourceFileSet::new(),
            config: ModuleConfig::default(),
        }
    }

    /// Derives a short name from the last component of a location.
    pub fn basename(url: &str) -> String {
        let url = ModuleKey::normalize_url(url);
        let tail = url.rsplit(|c| c == '/' || c == ':').next().unwrap_or(&url);
        match tail.is_empty() {
            true => url.clone(),
            false => tail.to_string(),
        }
    }

    pub fn method(mut self, method: FetchMethod) -> Self {
        self.method = method;
        self
    }

    pub fn url(mut self, url: &str) -> Self {
        self.url = url.trim().to_string();
        self
    }

    pub fn parent(mut self, parent: ModuleId) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn get_id(&self) -> ModuleId {
        self.id
    }

    pub fn get_name(&self) -> &str {
        &self.name
    }

    pub fn get_key(&self) -> &ModuleKey {
        &self.key
    }

    pub fn get_url(&self) -> &str {
        &self.url
    }

    pub fn get_revision(&self) -> Option<&String> {
        self.key.get_revision()
    }

    pub fn get_method(&self) -> FetchMethod {
        self.method
    }

    pub fn get_checkout(&self) -> &PathBuf {
        &self.checkout
    }

    pub fn get_root(&self) -> &PathBuf {
        &self.root
    }

    pub fn get_state(&self) -> FetchState {
        self.state
    }

    pub fn is_fetched(&self) -> bool {
        self.state == FetchState::Fetched
    }

    pub fn get_parent(&self) -> Option<ModuleId> {
        self.parent
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    pub fn get_children(&self) -> &Vec<ModuleId> {
        &self.children
    }

    pub fn get_files(&self) -> &SourceFileSet {
        &self.files
    }

    pub fn get_config(&self) -> &ModuleConfig {
        &self.config
    }

    /// Moves the module into the fetched state.
    ///
    /// Returns `false` if it was already fetched; the state never goes back.
    pub fn mark_fetched(&mut self) -> bool {
        match self.state {
            FetchState::Fetched => false,
            FetchState::Unfetched => {
                self.state = FetchState::Fetched;
                true
            }
        }
    }

    pub fn add_child(&mut self, child: ModuleId) {
        if self.children.contains(&child) == false {
            self.children.push(child);
        }
    }

    /// Applies the settings read from the module's manifest.
    pub fn set_config(&mut self, config: ModuleConfig) {
        if let Some(name) = config.get_name() {
            self.name = name.clone();
        }
        self.config = config;
    }

    /// Materializes every declared file entry into the module's file set.
    ///
    /// Entries that fail to register are returned; the rest are still loaded.
    pub fn load_files(&mut self, entries: &[FileEntry]) -> Vec<Error> {
        let mut errors = Vec::new();
        let mut loaded: Vec<SourceFile> = Vec::new();
        for entry in entries {
            let found = match self.expand(entry) {
                Ok(f) => f,
                Err(e) => {
                    errors.push(e);
                    continue;
                }
            };
            for (path, explicit) in found {
                // unsupported files swept up by a pattern or directory are ignored
                if explicit == false && FileKind::from_path(&path).is_none() {
                    tracing::debug!("skipping unsupported file {:?}", path);
                    continue;
                }
                let mut file = match SourceFile::new(&path, self) {
                    Ok(f) => f,
                    Err(e) => {
                        errors.push(e);
                        continue;
                    }
                };
                if let Some(lib) = entry.get_library() {
                    file = file.library(lib);
                }
                if let Some(opt) = entry.get_options() {
                    file = file.options(opt);
                }
                loaded.push(file);
            }
        }
        for file in loaded {
            self.files.add(file);
        }
        errors
    }

    /// Lists the paths an entry refers to, flagging whether each was named
    /// directly.
    fn expand(&self, entry: &FileEntry) -> Result<Vec<(PathBuf, bool)>, Error> {
        let path = filesystem::resolve(&self.root, Path::new(entry.get_path()));
        if entry.is_pattern() == true {
            let pattern = filesystem::into_std_str(&path);
            let matches = glob::glob(&pattern)
                .map_err(|e| Error::InvalidFile(path.clone(), LastError(e.to_string())))?;
            let mut files: Vec<(PathBuf, bool)> = matches
                .filter_map(|m| m.ok())
                .filter(|m| m.is_file())
                .map(|m| (m, false))
                .collect();
            if files.is_empty() == true {
                tracing::warn!("pattern {:?} in module {} matched no files", pattern, self.name);
            }
            files.sort();
            Ok(files)
        } else if path.is_dir() == true {
            Ok(filesystem::gather_files(&path)
                .into_iter()
                .filter(|p| p.file_name().map(|n| n != crate::core::manifest::MANIFEST_FILE).unwrap_or(true))
                .map(|p| (p, false))
                .collect())
        } else if path.is_file() == true {
            Ok(vec![(path, true)])
        } else {
            Err(Error::InvalidFile(path, LastError("file does not exist".to_string())))
        }
    }
}

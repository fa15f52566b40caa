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
use std::time::Duration;

use crate::core::fetch::ExtFetch;
use crate::core::frontend::{Frontend, Iverilog};
use crate::core::manifest::FromFile;
use crate::error::{AnyError, Fault};

pub const CONFIG_FILE: &str = "hdlweave.toml";

/// Settings for the collaborators the engine runs.
#[derive(Deserialize, Serialize, Debug, PartialEq, Clone, Default)]
#[serde(deny_unknown_fields)]
pub struct Config {
    fetch: Option<FetchConfig>,
    extract: Option<ExtractConfig>,
    solve: Option<SolveConfig>,
}

#[derive(Deserialize, Serialize, Debug, PartialEq, Clone, Default)]
#[serde(deny_unknown_fields)]
pub struct FetchConfig {
    git: Option<String>,
    svn: Option<String>,
    /// Seconds before a fetch command is killed.
    timeout: Option<u64>,
}

impl FetchConfig {
    fn merge(&mut self, rhs: Option<Self>) {
        if let Some(rhs) = rhs {
            if self.git.is_none() == true {
                self.git = rhs.git;
            }
            if self.svn.is_none() == true {
                self.svn = rhs.svn;
            }
            if self.timeout.is_none() == true {
                self.timeout = rhs.timeout;
            }
        }
    }
}

#[derive(Deserialize, Serialize, Debug, PartialEq, Clone, Copy, Default)]
#[serde(rename_all = "lowercase")]
pub enum FrontendKind {
    /// Scan Verilog files for `include directives.
    #[default]
    Includes,
    /// Ask Icarus Verilog for the files each Verilog file uses.
    Iverilog,
}

#[derive(Deserialize, Serialize, Debug, PartialEq, Clone, Default)]
#[serde(deny_unknown_fields)]
pub struct ExtractConfig {
    frontend: Option<FrontendKind>,
    iverilog: Option<String>,
    timeout: Option<u64>,
    defines: Option<Vec<String>>,
}

impl ExtractConfig {
    fn merge(&mut self, rhs: Option<Self>) {
        if let Some(rhs) = rhs {
            if self.frontend.is_none() == true {
                self.frontend = rhs.frontend;
            }
            if self.iverilog.is_none() == true {
                self.iverilog = rhs.iverilog;
            }
            if self.timeout.is_none() == true {
                self.timeout = rhs.timeout;
            }
            match &mut self.defines {
                Some(v) => v.append(&mut rhs.defines.unwrap_or_default()),
                None => self.defines = rhs.defines,
            }
        }
    }
}

#[derive(Deserialize, Serialize, Debug, PartialEq, Clone, Default)]
#[serde(deny_unknown_fields)]
pub struct SolveConfig {
    strict: Option<bool>,
}

impl FromStr for Config {
    type Err = toml::de::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        toml::from_str(s)
    }
}

impl FromFile for Config {
    fn from_file(path: &Path) -> Result<Self, Fault> {
        // verify the path exists
        if path.is_file() == false {
            return Err(AnyError(format!(
                "failed to locate configuration file \"{}\"",
                path.display()
            )))?;
        }
        let contents = std::fs::read_to_string(&path)?;
        match Self::from_str(&contents) {
            Ok(r) => Ok(r),
            Err(e) => Err(AnyError(format!(
                "failed to parse \"{}\" file: {}",
                path.display(),
                e
            )))?,
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fills every value left unset in `self` with the one from `rhs`.
    ///
    /// Lists are combined, with the entries of `self` first.
    pub fn append(&mut self, rhs: Self) {
        match &mut self.fetch {
            Some(v) => v.merge(rhs.fetch),
            None => self.fetch = rhs.fetch,
        }
        match &mut self.extract {
            Some(v) => v.merge(rhs.extract),
            None => self.extract = rhs.extract,
        }
        match &mut self.solve {
            Some(v) => {
                if v.strict.is_none() == true {
                    v.strict = rhs.solve.and_then(|s| s.strict);
                }
            }
            None => self.solve = rhs.solve,
        }
    }

    pub fn is_strict(&self) -> bool {
        self.solve.as_ref().and_then(|s| s.strict).unwrap_or(false)
    }

    pub fn get_frontend_kind(&self) -> FrontendKind {
        self.extract
            .as_ref()
            .and_then(|e| e.frontend)
            .unwrap_or_default()
    }

    fn seconds(t: Option<u64>) -> Option<Duration> {
        t.map(Duration::from_secs)
    }

    /// Creates the fetcher described by the `[fetch]` table.
    pub fn fetcher(&self) -> ExtFetch {
        let fetch = self.fetch.clone().unwrap_or_default();
        ExtFetch::new()
            .git(fetch.git)
            .svn(fetch.svn)
            .timeout(Self::seconds(fetch.timeout))
    }

    /// Creates the external front-end described by the `[extract]` table, if
    /// one is selected. Each of `module_dirs` is searched for library modules.
    pub fn frontend(&self, module_dirs: &[PathBuf]) -> Option<Box<dyn Frontend>> {
        let extract = self.extract.clone().unwrap_or_default();
        match self.get_frontend_kind() {
            FrontendKind::Includes => None,
            FrontendKind::Iverilog => {
                let mut fe = Iverilog::new()
                    .command(extract.iverilog)
                    .timeout(Self::seconds(extract.timeout));
                for d in extract.defines.unwrap_or_default() {
                    fe = fe.define(&d);
                }
                for dir in module_dirs {
                    fe = fe.module_dir(dir.clone());
                }
                Some(Box::new(fe))
            }
        }
    }
}

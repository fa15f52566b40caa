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

use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use crate::error::{Error, Fault};
use crate::util::filesystem;
use crate::util::process;

/// An external compiler front-end used as a dependency oracle.
pub trait Frontend: Send + Sync {
    /// Lists the files `file` depends on.
    fn extract_deps(&self, file: &Path, include_dirs: &[PathBuf], options: &str) -> Result<Vec<PathBuf>, Fault>;
}

/// Runs Icarus Verilog with a dependency output file.
#[derive(Debug, PartialEq)]
pub struct Iverilog {
    command: String,
    defines: Vec<String>,
    module_dirs: Vec<PathBuf>,
    timeout: Option<Duration>,
}

impl Iverilog {
    /// Creates an adapter calling `iverilog` found on the path.
    pub fn new() -> Self {
        Self {
            command: String::from("iverilog"),
            defines: vec![String::from("SIMULATE")],
            module_dirs: Vec::new(),
            timeout: None,
        }
    }

    /// Sets the command for calling iverilog.
    ///
    /// When `s` is `None` the command stays `iverilog`.
    pub fn command(mut self, s: Option<String>) -> Self {
        if let Some(s) = s {
            self.command = s;
        }
        self
    }

    pub fn define(mut self, macro_def: &str) -> Self {
        self.defines.push(macro_def.to_string());
        self
    }

    /// Adds a directory searched for both library modules and includes.
    pub fn module_dir(mut self, dir: PathBuf) -> Self {
        if self.module_dirs.contains(&dir) == false {
            self.module_dirs.push(dir);
        }
        self
    }

    pub fn timeout(mut self, t: Option<Duration>) -> Self {
        self.timeout = t;
        self
    }

    fn is_header(file: &Path) -> bool {
        file.extension()
            .map(|e| e.eq_ignore_ascii_case("vh"))
            .unwrap_or(false)
    }

    /// Reads the paths listed in a dependency output file.
    ///
    /// Relative entries are resolved against `base`; `file` itself and repeated
    /// entries are dropped.
    fn read_depfile(text: &str, base: &Path, file: &Path) -> Vec<PathBuf> {
        let mut deps: Vec<PathBuf> = Vec::new();
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() == true {
                continue;
            }
            let dep = filesystem::resolve(base, Path::new(line));
            if dep != file && deps.contains(&dep) == false {
                deps.push(dep);
            }
        }
        deps
    }
}

impl Frontend for Iverilog {
    fn extract_deps(&self, file: &Path, include_dirs: &[PathBuf], options: &str) -> Result<Vec<PathBuf>, Fault> {
        // headers are only ever pulled in by other files
        if Self::is_header(file) == true {
            return Ok(Vec::new());
        }
        let base = file.parent().unwrap_or(Path::new(".")).to_path_buf();
        let scratch = tempfile::tempdir()?;
        let depfile = scratch.path().join("deps.list");

        let mut cmd = Command::new(&self.command);
        for d in &self.defines {
            cmd.arg(format!("-D{}", d));
        }
        cmd.args(["-Wno-timescale", "-t", "null"]);
        cmd.arg(format!("-M{}", filesystem::into_std_str(&depfile)));
        let mut searched: Vec<&PathBuf> = Vec::new();
        for dir in include_dirs.iter().chain(self.module_dirs.iter()) {
            if searched.contains(&dir) == true {
                continue;
            }
            searched.push(dir);
            cmd.arg(format!("-y{}", filesystem::into_std_str(dir)));
            cmd.arg(format!("-I{}", filesystem::into_std_str(dir)));
        }
        cmd.args(options.split_whitespace());
        cmd.arg(file);
        cmd.current_dir(&base);

        tracing::debug!("running {}", process::describe(&cmd));
        let done = process::execute(&mut cmd, self.timeout)?;
        // an exit code of 1 still reports every dependency it could find
        match done.get_code() {
            0 | 1 => (),
            code => {
                if done.get_stderr().is_empty() == false {
                    tracing::debug!("{}", done.get_stderr());
                }
                return Err(Error::ChildProcErrorCode(process::describe(&cmd), code))?;
            }
        }
        let text = match depfile.exists() {
            true => std::fs::read_to_string(&depfile)?,
            false => String::new(),
        };
        Ok(Self::read_depfile(&text, &base, file))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn depfile_paths() {
        let text = "defs.vh\n\n/ip/uart/uart.v\n./defs.vh\n/proj/rtl/top.v\n";
        let deps = Iverilog::read_depfile(text, Path::new("/proj/rtl"), Path::new("/proj/rtl/top.v"));
        assert_eq!(
            deps,
            vec![PathBuf::from("/proj/rtl/defs.vh"), PathBuf::from("/ip/uart/uart.v")]
        );
    }

    #[test]
    fn headers_are_skipped() {
        let fe = Iverilog::new().command(Some(String::from("does-not-exist")));
        assert_eq!(
            fe.extract_deps(Path::new("/proj/defs.VH"), &[], "").unwrap(),
            Vec::<PathBuf>::new()
        );
    }

    #[cfg(unix)]
    fn fake_iverilog(dir: &Path, exit: i32) -> String {
        use std::os::unix::fs::PermissionsExt;
        let script = dir.join(format!("fake-iverilog-{}", exit));
        std::fs::write(
            &script,
            format!(
                "#!/bin/sh\nfor a in \"$@\"; do case \"$a\" in -M*) dep=\"${{a#-M}}\";; esac; done\nprintf 'defs.vh\\nlib/uart.v\\n' > \"$dep\"\nexit {}\n",
                exit
            ),
        )
        .unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
        script.to_string_lossy().to_string()
    }

    #[cfg(unix)]
    #[test]
    fn runs_frontend() {
        let dir = tempfile::tempdir().unwrap();
        let top = dir.path().join("top.v");
        std::fs::write(&top, "").unwrap();

        let fe = Iverilog::new().command(Some(fake_iverilog(dir.path(), 1)));
        let deps = fe.extract_deps(&top, &[dir.path().to_path_buf()], "-g2012").unwrap();
        assert_eq!(deps, vec![dir.path().join("defs.vh"), dir.path().join("lib/uart.v")]);

        let fe = Iverilog::new().command(Some(fake_iverilog(dir.path(), 2)));
        let err = fe.extract_deps(&top, &[], "").unwrap_err();
        assert_eq!(err.to_string().contains("exited with error code: 2"), true);
    }
}

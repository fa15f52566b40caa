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

use std::path::Path;
use std::process::Command;
use std::time::Duration;

use crate::core::module::FetchMethod;
use crate::error::{AnyError, Fault};
use crate::util::process;

/// Places the contents of a module at a destination directory.
pub trait Fetch: Send + Sync {
    /// Fetches `url` at `revision` into `dest`, or brings an existing copy at
    /// `dest` up to date.
    fn fetch(&self, url: &str, revision: Option<&str>, method: FetchMethod, dest: &Path) -> Result<(), Fault>;
}

/// Fetches modules by calling the version-control programs through
/// subprocesses.
#[derive(Debug, PartialEq)]
pub struct ExtFetch {
    git: String,
    svn: String,
    timeout: Option<Duration>,
}

impl ExtFetch {
    /// Creates a fetcher that assumes `git` and `svn` are on the path.
    pub fn new() -> Self {
        Self {
            git: String::from("git"),
            svn: String::from("svn"),
            timeout: None,
        }
    }

    /// Sets the command for calling git.
    ///
    /// When `s` is `None` the command stays `git`.
    pub fn git(mut self, s: Option<String>) -> Self {
        if let Some(s) = s {
            self.git = s;
        }
        self
    }

    /// Sets the command for calling svn.
    pub fn svn(mut self, s: Option<String>) -> Self {
        if let Some(s) = s {
            self.svn = s;
        }
        self
    }

    /// Sets the limit for each command before it is killed.
    pub fn timeout(mut self, t: Option<Duration>) -> Self {
        self.timeout = t;
        self
    }

    /// Clones a repository `url` to `dest`.
    ///
    /// The clone happens inside a temporary directory and the tree is copied
    /// over afterward, so a failed clone never leaves a partial `dest` behind.
    fn git_clone(&self, url: &str, revision: Option<&str>, dest: &Path) -> Result<(), Fault> {
        let tmp_path = tempfile::tempdir()?;
        let work = tmp_path.path().join("checkout");

        let mut cmd = Command::new(&self.git);
        cmd.args(["clone", "--quiet", url]).arg(&work);
        process::execute_ok(&mut cmd, self.timeout)?;
        if let Some(rev) = revision {
            let mut cmd = Command::new(&self.git);
            cmd.args(["checkout", "--quiet", rev]).current_dir(&work);
            process::execute_ok(&mut cmd, self.timeout)?;
        }
        // create the directories
        std::fs::create_dir_all(&dest)?;

        let mut from_paths = Vec::new();
        for entry in std::fs::read_dir(&work)? {
            from_paths.push(entry?.path());
        }
        // copy rather than rename because of windows issues
        let options = fs_extra::dir::CopyOptions::new();
        fs_extra::copy_items(&from_paths, &dest, &options)?;
        Ok(())
    }

    /// Updates an existing git checkout at `dest`.
    ///
    /// Runs the commands: `git fetch` and `git checkout <revision>` (or
    /// `git pull` when unpinned).
    fn git_update(&self, revision: Option<&str>, dest: &Path) -> Result<(), Fault> {
        let mut cmd = Command::new(&self.git);
        cmd.args(["fetch", "--quiet", "--tags"]).current_dir(&dest);
        process::execute_ok(&mut cmd, self.timeout)?;

        let mut cmd = Command::new(&self.git);
        match revision {
            Some(rev) => cmd.args(["checkout", "--quiet", rev]),
            None => cmd.args(["pull", "--quiet"]),
        };
        cmd.current_dir(&dest);
        process::execute_ok(&mut cmd, self.timeout)?;
        Ok(())
    }

    fn svn_checkout(&self, url: &str, revision: Option<&str>, dest: &Path) -> Result<(), Fault> {
        let mut cmd = Command::new(&self.svn);
        match dest.join(".svn").exists() {
            true => {
                cmd.args(["update", "--quiet"]);
                if let Some(rev) = revision {
                    cmd.args(["-r", rev]);
                }
                cmd.current_dir(&dest);
            }
            false => {
                if let Some(parent) = dest.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                cmd.args(["checkout", "--quiet"]);
                if let Some(rev) = revision {
                    cmd.args(["-r", rev]);
                }
                cmd.arg(url).arg(&dest);
            }
        }
        process::execute_ok(&mut cmd, self.timeout)?;
        Ok(())
    }
}

impl Fetch for ExtFetch {
    fn fetch(&self, url: &str, revision: Option<&str>, method: FetchMethod, dest: &Path) -> Result<(), Fault> {
        match method {
            FetchMethod::Local => match dest.is_dir() {
                true => Ok(()),
                false => Err(AnyError(format!("local module directory {:?} does not exist", dest)))?,
            },
            FetchMethod::Git => {
                tracing::info!("fetching {} into {:?}", url, dest);
                match dest.join(".git").exists() {
                    true => self.git_update(revision, dest),
                    false => self.git_clone(url, revision, dest),
                }
            }
            FetchMethod::Svn => {
                tracing::info!("fetching {} into {:?}", url, dest);
                self.svn_checkout(url, revision, dest)
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn local_checks_directory() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = ExtFetch::new();
        assert_eq!(
            fetcher.fetch("ignored", None, FetchMethod::Local, dir.path()).is_ok(),
            true
        );
        assert_eq!(
            fetcher
                .fetch("ignored", None, FetchMethod::Local, &dir.path().join("gone"))
                .is_err(),
            true
        );
    }

    #[test]
    fn missing_program_fails() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = ExtFetch::new()
            .git(Some(String::from("hdlweave-no-such-git")))
            .svn(Some(String::from("hdlweave-no-such-svn")));
        let dest = dir.path().join("uart");
        assert_eq!(
            fetcher.fetch("https://example.com/uart.git", None, FetchMethod::Git, &dest).is_err(),
            true
        );
        assert_eq!(dest.exists(), false);
        assert_eq!(
            fetcher.fetch("svn://example.com/uart", Some("12"), FetchMethod::Svn, &dest).is_err(),
            true
        );
    }

    #[cfg(unix)]
    #[test]
    fn clones_local_repository() {
        let has_git = Command::new("git").arg("--version").output().is_ok();
        if has_git == false {
            return;
        }
        let origin = tempfile::tempdir().unwrap();
        let run = |args: &[&str]| {
            let status = Command::new("git")
                .args(args)
                .current_dir(origin.path())
                .env("GIT_AUTHOR_NAME", "t")
                .env("GIT_AUTHOR_EMAIL", "t@t")
                .env("GIT_COMMITTER_NAME", "t")
                .env("GIT_COMMITTER_EMAIL", "t@t")
                .status()
                .unwrap();
            assert_eq!(status.success(), true);
        };
        run(&["init", "--quiet"]);
        std::fs::write(origin.path().join("uart.vhd"), "entity uart is end;\n").unwrap();
        run(&["add", "."]);
        run(&["-c", "commit.gpgsign=false", "commit", "--quiet", "-m", "init"]);
        run(&["tag", "v1"]);

        let store = tempfile::tempdir().unwrap();
        let dest = store.path().join("modules/uart@v1");
        let url = origin.path().to_string_lossy().to_string();
        ExtFetch::new()
            .fetch(&url, Some("v1"), FetchMethod::Git, &dest)
            .unwrap();
        assert_eq!(dest.join("uart.vhd").is_file(), true);
        assert_eq!(dest.join(".git").is_dir(), true);
        // fetching again updates the existing checkout
        ExtFetch::new()
            .fetch(&url, Some("v1"), FetchMethod::Git, &dest)
            .unwrap();
    }
}

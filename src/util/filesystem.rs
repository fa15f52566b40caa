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

use ignore::WalkBuilder;
use std::path::{Component, Path, PathBuf};

/// Removes `.` and `..` components from `path` without touching the file system.
///
/// Leading `..` components of a relative path are kept.
pub fn normalize(path: &Path) -> PathBuf {
    let mut result: Vec<Component> = Vec::new();
    for comp in path.components() {
        match comp {
            Component::CurDir => (),
            Component::ParentDir => match result.last() {
                Some(Component::Normal(_)) => {
                    result.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => (),
                _ => result.push(comp),
            },
            _ => result.push(comp),
        }
    }
    result.iter().map(|c| c.as_os_str()).collect()
}

/// Resolves `path` against `root` when it is relative, then normalizes it.
pub fn resolve(root: &Path, path: &Path) -> PathBuf {
    match path.is_absolute() {
        true => normalize(path),
        false => normalize(&root.join(path)),
    }
}

/// Expresses `path` relative to `base` using forward slashes.
///
/// A path outside of `base` climbs out with `..` components. Falls back to the
/// full path when the two share no common root.
pub fn relative_to(path: &Path, base: &Path) -> String {
    let path_comps: Vec<Component> = path.components().collect();
    let base_comps: Vec<Component> = base.components().collect();
    let shared = path_comps
        .iter()
        .zip(base_comps.iter())
        .take_while(|(a, b)| a == b)
        .count();
    if shared == 0 && base_comps.is_empty() == false {
        return into_std_str(path);
    }
    let mut rel = PathBuf::new();
    for comp in &base_comps[shared..] {
        match comp {
            Component::Normal(_) => rel.push(".."),
            // cannot walk back out of a `..` or a root
            _ => return into_std_str(path),
        }
    }
    for comp in &path_comps[shared..] {
        rel.push(comp.as_os_str());
    }
    into_std_str(&rel)
}

/// Converts a path into a string with forward slashes as separators.
pub fn into_std_str(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

/// Collects every file below `dir`, honoring any `.gitignore` rules found along
/// the way.
///
/// The list is sorted so repeated walks over the same tree agree.
pub fn gather_files(dir: &Path) -> Vec<PathBuf> {
    let walker = WalkBuilder::new(dir)
        .hidden(false)
        .require_git(false)
        .filter_entry(|e| e.file_name() != ".git" && e.file_name() != ".svn")
        .build();
    let mut files: Vec<PathBuf> = walker
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().map(|t| t.is_file()).unwrap_or(false))
        .map(|e| e.into_path())
        .collect();
    files.sort();
    files
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn normalize_lexically() {
        assert_eq!(
            normalize(Path::new("/a/b/./c/../d.vhd")),
            PathBuf::from("/a/b/d.vhd")
        );
        assert_eq!(normalize(Path::new("../x/./y")), PathBuf::from("../x/y"));
        assert_eq!(normalize(Path::new("/..")), PathBuf::from("/"));
    }

    #[test]
    fn resolve_relative_and_absolute() {
        let root = Path::new("/proj");
        assert_eq!(
            resolve(root, Path::new("rtl/../rtl/a.vhd")),
            PathBuf::from("/proj/rtl/a.vhd")
        );
        assert_eq!(resolve(root, Path::new("/other/b.v")), PathBuf::from("/other/b.v"));
    }

    #[test]
    fn relative_display() {
        let base = Path::new("/proj");
        assert_eq!(relative_to(Path::new("/proj/rtl/a.vhd"), base), "rtl/a.vhd");
        assert_eq!(relative_to(Path::new("/elsewhere/a.vhd"), base), "../elsewhere/a.vhd");
        assert_eq!(
            relative_to(Path::new("/ws/ip_b/b.vhd"), Path::new("/ws/proj/sim")),
            "../../ip_b/b.vhd"
        );
        assert_eq!(relative_to(Path::new("/proj"), base), "");
        assert_eq!(relative_to(Path::new("/proj/a.vhd"), Path::new("")), "/proj/a.vhd");
        assert_eq!(relative_to(Path::new("rtl/a.vhd"), base), "rtl/a.vhd");
    }

    #[test]
    fn gather_files_sorted() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("sub/b.vhd"), "").unwrap();
        std::fs::write(dir.path().join("a.vhd"), "").unwrap();
        std::fs::write(dir.path().join(".gitignore"), "ignored.v\n").unwrap();
        std::fs::write(dir.path().join("ignored.v"), "").unwrap();

        let files = gather_files(dir.path());
        assert_eq!(
            files,
            vec![
                dir.path().join(".gitignore"),
                dir.path().join("a.vhd"),
                dir.path().join("sub/b.vhd"),
            ]
        );
    }
}

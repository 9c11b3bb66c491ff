//! One pass over the watched tree.

use crate::error::{Result, WatchError};
use crate::types::{EntryInfo, WatchConfig};
use ignore::WalkBuilder;
use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};

/// Entries keyed by absolute path; iteration is in path order.
pub(crate) type EntryMap = BTreeMap<PathBuf, EntryInfo>;

/// Walk `root` and record every entry, the root included.
///
/// Entries that disappear mid-walk are skipped; the next scan reports them.
pub(crate) fn scan_root(root: &Path, config: &WatchConfig) -> Result<EntryMap> {
    let mut builder = WalkBuilder::new(root);
    builder
        .standard_filters(false)
        .hidden(!config.include_hidden)
        .follow_links(false)
        .max_depth(if config.recursive { None } else { Some(1) });

    if !config.exclude_dir_names.is_empty() {
        let excluded = config.exclude_dir_names.clone();
        builder.filter_entry(move |entry| {
            let is_dir = entry.file_type().map_or(false, |ft| ft.is_dir());
            !(entry.depth() > 0
                && is_dir
                && excluded
                    .iter()
                    .any(|name| entry.file_name().to_str() == Some(name.as_str())))
        });
    }

    let mut entries = EntryMap::new();
    for result in builder.build() {
        let entry = match result {
            Ok(entry) => entry,
            Err(err) if is_vanished(&err) => continue,
            Err(err) => {
                return Err(WatchError::Scan {
                    path: root.to_path_buf(),
                    message: err.to_string(),
                })
            }
        };

        let metadata = match entry.metadata() {
            Ok(metadata) => metadata,
            Err(err) if is_vanished(&err) => continue,
            Err(err) => {
                return Err(WatchError::Scan {
                    path: entry.path().to_path_buf(),
                    message: err.to_string(),
                })
            }
        };

        entries.insert(entry.into_path(), EntryInfo::from_metadata(&metadata));
    }

    Ok(entries)
}

fn is_vanished(err: &ignore::Error) -> bool {
    err.io_error()
        .map_or(false, |io_err| io_err.kind() == io::ErrorKind::NotFound)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn relative(root: &Path, entries: &EntryMap) -> Vec<String> {
        entries
            .keys()
            .map(|p| {
                p.strip_prefix(root)
                    .unwrap()
                    .to_string_lossy()
                    .replace('\\', "/")
            })
            .collect()
    }

    fn tree() -> TempDir {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("sub/deep")).unwrap();
        fs::create_dir_all(temp.path().join(".hidden")).unwrap();
        fs::create_dir_all(temp.path().join("target")).unwrap();
        fs::write(temp.path().join("a.txt"), "a").unwrap();
        fs::write(temp.path().join(".env"), "secret").unwrap();
        fs::write(temp.path().join("sub/b.txt"), "b").unwrap();
        fs::write(temp.path().join("sub/deep/c.txt"), "c").unwrap();
        fs::write(temp.path().join(".hidden/d.txt"), "d").unwrap();
        fs::write(temp.path().join("target/e.o"), "e").unwrap();
        temp
    }

    #[test]
    fn test_scan_includes_root_in_path_order() {
        let temp = tree();
        let entries = scan_root(temp.path(), &WatchConfig::default()).unwrap();
        assert_eq!(
            relative(temp.path(), &entries),
            vec![
                "",
                "a.txt",
                "sub",
                "sub/b.txt",
                "sub/deep",
                "sub/deep/c.txt",
                "target",
                "target/e.o"
            ]
        );
        assert!(entries[temp.path()].is_dir);
    }

    #[test]
    fn test_scan_include_hidden() {
        let temp = tree();
        let config = WatchConfig {
            include_hidden: true,
            ..Default::default()
        };
        let names = relative(temp.path(), &scan_root(temp.path(), &config).unwrap());
        assert!(names.contains(&".env".to_string()));
        assert!(names.contains(&".hidden/d.txt".to_string()));
    }

    #[test]
    fn test_scan_non_recursive() {
        let temp = tree();
        let config = WatchConfig {
            recursive: false,
            ..Default::default()
        };
        let names = relative(temp.path(), &scan_root(temp.path(), &config).unwrap());
        assert_eq!(names, vec!["", "a.txt", "sub", "target"]);
    }

    #[test]
    fn test_scan_excludes_named_dirs() {
        let temp = tree();
        let config = WatchConfig {
            exclude_dir_names: vec!["target".to_string(), "deep".to_string()],
            ..Default::default()
        };
        let names = relative(temp.path(), &scan_root(temp.path(), &config).unwrap());
        assert_eq!(names, vec!["", "a.txt", "sub", "sub/b.txt"]);
    }
}

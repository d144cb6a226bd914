//! Function name to file mapping consulted when a name is otherwise undefined

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Default)]
pub struct AutoloadMap {
    entries: BTreeMap<String, PathBuf>,
}

/// Result of resolving the file named in an `autoload` call
#[derive(Debug, PartialEq, Eq)]
pub struct ResolvedFile {
    pub path: PathBuf,
    /// Relative name that could not be found next to the calling file
    pub relative: bool,
}

/// Resolve `name` against the directory of the calling file
///
/// Absolute names are used as is. A relative name is looked up next to
/// `caller_file`; when that fails it is kept unchanged and flagged.
pub fn resolve_file(name: &str, caller_file: Option<&Path>) -> ResolvedFile {
    let path = Path::new(name);
    if path.is_absolute() {
        return ResolvedFile {
            path: path.to_path_buf(),
            relative: false,
        };
    }
    if let Some(dir) = caller_file.and_then(Path::parent) {
        let candidate = dir.join(name);
        if candidate.exists() {
            return ResolvedFile {
                path: candidate,
                relative: false,
            };
        }
    }
    ResolvedFile {
        path: path.to_path_buf(),
        relative: true,
    }
}

impl AutoloadMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, function: &str, file: PathBuf) {
        tracing::debug!(function, file = %file.display(), "autoload registered");
        self.entries.insert(function.to_string(), file);
    }

    pub fn remove(&mut self, function: &str) -> Option<PathBuf> {
        self.entries.remove(function)
    }

    pub fn lookup(&self, function: &str) -> Option<&Path> {
        self.entries.get(function).map(PathBuf::as_path)
    }

    /// Functions registered for `file`
    pub fn reverse_lookup(&self, file: &Path) -> Vec<String> {
        self.entries
            .iter()
            .filter(|(_, f)| f.as_path() == file)
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// (function, file) pairs sorted by function name
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Path)> {
        self.entries.iter().map(|(n, f)| (n.as_str(), f.as_path()))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absolute_file_kept() {
        let r = resolve_file("/opt/lib/f.m", None);
        assert_eq!(r.path, PathBuf::from("/opt/lib/f.m"));
        assert!(!r.relative);
    }

    #[test]
    fn test_relative_without_caller_is_flagged() {
        let r = resolve_file("f.m", None);
        assert!(r.relative);
        assert_eq!(r.path, PathBuf::from("f.m"));
    }

    #[test]
    fn test_relative_resolved_next_to_caller() {
        let dir = std::env::temp_dir().join(format!("numscript-autoload-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("g.m"), "function g\nend\n").unwrap();
        let r = resolve_file("g.m", Some(&dir.join("caller.m")));
        assert_eq!(r.path, dir.join("g.m"));
        assert!(!r.relative);
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_map_operations() {
        let mut map = AutoloadMap::new();
        map.add("b", PathBuf::from("/x/b.m"));
        map.add("a", PathBuf::from("/x/b.m"));
        assert_eq!(map.reverse_lookup(Path::new("/x/b.m")), vec!["a", "b"]);
        assert_eq!(map.iter().next().unwrap().0, "a");
        assert!(map.remove("a").is_some());
        assert!(map.lookup("a").is_none());
    }
}

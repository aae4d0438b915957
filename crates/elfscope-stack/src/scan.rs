//! Side-file discovery.

use std::path::{Path, PathBuf};

use tracing::debug;
use walkdir::WalkDir;

use crate::Result;

const SU_EXTENSION: &str = ".su";
const CGRAPH_EXTENSION: &str = ".cgraph";
const ZEPHYR_DIR: &str = "zephyr";

/// Side files found under one root, each list sorted by path.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StackFiles {
    pub su: Vec<PathBuf>,
    pub cgraph: Vec<PathBuf>,
}

/// Directory to search for side files of the ELF file at `elf_path`.
///
/// This is the file's parent directory. Zephyr builds keep side files in
/// both `CMakeFiles` and `zephyr` below the build directory, so when the
/// parent path contains `zephyr` the search starts at the prefix before its
/// last occurrence.
#[must_use]
pub fn side_file_root(elf_path: &Path) -> PathBuf {
    let parent = elf_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let text = parent.to_string_lossy();
    match text.rfind(ZEPHYR_DIR) {
        Some(0) => PathBuf::from("."),
        Some(idx) => {
            let root = PathBuf::from(&text[..idx]);
            debug!(root = %root.display(), "zephyr build, searching from build directory");
            root
        }
        None => parent.to_path_buf(),
    }
}

/// Recursively collect `.su` and `.cgraph` files under `root`.
pub fn find_stack_files(root: &Path) -> Result<StackFiles> {
    let mut files = StackFiles::default();
    for entry in WalkDir::new(root).follow_links(true) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy();
        if name.ends_with(SU_EXTENSION) {
            files.su.push(entry.into_path());
        } else if name.ends_with(CGRAPH_EXTENSION) {
            files.cgraph.push(entry.into_path());
        }
    }
    files.su.sort();
    files.cgraph.sort();
    Ok(files)
}

/// The call-graph file belonging to a stack-usage file.
///
/// GCC names both after the object file: `main.c.su` pairs with
/// `main.c.<pass>.cgraph`, so the match is on the `.su` path minus `su`.
#[must_use]
pub fn paired_graph<'a>(su_path: &Path, graphs: &'a [PathBuf]) -> Option<&'a PathBuf> {
    let su = su_path.to_string_lossy();
    let prefix = su.strip_suffix("su").unwrap_or(&su);
    graphs.iter().find(|g| {
        let g = g.to_string_lossy();
        g.starts_with(prefix) && g.ends_with(CGRAPH_EXTENSION)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_side_file_root_plain() {
        assert_eq!(
            side_file_root(Path::new("/work/build/app.elf")),
            PathBuf::from("/work/build")
        );
        assert_eq!(side_file_root(Path::new("app.elf")), PathBuf::from("."));
    }

    #[test]
    fn test_side_file_root_zephyr() {
        assert_eq!(
            side_file_root(Path::new("/work/build/zephyr/zephyr.elf")),
            PathBuf::from("/work/build/")
        );
        assert_eq!(
            side_file_root(Path::new("/zephyrproject/app/build/zephyr/zephyr.elf")),
            PathBuf::from("/zephyrproject/app/build/")
        );
    }

    #[test]
    fn test_paired_graph_by_prefix() {
        let graphs = vec![
            PathBuf::from("/b/main.c.000i.cgraph"),
            PathBuf::from("/b/util.c.000i.cgraph"),
            PathBuf::from("/b/util.c.000i.other"),
        ];
        assert_eq!(
            paired_graph(Path::new("/b/util.c.su"), &graphs),
            Some(&graphs[1])
        );
        assert_eq!(paired_graph(Path::new("/b/missing.c.su"), &graphs), None);
    }

    #[test]
    fn test_find_stack_files_recurses_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        let sub = dir.path().join("CMakeFiles").join("app.dir");
        std::fs::create_dir_all(&sub).unwrap();
        std::fs::write(sub.join("b.c.su"), "").unwrap();
        std::fs::write(dir.path().join("a.c.su"), "").unwrap();
        std::fs::write(sub.join("b.c.000i.cgraph"), "").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "").unwrap();

        let files = find_stack_files(dir.path()).unwrap();
        assert_eq!(
            files.su,
            vec![dir.path().join("a.c.su"), sub.join("b.c.su")]
        );
        assert_eq!(files.cgraph, vec![sub.join("b.c.000i.cgraph")]);
    }

    #[test]
    fn test_missing_root_is_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(find_stack_files(&dir.path().join("absent")).is_err());
    }
}

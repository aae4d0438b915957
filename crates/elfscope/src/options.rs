//! Load options.

use std::path::PathBuf;

/// Options controlling what `initialize` loads besides the ELF file itself.
#[derive(Clone, Debug)]
pub struct LoadOptions {
    /// Build the queryable tables.
    pub database: bool,
    /// Scan for `.su`/`.cgraph` side files.
    pub side_files: bool,
    /// Directory to scan instead of the one derived from the ELF path.
    pub side_file_root: Option<PathBuf>,
    /// Fail `initialize` when the side-file directory cannot be walked.
    pub strict_side_files: bool,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            database: true,
            side_files: true,
            side_file_root: None,
            strict_side_files: false,
        }
    }
}

impl LoadOptions {
    /// Create default options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set whether the query tables are built.
    #[must_use]
    pub const fn with_database(mut self, enabled: bool) -> Self {
        self.database = enabled;
        self
    }

    /// Set whether side files are scanned.
    #[must_use]
    pub const fn with_side_files(mut self, enabled: bool) -> Self {
        self.side_files = enabled;
        self
    }

    /// Scan `root` for side files.
    #[must_use]
    pub fn with_side_file_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.side_file_root = Some(root.into());
        self
    }

    /// Treat an unreadable side-file directory as an error.
    #[must_use]
    pub const fn with_strict_side_files(mut self, strict: bool) -> Self {
        self.strict_side_files = strict;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder() {
        let options = LoadOptions::new()
            .with_database(false)
            .with_side_file_root("/build")
            .with_strict_side_files(true);
        assert!(!options.database);
        assert!(options.side_files);
        assert_eq!(options.side_file_root, Some(PathBuf::from("/build")));
        assert!(options.strict_side_files);
    }
}

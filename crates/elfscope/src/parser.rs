//! Loading entry point.

use std::fs;
use std::path::{Path, PathBuf};

use elfscope_elf::{ElfError, ElfFile};
use elfscope_stack::{StackData, load_stack_data, side_file_root};
use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::model::DataModel;
use crate::options::LoadOptions;
use crate::store::{Database, Rows, SYMBOLS_TABLE, Store, Value};

/// Outcome of [`ElfParser::initialize`] for a file that could be read.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DataResult {
    Ok,
    /// The bytes are not a decodable ELF file.
    Invalid(ElfError),
}

impl DataResult {
    #[must_use]
    pub const fn is_ok(&self) -> bool {
        matches!(self, Self::Ok)
    }
}

/// Loads one ELF file with its side files and serves queries over it.
#[derive(Debug)]
pub struct ElfParser {
    path: PathBuf,
    options: LoadOptions,
    model: Option<DataModel>,
    store: Option<Store>,
}

impl ElfParser {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            options: LoadOptions::default(),
            model: None,
            store: None,
        }
    }

    #[must_use]
    pub fn with_options(mut self, options: LoadOptions) -> Self {
        self.options = options;
        self
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read and decode the file, then load side files and build the tables.
    ///
    /// Only a failed read of the ELF file itself is an error. Undecodable
    /// content yields [`DataResult::Invalid`]; missing side files are logged.
    pub fn initialize(&mut self) -> Result<DataResult> {
        let data = fs::read(&self.path).map_err(|source| Error::Io {
            path: self.path.clone(),
            source,
        })?;
        info!(path = %self.path.display(), bytes = data.len(), "loading ELF file");
        self.initialize_from_bytes(&data)
    }

    /// Like [`initialize`](Self::initialize), for bytes the caller has read.
    /// Side files are still looked up relative to the parser's path.
    pub fn initialize_from_bytes(&mut self, data: &[u8]) -> Result<DataResult> {
        self.model = None;
        self.store = None;

        let elf = match ElfFile::parse(data) {
            Ok(elf) => elf,
            Err(err) => {
                warn!(path = %self.path.display(), error = %err, "not a valid ELF file");
                return Ok(DataResult::Invalid(err));
            }
        };

        let stack = self.load_side_files()?;
        let model = DataModel::build(elf, stack.as_ref());
        if self.options.database {
            self.store = Some(Store::new(Database::from_model(&model)));
        }
        self.model = Some(model);
        Ok(DataResult::Ok)
    }

    fn load_side_files(&self) -> Result<Option<StackData>> {
        if !self.options.side_files {
            return Ok(None);
        }
        let root = self
            .options
            .side_file_root
            .clone()
            .unwrap_or_else(|| side_file_root(&self.path));
        match load_stack_data(&root) {
            Ok(data) => {
                info!(
                    root = %root.display(),
                    su_files = data.usage.len(),
                    cgraph_files = data.cgraph_files,
                    "side files loaded"
                );
                Ok(Some(data))
            }
            Err(err) if self.options.strict_side_files => Err(err.into()),
            Err(err) => {
                warn!(root = %root.display(), error = %err, "side files unavailable");
                Ok(None)
            }
        }
    }

    /// The loaded model, once `initialize` has succeeded.
    #[must_use]
    pub const fn model(&self) -> Option<&DataModel> {
        self.model.as_ref()
    }

    #[must_use]
    pub const fn store(&self) -> Option<&Store> {
        self.store.as_ref()
    }

    fn loaded_store(&self) -> Result<&Store> {
        self.store.as_ref().ok_or(Error::NotLoaded)
    }

    /// Run a read-only query with positional parameters.
    pub fn query(&self, sql: &str, params: &[Value]) -> Result<Rows> {
        Ok(self.loaded_store()?.query(sql, params)?)
    }

    /// Drop one table to free its rows. The read-only guard is lifted only
    /// for this statement.
    pub fn drop_table(&self, name: &str) -> Result<()> {
        let sql = format!("DROP TABLE \"{}\"", name.replace('"', "\"\""));
        self.loaded_store()?
            .with_mutation_allowed(|session| session.execute(&sql, &[]))?;
        Ok(())
    }

    pub fn drop_symbols_table(&self) -> Result<()> {
        self.drop_table(SYMBOLS_TABLE)
    }
}

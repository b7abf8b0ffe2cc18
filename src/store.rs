//! The scenario store.
//!
//! A scenario is a directory of CSV tables: one file per set and parameter
//! table, a `DefaultParams` table mapping parameter names to default values,
//! and a `results` subdirectory holding one table per persisted variable
//! family. All writes go through a temporary file followed by an atomic
//! rename, so a reader never observes a half-written table.
use anyhow::{Context, Result};
use log::info;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

use crate::error::EngineError;
use crate::params::PARAM_DEFS;

/// The set tables every scenario store carries.
///
/// Order matters: it is the order in which sets are loaded and reported.
pub const SET_TABLES: &[&str] = &[
    "REGION",
    "TECHNOLOGY",
    "FUEL",
    "EMISSION",
    "MODE_OF_OPERATION",
    "YEAR",
    "TIMESLICE",
    "STORAGE",
    "TRANSMISSIONLINE",
];

/// The table mapping parameter names to their default values
pub const DEFAULT_PARAMS_TABLE: &str = "DefaultParams";

/// The subdirectory holding result tables
const RESULTS_DIR: &str = "results";

/// A row of the `DefaultParams` table
#[derive(Debug, Serialize, serde::Deserialize)]
pub struct DefaultParamRow {
    /// Parameter name
    pub param: String,
    /// Default value
    pub val: f64,
}

/// A handle to a scenario store directory.
#[derive(Debug)]
pub struct Store {
    root: PathBuf,
}

impl Store {
    /// Open an existing scenario store.
    ///
    /// Fails with a data error if the directory or any required table file is
    /// absent. Empty tables (headers only) are legal.
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Store> {
        let root = root.as_ref().to_path_buf();
        if !root.is_dir() {
            return Err(EngineError::data(format!(
                "scenario store not found at {}",
                root.display()
            ))
            .into());
        }

        let store = Store { root };
        for table in SET_TABLES
            .iter()
            .chain(PARAM_DEFS.iter().map(|def| &def.name))
            .chain([&DEFAULT_PARAMS_TABLE])
        {
            if !store.has_table(table) {
                return Err(EngineError::data(format!(
                    "required table '{table}' is absent from the scenario store"
                ))
                .into());
            }
        }

        Ok(store)
    }

    /// Create a new, empty scenario store at `root`.
    ///
    /// Every set and parameter table is created with headers only, and
    /// `DefaultParams` is populated with the built-in defaults.
    pub fn create<P: AsRef<Path>>(root: P) -> Result<Store> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)
            .with_context(|| format!("Could not create {}", root.display()))?;
        fs::create_dir_all(root.join(RESULTS_DIR))?;
        let store = Store { root };

        for table in SET_TABLES {
            let columns = set_table_columns(table);
            store.write_header_only(table, columns)?;
        }

        for def in PARAM_DEFS {
            let mut columns: Vec<&str> = def.dims.to_vec();
            columns.push("val");
            store.write_header_only(def.name, &columns)?;
        }

        let defaults: Vec<DefaultParamRow> = PARAM_DEFS
            .iter()
            .filter_map(|def| {
                def.default.map(|val| DefaultParamRow {
                    param: def.name.to_string(),
                    val,
                })
            })
            .collect();
        store.write_rows(DEFAULT_PARAMS_TABLE, &defaults)?;

        info!("Created new scenario store at {}", store.root.display());
        Ok(store)
    }

    /// The root directory of the store
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The file path for the given table
    pub fn table_path(&self, table: &str) -> PathBuf {
        self.root.join(format!("{table}.csv"))
    }

    /// The file path for the given result table
    pub fn result_table_path(&self, table: &str) -> PathBuf {
        self.root.join(RESULTS_DIR).join(format!("{table}.csv"))
    }

    /// Whether the given table exists in the store
    pub fn has_table(&self, table: &str) -> bool {
        self.table_path(table).is_file()
    }

    /// The column names of the given table, from its header record
    pub fn table_columns(&self, table: &str) -> Result<Vec<String>> {
        let path = self.table_path(table);
        let mut reader = csv::Reader::from_path(&path)
            .map_err(|err| EngineError::StoreIO(format!("{}: {err}", path.display())))?;
        let headers = reader
            .headers()
            .map_err(|err| EngineError::StoreIO(err.to_string()))?;
        Ok(headers.iter().map(str::to_string).collect())
    }

    /// Read every row of a table into a `Vec` of typed rows.
    ///
    /// A missing table is a data error; an empty table yields an empty `Vec`.
    pub fn read_rows<T: DeserializeOwned>(&self, table: &str) -> Result<Vec<T>> {
        let path = self.table_path(table);
        if !path.is_file() {
            return Err(EngineError::data(format!(
                "required table '{table}' is absent from the scenario store"
            ))
            .into());
        }

        let mut reader = csv::Reader::from_path(&path)
            .map_err(|err| EngineError::StoreIO(format!("{}: {err}", path.display())))?;
        let mut rows = Vec::new();
        for result in reader.deserialize() {
            let row: T = result.map_err(|err| {
                EngineError::data(format!("malformed row in table '{table}': {err}"))
            })?;
            rows.push(row);
        }

        Ok(rows)
    }

    /// Replace the contents of a table with the given typed rows.
    pub fn write_rows<T: Serialize>(&self, table: &str, rows: &[T]) -> Result<()> {
        self.write_atomically(&self.table_path(table), |file| {
            let mut writer = csv::Writer::from_writer(file);
            for row in rows {
                writer.serialize(row)?;
            }
            writer.flush()?;
            Ok(())
        })
    }

    /// Replace the contents of a result table with raw string records.
    ///
    /// Used by the result writer, where the column set varies per variable
    /// family and is not known at compile time.
    pub fn write_result_table(
        &self,
        table: &str,
        columns: &[&str],
        records: &[Vec<String>],
    ) -> Result<()> {
        fs::create_dir_all(self.root.join(RESULTS_DIR))
            .map_err(|err| EngineError::StoreIO(err.to_string()))?;
        self.write_atomically(&self.result_table_path(table), |file| {
            let mut writer = csv::Writer::from_writer(file);
            writer.write_record(columns)?;
            for record in records {
                writer.write_record(record)?;
            }
            writer.flush()?;
            Ok(())
        })
    }

    /// Insert or update a row of `DefaultParams`.
    pub fn set_param_default(&self, param: &str, val: f64) -> Result<()> {
        if !PARAM_DEFS.iter().any(|def| def.name == param) {
            return Err(EngineError::data(format!("unknown parameter '{param}'")).into());
        }

        let mut rows: Vec<DefaultParamRow> = self.read_rows(DEFAULT_PARAMS_TABLE)?;
        match rows.iter_mut().find(|row| row.param == param) {
            Some(row) => row.val = val,
            None => rows.push(DefaultParamRow {
                param: param.to_string(),
                val,
            }),
        }
        self.write_rows(DEFAULT_PARAMS_TABLE, &rows)
    }

    /// Read the `DefaultParams` table into (name, value) pairs.
    pub fn read_param_defaults(&self) -> Result<Vec<(String, f64)>> {
        let rows: Vec<DefaultParamRow> = self.read_rows(DEFAULT_PARAMS_TABLE)?;
        Ok(rows.into_iter().map(|row| (row.param, row.val)).collect())
    }

    /// Delete every result table from a prior run.
    pub fn drop_result_tables(&self) -> Result<()> {
        let results_dir = self.root.join(RESULTS_DIR);
        if !results_dir.is_dir() {
            return Ok(());
        }

        for entry in fs::read_dir(&results_dir).map_err(|err| EngineError::StoreIO(err.to_string()))?
        {
            let path = entry.map_err(|err| EngineError::StoreIO(err.to_string()))?.path();
            if path.extension().is_some_and(|ext| ext == "csv") {
                fs::remove_file(&path).map_err(|err| EngineError::StoreIO(err.to_string()))?;
            }
        }

        info!("Dropped result tables from {}", results_dir.display());
        Ok(())
    }

    /// Rewrite every table file and remove stray temporary files.
    ///
    /// Reclaims space after large deletes and cleans up after interrupted
    /// writes.
    pub fn compact(&self) -> Result<()> {
        for dir in [self.root.clone(), self.root.join(RESULTS_DIR)] {
            if !dir.is_dir() {
                continue;
            }
            for entry in fs::read_dir(&dir).map_err(|err| EngineError::StoreIO(err.to_string()))? {
                let path = entry.map_err(|err| EngineError::StoreIO(err.to_string()))?.path();
                if !path.is_file() {
                    continue;
                }
                match path.extension().and_then(|ext| ext.to_str()) {
                    Some("csv") => rewrite_csv(&path)?,
                    // Leftovers from interrupted atomic writes
                    Some("tmp") => {
                        fs::remove_file(&path).map_err(|err| EngineError::StoreIO(err.to_string()))?;
                    }
                    _ => {}
                }
            }
        }

        info!("Compacted scenario store at {}", self.root.display());
        Ok(())
    }

    /// Write a header-only table file
    fn write_header_only(&self, table: &str, columns: &[&str]) -> Result<()> {
        self.write_atomically(&self.table_path(table), |file| {
            let mut writer = csv::Writer::from_writer(file);
            writer.write_record(columns)?;
            writer.flush()?;
            Ok(())
        })
    }

    /// Write a file via a temporary sibling and an atomic rename
    fn write_atomically<F>(&self, path: &Path, write: F) -> Result<()>
    where
        F: FnOnce(&mut NamedTempFile) -> Result<()>,
    {
        let dir = path.parent().expect("table path has a parent");
        let mut tmp = NamedTempFile::with_suffix_in(".tmp", dir)
            .map_err(|err| EngineError::StoreIO(err.to_string()))?;
        write(&mut tmp)?;
        tmp.as_file_mut()
            .flush()
            .map_err(|err| EngineError::StoreIO(err.to_string()))?;
        tmp.persist(path)
            .map_err(|err| EngineError::StoreIO(err.to_string()))?;
        Ok(())
    }
}

/// The columns for the given set table
fn set_table_columns(table: &str) -> &'static [&'static str] {
    match table {
        "TRANSMISSIONLINE" => &["val", "region1", "region2", "fuel", "description"],
        _ => &["val", "description"],
    }
}

/// Rewrite a CSV file record-by-record, dropping any slack
fn rewrite_csv(path: &Path) -> Result<()> {
    let mut reader = csv::Reader::from_path(path)
        .map_err(|err| EngineError::StoreIO(format!("{}: {err}", path.display())))?;
    let headers = reader
        .headers()
        .map_err(|err| EngineError::StoreIO(err.to_string()))?
        .clone();
    let records: Vec<csv::StringRecord> = reader
        .records()
        .collect::<std::result::Result<_, _>>()
        .map_err(|err| EngineError::StoreIO(err.to_string()))?;

    let dir = path.parent().expect("table path has a parent");
    let tmp = NamedTempFile::with_suffix_in(".tmp", dir)
        .map_err(|err| EngineError::StoreIO(err.to_string()))?;
    {
        let mut writer = csv::Writer::from_writer(tmp.as_file());
        writer
            .write_record(&headers)
            .map_err(|err| EngineError::StoreIO(err.to_string()))?;
        for record in &records {
            writer
                .write_record(record)
                .map_err(|err| EngineError::StoreIO(err.to_string()))?;
        }
        writer
            .flush()
            .map_err(|err| EngineError::StoreIO(err.to_string()))?;
    }
    tmp.persist(path)
        .map_err(|err| EngineError::StoreIO(err.to_string()))?;
    Ok(())
}

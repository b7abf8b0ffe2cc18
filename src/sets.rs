//! Loading of scenario sets.
//!
//! Sets are ordered collections of string identifiers, loaded once per solve
//! and immutable during a model build. Declared order is preserved, except
//! where ordering is semantically numeric: YEAR sorts ascending by value.
//! TIMESLICE keeps its declared order, which is the chronological within-year
//! order used when chaining storage levels.
use anyhow::Result;
use indexmap::{IndexMap, IndexSet};
use serde::Deserialize;
use std::hash::Hash;

use crate::error::EngineError;
use crate::id::{
    EmissionID, FuelID, LineID, ModeID, RegionID, StorageID, TechnologyID, TimesliceID, Year,
};
use crate::store::Store;

/// A row of an ordinary set table
#[derive(Debug, Deserialize)]
struct SetRow {
    val: String,
    #[serde(default)]
    #[allow(dead_code)]
    description: Option<String>,
}

/// A row of the TRANSMISSIONLINE set table
#[derive(Debug, Deserialize)]
struct LineRow {
    val: String,
    region1: String,
    region2: String,
    fuel: String,
    #[serde(default)]
    #[allow(dead_code)]
    description: Option<String>,
}

/// A transmission line between two regions, carrying one fuel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line {
    /// Sending-end region for positive flow
    pub region1: RegionID,
    /// Receiving-end region for positive flow
    pub region2: RegionID,
    /// The fuel the line carries
    pub fuel: FuelID,
}

/// All loaded sets for one scenario.
#[derive(Debug, Default)]
pub struct Sets {
    /// Regions, in declared order
    pub regions: IndexSet<RegionID>,
    /// Technologies, in declared order
    pub technologies: IndexSet<TechnologyID>,
    /// Fuels, in declared order
    pub fuels: IndexSet<FuelID>,
    /// Emissions, in declared order
    pub emissions: IndexSet<EmissionID>,
    /// Modes of operation, in declared order
    pub modes: IndexSet<ModeID>,
    /// Modeled years, sorted ascending
    pub years: Vec<Year>,
    /// Timeslices, in declared (chronological) order
    pub timeslices: IndexSet<TimesliceID>,
    /// Storage facilities, in declared order
    pub storages: IndexSet<StorageID>,
    /// Transmission lines with their endpoints, in declared order
    pub lines: IndexMap<LineID, Line>,
}

impl Sets {
    /// Load every set table from the store.
    pub fn load(store: &Store) -> Result<Sets> {
        let regions = load_id_set(store, "REGION")?;
        let fuels = load_id_set(store, "FUEL")?;

        let mut sets = Sets {
            technologies: load_id_set(store, "TECHNOLOGY")?,
            emissions: load_id_set(store, "EMISSION")?,
            modes: load_id_set(store, "MODE_OF_OPERATION")?,
            years: load_years(store)?,
            timeslices: load_id_set(store, "TIMESLICE")?,
            storages: load_id_set(store, "STORAGE")?,
            lines: IndexMap::new(),
            regions,
            fuels,
        };
        sets.lines = load_lines(store, &sets.regions, &sets.fuels)?;

        Ok(sets)
    }

    /// The first modeled year, if any years are declared
    pub fn first_year(&self) -> Option<Year> {
        self.years.first().copied()
    }
}

/// Load one set table into an ordered set of IDs, rejecting duplicates
fn load_id_set<ID>(store: &Store, table: &str) -> Result<IndexSet<ID>>
where
    ID: From<String> + Eq + Hash,
{
    let rows: Vec<SetRow> = store.read_rows(table)?;
    let mut ids = IndexSet::with_capacity(rows.len());
    for row in rows {
        if !ids.insert(ID::from(row.val.clone())) {
            return Err(EngineError::data(format!(
                "duplicate member '{}' in set {table}",
                row.val
            ))
            .into());
        }
    }

    Ok(ids)
}

/// Load the YEAR set, sorted ascending by numeric value
fn load_years(store: &Store) -> Result<Vec<Year>> {
    let rows: Vec<SetRow> = store.read_rows("YEAR")?;
    let mut years = Vec::with_capacity(rows.len());
    for row in rows {
        let year: Year = row.val.trim().parse().map_err(|_| {
            EngineError::data(format!("YEAR member '{}' is not an integer", row.val))
        })?;
        if years.contains(&year) {
            return Err(EngineError::data(format!("duplicate member '{year}' in set YEAR")).into());
        }
        years.push(year);
    }
    years.sort_unstable();

    Ok(years)
}

/// Load the TRANSMISSIONLINE set, validating endpoints and fuel
fn load_lines(
    store: &Store,
    regions: &IndexSet<RegionID>,
    fuels: &IndexSet<FuelID>,
) -> Result<IndexMap<LineID, Line>> {
    let rows: Vec<LineRow> = store.read_rows("TRANSMISSIONLINE")?;
    let mut lines = IndexMap::with_capacity(rows.len());
    for row in rows {
        for region in [&row.region1, &row.region2] {
            if !regions.contains(region.as_str()) {
                return Err(EngineError::data(format!(
                    "line '{}' references unknown region '{region}'",
                    row.val
                ))
                .into());
            }
        }
        if row.region1 == row.region2 {
            return Err(EngineError::data(format!(
                "line '{}' connects region '{}' to itself",
                row.val, row.region1
            ))
            .into());
        }
        if !fuels.contains(row.fuel.as_str()) {
            return Err(EngineError::data(format!(
                "line '{}' references unknown fuel '{}'",
                row.val, row.fuel
            ))
            .into());
        }

        let line = Line {
            region1: row.region1.into(),
            region2: row.region2.into(),
            fuel: row.fuel.into(),
        };
        if lines.insert(LineID::from(row.val.clone()), line).is_some() {
            return Err(EngineError::data(format!(
                "duplicate member '{}' in set TRANSMISSIONLINE",
                row.val
            ))
            .into());
        }
    }

    Ok(lines)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[derive(serde::Serialize)]
    struct RawSetRow {
        val: String,
        description: String,
    }

    fn set_rows(vals: &[&str]) -> Vec<RawSetRow> {
        vals.iter()
            .map(|val| RawSetRow {
                val: (*val).to_string(),
                description: String::new(),
            })
            .collect()
    }

    fn scratch_store() -> (tempfile::TempDir, Store) {
        let dir = tempdir().unwrap();
        let store = Store::create(dir.path().join("scenario")).unwrap();
        (dir, store)
    }

    #[test]
    fn test_empty_sets_are_legal() {
        let (_dir, store) = scratch_store();
        let sets = Sets::load(&store).unwrap();
        assert!(sets.storages.is_empty());
        assert!(sets.years.is_empty());
    }

    #[test]
    fn test_years_sort_numerically() {
        let (_dir, store) = scratch_store();
        store
            .write_rows("YEAR", &set_rows(&["2029", "2020", "2025"]))
            .unwrap();
        let sets = Sets::load(&store).unwrap();
        assert_eq!(sets.years, [2020, 2025, 2029]);
        assert_eq!(sets.first_year(), Some(2020));
    }

    #[test]
    fn test_duplicate_set_member_is_data_error() {
        let (_dir, store) = scratch_store();
        store
            .write_rows("REGION", &set_rows(&["GBR", "GBR"]))
            .unwrap();
        let err = Sets::load(&store).unwrap_err();
        assert!(err.to_string().contains("duplicate member"));
    }

    #[test]
    fn test_non_numeric_year_is_data_error() {
        let (_dir, store) = scratch_store();
        store.write_rows("YEAR", &set_rows(&["twenty20"])).unwrap();
        assert!(Sets::load(&store).is_err());
    }

    #[test]
    fn test_line_endpoints_are_validated() {
        let (_dir, store) = scratch_store();
        store
            .write_rows("REGION", &set_rows(&["GBR", "FRA"]))
            .unwrap();
        store.write_rows("FUEL", &set_rows(&["electricity"])).unwrap();

        #[derive(serde::Serialize)]
        struct RawLineRow {
            val: String,
            region1: String,
            region2: String,
            fuel: String,
            description: String,
        }
        store
            .write_rows(
                "TRANSMISSIONLINE",
                &[RawLineRow {
                    val: "ifa".into(),
                    region1: "GBR".into(),
                    region2: "DEU".into(), // not a declared region
                    fuel: "electricity".into(),
                    description: String::new(),
                }],
            )
            .unwrap();

        let err = Sets::load(&store).unwrap_err();
        assert!(err.to_string().contains("unknown region"));
    }
}

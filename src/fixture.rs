//! A shared scenario fixture for unit tests.
//!
//! The scenario is small but exercises every corner of the formulation: two
//! regions joined by a transmission line, a fuel chain (gas into
//! electricity), a free renewable with capacity factors, a battery behind an
//! inverter technology, and a CO2 emission.
use rstest::fixture;
use std::fs;
use tempfile::{tempdir, TempDir};

use crate::store::Store;

/// Overwrite a table with raw CSV rows, keeping its created header
pub fn write_table(store: &Store, table: &str, rows: &[String]) {
    let header = store.table_columns(table).unwrap().join(",");
    let mut text = header + "\n";
    for row in rows {
        text.push_str(row);
        text.push('\n');
    }
    fs::write(store.table_path(table), text).unwrap();
}

/// Overwrite a set table with the given member IDs
pub fn write_set(store: &Store, table: &str, vals: &[&str]) {
    let rows: Vec<String> = vals.iter().map(|val| format!("{val},")).collect();
    write_table(store, table, &rows);
}

/// Remove the storage set and every row referencing a storage
pub fn clear_storage(store: &Store) {
    write_set(store, "STORAGE", &[]);
    for table in [
        "TechnologyToStorage",
        "TechnologyFromStorage",
        "StorageLevelStart",
        "CapitalCostStorage",
        "ResidualStorageCapacity",
        "OperationalLifeStorage",
        "StorageNetZeroYear",
    ] {
        write_table(store, table, &[]);
    }
}

/// The fixture's modeled years
pub const YEARS: [i32; 3] = [2020, 2021, 2022];

/// A freshly created store populated with the standard test scenario.
///
/// Headline facts tests rely on:
/// - regions "north" and "south", years 2020-2022, timeslices "day"/"night"
///   with YearSplit 0.5/0.5
/// - annual electricity demand of 10 in "north" and 4 in "south", no profile
/// - "gas_supply" produces gas at variable cost 1; "gas_turbine" burns 2 gas
///   per electricity at capital cost 100 and emits 0.5 co2 per activity
/// - "wind_farm" (north only) is free to run but capacity-factor limited
/// - "battery_inverter" charges/discharges the "battery" storage (north only)
/// - line "north_south" carries electricity, capacity 5, efficiency 0.95,
///   available in every year
#[fixture]
pub fn scratch_scenario() -> (TempDir, Store) {
    let dir = tempdir().unwrap();
    let store = Store::create(dir.path().join("scenario")).unwrap();

    write_set(&store, "REGION", &["north", "south"]);
    write_set(
        &store,
        "TECHNOLOGY",
        &["gas_supply", "gas_turbine", "wind_farm", "battery_inverter"],
    );
    write_set(&store, "FUEL", &["electricity", "gas"]);
    write_set(&store, "EMISSION", &["co2"]);
    write_set(&store, "MODE_OF_OPERATION", &["standard", "charge", "discharge"]);
    write_set(&store, "TIMESLICE", &["day", "night"]);
    write_set(&store, "STORAGE", &["battery"]);
    write_table(
        &store,
        "YEAR",
        &YEARS.map(|y| format!("{y},")).to_vec(),
    );
    write_table(
        &store,
        "TRANSMISSIONLINE",
        &["north_south,north,south,electricity,".to_string()],
    );

    let mut year_split = Vec::new();
    let mut demand = Vec::new();
    let mut oar = Vec::new();
    let mut iar = Vec::new();
    let mut var_cost = Vec::new();
    let mut capital = Vec::new();
    let mut fixed = Vec::new();
    let mut ear = Vec::new();
    let mut capacity_factor = Vec::new();
    let mut capital_storage = Vec::new();
    let mut available = Vec::new();
    for y in YEARS {
        for ts in ["day", "night"] {
            year_split.push(format!("{ts},{y},0.5"));
        }
        demand.push(format!("north,electricity,{y},10"));
        demand.push(format!("south,electricity,{y},4"));
        for r in ["north", "south"] {
            oar.push(format!("{r},gas_supply,gas,standard,{y},1"));
            oar.push(format!("{r},gas_turbine,electricity,standard,{y},1"));
            iar.push(format!("{r},gas_turbine,gas,standard,{y},2"));
            var_cost.push(format!("{r},gas_supply,standard,{y},1"));
            var_cost.push(format!("{r},gas_turbine,standard,{y},2"));
            capital.push(format!("{r},gas_turbine,{y},100"));
            fixed.push(format!("{r},gas_turbine,{y},1"));
            ear.push(format!("{r},gas_turbine,co2,standard,{y},0.5"));
        }
        oar.push(format!("north,wind_farm,electricity,standard,{y},1"));
        capital.push(format!("north,wind_farm,{y},120"));
        capacity_factor.push(format!("north,wind_farm,day,{y},0.4"));
        capacity_factor.push(format!("north,wind_farm,night,{y},0.2"));
        iar.push(format!("north,battery_inverter,electricity,charge,{y},1"));
        oar.push(format!("north,battery_inverter,electricity,discharge,{y},1"));
        capital.push(format!("north,battery_inverter,{y},50"));
        capital_storage.push(format!("north,battery,{y},30"));
        available.push(format!("north_south,{y},1"));
    }
    write_table(&store, "YearSplit", &year_split);
    write_table(&store, "SpecifiedAnnualDemand", &demand);
    write_table(&store, "OutputActivityRatio", &oar);
    write_table(&store, "InputActivityRatio", &iar);
    write_table(&store, "VariableCost", &var_cost);
    write_table(&store, "CapitalCost", &capital);
    write_table(&store, "FixedCost", &fixed);
    write_table(&store, "EmissionActivityRatio", &ear);
    write_table(&store, "CapacityFactor", &capacity_factor);
    write_table(&store, "CapitalCostStorage", &capital_storage);
    write_table(&store, "TransmissionAvailable", &available);

    write_table(
        &store,
        "OperationalLife",
        &["north,gas_turbine,10".into(),
            "south,gas_turbine,10".into(),
            "north,wind_farm,20".into(),
            "north,battery_inverter,10".into()],
    );
    write_table(
        &store,
        "TechnologyToStorage",
        &["north,battery_inverter,battery,charge,1".into()],
    );
    write_table(
        &store,
        "TechnologyFromStorage",
        &["north,battery_inverter,battery,discharge,1".into()],
    );
    write_table(&store, "OperationalLifeStorage", &["north,battery,10".into()]);
    write_table(&store, "TransmissionCapacity", &["north_south,5".into()]);
    write_table(&store, "TransmissionEfficiency", &["north_south,0.95".into()]);
    write_table(
        &store,
        "DiscountRate",
        &["north,0.05".into(), "south,0.05".into()],
    );

    (dir, store)
}

/// The fixture scenario loaded into memory
#[fixture]
pub fn loaded_scenario(
    scratch_scenario: (TempDir, Store),
) -> (TempDir, Store, crate::scenario::ScenarioData) {
    let (dir, store) = scratch_scenario;
    let data = crate::scenario::ScenarioData::load(&store).unwrap();
    (dir, store, data)
}

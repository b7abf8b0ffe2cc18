//! Loading a complete scenario from the store.
//!
//! The loader materializes typed sets and sparse parameter maps from the
//! relational tables, applying `DefaultParams` fallbacks and validating
//! cross-references. It is strictly read-only on the store.
use anyhow::Result;
use indexmap::IndexSet;
use serde::Deserialize;
use std::collections::HashMap;
use std::hash::Hash;

use crate::error::EngineError;
use crate::id::{
    EmissionID, FuelID, LineID, ModeID, RegionID, StorageID, TechnologyID, TimesliceID, Year,
};
use crate::params::{param_def, OptParam, Param, Params};
use crate::sets::Sets;
use crate::store::Store;

/// Tolerance used when validating that fractional shares sum to one
const SHARE_SUM_TOLERANCE: f64 = 1e-4;

/// A fully loaded scenario: sets plus parameters.
#[derive(Debug)]
pub struct ScenarioData {
    /// The scenario's sets
    pub sets: Sets,
    /// The scenario's parameters
    pub params: Params,
}

impl ScenarioData {
    /// Load every set and parameter table from the store.
    pub fn load(store: &Store) -> Result<ScenarioData> {
        let sets = Sets::load(store)?;
        let defaults: HashMap<String, f64> = store.read_param_defaults()?.into_iter().collect();
        let loader = Loader {
            store,
            sets: &sets,
            defaults,
        };
        let params = loader.load_params()?;

        let data = ScenarioData { sets, params };
        data.validate()?;
        Ok(data)
    }

    /// Demand for a fuel in a region and timeslice.
    ///
    /// The annual demand is shaped by `SpecifiedDemandProfile` where one is
    /// given for the (region, fuel, year), else by `YearSplit`.
    pub fn demand(&self, r: &RegionID, f: &FuelID, l: &TimesliceID, y: Year) -> f64 {
        let annual = self
            .params
            .specified_annual_demand
            .get(&(r.clone(), f.clone(), y));
        if annual == 0.0 {
            return 0.0;
        }

        let profile_sum: f64 = self
            .sets
            .timeslices
            .iter()
            .map(|ts| {
                self.params
                    .specified_demand_profile
                    .get(&(r.clone(), f.clone(), ts.clone(), y))
            })
            .sum();
        let share = if profile_sum > 0.0 {
            self.params
                .specified_demand_profile
                .get(&(r.clone(), f.clone(), l.clone(), y))
        } else {
            self.params.year_split.get(&(l.clone(), y))
        };

        annual * share
    }

    /// The interest rate applied to a technology's capital costs: the
    /// per-entity override where one exists, else the region's discount rate.
    pub fn interest_rate_technology(&self, r: &RegionID, t: &TechnologyID, y: Year) -> f64 {
        self.params
            .interest_rate_technology
            .get_opt(&(r.clone(), t.clone(), y))
            .unwrap_or_else(|| self.params.discount_rate.get(r))
    }

    /// The interest rate applied to a storage's capital costs
    pub fn interest_rate_storage(&self, r: &RegionID, s: &StorageID, y: Year) -> f64 {
        self.params
            .interest_rate_storage
            .get_opt(&(r.clone(), s.clone(), y))
            .unwrap_or_else(|| self.params.discount_rate.get(r))
    }

    /// Residual capacity including builds carried forward from earlier phases
    pub fn effective_residual_capacity(&self, r: &RegionID, t: &TechnologyID, y: Year) -> f64 {
        let life = self.params.operational_life.get(&(r.clone(), t.clone())) as Year;
        self.params.residual_capacity.get(&(r.clone(), t.clone(), y))
            + self.params.carry_forward.surviving_capacity(r, t, y, life)
    }

    /// Residual storage capacity including carried-forward builds
    pub fn effective_residual_storage_capacity(
        &self,
        r: &RegionID,
        s: &StorageID,
        y: Year,
    ) -> f64 {
        let life = self
            .params
            .operational_life_storage
            .get(&(r.clone(), s.clone())) as Year;
        self.params
            .residual_storage_capacity
            .get(&(r.clone(), s.clone(), y))
            + self
                .params
                .carry_forward
                .surviving_storage_capacity(r, s, y, life)
    }

    /// Opening charge level for a storage at the start of the current phase
    pub fn storage_opening_level(&self, r: &RegionID, s: &StorageID) -> f64 {
        self.params
            .carry_forward
            .storage_level
            .get(&(r.clone(), s.clone()))
            .copied()
            .unwrap_or_else(|| self.params.storage_level_start.get(&(r.clone(), s.clone())))
    }

    /// Whether a line already exists in `year` (declared, or committed by an
    /// earlier phase)
    pub fn line_exists(&self, line: &LineID, year: Year) -> bool {
        self.params
            .transmission_available
            .has_nonzero(&(line.clone(), year))
            || self
                .params
                .carry_forward
                .line_built
                .get(line)
                .is_some_and(|built| *built <= year)
    }

    /// Whether a build decision variable exists for a line in `year`
    pub fn line_buildable(&self, line: &LineID, year: Year) -> bool {
        self.params
            .transmission_buildable
            .has_nonzero(&(line.clone(), year))
            && !self.line_exists(line, year)
    }

    /// Check cross-parameter consistency rules that only hold for the loaded
    /// scenario as a whole.
    fn validate(&self) -> Result<()> {
        // YearSplit must partition each modeled year
        if !self.sets.timeslices.is_empty() {
            for year in &self.sets.years {
                let total: f64 = self
                    .sets
                    .timeslices
                    .iter()
                    .map(|ts| self.params.year_split.get(&(ts.clone(), *year)))
                    .sum();
                if (total - 1.0).abs() > SHARE_SUM_TOLERANCE {
                    return Err(EngineError::data(format!(
                        "YearSplit sums to {total} for year {year}; expected 1"
                    ))
                    .into());
                }
            }
        }

        // Nonzero demand profiles must sum to one over the year
        for ((r, f, y), annual) in self.params.specified_annual_demand.iter() {
            if annual == 0.0 {
                continue;
            }
            let profile_sum: f64 = self
                .sets
                .timeslices
                .iter()
                .map(|ts| {
                    self.params
                        .specified_demand_profile
                        .get(&(r.clone(), f.clone(), ts.clone(), *y))
                })
                .sum();
            if profile_sum > 0.0 && (profile_sum - 1.0).abs() > SHARE_SUM_TOLERANCE {
                return Err(EngineError::data(format!(
                    "SpecifiedDemandProfile for ({r}, {f}, {y}) sums to {profile_sum}; expected 1"
                ))
                .into());
            }
        }

        Ok(())
    }
}

/// Internal loader state: the store handle, loaded sets and resolved defaults
struct Loader<'a> {
    store: &'a Store,
    sets: &'a Sets,
    defaults: HashMap<String, f64>,
}

// Row types, one per index signature. Serde field names match table columns.

#[derive(Deserialize)]
struct RowLy {
    timeslice: String,
    year: Year,
    val: f64,
}

#[derive(Deserialize)]
struct RowR {
    region: String,
    val: f64,
}

#[derive(Deserialize)]
struct RowRt {
    region: String,
    technology: String,
    val: f64,
}

#[derive(Deserialize)]
struct RowRty {
    region: String,
    technology: String,
    year: Year,
    val: f64,
}

#[derive(Deserialize)]
struct RowRtly {
    region: String,
    technology: String,
    timeslice: String,
    year: Year,
    val: f64,
}

#[derive(Deserialize)]
struct RowRtmy {
    region: String,
    technology: String,
    mode: String,
    year: Year,
    val: f64,
}

#[derive(Deserialize)]
struct RowRtfmy {
    region: String,
    technology: String,
    fuel: String,
    mode: String,
    year: Year,
    val: f64,
}

#[derive(Deserialize)]
struct RowRtemy {
    region: String,
    technology: String,
    emission: String,
    mode: String,
    year: Year,
    val: f64,
}

#[derive(Deserialize)]
struct RowRey {
    region: String,
    emission: String,
    year: Year,
    val: f64,
}

#[derive(Deserialize)]
struct RowRfy {
    region: String,
    fuel: String,
    year: Year,
    val: f64,
}

#[derive(Deserialize)]
struct RowRfly {
    region: String,
    fuel: String,
    timeslice: String,
    year: Year,
    val: f64,
}

#[derive(Deserialize)]
struct RowRtsm {
    region: String,
    technology: String,
    storage: String,
    mode: String,
    val: f64,
}

#[derive(Deserialize)]
struct RowRs {
    region: String,
    storage: String,
    val: f64,
}

#[derive(Deserialize)]
struct RowRsy {
    region: String,
    storage: String,
    year: Year,
    val: f64,
}

#[derive(Deserialize)]
struct RowL {
    line: String,
    val: f64,
}

#[derive(Deserialize)]
struct RowLny {
    line: String,
    year: Year,
    val: f64,
}

#[derive(Deserialize)]
struct RowRrfy {
    region: String,
    region2: String,
    fuel: String,
    year: Year,
    val: f64,
}

impl Loader<'_> {
    fn load_params(&self) -> Result<Params> {
        Ok(Params {
            year_split: self.load("YearSplit", |row: RowLy, s| {
                Ok(((s.timeslice(&row.timeslice, "YearSplit")?, row.year), row.val))
            })?,
            specified_annual_demand: self.load("SpecifiedAnnualDemand", |row: RowRfy, s| {
                Ok((
                    (
                        s.region(&row.region, "SpecifiedAnnualDemand")?,
                        s.fuel(&row.fuel, "SpecifiedAnnualDemand")?,
                        row.year,
                    ),
                    row.val,
                ))
            })?,
            specified_demand_profile: self.load("SpecifiedDemandProfile", |row: RowRfly, s| {
                Ok((
                    (
                        s.region(&row.region, "SpecifiedDemandProfile")?,
                        s.fuel(&row.fuel, "SpecifiedDemandProfile")?,
                        s.timeslice(&row.timeslice, "SpecifiedDemandProfile")?,
                        row.year,
                    ),
                    row.val,
                ))
            })?,
            capacity_to_activity: self.load("CapacityToActivityUnit", |row: RowRt, s| {
                Ok((
                    (
                        s.region(&row.region, "CapacityToActivityUnit")?,
                        s.technology(&row.technology, "CapacityToActivityUnit")?,
                    ),
                    row.val,
                ))
            })?,
            capacity_factor: self.load("CapacityFactor", |row: RowRtly, s| {
                Ok((
                    (
                        s.region(&row.region, "CapacityFactor")?,
                        s.technology(&row.technology, "CapacityFactor")?,
                        s.timeslice(&row.timeslice, "CapacityFactor")?,
                        row.year,
                    ),
                    row.val,
                ))
            })?,
            availability_factor: self.load("AvailabilityFactor", |row: RowRty, s| {
                Ok((
                    (
                        s.region(&row.region, "AvailabilityFactor")?,
                        s.technology(&row.technology, "AvailabilityFactor")?,
                        row.year,
                    ),
                    row.val,
                ))
            })?,
            operational_life: self.load("OperationalLife", |row: RowRt, s| {
                Ok((
                    (
                        s.region(&row.region, "OperationalLife")?,
                        s.technology(&row.technology, "OperationalLife")?,
                    ),
                    row.val,
                ))
            })?,
            residual_capacity: self.load("ResidualCapacity", |row: RowRty, s| {
                Ok((
                    (
                        s.region(&row.region, "ResidualCapacity")?,
                        s.technology(&row.technology, "ResidualCapacity")?,
                        row.year,
                    ),
                    row.val,
                ))
            })?,
            input_activity_ratio: self.load("InputActivityRatio", |row: RowRtfmy, s| {
                Ok((
                    (
                        s.region(&row.region, "InputActivityRatio")?,
                        s.technology(&row.technology, "InputActivityRatio")?,
                        s.fuel(&row.fuel, "InputActivityRatio")?,
                        s.mode(&row.mode, "InputActivityRatio")?,
                        row.year,
                    ),
                    row.val,
                ))
            })?,
            output_activity_ratio: self.load("OutputActivityRatio", |row: RowRtfmy, s| {
                Ok((
                    (
                        s.region(&row.region, "OutputActivityRatio")?,
                        s.technology(&row.technology, "OutputActivityRatio")?,
                        s.fuel(&row.fuel, "OutputActivityRatio")?,
                        s.mode(&row.mode, "OutputActivityRatio")?,
                        row.year,
                    ),
                    row.val,
                ))
            })?,
            capital_cost: self.load("CapitalCost", |row: RowRty, s| {
                Ok((
                    (
                        s.region(&row.region, "CapitalCost")?,
                        s.technology(&row.technology, "CapitalCost")?,
                        row.year,
                    ),
                    row.val,
                ))
            })?,
            fixed_cost: self.load("FixedCost", |row: RowRty, s| {
                Ok((
                    (
                        s.region(&row.region, "FixedCost")?,
                        s.technology(&row.technology, "FixedCost")?,
                        row.year,
                    ),
                    row.val,
                ))
            })?,
            variable_cost: self.load("VariableCost", |row: RowRtmy, s| {
                Ok((
                    (
                        s.region(&row.region, "VariableCost")?,
                        s.technology(&row.technology, "VariableCost")?,
                        s.mode(&row.mode, "VariableCost")?,
                        row.year,
                    ),
                    row.val,
                ))
            })?,
            discount_rate: self.load("DiscountRate", |row: RowR, s| {
                Ok((s.region(&row.region, "DiscountRate")?, row.val))
            })?,
            interest_rate_technology: self.load_opt(
                "InterestRateTechnology",
                |row: RowRty, s| {
                    Ok((
                        (
                            s.region(&row.region, "InterestRateTechnology")?,
                            s.technology(&row.technology, "InterestRateTechnology")?,
                            row.year,
                        ),
                        row.val,
                    ))
                },
            )?,
            interest_rate_storage: self.load_opt("InterestRateStorage", |row: RowRsy, s| {
                Ok((
                    (
                        s.region(&row.region, "InterestRateStorage")?,
                        s.storage(&row.storage, "InterestRateStorage")?,
                        row.year,
                    ),
                    row.val,
                ))
            })?,
            max_capacity: self.load_opt("TotalAnnualMaxCapacity", |row: RowRty, s| {
                Ok((
                    (
                        s.region(&row.region, "TotalAnnualMaxCapacity")?,
                        s.technology(&row.technology, "TotalAnnualMaxCapacity")?,
                        row.year,
                    ),
                    row.val,
                ))
            })?,
            min_capacity: self.load("TotalAnnualMinCapacity", |row: RowRty, s| {
                Ok((
                    (
                        s.region(&row.region, "TotalAnnualMinCapacity")?,
                        s.technology(&row.technology, "TotalAnnualMinCapacity")?,
                        row.year,
                    ),
                    row.val,
                ))
            })?,
            emission_activity_ratio: self.load("EmissionActivityRatio", |row: RowRtemy, s| {
                Ok((
                    (
                        s.region(&row.region, "EmissionActivityRatio")?,
                        s.technology(&row.technology, "EmissionActivityRatio")?,
                        s.emission(&row.emission, "EmissionActivityRatio")?,
                        s.mode(&row.mode, "EmissionActivityRatio")?,
                        row.year,
                    ),
                    row.val,
                ))
            })?,
            emissions_penalty: self.load("EmissionsPenalty", |row: RowRey, s| {
                Ok((
                    (
                        s.region(&row.region, "EmissionsPenalty")?,
                        s.emission(&row.emission, "EmissionsPenalty")?,
                        row.year,
                    ),
                    row.val,
                ))
            })?,
            annual_emission_limit: self.load_opt("AnnualEmissionLimit", |row: RowRey, s| {
                Ok((
                    (
                        s.region(&row.region, "AnnualEmissionLimit")?,
                        s.emission(&row.emission, "AnnualEmissionLimit")?,
                        row.year,
                    ),
                    row.val,
                ))
            })?,
            technology_to_storage: self.load("TechnologyToStorage", |row: RowRtsm, s| {
                Ok((
                    (
                        s.region(&row.region, "TechnologyToStorage")?,
                        s.technology(&row.technology, "TechnologyToStorage")?,
                        s.storage(&row.storage, "TechnologyToStorage")?,
                        s.mode(&row.mode, "TechnologyToStorage")?,
                    ),
                    row.val,
                ))
            })?,
            technology_from_storage: self.load("TechnologyFromStorage", |row: RowRtsm, s| {
                Ok((
                    (
                        s.region(&row.region, "TechnologyFromStorage")?,
                        s.technology(&row.technology, "TechnologyFromStorage")?,
                        s.storage(&row.storage, "TechnologyFromStorage")?,
                        s.mode(&row.mode, "TechnologyFromStorage")?,
                    ),
                    row.val,
                ))
            })?,
            storage_level_start: self.load("StorageLevelStart", |row: RowRs, s| {
                Ok((
                    (
                        s.region(&row.region, "StorageLevelStart")?,
                        s.storage(&row.storage, "StorageLevelStart")?,
                    ),
                    row.val,
                ))
            })?,
            storage_max_capacity: self.load_opt("StorageMaxCapacity", |row: RowRsy, s| {
                Ok((
                    (
                        s.region(&row.region, "StorageMaxCapacity")?,
                        s.storage(&row.storage, "StorageMaxCapacity")?,
                        row.year,
                    ),
                    row.val,
                ))
            })?,
            capital_cost_storage: self.load("CapitalCostStorage", |row: RowRsy, s| {
                Ok((
                    (
                        s.region(&row.region, "CapitalCostStorage")?,
                        s.storage(&row.storage, "CapitalCostStorage")?,
                        row.year,
                    ),
                    row.val,
                ))
            })?,
            residual_storage_capacity: self.load(
                "ResidualStorageCapacity",
                |row: RowRsy, s| {
                    Ok((
                        (
                            s.region(&row.region, "ResidualStorageCapacity")?,
                            s.storage(&row.storage, "ResidualStorageCapacity")?,
                            row.year,
                        ),
                        row.val,
                    ))
                },
            )?,
            operational_life_storage: self.load("OperationalLifeStorage", |row: RowRs, s| {
                Ok((
                    (
                        s.region(&row.region, "OperationalLifeStorage")?,
                        s.storage(&row.storage, "OperationalLifeStorage")?,
                    ),
                    row.val,
                ))
            })?,
            storage_net_zero_year: self.load("StorageNetZeroYear", |row: RowRsy, s| {
                Ok((
                    (
                        s.region(&row.region, "StorageNetZeroYear")?,
                        s.storage(&row.storage, "StorageNetZeroYear")?,
                        row.year,
                    ),
                    row.val,
                ))
            })?,
            transmission_capacity: self.load("TransmissionCapacity", |row: RowL, s| {
                Ok((s.line(&row.line, "TransmissionCapacity")?, row.val))
            })?,
            transmission_efficiency: self.load("TransmissionEfficiency", |row: RowL, s| {
                Ok((s.line(&row.line, "TransmissionEfficiency")?, row.val))
            })?,
            transmission_available: self.load("TransmissionAvailable", |row: RowLny, s| {
                Ok((
                    (s.line(&row.line, "TransmissionAvailable")?, row.year),
                    row.val,
                ))
            })?,
            transmission_buildable: self.load("TransmissionBuildable", |row: RowLny, s| {
                Ok((
                    (s.line(&row.line, "TransmissionBuildable")?, row.year),
                    row.val,
                ))
            })?,
            transmission_capital_cost: self.load(
                "TransmissionCapitalCost",
                |row: RowLny, s| {
                    Ok((
                        (s.line(&row.line, "TransmissionCapitalCost")?, row.year),
                        row.val,
                    ))
                },
            )?,
            variable_cost_transmission: self.load(
                "VariableCostTransmission",
                |row: RowLny, s| {
                    Ok((
                        (s.line(&row.line, "VariableCostTransmission")?, row.year),
                        row.val,
                    ))
                },
            )?,
            trade_route: self.load("TradeRoute", |row: RowRrfy, s| {
                Ok((
                    (
                        s.region(&row.region, "TradeRoute")?,
                        s.region(&row.region2, "TradeRoute")?,
                        s.fuel(&row.fuel, "TradeRoute")?,
                        row.year,
                    ),
                    row.val,
                ))
            })?,
            carry_forward: Default::default(),
        })
    }

    /// Load one parameter table with a total default
    fn load<T, K, F>(&self, table: &'static str, to_key: F) -> Result<Param<K>>
    where
        T: serde::de::DeserializeOwned,
        K: Eq + Hash,
        F: Fn(T, &SetLookup) -> Result<(K, f64)>,
    {
        let default = self.default_for(table)?;
        let mut param = Param::new(default);
        let lookup = SetLookup(self.sets);
        for row in self.store.read_rows::<T>(table)? {
            let (key, val) = to_key(row, &lookup)?;
            param.insert(key, val);
        }
        Ok(param)
    }

    /// Load one optional parameter table (absence of a row is meaningful)
    fn load_opt<T, K, F>(&self, table: &'static str, to_key: F) -> Result<OptParam<K>>
    where
        T: serde::de::DeserializeOwned,
        K: Eq + Hash,
        F: Fn(T, &SetLookup) -> Result<(K, f64)>,
    {
        let mut param = OptParam::new();
        let lookup = SetLookup(self.sets);
        for row in self.store.read_rows::<T>(table)? {
            let (key, val) = to_key(row, &lookup)?;
            param.insert(key, val);
        }
        Ok(param)
    }

    /// The default value for a parameter: `DefaultParams` else the registry
    fn default_for(&self, table: &'static str) -> Result<f64> {
        if let Some(val) = self.defaults.get(table) {
            return Ok(*val);
        }
        param_def(table)
            .and_then(|def| def.default)
            .ok_or_else(|| {
                EngineError::data(format!("no default declared for parameter '{table}'")).into()
            })
    }
}

/// Checked conversion of raw row strings into set-member IDs
struct SetLookup<'a>(&'a Sets);

impl SetLookup<'_> {
    fn member<ID>(set: &IndexSet<ID>, id: &str, set_name: &str, table: &str) -> Result<ID>
    where
        ID: Eq + Hash + Clone + std::borrow::Borrow<str>,
    {
        set.get(id).cloned().ok_or_else(|| {
            EngineError::data(format!(
                "table '{table}' references unknown {set_name} '{id}'"
            ))
            .into()
        })
    }

    fn region(&self, id: &str, table: &str) -> Result<RegionID> {
        Self::member(&self.0.regions, id, "region", table)
    }

    fn technology(&self, id: &str, table: &str) -> Result<TechnologyID> {
        Self::member(&self.0.technologies, id, "technology", table)
    }

    fn fuel(&self, id: &str, table: &str) -> Result<FuelID> {
        Self::member(&self.0.fuels, id, "fuel", table)
    }

    fn emission(&self, id: &str, table: &str) -> Result<EmissionID> {
        Self::member(&self.0.emissions, id, "emission", table)
    }

    fn mode(&self, id: &str, table: &str) -> Result<ModeID> {
        Self::member(&self.0.modes, id, "mode", table)
    }

    fn timeslice(&self, id: &str, table: &str) -> Result<TimesliceID> {
        Self::member(&self.0.timeslices, id, "timeslice", table)
    }

    fn storage(&self, id: &str, table: &str) -> Result<StorageID> {
        Self::member(&self.0.storages, id, "storage", table)
    }

    fn line(&self, id: &str, table: &str) -> Result<LineID> {
        self.0
            .lines
            .get_key_value(id)
            .map(|(key, _)| key.clone())
            .ok_or_else(|| {
                EngineError::data(format!("table '{table}' references unknown line '{id}'")).into()
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::{clear_storage, scratch_scenario};
    use rstest::rstest;

    #[rstest]
    fn test_load_applies_default_params(scratch_scenario: (tempfile::TempDir, Store)) {
        let (_dir, store) = scratch_scenario;
        store.set_param_default("DiscountRate", 0.1).unwrap();

        let data = ScenarioData::load(&store).unwrap();
        assert_eq!(data.params.discount_rate.get(&"north".into()), 0.1);
    }

    #[rstest]
    fn test_unknown_id_in_param_table_is_data_error(
        scratch_scenario: (tempfile::TempDir, Store),
    ) {
        let (_dir, store) = scratch_scenario;

        #[derive(serde::Serialize)]
        struct Row {
            region: String,
            technology: String,
            year: Year,
            val: f64,
        }
        store
            .write_rows(
                "CapitalCost",
                &[Row {
                    region: "atlantis".into(),
                    technology: "gas_turbine".into(),
                    year: 2020,
                    val: 1.0,
                }],
            )
            .unwrap();

        let err = ScenarioData::load(&store).unwrap_err();
        assert!(err.to_string().contains("unknown region 'atlantis'"));
    }

    #[rstest]
    fn test_year_split_must_partition_year(scratch_scenario: (tempfile::TempDir, Store)) {
        let (_dir, store) = scratch_scenario;

        #[derive(serde::Serialize)]
        struct Row {
            timeslice: String,
            year: Year,
            val: f64,
        }
        // Overwrite the fixture's YearSplit with one that does not sum to 1
        let rows: Vec<Row> = [2020, 2021, 2022]
            .into_iter()
            .flat_map(|year| {
                [("day", 0.4), ("night", 0.4)].map(|(ts, val)| Row {
                    timeslice: ts.into(),
                    year,
                    val,
                })
            })
            .collect();
        store.write_rows("YearSplit", &rows).unwrap();

        let err = ScenarioData::load(&store).unwrap_err();
        assert!(err.to_string().contains("YearSplit sums to"));
    }

    #[rstest]
    fn test_demand_uses_year_split_when_profile_absent(
        scratch_scenario: (tempfile::TempDir, Store),
    ) {
        let (_dir, store) = scratch_scenario;
        let data = ScenarioData::load(&store).unwrap();

        // The fixture gives "north" an annual electricity demand of 10 with no
        // profile; YearSplit is 0.5/0.5
        let demand = data.demand(&"north".into(), &"electricity".into(), &"day".into(), 2020);
        float_cmp::assert_approx_eq!(f64, demand, 5.0);
    }

    #[rstest]
    fn test_empty_storage_set_loads_cleanly(scratch_scenario: (tempfile::TempDir, Store)) {
        let (_dir, store) = scratch_scenario;
        clear_storage(&store);

        let data = ScenarioData::load(&store).unwrap();
        assert!(data.sets.storages.is_empty());
    }
}

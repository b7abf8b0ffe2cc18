//! Sparse parameters and their defaults.
//!
//! A parameter is a sparse map from an index tuple to a value plus a declared
//! default: every lookup either finds an explicit row or falls back to the
//! default, never "undefined". Defaults come from the store's `DefaultParams`
//! table, else from the built-in registry below.
//!
//! The [`CarryForward`] overlay holds capacity decisions carried between
//! limited-foresight phases. It is owned and mutated exclusively by the phase
//! runner; parameter resolution consults it ahead of stored scenario data.
use std::collections::HashMap;
use std::hash::Hash;

use crate::id::{
    EmissionID, FuelID, LineID, ModeID, RegionID, StorageID, TechnologyID, TimesliceID, Year,
};

/// The declaration of one parameter table: name, index columns and built-in
/// default. A `None` default marks an optional parameter, where the absence of
/// a row means "no constraint" or "fall back to another parameter" rather than
/// a numeric value.
pub struct ParamDef {
    /// Table name in the scenario store
    pub name: &'static str,
    /// Index column names, in signature order
    pub dims: &'static [&'static str],
    /// Built-in default value, if the parameter has a total default
    pub default: Option<f64>,
}

/// Every parameter table, in load order.
pub const PARAM_DEFS: &[ParamDef] = &[
    ParamDef { name: "YearSplit", dims: &["timeslice", "year"], default: Some(0.0) },
    ParamDef { name: "SpecifiedAnnualDemand", dims: &["region", "fuel", "year"], default: Some(0.0) },
    ParamDef { name: "SpecifiedDemandProfile", dims: &["region", "fuel", "timeslice", "year"], default: Some(0.0) },
    ParamDef { name: "CapacityToActivityUnit", dims: &["region", "technology"], default: Some(1.0) },
    ParamDef { name: "CapacityFactor", dims: &["region", "technology", "timeslice", "year"], default: Some(1.0) },
    ParamDef { name: "AvailabilityFactor", dims: &["region", "technology", "year"], default: Some(1.0) },
    ParamDef { name: "OperationalLife", dims: &["region", "technology"], default: Some(1.0) },
    ParamDef { name: "ResidualCapacity", dims: &["region", "technology", "year"], default: Some(0.0) },
    ParamDef { name: "InputActivityRatio", dims: &["region", "technology", "fuel", "mode", "year"], default: Some(0.0) },
    ParamDef { name: "OutputActivityRatio", dims: &["region", "technology", "fuel", "mode", "year"], default: Some(0.0) },
    ParamDef { name: "CapitalCost", dims: &["region", "technology", "year"], default: Some(0.0) },
    ParamDef { name: "FixedCost", dims: &["region", "technology", "year"], default: Some(0.0) },
    ParamDef { name: "VariableCost", dims: &["region", "technology", "mode", "year"], default: Some(0.0) },
    ParamDef { name: "DiscountRate", dims: &["region"], default: Some(0.05) },
    ParamDef { name: "InterestRateTechnology", dims: &["region", "technology", "year"], default: None },
    ParamDef { name: "InterestRateStorage", dims: &["region", "storage", "year"], default: None },
    ParamDef { name: "TotalAnnualMaxCapacity", dims: &["region", "technology", "year"], default: None },
    ParamDef { name: "TotalAnnualMinCapacity", dims: &["region", "technology", "year"], default: Some(0.0) },
    ParamDef { name: "EmissionActivityRatio", dims: &["region", "technology", "emission", "mode", "year"], default: Some(0.0) },
    ParamDef { name: "EmissionsPenalty", dims: &["region", "emission", "year"], default: Some(0.0) },
    ParamDef { name: "AnnualEmissionLimit", dims: &["region", "emission", "year"], default: None },
    ParamDef { name: "TechnologyToStorage", dims: &["region", "technology", "storage", "mode"], default: Some(0.0) },
    ParamDef { name: "TechnologyFromStorage", dims: &["region", "technology", "storage", "mode"], default: Some(0.0) },
    ParamDef { name: "StorageLevelStart", dims: &["region", "storage"], default: Some(0.0) },
    ParamDef { name: "StorageMaxCapacity", dims: &["region", "storage", "year"], default: None },
    ParamDef { name: "CapitalCostStorage", dims: &["region", "storage", "year"], default: Some(0.0) },
    ParamDef { name: "ResidualStorageCapacity", dims: &["region", "storage", "year"], default: Some(0.0) },
    ParamDef { name: "OperationalLifeStorage", dims: &["region", "storage"], default: Some(1.0) },
    ParamDef { name: "StorageNetZeroYear", dims: &["region", "storage", "year"], default: Some(0.0) },
    ParamDef { name: "TransmissionCapacity", dims: &["line"], default: Some(0.0) },
    ParamDef { name: "TransmissionEfficiency", dims: &["line"], default: Some(1.0) },
    ParamDef { name: "TransmissionAvailable", dims: &["line", "year"], default: Some(0.0) },
    ParamDef { name: "TransmissionBuildable", dims: &["line", "year"], default: Some(0.0) },
    ParamDef { name: "TransmissionCapitalCost", dims: &["line", "year"], default: Some(0.0) },
    ParamDef { name: "VariableCostTransmission", dims: &["line", "year"], default: Some(0.0) },
    ParamDef { name: "TradeRoute", dims: &["region", "region2", "fuel", "year"], default: Some(0.0) },
];

/// Look up a parameter declaration by table name
pub fn param_def(name: &str) -> Option<&'static ParamDef> {
    PARAM_DEFS.iter().find(|def| def.name == name)
}

/// A sparse parameter with a total default.
#[derive(Debug, Clone)]
pub struct Param<K: Eq + Hash> {
    values: HashMap<K, f64>,
    default: f64,
}

impl<K: Eq + Hash> Param<K> {
    /// Create an empty parameter with the given default
    pub fn new(default: f64) -> Self {
        Self {
            values: HashMap::new(),
            default,
        }
    }

    /// The parameter's default value
    pub fn default_value(&self) -> f64 {
        self.default
    }

    /// Insert an explicit row
    pub fn insert(&mut self, key: K, val: f64) {
        self.values.insert(key, val);
    }

    /// The value for `key`: the explicit row if present, else the default
    pub fn get(&self, key: &K) -> f64 {
        self.values.get(key).copied().unwrap_or(self.default)
    }

    /// Whether an explicit, nonzero row exists for `key`
    pub fn has_nonzero(&self, key: &K) -> bool {
        self.values.get(key).is_some_and(|val| *val != 0.0)
    }

    /// Iterate over explicit rows
    pub fn iter(&self) -> impl Iterator<Item = (&K, f64)> {
        self.values.iter().map(|(key, val)| (key, *val))
    }
}

/// A sparse parameter without a default: the absence of a row is meaningful.
#[derive(Debug, Clone, Default)]
pub struct OptParam<K: Eq + Hash> {
    values: HashMap<K, f64>,
}

impl<K: Eq + Hash> OptParam<K> {
    /// Create an empty parameter
    pub fn new() -> Self {
        Self {
            values: HashMap::new(),
        }
    }

    /// Insert an explicit row
    pub fn insert(&mut self, key: K, val: f64) {
        self.values.insert(key, val);
    }

    /// The explicit value for `key`, if any
    pub fn get_opt(&self, key: &K) -> Option<f64> {
        self.values.get(key).copied()
    }
}

/// All loaded parameters for one scenario.
///
/// Field order follows [`PARAM_DEFS`].
#[derive(Debug)]
pub struct Params {
    /// Fraction of the year covered by each timeslice
    pub year_split: Param<(TimesliceID, Year)>,
    /// Annual demand for a fuel in a region
    pub specified_annual_demand: Param<(RegionID, FuelID, Year)>,
    /// Within-year demand shares; all-zero profiles fall back to `YearSplit`
    pub specified_demand_profile: Param<(RegionID, FuelID, TimesliceID, Year)>,
    /// Energy produced by one unit of capacity running for a year
    pub capacity_to_activity: Param<(RegionID, TechnologyID)>,
    /// Per-timeslice availability of capacity
    pub capacity_factor: Param<(RegionID, TechnologyID, TimesliceID, Year)>,
    /// Annual availability of capacity
    pub availability_factor: Param<(RegionID, TechnologyID, Year)>,
    /// Technology lifetime in years
    pub operational_life: Param<(RegionID, TechnologyID)>,
    /// Capacity installed before the model horizon
    pub residual_capacity: Param<(RegionID, TechnologyID, Year)>,
    /// Fuel use per unit of activity, by mode
    pub input_activity_ratio: Param<(RegionID, TechnologyID, FuelID, ModeID, Year)>,
    /// Fuel production per unit of activity, by mode
    pub output_activity_ratio: Param<(RegionID, TechnologyID, FuelID, ModeID, Year)>,
    /// Capital cost per unit of new capacity
    pub capital_cost: Param<(RegionID, TechnologyID, Year)>,
    /// Fixed annual cost per unit of installed capacity
    pub fixed_cost: Param<(RegionID, TechnologyID, Year)>,
    /// Cost per unit of activity, by mode
    pub variable_cost: Param<(RegionID, TechnologyID, ModeID, Year)>,
    /// Regional discount rate
    pub discount_rate: Param<RegionID>,
    /// Per-technology interest-rate override; falls back to `DiscountRate`
    pub interest_rate_technology: OptParam<(RegionID, TechnologyID, Year)>,
    /// Per-storage interest-rate override; falls back to `DiscountRate`
    pub interest_rate_storage: OptParam<(RegionID, StorageID, Year)>,
    /// Upper bound on installed capacity; absent = unbounded
    pub max_capacity: OptParam<(RegionID, TechnologyID, Year)>,
    /// Lower bound on installed capacity; emitted only when positive
    pub min_capacity: Param<(RegionID, TechnologyID, Year)>,
    /// Emissions per unit of activity, by mode
    pub emission_activity_ratio: Param<(RegionID, TechnologyID, EmissionID, ModeID, Year)>,
    /// Cost per unit of emission
    pub emissions_penalty: Param<(RegionID, EmissionID, Year)>,
    /// Annual cap on an emission; absent = no limit
    pub annual_emission_limit: OptParam<(RegionID, EmissionID, Year)>,
    /// Storage charged per unit of activity of a linked technology
    pub technology_to_storage: Param<(RegionID, TechnologyID, StorageID, ModeID)>,
    /// Storage discharged per unit of activity of a linked technology
    pub technology_from_storage: Param<(RegionID, TechnologyID, StorageID, ModeID)>,
    /// Opening charge level at the start of the horizon
    pub storage_level_start: Param<(RegionID, StorageID)>,
    /// Upper bound on storage capacity; absent = unbounded
    pub storage_max_capacity: OptParam<(RegionID, StorageID, Year)>,
    /// Capital cost per unit of new storage capacity
    pub capital_cost_storage: Param<(RegionID, StorageID, Year)>,
    /// Storage capacity installed before the model horizon
    pub residual_storage_capacity: Param<(RegionID, StorageID, Year)>,
    /// Storage lifetime in years
    pub operational_life_storage: Param<(RegionID, StorageID)>,
    /// Nonzero forces the year-end charge level back to the opening level
    pub storage_net_zero_year: Param<(RegionID, StorageID, Year)>,
    /// Rated transfer capacity of a line
    pub transmission_capacity: Param<LineID>,
    /// Fraction of flow delivered at the receiving end
    pub transmission_efficiency: Param<LineID>,
    /// Nonzero marks the line as existing in a year
    pub transmission_available: Param<(LineID, Year)>,
    /// Nonzero marks the line as buildable in a year
    pub transmission_buildable: Param<(LineID, Year)>,
    /// Cost of building the line, per unit of its rated capacity
    pub transmission_capital_cost: Param<(LineID, Year)>,
    /// Cost per unit of energy carried
    pub variable_cost_transmission: Param<(LineID, Year)>,
    /// Transshipment transfer capacity between two regions
    pub trade_route: Param<(RegionID, RegionID, FuelID, Year)>,
    /// Decisions carried forward from earlier foresight phases
    pub carry_forward: CarryForward,
}

/// Solved decisions carried from one foresight phase into the next.
///
/// Owned and mutated exclusively by the phase runner. Parameter resolution
/// consults this overlay before the stored scenario data.
#[derive(Debug, Clone, Default)]
pub struct CarryForward {
    /// New capacity built in earlier phases, per (region, technology)
    pub new_capacity: HashMap<(RegionID, TechnologyID), Vec<(Year, f64)>>,
    /// New storage capacity built in earlier phases
    pub new_storage_capacity: HashMap<(RegionID, StorageID), Vec<(Year, f64)>>,
    /// Year in which an earlier phase committed to building a line
    pub line_built: HashMap<LineID, Year>,
    /// Closing storage charge level at the end of the last solved phase
    pub storage_level: HashMap<(RegionID, StorageID), f64>,
}

impl CarryForward {
    /// Whether any decision has been carried forward yet
    pub fn is_empty(&self) -> bool {
        self.new_capacity.is_empty()
            && self.new_storage_capacity.is_empty()
            && self.line_built.is_empty()
            && self.storage_level.is_empty()
    }

    /// Record new capacity built in a solved phase
    pub fn record_new_capacity(
        &mut self,
        region: RegionID,
        technology: TechnologyID,
        year: Year,
        value: f64,
    ) {
        self.new_capacity
            .entry((region, technology))
            .or_default()
            .push((year, value));
    }

    /// Capacity built in earlier phases that is still inside its lifetime in
    /// `year`
    pub fn surviving_capacity(
        &self,
        region: &RegionID,
        technology: &TechnologyID,
        year: Year,
        life: Year,
    ) -> f64 {
        self.new_capacity
            .get(&(region.clone(), technology.clone()))
            .map(|builds| {
                builds
                    .iter()
                    .filter(|(built, _)| *built <= year && year - built < life)
                    .map(|(_, value)| value)
                    .sum()
            })
            .unwrap_or(0.0)
    }

    /// Storage capacity built in earlier phases still inside its lifetime
    pub fn surviving_storage_capacity(
        &self,
        region: &RegionID,
        storage: &StorageID,
        year: Year,
        life: Year,
    ) -> f64 {
        self.new_storage_capacity
            .get(&(region.clone(), storage.clone()))
            .map(|builds| {
                builds
                    .iter()
                    .filter(|(built, _)| *built <= year && year - built < life)
                    .map(|(_, value)| value)
                    .sum()
            })
            .unwrap_or(0.0)
    }
}

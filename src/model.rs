//! The solver-agnostic optimization model.
//!
//! A model is a collection of decision variables (with bounds and continuity
//! class), linear constraints and one objective, produced fresh for every
//! solve phase and never mutated after being handed to a solver. Constraints
//! reference variables symbolically through [`VarKey`], so the builder can
//! generate all constraint rows first and only then decide which variable
//! tuples to instantiate (the `restrict_vars` option).
use anyhow::Result;
use indexmap::{IndexMap, IndexSet};
use std::io::Write;
use strum::{Display, EnumIter, EnumString};

use crate::error::EngineError;
use crate::id::{EmissionID, FuelID, LineID, ModeID, RegionID, StorageID, TechnologyID, TimesliceID, Year};

/// The catalogue of decision-variable families.
///
/// The display form is the family's result-table name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, EnumString)]
pub enum VariableFamily {
    /// New capacity built in a year
    #[strum(serialize = "vnewcapacity")]
    NewCapacity,
    /// Total installed capacity in a year
    #[strum(serialize = "vtotalcapacityannual")]
    TotalCapacity,
    /// Rate of activity of a technology in a timeslice, by mode
    #[strum(serialize = "vrateofactivity")]
    Activity,
    /// Energy produced into a fuel in a timeslice
    #[strum(serialize = "vproduction")]
    Production,
    /// Energy drawn from a fuel in a timeslice
    #[strum(serialize = "vuse")]
    Use,
    /// Energy charged into a storage in a timeslice
    #[strum(serialize = "vstoragecharge")]
    StorageCharge,
    /// Energy discharged from a storage in a timeslice
    #[strum(serialize = "vstoragedischarge")]
    StorageDischarge,
    /// Storage charge level at the end of a timeslice
    #[strum(serialize = "vstoragelevel")]
    StorageLevel,
    /// New storage capacity built in a year
    #[strum(serialize = "vnewstoragecapacity")]
    NewStorageCapacity,
    /// Total installed storage capacity in a year
    #[strum(serialize = "vstoragecapacityannual")]
    StorageCapacity,
    /// Signed flow on a transmission line (positive = region1 to region2)
    #[strum(serialize = "vtransmissionflow")]
    LineFlow,
    /// Whether a line has been built by a year
    #[strum(serialize = "vtransmissionbuilt")]
    LineBuilt,
    /// Energy moved over a line in a timeslice, regardless of direction
    #[strum(serialize = "vtransmissionenergy")]
    LineEnergy,
    /// Signed net import of a fuel under the transshipment topology
    #[strum(serialize = "vnetimport")]
    NetImport,
    /// Annual emissions of one emission type
    #[strum(serialize = "vannualemissions")]
    AnnualEmissions,
    /// Undiscounted capital investment in a technology
    #[strum(serialize = "vcapitalinvestment")]
    CapitalInvestment,
    /// Discounted capital investment in a technology
    #[strum(serialize = "vdiscountedcapitalinvestment")]
    DiscountedCapitalInvestment,
    /// Undiscounted fixed plus variable operating cost
    #[strum(serialize = "voperatingcost")]
    OperatingCost,
    /// Discounted operating cost
    #[strum(serialize = "vdiscountedoperatingcost")]
    DiscountedOperatingCost,
    /// Undiscounted salvage value credited at the end of the horizon
    #[strum(serialize = "vsalvagevalue")]
    SalvageValue,
    /// Discounted salvage value
    #[strum(serialize = "vdiscountedsalvagevalue")]
    DiscountedSalvageValue,
    /// Undiscounted emissions-penalty cost attributed to a technology
    #[strum(serialize = "vannualtechnologyemissionspenalty")]
    AnnualEmissionsPenalty,
    /// Discounted emissions-penalty cost
    #[strum(serialize = "vdiscountedtechnologyemissionspenalty")]
    DiscountedEmissionsPenalty,
    /// Total discounted cost attributed to a technology
    #[strum(serialize = "vtotaldiscountedcostbytechnology")]
    TotalDiscountedCostByTechnology,
    /// Undiscounted capital investment in a storage
    #[strum(serialize = "vcapitalinvestmentstorage")]
    CapitalInvestmentStorage,
    /// Discounted capital investment in a storage
    #[strum(serialize = "vdiscountedcapitalinvestmentstorage")]
    DiscountedCapitalInvestmentStorage,
    /// Undiscounted storage salvage value
    #[strum(serialize = "vsalvagevaluestorage")]
    SalvageValueStorage,
    /// Discounted storage salvage value
    #[strum(serialize = "vdiscountedsalvagevaluestorage")]
    DiscountedSalvageValueStorage,
    /// Total discounted cost attributed to a storage
    #[strum(serialize = "vtotaldiscountedstoragecost")]
    TotalDiscountedStorageCost,
    /// Total discounted transmission cost attributed to a region
    #[strum(serialize = "vtotaldiscountedtransmissioncost")]
    TotalDiscountedTransmissionCost,
    /// Total discounted cost of a region
    #[strum(serialize = "vtotaldiscountedcost")]
    TotalDiscountedCost,
}

impl VariableFamily {
    /// The index column names of the family's result table
    pub fn dims(&self) -> &'static [&'static str] {
        use VariableFamily::*;
        match self {
            NewCapacity | TotalCapacity | CapitalInvestment | DiscountedCapitalInvestment
            | OperatingCost | DiscountedOperatingCost | SalvageValue | DiscountedSalvageValue
            | AnnualEmissionsPenalty | DiscountedEmissionsPenalty
            | TotalDiscountedCostByTechnology => &["region", "technology", "year"],
            Activity => &["region", "timeslice", "technology", "mode", "year"],
            Production | Use => &["region", "timeslice", "fuel", "year"],
            StorageCharge | StorageDischarge | StorageLevel => {
                &["region", "storage", "timeslice", "year"]
            }
            NewStorageCapacity | StorageCapacity | CapitalInvestmentStorage
            | DiscountedCapitalInvestmentStorage | SalvageValueStorage
            | DiscountedSalvageValueStorage | TotalDiscountedStorageCost => {
                &["region", "storage", "year"]
            }
            LineFlow | LineEnergy => &["line", "timeslice", "year"],
            LineBuilt => &["line", "year"],
            NetImport => &["region", "fuel", "timeslice", "year"],
            AnnualEmissions => &["region", "emission", "year"],
            TotalDiscountedTransmissionCost | TotalDiscountedCost => &["region", "year"],
        }
    }
}

/// The index tuple of one decision variable.
///
/// Variant order and tuple order define the deterministic column ordering of
/// the finalised model.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum VarKey {
    /// `vnewcapacity[r, t, y]`
    NewCapacity(RegionID, TechnologyID, Year),
    /// `vtotalcapacityannual[r, t, y]`
    TotalCapacity(RegionID, TechnologyID, Year),
    /// `vrateofactivity[r, l, t, m, y]`
    Activity(RegionID, TimesliceID, TechnologyID, ModeID, Year),
    /// `vproduction[r, l, f, y]`
    Production(RegionID, TimesliceID, FuelID, Year),
    /// `vuse[r, l, f, y]`
    Use(RegionID, TimesliceID, FuelID, Year),
    /// `vstoragecharge[r, s, l, y]`
    StorageCharge(RegionID, StorageID, TimesliceID, Year),
    /// `vstoragedischarge[r, s, l, y]`
    StorageDischarge(RegionID, StorageID, TimesliceID, Year),
    /// `vstoragelevel[r, s, l, y]`
    StorageLevel(RegionID, StorageID, TimesliceID, Year),
    /// `vnewstoragecapacity[r, s, y]`
    NewStorageCapacity(RegionID, StorageID, Year),
    /// `vstoragecapacityannual[r, s, y]`
    StorageCapacity(RegionID, StorageID, Year),
    /// `vtransmissionflow[line, l, y]`
    LineFlow(LineID, TimesliceID, Year),
    /// `vtransmissionbuilt[line, y]`
    LineBuilt(LineID, Year),
    /// `vtransmissionenergy[line, l, y]`
    LineEnergy(LineID, TimesliceID, Year),
    /// `vnetimport[r, f, l, y]`
    NetImport(RegionID, FuelID, TimesliceID, Year),
    /// `vannualemissions[r, e, y]`
    AnnualEmissions(RegionID, EmissionID, Year),
    /// `vcapitalinvestment[r, t, y]`
    CapitalInvestment(RegionID, TechnologyID, Year),
    /// `vdiscountedcapitalinvestment[r, t, y]`
    DiscountedCapitalInvestment(RegionID, TechnologyID, Year),
    /// `voperatingcost[r, t, y]`
    OperatingCost(RegionID, TechnologyID, Year),
    /// `vdiscountedoperatingcost[r, t, y]`
    DiscountedOperatingCost(RegionID, TechnologyID, Year),
    /// `vsalvagevalue[r, t, y]`
    SalvageValue(RegionID, TechnologyID, Year),
    /// `vdiscountedsalvagevalue[r, t, y]`
    DiscountedSalvageValue(RegionID, TechnologyID, Year),
    /// `vannualtechnologyemissionspenalty[r, t, y]`
    AnnualEmissionsPenalty(RegionID, TechnologyID, Year),
    /// `vdiscountedtechnologyemissionspenalty[r, t, y]`
    DiscountedEmissionsPenalty(RegionID, TechnologyID, Year),
    /// `vtotaldiscountedcostbytechnology[r, t, y]`
    TotalDiscountedCostByTechnology(RegionID, TechnologyID, Year),
    /// `vcapitalinvestmentstorage[r, s, y]`
    CapitalInvestmentStorage(RegionID, StorageID, Year),
    /// `vdiscountedcapitalinvestmentstorage[r, s, y]`
    DiscountedCapitalInvestmentStorage(RegionID, StorageID, Year),
    /// `vsalvagevaluestorage[r, s, y]`
    SalvageValueStorage(RegionID, StorageID, Year),
    /// `vdiscountedsalvagevaluestorage[r, s, y]`
    DiscountedSalvageValueStorage(RegionID, StorageID, Year),
    /// `vtotaldiscountedstoragecost[r, s, y]`
    TotalDiscountedStorageCost(RegionID, StorageID, Year),
    /// `vtotaldiscountedtransmissioncost[r, y]`
    TotalDiscountedTransmissionCost(RegionID, Year),
    /// `vtotaldiscountedcost[r, y]`
    TotalDiscountedCost(RegionID, Year),
}

impl VarKey {
    /// The family this key belongs to
    pub fn family(&self) -> VariableFamily {
        use VarKey::*;
        match self {
            NewCapacity(..) => VariableFamily::NewCapacity,
            TotalCapacity(..) => VariableFamily::TotalCapacity,
            Activity(..) => VariableFamily::Activity,
            Production(..) => VariableFamily::Production,
            Use(..) => VariableFamily::Use,
            StorageCharge(..) => VariableFamily::StorageCharge,
            StorageDischarge(..) => VariableFamily::StorageDischarge,
            StorageLevel(..) => VariableFamily::StorageLevel,
            NewStorageCapacity(..) => VariableFamily::NewStorageCapacity,
            StorageCapacity(..) => VariableFamily::StorageCapacity,
            LineFlow(..) => VariableFamily::LineFlow,
            LineBuilt(..) => VariableFamily::LineBuilt,
            LineEnergy(..) => VariableFamily::LineEnergy,
            NetImport(..) => VariableFamily::NetImport,
            AnnualEmissions(..) => VariableFamily::AnnualEmissions,
            CapitalInvestment(..) => VariableFamily::CapitalInvestment,
            DiscountedCapitalInvestment(..) => VariableFamily::DiscountedCapitalInvestment,
            OperatingCost(..) => VariableFamily::OperatingCost,
            DiscountedOperatingCost(..) => VariableFamily::DiscountedOperatingCost,
            SalvageValue(..) => VariableFamily::SalvageValue,
            DiscountedSalvageValue(..) => VariableFamily::DiscountedSalvageValue,
            AnnualEmissionsPenalty(..) => VariableFamily::AnnualEmissionsPenalty,
            DiscountedEmissionsPenalty(..) => VariableFamily::DiscountedEmissionsPenalty,
            TotalDiscountedCostByTechnology(..) => VariableFamily::TotalDiscountedCostByTechnology,
            CapitalInvestmentStorage(..) => VariableFamily::CapitalInvestmentStorage,
            DiscountedCapitalInvestmentStorage(..) => {
                VariableFamily::DiscountedCapitalInvestmentStorage
            }
            SalvageValueStorage(..) => VariableFamily::SalvageValueStorage,
            DiscountedSalvageValueStorage(..) => VariableFamily::DiscountedSalvageValueStorage,
            TotalDiscountedStorageCost(..) => VariableFamily::TotalDiscountedStorageCost,
            TotalDiscountedTransmissionCost(..) => VariableFamily::TotalDiscountedTransmissionCost,
            TotalDiscountedCost(..) => VariableFamily::TotalDiscountedCost,
        }
    }

    /// The key's index tuple as result-table column values
    pub fn index_record(&self) -> Vec<String> {
        use VarKey::*;
        match self {
            NewCapacity(r, t, y)
            | TotalCapacity(r, t, y)
            | CapitalInvestment(r, t, y)
            | DiscountedCapitalInvestment(r, t, y)
            | OperatingCost(r, t, y)
            | DiscountedOperatingCost(r, t, y)
            | SalvageValue(r, t, y)
            | DiscountedSalvageValue(r, t, y)
            | AnnualEmissionsPenalty(r, t, y)
            | DiscountedEmissionsPenalty(r, t, y)
            | TotalDiscountedCostByTechnology(r, t, y) => {
                vec![r.to_string(), t.to_string(), y.to_string()]
            }
            Activity(r, l, t, m, y) => vec![
                r.to_string(),
                l.to_string(),
                t.to_string(),
                m.to_string(),
                y.to_string(),
            ],
            Production(r, l, f, y) | Use(r, l, f, y) => {
                vec![r.to_string(), l.to_string(), f.to_string(), y.to_string()]
            }
            StorageCharge(r, s, l, y) | StorageDischarge(r, s, l, y) | StorageLevel(r, s, l, y) => {
                vec![r.to_string(), s.to_string(), l.to_string(), y.to_string()]
            }
            NewStorageCapacity(r, s, y)
            | StorageCapacity(r, s, y)
            | CapitalInvestmentStorage(r, s, y)
            | DiscountedCapitalInvestmentStorage(r, s, y)
            | SalvageValueStorage(r, s, y)
            | DiscountedSalvageValueStorage(r, s, y)
            | TotalDiscountedStorageCost(r, s, y) => {
                vec![r.to_string(), s.to_string(), y.to_string()]
            }
            LineFlow(line, l, y) | LineEnergy(line, l, y) => {
                vec![line.to_string(), l.to_string(), y.to_string()]
            }
            LineBuilt(line, y) => vec![line.to_string(), y.to_string()],
            NetImport(r, f, l, y) => {
                vec![r.to_string(), f.to_string(), l.to_string(), y.to_string()]
            }
            AnnualEmissions(r, e, y) => vec![r.to_string(), e.to_string(), y.to_string()],
            TotalDiscountedTransmissionCost(r, y) | TotalDiscountedCost(r, y) => {
                vec![r.to_string(), y.to_string()]
            }
        }
    }
}

/// Bounds and continuity class of one decision variable
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VarDef {
    /// Lower bound
    pub lower: f64,
    /// Upper bound
    pub upper: f64,
    /// Whether the variable is integer-valued
    pub integer: bool,
}

impl VarDef {
    /// A continuous variable bounded below by zero
    pub fn non_negative() -> Self {
        Self {
            lower: 0.0,
            upper: f64::INFINITY,
            integer: false,
        }
    }

    /// A continuous free variable
    pub fn free() -> Self {
        Self {
            lower: f64::NEG_INFINITY,
            upper: f64::INFINITY,
            integer: false,
        }
    }

    /// A continuous variable bounded to `[lower, upper]`
    pub fn bounded(lower: f64, upper: f64) -> Self {
        Self {
            lower,
            upper,
            integer: false,
        }
    }

    /// A zero-or-one decision, integer when `discrete` is requested
    pub fn build_decision(discrete: bool) -> Self {
        Self {
            lower: 0.0,
            upper: 1.0,
            integer: discrete,
        }
    }
}

/// The constraint families the model builder generates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[allow(missing_docs)]
pub enum ConstraintFamily {
    CapacityBalance,
    CapacityAdequacy,
    AnnualActivityLimit,
    MaxCapacity,
    MinCapacity,
    ProductionDefinition,
    UseDefinition,
    EnergyBalance,
    TradeClearing,
    StorageChargeDefinition,
    StorageDischargeDefinition,
    StorageLevelBalance,
    StorageNetZero,
    StorageCapacityBalance,
    StorageLevelLimit,
    StorageMaxCapacityLimit,
    LineCapacityPositive,
    LineCapacityNegative,
    LineEnergyPositive,
    LineEnergyNegative,
    LineBuildMonotonic,
    AnnualEmissionsDefinition,
    AnnualEmissionsLimit,
    CapitalInvestmentDefinition,
    DiscountedCapitalInvestmentDefinition,
    OperatingCostDefinition,
    DiscountedOperatingCostDefinition,
    SalvageValueDefinition,
    DiscountedSalvageValueDefinition,
    EmissionsPenaltyDefinition,
    DiscountedEmissionsPenaltyDefinition,
    CostByTechnologyDefinition,
    StorageCapitalInvestmentDefinition,
    DiscountedStorageCapitalInvestmentDefinition,
    StorageSalvageValueDefinition,
    DiscountedStorageSalvageValueDefinition,
    StorageCostDefinition,
    TransmissionCostDefinition,
    AccountingIdentity,
}

/// One linear constraint row: `lower <= terms . x <= upper`.
#[derive(Debug, Clone)]
pub struct Constraint {
    /// The family this row belongs to (diagnostics only)
    pub family: ConstraintFamily,
    /// Variable references with coefficients
    pub terms: Vec<(VarKey, f64)>,
    /// Row lower bound
    pub lower: f64,
    /// Row upper bound
    pub upper: f64,
}

impl Constraint {
    /// An equality row `terms . x = rhs`
    pub fn equality(family: ConstraintFamily, terms: Vec<(VarKey, f64)>, rhs: f64) -> Self {
        Self {
            family,
            terms,
            lower: rhs,
            upper: rhs,
        }
    }

    /// An upper-bounded row `terms . x <= rhs`
    pub fn at_most(family: ConstraintFamily, terms: Vec<(VarKey, f64)>, rhs: f64) -> Self {
        Self {
            family,
            terms,
            lower: f64::NEG_INFINITY,
            upper: rhs,
        }
    }

    /// A lower-bounded row `terms . x >= rhs`
    pub fn at_least(family: ConstraintFamily, terms: Vec<(VarKey, f64)>, rhs: f64) -> Self {
        Self {
            family,
            terms,
            lower: rhs,
            upper: f64::INFINITY,
        }
    }
}

/// A complete, finalised optimization model for one solve.
#[derive(Debug)]
pub struct Model {
    /// Decision variables, in deterministic column order
    pub variables: IndexMap<VarKey, VarDef>,
    /// Constraint rows, in deterministic generation order
    pub constraints: Vec<Constraint>,
    /// Objective coefficients (minimised)
    pub objective: IndexMap<VarKey, f64>,
    /// The years this model covers (phase context for diagnostics)
    pub years: Vec<Year>,
}

impl Model {
    /// Assemble a finalised model from generated rows and candidate variables.
    ///
    /// `candidates` lists every variable tuple the index builder declared
    /// valid, in deterministic order. When `restrict` is set, only tuples
    /// actually referenced by a constraint or the objective are instantiated
    /// (in candidate order). Either way, a reference to a tuple outside the
    /// candidate set is a builder defect and fails the build.
    pub fn finalise(
        candidates: IndexMap<VarKey, VarDef>,
        constraints: Vec<Constraint>,
        objective: IndexMap<VarKey, f64>,
        years: Vec<Year>,
        restrict: bool,
    ) -> Result<Model> {
        let mut referenced: IndexSet<&VarKey> = IndexSet::new();
        for constraint in &constraints {
            referenced.extend(constraint.terms.iter().map(|(key, _)| key));
        }
        referenced.extend(objective.keys());

        // A referenced tuple the index builder never declared means a
        // constraint was generated over an invalid index
        let missing = referenced
            .iter()
            .filter(|key| !candidates.contains_key(**key))
            .count();
        if missing > 0 {
            return Err(EngineError::model(format!(
                "{missing} variable tuple(s) referenced but not declared by the index builder"
            ))
            .into());
        }

        let variables: IndexMap<VarKey, VarDef> = if restrict {
            candidates
                .into_iter()
                .filter(|(key, _)| referenced.contains(key))
                .collect()
        } else {
            candidates
        };

        Ok(Model {
            variables,
            constraints,
            objective,
            years,
        })
    }

    /// The column index of a variable, if it was instantiated
    pub fn column_of(&self, key: &VarKey) -> Option<usize> {
        self.variables.get_index_of(key)
    }

    /// Number of instantiated variables per family, for diagnostics
    pub fn family_counts(&self) -> IndexMap<VariableFamily, usize> {
        let mut counts = IndexMap::new();
        for key in self.variables.keys() {
            *counts.entry(key.family()).or_insert(0) += 1;
        }
        counts
    }

    /// The objective value implied by a primal point
    pub fn objective_value(&self, values: &[f64]) -> f64 {
        self.objective
            .iter()
            .map(|(key, coeff)| {
                let col = self.column_of(key).expect("objective references unbuilt variable");
                coeff * values[col]
            })
            .sum()
    }

    /// Serialize the model in CPLEX LP format.
    ///
    /// Variable names are `<family>_<column>`, which keeps them unique and
    /// stable across identical runs.
    pub fn write_lp<W: Write>(&self, writer: &mut W) -> Result<()> {
        let name = |key: &VarKey| {
            let col = self.column_of(key).expect("LP writer saw unbuilt variable");
            format!("{}_{col}", key.family())
        };

        writeln!(writer, "\\ generated by osprey")?;
        writeln!(writer, "Minimize")?;
        write!(writer, " obj:")?;
        for (key, coeff) in &self.objective {
            write!(writer, " {coeff:+} {}", name(key))?;
        }
        writeln!(writer)?;

        writeln!(writer, "Subject To")?;
        for (row, constraint) in self.constraints.iter().enumerate() {
            write!(writer, " c{row}:")?;
            for (key, coeff) in &constraint.terms {
                write!(writer, " {coeff:+} {}", name(key))?;
            }
            if constraint.lower == constraint.upper {
                writeln!(writer, " = {}", constraint.lower)?;
            } else if constraint.lower == f64::NEG_INFINITY {
                writeln!(writer, " <= {}", constraint.upper)?;
            } else if constraint.upper == f64::INFINITY {
                writeln!(writer, " >= {}", constraint.lower)?;
            } else {
                // Ranged row: LP format needs two rows
                writeln!(writer, " >= {}", constraint.lower)?;
                write!(writer, " c{row}u:")?;
                for (key, coeff) in &constraint.terms {
                    write!(writer, " {coeff:+} {}", name(key))?;
                }
                writeln!(writer, " <= {}", constraint.upper)?;
            }
        }

        writeln!(writer, "Bounds")?;
        for (key, def) in &self.variables {
            let var = name(key);
            match (def.lower, def.upper) {
                (l, u) if l == u => writeln!(writer, " {var} = {l}")?,
                (l, f64::INFINITY) if l == f64::NEG_INFINITY => writeln!(writer, " {var} free")?,
                (l, f64::INFINITY) if l == 0.0 => {} // LP default
                (l, f64::INFINITY) => writeln!(writer, " {var} >= {l}")?,
                (l, u) if l == f64::NEG_INFINITY => writeln!(writer, " {var} <= {u}")?,
                (l, u) => writeln!(writer, " {l} <= {var} <= {u}")?,
            }
        }

        let integers: Vec<String> = self
            .variables
            .iter()
            .filter(|(_, def)| def.integer)
            .map(|(key, _)| name(key))
            .collect();
        if !integers.is_empty() {
            writeln!(writer, "General")?;
            for var in integers {
                writeln!(writer, " {var}")?;
            }
        }

        writeln!(writer, "End")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::indexmap;

    fn key(t: &str, y: Year) -> VarKey {
        VarKey::NewCapacity("north".into(), t.into(), y)
    }

    fn candidates() -> IndexMap<VarKey, VarDef> {
        indexmap! {
            key("coal", 2020) => VarDef::non_negative(),
            key("coal", 2021) => VarDef::non_negative(),
            key("wind", 2020) => VarDef::non_negative(),
        }
    }

    #[test]
    fn test_finalise_keeps_all_candidates_without_restriction() {
        let constraints = vec![Constraint::at_most(
            ConstraintFamily::MaxCapacity,
            vec![(key("coal", 2020), 1.0)],
            5.0,
        )];
        let model =
            Model::finalise(candidates(), constraints, IndexMap::new(), vec![2020], false).unwrap();
        assert_eq!(model.variables.len(), 3);
        assert_eq!(model.column_of(&key("wind", 2020)), Some(2));
    }

    #[test]
    fn test_finalise_restricts_to_referenced_tuples() {
        let constraints = vec![Constraint::at_most(
            ConstraintFamily::MaxCapacity,
            vec![(key("coal", 2021), 1.0)],
            5.0,
        )];
        let objective = indexmap! { key("wind", 2020) => 1.0 };
        let model = Model::finalise(candidates(), constraints, objective, vec![2020], true).unwrap();

        // Only the referenced tuples survive, in candidate order
        assert_eq!(model.variables.len(), 2);
        assert_eq!(model.column_of(&key("coal", 2021)), Some(0));
        assert_eq!(model.column_of(&key("wind", 2020)), Some(1));
        assert_eq!(model.column_of(&key("coal", 2020)), None);
    }

    #[test]
    fn test_finalise_rejects_undeclared_reference() {
        let constraints = vec![Constraint::at_most(
            ConstraintFamily::MaxCapacity,
            vec![(key("nuclear", 2020), 1.0)], // never declared
            5.0,
        )];
        let err = Model::finalise(candidates(), constraints, IndexMap::new(), vec![2020], false)
            .unwrap_err();
        assert!(err.to_string().contains("referenced but not declared"));
    }

    #[test]
    fn test_family_table_names_round_trip() {
        assert_eq!(VariableFamily::NewCapacity.to_string(), "vnewcapacity");
        assert_eq!(
            VariableFamily::TotalDiscountedCost.to_string(),
            "vtotaldiscountedcost"
        );
        assert_eq!(
            VariableFamily::NewCapacity.dims(),
            ["region", "technology", "year"]
        );
    }

    #[test]
    fn test_write_lp_smoke() {
        let constraints = vec![Constraint::at_least(
            ConstraintFamily::EnergyBalance,
            vec![(key("coal", 2020), 1.0), (key("wind", 2020), 1.0)],
            4.0,
        )];
        let objective = indexmap! { key("coal", 2020) => 2.0, key("wind", 2020) => 3.0 };
        let model =
            Model::finalise(candidates(), constraints, objective, vec![2020], false).unwrap();

        let mut buf = Vec::new();
        model.write_lp(&mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.starts_with("\\ generated by osprey"));
        assert!(text.contains("Minimize"));
        assert!(text.contains(">= 4"));
        assert!(text.ends_with("End\n"));
    }
}

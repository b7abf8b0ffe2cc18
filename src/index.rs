//! The model index: which variable tuples are valid for a solve.
//!
//! The index is derived once per phase from the loaded scenario and the
//! phase's years. It answers, in deterministic declared-set order, which
//! (region, technology, mode) tuples can operate, which fuels need balancing
//! in each region, how storages connect to technologies, and which lines are
//! live. The model builder only ever generates variables and constraints over
//! tuples the index admits.
use anyhow::Result;
use indexmap::{IndexMap, IndexSet};
use std::collections::HashSet;

use crate::error::EngineError;
use crate::id::{FuelID, LineID, ModeID, RegionID, StorageID, TechnologyID, Year};
use crate::scenario::ScenarioData;

/// A technology operating in one of its modes
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TechMode {
    /// The technology
    pub technology: TechnologyID,
    /// The mode of operation
    pub mode: ModeID,
}

/// Why a line appears in the model in a given year
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineStatus {
    /// The line exists and may carry flow
    Existing,
    /// The line may be built this year (build decision variable)
    Buildable,
}

/// The valid index tuples for one phase.
#[derive(Debug)]
pub struct ModelIndex {
    /// Phase years, ascending
    pub years: Vec<Year>,
    /// Operable (technology, mode) tuples per region, in declared order
    pub operable: IndexMap<RegionID, Vec<TechMode>>,
    /// Technologies with capacity in a region (operable, or carrying
    /// residual or minimum capacity), in declared order
    pub technologies: IndexMap<RegionID, IndexSet<TechnologyID>>,
    /// Fuels whose balance is tracked per region, in declared order
    pub tracked_fuels: IndexMap<RegionID, IndexSet<FuelID>>,
    /// Storages attached to a region, in declared order
    pub storages: IndexMap<RegionID, IndexSet<StorageID>>,
    /// Charging (technology, mode) tuples per (region, storage)
    pub charging: IndexMap<(RegionID, StorageID), Vec<TechMode>>,
    /// Discharging (technology, mode) tuples per (region, storage)
    pub discharging: IndexMap<(RegionID, StorageID), Vec<TechMode>>,
    /// Line status per (line, year); absent means the line is out of the
    /// model that year
    pub lines: IndexMap<(LineID, Year), LineStatus>,
}

impl ModelIndex {
    /// Derive the index for one phase.
    pub fn build(data: &ScenarioData, years: &[Year]) -> Result<ModelIndex> {
        let year_set: HashSet<Year> = years.iter().copied().collect();
        let sets = &data.sets;
        let params = &data.params;

        // Collect raw tuples from the sparse parameter maps first, then lay
        // them out in declared-set order
        let mut operable_raw: HashSet<(RegionID, TechnologyID, ModeID)> = HashSet::new();
        let mut tracked_raw: HashSet<(RegionID, FuelID)> = HashSet::new();

        for ((r, t, f, m, y), val) in params.input_activity_ratio.iter() {
            if val != 0.0 && year_set.contains(y) {
                operable_raw.insert((r.clone(), t.clone(), m.clone()));
                tracked_raw.insert((r.clone(), f.clone()));
            }
        }
        for ((r, t, f, m, y), val) in params.output_activity_ratio.iter() {
            if val != 0.0 && year_set.contains(y) {
                operable_raw.insert((r.clone(), t.clone(), m.clone()));
                tracked_raw.insert((r.clone(), f.clone()));
            }
        }
        for ((r, t, _s, m), val) in params.technology_to_storage.iter() {
            if val != 0.0 {
                operable_raw.insert((r.clone(), t.clone(), m.clone()));
            }
        }
        for ((r, t, _s, m), val) in params.technology_from_storage.iter() {
            if val != 0.0 {
                operable_raw.insert((r.clone(), t.clone(), m.clone()));
            }
        }
        for ((r, f, y), val) in params.specified_annual_demand.iter() {
            if val != 0.0 && year_set.contains(y) {
                tracked_raw.insert((r.clone(), f.clone()));
            }
        }
        for ((r1, r2, f, y), val) in params.trade_route.iter() {
            if val != 0.0 && year_set.contains(y) {
                tracked_raw.insert((r1.clone(), f.clone()));
                tracked_raw.insert((r2.clone(), f.clone()));
            }
        }

        // A mode must not both charge and discharge the same storage
        for ((r, t, s, m), val) in params.technology_to_storage.iter() {
            if val != 0.0
                && params
                    .technology_from_storage
                    .get(&(r.clone(), t.clone(), s.clone(), m.clone()))
                    != 0.0
            {
                return Err(EngineError::data(format!(
                    "mode '{m}' of technology '{t}' in region '{r}' both charges and \
                     discharges storage '{s}'"
                ))
                .into());
            }
        }

        let mut operable: IndexMap<RegionID, Vec<TechMode>> = IndexMap::new();
        let mut technologies: IndexMap<RegionID, IndexSet<TechnologyID>> = IndexMap::new();
        let mut tracked_fuels: IndexMap<RegionID, IndexSet<FuelID>> = IndexMap::new();
        for r in &sets.regions {
            let mut modes = Vec::new();
            let mut techs = IndexSet::new();
            for t in &sets.technologies {
                for m in &sets.modes {
                    if operable_raw.contains(&(r.clone(), t.clone(), m.clone())) {
                        modes.push(TechMode {
                            technology: t.clone(),
                            mode: m.clone(),
                        });
                        techs.insert(t.clone());
                    }
                }
                // Capacity carried into the model even with no operable mode
                let has_capacity = years.iter().any(|y| {
                    data.effective_residual_capacity(r, t, *y) != 0.0
                        || params.min_capacity.get(&(r.clone(), t.clone(), *y)) != 0.0
                });
                if has_capacity {
                    techs.insert(t.clone());
                }
            }

            let mut fuels = IndexSet::new();
            for f in &sets.fuels {
                if tracked_raw.contains(&(r.clone(), f.clone())) {
                    fuels.insert(f.clone());
                }
            }
            // A line endpoint tracks the line's fuel even without local supply
            for line in sets.lines.values() {
                if &line.region1 == r || &line.region2 == r {
                    fuels.insert(line.fuel.clone());
                }
            }

            operable.insert(r.clone(), modes);
            technologies.insert(r.clone(), techs);
            tracked_fuels.insert(r.clone(), fuels);
        }

        let mut storages: IndexMap<RegionID, IndexSet<StorageID>> = sets
            .regions
            .iter()
            .map(|r| (r.clone(), IndexSet::new()))
            .collect();
        let mut charging: IndexMap<(RegionID, StorageID), Vec<TechMode>> = IndexMap::new();
        let mut discharging: IndexMap<(RegionID, StorageID), Vec<TechMode>> = IndexMap::new();
        for r in &sets.regions {
            for s in &sets.storages {
                let mut charge = Vec::new();
                let mut discharge = Vec::new();
                for t in &sets.technologies {
                    for m in &sets.modes {
                        let key = (r.clone(), t.clone(), s.clone(), m.clone());
                        let link = TechMode {
                            technology: t.clone(),
                            mode: m.clone(),
                        };
                        if params.technology_to_storage.get(&key) != 0.0 {
                            charge.push(link.clone());
                        }
                        if params.technology_from_storage.get(&key) != 0.0 {
                            discharge.push(link);
                        }
                    }
                }
                let has_residual = years.iter().any(|y| {
                    data.effective_residual_storage_capacity(r, s, *y) != 0.0
                });
                if !charge.is_empty() || !discharge.is_empty() || has_residual {
                    storages.get_mut(r).unwrap().insert(s.clone());
                    charging.insert((r.clone(), s.clone()), charge);
                    discharging.insert((r.clone(), s.clone()), discharge);
                }
            }
        }

        let mut lines = IndexMap::new();
        for line in sets.lines.keys() {
            for y in years {
                if data.line_exists(line, *y) {
                    lines.insert((line.clone(), *y), LineStatus::Existing);
                } else if data.line_buildable(line, *y) {
                    lines.insert((line.clone(), *y), LineStatus::Buildable);
                }
            }
        }

        Ok(ModelIndex {
            years: years.to_vec(),
            operable,
            technologies,
            tracked_fuels,
            storages,
            charging,
            discharging,
            lines,
        })
    }

    /// Lines carrying flow into or out of `region` for `fuel` in `year`,
    /// with the sign of a positive flow seen from that region
    pub fn incident_lines<'a>(
        &'a self,
        data: &'a ScenarioData,
        region: &'a RegionID,
        fuel: &'a FuelID,
        year: Year,
    ) -> impl Iterator<Item = (&'a LineID, f64)> {
        data.sets.lines.iter().filter_map(move |(id, line)| {
            if !self.lines.contains_key(&(id.clone(), year)) || &line.fuel != fuel {
                return None;
            }
            if &line.region1 == region {
                // Positive flow leaves region1 at full value
                Some((id, -1.0))
            } else if &line.region2 == region {
                // and arrives at region2 net of losses
                Some((id, data.params.transmission_efficiency.get(id)))
            } else {
                None
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::{loaded_scenario, scratch_scenario, write_table, YEARS};
    use crate::store::Store;
    use rstest::rstest;
    use tempfile::TempDir;

    #[rstest]
    fn test_operable_modes_follow_activity_ratios(
        loaded_scenario: (TempDir, Store, ScenarioData),
    ) {
        let (_dir, _store, data) = loaded_scenario;
        let index = ModelIndex::build(&data, &YEARS).unwrap();

        let north = &index.operable[&RegionID::from("north")];
        assert!(north.contains(&TechMode {
            technology: "wind_farm".into(),
            mode: "standard".into(),
        }));
        assert!(north.contains(&TechMode {
            technology: "battery_inverter".into(),
            mode: "charge".into(),
        }));

        // wind_farm has no ratios in the south
        let south = &index.operable[&RegionID::from("south")];
        assert!(!south.iter().any(|tm| tm.technology.as_str() == "wind_farm"));
    }

    #[rstest]
    fn test_tracked_fuels_include_line_endpoints(
        loaded_scenario: (TempDir, Store, ScenarioData),
    ) {
        let (_dir, _store, data) = loaded_scenario;
        let index = ModelIndex::build(&data, &YEARS).unwrap();

        for r in ["north", "south"] {
            let fuels = &index.tracked_fuels[&RegionID::from(r)];
            assert!(fuels.contains("electricity"));
            assert!(fuels.contains("gas"));
        }
    }

    #[rstest]
    fn test_storage_links_are_directional(loaded_scenario: (TempDir, Store, ScenarioData)) {
        let (_dir, _store, data) = loaded_scenario;
        let index = ModelIndex::build(&data, &YEARS).unwrap();

        let key = (RegionID::from("north"), crate::id::StorageID::from("battery"));
        assert_eq!(index.charging[&key].len(), 1);
        assert_eq!(index.charging[&key][0].mode.as_str(), "charge");
        assert_eq!(index.discharging[&key][0].mode.as_str(), "discharge");
        assert!(index.storages[&RegionID::from("south")].is_empty());
    }

    #[rstest]
    fn test_mode_cannot_charge_and_discharge(scratch_scenario: (TempDir, Store)) {
        let (_dir, store) = scratch_scenario;
        write_table(
            &store,
            "TechnologyFromStorage",
            &["north,battery_inverter,battery,charge,1".into()],
        );

        let data = ScenarioData::load(&store).unwrap();
        let err = ModelIndex::build(&data, &YEARS).unwrap_err();
        assert!(err.to_string().contains("both charges and discharges"));
    }

    #[rstest]
    fn test_lines_active_when_available(loaded_scenario: (TempDir, Store, ScenarioData)) {
        let (_dir, _store, data) = loaded_scenario;
        let index = ModelIndex::build(&data, &YEARS).unwrap();

        let line = LineID::from("north_south");
        assert_eq!(index.lines[&(line.clone(), 2020)], LineStatus::Existing);

        let region = "south".into();
        let fuel = "electricity".into();
        let incident: Vec<_> = index
            .incident_lines(&data, &region, &fuel, 2020)
            .collect();
        assert_eq!(incident.len(), 1);
        float_cmp::assert_approx_eq!(f64, incident[0].1, 0.95);
    }

    #[rstest]
    fn test_index_only_covers_phase_years(loaded_scenario: (TempDir, Store, ScenarioData)) {
        let (_dir, _store, data) = loaded_scenario;
        let index = ModelIndex::build(&data, &[2020]).unwrap();
        assert_eq!(index.years, [2020]);
        assert!(!index.lines.contains_key(&(LineID::from("north_south"), 2021)));
    }
}

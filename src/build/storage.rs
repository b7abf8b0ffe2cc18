//! Storage charge, level chaining and capacity constraints.
use super::Ctx;
use crate::id::RegionID;
use crate::model::{Constraint, ConstraintFamily, VarKey};

pub(crate) fn rows(ctx: &Ctx, r: &RegionID) -> Vec<Constraint> {
    let data = ctx.data;
    let index = ctx.index;
    let params = &data.params;
    let mut rows = Vec::new();

    for s in &index.storages[r] {
        let link = (r.clone(), s.clone());

        for l in &data.sets.timeslices {
            for y in &index.years {
                let ys = params.year_split.get(&(l.clone(), *y));

                let mut charge =
                    vec![(VarKey::StorageCharge(r.clone(), s.clone(), l.clone(), *y), 1.0)];
                for tm in &index.charging[&link] {
                    let rate = params.technology_to_storage.get(&(
                        r.clone(),
                        tm.technology.clone(),
                        s.clone(),
                        tm.mode.clone(),
                    ));
                    charge.push((
                        VarKey::Activity(
                            r.clone(),
                            l.clone(),
                            tm.technology.clone(),
                            tm.mode.clone(),
                            *y,
                        ),
                        -rate * ys,
                    ));
                }
                rows.push(Constraint::equality(
                    ConstraintFamily::StorageChargeDefinition,
                    charge,
                    0.0,
                ));

                let mut discharge = vec![(
                    VarKey::StorageDischarge(r.clone(), s.clone(), l.clone(), *y),
                    1.0,
                )];
                for tm in &index.discharging[&link] {
                    let rate = params.technology_from_storage.get(&(
                        r.clone(),
                        tm.technology.clone(),
                        s.clone(),
                        tm.mode.clone(),
                    ));
                    discharge.push((
                        VarKey::Activity(
                            r.clone(),
                            l.clone(),
                            tm.technology.clone(),
                            tm.mode.clone(),
                            *y,
                        ),
                        -rate * ys,
                    ));
                }
                rows.push(Constraint::equality(
                    ConstraintFamily::StorageDischargeDefinition,
                    discharge,
                    0.0,
                ));
            }
        }

        // Level chaining: declared timeslice order within each year, last
        // slice of one year feeding the first slice of the next
        let opening = data.storage_opening_level(r, s);
        let mut prev: Option<VarKey> = None;
        for y in &index.years {
            for l in &data.sets.timeslices {
                let mut terms = vec![
                    (VarKey::StorageLevel(r.clone(), s.clone(), l.clone(), *y), 1.0),
                    (VarKey::StorageCharge(r.clone(), s.clone(), l.clone(), *y), -1.0),
                    (
                        VarKey::StorageDischarge(r.clone(), s.clone(), l.clone(), *y),
                        1.0,
                    ),
                ];
                let rhs = match &prev {
                    Some(prev_level) => {
                        terms.push((prev_level.clone(), -1.0));
                        0.0
                    }
                    None => opening,
                };
                rows.push(Constraint::equality(
                    ConstraintFamily::StorageLevelBalance,
                    terms,
                    rhs,
                ));
                prev = Some(VarKey::StorageLevel(r.clone(), s.clone(), l.clone(), *y));
            }

            if params.storage_net_zero_year.get(&(r.clone(), s.clone(), *y)) != 0.0 {
                if let Some(last) = data.sets.timeslices.last() {
                    rows.push(Constraint::equality(
                        ConstraintFamily::StorageNetZero,
                        vec![(
                            VarKey::StorageLevel(r.clone(), s.clone(), last.clone(), *y),
                            1.0,
                        )],
                        opening,
                    ));
                }
            }
        }

        let life =
            params.operational_life_storage.get(&(r.clone(), s.clone())) as crate::id::Year;
        for y in &index.years {
            let mut terms = vec![(VarKey::StorageCapacity(r.clone(), s.clone(), *y), 1.0)];
            for yy in &index.years {
                if yy <= y && y - yy < life {
                    terms.push((VarKey::NewStorageCapacity(r.clone(), s.clone(), *yy), -1.0));
                }
            }
            rows.push(Constraint::equality(
                ConstraintFamily::StorageCapacityBalance,
                terms,
                data.effective_residual_storage_capacity(r, s, *y),
            ));

            for l in &data.sets.timeslices {
                rows.push(Constraint::at_most(
                    ConstraintFamily::StorageLevelLimit,
                    vec![
                        (VarKey::StorageLevel(r.clone(), s.clone(), l.clone(), *y), 1.0),
                        (VarKey::StorageCapacity(r.clone(), s.clone(), *y), -1.0),
                    ],
                    0.0,
                ));
            }

            if let Some(max) = params
                .storage_max_capacity
                .get_opt(&(r.clone(), s.clone(), *y))
            {
                rows.push(Constraint::at_most(
                    ConstraintFamily::StorageMaxCapacityLimit,
                    vec![(VarKey::StorageCapacity(r.clone(), s.clone(), *y), 1.0)],
                    max,
                ));
            }
        }
    }

    rows
}

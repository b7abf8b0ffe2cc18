//! Capacity stock and adequacy constraints.
use super::Ctx;
use crate::id::RegionID;
use crate::model::{Constraint, ConstraintFamily, VarKey};

pub(crate) fn rows(ctx: &Ctx, r: &RegionID) -> Vec<Constraint> {
    let data = ctx.data;
    let index = ctx.index;
    let params = &data.params;
    let mut rows = Vec::new();

    for t in &index.technologies[r] {
        let life = params.operational_life.get(&(r.clone(), t.clone())) as crate::id::Year;
        let c2a = params.capacity_to_activity.get(&(r.clone(), t.clone()));

        for y in &index.years {
            // Installed stock: residual (overlay-aware) plus in-phase builds
            // still inside their lifetime
            let mut terms = vec![(VarKey::TotalCapacity(r.clone(), t.clone(), *y), 1.0)];
            for yy in &index.years {
                if yy <= y && y - yy < life {
                    terms.push((VarKey::NewCapacity(r.clone(), t.clone(), *yy), -1.0));
                }
            }
            rows.push(Constraint::equality(
                ConstraintFamily::CapacityBalance,
                terms,
                data.effective_residual_capacity(r, t, *y),
            ));
        }

        let modes: Vec<_> = index.operable[r]
            .iter()
            .filter(|tm| &tm.technology == t)
            .map(|tm| tm.mode.clone())
            .collect();

        if !modes.is_empty() {
            for l in &data.sets.timeslices {
                for y in &index.years {
                    let cf = params
                        .capacity_factor
                        .get(&(r.clone(), t.clone(), l.clone(), *y));
                    let mut terms: Vec<_> = modes
                        .iter()
                        .map(|m| {
                            (
                                VarKey::Activity(r.clone(), l.clone(), t.clone(), m.clone(), *y),
                                1.0,
                            )
                        })
                        .collect();
                    terms.push((VarKey::TotalCapacity(r.clone(), t.clone(), *y), -cf * c2a));
                    rows.push(Constraint::at_most(
                        ConstraintFamily::CapacityAdequacy,
                        terms,
                        0.0,
                    ));
                }
            }

            for y in &index.years {
                let af = params
                    .availability_factor
                    .get(&(r.clone(), t.clone(), *y));
                let mut terms = Vec::new();
                for l in &data.sets.timeslices {
                    let ys = params.year_split.get(&(l.clone(), *y));
                    for m in &modes {
                        terms.push((
                            VarKey::Activity(r.clone(), l.clone(), t.clone(), m.clone(), *y),
                            ys,
                        ));
                    }
                }
                terms.push((VarKey::TotalCapacity(r.clone(), t.clone(), *y), -af * c2a));
                rows.push(Constraint::at_most(
                    ConstraintFamily::AnnualActivityLimit,
                    terms,
                    0.0,
                ));
            }
        }

        for y in &index.years {
            if let Some(max) = params.max_capacity.get_opt(&(r.clone(), t.clone(), *y)) {
                rows.push(Constraint::at_most(
                    ConstraintFamily::MaxCapacity,
                    vec![(VarKey::TotalCapacity(r.clone(), t.clone(), *y), 1.0)],
                    max,
                ));
            }
            let min = params.min_capacity.get(&(r.clone(), t.clone(), *y));
            if min != 0.0 {
                rows.push(Constraint::at_least(
                    ConstraintFamily::MinCapacity,
                    vec![(VarKey::TotalCapacity(r.clone(), t.clone(), *y), 1.0)],
                    min,
                ));
            }
        }
    }

    rows
}

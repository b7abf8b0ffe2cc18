//! Fuel production, use, balance and emissions constraints.
use super::{Ctx, TransmissionTopology};
use crate::id::RegionID;
use crate::model::{Constraint, ConstraintFamily, VarKey};
use indexmap::IndexSet;

pub(crate) fn rows(ctx: &Ctx, r: &RegionID) -> Vec<Constraint> {
    let data = ctx.data;
    let index = ctx.index;
    let params = &data.params;
    let mut rows = Vec::new();

    for l in &data.sets.timeslices {
        for f in &index.tracked_fuels[r] {
            for y in &index.years {
                let ys = params.year_split.get(&(l.clone(), *y));

                let mut production =
                    vec![(VarKey::Production(r.clone(), l.clone(), f.clone(), *y), 1.0)];
                let mut consumption =
                    vec![(VarKey::Use(r.clone(), l.clone(), f.clone(), *y), 1.0)];
                for tm in &index.operable[r] {
                    let t = &tm.technology;
                    let m = &tm.mode;
                    let oar = params.output_activity_ratio.get(&(
                        r.clone(),
                        t.clone(),
                        f.clone(),
                        m.clone(),
                        *y,
                    ));
                    if oar != 0.0 {
                        production.push((
                            VarKey::Activity(r.clone(), l.clone(), t.clone(), m.clone(), *y),
                            -oar * ys,
                        ));
                    }
                    let iar = params.input_activity_ratio.get(&(
                        r.clone(),
                        t.clone(),
                        f.clone(),
                        m.clone(),
                        *y,
                    ));
                    if iar != 0.0 {
                        consumption.push((
                            VarKey::Activity(r.clone(), l.clone(), t.clone(), m.clone(), *y),
                            -iar * ys,
                        ));
                    }
                }
                rows.push(Constraint::equality(
                    ConstraintFamily::ProductionDefinition,
                    production,
                    0.0,
                ));
                rows.push(Constraint::equality(
                    ConstraintFamily::UseDefinition,
                    consumption,
                    0.0,
                ));

                let mut balance = vec![
                    (VarKey::Production(r.clone(), l.clone(), f.clone(), *y), 1.0),
                    (VarKey::Use(r.clone(), l.clone(), f.clone(), *y), -1.0),
                ];
                match ctx.topology {
                    TransmissionTopology::Pairwise => {
                        for (line, coeff) in index.incident_lines(data, r, f, *y) {
                            balance.push((VarKey::LineFlow(line.clone(), l.clone(), *y), coeff));
                        }
                    }
                    TransmissionTopology::Transshipment => {
                        balance.push((
                            VarKey::NetImport(r.clone(), f.clone(), l.clone(), *y),
                            1.0,
                        ));
                    }
                    TransmissionTopology::None => {}
                }
                rows.push(Constraint::at_least(
                    ConstraintFamily::EnergyBalance,
                    balance,
                    data.demand(r, f, l, *y),
                ));
            }
        }
    }

    for e in &data.sets.emissions {
        for y in &index.years {
            let mut terms = vec![(VarKey::AnnualEmissions(r.clone(), e.clone(), *y), 1.0)];
            for l in &data.sets.timeslices {
                let ys = params.year_split.get(&(l.clone(), *y));
                for tm in &index.operable[r] {
                    let ear = params.emission_activity_ratio.get(&(
                        r.clone(),
                        tm.technology.clone(),
                        e.clone(),
                        tm.mode.clone(),
                        *y,
                    ));
                    if ear != 0.0 {
                        terms.push((
                            VarKey::Activity(
                                r.clone(),
                                l.clone(),
                                tm.technology.clone(),
                                tm.mode.clone(),
                                *y,
                            ),
                            -ear * ys,
                        ));
                    }
                }
            }
            rows.push(Constraint::equality(
                ConstraintFamily::AnnualEmissionsDefinition,
                terms,
                0.0,
            ));

            if let Some(limit) = params
                .annual_emission_limit
                .get_opt(&(r.clone(), e.clone(), *y))
            {
                rows.push(Constraint::at_most(
                    ConstraintFamily::AnnualEmissionsLimit,
                    vec![(VarKey::AnnualEmissions(r.clone(), e.clone(), *y), 1.0)],
                    limit,
                ));
            }
        }
    }

    rows
}

/// The trade clearing house: net imports of a fuel sum to zero over all
/// regions tracking it. Cross-region, so generated serially.
pub(crate) fn clearing_rows(ctx: &Ctx) -> Vec<Constraint> {
    if ctx.topology != TransmissionTopology::Transshipment {
        return Vec::new();
    }
    let data = ctx.data;
    let index = ctx.index;

    let mut traded: IndexSet<&crate::id::FuelID> = IndexSet::new();
    for f in &data.sets.fuels {
        if data
            .sets
            .regions
            .iter()
            .any(|r| index.tracked_fuels[r].contains(f))
        {
            traded.insert(f);
        }
    }

    let mut rows = Vec::new();
    for f in traded {
        for l in &data.sets.timeslices {
            for y in &index.years {
                let terms: Vec<_> = data
                    .sets
                    .regions
                    .iter()
                    .filter(|r| index.tracked_fuels[*r].contains(f))
                    .map(|r| {
                        (
                            VarKey::NetImport(r.clone(), f.clone(), l.clone(), *y),
                            1.0,
                        )
                    })
                    .collect();
                rows.push(Constraint::equality(
                    ConstraintFamily::TradeClearing,
                    terms,
                    0.0,
                ));
            }
        }
    }
    rows
}

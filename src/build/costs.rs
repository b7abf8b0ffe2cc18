//! Cost accounting: every cost variable is pinned by a defining equality, so
//! the solved values can be written out without post-processing.
use super::{Ctx, TransmissionTopology};
use crate::id::{RegionID, Year};
use crate::model::{Constraint, ConstraintFamily, VarKey};
use indexmap::IndexMap;

/// `(1 + rate)^(y - base + offset)`; operating flows discount from mid-year
/// (offset 0.5), investment from the start of the year (offset 0)
pub(crate) fn discount_factor(rate: f64, y: Year, base: Year, offset: f64) -> f64 {
    (1.0 + rate).powf((y - base) as f64 + offset)
}

pub(crate) fn technology_rows(ctx: &Ctx, r: &RegionID) -> Vec<Constraint> {
    let data = ctx.data;
    let index = ctx.index;
    let params = &data.params;
    let rate = params.discount_rate.get(r);
    let mut rows = Vec::new();

    for t in &index.technologies[r] {
        let life = params.operational_life.get(&(r.clone(), t.clone()));
        let modes: Vec<_> = index.operable[r]
            .iter()
            .filter(|tm| &tm.technology == t)
            .map(|tm| tm.mode.clone())
            .collect();

        for y in &index.years {
            let cc = params.capital_cost.get(&(r.clone(), t.clone(), *y));
            let new_cap = VarKey::NewCapacity(r.clone(), t.clone(), *y);

            rows.push(Constraint::equality(
                ConstraintFamily::CapitalInvestmentDefinition,
                vec![
                    (VarKey::CapitalInvestment(r.clone(), t.clone(), *y), 1.0),
                    (new_cap.clone(), -cc),
                ],
                0.0,
            ));
            let ir = data.interest_rate_technology(r, t, *y);
            rows.push(Constraint::equality(
                ConstraintFamily::DiscountedCapitalInvestmentDefinition,
                vec![
                    (
                        VarKey::DiscountedCapitalInvestment(r.clone(), t.clone(), *y),
                        1.0,
                    ),
                    (
                        VarKey::CapitalInvestment(r.clone(), t.clone(), *y),
                        -1.0 / discount_factor(ir, *y, ctx.first_year, 0.0),
                    ),
                ],
                0.0,
            ));

            let fc = params.fixed_cost.get(&(r.clone(), t.clone(), *y));
            let mut operating = vec![
                (VarKey::OperatingCost(r.clone(), t.clone(), *y), 1.0),
                (VarKey::TotalCapacity(r.clone(), t.clone(), *y), -fc),
            ];
            for l in &data.sets.timeslices {
                let ys = params.year_split.get(&(l.clone(), *y));
                for m in &modes {
                    let vc = params
                        .variable_cost
                        .get(&(r.clone(), t.clone(), m.clone(), *y));
                    if vc != 0.0 {
                        operating.push((
                            VarKey::Activity(r.clone(), l.clone(), t.clone(), m.clone(), *y),
                            -vc * ys,
                        ));
                    }
                }
            }
            rows.push(Constraint::equality(
                ConstraintFamily::OperatingCostDefinition,
                operating,
                0.0,
            ));
            rows.push(Constraint::equality(
                ConstraintFamily::DiscountedOperatingCostDefinition,
                vec![
                    (VarKey::DiscountedOperatingCost(r.clone(), t.clone(), *y), 1.0),
                    (
                        VarKey::OperatingCost(r.clone(), t.clone(), *y),
                        -1.0 / discount_factor(rate, *y, ctx.first_year, 0.5),
                    ),
                ],
                0.0,
            ));

            let mut penalty =
                vec![(VarKey::AnnualEmissionsPenalty(r.clone(), t.clone(), *y), 1.0)];
            // An activity may be priced under several emissions; its
            // coefficients merge into a single term per variable
            let mut priced: IndexMap<VarKey, f64> = IndexMap::new();
            for e in &data.sets.emissions {
                let price = params.emissions_penalty.get(&(r.clone(), e.clone(), *y));
                if price == 0.0 {
                    continue;
                }
                for l in &data.sets.timeslices {
                    let ys = params.year_split.get(&(l.clone(), *y));
                    for m in &modes {
                        let ear = params.emission_activity_ratio.get(&(
                            r.clone(),
                            t.clone(),
                            e.clone(),
                            m.clone(),
                            *y,
                        ));
                        if ear != 0.0 {
                            *priced
                                .entry(VarKey::Activity(
                                    r.clone(),
                                    l.clone(),
                                    t.clone(),
                                    m.clone(),
                                    *y,
                                ))
                                .or_insert(0.0) -= ear * price * ys;
                        }
                    }
                }
            }
            penalty.extend(priced);
            rows.push(Constraint::equality(
                ConstraintFamily::EmissionsPenaltyDefinition,
                penalty,
                0.0,
            ));
            rows.push(Constraint::equality(
                ConstraintFamily::DiscountedEmissionsPenaltyDefinition,
                vec![
                    (
                        VarKey::DiscountedEmissionsPenalty(r.clone(), t.clone(), *y),
                        1.0,
                    ),
                    (
                        VarKey::AnnualEmissionsPenalty(r.clone(), t.clone(), *y),
                        -1.0 / discount_factor(rate, *y, ctx.first_year, 0.5),
                    ),
                ],
                0.0,
            ));

            // Straight-line salvage share of builds outliving the horizon
            let overhang = (*y as f64 + life - 1.0 - ctx.last_year as f64) / life;
            let frac = overhang.max(0.0);
            rows.push(Constraint::equality(
                ConstraintFamily::SalvageValueDefinition,
                vec![
                    (VarKey::SalvageValue(r.clone(), t.clone(), *y), 1.0),
                    (new_cap, -frac * cc),
                ],
                0.0,
            ));
            rows.push(Constraint::equality(
                ConstraintFamily::DiscountedSalvageValueDefinition,
                vec![
                    (VarKey::DiscountedSalvageValue(r.clone(), t.clone(), *y), 1.0),
                    (
                        VarKey::SalvageValue(r.clone(), t.clone(), *y),
                        -1.0 / discount_factor(rate, ctx.last_year, ctx.first_year, 1.0),
                    ),
                ],
                0.0,
            ));

            rows.push(Constraint::equality(
                ConstraintFamily::CostByTechnologyDefinition,
                vec![
                    (
                        VarKey::TotalDiscountedCostByTechnology(r.clone(), t.clone(), *y),
                        1.0,
                    ),
                    (
                        VarKey::DiscountedCapitalInvestment(r.clone(), t.clone(), *y),
                        -1.0,
                    ),
                    (VarKey::DiscountedOperatingCost(r.clone(), t.clone(), *y), -1.0),
                    (
                        VarKey::DiscountedEmissionsPenalty(r.clone(), t.clone(), *y),
                        -1.0,
                    ),
                    (VarKey::DiscountedSalvageValue(r.clone(), t.clone(), *y), 1.0),
                ],
                0.0,
            ));
        }
    }

    rows
}

pub(crate) fn storage_rows(ctx: &Ctx, r: &RegionID) -> Vec<Constraint> {
    let data = ctx.data;
    let index = ctx.index;
    let params = &data.params;
    let rate = params.discount_rate.get(r);
    let mut rows = Vec::new();

    for s in &index.storages[r] {
        let life = params.operational_life_storage.get(&(r.clone(), s.clone()));
        for y in &index.years {
            let cc = params
                .capital_cost_storage
                .get(&(r.clone(), s.clone(), *y));
            rows.push(Constraint::equality(
                ConstraintFamily::StorageCapitalInvestmentDefinition,
                vec![
                    (VarKey::CapitalInvestmentStorage(r.clone(), s.clone(), *y), 1.0),
                    (VarKey::NewStorageCapacity(r.clone(), s.clone(), *y), -cc),
                ],
                0.0,
            ));
            let ir = data.interest_rate_storage(r, s, *y);
            rows.push(Constraint::equality(
                ConstraintFamily::DiscountedStorageCapitalInvestmentDefinition,
                vec![
                    (
                        VarKey::DiscountedCapitalInvestmentStorage(r.clone(), s.clone(), *y),
                        1.0,
                    ),
                    (
                        VarKey::CapitalInvestmentStorage(r.clone(), s.clone(), *y),
                        -1.0 / discount_factor(ir, *y, ctx.first_year, 0.0),
                    ),
                ],
                0.0,
            ));

            let overhang = (*y as f64 + life - 1.0 - ctx.last_year as f64) / life;
            let frac = overhang.max(0.0);
            rows.push(Constraint::equality(
                ConstraintFamily::StorageSalvageValueDefinition,
                vec![
                    (VarKey::SalvageValueStorage(r.clone(), s.clone(), *y), 1.0),
                    (
                        VarKey::NewStorageCapacity(r.clone(), s.clone(), *y),
                        -frac * cc,
                    ),
                ],
                0.0,
            ));
            rows.push(Constraint::equality(
                ConstraintFamily::DiscountedStorageSalvageValueDefinition,
                vec![
                    (
                        VarKey::DiscountedSalvageValueStorage(r.clone(), s.clone(), *y),
                        1.0,
                    ),
                    (
                        VarKey::SalvageValueStorage(r.clone(), s.clone(), *y),
                        -1.0 / discount_factor(rate, ctx.last_year, ctx.first_year, 1.0),
                    ),
                ],
                0.0,
            ));

            rows.push(Constraint::equality(
                ConstraintFamily::StorageCostDefinition,
                vec![
                    (VarKey::TotalDiscountedStorageCost(r.clone(), s.clone(), *y), 1.0),
                    (
                        VarKey::DiscountedCapitalInvestmentStorage(r.clone(), s.clone(), *y),
                        -1.0,
                    ),
                    (
                        VarKey::DiscountedSalvageValueStorage(r.clone(), s.clone(), *y),
                        1.0,
                    ),
                ],
                0.0,
            ));
        }
    }

    rows
}

/// The regional accounting identity: total discounted cost equals the sum of
/// per-technology, per-storage and transmission shares. Empty sums contribute
/// algebraic zero.
pub(crate) fn identity_rows(ctx: &Ctx, r: &RegionID) -> Vec<Constraint> {
    let index = ctx.index;
    let mut rows = Vec::new();

    for y in &index.years {
        let mut terms = vec![(VarKey::TotalDiscountedCost(r.clone(), *y), 1.0)];
        for t in &index.technologies[r] {
            terms.push((
                VarKey::TotalDiscountedCostByTechnology(r.clone(), t.clone(), *y),
                -1.0,
            ));
        }
        for s in &index.storages[r] {
            terms.push((
                VarKey::TotalDiscountedStorageCost(r.clone(), s.clone(), *y),
                -1.0,
            ));
        }
        if ctx.topology == TransmissionTopology::Pairwise {
            terms.push((
                VarKey::TotalDiscountedTransmissionCost(r.clone(), *y),
                -1.0,
            ));
        }
        rows.push(Constraint::equality(
            ConstraintFamily::AccountingIdentity,
            terms,
            0.0,
        ));
    }

    rows
}
